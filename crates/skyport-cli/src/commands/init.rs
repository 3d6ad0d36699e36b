use std::path::Path;

use anyhow::bail;
use skyport_core::StackConfig;

pub fn init(path: &str, name: Option<&str>) -> anyhow::Result<()> {
    let dir = Path::new(path);
    let output = dir.join("skyport.toml");
    if output.exists() {
        bail!("{} already exists", output.display());
    }

    std::fs::create_dir_all(dir)?;
    let name = match name {
        Some(n) => n.to_string(),
        None => default_name(dir),
    };
    let config = StackConfig::scaffold(&name);
    std::fs::write(&output, config.to_toml_string()?)?;
    println!("✓ Generated {}", output.display());
    Ok(())
}

/// Stack name derived from the directory, falling back to "WebServerStack".
fn default_name(dir: &Path) -> String {
    std::fs::canonicalize(dir)
        .ok()
        .and_then(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
        .filter(|n| n.chars().any(|c| c.is_ascii_alphanumeric()))
        .unwrap_or_else(|| "WebServerStack".to_string())
}
