use std::path::Path;

use anyhow::Context;
use skyport_core::StackConfig;

use crate::assembly;

pub fn synth(config_path: &str, repository: &str, output: Option<&str>) -> anyhow::Result<()> {
    let config = StackConfig::from_file(Path::new(config_path))?;
    let assembly = assembly::assemble(&config, repository)
        .with_context(|| format!("synthesizing stack '{}'", config.stack.name))?;

    for warning in &assembly.warnings {
        eprintln!("warning: {warning}");
    }

    let json = assembly.template.to_json_pretty()?;
    match output {
        Some(path) => {
            std::fs::write(path, &json)?;
            eprintln!("✓ Synthesized {} resources to {path}", assembly.template.len());
        }
        None => println!("{json}"),
    }

    eprintln!("  Network:       {}", assembly.network.network);
    eprintln!("  Cluster:       {}", assembly.cluster.cluster.logical_id);
    eprintln!("  Load balancer: {}", assembly.service.load_balancer.logical_id);
    eprintln!("  Service:       {}", assembly.service.service.logical_id);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_template_json() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("skyport.toml");
        std::fs::write(
            &config_path,
            StackConfig::scaffold("web").to_toml_string().unwrap(),
        )
        .unwrap();
        let out = dir.path().join("template.json");

        synth(
            config_path.to_str().unwrap(),
            "webserver",
            Some(out.to_str().unwrap()),
        )
        .unwrap();

        let doc: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&out).unwrap()).unwrap();
        assert_eq!(doc["stack"], "web");
        let kinds: Vec<&str> = doc["resources"]
            .as_array()
            .unwrap()
            .iter()
            .map(|r| r["kind"].as_str().unwrap())
            .collect();
        assert!(kinds.contains(&"service"));
        assert!(kinds.contains(&"scaling_policy"));
    }

    #[test]
    fn assembly_failure_carries_stack_context() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("skyport.toml");
        std::fs::write(
            &config_path,
            StackConfig::scaffold("web").to_toml_string().unwrap(),
        )
        .unwrap();

        let err = synth(config_path.to_str().unwrap(), "", None).unwrap_err();
        let report = format!("{err:#}");
        assert!(report.starts_with("synthesizing stack 'web'"));
        assert!(report.contains("task definition"));
    }

    #[test]
    fn missing_config_fails() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.toml");
        assert!(synth(missing.to_str().unwrap(), "webserver", None).is_err());
    }
}
