use std::path::Path;

use anyhow::Context;
use skyport_compute::ServiceOrchestrator;
use skyport_core::{IdentityHandle, ImageRef, LogicalId, StackConfig};
use skyport_template::Template;

use crate::assembly;

pub fn validate(config_path: &str) -> anyhow::Result<()> {
    let config = StackConfig::from_file(Path::new(config_path))?;
    check(&config)?;
    println!("✓ {config_path} is valid (stack '{}')", config.stack.name);
    Ok(())
}

/// Build the service props and run the orchestrator's preconditions against
/// a scratch network and cluster. Nothing is synthesized.
fn check(config: &StackConfig) -> anyhow::Result<()> {
    let mut scratch = Template::new(&config.stack.name);
    let network = skyport_network::provision(&mut scratch, &assembly::network_options(config))
        .context("checking network")?;
    let cluster = skyport_compute::cluster::provision(
        &mut scratch,
        assembly::COMPUTE_SCOPE,
        &network,
        &assembly::cluster_options(config),
    )
    .context("checking cluster")?;

    // The repository and identities only matter once resources are declared.
    let image = ImageRef::from_repository("validate", "latest");
    let container = assembly::container_spec(config, image, None)?;
    let deployment = assembly::deployment_config(
        config,
        Some(IdentityHandle::new(LogicalId::from_path(&["identity", "executionRole"]))),
        Some(IdentityHandle::new(LogicalId::from_path(&["identity", "taskRole"]))),
    )?;
    let props = assembly::service_props(config, container, deployment);

    ServiceOrchestrator::new(cluster).check(&props)?;
    Ok(())
}
