//! Cluster provisioner. A pure factory: no policy lives here.

use skyport_core::NetworkHandle;
use skyport_template::{Cluster, Declared, ProvisioningResult, Template};
use tracing::info;

/// Capacity providers every cluster is created with.
const SERVERLESS_CAPACITY_PROVIDERS: &[&str] = &["FARGATE", "FARGATE_SPOT"];

/// Naming and observability options for a cluster.
#[derive(Debug, Clone, Default)]
pub struct ClusterOptions {
    pub cluster_name: Option<String>,
    pub container_insights: bool,
    /// Default service-discovery namespace.
    pub default_namespace: Option<String>,
}

/// A declared cluster together with the network it is bound to.
#[derive(Debug, Clone)]
pub struct ClusterHandle {
    /// Construct scope that resources added to this cluster are declared under.
    pub scope: String,
    pub cluster: Declared<Cluster>,
    pub network: NetworkHandle,
}

/// Declare a compute cluster bound to `network`.
///
/// Platform rejections (e.g. a cluster name already in use) are returned unmodified.
pub fn provision(
    template: &mut Template,
    scope: &str,
    network: &NetworkHandle,
    options: &ClusterOptions,
) -> ProvisioningResult<ClusterHandle> {
    let cluster = template.declare(
        scope,
        "cluster",
        Cluster {
            cluster_name: options.cluster_name.clone(),
            network: network.network.clone(),
            container_insights: options.container_insights,
            capacity_providers: SERVERLESS_CAPACITY_PROVIDERS.iter().map(|p| p.to_string()).collect(),
            default_namespace: options.default_namespace.clone(),
        },
    )?;

    info!(
        cluster = %cluster.logical_id,
        name = options.cluster_name.as_deref().unwrap_or("<generated>"),
        "cluster declared"
    );

    Ok(ClusterHandle {
        scope: scope.to_string(),
        cluster,
        network: network.clone(),
    })
}
