//! Two-tier security boundaries.
//!
//! The load-balancer boundary accepts listener traffic from anywhere. The
//! service boundary accepts container traffic only from the load-balancer
//! boundary, never from an address range.

use skyport_core::{LogicalId, Protocol};
use skyport_template::{Declared, IngressRule, Peer, ProvisioningResult, SecurityGroup, Template};

#[derive(Debug, Clone)]
pub struct SecurityBoundaries {
    pub load_balancer: Declared<SecurityGroup>,
    pub service: Declared<SecurityGroup>,
}

/// Declare the load-balancer and service boundaries for service `name`.
pub fn declare_boundaries(
    template: &mut Template,
    scope: &str,
    name: &str,
    network: &LogicalId,
    listener_ports: &[u16],
    container_port: u16,
) -> ProvisioningResult<SecurityBoundaries> {
    let load_balancer = template.declare(
        scope,
        &format!("{name}LoadBalancerSecurityGroup"),
        SecurityGroup {
            description: format!("{name} load balancer security group"),
            network: network.clone(),
            allow_all_outbound: true,
            ingress: listener_ports
                .iter()
                .map(|&port| IngressRule {
                    peer: Peer::AnyIpv4,
                    protocol: Protocol::Tcp,
                    port,
                    description: format!("allow calls to load balancer on {port}"),
                })
                .collect(),
        },
    )?;

    let service = template.declare(
        scope,
        &format!("{name}ServiceSecurityGroup"),
        SecurityGroup {
            description: format!("{name} task security group"),
            network: network.clone(),
            allow_all_outbound: true,
            ingress: vec![IngressRule {
                peer: Peer::SecurityGroup(load_balancer.logical_id.clone()),
                protocol: Protocol::Tcp,
                port: container_port,
                description: format!("allow calls to {name} from the load balancer"),
            }],
        },
    )?;

    Ok(SecurityBoundaries {
        load_balancer,
        service,
    })
}
