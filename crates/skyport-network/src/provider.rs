//! Default network provisioning.

use std::collections::BTreeMap;

use skyport_core::{LogicalId, NetworkHandle, SubnetGroup, SubnetRef};
use skyport_template::{
    Effect, FlowLog, LogGroup, Network, PolicyDocument, PolicyStatement, ProvisioningError,
    ProvisioningResult, ResourceKind, Role, Subnet, Template, TrafficType,
};
use tracing::{debug, info, trace};

use crate::cidr::Ipv4Block;

const SCOPE: &str = "vpc";
const FLOW_LOGS_PRINCIPAL: &str = "vpc-flow-logs.amazonaws.com";

/// Flow-log capture settings.
#[derive(Debug, Clone)]
pub struct FlowLogOptions {
    pub traffic_type: TrafficType,
    pub retention_days: u32,
}

impl Default for FlowLogOptions {
    fn default() -> Self {
        Self {
            traffic_type: TrafficType::Reject,
            retention_days: 1,
        }
    }
}

/// Options for the default network.
#[derive(Debug, Clone)]
pub struct NetworkOptions {
    pub cidr: String,
    /// Zones available in the target region, in preference order.
    pub availability_zones: Vec<String>,
    /// Number of zones to span. Defaults to every listed zone.
    pub max_azs: Option<usize>,
    pub subnet_mask: u8,
    pub private_subnets: bool,
    pub flow_logs: Option<FlowLogOptions>,
}

impl Default for NetworkOptions {
    fn default() -> Self {
        Self {
            cidr: "10.0.0.0/16".to_string(),
            availability_zones: vec!["us-east-1a".to_string(), "us-east-1b".to_string()],
            max_azs: None,
            subnet_mask: 24,
            private_subnets: false,
            flow_logs: Some(FlowLogOptions::default()),
        }
    }
}

/// Declare the default network and return its handle.
///
/// The subnet layout is computed before anything is declared, so a CIDR
/// that cannot hold the requested subnets leaves the template untouched.
pub fn provision(template: &mut Template, options: &NetworkOptions) -> ProvisioningResult<NetworkHandle> {
    let network_id = LogicalId::from_path(&[SCOPE, "appVpc"]);
    let invalid = |reason: String| ProvisioningError::InvalidProperty {
        kind: ResourceKind::Network,
        logical_id: network_id.clone(),
        reason,
    };

    let block: Ipv4Block = options.cidr.parse().map_err(invalid)?;
    let az_count = options.max_azs.unwrap_or(options.availability_zones.len());
    if az_count == 0 {
        return Err(invalid("at least one availability zone is required".to_string()));
    }
    if az_count > options.availability_zones.len() {
        return Err(invalid(format!(
            "{az_count} availability zones requested, {} available",
            options.availability_zones.len()
        )));
    }
    let zones = &options.availability_zones[..az_count];

    let groups = if options.private_subnets { 2 } else { 1 };
    let mut layout = Vec::with_capacity(az_count * groups);
    for index in 0..(az_count * groups) as u32 {
        layout.push(block.subnet(options.subnet_mask, index).map_err(invalid)?);
    }
    trace!(cidr = %block, subnets = layout.len(), "computed subnet layout");

    // Flow-log plumbing comes first so the network can reference it.
    let flow_log_sink = match &options.flow_logs {
        Some(flow) => Some((declare_flow_log_sink(template, flow)?, flow.traffic_type)),
        None => None,
    };

    let network = template.declare(
        SCOPE,
        "appVpc",
        Network {
            cidr: block.to_string(),
            enable_dns_support: true,
            enable_dns_hostnames: true,
            max_azs: az_count,
        },
    )?;

    let mut public = SubnetGroup::default();
    let mut private = SubnetGroup::default();
    for (group, is_public) in [(&mut public, true), (&mut private, false)] {
        if !is_public && !options.private_subnets {
            continue;
        }
        let offset = if is_public { 0 } else { az_count };
        for (i, zone) in zones.iter().enumerate() {
            let name = if is_public {
                format!("publicSubnet{}", i + 1)
            } else {
                format!("privateSubnet{}", i + 1)
            };
            let cidr = layout[offset + i].to_string();
            let subnet = template.declare(
                SCOPE,
                &name,
                Subnet {
                    network: network.logical_id.clone(),
                    name: name.clone(),
                    cidr: cidr.clone(),
                    availability_zone: zone.clone(),
                    public: is_public,
                    map_public_ip_on_launch: is_public,
                },
            )?;
            trace!(subnet = %subnet.logical_id, az = %zone, %cidr, "declared subnet");
            group.subnets.push(SubnetRef {
                logical_id: subnet.logical_id,
                availability_zone: zone.clone(),
                cidr,
            });
        }
    }

    if let Some(((role, log_group), traffic_type)) = flow_log_sink {
        template.declare(
            SCOPE,
            "flowLog",
            FlowLog {
                network: network.logical_id.clone(),
                log_group,
                role,
                traffic_type,
            },
        )?;
        debug!(network = %network.logical_id, "flow log attached");
    }

    info!(
        network = %network.logical_id,
        cidr = %block,
        azs = az_count,
        public = public.len(),
        private = private.len(),
        "network declared"
    );

    Ok(NetworkHandle {
        network: network.logical_id,
        cidr: block.to_string(),
        public_subnets: public,
        private_subnets: private,
        availability_zones: zones.to_vec(),
    })
}

/// Declare the role and log group flow logs are delivered through.
fn declare_flow_log_sink(
    template: &mut Template,
    flow: &FlowLogOptions,
) -> ProvisioningResult<(LogicalId, LogicalId)> {
    let mut inline_policies = BTreeMap::new();
    inline_policies.insert(
        "loggingPolicy".to_string(),
        PolicyDocument {
            statements: vec![PolicyStatement {
                effect: Effect::Allow,
                actions: [
                    "logs:CreateLogGroup",
                    "logs:CreateLogStream",
                    "logs:PutLogEvents",
                    "logs:DescribeLogGroups",
                    "logs:DescribeLogStreams",
                ]
                .iter()
                .map(|a| a.to_string())
                .collect(),
                resources: vec!["*".to_string()],
            }],
        },
    );

    let role = template.declare(
        SCOPE,
        "flowLogsRole",
        Role {
            role_name: None,
            assumed_by: FLOW_LOGS_PRINCIPAL.to_string(),
            description: Some("Role allowing flow logs output to the log service".to_string()),
            managed_policies: Vec::new(),
            inline_policies,
        },
    )?;

    let log_group = template.declare(
        SCOPE,
        "flowLogsLogGroup",
        LogGroup {
            log_group_name: None,
            retention_days: flow.retention_days,
        },
    )?;

    Ok((role.logical_id, log_group.logical_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use skyport_template::Declared;

    fn zones(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("az-{i}")).collect()
    }

    #[test]
    fn default_network_spans_every_zone() {
        let mut template = Template::new("test");
        let handle = provision(&mut template, &NetworkOptions::default()).unwrap();

        assert_eq!(handle.availability_zones.len(), 2);
        assert_eq!(handle.public_subnets.len(), 2);
        assert!(handle.private_subnets.is_empty());
        assert_eq!(handle.public_subnets.subnets[0].cidr, "10.0.0.0/24");
        assert_eq!(handle.public_subnets.subnets[1].cidr, "10.0.1.0/24");

        assert_eq!(template.count(ResourceKind::Network), 1);
        assert_eq!(template.count(ResourceKind::Subnet), 2);
        assert_eq!(template.count(ResourceKind::FlowLog), 1);
        assert_eq!(template.count(ResourceKind::Role), 1);
        assert_eq!(template.count(ResourceKind::LogGroup), 1);

        let flow: Vec<Declared<FlowLog>> = template.list();
        assert_eq!(flow[0].properties.traffic_type, TrafficType::Reject);
    }

    #[test]
    fn max_azs_limits_zones() {
        let mut template = Template::new("test");
        let options = NetworkOptions {
            availability_zones: zones(3),
            max_azs: Some(2),
            ..Default::default()
        };
        let handle = provision(&mut template, &options).unwrap();
        assert_eq!(handle.availability_zones, vec!["az-0".to_string(), "az-1".to_string()]);
        assert_eq!(handle.public_subnets.availability_zones(), handle.availability_zones);
    }

    #[test]
    fn private_groups_never_overlap_public() {
        let mut template = Template::new("test");
        let options = NetworkOptions {
            availability_zones: zones(3),
            private_subnets: true,
            ..Default::default()
        };
        let handle = provision(&mut template, &options).unwrap();
        assert_eq!(handle.private_subnets.len(), 3);

        for p in &handle.public_subnets.subnets {
            let a: Ipv4Block = p.cidr.parse().unwrap();
            for q in &handle.private_subnets.subnets {
                let b: Ipv4Block = q.cidr.parse().unwrap();
                assert!(!a.overlaps(&b), "{} overlaps {}", p.cidr, q.cidr);
                assert_ne!(p.logical_id, q.logical_id);
            }
        }
    }

    #[test]
    fn too_many_zones_requested() {
        let mut template = Template::new("test");
        let options = NetworkOptions {
            max_azs: Some(5),
            ..Default::default()
        };
        let err = provision(&mut template, &options).unwrap_err();
        assert!(matches!(err, ProvisioningError::InvalidProperty { kind: ResourceKind::Network, .. }));
        assert!(template.is_empty());
    }

    #[test]
    fn exhausted_cidr_declares_nothing() {
        let mut template = Template::new("test");
        let options = NetworkOptions {
            cidr: "10.0.0.0/24".to_string(),
            availability_zones: zones(3),
            subnet_mask: 25,
            ..Default::default()
        };
        assert!(provision(&mut template, &options).is_err());
        assert!(template.is_empty());
    }

    #[test]
    fn flow_logs_optional() {
        let mut template = Template::new("test");
        let options = NetworkOptions {
            flow_logs: None,
            ..Default::default()
        };
        provision(&mut template, &options).unwrap();
        assert_eq!(template.count(ResourceKind::FlowLog), 0);
        assert_eq!(template.count(ResourceKind::Role), 0);
    }
}
