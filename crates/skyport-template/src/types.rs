//! Resource records declared into a template.
//!
//! Each record is the full property set of one platform resource. Records
//! refer to one another by [`LogicalId`]; [`Resource::references`] lists
//! those edges so the template can reject dangling references.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use skyport_core::{ApplicationProtocol, ImageRef, LogicalId, Protocol};

/// Discriminant of a [`Resource`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Role,
    LogGroup,
    Network,
    Subnet,
    FlowLog,
    Cluster,
    SecurityGroup,
    TaskDefinition,
    LoadBalancer,
    Listener,
    TargetGroup,
    Service,
    ScalableTarget,
    ScalingPolicy,
}

impl ResourceKind {
    pub fn label(&self) -> &'static str {
        match self {
            ResourceKind::Role => "role",
            ResourceKind::LogGroup => "log group",
            ResourceKind::Network => "network",
            ResourceKind::Subnet => "subnet",
            ResourceKind::FlowLog => "flow log",
            ResourceKind::Cluster => "cluster",
            ResourceKind::SecurityGroup => "security group",
            ResourceKind::TaskDefinition => "task definition",
            ResourceKind::LoadBalancer => "load balancer",
            ResourceKind::Listener => "listener",
            ResourceKind::TargetGroup => "target group",
            ResourceKind::Service => "service",
            ResourceKind::ScalableTarget => "scalable target",
            ResourceKind::ScalingPolicy => "scaling policy",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Any declarable resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "properties", rename_all = "snake_case")]
pub enum Resource {
    Role(Role),
    LogGroup(LogGroup),
    Network(Network),
    Subnet(Subnet),
    FlowLog(FlowLog),
    Cluster(Cluster),
    SecurityGroup(SecurityGroup),
    TaskDefinition(TaskDefinition),
    LoadBalancer(LoadBalancer),
    Listener(Listener),
    TargetGroup(TargetGroup),
    Service(Service),
    ScalableTarget(ScalableTarget),
    ScalingPolicy(ScalingPolicy),
}

impl Resource {
    pub fn kind(&self) -> ResourceKind {
        match self {
            Resource::Role(_) => ResourceKind::Role,
            Resource::LogGroup(_) => ResourceKind::LogGroup,
            Resource::Network(_) => ResourceKind::Network,
            Resource::Subnet(_) => ResourceKind::Subnet,
            Resource::FlowLog(_) => ResourceKind::FlowLog,
            Resource::Cluster(_) => ResourceKind::Cluster,
            Resource::SecurityGroup(_) => ResourceKind::SecurityGroup,
            Resource::TaskDefinition(_) => ResourceKind::TaskDefinition,
            Resource::LoadBalancer(_) => ResourceKind::LoadBalancer,
            Resource::Listener(_) => ResourceKind::Listener,
            Resource::TargetGroup(_) => ResourceKind::TargetGroup,
            Resource::Service(_) => ResourceKind::Service,
            Resource::ScalableTarget(_) => ResourceKind::ScalableTarget,
            Resource::ScalingPolicy(_) => ResourceKind::ScalingPolicy,
        }
    }

    /// Explicit physical name, which must be unique per kind.
    pub fn physical_name(&self) -> Option<&str> {
        match self {
            Resource::Role(r) => r.role_name.as_deref(),
            Resource::LogGroup(l) => l.log_group_name.as_deref(),
            Resource::Cluster(c) => c.cluster_name.as_deref(),
            Resource::LoadBalancer(lb) => lb.load_balancer_name.as_deref(),
            _ => None,
        }
    }

    /// Every resource this one points at, with the kind it must have.
    pub fn references(&self) -> Vec<(&LogicalId, ResourceKind)> {
        let mut refs = Vec::new();
        match self {
            Resource::Role(_) | Resource::LogGroup(_) | Resource::Network(_) => {}
            Resource::Subnet(s) => refs.push((&s.network, ResourceKind::Network)),
            Resource::FlowLog(f) => {
                refs.push((&f.network, ResourceKind::Network));
                refs.push((&f.log_group, ResourceKind::LogGroup));
                refs.push((&f.role, ResourceKind::Role));
            }
            Resource::Cluster(c) => refs.push((&c.network, ResourceKind::Network)),
            Resource::SecurityGroup(sg) => {
                refs.push((&sg.network, ResourceKind::Network));
                for rule in &sg.ingress {
                    if let Peer::SecurityGroup(id) = &rule.peer {
                        refs.push((id, ResourceKind::SecurityGroup));
                    }
                }
            }
            Resource::TaskDefinition(td) => {
                refs.extend(td.execution_role.iter().map(|id| (id, ResourceKind::Role)));
                refs.extend(td.task_role.iter().map(|id| (id, ResourceKind::Role)));
                for container in &td.containers {
                    if let Some(logging) = &container.logging {
                        refs.push((&logging.log_group, ResourceKind::LogGroup));
                    }
                }
            }
            Resource::LoadBalancer(lb) => {
                refs.extend(lb.security_groups.iter().map(|id| (id, ResourceKind::SecurityGroup)));
                refs.extend(lb.subnets.iter().map(|id| (id, ResourceKind::Subnet)));
            }
            Resource::Listener(l) => {
                refs.push((&l.load_balancer, ResourceKind::LoadBalancer));
                if let Some(ListenerAction::Forward { target_groups }) = &l.default_action {
                    refs.extend(target_groups.iter().map(|id| (id, ResourceKind::TargetGroup)));
                }
            }
            Resource::TargetGroup(tg) => {
                refs.push((&tg.network, ResourceKind::Network));
                refs.extend(tg.listener.iter().map(|id| (id, ResourceKind::Listener)));
                for target in &tg.targets {
                    refs.push((&target.service, ResourceKind::Service));
                }
            }
            Resource::Service(svc) => {
                refs.push((&svc.cluster, ResourceKind::Cluster));
                refs.push((&svc.task_definition, ResourceKind::TaskDefinition));
                refs.extend(svc.subnets.iter().map(|id| (id, ResourceKind::Subnet)));
                refs.extend(svc.security_groups.iter().map(|id| (id, ResourceKind::SecurityGroup)));
                for lb in &svc.load_balancers {
                    refs.push((&lb.target_group, ResourceKind::TargetGroup));
                }
            }
            Resource::ScalableTarget(st) => {
                refs.push((&st.cluster, ResourceKind::Cluster));
                refs.push((&st.service, ResourceKind::Service));
                refs.push((&st.role, ResourceKind::Role));
            }
            Resource::ScalingPolicy(p) => refs.push((&p.scaling_target, ResourceKind::ScalableTarget)),
        }
        refs
    }
}

// ── Identity and logging ──────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Effect {
    Allow,
    Deny,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyStatement {
    pub effect: Effect,
    pub actions: Vec<String>,
    pub resources: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PolicyDocument {
    pub statements: Vec<PolicyStatement>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub role_name: Option<String>,
    /// Service principal allowed to assume this role.
    pub assumed_by: String,
    pub description: Option<String>,
    pub managed_policies: Vec<String>,
    pub inline_policies: BTreeMap<String, PolicyDocument>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogGroup {
    pub log_group_name: Option<String>,
    pub retention_days: u32,
}

// ── Network ───────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Network {
    pub cidr: String,
    pub enable_dns_support: bool,
    pub enable_dns_hostnames: bool,
    pub max_azs: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subnet {
    pub network: LogicalId,
    pub name: String,
    pub cidr: String,
    pub availability_zone: String,
    pub public: bool,
    pub map_public_ip_on_launch: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrafficType {
    Accept,
    Reject,
    All,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowLog {
    pub network: LogicalId,
    pub log_group: LogicalId,
    pub role: LogicalId,
    pub traffic_type: TrafficType,
}

// ── Compute ───────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cluster {
    pub cluster_name: Option<String>,
    pub network: LogicalId,
    pub container_insights: bool,
    pub capacity_providers: Vec<String>,
    pub default_namespace: Option<String>,
}

/// Traffic source of an ingress rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Peer {
    AnyIpv4,
    Cidr(String),
    SecurityGroup(LogicalId),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngressRule {
    pub peer: Peer,
    pub protocol: Protocol,
    pub port: u16,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityGroup {
    pub description: String,
    pub network: LogicalId,
    pub allow_all_outbound: bool,
    pub ingress: Vec<IngressRule>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Compatibility {
    Ec2,
    #[default]
    Fargate,
    Ec2AndFargate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NetworkMode {
    #[default]
    AwsVpc,
    Bridge,
    Host,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortMapping {
    pub container_port: u16,
    pub host_port: Option<u16>,
    pub protocol: Protocol,
}

impl PortMapping {
    pub fn tcp(container_port: u16) -> Self {
        Self {
            container_port,
            host_port: None,
            protocol: Protocol::Tcp,
        }
    }
}

/// Container-level health probe run by the container agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerHealthCheck {
    pub command: Vec<String>,
    pub interval_secs: u64,
    pub timeout_secs: u64,
    pub retries: u32,
    pub start_period_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogConfiguration {
    pub log_group: LogicalId,
    pub stream_prefix: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerDefinition {
    pub name: String,
    pub image: ImageRef,
    pub cpu: Option<u32>,
    pub memory_limit_mib: Option<u32>,
    pub memory_reservation_mib: Option<u32>,
    pub port_mappings: Vec<PortMapping>,
    pub health_check: Option<ContainerHealthCheck>,
    pub environment: BTreeMap<String, String>,
    pub logging: Option<LogConfiguration>,
    pub command: Vec<String>,
    pub essential: bool,
    pub privileged: bool,
    pub start_timeout_secs: Option<u64>,
    pub stop_timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskDefinition {
    pub family: Option<String>,
    pub compatibility: Compatibility,
    pub network_mode: NetworkMode,
    /// Task-level CPU units.
    pub cpu: Option<u32>,
    /// Task-level memory in MiB.
    pub memory_mib: Option<u32>,
    pub execution_role: Option<LogicalId>,
    pub task_role: Option<LogicalId>,
    pub placement_constraints: Vec<String>,
    pub inference_accelerators: Vec<String>,
    pub ipc_mode: Option<String>,
    pub pid_mode: Option<String>,
    pub containers: Vec<ContainerDefinition>,
}

// ── Routing ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IpAddressType {
    #[default]
    Ipv4,
    DualStack,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadBalancer {
    pub load_balancer_name: Option<String>,
    pub internet_facing: bool,
    pub ip_address_type: IpAddressType,
    pub http2_enabled: bool,
    pub idle_timeout_secs: Option<u32>,
    pub security_groups: Vec<LogicalId>,
    pub subnets: Vec<LogicalId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListenerAction {
    Forward {
        target_groups: Vec<LogicalId>,
    },
    FixedResponse {
        status_code: u16,
        content_type: Option<String>,
        message_body: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Listener {
    pub load_balancer: LogicalId,
    pub port: u16,
    pub protocol: ApplicationProtocol,
    pub default_action: Option<ListenerAction>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProtocolVersion {
    #[default]
    Http1,
    Http2,
    Grpc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetType {
    #[default]
    Ip,
    Instance,
}

/// Load-balancer health check of a target group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthCheck {
    pub enabled: bool,
    pub path: String,
    pub port: String,
    pub protocol: ApplicationProtocol,
    /// Inclusive status-code range, e.g. "200-299".
    pub healthy_http_codes: String,
    pub healthy_threshold: u32,
    pub unhealthy_threshold: u32,
    pub interval_secs: u64,
    pub timeout_secs: u64,
}

/// A service container registered behind a target group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceTarget {
    pub service: LogicalId,
    pub container_name: String,
    pub container_port: u16,
    pub protocol: Protocol,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetGroup {
    pub network: LogicalId,
    pub port: u16,
    pub protocol: ApplicationProtocol,
    pub protocol_version: ProtocolVersion,
    pub target_type: TargetType,
    pub deregistration_delay_secs: u64,
    pub health_check: HealthCheck,
    /// Listener this group is registered under.
    pub listener: Option<LogicalId>,
    pub targets: Vec<ServiceTarget>,
}

// ── Service ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlatformVersion {
    #[default]
    Latest,
    Version1_4_0,
}

/// Opaque, externally defined deployment controller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControllerDescriptor {
    #[serde(rename = "type")]
    pub controller_type: String,
    #[serde(flatten)]
    pub settings: BTreeMap<String, serde_json::Value>,
}

impl ControllerDescriptor {
    pub fn new(controller_type: &str) -> Self {
        Self {
            controller_type: controller_type.to_string(),
            settings: BTreeMap::new(),
        }
    }
}

/// Who drives replacement of running tasks when the task definition changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DeploymentController {
    /// Platform-managed rolling update.
    Rolling,
    /// Externally controlled cutover (blue/green).
    External,
    /// Caller-supplied descriptor, passed through verbatim.
    Custom { descriptor: ControllerDescriptor },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceLoadBalancer {
    pub target_group: LogicalId,
    pub container_name: String,
    pub container_port: u16,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Service {
    pub cluster: LogicalId,
    pub task_definition: LogicalId,
    pub desired_count: u32,
    pub assign_public_ip: bool,
    pub subnets: Vec<LogicalId>,
    pub security_groups: Vec<LogicalId>,
    pub health_check_grace_period_secs: u64,
    pub platform_version: PlatformVersion,
    pub deployment_controller: DeploymentController,
    pub load_balancers: Vec<ServiceLoadBalancer>,
}

// ── Scaling ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScalableDimension {
    ServiceDesiredCount,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScalableTarget {
    pub cluster: LogicalId,
    pub service: LogicalId,
    pub dimension: ScalableDimension,
    pub min_capacity: u32,
    pub max_capacity: u32,
    pub role: LogicalId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PredefinedMetric {
    ServiceAverageCpuUtilization,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalingPolicy {
    pub scaling_target: LogicalId,
    pub predefined_metric: PredefinedMetric,
    /// Target utilization, in percent.
    pub target_value: f64,
    pub scale_in_cooldown_secs: u64,
    pub scale_out_cooldown_secs: u64,
}
