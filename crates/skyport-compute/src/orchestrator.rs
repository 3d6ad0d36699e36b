//! Service orchestrator.
//!
//! [`ServiceOrchestrator::add_service`] wires a container into a cluster as
//! a load-balanced, auto-scaled service. All preconditions are checked before
//! the first declaration; after that the steps run strictly in order and a
//! failing step leaves earlier declarations in place.

use skyport_core::{ApplicationProtocol, IdentityHandle, LogicalId, NetworkHandle, SubnetSelection};
use skyport_template::{
    Declared, Listener, ListenerAction, LoadBalancer, PlatformVersion, ProvisioningResult,
    SecurityGroup, Service, ServiceLoadBalancer, ServiceTarget, TargetGroup, TaskDefinition,
    Template,
};
use tracing::{error, info, info_span, trace, warn};

use crate::cluster::ClusterHandle;
use crate::container::ContainerSpec;
use crate::deployment::{DeploymentConfig, DeploymentStrategy};
use crate::error::{ConfigurationError, OrchestrationResult};
use crate::observer::{EventLevel, ProvisionEvent, ProvisionObserver, Step};
use crate::routing::{self, LoadBalancerProps};
use crate::scaling::{self, ScalingHandles};
use crate::security;
use crate::task::{self, TaskDefinitionProps};

/// Scope name used when the caller does not pick one.
pub const DEFAULT_SERVICE_NAME: &str = "webServer";

const HEALTH_CHECK_GRACE_PERIOD_SECS: u64 = 120;

/// Everything `add_service` needs, fully built before the call.
#[derive(Debug, Clone)]
pub struct ServiceProps {
    /// Prefix of every resource declared for this service.
    pub name: String,
    pub container: ContainerSpec,
    pub task: TaskDefinitionProps,
    pub load_balancer: LoadBalancerProps,
    pub deployment: DeploymentConfig,
}

impl ServiceProps {
    /// Props for a service named [`DEFAULT_SERVICE_NAME`] on the smallest
    /// serverless task size.
    pub fn new(container: ContainerSpec, deployment: DeploymentConfig) -> Self {
        Self {
            name: DEFAULT_SERVICE_NAME.to_string(),
            container,
            task: TaskDefinitionProps::serverless_default(),
            load_balancer: LoadBalancerProps::default(),
            deployment,
        }
    }

    /// Checks that need neither a cluster nor a template: service name,
    /// capacity bounds, custom controller, target port and listener ports.
    pub fn check(&self) -> Result<(), ConfigurationError> {
        let deployment = &self.deployment;
        if !self.name.chars().any(|c| c.is_ascii_alphanumeric()) {
            return Err(ConfigurationError::InvalidServiceName(self.name.clone()));
        }
        deployment.check_bounds()?;

        if let DeploymentStrategy::Custom(descriptor) = &deployment.strategy
            && descriptor.controller_type.trim().is_empty()
        {
            return Err(ConfigurationError::EmptyCustomController);
        }

        if !self.container.exposes(deployment.container_port) {
            return Err(ConfigurationError::TargetPortNotExposed {
                container: self
                    .container
                    .name()
                    .unwrap_or(task::DEFAULT_CONTAINER_NAME)
                    .to_string(),
                port: deployment.container_port,
            });
        }

        let (production, _) = deployment.production_listener();
        if let Some((port, _)) = deployment.test_listener()
            && port == production
        {
            return Err(ConfigurationError::ListenerPortConflict(port));
        }
        Ok(())
    }
}

/// Handles of everything declared by one `add_service` call.
#[derive(Debug, Clone)]
pub struct ServiceOrchestrationResult {
    pub container_name: String,
    pub load_balancer_security_group: Declared<SecurityGroup>,
    pub service_security_group: Declared<SecurityGroup>,
    pub task_definition: Declared<TaskDefinition>,
    pub load_balancer: Declared<LoadBalancer>,
    pub production_listener: Declared<Listener>,
    pub production_target_group: Declared<TargetGroup>,
    pub test_listener: Option<Declared<Listener>>,
    pub test_target_group: Option<Declared<TargetGroup>>,
    pub service: Declared<Service>,
    pub scaling: ScalingHandles,
}

impl ServiceOrchestrationResult {
    pub fn listeners(&self) -> Vec<&Declared<Listener>> {
        std::iter::once(&self.production_listener)
            .chain(self.test_listener.as_ref())
            .collect()
    }

    pub fn target_groups(&self) -> Vec<&Declared<TargetGroup>> {
        std::iter::once(&self.production_target_group)
            .chain(self.test_target_group.as_ref())
            .collect()
    }
}

/// Inputs resolved by the precondition pass.
struct Plan<'a> {
    name: &'a str,
    execution: &'a IdentityHandle,
    task: &'a IdentityHandle,
    production: (u16, ApplicationProtocol),
    test: Option<(u16, ApplicationProtocol)>,
    load_balancer_subnets: Vec<LogicalId>,
    task_subnets: Vec<LogicalId>,
}

/// Adds services to one cluster.
pub struct ServiceOrchestrator {
    cluster: ClusterHandle,
    observer: Option<ProvisionObserver>,
}

impl ServiceOrchestrator {
    pub fn new(cluster: ClusterHandle) -> Self {
        Self {
            cluster,
            observer: None,
        }
    }

    /// Install a callback receiving every event of subsequent `add_service` calls.
    pub fn with_observer(mut self, observer: ProvisionObserver) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn cluster(&self) -> &ClusterHandle {
        &self.cluster
    }

    /// Declare a load-balanced, auto-scaled service running `props.container`.
    pub fn add_service(
        &self,
        template: &mut Template,
        props: &ServiceProps,
    ) -> OrchestrationResult<ServiceOrchestrationResult> {
        let span = info_span!(
            "add_service",
            service = %props.name,
            strategy = props.deployment.strategy.label()
        );
        let _enter = span.enter();
        let events = Events {
            service: &props.name,
            observer: self.observer.as_ref(),
        };

        let plan = match self.preconditions(props) {
            Ok(plan) => plan,
            Err(err) => {
                events.emit(EventLevel::Error, Step::Preconditions, None, err.to_string());
                return Err(err.into());
            }
        };
        events.emit(
            EventLevel::Trace,
            Step::Preconditions,
            None,
            "preconditions satisfied",
        );

        let scope = self.cluster.scope.as_str();
        let name = plan.name;
        let deployment = &props.deployment;
        let network = &self.cluster.network.network;

        // 1. Security boundaries.
        let mut listener_ports = vec![plan.production.0];
        listener_ports.extend(plan.test.map(|(port, _)| port));
        let boundaries = events.step(
            Step::SecurityBoundaries,
            security::declare_boundaries(
                template,
                scope,
                name,
                network,
                &listener_ports,
                deployment.container_port,
            ),
        )?;
        events.declared(Step::SecurityBoundaries, &boundaries.load_balancer.logical_id, "load balancer security group");
        events.declared(Step::SecurityBoundaries, &boundaries.service.logical_id, "service security group");

        // 2. Task definition.
        let assembly = task::assemble(&props.task, plan.execution, plan.task, &props.container);
        for field in &assembly.overridden {
            events.emit(
                EventLevel::Warn,
                Step::TaskDefinition,
                None,
                format!("caller-supplied {field} replaced by the serverless default"),
            );
        }
        let container_name = assembly.container_name;
        let task_definition = events.step(
            Step::TaskDefinition,
            template.declare(scope, &format!("{name}TaskDefinition"), assembly.definition),
        )?;
        events.declared(Step::TaskDefinition, &task_definition.logical_id, "task definition");

        // 3. Load balancer and production listener. The listener's action is
        // attached in step 5 once its target group exists.
        let load_balancer = events.step(
            Step::LoadBalancer,
            routing::declare_load_balancer(
                template,
                scope,
                name,
                &props.load_balancer,
                &boundaries.load_balancer.logical_id,
                plan.load_balancer_subnets,
            ),
        )?;
        events.declared(Step::LoadBalancer, &load_balancer.logical_id, "load balancer");
        let production_listener = events.step(
            Step::LoadBalancer,
            routing::declare_listener(
                template,
                scope,
                &format!("{name}ProductionListener"),
                &load_balancer.logical_id,
                plan.production,
                None,
            ),
        )?;
        events.declared(Step::LoadBalancer, &production_listener.logical_id, "production listener");

        // 4. Service.
        let service = events.step(
            Step::Service,
            template.declare(
                scope,
                &format!("{name}Service"),
                Service {
                    cluster: self.cluster.cluster.logical_id.clone(),
                    task_definition: task_definition.logical_id.clone(),
                    desired_count: deployment.desired_count,
                    assign_public_ip: deployment.assign_public_ip,
                    subnets: plan.task_subnets,
                    security_groups: vec![boundaries.service.logical_id.clone()],
                    health_check_grace_period_secs: HEALTH_CHECK_GRACE_PERIOD_SECS,
                    platform_version: PlatformVersion::Latest,
                    deployment_controller: deployment.strategy.controller(),
                    load_balancers: Vec::new(),
                },
            ),
        )?;
        events.declared(Step::Service, &service.logical_id, "service");
        if let DeploymentStrategy::Custom(descriptor) = &deployment.strategy {
            events.emit(
                EventLevel::Warn,
                Step::Service,
                Some(&service.logical_id),
                format!(
                    "custom deployment controller '{}' is not checked against the single-listener topology",
                    descriptor.controller_type
                ),
            );
        }

        // 5. Production target group.
        if deployment.health_check_path != "/" {
            events.emit(
                EventLevel::Warn,
                Step::ProductionTargetGroup,
                None,
                format!(
                    "health check path '{}' ignored, target groups probe '/'",
                    deployment.health_check_path
                ),
            );
        }
        let target = ServiceTarget {
            service: service.logical_id.clone(),
            container_name: container_name.clone(),
            container_port: deployment.container_port,
            protocol: skyport_core::Protocol::Tcp,
        };
        let production_target_group = events.step(
            Step::ProductionTargetGroup,
            routing::declare_target_group(
                template,
                scope,
                &format!("{name}ProductionTargetGroup"),
                network,
                deployment.container_port,
                &production_listener.logical_id,
                vec![target],
            ),
        )?;
        events.declared(
            Step::ProductionTargetGroup,
            &production_target_group.logical_id,
            "production target group",
        );
        let production_listener = events.step(
            Step::ProductionTargetGroup,
            template.amend::<Listener, _>(&production_listener.logical_id, |listener| {
                listener.default_action = Some(ListenerAction::Forward {
                    target_groups: vec![production_target_group.logical_id.clone()],
                });
            }),
        )?;
        let service = events.step(
            Step::ProductionTargetGroup,
            template.amend::<Service, _>(&service.logical_id, |svc| {
                svc.load_balancers.push(ServiceLoadBalancer {
                    target_group: production_target_group.logical_id.clone(),
                    container_name: container_name.clone(),
                    container_port: deployment.container_port,
                });
            }),
        )?;

        // 6. Test path, progressive only.
        let (test_listener, test_target_group) = match plan.test {
            Some(test) => {
                let listener = events.step(
                    Step::TestPath,
                    routing::declare_listener(
                        template,
                        scope,
                        &format!("{name}TestListener"),
                        &load_balancer.logical_id,
                        test,
                        Some(routing::placeholder_action()),
                    ),
                )?;
                events.declared(Step::TestPath, &listener.logical_id, "test listener");
                let target_group = events.step(
                    Step::TestPath,
                    routing::declare_target_group(
                        template,
                        scope,
                        &format!("{name}TestTargetGroup"),
                        network,
                        deployment.container_port,
                        &listener.logical_id,
                        Vec::new(),
                    ),
                )?;
                events.declared(Step::TestPath, &target_group.logical_id, "test target group");
                (Some(listener), Some(target_group))
            }
            None => {
                events.emit(
                    EventLevel::Trace,
                    Step::TestPath,
                    None,
                    format!("no test path for {} strategy", deployment.strategy.label()),
                );
                (None, None)
            }
        };

        // 7. Auto scaling.
        let scaling = events.step(
            Step::AutoScaling,
            scaling::attach(
                template,
                scope,
                name,
                &self.cluster.cluster.logical_id,
                &service.logical_id,
                deployment.min_capacity,
                deployment.max_capacity,
            ),
        )?;
        events.declared(Step::AutoScaling, &scaling.role.logical_id, "scaling role");
        events.declared(Step::AutoScaling, &scaling.target.logical_id, "scalable target");
        events.declared(Step::AutoScaling, &scaling.policy.logical_id, "cpu scaling policy");

        info!(
            service = %service.logical_id,
            listeners = 1 + usize::from(test_listener.is_some()),
            "service orchestrated"
        );

        Ok(ServiceOrchestrationResult {
            container_name,
            load_balancer_security_group: boundaries.load_balancer,
            service_security_group: boundaries.service,
            task_definition,
            load_balancer,
            production_listener,
            production_target_group,
            test_listener,
            test_target_group,
            service,
            scaling,
        })
    }

    /// Run every precondition of `add_service` against this cluster without
    /// declaring anything.
    pub fn check(&self, props: &ServiceProps) -> Result<(), ConfigurationError> {
        self.preconditions(props).map(|_| ())
    }

    fn preconditions<'a>(&self, props: &'a ServiceProps) -> Result<Plan<'a>, ConfigurationError> {
        let deployment = &props.deployment;
        let (execution, task) = deployment.identities()?;
        props.check()?;

        let network = &self.cluster.network;
        let load_balancer_subnets = resolve_subnets(network, &props.load_balancer.subnets, "load balancer")?;
        let task_subnets = resolve_subnets(network, &deployment.task_subnets, "task")?;

        Ok(Plan {
            name: &props.name,
            execution,
            task,
            production: deployment.production_listener(),
            test: deployment.test_listener(),
            load_balancer_subnets,
            task_subnets,
        })
    }
}

/// Event sink for one `add_service` call.
struct Events<'a> {
    service: &'a str,
    observer: Option<&'a ProvisionObserver>,
}

impl Events<'_> {
    fn step<T>(&self, step: Step, result: ProvisioningResult<T>) -> OrchestrationResult<T> {
        result.map_err(|err| {
            self.emit(EventLevel::Error, step, None, err.to_string());
            err.into()
        })
    }

    fn declared(&self, step: Step, logical_id: &LogicalId, what: &str) {
        self.emit(EventLevel::Info, step, Some(logical_id), format!("declared {what}"));
    }

    fn emit(&self, level: EventLevel, step: Step, logical_id: Option<&LogicalId>, message: impl Into<String>) {
        let message = message.into();
        let id = logical_id.map(LogicalId::as_str);
        match level {
            EventLevel::Trace => trace!(%step, logical_id = id, "{message}"),
            EventLevel::Info => info!(%step, logical_id = id, "{message}"),
            EventLevel::Warn => warn!(%step, logical_id = id, "{message}"),
            EventLevel::Error => error!(%step, logical_id = id, "{message}"),
        }
        if let Some(observer) = self.observer {
            observer(&ProvisionEvent {
                level,
                step,
                service: self.service.to_string(),
                message,
                logical_id: logical_id.cloned(),
            });
        }
    }
}

fn resolve_subnets(
    network: &NetworkHandle,
    selection: &SubnetSelection,
    what: &'static str,
) -> Result<Vec<LogicalId>, ConfigurationError> {
    match network.select(selection) {
        None => Err(ConfigurationError::UnknownSubnet { what }),
        Some(subnets) if subnets.is_empty() => Err(ConfigurationError::EmptySubnetSelection { what }),
        Some(subnets) => Ok(subnets),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use skyport_core::ImageRef;
    use skyport_network::NetworkOptions;
    use skyport_template::PortMapping;

    fn orchestrator(template: &mut Template) -> ServiceOrchestrator {
        let network = skyport_network::provision(template, &NetworkOptions::default()).unwrap();
        let cluster =
            crate::cluster::provision(template, "compute", &network, &Default::default()).unwrap();
        ServiceOrchestrator::new(cluster)
    }

    fn props() -> ServiceProps {
        let container = ContainerSpec::builder()
            .name("webServer")
            .image(ImageRef::from_repository("web", "develop"))
            .port_mapping(PortMapping::tcp(8080))
            .build()
            .unwrap();
        let deployment = DeploymentConfig {
            execution_identity: Some(IdentityHandle::new(LogicalId::from_path(&["exec"]))),
            task_identity: Some(IdentityHandle::new(LogicalId::from_path(&["task"]))),
            ..Default::default()
        };
        ServiceProps::new(container, deployment)
    }

    #[test]
    fn unexposed_target_port_rejected_before_declaring() {
        let mut template = Template::new("test");
        let orch = orchestrator(&mut template);
        let before = template.len();

        let mut props = props();
        props.deployment.container_port = 9090;
        let err = orch.add_service(&mut template, &props).unwrap_err();
        assert!(matches!(
            err,
            crate::OrchestrationError::Configuration(ConfigurationError::TargetPortNotExposed { port: 9090, .. })
        ));
        assert_eq!(template.len(), before);
    }

    #[test]
    fn test_port_equal_to_production_port_rejected() {
        let mut template = Template::new("test");
        let orch = orchestrator(&mut template);

        let mut props = props();
        props.deployment.strategy = DeploymentStrategy::Progressive;
        props.deployment.test_listener.port = Some(80);
        let err = orch.add_service(&mut template, &props).unwrap_err();
        assert!(matches!(
            err,
            crate::OrchestrationError::Configuration(ConfigurationError::ListenerPortConflict(80))
        ));
    }

    #[test]
    fn private_placement_without_private_subnets_rejected() {
        let mut template = Template::new("test");
        let orch = orchestrator(&mut template);

        let mut props = props();
        props.deployment.task_subnets = SubnetSelection::Private;
        let err = orch.add_service(&mut template, &props).unwrap_err();
        assert!(matches!(
            err,
            crate::OrchestrationError::Configuration(ConfigurationError::EmptySubnetSelection { what: "task" })
        ));
    }

    #[test]
    fn blank_service_name_rejected() {
        let mut template = Template::new("test");
        let orch = orchestrator(&mut template);

        let mut props = props();
        props.name = "--".to_string();
        assert!(orch.add_service(&mut template, &props).is_err());
    }

    #[test]
    fn new_props_carry_serverless_task_size() {
        let props = props();
        assert_eq!(props.task.cpu, Some(task::DEFAULT_TASK_CPU));
        assert_eq!(props.task.memory_mib, Some(task::DEFAULT_TASK_MEMORY_MIB));
        assert!(props.check().is_ok());
    }

    #[test]
    fn props_check_matches_add_service_preconditions() {
        let mut props = props();
        props.name = "--".to_string();
        assert!(matches!(props.check(), Err(ConfigurationError::InvalidServiceName(_))));

        let mut props = self::props();
        props.deployment.min_capacity = 3;
        assert!(matches!(props.check(), Err(ConfigurationError::MinExceedsMax { .. })));
    }

    #[test]
    fn orchestrator_check_declares_nothing() {
        let mut template = Template::new("test");
        let orch = orchestrator(&mut template);
        let before = template.len();

        assert!(orch.check(&props()).is_ok());

        let mut props = props();
        props.deployment.task_subnets = SubnetSelection::Private;
        assert!(matches!(
            orch.check(&props),
            Err(ConfigurationError::EmptySubnetSelection { what: "task" })
        ));

        props.deployment.task_identity = None;
        assert!(matches!(orch.check(&props), Err(ConfigurationError::MissingTaskIdentity)));
        assert_eq!(template.len(), before);
    }
}
