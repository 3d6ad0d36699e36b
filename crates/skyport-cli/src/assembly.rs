//! Top-level assembler: turns a `skyport.toml` into a populated template.
//!
//! Order: network, cluster, identities, log sink, container spec,
//! deployment config, then one `add_service` call. Every configuration
//! value is fully built before it is handed to the next component.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use anyhow::Context;
use skyport_compute::orchestrator::DEFAULT_SERVICE_NAME;
use skyport_compute::task::{DEFAULT_TASK_CPU, DEFAULT_TASK_MEMORY_MIB};
use skyport_compute::{
    ClusterHandle, ClusterOptions, ContainerSpec, DeploymentConfig, DeploymentStrategy, EventLevel,
    ListenerConfig, ProvisionEvent, ServiceOrchestrationResult, ServiceOrchestrator, ServiceProps,
};
use skyport_core::config::{StrategyKind, SubnetPlacement, duration_secs_or};
use skyport_core::{
    Capability, IdentityHandle, ImageRef, LogSinkHandle, NetworkHandle, StackConfig, SubnetSelection,
};
use skyport_network::{FlowLogOptions, NetworkOptions};
use skyport_template::{
    ContainerHealthCheck, ControllerDescriptor, Effect, LogGroup, PolicyDocument, PolicyStatement,
    PortMapping, Role, Template,
};
use tracing::{debug, info};

/// Environment variable holding the container image repository name.
pub const REPOSITORY_ENV: &str = "SKYPORT_WEBSERVER_REPOSITORY";

const TASK_PRINCIPAL: &str = "ecs-tasks.amazonaws.com";
const IDENTITY_SCOPE: &str = "identity";
pub(crate) const COMPUTE_SCOPE: &str = "compute";

const DEFAULT_CONTAINER_PORT: u16 = 8080;
const DEFAULT_IMAGE_TAG: &str = "develop";
const DEFAULT_LOG_RETENTION_DAYS: u32 = 1;

/// Everything the assembler declared.
pub struct Assembly {
    pub template: Template,
    pub network: NetworkHandle,
    pub cluster: ClusterHandle,
    pub service: ServiceOrchestrationResult,
    /// Warnings reported by the orchestrator.
    pub warnings: Vec<String>,
}

/// Assemble the stack described by `config`, pulling images from `repository`.
pub fn assemble(config: &StackConfig, repository: &str) -> anyhow::Result<Assembly> {
    let mut template = Template::new(&config.stack.name)
        .with_tags(config.stack.tags.clone().unwrap_or_default());
    if let Some(description) = &config.stack.description {
        template = template.with_description(description.as_str());
    }

    let network = skyport_network::provision(&mut template, &network_options(config))
        .context("provisioning network")?;
    let cluster = skyport_compute::cluster::provision(
        &mut template,
        COMPUTE_SCOPE,
        &network,
        &cluster_options(config),
    )
    .context("provisioning cluster")?;

    let container_name = config.container.name.as_deref().unwrap_or(DEFAULT_SERVICE_NAME);
    let log_sink = declare_log_sink(
        &mut template,
        container_name,
        config.container.log_retention_days.unwrap_or(DEFAULT_LOG_RETENTION_DAYS),
    )?;
    let (execution, task) = declare_identities(&mut template, repository, &log_sink)?;

    let image = ImageRef::from_repository(
        repository,
        config.container.image_tag.as_deref().unwrap_or(DEFAULT_IMAGE_TAG),
    );
    debug!(%image, "resolved container image");
    let container = container_spec(config, image, Some(log_sink))?;
    let deployment = deployment_config(config, Some(execution), Some(task))?;

    let props = service_props(config, container, deployment);

    let warnings = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&warnings);
    let orchestrator = ServiceOrchestrator::new(cluster.clone()).with_observer(Box::new(
        move |event: &ProvisionEvent| {
            if event.level == EventLevel::Warn
                && let Ok(mut warnings) = sink.lock()
            {
                warnings.push(format!("{}: {}", event.step, event.message));
            }
        },
    ));
    let service = orchestrator
        .add_service(&mut template, &props)
        .context("adding service")?;
    drop(orchestrator);

    let warnings = match Arc::try_unwrap(warnings) {
        Ok(mutex) => mutex.into_inner().unwrap_or_default(),
        Err(shared) => shared.lock().map(|w| w.clone()).unwrap_or_default(),
    };

    info!(
        stack = %config.stack.name,
        resources = template.len(),
        "stack assembled"
    );

    Ok(Assembly {
        template,
        network,
        cluster,
        service,
        warnings,
    })
}

/// Combine the built container and deployment policy with the `[task]` section.
pub fn service_props(
    config: &StackConfig,
    container: ContainerSpec,
    deployment: DeploymentConfig,
) -> ServiceProps {
    let mut props = ServiceProps::new(container, deployment);
    props.name = config
        .container
        .name
        .clone()
        .unwrap_or_else(|| DEFAULT_SERVICE_NAME.to_string());
    props.task.family = config.task.family.clone();
    props.task.cpu = Some(config.task.cpu.unwrap_or(DEFAULT_TASK_CPU));
    props.task.memory_mib = Some(config.task.memory_mib.unwrap_or(DEFAULT_TASK_MEMORY_MIB));
    props
}

pub fn network_options(config: &StackConfig) -> NetworkOptions {
    let net = &config.network;
    let defaults = NetworkOptions::default();
    let flow_logs = match net.flow_logs {
        Some(false) => None,
        _ => Some(FlowLogOptions {
            retention_days: net
                .flow_log_retention_days
                .unwrap_or(DEFAULT_LOG_RETENTION_DAYS),
            ..Default::default()
        }),
    };
    NetworkOptions {
        cidr: net.cidr.clone().unwrap_or(defaults.cidr),
        availability_zones: net
            .availability_zones
            .clone()
            .unwrap_or(defaults.availability_zones),
        max_azs: net.max_azs,
        subnet_mask: net.subnet_mask.unwrap_or(defaults.subnet_mask),
        private_subnets: net.private_subnets.unwrap_or(defaults.private_subnets),
        flow_logs,
    }
}

pub fn cluster_options(config: &StackConfig) -> ClusterOptions {
    ClusterOptions {
        cluster_name: config.cluster.name.clone(),
        container_insights: config.cluster.container_insights.unwrap_or(false),
        default_namespace: config.cluster.namespace.clone(),
    }
}

/// Build the container spec. Validation failures surface as `ValidationError`.
pub fn container_spec(
    config: &StackConfig,
    image: ImageRef,
    logging: Option<LogSinkHandle>,
) -> anyhow::Result<ContainerSpec> {
    let c = &config.container;
    let port = c.port.unwrap_or(DEFAULT_CONTAINER_PORT);

    let mut builder = ContainerSpec::builder()
        .image(image)
        .port_mapping(PortMapping {
            container_port: port,
            host_port: None,
            protocol: c.protocol.unwrap_or_default(),
        })
        .privileged(c.privileged.unwrap_or(false))
        .start_timeout_secs(duration_secs_or(c.start_timeout.as_deref(), 30)?)
        .stop_timeout_secs(duration_secs_or(c.stop_timeout.as_deref(), 10)?);

    builder = builder.name(c.name.as_deref().unwrap_or(DEFAULT_SERVICE_NAME));
    if let Some(cpu) = c.cpu {
        builder = builder.cpu(cpu);
    }
    if let Some(limit) = c.memory_limit_mib {
        builder = builder.memory_limit_mib(limit);
    }
    if let Some(reservation) = c.memory_reservation_mib {
        builder = builder.memory_reservation_mib(reservation);
    }
    if let Some(env) = &c.env {
        for (key, value) in env {
            builder = builder.env(key, value);
        }
    }
    if let Some(check) = &c.health_check {
        builder = builder.health_check(ContainerHealthCheck {
            command: check.command.clone(),
            interval_secs: duration_secs_or(check.interval.as_deref(), 30)?,
            timeout_secs: duration_secs_or(check.timeout.as_deref(), 5)?,
            retries: check.retries.unwrap_or(3),
            start_period_secs: duration_secs_or(check.start_period.as_deref(), 0)?,
        });
    }
    if let Some(sink) = logging {
        builder = builder.logging(sink);
    }

    Ok(builder.build()?)
}

/// Build the deployment policy from the `[service]` section.
pub fn deployment_config(
    config: &StackConfig,
    execution_identity: Option<IdentityHandle>,
    task_identity: Option<IdentityHandle>,
) -> anyhow::Result<DeploymentConfig> {
    let s = &config.service;
    let defaults = DeploymentConfig::default();

    let strategy = match s.strategy.unwrap_or(StrategyKind::Rolling) {
        StrategyKind::Rolling => DeploymentStrategy::Rolling,
        StrategyKind::Progressive => DeploymentStrategy::Progressive,
        StrategyKind::Custom => {
            let custom = s
                .custom_controller
                .as_ref()
                .context("service.custom_controller is required for the custom strategy")?;
            let mut descriptor = ControllerDescriptor::new(&custom.controller_type);
            for (key, value) in &custom.settings {
                descriptor
                    .settings
                    .insert(key.clone(), serde_json::to_value(value)?);
            }
            DeploymentStrategy::Custom(descriptor)
        }
    };

    Ok(DeploymentConfig {
        execution_identity,
        task_identity,
        desired_count: s.desired_count.unwrap_or(defaults.desired_count),
        min_capacity: s.min_capacity.unwrap_or(defaults.min_capacity),
        max_capacity: s.max_capacity.unwrap_or(defaults.max_capacity),
        strategy,
        container_port: config.container.port.unwrap_or(DEFAULT_CONTAINER_PORT),
        production_listener: ListenerConfig {
            port: s.production_port,
            protocol: s.production_protocol,
        },
        test_listener: ListenerConfig {
            port: s.test_port,
            protocol: s.test_protocol,
        },
        health_check_path: s
            .health_check_path
            .clone()
            .unwrap_or(defaults.health_check_path),
        assign_public_ip: s.assign_public_ip.unwrap_or(defaults.assign_public_ip),
        task_subnets: match s.subnets.unwrap_or(SubnetPlacement::Public) {
            SubnetPlacement::Public => SubnetSelection::Public,
            SubnetPlacement::Private => SubnetSelection::Private,
        },
    })
}

fn declare_log_sink(
    template: &mut Template,
    container_name: &str,
    retention_days: u32,
) -> anyhow::Result<LogSinkHandle> {
    let log_group = template
        .declare(
            COMPUTE_SCOPE,
            &format!("{container_name}LogGroup"),
            LogGroup {
                log_group_name: None,
                retention_days,
            },
        )
        .context("declaring log group")?;
    Ok(LogSinkHandle {
        log_group: log_group.logical_id,
        stream_prefix: container_name.to_string(),
    })
}

/// Declare the execution identity (pull images, write logs) and the task identity.
fn declare_identities(
    template: &mut Template,
    repository: &str,
    log_sink: &LogSinkHandle,
) -> anyhow::Result<(IdentityHandle, IdentityHandle)> {
    let mut inline_policies = BTreeMap::new();
    inline_policies.insert(
        "logPolicy".to_string(),
        PolicyDocument {
            statements: vec![PolicyStatement {
                effect: Effect::Allow,
                actions: vec!["logs:CreateLogStream".to_string(), "logs:PutLogEvents".to_string()],
                resources: vec![log_sink.log_group.to_string()],
            }],
        },
    );
    inline_policies.insert(
        "pullPolicy".to_string(),
        PolicyDocument {
            statements: vec![
                PolicyStatement {
                    effect: Effect::Allow,
                    actions: vec!["ecr:GetAuthorizationToken".to_string()],
                    resources: vec!["*".to_string()],
                },
                PolicyStatement {
                    effect: Effect::Allow,
                    actions: [
                        "ecr:BatchCheckLayerAvailability",
                        "ecr:GetDownloadUrlForLayer",
                        "ecr:BatchGetImage",
                    ]
                    .iter()
                    .map(|a| a.to_string())
                    .collect(),
                    resources: vec![format!("repository/{repository}")],
                },
            ],
        },
    );

    let execution_role = template
        .declare(
            IDENTITY_SCOPE,
            "executionRole",
            Role {
                role_name: None,
                assumed_by: TASK_PRINCIPAL.to_string(),
                description: Some("Pulls the service image and writes its logs".to_string()),
                managed_policies: Vec::new(),
                inline_policies,
            },
        )
        .context("declaring execution role")?;
    let task_role = template
        .declare(
            IDENTITY_SCOPE,
            "taskRole",
            Role {
                role_name: None,
                assumed_by: TASK_PRINCIPAL.to_string(),
                description: Some("Identity of the running service".to_string()),
                managed_policies: Vec::new(),
                inline_policies: BTreeMap::new(),
            },
        )
        .context("declaring task role")?;

    let mut execution = IdentityHandle::new(execution_role.logical_id);
    execution.grant(Capability::PullImages);
    execution.grant(Capability::WriteLogs);
    let task = IdentityHandle::new(task_role.logical_id);

    Ok((execution, task))
}

#[cfg(test)]
mod tests {
    use super::*;
    use skyport_compute::{ConfigurationError, OrchestrationError, ValidationError};
    use skyport_template::{ProvisioningError, ResourceKind};

    #[test]
    fn scaffold_assembles_rolling_web_server() {
        let config = StackConfig::scaffold("WebServerStack");
        let assembly = assemble(&config, "webserver").unwrap();

        assert_eq!(assembly.template.count(ResourceKind::Service), 1);
        assert_eq!(assembly.template.count(ResourceKind::Listener), 1);
        assert_eq!(assembly.template.count(ResourceKind::TargetGroup), 1);
        assert_eq!(assembly.template.count(ResourceKind::Role), 4);
        assert_eq!(assembly.network.availability_zones.len(), 2);
        assert_eq!(assembly.service.container_name, "webServer");
        assert_eq!(assembly.service.service.properties.desired_count, 0);
        assert!(assembly.warnings.is_empty());

        let container = &assembly.service.task_definition.properties.containers[0];
        assert_eq!(container.image.to_string(), "webserver:develop");
        assert_eq!(container.logging.as_ref().unwrap().stream_prefix, "webServer");
        assert_eq!(container.health_check.as_ref().unwrap().start_period_secs, 120);

        assert!(assembly.template.to_json_pretty().is_ok());
    }

    #[test]
    fn execution_identity_carries_capabilities() {
        let mut template = Template::new("t");
        let sink = declare_log_sink(&mut template, "webServer", 1).unwrap();
        let (execution, task) = declare_identities(&mut template, "webserver", &sink).unwrap();

        assert!(execution.has(Capability::PullImages));
        assert!(execution.has(Capability::WriteLogs));
        assert!(!task.has(Capability::PullImages));
    }

    #[test]
    fn empty_repository_is_a_provisioning_failure() {
        let config = StackConfig::scaffold("WebServerStack");
        let err = assemble(&config, "").err().unwrap();
        let orchestration = err.downcast_ref::<OrchestrationError>().unwrap();
        assert!(matches!(
            orchestration,
            OrchestrationError::Provisioning(ProvisioningError::InvalidProperty {
                kind: ResourceKind::TaskDefinition,
                ..
            })
        ));
    }

    #[test]
    fn progressive_config_adds_test_path() {
        let mut config = StackConfig::scaffold("WebServerStack");
        config.service.strategy = Some(StrategyKind::Progressive);
        config.service.test_port = Some(9000);

        let assembly = assemble(&config, "webserver").unwrap();
        let test = assembly.service.test_listener.as_ref().unwrap();
        assert_eq!(test.properties.port, 9000);
        assert_eq!(assembly.template.count(ResourceKind::TargetGroup), 2);
    }

    #[test]
    fn bad_reservation_is_a_validation_error() {
        let mut config = StackConfig::scaffold("WebServerStack");
        config.container.memory_reservation_mib = Some(1024);

        let err = container_spec(&config, ImageRef::from_repository("web", "develop"), None)
            .err()
            .unwrap();
        assert!(matches!(
            err.downcast_ref::<ValidationError>(),
            Some(ValidationError::MemoryReservationExceedsLimit { .. })
        ));
    }

    #[test]
    fn inverted_bounds_fail_before_service_resources() {
        let mut config = StackConfig::scaffold("WebServerStack");
        config.service.min_capacity = Some(5);

        let err = assemble(&config, "webserver").err().unwrap();
        assert!(matches!(
            err.downcast_ref::<OrchestrationError>(),
            Some(OrchestrationError::Configuration(ConfigurationError::MinExceedsMax { .. }))
        ));
    }

    #[test]
    fn custom_settings_are_carried_verbatim() {
        let toml = r#"
            [stack]
            name = "custom"

            [service]
            strategy = "custom"

            [service.custom_controller]
            type = "EXTERNAL"
            owner = "release-bot"
        "#;
        let config = StackConfig::from_toml_str(toml).unwrap();
        let deployment = deployment_config(&config, None, None).unwrap();

        match deployment.strategy {
            DeploymentStrategy::Custom(descriptor) => {
                assert_eq!(descriptor.controller_type, "EXTERNAL");
                assert_eq!(descriptor.settings["owner"], serde_json::json!("release-bot"));
            }
            other => panic!("unexpected strategy {other:?}"),
        }
    }

    #[test]
    fn minimal_config_uses_defaults() {
        let config = StackConfig::from_toml_str("[stack]\nname = \"web\"\n").unwrap();
        let assembly = assemble(&config, "webserver").unwrap();

        let td = &assembly.service.task_definition.properties;
        assert_eq!((td.cpu, td.memory_mib), (Some(256), Some(512)));
        assert_eq!(assembly.service.production_listener.properties.port, 80);
        assert_eq!(assembly.service.scaling.summary().max_capacity, 2);
    }

    #[test]
    fn stack_description_and_tags_reach_the_template() {
        let mut config = StackConfig::scaffold("WebServerStack");
        let mut tags = BTreeMap::new();
        tags.insert("env".to_string(), "dev".to_string());
        config.stack.tags = Some(tags);

        let assembly = assemble(&config, "webserver").unwrap();
        let doc = assembly.template.synthesize().unwrap();
        assert_eq!(doc.description.as_deref(), Some("Load-balanced serverless web service"));
        assert_eq!(doc.tags.get("env").map(String::as_str), Some("dev"));
    }

    #[test]
    fn disabled_flow_logs_skip_the_sink() {
        let mut config = StackConfig::scaffold("s");
        config.network.flow_logs = Some(false);
        assert!(network_options(&config).flow_logs.is_none());
    }
}
