//! Container specification builder.
//!
//! A [`ContainerSpec`] can only be obtained through
//! [`ContainerSpecBuilder::build`], so every spec handed to the orchestrator
//! has already passed validation.

use std::collections::BTreeMap;

use skyport_core::{ImageRef, LogSinkHandle};
use skyport_template::{ContainerDefinition, ContainerHealthCheck, LogConfiguration, PortMapping};

use crate::error::ValidationError;

/// The runtime shape of one container. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct ContainerSpec {
    name: Option<String>,
    image: ImageRef,
    cpu: Option<u32>,
    memory_limit_mib: Option<u32>,
    memory_reservation_mib: Option<u32>,
    port_mappings: Vec<PortMapping>,
    health_check: Option<ContainerHealthCheck>,
    environment: BTreeMap<String, String>,
    logging: Option<LogSinkHandle>,
    command: Vec<String>,
    essential: bool,
    privileged: bool,
    start_timeout_secs: Option<u64>,
    stop_timeout_secs: Option<u64>,
}

impl ContainerSpec {
    pub fn builder() -> ContainerSpecBuilder {
        ContainerSpecBuilder::default()
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn image(&self) -> &ImageRef {
        &self.image
    }

    pub fn cpu(&self) -> Option<u32> {
        self.cpu
    }

    pub fn memory_limit_mib(&self) -> Option<u32> {
        self.memory_limit_mib
    }

    pub fn memory_reservation_mib(&self) -> Option<u32> {
        self.memory_reservation_mib
    }

    pub fn port_mappings(&self) -> &[PortMapping] {
        &self.port_mappings
    }

    pub fn health_check(&self) -> Option<&ContainerHealthCheck> {
        self.health_check.as_ref()
    }

    pub fn environment(&self) -> &BTreeMap<String, String> {
        &self.environment
    }

    pub fn logging(&self) -> Option<&LogSinkHandle> {
        self.logging.as_ref()
    }

    /// Whether the container maps `port`.
    pub fn exposes(&self, port: u16) -> bool {
        self.port_mappings.iter().any(|m| m.container_port == port)
    }

    /// Render the container as it is attached to a task definition.
    pub fn to_definition(&self, name: &str) -> ContainerDefinition {
        ContainerDefinition {
            name: name.to_string(),
            image: self.image.clone(),
            cpu: self.cpu,
            memory_limit_mib: self.memory_limit_mib,
            memory_reservation_mib: self.memory_reservation_mib,
            port_mappings: self.port_mappings.clone(),
            health_check: self.health_check.clone(),
            environment: self.environment.clone(),
            logging: self.logging.as_ref().map(|sink| LogConfiguration {
                log_group: sink.log_group.clone(),
                stream_prefix: sink.stream_prefix.clone(),
            }),
            command: self.command.clone(),
            essential: self.essential,
            privileged: self.privileged,
            start_timeout_secs: self.start_timeout_secs,
            stop_timeout_secs: self.stop_timeout_secs,
        }
    }
}

/// Collects a caller's container description and validates it into a [`ContainerSpec`].
#[derive(Debug, Clone)]
pub struct ContainerSpecBuilder {
    name: Option<String>,
    image: Option<ImageRef>,
    cpu: Option<u32>,
    memory_limit_mib: Option<u32>,
    memory_reservation_mib: Option<u32>,
    port_mappings: Vec<PortMapping>,
    health_check: Option<ContainerHealthCheck>,
    environment: BTreeMap<String, String>,
    logging: Option<LogSinkHandle>,
    command: Vec<String>,
    essential: bool,
    privileged: bool,
    start_timeout_secs: Option<u64>,
    stop_timeout_secs: Option<u64>,
}

impl Default for ContainerSpecBuilder {
    fn default() -> Self {
        Self {
            name: None,
            image: None,
            cpu: None,
            memory_limit_mib: None,
            memory_reservation_mib: None,
            port_mappings: Vec::new(),
            health_check: None,
            environment: BTreeMap::new(),
            logging: None,
            command: Vec::new(),
            essential: true,
            privileged: false,
            start_timeout_secs: None,
            stop_timeout_secs: None,
        }
    }
}

impl ContainerSpecBuilder {
    pub fn name(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }

    pub fn image(mut self, image: ImageRef) -> Self {
        self.image = Some(image);
        self
    }

    pub fn cpu(mut self, cpu: u32) -> Self {
        self.cpu = Some(cpu);
        self
    }

    pub fn memory_limit_mib(mut self, mib: u32) -> Self {
        self.memory_limit_mib = Some(mib);
        self
    }

    pub fn memory_reservation_mib(mut self, mib: u32) -> Self {
        self.memory_reservation_mib = Some(mib);
        self
    }

    pub fn port_mapping(mut self, mapping: PortMapping) -> Self {
        self.port_mappings.push(mapping);
        self
    }

    pub fn health_check(mut self, check: ContainerHealthCheck) -> Self {
        self.health_check = Some(check);
        self
    }

    pub fn env(mut self, key: &str, value: &str) -> Self {
        self.environment.insert(key.to_string(), value.to_string());
        self
    }

    pub fn logging(mut self, sink: LogSinkHandle) -> Self {
        self.logging = Some(sink);
        self
    }

    pub fn command(mut self, command: Vec<String>) -> Self {
        self.command = command;
        self
    }

    pub fn essential(mut self, essential: bool) -> Self {
        self.essential = essential;
        self
    }

    pub fn privileged(mut self, privileged: bool) -> Self {
        self.privileged = privileged;
        self
    }

    pub fn start_timeout_secs(mut self, secs: u64) -> Self {
        self.start_timeout_secs = Some(secs);
        self
    }

    pub fn stop_timeout_secs(mut self, secs: u64) -> Self {
        self.stop_timeout_secs = Some(secs);
        self
    }

    /// Validate and freeze the description.
    pub fn build(self) -> Result<ContainerSpec, ValidationError> {
        let image = self.image.ok_or(ValidationError::MissingImage)?;

        // Names are trimmed; an all-whitespace name is rejected rather than defaulted.
        let name = match self.name {
            Some(n) if n.trim().is_empty() => return Err(ValidationError::EmptyName),
            Some(n) => Some(n.trim().to_string()),
            None => None,
        };

        if let (Some(reservation), Some(limit)) = (self.memory_reservation_mib, self.memory_limit_mib)
            && reservation > limit
        {
            return Err(ValidationError::MemoryReservationExceedsLimit { reservation, limit });
        }

        if let Some(check) = &self.health_check {
            if check.timeout_secs > check.interval_secs {
                return Err(ValidationError::HealthProbeTimeoutExceedsInterval {
                    timeout_secs: check.timeout_secs,
                    interval_secs: check.interval_secs,
                });
            }
            if check.command.iter().all(|c| c.trim().is_empty()) {
                return Err(ValidationError::EmptyHealthProbeCommand);
            }
        }

        let mut seen = Vec::with_capacity(self.port_mappings.len());
        for mapping in &self.port_mappings {
            if mapping.container_port == 0 || mapping.host_port == Some(0) {
                return Err(ValidationError::InvalidPort);
            }
            if seen.contains(&(mapping.container_port, mapping.protocol)) {
                return Err(ValidationError::DuplicatePortMapping(mapping.container_port));
            }
            seen.push((mapping.container_port, mapping.protocol));
        }

        Ok(ContainerSpec {
            name,
            image,
            cpu: self.cpu,
            memory_limit_mib: self.memory_limit_mib,
            memory_reservation_mib: self.memory_reservation_mib,
            port_mappings: self.port_mappings,
            health_check: self.health_check,
            environment: self.environment,
            logging: self.logging,
            command: self.command,
            essential: self.essential,
            privileged: self.privileged,
            start_timeout_secs: self.start_timeout_secs,
            stop_timeout_secs: self.stop_timeout_secs,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use skyport_core::{LogicalId, Protocol};

    fn probe(interval: u64, timeout: u64) -> ContainerHealthCheck {
        ContainerHealthCheck {
            command: vec!["touch ~ || exit 1".to_string()],
            interval_secs: interval,
            timeout_secs: timeout,
            retries: 3,
            start_period_secs: 120,
        }
    }

    fn web() -> ContainerSpecBuilder {
        ContainerSpec::builder()
            .name("webServer")
            .image(ImageRef::from_repository("web", "develop"))
            .cpu(256)
            .memory_limit_mib(512)
            .memory_reservation_mib(512)
            .port_mapping(PortMapping::tcp(8080))
    }

    #[test]
    fn builds_valid_spec() {
        let spec = web().health_check(probe(15, 5)).build().unwrap();
        assert_eq!(spec.name(), Some("webServer"));
        assert!(spec.exposes(8080));
        assert!(!spec.exposes(80));
    }

    #[test]
    fn missing_image_rejected() {
        let err = ContainerSpec::builder().name("x").build().unwrap_err();
        assert_eq!(err, ValidationError::MissingImage);
    }

    #[test]
    fn reservation_above_limit_rejected() {
        let err = web().memory_reservation_mib(1024).build().unwrap_err();
        assert_eq!(
            err,
            ValidationError::MemoryReservationExceedsLimit {
                reservation: 1024,
                limit: 512
            }
        );
    }

    #[test]
    fn reservation_without_limit_is_fine() {
        let spec = ContainerSpec::builder()
            .image(ImageRef::from_repository("web", "develop"))
            .memory_reservation_mib(4096)
            .build()
            .unwrap();
        assert_eq!(spec.memory_reservation_mib(), Some(4096));
    }

    #[test]
    fn probe_timeout_above_interval_rejected() {
        let err = web().health_check(probe(5, 10)).build().unwrap_err();
        assert!(matches!(err, ValidationError::HealthProbeTimeoutExceedsInterval { .. }));
    }

    #[test]
    fn probe_timeout_equal_to_interval_allowed() {
        assert!(web().health_check(probe(5, 5)).build().is_ok());
    }

    #[test]
    fn empty_probe_command_rejected() {
        let mut check = probe(15, 5);
        check.command = vec!["  ".to_string()];
        let err = web().health_check(check).build().unwrap_err();
        assert_eq!(err, ValidationError::EmptyHealthProbeCommand);
    }

    #[test]
    fn blank_name_rejected() {
        let err = web().name(" ").build().unwrap_err();
        assert_eq!(err, ValidationError::EmptyName);
    }

    #[test]
    fn duplicate_port_rejected_per_protocol() {
        let err = web().port_mapping(PortMapping::tcp(8080)).build().unwrap_err();
        assert_eq!(err, ValidationError::DuplicatePortMapping(8080));

        let udp = PortMapping {
            container_port: 8080,
            host_port: None,
            protocol: Protocol::Udp,
        };
        assert!(web().port_mapping(udp).build().is_ok());
    }

    #[test]
    fn zero_port_rejected() {
        let err = web().port_mapping(PortMapping::tcp(0)).build().unwrap_err();
        assert_eq!(err, ValidationError::InvalidPort);
    }

    #[test]
    fn definition_carries_name_ports_and_logging() {
        let sink = LogSinkHandle {
            log_group: LogicalId::from_path(&["webServerLogGroup"]),
            stream_prefix: "webServer".to_string(),
        };
        let spec = web().logging(sink.clone()).env("MODE", "prod").build().unwrap();
        let def = spec.to_definition("webServer");

        assert_eq!(def.name, "webServer");
        assert_eq!(def.port_mappings, spec.port_mappings());
        assert_eq!(def.environment.get("MODE").map(String::as_str), Some("prod"));
        let logging = def.logging.unwrap();
        assert_eq!(logging.log_group, sink.log_group);
        assert!(def.essential);
    }
}
