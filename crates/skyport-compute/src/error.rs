//! Orchestration error types.

use skyport_template::ProvisioningError;
use thiserror::Error;

/// A caller-supplied container description was malformed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("container image reference is missing")]
    MissingImage,

    #[error("container name must not be empty")]
    EmptyName,

    #[error("memory reservation {reservation}MiB exceeds memory limit {limit}MiB")]
    MemoryReservationExceedsLimit { reservation: u32, limit: u32 },

    #[error("health probe timeout {timeout_secs}s exceeds its interval {interval_secs}s")]
    HealthProbeTimeoutExceedsInterval { timeout_secs: u64, interval_secs: u64 },

    #[error("health probe command must not be empty")]
    EmptyHealthProbeCommand,

    #[error("port mapping must use a port between 1 and 65535")]
    InvalidPort,

    #[error("container port {0} is mapped more than once")]
    DuplicatePortMapping(u16),
}

/// The orchestration request itself is inconsistent or incomplete.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    #[error("service name must contain at least one alphanumeric character: '{0}'")]
    InvalidServiceName(String),

    #[error("executionRole is not defined")]
    MissingExecutionIdentity,

    #[error("TaskRole is not defined")]
    MissingTaskIdentity,

    #[error("min capacity {min} exceeds max capacity {max}")]
    MinExceedsMax { min: u32, max: u32 },

    #[error("desired count {desired} exceeds max capacity {max}")]
    DesiredExceedsMax { desired: u32, max: u32 },

    #[error("max capacity must be at least 1")]
    ZeroMaxCapacity,

    #[error("container '{container}' does not expose target port {port}")]
    TargetPortNotExposed { container: String, port: u16 },

    #[error("custom deployment controller must name a controller type")]
    EmptyCustomController,

    #[error("{what} subnet selection resolved to no subnets")]
    EmptySubnetSelection { what: &'static str },

    #[error("{what} subnet selection names subnets outside the network")]
    UnknownSubnet { what: &'static str },

    #[error("production and test listeners both use port {0}")]
    ListenerPortConflict(u16),
}

/// Any failure of a single orchestration call.
#[derive(Debug, Error)]
pub enum OrchestrationError {
    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("provisioning error: {0}")]
    Provisioning(#[from] ProvisioningError),
}

pub type OrchestrationResult<T> = Result<T, OrchestrationError>;
