//! Deployment strategies and service-level policy.

use skyport_core::{ApplicationProtocol, IdentityHandle, SubnetSelection};
use skyport_template::{ControllerDescriptor, DeploymentController};

use crate::error::ConfigurationError;

pub const DEFAULT_PRODUCTION_PORT: u16 = 80;
pub const DEFAULT_TEST_PORT: u16 = 8080;

/// How new task revisions replace running ones. Chosen once per orchestration.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum DeploymentStrategy {
    /// Platform-managed in-place rolling update.
    #[default]
    Rolling,
    /// Externally controlled cutover; adds a test listener and target group.
    Progressive,
    /// Caller-supplied controller, passed through verbatim.
    Custom(ControllerDescriptor),
}

impl DeploymentStrategy {
    /// The service deployment controller this strategy maps to.
    pub fn controller(&self) -> DeploymentController {
        match self {
            DeploymentStrategy::Rolling => DeploymentController::Rolling,
            DeploymentStrategy::Progressive => DeploymentController::External,
            DeploymentStrategy::Custom(descriptor) => DeploymentController::Custom {
                descriptor: descriptor.clone(),
            },
        }
    }

    /// Whether a test listener/target-group pair is declared.
    pub fn has_test_path(&self) -> bool {
        match self {
            DeploymentStrategy::Progressive => true,
            DeploymentStrategy::Rolling | DeploymentStrategy::Custom(_) => false,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            DeploymentStrategy::Rolling => "rolling",
            DeploymentStrategy::Progressive => "progressive",
            DeploymentStrategy::Custom(_) => "custom",
        }
    }
}

/// Port and protocol of a listener; unset fields fall back to defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ListenerConfig {
    pub port: Option<u16>,
    pub protocol: Option<ApplicationProtocol>,
}

impl ListenerConfig {
    pub fn resolve(&self, default_port: u16) -> (u16, ApplicationProtocol) {
        (
            self.port.unwrap_or(default_port),
            self.protocol.unwrap_or(ApplicationProtocol::Http),
        )
    }
}

/// Desired task/service policy for one orchestration.
#[derive(Debug, Clone, PartialEq)]
pub struct DeploymentConfig {
    pub execution_identity: Option<IdentityHandle>,
    pub task_identity: Option<IdentityHandle>,
    pub desired_count: u32,
    pub min_capacity: u32,
    pub max_capacity: u32,
    pub strategy: DeploymentStrategy,
    /// Container port traffic is routed to.
    pub container_port: u16,
    pub production_listener: ListenerConfig,
    pub test_listener: ListenerConfig,
    /// Load-balancer readiness path. Only "/" is honored.
    pub health_check_path: String,
    pub assign_public_ip: bool,
    pub task_subnets: SubnetSelection,
}

impl Default for DeploymentConfig {
    fn default() -> Self {
        Self {
            execution_identity: None,
            task_identity: None,
            desired_count: 0,
            min_capacity: 1,
            max_capacity: 2,
            strategy: DeploymentStrategy::Rolling,
            container_port: 8080,
            production_listener: ListenerConfig::default(),
            test_listener: ListenerConfig::default(),
            health_check_path: "/".to_string(),
            assign_public_ip: true,
            task_subnets: SubnetSelection::Public,
        }
    }
}

impl DeploymentConfig {
    /// Both identities, or the error for the first one missing.
    pub fn identities(&self) -> Result<(&IdentityHandle, &IdentityHandle), ConfigurationError> {
        let execution = self
            .execution_identity
            .as_ref()
            .ok_or(ConfigurationError::MissingExecutionIdentity)?;
        let task = self
            .task_identity
            .as_ref()
            .ok_or(ConfigurationError::MissingTaskIdentity)?;
        Ok((execution, task))
    }

    /// Check capacity bounds. A desired count below min is accepted; the
    /// scaling target raises it.
    pub fn check_bounds(&self) -> Result<(), ConfigurationError> {
        if self.max_capacity == 0 {
            return Err(ConfigurationError::ZeroMaxCapacity);
        }
        if self.min_capacity > self.max_capacity {
            return Err(ConfigurationError::MinExceedsMax {
                min: self.min_capacity,
                max: self.max_capacity,
            });
        }
        if self.desired_count > self.max_capacity {
            return Err(ConfigurationError::DesiredExceedsMax {
                desired: self.desired_count,
                max: self.max_capacity,
            });
        }
        Ok(())
    }

    pub fn production_listener(&self) -> (u16, ApplicationProtocol) {
        self.production_listener.resolve(DEFAULT_PRODUCTION_PORT)
    }

    /// The test listener, present only for strategies with a test path.
    pub fn test_listener(&self) -> Option<(u16, ApplicationProtocol)> {
        self.strategy
            .has_test_path()
            .then(|| self.test_listener.resolve(DEFAULT_TEST_PORT))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use skyport_core::LogicalId;

    #[test]
    fn default_is_rolling() {
        let cfg = DeploymentConfig::default();
        assert_eq!(cfg.strategy, DeploymentStrategy::Rolling);
        assert_eq!(cfg.strategy.controller(), DeploymentController::Rolling);
        assert!(cfg.test_listener().is_none());
    }

    #[test]
    fn progressive_maps_to_external_with_test_path() {
        let strategy = DeploymentStrategy::Progressive;
        assert_eq!(strategy.controller(), DeploymentController::External);
        assert!(strategy.has_test_path());
    }

    #[test]
    fn custom_descriptor_passes_through() {
        let mut descriptor = ControllerDescriptor::new("EXTERNAL");
        descriptor
            .settings
            .insert("owner".to_string(), serde_json::json!("release-bot"));
        let strategy = DeploymentStrategy::Custom(descriptor.clone());

        assert!(!strategy.has_test_path());
        assert_eq!(strategy.controller(), DeploymentController::Custom { descriptor });
    }

    #[test]
    fn listener_defaults() {
        let cfg = DeploymentConfig {
            strategy: DeploymentStrategy::Progressive,
            ..Default::default()
        };
        assert_eq!(cfg.production_listener(), (80, ApplicationProtocol::Http));
        assert_eq!(cfg.test_listener(), Some((8080, ApplicationProtocol::Http)));

        let cfg = DeploymentConfig {
            production_listener: ListenerConfig {
                port: Some(443),
                protocol: Some(ApplicationProtocol::Https),
            },
            ..Default::default()
        };
        assert_eq!(cfg.production_listener(), (443, ApplicationProtocol::Https));
    }

    #[test]
    fn identities_checked_in_order() {
        let cfg = DeploymentConfig::default();
        assert_eq!(cfg.identities().unwrap_err(), ConfigurationError::MissingExecutionIdentity);

        let cfg = DeploymentConfig {
            execution_identity: Some(IdentityHandle::new(LogicalId::from_path(&["exec"]))),
            ..Default::default()
        };
        assert_eq!(cfg.identities().unwrap_err(), ConfigurationError::MissingTaskIdentity);
    }

    #[test]
    fn bounds() {
        let ok = DeploymentConfig::default();
        assert!(ok.check_bounds().is_ok());

        let inverted = DeploymentConfig {
            min_capacity: 3,
            max_capacity: 2,
            ..Default::default()
        };
        assert_eq!(
            inverted.check_bounds().unwrap_err(),
            ConfigurationError::MinExceedsMax { min: 3, max: 2 }
        );

        let too_many = DeploymentConfig {
            desired_count: 5,
            ..Default::default()
        };
        assert!(matches!(
            too_many.check_bounds().unwrap_err(),
            ConfigurationError::DesiredExceedsMax { desired: 5, max: 2 }
        ));

        let zero = DeploymentConfig {
            min_capacity: 0,
            max_capacity: 0,
            ..Default::default()
        };
        assert_eq!(zero.check_bounds().unwrap_err(), ConfigurationError::ZeroMaxCapacity);
    }
}
