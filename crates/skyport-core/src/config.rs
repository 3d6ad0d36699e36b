//! skyport.toml configuration parser.
//!
//! The file describes one load-balanced web service stack. Every section
//! except `[stack]` may be omitted; the assembler fills gaps with the
//! defaults shown in [`StackConfig::scaffold`].

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use crate::error::{ConfigError, ConfigResult};
use crate::types::{ApplicationProtocol, Protocol};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StackConfig {
    pub stack: StackSection,
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub cluster: ClusterConfig,
    #[serde(default)]
    pub container: ContainerConfig,
    #[serde(default)]
    pub task: TaskConfig,
    #[serde(default)]
    pub service: ServiceConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StackSection {
    pub name: String,
    pub description: Option<String>,
    pub tags: Option<BTreeMap<String, String>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NetworkConfig {
    pub cidr: Option<String>,
    pub availability_zones: Option<Vec<String>>,
    pub max_azs: Option<usize>,
    pub subnet_mask: Option<u8>,
    pub private_subnets: Option<bool>,
    pub flow_logs: Option<bool>,
    pub flow_log_retention_days: Option<u32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClusterConfig {
    pub name: Option<String>,
    pub container_insights: Option<bool>,
    pub namespace: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContainerConfig {
    pub name: Option<String>,
    pub image_tag: Option<String>,
    pub cpu: Option<u32>,
    pub memory_limit_mib: Option<u32>,
    pub memory_reservation_mib: Option<u32>,
    pub port: Option<u16>,
    pub protocol: Option<Protocol>,
    pub privileged: Option<bool>,
    pub start_timeout: Option<String>,
    pub stop_timeout: Option<String>,
    pub env: Option<BTreeMap<String, String>>,
    pub log_retention_days: Option<u32>,
    pub health_check: Option<ContainerHealthConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContainerHealthConfig {
    pub command: Vec<String>,
    pub interval: Option<String>,
    pub timeout: Option<String>,
    pub retries: Option<u32>,
    pub start_period: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskConfig {
    pub family: Option<String>,
    pub cpu: Option<u32>,
    pub memory_mib: Option<u32>,
}

/// Deployment strategy as written in the config file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    #[default]
    Rolling,
    Progressive,
    Custom,
}

/// Which subnet group service tasks are placed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubnetPlacement {
    #[default]
    Public,
    Private,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub strategy: Option<StrategyKind>,
    pub custom_controller: Option<CustomControllerConfig>,
    pub desired_count: Option<u32>,
    pub min_capacity: Option<u32>,
    pub max_capacity: Option<u32>,
    pub production_port: Option<u16>,
    pub production_protocol: Option<ApplicationProtocol>,
    pub test_port: Option<u16>,
    pub test_protocol: Option<ApplicationProtocol>,
    pub health_check_path: Option<String>,
    pub assign_public_ip: Option<bool>,
    pub subnets: Option<SubnetPlacement>,
}

/// Externally defined deployment controller, passed through verbatim.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomControllerConfig {
    #[serde(rename = "type")]
    pub controller_type: String,
    #[serde(flatten)]
    pub settings: BTreeMap<String, toml::Value>,
}

impl StackConfig {
    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> ConfigResult<Self> {
        let config: StackConfig = toml::from_str(content)?;
        if config.stack.name.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "stack.name".to_string(),
                reason: "must not be empty".to_string(),
            });
        }
        if config.service.strategy == Some(StrategyKind::Custom)
            && config.service.custom_controller.is_none()
        {
            return Err(ConfigError::InvalidValue {
                field: "service.custom_controller".to_string(),
                reason: "required when strategy = \"custom\"".to_string(),
            });
        }
        Ok(config)
    }

    pub fn to_toml_string(&self) -> ConfigResult<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Scaffold the default web-server stack.
    pub fn scaffold(name: &str) -> Self {
        StackConfig {
            stack: StackSection {
                name: name.to_string(),
                description: Some("Load-balanced serverless web service".to_string()),
                tags: None,
            },
            network: NetworkConfig {
                cidr: Some("10.0.0.0/16".to_string()),
                availability_zones: Some(vec!["us-east-1a".to_string(), "us-east-1b".to_string()]),
                max_azs: None,
                subnet_mask: Some(24),
                private_subnets: Some(false),
                flow_logs: Some(true),
                flow_log_retention_days: Some(1),
            },
            cluster: ClusterConfig::default(),
            container: ContainerConfig {
                name: Some("webServer".to_string()),
                image_tag: Some("develop".to_string()),
                cpu: Some(256),
                memory_limit_mib: Some(512),
                memory_reservation_mib: Some(512),
                port: Some(8080),
                protocol: Some(Protocol::Tcp),
                privileged: Some(false),
                start_timeout: Some("30s".to_string()),
                stop_timeout: Some("10s".to_string()),
                env: None,
                log_retention_days: Some(1),
                health_check: Some(ContainerHealthConfig {
                    command: vec!["touch ~ || exit 1".to_string()],
                    interval: Some("15s".to_string()),
                    timeout: Some("5s".to_string()),
                    retries: Some(3),
                    start_period: Some("2m".to_string()),
                }),
            },
            task: TaskConfig {
                family: None,
                cpu: Some(256),
                memory_mib: Some(512),
            },
            service: ServiceConfig {
                strategy: Some(StrategyKind::Rolling),
                custom_controller: None,
                desired_count: Some(0),
                min_capacity: Some(1),
                max_capacity: Some(2),
                production_port: Some(80),
                production_protocol: Some(ApplicationProtocol::Http),
                test_port: None,
                test_protocol: None,
                health_check_path: Some("/".to_string()),
                assign_public_ip: Some(true),
                subnets: Some(SubnetPlacement::Public),
            },
        }
    }
}

/// Parse a duration string like "30s", "5m", "1h" or a bare number of seconds.
pub fn parse_duration(s: &str) -> ConfigResult<Duration> {
    let s = s.trim();
    let invalid = || ConfigError::InvalidDuration(s.to_string());
    let (digits, unit) = match s.char_indices().find(|(_, c)| !c.is_ascii_digit()) {
        Some((idx, _)) => s.split_at(idx),
        None => (s, "s"),
    };
    let value: u64 = digits.parse().map_err(|_| invalid())?;
    let secs = match unit {
        "s" => value,
        "m" => value.checked_mul(60).ok_or_else(invalid)?,
        "h" => value.checked_mul(3600).ok_or_else(invalid)?,
        _ => return Err(invalid()),
    };
    Ok(Duration::from_secs(secs))
}

/// Parse an optional duration field, falling back to `default_secs`.
pub fn duration_secs_or(value: Option<&str>, default_secs: u64) -> ConfigResult<u64> {
    match value {
        Some(v) => Ok(parse_duration(v)?.as_secs()),
        None => Ok(default_secs),
    }
}
