//! skyport-compute — containers, clusters, and the service orchestrator.
//!
//! # Architecture
//!
//! ```text
//! ContainerSpecBuilder ──build()──▶ ContainerSpec ─┐
//!                                                  │
//! NetworkHandle ──▶ cluster::provision ──▶ ClusterHandle
//!                                                  │
//!                        ServiceOrchestrator::add_service(template, props)
//!                                                  │
//!   preconditions ─▶ security ─▶ task ─▶ load balancer ─▶ service
//!                 ─▶ production target group ─▶ [test path] ─▶ scaling
//! ```
//!
//! # Components
//!
//! - [`container`]: validated container description
//! - [`cluster`]: cluster declaration bound to a network
//! - [`deployment`]: strategy selection and capacity policy
//! - [`security`]: two-tier security boundaries
//! - [`task`]: caller-owned vs orchestrator-owned task fields
//! - [`routing`]: load balancer, listeners, target groups
//! - [`scaling`]: CPU target tracking
//! - [`observer`]: per-call leveled events
//! - [`orchestrator`]: the `add_service` pipeline

pub mod cluster;
pub mod container;
pub mod deployment;
pub mod error;
pub mod observer;
pub mod orchestrator;
pub mod routing;
pub mod scaling;
pub mod security;
pub mod task;

pub use cluster::{ClusterHandle, ClusterOptions};
pub use container::{ContainerSpec, ContainerSpecBuilder};
pub use deployment::{DeploymentConfig, DeploymentStrategy, ListenerConfig};
pub use error::{ConfigurationError, OrchestrationError, OrchestrationResult, ValidationError};
pub use observer::{EventLevel, ProvisionEvent, ProvisionObserver, Step};
pub use orchestrator::{ServiceOrchestrationResult, ServiceOrchestrator, ServiceProps};
pub use routing::LoadBalancerProps;
pub use scaling::{ScalingHandles, ScalingSummary};
pub use task::TaskDefinitionProps;
