//! Per-call orchestration events.
//!
//! The orchestrator reports each step through `tracing` and, when one is
//! installed, through a [`ProvisionObserver`] callback. Every event names
//! the service whose `add_service` call produced it, so one observer can
//! follow several calls on the same orchestrator.

use std::fmt;

use skyport_core::LogicalId;

/// Severity of an orchestration event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum EventLevel {
    Trace,
    Info,
    Warn,
    Error,
}

/// Orchestration step an event belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Preconditions,
    SecurityBoundaries,
    TaskDefinition,
    LoadBalancer,
    Service,
    ProductionTargetGroup,
    TestPath,
    AutoScaling,
}

impl Step {
    pub fn label(&self) -> &'static str {
        match self {
            Step::Preconditions => "preconditions",
            Step::SecurityBoundaries => "security_boundaries",
            Step::TaskDefinition => "task_definition",
            Step::LoadBalancer => "load_balancer",
            Step::Service => "service",
            Step::ProductionTargetGroup => "production_target_group",
            Step::TestPath => "test_path",
            Step::AutoScaling => "auto_scaling",
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One leveled event emitted during `add_service`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionEvent {
    pub level: EventLevel,
    pub step: Step,
    /// Name of the service being added.
    pub service: String,
    pub message: String,
    /// Resource the event concerns, if any.
    pub logical_id: Option<LogicalId>,
}

/// Callback receiving orchestration events.
pub type ProvisionObserver = Box<dyn Fn(&ProvisionEvent) + Send + Sync>;
