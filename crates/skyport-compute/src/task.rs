//! Task definition assembly.
//!
//! Caller-owned fields come from [`TaskDefinitionProps`]. Orchestrator-owned
//! fields are applied last and unconditionally: serverless compatibility,
//! per-task network interfaces, both identities, and cleared
//! placement/accelerator/ipc/pid settings.

use skyport_core::IdentityHandle;
use skyport_template::{Compatibility, NetworkMode, TaskDefinition};

use crate::container::ContainerSpec;

/// Container name used when the container is unnamed.
pub const DEFAULT_CONTAINER_NAME: &str = "container0";

/// Smallest serverless task size: a quarter vCPU with 512 MiB.
pub const DEFAULT_TASK_CPU: u32 = 256;
pub const DEFAULT_TASK_MEMORY_MIB: u32 = 512;

/// Caller-owned task-level properties.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskDefinitionProps {
    pub family: Option<String>,
    pub cpu: Option<u32>,
    pub memory_mib: Option<u32>,
    pub compatibility: Option<Compatibility>,
    pub network_mode: Option<NetworkMode>,
    pub placement_constraints: Vec<String>,
    pub inference_accelerators: Vec<String>,
    pub ipc_mode: Option<String>,
    pub pid_mode: Option<String>,
}

impl TaskDefinitionProps {
    /// Props sized at [`DEFAULT_TASK_CPU`] / [`DEFAULT_TASK_MEMORY_MIB`].
    pub fn serverless_default() -> Self {
        Self {
            cpu: Some(DEFAULT_TASK_CPU),
            memory_mib: Some(DEFAULT_TASK_MEMORY_MIB),
            ..Default::default()
        }
    }
}

/// An assembled task definition plus what was overridden on the way.
#[derive(Debug, Clone)]
pub struct TaskAssembly {
    pub definition: TaskDefinition,
    pub container_name: String,
    /// Caller-supplied fields that were replaced by orchestrator-owned values.
    pub overridden: Vec<&'static str>,
}

/// Merge caller props with the orchestrator-owned fields and attach `container`.
pub fn assemble(
    props: &TaskDefinitionProps,
    execution: &IdentityHandle,
    task: &IdentityHandle,
    container: &ContainerSpec,
) -> TaskAssembly {
    let mut overridden = Vec::new();
    if props.compatibility.is_some_and(|c| c != Compatibility::Fargate) {
        overridden.push("compatibility");
    }
    if props.network_mode.is_some_and(|m| m != NetworkMode::AwsVpc) {
        overridden.push("network_mode");
    }
    if !props.placement_constraints.is_empty() {
        overridden.push("placement_constraints");
    }
    if !props.inference_accelerators.is_empty() {
        overridden.push("inference_accelerators");
    }
    if props.ipc_mode.is_some() {
        overridden.push("ipc_mode");
    }
    if props.pid_mode.is_some() {
        overridden.push("pid_mode");
    }

    let container_name = container.name().unwrap_or(DEFAULT_CONTAINER_NAME).to_string();

    let definition = TaskDefinition {
        // Caller-owned.
        family: props.family.clone(),
        cpu: props.cpu,
        memory_mib: props.memory_mib,
        // Orchestrator-owned.
        compatibility: Compatibility::Fargate,
        network_mode: NetworkMode::AwsVpc,
        execution_role: Some(execution.role.clone()),
        task_role: Some(task.role.clone()),
        placement_constraints: Vec::new(),
        inference_accelerators: Vec::new(),
        ipc_mode: None,
        pid_mode: None,
        containers: vec![container.to_definition(&container_name)],
    };

    TaskAssembly {
        definition,
        container_name,
        overridden,
    }
}
