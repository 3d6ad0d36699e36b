//! Platform property rules.
//!
//! These are the checks the execution platform applies when a resource is
//! created. A failing rule surfaces as `ProvisioningError::InvalidProperty`.

use crate::types::*;

/// Supported serverless task sizes: (cpu units, allowed memory range in MiB).
const SERVERLESS_TASK_SIZES: &[(u32, &[u32])] = &[
    (256, &[512, 1024, 2048]),
    (512, &[1024, 2048, 3072, 4096]),
    (1024, &[2048, 3072, 4096, 5120, 6144, 7168, 8192]),
];

/// Larger sizes allow any multiple of 1024 MiB within the range.
const SERVERLESS_STEPPED_SIZES: &[(u32, u32, u32)] = &[(2048, 4096, 16384), (4096, 8192, 30720)];

/// Check a resource against the platform's rules.
pub fn check(resource: &Resource) -> Result<(), String> {
    match resource {
        Resource::Network(n) => check_network(n),
        Resource::LogGroup(l) => check_log_group(l),
        Resource::SecurityGroup(sg) => check_security_group(sg),
        Resource::TaskDefinition(td) => check_task_definition(td),
        Resource::Listener(l) => check_port(l.port, "listener port"),
        Resource::TargetGroup(tg) => check_target_group(tg),
        Resource::ScalableTarget(st) => check_scalable_target(st),
        Resource::ScalingPolicy(p) => check_scaling_policy(p),
        Resource::Role(r) if r.assumed_by.trim().is_empty() => {
            Err("role must name a principal that may assume it".to_string())
        }
        _ => Ok(()),
    }
}

/// Whether a task-level cpu/memory pair is a supported serverless size.
pub fn is_supported_serverless_size(cpu: u32, memory_mib: u32) -> bool {
    if let Some((_, allowed)) = SERVERLESS_TASK_SIZES.iter().find(|(c, _)| *c == cpu) {
        return allowed.contains(&memory_mib);
    }
    SERVERLESS_STEPPED_SIZES
        .iter()
        .any(|(c, lo, hi)| *c == cpu && (*lo..=*hi).contains(&memory_mib) && memory_mib % 1024 == 0)
}

fn check_port(port: u16, what: &str) -> Result<(), String> {
    if port == 0 {
        return Err(format!("{what} must be between 1 and 65535"));
    }
    Ok(())
}

fn check_network(n: &Network) -> Result<(), String> {
    if n.max_azs == 0 {
        return Err("network must span at least one availability zone".to_string());
    }
    Ok(())
}

fn check_log_group(l: &LogGroup) -> Result<(), String> {
    if l.retention_days == 0 {
        return Err("log retention must be at least one day".to_string());
    }
    Ok(())
}

fn check_security_group(sg: &SecurityGroup) -> Result<(), String> {
    for rule in &sg.ingress {
        check_port(rule.port, "ingress port")?;
    }
    Ok(())
}

fn check_task_definition(td: &TaskDefinition) -> Result<(), String> {
    if td.containers.is_empty() {
        return Err("task definition must declare at least one container".to_string());
    }

    for container in &td.containers {
        if container.image.repository.trim().is_empty() {
            return Err(format!("container '{}' has an empty image repository", container.name));
        }
        for mapping in &container.port_mappings {
            check_port(mapping.container_port, "container port")?;
        }
    }

    let mut names: Vec<&str> = td.containers.iter().map(|c| c.name.as_str()).collect();
    names.sort_unstable();
    if names.windows(2).any(|w| w[0] == w[1]) {
        return Err("container names must be unique within a task definition".to_string());
    }

    if td.compatibility == Compatibility::Ec2 {
        return Ok(());
    }

    // Serverless tasks.
    if td.network_mode != NetworkMode::AwsVpc {
        return Err("serverless tasks require the awsvpc network mode".to_string());
    }
    if !td.placement_constraints.is_empty() {
        return Err("serverless tasks do not support placement constraints".to_string());
    }
    if !td.inference_accelerators.is_empty() {
        return Err("serverless tasks do not support inference accelerators".to_string());
    }
    if td.ipc_mode.is_some() || td.pid_mode.is_some() {
        return Err("serverless tasks do not support ipc or pid modes".to_string());
    }

    let (cpu, memory) = match (td.cpu, td.memory_mib) {
        (Some(cpu), Some(memory)) => (cpu, memory),
        _ => return Err("serverless tasks must declare task cpu and memory".to_string()),
    };
    if !is_supported_serverless_size(cpu, memory) {
        return Err(format!("unsupported serverless task size: cpu={cpu} memory={memory}MiB"));
    }

    let container_memory: u32 = td
        .containers
        .iter()
        .map(|c| c.memory_limit_mib.or(c.memory_reservation_mib).unwrap_or(0))
        .sum();
    if container_memory > memory {
        return Err(format!(
            "containers request {container_memory}MiB but the task provides {memory}MiB"
        ));
    }

    Ok(())
}

fn check_target_group(tg: &TargetGroup) -> Result<(), String> {
    check_port(tg.port, "target group port")?;
    let hc = &tg.health_check;
    if hc.timeout_secs >= hc.interval_secs {
        return Err("health check timeout must be shorter than its interval".to_string());
    }
    if !hc.path.starts_with('/') {
        return Err(format!("health check path must start with '/': {}", hc.path));
    }
    if !(2..=10).contains(&hc.healthy_threshold) || !(2..=10).contains(&hc.unhealthy_threshold) {
        return Err("health check thresholds must be between 2 and 10".to_string());
    }
    Ok(())
}

fn check_scalable_target(st: &ScalableTarget) -> Result<(), String> {
    if st.min_capacity > st.max_capacity {
        return Err(format!(
            "min capacity {} exceeds max capacity {}",
            st.min_capacity, st.max_capacity
        ));
    }
    Ok(())
}

fn check_scaling_policy(p: &ScalingPolicy) -> Result<(), String> {
    if !(p.target_value > 0.0 && p.target_value <= 100.0) {
        return Err(format!("target utilization must be in (0, 100]: {}", p.target_value));
    }
    Ok(())
}
