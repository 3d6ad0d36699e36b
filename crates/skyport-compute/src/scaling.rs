//! CPU target-tracking auto scaling for a service's desired count.

use std::collections::BTreeMap;

use skyport_core::LogicalId;
use skyport_template::{
    Declared, PredefinedMetric, ProvisioningResult, Role, ScalableDimension, ScalableTarget,
    ScalingPolicy, Template,
};

pub const TARGET_CPU_UTILIZATION: f64 = 30.0;
pub const SCALE_IN_COOLDOWN_SECS: u64 = 60;
pub const SCALE_OUT_COOLDOWN_SECS: u64 = 60;

const AUTOSCALING_PRINCIPAL: &str = "application-autoscaling.amazonaws.com";
const AUTOSCALE_MANAGED_POLICY: &str = "service-role/AmazonEC2ContainerServiceAutoscaleRole";

#[derive(Debug, Clone)]
pub struct ScalingHandles {
    pub role: Declared<Role>,
    pub target: Declared<ScalableTarget>,
    pub policy: Declared<ScalingPolicy>,
}

/// Flattened view of the effective scaling behavior.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScalingSummary {
    pub min_capacity: u32,
    pub max_capacity: u32,
    pub target_utilization: f64,
    pub scale_in_cooldown_secs: u64,
    pub scale_out_cooldown_secs: u64,
}

impl ScalingHandles {
    pub fn summary(&self) -> ScalingSummary {
        ScalingSummary {
            min_capacity: self.target.properties.min_capacity,
            max_capacity: self.target.properties.max_capacity,
            target_utilization: self.policy.properties.target_value,
            scale_in_cooldown_secs: self.policy.properties.scale_in_cooldown_secs,
            scale_out_cooldown_secs: self.policy.properties.scale_out_cooldown_secs,
        }
    }
}

/// Attach a scaling role, scalable target and CPU tracking policy to `service`.
pub fn attach(
    template: &mut Template,
    scope: &str,
    name: &str,
    cluster: &LogicalId,
    service: &LogicalId,
    min_capacity: u32,
    max_capacity: u32,
) -> ProvisioningResult<ScalingHandles> {
    let role = template.declare(
        scope,
        &format!("{name}AutoScalingRole"),
        Role {
            role_name: None,
            assumed_by: AUTOSCALING_PRINCIPAL.to_string(),
            description: Some(format!("Scales the desired count of {name}")),
            managed_policies: vec![AUTOSCALE_MANAGED_POLICY.to_string()],
            inline_policies: BTreeMap::new(),
        },
    )?;

    let target = template.declare(
        scope,
        &format!("{name}ScalableTarget"),
        ScalableTarget {
            cluster: cluster.clone(),
            service: service.clone(),
            dimension: ScalableDimension::ServiceDesiredCount,
            min_capacity,
            max_capacity,
            role: role.logical_id.clone(),
        },
    )?;

    let policy = template.declare(
        scope,
        &format!("{name}CpuScalingPolicy"),
        ScalingPolicy {
            scaling_target: target.logical_id.clone(),
            predefined_metric: PredefinedMetric::ServiceAverageCpuUtilization,
            target_value: TARGET_CPU_UTILIZATION,
            scale_in_cooldown_secs: SCALE_IN_COOLDOWN_SECS,
            scale_out_cooldown_secs: SCALE_OUT_COOLDOWN_SECS,
        },
    )?;

    Ok(ScalingHandles {
        role,
        target,
        policy,
    })
}
