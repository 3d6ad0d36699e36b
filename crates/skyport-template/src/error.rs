//! Error types for resource declaration.

use skyport_core::LogicalId;
use thiserror::Error;

use crate::types::ResourceKind;

/// Result type alias for template operations.
pub type ProvisioningResult<T> = Result<T, ProvisioningError>;

/// Rejections raised by the platform while declaring resources.
#[derive(Debug, Error)]
pub enum ProvisioningError {
    #[error("{kind} name already in use: {name}")]
    NameCollision { kind: ResourceKind, name: String },

    #[error("construct path already declared: {0}")]
    DuplicateLogicalId(String),

    #[error("{from} references {to}, which is not a declared {expected}")]
    DanglingReference {
        from: LogicalId,
        to: LogicalId,
        expected: ResourceKind,
    },

    #[error("invalid property on {kind} {logical_id}: {reason}")]
    InvalidProperty {
        kind: ResourceKind,
        logical_id: LogicalId,
        reason: String,
    },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("serialization error: {0}")]
    Serialize(String),
}
