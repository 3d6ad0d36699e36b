//! skyport-template — the declarative resource template.
//!
//! Every resource the stack needs (network, roles, security groups, task
//! definitions, load balancers, services, scaling policies) is declared
//! into a [`Template`]. The template plays the part of the underlying
//! execution platform: it rejects naming collisions, references to
//! resources that were never declared, and property combinations the
//! platform does not support. It never materializes anything; synthesis
//! emits a JSON document in declaration order.
//!
//! # Architecture
//!
//! ```text
//! Template
//!   ├── entries  (declaration order, LogicalId → Resource)
//!   ├── names    (physical-name uniqueness per kind)
//!   └── rules    (platform property checks, run on declare and amend)
//! ```

pub mod error;
pub mod rules;
pub mod template;
pub mod types;

pub use error::{ProvisioningError, ProvisioningResult};
pub use template::{Declared, SynthesizedResource, SynthesizedTemplate, Template, TemplateResource};
pub use types::*;
