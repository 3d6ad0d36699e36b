//! Shared types used across skyport crates.
//!
//! Handles in this module describe resources that were declared by one
//! component and are consumed read-only by another: the network produced by
//! the network provider, identities and log sinks produced by the assembler,
//! and the image reference resolved from the registry.

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Number of hex characters of the path digest appended to a logical id.
const LOGICAL_ID_HASH_LEN: usize = 8;

/// Stable identifier of a declared resource within a template.
///
/// Derived from the construct path: the alphanumeric characters of every
/// path segment, followed by a short digest of the full `/`-joined path so
/// that `a/bc` and `ab/c` never collide.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LogicalId(String);

impl LogicalId {
    /// Derive a logical id from construct path segments. Empty segments are skipped.
    pub fn from_path(segments: &[&str]) -> Self {
        let segments: Vec<&str> = segments.iter().copied().filter(|s| !s.is_empty()).collect();
        let human: String = segments
            .iter()
            .flat_map(|s| s.chars())
            .filter(|c| c.is_ascii_alphanumeric())
            .collect();
        let digest = Sha256::digest(segments.join("/").as_bytes());
        let mut hash = hex::encode_upper(digest);
        hash.truncate(LOGICAL_ID_HASH_LEN);
        Self(format!("{human}{hash}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LogicalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Transport protocol of a container port or security rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Protocol {
    #[default]
    Tcp,
    Udp,
}

/// Protocol spoken by a load balancer listener or target group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationProtocol {
    #[default]
    Http,
    Https,
}

impl ApplicationProtocol {
    pub fn label(&self) -> &'static str {
        match self {
            ApplicationProtocol::Http => "HTTP",
            ApplicationProtocol::Https => "HTTPS",
        }
    }
}

// ── Network ───────────────────────────────────────────────────────

/// One subnet of a provisioned network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubnetRef {
    pub logical_id: LogicalId,
    pub availability_zone: String,
    pub cidr: String,
}

/// An ordered group of subnets sharing the same routing (public or private).
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SubnetGroup {
    pub subnets: Vec<SubnetRef>,
}

impl SubnetGroup {
    pub fn ids(&self) -> Vec<LogicalId> {
        self.subnets.iter().map(|s| s.logical_id.clone()).collect()
    }

    pub fn availability_zones(&self) -> Vec<String> {
        self.subnets.iter().map(|s| s.availability_zone.clone()).collect()
    }

    pub fn contains(&self, id: &LogicalId) -> bool {
        self.subnets.iter().any(|s| &s.logical_id == id)
    }

    pub fn is_empty(&self) -> bool {
        self.subnets.is_empty()
    }

    pub fn len(&self) -> usize {
        self.subnets.len()
    }
}

/// A provisioned network, shared read-only by the cluster provisioner and
/// the service orchestrator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkHandle {
    pub network: LogicalId,
    pub cidr: String,
    pub public_subnets: SubnetGroup,
    pub private_subnets: SubnetGroup,
    pub availability_zones: Vec<String>,
}

impl NetworkHandle {
    /// Resolve a subnet selection against this network.
    ///
    /// Returns `None` when an explicitly listed subnet is not part of either group.
    pub fn select(&self, selection: &SubnetSelection) -> Option<Vec<LogicalId>> {
        match selection {
            SubnetSelection::Public => Some(self.public_subnets.ids()),
            SubnetSelection::Private => Some(self.private_subnets.ids()),
            SubnetSelection::Explicit(ids) => {
                let known = ids
                    .iter()
                    .all(|id| self.public_subnets.contains(id) || self.private_subnets.contains(id));
                known.then(|| ids.clone())
            }
        }
    }
}

/// Where a resource should be placed within a network.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubnetSelection {
    #[default]
    Public,
    Private,
    Explicit(Vec<LogicalId>),
}

// ── Identities, images, log sinks ─────────────────────────────────

/// A permission an identity has been granted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    PullImages,
    WriteLogs,
}

/// An opaque identity (role) that tasks run as.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityHandle {
    pub role: LogicalId,
    pub capabilities: Vec<Capability>,
}

impl IdentityHandle {
    pub fn new(role: LogicalId) -> Self {
        Self {
            role,
            capabilities: Vec::new(),
        }
    }

    pub fn has(&self, capability: Capability) -> bool {
        self.capabilities.contains(&capability)
    }

    /// Record a granted capability (idempotent).
    pub fn grant(&mut self, capability: Capability) {
        if !self.has(capability) {
            self.capabilities.push(capability);
        }
    }
}

/// Container image reference as resolved from a registry repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRef {
    pub repository: String,
    pub tag: String,
}

impl ImageRef {
    pub fn from_repository(repository: &str, tag: &str) -> Self {
        Self {
            repository: repository.to_string(),
            tag: tag.to_string(),
        }
    }
}

impl fmt::Display for ImageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.tag.is_empty() {
            write!(f, "{}", self.repository)
        } else {
            write!(f, "{}:{}", self.repository, self.tag)
        }
    }
}

/// Destination for container log output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogSinkHandle {
    pub log_group: LogicalId,
    pub stream_prefix: String,
}
