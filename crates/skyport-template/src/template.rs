//! Template — ordered store of declared resources.
//!
//! Provides typed declare/get/amend/list operations over resources. Every
//! write runs the same checks: unique construct path, unique physical name
//! per kind, references resolve to already-declared resources of the right
//! kind, and the platform property rules in [`crate::rules`].

use std::collections::{BTreeMap, HashMap, HashSet};

use serde::Serialize;
use skyport_core::LogicalId;
use tracing::{debug, trace};

use crate::error::{ProvisioningError, ProvisioningResult};
use crate::rules;
use crate::types::*;

/// A resource record that can be stored in a [`Template`].
pub trait TemplateResource: Clone + Sized {
    const KIND: ResourceKind;

    fn into_resource(self) -> Resource;
    fn from_resource(resource: &Resource) -> Option<&Self>;
    fn from_resource_mut(resource: &mut Resource) -> Option<&mut Self>;
}

macro_rules! template_resource {
    ($($variant:ident),* $(,)?) => {
        $(
            impl TemplateResource for $variant {
                const KIND: ResourceKind = ResourceKind::$variant;

                fn into_resource(self) -> Resource {
                    Resource::$variant(self)
                }

                fn from_resource(resource: &Resource) -> Option<&Self> {
                    match resource {
                        Resource::$variant(inner) => Some(inner),
                        _ => None,
                    }
                }

                fn from_resource_mut(resource: &mut Resource) -> Option<&mut Self> {
                    match resource {
                        Resource::$variant(inner) => Some(inner),
                        _ => None,
                    }
                }
            }
        )*
    };
}

template_resource!(
    Role,
    LogGroup,
    Network,
    Subnet,
    FlowLog,
    Cluster,
    SecurityGroup,
    TaskDefinition,
    LoadBalancer,
    Listener,
    TargetGroup,
    Service,
    ScalableTarget,
    ScalingPolicy,
);

/// Read-only snapshot of a declared resource.
#[derive(Debug, Clone, PartialEq)]
pub struct Declared<T> {
    pub logical_id: LogicalId,
    pub properties: T,
}

struct Entry {
    logical_id: LogicalId,
    path: String,
    resource: Resource,
}

/// One resource in synthesized output.
#[derive(Debug, Clone, Serialize)]
pub struct SynthesizedResource {
    pub logical_id: LogicalId,
    pub path: String,
    #[serde(flatten)]
    pub resource: Resource,
}

/// The full synthesized document.
#[derive(Debug, Clone, Serialize)]
pub struct SynthesizedTemplate {
    pub stack: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub tags: BTreeMap<String, String>,
    pub resources: Vec<SynthesizedResource>,
}

/// Ordered, validated collection of declared resources for one stack.
pub struct Template {
    stack: String,
    description: Option<String>,
    tags: BTreeMap<String, String>,
    entries: Vec<Entry>,
    index: HashMap<LogicalId, usize>,
    names: HashSet<(ResourceKind, String)>,
}

impl Template {
    pub fn new(stack: &str) -> Self {
        Self {
            stack: stack.to_string(),
            description: None,
            tags: BTreeMap::new(),
            entries: Vec::new(),
            index: HashMap::new(),
            names: HashSet::new(),
        }
    }

    pub fn stack(&self) -> &str {
        &self.stack
    }

    /// Stack-level description carried into synthesized output.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Tags applied to the whole stack.
    pub fn with_tags(mut self, tags: BTreeMap<String, String>) -> Self {
        self.tags.extend(tags);
        self
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn tags(&self) -> &BTreeMap<String, String> {
        &self.tags
    }

    /// Declare a new resource at construct path `scope/id`.
    pub fn declare<T: TemplateResource>(
        &mut self,
        scope: &str,
        id: &str,
        properties: T,
    ) -> ProvisioningResult<Declared<T>> {
        let logical_id = LogicalId::from_path(&[scope, id]);
        let path = [scope, id]
            .iter()
            .filter(|s| !s.is_empty())
            .copied()
            .collect::<Vec<_>>()
            .join("/");

        if self.index.contains_key(&logical_id) {
            return Err(ProvisioningError::DuplicateLogicalId(path));
        }

        let resource = properties.clone().into_resource();
        self.check(&logical_id, &resource)?;

        if let Some(name) = resource.physical_name() {
            let key = (T::KIND, name.to_string());
            if self.names.contains(&key) {
                return Err(ProvisioningError::NameCollision {
                    kind: T::KIND,
                    name: name.to_string(),
                });
            }
            self.names.insert(key);
        }

        debug!(kind = %T::KIND, %logical_id, %path, "declared resource");
        self.index.insert(logical_id.clone(), self.entries.len());
        self.entries.push(Entry {
            logical_id: logical_id.clone(),
            path,
            resource,
        });

        Ok(Declared {
            logical_id,
            properties,
        })
    }

    /// Fetch a typed snapshot of a declared resource.
    pub fn get<T: TemplateResource>(&self, logical_id: &LogicalId) -> ProvisioningResult<Declared<T>> {
        let entry = self.entry(logical_id)?;
        let properties = T::from_resource(&entry.resource)
            .ok_or_else(|| ProvisioningError::NotFound(format!("{} {logical_id}", T::KIND)))?;
        Ok(Declared {
            logical_id: logical_id.clone(),
            properties: properties.clone(),
        })
    }

    /// Modify a declared resource in place.
    ///
    /// The change is applied to a copy and only stored if it passes the
    /// same checks as a fresh declaration. Physical names cannot change.
    pub fn amend<T, F>(&mut self, logical_id: &LogicalId, f: F) -> ProvisioningResult<Declared<T>>
    where
        T: TemplateResource,
        F: FnOnce(&mut T),
    {
        let idx = *self
            .index
            .get(logical_id)
            .ok_or_else(|| ProvisioningError::NotFound(logical_id.to_string()))?;

        let mut updated = self.entries[idx].resource.clone();
        let before_name = updated.physical_name().map(str::to_string);
        let inner = T::from_resource_mut(&mut updated)
            .ok_or_else(|| ProvisioningError::NotFound(format!("{} {logical_id}", T::KIND)))?;
        f(inner);

        if updated.physical_name().map(str::to_string) != before_name {
            return Err(ProvisioningError::InvalidProperty {
                kind: T::KIND,
                logical_id: logical_id.clone(),
                reason: "physical name cannot change after declaration".to_string(),
            });
        }
        self.check(logical_id, &updated)?;

        trace!(kind = %T::KIND, %logical_id, "amended resource");
        self.entries[idx].resource = updated;
        self.get(logical_id)
    }

    /// All declared resources of one type, in declaration order.
    pub fn list<T: TemplateResource>(&self) -> Vec<Declared<T>> {
        self.entries
            .iter()
            .filter_map(|e| {
                T::from_resource(&e.resource).map(|p| Declared {
                    logical_id: e.logical_id.clone(),
                    properties: p.clone(),
                })
            })
            .collect()
    }

    pub fn count(&self, kind: ResourceKind) -> usize {
        self.entries.iter().filter(|e| e.resource.kind() == kind).count()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Logical ids in declaration order.
    pub fn logical_ids(&self) -> Vec<LogicalId> {
        self.entries.iter().map(|e| e.logical_id.clone()).collect()
    }

    /// Produce the final document. Fails if a listener was left without a default action.
    pub fn synthesize(&self) -> ProvisioningResult<SynthesizedTemplate> {
        for entry in &self.entries {
            if let Resource::Listener(listener) = &entry.resource
                && listener.default_action.is_none()
            {
                return Err(ProvisioningError::InvalidProperty {
                    kind: ResourceKind::Listener,
                    logical_id: entry.logical_id.clone(),
                    reason: "listener has no default action".to_string(),
                });
            }
        }

        Ok(SynthesizedTemplate {
            stack: self.stack.clone(),
            description: self.description.clone(),
            tags: self.tags.clone(),
            resources: self
                .entries
                .iter()
                .map(|e| SynthesizedResource {
                    logical_id: e.logical_id.clone(),
                    path: e.path.clone(),
                    resource: e.resource.clone(),
                })
                .collect(),
        })
    }

    pub fn to_json_pretty(&self) -> ProvisioningResult<String> {
        let doc = self.synthesize()?;
        serde_json::to_string_pretty(&doc).map_err(|e| ProvisioningError::Serialize(e.to_string()))
    }

    fn entry(&self, logical_id: &LogicalId) -> ProvisioningResult<&Entry> {
        self.index
            .get(logical_id)
            .map(|&idx| &self.entries[idx])
            .ok_or_else(|| ProvisioningError::NotFound(logical_id.to_string()))
    }

    fn check(&self, logical_id: &LogicalId, resource: &Resource) -> ProvisioningResult<()> {
        for (target, expected) in resource.references() {
            let resolved = self
                .index
                .get(target)
                .map(|&idx| self.entries[idx].resource.kind());
            if resolved != Some(expected) {
                return Err(ProvisioningError::DanglingReference {
                    from: logical_id.clone(),
                    to: target.clone(),
                    expected,
                });
            }
        }

        rules::check(resource).map_err(|reason| ProvisioningError::InvalidProperty {
            kind: resource.kind(),
            logical_id: logical_id.clone(),
            reason,
        })
    }
}
