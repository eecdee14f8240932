//! Generic view over a managed resource document.
//!
//! The engine is polymorphic over resource kind, so a resource is kept as the
//! JSON object the API server returned. [`ManagedResource`] exposes only the
//! regions the engine reads or writes: the annotation and label maps, the
//! `spec` region, `status.conditions`, and the deletion marker.

use crate::error::{CoreError, CoreResult};
use crate::state::{PAUSE_STATE_ANNOTATION, PAUSED_ANNOTATION};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Condition type reporting that the external resource is available.
pub const CONDITION_READY: &str = "Ready";

/// Condition type reporting that the last reconcile succeeded.
pub const CONDITION_SYNCED: &str = "Synced";

/// A resource document of any kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ManagedResource(Map<String, Value>);

impl ManagedResource {
    /// Wrap a JSON value, which must be an object.
    pub fn from_value(value: Value) -> CoreResult<Self> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            other => Err(CoreError::InvalidResource(format!(
                "expected an object, found {}",
                kind_of(&other)
            ))),
        }
    }

    /// Borrow the underlying document.
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Convert back into a JSON value.
    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }

    /// `metadata.name`, if set.
    pub fn name(&self) -> Option<&str> {
        self.region(&["metadata", "name"]).and_then(Value::as_str)
    }

    /// `metadata.namespace`, if set.
    pub fn namespace(&self) -> Option<&str> {
        self.region(&["metadata", "namespace"])
            .and_then(Value::as_str)
    }

    /// `metadata.resourceVersion`, if set.
    pub fn resource_version(&self) -> Option<&str> {
        self.region(&["metadata", "resourceVersion"])
            .and_then(Value::as_str)
    }

    /// Set `metadata.resourceVersion`.
    pub fn set_resource_version(&mut self, version: impl Into<String>) {
        let metadata = object_entry(&mut self.0, "metadata");
        metadata.insert("resourceVersion".to_string(), Value::String(version.into()));
    }

    /// Look up a nested field. Returns `None` if any step is missing or null.
    pub fn region(&self, path: &[&str]) -> Option<&Value> {
        let (first, rest) = path.split_first()?;
        let mut current = self.0.get(*first)?;
        for key in rest {
            current = current.as_object()?.get(*key)?;
        }
        (!current.is_null()).then_some(current)
    }

    /// The desired-state region.
    pub fn spec(&self) -> Option<&Value> {
        self.region(&["spec"])
    }

    /// Value of a single annotation.
    pub fn annotation(&self, key: &str) -> Option<&str> {
        self.region(&["metadata", "annotations", key])
            .and_then(Value::as_str)
    }

    /// All string-valued annotations.
    pub fn annotations(&self) -> BTreeMap<String, String> {
        string_map(self.region(&["metadata", "annotations"]))
    }

    /// All string-valued labels.
    pub fn labels(&self) -> BTreeMap<String, String> {
        string_map(self.region(&["metadata", "labels"]))
    }

    /// Set an annotation, creating the metadata and annotation maps as needed.
    pub fn set_annotation(&mut self, key: &str, value: impl Into<String>) {
        let metadata = object_entry(&mut self.0, "metadata");
        let annotations = object_entry(metadata, "annotations");
        annotations.insert(key.to_string(), Value::String(value.into()));
    }

    /// Remove an annotation, returning its previous value.
    pub fn remove_annotation(&mut self, key: &str) -> Option<Value> {
        self.0
            .get_mut("metadata")?
            .as_object_mut()?
            .get_mut("annotations")?
            .as_object_mut()?
            .remove(key)
    }

    /// Whether the resource carries a deletion timestamp.
    pub fn is_deleting(&self) -> bool {
        match self.region(&["metadata", "deletionTimestamp"]) {
            Some(Value::String(ts)) => !ts.is_empty(),
            Some(_) => true,
            None => false,
        }
    }

    /// Parse `status.conditions`.
    ///
    /// A resource without a status or without conditions has none.
    pub fn conditions(&self) -> CoreResult<Vec<Condition>> {
        let Some(raw) = self.region(&["status", "conditions"]) else {
            return Ok(Vec::new());
        };
        let entries = raw.as_array().ok_or_else(|| {
            CoreError::InvalidResource(format!(
                "status.conditions must be a list, found {}",
                kind_of(raw)
            ))
        })?;

        entries
            .iter()
            .enumerate()
            .map(|(index, entry)| {
                Condition::deserialize(entry)
                    .map_err(|source| CoreError::MalformedCondition { index, source })
            })
            .collect()
    }

    /// Find the first condition of the given type.
    pub fn condition(&self, condition_type: &str) -> CoreResult<Option<Condition>> {
        Ok(self
            .conditions()?
            .into_iter()
            .find(|c| c.condition_type == condition_type))
    }

    /// Copy of this resource without the annotations owned by the pause engine.
    ///
    /// An annotation map emptied by the removal is dropped as well, so a
    /// resource that only ever carried the engine's markers compares equal
    /// to one that never had annotations.
    pub fn without_markers(&self) -> Self {
        let mut copy = self.clone();
        copy.strip_markers();
        copy
    }

    fn strip_markers(&mut self) {
        let Some(metadata) = self.0.get_mut("metadata").and_then(Value::as_object_mut) else {
            return;
        };
        let emptied = match metadata.get_mut("annotations").and_then(Value::as_object_mut) {
            Some(annotations) => {
                let had_markers = annotations.remove(PAUSED_ANNOTATION).is_some()
                    | annotations.remove(PAUSE_STATE_ANNOTATION).is_some();
                had_markers && annotations.is_empty()
            }
            None => false,
        };
        if emptied {
            metadata.remove("annotations");
        }
    }
}

impl TryFrom<Value> for ManagedResource {
    type Error = CoreError;

    fn try_from(value: Value) -> CoreResult<Self> {
        Self::from_value(value)
    }
}

impl From<ManagedResource> for Value {
    fn from(resource: ManagedResource) -> Self {
        resource.into_value()
    }
}

/// Status of a condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConditionStatus {
    /// The condition holds.
    True,
    /// The condition does not hold.
    False,
    /// The controller cannot tell. Unrecognised values land here too.
    #[default]
    #[serde(other)]
    Unknown,
}

/// A single entry of `status.conditions`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    /// Condition type, e.g. `Ready`.
    #[serde(rename = "type")]
    pub condition_type: String,

    /// Tri-state status.
    #[serde(default)]
    pub status: ConditionStatus,

    /// When the status last changed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_transition_time: Option<DateTime<Utc>>,

    /// Machine-readable reason.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,

    /// Human-readable message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl Condition {
    /// Whether the status is affirmatively true.
    pub fn is_true(&self) -> bool {
        self.status == ConditionStatus::True
    }
}

fn object_entry<'a>(map: &'a mut Map<String, Value>, key: &str) -> &'a mut Map<String, Value> {
    let entry = map
        .entry(key.to_string())
        .or_insert_with(|| Value::Object(Map::new()));
    if !entry.is_object() {
        *entry = Value::Object(Map::new());
    }
    match entry {
        Value::Object(inner) => inner,
        _ => unreachable!("entry was just replaced with an object"),
    }
}

fn string_map(value: Option<&Value>) -> BTreeMap<String, String> {
    value
        .and_then(Value::as_object)
        .map(|map| {
            map.iter()
                .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
                .collect()
        })
        .unwrap_or_default()
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "an object",
    }
}
