//! Lostromos core types
//!
//! A [`Resource`] is an immutable snapshot of one custom resource document as
//! delivered by a watch event. Resources are grouped by [`TypeKey`]
//! (`apiVersion/kind`) and identified within a group by their self link.

#![forbid(unsafe_code)]

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

pub mod decode;
pub mod diff;

pub use decode::{decode_resource, DecodeError};
pub use diff::{diff_summary, DiffSummary};

pub mod prelude {
    pub use super::{Resource, ResourceController, ResourceRef, TypeKey};
}

/// Partition key of the resource store: `apiVersion + "/" + kind`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TypeKey(String);

impl TypeKey {
    pub fn new(api_version: &str, kind: &str) -> Self {
        Self(format!("{}/{}", api_version, kind))
    }

    pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0) }
}

/// Non-owning reference to a stored resource. Resolving it against a store
/// after the resource was removed yields nothing.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceRef {
    pub type_key: TypeKey,
    pub identity: String,
}

/// One custom resource document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Resource {
    raw: Json,
}

impl Resource {
    /// Wrap a JSON document. Anything but a JSON object is rejected.
    pub fn from_value(raw: Json) -> Result<Self, DecodeError> {
        if !raw.is_object() {
            return Err(DecodeError::NotAnObject);
        }
        Ok(Self { raw })
    }

    /// Serialize a typed kube object (e.g. `DynamicObject`) into a resource,
    /// dropping `metadata.managedFields`.
    pub fn from_object<T: Serialize>(obj: &T) -> Result<Self, DecodeError> {
        let mut raw = serde_json::to_value(obj)?;
        strip_managed_fields(&mut raw);
        Self::from_value(raw)
    }

    pub fn raw(&self) -> &Json { &self.raw }

    pub fn into_raw(self) -> Json { self.raw }

    pub fn api_version(&self) -> &str {
        self.raw.get("apiVersion").and_then(|v| v.as_str()).unwrap_or("")
    }

    pub fn kind(&self) -> &str {
        self.raw.get("kind").and_then(|v| v.as_str()).unwrap_or("")
    }

    pub fn name(&self) -> &str { self.meta_str("name").unwrap_or("") }

    pub fn namespace(&self) -> Option<&str> {
        self.meta_str("namespace").filter(|s| !s.is_empty())
    }

    pub fn type_key(&self) -> TypeKey { TypeKey::new(self.api_version(), self.kind()) }

    /// Stable identity: `metadata.selfLink` when present, otherwise the path
    /// the API server would have served the object under.
    pub fn identity(&self) -> String {
        match self.meta_str("selfLink").filter(|s| !s.is_empty()) {
            Some(link) => link.to_string(),
            None => self_link(
                self.api_version(),
                &self.kind().to_ascii_lowercase(),
                self.namespace(),
                self.name(),
            ),
        }
    }

    pub fn reference(&self) -> ResourceRef {
        ResourceRef { type_key: self.type_key(), identity: self.identity() }
    }

    /// Annotations with string values. A missing map is an empty map.
    pub fn annotations(&self) -> BTreeMap<String, String> {
        self.raw
            .get("metadata")
            .and_then(|m| m.get("annotations"))
            .and_then(|a| a.as_object())
            .map(|obj| {
                obj.iter()
                    .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Render the scalar at `path` as a string; empty when absent.
    pub fn get_field(&self, path: &[&str]) -> String {
        let mut cur = &self.raw;
        for seg in path {
            match cur.get(*seg) {
                Some(v) => cur = v,
                None => return String::new(),
            }
        }
        match cur {
            Json::Null => String::new(),
            Json::String(s) => s.clone(),
            other => other.to_string(),
        }
    }

    pub fn set_self_link(&mut self, link: &str) { self.set_meta("selfLink", link) }

    pub fn set_namespace(&mut self, namespace: &str) { self.set_meta("namespace", namespace) }

    fn meta_str(&self, key: &str) -> Option<&str> {
        self.raw.get("metadata").and_then(|m| m.get(key)).and_then(|v| v.as_str())
    }

    fn set_meta(&mut self, key: &str, value: &str) {
        if let Some(obj) = self.raw.as_object_mut() {
            let meta = obj.entry("metadata").or_insert_with(|| Json::Object(serde_json::Map::new()));
            if let Some(meta) = meta.as_object_mut() {
                meta.insert(key.to_string(), Json::String(value.to_string()));
            }
        }
    }
}

/// Build an API path for an object. Core group versions live under `/api`.
pub fn self_link(api_version: &str, plural: &str, namespace: Option<&str>, name: &str) -> String {
    let base = if api_version.contains('/') { "/apis" } else { "/api" };
    match namespace {
        Some(ns) => format!("{}/{}/namespaces/{}/{}/{}", base, api_version, ns, plural, name),
        None => format!("{}/{}/{}/{}", base, api_version, plural, name),
    }
}

fn strip_managed_fields(v: &mut Json) {
    if let Some(meta) = v.get_mut("metadata") {
        if let Some(obj) = meta.as_object_mut() {
            obj.remove("managedFields");
        }
    }
}

/// Capability a deployment backend exposes to the watch side.
///
/// Notifications are informational, so nothing is returned: failures are
/// logged and counted by the implementation. `resource_updated` is also
/// delivered on relist/resync for unchanged objects and must be idempotent.
pub trait ResourceController: Send {
    fn resource_added(&mut self, resource: Resource);
    fn resource_updated(&mut self, old: Resource, new: Resource);
    fn resource_deleted(&mut self, resource: Resource);
    /// The initial list-and-watch pass (or a relist) has completed.
    fn notify_synced(&mut self);
    /// The watch restarted and is about to replay the full list.
    fn relist_started(&mut self) {}
}
