//! Lostromos store: in-memory index of in-scope custom resources.
//!
//! Resources are grouped by [`TypeKey`] and keyed by identity within a group.
//! The store does no locking; its owner serializes all mutations.

#![forbid(unsafe_code)]

use std::collections::BTreeMap;

use lostromos_core::{Resource, ResourceRef, TypeKey};
use rustc_hash::FxHashMap;
use serde::Serialize;
use serde_json::Value as Json;
use tracing::debug;

#[derive(Debug, Default)]
pub struct CustomResources {
    groups: FxHashMap<TypeKey, FxHashMap<String, Resource>>,
    /// Most recently added resource, for single-resource templates.
    last_added: Option<ResourceRef>,
}

impl CustomResources {
    pub fn new() -> Self { Self::default() }

    /// Insert or overwrite by (type key, identity).
    pub fn add_or_replace(&mut self, resource: Resource) {
        let reference = resource.reference();
        debug!(kind = %reference.type_key, id = %reference.identity, "store add");
        self.groups
            .entry(reference.type_key.clone())
            .or_default()
            .insert(reference.identity.clone(), resource);
        self.last_added = Some(reference);
    }

    /// Remove by (type key, identity). Absent entries are a no-op.
    pub fn remove(&mut self, resource: &Resource) -> Option<Resource> {
        let reference = resource.reference();
        let group = self.groups.get_mut(&reference.type_key)?;
        let removed = group.remove(&reference.identity);
        if group.is_empty() {
            self.groups.remove(&reference.type_key);
        }
        if removed.is_some() && self.last_added.as_ref() == Some(&reference) {
            self.last_added = None;
        }
        debug!(kind = %reference.type_key, id = %reference.identity, found = removed.is_some(), "store remove");
        removed
    }

    /// All members of the `apiVersion/kind` group, ordered by identity.
    pub fn query(&self, kind: &str, api_version: &str) -> Vec<&Resource> {
        self.group(&TypeKey::new(api_version, kind))
    }

    pub fn group(&self, key: &TypeKey) -> Vec<&Resource> {
        let Some(group) = self.groups.get(key) else { return Vec::new() };
        let mut out: Vec<(&String, &Resource)> = group.iter().collect();
        out.sort_by(|a, b| a.0.cmp(b.0));
        out.into_iter().map(|(_, r)| r).collect()
    }

    pub fn get(&self, reference: &ResourceRef) -> Option<&Resource> {
        self.groups.get(&reference.type_key)?.get(&reference.identity)
    }

    pub fn count(&self) -> usize { self.groups.values().map(|g| g.len()).sum() }

    pub fn group_count(&self, key: &TypeKey) -> usize { self.groups.get(key).map_or(0, |g| g.len()) }

    pub fn is_empty(&self) -> bool { self.count() == 0 }

    /// Empty every group. Only used when a batch rebuild starts.
    pub fn purge_all(&mut self) {
        debug!(count = self.count(), "store purge");
        self.groups.clear();
        self.last_added = None;
    }

    /// Resolve the last-added reference; `None` once that resource is gone.
    pub fn last_added(&self) -> Option<&Resource> {
        self.last_added.as_ref().and_then(|r| self.get(r))
    }

    /// Name of the last-added resource, or empty.
    pub fn name(&self) -> &str { self.last_added().map_or("", |r| r.name()) }

    /// Field of the last-added resource, or empty.
    pub fn get_field(&self, path: &[&str]) -> String {
        self.last_added().map(|r| r.get_field(path)).unwrap_or_default()
    }

    /// Owned view of the current contents for rendering.
    pub fn snapshot(&self) -> StoreSnapshot {
        let resources = self
            .groups
            .keys()
            .map(|key| {
                let docs = self.group(key).into_iter().map(|r| r.raw().clone()).collect();
                (key.to_string(), docs)
            })
            .collect();
        StoreSnapshot {
            resources,
            resource: self.last_added().map(|r| r.raw().clone()),
            name: self.name().to_string(),
            count: self.count(),
        }
    }
}

/// Render input: every stored document grouped by type key, plus the
/// last-added document for single-resource templates.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StoreSnapshot {
    pub resources: BTreeMap<String, Vec<Json>>,
    pub resource: Option<Json>,
    pub name: String,
    pub count: usize,
}
