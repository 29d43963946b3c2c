//! Opt-in predicates deciding whether an object is in scope.
//!
//! Native custom resources and ConfigMap-carried payloads opt in differently,
//! so there are two predicates and they are never interchanged.

use std::collections::BTreeMap;

/// Annotation a ConfigMap uses to declare the custom resource type it carries.
pub const CRD_TYPE_ANNOTATION: &str = "com.wpengine.lostromos.crd-type";

/// Native CR filter: the resource opts in by carrying the annotation key.
/// The annotation value is irrelevant. Without a key everything passes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OptInFilter {
    key: Option<String>,
}

impl OptInFilter {
    pub fn new(key: Option<String>) -> Self {
        Self { key: key.filter(|k| !k.is_empty()) }
    }

    pub fn passes(&self, annotations: &BTreeMap<String, String>) -> bool {
        match &self.key {
            None => true,
            Some(key) => annotations.contains_key(key),
        }
    }
}

/// ConfigMap filter: passes iff [`CRD_TYPE_ANNOTATION`] equals the required type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrdTypeFilter {
    required: String,
}

impl CrdTypeFilter {
    pub fn new(required: impl Into<String>) -> Self {
        Self { required: required.into() }
    }

    pub fn required(&self) -> &str { &self.required }

    pub fn passes(&self, annotations: &BTreeMap<String, String>) -> bool {
        annotations.get(CRD_TYPE_ANNOTATION).is_some_and(|v| *v == self.required)
    }
}
