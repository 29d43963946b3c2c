//! ConfigMap shim: ConfigMaps annotated with a custom resource type carry
//! that resource as YAML under `data["crd"]`.

use std::sync::Arc;

use k8s_openapi::api::core::v1::ConfigMap;
use kube::ResourceExt;
use lostromos_core::{decode_resource, self_link, DecodeError, Resource, ResourceController};

use crate::filter::CrdTypeFilter;
use crate::informer::RawHandler;
use crate::translate::{transition, Transition};
use crate::{ErrorReporter, WatchError};

/// Decode the embedded payload. Identity and namespace come from the
/// ConfigMap since the payload never carries them.
pub fn config_map_to_resource(cm: &ConfigMap) -> Result<Resource, DecodeError> {
    let payload = cm
        .data
        .as_ref()
        .and_then(|d| d.get("crd"))
        .ok_or_else(|| DecodeError::MissingPayload(cm.name_any()))?;
    let mut resource = decode_resource(payload)?;
    let namespace = cm.namespace();
    let link = cm
        .metadata
        .self_link
        .clone()
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| self_link("v1", "configmaps", namespace.as_deref(), &cm.name_any()));
    resource.set_self_link(&link);
    if let Some(ns) = namespace {
        resource.set_namespace(&ns);
    }
    Ok(resource)
}

pub struct CmShim<C> {
    filter: CrdTypeFilter,
    controller: C,
    reporter: Arc<dyn ErrorReporter>,
}

impl<C: ResourceController> CmShim<C> {
    pub fn new(filter: CrdTypeFilter, controller: C, reporter: Arc<dyn ErrorReporter>) -> Self {
        Self { filter, controller, reporter }
    }

    pub fn controller(&self) -> &C { &self.controller }

    pub fn into_controller(self) -> C { self.controller }

    fn passes(&self, cm: &ConfigMap) -> bool { self.filter.passes(cm.annotations()) }

    fn decode(&self, cm: &ConfigMap) -> Option<Resource> {
        match config_map_to_resource(cm) {
            Ok(r) => Some(r),
            Err(source) => {
                self.reporter.report(&WatchError::Decode { object: cm.name_any(), source });
                None
            }
        }
    }
}

impl<C: ResourceController> RawHandler<ConfigMap> for CmShim<C> {
    fn on_add(&mut self, cm: &ConfigMap) {
        if !self.passes(cm) {
            return;
        }
        if let Some(r) = self.decode(cm) {
            self.controller.resource_added(r);
        }
    }

    fn on_update(&mut self, old: &ConfigMap, new: &ConfigMap) {
        let (old_passes, new_passes) = (self.passes(old), self.passes(new));
        // any failed decode drops the whole event
        let old_r = if old_passes {
            match self.decode(old) { Some(r) => Some(r), None => return }
        } else {
            None
        };
        let new_r = if new_passes {
            match self.decode(new) { Some(r) => Some(r), None => return }
        } else {
            None
        };
        match (transition(old_passes, new_passes), old_r, new_r) {
            (Transition::Updated, Some(o), Some(n)) => self.controller.resource_updated(o, n),
            (Transition::Added, _, Some(n)) => self.controller.resource_added(n),
            (Transition::Deleted, Some(o), _) => self.controller.resource_deleted(o),
            _ => {}
        }
    }

    fn on_delete(&mut self, cm: &ConfigMap) {
        if !self.passes(cm) {
            return;
        }
        if let Some(r) = self.decode(cm) {
            self.controller.resource_deleted(r);
        }
    }

    fn on_relist(&mut self) { self.controller.relist_started() }

    fn on_synced(&mut self) { self.controller.notify_synced() }
}
