//! Event translation for natively watched custom resources.
//!
//! Raw add/update/delete callbacks become Added/Updated/Deleted notifications
//! according to whether the old and new states pass the opt-in filter.

use std::sync::Arc;

use kube::{Resource as KubeResource, ResourceExt};
use lostromos_core::{Resource, ResourceController};
use serde::Serialize;

use crate::filter::OptInFilter;
use crate::informer::RawHandler;
use crate::{ErrorReporter, WatchError};

/// Outcome of an update given the filter result for each side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Updated,
    /// Opted in: treated as an implicit add of the new state.
    Added,
    /// Opted out: treated as an implicit delete of the old state.
    Deleted,
    Dropped,
}

pub fn transition(old_passes: bool, new_passes: bool) -> Transition {
    match (old_passes, new_passes) {
        (true, true) => Transition::Updated,
        (false, true) => Transition::Added,
        (true, false) => Transition::Deleted,
        (false, false) => Transition::Dropped,
    }
}

/// Translator for custom resources watched directly (typically `DynamicObject`).
pub struct CrWatcher<C> {
    filter: OptInFilter,
    controller: C,
    reporter: Arc<dyn ErrorReporter>,
}

impl<C: ResourceController> CrWatcher<C> {
    pub fn new(filter: OptInFilter, controller: C, reporter: Arc<dyn ErrorReporter>) -> Self {
        Self { filter, controller, reporter }
    }

    pub fn controller(&self) -> &C { &self.controller }

    pub fn into_controller(self) -> C { self.controller }

    fn passes<K: KubeResource>(&self, obj: &K) -> bool { self.filter.passes(obj.annotations()) }

    fn convert<K: KubeResource + Serialize>(&self, obj: &K) -> Option<Resource> {
        match Resource::from_object(obj) {
            Ok(r) => Some(r),
            Err(source) => {
                self.reporter.report(&WatchError::Decode { object: obj.name_any(), source });
                None
            }
        }
    }
}

impl<K, C> RawHandler<K> for CrWatcher<C>
where
    K: KubeResource + Serialize,
    C: ResourceController,
{
    fn on_add(&mut self, obj: &K) {
        if !self.passes(obj) {
            return;
        }
        if let Some(r) = self.convert(obj) {
            self.controller.resource_added(r);
        }
    }

    fn on_update(&mut self, old: &K, new: &K) {
        match transition(self.passes(old), self.passes(new)) {
            Transition::Updated => {
                let (Some(o), Some(n)) = (self.convert(old), self.convert(new)) else { return };
                self.controller.resource_updated(o, n);
            }
            Transition::Added => {
                if let Some(n) = self.convert(new) {
                    self.controller.resource_added(n);
                }
            }
            Transition::Deleted => {
                if let Some(o) = self.convert(old) {
                    self.controller.resource_deleted(o);
                }
            }
            Transition::Dropped => {}
        }
    }

    fn on_delete(&mut self, obj: &K) {
        if !self.passes(obj) {
            return;
        }
        if let Some(r) = self.convert(obj) {
            self.controller.resource_deleted(r);
        }
    }

    fn on_relist(&mut self) { self.controller.relist_started() }

    fn on_synced(&mut self) { self.controller.notify_synced() }
}
