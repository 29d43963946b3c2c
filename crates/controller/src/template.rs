//! Template reconciler: every stored resource is rendered into one artifact
//! that is applied (or deleted) as a whole.
//!
//! In batch mode nothing is applied until the informer reports a completed
//! list, so a partial view of the cluster is never deployed. A relist starts
//! a fresh batch: the store is purged and rebuilt from the replayed list.
//! If the rebuilt store comes back empty, what was deployed before the relist
//! is deleted.

use lostromos_apply::{Executor, Renderer};
use lostromos_core::{diff_summary, Resource, ResourceController};
use lostromos_store::{CustomResources, StoreSnapshot};
use tracing::{debug, enabled, error, info, Level};

use crate::telemetry::{self, Action};
use crate::ReconcileError;

pub struct TemplateController<R, E> {
    renderer: R,
    executor: E,
    store: CustomResources,
    synced: bool,
    batch_mode: bool,
    /// Store as last deployed, kept across a relist until the next sync.
    previous: Option<StoreSnapshot>,
    /// Adds held back while deferred.
    pending_creates: usize,
}

impl<R: Renderer, E: Executor> TemplateController<R, E> {
    pub fn new(renderer: R, executor: E, batch_mode: bool) -> Self {
        Self {
            renderer,
            executor,
            store: CustomResources::new(),
            synced: false,
            batch_mode,
            previous: None,
            pending_creates: 0,
        }
    }

    pub fn store(&self) -> &CustomResources { &self.store }

    pub fn is_synced(&self) -> bool { self.synced }

    pub fn is_batch(&self) -> bool { self.batch_mode }

    pub fn renderer(&self) -> &R { &self.renderer }

    pub fn executor(&self) -> &E { &self.executor }

    fn deferred(&self) -> bool { self.batch_mode && !self.synced }

    fn apply_snapshot(&self, snapshot: &StoreSnapshot) -> Result<String, ReconcileError> {
        let artifact = self.renderer.render(snapshot)?;
        Ok(self.executor.apply(&artifact)?)
    }

    fn delete_snapshot(&self, snapshot: &StoreSnapshot) -> Result<String, ReconcileError> {
        let artifact = self.renderer.render(snapshot)?;
        Ok(self.executor.delete(&artifact)?)
    }

    fn upsert(&mut self, resource: Resource, action: Action) {
        let name = resource.name().to_string();
        self.store.add_or_replace(resource);
        if self.deferred() {
            if action == Action::Create {
                self.pending_creates += 1;
            }
            info!(resource = %name, "controller still syncing; skipping template build");
            return;
        }
        let result = self.apply_snapshot(&self.store.snapshot());
        self.record(&name, action, result);
    }

    fn record(&self, name: &str, action: Action, result: Result<String, ReconcileError>) {
        match result {
            Ok(out) => {
                debug!(resource = %name, action = action.as_str(), cmd_output = %out, "artifact reconciled");
                telemetry::succeeded(action);
                telemetry::managed(self.store.count());
            }
            Err(e) => {
                error!(resource = %name, action = action.as_str(), error = %e, cmd_output = %e.output(), "reconcile failed");
                telemetry::failed(action);
            }
        }
    }
}

impl<R: Renderer, E: Executor> ResourceController for TemplateController<R, E> {
    fn resource_added(&mut self, resource: Resource) {
        info!(resource = %resource.name(), "resource added");
        self.upsert(resource, Action::Create);
    }

    fn resource_updated(&mut self, old: Resource, new: Resource) {
        info!(resource = %new.name(), "resource updated");
        if enabled!(Level::DEBUG) {
            let d = diff_summary(new.raw(), old.raw());
            debug!(resource = %new.name(), adds = d.adds, updates = d.updates, removes = d.removes, "update diff");
        }
        self.upsert(new, Action::Update);
    }

    fn resource_deleted(&mut self, resource: Resource) {
        let name = resource.name().to_string();
        info!(resource = %name, "resource deleted");
        let deferred = self.deferred();
        // The last resource has to be rendered before it leaves the store.
        let last = (!deferred && self.store.count() == 1 && self.store.get(&resource.reference()).is_some())
            .then(|| self.store.snapshot());
        if self.store.remove(&resource).is_none() {
            debug!(resource = %name, "deleted resource was not tracked");
        }
        if deferred {
            info!(resource = %name, "controller still syncing; skipping template build");
            return;
        }
        // One artifact covers the whole store, so a non-empty store is
        // re-applied. Resources mapped 1:1 to their own objects are not torn
        // down while any other resource remains.
        let result = match last {
            Some(before) => self.delete_snapshot(&before),
            None if !self.store.is_empty() => self.apply_snapshot(&self.store.snapshot()),
            None => self.delete_snapshot(&self.store.snapshot()),
        };
        self.record(&name, Action::Delete, result);
    }

    fn notify_synced(&mut self) {
        if self.synced {
            debug!("relist complete; store already current");
            return;
        }
        self.synced = true;
        let pending = std::mem::take(&mut self.pending_creates);
        let previous = self.previous.take();
        if let Some(previous) = previous.filter(|_| self.store.is_empty()) {
            info!("relist found no resources; deleting templates");
            match self.delete_snapshot(&previous) {
                Ok(out) => {
                    debug!(cmd_output = %out, "deleted after sync");
                    telemetry::succeeded(Action::Delete);
                    telemetry::managed(0);
                }
                Err(e) => {
                    error!(error = %e, cmd_output = %e.output(), "failed to delete templates after sync");
                    telemetry::failed(Action::Delete);
                    telemetry::sync_failed();
                }
            }
            return;
        }
        info!(resources = self.store.count(), "initial sync complete; building templates");
        match self.apply_snapshot(&self.store.snapshot()) {
            Ok(out) => {
                debug!(cmd_output = %out, "applied after sync");
                telemetry::created(pending);
                telemetry::managed(self.store.count());
            }
            Err(e) => {
                error!(error = %e, cmd_output = %e.output(), "failed to build template after sync");
                telemetry::sync_failed();
            }
        }
    }

    fn relist_started(&mut self) {
        if !self.batch_mode {
            return;
        }
        info!(dropped = self.store.count(), "relist started; rebuilding batch");
        // A second relist before the sync keeps the first deployed view.
        if self.synced && !self.store.is_empty() {
            self.previous = Some(self.store.snapshot());
        }
        self.store.purge_all();
        self.synced = false;
    }
}
