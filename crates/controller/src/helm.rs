//! Release reconciler: one helm release per resource.

use std::collections::BTreeSet;

use lostromos_apply::helm::values_artifact;
use lostromos_apply::ReleaseExecutor;
use lostromos_core::{diff_summary, Resource, ResourceController};
use tracing::{debug, enabled, error, info, Level};

use crate::telemetry::{self, Action};
use crate::ReconcileError;

pub struct HelmController<E> {
    executor: E,
    prefix: String,
    installed: BTreeSet<String>,
}

impl<E: ReleaseExecutor> HelmController<E> {
    pub fn new(executor: E, prefix: impl Into<String>) -> Self {
        Self { executor, prefix: prefix.into(), installed: BTreeSet::new() }
    }

    pub fn executor(&self) -> &E { &self.executor }

    /// Releases this controller has installed and not yet uninstalled.
    pub fn installed(&self) -> impl Iterator<Item = &str> { self.installed.iter().map(String::as_str) }

    pub fn release_name(&self, resource: &Resource) -> String { format!("{}-{}", self.prefix, resource.name()) }

    fn install(&self, resource: &Resource) -> Result<String, ReconcileError> {
        let values = values_artifact(resource)?;
        Ok(self.executor.install_or_upgrade(&self.release_name(resource), &values)?)
    }

    fn record(&mut self, release: &str, action: Action, result: Result<String, ReconcileError>) {
        match result {
            Ok(out) => {
                debug!(release = %release, action = action.as_str(), cmd_output = %out, "release reconciled");
                telemetry::succeeded(action);
                if action == Action::Delete {
                    self.installed.remove(release);
                } else {
                    self.installed.insert(release.to_string());
                }
                telemetry::managed(self.installed.len());
            }
            Err(e) => {
                error!(release = %release, action = action.as_str(), error = %e, cmd_output = %e.output(), "release failed");
                telemetry::failed(action);
            }
        }
    }
}

impl<E: ReleaseExecutor> ResourceController for HelmController<E> {
    fn resource_added(&mut self, resource: Resource) {
        let release = self.release_name(&resource);
        info!(resource = %resource.name(), release = %release, "resource added");
        let result = self.install(&resource);
        self.record(&release, Action::Create, result);
    }

    fn resource_updated(&mut self, old: Resource, new: Resource) {
        let release = self.release_name(&new);
        info!(resource = %new.name(), release = %release, "resource updated");
        if enabled!(Level::DEBUG) {
            let d = diff_summary(new.raw(), old.raw());
            debug!(release = %release, adds = d.adds, updates = d.updates, removes = d.removes, "update diff");
        }
        let result = self.install(&new);
        self.record(&release, Action::Update, result);
    }

    fn resource_deleted(&mut self, resource: Resource) {
        let release = self.release_name(&resource);
        info!(resource = %resource.name(), release = %release, "resource deleted");
        let result = self.executor.uninstall(&release).map_err(ReconcileError::from);
        self.record(&release, Action::Delete, result);
    }

    fn notify_synced(&mut self) { info!("initial sync complete"); }
}
