use lostromos_core::{Resource, ResourceController};
use tracing::info;

/// Logs notifications and deploys nothing.
#[derive(Debug, Default)]
pub struct PrintController;

impl ResourceController for PrintController {
    fn resource_added(&mut self, resource: Resource) {
        info!(resource = %resource.name(), kind = %resource.kind(), "resource added");
    }

    fn resource_updated(&mut self, old: Resource, new: Resource) {
        info!(resource = %new.name(), kind = %new.kind(), changed = old != new, "resource updated");
    }

    fn resource_deleted(&mut self, resource: Resource) {
        info!(resource = %resource.name(), kind = %resource.kind(), "resource deleted");
    }

    fn notify_synced(&mut self) { info!("initial sync complete"); }

    fn relist_started(&mut self) { info!("relist started"); }
}
