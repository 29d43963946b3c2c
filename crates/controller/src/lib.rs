//! Lostromos controller: reconcilers for each deployment backend and the
//! sequential loop that feeds them.

#![forbid(unsafe_code)]

use lostromos_apply::{ExecError, Helm, Kubectl, RenderError, TemplateRenderer};
use lostromos_core::{Resource, ResourceController};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info};

pub mod helm;
pub mod print;
mod telemetry;
pub mod template;

pub use helm::HelmController;
pub use print::PrintController;
pub use template::TemplateController;

/// A failed render or executor call while reconciling one notification.
#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error(transparent)]
    Exec(#[from] ExecError),
}

impl ReconcileError {
    pub fn output(&self) -> &str {
        match self {
            ReconcileError::Render(_) => "",
            ReconcileError::Exec(e) => e.output(),
        }
    }
}

/// The backend chosen at startup.
pub enum Controller {
    Template(TemplateController<TemplateRenderer, Kubectl>),
    Helm(HelmController<Helm>),
    Print(PrintController),
}

impl Controller {
    pub fn backend(&self) -> &'static str {
        match self {
            Controller::Template(_) => "template",
            Controller::Helm(_) => "helm",
            Controller::Print(_) => "print",
        }
    }

    fn inner(&mut self) -> &mut dyn ResourceController {
        match self {
            Controller::Template(c) => c,
            Controller::Helm(c) => c,
            Controller::Print(c) => c,
        }
    }
}

impl ResourceController for Controller {
    fn resource_added(&mut self, resource: Resource) {
        telemetry::event_seen();
        self.inner().resource_added(resource)
    }

    fn resource_updated(&mut self, old: Resource, new: Resource) {
        telemetry::event_seen();
        self.inner().resource_updated(old, new)
    }

    fn resource_deleted(&mut self, resource: Resource) {
        telemetry::event_seen();
        self.inner().resource_deleted(resource)
    }

    fn notify_synced(&mut self) { self.inner().notify_synced() }

    fn relist_started(&mut self) { self.inner().relist_started() }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    Added(Resource),
    Updated(Resource, Resource),
    Deleted(Resource),
    RelistStarted,
    Synced,
}

impl Notification {
    pub fn deliver<C: ResourceController + ?Sized>(self, controller: &mut C) {
        match self {
            Notification::Added(r) => controller.resource_added(r),
            Notification::Updated(old, new) => controller.resource_updated(old, new),
            Notification::Deleted(r) => controller.resource_deleted(r),
            Notification::RelistStarted => controller.relist_started(),
            Notification::Synced => controller.notify_synced(),
        }
    }
}

/// Forwards notifications into the dispatch loop. The sync signal travels
/// the same channel, so it is ordered with every other notification.
#[derive(Debug, Clone)]
pub struct ChannelController {
    tx: mpsc::UnboundedSender<Notification>,
}

impl ChannelController {
    fn send(&self, n: Notification) {
        if self.tx.send(n).is_err() {
            debug!("dispatch loop gone; notification dropped");
        }
    }
}

impl ResourceController for ChannelController {
    fn resource_added(&mut self, resource: Resource) { self.send(Notification::Added(resource)) }
    fn resource_updated(&mut self, old: Resource, new: Resource) { self.send(Notification::Updated(old, new)) }
    fn resource_deleted(&mut self, resource: Resource) { self.send(Notification::Deleted(resource)) }
    fn notify_synced(&mut self) { self.send(Notification::Synced) }
    fn relist_started(&mut self) { self.send(Notification::RelistStarted) }
}

/// Deliver notifications one at a time until every sender is dropped or the
/// stop flag is raised. A notification already being handled runs to
/// completion; nothing after the stop flag is delivered.
pub fn run_dispatch<C: ResourceController + ?Sized>(
    mut rx: mpsc::UnboundedReceiver<Notification>,
    controller: &mut C,
    stop: &watch::Receiver<bool>,
) -> usize {
    let mut delivered = 0;
    while let Some(n) = rx.blocking_recv() {
        if *stop.borrow() {
            info!("stop requested; dispatch loop exiting");
            break;
        }
        n.deliver(controller);
        delivered += 1;
    }
    debug!(delivered, "dispatch loop stopped");
    delivered
}

/// Run the controller on the blocking pool, since executors wait on child
/// processes. The handle yields the controller back once the loop ends.
pub fn spawn_dispatch<C>(mut controller: C, stop: watch::Receiver<bool>) -> (ChannelController, JoinHandle<C>)
where
    C: ResourceController + 'static,
{
    let (tx, rx) = mpsc::unbounded_channel();
    let handle = tokio::task::spawn_blocking(move || {
        run_dispatch(rx, &mut controller, &stop);
        controller
    });
    (ChannelController { tx }, handle)
}
