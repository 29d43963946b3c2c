#![forbid(unsafe_code)]

mod support;

use std::collections::HashMap;
use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock};

use lostromos_controller::{Controller, HelmController, Notification, PrintController, TemplateController};
use lostromos_core::ResourceController;
use metrics::{Counter, CounterFn, Gauge, GaugeFn, Histogram, HistogramFn, Key, KeyName, Recorder, SharedString, Unit};
use support::{character, NameRenderer, Recorder as Calls};

#[derive(Default)]
struct Values {
    counters: HashMap<String, u64>,
    gauges: HashMap<String, f64>,
}

struct Handle {
    name: String,
    values: Arc<Mutex<Values>>,
}

impl CounterFn for Handle {
    fn increment(&self, value: u64) { *self.values.lock().unwrap().counters.entry(self.name.clone()).or_default() += value }

    fn absolute(&self, value: u64) { self.values.lock().unwrap().counters.insert(self.name.clone(), value); }
}

impl GaugeFn for Handle {
    fn increment(&self, value: f64) { *self.values.lock().unwrap().gauges.entry(self.name.clone()).or_default() += value }

    fn decrement(&self, value: f64) { *self.values.lock().unwrap().gauges.entry(self.name.clone()).or_default() -= value }

    fn set(&self, value: f64) { self.values.lock().unwrap().gauges.insert(self.name.clone(), value); }
}

impl HistogramFn for Handle {
    fn record(&self, _value: f64) {}
}

struct Capture(Arc<Mutex<Values>>);

impl Capture {
    fn handle(&self, key: &Key) -> Arc<Handle> { Arc::new(Handle { name: key.name().to_string(), values: self.0.clone() }) }
}

impl Recorder for Capture {
    fn describe_counter(&self, _key: KeyName, _unit: Option<Unit>, _description: SharedString) {}
    fn describe_gauge(&self, _key: KeyName, _unit: Option<Unit>, _description: SharedString) {}
    fn describe_histogram(&self, _key: KeyName, _unit: Option<Unit>, _description: SharedString) {}

    fn register_counter(&self, key: &Key) -> Counter { Counter::from_arc(self.handle(key)) }

    fn register_gauge(&self, key: &Key) -> Gauge { Gauge::from_arc(self.handle(key)) }

    fn register_histogram(&self, key: &Key) -> Histogram { Histogram::from_arc(self.handle(key)) }
}

static SERIAL: Mutex<()> = Mutex::new(());
static VALUES: OnceLock<Arc<Mutex<Values>>> = OnceLock::new();

/// The recorder is process global: tests take turns and start from zero.
struct Scope {
    _serial: MutexGuard<'static, ()>,
    values: Arc<Mutex<Values>>,
}

impl Scope {
    fn new() -> Self {
        let serial = SERIAL.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let values = VALUES
            .get_or_init(|| {
                let values = Arc::new(Mutex::new(Values::default()));
                metrics::set_boxed_recorder(Box::new(Capture(values.clone()))).unwrap();
                values
            })
            .clone();
        *values.lock().unwrap() = Values::default();
        Self { _serial: serial, values }
    }

    fn counter(&self, name: &str) -> u64 { self.values.lock().unwrap().counters.get(name).copied().unwrap_or(0) }

    fn gauge(&self, name: &str) -> Option<f64> { self.values.lock().unwrap().gauges.get(name).copied() }
}

const MANAGED: &str = "lostromos_managed_releases";

#[test]
fn batch_creates_count_at_sync_and_the_gauge_follows_the_store() {
    let m = Scope::new();
    let mut c = TemplateController::new(NameRenderer::default(), Calls::default(), true);
    c.resource_added(character("dory", "Dory"));
    c.resource_added(character("nemo", "Nemo"));
    assert_eq!(m.counter("lostromos_releases_created_total"), 0);
    assert_eq!(m.gauge(MANAGED), None);

    c.notify_synced();
    assert_eq!(m.counter("lostromos_releases_created_total"), 2);
    assert_eq!(m.gauge(MANAGED), Some(2.0));
    assert!(m.gauge("lostromos_last_successful_create_seconds").is_some());

    c.resource_deleted(character("dory", "Dory"));
    assert_eq!(m.gauge(MANAGED), Some(1.0));
    c.resource_deleted(character("nemo", "Nemo"));
    assert_eq!(m.gauge(MANAGED), Some(0.0));
    assert_eq!(m.counter("lostromos_releases_deleted_total"), 2);

    // a delete for something never stored must not push the gauge below zero
    c.resource_deleted(character("bruce", "Bruce"));
    assert_eq!(m.gauge(MANAGED), Some(0.0));
}

#[test]
fn every_failed_reconcile_bumps_its_counter() {
    let m = Scope::new();
    let mut c = TemplateController::new(NameRenderer::default(), Calls::default(), false);
    c.renderer().fail.store(true, Ordering::SeqCst);
    c.resource_added(character("dory", "Dory"));
    c.resource_updated(character("dory", "Dory"), character("dory", "Dory2"));
    c.resource_deleted(character("dory", "Dory2"));
    assert_eq!(m.counter("lostromos_create_failures_total"), 1);
    assert_eq!(m.counter("lostromos_update_failures_total"), 1);
    assert_eq!(m.counter("lostromos_delete_failures_total"), 1);
    assert_eq!(m.counter("lostromos_releases_created_total"), 0);
    assert_eq!(m.gauge(MANAGED), None);

    c.notify_synced();
    assert_eq!(m.counter("lostromos_sync_failures_total"), 1);

    let calls = Calls::default();
    calls.fail.store(true, Ordering::SeqCst);
    let mut helm = HelmController::new(calls, "lostromos");
    helm.resource_added(character("nemo", "Nemo"));
    helm.resource_deleted(character("nemo", "Nemo"));
    assert_eq!(m.counter("lostromos_create_failures_total"), 2);
    assert_eq!(m.counter("lostromos_delete_failures_total"), 2);
}

#[test]
fn relist_teardown_is_counted_as_a_delete() {
    let m = Scope::new();
    let mut c = TemplateController::new(NameRenderer::default(), Calls::default(), true);
    c.resource_added(character("dory", "Dory"));
    c.notify_synced();
    assert_eq!(m.gauge(MANAGED), Some(1.0));

    c.relist_started();
    c.resource_deleted(character("dory", "Dory"));
    c.notify_synced();
    assert_eq!(m.counter("lostromos_releases_deleted_total"), 1);
    assert_eq!(m.gauge(MANAGED), Some(0.0));

    c.resource_added(character("nemo", "Nemo"));
    c.notify_synced();
    c.relist_started();
    c.renderer().fail.store(true, Ordering::SeqCst);
    c.notify_synced();
    assert_eq!(m.counter("lostromos_delete_failures_total"), 1);
    assert_eq!(m.counter("lostromos_sync_failures_total"), 1);
}

#[test]
fn helm_gauge_counts_installed_releases() {
    let m = Scope::new();
    let mut helm = HelmController::new(Calls::default(), "lostromos");
    helm.resource_added(character("dory", "Dory"));
    helm.resource_added(character("nemo", "Nemo"));
    helm.resource_updated(character("nemo", "Nemo"), character("nemo", "Nemo2"));
    assert_eq!(m.gauge(MANAGED), Some(2.0));
    assert_eq!(m.counter("lostromos_releases_updated_total"), 1);

    helm.resource_deleted(character("dory", "Dory"));
    helm.resource_deleted(character("dory", "Dory"));
    assert_eq!(m.gauge(MANAGED), Some(1.0));
}

#[test]
fn every_notification_counts_as_an_event() {
    let m = Scope::new();
    let mut print = Controller::Print(PrintController);
    for n in [
        Notification::Added(character("dory", "Dory")),
        Notification::Updated(character("dory", "Dory"), character("dory", "Dory2")),
        Notification::RelistStarted,
        Notification::Synced,
        Notification::Deleted(character("dory", "Dory2")),
    ] {
        n.deliver(&mut print);
    }
    assert_eq!(m.counter("lostromos_events_total"), 3);
}
