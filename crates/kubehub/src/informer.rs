//! Object cache over `kube::runtime::watcher` turning its event stream into
//! add / update(old, new) / delete callbacks plus a sync signal.

use std::collections::BTreeMap;
use std::fmt::Debug;
use std::time::Duration;

use anyhow::Result;
use futures::StreamExt;
use kube::{
    api::Api,
    runtime::{watcher, WatchStreamExt},
    Resource, ResourceExt,
};
use serde::de::DeserializeOwned;
use tokio::sync::watch;
use tokio::time::{interval_at, Instant, Interval};
use tracing::{debug, info, warn};

use crate::{ErrorReporter, WatchError};

/// Raw callbacks delivered by the informer.
pub trait RawHandler<K> {
    fn on_add(&mut self, obj: &K);
    fn on_update(&mut self, old: &K, new: &K);
    fn on_delete(&mut self, obj: &K);
    /// A relist is about to replay the full list (not sent for the initial list).
    fn on_relist(&mut self) {}
    /// The list delivered by the last restart has been replayed.
    fn on_synced(&mut self);
}

type ObjectKey = (Option<String>, String);

fn key_of<K: Resource>(obj: &K) -> ObjectKey { (obj.namespace(), obj.name_any()) }

/// Last-seen state per object; the `old` side of every update.
pub struct Informer<K> {
    cache: BTreeMap<ObjectKey, K>,
    synced: bool,
}

impl<K> Default for Informer<K> {
    fn default() -> Self { Self { cache: BTreeMap::new(), synced: false } }
}

impl<K: Resource + Clone> Informer<K> {
    pub fn new() -> Self { Self::default() }

    pub fn has_synced(&self) -> bool { self.synced }

    pub fn len(&self) -> usize { self.cache.len() }

    pub fn is_empty(&self) -> bool { self.cache.is_empty() }

    pub fn handle<H: RawHandler<K> + ?Sized>(&mut self, event: watcher::Event<K>, handler: &mut H) {
        match event {
            watcher::Event::Applied(obj) => {
                match self.cache.insert(key_of(&obj), obj.clone()) {
                    Some(old) => handler.on_update(&old, &obj),
                    None => handler.on_add(&obj),
                }
            }
            watcher::Event::Deleted(obj) => {
                self.cache.remove(&key_of(&obj));
                handler.on_delete(&obj);
            }
            watcher::Event::Restarted(list) => self.restart(list, handler),
        }
    }

    fn restart<H: RawHandler<K> + ?Sized>(&mut self, list: Vec<K>, handler: &mut H) {
        debug!(count = list.len(), initial = !self.synced, "watch restart");
        if self.synced {
            handler.on_relist();
        }
        let mut fresh = BTreeMap::new();
        for obj in list {
            let key = key_of(&obj);
            match self.cache.remove(&key) {
                Some(old) => handler.on_update(&old, &obj),
                None => handler.on_add(&obj),
            }
            fresh.insert(key, obj);
        }
        // whatever was not relisted is gone
        for gone in std::mem::take(&mut self.cache).into_values() {
            handler.on_delete(&gone);
        }
        self.cache = fresh;
        self.synced = true;
        handler.on_synced();
    }

    /// Redeliver every cached object as an unchanged update.
    pub fn resync<H: RawHandler<K> + ?Sized>(&self, handler: &mut H) {
        debug!(count = self.cache.len(), "resync");
        for obj in self.cache.values() {
            handler.on_update(obj, obj);
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct WatchOptions {
    /// Periodic redelivery of cached objects; `None` disables it.
    pub resync: Option<Duration>,
}

async fn tick(t: &mut Option<Interval>) {
    match t {
        Some(t) => { t.tick().await; }
        None => futures::future::pending::<()>().await,
    }
}

/// List+watch `api`, driving `handler` until the stream ends or `stop` flips.
/// Stream errors go to `reporter`; the watcher keeps retrying with backoff.
pub async fn run<K, H>(
    api: Api<K>,
    handler: &mut H,
    reporter: &dyn ErrorReporter,
    opts: WatchOptions,
    mut stop: watch::Receiver<bool>,
) -> Result<()>
where
    K: Resource + Clone + DeserializeOwned + Debug + Send + 'static,
    H: RawHandler<K> + Send + ?Sized,
{
    let stream = watcher::watcher(api, watcher::Config::default()).default_backoff();
    futures::pin_mut!(stream);
    let mut informer = Informer::<K>::new();
    let mut resync = opts.resync.filter(|d| !d.is_zero()).map(|d| interval_at(Instant::now() + d, d));
    info!(resync = ?opts.resync, "watcher started");
    while !*stop.borrow() {
        tokio::select! {
            changed = stop.changed() => {
                if changed.is_err() { break; }
            }
            _ = tick(&mut resync) => informer.resync(&mut *handler),
            ev = stream.next() => match ev {
                Some(Ok(ev)) => informer.handle(ev, &mut *handler),
                Some(Err(e)) => reporter.report(&WatchError::Watch(e)),
                None => {
                    warn!("watcher stream ended");
                    return Ok(());
                }
            },
        }
    }
    info!("watcher stopped");
    Ok(())
}
