//! Lostromos kubehub: client, discovery, watch wiring and event translation

#![forbid(unsafe_code)]

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use k8s_openapi::api::core::v1::ConfigMap;
use kube::{
    api::Api,
    config::{KubeConfigOptions, Kubeconfig},
    core::{ApiResource, DynamicObject},
    discovery::{Discovery, Scope},
    Client, Config,
};
use lostromos_core::DecodeError;
use metrics::counter;
use tracing::{debug, error, info};

pub mod cmshim;
pub mod filter;
pub mod informer;
pub mod translate;

pub use cmshim::{config_map_to_resource, CmShim};
pub use filter::{CrdTypeFilter, OptInFilter, CRD_TYPE_ANNOTATION};
pub use informer::{Informer, RawHandler, WatchOptions};
pub use translate::{transition, CrWatcher, Transition};

#[derive(Debug, thiserror::Error)]
pub enum WatchError {
    #[error("decoding {object}: {source}")]
    Decode {
        object: String,
        #[source]
        source: DecodeError,
    },
    #[error("watch stream: {0}")]
    Watch(#[from] kube::runtime::watcher::Error),
}

/// Sink for failures on the event path. Must not block.
pub trait ErrorReporter: Send + Sync {
    fn report(&self, err: &WatchError);
}

/// Logs reported errors and counts them.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingReporter;

impl ErrorReporter for TracingReporter {
    fn report(&self, err: &WatchError) {
        error!(error = %err, "kubernetes error");
        counter!("lostromos_kube_errors_total", 1u64);
    }
}

/// Connected client plus the kubeconfig external tools should use
/// (`None` when running in-cluster).
pub struct KubeConnection {
    pub client: Client,
    pub kubeconfig: Option<PathBuf>,
}

/// In-cluster config first, then the given kubeconfig, then kube's inference.
pub async fn connect(kubeconfig: Option<&Path>) -> Result<KubeConnection> {
    if let Ok(cfg) = Config::incluster() {
        info!("using in-cluster configuration");
        let client = Client::try_from(cfg).context("building in-cluster client")?;
        return Ok(KubeConnection { client, kubeconfig: None });
    }
    let (cfg, path) = match kubeconfig.filter(|p| p.exists()) {
        Some(path) => {
            let kc = Kubeconfig::read_from(path)
                .with_context(|| format!("reading kubeconfig {}", path.display()))?;
            let cfg = Config::from_custom_kubeconfig(kc, &KubeConfigOptions::default())
                .await
                .with_context(|| format!("loading kubeconfig {}", path.display()))?;
            (cfg, Some(path.to_path_buf()))
        }
        None => (Config::infer().await.context("inferring kube configuration")?, None),
    };
    debug!(cluster = %cfg.cluster_url, "using kubeconfig");
    let client = Client::try_from(cfg).context("building kube client")?;
    Ok(KubeConnection { client, kubeconfig: path })
}

/// Resolve a custom resource by group, version and plural name.
pub async fn find_api_resource(client: Client, group: &str, version: &str, plural: &str) -> Result<(ApiResource, bool)> {
    let discovery = Discovery::new(client).filter(&[group]).run().await?;
    for g in discovery.groups() {
        for (ar, caps) in g.versioned_resources(version) {
            if ar.group == group && ar.version == version && ar.plural == plural {
                let namespaced = matches!(caps.scope, Scope::Namespaced);
                return Ok((ar, namespaced));
            }
        }
    }
    Err(anyhow!("custom resource not served: {}/{} {}", group, version, plural))
}

pub fn dynamic_api(client: Client, ar: &ApiResource, namespaced: bool, namespace: Option<&str>) -> Api<DynamicObject> {
    if namespaced {
        match namespace {
            Some(ns) => Api::namespaced_with(client, ns, ar),
            None => Api::all_with(client, ar),
        }
    } else {
        Api::all_with(client, ar)
    }
}

pub fn config_map_api(client: Client, namespace: Option<&str>) -> Api<ConfigMap> {
    match namespace {
        Some(ns) => Api::namespaced(client, ns),
        None => Api::all(client),
    }
}
