use std::str::FromStr;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use lostromos_controller::spawn_dispatch;
use lostromos_kubehub::informer;
use lostromos_kubehub::{CmShim, CrWatcher, CrdTypeFilter, ErrorReporter, OptInFilter, TracingReporter, WatchOptions};
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info, warn};

mod options;

use options::{Source, StartArgs};

#[derive(Parser, Debug)]
#[command(name = "lostromos", version, about = "Deploy templates or helm releases for Kubernetes custom resources")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Watch resources and reconcile them until interrupted
    Start(StartArgs),
    /// Print the version
    Version,
}

fn init_tracing() {
    let env = std::env::var("LOSTROMOS_LOG").unwrap_or_else(|_| "info".to_string());
    let filter = tracing_subscriber::EnvFilter::from_str(&env).unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(true).init();
}

fn init_metrics(addr: Option<&str>) {
    let Some(addr) = addr else { return };
    if let Ok(sock) = addr.parse::<std::net::SocketAddr>() {
        let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
        match builder.with_http_listener(sock).install() {
            Ok(_) => info!(addr = %addr, "Prometheus metrics exporter listening"),
            Err(e) => warn!(error = %e, "failed to install metrics exporter"),
        }
    } else {
        warn!(addr = %addr, "invalid LOSTROMOS_METRICS_ADDR; expected host:port");
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::Version => println!("lostromos {}", env!("CARGO_PKG_VERSION")),
        Commands::Start(args) => {
            if let Err(e) = start(args).await {
                error!(error = ?e, "lostromos failed");
                return Err(e);
            }
        }
    }
    Ok(())
}

async fn start(args: StartArgs) -> Result<()> {
    let plan = args.validate()?;
    init_metrics(args.metrics_addr.as_deref());
    info!(version = env!("CARGO_PKG_VERSION"), source = ?plan.source, backend = ?plan.backend, "starting lostromos");

    let conn = lostromos_kubehub::connect(plan.kubeconfig.as_deref()).await?;
    let reporter: Arc<dyn ErrorReporter> = Arc::new(TracingReporter);
    let opts = WatchOptions { resync: plan.resync };
    let (stop_tx, stop_rx) = watch::channel(false);

    // Resolve the watched API before the controller exists, so a missing CRD
    // fails startup without touching the backend.
    enum Watched {
        Crd(kube::Api<kube::core::DynamicObject>, Option<String>),
        ConfigMap(kube::Api<k8s_openapi::api::core::v1::ConfigMap>, String),
    }
    let watched = match plan.source {
        Source::Crd { plural, group, version, namespace, filter } => {
            let (ar, namespaced) = lostromos_kubehub::find_api_resource(conn.client.clone(), &group, &version, &plural)
                .await
                .with_context(|| format!("resolving {}.{}/{}", plural, group, version))?;
            info!(group = %group, version = %version, plural = %plural, namespaced, "watching custom resources");
            Watched::Crd(lostromos_kubehub::dynamic_api(conn.client.clone(), &ar, namespaced, namespace.as_deref()), filter)
        }
        Source::ConfigMap { crd_type, namespace } => {
            info!(crd_type = %crd_type, namespace = ?namespace, "watching configmaps");
            Watched::ConfigMap(lostromos_kubehub::config_map_api(conn.client.clone(), namespace.as_deref()), crd_type)
        }
    };

    let controller = plan.backend.build(conn.kubeconfig.clone());
    info!(backend = controller.backend(), "controller ready");
    let (channel, dispatch) = spawn_dispatch(controller, stop_rx.clone());

    let watch_task = match watched {
        Watched::Crd(api, filter) => {
            let mut handler = CrWatcher::new(OptInFilter::new(filter), channel, reporter.clone());
            tokio::spawn(async move { informer::run(api, &mut handler, reporter.as_ref(), opts, stop_rx).await })
        }
        Watched::ConfigMap(api, crd_type) => {
            let mut handler = CmShim::new(CrdTypeFilter::new(crd_type), channel, reporter.clone());
            tokio::spawn(async move { informer::run(api, &mut handler, reporter.as_ref(), opts, stop_rx).await })
        }
    };

    tokio::spawn(async move {
        if signal::ctrl_c().await.is_ok() {
            info!("interrupt received; stopping");
            let _ = stop_tx.send(true);
        }
    });

    // The handler owns the only sender, so the dispatch loop ends once the
    // watch task does.
    let watched = watch_task.await.context("watch task panicked")?;
    dispatch.await.context("dispatch loop panicked")?;
    info!("lostromos stopped");
    watched
}
