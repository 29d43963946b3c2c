use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Result};
use clap::{ArgAction, Args};
use lostromos_apply::{Helm, HelmOptions, Kubectl, TemplateRenderer};
use lostromos_controller::{Controller, HelmController, PrintController, TemplateController};

/// Flags for `lostromos start`. Every flag can also come from its
/// `LOSTROMOS_*` environment variable.
#[derive(Args, Debug, Clone)]
pub struct StartArgs {
    /// Plural name of the custom resource to watch (ex: characters)
    #[arg(long, env = "LOSTROMOS_CRD_NAME")]
    pub crd_name: Option<String>,
    /// API group of the custom resource (ex: stable.example)
    #[arg(long, env = "LOSTROMOS_CRD_GROUP")]
    pub crd_group: Option<String>,
    #[arg(long, env = "LOSTROMOS_CRD_VERSION", default_value = "v1")]
    pub crd_version: String,
    /// Only needed for namespaced custom resources
    #[arg(long, env = "LOSTROMOS_CRD_NAMESPACE")]
    pub crd_namespace: Option<String>,
    /// Annotation key a resource must carry to opt in
    #[arg(long, env = "LOSTROMOS_CRD_FILTER")]
    pub crd_filter: Option<String>,

    /// Required value of the crd-type annotation on watched ConfigMaps
    #[arg(long, env = "LOSTROMOS_CM_TYPE")]
    pub cm_type: Option<String>,
    #[arg(long, env = "LOSTROMOS_CM_NAMESPACE")]
    pub cm_namespace: Option<String>,
    #[arg(long, env = "LOSTROMOS_CM_ALL_NAMESPACES", action = ArgAction::SetTrue)]
    pub cm_all_namespaces: bool,

    /// Directory holding the *.tmpl files
    #[arg(long, env = "LOSTROMOS_TEMPLATES")]
    pub templates: Option<PathBuf>,
    /// Apply only once the initial list has completed
    #[arg(long, env = "LOSTROMOS_BATCH_MODE", action = ArgAction::SetTrue)]
    pub batch_mode: bool,

    /// Chart to install one release per resource from
    #[arg(long, env = "LOSTROMOS_HELM_CHART")]
    pub helm_chart: Option<String>,
    #[arg(long, env = "LOSTROMOS_HELM_NS", default_value = "default")]
    pub helm_ns: String,
    #[arg(long, env = "LOSTROMOS_HELM_PREFIX", default_value = "lostromos")]
    pub helm_prefix: String,
    #[arg(long, env = "LOSTROMOS_HELM_WAIT", action = ArgAction::SetTrue)]
    pub helm_wait: bool,
    /// Seconds helm waits for the release when --helm-wait is set
    #[arg(long, env = "LOSTROMOS_HELM_WAIT_TIMEOUT", default_value_t = 120)]
    pub helm_wait_timeout: u64,

    /// Log notifications without deploying anything
    #[arg(long, env = "LOSTROMOS_NOP", action = ArgAction::SetTrue)]
    pub nop: bool,

    /// Kubeconfig for out-of-cluster runs (default: ~/.kube/config)
    #[arg(long, env = "LOSTROMOS_KUBE_CONFIG")]
    pub kube_config: Option<PathBuf>,
    /// Redeliver every cached object this often; 0 disables
    #[arg(long, env = "LOSTROMOS_RESYNC_SECS", default_value_t = 0)]
    pub resync_secs: u64,
    /// Prometheus exporter listen address (host:port)
    #[arg(long, env = "LOSTROMOS_METRICS_ADDR")]
    pub metrics_addr: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    Crd { plural: String, group: String, version: String, namespace: Option<String>, filter: Option<String> },
    ConfigMap { crd_type: String, namespace: Option<String> },
}

#[derive(Debug, Clone)]
pub enum Backend {
    Print,
    Helm { opts: HelmOptions, prefix: String },
    Templates { dir: PathBuf, batch: bool },
}

impl Backend {
    pub fn build(self, kubeconfig: Option<PathBuf>) -> Controller {
        match self {
            Backend::Print => Controller::Print(PrintController),
            Backend::Helm { opts, prefix } => Controller::Helm(HelmController::new(Helm::new(opts, kubeconfig), prefix)),
            Backend::Templates { dir, batch } => {
                Controller::Template(TemplateController::new(TemplateRenderer::new(dir), Kubectl::new(kubeconfig), batch))
            }
        }
    }
}

/// Validated startup configuration.
#[derive(Debug, Clone)]
pub struct Plan {
    pub source: Source,
    pub backend: Backend,
    pub kubeconfig: Option<PathBuf>,
    pub resync: Option<Duration>,
}

fn non_empty(v: &Option<String>) -> Option<String> { v.as_ref().filter(|s| !s.is_empty()).cloned() }

fn default_kubeconfig() -> Option<PathBuf> {
    std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".kube").join("config"))
}

impl StartArgs {
    pub fn validate(&self) -> Result<Plan> {
        let source = match (non_empty(&self.crd_name), non_empty(&self.cm_type)) {
            (Some(_), Some(_)) => bail!("only one of --crd-name or --cm-type may be specified"),
            (None, None) => bail!("one of --crd-name or --cm-type must be specified"),
            (Some(plural), None) => {
                let Some(group) = non_empty(&self.crd_group) else { bail!("--crd-group is required with --crd-name") };
                if self.crd_version.is_empty() {
                    bail!("--crd-version must not be empty");
                }
                Source::Crd {
                    plural,
                    group,
                    version: self.crd_version.clone(),
                    namespace: non_empty(&self.crd_namespace),
                    filter: non_empty(&self.crd_filter),
                }
            }
            (None, Some(crd_type)) => match (non_empty(&self.cm_namespace), self.cm_all_namespaces) {
                (Some(_), true) => bail!("only one of --cm-namespace or --cm-all-namespaces may be specified"),
                (None, false) => bail!("one of --cm-namespace or --cm-all-namespaces must be specified"),
                (namespace, _) => Source::ConfigMap { crd_type, namespace },
            },
        };

        let backend = if self.nop {
            Backend::Print
        } else if let Some(chart) = non_empty(&self.helm_chart) {
            Backend::Helm {
                opts: HelmOptions {
                    chart,
                    namespace: self.helm_ns.clone(),
                    wait: self.helm_wait,
                    wait_timeout: Duration::from_secs(self.helm_wait_timeout),
                },
                prefix: self.helm_prefix.clone(),
            }
        } else {
            match &self.templates {
                Some(dir) if !dir.as_os_str().is_empty() => Backend::Templates { dir: dir.clone(), batch: self.batch_mode },
                _ => bail!("--templates is required unless --nop or --helm-chart is given"),
            }
        };

        Ok(Plan {
            source,
            backend,
            kubeconfig: self.kube_config.clone().or_else(default_kubeconfig),
            resync: (self.resync_secs > 0).then(|| Duration::from_secs(self.resync_secs)),
        })
    }
}
