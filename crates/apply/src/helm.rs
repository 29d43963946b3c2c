//! Helm v3 releases, one per resource.

use std::path::PathBuf;
use std::time::Duration;

use lostromos_core::Resource;

use crate::{run, Artifact, ExecError, RenderError};

#[derive(Debug, Clone)]
pub struct HelmOptions {
    pub chart: String,
    pub namespace: String,
    pub wait: bool,
    pub wait_timeout: Duration,
}

impl Default for HelmOptions {
    fn default() -> Self {
        Self { chart: String::new(), namespace: "default".into(), wait: false, wait_timeout: Duration::from_secs(120) }
    }
}

/// Installs, upgrades and removes named releases.
pub trait ReleaseExecutor: Send {
    fn install_or_upgrade(&self, release: &str, values: &Artifact) -> Result<String, ExecError>;
    fn uninstall(&self, release: &str) -> Result<String, ExecError>;
}

/// Values file handed to the chart: the resource under `resource`.
pub fn values_artifact(resource: &Resource) -> Result<Artifact, RenderError> {
    let values = serde_json::json!({ "resource": resource.raw() });
    Artifact::write(&serde_yaml::to_string(&values)?)
}

#[derive(Debug, Clone)]
pub struct Helm {
    binary: PathBuf,
    opts: HelmOptions,
    kubeconfig: Option<PathBuf>,
}

impl Helm {
    pub fn new(opts: HelmOptions, kubeconfig: Option<PathBuf>) -> Self {
        Self { binary: PathBuf::from("helm"), opts, kubeconfig }
    }

    pub fn with_binary(mut self, binary: impl Into<PathBuf>) -> Self {
        self.binary = binary.into();
        self
    }

    pub fn options(&self) -> &HelmOptions { &self.opts }

    fn upgrade_args(&self, release: &str, values: &Artifact) -> Vec<String> {
        let mut args: Vec<String> = vec![
            "upgrade".into(),
            "--install".into(),
            release.into(),
            self.opts.chart.clone(),
            "--namespace".into(),
            self.opts.namespace.clone(),
            "--values".into(),
            values.path().display().to_string(),
        ];
        if self.opts.wait {
            args.push("--wait".into());
            args.push("--timeout".into());
            args.push(format!("{}s", self.opts.wait_timeout.as_secs()));
        }
        self.push_kubeconfig(&mut args);
        args
    }

    fn uninstall_args(&self, release: &str) -> Vec<String> {
        let mut args: Vec<String> =
            vec!["uninstall".into(), release.into(), "--namespace".into(), self.opts.namespace.clone()];
        self.push_kubeconfig(&mut args);
        args
    }

    fn push_kubeconfig(&self, args: &mut Vec<String>) {
        if let Some(cfg) = &self.kubeconfig {
            args.push("--kubeconfig".into());
            args.push(cfg.display().to_string());
        }
    }
}

impl ReleaseExecutor for Helm {
    fn install_or_upgrade(&self, release: &str, values: &Artifact) -> Result<String, ExecError> {
        run(&self.binary, &self.upgrade_args(release, values))
    }

    fn uninstall(&self, release: &str) -> Result<String, ExecError> { run(&self.binary, &self.uninstall_args(release)) }
}
