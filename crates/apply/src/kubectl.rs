//! `kubectl apply|delete -f <artifact>`

use std::path::PathBuf;

use crate::{run, Artifact, ExecError, Executor};

#[derive(Debug, Clone)]
pub struct Kubectl {
    binary: PathBuf,
    kubeconfig: Option<PathBuf>,
}

impl Kubectl {
    pub fn new(kubeconfig: Option<PathBuf>) -> Self { Self { binary: PathBuf::from("kubectl"), kubeconfig } }

    pub fn with_binary(mut self, binary: impl Into<PathBuf>) -> Self {
        self.binary = binary.into();
        self
    }

    fn args(&self, verb: &str, artifact: &Artifact) -> Vec<String> {
        let mut args = vec![verb.to_string(), "-f".to_string(), artifact.path().display().to_string()];
        if let Some(cfg) = &self.kubeconfig {
            args.push("--kubeconfig".into());
            args.push(cfg.display().to_string());
        }
        args
    }
}

impl Executor for Kubectl {
    fn apply(&self, artifact: &Artifact) -> Result<String, ExecError> { run(&self.binary, &self.args("apply", artifact)) }

    fn delete(&self, artifact: &Artifact) -> Result<String, ExecError> { run(&self.binary, &self.args("delete", artifact)) }
}
