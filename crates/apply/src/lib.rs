//! Lostromos apply: artifacts rendered from the store and the external
//! executors (`kubectl`, `helm`) that deploy or tear them down.

#![forbid(unsafe_code)]

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus};

use lostromos_store::StoreSnapshot;
use tempfile::NamedTempFile;
use tracing::debug;

pub mod helm;
pub mod kubectl;
pub mod render;

pub use helm::{Helm, HelmOptions, ReleaseExecutor};
pub use kubectl::Kubectl;
pub use render::TemplateRenderer;

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("reading templates from {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("no *.tmpl files in {0}")]
    NoTemplates(PathBuf),
    #[error("rendering {name}: {source}")]
    Template {
        name: String,
        #[source]
        source: minijinja::Error,
    },
    #[error("encoding values: {0}")]
    Values(#[from] serde_yaml::Error),
    #[error("writing artifact: {0}")]
    Artifact(#[source] io::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum ExecError {
    #[error("running {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },
    #[error("{program} exited with {status}")]
    Failed {
        program: String,
        status: ExitStatus,
        output: String,
    },
}

impl ExecError {
    /// Captured command output, empty when the command never ran.
    pub fn output(&self) -> &str {
        match self {
            ExecError::Spawn { .. } => "",
            ExecError::Failed { output, .. } => output,
        }
    }
}

/// A rendered file handed to an executor. Removed from disk on drop.
#[derive(Debug)]
pub struct Artifact {
    file: NamedTempFile,
}

impl Artifact {
    pub fn write(contents: &str) -> Result<Self, RenderError> {
        let mut file = tempfile::Builder::new()
            .prefix("lostromos")
            .suffix(".yaml")
            .tempfile()
            .map_err(RenderError::Artifact)?;
        file.write_all(contents.as_bytes()).map_err(RenderError::Artifact)?;
        file.flush().map_err(RenderError::Artifact)?;
        Ok(Self { file })
    }

    pub fn path(&self) -> &Path { self.file.path() }

    pub fn contents(&self) -> io::Result<String> { std::fs::read_to_string(self.path()) }
}

/// Builds the artifact for the current store contents.
pub trait Renderer: Send {
    fn render(&self, snapshot: &StoreSnapshot) -> Result<Artifact, RenderError>;
}

/// Applies or deletes a rendered artifact. Implementations own retries and
/// timeouts; callers never retry.
pub trait Executor: Send {
    fn apply(&self, artifact: &Artifact) -> Result<String, ExecError>;
    fn delete(&self, artifact: &Artifact) -> Result<String, ExecError>;
}

/// Run a command to completion, returning stdout+stderr.
pub(crate) fn run(program: &Path, args: &[String]) -> Result<String, ExecError> {
    let name = program.display().to_string();
    debug!(program = %name, args = ?args, "exec");
    let out = Command::new(program)
        .args(args)
        .output()
        .map_err(|source| ExecError::Spawn { program: name.clone(), source })?;
    let mut output = String::from_utf8_lossy(&out.stdout).into_owned();
    output.push_str(&String::from_utf8_lossy(&out.stderr));
    if !out.status.success() {
        return Err(ExecError::Failed { program: name, status: out.status, output });
    }
    Ok(output)
}
