#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use lostromos_apply::{Artifact, ExecError, Executor, ReleaseExecutor, RenderError, Renderer};
use lostromos_core::Resource;
use lostromos_store::StoreSnapshot;

pub fn character(name: &str, spec_name: &str) -> Resource {
    kind_named("Character", name, spec_name)
}

pub fn kind_named(kind: &str, name: &str, spec_name: &str) -> Resource {
    Resource::from_value(serde_json::json!({
        "apiVersion": "stable.example/v1",
        "kind": kind,
        "metadata": { "name": name, "namespace": "sea" },
        "spec": { "name": spec_name }
    }))
    .unwrap()
}

fn failure(program: &str) -> ExecError {
    ExecError::Spawn { program: program.into(), source: std::io::Error::new(std::io::ErrorKind::NotFound, "gone") }
}

/// Renders the sorted names of every stored resource, comma separated.
#[derive(Clone, Default)]
pub struct NameRenderer {
    pub fail: Arc<AtomicBool>,
    pub renders: Arc<Mutex<usize>>,
}

impl Renderer for NameRenderer {
    fn render(&self, snapshot: &StoreSnapshot) -> Result<Artifact, RenderError> {
        *self.renders.lock().unwrap() += 1;
        if self.fail.load(Ordering::SeqCst) {
            return Err(RenderError::NoTemplates("/templates".into()));
        }
        let mut names: Vec<String> = snapshot
            .resources
            .values()
            .flatten()
            .filter_map(|doc| doc["metadata"]["name"].as_str().map(String::from))
            .collect();
        names.sort();
        Artifact::write(&names.join(","))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Apply(String),
    Delete(String),
    Install(String, String),
    Uninstall(String),
}

/// Records every executor call with the artifact contents it was handed.
#[derive(Clone, Default)]
pub struct Recorder {
    pub calls: Arc<Mutex<Vec<Call>>>,
    pub fail: Arc<AtomicBool>,
}

impl Recorder {
    pub fn calls(&self) -> Vec<Call> { self.calls.lock().unwrap().clone() }

    fn push(&self, call: Call) -> Result<String, ExecError> {
        self.calls.lock().unwrap().push(call);
        if self.fail.load(Ordering::SeqCst) {
            return Err(failure("recorder"));
        }
        Ok("ok".into())
    }
}

impl Executor for Recorder {
    fn apply(&self, artifact: &Artifact) -> Result<String, ExecError> { self.push(Call::Apply(artifact.contents().unwrap())) }

    fn delete(&self, artifact: &Artifact) -> Result<String, ExecError> {
        self.push(Call::Delete(artifact.contents().unwrap()))
    }
}

impl ReleaseExecutor for Recorder {
    fn install_or_upgrade(&self, release: &str, values: &Artifact) -> Result<String, ExecError> {
        self.push(Call::Install(release.into(), values.contents().unwrap()))
    }

    fn uninstall(&self, release: &str) -> Result<String, ExecError> { self.push(Call::Uninstall(release.into())) }
}
