//! Manifest templates rendered with minijinja.
//!
//! Every `*.tmpl` file in the template directory is rendered, in file-name
//! order, against the store snapshot:
//!
//! - `resources`: map of `apiVersion/kind` to the documents of that group
//! - `resource`, `name`: the last-added document and its name
//! - `count`: number of stored resources
//! - `get_resources(kind, api_version)`: one group, empty when absent
//! - `get_field(*path)`: scalar of the last-added document, empty when absent

use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use lostromos_store::StoreSnapshot;
use minijinja::value::{Rest, Value};
use minijinja::{Environment, State};
use tracing::debug;

use crate::{Artifact, RenderError, Renderer};

const DOCUMENT_SEPARATOR: &str = "\n---\n";

pub struct TemplateRenderer {
    dir: PathBuf,
    env: Environment<'static>,
}

impl TemplateRenderer {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        let mut env = Environment::new();
        env.add_function("get_resources", get_resources);
        env.add_function("get_field", get_field);
        Self { dir: dir.into(), env }
    }

    pub fn dir(&self) -> &Path { &self.dir }

    /// Template files, sorted by name. Read on every render so edits on disk
    /// are picked up.
    fn templates(&self) -> Result<Vec<PathBuf>, RenderError> {
        let io_err = |source| RenderError::Io { path: self.dir.clone(), source };
        let mut out = Vec::new();
        for entry in std::fs::read_dir(&self.dir).map_err(io_err)? {
            let path = entry.map_err(io_err)?.path();
            if path.is_file() && path.extension() == Some(OsStr::new("tmpl")) {
                out.push(path);
            }
        }
        if out.is_empty() {
            return Err(RenderError::NoTemplates(self.dir.clone()));
        }
        out.sort();
        Ok(out)
    }

    pub fn render_string(&self, snapshot: &StoreSnapshot) -> Result<String, RenderError> {
        let mut docs = Vec::new();
        for path in self.templates()? {
            let name = path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
            let source = std::fs::read_to_string(&path).map_err(|source| RenderError::Io { path: path.clone(), source })?;
            let rendered = self
                .env
                .render_str(&source, snapshot)
                .map_err(|source| RenderError::Template { name: name.clone(), source })?;
            debug!(template = %name, bytes = rendered.len(), "rendered template");
            docs.push(rendered);
        }
        Ok(docs.join(DOCUMENT_SEPARATOR))
    }
}

impl Renderer for TemplateRenderer {
    fn render(&self, snapshot: &StoreSnapshot) -> Result<Artifact, RenderError> {
        Artifact::write(&self.render_string(snapshot)?)
    }
}

fn present(v: &Value) -> bool { !v.is_undefined() && !v.is_none() }

fn get_resources(state: &State, kind: String, api_version: String) -> Value {
    let key = Value::from(format!("{}/{}", api_version, kind));
    state
        .lookup("resources")
        .and_then(|all| all.get_item(&key).ok())
        .filter(present)
        .unwrap_or_else(|| Value::from(Vec::<Value>::new()))
}

fn get_field(state: &State, path: Rest<String>) -> String {
    let Some(mut cur) = state.lookup("resource").filter(present) else { return String::new() };
    for seg in path.iter() {
        match cur.get_attr(seg) {
            Ok(v) if present(&v) => cur = v,
            _ => return String::new(),
        }
    }
    cur.to_string()
}
