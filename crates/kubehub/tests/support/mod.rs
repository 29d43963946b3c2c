#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use lostromos_core::{Resource, ResourceController};
use lostromos_kubehub::{ErrorReporter, WatchError};

#[derive(Debug, Clone, PartialEq)]
pub enum Note {
    Added(Resource),
    Updated(Resource, Resource),
    Deleted(Resource),
    Relist,
    Synced,
}

#[derive(Default)]
pub struct Recorder {
    pub notes: Vec<Note>,
}

impl ResourceController for Recorder {
    fn resource_added(&mut self, resource: Resource) { self.notes.push(Note::Added(resource)) }
    fn resource_updated(&mut self, old: Resource, new: Resource) { self.notes.push(Note::Updated(old, new)) }
    fn resource_deleted(&mut self, resource: Resource) { self.notes.push(Note::Deleted(resource)) }
    fn notify_synced(&mut self) { self.notes.push(Note::Synced) }
    fn relist_started(&mut self) { self.notes.push(Note::Relist) }
}

#[derive(Default, Clone)]
pub struct Reports(pub Arc<Mutex<Vec<String>>>);

impl Reports {
    pub fn messages(&self) -> Vec<String> { self.0.lock().unwrap().clone() }
}

impl ErrorReporter for Reports {
    fn report(&self, err: &WatchError) { self.0.lock().unwrap().push(err.to_string()) }
}
