#![forbid(unsafe_code)]

mod support;

use std::sync::Arc;

use kube::core::DynamicObject;
use kube::runtime::watcher::Event;
use lostromos_core::Resource;
use lostromos_kubehub::{CrWatcher, Informer, OptInFilter, RawHandler};
use support::{Note, Recorder, Reports};

fn obj(name: &str, opted_in: bool, size: u32) -> DynamicObject {
    let mut meta = serde_json::json!({ "name": name, "namespace": "sea" });
    if opted_in {
        meta["annotations"] = serde_json::json!({ "lostromos/opt-in": "" });
    }
    serde_json::from_value(serde_json::json!({
        "apiVersion": "stable.example/v1",
        "kind": "Character",
        "metadata": meta,
        "spec": { "size": size }
    }))
    .unwrap()
}

fn res(o: &DynamicObject) -> Resource { Resource::from_object(o).unwrap() }

fn watcher(filter: Option<&str>) -> CrWatcher<Recorder> {
    CrWatcher::new(OptInFilter::new(filter.map(String::from)), Recorder::default(), Arc::new(Reports::default()))
}

#[test]
fn without_filter_everything_passes() {
    let mut w = watcher(None);
    let a = obj("nemo", false, 1);
    let b = obj("nemo", false, 2);
    w.on_add(&a);
    w.on_update(&a, &b);
    w.on_delete(&b);
    assert_eq!(
        w.controller().notes,
        vec![Note::Added(res(&a)), Note::Updated(res(&a), res(&b)), Note::Deleted(res(&b))]
    );
}

#[test]
fn filtered_out_resources_never_notify() {
    let mut w = watcher(Some("lostromos/opt-in"));
    let a = obj("nemo", false, 1);
    let b = obj("nemo", false, 2);
    w.on_add(&a);
    w.on_update(&a, &b);
    w.on_delete(&b);
    assert!(w.controller().notes.is_empty());
}

#[test]
fn opting_in_is_an_add_and_opting_out_a_delete() {
    let mut w = watcher(Some("lostromos/opt-in"));
    let out = obj("nemo", false, 1);
    let inn = obj("nemo", true, 2);
    w.on_update(&out, &inn);
    w.on_update(&inn, &out);
    w.on_update(&inn, &inn);
    assert_eq!(
        w.controller().notes,
        vec![Note::Added(res(&inn)), Note::Deleted(res(&inn)), Note::Updated(res(&inn), res(&inn))]
    );
}

#[test]
fn informer_drives_translator_end_to_end() {
    let mut w = watcher(Some("lostromos/opt-in"));
    let mut inf = Informer::<DynamicObject>::new();
    inf.handle(Event::Restarted(vec![obj("dory", true, 1), obj("bruce", false, 1)]), &mut w);
    inf.handle(Event::Applied(obj("bruce", true, 2)), &mut w);
    inf.handle(Event::Applied(obj("dory", false, 2)), &mut w);
    inf.handle(Event::Deleted(obj("bruce", true, 2)), &mut w);
    assert_eq!(
        w.controller().notes,
        vec![
            Note::Added(res(&obj("dory", true, 1))),
            Note::Synced,
            Note::Added(res(&obj("bruce", true, 2))),
            Note::Deleted(res(&obj("dory", true, 1))),
            Note::Deleted(res(&obj("bruce", true, 2))),
        ]
    );
}
