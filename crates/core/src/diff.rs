use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

/// Field-level change counts between two documents.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffSummary { pub adds: usize, pub updates: usize, pub removes: usize }

impl DiffSummary {
    pub fn is_empty(&self) -> bool { self.adds == 0 && self.updates == 0 && self.removes == 0 }
}

pub fn diff_summary(target: &Json, base: &Json) -> DiffSummary {
    fn walk(a: &Json, b: &Json, s: &mut DiffSummary) {
        match (a, b) {
            (Json::Object(ao), Json::Object(bo)) => {
                for (k, av) in ao.iter() {
                    match bo.get(k) {
                        Some(bv) if av == bv => {}
                        Some(bv) => walk(av, bv, s),
                        None => s.adds += 1,
                    }
                }
                s.removes += bo.keys().filter(|k| !ao.contains_key(*k)).count();
            }
            (Json::Array(aa), Json::Array(bb)) => {
                s.updates += aa.iter().zip(bb.iter()).filter(|(x, y)| x != y).count();
                if aa.len() > bb.len() { s.adds += aa.len() - bb.len(); }
                if bb.len() > aa.len() { s.removes += bb.len() - aa.len(); }
            }
            // Scalars differ or type differs
            (av, bv) => { if av != bv { s.updates += 1; } }
        }
    }
    let mut s = DiffSummary::default();
    walk(target, base, &mut s);
    s
}
