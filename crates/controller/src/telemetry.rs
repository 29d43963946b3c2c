use metrics::{counter, gauge};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Create,
    Update,
    Delete,
}

impl Action {
    pub fn as_str(self) -> &'static str {
        match self {
            Action::Create => "create",
            Action::Update => "update",
            Action::Delete => "delete",
        }
    }
}

fn now_secs() -> f64 { chrono::Utc::now().timestamp_millis() as f64 / 1000.0 }

pub(crate) fn event_seen() { counter!("lostromos_events_total", 1u64); }

pub(crate) fn succeeded(action: Action) {
    let now = now_secs();
    match action {
        Action::Create => {
            counter!("lostromos_releases_created_total", 1u64);
            gauge!("lostromos_last_successful_create_seconds", now);
        }
        Action::Update => {
            counter!("lostromos_releases_updated_total", 1u64);
            gauge!("lostromos_last_successful_update_seconds", now);
        }
        Action::Delete => {
            counter!("lostromos_releases_deleted_total", 1u64);
            gauge!("lostromos_last_successful_delete_seconds", now);
        }
    }
}

/// Creates that were held back until the list completed.
pub(crate) fn created(count: usize) {
    if count == 0 {
        return;
    }
    counter!("lostromos_releases_created_total", count as u64);
    gauge!("lostromos_last_successful_create_seconds", now_secs());
}

/// Set from the reconciler's own view, never adjusted per event.
pub(crate) fn managed(count: usize) { gauge!("lostromos_managed_releases", count as f64); }

pub(crate) fn failed(action: Action) {
    match action {
        Action::Create => {
            counter!("lostromos_create_failures_total", 1u64);
        }
        Action::Update => {
            counter!("lostromos_update_failures_total", 1u64);
        }
        Action::Delete => {
            counter!("lostromos_delete_failures_total", 1u64);
        }
    }
}

pub(crate) fn sync_failed() { counter!("lostromos_sync_failures_total", 1u64); }
