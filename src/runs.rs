//! Run lifecycle tracking.
//!
//! The registry is an explicit run-state store owned by the service layer;
//! crawl tasks report terminal states back through it, and the crawl engine
//! itself only sees a `CancelToken`. Every run reaches `completed` or
//! `failed`, and its status stays queryable afterward.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use chrono::Utc;

use crate::core::types::{RunState, RunStatus};

/// Best-effort cancellation flag, checked at each recursion step of a run.
#[derive(Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

struct RunEntry {
    status: RunStatus,
    cancel: CancelToken,
}

#[derive(Default)]
pub struct RunRegistry {
    runs: RwLock<HashMap<String, RunEntry>>,
}

impl RunRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a run as `running` and hand back its cancel token.
    pub fn begin(&self, run_id: &str, url: &str) -> CancelToken {
        let cancel = CancelToken::new();
        let entry = RunEntry {
            status: RunStatus {
                status: RunState::Running,
                url: url.to_string(),
                link_count: None,
                error: None,
                start_time: Utc::now(),
                end_time: None,
                duration_seconds: None,
            },
            cancel: cancel.clone(),
        };
        self.runs.write().unwrap().insert(run_id.to_string(), entry);
        cancel
    }

    pub fn complete(&self, run_id: &str, link_count: usize) {
        self.finish(run_id, RunState::Completed, Some(link_count), None);
    }

    pub fn fail(&self, run_id: &str, error: String) {
        self.finish(run_id, RunState::Failed, None, Some(error));
    }

    fn finish(
        &self,
        run_id: &str,
        state: RunState,
        link_count: Option<usize>,
        error: Option<String>,
    ) {
        let mut runs = self.runs.write().unwrap();
        if let Some(entry) = runs.get_mut(run_id) {
            let end = Utc::now();
            entry.status.status = state;
            entry.status.link_count = link_count;
            entry.status.error = error;
            entry.status.end_time = Some(end);
            entry.status.duration_seconds =
                Some((end - entry.status.start_time).num_milliseconds() as f64 / 1000.0);
        }
    }

    pub fn status(&self, run_id: &str) -> Option<RunStatus> {
        self.runs
            .read()
            .unwrap()
            .get(run_id)
            .map(|entry| entry.status.clone())
    }

    /// Flip a run's cancel token. Returns false for unknown runs.
    pub fn cancel(&self, run_id: &str) -> bool {
        let runs = self.runs.read().unwrap();
        match runs.get(run_id) {
            Some(entry) => {
                entry.cancel.cancel();
                true
            }
            None => false,
        }
    }
}
