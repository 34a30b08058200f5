//! Run persistence.

use std::sync::Arc;

use dashmap::DashMap;

use crate::run::Run;

/// Storage abstraction for run snapshots.
///
/// Implementations persist whole-run snapshots keyed by `run_id`; callers
/// save the complete run after every state change rather than issuing
/// partial updates.
pub trait RunStore: Send + Sync {
    /// Insert or replace the snapshot for `run.run_id`.
    fn save(&self, run: Run);

    /// Fetch a snapshot by id.
    fn get(&self, run_id: &str) -> Option<Run>;

    fn exists(&self, run_id: &str) -> bool;

    /// Remove a run; returns whether it was present.
    fn delete(&self, run_id: &str) -> bool;

    /// Snapshot of every stored run, in no particular order.
    fn list_all(&self) -> Vec<Run>;

    /// Drop every stored run.
    fn clear(&self);
}

/// Concurrent in-memory store, the default backend.
///
/// Clones share the same underlying map, so handlers and background
/// executors can each hold a cheap handle.
#[derive(Default, Clone)]
pub struct InMemoryRunStore {
    runs: Arc<DashMap<String, Run>>,
}

impl InMemoryRunStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RunStore for InMemoryRunStore {
    fn save(&self, run: Run) {
        self.runs.insert(run.run_id.clone(), run);
    }

    fn get(&self, run_id: &str) -> Option<Run> {
        self.runs.get(run_id).map(|entry| entry.value().clone())
    }

    fn exists(&self, run_id: &str) -> bool {
        self.runs.contains_key(run_id)
    }

    fn delete(&self, run_id: &str) -> bool {
        self.runs.remove(run_id).is_some()
    }

    fn list_all(&self) -> Vec<Run> {
        self.runs.iter().map(|entry| entry.value().clone()).collect()
    }

    fn clear(&self) {
        self.runs.clear();
    }
}
