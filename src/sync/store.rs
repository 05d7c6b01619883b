//! Publication of applied state.

use std::path::PathBuf;
use std::sync::Arc;

use arc_swap::ArcSwap;
use serde::Serialize;
use uuid::Uuid;

use crate::error::{SidecarError, SidecarResult};
use crate::state::State;
use crate::workspace::write_private;

/// An applied [`State`] and the count of distinct states applied before it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Snapshot {
    pub generation: u64,
    pub state: State,
}

/// Latest applied state, readable without locking.
///
/// Only the sync loop publishes; readers see either the old or the new
/// snapshot, never a partial one.
#[derive(Debug)]
pub struct StateStore {
    current: ArcSwap<Snapshot>,
}

impl StateStore {
    pub fn new() -> Self {
        Self {
            current: ArcSwap::from_pointee(Snapshot::default()),
        }
    }

    pub fn load(&self) -> Arc<Snapshot> {
        self.current.load_full()
    }

    /// The snapshot that would follow the current one for `state`, or `None`
    /// when `state` is what is already published. Nothing is stored.
    pub fn next(&self, state: &State) -> Option<Snapshot> {
        let current = self.current.load();
        if current.state == *state {
            return None;
        }
        Some(Snapshot {
            generation: current.generation + 1,
            state: state.clone(),
        })
    }

    /// Make `snapshot` the current one.
    pub fn commit(&self, snapshot: Snapshot) {
        self.current.store(Arc::new(snapshot));
    }

    /// Publish `state` if it differs from the current one.
    ///
    /// Returns the new generation, or `None` when nothing changed.
    pub fn publish(&self, state: State) -> Option<u64> {
        let snapshot = self.next(&state)?;
        let generation = snapshot.generation;
        self.commit(snapshot);
        Some(generation)
    }
}

impl Default for StateStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Hands a built [`State`] to whatever drives the proxy.
pub trait StateApplier: Send + Sync {
    /// Apply `state`. Returns `false` when it matched what was already applied.
    fn apply(&self, state: &State) -> SidecarResult<bool>;
}

/// Publishes into a [`StateStore`] and mirrors the snapshot to a JSON file
/// the control-API client reads.
#[derive(Debug)]
pub struct SnapshotApplier {
    store: Arc<StateStore>,
    path: PathBuf,
}

impl SnapshotApplier {
    pub fn new(store: Arc<StateStore>, path: impl Into<PathBuf>) -> Self {
        Self {
            store,
            path: path.into(),
        }
    }

    fn write_snapshot(&self, snapshot: &Snapshot) -> SidecarResult<()> {
        let body = serde_json::to_string_pretty(snapshot)
            .map_err(|e| SidecarError::io("failed to encode state snapshot", e.into()))?;

        let tmp = self
            .path
            .with_extension(format!("{}.tmp", Uuid::new_v4().simple()));
        write_private(&tmp, &body)
            .and_then(|()| std::fs::rename(&tmp, &self.path))
            .map_err(|e| {
                let _ = std::fs::remove_file(&tmp);
                SidecarError::io(format!("failed to write {}", self.path.display()), e)
            })
    }
}

impl StateApplier for SnapshotApplier {
    /// The file is written before the store moves, so a failed write leaves
    /// the previous snapshot current and the same state is retried next batch.
    fn apply(&self, state: &State) -> SidecarResult<bool> {
        let Some(snapshot) = self.store.next(state) else {
            return Ok(false);
        };
        self.write_snapshot(&snapshot)?;
        let generation = snapshot.generation;
        self.store.commit(snapshot);
        tracing::info!(generation, fragments = state.len(), "State applied");
        Ok(true)
    }
}
