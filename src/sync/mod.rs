//! Route synchronization.
//!
//! # Data Flow
//! ```text
//! route file ──notify──► SyncLoop
//!     → routes_file.rs (RouteSet, TLS files read)
//!     → batch.rs       (fresh State; failing routes skipped + reported)
//!     → StateApplier   (StateStore publish + state.json)
//! ```
//!
//! # Design Decisions
//! - Each batch regenerates the whole State; nothing is patched in place
//! - A route file that fails to load keeps the previously applied State
//! - The loop is one unit of pending work and exits on the stop signal

pub mod batch;
pub mod routes_file;
pub mod store;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::config::watcher::FileWatcher;
use crate::error::SidecarResult;
use crate::lifecycle::Shutdown;
use crate::observability::metrics;
use crate::state::{BuildOptions, CertificateStore};

pub use batch::{build_state, BatchOutcome, Direction, RouteError, RouteFailure};
pub use routes_file::{load_route_set, RouteFileError, RouteSet};
pub use store::{Snapshot, SnapshotApplier, StateApplier, StateStore};

/// Quiet period that folds a burst of file events into one batch.
const DEBOUNCE: Duration = Duration::from_millis(200);

/// Rebuilds and applies state whenever the route file changes.
pub struct SyncLoop {
    options: BuildOptions,
    certs: Arc<dyn CertificateStore>,
    applier: Arc<dyn StateApplier>,
    routes_path: Option<PathBuf>,
    watch: bool,
}

impl SyncLoop {
    pub fn new(
        options: BuildOptions,
        certs: Arc<dyn CertificateStore>,
        applier: Arc<dyn StateApplier>,
    ) -> Self {
        Self {
            options,
            certs,
            applier,
            routes_path: None,
            watch: false,
        }
    }

    /// Read routes from `path`, optionally reloading on change.
    pub fn with_routes(mut self, path: impl Into<PathBuf>, watch: bool) -> Self {
        self.routes_path = Some(path.into());
        self.watch = watch;
        self
    }

    /// Run one batch: load, build, apply.
    pub fn run_batch(&self) -> SidecarResult<BatchOutcome> {
        let routes = match &self.routes_path {
            Some(path) => load_route_set(path)?,
            None => RouteSet::default(),
        };

        let outcome = build_state(&self.options, self.certs.as_ref(), &routes);
        for failure in &outcome.failures {
            metrics::record_route_error(failure.direction.as_str());
            tracing::warn!(
                route = %failure.route,
                direction = %failure.direction,
                error = %failure.error,
                "Route skipped"
            );
        }

        let changed = self.applier.apply(&outcome.state)?;
        metrics::set_fragments(outcome.state.len());
        tracing::debug!(
            fragments = outcome.state.len(),
            skipped = outcome.failures.len(),
            changed,
            "Batch built"
        );
        Ok(outcome)
    }

    /// Apply the initial batch, then keep watching in the background.
    ///
    /// An initial failure is returned and leaves nothing registered.
    pub fn start(self, shutdown: &Shutdown) -> SidecarResult<JoinHandle<()>> {
        let guard = shutdown.register();

        let first = self.run_batch();
        metrics::record_state_build(first.is_ok());
        first?;

        let watcher = match (&self.routes_path, self.watch) {
            (Some(path), true) => {
                let (watcher, changes) = FileWatcher::new(path);
                Some((watcher.run()?, changes))
            }
            _ => None,
        };

        let mut stop = shutdown.stop_signal();
        Ok(tokio::spawn(async move {
            let Some((_handle, mut changes)) = watcher else {
                stop.stopped().await;
                guard.complete();
                return;
            };

            loop {
                tokio::select! {
                    _ = stop.stopped() => break,
                    change = changes.recv() => {
                        if change.is_none() {
                            break;
                        }
                        tokio::time::sleep(DEBOUNCE).await;
                        while changes.try_recv().is_ok() {}

                        let result = self.run_batch();
                        metrics::record_state_build(result.is_ok());
                        if let Err(e) = result {
                            tracing::error!(error = %e, "Route reload failed; keeping previous state");
                        }
                    }
                }
            }

            tracing::debug!("Sync loop stopped");
            guard.complete();
        }))
    }
}
