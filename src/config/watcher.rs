//! File watcher for hot reload of the route file.
//!
//! The parent directory is watched rather than the file itself. Editors and
//! config managers replace files by writing a sibling and renaming it over
//! the original, which drops an inode watch after the first swap.

use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

/// A watcher that reports changes to a single file, including replacement.
pub struct FileWatcher {
    path: PathBuf,
    change_tx: mpsc::UnboundedSender<()>,
}

impl FileWatcher {
    /// Create a new FileWatcher.
    ///
    /// Returns the watcher and a receiver that yields one item per change.
    pub fn new(path: &Path) -> (Self, mpsc::UnboundedReceiver<()>) {
        let (change_tx, change_rx) = mpsc::unbounded_channel();

        (
            Self {
                path: path.to_path_buf(),
                change_tx,
            },
            change_rx,
        )
    }

    /// Start watching. The returned handle must be kept alive.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let tx = self.change_tx;
        let dir = watched_dir(&self.path);
        let name = self.path.file_name().map(OsString::from);

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    if !event.kind.is_access() && touches(&event, name.as_deref()) {
                        tracing::debug!(kind = ?event.kind, paths = ?event.paths, "Watched file changed");
                        let _ = tx.send(());
                    }
                }
                Err(e) => tracing::error!(error = %e, "Watch error"),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        watcher.watch(&dir, RecursiveMode::NonRecursive)?;

        tracing::info!(path = ?self.path, dir = ?dir, "File watcher started");
        Ok(watcher)
    }
}

fn watched_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

fn touches(event: &Event, name: Option<&OsStr>) -> bool {
    let Some(name) = name else {
        return true;
    };
    event
        .paths
        .iter()
        .any(|p| p.file_name() == Some(name))
}
