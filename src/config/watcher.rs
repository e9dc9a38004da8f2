//! API document watcher for hot reload.

use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::document::{ContractSnapshot, DocumentPipeline};
use crate::observability::metrics;

/// Monitors a location and rebuilds the contract from the document on change.
pub struct DocumentWatcher {
    path: PathBuf,
    location: PathBuf,
    pipeline: DocumentPipeline,
    update_tx: mpsc::UnboundedSender<ContractSnapshot>,
}

impl DocumentWatcher {
    /// Create a new DocumentWatcher.
    ///
    /// `location` is watched; `path` is the document rebuilt on each change.
    /// Returns the watcher and a receiver for rebuilt snapshots.
    pub fn new(
        path: &Path,
        location: &Path,
        pipeline: DocumentPipeline,
    ) -> (Self, mpsc::UnboundedReceiver<ContractSnapshot>) {
        let (update_tx, update_rx) = mpsc::unbounded_channel();

        (
            Self {
                path: path.to_path_buf(),
                location: location.to_path_buf(),
                pipeline,
                update_tx,
            },
            update_rx,
        )
    }

    /// Start watching. The returned handle must be kept alive.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let tx = self.update_tx.clone();
        let path = self.path.clone();
        let pipeline = self.pipeline.clone();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    if event.kind.is_modify() || event.kind.is_create() {
                        tracing::info!(
                            changed = ?event.paths,
                            document = %path.display(),
                            "Change detected, rebuilding API contract"
                        );
                        match pipeline.build(&path) {
                            Ok(snapshot) => {
                                metrics::record_reload("ok");
                                let _ = tx.send(snapshot);
                            }
                            Err(e) => {
                                metrics::record_reload("error");
                                tracing::error!(error = %e, "Failed to reload API document. Keeping current contract.");
                            }
                        }
                    }
                }
                Err(e) => tracing::error!("Watch error: {:?}", e),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        let mode = if self.location.is_dir() {
            RecursiveMode::Recursive
        } else {
            RecursiveMode::NonRecursive
        };
        watcher.watch(&self.location, mode)?;

        tracing::info!(location = ?self.location, document = ?self.path, "Document watcher started");
        Ok(watcher)
    }
}
