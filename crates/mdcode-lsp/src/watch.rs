//! Folder watching for workspace re-indexing
//!
//! Prose documents and build manifests can change on disk without passing
//! through the editor (a branch switch, a generator, another tool). The
//! watcher batches those changes and hands them to the server, which
//! re-indexes the workspace and republishes diagnostics.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use notify::{RecursiveMode, Watcher};
use notify_debouncer_mini::{DebouncedEvent, Debouncer, new_debouncer};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// A debounced batch of changed paths.
pub type ChangeBatch = Vec<PathBuf>;

/// Recursive watcher over the workspace roots.
///
/// Uses notify-debouncer-mini so that a burst of writes (a checkout, a
/// formatter touching many files) arrives as one batch.
pub struct FolderWatcher {
    /// The debouncer wrapping the underlying watcher
    _debouncer: Debouncer<notify::RecommendedWatcher>,

    /// Receiver for change batches
    event_rx: mpsc::UnboundedReceiver<ChangeBatch>,
}

impl FolderWatcher {
    /// Watch every root recursively.
    ///
    /// Paths under a directory named in `excluded` are ignored. A root that
    /// cannot be watched is logged and skipped; an error is returned only when
    /// the watcher itself cannot be created.
    pub fn new(roots: &[PathBuf], debounce_ms: u64, excluded: Vec<String>) -> anyhow::Result<Self> {
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        let mut debouncer = new_debouncer(
            Duration::from_millis(debounce_ms),
            move |res: std::result::Result<Vec<DebouncedEvent>, notify::Error>| match res {
                Ok(events) => {
                    let batch: ChangeBatch = events
                        .into_iter()
                        .map(|event| event.path)
                        .filter(|path| is_relevant(path, &excluded))
                        .collect();
                    if batch.is_empty() {
                        return;
                    }
                    debug!(count = batch.len(), "Folder change detected");
                    if event_tx.send(batch).is_err() {
                        debug!("Change receiver dropped, ignoring folder events");
                    }
                }
                Err(e) => {
                    warn!(error = %e, "Folder watch error");
                }
            },
        )
        .context("failed to create folder watcher")?;

        for root in roots {
            match debouncer.watcher().watch(root, RecursiveMode::Recursive) {
                Ok(()) => info!(path = %root.display(), debounce_ms, "Started folder watcher"),
                Err(e) => warn!(path = %root.display(), error = %e, "Failed to watch folder"),
            }
        }

        Ok(Self {
            _debouncer: debouncer,
            event_rx,
        })
    }

    /// Receive the next batch of changed paths.
    ///
    /// Returns `None` if the watcher has been stopped.
    pub async fn recv(&mut self) -> Option<ChangeBatch> {
        self.event_rx.recv().await
    }
}

/// Whether a changed path can affect the index.
fn is_relevant(path: &Path, excluded: &[String]) -> bool {
    !path.components().any(|component| {
        component
            .as_os_str()
            .to_str()
            .is_some_and(|name| excluded.iter().any(|dir| dir == name))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn excluded() -> Vec<String> {
        vec!["node_modules".to_string(), ".git".to_string()]
    }

    #[test]
    fn test_is_relevant() {
        assert!(is_relevant(Path::new("/repo/guide.md"), &excluded()));
        assert!(is_relevant(Path::new("/repo/tsconfig.json"), &excluded()));
        assert!(!is_relevant(
            Path::new("/repo/node_modules/pkg/index.d.ts"),
            &excluded()
        ));
        assert!(!is_relevant(Path::new("/repo/.git/HEAD"), &excluded()));
    }

    #[tokio::test]
    async fn test_watcher_creation() {
        let temp = TempDir::new().unwrap();
        let watcher = FolderWatcher::new(&[temp.path().to_path_buf()], 50, excluded());
        assert!(watcher.is_ok());
    }

    #[tokio::test]
    async fn test_missing_root_is_skipped() {
        let temp = TempDir::new().unwrap();
        let missing = temp.path().join("missing");
        let watcher = FolderWatcher::new(&[missing], 50, excluded());
        assert!(watcher.is_ok());
    }

    #[tokio::test]
    async fn test_watcher_detects_file_change() {
        let temp = TempDir::new().unwrap();
        // Canonicalize to handle macOS /var -> /private/var symlinks
        let temp_path = temp.path().canonicalize().unwrap();
        let md_path = temp_path.join("guide.md");

        let mut watcher = FolderWatcher::new(&[temp_path.clone()], 50, excluded()).unwrap();

        // Give the watcher time to start
        tokio::time::sleep(Duration::from_millis(100)).await;

        std::fs::write(&md_path, "```ts\nconst a = 1;\n```\n").unwrap();

        let batch = tokio::time::timeout(Duration::from_secs(5), watcher.recv())
            .await
            .expect("Timed out waiting for folder event")
            .expect("Watcher stopped");

        assert!(
            batch.iter().any(|path| path.ends_with("guide.md")),
            "unexpected batch: {batch:?}"
        );
    }
}
