//! Filesystem watcher: turns file modifications into queued jobs.
//!
//! Fire-and-forget: the watcher never waits for the job it enqueued, and
//! rapid successive saves of one file each enqueue their own job (no
//! debouncing). Enqueue failures are logged and swallowed so the
//! observation loop never dies.

use std::path::Path;
use std::sync::Arc;

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::domain::JobKind;
use crate::error::WatchError;
use crate::queue::JobQueue;

/// Priority given to jobs synthesized from filesystem events.
pub const WATCH_PRIORITY: u8 = 5;

/// Handle to a running watch. Dropping it (or calling [`stop`]) ends the
/// observation; in-flight jobs are unaffected.
///
/// [`stop`]: WatchHandle::stop
pub struct WatchHandle {
    // Held only to keep the OS watch alive.
    _watcher: RecommendedWatcher,
    forwarder: JoinHandle<()>,
}

impl WatchHandle {
    pub fn stop(self) {
        self.forwarder.abort();
    }
}

impl Drop for WatchHandle {
    fn drop(&mut self) {
        self.forwarder.abort();
    }
}

/// Watch `directory` recursively and enqueue a code-improvement job for
/// every modified file whose extension matches `extension`.
///
/// Events hop from notify's callback thread into the async world over an
/// unbounded channel; a spawned task owns the enqueue side.
pub fn watch(
    queue: Arc<JobQueue>,
    directory: &Path,
    extension: &str,
) -> Result<WatchHandle, WatchError> {
    let (tx, mut rx) = mpsc::unbounded_channel::<Event>();

    let mut watcher = notify::recommended_watcher(move |res: Result<Event, notify::Error>| {
        match res {
            Ok(event) => {
                let _ = tx.send(event);
            }
            Err(error) => tracing::warn!(%error, "filesystem watch error"),
        }
    })?;
    watcher.watch(directory, RecursiveMode::Recursive)?;
    tracing::info!(directory = %directory.display(), extension, "watching for changes");

    let ext = extension.to_string();
    let forwarder = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            handle_event(&queue, &event, &ext).await;
        }
    });

    Ok(WatchHandle {
        _watcher: watcher,
        forwarder,
    })
}

/// Translate one filesystem event into zero or more enqueues.
async fn handle_event(queue: &JobQueue, event: &Event, extension: &str) {
    if !matches!(event.kind, EventKind::Modify(_)) {
        return;
    }
    for path in &event.paths {
        if path.extension().and_then(|e| e.to_str()) != Some(extension) {
            continue;
        }
        match queue
            .enqueue(JobKind::CodeImprovement, path.clone(), WATCH_PRIORITY)
            .await
        {
            Ok(id) => tracing::debug!(%id, path = %path.display(), "change queued"),
            Err(error) => {
                tracing::warn!(path = %path.display(), %error, "could not queue change")
            }
        }
    }
}
