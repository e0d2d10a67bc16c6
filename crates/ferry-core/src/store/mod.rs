//! The upload coordinator.
//!
//! [`UploadStore`] owns every piece of per-upload state: progress records,
//! uploading flags, upload phases, registered stream handles, and the
//! pending file queue. All of it lives in a single `watch` channel of
//! [`UploadSnapshot`]s:
//!
//! - Every mutation goes through the channel's lock, so there is exactly
//!   one writer at a time and no reader can see a half-applied update.
//! - Maps are `Arc`-shared between snapshots and copied on write, so a
//!   snapshot a reader is holding never changes under it.
//! - Subscribers are woken on every mutation that changed something.
//!
//! Stream handles removed by a mutation are closed after the mutation has
//! been published, outside the lock. Close failures are logged and
//! discarded. Updates a stream delivers are checked against the stream
//! registry inside the same lock, so once a stream has been removed,
//! replaced, cancelled, or reset away, nothing it still delivers is applied.
//!
//! ## Example
//!
//! ```rust,ignore
//! let store = UploadStore::new();
//! store.add_files(vec![PendingFile::new("a.png"), PendingFile::new("b.png")]);
//! store.add_stream("a.png", handle);
//! store.set_uploading("a.png", true);
//! store.set_progress("a.png", record);
//! ```

mod snapshot;

pub use snapshot::UploadSnapshot;

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::watch;

use crate::progress::{ProgressRecord, UploadPhase};
use crate::queue::{self, PendingFile};
use crate::stream::StreamHandle;

/// Coordinator for concurrently running uploads.
///
/// Cloning is cheap; clones share the same state.
#[derive(Clone)]
pub struct UploadStore {
    state: Arc<watch::Sender<UploadSnapshot>>,
}

impl Default for UploadStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for UploadStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let snapshot = self.state.borrow();
        f.debug_struct("UploadStore")
            .field("version", &snapshot.version)
            .field("tracked", &snapshot.progress.len())
            .field("streams", &snapshot.streams.len())
            .field("pending", &snapshot.pending.len())
            .finish()
    }
}

impl UploadStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(UploadSnapshot::default());
        Self {
            state: Arc::new(tx),
        }
    }

    /// Subscribe to state changes.
    ///
    /// The receiver is notified after every mutation that changed something.
    pub fn subscribe(&self) -> watch::Receiver<UploadSnapshot> {
        self.state.subscribe()
    }

    /// The current state.
    pub fn snapshot(&self) -> UploadSnapshot {
        self.state.borrow().clone()
    }

    /// Latest progress record for `key`.
    pub fn progress(&self, key: &str) -> Option<ProgressRecord> {
        self.state.borrow().progress(key).cloned()
    }

    /// Whether `key` is flagged as uploading.
    pub fn is_uploading(&self, key: &str) -> bool {
        self.state.borrow().is_uploading(key)
    }

    /// Phase recorded for `key`.
    pub fn phase(&self, key: &str) -> Option<UploadPhase> {
        self.state.borrow().phase(key)
    }

    /// Whether a stream is registered for `key`.
    pub fn has_stream(&self, key: &str) -> bool {
        self.state.borrow().has_stream(key)
    }

    /// The pending file queue.
    pub fn pending_files(&self) -> Vec<PendingFile> {
        self.state.borrow().pending_files().to_vec()
    }

    /// Apply `op` as one atomic update.
    ///
    /// `op` reports whether it changed anything; subscribers are only woken
    /// when it did.
    fn mutate<R: Default>(&self, op: impl FnOnce(&mut UploadSnapshot) -> (bool, R)) -> R {
        let mut result = None;
        self.state.send_if_modified(|snapshot| {
            let (changed, value) = op(snapshot);
            if changed {
                snapshot.version += 1;
            }
            result = Some(value);
            changed
        });
        result.unwrap_or_default()
    }

    // ---- progress & uploading ----

    /// Replace the whole progress record for `key`.
    ///
    /// The record is stored as given once pulled into its documented
    /// bounds (see [`ProgressRecord::clamped`]). A record without a file
    /// name takes the key as its name.
    pub fn set_progress(&self, key: &str, record: ProgressRecord) {
        let mut record = record.clamped();
        if record.file_name.is_empty() {
            record.file_name = key.to_string();
        }
        tracing::debug!(
            "Progress for '{}': {:.1}% ({}/{} bytes)",
            key,
            record.progress,
            record.uploaded_bytes,
            record.file_size
        );

        self.mutate(|s| {
            Arc::make_mut(&mut s.progress).insert(key.to_string(), record);
            (true, ())
        });
    }

    /// Set whether `key` has an open stream expected to deliver more updates.
    ///
    /// Marking a key as uploading also moves its phase to
    /// [`UploadPhase::Active`].
    pub fn set_uploading(&self, key: &str, uploading: bool) {
        tracing::debug!("Uploading flag for '{}' set to {}", key, uploading);
        self.mutate(|s| {
            Arc::make_mut(&mut s.uploading).insert(key.to_string(), uploading);
            if uploading {
                Arc::make_mut(&mut s.phases).insert(key.to_string(), UploadPhase::Active);
            }
            (true, ())
        });
    }

    /// Replace the progress record for the key `handle` was opened for, but
    /// only while `handle` is the stream registered for that key.
    ///
    /// Returns `false` if the update was dropped because the store no
    /// longer tracks the stream.
    pub(crate) fn set_progress_from(&self, handle: &StreamHandle, record: ProgressRecord) -> bool {
        let key = handle.key();
        let mut record = record.clamped();
        if record.file_name.is_empty() {
            record.file_name = key.to_string();
        }

        self.mutate(|s| {
            if !is_registered(s, handle) {
                return (false, false);
            }
            Arc::make_mut(&mut s.progress).insert(key.to_string(), record);
            (true, true)
        })
    }

    /// Record the phase of `key`.
    pub fn set_phase(&self, key: &str, phase: UploadPhase) {
        self.mutate(|s| {
            let changed = s.phases.get(key) != Some(&phase);
            if changed {
                Arc::make_mut(&mut s.phases).insert(key.to_string(), phase);
            }
            (changed, ())
        });
    }

    // ---- stream lifecycle ----

    /// Register the stream for `key`.
    ///
    /// A different handle already registered under `key` is closed and
    /// replaced. A handle whose source has already ended is not registered.
    pub fn add_stream(&self, key: &str, handle: StreamHandle) {
        let id = handle.id();
        let replaced = self.mutate(move |s| {
            if !handle.is_open() {
                tracing::debug!("Not registering ended stream for '{}'", key);
                return (false, None);
            }
            let previous = Arc::make_mut(&mut s.streams).insert(key.to_string(), handle);
            (true, previous.filter(|p| p.id() != id))
        });

        if let Some(previous) = replaced {
            tracing::warn!("Replacing live stream for '{}'; closing the old one", key);
            previous.close_quietly();
        }
    }

    /// Register a freshly opened stream and mark its key as uploading, in
    /// one update.
    ///
    /// Follows the [`add_stream`](Self::add_stream) rules for a handle
    /// already registered under the key. Returns `false` if the source had
    /// already ended and nothing was recorded.
    pub(crate) fn attach_stream(&self, handle: &StreamHandle) -> bool {
        let key = handle.key().to_string();
        let id = handle.id();
        let attached = handle.clone();
        let (registered, replaced) = self.mutate(move |s| {
            if !attached.is_open() {
                return (false, (false, None));
            }
            let previous = Arc::make_mut(&mut s.streams).insert(key.clone(), attached);
            Arc::make_mut(&mut s.uploading).insert(key.clone(), true);
            Arc::make_mut(&mut s.phases).insert(key, UploadPhase::Active);
            (true, (true, previous.filter(|p| p.id() != id)))
        });

        if let Some(previous) = replaced {
            tracing::warn!(
                "Replacing live stream for '{}'; closing the old one",
                handle.key()
            );
            previous.close_quietly();
        }
        registered
    }

    /// Close and unregister the stream for `key`, if any.
    pub fn remove_stream(&self, key: &str) {
        let removed = self.mutate(|s| take_stream(s, key));
        if let Some(handle) = removed {
            handle.close_quietly();
        }
    }

    /// Close and unregister every stream.
    ///
    /// The stream map is empty afterwards even if individual closes fail.
    pub fn close_all_streams(&self) {
        let handles = self.mutate(|s| {
            if s.streams.is_empty() {
                return (false, Vec::new());
            }
            let handles: Vec<StreamHandle> = s.streams.values().cloned().collect();
            s.streams = Arc::new(HashMap::new());
            (true, handles)
        });

        if !handles.is_empty() {
            tracing::debug!("Closing {} progress stream(s)", handles.len());
        }
        for handle in handles {
            handle.close_quietly();
        }
    }

    /// Cancel the upload for `key`.
    ///
    /// Closes its stream, clears the uploading flag, and marks it
    /// [`UploadPhase::Cancelled`] in one update. Aborting the HTTP request
    /// that carries the file bytes is up to the caller.
    pub fn cancel(&self, key: &str) {
        tracing::info!("Cancelling upload '{}'", key);
        self.settle(key, None, UploadPhase::Cancelled);
    }

    /// Mark the upload for `key` as finished successfully.
    pub fn finish(&self, key: &str) {
        tracing::info!("Upload '{}' completed", key);
        self.settle(key, None, UploadPhase::Completed);
    }

    /// Mark the upload for `key` as failed.
    pub fn fail(&self, key: &str, reason: &str) {
        tracing::warn!("Upload '{}' failed: {}", key, reason);
        self.settle(key, None, UploadPhase::Failed);
    }

    /// Settle the upload a particular stream was delivering.
    ///
    /// Does nothing unless `handle` is still the stream registered for its
    /// key: once the store has dropped a stream (remove, cancel, replace,
    /// reset) nothing that stream reports reaches the state again.
    pub(crate) fn settle_stream(&self, handle: &StreamHandle, phase: UploadPhase) {
        tracing::debug!("Stream for '{}' ended: {}", handle.key(), phase);
        self.settle(handle.key(), Some(handle), phase);
    }

    fn settle(&self, key: &str, expected: Option<&StreamHandle>, phase: UploadPhase) {
        let removed = self.mutate(|s| {
            if let Some(expected) = expected {
                if !is_registered(s, expected) {
                    return (false, None);
                }
            }
            let (_, removed) = take_stream(s, key);
            Arc::make_mut(&mut s.uploading).insert(key.to_string(), false);
            Arc::make_mut(&mut s.phases).insert(key.to_string(), phase);
            (true, removed)
        });

        if let Some(handle) = removed {
            handle.close_quietly();
        }
    }

    // ---- file queue ----

    /// Replace the pending file queue.
    pub fn set_files(&self, files: Vec<PendingFile>) {
        self.mutate(|s| {
            s.pending = Arc::new(files);
            (true, ())
        });
    }

    /// Queue the files whose names are not already pending.
    pub fn add_files(&self, files: Vec<PendingFile>) {
        self.mutate(|s| {
            let merged = queue::merge_by_name(&s.pending, files);
            let changed = merged.len() != s.pending.len();
            if changed {
                tracing::debug!("Queued {} file(s)", merged.len() - s.pending.len());
                s.pending = Arc::new(merged);
            }
            (changed, ())
        });
    }

    /// Remove every pending file named exactly `file_name`.
    pub fn remove_file(&self, file_name: &str) {
        self.mutate(|s| {
            let kept = queue::without_name(&s.pending, file_name);
            let changed = kept.len() != s.pending.len();
            if changed {
                s.pending = Arc::new(kept);
            }
            (changed, ())
        });
    }

    // ---- reset ----

    /// Close every stream and return the store to its initial, empty state.
    ///
    /// Subscribers see the cleared state in a single update.
    pub fn reset(&self) {
        let handles = self.mutate(|s| {
            let handles: Vec<StreamHandle> = s.streams.values().cloned().collect();
            *s = UploadSnapshot {
                version: s.version,
                ..UploadSnapshot::default()
            };
            (true, handles)
        });

        tracing::debug!("Store reset, closing {} stream(s)", handles.len());
        for handle in handles {
            handle.close_quietly();
        }
    }
}

fn is_registered(s: &UploadSnapshot, handle: &StreamHandle) -> bool {
    s.streams
        .get(handle.key())
        .is_some_and(|registered| registered.id() == handle.id())
}

fn take_stream(s: &mut UploadSnapshot, key: &str) -> (bool, Option<StreamHandle>) {
    if !s.streams.contains_key(key) {
        return (false, None);
    }
    let removed = Arc::make_mut(&mut s.streams).remove(key);
    (true, removed)
}
