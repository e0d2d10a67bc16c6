//! Immutable views of the upload store.

use std::collections::HashMap;
use std::sync::Arc;

use crate::progress::{ProgressRecord, UploadPhase};
use crate::queue::PendingFile;
use crate::stream::StreamHandle;

/// One consistent state of the upload store.
///
/// Snapshots never change after they are published. Each map is shared
/// with later snapshots until a mutation touches it, at which point the
/// store writes a fresh copy instead.
#[derive(Debug, Clone, Default)]
pub struct UploadSnapshot {
    pub(super) progress: Arc<HashMap<String, ProgressRecord>>,
    pub(super) uploading: Arc<HashMap<String, bool>>,
    pub(super) phases: Arc<HashMap<String, UploadPhase>>,
    pub(super) streams: Arc<HashMap<String, StreamHandle>>,
    pub(super) pending: Arc<Vec<PendingFile>>,
    pub(super) version: u64,
}

impl UploadSnapshot {
    /// Progress records by upload key.
    pub fn progress_by_key(&self) -> &HashMap<String, ProgressRecord> {
        &self.progress
    }

    /// Uploading flags by upload key.
    pub fn uploading_by_key(&self) -> &HashMap<String, bool> {
        &self.uploading
    }

    /// Upload phases by upload key.
    pub fn phase_by_key(&self) -> &HashMap<String, UploadPhase> {
        &self.phases
    }

    /// Registered stream handles by upload key.
    pub fn stream_by_key(&self) -> &HashMap<String, StreamHandle> {
        &self.streams
    }

    /// Files selected but not yet dispatched, in selection order.
    pub fn pending_files(&self) -> &[PendingFile] {
        &self.pending
    }

    /// Number of mutations published before this snapshot.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Latest progress record for `key`.
    pub fn progress(&self, key: &str) -> Option<&ProgressRecord> {
        self.progress.get(key)
    }

    /// Whether `key` is currently flagged as uploading.
    pub fn is_uploading(&self, key: &str) -> bool {
        self.uploading.get(key).copied().unwrap_or(false)
    }

    /// Phase recorded for `key`.
    pub fn phase(&self, key: &str) -> Option<UploadPhase> {
        self.phases.get(key).copied()
    }

    /// Whether a stream is registered for `key`.
    pub fn has_stream(&self, key: &str) -> bool {
        self.streams.contains_key(key)
    }

    /// Keys flagged as uploading, sorted.
    pub fn active_uploads(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self
            .uploading
            .iter()
            .filter(|(_, uploading)| **uploading)
            .map(|(key, _)| key.as_str())
            .collect();
        keys.sort_unstable();
        keys
    }

    /// Every key the store knows about from any per-upload map, sorted.
    pub fn tracked_keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self
            .progress
            .keys()
            .chain(self.uploading.keys())
            .chain(self.phases.keys())
            .chain(self.streams.keys())
            .map(String::as_str)
            .collect();
        keys.sort_unstable();
        keys.dedup();
        keys
    }

    /// Whether every map and the pending queue are empty.
    pub fn is_empty(&self) -> bool {
        self.progress.is_empty()
            && self.uploading.is_empty()
            && self.phases.is_empty()
            && self.streams.is_empty()
            && self.pending.is_empty()
    }
}
