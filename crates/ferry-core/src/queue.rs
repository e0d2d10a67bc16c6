//! Pending file selection queue.
//!
//! Files picked by the user (file dialog, drag and drop) wait here until the
//! caller dispatches them. The queue is deduplicated by file name and keeps
//! insertion order. It is independent of progress tracking: nothing here
//! touches the store's per-upload maps.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// A file selected for upload but not yet dispatched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingFile {
    /// File name, used as the dedup key
    pub name: String,
    /// Size in bytes, when known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    /// Local path the file was picked from, when known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

impl PendingFile {
    /// Create a pending file known only by name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            size: None,
            path: None,
        }
    }

    /// Describe a local file, reading its size from the file system.
    ///
    /// # Errors
    ///
    /// Returns an error if the path has no file name or its metadata can't be read.
    pub fn from_path(path: &Path) -> crate::Result<Self> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .ok_or_else(|| {
                crate::Error::Internal(format!("path has no file name: {}", path.display()))
            })?;
        let metadata = std::fs::metadata(path)?;

        Ok(Self {
            name,
            size: Some(metadata.len()),
            path: Some(path.to_path_buf()),
        })
    }

    /// Set the known size.
    #[must_use]
    pub fn with_size(mut self, size: u64) -> Self {
        self.size = Some(size);
        self
    }
}

/// Append the files from `incoming` whose names are not already queued.
///
/// Existing entries keep their order; new ones follow in the order given.
/// A name repeated inside `incoming` is only taken once.
#[must_use]
pub fn merge_by_name(existing: &[PendingFile], incoming: Vec<PendingFile>) -> Vec<PendingFile> {
    let mut merged = existing.to_vec();
    for file in incoming {
        if !merged.iter().any(|f| f.name == file.name) {
            merged.push(file);
        }
    }
    merged
}

/// Drop every file whose name equals `file_name` exactly.
#[must_use]
pub fn without_name(existing: &[PendingFile], file_name: &str) -> Vec<PendingFile> {
    existing
        .iter()
        .filter(|f| f.name != file_name)
        .cloned()
        .collect()
}
