//! Progress records for individual uploads.
//!
//! A [`ProgressRecord`] is the most recently known snapshot of one upload.
//! Records arrive as JSON payloads on a progress stream, using the camelCase
//! field names the upload endpoint emits:
//!
//! ```json
//! {"fileName":"a.png","progress":42,"fileSize":1000,"uploadedBytes":420,
//!  "speed":100,"estimatedTimeLeft":5.8,"chatId":"c-17"}
//! ```
//!
//! Fields beyond the six known ones are kept in [`ProgressRecord::extra`]
//! and written back out unchanged.

pub mod meter;

pub use meter::ThroughputMeter;

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Snapshot of one upload's size, byte, throughput, and ETA fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressRecord {
    /// File name, which is also the upload key
    #[serde(default)]
    pub file_name: String,
    /// Percentage complete (0.0 - 100.0)
    #[serde(default)]
    pub progress: f64,
    /// Total size of the source file in bytes
    #[serde(default)]
    pub file_size: u64,
    /// Bytes acknowledged by the server so far
    #[serde(default)]
    pub uploaded_bytes: u64,
    /// Throughput in bytes per second
    #[serde(default)]
    pub speed: f64,
    /// Seconds remaining at the current speed
    #[serde(default)]
    pub estimated_time_left: f64,
    /// Extra metadata attached by the stream payload
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ProgressRecord {
    /// Create an empty record for a file that has not uploaded anything yet.
    #[must_use]
    pub fn new(file_name: impl Into<String>, file_size: u64) -> Self {
        Self {
            file_name: file_name.into(),
            progress: 0.0,
            file_size,
            uploaded_bytes: 0,
            speed: 0.0,
            estimated_time_left: 0.0,
            extra: Map::new(),
        }
    }

    /// Attach an extra metadata field.
    #[must_use]
    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    /// Bytes still to be uploaded.
    pub fn remaining_bytes(&self) -> u64 {
        self.file_size.saturating_sub(self.uploaded_bytes)
    }

    /// Whether every field is inside its documented range.
    pub fn is_within_bounds(&self) -> bool {
        (0.0..=100.0).contains(&self.progress)
            && self.uploaded_bytes <= self.file_size
            && self.speed.is_finite()
            && self.speed >= 0.0
            && self.estimated_time_left.is_finite()
            && self.estimated_time_left >= 0.0
    }

    /// Pull every field back into its documented range.
    ///
    /// Records already in range come back unchanged. NaN or negative
    /// throughput and ETA become 0, and the ETA is forced to 0 once nothing
    /// remains to upload.
    #[must_use]
    pub fn clamped(mut self) -> Self {
        self.progress = clamp_percentage(self.progress);
        self.uploaded_bytes = self.uploaded_bytes.min(self.file_size);
        if !self.speed.is_finite() || self.speed < 0.0 {
            self.speed = 0.0;
        }
        if !self.estimated_time_left.is_finite()
            || self.estimated_time_left < 0.0
            || self.remaining_bytes() == 0
        {
            self.estimated_time_left = 0.0;
        }
        self
    }

    /// Estimated time left, or `None` while it is unknown.
    ///
    /// A stalled upload (zero speed with bytes still remaining) has no
    /// meaningful ETA even though the stored field reads 0.
    pub fn eta(&self) -> Option<Duration> {
        if self.remaining_bytes() == 0 {
            return Some(Duration::ZERO);
        }
        if self.speed <= 0.0 || !self.estimated_time_left.is_finite() {
            return None;
        }
        Duration::try_from_secs_f64(self.estimated_time_left).ok()
    }
}

/// Clamp a percentage into `0.0..=100.0`, mapping NaN to 0.
pub(crate) fn clamp_percentage(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 100.0)
    }
}

/// Lifecycle phase of an upload.
///
/// The uploading flag stays authoritative for "in flight"; the phase only
/// records how the upload got where it is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadPhase {
    /// Known to the store but not started
    #[default]
    Queued,
    /// Stream open, more updates expected
    Active,
    /// Finished successfully
    Completed,
    /// Ended with an error
    Failed,
    /// Cancelled by the user
    Cancelled,
}

impl UploadPhase {
    /// Whether no further progress is expected in this phase.
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    /// Lowercase name of the phase.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Active => "active",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for UploadPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Format a byte count for display.
#[must_use]
pub fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{bytes} B")
    }
}

/// Format a remaining-time estimate, e.g. `"1m 05s"`.
#[must_use]
pub fn format_eta(eta: Duration) -> String {
    let secs = eta.as_secs();
    if secs >= 3600 {
        format!("{}h {:02}m", secs / 3600, (secs % 3600) / 60)
    } else if secs >= 60 {
        format!("{}m {:02}s", secs / 60, secs % 60)
    } else {
        format!("{secs}s")
    }
}
