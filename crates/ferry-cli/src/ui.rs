//! UI utilities for Ferry CLI.

use std::collections::HashMap;
use std::time::Duration;

use ferry_core::progress::{format_eta, format_size, ProgressRecord, UploadPhase};
use ferry_core::store::UploadSnapshot;

const BAR_WIDTH: usize = 24;

/// Render a fixed-width bar for a percentage in `[0, 100]`.
pub fn progress_bar(percent: f64, width: usize) -> String {
    let percent = if percent.is_finite() {
        percent.clamp(0.0, 100.0)
    } else {
        0.0
    };
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
    let filled = ((percent / 100.0) * width as f64).round() as usize;
    let filled = filled.min(width);
    format!("[{}{}]", "█".repeat(filled), "░".repeat(width - filled))
}

/// Format a transfer rate in bytes per second.
pub fn format_speed(bytes_per_sec: f64) -> String {
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let bytes = if bytes_per_sec.is_finite() && bytes_per_sec > 0.0 {
        bytes_per_sec as u64
    } else {
        0
    };
    format!("{}/s", format_size(bytes))
}

/// One human-readable status line for an upload.
pub fn format_line(key: &str, record: Option<&ProgressRecord>, phase: Option<UploadPhase>) -> String {
    let phase = phase.unwrap_or_default();

    let Some(record) = record else {
        return format!("  {:<28} {:>9}", truncate(key, 28), phase);
    };

    let detail = match phase {
        UploadPhase::Active => {
            let eta = record
                .eta()
                .map_or_else(|| "--".to_string(), format_eta);
            format!("{:>10}  ETA {}", format_speed(record.speed), eta)
        }
        other => other.to_string(),
    };

    format!(
        "  {:<28} {} {:>5.1}%  {:>9} / {:<9}  {}",
        truncate(key, 28),
        progress_bar(record.progress, BAR_WIDTH),
        record.progress,
        format_size(record.uploaded_bytes),
        format_size(record.file_size),
        detail
    )
}

/// One JSON object describing an upload.
pub fn json_line(key: &str, record: Option<&ProgressRecord>, phase: Option<UploadPhase>) -> String {
    serde_json::json!({
        "key": key,
        "phase": phase.unwrap_or_default(),
        "progress": record,
    })
    .to_string()
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let kept: String = s.chars().take(max.saturating_sub(1)).collect();
    format!("{kept}…")
}

/// Turns store snapshots into output lines, emitting a line for an upload
/// only when what it would print has changed.
#[derive(Debug, Default)]
pub struct ProgressView {
    json: bool,
    last: HashMap<String, String>,
}

impl ProgressView {
    /// Create a view printing tables, or JSON lines when `json` is set.
    pub fn new(json: bool) -> Self {
        Self {
            json,
            last: HashMap::new(),
        }
    }

    /// Lines that changed since the previous call, in key order.
    pub fn changed_lines(&mut self, snapshot: &UploadSnapshot) -> Vec<String> {
        let mut lines = Vec::new();
        for key in snapshot.tracked_keys() {
            let record = snapshot.progress(key);
            let phase = snapshot.phase(key);
            let line = if self.json {
                json_line(key, record, phase)
            } else {
                format_line(key, record, phase)
            };

            if self.last.get(key) != Some(&line) {
                self.last.insert(key.to_string(), line.clone());
                lines.push(line);
            }
        }
        lines
    }
}

/// Parse a duration string like "250ms", "30s", "5m", or "1h".
pub fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }

    if let Some(num_str) = s.strip_suffix("ms") {
        let num: u64 = num_str.parse().ok()?;
        Some(Duration::from_millis(num))
    } else if let Some(num_str) = s.strip_suffix('s') {
        let num: u64 = num_str.parse().ok()?;
        Some(Duration::from_secs(num))
    } else if let Some(num_str) = s.strip_suffix('m') {
        let num: u64 = num_str.parse().ok()?;
        num.checked_mul(60).map(Duration::from_secs)
    } else if let Some(num_str) = s.strip_suffix('h') {
        let num: u64 = num_str.parse().ok()?;
        num.checked_mul(3600).map(Duration::from_secs)
    } else {
        None
    }
}

/// Format a duration the way [`parse_duration`] reads it.
pub fn format_duration(d: Duration) -> String {
    if d.subsec_millis() != 0 {
        format!("{}ms", d.as_millis())
    } else if d.as_secs() % 3600 == 0 && d.as_secs() > 0 {
        format!("{}h", d.as_secs() / 3600)
    } else if d.as_secs() % 60 == 0 && d.as_secs() > 0 {
        format!("{}m", d.as_secs() / 60)
    } else {
        format!("{}s", d.as_secs())
    }
}
