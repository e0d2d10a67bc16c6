//! Throughput and ETA computation from a raw byte counter.
//!
//! Upload endpoints normally push speed and ETA precomputed. When all a
//! feed provides is "bytes acknowledged so far", a [`ThroughputMeter`]
//! turns those samples into complete [`ProgressRecord`]s.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use super::{clamp_percentage, ProgressRecord};

/// Default width of the sliding window used for instantaneous speed.
pub const DEFAULT_SPEED_WINDOW: Duration = Duration::from_secs(3);

/// Computes speed and ETA for one upload from byte-count samples.
#[derive(Debug, Clone)]
pub struct ThroughputMeter {
    file_name: String,
    file_size: u64,
    started_at: Instant,
    window: Duration,
    uploaded: u64,
    samples: VecDeque<(Instant, u64)>,
}

impl ThroughputMeter {
    /// Create a meter for a file of `file_size` bytes, starting now.
    #[must_use]
    pub fn new(file_name: impl Into<String>, file_size: u64) -> Self {
        Self::starting_at(file_name, file_size, Instant::now())
    }

    /// Create a meter whose clock starts at `started_at`.
    #[must_use]
    pub fn starting_at(file_name: impl Into<String>, file_size: u64, started_at: Instant) -> Self {
        let mut samples = VecDeque::new();
        samples.push_back((started_at, 0));
        Self {
            file_name: file_name.into(),
            file_size,
            started_at,
            window: DEFAULT_SPEED_WINDOW,
            uploaded: 0,
            samples,
        }
    }

    /// Use a different sliding window for instantaneous speed.
    #[must_use]
    pub fn with_window(mut self, window: Duration) -> Self {
        self.window = window;
        self
    }

    /// Record the current acknowledged byte count.
    pub fn record(&mut self, uploaded_bytes: u64) -> ProgressRecord {
        self.record_at(uploaded_bytes, Instant::now())
    }

    /// Record the acknowledged byte count as observed at `now`.
    ///
    /// Counts beyond the file size are capped, and a count lower than one
    /// already seen (late, out-of-order delivery) never moves the upload
    /// backwards.
    pub fn record_at(&mut self, uploaded_bytes: u64, now: Instant) -> ProgressRecord {
        self.uploaded = self.uploaded.max(uploaded_bytes.min(self.file_size));
        self.samples.push_back((now, self.uploaded));

        // keep one sample at or beyond the window edge as the baseline
        while self.samples.len() > 2 {
            let (t, _) = self.samples[1];
            if now.saturating_duration_since(t) >= self.window {
                self.samples.pop_front();
            } else {
                break;
            }
        }

        let speed = self.speed();
        let remaining = self.file_size - self.uploaded;
        let estimated_time_left = if remaining == 0 || speed <= 0.0 {
            0.0
        } else {
            remaining as f64 / speed
        };

        let progress = if self.file_size == 0 {
            100.0
        } else {
            clamp_percentage(self.uploaded as f64 / self.file_size as f64 * 100.0)
        };

        ProgressRecord {
            file_name: self.file_name.clone(),
            progress,
            file_size: self.file_size,
            uploaded_bytes: self.uploaded,
            speed,
            estimated_time_left,
            extra: serde_json::Map::new(),
        }
    }

    /// Bytes per second over the sliding window, falling back to the
    /// average since start when the window has no elapsed time.
    fn speed(&self) -> f64 {
        if let (Some(&(t0, b0)), Some(&(t1, b1))) = (self.samples.front(), self.samples.back()) {
            let elapsed = t1.saturating_duration_since(t0).as_secs_f64();
            if elapsed > 0.0 {
                return b1.saturating_sub(b0) as f64 / elapsed;
            }
            let total = t1.saturating_duration_since(self.started_at).as_secs_f64();
            if total > 0.0 {
                return b1 as f64 / total;
            }
        }
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_elapsed_time_means_zero_speed() {
        let start = Instant::now();
        let mut meter = ThroughputMeter::starting_at("a.bin", 1000, start);

        let record = meter.record_at(100, start);
        assert!(record.speed.abs() < f64::EPSILON);
        assert!(record.estimated_time_left.abs() < f64::EPSILON);
        assert!((record.progress - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_speed_and_eta() {
        let start = Instant::now();
        let mut meter = ThroughputMeter::starting_at("a.bin", 1000, start);

        let record = meter.record_at(200, start + Duration::from_secs(2));
        assert!((record.speed - 100.0).abs() < 1e-9);
        assert!((record.estimated_time_left - 8.0).abs() < 1e-9);
        assert!(record.is_within_bounds());
    }

    #[test]
    fn test_eta_zero_when_complete() {
        let start = Instant::now();
        let mut meter = ThroughputMeter::starting_at("a.bin", 500, start);

        let record = meter.record_at(500, start + Duration::from_secs(1));
        assert_eq!(record.uploaded_bytes, 500);
        assert!(record.estimated_time_left.abs() < f64::EPSILON);
        assert!((record.progress - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_overshoot_is_clamped() {
        let start = Instant::now();
        let mut meter = ThroughputMeter::starting_at("a.bin", 500, start);

        let record = meter.record_at(800, start + Duration::from_secs(1));
        assert_eq!(record.uploaded_bytes, 500);
        assert!((record.progress - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_out_of_order_sample_does_not_regress() {
        let start = Instant::now();
        let mut meter = ThroughputMeter::starting_at("a.bin", 1000, start);

        meter.record_at(600, start + Duration::from_secs(1));
        let record = meter.record_at(400, start + Duration::from_secs(2));
        assert_eq!(record.uploaded_bytes, 600);
    }

    #[test]
    fn test_window_tracks_recent_rate() {
        let start = Instant::now();
        let mut meter =
            ThroughputMeter::starting_at("a.bin", 10_000, start).with_window(Duration::from_secs(2));

        meter.record_at(1000, start + Duration::from_secs(1));
        meter.record_at(2000, start + Duration::from_secs(2));
        meter.record_at(2100, start + Duration::from_secs(4));
        let record = meter.record_at(2200, start + Duration::from_secs(5));

        // window now spans t=2..5 (baseline at or beyond the edge)
        assert!((record.speed - 200.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_empty_file_is_complete() {
        let mut meter = ThroughputMeter::new("empty.txt", 0);
        let record = meter.record(0);
        assert!((record.progress - 100.0).abs() < f64::EPSILON);
        assert!(record.estimated_time_left.abs() < f64::EPSILON);
    }
}
