//! Common test utilities for `Ferry` integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use ferry_core::progress::ProgressRecord;
use ferry_core::store::{UploadSnapshot, UploadStore};
use ferry_core::stream::{ProgressSource, StreamHandle};
use ferry_core::{Error, Result};

/// Counts how often a fake stream was closed.
#[derive(Debug, Default)]
pub struct CloseCounter(AtomicUsize);

impl CloseCounter {
    /// Number of close calls seen.
    pub fn count(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

/// A fake progress source, optionally failing every close.
pub struct FakeSource {
    closes: Arc<CloseCounter>,
    fail: bool,
}

impl ProgressSource for FakeSource {
    fn close(&self) -> Result<()> {
        self.closes.0.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            Err(Error::CloseFailed(
                "fake".to_string(),
                "socket already gone".to_string(),
            ))
        } else {
            Ok(())
        }
    }
}

/// Create a handle whose close succeeds.
pub fn fake_stream(key: &str) -> (StreamHandle, Arc<CloseCounter>) {
    make_stream(key, false)
}

/// Create a handle whose close always fails.
pub fn failing_stream(key: &str) -> (StreamHandle, Arc<CloseCounter>) {
    make_stream(key, true)
}

fn make_stream(key: &str, fail: bool) -> (StreamHandle, Arc<CloseCounter>) {
    let closes = Arc::new(CloseCounter::default());
    let handle = StreamHandle::new(
        key,
        FakeSource {
            closes: closes.clone(),
            fail,
        },
    );
    (handle, closes)
}

/// Build a fully populated progress record.
pub fn record(name: &str, size: u64, uploaded: u64) -> ProgressRecord {
    let mut record = ProgressRecord::new(name, size);
    record.uploaded_bytes = uploaded;
    record.progress = if size == 0 {
        100.0
    } else {
        uploaded as f64 / size as f64 * 100.0
    };
    record.speed = 100.0;
    record.estimated_time_left = size.saturating_sub(uploaded) as f64 / 100.0;
    record
}

/// Wait until the store satisfies `pred`, failing the test after five seconds.
pub async fn wait_for(store: &UploadStore, pred: impl Fn(&UploadSnapshot) -> bool) -> UploadSnapshot {
    let mut rx = store.subscribe();
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let snapshot = rx.borrow_and_update().clone();
            if pred(&snapshot) {
                return snapshot;
            }
            rx.changed().await.expect("store dropped");
        }
    })
    .await
    .expect("timed out waiting for store state")
}
