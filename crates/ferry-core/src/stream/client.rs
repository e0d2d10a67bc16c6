//! SSE progress stream client.
//!
//! Opens a `text/event-stream` connection to the upload endpoint for one
//! file and applies the events it delivers to an [`UploadStore`], in the
//! order they arrive.
//!
//! ## Events
//!
//! | Event | Payload | Effect |
//! |-------|---------|--------|
//! | `progress` or unnamed | progress record JSON | `set_progress` |
//! | `complete` | optional final record | upload completed, stream released |
//! | `error` | `{"message": ...}` or text | upload failed, stream released |
//!
//! Comment lines are keep-alives. A connection that ends without
//! `complete` or `error`, breaks, or stays silent past the idle timeout
//! fails the upload. Events only reach the store while the stream is the
//! one registered for its key; once the store drops it, the reader stops
//! without touching the upload's state.

use std::time::Duration;

use futures::StreamExt;
use reqwest::header::{ACCEPT, CACHE_CONTROL};
use reqwest::Url;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

use super::sse::{SseDecoder, SseEvent};
use super::{ProgressSource, StreamHandle};
use crate::config::StreamConfig;
use crate::error::{Error, Result};
use crate::progress::{ProgressRecord, UploadPhase};
use crate::store::UploadStore;

/// Build the stream URL for `key`: the endpoint with the file name
/// appended as one percent-encoded path segment.
pub fn progress_url(endpoint: &str, key: &str) -> Result<Url> {
    let invalid = |reason: String| Error::InvalidEndpoint {
        url: endpoint.to_string(),
        reason,
    };

    let mut url = Url::parse(endpoint).map_err(|e| invalid(e.to_string()))?;
    url.path_segments_mut()
        .map_err(|()| invalid("URL cannot take path segments".to_string()))?
        .pop_if_empty()
        .push(key);
    Ok(url)
}

/// A live SSE connection delivering progress for one upload.
#[derive(Debug)]
pub struct SseProgressStream {
    key: String,
    cancel: CancellationToken,
}

impl ProgressSource for SseProgressStream {
    fn close(&self) -> Result<()> {
        if !self.cancel.is_cancelled() {
            tracing::debug!("Closing SSE stream for '{}'", self.key);
            self.cancel.cancel();
        }
        Ok(())
    }

    fn is_open(&self) -> bool {
        !self.cancel.is_cancelled()
    }
}

impl SseProgressStream {
    /// Connect to the progress endpoint for `key` and start applying its
    /// events to `store`.
    ///
    /// On success the stream is registered with the store and the key is
    /// marked as uploading. Passing the returned handle to
    /// [`UploadStore::add_stream`] again is harmless.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid, the connection fails, or the
    /// endpoint answers with a non-success status.
    pub async fn open(store: &UploadStore, key: &str, config: &StreamConfig) -> Result<StreamHandle> {
        let url = progress_url(&config.endpoint, key)?;

        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .user_agent(config.user_agent.as_str())
            .build()
            .map_err(|e| Error::Internal(format!("failed to build HTTP client: {e}")))?;

        tracing::debug!("Opening progress stream for '{}' at {}", key, url);
        let response = client
            .get(url)
            .header(ACCEPT, "text/event-stream")
            .header(CACHE_CONTROL, "no-cache")
            .send()
            .await
            .map_err(|e| Error::ConnectFailed {
                key: key.to_string(),
                reason: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::BadStatus {
                key: key.to_string(),
                status: status.as_u16(),
            });
        }

        let cancel = CancellationToken::new();
        let handle = StreamHandle::new(
            key,
            Self {
                key: key.to_string(),
                cancel: cancel.clone(),
            },
        );

        if !store.attach_stream(&handle) {
            return Err(Error::Internal(format!(
                "progress stream for '{key}' ended before registration"
            )));
        }
        tracing::info!("Progress stream open for '{}'", key);

        tokio::spawn(pump(
            store.clone(),
            handle.clone(),
            response,
            cancel,
            config.idle_timeout,
        ));

        Ok(handle)
    }
}

/// How a stream ended on its own.
#[derive(Debug)]
enum Outcome {
    Completed,
    Failed(String),
}

async fn pump(
    store: UploadStore,
    handle: StreamHandle,
    response: reqwest::Response,
    cancel: CancellationToken,
    idle_timeout: Duration,
) {
    let key = handle.key().to_string();

    let outcome = tokio::select! {
        () = cancel.cancelled() => Ok(None),
        outcome = read_events(&store, &handle, response, idle_timeout) => outcome,
    };

    let phase = match outcome {
        Ok(None) => {
            tracing::debug!("Progress stream for '{}' released by the store", key);
            return;
        }
        Ok(Some(Outcome::Completed)) => {
            tracing::info!("Upload '{}' completed", key);
            UploadPhase::Completed
        }
        Ok(Some(Outcome::Failed(message))) => {
            tracing::warn!("Upload '{}' failed: {}", key, message);
            UploadPhase::Failed
        }
        Err(e) => {
            tracing::warn!("Upload '{}' failed: {}", key, e);
            UploadPhase::Failed
        }
    };

    // mark the source ended before settling so a late add_stream skips it
    cancel.cancel();
    store.settle_stream(&handle, phase);
}

/// Read and apply events until the stream ends on its own.
///
/// Returns `Ok(None)` once the store no longer tracks the stream.
async fn read_events(
    store: &UploadStore,
    handle: &StreamHandle,
    response: reqwest::Response,
    idle_timeout: Duration,
) -> Result<Option<Outcome>> {
    let key = handle.key();
    let mut body = std::pin::pin!(response.bytes_stream());
    let mut decoder = SseDecoder::new();

    loop {
        let chunk = match tokio::time::timeout(idle_timeout, body.next()).await {
            Err(_) => {
                return Err(Error::StreamIdle {
                    key: key.to_string(),
                    secs: idle_timeout.as_secs(),
                })
            }
            Ok(None) => {
                return Ok(Some(Outcome::Failed(
                    "stream ended before the upload completed".to_string(),
                )))
            }
            Ok(Some(Err(e))) => return Err(Error::StreamInterrupted(key.to_string(), e.to_string())),
            Ok(Some(Ok(chunk))) => chunk,
        };

        for event in decoder.feed(&chunk) {
            match apply_event(store, handle, &event) {
                Step::Continue => {}
                Step::Detached => return Ok(None),
                Step::Finished(outcome) => return Ok(Some(outcome)),
            }
        }
    }
}

/// What reading should do after an event.
#[derive(Debug)]
enum Step {
    Continue,
    Detached,
    Finished(Outcome),
}

/// Apply one event to the store on behalf of `handle`.
fn apply_event(store: &UploadStore, handle: &StreamHandle, event: &SseEvent) -> Step {
    let key = handle.key();
    match event.name() {
        "message" | "progress" => match decode_record(key, &event.data) {
            Ok(record) => {
                if store.set_progress_from(handle, record) {
                    Step::Continue
                } else {
                    Step::Detached
                }
            }
            Err(e) => {
                tracing::warn!("Skipping event: {}", e);
                Step::Continue
            }
        },
        "complete" => {
            let final_record = if event.data.trim().is_empty() {
                store.progress(key).map(|mut record| {
                    record.uploaded_bytes = record.file_size;
                    record.progress = 100.0;
                    record.estimated_time_left = 0.0;
                    record
                })
            } else {
                decode_record(key, &event.data)
                    .map_err(|e| tracing::warn!("Ignoring final record: {}", e))
                    .ok()
            };
            if let Some(record) = final_record {
                if !store.set_progress_from(handle, record) {
                    return Step::Detached;
                }
            }
            Step::Finished(Outcome::Completed)
        }
        "error" => Step::Finished(Outcome::Failed(error_message(&event.data))),
        other => {
            tracing::debug!("Ignoring '{}' event on stream for '{}'", other, key);
            Step::Continue
        }
    }
}

fn decode_record(key: &str, data: &str) -> Result<ProgressRecord> {
    let mut record: ProgressRecord =
        serde_json::from_str(data).map_err(|e| Error::MalformedEvent {
            key: key.to_string(),
            reason: e.to_string(),
        })?;
    if record.file_name.is_empty() {
        record.file_name = key.to_string();
    }
    Ok(record)
}

#[derive(Deserialize)]
struct ErrorPayload {
    message: String,
}

fn error_message(data: &str) -> String {
    if let Ok(payload) = serde_json::from_str::<ErrorPayload>(data) {
        return payload.message;
    }
    let text = data.trim();
    if text.is_empty() {
        "upload failed".to_string()
    } else {
        text.to_string()
    }
}
