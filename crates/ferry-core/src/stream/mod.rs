//! Progress stream handles.
//!
//! A [`StreamHandle`] is the store's reference to one live server-push
//! connection delivering progress for one upload key. The store never opens
//! connections itself; callers open them (see [`SseProgressStream`]) and
//! register the resulting handle.
//!
//! Closing a handle is best-effort from the store's point of view: failures
//! are logged and swallowed so teardown always completes.

pub mod client;
pub mod sse;

pub use client::{progress_url, SseProgressStream};
pub use sse::{SseDecoder, SseEvent};

use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use uuid::Uuid;

use crate::error::Result;

/// A live connection that can be told to stop delivering progress.
pub trait ProgressSource: Send + Sync {
    /// Release the underlying connection.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection could not be released cleanly.
    fn close(&self) -> Result<()>;

    /// Whether the connection may still deliver events.
    ///
    /// A source that has already ended is not registered by the store.
    fn is_open(&self) -> bool {
        true
    }
}

/// Opaque, cheaply clonable handle to one progress stream.
#[derive(Clone)]
pub struct StreamHandle {
    id: Uuid,
    key: String,
    source: Arc<dyn ProgressSource>,
}

impl StreamHandle {
    /// Wrap a progress source for the upload `key`.
    pub fn new(key: impl Into<String>, source: impl ProgressSource + 'static) -> Self {
        Self::from_arc(key, Arc::new(source))
    }

    /// Wrap an already shared progress source.
    pub fn from_arc(key: impl Into<String>, source: Arc<dyn ProgressSource>) -> Self {
        Self {
            id: Uuid::new_v4(),
            key: key.into(),
            source,
        }
    }

    /// Unique identity of this handle.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Upload key the stream was opened for.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Whether the underlying source may still deliver events.
    pub fn is_open(&self) -> bool {
        self.source.is_open()
    }

    /// Close the underlying source.
    ///
    /// # Errors
    ///
    /// Returns whatever the source reports.
    pub fn close(&self) -> Result<()> {
        self.source.close()
    }

    /// Close the underlying source, discarding any failure.
    ///
    /// A panicking source is contained as well; teardown must always finish.
    pub(crate) fn close_quietly(&self) {
        match catch_unwind(AssertUnwindSafe(|| self.source.close())) {
            Ok(Ok(())) => {
                tracing::debug!("Closed progress stream for '{}'", self.key);
            }
            Ok(Err(e)) => {
                tracing::warn!("Ignoring close failure for '{}': {}", self.key, e);
            }
            Err(_) => {
                tracing::warn!("Ignoring panic while closing stream for '{}'", self.key);
            }
        }
    }
}

impl fmt::Debug for StreamHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamHandle")
            .field("id", &self.id)
            .field("key", &self.key)
            .finish_non_exhaustive()
    }
}

impl PartialEq for StreamHandle {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for StreamHandle {}
