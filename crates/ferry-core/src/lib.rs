//! # Ferry Core Library
//!
//! `ferry-core` tracks file uploads for the Ferry chat client. Every upload
//! is identified by its file name and fed by an out-of-band push stream of
//! progress events; the [`store::UploadStore`] keeps the per-file state,
//! the live stream handles, and the queue of selected files consistent while
//! uploads start, progress, finish, fail, or get cancelled.
//!
//! ## Modules
//!
//! - [`config`] - Configuration management
//! - [`progress`] - Progress records, upload phases, and throughput metering
//! - [`queue`] - Pending file selection queue
//! - [`store`] - The upload coordinator and its reactive snapshots
//! - [`stream`] - Stream handles and the SSE progress client
//!
//! ## Example
//!
//! ```rust,ignore
//! use ferry_core::{store::UploadStore, stream::SseProgressStream};
//!
//! let store = UploadStore::new();
//! let handle = SseProgressStream::open(&store, "photo.png", &config.stream).await?;
//! store.add_stream("photo.png", handle);
//! ```
//!
//! ## Byte-counter feeds
//!
//! Upload endpoints normally push speed and ETA with every event. A caller
//! whose only signal is "bytes acknowledged so far" (for example, its own
//! request body writer) feeds those counts to a
//! [`progress::ThroughputMeter`] and stores the records it produces:
//!
//! ```rust,ignore
//! use ferry_core::progress::ThroughputMeter;
//!
//! let mut meter = ThroughputMeter::new("photo.png", file_size);
//! store.set_uploading("photo.png", true);
//! for acked in acknowledged_byte_counts {
//!     store.set_progress("photo.png", meter.record(acked));
//! }
//! store.finish("photo.png");
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::missing_const_for_fn)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::cast_precision_loss)]

pub mod config;
pub mod error;
pub mod progress;
pub mod queue;
pub mod store;
pub mod stream;

pub use error::{Error, Result};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default progress endpoint base URL
pub const DEFAULT_ENDPOINT: &str = "http://127.0.0.1:8080/api/uploads/progress";

/// Default time allowed for a progress stream to connect, in seconds
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Default time a progress stream may stay silent before it is considered dead, in seconds
pub const DEFAULT_IDLE_TIMEOUT_SECS: u64 = 60;
