//! End-to-end tests for the SSE progress client.
//!
//! Each test starts a small axum server that plays the upload endpoint and
//! pushes a scripted sequence of events.

mod common;

use std::convert::Infallible;
use std::net::SocketAddr;
use std::time::Duration;

use axum::extract::Path;
use axum::response::sse::{Event, Sse};
use axum::routing::get;
use axum::Router;
use tokio_stream::Stream;

use common::{record, wait_for};
use ferry_core::config::StreamConfig;
use ferry_core::progress::UploadPhase;
use ferry_core::store::UploadStore;
use ferry_core::stream::SseProgressStream;
use ferry_core::Error;

fn progress_event(name: &str, size: u64, uploaded: u64) -> Event {
    let data = serde_json::to_string(&record(name, size, uploaded)).unwrap();
    Event::default().event("progress").data(data)
}

/// Two progress events, then completion carrying the final record.
async fn completing(
    Path(name): Path<String>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    Sse::new(async_stream::stream! {
        yield Ok(Event::default().comment("keepalive"));
        yield Ok(progress_event(&name, 1000, 100));
        yield Ok(progress_event(&name, 1000, 600));
        let last = serde_json::to_string(&record(&name, 1000, 1000)).unwrap();
        yield Ok(Event::default().event("complete").data(last));
    })
}

/// One progress event, then silence until the client goes away.
async fn hanging(Path(name): Path<String>) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    Sse::new(async_stream::stream! {
        yield Ok(progress_event(&name, 2000, 500));
        std::future::pending::<()>().await;
    })
}

/// Progress, then a server-side failure.
async fn failing(Path(name): Path<String>) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    Sse::new(async_stream::stream! {
        yield Ok(progress_event(&name, 1000, 250));
        yield Ok(Event::default().event("error").data(r#"{"message":"disk full"}"#));
    })
}

/// Progress, then the connection simply ends.
async fn truncated(Path(name): Path<String>) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    Sse::new(async_stream::stream! {
        yield Ok(progress_event(&name, 1000, 250));
    })
}

/// Progress events as fast as the connection takes them, forever.
async fn flooding(Path(name): Path<String>) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    Sse::new(async_stream::stream! {
        let mut uploaded = 0u64;
        loop {
            uploaded = (uploaded + 1) % 1_000_000;
            yield Ok(progress_event(&name, 1_000_000, uploaded));
            tokio::task::yield_now().await;
        }
    })
}

async fn start_server() -> SocketAddr {
    let app = Router::new()
        .route("/flood/{name}", get(flooding))
        .route("/complete/{name}", get(completing))
        .route("/hang/{name}", get(hanging))
        .route("/fail/{name}", get(failing))
        .route("/truncate/{name}", get(truncated));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

fn config_for(addr: SocketAddr, route: &str) -> StreamConfig {
    StreamConfig {
        endpoint: format!("http://{addr}/{route}"),
        idle_timeout: Duration::from_secs(5),
        ..StreamConfig::default()
    }
}

#[tokio::test]
async fn test_stream_runs_to_completion() {
    let addr = start_server().await;
    let store = UploadStore::new();

    let handle = SseProgressStream::open(&store, "a.png", &config_for(addr, "complete"))
        .await
        .expect("open stream");
    store.add_stream("a.png", handle);

    let done = wait_for(&store, |s| s.phase("a.png") == Some(UploadPhase::Completed)).await;

    let rec = done.progress("a.png").expect("record kept after completion");
    assert_eq!(rec.uploaded_bytes, 1000);
    assert!((rec.progress - 100.0).abs() < f64::EPSILON);
    assert!(!done.is_uploading("a.png"));
    assert!(!done.has_stream("a.png"));
}

#[tokio::test]
async fn test_file_name_with_spaces_reaches_endpoint() {
    let addr = start_server().await;
    let store = UploadStore::new();

    let handle = SseProgressStream::open(&store, "holiday photo.png", &config_for(addr, "complete"))
        .await
        .expect("open stream");
    store.add_stream("holiday photo.png", handle);

    let done = wait_for(&store, |s| {
        s.phase("holiday photo.png") == Some(UploadPhase::Completed)
    })
    .await;
    assert_eq!(
        done.progress("holiday photo.png").map(|r| r.file_name.as_str()),
        Some("holiday photo.png")
    );
}

#[tokio::test]
async fn test_cancel_stops_live_stream() {
    let addr = start_server().await;
    let store = UploadStore::new();

    let handle = SseProgressStream::open(&store, "big.iso", &config_for(addr, "hang"))
        .await
        .expect("open stream");
    store.add_stream("big.iso", handle.clone());
    assert!(store.is_uploading("big.iso"));

    wait_for(&store, |s| s.progress("big.iso").is_some()).await;
    store.cancel("big.iso");

    assert!(!handle.is_open());
    let snapshot = store.snapshot();
    assert_eq!(snapshot.phase("big.iso"), Some(UploadPhase::Cancelled));
    assert!(!snapshot.is_uploading("big.iso"));
    assert!(!snapshot.has_stream("big.iso"));
    assert_eq!(snapshot.progress("big.iso").map(|r| r.uploaded_bytes), Some(500));

    // the reader must not resurrect the upload after cancellation
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(store.phase("big.iso"), Some(UploadPhase::Cancelled));
}

#[tokio::test]
async fn test_reset_closes_live_streams() {
    let addr = start_server().await;
    let store = UploadStore::new();
    let config = config_for(addr, "hang");

    let mut handles = Vec::new();
    for name in ["one.bin", "two.bin"] {
        let handle = SseProgressStream::open(&store, name, &config).await.unwrap();
        store.add_stream(name, handle.clone());
        handles.push(handle);
    }

    store.reset();

    assert!(store.snapshot().is_empty());
    assert!(handles.iter().all(|h| !h.is_open()));
}

#[tokio::test]
async fn test_error_event_fails_upload() {
    let addr = start_server().await;
    let store = UploadStore::new();

    let handle = SseProgressStream::open(&store, "a.png", &config_for(addr, "fail"))
        .await
        .unwrap();
    store.add_stream("a.png", handle);

    let done = wait_for(&store, |s| s.phase("a.png") == Some(UploadPhase::Failed)).await;
    assert!(!done.is_uploading("a.png"));
    assert!(!done.has_stream("a.png"));
    assert_eq!(done.progress("a.png").map(|r| r.uploaded_bytes), Some(250));
}

#[tokio::test]
async fn test_truncated_stream_fails_upload() {
    let addr = start_server().await;
    let store = UploadStore::new();

    let handle = SseProgressStream::open(&store, "a.png", &config_for(addr, "truncate"))
        .await
        .unwrap();
    store.add_stream("a.png", handle);

    wait_for(&store, |s| s.phase("a.png") == Some(UploadPhase::Failed)).await;
}

#[tokio::test]
async fn test_missing_endpoint_is_bad_status() {
    let addr = start_server().await;
    let store = UploadStore::new();

    let result = SseProgressStream::open(&store, "a.png", &config_for(addr, "nowhere")).await;

    assert!(matches!(result, Err(Error::BadStatus { status: 404, .. })));
    assert!(!store.is_uploading("a.png"));
}

#[tokio::test]
async fn test_unreachable_endpoint_is_connect_failure() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let store = UploadStore::new();
    let result = SseProgressStream::open(&store, "a.png", &config_for(addr, "complete")).await;

    assert!(matches!(result, Err(Error::ConnectFailed { .. })));
    assert!(result.unwrap_err().is_transient());
}

/// Reset stays total while streams are still pushing events from other threads.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_reset_holds_against_busy_streams() {
    let addr = start_server().await;
    let store = UploadStore::new();
    let config = config_for(addr, "flood");

    for trial in 0..50 {
        let name = format!("f{trial}.bin");
        let handle = SseProgressStream::open(&store, &name, &config).await.unwrap();
        store.add_stream(&name, handle.clone());
        wait_for(&store, |s| s.progress(&name).is_some()).await;

        store.reset();
        tokio::time::sleep(Duration::from_millis(20)).await;

        let snapshot = store.snapshot();
        assert!(
            snapshot.is_empty(),
            "trial {trial}: state came back after reset: {:?}",
            snapshot.tracked_keys()
        );
        assert!(!handle.is_open());
    }
}

/// A cancelled upload keeps its last record and phase while its stream is still busy.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_cancel_holds_against_busy_stream() {
    let addr = start_server().await;
    let store = UploadStore::new();
    let config = config_for(addr, "flood");

    for trial in 0..50 {
        let name = format!("c{trial}.bin");
        let handle = SseProgressStream::open(&store, &name, &config).await.unwrap();
        store.add_stream(&name, handle);
        wait_for(&store, |s| s.progress(&name).is_some()).await;

        store.cancel(&name);
        let at_cancel = store.progress(&name);
        tokio::time::sleep(Duration::from_millis(20)).await;

        let snapshot = store.snapshot();
        assert_eq!(snapshot.phase(&name), Some(UploadPhase::Cancelled), "trial {trial}");
        assert!(!snapshot.is_uploading(&name), "trial {trial}");
        assert!(!snapshot.has_stream(&name), "trial {trial}");
        assert_eq!(snapshot.progress(&name).cloned(), at_cancel, "trial {trial}");
    }
}

/// Opening a stream registers it, so a reset before the caller registers still stops it.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_reset_before_registration_stops_stream() {
    let addr = start_server().await;
    let store = UploadStore::new();

    let handle = SseProgressStream::open(&store, "early.bin", &config_for(addr, "flood"))
        .await
        .unwrap();
    assert!(store.has_stream("early.bin"));

    store.reset();
    tokio::time::sleep(Duration::from_millis(20)).await;

    assert!(store.snapshot().is_empty());
    assert!(!handle.is_open());
}
