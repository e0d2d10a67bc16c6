//! Watch command implementation.

use std::path::Path;

use anyhow::{bail, Context, Result};

use ferry_core::progress::UploadPhase;
use ferry_core::queue::PendingFile;
use ferry_core::store::UploadStore;
use ferry_core::stream::SseProgressStream;

use super::WatchArgs;
use crate::ui::{self, ProgressView};

/// Run the watch command.
pub async fn run(args: WatchArgs) -> Result<()> {
    let mut config = super::load_config();

    if let Some(endpoint) = args.endpoint {
        config.stream.endpoint = endpoint;
    }
    if let Some(ref idle) = args.idle_timeout {
        config.stream.idle_timeout = ui::parse_duration(idle)
            .ok_or_else(|| anyhow::anyhow!("Invalid duration format: {}", idle))?;
    }
    config.validate().context("Invalid stream settings")?;

    let json = args.json || config.display.json;
    let store = UploadStore::new();

    store.add_files(args.files.iter().map(|f| pending_file(f)).collect());

    if !args.quiet && !json {
        println!();
        println!("  Ferry - watching {} upload(s)", store.pending_files().len());
        println!("  Endpoint: {}", config.stream.endpoint);
        println!();
    }

    for file in store.pending_files() {
        match SseProgressStream::open(&store, &file.name, &config.stream).await {
            Ok(handle) => store.add_stream(&file.name, handle),
            Err(e) => {
                if e.is_transient() {
                    tracing::warn!(
                        "Could not reach {}; is the upload server running?",
                        config.stream.endpoint
                    );
                }
                store.fail(&file.name, &e.to_string());
            }
        }
        store.remove_file(&file.name);
    }

    let mut view = ProgressView::new(json);
    let mut rx = store.subscribe();
    let refresh = config.display.refresh_interval;

    let interrupt = tokio::signal::ctrl_c();
    tokio::pin!(interrupt);
    let mut interrupted = false;

    loop {
        let snapshot = rx.borrow_and_update().clone();
        if !args.quiet || json {
            for line in view.changed_lines(&snapshot) {
                println!("{line}");
            }
        }
        if snapshot.active_uploads().is_empty() {
            break;
        }

        tokio::select! {
            _ = &mut interrupt => {
                for key in snapshot.active_uploads() {
                    store.cancel(key);
                }
                interrupted = true;
                break;
            }
            changed = async {
                let changed = rx.changed().await;
                tokio::time::sleep(refresh).await;
                changed
            } => {
                if changed.is_err() {
                    break;
                }
            }
        }
    }

    let snapshot = store.snapshot();
    let failed: Vec<&str> = snapshot
        .tracked_keys()
        .into_iter()
        .filter(|key| snapshot.phase(key) == Some(UploadPhase::Failed))
        .collect();
    let failed = failed.join(", ");

    store.reset();

    if interrupted {
        bail!("Interrupted, remaining uploads cancelled");
    }
    if !failed.is_empty() {
        bail!("Upload(s) failed: {}", failed);
    }

    if !args.quiet && !json {
        println!();
        println!("  All uploads completed.");
        println!();
    }

    Ok(())
}

/// Queue entry for a command line argument: a local file when the path
/// exists, otherwise a bare upload name.
fn pending_file(arg: &str) -> PendingFile {
    let path = Path::new(arg);
    if path.is_file() {
        match PendingFile::from_path(path) {
            Ok(file) => return file,
            Err(e) => tracing::warn!("Could not read {}: {}", path.display(), e),
        }
    }
    PendingFile::new(arg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_pending_file_from_existing_path() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("photo.png");
        std::fs::write(&path, [0u8; 64]).unwrap();

        let file = pending_file(path.to_str().unwrap());
        assert_eq!(file.name, "photo.png");
        assert_eq!(file.size, Some(64));
    }

    #[test]
    fn test_pending_file_from_bare_name() {
        let file = pending_file("not-on-disk.bin");
        assert_eq!(file.name, "not-on-disk.bin");
        assert_eq!(file.size, None);
    }
}
