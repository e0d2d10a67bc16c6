//! Ferry CLI - watch chat file uploads from the terminal
//!
//! Ferry opens the progress stream for each file being uploaded and shows
//! its progress, speed, and time left until every upload finishes.
//!
//! ## Quick Start
//!
//! ```bash
//! # Watch two uploads
//! ferry watch ./photo.png ./notes.pdf
//!
//! # Point at a different server
//! ferry watch --endpoint https://chat.example.com/api/uploads/progress photo.png
//! ```

#![allow(clippy::doc_markdown)]
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::unused_async)]

use anyhow::Result;
use clap::Parser;

mod commands;
pub mod ui;

use commands::{Cli, Command};

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();

    let cli = Cli::parse();

    match cli.command {
        Command::Watch(args) => commands::watch::run(args).await,
        Command::Config(args) => commands::config::run(args).await,
    }
}

fn init_logging() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn,ferry=info,ferry_core=info"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).without_time().with_writer(std::io::stderr))
        .with(filter)
        .init();
}
