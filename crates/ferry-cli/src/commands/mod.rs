//! CLI command definitions and handlers.

use clap::{Parser, Subcommand};

/// Load configuration with graceful fallback to defaults.
///
/// If the config file doesn't exist or can't be parsed, the defaults are
/// used and a warning is logged.
pub fn load_config() -> ferry_core::config::Config {
    ferry_core::config::Config::load().unwrap_or_else(|e| {
        tracing::warn!("Ignoring configuration: {}", e);
        ferry_core::config::Config::default()
    })
}

pub mod config;
pub mod watch;

/// Ferry - watch chat file uploads
#[derive(Parser)]
#[command(name = "ferry")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// The command to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands
#[derive(Subcommand)]
pub enum Command {
    /// Follow the progress streams of one or more uploads
    Watch(WatchArgs),

    /// Manage configuration
    Config(ConfigArgs),
}

/// Arguments for the watch command
#[derive(Parser)]
pub struct WatchArgs {
    /// Files to watch (local paths or bare file names)
    #[arg(required = true)]
    pub files: Vec<String>,

    /// Progress endpoint base URL (overrides the config file)
    #[arg(short, long, env = "FERRY_ENDPOINT")]
    pub endpoint: Option<String>,

    /// Give up on a stream after this much silence (e.g., 30s, 2m)
    #[arg(long)]
    pub idle_timeout: Option<String>,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,

    /// Minimal output
    #[arg(short, long)]
    pub quiet: bool,
}

/// Arguments for the config command
#[derive(Parser)]
pub struct ConfigArgs {
    /// Config subcommand
    #[command(subcommand)]
    pub action: ConfigAction,
}

/// Config subcommands
#[derive(Subcommand)]
pub enum ConfigAction {
    /// Show all configuration values
    Show,

    /// Print the configuration file path
    Path,

    /// Get a configuration value
    Get {
        /// Configuration key (e.g., stream.endpoint)
        key: String,
    },

    /// Set a configuration value
    Set {
        /// Configuration key (e.g., stream.endpoint)
        key: String,
        /// New value
        value: String,
    },

    /// Reset configuration to defaults
    Reset,
}
