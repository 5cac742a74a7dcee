//! Hypeman command-line client.
//!
//! The library holds everything the `hypeman` binary does so integration
//! tests can drive commands against a mock server.

pub mod api;
pub mod cancel;
pub mod cli;
pub mod commands;
pub mod config;
pub mod events;
pub mod exec;
pub mod output;
pub mod poll;
pub mod resolve;
pub mod sse;
pub mod version;

use tracing_subscriber::EnvFilter;

use crate::cancel::CancelToken;
use crate::cli::Cli;
use crate::commands::{CliError, Context};
use crate::config::CliConfig;

/// Diagnostics go to stderr so they never mix with command output.
/// `RUST_LOG` overrides the default level.
pub fn init_tracing(debug: bool) {
    let default_level = if debug { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_level(true)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();
}

/// Load configuration and run the parsed command.
pub async fn run(cli: Cli, cancel: CancelToken) -> Result<(), CliError> {
    let config = CliConfig::load()?;
    let mut ctx = Context::new(&cli, config, cancel)?;
    commands::dispatch(cli, &mut ctx).await
}
