//! Shared test utilities and mock infrastructure.

#![allow(dead_code, unused_imports)]

pub mod mock_backend;

use clap::Parser;
use hypeman_cli::cancel::CancelToken;
use hypeman_cli::cli::Cli;
use hypeman_cli::commands::{dispatch, CliError, Context};
use hypeman_cli::config::CliConfig;
use hypeman_cli::output::{BufferSink, OutputSink};
use std::path::PathBuf;
use tempfile::TempDir;

pub use mock_backend::{CapturedRequest, MockBackend, MockResponse};

/// Config tuned for fast tests: short poll interval and drain window.
pub fn test_config() -> CliConfig {
    let mut config = CliConfig::default();
    config.poll.interval_ms = 50;
    config.stream.failed_drain_ms = 200;
    config.stream.idle_timeout_seconds = 5;
    config.api_key = Some("test-key".to_string());
    config
}

/// Output captured from one command run.
pub struct Captured {
    pub stdout: BufferSink,
    pub notices: BufferSink,
}

impl Captured {
    pub fn stdout(&self) -> String {
        self.stdout.contents()
    }

    pub fn notices(&self) -> String {
        self.notices.contents()
    }
}

/// Build a context for `args` (without the program name) talking to
/// `backend`, with stdout and notices captured in memory.
pub fn test_context(
    backend: &MockBackend,
    args: &[&str],
    config: CliConfig,
    cancel: CancelToken,
) -> (Cli, Context, Captured) {
    let mut argv = vec!["hypeman", "--base-url"];
    let base_url = backend.base_url();
    argv.push(&base_url);
    argv.extend_from_slice(args);
    let cli = Cli::try_parse_from(argv.iter().copied()).expect("valid command line");

    let stdout = BufferSink::new();
    let notices = BufferSink::new();
    let notice_writer = notices.open("notices").expect("buffer sink opens");
    let ctx = Context::new(&cli, config, cancel)
        .expect("context")
        .with_output(Box::new(stdout.clone()), Box::new(stdout.clone()), Box::new(notice_writer));

    (cli, ctx, Captured { stdout, notices })
}

/// Run one command line against `backend`.
pub async fn run_command(
    backend: &MockBackend,
    args: &[&str],
    config: CliConfig,
    cancel: CancelToken,
) -> (Result<(), CliError>, Captured) {
    let (cli, mut ctx, captured) = test_context(backend, args, config, cancel);
    let result = dispatch(cli, &mut ctx).await;
    (result, captured)
}

/// Write `content` to `<tmp>/hypeman/cli.toml`.
pub fn temp_config_file(content: &str) -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let dir = temp_dir.path().join("hypeman");
    std::fs::create_dir_all(&dir).expect("Failed to create config dir");
    let path = dir.join("cli.toml");
    std::fs::write(&path, content).expect("Failed to write config");
    (temp_dir, path)
}

/// An SSE event payload for a log line.
pub fn log_event(content: &str) -> String {
    serde_json::json!({"type": "log", "content": content}).to_string()
}

pub fn status_event(status: &str) -> String {
    serde_json::json!({"type": "status", "status": status}).to_string()
}

pub fn failed_event(error: &str) -> String {
    serde_json::json!({"type": "status", "status": "failed", "error": error}).to_string()
}
