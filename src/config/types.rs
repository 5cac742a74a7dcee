use std::time::Duration;

use serde::{Deserialize, Serialize};

pub const DEFAULT_BASE_URL: &str = "http://localhost:8080";

/// Root configuration container.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CliConfig {
    /// API endpoint (default: http://localhost:8080).
    #[serde(default)]
    pub base_url: Option<String>,
    /// Bearer token sent with every request.
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub stream: StreamConfig,
    #[serde(default)]
    pub poll: PollConfig,
    #[serde(default)]
    pub http: HttpConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Default `--format` (default: auto).
    #[serde(default = "default_format")]
    pub format: String,
    /// Pager program; overrides `$PAGER`.
    #[serde(default)]
    pub pager: Option<String>,
}

/// Build event stream settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamConfig {
    /// Give up on a stream that sends nothing, not even heartbeats (default: 60).
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_seconds: u64,
    /// How long to keep reading trailing logs after a failed status (default: 2000).
    #[serde(default = "default_failed_drain_ms")]
    pub failed_drain_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollConfig {
    /// Readiness poll interval in milliseconds (default: 300).
    #[serde(default = "default_poll_interval_ms")]
    pub interval_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Connection timeout in seconds (default: 5).
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_seconds: u64,
}

fn default_format() -> String {
    "auto".to_string()
}

fn default_idle_timeout() -> u64 {
    60
}

fn default_failed_drain_ms() -> u64 {
    2000
}

fn default_poll_interval_ms() -> u64 {
    300
}

fn default_connect_timeout() -> u64 {
    5
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: default_format(),
            pager: None,
        }
    }
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            idle_timeout_seconds: default_idle_timeout(),
            failed_drain_ms: default_failed_drain_ms(),
        }
    }
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_poll_interval_ms(),
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            connect_timeout_seconds: default_connect_timeout(),
        }
    }
}

impl CliConfig {
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.stream.idle_timeout_seconds)
    }

    pub fn failed_drain(&self) -> Duration {
        Duration::from_millis(self.stream.failed_drain_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll.interval_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.http.connect_timeout_seconds)
    }

    /// `--base-url` flag, then the config (file or env), then the default.
    pub fn resolved_base_url(&self, flag: Option<&str>) -> String {
        flag.filter(|u| !u.is_empty())
            .or(self.base_url.as_deref().filter(|u| !u.is_empty()))
            .unwrap_or(DEFAULT_BASE_URL)
            .to_string()
    }
}
