//! CLI configuration: `<config_dir>/hypeman/cli.toml` with an environment
//! overlay.

mod loader;
mod types;

pub use loader::{ConfigError, ENV_API_KEY, ENV_BASE_URL};
pub use types::{CliConfig, HttpConfig, OutputConfig, PollConfig, StreamConfig, DEFAULT_BASE_URL};
