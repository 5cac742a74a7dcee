//! Build progress events and their consumption.

pub mod consumer;
pub mod stream;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use consumer::{BuildEventConsumer, ConsumerOptions, Disposition, EventRendering};
pub use stream::{EventStream, StreamError};

/// Server-side build lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildStatus {
    Queued,
    Building,
    Pushing,
    Ready,
    Failed,
    Cancelled,
}

impl BuildStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Ready | Self::Failed | Self::Cancelled)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Building => "building",
            Self::Pushing => "pushing",
            Self::Ready => "ready",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for BuildStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One decoded frame of the build event stream.
///
/// Serialized form matches the wire: `{"type":"log","content":"..."}`,
/// `{"type":"status","status":"building"}`, `{"type":"heartbeat"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum BuildEvent {
    Log {
        content: String,
    },
    Status {
        status: BuildStatus,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    Heartbeat,
}

impl BuildEvent {
    pub fn log(content: impl Into<String>) -> Self {
        Self::Log {
            content: content.into(),
        }
    }

    pub fn status(status: BuildStatus) -> Self {
        Self::Status {
            status,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self::Status {
            status: BuildStatus::Failed,
            error: Some(error.into()),
        }
    }
}
