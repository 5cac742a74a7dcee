//! Drives a build event stream to a final disposition.
//!
//! Log lines are written to the primary output as they arrive, in arrival
//! order. Status events update the tracked build status; `ready` and
//! `cancelled` end consumption at once, while `failed` is recorded and the
//! stream is drained for trailing log lines until it closes or the drain
//! window passes.

use std::io::Write;
use std::pin::Pin;
use std::time::Duration;

use futures::{Stream, StreamExt};
use tokio::time::Sleep;

use crate::cancel::CancelToken;
use crate::events::{BuildEvent, BuildStatus, StreamError};
use crate::output::ClosedPipeGuard;

pub const DEFAULT_FAILURE_MESSAGE: &str = "build failed";

/// How a build event stream ended.
#[derive(Debug)]
pub enum Disposition {
    Success,
    Failed(String),
    Cancelled,
    StreamError(StreamError),
    /// The stream closed before any terminal status; carries the last status seen.
    UnexpectedEnd(Option<BuildStatus>),
}

/// How log and status events are written to the primary output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventRendering {
    /// Log content verbatim; status transitions as notices.
    Text,
    /// One compact JSON object per log/status event.
    JsonLines,
}

#[derive(Debug, Clone)]
pub struct ConsumerOptions {
    pub rendering: EventRendering,
    /// How long to keep reading trailing logs after a `failed` status.
    pub failed_drain: Duration,
}

impl Default for ConsumerOptions {
    fn default() -> Self {
        Self {
            rendering: EventRendering::Text,
            failed_drain: Duration::from_secs(2),
        }
    }
}

pub struct BuildEventConsumer<W: Write, N: Write> {
    out: ClosedPipeGuard<W>,
    notices: N,
    options: ConsumerOptions,
    current: Option<BuildStatus>,
    failure: Option<String>,
}

impl<W: Write, N: Write> BuildEventConsumer<W, N> {
    pub fn new(out: W, notices: N, options: ConsumerOptions) -> Self {
        Self {
            out: ClosedPipeGuard::new(out),
            notices,
            options,
            current: None,
            failure: None,
        }
    }

    /// Last status observed so far.
    pub fn current_status(&self) -> Option<BuildStatus> {
        self.current
    }

    /// Give back the primary output, e.g. to wait for a pager.
    pub fn into_output(self) -> W {
        self.out.into_inner()
    }

    /// Consume `events` until a terminal outcome.
    ///
    /// Returns promptly with [`Disposition::Cancelled`] once `cancel` trips;
    /// the stream (and with it the connection) is dropped on return.
    pub async fn consume<S>(&mut self, events: S, cancel: &CancelToken) -> Disposition
    where
        S: Stream<Item = Result<BuildEvent, StreamError>> + Unpin,
    {
        let mut events = events;
        let mut drain: Option<Pin<Box<Sleep>>> = None;

        loop {
            if cancel.is_cancelled() {
                return Disposition::Cancelled;
            }

            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Disposition::Cancelled,
                _ = drain_elapsed(&mut drain) => {
                    tracing::debug!("failed-build drain window elapsed");
                    return self.failed();
                }
                next = events.next() => next,
            };

            let event = match next {
                None => return self.end_of_stream(),
                Some(Err(err)) => return Disposition::StreamError(err),
                Some(Ok(event)) => event,
            };

            match self.handle(event) {
                Ok(Some(disposition)) => return disposition,
                Ok(None) => {}
                Err(err) => return Disposition::StreamError(StreamError::Output(err)),
            }

            match (self.current, drain.is_some()) {
                (Some(BuildStatus::Failed), false) => {
                    drain = Some(Box::pin(tokio::time::sleep(self.options.failed_drain)));
                }
                (Some(BuildStatus::Failed), true) => {}
                (_, true) => drain = None,
                (_, false) => {}
            }
        }
    }

    fn handle(&mut self, event: BuildEvent) -> std::io::Result<Option<Disposition>> {
        match event {
            BuildEvent::Log { content } => {
                match self.options.rendering {
                    EventRendering::Text => {
                        self.out.write_all(content.as_bytes())?;
                        if !content.ends_with('\n') {
                            self.out.write_all(b"\n")?;
                        }
                    }
                    EventRendering::JsonLines => self.write_json(&BuildEvent::Log { content })?,
                }
                self.out.flush()?;
                Ok(None)
            }
            BuildEvent::Status { status, error } => {
                if self.current != Some(status) {
                    tracing::info!(status = %status, "build status changed");
                    if self.options.rendering == EventRendering::Text {
                        let _ = writeln!(self.notices, "Status: {status}");
                    }
                }
                if self.options.rendering == EventRendering::JsonLines {
                    self.write_json(&BuildEvent::Status {
                        status,
                        error: error.clone(),
                    })?;
                    self.out.flush()?;
                }
                self.current = Some(status);

                match status {
                    BuildStatus::Ready => Ok(Some(Disposition::Success)),
                    BuildStatus::Cancelled => Ok(Some(Disposition::Cancelled)),
                    BuildStatus::Failed => {
                        if let Some(message) = error.filter(|m| !m.trim().is_empty()) {
                            self.failure = Some(message);
                        }
                        Ok(None)
                    }
                    _ => Ok(None),
                }
            }
            BuildEvent::Heartbeat => {
                tracing::trace!("heartbeat");
                Ok(None)
            }
        }
    }

    fn write_json(&mut self, event: &BuildEvent) -> std::io::Result<()> {
        let line = serde_json::to_string(event)?;
        self.out.write_all(line.as_bytes())?;
        self.out.write_all(b"\n")
    }

    fn failed(&self) -> Disposition {
        Disposition::Failed(
            self.failure
                .clone()
                .unwrap_or_else(|| DEFAULT_FAILURE_MESSAGE.to_string()),
        )
    }

    fn end_of_stream(&self) -> Disposition {
        match self.current {
            Some(BuildStatus::Failed) => self.failed(),
            Some(BuildStatus::Ready) => Disposition::Success,
            other => Disposition::UnexpectedEnd(other),
        }
    }
}

async fn drain_elapsed(drain: &mut Option<Pin<Box<Sleep>>>) {
    match drain {
        Some(sleep) => sleep.as_mut().await,
        None => std::future::pending().await,
    }
}
