use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use futures_core::Stream;
use thiserror::Error;
use tokio::time::{Instant, Sleep};

use crate::events::BuildEvent;
use crate::sse::{decode_build_event, SseDecoder};

/// Errors surfaced while reading the build event stream.
#[derive(Debug, Error)]
pub enum StreamError {
    /// The connection failed mid-stream.
    #[error("event stream transport error: {0}")]
    Transport(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Nothing, not even a heartbeat, arrived within the idle window.
    #[error("idle timeout after {duration}s of inactivity")]
    IdleTimeout { duration: u64 },

    /// Writing a log line to the primary output failed.
    #[error("failed to write build output: {0}")]
    Output(#[from] std::io::Error),
}

/// Turns a raw SSE byte stream into [`BuildEvent`]s.
///
/// Every received chunk resets the idle deadline; if the deadline passes the
/// stream yields [`StreamError::IdleTimeout`] and then ends. A transport
/// error is yielded once and also ends the stream.
pub struct EventStream<S> {
    inner: S,
    decoder: SseDecoder,
    pending: VecDeque<BuildEvent>,
    idle_timeout: Option<Duration>,
    deadline: Option<Pin<Box<Sleep>>>,
    done: bool,
}

impl<S> EventStream<S> {
    pub fn new(inner: S, idle_timeout: Option<Duration>) -> Self {
        Self {
            inner,
            decoder: SseDecoder::new(),
            pending: VecDeque::new(),
            idle_timeout,
            deadline: idle_timeout.map(|d| Box::pin(tokio::time::sleep(d))),
            done: false,
        }
    }

    fn reset_deadline(&mut self) {
        if let (Some(deadline), Some(timeout)) = (self.deadline.as_mut(), self.idle_timeout) {
            deadline.as_mut().reset(Instant::now() + timeout);
        }
    }

    fn enqueue(&mut self, frame: &str) {
        if let Some(event) = decode_build_event(frame) {
            self.pending.push_back(event);
        }
    }
}

impl<S, B, E> Stream for EventStream<S>
where
    S: Stream<Item = Result<B, E>> + Unpin,
    B: AsRef<[u8]>,
    E: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    type Item = Result<BuildEvent, StreamError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        loop {
            if let Some(event) = this.pending.pop_front() {
                return Poll::Ready(Some(Ok(event)));
            }
            if this.done {
                return Poll::Ready(None);
            }

            match Pin::new(&mut this.inner).poll_next(cx) {
                Poll::Ready(Some(Ok(chunk))) => {
                    this.reset_deadline();
                    for frame in this.decoder.push(chunk.as_ref()) {
                        this.enqueue(&frame);
                    }
                }
                Poll::Ready(Some(Err(err))) => {
                    this.done = true;
                    return Poll::Ready(Some(Err(StreamError::Transport(err.into()))));
                }
                Poll::Ready(None) => {
                    this.done = true;
                    if let Some(frame) = this.decoder.finish() {
                        this.enqueue(&frame);
                    }
                    tracing::debug!("build event stream closed by server");
                }
                Poll::Pending => {
                    // Only an empty socket counts as idle; buffered chunks
                    // are delivered even after the deadline.
                    if let Some(deadline) = this.deadline.as_mut() {
                        if deadline.as_mut().poll(cx).is_ready() {
                            let duration =
                                this.idle_timeout.map(|d| d.as_secs()).unwrap_or_default();
                            tracing::warn!(
                                idle_timeout_secs = duration,
                                "build event stream idle timeout exceeded"
                            );
                            this.done = true;
                            return Poll::Ready(Some(Err(StreamError::IdleTimeout { duration })));
                        }
                    }
                    return Poll::Pending;
                }
            }
        }
    }
}
