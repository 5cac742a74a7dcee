//! Write side of an interactive exec connection.
//!
//! Terminal input and resize notifications come from different tasks but
//! share one connection. Every write goes through [`SharedWriter`], which
//! serializes frames behind an async mutex; the read half is never locked.

use std::sync::Arc;

use futures::{Sink, SinkExt};
use thiserror::Error;
use tokio::sync::Mutex;

#[cfg(unix)]
use signal_hook::consts::signal::SIGWINCH;
#[cfg(unix)]
use signal_hook::iterator::Signals;

#[derive(Debug, Error)]
pub enum ExecError {
    #[error("failed to send on exec connection: {0}")]
    Send(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("failed to install resize handler: {0}")]
    Signal(#[from] std::io::Error),
}

/// One outbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecFrame {
    /// Raw terminal input.
    Data(Vec<u8>),
    /// Control message sent as `{"resize":{"rows":R,"cols":C}}`.
    Resize { rows: u16, cols: u16 },
}

impl ExecFrame {
    /// Text form of a control frame; `None` for data.
    pub fn control_json(&self) -> Option<String> {
        match self {
            ExecFrame::Resize { rows, cols } => Some(
                serde_json::json!({ "resize": { "rows": rows, "cols": cols } }).to_string(),
            ),
            ExecFrame::Data(_) => None,
        }
    }
}

/// Cloneable handle serializing writes to a connection.
pub struct SharedWriter<S> {
    inner: Arc<Mutex<S>>,
}

impl<S> Clone for SharedWriter<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S, E> SharedWriter<S>
where
    S: Sink<ExecFrame, Error = E> + Unpin,
    E: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    pub fn new(sink: S) -> Self {
        Self {
            inner: Arc::new(Mutex::new(sink)),
        }
    }

    /// Send one frame. Concurrent callers are served one at a time.
    pub async fn send(&self, frame: ExecFrame) -> Result<(), ExecError> {
        let mut sink = self.inner.lock().await;
        sink.send(frame).await.map_err(|e| ExecError::Send(e.into()))
    }

    pub async fn send_data(&self, bytes: impl Into<Vec<u8>>) -> Result<(), ExecError> {
        self.send(ExecFrame::Data(bytes.into())).await
    }

    pub async fn resize(&self, rows: u16, cols: u16) -> Result<(), ExecError> {
        self.send(ExecFrame::Resize { rows, cols }).await
    }

    pub async fn close(&self) -> Result<(), ExecError> {
        let mut sink = self.inner.lock().await;
        sink.close().await.map_err(|e| ExecError::Send(e.into()))
    }
}

/// Forwards terminal resizes (SIGWINCH) to the connection as resize frames.
pub struct ResizeWatcher {
    #[cfg(unix)]
    handle: signal_hook::iterator::Handle,
    #[cfg(unix)]
    thread: std::thread::JoinHandle<()>,
    #[cfg(unix)]
    forwarder: tokio::task::JoinHandle<()>,
}

impl ResizeWatcher {
    /// Start watching, reading the new size from the controlling terminal.
    /// Returns `None` on platforms without SIGWINCH.
    pub fn start<S, E>(writer: SharedWriter<S>) -> Result<Option<Self>, ExecError>
    where
        S: Sink<ExecFrame, Error = E> + Unpin + Send + 'static,
        E: Into<Box<dyn std::error::Error + Send + Sync>> + 'static,
    {
        Self::start_with(writer, || {
            crossterm::terminal::size().ok().map(|(cols, rows)| (rows, cols))
        })
    }

    /// Like [`ResizeWatcher::start`] with a custom `(rows, cols)` source.
    pub fn start_with<S, E, F>(writer: SharedWriter<S>, size: F) -> Result<Option<Self>, ExecError>
    where
        S: Sink<ExecFrame, Error = E> + Unpin + Send + 'static,
        E: Into<Box<dyn std::error::Error + Send + Sync>> + 'static,
        F: Fn() -> Option<(u16, u16)> + Send + 'static,
    {
        #[cfg(unix)]
        {
            let mut signals = Signals::new([SIGWINCH])?;
            let handle = signals.handle();
            let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<(u16, u16)>();

            let thread = std::thread::spawn(move || {
                for _ in signals.forever() {
                    let Some(dims) = size() else { continue };
                    if tx.send(dims).is_err() {
                        break;
                    }
                }
            });

            let forwarder = tokio::spawn(async move {
                while let Some((rows, cols)) = rx.recv().await {
                    tracing::debug!(rows, cols, "terminal resized");
                    if let Err(err) = writer.resize(rows, cols).await {
                        tracing::warn!(error = %err, "failed to forward terminal resize");
                        break;
                    }
                }
            });

            Ok(Some(Self {
                handle,
                thread,
                forwarder,
            }))
        }

        #[cfg(not(unix))]
        {
            let _ = writer;
            let _ = size;
            Ok(None)
        }
    }

    pub async fn stop(self) {
        #[cfg(unix)]
        {
            self.handle.close();
            let _ = self.thread.join();
            // The thread owned the only sender, so the forwarder drains and exits.
            let _ = self.forwarder.await;
        }
    }
}
