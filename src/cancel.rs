//! Cooperative cancellation shared by every blocking wait in a command.
//!
//! A command creates one [`CancelToken`] at startup, hands clones to the
//! poller, the event consumer and the log streamer, and trips it from the
//! Ctrl-C listener. Waiters observe it through [`CancelToken::cancelled`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::Notify;

#[derive(Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
    notify: Arc<Notify>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Trip the token. Idempotent.
    pub fn cancel(&self) {
        if !self.cancelled.swap(true, Ordering::SeqCst) {
            tracing::debug!("cancellation requested");
            self.notify.notify_waiters();
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Resolves once the token has been tripped.
    pub async fn cancelled(&self) {
        // Register with Notify before reading the flag so a cancel() racing
        // with this call cannot be missed.
        let notified = self.notify.notified();
        tokio::pin!(notified);
        notified.as_mut().enable();
        if self.is_cancelled() {
            return;
        }
        notified.await;
    }

    /// Trip the token on Ctrl-C (and SIGTERM on Unix).
    ///
    /// The listener task lives until the signal fires or the runtime stops.
    pub fn cancel_on_interrupt(&self) {
        let token = self.clone();
        tokio::spawn(async move {
            #[cfg(unix)]
            {
                use tokio::signal::unix::{signal, SignalKind};
                let Ok(mut sigterm) = signal(SignalKind::terminate()) else {
                    let _ = tokio::signal::ctrl_c().await;
                    token.cancel();
                    return;
                };
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {},
                    _ = sigterm.recv() => {},
                }
            }

            #[cfg(not(unix))]
            {
                let _ = tokio::signal::ctrl_c().await;
            }

            token.cancel();
        });
    }
}
