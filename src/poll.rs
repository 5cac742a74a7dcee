//! Readiness polling: re-fetch a resource on a fixed interval until it
//! settles in a terminal state.

use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tokio::time::{Instant, MissedTickBehavior};

use crate::cancel::CancelToken;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(300);
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(50);
pub const MAX_POLL_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug, Error)]
pub enum PollError {
    #[error("operation cancelled")]
    Cancelled,

    #[error("{}", failure_text(.message.as_deref()))]
    Failed { message: Option<String> },

    #[error("failed to check status: {0}")]
    Fetch(#[source] Box<dyn std::error::Error + Send + Sync>),
}

fn failure_text(message: Option<&str>) -> String {
    match message {
        Some(message) => format!("resource failed: {message}"),
        None => "resource failed".to_string(),
    }
}

/// Coarse lifecycle shared by every pollable resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Phase {
    Pending,
    /// Named intermediate step (`pulling`, `converting`, ...).
    InProgress(String),
    Ready,
    Failed,
}

impl Phase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Phase::Ready | Phase::Failed)
    }
}

pub trait Pollable {
    fn phase(&self) -> Phase;

    /// Server-provided reason when the phase is [`Phase::Failed`].
    fn failure_message(&self) -> Option<&str> {
        None
    }
}

/// Keep polls bounded and non-zero.
pub fn clamp_interval(interval: Duration) -> Duration {
    interval.clamp(MIN_POLL_INTERVAL, MAX_POLL_INTERVAL)
}

/// Poll until `initial` (already fetched) becomes ready.
///
/// `on_change` sees the initial resource and every later fetch whose phase
/// differs from the last one seen. Cancellation is checked before each wait
/// and interrupts both the wait and an in-flight fetch. A fetch error ends
/// polling immediately.
pub async fn await_ready<T, F, Fut, E>(
    initial: T,
    interval: Duration,
    cancel: &CancelToken,
    mut fetch: F,
    mut on_change: impl FnMut(&T),
) -> Result<T, PollError>
where
    T: Pollable,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let mut last = initial.phase();
    match last {
        Phase::Ready => return Ok(initial),
        Phase::Failed => return Err(failed(&initial)),
        _ => {}
    }
    on_change(&initial);

    let interval = clamp_interval(interval);
    let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        if cancel.is_cancelled() {
            return Err(PollError::Cancelled);
        }
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(PollError::Cancelled),
            _ = ticker.tick() => {}
        }

        let current = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(PollError::Cancelled),
            fetched = fetch() => fetched.map_err(|e| PollError::Fetch(e.into()))?,
        };

        let phase = current.phase();
        tracing::trace!(?phase, "poll tick");
        if phase != last {
            on_change(&current);
            last = phase;
        }

        match last {
            Phase::Ready => return Ok(current),
            Phase::Failed => return Err(failed(&current)),
            _ => {}
        }
    }
}

fn failed<T: Pollable>(resource: &T) -> PollError {
    PollError::Failed {
        message: resource
            .failure_message()
            .filter(|m| !m.is_empty())
            .map(str::to_string),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::collections::VecDeque;
    use std::sync::Arc;

    #[derive(Debug, Clone, PartialEq)]
    struct Job {
        phase: Phase,
        error: Option<String>,
    }

    impl Job {
        fn new(phase: Phase) -> Self {
            Self { phase, error: None }
        }
    }

    impl Pollable for Job {
        fn phase(&self) -> Phase {
            self.phase.clone()
        }

        fn failure_message(&self) -> Option<&str> {
            self.error.as_deref()
        }
    }

    fn scripted(
        responses: Vec<Job>,
    ) -> impl FnMut() -> std::future::Ready<Result<Job, std::io::Error>> {
        let queue = Arc::new(Mutex::new(VecDeque::from(responses)));
        move || {
            let next = queue
                .lock()
                .pop_front()
                .ok_or_else(|| std::io::Error::other("script exhausted"));
            std::future::ready(next)
        }
    }

    #[tokio::test(start_paused = true)]
    async fn reports_each_phase_change_once() {
        let cancel = CancelToken::new();
        let mut seen = Vec::new();
        let result = await_ready(
            Job::new(Phase::Pending),
            DEFAULT_POLL_INTERVAL,
            &cancel,
            scripted(vec![
                Job::new(Phase::Pending),
                Job::new(Phase::InProgress("pulling".into())),
                Job::new(Phase::InProgress("pulling".into())),
                Job::new(Phase::InProgress("converting".into())),
                Job::new(Phase::Ready),
            ]),
            |job: &Job| seen.push(job.phase.clone()),
        )
        .await
        .unwrap();

        assert_eq!(result.phase, Phase::Ready);
        assert_eq!(
            seen,
            vec![
                Phase::Pending,
                Phase::InProgress("pulling".into()),
                Phase::InProgress("converting".into()),
                Phase::Ready,
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn already_terminal_skips_polling() {
        let cancel = CancelToken::new();
        let mut calls = 0;
        let result = await_ready(
            Job::new(Phase::Ready),
            DEFAULT_POLL_INTERVAL,
            &cancel,
            || {
                calls += 1;
                std::future::ready(Ok::<_, std::io::Error>(Job::new(Phase::Ready)))
            },
            |_: &Job| {},
        )
        .await;
        assert!(result.is_ok());
        assert_eq!(calls, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn failure_carries_message_or_default() {
        let cancel = CancelToken::new();
        let failing = Job {
            phase: Phase::Failed,
            error: Some("layer too large".into()),
        };
        let err = await_ready(
            Job::new(Phase::Pending),
            DEFAULT_POLL_INTERVAL,
            &cancel,
            scripted(vec![failing]),
            |_: &Job| {},
        )
        .await
        .unwrap_err();
        assert!(matches!(&err, PollError::Failed { message: Some(m) } if m == "layer too large"));

        let err = await_ready(
            Job {
                phase: Phase::Failed,
                error: Some(String::new()),
            },
            DEFAULT_POLL_INTERVAL,
            &cancel,
            scripted(vec![]),
            |_: &Job| {},
        )
        .await
        .unwrap_err();
        assert!(matches!(err, PollError::Failed { message: None }));
        assert_eq!(err.to_string(), "resource failed");
    }

    #[tokio::test(start_paused = true)]
    async fn fetch_error_is_not_retried() {
        let cancel = CancelToken::new();
        let err = await_ready(
            Job::new(Phase::Pending),
            DEFAULT_POLL_INTERVAL,
            &cancel,
            scripted(vec![]),
            |_: &Job| {},
        )
        .await
        .unwrap_err();
        assert!(matches!(err, PollError::Fetch(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_returns_within_one_tick() {
        let cancel = CancelToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(450)).await;
            trigger.cancel();
        });

        let started = Instant::now();
        let err = await_ready(
            Job::new(Phase::Pending),
            DEFAULT_POLL_INTERVAL,
            &cancel,
            || std::future::ready(Ok::<_, std::io::Error>(Job::new(Phase::Pending))),
            |_: &Job| {},
        )
        .await
        .unwrap_err();

        assert!(matches!(err, PollError::Cancelled));
        assert!(started.elapsed() < Duration::from_millis(450) + DEFAULT_POLL_INTERVAL);
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_before_start() {
        let cancel = CancelToken::new();
        cancel.cancel();
        let err = await_ready(
            Job::new(Phase::Pending),
            DEFAULT_POLL_INTERVAL,
            &cancel,
            scripted(vec![Job::new(Phase::Ready)]),
            |_: &Job| {},
        )
        .await
        .unwrap_err();
        assert!(matches!(err, PollError::Cancelled));
    }

    #[test]
    fn interval_is_bounded() {
        assert_eq!(clamp_interval(Duration::ZERO), MIN_POLL_INTERVAL);
        assert_eq!(clamp_interval(Duration::from_secs(600)), MAX_POLL_INTERVAL);
        assert_eq!(clamp_interval(DEFAULT_POLL_INTERVAL), DEFAULT_POLL_INTERVAL);
    }
}
