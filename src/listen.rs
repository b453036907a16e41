//! Wake-up dispatcher: the listen loop combining LISTEN/NOTIFY wake-ups with
//! timer-based polling fallback.
//!
//! ## What
//!
//! - [`PgQueue::listen`] runs a consumer until cancelled: it drains due
//!   messages on entry, then waits for the first of a notification, a
//!   one-shot timer scheduled from a delayed notification, or the periodic
//!   poll tick, and drains again.
//!
//! ## How
//!
//! ```rust,no_run
//! use pgwake::{PgQueue, QueueConfig, ListenOptions};
//! use tokio_util::sync::CancellationToken;
//!
//! async fn consume(pool: sqlx::PgPool) -> pgwake::Result<()> {
//!     let queue = PgQueue::new(pool, QueueConfig::default())?;
//!     let cancellation = CancellationToken::new();
//!     queue
//!         .listen(
//!             |payload| async move {
//!                 println!("got {payload}");
//!                 Ok(())
//!             },
//!             ListenOptions { cancellation },
//!         )
//!         .await
//! }
//! ```

use crate::constants::IMMEDIATE_DELAY_THRESHOLD;
use crate::error::{HandlerError, PgwakeError, Result};
use crate::queue::PgQueue;
use futures::StreamExt;
use sqlx::postgres::PgListener;
use std::future::Future;
use std::time::Duration;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tokio_util::time::DelayQueue;

/// Options for [`PgQueue::listen`].
#[derive(Debug, Clone, Default)]
pub struct ListenOptions {
    /// Cooperative cancellation signal. Cancelling stops the idle wait
    /// immediately and stops a running drain at its next claim boundary.
    pub cancellation: CancellationToken,
}

/// Dispatcher states for the listen loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ListenState {
    /// Waiting for a notification, a one-shot timer, or the poll tick
    Idle,
    /// Claiming and handling due messages until none remain
    Draining,
    /// Terminal; teardown follows
    Cancelled,
}

/// Why a drain loop stopped.
enum DrainOutcome {
    /// No due messages remain
    Empty,
    /// The cancellation signal fired at an iteration boundary
    Cancelled,
}

impl PgQueue {
    /// Listen for messages and dispatch each to `handler`, until cancelled.
    ///
    /// Within one consumer, claims are processed strictly one at a time; the
    /// next claim waits for the handler to complete. Multiple consumer
    /// processes may listen on the same table and channel, each claiming a
    /// disjoint set of rows.
    ///
    /// A handler failure is not caught: it terminates this call with
    /// [`PgwakeError::Handler`], and the already-claimed row is not restored.
    /// Callers that need resilience must wrap their handler.
    ///
    /// Cancellation is clean termination, not an error: the subscription is
    /// torn down, pending timers are cleared, and `Ok(())` is returned.
    pub async fn listen<H, Fut>(&self, mut handler: H, options: ListenOptions) -> Result<()>
    where
        H: FnMut(serde_json::Value) -> Fut,
        Fut: Future<Output = std::result::Result<(), HandlerError>>,
    {
        self.initialize().await?;

        let mut listener = PgListener::connect_with(&self.pool).await?;
        listener.listen(&self.config().channel).await?;
        tracing::debug!(channel = %self.config().channel, "subscribed to wake-up channel");

        let outcome = self
            .dispatch(&mut handler, &options.cancellation, &mut listener)
            .await;

        // One teardown path for cancellation, handler failure, and database
        // errors alike, so the subscription is released exactly once.
        if let Err(error) = listener.unlisten_all().await {
            tracing::debug!(%error, "failed to unlisten during teardown");
        }

        outcome
    }

    async fn dispatch<H, Fut>(
        &self,
        handler: &mut H,
        cancellation: &CancellationToken,
        listener: &mut PgListener,
    ) -> Result<()>
    where
        H: FnMut(serde_json::Value) -> Fut,
        Fut: Future<Output = std::result::Result<(), HandlerError>>,
    {
        // One-shot timers scheduled from delayed-notification hints. Dropped
        // (and cleared) with this frame on every exit path.
        let mut timers: DelayQueue<()> = DelayQueue::new();

        let poll_interval = self.config().poll_interval;
        let mut poll = interval_at(Instant::now() + poll_interval, poll_interval);
        poll.set_missed_tick_behavior(MissedTickBehavior::Delay);

        // Start draining: messages may already be due when the loop starts.
        let mut state = ListenState::Draining;

        loop {
            state = match state {
                ListenState::Draining => match self.drain(handler, cancellation).await? {
                    DrainOutcome::Empty => ListenState::Idle,
                    DrainOutcome::Cancelled => ListenState::Cancelled,
                },
                ListenState::Idle => {
                    tokio::select! {
                        _ = cancellation.cancelled() => ListenState::Cancelled,
                        notification = listener.recv() => {
                            match timer_for_hint(notification?.payload()) {
                                Some(wait) => {
                                    tracing::debug!(wait_ms = wait.as_millis() as u64, "scheduling one-shot timer from delay hint");
                                    timers.insert((), wait);
                                    ListenState::Idle
                                }
                                None => ListenState::Draining,
                            }
                        }
                        Some(_) = timers.next(), if !timers.is_empty() => ListenState::Draining,
                        _ = poll.tick() => ListenState::Draining,
                    }
                }
                ListenState::Cancelled => {
                    timers.clear();
                    tracing::debug!("listen loop cancelled");
                    return Ok(());
                }
            };
        }
    }

    /// Claim and handle due messages until none remain.
    ///
    /// Checks the cancellation signal before every claim so a cancel mid-drain
    /// stops at the next iteration boundary rather than mid-handler.
    async fn drain<H, Fut>(
        &self,
        handler: &mut H,
        cancellation: &CancellationToken,
    ) -> Result<DrainOutcome>
    where
        H: FnMut(serde_json::Value) -> Fut,
        Fut: Future<Output = std::result::Result<(), HandlerError>>,
    {
        loop {
            if cancellation.is_cancelled() {
                return Ok(DrainOutcome::Cancelled);
            }
            match self.claim().await? {
                Some(message) => handler(message.message)
                    .await
                    .map_err(PgwakeError::Handler)?,
                None => return Ok(DrainOutcome::Empty),
            }
        }
    }
}

/// Decide what a notification payload means for the dispatcher.
///
/// The payload is the string form of the enqueue delay in milliseconds.
/// Returns the wait to schedule as a one-shot timer, or `None` to drain
/// immediately. Delays at or below [`IMMEDIATE_DELAY_THRESHOLD`] drain
/// immediately rather than scheduling a near-zero timer, and an unparseable
/// payload is treated as a plain wake-up hint.
fn timer_for_hint(payload: &str) -> Option<Duration> {
    match payload.trim().parse::<u64>() {
        Ok(millis) => {
            let wait = Duration::from_millis(millis);
            (wait > IMMEDIATE_DELAY_THRESHOLD).then_some(wait)
        }
        Err(_) => {
            tracing::warn!(payload, "unparseable wake-up hint; draining immediately");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_delay_drains_immediately() {
        assert_eq!(timer_for_hint("0"), None);
    }

    #[test]
    fn negligible_delay_drains_immediately() {
        assert_eq!(timer_for_hint("100"), None);
    }

    #[test]
    fn non_trivial_delay_schedules_timer() {
        assert_eq!(timer_for_hint("3000"), Some(Duration::from_secs(3)));
    }

    #[test]
    fn whitespace_is_tolerated() {
        assert_eq!(timer_for_hint(" 2500\n"), Some(Duration::from_millis(2500)));
    }

    #[test]
    fn garbage_payload_is_a_plain_wakeup() {
        assert_eq!(timer_for_hint("not-a-number"), None);
        assert_eq!(timer_for_hint(""), None);
        assert_eq!(timer_for_hint("-5"), None);
    }
}
