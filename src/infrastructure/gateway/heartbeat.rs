//! Keepalive timing for the gateway connection.

use std::pin::Pin;
use std::time::Duration;

use tokio::time::{interval, sleep, Interval, MissedTickBehavior, Sleep};

use super::protocol::ClientMessage;

/// How often a ping probe is sent.
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// How long a pong may take before the connection is considered dead.
pub const PONG_DEADLINE: Duration = Duration::from_secs(10);

/// Outcome of waiting on the heartbeat timers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeartbeatEvent {
    /// The next probe is due.
    PingDue,
    /// An outstanding probe's deadline passed without a pong.
    DeadlineMissed,
}

/// Drives the ping cadence and the pong deadline.
///
/// The run loop awaits [`Heartbeat::wait`], sends a probe and arms the
/// deadline on [`HeartbeatEvent::PingDue`], and tears the connection down on
/// [`HeartbeatEvent::DeadlineMissed`]. The deadline only runs while a probe
/// is outstanding.
pub struct Heartbeat {
    ticker: Interval,
    deadline: Option<Pin<Box<Sleep>>>,
}

impl Heartbeat {
    /// Creates a heartbeat with the standard cadence.
    #[must_use]
    pub fn new() -> Self {
        let mut ticker = interval(HEARTBEAT_INTERVAL);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self {
            ticker,
            deadline: None,
        }
    }

    /// Waits for whichever timer fires first.
    pub async fn wait(&mut self) -> HeartbeatEvent {
        match self.deadline.as_mut() {
            Some(deadline) => {
                tokio::select! {
                    () = deadline.as_mut() => HeartbeatEvent::DeadlineMissed,
                    _ = self.ticker.tick() => HeartbeatEvent::PingDue,
                }
            }
            None => {
                self.ticker.tick().await;
                HeartbeatEvent::PingDue
            }
        }
    }

    /// Builds the probe message, stamped with the current wall clock.
    #[must_use]
    pub fn ping() -> ClientMessage {
        ClientMessage::Ping {
            data: chrono::Utc::now().timestamp_millis(),
        }
    }

    /// Starts the pong deadline after a probe was sent.
    pub fn arm_deadline(&mut self) {
        self.deadline = Some(Box::pin(sleep(PONG_DEADLINE)));
    }

    /// Cancels the deadline when a pong arrives. Returns whether a probe
    /// was actually outstanding.
    pub fn disarm(&mut self) -> bool {
        self.deadline.take().is_some()
    }
}

impl Default for Heartbeat {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Heartbeat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Heartbeat")
            .field("armed", &self.deadline.is_some())
            .finish()
    }
}

/// Polls a future exactly once, for use in timing tests.
#[cfg(test)]
fn poll_once<F: std::future::Future>(future: Pin<&mut F>) -> std::task::Poll<F::Output> {
    use std::task::{Context, Waker};
    future.poll(&mut Context::from_waker(Waker::noop()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn disarm_reports_outstanding_probe() {
        let mut heartbeat = Heartbeat::new();
        assert!(!heartbeat.disarm());

        heartbeat.arm_deadline();
        assert!(heartbeat.disarm());
        assert!(!heartbeat.disarm());
    }

    #[tokio::test(start_paused = true)]
    async fn pings_follow_the_interval() {
        let mut heartbeat = Heartbeat::new();
        // The first ping is due immediately.
        assert_eq!(heartbeat.wait().await, HeartbeatEvent::PingDue);

        let mut second = std::pin::pin!(heartbeat.wait());
        assert!(poll_once(second.as_mut()).is_pending());
        tokio::time::advance(HEARTBEAT_INTERVAL).await;
        assert_eq!(
            poll_once(second.as_mut()),
            std::task::Poll::Ready(HeartbeatEvent::PingDue)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn wait_reports_missed_deadline_before_next_tick() {
        let mut heartbeat = Heartbeat::new();
        assert_eq!(heartbeat.wait().await, HeartbeatEvent::PingDue);

        heartbeat.arm_deadline();
        // The deadline (10s) fires well before the next tick (30s).
        assert_eq!(heartbeat.wait().await, HeartbeatEvent::DeadlineMissed);
    }

    #[test]
    fn ping_carries_a_timestamp() {
        match Heartbeat::ping() {
            ClientMessage::Ping { data } => assert!(data > 0),
            other => panic!("unexpected message: {other:?}"),
        }
    }
}
