//! Idle watchdog.
//!
//! Idle means neither output nor input: relays and input injection touch the
//! same [`ActivityClock`], so a program waiting on a prompt stays alive for
//! as long as someone keeps typing.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::registry::ActivityClock;

/// Floor for the polling interval; a zero-period ticker is invalid.
const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Why the watchdog asked for the process to be killed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchdogVerdict {
    /// No activity for longer than the idle timeout.
    IdleTimeout {
        /// Observed idle time when the watchdog fired.
        idle: Duration,
    },
    /// An external termination request arrived.
    Terminated,
}

/// Per-run idle watchdog.
#[derive(Debug)]
pub(crate) struct Watchdog {
    activity: ActivityClock,
    idle_timeout: Duration,
    poll_interval: Duration,
    terminate: Arc<Notify>,
}

impl Watchdog {
    pub(crate) fn new(
        activity: ActivityClock,
        idle_timeout: Duration,
        poll_interval: Duration,
        terminate: Arc<Notify>,
    ) -> Self {
        Self {
            activity,
            idle_timeout,
            poll_interval: poll_interval.max(MIN_POLL_INTERVAL),
            terminate,
        }
    }

    /// Poll until the run goes idle or termination is requested.
    ///
    /// Never returns on its own while activity continues; the supervisor
    /// aborts the task when the process exits first.
    pub(crate) async fn watch(self) -> WatchdogVerdict {
        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = self.terminate.notified() => return WatchdogVerdict::Terminated,
                _ = ticker.tick() => {
                    let idle = self.activity.idle_for();
                    if idle > self.idle_timeout {
                        tracing::debug!(
                            idle = ?idle,
                            limit = ?self.idle_timeout,
                            "Idle timeout reached"
                        );
                        return WatchdogVerdict::IdleTimeout { idle };
                    }
                }
            }
        }
    }

    /// Run the watchdog as its own task.
    pub(crate) fn spawn(self) -> JoinHandle<WatchdogVerdict> {
        tokio::spawn(self.watch())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn watchdog(clock: &ActivityClock, idle_ms: u64, notify: &Arc<Notify>) -> Watchdog {
        Watchdog::new(
            clock.clone(),
            Duration::from_millis(idle_ms),
            Duration::from_millis(10),
            notify.clone(),
        )
    }

    #[tokio::test]
    async fn test_fires_when_idle() {
        let clock = ActivityClock::new();
        let notify = Arc::new(Notify::new());
        let verdict = tokio::time::timeout(
            Duration::from_secs(2),
            watchdog(&clock, 100, &notify).watch(),
        )
        .await
        .unwrap();

        match verdict {
            WatchdogVerdict::IdleTimeout { idle } => assert!(idle > Duration::from_millis(100)),
            other => panic!("unexpected verdict {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_activity_keeps_alive() {
        let clock = ActivityClock::new();
        let notify = Arc::new(Notify::new());
        let handle = watchdog(&clock, 150, &notify).spawn();

        // Touch well inside the window for several windows' worth of time.
        for _ in 0..10 {
            tokio::time::sleep(Duration::from_millis(50)).await;
            clock.touch();
        }
        assert!(!handle.is_finished());

        // Then go quiet.
        let verdict = tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(verdict, WatchdogVerdict::IdleTimeout { .. }));
    }

    #[tokio::test]
    async fn test_zero_poll_interval_is_clamped() {
        let clock = ActivityClock::new();
        let notify = Arc::new(Notify::new());
        let dog = Watchdog::new(
            clock.clone(),
            Duration::from_millis(50),
            Duration::ZERO,
            notify.clone(),
        );
        assert_eq!(dog.poll_interval, MIN_POLL_INTERVAL);

        let verdict = tokio::time::timeout(Duration::from_secs(2), dog.spawn())
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(verdict, WatchdogVerdict::IdleTimeout { .. }));
    }

    #[tokio::test]
    async fn test_termination_request() {
        let clock = ActivityClock::new();
        let notify = Arc::new(Notify::new());
        let handle = watchdog(&clock, 60_000, &notify).spawn();

        notify.notify_one();
        let verdict = tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(verdict, WatchdogVerdict::Terminated);
    }
}
