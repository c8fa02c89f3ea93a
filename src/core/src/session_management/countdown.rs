use std::time::Duration;

use log::trace;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};

const TICK: Duration = Duration::from_secs(1);

/// One-second ticker driving the local remaining-time display between polls.
///
/// The timer does not hold the remaining time itself; the value lives in the session and the
/// controller applies [`CountdownTimer::decrement`] / [`CountdownTimer::resync`] to it.
#[derive(Debug)]
pub struct CountdownTimer {
    ticker: Option<Interval>,
    tolerance_secs: u64,
}

impl CountdownTimer {
    pub fn new(tolerance_secs: u64) -> Self {
        Self {
            ticker: None,
            tolerance_secs,
        }
    }

    /// Idempotent: a running timer keeps its phase.
    pub fn start(&mut self) {
        if self.ticker.is_some() {
            return;
        }
        let mut ticker = interval_at(Instant::now() + TICK, TICK);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        self.ticker = Some(ticker);
        trace!("Countdown started");
    }

    pub fn stop(&mut self) {
        if self.ticker.take().is_some() {
            trace!("Countdown stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.ticker.is_some()
    }

    /// Completes on the next one-second boundary; never completes while stopped.
    pub async fn tick(&mut self) {
        match self.ticker.as_mut() {
            Some(ticker) => {
                ticker.tick().await;
            }
            None => std::future::pending::<()>().await,
        }
    }

    pub fn decrement(remaining_secs: u64) -> u64 {
        remaining_secs.saturating_sub(1)
    }

    /// Server figure to adopt, or `None` when the local value is close enough.
    ///
    /// The server value replaces the local one outright; the two are never blended.
    pub fn resync(&self, local_secs: u64, server_secs: u64) -> Option<u64> {
        if local_secs.abs_diff(server_secs) > self.tolerance_secs {
            Some(server_secs)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_pending, task};

    #[test]
    fn decrement_clamps_at_zero() {
        assert_eq!(CountdownTimer::decrement(10), 9);
        assert_eq!(CountdownTimer::decrement(1), 0);
        assert_eq!(CountdownTimer::decrement(0), 0);
    }

    #[test]
    fn resync_only_beyond_tolerance() {
        let timer = CountdownTimer::new(2);
        assert_eq!(timer.resync(100, 99), None);
        assert_eq!(timer.resync(100, 102), None);
        assert_eq!(timer.resync(100, 90), Some(90));
        assert_eq!(timer.resync(0, 456), Some(456));

        let strict = CountdownTimer::new(0);
        assert_eq!(strict.resync(100, 99), Some(99));
    }

    #[tokio::test(start_paused = true)]
    async fn ticks_once_per_second() {
        let mut timer = CountdownTimer::new(2);
        timer.start();
        timer.start();
        let begin = Instant::now();
        timer.tick().await;
        assert_eq!(begin.elapsed(), Duration::from_secs(1));
        timer.tick().await;
        assert_eq!(begin.elapsed(), Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn stopped_timer_never_ticks() {
        let mut timer = CountdownTimer::new(2);
        timer.start();
        timer.stop();
        assert!(!timer.is_running());
        let mut tick = task::spawn(timer.tick());
        assert_pending!(tick.poll());
        tokio::time::advance(Duration::from_secs(5)).await;
        assert_pending!(tick.poll());
    }
}
