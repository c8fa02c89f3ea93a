use std::future::Future;
use std::time::Duration;

use log::debug;
use tokio::time::{interval, Interval, MissedTickBehavior};

use super::pending_operation::PendingOperation;
use crate::error_handling::types::ApiError;
use crate::network::StatusSnapshot;

/// What woke the scheduler up.
#[derive(Debug)]
pub enum SchedulerEvent {
    /// Time to fetch a new snapshot.
    Tick,
    /// The outstanding fetch finished.
    Settled {
        seq: u64,
        result: Result<StatusSnapshot, ApiError>,
    },
}

/// Owns the single recurring status timer and the single outstanding status request.
///
/// The scheduler decides *when* to poll; the caller decides *what* to do with the result.
#[derive(Debug)]
pub struct PollScheduler {
    period: Duration,
    ticker: Option<Interval>,
    in_flight: Option<PendingOperation<StatusSnapshot>>,
    skipped_ticks: u64,
}

impl PollScheduler {
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            ticker: None,
            in_flight: None,
            skipped_ticks: 0,
        }
    }

    /// Arms the timer. Returns `false` when it was already armed; no second timer is created.
    ///
    /// The first tick fires immediately.
    pub fn start(&mut self) -> bool {
        if self.ticker.is_some() {
            return false;
        }
        let mut ticker = interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        self.ticker = Some(ticker);
        debug!("Status polling every {:?}", self.period);
        true
    }

    /// Disarms the timer and abandons any outstanding request.
    pub fn stop(&mut self) {
        if self.ticker.take().is_some() {
            debug!("Status polling stopped");
        }
        self.cancel_in_flight();
    }

    pub fn is_active(&self) -> bool {
        self.ticker.is_some()
    }

    pub fn has_in_flight(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Starts a fetch unless one is still outstanding, in which case the tick is skipped.
    pub fn launch<F>(&mut self, seq: u64, fetch: F) -> bool
    where
        F: Future<Output = Result<StatusSnapshot, ApiError>> + Send + 'static,
    {
        if let Some(pending) = &self.in_flight {
            self.skipped_ticks += 1;
            debug!(
                "Skipping status poll #{}: #{} still in flight",
                seq,
                pending.seq()
            );
            return false;
        }
        self.in_flight = Some(PendingOperation::spawn(seq, fetch));
        true
    }

    pub fn cancel_in_flight(&mut self) {
        if let Some(pending) = self.in_flight.take() {
            debug!("Cancelling status poll #{}", pending.seq());
            pending.cancel();
        }
    }

    pub fn skipped_ticks(&self) -> u64 {
        self.skipped_ticks
    }

    /// Next tick or settlement. Pending forever while disarmed and idle. Cancel-safe.
    pub async fn next_event(&mut self) -> SchedulerEvent {
        tokio::select! {
            biased;
            (seq, result) = settle(&mut self.in_flight) => {
                self.in_flight = None;
                SchedulerEvent::Settled { seq, result }
            }
            _ = tick(&mut self.ticker) => SchedulerEvent::Tick,
        }
    }
}

async fn settle(
    in_flight: &mut Option<PendingOperation<StatusSnapshot>>,
) -> (u64, Result<StatusSnapshot, ApiError>) {
    match in_flight.as_mut() {
        Some(pending) => {
            let result = pending.settled().await;
            (pending.seq(), result)
        }
        None => std::future::pending().await,
    }
}

async fn tick(ticker: &mut Option<Interval>) {
    match ticker.as_mut() {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}
