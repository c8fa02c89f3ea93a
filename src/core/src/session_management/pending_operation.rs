use std::future::Future;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error_handling::types::ApiError;

/// Monotonic numbering of network requests.
///
/// Polls take a plain number with [`RequestSequence::issue`]. Start and stop calls use
/// [`RequestSequence::supersede`], which also raises the floor below which every response is
/// stale: a status fetched before the user acted says nothing about the world after it.
#[derive(Debug, Default)]
pub struct RequestSequence {
    last_issued: u64,
    floor: u64,
}

impl RequestSequence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn issue(&mut self) -> u64 {
        self.last_issued += 1;
        self.last_issued
    }

    pub fn supersede(&mut self) -> u64 {
        let seq = self.issue();
        self.floor = seq;
        seq
    }

    pub fn is_stale(&self, seq: u64) -> bool {
        seq < self.floor
    }

    pub fn last_issued(&self) -> u64 {
        self.last_issued
    }
}

/// A network call running as its own task, tagged with its sequence number.
///
/// Dropping the operation cancels the call.
#[derive(Debug)]
pub struct PendingOperation<T> {
    seq: u64,
    cancel: CancellationToken,
    handle: JoinHandle<Result<T, ApiError>>,
}

impl<T: Send + 'static> PendingOperation<T> {
    pub fn spawn<F>(seq: u64, call: F) -> Self
    where
        F: Future<Output = Result<T, ApiError>> + Send + 'static,
    {
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let handle = tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => Err(ApiError::Cancelled),
                result = call => result,
            }
        });
        Self {
            seq,
            cancel,
            handle,
        }
    }
}

impl<T> PendingOperation<T> {
    pub fn seq(&self) -> u64 {
        self.seq
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Waits for the call to finish. Cancel-safe; must not be awaited again once it returned.
    pub async fn settled(&mut self) -> Result<T, ApiError> {
        match (&mut self.handle).await {
            Ok(result) => result,
            Err(e) if e.is_cancelled() => Err(ApiError::Cancelled),
            Err(e) => Err(ApiError::Connection(format!("request task failed: {}", e))),
        }
    }
}

impl<T> Drop for PendingOperation<T> {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
