//! Scripted stand-ins shared by the unit tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::broadcast;

use crate::configuration::ReconcilePolicy;
use crate::error_handling::types::ApiError;
use crate::network::{SessionApi, StartPayload, StaticCredentials, StatusSnapshot, UserProfile};
use crate::session_management::{ConditionKind, SessionController, SessionEvent, Wakeup};

pub const TOKEN: &str = "test-token";

/// In-memory [`SessionApi`] answering from queues.
///
/// Empty queues fall back to: start and stop succeed, profile is a default user, status fails
/// with a connection error.
#[derive(Default)]
pub struct MockApi {
    pub profile_calls: AtomicUsize,
    pub start_calls: AtomicUsize,
    pub stop_calls: AtomicUsize,
    pub status_calls: AtomicUsize,
    profiles: Mutex<VecDeque<Result<UserProfile, ApiError>>>,
    starts: Mutex<VecDeque<Result<String, ApiError>>>,
    stops: Mutex<VecDeque<Result<String, ApiError>>>,
    statuses: Mutex<VecDeque<Result<StatusSnapshot, ApiError>>>,
    payloads: Mutex<Vec<StartPayload>>,
    delay: Option<Duration>,
}

impl MockApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every call sleeps this long before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn push_profile(&self, response: Result<UserProfile, ApiError>) {
        self.profiles.lock().unwrap().push_back(response);
    }

    pub fn push_start(&self, response: Result<String, ApiError>) {
        self.starts.lock().unwrap().push_back(response);
    }

    pub fn push_stop(&self, response: Result<String, ApiError>) {
        self.stops.lock().unwrap().push_back(response);
    }

    pub fn push_status(&self, response: Result<StatusSnapshot, ApiError>) {
        self.statuses.lock().unwrap().push_back(response);
    }

    pub fn payloads(&self) -> Vec<StartPayload> {
        self.payloads.lock().unwrap().clone()
    }

    pub fn calls(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }

    async fn pause(&self) {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
    }
}

impl SessionApi for MockApi {
    async fn fetch_profile(&self, _token: &str) -> Result<UserProfile, ApiError> {
        self.profile_calls.fetch_add(1, Ordering::SeqCst);
        let response = self.profiles.lock().unwrap().pop_front();
        self.pause().await;
        response.unwrap_or_else(|| {
            Ok(UserProfile {
                id: String::from("1"),
                username: String::from("tester"),
                ..UserProfile::default()
            })
        })
    }

    async fn start(&self, _token: &str, payload: &StartPayload) -> Result<String, ApiError> {
        self.start_calls.fetch_add(1, Ordering::SeqCst);
        self.payloads.lock().unwrap().push(payload.clone());
        let response = self.starts.lock().unwrap().pop_front();
        self.pause().await;
        response.unwrap_or_else(|| Ok(String::from("ok")))
    }

    async fn stop(&self, _token: &str) -> Result<String, ApiError> {
        self.stop_calls.fetch_add(1, Ordering::SeqCst);
        let response = self.stops.lock().unwrap().pop_front();
        self.pause().await;
        response.unwrap_or_else(|| Ok(String::from("stopped")))
    }

    async fn fetch_status(&self, _token: &str) -> Result<StatusSnapshot, ApiError> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        let response = self.statuses.lock().unwrap().pop_front();
        self.pause().await;
        response.unwrap_or_else(|| Err(ApiError::Connection(String::from("no scripted status"))))
    }
}

pub fn running_snapshot(current: u32, target: u32, progress: f64) -> StatusSnapshot {
    StatusSnapshot {
        is_running: true,
        current_viewers: current,
        target_viewers: target,
        progress_percent: progress,
        status_line: String::from("Running"),
        logs: vec![String::from("viewer joined")],
        ..StatusSnapshot::default()
    }
}

pub fn stopped_snapshot() -> StatusSnapshot {
    StatusSnapshot {
        status_line: String::from("Stopped"),
        ..StatusSnapshot::default()
    }
}

pub fn credentials() -> Arc<StaticCredentials> {
    Arc::new(StaticCredentials::new(Some(TOKEN.to_string())))
}

pub fn controller_with(
    api: Arc<MockApi>,
    credentials: Arc<StaticCredentials>,
    policy: ReconcilePolicy,
) -> SessionController<MockApi> {
    SessionController::new(api, credentials, policy)
}

pub fn controller(api: Arc<MockApi>) -> SessionController<MockApi> {
    controller_with(api, credentials(), ReconcilePolicy::default())
}

/// Drives the controller until one status poll has settled and been handled.
pub async fn settle_next_poll(controller: &mut SessionController<MockApi>) {
    loop {
        let wakeup = controller.next_wakeup().await;
        let settled = matches!(wakeup, Wakeup::PollSettled { .. });
        controller.handle_wakeup(wakeup);
        if settled {
            return;
        }
    }
}

pub fn drain(rx: &mut broadcast::Receiver<SessionEvent>) -> Vec<SessionEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

pub fn notifications(events: &[SessionEvent]) -> Vec<ConditionKind> {
    events
        .iter()
        .filter_map(|event| match event {
            SessionEvent::Notification(n) => Some(n.kind),
            _ => None,
        })
        .collect()
}

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}
