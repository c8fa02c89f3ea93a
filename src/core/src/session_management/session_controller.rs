use std::sync::{Arc, OnceLock};

use chrono::Utc;
use log::{debug, info, trace, warn};
use regex::Regex;
use tokio::sync::broadcast;

use super::countdown::CountdownTimer;
use super::events::{ConditionKind, Notification, SessionEvent};
use super::notification_gate::NotificationGate;
use super::pending_operation::{PendingOperation, RequestSequence};
use super::poll_scheduler::{PollScheduler, SchedulerEvent};
use super::session::{Session, SessionView};
use crate::configuration::ReconcilePolicy;
use crate::error_handling::types::{
    ApiError, AuthError, ControllerError, SessionError, StartError, StopError, ValidationError,
};
use crate::network::{CredentialSource, SessionApi, StartPayload, StatusSnapshot, UserProfile};
use crate::SessionState;

const EVENT_CAPACITY: usize = 64;

/// Optional tuning knobs forwarded verbatim to the server.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StartOptions {
    pub rapid: Option<bool>,
    pub viewer_speed: Option<f64>,
    pub ramp_up_minutes: Option<u32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StartRequest {
    pub channel: String,
    pub target_viewers: u32,
    pub duration_minutes: u32,
    pub options: StartOptions,
}

impl StartRequest {
    pub fn new(channel: impl Into<String>, target_viewers: u32, duration_minutes: u32) -> Self {
        Self {
            channel: channel.into(),
            target_viewers,
            duration_minutes,
            options: StartOptions::default(),
        }
    }

    pub fn to_payload(&self) -> StartPayload {
        StartPayload {
            channel: self.channel.trim().to_string(),
            views: self.target_viewers,
            duration: self.duration_minutes,
            rapid: self.options.rapid,
            viewer_speed: self.options.viewer_speed,
            ramp_up_minutes: self.options.ramp_up_minutes,
        }
    }
}

/// Positive outcome of a user intent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Accepted {
    /// The server confirmed, with its message.
    Confirmed(String),
    /// Nothing to do in the current state; no network call was made.
    Ignored,
}

/// Something the controller has to react to outside of user intents.
#[derive(Debug)]
pub enum Wakeup {
    PollTick,
    PollSettled {
        seq: u64,
        result: Result<StatusSnapshot, ApiError>,
    },
    CountdownTick,
}

/// The reconciliation state machine.
///
/// Sole owner and writer of the [`Session`]. User intents come in through
/// [`request_start`](Self::request_start) / [`request_stop`](Self::request_stop), server truth
/// through [`ingest_snapshot`](Self::ingest_snapshot), timers through
/// [`next_wakeup`](Self::next_wakeup) + [`handle_wakeup`](Self::handle_wakeup). Every
/// observable change is published as a [`SessionEvent`].
pub struct SessionController<A: SessionApi> {
    api: Arc<A>,
    credentials: Arc<dyn CredentialSource>,
    policy: ReconcilePolicy,
    session: Session,
    profile: Option<UserProfile>,
    scheduler: PollScheduler,
    countdown: CountdownTimer,
    gate: NotificationGate,
    sequence: RequestSequence,
    events: broadcast::Sender<SessionEvent>,
}

impl<A: SessionApi> SessionController<A> {
    pub fn new(
        api: Arc<A>,
        credentials: Arc<dyn CredentialSource>,
        policy: ReconcilePolicy,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            api,
            credentials,
            scheduler: PollScheduler::new(policy.poll_interval),
            countdown: CountdownTimer::new(policy.drift_tolerance_secs),
            gate: NotificationGate::new(policy.notifications_enabled),
            policy,
            session: Session::new(),
            profile: None,
            sequence: RequestSequence::new(),
            events,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Lets other owners hand out subscriptions without access to the controller.
    pub fn event_sender(&self) -> broadcast::Sender<SessionEvent> {
        self.events.clone()
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn view(&self) -> SessionView {
        self.session.view()
    }

    pub fn profile(&self) -> Option<&UserProfile> {
        self.profile.as_ref()
    }

    /// Viewer quota advertised by the server, or the configured fallback.
    pub fn max_viewers(&self) -> u32 {
        self.profile
            .as_ref()
            .and_then(|p| p.max_views)
            .unwrap_or(self.policy.default_max_viewers)
    }

    pub fn last_request_seq(&self) -> u64 {
        self.sequence.last_issued()
    }

    pub fn is_polling(&self) -> bool {
        self.scheduler.is_active()
    }

    pub fn is_counting_down(&self) -> bool {
        self.countdown.is_running()
    }

    pub fn validate(&self, request: &StartRequest) -> Result<(), ValidationError> {
        let channel = request.channel.trim();
        if channel.is_empty() {
            return Err(ValidationError::EmptyChannel);
        }
        if !channel_pattern().is_match(channel) {
            return Err(ValidationError::InvalidChannel(channel.to_string()));
        }
        if request.duration_minutes == 0 {
            return Err(ValidationError::NonPositiveDuration);
        }
        if request.target_viewers == 0 {
            return Err(ValidationError::NoViewers);
        }
        let max = self.max_viewers();
        if request.target_viewers > max {
            return Err(ValidationError::AboveQuota {
                requested: request.target_viewers,
                max,
            });
        }
        Ok(())
    }

    pub async fn request_start(&mut self, request: StartRequest) -> Result<Accepted, StartError> {
        if !self.session.state.accepts_start() {
            debug!("Start rejected locally: session is {}", self.session.state);
            return Err(StartError::AlreadyActive);
        }
        self.validate(&request)?;
        let token = self
            .credentials
            .current_token()
            .ok_or(StartError::Auth(AuthError::MissingCredential))?;

        let seq = self.sequence.supersede();
        self.scheduler.cancel_in_flight();
        self.transition(SessionState::Starting);

        let payload = request.to_payload();
        let api = Arc::clone(&self.api);
        let mut call =
            PendingOperation::spawn(seq, async move { api.start(&token, &payload).await });
        let outcome = call.settled().await;

        match outcome {
            Ok(message) => {
                self.session.begin_cycle(
                    request.channel.trim().to_string(),
                    request.target_viewers,
                    Utc::now(),
                    u64::from(request.duration_minutes) * 60,
                );
                self.gate.reset();
                info!(
                    "[{}] Session accepted for {} ({} viewers, {} min): {}",
                    self.session.id,
                    request.channel.trim(),
                    request.target_viewers,
                    request.duration_minutes,
                    message
                );
                self.transition(SessionState::Running);
                self.notify(ConditionKind::Started);
                self.start_tracking();
                Ok(Accepted::Confirmed(message))
            }
            Err(err) => {
                self.transition(SessionState::Idle);
                match err {
                    ApiError::Unauthorized => {
                        self.handle_credential_rejected();
                        Err(StartError::Auth(AuthError::CredentialRejected))
                    }
                    ApiError::Rejected { detail, .. } => {
                        warn!("Server refused to start session: {}", detail);
                        Err(StartError::ServerRejection(detail))
                    }
                    other => {
                        warn!("Start request failed: {}", other);
                        Err(StartError::Network(other))
                    }
                }
            }
        }
    }

    pub async fn request_stop(&mut self) -> Result<Accepted, StopError> {
        if self.session.state != SessionState::Running {
            debug!("Stop ignored: session is {}", self.session.state);
            return Ok(Accepted::Ignored);
        }
        let token = self
            .credentials
            .current_token()
            .ok_or(StopError::Auth(AuthError::MissingCredential))?;

        let seq = self.sequence.supersede();
        self.scheduler.cancel_in_flight();
        self.transition(SessionState::Stopping);

        let api = Arc::clone(&self.api);
        let mut call = PendingOperation::spawn(seq, async move { api.stop(&token).await });
        match call.settled().await {
            Ok(message) => {
                info!("[{}] Stop acknowledged: {}", self.session.id, message);
                self.launch_poll();
                Ok(Accepted::Confirmed(message))
            }
            Err(ApiError::Unauthorized) => {
                self.handle_credential_rejected();
                Err(StopError::Auth(AuthError::CredentialRejected))
            }
            Err(ApiError::Rejected { detail, .. }) => {
                warn!("Server refused to stop session: {}", detail);
                self.launch_poll();
                Err(StopError::ServerRejection(detail))
            }
            Err(other) => {
                warn!("Stop request failed: {}", other);
                self.transition(SessionState::Running);
                Err(StopError::Network(other))
            }
        }
    }

    /// Reconciles the session against one server snapshot.
    pub fn ingest_snapshot(&mut self, snapshot: StatusSnapshot) {
        let state = self.session.state;
        if snapshot.is_running {
            if matches!(state, SessionState::Idle | SessionState::Ended) {
                self.session.adopt_cycle(
                    snapshot.total_duration_secs,
                    snapshot.time_remaining_secs,
                    Utc::now(),
                );
                info!(
                    "[{}] Found a session already running on the server",
                    self.session.id
                );
            }
            self.session.current_viewers = snapshot.current_viewers;
            if snapshot.target_viewers > 0 {
                self.session.target_viewers = snapshot.target_viewers;
            }
            self.session.progress_percent = snapshot.progress_percent;
            self.session.consecutive_missed_polls = 0;
            self.gate.clear();
        }
        self.session.status_line = snapshot.status_line;
        self.session.last_known_logs = snapshot.logs;

        if snapshot.is_running {
            if state != SessionState::Stopping {
                self.transition(SessionState::Running);
                self.start_tracking();
            }
            if self.session.planned_duration_seconds.is_none() {
                self.session.planned_duration_seconds = snapshot.total_duration_secs;
            }
            if let Some(server_remaining) = snapshot.time_remaining_secs {
                self.resync_countdown(server_remaining);
            }
        } else {
            match state {
                SessionState::Stopping => {
                    self.transition(SessionState::Ended);
                    self.notify(ConditionKind::Stopped);
                    self.stop_tracking();
                }
                SessionState::Running => {
                    self.session.consecutive_missed_polls += 1;
                    let misses = self.session.consecutive_missed_polls;
                    debug!(
                        "[{}] Status reports not running ({} in a row)",
                        self.session.id, misses
                    );
                    self.notify(ConditionKind::Inactive);
                    if self
                        .policy
                        .max_consecutive_misses
                        .is_some_and(|max| misses >= max)
                    {
                        self.transition(SessionState::Ended);
                        self.notify(ConditionKind::InactiveTooLong);
                        self.stop_tracking();
                    }
                }
                SessionState::Starting => {
                    self.transition(SessionState::Ended);
                    self.notify(ConditionKind::Ended);
                    self.stop_tracking();
                }
                SessionState::Idle => {
                    self.transition(SessionState::Ended);
                    self.stop_tracking();
                }
                SessionState::Ended => self.stop_tracking(),
            }
        }

        self.emit(SessionEvent::SnapshotIngested(self.session.view()));
    }

    pub fn dismiss_ended(&mut self) -> Result<(), SessionError> {
        if self.session.state != SessionState::Ended {
            return Err(SessionError::InvalidTransition {
                from: self.session.state,
                action: "dismiss",
            });
        }
        self.gate.reset();
        self.reset_session();
        Ok(())
    }

    /// Forgets the session and the credential.
    ///
    /// Unless `stop_on_logout` is set the remote job keeps running; the next login picks it up
    /// again through [`rehydrate`](Self::rehydrate).
    pub async fn logout(&mut self) {
        if self.policy.stop_on_logout && self.session.state.is_active() {
            if let Some(token) = self.credentials.current_token() {
                let seq = self.sequence.supersede();
                let api = Arc::clone(&self.api);
                let mut call =
                    PendingOperation::spawn(seq, async move { api.stop(&token).await });
                match call.settled().await {
                    Ok(message) => info!("Stopped remote session before logout: {}", message),
                    Err(e) => warn!("Best-effort stop on logout failed: {}", e),
                }
            }
        } else if self.session.state.is_active() {
            info!("Logging out; the remote session keeps running");
        }
        self.stop_tracking();
        self.sequence.supersede();
        self.credentials.invalidate();
        self.profile = None;
        self.gate.reset();
        self.reset_session();
    }

    /// Loads the profile, then classifies the server's current status under the live rules.
    pub async fn rehydrate(&mut self) -> Result<SessionView, ControllerError> {
        let token = self
            .credentials
            .current_token()
            .ok_or(AuthError::MissingCredential)?;

        let fetched = self.api.fetch_profile(&token).await;
        let profile = match fetched {
            Ok(profile) => profile,
            Err(err) => return Err(self.rehydrate_failure(err)),
        };
        info!(
            "Logged in as {} ({}, up to {} viewers)",
            profile.username,
            profile.tier(),
            profile.max_views.unwrap_or(self.policy.default_max_viewers)
        );
        self.profile = Some(profile);

        let seq = self.sequence.issue();
        let fetched = self.api.fetch_status(&token).await;
        match fetched {
            Ok(snapshot) if !self.sequence.is_stale(seq) => self.ingest_snapshot(snapshot),
            Ok(_) => debug!("Discarding stale status response #{}", seq),
            Err(err) => return Err(self.rehydrate_failure(err)),
        }
        Ok(self.session.view())
    }

    fn rehydrate_failure(&mut self, err: ApiError) -> ControllerError {
        if err == ApiError::Unauthorized {
            self.handle_credential_rejected();
            ControllerError::Auth(AuthError::CredentialRejected)
        } else {
            ControllerError::Api(err)
        }
    }

    /// Replaces the session with a previously serialized one.
    ///
    /// Anything still in flight becomes stale. Non-terminal states re-arm polling so the next
    /// snapshot is reconciled exactly as in live operation.
    pub fn restore_session(&mut self, session: Session) {
        self.stop_tracking();
        self.sequence.supersede();
        self.gate.reset();
        let from = self.session.state;
        self.session = session;
        let to = self.session.state;
        info!("[{}] Restored session in state {}", self.session.id, to);
        if from != to {
            self.emit(SessionEvent::StateEntered { from, to });
        }
        if matches!(
            to,
            SessionState::Starting | SessionState::Running | SessionState::Stopping
        ) {
            self.start_tracking();
        }
    }

    /// Waits for the next timer or poll settlement. Cancel-safe.
    pub async fn next_wakeup(&mut self) -> Wakeup {
        tokio::select! {
            event = self.scheduler.next_event() => match event {
                SchedulerEvent::Tick => Wakeup::PollTick,
                SchedulerEvent::Settled { seq, result } => Wakeup::PollSettled { seq, result },
            },
            _ = self.countdown.tick() => Wakeup::CountdownTick,
        }
    }

    pub fn handle_wakeup(&mut self, wakeup: Wakeup) {
        match wakeup {
            Wakeup::PollTick => self.launch_poll(),
            Wakeup::PollSettled { seq, result } => self.on_poll_settled(seq, result),
            Wakeup::CountdownTick => self.tick_countdown(),
        }
    }

    /// One turn of the background loop.
    pub async fn step(&mut self) {
        let wakeup = self.next_wakeup().await;
        self.handle_wakeup(wakeup);
    }

    fn launch_poll(&mut self) {
        let Some(token) = self.credentials.current_token() else {
            warn!("No credential available for status polling");
            self.lose_credential();
            return;
        };
        let seq = self.sequence.issue();
        let api = Arc::clone(&self.api);
        self.scheduler
            .launch(seq, async move { api.fetch_status(&token).await });
    }

    fn on_poll_settled(&mut self, seq: u64, result: Result<StatusSnapshot, ApiError>) {
        if self.sequence.is_stale(seq) {
            debug!("Discarding stale status response #{}", seq);
            return;
        }
        match result {
            Ok(snapshot) => self.ingest_snapshot(snapshot),
            Err(ApiError::Unauthorized) => self.handle_credential_rejected(),
            Err(ApiError::Cancelled) => debug!("Status poll #{} cancelled", seq),
            Err(e) => warn!("Status poll #{} failed: {}", seq, e),
        }
    }

    fn tick_countdown(&mut self) {
        let remaining = CountdownTimer::decrement(self.session.local_time_remaining_seconds);
        self.session.set_time_remaining(remaining);
        trace!("Countdown: {}s remaining", remaining);
        self.emit(SessionEvent::CountdownTick {
            remaining_secs: remaining,
        });
        if remaining == 0 {
            self.countdown.stop();
        }
    }

    /// A countdown that already ran out picks the server figure up again even within tolerance.
    fn resync_countdown(&mut self, server_remaining: u64) {
        let local = self.session.local_time_remaining_seconds;
        let exhausted = local == 0 && server_remaining > 0;
        let adopted = self
            .countdown
            .resync(local, server_remaining)
            .or(exhausted.then_some(server_remaining));
        if let Some(adopted) = adopted {
            debug!("Countdown drifted: local {}s, server {}s", local, adopted);
            self.session.set_time_remaining(adopted);
        }
        if self.session.local_time_remaining_seconds > 0 {
            self.countdown.start();
        } else {
            self.countdown.stop();
        }
    }

    fn handle_credential_rejected(&mut self) {
        warn!("Server rejected the credential");
        self.credentials.invalidate();
        self.lose_credential();
    }

    fn lose_credential(&mut self) {
        self.stop_tracking();
        if !matches!(self.session.state, SessionState::Idle | SessionState::Ended) {
            self.transition(SessionState::Ended);
        }
        self.notify(ConditionKind::CredentialExpired);
    }

    fn start_tracking(&mut self) {
        self.scheduler.start();
        if self.session.local_time_remaining_seconds > 0 {
            self.countdown.start();
        }
    }

    fn stop_tracking(&mut self) {
        self.scheduler.stop();
        self.countdown.stop();
    }

    fn reset_session(&mut self) {
        let from = self.session.state;
        self.session = Session::new();
        if from != SessionState::Idle {
            info!("Session reset ({} -> idle)", from);
            self.emit(SessionEvent::StateEntered {
                from,
                to: SessionState::Idle,
            });
        }
    }

    fn transition(&mut self, to: SessionState) {
        let from = self.session.state;
        if from == to {
            return;
        }
        info!("[{}] Session {} -> {}", self.session.id, from, to);
        self.session.state = to;
        self.emit(SessionEvent::StateEntered { from, to });
    }

    fn notify(&mut self, kind: ConditionKind) {
        if !self.gate.offer(self.session.state, kind) {
            return;
        }
        let notification = Notification::for_kind(kind, &self.session);
        info!("{}: {}", notification.title, notification.body);
        self.emit(SessionEvent::Notification(notification));
    }

    fn emit(&self, event: SessionEvent) {
        // No subscriber is not an error.
        let _ = self.events.send(event);
    }
}

fn channel_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[A-Za-z0-9_]{1,25}$").expect("valid channel pattern")
    })
}
