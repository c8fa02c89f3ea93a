use crate::SessionState;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The locally held belief about the remote job.
///
/// Exactly one exists per controller. Only the controller mutates it; everybody else gets a
/// shared reference or a [`SessionView`] copy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    /// Correlates log lines of one start/stop cycle.
    pub id: Uuid,
    pub state: SessionState,
    /// Unknown when the job was adopted from a status check instead of started here.
    pub channel: Option<String>,
    pub target_viewers: u32,
    /// Last value reported by the server, never computed locally.
    pub current_viewers: u32,
    pub progress_percent: f64,
    pub status_line: String,
    pub started_at: Option<DateTime<Utc>>,
    pub planned_duration_seconds: Option<u64>,
    /// Never exceeds `planned_duration_seconds` when that is known.
    pub local_time_remaining_seconds: u64,
    pub consecutive_missed_polls: u32,
    /// Newest first, exactly as the server sent them.
    pub last_known_logs: Vec<String>,
}

/// UI-visible projection of a [`Session`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionView {
    pub state: SessionState,
    pub current_viewers: u32,
    pub target_viewers: u32,
    pub progress_percent: f64,
    pub status_line: String,
    pub logs: Vec<String>,
    pub time_remaining_secs: u64,
    pub planned_duration_secs: Option<u64>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            state: SessionState::Idle,
            channel: None,
            target_viewers: 0,
            current_viewers: 0,
            progress_percent: 0.0,
            status_line: String::new(),
            started_at: None,
            planned_duration_seconds: None,
            local_time_remaining_seconds: 0,
            consecutive_missed_polls: 0,
            last_known_logs: Vec::new(),
        }
    }

    pub fn view(&self) -> SessionView {
        SessionView {
            state: self.state,
            current_viewers: self.current_viewers,
            target_viewers: self.target_viewers,
            progress_percent: self.progress_percent,
            status_line: self.status_line.clone(),
            logs: self.last_known_logs.clone(),
            time_remaining_secs: self.local_time_remaining_seconds,
            planned_duration_secs: self.planned_duration_seconds,
        }
    }

    /// Starts a fresh cycle after the server accepted a start request.
    pub(crate) fn begin_cycle(
        &mut self,
        channel: String,
        target_viewers: u32,
        started_at: DateTime<Utc>,
        planned_duration_seconds: u64,
    ) {
        self.id = Uuid::new_v4();
        self.channel = Some(channel);
        self.target_viewers = target_viewers;
        self.started_at = Some(started_at);
        self.planned_duration_seconds = Some(planned_duration_seconds);
        self.local_time_remaining_seconds = planned_duration_seconds;
        self.clear_progress();
    }

    /// Starts a fresh cycle for a job that was found already running on the server.
    ///
    /// The start time is back-computed when the server reported both the planned and the
    /// remaining duration.
    pub(crate) fn adopt_cycle(
        &mut self,
        planned_duration_seconds: Option<u64>,
        time_remaining_seconds: Option<u64>,
        now: DateTime<Utc>,
    ) {
        self.id = Uuid::new_v4();
        self.channel = None;
        self.planned_duration_seconds = planned_duration_seconds;
        self.started_at = match (planned_duration_seconds, time_remaining_seconds) {
            (Some(planned), Some(remaining)) => {
                let elapsed = planned.saturating_sub(remaining);
                i64::try_from(elapsed)
                    .ok()
                    .map(|secs| now - chrono::Duration::seconds(secs))
            }
            _ => None,
        };
        self.local_time_remaining_seconds = 0;
        self.clear_progress();
    }

    fn clear_progress(&mut self) {
        self.current_viewers = 0;
        self.progress_percent = 0.0;
        self.status_line.clear();
        self.consecutive_missed_polls = 0;
        self.last_known_logs.clear();
    }

    /// Sets the countdown value, clamped to the planned duration.
    pub(crate) fn set_time_remaining(&mut self, seconds: u64) {
        self.local_time_remaining_seconds = match self.planned_duration_seconds {
            Some(planned) => seconds.min(planned),
            None => seconds,
        };
    }
}
