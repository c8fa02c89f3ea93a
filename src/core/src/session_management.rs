//! Session management core module.
//!
//! This module holds the reconciliation engine: the locally believed state of
//! the remote job ([`session::Session`]), the controller that owns it
//! ([`session_controller::SessionController`]) and the helpers the controller
//! drives: the status poll, the local countdown and the notification gate.
//!
//! ```text
//!  user intent ──▶ SessionController ──▶ SessionApi (start / stop)
//!                        ▲    │
//!      StatusSnapshot    │    └──▶ PollScheduler ──▶ SessionApi (status)
//!                        │                                │
//!                        └────────────────────────────────┘
//!                        │
//!                        └──▶ SessionEvent (broadcast) ──▶ any renderer
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

/// Submodule for the local countdown.
pub mod countdown;
/// Submodule for the events published to renderers.
pub mod events;
/// Submodule for notification de-duplication.
pub mod notification_gate;
/// Submodule for request sequencing and cancellable in-flight calls.
pub mod pending_operation;
/// Submodule for the status poll timer.
pub mod poll_scheduler;
/// Submodule for session data structures.
pub mod session;
/// Submodule for the state machine itself.
pub mod session_controller;


pub use events::{ConditionKind, Notification, SessionEvent};
pub use session::{Session, SessionView};
pub use session_controller::{Accepted, SessionController, StartOptions, StartRequest, Wakeup};

/// Lifecycle state of the remote job as believed locally.
///
/// Variants:
/// - `Idle`: nothing started in this cycle.
/// - `Starting`: start call issued, not confirmed yet (optimistic).
/// - `Running`: the server accepted the start or reported the job running.
/// - `Stopping`: stop call issued, waiting for a snapshot to confirm.
/// - `Ended`: the job is known to be over; left via `dismiss_ended` or a new start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    Idle,
    Starting,
    Running,
    Stopping,
    Ended,
}

impl SessionState {
    /// A new start request is only accepted from these states.
    pub fn accepts_start(self) -> bool {
        matches!(self, SessionState::Idle | SessionState::Ended)
    }

    /// The remote job is believed to exist.
    pub fn is_active(self) -> bool {
        matches!(self, SessionState::Running | SessionState::Stopping)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Idle => "idle",
            SessionState::Starting => "starting",
            SessionState::Running => "running",
            SessionState::Stopping => "stopping",
            SessionState::Ended => "ended",
        };
        f.write_str(name)
    }
}
