use super::session::{Session, SessionView};
use crate::SessionState;

/// Everything a renderer needs to follow the session, published on a broadcast channel.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    StateEntered {
        from: SessionState,
        to: SessionState,
    },
    SnapshotIngested(SessionView),
    Notification(Notification),
    CountdownTick {
        remaining_secs: u64,
    },
}

/// Condition a user notification is raised for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConditionKind {
    Started,
    /// Negative snapshot while believed running; may be transient.
    Inactive,
    /// Escalation after too many consecutive negative snapshots.
    InactiveTooLong,
    Stopped,
    Ended,
    CredentialExpired,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub kind: ConditionKind,
    pub title: String,
    pub body: String,
}

impl Notification {
    pub fn for_kind(kind: ConditionKind, session: &Session) -> Self {
        let (title, body) = match kind {
            ConditionKind::Started => (
                "Session Started",
                match &session.channel {
                    Some(channel) => format!(
                        "Targeting {} viewers on {}",
                        session.target_viewers, channel
                    ),
                    None => format!("Targeting {} viewers", session.target_viewers),
                },
            ),
            ConditionKind::Inactive => (
                "Status Warning",
                String::from("Session status became inactive. Check logs for details."),
            ),
            ConditionKind::InactiveTooLong => (
                "Session Stopped",
                format!(
                    "Session was inactive for {} consecutive checks and is considered ended.",
                    session.consecutive_missed_polls
                ),
            ),
            ConditionKind::Stopped => (
                "Session Stopped",
                String::from("The session has been stopped."),
            ),
            ConditionKind::Ended => (
                "Session Ended",
                String::from("The remote job is no longer running."),
            ),
            ConditionKind::CredentialExpired => (
                "Session Expired",
                String::from("Your login is no longer valid. Please log in again."),
            ),
        };
        Notification {
            kind,
            title: title.to_string(),
            body,
        }
    }
}
