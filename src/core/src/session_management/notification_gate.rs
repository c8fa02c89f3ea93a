use super::events::ConditionKind;
use crate::SessionState;

/// De-duplicates user notifications.
///
/// Remembers the last `(state, condition)` pair it let through and refuses an exact repeat, so
/// the same adverse snapshot arriving every poll produces a single alert. A healthy observation
/// ([`NotificationGate::clear`]) re-arms it.
#[derive(Debug)]
pub struct NotificationGate {
    last: Option<(SessionState, ConditionKind)>,
    enabled: bool,
}

impl NotificationGate {
    pub fn new(enabled: bool) -> Self {
        Self {
            last: None,
            enabled,
        }
    }

    /// Returns `true` when a notification for this pair should be emitted.
    ///
    /// The pair is recorded even when notifications are disabled.
    pub fn offer(&mut self, state: SessionState, kind: ConditionKind) -> bool {
        if self.last == Some((state, kind)) {
            return false;
        }
        self.last = Some((state, kind));
        self.enabled
    }

    /// Forgets the adverse condition so its next occurrence notifies again.
    pub fn clear(&mut self) {
        if matches!(
            self.last,
            Some((_, ConditionKind::Inactive)) | Some((_, ConditionKind::CredentialExpired))
        ) {
            self.last = None;
        }
    }

    pub fn reset(&mut self) {
        self.last = None;
    }
}
