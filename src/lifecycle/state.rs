/// Visibility state of a lifecycle owner (screen, window, session).
///
/// Ordered: `Destroyed < Initialized < Created < Started < Resumed`, so
/// "at least started" reads as `state >= LifecycleState::Started`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LifecycleState {
    /// Terminal; no further transitions are accepted.
    Destroyed,
    /// Constructed, not yet created.
    Initialized,
    /// Created but not visible.
    Created,
    /// Visible.
    Started,
    /// Visible and focused.
    Resumed,
}

impl LifecycleState {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            LifecycleState::Destroyed => "destroyed",
            LifecycleState::Initialized => "initialized",
            LifecycleState::Created => "created",
            LifecycleState::Started => "started",
            LifecycleState::Resumed => "resumed",
        }
    }

    /// True if `self` is at least `min`.
    pub fn is_at_least(&self, min: LifecycleState) -> bool {
        *self >= min
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ordering() {
        assert!(LifecycleState::Resumed.is_at_least(LifecycleState::Started));
        assert!(LifecycleState::Started.is_at_least(LifecycleState::Started));
        assert!(!LifecycleState::Created.is_at_least(LifecycleState::Started));
        assert!(LifecycleState::Destroyed < LifecycleState::Initialized);
    }
}
