/// Capture session state machine.
///
/// State transitions:
/// ```text
/// idle → starting → active ⟲ (live reconfiguration)
///   ↑        │         │
///   └────────┴─────────┘  (failure / stop)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CaptureState {
    #[default]
    Idle,
    Starting,
    Active,
}

impl CaptureState {
    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }

    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active)
    }
}

/// What `ensure_started` has to do for a given state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartPlan {
    /// Create a new backend session and start it.
    Fresh,
    /// Push a new configuration to the running session.
    Reconfigure,
}

impl StartPlan {
    /// `None` while a start is already in flight.
    pub fn for_state(state: CaptureState) -> Option<Self> {
        match state {
            CaptureState::Idle => Some(Self::Fresh),
            CaptureState::Active => Some(Self::Reconfigure),
            CaptureState::Starting => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plan_follows_state() {
        assert_eq!(StartPlan::for_state(CaptureState::Idle), Some(StartPlan::Fresh));
        assert_eq!(StartPlan::for_state(CaptureState::Active), Some(StartPlan::Reconfigure));
        assert_eq!(StartPlan::for_state(CaptureState::Starting), None);
    }

    #[test]
    fn starts_idle() {
        assert!(CaptureState::default().is_idle());
        assert!(!CaptureState::Starting.is_active());
    }
}
