//! Runtime state for the activation pipeline
//!
//! Two small pieces of state sit behind locks:
//! - [`TriggerState`]: debounce bookkeeping for the hotkey trigger
//! - [`WindowVisibilityState`]: best-effort mirror of the OS window
//!
//! Activation moves Idle → Processing → Idle for every accepted trigger.

use std::fmt;
use std::time::{Duration, Instant};

/// Whether a trigger action is currently running
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivationState {
    /// Waiting for the next hotkey press
    Idle,

    /// A toggle is in flight; further presses are dropped
    Processing,
}

impl ActivationState {
    pub fn is_idle(&self) -> bool {
        matches!(self, ActivationState::Idle)
    }

    pub fn is_processing(&self) -> bool {
        matches!(self, ActivationState::Processing)
    }
}

impl fmt::Display for ActivationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActivationState::Idle => write!(f, "Idle"),
            ActivationState::Processing => write!(f, "Processing"),
        }
    }
}

/// Debounce bookkeeping owned by the trigger controller
#[derive(Debug, Clone)]
pub struct TriggerState {
    /// Monotonic timestamp of the last accepted trigger
    pub last_trigger_time: Option<Instant>,

    /// Triggers closer together than this are dropped
    pub min_interval: Duration,
}

impl TriggerState {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            last_trigger_time: None,
            min_interval,
        }
    }

    /// True when a trigger at `now` falls inside the debounce window
    pub fn is_debounced(&self, now: Instant) -> bool {
        match self.last_trigger_time {
            Some(last) => now.saturating_duration_since(last) < self.min_interval,
            None => false,
        }
    }
}

/// Visibility bookkeeping owned by the window manager
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WindowVisibilityState {
    /// Last known visibility. Re-synced from the OS after any failure.
    pub visible: bool,

    /// Close-button handler has been installed on the window
    pub close_handler_installed: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_activation_state_display() {
        assert_eq!(ActivationState::Idle.to_string(), "Idle");
        assert_eq!(ActivationState::Processing.to_string(), "Processing");
        assert!(ActivationState::Idle.is_idle());
        assert!(ActivationState::Processing.is_processing());
    }

    #[test]
    fn test_first_trigger_is_never_debounced() {
        let state = TriggerState::new(Duration::from_secs(10));
        assert!(!state.is_debounced(Instant::now()));
    }

    #[test]
    fn test_debounce_window() {
        let start = Instant::now();
        let mut state = TriggerState::new(Duration::from_millis(500));
        state.last_trigger_time = Some(start);

        assert!(state.is_debounced(start + Duration::from_millis(100)));
        assert!(state.is_debounced(start + Duration::from_millis(499)));
        assert!(!state.is_debounced(start + Duration::from_millis(500)));
        assert!(!state.is_debounced(start + Duration::from_millis(600)));
    }

    #[test]
    fn test_default_window_state() {
        let state = WindowVisibilityState::default();
        assert!(!state.visible);
        assert!(!state.close_handler_installed);
    }
}
