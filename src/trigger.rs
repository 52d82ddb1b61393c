//! Debounced, non-reentrant trigger
//!
//! A global hotkey can fire in bursts (key repeat, double taps, a hook
//! delivering the same chord twice). [`TriggerController::fire`] runs its
//! action at most once per `min_interval`, and never while a previous
//! action is still running. A concurrent call does not wait: it sees the
//! lock held and returns [`TriggerOutcome::Busy`] immediately.

use crate::events::panic_message;
use crate::state::{ActivationState, TriggerState};
use parking_lot::Mutex;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Monotonic time source
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// Real monotonic clock
#[derive(Debug, Default, Clone, Copy)]
pub struct MonotonicClock;

impl Clock for MonotonicClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Hand-driven clock for deterministic timing tests
#[derive(Debug)]
pub struct ManualClock {
    base: Instant,
    offset: Mutex<Duration>,
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            base: Instant::now(),
            offset: Mutex::new(Duration::ZERO),
        }
    }

    pub fn advance(&self, by: Duration) {
        *self.offset.lock() += by;
    }

    /// Jump to an absolute offset from the clock's origin
    pub fn set(&self, offset: Duration) {
        *self.offset.lock() = offset;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.base + *self.offset.lock()
    }
}

/// Result of a [`TriggerController::fire`] call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerOutcome {
    /// The action ran to completion
    Triggered,

    /// Dropped: too soon after the previous accepted trigger
    Debounced,

    /// Dropped: another action is still running
    Busy,

    /// The action ran and panicked; the panic was contained
    Failed,
}

impl TriggerOutcome {
    pub fn ran(&self) -> bool {
        matches!(self, TriggerOutcome::Triggered | TriggerOutcome::Failed)
    }
}

pub struct TriggerController {
    state: Mutex<TriggerState>,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for TriggerController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TriggerController")
            .field("state", &self.activation_state())
            .finish()
    }
}

impl TriggerController {
    pub fn new(min_interval: Duration) -> Self {
        Self::with_clock(min_interval, Arc::new(MonotonicClock))
    }

    pub fn with_clock(min_interval: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            state: Mutex::new(TriggerState::new(min_interval)),
            clock,
        }
    }

    /// Run `action` unless debounced or already busy.
    ///
    /// Never blocks on the lock. The lock is held for the whole action and
    /// released on every exit path, including a panic inside `action`.
    pub fn fire<F>(&self, action: F) -> TriggerOutcome
    where
        F: FnOnce(),
    {
        let Some(mut state) = self.state.try_lock() else {
            tracing::debug!("Trigger ignored: previous activation still processing");
            return TriggerOutcome::Busy;
        };

        let now = self.clock.now();
        if state.is_debounced(now) {
            tracing::debug!(
                "Trigger debounced ({:?} < {:?})",
                state
                    .last_trigger_time
                    .map(|last| now.saturating_duration_since(last))
                    .unwrap_or_default(),
                state.min_interval
            );
            return TriggerOutcome::Debounced;
        }
        state.last_trigger_time = Some(now);

        match catch_unwind(AssertUnwindSafe(action)) {
            Ok(()) => TriggerOutcome::Triggered,
            Err(panic) => {
                tracing::error!("Trigger action panicked: {}", panic_message(&*panic));
                TriggerOutcome::Failed
            }
        }
    }

    pub fn activation_state(&self) -> ActivationState {
        if self.state.is_locked() {
            ActivationState::Processing
        } else {
            ActivationState::Idle
        }
    }

    pub fn is_processing(&self) -> bool {
        self.activation_state().is_processing()
    }

    /// Timestamp of the last accepted trigger. Blocks while an action runs.
    pub fn last_trigger_time(&self) -> Option<Instant> {
        self.state.lock().last_trigger_time
    }

    pub fn min_interval(&self) -> Duration {
        self.state.lock().min_interval
    }

    pub fn set_min_interval(&self, min_interval: Duration) {
        self.state.lock().min_interval = min_interval;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::mpsc;
    use std::thread;

    fn controller(interval_ms: u64) -> (TriggerController, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new());
        let controller =
            TriggerController::with_clock(Duration::from_millis(interval_ms), clock.clone());
        (controller, clock)
    }

    #[test]
    fn test_burst_within_interval_runs_once() {
        let (trigger, clock) = controller(500);
        let runs = AtomicUsize::new(0);

        for _ in 0..20 {
            trigger.fire(|| {
                runs.fetch_add(1, Ordering::SeqCst);
            });
            clock.advance(Duration::from_millis(10));
        }

        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_fires_again_after_interval() {
        let (trigger, clock) = controller(500);
        assert_eq!(trigger.fire(|| {}), TriggerOutcome::Triggered);

        clock.set(Duration::from_millis(100));
        assert_eq!(trigger.fire(|| {}), TriggerOutcome::Debounced);

        clock.set(Duration::from_millis(600));
        assert_eq!(trigger.fire(|| {}), TriggerOutcome::Triggered);
    }

    #[test]
    fn test_debounced_fire_keeps_last_trigger_time() {
        let (trigger, clock) = controller(500);
        trigger.fire(|| {});
        let first = trigger.last_trigger_time();

        clock.advance(Duration::from_millis(200));
        trigger.fire(|| {});
        assert_eq!(trigger.last_trigger_time(), first);
    }

    #[test]
    fn test_reentrant_fire_is_busy_and_leaves_state_alone() {
        let (trigger, clock) = controller(0);
        let mut inner = None;

        let outcome = trigger.fire(|| {
            clock.advance(Duration::from_secs(5));
            inner = Some(trigger.fire(|| panic!("must not run")));
        });

        assert_eq!(outcome, TriggerOutcome::Triggered);
        assert_eq!(inner, Some(TriggerOutcome::Busy));
        // The busy call must not have replaced the outer timestamp
        assert_eq!(
            trigger.last_trigger_time(),
            Some(clock.now() - Duration::from_secs(5))
        );
    }

    #[test]
    fn test_concurrent_fire_returns_without_waiting() {
        let trigger = Arc::new(TriggerController::new(Duration::ZERO));
        let (started_tx, started_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel::<()>();

        let worker = {
            let trigger = Arc::clone(&trigger);
            thread::spawn(move || {
                trigger.fire(|| {
                    started_tx.send(()).unwrap();
                    release_rx.recv().unwrap();
                })
            })
        };

        started_rx.recv().unwrap();
        assert!(trigger.is_processing());
        assert_eq!(trigger.fire(|| {}), TriggerOutcome::Busy);

        release_tx.send(()).unwrap();
        assert_eq!(worker.join().unwrap(), TriggerOutcome::Triggered);
        assert_eq!(trigger.activation_state(), ActivationState::Idle);
    }

    #[test]
    fn test_panicking_action_releases_lock() {
        let (trigger, clock) = controller(100);
        assert_eq!(trigger.fire(|| panic!("toggle failed")), TriggerOutcome::Failed);
        assert!(!trigger.is_processing());

        clock.advance(Duration::from_millis(150));
        assert_eq!(trigger.fire(|| {}), TriggerOutcome::Triggered);
    }
}
