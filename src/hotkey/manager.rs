//! Hotkey registration lifecycle
//!
//! The manager owns at most one active combination. Registration always
//! clears existing bindings first, so a re-register never leaves a stale
//! chord behind. Failures are logged and reported as `false`; nothing here
//! returns an error to the caller. Every operation that touches the backend
//! holds one registration lock, so a delayed registration cannot interleave
//! with a change or a resume.

use super::combo::{format_hotkey_for_display, HotkeyCombination};
use super::{HotkeyBackend, HotkeyCallback};
use crate::events::{AppEvent, EventBus};
use parking_lot::Mutex;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

#[derive(Clone)]
pub struct HotkeyManager {
    inner: Arc<Inner>,
}

struct Inner {
    backend: Arc<dyn HotkeyBackend>,
    bus: Arc<EventBus>,
    /// Held across clear, bind and the `current` update
    registration: Mutex<()>,
    current: Mutex<Option<HotkeyCombination>>,
    /// Last callback passed to `register`, reused by `resume` and `change`
    callback: Mutex<Option<HotkeyCallback>>,
    /// Combination set aside while a capture is running
    suspended: Mutex<Option<HotkeyCombination>>,
}

fn is_disabled(combo: Option<&str>) -> bool {
    combo
        .map(str::trim)
        .map_or(true, |s| s.is_empty() || s.eq_ignore_ascii_case("none"))
}

impl HotkeyManager {
    pub fn new(backend: Arc<dyn HotkeyBackend>, bus: Arc<EventBus>) -> Self {
        Self {
            inner: Arc::new(Inner {
                backend,
                bus,
                registration: Mutex::new(()),
                current: Mutex::new(None),
                callback: Mutex::new(None),
                suspended: Mutex::new(None),
            }),
        }
    }

    /// Clear all bindings, then bind `combo` to `callback`.
    ///
    /// `None`, `""` or `"None"` only clear. Returns true when the hotkey is
    /// live.
    pub fn register(&self, combo: Option<&str>, callback: HotkeyCallback) -> bool {
        let _registration = self.inner.registration.lock();
        self.register_locked(combo, callback)
    }

    fn register_locked(&self, combo: Option<&str>, callback: HotkeyCallback) -> bool {
        let inner = &self.inner;

        if let Err(e) = inner.backend.clear_all() {
            tracing::error!("Failed to clear existing hotkeys: {}", e);
            return false;
        }
        *inner.current.lock() = None;
        *inner.callback.lock() = Some(Arc::clone(&callback));

        if is_disabled(combo) {
            tracing::info!("Hotkey disabled");
            return false;
        }
        let text = combo.unwrap_or_default().trim();

        let parsed = match HotkeyCombination::parse(text) {
            Ok(parsed) if parsed.is_valid() => parsed,
            Ok(_) => {
                tracing::info!("Hotkey disabled");
                return false;
            }
            Err(e) => {
                tracing::error!("{}", e);
                return false;
            }
        };

        match inner.backend.bind(&parsed, callback) {
            Ok(()) => {
                let storage = parsed.to_storage();
                tracing::info!("Hotkey registered: {}", parsed.to_display());
                *inner.current.lock() = Some(parsed);
                inner.bus.emit(AppEvent::HotkeyRegistered { combo: storage });
                true
            }
            Err(e) => {
                tracing::error!("Failed to register hotkey '{}': {}", text, e);
                false
            }
        }
    }

    /// Set the callback used by `change` and `resume` without binding anything
    pub fn set_callback(&self, callback: HotkeyCallback) {
        *self.inner.callback.lock() = Some(callback);
    }

    /// Register after `delay` without blocking the caller.
    ///
    /// Runs on the current tokio runtime when there is one, otherwise on a
    /// plain thread.
    pub fn register_delayed(&self, combo: Option<String>, callback: HotkeyCallback, delay: Duration) {
        tracing::debug!(
            "Hotkey registration scheduled in {:.1}s",
            delay.as_secs_f64()
        );
        let manager = self.clone();

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    tokio::time::sleep(delay).await;
                    let result = tokio::task::spawn_blocking(move || {
                        manager.register(combo.as_deref(), callback)
                    })
                    .await;
                    match result {
                        Ok(true) => tracing::info!("Hotkey ready"),
                        Ok(false) => tracing::warn!("Hotkey not registered"),
                        Err(e) => tracing::error!("Hotkey registration task failed: {}", e),
                    }
                });
            }
            Err(_) => {
                let spawned = thread::Builder::new()
                    .name("hotkey-setup".to_string())
                    .spawn(move || {
                        thread::sleep(delay);
                        if !manager.register(combo.as_deref(), callback) {
                            tracing::warn!("Hotkey not registered");
                        }
                    });
                if let Err(e) = spawned {
                    tracing::error!("Failed to schedule hotkey registration: {}", e);
                }
            }
        }
    }

    /// Remove the active hotkey. Returns false when nothing was bound.
    pub fn unregister(&self) -> bool {
        let _registration = self.inner.registration.lock();
        self.unregister_locked()
    }

    fn unregister_locked(&self) -> bool {
        let Some(combo) = self.inner.current.lock().take() else {
            tracing::debug!("No hotkey to unregister");
            return false;
        };

        match self.inner.backend.unbind(&combo) {
            Ok(_) => {
                tracing::info!("Hotkey unregistered: {}", combo.to_display());
                true
            }
            Err(e) => {
                tracing::error!("Failed to unregister hotkey {}: {}", combo.to_display(), e);
                false
            }
        }
    }

    /// Drop every binding. Safe to call at any time, any number of times.
    pub fn cleanup(&self) {
        let _registration = self.inner.registration.lock();
        if let Err(e) = self.inner.backend.clear_all() {
            tracing::debug!("Hotkey cleanup: {}", e);
        }
        *self.inner.current.lock() = None;
        *self.inner.suspended.lock() = None;
        tracing::debug!("Hotkeys cleaned up");
    }

    /// Unbind the active hotkey for the duration of a capture
    pub fn suspend(&self) -> bool {
        let _registration = self.inner.registration.lock();
        let current = self.inner.current.lock().clone();
        let Some(combo) = current else {
            return false;
        };
        if self.unregister_locked() {
            *self.inner.suspended.lock() = Some(combo);
            true
        } else {
            false
        }
    }

    /// Rebind the hotkey set aside by [`suspend`](Self::suspend)
    pub fn resume(&self) -> bool {
        let _registration = self.inner.registration.lock();
        let Some(combo) = self.inner.suspended.lock().take() else {
            return false;
        };
        let Some(callback) = self.inner.callback.lock().clone() else {
            tracing::warn!("No hotkey callback to resume with");
            return false;
        };
        self.register_locked(Some(&combo.to_storage()), callback)
    }

    /// Replace the active hotkey, keeping the current callback.
    ///
    /// An unparseable combination is rejected before anything is unbound.
    /// Emits `HotkeyChanged` on success.
    pub fn change(&self, new: Option<&str>) -> bool {
        if !is_disabled(new) {
            match new.map(HotkeyCombination::parse) {
                Some(Ok(parsed)) if parsed.is_valid() => {}
                Some(Err(e)) => {
                    tracing::error!("{}", e);
                    return false;
                }
                _ => return false,
            }
        }

        let registration = self.inner.registration.lock();
        let Some(callback) = self.inner.callback.lock().clone() else {
            tracing::warn!("Hotkey change requested before any registration");
            return false;
        };

        let old = self.current_storage().or_else(|| {
            self.inner
                .suspended
                .lock()
                .as_ref()
                .map(HotkeyCombination::to_storage)
        });
        *self.inner.suspended.lock() = None;

        let registered = self.register_locked(new, callback);
        if !registered && !is_disabled(new) {
            return false;
        }

        let new = self.current_storage();
        drop(registration);
        tracing::info!(
            "Hotkey changed: {} -> {}",
            format_hotkey_for_display(old.as_deref()),
            format_hotkey_for_display(new.as_deref())
        );
        self.inner.bus.emit(AppEvent::HotkeyChanged { old, new });
        true
    }

    pub fn current(&self) -> Option<HotkeyCombination> {
        self.inner.current.lock().clone()
    }

    /// Active hotkey in storage format
    pub fn current_storage(&self) -> Option<String> {
        self.inner
            .current
            .lock()
            .as_ref()
            .map(HotkeyCombination::to_storage)
    }

    pub fn is_registered(&self) -> bool {
        self.inner.current.lock().is_some()
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Recording hotkey backend for tests

    use super::*;
    use crate::error::HotkeyError;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    /// Records calls; optionally fails or stalls `bind`
    #[derive(Default)]
    pub struct FakeBackend {
        pub bound: Mutex<Vec<String>>,
        pub clears: AtomicUsize,
        pub fail_bind: AtomicBool,
        pub bind_delay: Mutex<Option<Duration>>,
    }

    impl FakeBackend {
        pub fn is_bound(&self, storage: &str) -> bool {
            self.bound.lock().iter().any(|c| c == storage)
        }
    }

    impl HotkeyBackend for FakeBackend {
        fn bind(&self, combo: &HotkeyCombination, _callback: HotkeyCallback) -> Result<(), HotkeyError> {
            if self.fail_bind.load(Ordering::SeqCst) {
                return Err(HotkeyError::Registration("hook refused".to_string()));
            }
            let delay = *self.bind_delay.lock();
            if let Some(delay) = delay {
                thread::sleep(delay);
            }
            self.bound.lock().push(combo.to_storage());
            Ok(())
        }

        fn unbind(&self, combo: &HotkeyCombination) -> Result<bool, HotkeyError> {
            let mut bound = self.bound.lock();
            let before = bound.len();
            bound.retain(|c| *c != combo.to_storage());
            Ok(bound.len() != before)
        }

        fn clear_all(&self) -> Result<(), HotkeyError> {
            self.clears.fetch_add(1, Ordering::SeqCst);
            self.bound.lock().clear();
            Ok(())
        }
    }
}
