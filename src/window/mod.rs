//! Window visibility
//!
//! [`WindowManager`] shows, hides and toggles the main window through a
//! [`WindowBackend`], keeping a best-effort `visible` flag and announcing
//! every transition on the event bus:
//!
//! ```text
//! show:  WindowPreShow → visible + front + focus → WindowShown
//! hide:  invisible → WindowHidden
//! ```
//!
//! `WindowPreShow` listeners run before the window takes focus, which is
//! what lets selection capture copy from the previous foreground app.

pub mod tao_backend;

use crate::error::UiError;
use crate::events::{AppEvent, EventBus};
use crate::state::WindowVisibilityState;
use crate::trigger::{TriggerController, TriggerOutcome};
use parking_lot::{Mutex, RwLock};
use std::sync::{Arc, Weak};
use std::thread;

/// Called when the user clicks the window's close button
pub type CloseHandler = Arc<dyn Fn() + Send + Sync>;

/// Native window operations
pub trait WindowBackend: Send + Sync {
    fn set_visible(&self, visible: bool) -> Result<(), UiError>;

    fn bring_to_front(&self) -> Result<(), UiError>;

    fn focus(&self) -> Result<(), UiError>;

    fn set_always_on_top(&self, on_top: bool) -> Result<(), UiError>;

    /// Visibility as the OS reports it
    fn is_visible(&self) -> Result<bool, UiError>;

    fn is_minimized(&self) -> Result<bool, UiError> {
        Ok(false)
    }

    /// Un-minimize
    fn restore(&self) -> Result<(), UiError>;

    /// Replace the close button behavior. The handler must not block.
    fn install_close_handler(&self, handler: CloseHandler) -> Result<(), UiError>;
}

#[derive(Clone)]
pub struct WindowManager {
    inner: Arc<Inner>,
}

struct Inner {
    window: RwLock<Option<Arc<dyn WindowBackend>>>,
    state: Mutex<WindowVisibilityState>,
    bus: Arc<EventBus>,
    trigger: TriggerController,
}

impl WindowManager {
    pub fn new(bus: Arc<EventBus>, trigger: TriggerController) -> Self {
        Self {
            inner: Arc::new(Inner {
                window: RwLock::new(None),
                state: Mutex::new(WindowVisibilityState::default()),
                bus,
                trigger,
            }),
        }
    }

    /// Attach the native window. `visible` is its current state.
    pub fn attach(&self, window: Arc<dyn WindowBackend>, visible: bool) {
        *self.inner.window.write() = Some(window);
        let mut state = self.inner.state.lock();
        state.visible = visible;
        state.close_handler_installed = false;
    }

    fn window(&self) -> Option<Arc<dyn WindowBackend>> {
        let window = self.inner.window.read().clone();
        if window.is_none() {
            tracing::warn!("No window attached yet");
        }
        window
    }

    pub fn trigger(&self) -> &TriggerController {
        &self.inner.trigger
    }

    pub fn is_visible(&self) -> bool {
        self.inner.state.lock().visible
    }

    /// Debounced toggle, safe to call from any thread at any rate
    pub fn toggle(&self) -> TriggerOutcome {
        self.inner.trigger.fire(|| self.toggle_now())
    }

    /// Toggle without debouncing. A minimized window is restored, not hidden.
    pub fn toggle_now(&self) {
        if !self.is_visible() {
            self.show();
            return;
        }

        let Some(window) = self.window() else {
            return;
        };
        match window.is_minimized() {
            Ok(true) => {
                tracing::debug!("Window minimized, restoring");
                let restored = window
                    .restore()
                    .and_then(|()| window.bring_to_front())
                    .and_then(|()| window.focus());
                if let Err(e) = restored {
                    tracing::error!("Failed to restore window: {}", e);
                    self.resync(window.as_ref());
                }
            }
            Ok(false) => {
                self.hide();
            }
            Err(e) => {
                tracing::debug!("Could not query minimized state: {}", e);
                self.hide();
            }
        }
    }

    /// Show, raise and focus the window. Returns false on failure.
    pub fn show(&self) -> bool {
        let Some(window) = self.window() else {
            return false;
        };

        // Listeners run before focus moves to us
        self.inner.bus.emit(AppEvent::WindowPreShow);

        match present(window.as_ref()) {
            Ok(()) => {
                self.inner.state.lock().visible = true;
                tracing::debug!("Window shown");
                self.inner.bus.emit(AppEvent::WindowShown);
                self.ensure_close_handler(window.as_ref());
                true
            }
            Err(e) => {
                tracing::error!("Failed to show window: {}", e);
                self.resync(window.as_ref());
                false
            }
        }
    }

    pub fn hide(&self) -> bool {
        let Some(window) = self.window() else {
            return false;
        };

        match window.set_visible(false) {
            Ok(()) => {
                self.inner.state.lock().visible = false;
                tracing::debug!("Window hidden");
                self.inner.bus.emit(AppEvent::WindowHidden);
                true
            }
            Err(e) => {
                tracing::error!("Failed to hide window: {}", e);
                self.resync(window.as_ref());
                false
            }
        }
    }

    /// Re-read visibility from the OS after a failed transition
    fn resync(&self, window: &dyn WindowBackend) {
        match window.is_visible() {
            Ok(visible) => {
                self.inner.state.lock().visible = visible;
                tracing::debug!("Window visibility re-synced: {}", visible);
            }
            Err(e) => tracing::warn!("Could not re-sync window visibility: {}", e),
        }
    }

    /// Route the close button to `hide`. Installed once per attached window.
    fn ensure_close_handler(&self, window: &dyn WindowBackend) {
        {
            let mut state = self.inner.state.lock();
            if state.close_handler_installed {
                return;
            }
            state.close_handler_installed = true;
        }

        let weak: Weak<Inner> = Arc::downgrade(&self.inner);
        let handler: CloseHandler = Arc::new(move || {
            let Some(inner) = weak.upgrade() else {
                return;
            };
            let manager = WindowManager { inner };
            // Hiding from the UI thread would wait on the UI thread
            let spawned = thread::Builder::new()
                .name("window-close".to_string())
                .spawn(move || {
                    manager.hide();
                });
            if let Err(e) = spawned {
                tracing::error!("Failed to handle window close: {}", e);
            }
        });

        match window.install_close_handler(handler) {
            Ok(()) => tracing::debug!("Close handler installed"),
            Err(e) => {
                tracing::warn!("Failed to install close handler: {}", e);
                self.inner.state.lock().close_handler_installed = false;
            }
        }
    }
}

/// Make the window visible and move it in front of the foreground app.
/// Always-on-top is held only for the duration of the raise.
fn present(window: &dyn WindowBackend) -> Result<(), UiError> {
    let pinned = match window.set_always_on_top(true) {
        Ok(()) => true,
        Err(e) => {
            tracing::debug!("Could not pin window on top: {}", e);
            false
        }
    };

    let result = window
        .set_visible(true)
        .and_then(|()| window.bring_to_front())
        .and_then(|()| window.focus());

    if pinned {
        if let Err(e) = window.set_always_on_top(false) {
            tracing::debug!("Could not unpin window: {}", e);
        }
    }
    result
}
