//! Interactive hotkey capture
//!
//! A [`HotkeyCaptureSession`] turns a stream of raw key events into a
//! combination, reporting a live preview after every key-down. Modifier-only
//! chords show up in the preview but never become the final result.
//!
//! [`GlobalCapture`] wires a session to the global hook at capture priority,
//! so every key is consumed while the user is choosing a new hotkey.

use super::combo::{HotkeyCombination, Modifier};
use super::hook::{HandlerId, HandlerPriority, HookDecision, KeyEventKind, KeyHandler, KeyboardHook, RawKeyEvent};
use super::keys::{modifier_for, resolve_key};
use crate::error::HotkeyError;
use parking_lot::Mutex;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

/// Receives the display form of the combination after each key-down
pub type PreviewCallback = Arc<dyn Fn(&str) + Send + Sync>;

/// What the user decided at the end of a capture
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureOutcome {
    /// Use this combination
    Save(HotkeyCombination),
    /// Remove the hotkey entirely
    Disable,
    /// Keep the previous hotkey
    Cancel,
}

#[derive(Default)]
pub struct HotkeyCaptureSession {
    modifiers: BTreeSet<Modifier>,
    main_key: Option<String>,
    /// Physical keys currently down, with the modifier each one is
    held: HashMap<String, Option<Modifier>>,
    /// Last combination seen with a main key
    candidate: Option<HotkeyCombination>,
    capturing: bool,
    on_update: Option<PreviewCallback>,
}

impl std::fmt::Debug for HotkeyCaptureSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HotkeyCaptureSession")
            .field("current", &self.current().to_display())
            .field("capturing", &self.capturing)
            .finish()
    }
}

impl HotkeyCaptureSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Begin a capture. A running capture is stopped and discarded first.
    ///
    /// `on_update` runs on the hook thread and must not call back into the
    /// session.
    pub fn start(&mut self, on_update: Option<PreviewCallback>) {
        if self.capturing {
            tracing::warn!("Hotkey capture already running, restarting");
            self.stop();
        }
        self.modifiers.clear();
        self.main_key = None;
        self.held.clear();
        self.candidate = None;
        self.on_update = on_update;
        self.capturing = true;
        tracing::debug!("Hotkey capture started");
    }

    pub fn on_key_event(&mut self, event: &RawKeyEvent) {
        if !self.capturing {
            return;
        }
        let id = event.physical_id();

        match event.kind {
            KeyEventKind::Down => {
                // Auto-repeat
                if self.held.contains_key(&id) {
                    return;
                }
                let modifier = modifier_for(&event.name);
                self.held.insert(id, modifier);
                match modifier {
                    Some(modifier) => {
                        self.modifiers.insert(modifier);
                    }
                    None => self.main_key = Some(resolve_key(&event.name, event.scancode)),
                }

                let current = self.current();
                if current.is_valid() {
                    self.candidate = Some(current.clone());
                }
                if let Some(on_update) = &self.on_update {
                    on_update(&current.to_display());
                }
            }
            KeyEventKind::Up => {
                if let Some(Some(modifier)) = self.held.remove(&id) {
                    // The other side's key may still be down
                    let still_held = self.held.values().any(|held| *held == Some(modifier));
                    if !still_held {
                        self.modifiers.remove(&modifier);
                    }
                }
            }
        }
    }

    /// End the capture and return the final combination in storage format,
    /// or `""` when no main key was pressed.
    pub fn stop(&mut self) -> String {
        self.capturing = false;
        self.on_update = None;
        self.held.clear();
        let result = self
            .candidate
            .take()
            .map(|combo| combo.to_storage())
            .unwrap_or_default();
        tracing::debug!("Hotkey capture stopped: {:?}", result);
        result
    }

    /// Combination as currently held (may be modifier-only)
    pub fn current(&self) -> HotkeyCombination {
        HotkeyCombination::new(self.modifiers.iter().copied(), self.main_key.as_deref())
    }

    pub fn current_hotkey(&self) -> String {
        self.current().to_storage()
    }

    pub fn display_hotkey(&self) -> String {
        self.current().to_display()
    }

    pub fn is_capturing(&self) -> bool {
        self.capturing
    }
}

/// A capture session attached to a keyboard hook
pub struct GlobalCapture {
    hook: Arc<dyn KeyboardHook>,
    handler: Option<HandlerId>,
    session: Arc<Mutex<HotkeyCaptureSession>>,
}

impl GlobalCapture {
    /// Start capturing. Every key event is consumed until [`stop`](Self::stop).
    pub fn start(
        hook: Arc<dyn KeyboardHook>,
        on_update: Option<PreviewCallback>,
    ) -> Result<Self, HotkeyError> {
        let session = Arc::new(Mutex::new(HotkeyCaptureSession::new()));
        session.lock().start(on_update);

        let handler_session = Arc::clone(&session);
        let handler: KeyHandler = Arc::new(move |event| {
            handler_session.lock().on_key_event(event);
            HookDecision::Suppress
        });
        let handler = hook.install(HandlerPriority::Capture, handler)?;

        if !hook.can_suppress() {
            tracing::warn!("Keys pressed during capture will also reach the focused application");
        }

        Ok(Self {
            hook,
            handler: Some(handler),
            session,
        })
    }

    pub fn display_hotkey(&self) -> String {
        self.session.lock().display_hotkey()
    }

    /// Detach from the hook and return the captured combination
    pub fn stop(&mut self) -> String {
        if let Some(handler) = self.handler.take() {
            self.hook.uninstall(handler);
        }
        self.session.lock().stop()
    }
}

impl Drop for GlobalCapture {
    fn drop(&mut self) {
        if let Some(handler) = self.handler.take() {
            self.hook.uninstall(handler);
        }
    }
}
