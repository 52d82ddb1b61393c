//! Hotkey matching on top of the global hook
//!
//! [`HotkeyMatcher`] tracks which modifiers are down and fires once per
//! press of the bound chord. Holding the chord (key auto-repeat) does not
//! fire again; the latch resets when the main key or the last physical key
//! of a bound modifier is released.
//!
//! [`HookHotkeyBackend`] installs a single hotkey-priority handler and
//! runs each fired callback on its own short-lived thread, so a slow toggle
//! never stalls the OS hook.

use super::combo::{HotkeyCombination, Modifier};
use super::hook::{HandlerId, HandlerPriority, HookDecision, KeyEventKind, KeyHandler, KeyboardHook, RawKeyEvent};
use super::keys::{modifier_for, resolve_key};
use super::{HotkeyBackend, HotkeyCallback};
use crate::error::HotkeyError;
use parking_lot::Mutex;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::thread;

/// Result of feeding one event to a matcher
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchResult {
    /// Chord completed: run the callback and swallow the key
    Fired,
    /// Part of an active chord (repeat or release of the main key): swallow
    Consumed,
    Ignored,
}

#[derive(Debug, Clone)]
pub struct HotkeyMatcher {
    combo: HotkeyCombination,
    /// Lowercased display name of the bound main key
    key: String,
    /// Physical modifier keys currently down
    held: HashMap<String, Modifier>,
    /// Physical main key that fired and has not been released yet
    fired: Option<String>,
}

impl HotkeyMatcher {
    pub fn new(combo: HotkeyCombination) -> Self {
        let key = combo.key().unwrap_or_default().to_lowercase();
        Self {
            combo,
            key,
            held: HashMap::new(),
            fired: None,
        }
    }

    pub fn combination(&self) -> &HotkeyCombination {
        &self.combo
    }

    fn held_modifiers(&self) -> BTreeSet<Modifier> {
        self.held.values().copied().collect()
    }

    pub fn on_event(&mut self, event: &RawKeyEvent) -> MatchResult {
        let id = event.physical_id();

        if let Some(modifier) = modifier_for(&event.name) {
            match event.kind {
                KeyEventKind::Down => {
                    self.held.insert(id, modifier);
                }
                KeyEventKind::Up => {
                    let released = self.held.remove(&id).unwrap_or(modifier);
                    let still_held = self.held.values().any(|held| *held == released);
                    if !still_held && self.combo.modifiers().contains(&released) {
                        self.fired = None;
                    }
                }
            }
            return MatchResult::Ignored;
        }

        match event.kind {
            KeyEventKind::Down => {
                if self.key.is_empty()
                    || resolve_key(&event.name, event.scancode).to_lowercase() != self.key
                    || self.held_modifiers() != *self.combo.modifiers()
                {
                    return MatchResult::Ignored;
                }
                if self.fired.is_some() {
                    MatchResult::Consumed
                } else {
                    self.fired = Some(id);
                    MatchResult::Fired
                }
            }
            KeyEventKind::Up => {
                if self.fired.as_deref() == Some(id.as_str()) {
                    self.fired = None;
                    MatchResult::Consumed
                } else {
                    MatchResult::Ignored
                }
            }
        }
    }
}

struct Binding {
    matcher: HotkeyMatcher,
    callback: HotkeyCallback,
}

/// [`HotkeyBackend`] backed by a [`KeyboardHook`]
pub struct HookHotkeyBackend {
    hook: Arc<dyn KeyboardHook>,
    bindings: Arc<Mutex<Vec<Binding>>>,
    handler: Mutex<Option<HandlerId>>,
}

impl HookHotkeyBackend {
    pub fn new(hook: Arc<dyn KeyboardHook>) -> Self {
        Self {
            hook,
            bindings: Arc::new(Mutex::new(Vec::new())),
            handler: Mutex::new(None),
        }
    }

    pub fn binding_count(&self) -> usize {
        self.bindings.lock().len()
    }

    fn ensure_handler(&self) -> Result<(), HotkeyError> {
        let mut handler = self.handler.lock();
        if handler.is_some() {
            return Ok(());
        }

        let bindings = Arc::clone(&self.bindings);
        let dispatch: KeyHandler = Arc::new(move |event| dispatch(&bindings, event));
        *handler = Some(self.hook.install(HandlerPriority::Hotkey, dispatch)?);
        Ok(())
    }

    fn remove_handler(&self) {
        if let Some(id) = self.handler.lock().take() {
            self.hook.uninstall(id);
        }
    }
}

fn dispatch(bindings: &Mutex<Vec<Binding>>, event: &RawKeyEvent) -> HookDecision {
    let mut fired = Vec::new();
    let mut decision = HookDecision::Pass;

    for binding in bindings.lock().iter_mut() {
        match binding.matcher.on_event(event) {
            MatchResult::Fired => {
                fired.push((binding.matcher.combination().to_storage(), Arc::clone(&binding.callback)));
                decision = HookDecision::Suppress;
            }
            MatchResult::Consumed => decision = HookDecision::Suppress,
            MatchResult::Ignored => {}
        }
    }

    for (combo, callback) in fired {
        tracing::debug!("Hotkey {} pressed", combo);
        let spawned = thread::Builder::new()
            .name("hotkey-callback".to_string())
            .spawn(move || callback());
        if let Err(e) = spawned {
            tracing::error!("Failed to run hotkey callback: {}", e);
        }
    }
    decision
}

impl HotkeyBackend for HookHotkeyBackend {
    fn bind(&self, combo: &HotkeyCombination, callback: HotkeyCallback) -> Result<(), HotkeyError> {
        if !combo.is_valid() {
            return Err(HotkeyError::MissingKey(combo.to_storage()));
        }
        self.ensure_handler()?;
        self.bindings.lock().push(Binding {
            matcher: HotkeyMatcher::new(combo.clone()),
            callback,
        });
        Ok(())
    }

    fn unbind(&self, combo: &HotkeyCombination) -> Result<bool, HotkeyError> {
        let mut bindings = self.bindings.lock();
        let before = bindings.len();
        bindings.retain(|binding| binding.matcher.combination() != combo);
        let removed = bindings.len() != before;
        let empty = bindings.is_empty();
        drop(bindings);

        if empty {
            self.remove_handler();
        }
        Ok(removed)
    }

    fn clear_all(&self) -> Result<(), HotkeyError> {
        self.bindings.lock().clear();
        self.remove_handler();
        Ok(())
    }
}
