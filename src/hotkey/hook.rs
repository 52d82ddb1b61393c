//! Global keyboard hook
//!
//! One OS-level hook per process, shared by every consumer. Consumers
//! install handlers on a [`HookDispatcher`]; each key event is offered to
//! the handlers in priority order and the first one that asks for
//! suppression stops propagation (and, where the platform allows it, keeps
//! the key from reaching the focused application).
//!
//! The rdev hook thread cannot be stopped once started. Uninstalling the
//! last handler leaves it running but inert.

use crate::error::HotkeyError;
use crate::events::panic_message;
use parking_lot::Mutex;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use std::thread;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyEventKind {
    Down,
    Up,
}

/// Key event as reported by the OS hook, before normalization
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawKeyEvent {
    /// Loose key name ("left ctrl", "a", "page up", "numpad 0")
    pub name: String,
    /// Hardware scan code when it disambiguates the key
    pub scancode: Option<u32>,
    /// Physical key, identical on press and release. The name may differ
    /// between the two ("!" down, "1" up).
    pub key_id: Option<String>,
    pub kind: KeyEventKind,
}

impl RawKeyEvent {
    pub fn down(name: &str) -> Self {
        Self {
            name: name.to_string(),
            scancode: None,
            key_id: None,
            kind: KeyEventKind::Down,
        }
    }

    pub fn up(name: &str) -> Self {
        Self {
            name: name.to_string(),
            scancode: None,
            key_id: None,
            kind: KeyEventKind::Up,
        }
    }

    pub fn with_scancode(mut self, scancode: u32) -> Self {
        self.scancode = Some(scancode);
        self
    }

    pub fn with_key_id(mut self, key_id: &str) -> Self {
        self.key_id = Some(key_id.to_string());
        self
    }

    /// Identity used to pair a release with its press
    pub fn physical_id(&self) -> String {
        match (&self.key_id, self.scancode) {
            (Some(id), _) => id.clone(),
            (None, Some(code)) => format!("scancode {}", code),
            (None, None) => self.name.trim().to_lowercase(),
        }
    }

    pub fn is_down(&self) -> bool {
        self.kind == KeyEventKind::Down
    }
}

/// What a handler wants done with an event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookDecision {
    Pass,
    Suppress,
}

/// Dispatch order. Lower runs first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum HandlerPriority {
    /// Hotkey capture: consumes everything while active
    Capture,
    /// Registered hotkeys
    Hotkey,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId(u64);

pub type KeyHandler = Arc<dyn Fn(&RawKeyEvent) -> HookDecision + Send + Sync>;

/// Source of global key events
pub trait KeyboardHook: Send + Sync {
    /// Add a handler, starting the OS hook if needed
    fn install(
        &self,
        priority: HandlerPriority,
        handler: KeyHandler,
    ) -> Result<HandlerId, HotkeyError>;

    /// Remove a handler. Unknown ids are ignored.
    fn uninstall(&self, id: HandlerId) -> bool;

    /// Whether suppressed events are actually withheld from other apps
    fn can_suppress(&self) -> bool;
}

/// Ordered handler table shared with the hook thread
#[derive(Default)]
pub struct HookDispatcher {
    handlers: Mutex<Vec<(HandlerPriority, HandlerId, KeyHandler)>>,
    next_id: AtomicU64,
}

impl HookDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, priority: HandlerPriority, handler: KeyHandler) -> HandlerId {
        let id = HandlerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let mut handlers = self.handlers.lock();
        // Stable: equal priorities keep installation order
        let pos = handlers.partition_point(|(p, _, _)| *p <= priority);
        handlers.insert(pos, (priority, id, handler));
        id
    }

    pub fn remove(&self, id: HandlerId) -> bool {
        let mut handlers = self.handlers.lock();
        let before = handlers.len();
        handlers.retain(|(_, handler_id, _)| *handler_id != id);
        handlers.len() != before
    }

    pub fn len(&self) -> usize {
        self.handlers.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Offer an event to each handler until one suppresses it.
    /// Handlers run outside the table lock; a panicking handler counts as Pass.
    pub fn dispatch(&self, event: &RawKeyEvent) -> HookDecision {
        let snapshot: Vec<KeyHandler> = self
            .handlers
            .lock()
            .iter()
            .map(|(_, _, handler)| Arc::clone(handler))
            .collect();

        for handler in snapshot {
            match catch_unwind(AssertUnwindSafe(|| handler(event))) {
                Ok(HookDecision::Suppress) => return HookDecision::Suppress,
                Ok(HookDecision::Pass) => {}
                Err(panic) => {
                    tracing::error!("Key handler panicked: {}", panic_message(&*panic));
                }
            }
        }
        HookDecision::Pass
    }
}

/// In-process hook with no OS backing. Events are fed through
/// [`HookDispatcher::dispatch`].
impl KeyboardHook for HookDispatcher {
    fn install(
        &self,
        priority: HandlerPriority,
        handler: KeyHandler,
    ) -> Result<HandlerId, HotkeyError> {
        Ok(self.add(priority, handler))
    }

    fn uninstall(&self, id: HandlerId) -> bool {
        self.remove(id)
    }

    fn can_suppress(&self) -> bool {
        true
    }
}

/// Process-wide rdev hook
pub struct RdevHook {
    dispatcher: Arc<HookDispatcher>,
    running: Arc<AtomicBool>,
}

static GLOBAL_HOOK: OnceLock<Arc<RdevHook>> = OnceLock::new();

impl RdevHook {
    /// The shared hook. rdev supports a single hook per process.
    pub fn global() -> Arc<RdevHook> {
        Arc::clone(GLOBAL_HOOK.get_or_init(|| {
            Arc::new(RdevHook {
                dispatcher: Arc::new(HookDispatcher::new()),
                running: Arc::new(AtomicBool::new(false)),
            })
        }))
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    fn ensure_running(&self) -> Result<(), HotkeyError> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        let dispatcher = Arc::clone(&self.dispatcher);
        let running = Arc::clone(&self.running);
        let spawned = thread::Builder::new()
            .name("keyboard-hook".to_string())
            .spawn(move || {
                run_hook(dispatcher);
                running.store(false, Ordering::SeqCst);
            });

        if let Err(e) = spawned {
            self.running.store(false, Ordering::SeqCst);
            return Err(HotkeyError::Hook(format!("Failed to spawn hook thread: {}", e)));
        }
        tracing::debug!("Keyboard hook thread started");
        Ok(())
    }
}

impl KeyboardHook for RdevHook {
    fn install(
        &self,
        priority: HandlerPriority,
        handler: KeyHandler,
    ) -> Result<HandlerId, HotkeyError> {
        let id = self.dispatcher.add(priority, handler);
        if let Err(e) = self.ensure_running() {
            self.dispatcher.remove(id);
            return Err(e);
        }
        Ok(id)
    }

    fn uninstall(&self, id: HandlerId) -> bool {
        self.dispatcher.remove(id)
    }

    fn can_suppress(&self) -> bool {
        cfg!(not(target_os = "linux"))
    }
}

#[cfg(not(target_os = "linux"))]
fn run_hook(dispatcher: Arc<HookDispatcher>) {
    let result = rdev::grab(move |event| match to_raw_event(&event) {
        Some(raw) if dispatcher.dispatch(&raw) == HookDecision::Suppress => None,
        _ => Some(event),
    });
    if let Err(e) = result {
        tracing::error!(
            "Keyboard hook stopped: {:?}. On macOS, grant Accessibility permission.",
            e
        );
    }
}

#[cfg(target_os = "linux")]
fn run_hook(dispatcher: Arc<HookDispatcher>) {
    tracing::warn!("Key suppression is unavailable on Linux; hotkeys also reach the focused app");
    let result = rdev::listen(move |event| {
        if let Some(raw) = to_raw_event(&event) {
            dispatcher.dispatch(&raw);
        }
    });
    if let Err(e) = result {
        tracing::error!("Keyboard hook stopped: {:?}", e);
    }
}

fn to_raw_event(event: &rdev::Event) -> Option<RawKeyEvent> {
    let (key, kind) = match event.event_type {
        rdev::EventType::KeyPress(key) => (key, KeyEventKind::Down),
        rdev::EventType::KeyRelease(key) => (key, KeyEventKind::Up),
        _ => return None,
    };
    let (name, scancode) = describe_key(key, event.name.as_deref());
    Some(RawKeyEvent {
        name,
        scancode,
        key_id: Some(format!("{:?}", key)),
        kind,
    })
}

/// Layout-aware character for a key, when the OS reported a printable one
fn typed_char(typed: Option<&str>) -> Option<String> {
    let mut chars = typed?.chars();
    let c = chars.next()?;
    if chars.next().is_none() && !c.is_control() && !c.is_whitespace() {
        Some(c.to_lowercase().collect())
    } else {
        None
    }
}

/// Raw name and disambiguating scan code for an rdev key
fn describe_key(key: rdev::Key, typed: Option<&str>) -> (String, Option<u32>) {
    use rdev::Key;

    let fixed = |name: &str, scancode: Option<u32>| (name.to_string(), scancode);
    // Character keys follow the active layout when the OS tells us what was typed
    let character = |fallback: &str| (typed_char(typed).unwrap_or_else(|| fallback.to_string()), None);

    match key {
        Key::ControlLeft => fixed("left ctrl", None),
        Key::ControlRight => fixed("right ctrl", None),
        Key::ShiftLeft => fixed("left shift", None),
        Key::ShiftRight => fixed("right shift", None),
        Key::Alt => fixed("alt", None),
        Key::AltGr => fixed("alt gr", None),
        Key::MetaLeft => fixed("left windows", None),
        Key::MetaRight => fixed("right windows", None),

        Key::Kp0 => fixed("numpad 0", Some(82)),
        Key::Kp1 => fixed("numpad 1", Some(79)),
        Key::Kp2 => fixed("numpad 2", Some(80)),
        Key::Kp3 => fixed("numpad 3", Some(81)),
        Key::Kp4 => fixed("numpad 4", Some(75)),
        Key::Kp5 => fixed("numpad 5", Some(76)),
        Key::Kp6 => fixed("numpad 6", Some(77)),
        Key::Kp7 => fixed("numpad 7", Some(71)),
        Key::Kp8 => fixed("numpad 8", Some(72)),
        Key::Kp9 => fixed("numpad 9", Some(73)),
        Key::KpDelete => fixed("decimal", Some(83)),
        Key::KpDivide => fixed("divide", Some(53)),
        Key::KpMultiply => fixed("multiply", Some(55)),
        Key::KpMinus => fixed("subtract", Some(74)),
        Key::KpPlus => fixed("add", Some(78)),
        Key::KpReturn => fixed("enter", None),

        Key::F1 => fixed("f1", Some(59)),
        Key::F2 => fixed("f2", Some(60)),
        Key::F3 => fixed("f3", Some(61)),
        Key::F4 => fixed("f4", Some(62)),
        Key::F5 => fixed("f5", Some(63)),
        Key::F6 => fixed("f6", Some(64)),
        Key::F7 => fixed("f7", Some(65)),
        Key::F8 => fixed("f8", Some(66)),
        Key::F9 => fixed("f9", Some(67)),
        Key::F10 => fixed("f10", Some(68)),
        Key::F11 => fixed("f11", Some(87)),
        Key::F12 => fixed("f12", Some(88)),

        Key::Space => fixed("space", None),
        Key::Return => fixed("enter", None),
        Key::Escape => fixed("escape", None),
        Key::Tab => fixed("tab", None),
        Key::Backspace => fixed("backspace", None),
        Key::Delete => fixed("delete", None),
        Key::Insert => fixed("insert", None),
        Key::Home => fixed("home", None),
        Key::End => fixed("end", None),
        Key::PageUp => fixed("page up", None),
        Key::PageDown => fixed("page down", None),
        Key::UpArrow => fixed("up", None),
        Key::DownArrow => fixed("down", None),
        Key::LeftArrow => fixed("left", None),
        Key::RightArrow => fixed("right", None),
        Key::CapsLock => fixed("caps lock", None),
        Key::NumLock => fixed("num lock", None),
        Key::ScrollLock => fixed("scroll lock", None),
        Key::PrintScreen => fixed("print screen", None),
        Key::Pause => fixed("pause", None),
        Key::Function => fixed("fn", None),

        Key::Num0 => character("0"),
        Key::Num1 => character("1"),
        Key::Num2 => character("2"),
        Key::Num3 => character("3"),
        Key::Num4 => character("4"),
        Key::Num5 => character("5"),
        Key::Num6 => character("6"),
        Key::Num7 => character("7"),
        Key::Num8 => character("8"),
        Key::Num9 => character("9"),

        Key::KeyA => character("a"),
        Key::KeyB => character("b"),
        Key::KeyC => character("c"),
        Key::KeyD => character("d"),
        Key::KeyE => character("e"),
        Key::KeyF => character("f"),
        Key::KeyG => character("g"),
        Key::KeyH => character("h"),
        Key::KeyI => character("i"),
        Key::KeyJ => character("j"),
        Key::KeyK => character("k"),
        Key::KeyL => character("l"),
        Key::KeyM => character("m"),
        Key::KeyN => character("n"),
        Key::KeyO => character("o"),
        Key::KeyP => character("p"),
        Key::KeyQ => character("q"),
        Key::KeyR => character("r"),
        Key::KeyS => character("s"),
        Key::KeyT => character("t"),
        Key::KeyU => character("u"),
        Key::KeyV => character("v"),
        Key::KeyW => character("w"),
        Key::KeyX => character("x"),
        Key::KeyY => character("y"),
        Key::KeyZ => character("z"),

        Key::Minus => character("-"),
        Key::Equal => character("="),
        Key::LeftBracket => character("["),
        Key::RightBracket => character("]"),
        Key::SemiColon => character(";"),
        Key::Quote => character("'"),
        Key::BackSlash | Key::IntlBackslash => character("\\"),
        Key::Comma => character(","),
        Key::Dot => character("."),
        Key::Slash => character("/"),
        Key::BackQuote => character("`"),

        Key::Unknown(code) => character(format!("key {}", code).as_str()),
        #[allow(unreachable_patterns)]
        _ => character("unknown"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn counting(counter: &Arc<AtomicUsize>, decision: HookDecision) -> KeyHandler {
        let counter = Arc::clone(counter);
        Arc::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            decision
        })
    }

    #[test]
    fn test_capture_handlers_run_before_hotkeys() {
        let dispatcher = HookDispatcher::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        let log = Arc::clone(&order);
        dispatcher.add(
            HandlerPriority::Hotkey,
            Arc::new(move |_| {
                log.lock().push("hotkey");
                HookDecision::Pass
            }),
        );
        let log = Arc::clone(&order);
        dispatcher.add(
            HandlerPriority::Capture,
            Arc::new(move |_| {
                log.lock().push("capture");
                HookDecision::Pass
            }),
        );

        dispatcher.dispatch(&RawKeyEvent::down("a"));
        assert_eq!(*order.lock(), vec!["capture", "hotkey"]);
    }

    #[test]
    fn test_suppress_stops_propagation() {
        let dispatcher = HookDispatcher::new();
        let capture_calls = Arc::new(AtomicUsize::new(0));
        let hotkey_calls = Arc::new(AtomicUsize::new(0));

        dispatcher.add(HandlerPriority::Hotkey, counting(&hotkey_calls, HookDecision::Pass));
        let capture =
            dispatcher.add(HandlerPriority::Capture, counting(&capture_calls, HookDecision::Suppress));

        assert_eq!(dispatcher.dispatch(&RawKeyEvent::down("space")), HookDecision::Suppress);
        assert_eq!(capture_calls.load(Ordering::SeqCst), 1);
        assert_eq!(hotkey_calls.load(Ordering::SeqCst), 0);

        assert!(dispatcher.remove(capture));
        assert_eq!(dispatcher.dispatch(&RawKeyEvent::down("space")), HookDecision::Pass);
        assert_eq!(hotkey_calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_panicking_handler_passes() {
        let dispatcher = HookDispatcher::new();
        let calls = Arc::new(AtomicUsize::new(0));
        dispatcher.add(HandlerPriority::Capture, Arc::new(|_| panic!("bad handler")));
        dispatcher.add(HandlerPriority::Hotkey, counting(&calls, HookDecision::Pass));

        assert_eq!(dispatcher.dispatch(&RawKeyEvent::down("a")), HookDecision::Pass);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_remove_unknown_handler() {
        let dispatcher = HookDispatcher::new();
        let id = dispatcher.add(HandlerPriority::Hotkey, Arc::new(|_| HookDecision::Pass));
        assert!(dispatcher.remove(id));
        assert!(!dispatcher.remove(id));
        assert!(dispatcher.is_empty());
    }

    #[test]
    fn test_describe_numpad_keys_carry_scancodes() {
        assert_eq!(describe_key(rdev::Key::Kp0, Some("0")), ("numpad 0".to_string(), Some(82)));
        assert_eq!(describe_key(rdev::Key::F11, None), ("f11".to_string(), Some(87)));
    }

    #[test]
    fn test_describe_character_keys_follow_layout() {
        // AZERTY: the physical Q position types 'a'
        assert_eq!(describe_key(rdev::Key::KeyQ, Some("a")).0, "a");
        assert_eq!(describe_key(rdev::Key::KeyQ, Some("A")).0, "a");
        // Ctrl held: the OS reports a control character
        assert_eq!(describe_key(rdev::Key::KeyA, Some("\u{1}")).0, "a");
        assert_eq!(describe_key(rdev::Key::KeyA, None).0, "a");
    }

    #[test]
    fn test_press_and_release_share_physical_id() {
        let press = rdev::Event {
            time: std::time::SystemTime::now(),
            name: Some("!".to_string()),
            event_type: rdev::EventType::KeyPress(rdev::Key::Num1),
        };
        let release = rdev::Event {
            time: std::time::SystemTime::now(),
            name: None,
            event_type: rdev::EventType::KeyRelease(rdev::Key::Num1),
        };

        let down = to_raw_event(&press).unwrap();
        let up = to_raw_event(&release).unwrap();
        assert_eq!(down.name, "!");
        assert_eq!(up.name, "1");
        assert_eq!(down.physical_id(), up.physical_id());
    }
}
