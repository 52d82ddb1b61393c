//! In-process publish/subscribe bus
//!
//! Decouples the window manager, hotkey manager and input capture from
//! whatever UI sits on top. Events are a closed enum; subscription is by
//! [`EventKind`]. Listeners run synchronously on the emitting thread, in
//! subscription order, outside the registry lock. A panicking listener is
//! logged and does not stop delivery to the others.

use parking_lot::Mutex;
use serde::Serialize;
use serde_json::{Map, Value};
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Discriminant used to subscribe to an [`AppEvent`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    WindowPreShow,
    WindowShown,
    WindowHidden,
    HotkeyRegistered,
    HotkeyChanged,
    HotkeyCaptured,
    LanguageChanged,
    InputSourceDetected,
}

impl EventKind {
    pub const ALL: [EventKind; 8] = [
        EventKind::WindowPreShow,
        EventKind::WindowShown,
        EventKind::WindowHidden,
        EventKind::HotkeyRegistered,
        EventKind::HotkeyChanged,
        EventKind::HotkeyCaptured,
        EventKind::LanguageChanged,
        EventKind::InputSourceDetected,
    ];

    /// Wire name of the event
    pub fn name(self) -> &'static str {
        match self {
            EventKind::WindowPreShow => "window_pre_show",
            EventKind::WindowShown => "window_shown",
            EventKind::WindowHidden => "window_hidden",
            EventKind::HotkeyRegistered => "hotkey_registered",
            EventKind::HotkeyChanged => "hotkey_changed",
            EventKind::HotkeyCaptured => "hotkey_captured",
            EventKind::LanguageChanged => "language_changed",
            EventKind::InputSourceDetected => "input_source_detected",
        }
    }

    /// Look up an event by exact wire name
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Application event with its payload
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum AppEvent {
    /// Window is about to be shown; focus has not moved yet
    WindowPreShow,
    WindowShown,
    WindowHidden,
    HotkeyRegistered {
        combo: String,
    },
    HotkeyChanged {
        old: Option<String>,
        new: Option<String>,
    },
    HotkeyCaptured {
        combo: String,
    },
    LanguageChanged {
        language: String,
    },
    InputSourceDetected {
        has_selection: bool,
        has_clipboard: bool,
    },
}

impl AppEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            AppEvent::WindowPreShow => EventKind::WindowPreShow,
            AppEvent::WindowShown => EventKind::WindowShown,
            AppEvent::WindowHidden => EventKind::WindowHidden,
            AppEvent::HotkeyRegistered { .. } => EventKind::HotkeyRegistered,
            AppEvent::HotkeyChanged { .. } => EventKind::HotkeyChanged,
            AppEvent::HotkeyCaptured { .. } => EventKind::HotkeyCaptured,
            AppEvent::LanguageChanged { .. } => EventKind::LanguageChanged,
            AppEvent::InputSourceDetected { .. } => EventKind::InputSourceDetected,
        }
    }

    pub fn name(&self) -> &'static str {
        self.kind().name()
    }

    /// Keyword payload as a JSON object, or None for payload-less events
    pub fn payload(&self) -> Option<Map<String, Value>> {
        match serde_json::to_value(self) {
            Ok(Value::Object(mut tagged)) => match tagged.remove("data") {
                Some(Value::Object(data)) => Some(data),
                _ => None,
            },
            _ => None,
        }
    }
}

/// Handle returned by [`EventBus::subscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

pub type Listener = Arc<dyn Fn(&AppEvent) + Send + Sync>;

#[derive(Default)]
pub struct EventBus {
    listeners: Mutex<HashMap<EventKind, Vec<(SubscriptionId, Listener)>>>,
    next_id: AtomicU64,
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let listeners = self.listeners.lock();
        f.debug_struct("EventBus")
            .field("kinds", &listeners.len())
            .field("listeners", &listeners.values().map(Vec::len).sum::<usize>())
            .finish()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<F>(&self, kind: EventKind, listener: F) -> SubscriptionId
    where
        F: Fn(&AppEvent) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners
            .lock()
            .entry(kind)
            .or_default()
            .push((id, Arc::new(listener)));
        tracing::trace!("Subscribed {:?} to {}", id, kind);
        id
    }

    /// Remove a listener. Unknown ids are ignored.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut listeners = self.listeners.lock();
        for entries in listeners.values_mut() {
            if let Some(pos) = entries.iter().position(|(entry_id, _)| *entry_id == id) {
                entries.remove(pos);
                return true;
            }
        }
        false
    }

    /// Deliver an event to every listener of its kind.
    /// Returns the number of listeners that completed without panicking.
    pub fn emit(&self, event: AppEvent) -> usize {
        let kind = event.kind();
        let snapshot: Vec<Listener> = match self.listeners.lock().get(&kind) {
            Some(entries) => entries.iter().map(|(_, l)| Arc::clone(l)).collect(),
            None => Vec::new(),
        };

        tracing::debug!("Emitting {} to {} listener(s)", kind, snapshot.len());

        let mut delivered = 0;
        for listener in snapshot {
            match catch_unwind(AssertUnwindSafe(|| listener(&event))) {
                Ok(()) => delivered += 1,
                Err(panic) => {
                    tracing::error!("Listener for {} panicked: {}", kind, panic_message(&*panic))
                }
            }
        }
        delivered
    }

    /// Drop all listeners of one kind
    pub fn clear(&self, kind: EventKind) {
        self.listeners.lock().remove(&kind);
    }

    pub fn clear_all(&self) {
        self.listeners.lock().clear();
    }

    pub fn listener_count(&self, kind: EventKind) -> usize {
        self.listeners.lock().get(&kind).map_or(0, Vec::len)
    }
}

/// Best-effort text of a caught panic payload
pub(crate) fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_listeners_run_in_subscription_order() {
        let bus = EventBus::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        for i in 0..3 {
            let order = Arc::clone(&order);
            bus.subscribe(EventKind::WindowShown, move |_| order.lock().push(i));
        }

        assert_eq!(bus.emit(AppEvent::WindowShown), 3);
        assert_eq!(*order.lock(), vec![0, 1, 2]);
    }

    #[test]
    fn test_panicking_listener_does_not_stop_delivery() {
        let bus = EventBus::new();
        let calls = Arc::new(AtomicUsize::new(0));

        bus.subscribe(EventKind::WindowPreShow, |_| panic!("listener failure"));
        let counter = Arc::clone(&calls);
        bus.subscribe(EventKind::WindowPreShow, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(bus.emit(AppEvent::WindowPreShow), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_events_only_reach_their_kind() {
        let bus = EventBus::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        bus.subscribe(EventKind::WindowHidden, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(bus.emit(AppEvent::WindowShown), 0);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(bus.emit(AppEvent::WindowHidden), 1);
    }

    #[test]
    fn test_unsubscribe_and_clear() {
        let bus = EventBus::new();
        let id = bus.subscribe(EventKind::LanguageChanged, |_| {});
        bus.subscribe(EventKind::LanguageChanged, |_| {});
        assert_eq!(bus.listener_count(EventKind::LanguageChanged), 2);

        assert!(bus.unsubscribe(id));
        assert!(!bus.unsubscribe(id));
        assert_eq!(bus.listener_count(EventKind::LanguageChanged), 1);

        bus.clear(EventKind::LanguageChanged);
        assert_eq!(bus.listener_count(EventKind::LanguageChanged), 0);
    }

    #[test]
    fn test_listener_may_subscribe_during_emit() {
        let bus = Arc::new(EventBus::new());
        let inner = Arc::clone(&bus);
        bus.subscribe(EventKind::WindowShown, move |_| {
            inner.subscribe(EventKind::WindowHidden, |_| {});
        });

        assert_eq!(bus.emit(AppEvent::WindowShown), 1);
        assert_eq!(bus.listener_count(EventKind::WindowHidden), 1);
    }

    #[test]
    fn test_payload() {
        let event = AppEvent::HotkeyChanged {
            old: Some("ctrl+space".to_string()),
            new: None,
        };
        let payload = event.payload().unwrap();
        assert_eq!(payload["old"], "ctrl+space");
        assert_eq!(payload["new"], Value::Null);
        assert_eq!(event.name(), "hotkey_changed");

        assert_eq!(AppEvent::WindowPreShow.payload(), None);
    }

    #[test]
    fn test_kind_names_round_trip() {
        for kind in EventKind::ALL {
            assert_eq!(EventKind::from_name(kind.name()), Some(kind));
        }
        assert_eq!(EventKind::from_name("WINDOW_SHOWN"), None);
    }
}
