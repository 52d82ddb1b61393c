//! End-to-end tests of the activation pipeline with in-memory OS backends

use parking_lot::Mutex;
use std::sync::mpsc;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use writing_assistant::attachments::{SourceType, CLIPBOARD_TEXT_ID, SELECTION_TEXT_ID};
use writing_assistant::error::{InputError, UiError};
use writing_assistant::hotkey::{HookDispatcher, HookHotkeyBackend, HotkeyCombination, RawKeyEvent};
use writing_assistant::input::{ClipboardImage, ClipboardProvider, CopyKeystroke, InputSourceService, SelectionOptions};
use writing_assistant::trigger::ManualClock;
use writing_assistant::window::{CloseHandler, WindowBackend};
use writing_assistant::{App, AppEvent, ConfigStore, EventBus, EventKind, TriggerController, TriggerOutcome};

/// Shared log of everything the fakes were asked to do, in order
type Journal = Arc<Mutex<Vec<String>>>;

struct JournalWindow {
    journal: Journal,
    visible: Mutex<bool>,
    close_handlers: Mutex<Vec<CloseHandler>>,
}

impl JournalWindow {
    fn new(journal: &Journal) -> Arc<Self> {
        Arc::new(Self {
            journal: Arc::clone(journal),
            visible: Mutex::new(false),
            close_handlers: Mutex::new(Vec::new()),
        })
    }

    fn log(&self, entry: &str) {
        self.journal.lock().push(format!("window:{}", entry));
    }

    fn click_close(&self) {
        let handlers = self.close_handlers.lock().clone();
        for handler in handlers {
            handler();
        }
    }
}

impl WindowBackend for JournalWindow {
    fn set_visible(&self, visible: bool) -> Result<(), UiError> {
        self.log(if visible { "show" } else { "hide" });
        *self.visible.lock() = visible;
        Ok(())
    }

    fn bring_to_front(&self) -> Result<(), UiError> {
        self.log("front");
        Ok(())
    }

    fn focus(&self) -> Result<(), UiError> {
        self.log("focus");
        Ok(())
    }

    fn set_always_on_top(&self, _on_top: bool) -> Result<(), UiError> {
        Ok(())
    }

    fn is_visible(&self) -> Result<bool, UiError> {
        Ok(*self.visible.lock())
    }

    fn restore(&self) -> Result<(), UiError> {
        self.log("restore");
        Ok(())
    }

    fn install_close_handler(&self, handler: CloseHandler) -> Result<(), UiError> {
        self.log("install_close");
        self.close_handlers.lock().push(handler);
        Ok(())
    }
}

/// Clipboard whose "copy" places the current selection on it
struct JournalClipboard {
    journal: Journal,
    text: Mutex<Option<String>>,
    selection: Mutex<Option<String>>,
}

impl JournalClipboard {
    fn new(journal: &Journal, text: Option<&str>, selection: Option<&str>) -> Arc<Self> {
        Arc::new(Self {
            journal: Arc::clone(journal),
            text: Mutex::new(text.map(str::to_string)),
            selection: Mutex::new(selection.map(str::to_string)),
        })
    }

    fn text(&self) -> Option<String> {
        self.text.lock().clone()
    }
}

impl ClipboardProvider for JournalClipboard {
    fn get_text(&self) -> Result<Option<String>, InputError> {
        Ok(self.text.lock().clone())
    }

    fn set_text(&self, text: &str) -> Result<(), InputError> {
        self.journal.lock().push(format!("clipboard:set:{}", text));
        *self.text.lock() = Some(text.to_string());
        Ok(())
    }

    fn get_image(&self) -> Result<Option<ClipboardImage>, InputError> {
        Ok(None)
    }

    fn set_image(&self, _image: &ClipboardImage) -> Result<(), InputError> {
        Ok(())
    }

    fn clear(&self) -> Result<(), InputError> {
        self.journal.lock().push("clipboard:clear".to_string());
        *self.text.lock() = None;
        Ok(())
    }
}

struct JournalCopy {
    clipboard: Arc<JournalClipboard>,
}

impl CopyKeystroke for JournalCopy {
    fn send_copy(&self, _key_delay: Duration) -> Result<(), InputError> {
        self.clipboard.journal.lock().push("keys:ctrl+c".to_string());
        let selection = self.clipboard.selection.lock().clone();
        if let Some(text) = selection {
            *self.clipboard.text.lock() = Some(text);
        }
        Ok(())
    }
}

struct Harness {
    app: App,
    clock: Arc<ManualClock>,
    journal: Journal,
    window: Arc<JournalWindow>,
    clipboard: Arc<JournalClipboard>,
    hook: Arc<HookDispatcher>,
    events: Arc<Mutex<Vec<AppEvent>>>,
    _dir: TempDir,
}

fn harness(clipboard_text: Option<&str>, selection: Option<&str>) -> Harness {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(ConfigStore::open(Some(&dir.path().join("config.json"))).unwrap());

    let journal: Journal = Arc::new(Mutex::new(Vec::new()));
    let clipboard = JournalClipboard::new(&journal, clipboard_text, selection);
    let copy = Arc::new(JournalCopy {
        clipboard: Arc::clone(&clipboard),
    });
    let input = InputSourceService::new(clipboard.clone(), copy)
        .with_selection_capture(true)
        .with_options(SelectionOptions::immediate(2));

    let hook = Arc::new(HookDispatcher::new());
    let backend = Arc::new(HookHotkeyBackend::new(hook.clone()));

    let clock = Arc::new(ManualClock::new());
    let trigger = TriggerController::with_clock(Duration::from_millis(500), clock.clone());

    let bus = Arc::new(EventBus::new());
    let events = Arc::new(Mutex::new(Vec::new()));
    for kind in EventKind::ALL {
        let sink = Arc::clone(&events);
        bus.subscribe(kind, move |event| sink.lock().push(event.clone()));
    }

    let app = App::with_trigger(store, bus, backend, input, trigger);
    let window = JournalWindow::new(&journal);
    app.window().attach(window.clone(), false);

    Harness {
        app,
        clock,
        journal,
        window,
        clipboard,
        hook,
        events,
        _dir: dir,
    }
}

fn event_names(events: &Mutex<Vec<AppEvent>>) -> Vec<&'static str> {
    events.lock().iter().map(AppEvent::name).collect()
}

#[test]
fn test_toggle_debounce_timeline() {
    let h = harness(Some("notes"), None);

    // t = 0.0: shows
    assert_eq!(h.app.window().toggle(), TriggerOutcome::Triggered);
    assert!(h.app.window().is_visible());

    // t = 0.1: inside the interval, dropped
    h.clock.advance(Duration::from_millis(100));
    assert_eq!(h.app.window().toggle(), TriggerOutcome::Debounced);
    assert!(h.app.window().is_visible());

    // t = 0.6: hides
    h.clock.set(Duration::from_millis(600));
    assert_eq!(h.app.window().toggle(), TriggerOutcome::Triggered);
    assert!(!h.app.window().is_visible());

    assert_eq!(
        event_names(&h.events),
        vec![
            "window_pre_show",
            "input_source_detected",
            "window_shown",
            "window_hidden"
        ]
    );
}

#[test]
fn test_concurrent_fire_is_dropped() {
    let h = harness(None, None);
    let concurrent = Arc::new(Mutex::new(Vec::new()));

    // A second fire while the first toggle is still running
    let window = h.app.window().clone();
    let sink = Arc::clone(&concurrent);
    h.app.bus().subscribe(EventKind::WindowPreShow, move |_| {
        let window = window.clone();
        let outcome = std::thread::spawn(move || window.toggle()).join().unwrap();
        sink.lock().push(outcome);
    });

    assert_eq!(h.app.window().toggle(), TriggerOutcome::Triggered);
    assert_eq!(*concurrent.lock(), vec![TriggerOutcome::Busy]);
    assert!(h.app.window().is_visible());
    assert!(!h.app.window().trigger().is_processing());
}

#[test]
fn test_selection_captured_before_window_appears() {
    let h = harness(Some("user clipboard"), Some("selected sentence"));

    assert!(h.app.window().show());

    let journal = h.journal.lock().clone();
    let copy_at = journal.iter().position(|e| e == "keys:ctrl+c").unwrap();
    let restore_at = journal
        .iter()
        .position(|e| e == "clipboard:set:user clipboard")
        .unwrap();
    let show_at = journal.iter().position(|e| e == "window:show").unwrap();
    let focus_at = journal.iter().position(|e| e == "window:focus").unwrap();
    assert!(copy_at < restore_at);
    assert!(restore_at < show_at);
    assert!(show_at < focus_at);

    // The user's clipboard is back
    assert_eq!(h.clipboard.text().as_deref(), Some("user clipboard"));

    let attachments = h.app.attachments();
    let set = attachments.lock();
    assert_eq!(set.active_source(), Some(SourceType::Selection));
    let ids: Vec<&str> = set.attachments().iter().map(|a| a.id.as_str()).collect();
    assert_eq!(ids, vec![SELECTION_TEXT_ID]);
}

#[test]
fn test_clipboard_fallback_and_refresh() {
    let h = harness(Some("copied earlier"), None);

    assert!(h.app.window().show());
    {
        let attachments = h.app.attachments();
        let set = attachments.lock();
        assert_eq!(set.active_source(), Some(SourceType::Clipboard));
        assert_eq!(set.attachments()[0].id, CLIPBOARD_TEXT_ID);
    }

    // Next activation finds a selection; it replaces the clipboard attachment
    assert!(h.app.window().hide());
    *h.clipboard.selection.lock() = Some("fresh selection".to_string());
    assert!(h.app.window().show());

    let attachments = h.app.attachments();
    let set = attachments.lock();
    let ids: Vec<&str> = set.attachments().iter().map(|a| a.id.as_str()).collect();
    assert_eq!(ids, vec![SELECTION_TEXT_ID]);
}

#[test]
fn test_close_handler_installed_once_and_hides() {
    let h = harness(None, None);

    let (hidden_tx, hidden_rx) = mpsc::channel();
    let hidden_tx = Mutex::new(hidden_tx);
    h.app.bus().subscribe(EventKind::WindowHidden, move |_| {
        let _ = hidden_tx.lock().send(());
    });

    assert!(h.app.window().show());
    assert!(h.app.window().hide());
    hidden_rx.recv_timeout(Duration::from_secs(1)).unwrap();
    assert!(h.app.window().show());

    let installs = h
        .journal
        .lock()
        .iter()
        .filter(|e| *e == "window:install_close")
        .count();
    assert_eq!(installs, 1);

    h.window.click_close();
    hidden_rx.recv_timeout(Duration::from_secs(2)).unwrap();
    assert!(!h.app.window().is_visible());
}

#[test]
fn test_hotkey_press_toggles_window() {
    let h = harness(None, None);

    let (shown_tx, shown_rx) = mpsc::channel();
    let shown_tx = Mutex::new(shown_tx);
    h.app.bus().subscribe(EventKind::WindowShown, move |_| {
        let _ = shown_tx.lock().send(());
    });

    assert!(h.app.hotkeys().register(Some("ctrl+space"), h.app.toggle_callback()));

    h.hook.dispatch(&RawKeyEvent::down("left ctrl"));
    h.hook.dispatch(&RawKeyEvent::down("space"));
    shown_rx.recv_timeout(Duration::from_secs(2)).unwrap();
    assert!(h.app.window().is_visible());

    // Releasing and pressing again without changing the hotkey still works
    h.hook.dispatch(&RawKeyEvent::up("space"));
    h.hook.dispatch(&RawKeyEvent::up("left ctrl"));

    h.app.shutdown();
    h.hook.dispatch(&RawKeyEvent::down("left ctrl"));
    h.hook.dispatch(&RawKeyEvent::down("space"));
    assert!(shown_rx.recv_timeout(Duration::from_millis(200)).is_err());
}

#[test]
fn test_combination_storage_display_roundtrip() {
    let combo = HotkeyCombination::parse("Shift + Ctrl + PageUp").unwrap();
    assert_eq!(combo.to_storage(), "ctrl+shift+pageup");
    assert_eq!(combo.to_display(), "Ctrl + Shift + PageUp");
    assert_eq!(HotkeyCombination::parse(&combo.to_storage()).unwrap(), combo);
}
