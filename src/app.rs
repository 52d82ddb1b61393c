//! Application wiring
//!
//! Connects the hotkey manager, the debounced window toggle, input source
//! detection and attachment reconciliation through the event bus, then
//! drives the tao event loop that owns the window and the tray icon.
//!
//! ```text
//! hotkey thread ──► WindowManager::toggle ──► WindowPreShow
//!                                              └─► detect_sources ─► AttachmentSet::reconcile
//!                                                   └─► InputSourceDetected
//!                   show + focus ──► WindowShown
//! ```

use crate::attachments::AttachmentSet;
use crate::autostart;
use crate::config::{Config, ConfigStore};
use crate::error::{HotkeyError, Result, UiError};
use crate::events::{AppEvent, EventBus, EventKind};
use crate::hotkey::{
    CaptureOutcome, GlobalCapture, HotkeyBackend, HotkeyCallback, HotkeyCombination,
    HotkeyManager, KeyboardHook, PreviewCallback,
};
use crate::input::InputSourceService;
use crate::trigger::TriggerController;
use crate::tray::{self, TrayAction};
use crate::window::tao_backend::{build_window, TaoWindow, WindowHost, WindowRequest};
use crate::window::WindowManager;
use parking_lot::Mutex;
use pidlock::Pidlock;
use std::sync::{Arc, Weak};
use std::thread;
use tao::event::{Event, WindowEvent};
use tao::event_loop::{ControlFlow, EventLoopBuilder, EventLoopProxy};
use tray_icon::menu::MenuEvent;

/// Events posted to the tao event loop from other threads
#[derive(Debug)]
pub enum UserEvent {
    Window(WindowRequest),
    Menu(MenuEvent),
    Quit,
}

impl From<WindowRequest> for UserEvent {
    fn from(request: WindowRequest) -> Self {
        UserEvent::Window(request)
    }
}

/// The activation pipeline and the settings it reads
#[derive(Clone)]
pub struct App {
    store: Arc<ConfigStore>,
    bus: Arc<EventBus>,
    hotkeys: HotkeyManager,
    window: WindowManager,
    input: Arc<InputSourceService>,
    attachments: Arc<Mutex<AttachmentSet>>,
}

impl App {
    pub fn new(
        store: Arc<ConfigStore>,
        bus: Arc<EventBus>,
        hotkey_backend: Arc<dyn HotkeyBackend>,
        input: InputSourceService,
    ) -> Self {
        let trigger = TriggerController::new(store.get().min_trigger_interval());
        Self::with_trigger(store, bus, hotkey_backend, input, trigger)
    }

    /// Like [`new`](Self::new) with a caller-supplied trigger (custom clock)
    pub fn with_trigger(
        store: Arc<ConfigStore>,
        bus: Arc<EventBus>,
        hotkey_backend: Arc<dyn HotkeyBackend>,
        input: InputSourceService,
        trigger: TriggerController,
    ) -> Self {
        let app = Self {
            hotkeys: HotkeyManager::new(hotkey_backend, Arc::clone(&bus)),
            window: WindowManager::new(Arc::clone(&bus), trigger),
            store,
            bus,
            input: Arc::new(input),
            attachments: Arc::new(Mutex::new(AttachmentSet::new())),
        };
        app.wire_events();
        app
    }

    /// Capture input sources before the window takes focus
    fn wire_events(&self) {
        let input = Arc::clone(&self.input);
        let attachments = Arc::clone(&self.attachments);
        let bus: Weak<EventBus> = Arc::downgrade(&self.bus);

        self.bus.subscribe(EventKind::WindowPreShow, move |_| {
            let state = input.detect_sources();
            let has_selection = state.has_selection();
            let has_clipboard = state.has_clipboard_content();

            let active = attachments.lock().reconcile(state);
            tracing::debug!("Active input source: {:?}", active);

            if let Some(bus) = bus.upgrade() {
                bus.emit(AppEvent::InputSourceDetected {
                    has_selection,
                    has_clipboard,
                });
            }
        });
    }

    pub fn store(&self) -> &Arc<ConfigStore> {
        &self.store
    }

    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    pub fn hotkeys(&self) -> &HotkeyManager {
        &self.hotkeys
    }

    pub fn window(&self) -> &WindowManager {
        &self.window
    }

    pub fn attachments(&self) -> Arc<Mutex<AttachmentSet>> {
        Arc::clone(&self.attachments)
    }

    /// Callback bound to the global hotkey
    pub fn toggle_callback(&self) -> HotkeyCallback {
        let window = self.window.clone();
        Arc::new(move || {
            let outcome = window.toggle();
            tracing::trace!("Hotkey toggle: {:?}", outcome);
        })
    }

    /// Register the configured hotkey once the window toolkit has settled
    pub fn start_hotkey(&self) {
        let config = self.store.get();
        self.hotkeys.register_delayed(
            config.active_hotkey().map(str::to_string),
            self.toggle_callback(),
            config.hotkey_setup_delay(),
        );
    }

    /// Switch to a new hotkey and persist it. `None` disables the hotkey.
    pub fn change_hotkey(&self, combo: Option<&str>) -> bool {
        if !self.hotkeys.change(combo) {
            return false;
        }

        let stored = self.hotkeys.current_storage();
        if let Err(e) = self
            .store
            .update(|config| config.hotkey_combination = stored)
        {
            tracing::error!("Failed to save hotkey: {}", e);
        }
        true
    }

    /// Persist the UI language and announce it
    pub fn set_language(&self, language: &str) -> bool {
        let config = self.store.get();
        if !config.available_languages.iter().any(|l| l == language) {
            tracing::warn!(
                "Unknown language '{}', available: {}",
                language,
                config.available_languages.join(", ")
            );
            return false;
        }

        if let Err(e) = self
            .store
            .update(|config| config.language = language.to_string())
        {
            tracing::error!("Failed to save language: {}", e);
            return false;
        }
        self.bus.emit(AppEvent::LanguageChanged {
            language: language.to_string(),
        });
        true
    }

    /// Suspend the active hotkey and start recording a new one
    pub fn begin_capture(
        &self,
        hook: Arc<dyn KeyboardHook>,
        on_update: Option<PreviewCallback>,
    ) -> std::result::Result<GlobalCapture, HotkeyError> {
        let suspended = self.hotkeys.suspend();
        GlobalCapture::start(hook, on_update).inspect_err(|_| {
            if suspended {
                self.hotkeys.resume();
            }
        })
    }

    /// Apply what the user decided at the end of a capture
    pub fn finish_capture(&self, outcome: CaptureOutcome) -> bool {
        match outcome {
            CaptureOutcome::Save(combo) => {
                let storage = combo.to_storage();
                if !self.change_hotkey(Some(&storage)) {
                    self.hotkeys.resume();
                    return false;
                }
                self.bus.emit(AppEvent::HotkeyCaptured { combo: storage });
                true
            }
            CaptureOutcome::Disable => self.change_hotkey(None),
            CaptureOutcome::Cancel => {
                self.hotkeys.resume();
                true
            }
        }
    }

    /// Release global hotkeys. Idempotent.
    pub fn shutdown(&self) {
        self.hotkeys.cleanup();
    }
}

/// Decide what a finished capture string means
pub fn capture_outcome(captured: &str) -> CaptureOutcome {
    match HotkeyCombination::parse(captured) {
        Ok(combo) if combo.is_valid() => CaptureOutcome::Save(combo),
        _ => CaptureOutcome::Disable,
    }
}

fn acquire_instance_lock() -> Result<Pidlock> {
    let runtime_dir = Config::runtime_dir();
    std::fs::create_dir_all(&runtime_dir)?;

    let lock_path = runtime_dir.join("instance.lock");
    let mut pidlock = Pidlock::new(&lock_path.to_string_lossy());
    if pidlock.acquire().is_err() {
        return Err(UiError::Window(
            "Another writing-assistant instance is already running".to_string(),
        )
        .into());
    }
    tracing::debug!("Acquired instance lock {:?}", lock_path);
    Ok(pidlock)
}

fn forward_menu_events(proxy: EventLoopProxy<UserEvent>) {
    let spawned = thread::Builder::new()
        .name("tray-menu".to_string())
        .spawn(move || {
            while let Ok(event) = MenuEvent::receiver().recv() {
                if proxy.send_event(UserEvent::Menu(event)).is_err() {
                    break;
                }
            }
        });
    if let Err(e) = spawned {
        tracing::error!("Failed to start tray menu thread: {}", e);
    }
}

fn spawn_window_task<F>(name: &str, task: F)
where
    F: FnOnce() + Send + 'static,
{
    if let Err(e) = thread::Builder::new().name(name.to_string()).spawn(task) {
        tracing::error!("Failed to spawn {} thread: {}", name, e);
    }
}

/// Run the overlay until the user quits. Must be called on the main thread.
pub fn run(store: Arc<ConfigStore>) -> Result<()> {
    let mut instance_lock = acquire_instance_lock()?;
    let config = store.get();

    let bus = Arc::new(EventBus::new());
    let input = InputSourceService::with_platform_defaults(
        crate::input::SelectionOptions::from_config(&config),
    );
    let app = App::new(
        Arc::clone(&store),
        bus,
        crate::hotkey::create_backend(),
        input,
    );

    let event_loop = EventLoopBuilder::<UserEvent>::with_user_event().build();
    let proxy = event_loop.create_proxy();

    let mut host = WindowHost::new(build_window::<UserEvent>(&event_loop, &config)?);
    app.window()
        .attach(Arc::new(TaoWindow::new(proxy.clone())), false);

    if !autostart::sync_with_settings(&store) {
        tracing::warn!("Run on startup setting could not be applied");
    }
    let tray = tray::build(autostart::is_autostart_enabled())?;
    forward_menu_events(proxy.clone());

    // Ctrl+C releases the global hook before the process goes away
    {
        let app = app.clone();
        let proxy = proxy.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("Interrupted, shutting down");
                app.shutdown();
                let _ = proxy.send_event(UserEvent::Quit);
            }
        });
    }

    if !config.window_start_hidden {
        let window = app.window().clone();
        spawn_window_task("window-startup", move || {
            window.show();
        });
    }

    app.start_hotkey();
    tracing::info!(
        "Writing assistant running. Hotkey: {}",
        crate::hotkey::format_hotkey_for_display(config.active_hotkey())
    );

    event_loop.run(move |event, _, control_flow| {
        *control_flow = ControlFlow::Wait;

        match event {
            Event::UserEvent(UserEvent::Window(request)) => host.handle(request),

            Event::WindowEvent {
                window_id,
                event: WindowEvent::CloseRequested,
                ..
            } if window_id == host.id() => {
                if !host.close_requested() {
                    tracing::debug!("Close requested before the window was ever shown");
                }
            }

            Event::UserEvent(UserEvent::Menu(menu_event)) => {
                match tray::action_for_event(&menu_event) {
                    Some(TrayAction::ToggleWindow) => {
                        let window = app.window().clone();
                        spawn_window_task("tray-toggle", move || {
                            window.toggle();
                        });
                    }
                    Some(TrayAction::ToggleAutostart) => {
                        let enable = !app.store().get().run_on_startup;
                        match autostart::set_and_persist(app.store(), enable) {
                            Ok(()) => tray.set_autostart_checked(enable),
                            Err(e) => {
                                tracing::error!("Failed to change run on startup: {}", e);
                                tray.set_autostart_checked(!enable);
                            }
                        }
                    }
                    Some(TrayAction::Quit) => {
                        tracing::info!("Quit requested from tray");
                        app.shutdown();
                        let _ = instance_lock.release();
                        *control_flow = ControlFlow::Exit;
                    }
                    None => {}
                }
            }

            Event::UserEvent(UserEvent::Quit) => {
                app.shutdown();
                let _ = instance_lock.release();
                *control_flow = ControlFlow::Exit;
            }

            Event::LoopDestroyed => app.shutdown(),

            _ => {}
        }
    })
}
