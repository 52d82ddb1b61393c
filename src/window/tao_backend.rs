//! tao window backend
//!
//! tao windows may only be touched from the event loop thread. [`TaoWindow`]
//! is the thread-safe side: it posts a [`WindowRequest`] through the event
//! loop proxy and waits for the loop to answer with a [`WindowSnapshot`].
//! [`WindowHost`] is the loop side that applies requests to the real window.
//!
//! Never call a `TaoWindow` method from the event loop thread itself: the
//! request could not be served until the call returns, so it would only end
//! in a timeout.

use super::{CloseHandler, WindowBackend};
use crate::config::Config;
use crate::error::UiError;
use parking_lot::Mutex;
use std::sync::mpsc;
use std::time::Duration;
use tao::dpi::LogicalSize;
use tao::event_loop::{EventLoopProxy, EventLoopWindowTarget};
use tao::window::{Theme, Window, WindowBuilder, WindowId};

pub const WINDOW_TITLE: &str = "Writing Assistant";

/// How long a caller waits for the event loop to serve a request
const REQUEST_TIMEOUT: Duration = Duration::from_secs(2);

pub enum WindowCommand {
    SetVisible(bool),
    BringToFront,
    Focus,
    AlwaysOnTop(bool),
    Restore,
    Query,
    InstallCloseHandler(CloseHandler),
}

impl std::fmt::Debug for WindowCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WindowCommand::SetVisible(visible) => write!(f, "SetVisible({})", visible),
            WindowCommand::BringToFront => write!(f, "BringToFront"),
            WindowCommand::Focus => write!(f, "Focus"),
            WindowCommand::AlwaysOnTop(on_top) => write!(f, "AlwaysOnTop({})", on_top),
            WindowCommand::Restore => write!(f, "Restore"),
            WindowCommand::Query => write!(f, "Query"),
            WindowCommand::InstallCloseHandler(_) => write!(f, "InstallCloseHandler"),
        }
    }
}

/// Window state after a request was applied
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowSnapshot {
    pub visible: bool,
    pub minimized: bool,
}

#[derive(Debug)]
pub struct WindowRequest {
    pub command: WindowCommand,
    reply: mpsc::Sender<WindowSnapshot>,
}

/// Thread-safe handle to the window living on the event loop
pub struct TaoWindow<T: 'static> {
    proxy: Mutex<EventLoopProxy<T>>,
}

impl<T> TaoWindow<T>
where
    T: From<WindowRequest> + Send + 'static,
{
    pub fn new(proxy: EventLoopProxy<T>) -> Self {
        Self {
            proxy: Mutex::new(proxy),
        }
    }

    fn request(&self, command: WindowCommand) -> Result<WindowSnapshot, UiError> {
        let (reply, answer) = mpsc::channel();
        self.proxy
            .lock()
            .send_event(T::from(WindowRequest { command, reply }))
            .map_err(|_| UiError::EventLoopClosed)?;

        answer
            .recv_timeout(REQUEST_TIMEOUT)
            .map_err(|e| UiError::Window(format!("event loop did not answer: {}", e)))
    }
}

impl<T> WindowBackend for TaoWindow<T>
where
    T: From<WindowRequest> + Send + 'static,
{
    fn set_visible(&self, visible: bool) -> Result<(), UiError> {
        let snapshot = self.request(WindowCommand::SetVisible(visible))?;
        if snapshot.visible != visible {
            return Err(UiError::Window(format!(
                "window is still {}",
                if snapshot.visible { "visible" } else { "hidden" }
            )));
        }
        Ok(())
    }

    fn bring_to_front(&self) -> Result<(), UiError> {
        self.request(WindowCommand::BringToFront).map(|_| ())
    }

    fn focus(&self) -> Result<(), UiError> {
        self.request(WindowCommand::Focus).map(|_| ())
    }

    fn set_always_on_top(&self, on_top: bool) -> Result<(), UiError> {
        self.request(WindowCommand::AlwaysOnTop(on_top)).map(|_| ())
    }

    fn is_visible(&self) -> Result<bool, UiError> {
        self.request(WindowCommand::Query).map(|s| s.visible)
    }

    fn is_minimized(&self) -> Result<bool, UiError> {
        self.request(WindowCommand::Query).map(|s| s.minimized)
    }

    fn restore(&self) -> Result<(), UiError> {
        self.request(WindowCommand::Restore).map(|_| ())
    }

    fn install_close_handler(&self, handler: CloseHandler) -> Result<(), UiError> {
        self.request(WindowCommand::InstallCloseHandler(handler)).map(|_| ())
    }
}

/// The real window, owned by the event loop
pub struct WindowHost {
    window: Window,
    close_handler: Option<CloseHandler>,
}

impl WindowHost {
    pub fn new(window: Window) -> Self {
        Self {
            window,
            close_handler: None,
        }
    }

    pub fn id(&self) -> WindowId {
        self.window.id()
    }

    pub fn snapshot(&self) -> WindowSnapshot {
        WindowSnapshot {
            visible: self.window.is_visible(),
            minimized: self.window.is_minimized(),
        }
    }

    /// Apply a request and answer the waiting caller
    pub fn handle(&mut self, request: WindowRequest) {
        tracing::trace!("Window request: {:?}", request.command);
        match request.command {
            WindowCommand::SetVisible(visible) => self.window.set_visible(visible),
            WindowCommand::BringToFront => {
                if self.window.is_minimized() {
                    self.window.set_minimized(false);
                }
                self.window.set_visible(true);
            }
            WindowCommand::Focus => self.window.set_focus(),
            WindowCommand::AlwaysOnTop(on_top) => self.window.set_always_on_top(on_top),
            WindowCommand::Restore => self.window.set_minimized(false),
            WindowCommand::Query => {}
            WindowCommand::InstallCloseHandler(handler) => self.close_handler = Some(handler),
        }
        // The caller may have timed out already
        let _ = request.reply.send(self.snapshot());
    }

    /// Run the close handler. Returns false when none is installed.
    pub fn close_requested(&self) -> bool {
        match &self.close_handler {
            Some(handler) => {
                handler();
                true
            }
            None => false,
        }
    }
}

/// Create the main window from settings
pub fn build_window<T>(
    target: &EventLoopWindowTarget<T>,
    config: &Config,
) -> Result<Window, UiError> {
    let theme = if config.dark_mode {
        Theme::Dark
    } else {
        Theme::Light
    };

    WindowBuilder::new()
        .with_title(WINDOW_TITLE)
        .with_inner_size(LogicalSize::new(config.window_width, config.window_height))
        .with_resizable(config.window_resizable)
        .with_decorations(!config.window_frameless)
        .with_visible(false)
        .with_theme(Some(theme))
        .build(target)
        .map_err(|e| UiError::Window(format!("Failed to create window: {}", e)))
}
