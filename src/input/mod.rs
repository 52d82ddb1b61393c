//! Input source detection
//!
//! Answers "what is the user pointing at?" right before the window takes
//! focus: the current text selection in the foreground application, and
//! whatever text or image sits on the clipboard.
//!
//! Selection capture works by sending Ctrl+C and reading the clipboard, so
//! it must run while the foreground application still has focus. The
//! user's clipboard is saved first and put back on every exit path.

pub mod clipboard;
pub mod keystroke;

pub use clipboard::{ArboardClipboard, ClipboardImage, ClipboardProvider, ClipboardSnapshot};
pub use keystroke::{CopyKeystroke, EnigoKeystroke};

use crate::config::{seconds, Config};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Snapshot of the available input sources
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InputState {
    pub clipboard_text: Option<String>,
    pub clipboard_image: Option<ClipboardImage>,
    pub selection_text: Option<String>,
}

impl InputState {
    pub fn has_selection(&self) -> bool {
        self.selection_text.is_some()
    }

    pub fn has_clipboard_content(&self) -> bool {
        self.clipboard_text.is_some() || self.clipboard_image.is_some()
    }
}

/// Timing of the copy-and-read loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelectionOptions {
    /// Wait before the first copy so the hotkey's own keys are released
    pub settle_delay: Duration,
    /// Wait after each copy before reading the clipboard
    pub sleep_duration: Duration,
    pub max_retries: u32,
    pub retry_delay: Duration,
    /// Pause between synthetic key steps
    pub key_delay: Duration,
}

impl Default for SelectionOptions {
    fn default() -> Self {
        Self {
            settle_delay: Duration::from_millis(200),
            sleep_duration: Duration::from_millis(250),
            max_retries: 3,
            retry_delay: Duration::from_millis(150),
            key_delay: Duration::from_millis(50),
        }
    }
}

impl SelectionOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            sleep_duration: seconds(config.selection_sleep_duration),
            max_retries: config.selection_max_retries,
            retry_delay: seconds(config.selection_retry_delay),
            ..Self::default()
        }
    }

    /// All delays zeroed
    pub fn immediate(max_retries: u32) -> Self {
        Self {
            settle_delay: Duration::ZERO,
            sleep_duration: Duration::ZERO,
            max_retries,
            retry_delay: Duration::ZERO,
            key_delay: Duration::ZERO,
        }
    }
}

/// Puts the saved clipboard back when dropped
struct RestoreGuard<'a> {
    clipboard: &'a dyn ClipboardProvider,
    backup: ClipboardSnapshot,
}

impl Drop for RestoreGuard<'_> {
    fn drop(&mut self) {
        match self.clipboard.restore(&self.backup) {
            Ok(()) => tracing::debug!("Clipboard restored"),
            Err(e) => tracing::error!("Failed to restore clipboard: {}", e),
        }
    }
}

/// Text that names an existing file, as produced by copying in a file manager.
/// Relative paths resolve against the working directory.
fn is_file_path(text: &str) -> bool {
    Path::new(text).is_file()
}

pub struct InputSourceService {
    clipboard: Option<Arc<dyn ClipboardProvider>>,
    keystroke: Option<Arc<dyn CopyKeystroke>>,
    selection_enabled: bool,
    options: SelectionOptions,
    warned_unavailable: AtomicBool,
}

impl std::fmt::Debug for InputSourceService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InputSourceService")
            .field("clipboard", &self.clipboard.is_some())
            .field("keystroke", &self.keystroke.is_some())
            .field("selection_enabled", &self.selection_enabled)
            .field("options", &self.options)
            .finish()
    }
}

impl InputSourceService {
    /// Selection capture is on by default only on Windows, where the copy
    /// shortcut is reliable from a background hook.
    pub fn new(clipboard: Arc<dyn ClipboardProvider>, keystroke: Arc<dyn CopyKeystroke>) -> Self {
        Self {
            clipboard: Some(clipboard),
            keystroke: Some(keystroke),
            selection_enabled: cfg!(windows),
            options: SelectionOptions::default(),
            warned_unavailable: AtomicBool::new(false),
        }
    }

    /// Use the system clipboard and enigo. A missing clipboard disables
    /// capture instead of failing.
    pub fn with_platform_defaults(options: SelectionOptions) -> Self {
        let clipboard: Option<Arc<dyn ClipboardProvider>> = match ArboardClipboard::new() {
            Ok(clipboard) => Some(Arc::new(clipboard)),
            Err(e) => {
                tracing::error!("{}. Input capture disabled.", e);
                None
            }
        };

        Self {
            clipboard,
            keystroke: Some(Arc::new(EnigoKeystroke)),
            selection_enabled: cfg!(windows),
            options,
            warned_unavailable: AtomicBool::new(false),
        }
    }

    pub fn with_selection_capture(mut self, enabled: bool) -> Self {
        self.selection_enabled = enabled;
        self
    }

    pub fn with_options(mut self, options: SelectionOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> SelectionOptions {
        self.options
    }

    fn provider(&self) -> Option<&dyn ClipboardProvider> {
        let provider = self.clipboard.as_deref();
        if provider.is_none() && !self.warned_unavailable.swap(true, Ordering::Relaxed) {
            tracing::warn!("Clipboard unavailable; input sources will always be empty");
        }
        provider
    }

    /// Trimmed clipboard text, None when empty or unreadable
    pub fn get_clipboard_text(&self) -> Option<String> {
        match self.provider()?.get_text() {
            Ok(text) => text
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty()),
            Err(e) => {
                tracing::debug!("Could not read clipboard text: {}", e);
                None
            }
        }
    }

    pub fn get_clipboard_image(&self) -> Option<ClipboardImage> {
        match self.provider()?.get_image() {
            Ok(image) => image,
            Err(e) => {
                tracing::debug!("Could not read clipboard image: {}", e);
                None
            }
        }
    }

    /// Copy the foreground application's selection using the configured timing
    pub fn get_selection_text(&self) -> Option<String> {
        self.get_selection_text_with(&self.options)
    }

    /// Copy the foreground application's selection.
    ///
    /// Sends Ctrl+C up to `max_retries` times and returns the first
    /// non-empty text that is not a file path. The clipboard holds the
    /// user's original content again when this returns.
    pub fn get_selection_text_with(&self, options: &SelectionOptions) -> Option<String> {
        if !self.selection_enabled {
            tracing::debug!("Selection capture not available on this platform");
            return None;
        }
        let clipboard = self.provider()?;
        let keystroke = self.keystroke.as_deref()?;

        let backup = match clipboard.snapshot() {
            Ok(backup) => backup,
            Err(e) => {
                // Without a backup the copy would destroy the user's clipboard
                tracing::warn!("Skipping selection capture, clipboard backup failed: {}", e);
                return None;
            }
        };
        let _restore = RestoreGuard { clipboard, backup };

        thread::sleep(options.settle_delay);

        for attempt in 1..=options.max_retries {
            // Only a cleared clipboard may be read back as the selection
            if let Err(e) = clipboard.clear() {
                tracing::debug!("Could not clear clipboard on attempt {}: {}", attempt, e);
                if attempt < options.max_retries {
                    thread::sleep(options.retry_delay);
                }
                continue;
            }
            if let Err(e) = keystroke.send_copy(options.key_delay) {
                tracing::error!("Copy shortcut failed: {}", e);
            }
            thread::sleep(options.sleep_duration);

            match clipboard.get_text() {
                Ok(Some(text)) if !text.trim().is_empty() => {
                    let text = text.trim();
                    if is_file_path(text) {
                        tracing::debug!("Ignoring copied file path");
                        return None;
                    }
                    tracing::debug!(
                        "Selection captured on attempt {} ({} chars)",
                        attempt,
                        text.chars().count()
                    );
                    return Some(text.to_string());
                }
                Ok(_) => {}
                Err(e) => tracing::debug!("Could not read clipboard: {}", e),
            }

            if attempt < options.max_retries {
                thread::sleep(options.retry_delay);
            }
        }

        tracing::debug!("No selection after {} attempt(s)", options.max_retries);
        None
    }

    /// Detect every source. The selection is captured first, while the
    /// foreground application still has focus.
    pub fn detect_sources(&self) -> InputState {
        let selection_text = self.get_selection_text();
        let clipboard_text = self.get_clipboard_text();
        let clipboard_image = self.get_clipboard_image();

        let state = InputState {
            clipboard_text,
            clipboard_image,
            selection_text,
        };
        tracing::debug!(
            "Input sources: selection={}, clipboard={}",
            state.has_selection(),
            state.has_clipboard_content()
        );
        state
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! In-memory clipboard and scripted keystroke for tests

    use super::*;
    use crate::error::InputError;
    use parking_lot::Mutex;

    #[derive(Default)]
    pub struct MemoryClipboard {
        pub content: Mutex<ClipboardSnapshot>,
        /// Text the next copy will place on the clipboard
        pub selection: Mutex<Option<String>>,
        pub fail_reads: AtomicBool,
        pub fail_clear: AtomicBool,
    }

    impl MemoryClipboard {
        pub fn with_text(text: &str) -> Arc<Self> {
            let clipboard = Self::default();
            *clipboard.content.lock() = ClipboardSnapshot::Text(text.to_string());
            Arc::new(clipboard)
        }

        pub fn with_image(image: ClipboardImage) -> Arc<Self> {
            let clipboard = Self::default();
            *clipboard.content.lock() = ClipboardSnapshot::Image(image);
            Arc::new(clipboard)
        }

        pub fn select(&self, text: Option<&str>) {
            *self.selection.lock() = text.map(str::to_string);
        }

        pub fn content(&self) -> ClipboardSnapshot {
            self.content.lock().clone()
        }

        fn check(&self) -> Result<(), InputError> {
            if self.fail_reads.load(Ordering::SeqCst) {
                Err(InputError::Clipboard("locked by another process".to_string()))
            } else {
                Ok(())
            }
        }
    }

    impl ClipboardProvider for MemoryClipboard {
        fn get_text(&self) -> Result<Option<String>, InputError> {
            self.check()?;
            Ok(match &*self.content.lock() {
                ClipboardSnapshot::Text(text) => Some(text.clone()),
                _ => None,
            })
        }

        fn set_text(&self, text: &str) -> Result<(), InputError> {
            *self.content.lock() = ClipboardSnapshot::Text(text.to_string());
            Ok(())
        }

        fn get_image(&self) -> Result<Option<ClipboardImage>, InputError> {
            self.check()?;
            Ok(match &*self.content.lock() {
                ClipboardSnapshot::Image(image) => Some(image.clone()),
                _ => None,
            })
        }

        fn set_image(&self, image: &ClipboardImage) -> Result<(), InputError> {
            *self.content.lock() = ClipboardSnapshot::Image(image.clone());
            Ok(())
        }

        fn clear(&self) -> Result<(), InputError> {
            if self.fail_clear.load(Ordering::SeqCst) {
                return Err(InputError::Clipboard("clear refused".to_string()));
            }
            *self.content.lock() = ClipboardSnapshot::Empty;
            Ok(())
        }
    }

    /// Copies the clipboard's scripted selection on each keystroke
    pub struct ScriptedCopy {
        pub clipboard: Arc<MemoryClipboard>,
        pub presses: Mutex<u32>,
        /// Number of presses that copy nothing before the selection appears
        pub misses: u32,
    }

    impl ScriptedCopy {
        pub fn new(clipboard: Arc<MemoryClipboard>, misses: u32) -> Arc<Self> {
            Arc::new(Self {
                clipboard,
                presses: Mutex::new(0),
                misses,
            })
        }
    }

    impl CopyKeystroke for ScriptedCopy {
        fn send_copy(&self, _key_delay: Duration) -> Result<(), InputError> {
            let mut presses = self.presses.lock();
            *presses += 1;
            if *presses > self.misses {
                if let Some(text) = self.clipboard.selection.lock().clone() {
                    self.clipboard.set_text(&text)?;
                }
            }
            Ok(())
        }
    }
}
