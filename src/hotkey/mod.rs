//! Global hotkey support
//!
//! - [`combo`]: the combination model and its storage/display forms
//! - [`keys`]: raw key name tables
//! - [`hook`]: the process-wide keyboard hook and its handler dispatcher
//! - [`listener`]: chord matching and the hook-backed [`HotkeyBackend`]
//! - [`capture`]: interactive capture of a new combination
//! - [`manager`]: registration lifecycle used by the application
//!
//! On Windows and macOS the hook can swallow the bound chord. On Linux
//! rdev can only observe, so the chord also reaches the focused window.

pub mod capture;
pub mod combo;
pub mod hook;
pub mod keys;
pub mod listener;
pub mod manager;

pub use capture::{CaptureOutcome, GlobalCapture, HotkeyCaptureSession, PreviewCallback};
pub use combo::{format_hotkey_for_display, HotkeyCombination, Modifier};
pub use hook::{HookDispatcher, KeyboardHook, RawKeyEvent, RdevHook};
pub use listener::{HookHotkeyBackend, HotkeyMatcher};
pub use manager::HotkeyManager;

use crate::error::HotkeyError;
use std::sync::Arc;

/// Invoked when a bound hotkey fires
pub type HotkeyCallback = Arc<dyn Fn() + Send + Sync>;

/// Registration API of a global hotkey provider
pub trait HotkeyBackend: Send + Sync {
    /// Bind a combination. Several combinations may be bound at once.
    fn bind(&self, combo: &HotkeyCombination, callback: HotkeyCallback) -> Result<(), HotkeyError>;

    /// Remove one combination. Returns false if it was not bound.
    fn unbind(&self, combo: &HotkeyCombination) -> Result<bool, HotkeyError>;

    /// Remove every binding
    fn clear_all(&self) -> Result<(), HotkeyError>;
}

/// Backend on the process-wide rdev hook
pub fn create_backend() -> Arc<dyn HotkeyBackend> {
    Arc::new(HookHotkeyBackend::new(RdevHook::global()))
}
