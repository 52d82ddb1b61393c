//! Error types for writing-assistant
//!
//! Uses thiserror for ergonomic error definitions. Most of these never
//! reach the user: the activation pipeline logs them and degrades to a
//! safe fallback (`None`, `false`, no-op) so a transient OS failure can
//! never leave the hotkey hook orphaned or the window stuck hidden.

use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type for the writing-assistant application
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Hotkey error: {0}")]
    Hotkey(#[from] HotkeyError),

    #[error("Input capture error: {0}")]
    Input(#[from] InputError),

    #[error("Window error: {0}")]
    Ui(#[from] UiError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors related to settings persistence
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config {path:?}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid config {path:?}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Failed to write config {path:?}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("No config directory available on this platform. Pass --config <FILE>.")]
    NoConfigDir,
}

/// Errors related to hotkey parsing, capture and registration
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HotkeyError {
    #[error("Invalid hotkey '{0}': empty key segment")]
    EmptySegment(String),

    #[error("Invalid hotkey '{0}': only one non-modifier key is allowed")]
    MultipleKeys(String),

    #[error("Invalid hotkey '{0}': a non-modifier key is required")]
    MissingKey(String),

    #[error("Hotkey registration failed: {0}")]
    Registration(String),

    #[error("Keyboard hook error: {0}")]
    Hook(String),
}

/// Errors related to clipboard and selection capture
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InputError {
    #[error("Clipboard unavailable: {0}")]
    ClipboardUnavailable(String),

    #[error("Clipboard access failed: {0}")]
    Clipboard(String),

    #[error("Keystroke simulation failed: {0}")]
    Keystroke(String),

    #[error("Unsupported attachment '{0}': archives and binaries cannot be attached")]
    UnsupportedAttachment(String),
}

/// Errors related to the native window and desktop integration
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UiError {
    #[error("Window operation failed: {0}")]
    Window(String),

    #[error("Event loop is no longer running")]
    EventLoopClosed,

    #[error("Tray icon error: {0}")]
    Tray(String),

    #[error("Autostart error: {0}")]
    Autostart(String),

    #[error("{0} is not supported on this platform")]
    Unsupported(&'static str),
}

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;
