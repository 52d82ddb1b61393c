//! System clipboard access
//!
//! [`ClipboardProvider`] is the seam between selection capture and the OS.
//! The arboard implementation keeps one handle for the life of the process.
//! On X11 the handle owns what it puts on the clipboard, so a restored
//! backup only survives while that handle is alive.

use crate::error::InputError;
use parking_lot::Mutex;
use std::borrow::Cow;

/// RGBA8 image read from the clipboard
#[derive(Clone, PartialEq, Eq)]
pub struct ClipboardImage {
    pub width: usize,
    pub height: usize,
    pub bytes: Vec<u8>,
}

impl std::fmt::Debug for ClipboardImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClipboardImage")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("bytes", &self.bytes.len())
            .finish()
    }
}

/// Clipboard content saved before a simulated copy
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ClipboardSnapshot {
    #[default]
    Empty,
    Text(String),
    Image(ClipboardImage),
}

pub trait ClipboardProvider: Send + Sync {
    /// Raw clipboard text, or None when the clipboard holds no text
    fn get_text(&self) -> Result<Option<String>, InputError>;

    fn set_text(&self, text: &str) -> Result<(), InputError>;

    fn get_image(&self) -> Result<Option<ClipboardImage>, InputError>;

    fn set_image(&self, image: &ClipboardImage) -> Result<(), InputError>;

    fn clear(&self) -> Result<(), InputError>;

    /// Save whatever the clipboard holds, text first
    fn snapshot(&self) -> Result<ClipboardSnapshot, InputError> {
        if let Some(text) = self.get_text()? {
            if !text.is_empty() {
                return Ok(ClipboardSnapshot::Text(text));
            }
        }
        Ok(match self.get_image()? {
            Some(image) => ClipboardSnapshot::Image(image),
            None => ClipboardSnapshot::Empty,
        })
    }

    /// Put a snapshot back. An empty snapshot clears the clipboard.
    fn restore(&self, snapshot: &ClipboardSnapshot) -> Result<(), InputError> {
        match snapshot {
            ClipboardSnapshot::Empty => self.clear(),
            ClipboardSnapshot::Text(text) => self.set_text(text),
            ClipboardSnapshot::Image(image) => self.set_image(image),
        }
    }
}

/// Clipboard backed by a single arboard handle
pub struct ArboardClipboard {
    handle: Mutex<arboard::Clipboard>,
}

impl std::fmt::Debug for ArboardClipboard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArboardClipboard").finish_non_exhaustive()
    }
}

impl ArboardClipboard {
    /// Open the system clipboard
    pub fn new() -> Result<Self, InputError> {
        let handle = arboard::Clipboard::new()
            .map_err(|e| InputError::ClipboardUnavailable(e.to_string()))?;
        Ok(Self {
            handle: Mutex::new(handle),
        })
    }
}

fn clipboard_error(e: arboard::Error) -> InputError {
    InputError::Clipboard(e.to_string())
}

impl ClipboardProvider for ArboardClipboard {
    fn get_text(&self) -> Result<Option<String>, InputError> {
        match self.handle.lock().get_text() {
            Ok(text) => Ok(Some(text)),
            Err(arboard::Error::ContentNotAvailable) => Ok(None),
            Err(e) => Err(clipboard_error(e)),
        }
    }

    fn set_text(&self, text: &str) -> Result<(), InputError> {
        self.handle.lock().set_text(text).map_err(clipboard_error)
    }

    fn get_image(&self) -> Result<Option<ClipboardImage>, InputError> {
        match self.handle.lock().get_image() {
            Ok(image) => Ok(Some(ClipboardImage {
                width: image.width,
                height: image.height,
                bytes: image.bytes.into_owned(),
            })),
            Err(arboard::Error::ContentNotAvailable) => Ok(None),
            Err(e) => Err(clipboard_error(e)),
        }
    }

    fn set_image(&self, image: &ClipboardImage) -> Result<(), InputError> {
        let data = arboard::ImageData {
            width: image.width,
            height: image.height,
            bytes: Cow::Borrowed(&image.bytes),
        };
        self.handle.lock().set_image(data).map_err(clipboard_error)
    }

    fn clear(&self) -> Result<(), InputError> {
        self.handle.lock().clear().map_err(clipboard_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arboard_handle_is_shared_across_threads() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<ArboardClipboard>();
    }

    #[test]
    fn test_arboard_set_then_get() {
        // Headless CI has no clipboard
        let Ok(clipboard) = ArboardClipboard::new() else {
            return;
        };
        let Ok(backup) = clipboard.snapshot() else {
            return;
        };
        if clipboard.set_text("writing-assistant clipboard test").is_err() {
            return;
        }
        assert_eq!(
            clipboard.get_text().unwrap().as_deref(),
            Some("writing-assistant clipboard test")
        );
        let _ = clipboard.restore(&backup);
    }
}
