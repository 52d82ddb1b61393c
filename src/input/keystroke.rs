//! Simulated copy shortcut

use crate::error::InputError;
use enigo::{Direction, Enigo, Key, Keyboard, Settings};
use parking_lot::Mutex;
use std::thread;
use std::time::Duration;

/// Serializes synthetic key sequences so two copies never interleave
static KEYSTROKE_LOCK: Mutex<()> = Mutex::new(());

/// Sends the platform copy shortcut to the focused application
pub trait CopyKeystroke: Send + Sync {
    /// Press and release Ctrl+C, pausing `key_delay` between steps.
    /// Ctrl must be released even when a later step fails.
    fn send_copy(&self, key_delay: Duration) -> Result<(), InputError>;
}

/// Ctrl+C through enigo
#[derive(Debug, Default, Clone, Copy)]
pub struct EnigoKeystroke;

fn keystroke_error(e: impl std::fmt::Display) -> InputError {
    InputError::Keystroke(e.to_string())
}

impl CopyKeystroke for EnigoKeystroke {
    fn send_copy(&self, key_delay: Duration) -> Result<(), InputError> {
        let _guard = KEYSTROKE_LOCK.lock();
        let mut enigo = Enigo::new(&Settings::default()).map_err(keystroke_error)?;

        enigo.key(Key::Control, Direction::Press).map_err(keystroke_error)?;
        thread::sleep(key_delay);
        let copied = enigo.key(Key::Unicode('c'), Direction::Click);
        thread::sleep(key_delay);
        let released = enigo.key(Key::Control, Direction::Release);

        copied.map_err(keystroke_error)?;
        released.map_err(keystroke_error)
    }
}
