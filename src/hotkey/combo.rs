//! Hotkey combinations
//!
//! A combination is a set of modifiers plus at most one main key. It has
//! two text forms:
//! - storage: `ctrl+alt+shift+win+key`, lowercase, fixed modifier order
//! - display: `Ctrl + Alt + Shift + Win + Key`
//!
//! Both parse back to the same value, and the empty combination is written
//! `""` in storage and `"None"` for display.

use super::keys::{modifier_for, normalize_key_name};
use crate::error::HotkeyError;
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Modifier keys, declared in canonical order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Modifier {
    Ctrl,
    Alt,
    Shift,
    Win,
}

impl Modifier {
    pub const ALL: [Modifier; 4] = [Modifier::Ctrl, Modifier::Alt, Modifier::Shift, Modifier::Win];

    pub fn storage_name(self) -> &'static str {
        match self {
            Modifier::Ctrl => "ctrl",
            Modifier::Alt => "alt",
            Modifier::Shift => "shift",
            Modifier::Win => "win",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Modifier::Ctrl => "Ctrl",
            Modifier::Alt => "Alt",
            Modifier::Shift => "Shift",
            Modifier::Win => "Win",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct HotkeyCombination {
    modifiers: BTreeSet<Modifier>,
    /// Display-cased main key ("A", "Space", "Num0")
    key: Option<String>,
}

impl HotkeyCombination {
    /// Build from parts. The key is normalized to its display name.
    pub fn new<I>(modifiers: I, key: Option<&str>) -> Self
    where
        I: IntoIterator<Item = Modifier>,
    {
        Self {
            modifiers: modifiers.into_iter().collect(),
            key: key
                .map(normalize_key_name)
                .filter(|key| !key.is_empty()),
        }
    }

    /// Parse storage (`ctrl+shift+a`) or display (`Ctrl + Shift + A`) form.
    ///
    /// `""` and `"None"` parse to the empty combination. Anything else must
    /// name exactly one non-modifier key.
    pub fn parse(text: &str) -> Result<Self, HotkeyError> {
        let trimmed = text.trim();
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("none") {
            return Ok(Self::default());
        }

        let (body, plus_key) = split_plus_key(trimmed);
        let mut combo = Self::default();
        let parts = body.split('+').filter(|_| !body.is_empty());
        for part in parts {
            let part = part.trim();
            if part.is_empty() {
                return Err(HotkeyError::EmptySegment(text.to_string()));
            }

            if let Some(modifier) = modifier_for(part) {
                combo.modifiers.insert(modifier);
            } else if combo.key.is_some() {
                return Err(HotkeyError::MultipleKeys(text.to_string()));
            } else {
                combo.key = Some(normalize_key_name(part));
            }
        }

        if plus_key {
            if combo.key.is_some() {
                return Err(HotkeyError::MultipleKeys(text.to_string()));
            }
            combo.key = Some(normalize_key_name("+"));
        }

        if combo.key.is_none() {
            return Err(HotkeyError::MissingKey(text.to_string()));
        }
        Ok(combo)
    }

    pub fn is_empty(&self) -> bool {
        self.modifiers.is_empty() && self.key.is_none()
    }

    /// A registrable hotkey needs a main key
    pub fn is_valid(&self) -> bool {
        self.key.is_some()
    }

    pub fn modifiers(&self) -> &BTreeSet<Modifier> {
        &self.modifiers
    }

    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    pub fn to_storage(&self) -> String {
        self.modifiers
            .iter()
            .map(|m| m.storage_name().to_string())
            .chain(self.key.iter().map(|k| k.to_lowercase()))
            .collect::<Vec<_>>()
            .join("+")
    }

    pub fn to_display(&self) -> String {
        if self.is_empty() {
            return "None".to_string();
        }
        self.modifiers
            .iter()
            .map(|m| m.display_name().to_string())
            .chain(self.key.clone())
            .collect::<Vec<_>>()
            .join(" + ")
    }
}

impl fmt::Display for HotkeyCombination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_display())
    }
}

impl FromStr for HotkeyCombination {
    type Err = HotkeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Split a literal trailing `+` key off ("ctrl++", "Ctrl + +", "+")
fn split_plus_key(text: &str) -> (&str, bool) {
    match text.strip_suffix('+') {
        Some(rest) if rest.trim().is_empty() => ("", true),
        Some(rest) => match rest.trim_end().strip_suffix('+') {
            Some(body) => (body, true),
            None => (text, false),
        },
        None => (text, false),
    }
}

/// Display form of a stored hotkey. Unparseable input is shown as-is.
pub fn format_hotkey_for_display(stored: Option<&str>) -> String {
    let Some(stored) = stored else {
        return "None".to_string();
    };
    match HotkeyCombination::parse(stored) {
        Ok(combo) => combo.to_display(),
        Err(_) => stored.trim().to_string(),
    }
}
