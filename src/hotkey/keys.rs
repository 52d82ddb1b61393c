//! Key name tables
//!
//! Raw key names arrive from the OS hook in a loose, partly localized form
//! ("left ctrl", "maj", "page up", "numpad 0"). This module folds them into
//! the small vocabulary used by [`HotkeyCombination`](super::HotkeyCombination):
//! four modifiers plus one display-cased main key ("A", "PageUp", "Num0").

use super::combo::Modifier;

/// Raw names the hook may report for modifier keys
pub const MODIFIER_KEYS: &[&str] = &[
    "ctrl",
    "shift",
    "alt",
    "windows",
    "left ctrl",
    "right ctrl",
    "left shift",
    "right shift",
    "left alt",
    "right alt",
    "left windows",
    "right windows",
    "maj",
    "left maj",
    "right maj",
    "ctrl gauche",
    "ctrl droite",
    "alt gr",
];

/// Raw key name → display name
const KEY_NAME_MAP: &[(&str, &str)] = &[
    ("decimal", "Decimal"),
    ("add", "NumAdd"),
    ("subtract", "NumSubtract"),
    ("multiply", "NumMultiply"),
    ("divide", "NumDivide"),
    ("numpad 0", "Num0"),
    ("numpad 1", "Num1"),
    ("numpad 2", "Num2"),
    ("numpad 3", "Num3"),
    ("numpad 4", "Num4"),
    ("numpad 5", "Num5"),
    ("numpad 6", "Num6"),
    ("numpad 7", "Num7"),
    ("numpad 8", "Num8"),
    ("numpad 9", "Num9"),
    ("num lock", "NumLock"),
    ("page up", "PageUp"),
    ("page down", "PageDown"),
    ("caps lock", "CapsLock"),
    ("scroll lock", "ScrollLock"),
    ("print screen", "PrintScreen"),
    ("left", "Left"),
    ("right", "Right"),
    ("up", "Up"),
    ("down", "Down"),
    ("home", "Home"),
    ("end", "End"),
    ("insert", "Insert"),
    ("delete", "Delete"),
    ("backspace", "Backspace"),
    ("tab", "Tab"),
    ("enter", "Enter"),
    ("escape", "Escape"),
    ("space", "Space"),
    // "+" is the separator in both text forms
    ("+", "Plus"),
    ("plus", "Plus"),
];

/// Hardware scan code → display name.
///
/// Numpad keys report layout- and NumLock-dependent names ("insert" for
/// numpad 0 with NumLock off), so their scan codes win over the name.
pub fn key_for_scancode(code: u32) -> Option<&'static str> {
    let name = match code {
        82 => "Num0",
        79 => "Num1",
        80 => "Num2",
        81 => "Num3",
        75 => "Num4",
        76 => "Num5",
        77 => "Num6",
        71 => "Num7",
        72 => "Num8",
        73 => "Num9",
        83 => "Decimal",
        53 => "NumDivide",
        55 => "NumMultiply",
        74 => "NumSubtract",
        78 => "NumAdd",
        59 => "F1",
        60 => "F2",
        61 => "F3",
        62 => "F4",
        63 => "F5",
        64 => "F6",
        65 => "F7",
        66 => "F8",
        67 => "F9",
        68 => "F10",
        87 => "F11",
        88 => "F12",
        _ => return None,
    };
    Some(name)
}

/// Fold a raw modifier name into a [`Modifier`].
///
/// Side prefixes are dropped ("left ctrl" → Ctrl) and localized names are
/// mapped ("maj" → Shift, "alt gr" → Alt, "ctrl droite" → Ctrl).
pub fn modifier_for(name: &str) -> Option<Modifier> {
    let lower = name.trim().to_lowercase();
    let base = lower
        .strip_prefix("left ")
        .or_else(|| lower.strip_prefix("right "))
        .unwrap_or(&lower);

    match base {
        "ctrl" | "control" | "ctrl gauche" | "ctrl droite" => Some(Modifier::Ctrl),
        "alt" | "alt gr" | "option" => Some(Modifier::Alt),
        "shift" | "maj" => Some(Modifier::Shift),
        "windows" | "win" | "meta" | "super" | "cmd" | "command" => Some(Modifier::Win),
        _ => None,
    }
}

pub fn is_modifier(name: &str) -> bool {
    modifier_for(name).is_some()
}

/// Display name for a raw (or storage-format) key name
pub fn normalize_key_name(name: &str) -> String {
    let lower = name.trim().to_lowercase();

    if let Some((_, display)) = KEY_NAME_MAP.iter().find(|(raw, _)| *raw == lower) {
        return (*display).to_string();
    }

    // Storage format keeps only the lowercased display name ("pageup", "num0")
    if let Some(display) = known_display_names().find(|d| d.to_lowercase() == lower) {
        return display.to_string();
    }

    let mut chars = lower.chars();
    match chars.next() {
        Some(first) if chars.as_str().is_empty() => first.to_uppercase().collect(),
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Display name of the main key of a raw hook event
pub fn resolve_key(name: &str, scancode: Option<u32>) -> String {
    scancode
        .and_then(key_for_scancode)
        .map(str::to_string)
        .unwrap_or_else(|| normalize_key_name(name))
}

fn known_display_names() -> impl Iterator<Item = &'static str> {
    KEY_NAME_MAP.iter().map(|(_, display)| *display)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_listed_modifier_is_recognized() {
        for name in MODIFIER_KEYS {
            assert!(is_modifier(name), "{} should be a modifier", name);
        }
        assert!(!is_modifier("a"));
        assert!(!is_modifier("space"));
        assert!(!is_modifier("left"));
    }

    #[test]
    fn test_modifier_normalization() {
        assert_eq!(modifier_for("Right Ctrl"), Some(Modifier::Ctrl));
        assert_eq!(modifier_for("ctrl droite"), Some(Modifier::Ctrl));
        assert_eq!(modifier_for("left maj"), Some(Modifier::Shift));
        assert_eq!(modifier_for("alt gr"), Some(Modifier::Alt));
        assert_eq!(modifier_for("left windows"), Some(Modifier::Win));
        assert_eq!(modifier_for("win"), Some(Modifier::Win));
    }

    #[test]
    fn test_scancodes_override_names() {
        // Numpad 0 with NumLock off reports "insert"
        assert_eq!(resolve_key("insert", Some(82)), "Num0");
        assert_eq!(resolve_key("+", Some(78)), "NumAdd");
        assert_eq!(resolve_key("f11", Some(87)), "F11");
        assert_eq!(resolve_key("insert", None), "Insert");
    }

    #[test]
    fn test_key_name_normalization() {
        assert_eq!(normalize_key_name("page up"), "PageUp");
        assert_eq!(normalize_key_name("numpad 7"), "Num7");
        assert_eq!(normalize_key_name("a"), "A");
        assert_eq!(normalize_key_name("é"), "É");
        assert_eq!(normalize_key_name("f5"), "F5");
        assert_eq!(normalize_key_name("space"), "Space");
    }

    #[test]
    fn test_storage_names_recover_display_case() {
        assert_eq!(normalize_key_name("pageup"), "PageUp");
        assert_eq!(normalize_key_name("num0"), "Num0");
        assert_eq!(normalize_key_name("numsubtract"), "NumSubtract");
        assert_eq!(normalize_key_name("printscreen"), "PrintScreen");
        assert_eq!(normalize_key_name("f12"), "F12");
    }
}
