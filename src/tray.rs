//! System tray icon
//!
//! A minimal menu: show/hide the window, toggle launch at login, quit.
//! The tray lives on the event loop thread; menu clicks arrive through
//! [`MenuEvent::receiver`] and are mapped to a [`TrayAction`] for the
//! application to carry out.

use crate::error::UiError;
use tray_icon::menu::{CheckMenuItem, Menu, MenuEvent, MenuItem, PredefinedMenuItem};
use tray_icon::{Icon, TrayIcon, TrayIconBuilder};

/// Menu item IDs
pub mod menu_ids {
    pub const TOGGLE_WINDOW: &str = "toggle_window";
    pub const AUTOSTART: &str = "autostart";
    pub const QUIT: &str = "quit";
}

const ICON_SIZE: u32 = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrayAction {
    ToggleWindow,
    ToggleAutostart,
    Quit,
}

/// Map a clicked menu item to its action
pub fn action_for_id(id: &str) -> Option<TrayAction> {
    match id {
        menu_ids::TOGGLE_WINDOW => Some(TrayAction::ToggleWindow),
        menu_ids::AUTOSTART => Some(TrayAction::ToggleAutostart),
        menu_ids::QUIT => Some(TrayAction::Quit),
        _ => None,
    }
}

pub fn action_for_event(event: &MenuEvent) -> Option<TrayAction> {
    action_for_id(event.id().0.as_str())
}

pub struct Tray {
    _icon: TrayIcon,
    autostart_item: CheckMenuItem,
}

impl Tray {
    /// Reflect the autostart state in the check item
    pub fn set_autostart_checked(&self, enabled: bool) {
        self.autostart_item.set_checked(enabled);
    }
}

fn menu_error(e: impl std::fmt::Display) -> UiError {
    UiError::Tray(e.to_string())
}

/// Filled circle in the accent color on a transparent background
fn icon_rgba(size: u32) -> Vec<u8> {
    let center = (size as f32 - 1.0) / 2.0;
    let radius = size as f32 / 2.0 - 1.0;
    let mut rgba = Vec::with_capacity((size * size * 4) as usize);

    for y in 0..size {
        for x in 0..size {
            let dx = x as f32 - center;
            let dy = y as f32 - center;
            let alpha = if dx * dx + dy * dy <= radius * radius {
                255
            } else {
                0
            };
            rgba.extend_from_slice(&[0x3b, 0x82, 0xf6, alpha]);
        }
    }
    rgba
}

/// Create the tray icon and its menu. Must run on the event loop thread.
pub fn build(autostart_enabled: bool) -> Result<Tray, UiError> {
    let menu = Menu::new();

    let toggle_item = MenuItem::with_id(menu_ids::TOGGLE_WINDOW, "Show/Hide", true, None);
    let autostart_item = CheckMenuItem::with_id(
        menu_ids::AUTOSTART,
        "Run on Startup",
        true,
        autostart_enabled,
        None,
    );
    let quit_item = MenuItem::with_id(menu_ids::QUIT, "Quit", true, None);

    menu.append(&toggle_item).map_err(menu_error)?;
    menu.append(&autostart_item).map_err(menu_error)?;
    menu.append(&PredefinedMenuItem::separator())
        .map_err(menu_error)?;
    menu.append(&quit_item).map_err(menu_error)?;

    let icon = Icon::from_rgba(icon_rgba(ICON_SIZE), ICON_SIZE, ICON_SIZE).map_err(menu_error)?;

    let tray = TrayIconBuilder::new()
        .with_tooltip("Writing Assistant")
        .with_icon(icon)
        .with_menu(Box::new(menu))
        .build()
        .map_err(menu_error)?;

    Ok(Tray {
        _icon: tray,
        autostart_item,
    })
}
