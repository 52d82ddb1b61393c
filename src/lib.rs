//! Writing Assistant: a hotkey-activated overlay window
//!
//! This library provides the core functionality for:
//! - Parsing, capturing and registering a global hotkey (rdev hook)
//! - Debouncing hotkey fires so one press toggles the window once
//! - Showing and hiding the native window (tao) in a fixed order
//! - Capturing the user's selection with a simulated copy (enigo + arboard)
//!   while keeping their clipboard intact
//! - Turning selection and clipboard into attachments, selection first
//!
//! # Architecture
//!
//! ```text
//!          ┌──────────────┐   fire    ┌──────────────┐
//!          │    Hotkey    │ ────────▶ │   Trigger    │  debounce + try-lock
//!          │ (rdev hook)  │           │  Controller  │
//!          └──────────────┘           └──────────────┘
//!                                            │ toggle
//!                                            ▼
//!                                   ┌──────────────────┐
//!                                   │  WindowManager   │
//!                                   └──────────────────┘
//!                                    │ WindowPreShow  │ show + focus
//!                                    ▼                ▼
//!                           ┌──────────────┐   ┌──────────────┐
//!                           │ Input Source │   │  tao window  │
//!                           │   Service    │   │ (event loop) │
//!                           └──────────────┘   └──────────────┘
//!                                    │ InputState
//!                                    ▼
//!                           ┌──────────────┐
//!                           │ Attachments  │  selection > clipboard
//!                           └──────────────┘
//! ```
//!
//! Components talk through the [`events::EventBus`]; [`app`] wires them.

pub mod app;
pub mod attachments;
pub mod autostart;
pub mod config;
pub mod error;
pub mod events;
pub mod hotkey;
pub mod input;
pub mod state;
pub mod tray;
pub mod trigger;
pub mod window;

pub use app::App;
pub use config::{Config, ConfigStore};
pub use error::{AppError, Result};
pub use events::{AppEvent, EventBus, EventKind};
pub use trigger::{TriggerController, TriggerOutcome};
pub use window::WindowManager;
