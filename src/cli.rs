//! Command-line interface definitions for writing-assistant

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "writing-assistant")]
#[command(author, version, about = "Hotkey-activated writing assistant overlay")]
#[command(long_about = "
Writing Assistant keeps a hidden window one global hotkey away.
Pressing the hotkey captures the text selected in the application you are
working in (or the clipboard, when nothing is selected) and then shows the
assistant window with that text attached. Pressing it again hides the window.

USAGE:
  Run: writing-assistant (starts the assistant in the system tray)
  Press Ctrl+Space (default) anywhere to show or hide the window.
  Run: writing-assistant capture-hotkey --save (to choose another hotkey)
")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<std::path::PathBuf>,

    /// Increase verbosity (-v = debug, -vv = trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Quiet mode (errors only)
    #[arg(short, long)]
    pub quiet: bool,

    /// Enable debug logging (same as debug = true in the config file)
    #[arg(long)]
    pub debug: bool,

    /// Override hotkey for this run (e.g., ctrl+space, "Ctrl + Shift + A", none)
    #[arg(long, value_name = "COMBO")]
    pub hotkey: Option<String>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the assistant (default if no command specified)
    Run,

    /// Record a new hotkey by pressing it
    CaptureHotkey {
        /// Seconds to wait for the combination
        #[arg(long, default_value = "5")]
        timeout: u64,

        /// Save the captured hotkey to the config file
        #[arg(long)]
        save: bool,
    },

    /// Show the effective configuration
    Config,

    /// Launch at login
    Autostart {
        #[command(subcommand)]
        action: AutostartAction,
    },
}

#[derive(Subcommand)]
pub enum AutostartAction {
    /// Start the assistant when you log in
    Enable,

    /// Stop starting the assistant at login
    Disable,

    /// Show whether the assistant starts at login
    Status,
}
