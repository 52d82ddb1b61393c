//! Writing Assistant - hotkey-activated overlay
//!
//! Run with `writing-assistant` or `writing-assistant run` to start the app.
//! Use `writing-assistant capture-hotkey --save` to choose a new hotkey.
//! Use `writing-assistant autostart enable` to launch at login.

mod cli;

use clap::Parser;
use cli::{AutostartAction, Cli, Commands};
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;
use writing_assistant::app::{self, App};
use writing_assistant::autostart;
use writing_assistant::config::{self, ConfigStore};
use writing_assistant::events::EventBus;
use writing_assistant::hotkey::{self, CaptureOutcome, PreviewCallback, RdevHook};
use writing_assistant::input::{InputSourceService, SelectionOptions};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // The config file can turn on debug logging, so peek at it first
    let config_debug = config_file_debug(cli.config.as_deref());

    // Initialize logging
    let log_level = if cli.quiet {
        "error"
    } else {
        match cli.verbose {
            0 if cli.debug || config_debug => "debug",
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                EnvFilter::new(format!("writing_assistant={},warn", log_level))
            }),
        )
        .with_target(false)
        .init();

    // Load configuration
    let store = Arc::new(ConfigStore::open(cli.config.as_deref())?);
    tracing::debug!("Using config {:?}", store.path());

    // Apply environment and CLI overrides
    let hotkey_override = cli.hotkey.clone();
    let debug_override = cli.debug;
    store.apply_overrides(|config| {
        config.apply_env_overrides();
        if let Some(hotkey) = hotkey_override {
            config.hotkey_combination = Some(hotkey);
        }
        if debug_override {
            config.debug = true;
        }
    });

    // Run the appropriate command
    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => {
            app::run(store)?;
        }

        Commands::CaptureHotkey { timeout, save } => {
            capture_hotkey(store, timeout, save).await?;
        }

        Commands::Config => {
            show_config(&store)?;
        }

        Commands::Autostart { action } => {
            run_autostart(&store, action)?;
        }
    }

    Ok(())
}

fn config_file_debug(path: Option<&Path>) -> bool {
    path.map(Path::to_path_buf)
        .or_else(config::Config::default_path)
        .and_then(|path| config::load_config(&path).ok())
        .map(|config| config.debug)
        .unwrap_or(false)
}

/// Record a hotkey from the global hook and optionally save it
async fn capture_hotkey(store: Arc<ConfigStore>, timeout: u64, save: bool) -> anyhow::Result<()> {
    let current = store.get();
    println!(
        "Current hotkey: {}",
        hotkey::format_hotkey_for_display(current.active_hotkey())
    );

    let app = App::new(
        Arc::clone(&store),
        Arc::new(EventBus::new()),
        hotkey::create_backend(),
        InputSourceService::with_platform_defaults(SelectionOptions::from_config(&current)),
    );
    if save {
        // Saving goes through the same change path as the running app
        app.hotkeys().set_callback(Arc::new(|| {}));
    }

    let preview: PreviewCallback = Arc::new(|display| {
        print!("\r  {:<40}", display);
        let _ = std::io::stdout().flush();
    });

    println!("Press the new hotkey (waiting {}s)...", timeout);
    let mut capture = app.begin_capture(RdevHook::global(), Some(preview))?;
    tokio::time::sleep(Duration::from_secs(timeout)).await;
    let captured = capture.stop();
    println!();

    let outcome = if captured.is_empty() {
        CaptureOutcome::Cancel
    } else {
        app::capture_outcome(&captured)
    };

    match &outcome {
        CaptureOutcome::Save(combo) => {
            println!("Captured: {} ({})", combo.to_display(), combo.to_storage());
        }
        CaptureOutcome::Disable | CaptureOutcome::Cancel => {
            println!("No hotkey captured.");
        }
    }

    if save {
        if matches!(outcome, CaptureOutcome::Save(_)) && app.finish_capture(outcome) {
            println!("Saved to {:?}", store.path());
        } else {
            app.finish_capture(CaptureOutcome::Cancel);
            println!("Nothing saved.");
        }
    }

    app.shutdown();
    Ok(())
}

/// Print the effective configuration
fn show_config(store: &ConfigStore) -> anyhow::Result<()> {
    let config = store.get();
    println!("# {}", store.path().display());
    println!("{}", serde_json::to_string_pretty(&config)?);
    println!(
        "\n# hotkey: {}",
        hotkey::format_hotkey_for_display(config.active_hotkey())
    );
    Ok(())
}

fn run_autostart(store: &ConfigStore, action: AutostartAction) -> anyhow::Result<()> {
    match action {
        AutostartAction::Enable => {
            autostart::set_and_persist(store, true)?;
            println!("Autostart enabled: {}", autostart::entry_location());
        }
        AutostartAction::Disable => {
            autostart::set_and_persist(store, false)?;
            println!("Autostart disabled");
        }
        AutostartAction::Status => {
            let enabled = autostart::is_autostart_enabled();
            println!("Autostart: {}", if enabled { "enabled" } else { "disabled" });
            println!("Setting run_on_startup: {}", store.get().run_on_startup);
            println!("Entry: {}", autostart::entry_location());
        }
    }
    Ok(())
}
