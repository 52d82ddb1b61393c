//! Configuration for writing-assistant
//!
//! Settings live in a single JSON document under the platform config
//! directory (`~/.config/writing-assistant/config.json` on Linux). Every
//! field has a default, so a partial or missing file is valid. Keys this
//! version does not know about are preserved across saves.
//!
//! Environment overrides:
//! - `WRITING_ASSISTANT_HOTKEY`: hotkey in storage format (`"none"` disables)
//! - `WRITING_ASSISTANT_LANGUAGE`: UI language code
//! - `WRITING_ASSISTANT_DEBUG`: `1`/`true` enables debug logging

use crate::error::ConfigError;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Hotkey used when the settings file does not specify one
pub const DEFAULT_HOTKEY: &str = "ctrl+space";

/// Settings file name inside the config directory
pub const CONFIG_FILE_NAME: &str = "config.json";

/// Application settings
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// Global hotkey in storage format ("ctrl+shift+a").
    /// `null` or an empty string disables the hotkey.
    pub hotkey_combination: Option<String>,

    /// Minimum seconds between two accepted hotkey triggers
    pub min_trigger_interval: f64,

    /// Seconds to wait after startup before installing the hotkey hook
    pub hotkey_setup_delay: f64,

    /// Keep the window hidden until the first hotkey press
    pub window_start_hidden: bool,

    pub window_resizable: bool,
    pub window_frameless: bool,
    pub window_width: f64,
    pub window_height: f64,

    pub dark_mode: bool,

    /// Active UI language code
    pub language: String,

    /// Language codes offered in the settings UI
    pub available_languages: Vec<String>,

    /// Enable debug logging
    pub debug: bool,

    /// Launch automatically at login
    pub run_on_startup: bool,

    /// Seconds to wait after the simulated copy before reading the clipboard
    pub selection_sleep_duration: f64,

    /// Number of copy attempts before giving up on a selection
    pub selection_max_retries: u32,

    /// Seconds to wait between copy attempts
    pub selection_retry_delay: f64,

    /// Keys owned by other components or newer versions
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            hotkey_combination: Some(DEFAULT_HOTKEY.to_string()),
            min_trigger_interval: 0.5,
            hotkey_setup_delay: 1.0,
            window_start_hidden: true,
            window_resizable: true,
            window_frameless: false,
            window_width: 800.0,
            window_height: 600.0,
            dark_mode: true,
            language: "en".to_string(),
            available_languages: vec!["en".to_string(), "fr".to_string()],
            debug: false,
            run_on_startup: false,
            selection_sleep_duration: 0.25,
            selection_max_retries: 3,
            selection_retry_delay: 0.15,
            extra: Map::new(),
        }
    }
}

/// Convert a user-supplied number of seconds into a Duration.
/// Negative, NaN and out-of-range values collapse to zero.
pub fn seconds(value: f64) -> Duration {
    Duration::try_from_secs_f64(value).unwrap_or(Duration::ZERO)
}

impl Config {
    /// Get the default config file path
    pub fn default_path() -> Option<PathBuf> {
        Self::config_dir().map(|dir| dir.join(CONFIG_FILE_NAME))
    }

    /// Get the config directory path
    pub fn config_dir() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "writing-assistant")
            .map(|dirs| dirs.config_dir().to_path_buf())
    }

    /// Get the runtime directory for ephemeral files (instance lock)
    pub fn runtime_dir() -> PathBuf {
        std::env::var("XDG_RUNTIME_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| std::env::temp_dir())
            .join("writing-assistant")
    }

    /// Active hotkey in storage format, or None when disabled
    pub fn active_hotkey(&self) -> Option<&str> {
        self.hotkey_combination
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty() && !s.eq_ignore_ascii_case("none"))
    }

    pub fn min_trigger_interval(&self) -> Duration {
        seconds(self.min_trigger_interval)
    }

    pub fn hotkey_setup_delay(&self) -> Duration {
        seconds(self.hotkey_setup_delay)
    }

    /// Apply `WRITING_ASSISTANT_*` environment overrides
    pub fn apply_env_overrides(&mut self) {
        if let Ok(hotkey) = std::env::var("WRITING_ASSISTANT_HOTKEY") {
            self.hotkey_combination = Some(hotkey);
        }
        if let Ok(language) = std::env::var("WRITING_ASSISTANT_LANGUAGE") {
            if !language.trim().is_empty() {
                self.language = language.trim().to_string();
            }
        }
        if let Ok(debug) = std::env::var("WRITING_ASSISTANT_DEBUG") {
            self.debug = matches!(debug.to_lowercase().as_str(), "1" | "true" | "yes" | "on");
        }
    }
}

/// Load configuration from a file, with defaults for missing values.
/// A missing file is not an error.
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    if !path.exists() {
        tracing::debug!("Config file not found at {:?}, using defaults", path);
        return Ok(Config::default());
    }

    tracing::debug!("Loading config from {:?}", path);
    let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    if contents.trim().is_empty() {
        return Ok(Config::default());
    }

    serde_json::from_str(&contents).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Save configuration to a file.
///
/// Known fields are merged over whatever JSON object is already on disk,
/// so keys written by other components survive.
pub fn save_config(config: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|source| ConfigError::Write {
            path: parent.to_path_buf(),
            source,
        })?;
    }

    let mut document = std::fs::read_to_string(path)
        .ok()
        .and_then(|contents| serde_json::from_str::<Map<String, Value>>(&contents).ok())
        .unwrap_or_default();

    match serde_json::to_value(config)? {
        Value::Object(fields) => document.extend(fields),
        other => tracing::warn!("Config serialized to a non-object value: {}", other),
    }

    let contents = serde_json::to_string_pretty(&Value::Object(document))?;
    std::fs::write(path, contents).map_err(|source| ConfigError::Write {
        path: path.to_path_buf(),
        source,
    })
}

/// Top-level JSON fields of a config, keyed as in the settings file
fn config_fields(config: &Config) -> Result<Map<String, Value>, ConfigError> {
    match serde_json::to_value(config)? {
        Value::Object(fields) => Ok(fields),
        other => {
            tracing::warn!("Config serialized to a non-object value: {}", other);
            Ok(Map::new())
        }
    }
}

/// Fields whose value differs between `before` and `after`
fn changed_fields(before: &Config, after: &Config) -> Result<Map<String, Value>, ConfigError> {
    let before = config_fields(before)?;
    Ok(config_fields(after)?
        .into_iter()
        .filter(|(key, value)| before.get(key) != Some(value))
        .collect())
}

/// `config` with `fields` written over it
fn with_fields(config: &Config, fields: &Map<String, Value>) -> Result<Config, ConfigError> {
    let mut merged = config_fields(config)?;
    merged.extend(fields.iter().map(|(k, v)| (k.clone(), v.clone())));
    Ok(serde_json::from_value(Value::Object(merged))?)
}

/// Shared, persisted settings.
///
/// Readers get a snapshot; writers go through [`ConfigStore::update`], which
/// persists before returning. Overrides from the command line and the
/// environment sit in a separate overlay that is never written to disk.
#[derive(Debug)]
pub struct ConfigStore {
    path: PathBuf,
    /// Settings as they are on disk
    base: RwLock<Config>,
    /// Fields overridden for this run only
    overrides: RwLock<Map<String, Value>>,
    /// Serializes `update` and `apply_overrides`
    writer: Mutex<()>,
}

impl ConfigStore {
    /// Open the settings file, creating it with defaults if missing.
    /// A file that does not parse is left alone and defaults are used.
    pub fn open(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => Config::default_path().ok_or(ConfigError::NoConfigDir)?,
        };

        let store = Self::with_config(path, Config::default());
        match store.load() {
            Ok(()) => {}
            Err(e @ ConfigError::Parse { .. }) => {
                tracing::warn!("{}. Using defaults until settings are changed.", e);
            }
            Err(e) => return Err(e),
        }
        Ok(store)
    }

    /// Build a store around an existing config without touching the disk
    pub fn with_config(path: PathBuf, config: Config) -> Self {
        Self {
            path,
            base: RwLock::new(config),
            overrides: RwLock::new(Map::new()),
            writer: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reload from disk. A missing file is written out with the defaults.
    /// Overrides stay in place.
    pub fn load(&self) -> Result<(), ConfigError> {
        let exists = self.path.exists();
        let config = load_config(&self.path)?;
        *self.base.write() = config;

        if !exists {
            tracing::info!("Creating default config at {:?}", self.path);
            self.save()?;
        }
        Ok(())
    }

    /// Write the persisted settings, without overrides
    pub fn save(&self) -> Result<(), ConfigError> {
        let config = self.base.read().clone();
        save_config(&config, &self.path)
    }

    /// Snapshot of the effective settings (file plus overrides)
    pub fn get(&self) -> Config {
        let base = self.base.read().clone();
        let overrides = self.overrides.read();
        if overrides.is_empty() {
            return base;
        }
        match with_fields(&base, &overrides) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("Ignoring config overrides: {}", e);
                base
            }
        }
    }

    /// Mutate the settings and persist them.
    ///
    /// `f` sees the effective settings. Fields it changes are written to
    /// disk and drop any override of the same field.
    pub fn update<F>(&self, f: F) -> Result<(), ConfigError>
    where
        F: FnOnce(&mut Config),
    {
        let _writer = self.writer.lock();
        let current = self.get();
        let mut next = current.clone();
        f(&mut next);
        let changed = changed_fields(&current, &next)?;

        {
            let mut base = self.base.write();
            *base = with_fields(&base, &changed)?;
        }
        self.overrides
            .write()
            .retain(|key, _| !changed.contains_key(key));
        self.save()
    }

    /// Override settings for this run only (CLI and environment)
    pub fn apply_overrides<F>(&self, f: F)
    where
        F: FnOnce(&mut Config),
    {
        let _writer = self.writer.lock();
        let current = self.get();
        let mut next = current.clone();
        f(&mut next);
        match changed_fields(&current, &next) {
            Ok(changed) => self.overrides.write().extend(changed),
            Err(e) => tracing::warn!("Ignoring config overrides: {}", e),
        }
    }

    /// Whether `field` is currently overridden for this run
    pub fn is_overridden(&self, field: &str) -> bool {
        self.overrides.read().contains_key(field)
    }
}
