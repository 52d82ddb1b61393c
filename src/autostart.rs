//! Launch at login
//!
//! Linux uses an XDG autostart entry (`~/.config/autostart/*.desktop`),
//! Windows a value under the user's `Run` registry key. The
//! `run_on_startup` setting is the source of truth; [`sync_with_settings`]
//! brings the OS entry in line with it at startup.

use crate::config::ConfigStore;
use crate::error::UiError;
use std::path::PathBuf;
#[cfg(windows)]
use std::process::Command;

pub const DESKTOP_FILE_NAME: &str = "writing-assistant.desktop";

const REGISTRY_PATH: &str = r"HKCU\Software\Microsoft\Windows\CurrentVersion\Run";
const REGISTRY_VALUE: &str = "WritingAssistant";

/// Command line that relaunches this executable
pub fn startup_command() -> Result<String, UiError> {
    let exe = std::env::current_exe()
        .map_err(|e| UiError::Autostart(format!("Cannot locate executable: {}", e)))?;
    Ok(format!("\"{}\"", exe.display()))
}

/// Generate the XDG autostart entry
pub fn desktop_entry(exec: &str) -> String {
    format!(
        r#"[Desktop Entry]
Type=Application
Name=Writing Assistant
Comment=Hotkey-activated writing assistant
Exec={exec}
Icon=writing-assistant
Terminal=false
StartupNotify=false
X-GNOME-Autostart-enabled=true
Hidden=false
"#
    )
}

/// `$XDG_CONFIG_HOME/autostart`, falling back to the platform config dir
pub fn linux_autostart_dir() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .ok()
        .filter(|dir| !dir.is_empty())
        .map(PathBuf::from)
        .or_else(|| directories::BaseDirs::new().map(|d| d.config_dir().to_path_buf()))
        .unwrap_or_else(|| PathBuf::from("~/.config"))
        .join("autostart")
}

/// XDG autostart entry in a given directory
#[derive(Debug, Clone)]
pub struct DesktopEntryAutostart {
    dir: PathBuf,
    exec: String,
}

impl DesktopEntryAutostart {
    pub fn new(dir: PathBuf, exec: String) -> Self {
        Self { dir, exec }
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join(DESKTOP_FILE_NAME)
    }

    pub fn enable(&self) -> Result<(), UiError> {
        std::fs::create_dir_all(&self.dir)
            .and_then(|()| std::fs::write(self.path(), desktop_entry(&self.exec)))
            .map_err(|e| UiError::Autostart(format!("Failed to write {:?}: {}", self.path(), e)))?;
        tracing::info!("Autostart enabled: {:?}", self.path());
        Ok(())
    }

    /// Remove the entry. A missing entry is not an error.
    pub fn disable(&self) -> Result<(), UiError> {
        match std::fs::remove_file(self.path()) {
            Ok(()) => {
                tracing::info!("Autostart disabled: removed {:?}", self.path());
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(UiError::Autostart(format!(
                "Failed to remove {:?}: {}",
                self.path(),
                e
            ))),
        }
    }

    /// True only when the entry exists and launches this executable
    pub fn is_enabled(&self) -> bool {
        let exec_line = format!("Exec={}", self.exec);
        std::fs::read_to_string(self.path())
            .map(|contents| contents.lines().any(|line| line == exec_line))
            .unwrap_or(false)
    }

    pub fn set(&self, enable: bool) -> Result<(), UiError> {
        if enable {
            self.enable()
        } else {
            self.disable()
        }
    }
}

#[cfg(all(unix, not(target_os = "macos")))]
fn desktop_autostart() -> Result<DesktopEntryAutostart, UiError> {
    Ok(DesktopEntryAutostart::new(
        linux_autostart_dir(),
        startup_command()?,
    ))
}

#[cfg(windows)]
fn run_reg(args: &[&str]) -> Result<std::process::Output, UiError> {
    Command::new("reg")
        .args(args)
        .output()
        .map_err(|e| UiError::Autostart(format!("Failed to run reg.exe: {}", e)))
}

/// Enable or disable launch at login for the current platform
pub fn set_autostart(enable: bool) -> Result<(), UiError> {
    #[cfg(windows)]
    {
        let output = if enable {
            let command = startup_command()?;
            run_reg(&[
                "add",
                REGISTRY_PATH,
                "/v",
                REGISTRY_VALUE,
                "/t",
                "REG_SZ",
                "/d",
                &command,
                "/f",
            ])?
        } else {
            if !is_autostart_enabled() {
                return Ok(());
            }
            run_reg(&["delete", REGISTRY_PATH, "/v", REGISTRY_VALUE, "/f"])?
        };

        if !output.status.success() {
            return Err(UiError::Autostart(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }
        tracing::info!("Autostart {}", if enable { "enabled" } else { "disabled" });
        Ok(())
    }

    #[cfg(all(unix, not(target_os = "macos")))]
    {
        desktop_autostart()?.set(enable)
    }

    #[cfg(target_os = "macos")]
    {
        let _ = enable;
        Err(UiError::Unsupported("Autostart"))
    }
}

/// Whether the OS will launch us at login
pub fn is_autostart_enabled() -> bool {
    #[cfg(windows)]
    {
        run_reg(&["query", REGISTRY_PATH, "/v", REGISTRY_VALUE])
            .map(|output| output.status.success())
            .unwrap_or(false)
    }

    #[cfg(all(unix, not(target_os = "macos")))]
    {
        desktop_autostart().map(|a| a.is_enabled()).unwrap_or(false)
    }

    #[cfg(target_os = "macos")]
    {
        false
    }
}

/// Make the OS entry match the `run_on_startup` setting.
/// Returns false when the entry could not be changed.
pub fn sync_with_settings(store: &ConfigStore) -> bool {
    let wanted = store.get().run_on_startup;
    if is_autostart_enabled() == wanted {
        tracing::debug!("Autostart already {}", if wanted { "enabled" } else { "disabled" });
        return true;
    }

    match set_autostart(wanted) {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!("Could not sync autostart with settings: {}", e);
            false
        }
    }
}

/// Change the OS entry and persist the setting
pub fn set_and_persist(store: &ConfigStore, enable: bool) -> crate::error::Result<()> {
    set_autostart(enable)?;
    store.update(|config| config.run_on_startup = enable)?;
    Ok(())
}

/// Where the login entry lives, for status output
pub fn entry_location() -> String {
    if cfg!(windows) {
        format!(r"{}\{}", REGISTRY_PATH, REGISTRY_VALUE)
    } else {
        linux_autostart_dir()
            .join(DESKTOP_FILE_NAME)
            .display()
            .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_desktop_entry_content() {
        let entry = desktop_entry("\"/opt/writing-assistant/writing-assistant\"");
        assert!(entry.starts_with("[Desktop Entry]\n"));
        assert!(entry.contains("Exec=\"/opt/writing-assistant/writing-assistant\"\n"));
        assert!(entry.contains("X-GNOME-Autostart-enabled=true"));
    }

    #[test]
    fn test_enable_disable_cycle() {
        let dir = TempDir::new().unwrap();
        let autostart = DesktopEntryAutostart::new(dir.path().join("autostart"), "/usr/bin/wa".to_string());

        assert!(!autostart.is_enabled());
        autostart.enable().unwrap();
        assert!(autostart.is_enabled());

        autostart.disable().unwrap();
        assert!(!autostart.is_enabled());
        // Disabling twice is fine
        autostart.set(false).unwrap();
    }

    #[test]
    fn test_foreign_entry_is_not_ours() {
        let dir = TempDir::new().unwrap();
        let ours = DesktopEntryAutostart::new(dir.path().to_path_buf(), "/usr/bin/wa".to_string());
        let other = DesktopEntryAutostart::new(dir.path().to_path_buf(), "/opt/old/wa".to_string());

        other.enable().unwrap();
        assert!(other.is_enabled());
        assert!(!ours.is_enabled());

        // Enabling rewrites the stale entry
        ours.enable().unwrap();
        assert!(ours.is_enabled());
    }

    #[test]
    fn test_startup_command_is_quoted() {
        let command = startup_command().unwrap();
        assert!(command.starts_with('"') && command.ends_with('"'));
    }
}
