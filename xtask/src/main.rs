//! Development tasks for writing-assistant
//!
//! Usage:
//!   cargo xtask install [--prefix DIR]  Install release binary and desktop entry
//!   cargo xtask uninstall [--prefix DIR]
//!   cargo xtask dist                    Stage binary and desktop entry in target/dist

use anyhow::Context;
use std::env;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitCode};

const BINARY: &str = "writing-assistant";
const DEFAULT_PREFIX: &str = "/usr/local";

fn main() -> ExitCode {
    let args: Vec<String> = env::args().skip(1).collect();

    if args.is_empty() {
        print_help();
        return ExitCode::SUCCESS;
    }

    let prefix = args
        .iter()
        .position(|a| a == "--prefix")
        .and_then(|i| args.get(i + 1))
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_PREFIX));

    let result = match args[0].as_str() {
        "install" => install(&prefix),
        "uninstall" => uninstall(&prefix),
        "dist" => dist(),
        "help" | "--help" | "-h" => {
            print_help();
            Ok(())
        }
        cmd => {
            eprintln!("Unknown command: {}", cmd);
            print_help();
            Err(anyhow::anyhow!("Unknown command"))
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn print_help() {
    eprintln!(
        r#"
writing-assistant development tasks

Usage: cargo xtask <COMMAND> [OPTIONS]

Commands:
  install    Build release binary, install it and its desktop entry (requires sudo)
  uninstall  Remove the installed binary and desktop entry (requires sudo)
  dist       Build the release binary and stage it with its desktop entry in target/dist

Options:
  --prefix DIR   Installation prefix (default: /usr/local)

Examples:
  cargo xtask install                  # Install to /usr/local
  cargo xtask install --prefix /usr    # Install to /usr
  cargo xtask dist                     # Stage target/dist
  cargo xtask uninstall                # Remove installed files
"#
    );
}

/// Get the project root directory
fn project_root() -> anyhow::Result<PathBuf> {
    let dir = match env::var("CARGO_MANIFEST_DIR") {
        Ok(dir) => PathBuf::from(dir),
        Err(_) => env::current_dir().context("Cannot determine current directory")?,
    };

    // xtask is in a subdirectory, go up one level
    Ok(dir.parent().unwrap_or(&dir).to_path_buf())
}

fn cargo_release(root: &Path) -> anyhow::Result<PathBuf> {
    let status = Command::new("cargo")
        .args(["build", "--release"])
        .current_dir(root)
        .status()
        .context("Failed to run cargo")?;
    if !status.success() {
        anyhow::bail!("Build failed");
    }

    let binary = root.join("target/release").join(BINARY);
    if !binary.exists() {
        anyhow::bail!("Binary not found at {:?}", binary);
    }
    Ok(binary)
}

fn sudo(args: &[&str]) -> anyhow::Result<()> {
    let status = Command::new("sudo")
        .args(args)
        .status()
        .context("Failed to run sudo")?;
    if !status.success() {
        anyhow::bail!("'{}' failed (sudo required)", args.join(" "));
    }
    Ok(())
}

/// Application menu entry, so the assistant can be started from the launcher
fn desktop_entry(binary: &Path) -> String {
    format!(
        r#"[Desktop Entry]
Type=Application
Name=Writing Assistant
Comment=Hotkey-activated writing assistant
Exec={}
Icon=writing-assistant
Terminal=false
Categories=Utility;TextTools;
"#,
        binary.display()
    )
}

/// Build release binary and install it under the prefix
fn install(prefix: &Path) -> anyhow::Result<()> {
    let root = project_root()?;

    println!("==> Building release binary...");
    let binary = cargo_release(&root)?;

    let target = prefix.join("bin").join(BINARY);
    let target_str = target.to_string_lossy();
    println!("==> Installing to {}...", target_str);
    sudo(&["install", "-Dm755", &binary.to_string_lossy(), &target_str])?;

    if cfg!(target_os = "linux") {
        let staged = env::temp_dir().join(format!("{}.desktop", BINARY));
        std::fs::write(&staged, desktop_entry(&target))
            .with_context(|| format!("Failed to write {:?}", staged))?;

        let entry = prefix
            .join("share/applications")
            .join(format!("{}.desktop", BINARY));
        println!("==> Installing desktop entry {}...", entry.display());
        sudo(&[
            "install",
            "-Dm644",
            &staged.to_string_lossy(),
            &entry.to_string_lossy(),
        ])?;
        let _ = std::fs::remove_file(&staged);
    }

    println!("==> Installed successfully!");
    println!();
    println!("Installed: {}", target_str);

    // Show version
    let _ = Command::new(&target).arg("--version").status();

    Ok(())
}

/// Remove installed files from the prefix
fn uninstall(prefix: &Path) -> anyhow::Result<()> {
    let target = prefix.join("bin").join(BINARY);
    let entry = prefix
        .join("share/applications")
        .join(format!("{}.desktop", BINARY));

    println!("==> Removing {}...", target.display());
    sudo(&[
        "rm",
        "-f",
        &target.to_string_lossy(),
        &entry.to_string_lossy(),
    ])?;

    println!("==> Uninstalled successfully!");
    println!("    Run `{} autostart disable` first if login startup was enabled.", BINARY);
    Ok(())
}

/// Build the release binary and stage it with its desktop entry
fn dist() -> anyhow::Result<()> {
    let root = project_root()?;

    println!("==> Building distribution binary...");
    let binary = cargo_release(&root)?;

    let dist = root.join("target/dist");
    let bin_dir = dist.join("bin");
    let apps_dir = dist.join("share/applications");
    for dir in [&bin_dir, &apps_dir] {
        std::fs::create_dir_all(dir).with_context(|| format!("Failed to create {:?}", dir))?;
    }

    let staged = bin_dir.join(BINARY);
    std::fs::copy(&binary, &staged)
        .with_context(|| format!("Failed to copy {:?} to {:?}", binary, staged))?;

    // Exec points at the default install location
    let installed = Path::new(DEFAULT_PREFIX).join("bin").join(BINARY);
    let entry = apps_dir.join(format!("{}.desktop", BINARY));
    std::fs::write(&entry, desktop_entry(&installed))
        .with_context(|| format!("Failed to write {:?}", entry))?;

    println!("==> Staged in {}", dist.display());
    let _ = Command::new(&staged).arg("--version").status();

    Ok(())
}
