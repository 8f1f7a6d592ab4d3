//! Path utilities for tether
//!
//! Handles XDG Base Directory specification compliance for config and state
//! directories, and locates the bridge-info files written by the counterpart.

use std::path::PathBuf;

use directories::{BaseDirs, ProjectDirs};

/// Application identifier for XDG directories
const APP_NAME: &str = "tether";

/// Bridge-info location relative to the game directory
const BRIDGE_INFO_RELATIVE: [&str; 3] = ["config", "pyritone_bridge", "bridge-info.json"];

/// Get project directories
fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("", "", APP_NAME)
}

/// Get the configuration directory
///
/// Location: `$XDG_CONFIG_HOME/tether` or `~/.config/tether`
pub fn config_dir() -> PathBuf {
    project_dirs()
        .map(|p| p.config_dir().to_path_buf())
        .unwrap_or_else(fallback_config_dir)
}

/// Get the main configuration file path
///
/// Location: `$XDG_CONFIG_HOME/tether/config.toml`
pub fn config_file() -> PathBuf {
    config_dir().join("config.toml")
}

/// Get the state directory
///
/// Location: `$XDG_STATE_HOME/tether` or `~/.local/state/tether`
pub fn state_dir() -> PathBuf {
    project_dirs()
        .and_then(|p| p.state_dir().map(|d| d.to_path_buf()))
        .unwrap_or_else(fallback_state_dir)
}

/// Get the log directory
///
/// Location: `$XDG_STATE_HOME/tether/log`
pub fn log_dir() -> PathBuf {
    state_dir().join("log")
}

/// Default game directory of the host application
///
/// `%APPDATA%/.minecraft` on Windows, `~/Library/Application Support/minecraft`
/// on macOS, `$XDG_CONFIG_HOME/minecraft` when set, `~/.minecraft` otherwise.
pub fn game_dir() -> PathBuf {
    if let Some(appdata) = std::env::var_os("APPDATA") {
        return PathBuf::from(appdata).join(".minecraft");
    }
    if let Some(xdg) = std::env::var_os("XDG_CONFIG_HOME") {
        return PathBuf::from(xdg).join("minecraft");
    }
    if cfg!(target_os = "macos") {
        return home_dir()
            .join("Library")
            .join("Application Support")
            .join("minecraft");
    }
    home_dir().join(".minecraft")
}

/// Bridge-info path under a game directory (or a development `run` directory)
pub fn bridge_info_in(root: &std::path::Path) -> PathBuf {
    BRIDGE_INFO_RELATIVE
        .iter()
        .fold(root.to_path_buf(), |path, part| path.join(part))
}

/// Candidate bridge-info files, in lookup order
///
/// The installed game directory comes first, followed by development
/// checkouts relative to the working directory.
pub fn bridge_info_candidates() -> Vec<PathBuf> {
    let mut candidates = vec![bridge_info_in(&game_dir())];

    if let Ok(cwd) = std::env::current_dir() {
        candidates.push(bridge_info_in(&cwd.join("mod").join("run")));
        if let Some(parent) = cwd.parent() {
            candidates.push(bridge_info_in(&parent.join("mod").join("run")));
        }
    }

    let mut unique = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        if !unique.contains(&candidate) {
            unique.push(candidate);
        }
    }
    unique
}

// Fallback implementations when ProjectDirs is unavailable

fn home_dir() -> PathBuf {
    BaseDirs::new()
        .map(|dirs| dirs.home_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("/tmp"))
}

fn fallback_config_dir() -> PathBuf {
    home_dir().join(".config").join(APP_NAME)
}

fn fallback_state_dir() -> PathBuf {
    home_dir().join(".local").join("state").join(APP_NAME)
}
