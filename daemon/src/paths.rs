/// Canonical file paths for the agent's data files.
///
/// Both files live under `<config dir>/TransmissionTray/` (`%APPDATA%` on Windows):
///   - config.toml  Written by the settings UI, read (and watched) by the agent.
///   - status.toml  Written by the agent, read by the tray GUI.
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

const APP_DIR_NAME: &str = "TransmissionTray";
pub const CONFIG_FILE_NAME: &str = "config.toml";
pub const STATUS_FILE_NAME: &str = "status.toml";

/// Returns the per-user application data directory.
pub fn app_data_dir() -> Result<PathBuf> {
    let base = dirs::config_dir().context("no per-user configuration directory on this platform")?;
    Ok(base.join(APP_DIR_NAME))
}

/// Returns the full path to the config file.
pub fn config_file_path() -> Result<PathBuf> {
    Ok(app_data_dir()?.join(CONFIG_FILE_NAME))
}

/// Status file sits next to whichever config file is in use.
pub fn status_file_path_for(config_path: &Path) -> PathBuf {
    match config_path.parent() {
        Some(dir) => dir.join(STATUS_FILE_NAME),
        None => PathBuf::from(STATUS_FILE_NAME),
    }
}

/// Makes a user-supplied config path absolute so its parent directory can be
/// watched. A bare `config.toml` otherwise has an empty parent.
pub fn resolve_config_path(path: &Path) -> Result<PathBuf> {
    std::path::absolute(path)
        .with_context(|| format!("Cannot resolve config path {}", path.display()))
}
