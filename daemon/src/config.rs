use anyhow::{Context, Result};
use notify::{Config as NotifyConfig, RecommendedWatcher, RecursiveMode, Watcher};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::event::AgentEvent;
use crate::rpc::protocol::RPC_PATH;

pub const DEFAULT_HOST: &str = "localhost";
pub const DEFAULT_PORT: u16 = 9091;
pub const MIN_POLL_INTERVAL_SECS: u64 = 1;
pub const MAX_POLL_INTERVAL_SECS: u64 = 3600;
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 5;
pub const DEFAULT_TOGGLE_HOTKEY: &str = "F9";

/// Root configuration structure. Deserialized from `<config dir>/TransmissionTray/config.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub transmission: TransmissionConfig,
    #[serde(default)]
    pub notifications: NotificationConfig,
    #[serde(default)]
    pub activity: ActivityConfig,
    #[serde(default)]
    pub hotkey: HotkeyConfig,
}

/// Where the Transmission daemon lives and how often to ask it for status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransmissionConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub use_https: bool,
    /// Empty means no HTTP Basic credentials are sent.
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    /// Seconds between reconciliation ticks. Clamped to [1, 3600].
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
}

impl Default for TransmissionConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            use_https: false,
            username: String::new(),
            password: String::new(),
            poll_interval_secs: DEFAULT_POLL_INTERVAL_SECS,
        }
    }
}

impl TransmissionConfig {
    /// Full RPC endpoint, e.g. `http://localhost:9091/transmission/rpc`.
    pub fn rpc_url(&self) -> String {
        let scheme = if self.use_https { "https" } else { "http" };
        format!("{scheme}://{}:{}{RPC_PATH}", self.host.trim(), self.port)
    }

    /// Basic-auth credential pair, present only when a username is configured.
    pub fn credentials(&self) -> Option<(&str, &str)> {
        let user = self.username.trim();
        if user.is_empty() {
            None
        } else {
            Some((user, self.password.as_str()))
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(
            self.poll_interval_secs
                .clamp(MIN_POLL_INTERVAL_SECS, MAX_POLL_INTERVAL_SECS),
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NotificationConfig {
    /// Suppresses every notification; the indicator is still updated.
    #[serde(default)]
    pub disabled: bool,
}

/// What to do when a watched process appears or disappears.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyMode {
    /// Tell the user, leave torrents alone.
    #[default]
    NotifyOnly,
    /// Stop all torrents on start, resume them on exit.
    AutoPause,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActivityConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub mode: PolicyMode,
    /// Executable names in priority order (e.g. "RocketLeague.exe").
    /// Matched case-insensitively, with or without the `.exe` suffix.
    #[serde(default)]
    pub watched_processes: Vec<String>,
}

impl ActivityConfig {
    /// Monitoring only runs when enabled and at least one name is configured.
    pub fn monitoring_active(&self) -> bool {
        self.enabled && self.watched_processes.iter().any(|p| !p.trim().is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HotkeyConfig {
    /// Key that toggles all torrents (e.g. "F9"). Empty disables it.
    #[serde(default = "default_toggle_hotkey")]
    pub toggle: String,
}

impl Default for HotkeyConfig {
    fn default() -> Self {
        Self {
            toggle: DEFAULT_TOGGLE_HOTKEY.to_string(),
        }
    }
}

/// Loads the config file at `path`, returning `Config::default()` if the file does not exist.
/// Returns an error if the file exists but cannot be read or parsed.
pub fn load_or_default(path: &Path) -> Result<Config> {
    if !path.exists() {
        return Ok(Config::default());
    }
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Writes `config` to `path` as pretty TOML, creating the parent directory.
pub fn save(path: &Path, config: &Config) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }
    let content = toml::to_string_pretty(config).context("Failed to serialize config")?;
    std::fs::write(path, content)
        .with_context(|| format!("Failed to write config file: {}", path.display()))
}

/// Spawns a file watcher on the parent directory of `path`.  Whenever the config
/// file is created or modified, reloads it and sends a `ConfigReloaded` event.
pub async fn watch_config(path: PathBuf, tx: mpsc::Sender<AgentEvent>) {
    let (watch_tx, mut watch_rx) = mpsc::channel::<notify::Event>(16);

    let mut watcher = match RecommendedWatcher::new(
        move |res: notify::Result<notify::Event>| {
            if let Ok(event) = res {
                let _ = watch_tx.blocking_send(event);
            }
        },
        NotifyConfig::default(),
    ) {
        Ok(w) => w,
        Err(e) => {
            error!("failed to create config watcher: {e}");
            return;
        }
    };

    // Editors save atomically (write-new + rename), so watch the directory.
    let watch_dir = match path.parent() {
        Some(d) => d.to_path_buf(),
        None => {
            error!("config path {} has no parent directory", path.display());
            return;
        }
    };

    if let Err(e) = watcher.watch(&watch_dir, RecursiveMode::NonRecursive) {
        warn!("not watching {} for config changes: {e}", watch_dir.display());
        return;
    }

    while let Some(event) = watch_rx.recv().await {
        let affects_config = event.paths.iter().any(|p| p == path.as_path());
        let is_write = matches!(
            event.kind,
            notify::EventKind::Create(_) | notify::EventKind::Modify(_)
        );

        if affects_config && is_write {
            match load_or_default(&path) {
                Ok(config) => {
                    info!("config file changed, reloading");
                    if tx.send(AgentEvent::ConfigReloaded(config)).await.is_err() {
                        break;
                    }
                }
                Err(e) => warn!("keeping previous config: {e:#}"),
            }
        }
    }
}

fn default_host() -> String {
    DEFAULT_HOST.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_poll_interval() -> u64 {
    DEFAULT_POLL_INTERVAL_SECS
}

fn default_toggle_hotkey() -> String {
    DEFAULT_TOGGLE_HOTKEY.to_string()
}
