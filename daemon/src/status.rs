use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::error;

use crate::notification::{Notification, Severity};
use crate::rpc::protocol::SessionStats;
use crate::rpc::RpcResult;

/// What the indicator shows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DaemonStatus {
    /// The last status fetch failed, or none has completed yet.
    #[default]
    Disconnected,
    /// At least one torrent is transferring.
    Active,
    /// The daemon answered and nothing is transferring.
    Paused,
}

impl DaemonStatus {
    pub fn from_stats(stats: &SessionStats) -> Self {
        if stats.active_torrent_count > 0 {
            DaemonStatus::Active
        } else {
            DaemonStatus::Paused
        }
    }

    /// Derives status from the latest fetch alone; prior status plays no part.
    pub fn from_fetch(fetch: &RpcResult<SessionStats>) -> Self {
        match fetch {
            Ok(stats) => Self::from_stats(stats),
            Err(_) => DaemonStatus::Disconnected,
        }
    }

    pub fn tooltip(self) -> &'static str {
        match self {
            DaemonStatus::Active => "Active (Downloading)",
            DaemonStatus::Paused => "Paused",
            DaemonStatus::Disconnected => "Disconnected",
        }
    }
}

/// A notification as recorded in the status file.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct NotificationRecord {
    pub title: String,
    pub body: String,
    pub severity: Severity,
    /// RFC 3339 timestamp of when it was raised.
    pub raised_at: String,
}

impl NotificationRecord {
    pub fn new(notification: &Notification, raised_at: String) -> Self {
        Self {
            title: notification.title.clone(),
            body: notification.body.clone(),
            severity: notification.severity,
            raised_at,
        }
    }
}

/// Runtime status written by the agent to `<config dir>/TransmissionTray/status.toml`.
/// A tray GUI reads this file (read-only) to render the indicator and toasts.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct AgentStatus {
    /// Agent binary version (set from Cargo.toml at compile time).
    pub version: String,
    pub state: DaemonStatus,
    /// Human-readable text for the indicator tooltip.
    pub tooltip: String,
    /// RFC 3339 timestamp of the last state change.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub since: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_notification: Option<NotificationRecord>,
}

impl AgentStatus {
    /// Constructs the initial disconnected status on agent startup.
    pub fn new() -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            state: DaemonStatus::Disconnected,
            tooltip: tooltip_text(DaemonStatus::Disconnected),
            since: None,
            last_notification: None,
        }
    }
}

pub fn tooltip_text(state: DaemonStatus) -> String {
    format!("Transmission Tray Agent - {}", state.tooltip())
}

/// Serializes `status` to TOML and writes it to `path`.
/// Creates the parent directory if it does not exist.
/// Failures are logged; a status write must never stop the agent.
pub fn write_status(path: &Path, status: &AgentStatus) {
    if let Some(parent) = path.parent() {
        if let Err(e) = std::fs::create_dir_all(parent) {
            error!("failed to create directory {}: {e}", parent.display());
            return;
        }
    }
    match toml::to_string_pretty(status) {
        Ok(content) => {
            if let Err(e) = std::fs::write(path, content) {
                error!("failed to write status file {}: {e}", path.display());
            }
        }
        Err(e) => error!("failed to serialize status: {e}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpc::RpcError;

    fn stats(active: u32) -> SessionStats {
        SessionStats {
            active_torrent_count: active,
            download_speed: 0,
            upload_speed: 0,
        }
    }

    // ── DaemonStatus derivation ───────────────────────────────────────────────

    #[test]
    fn active_count_decides_active_or_paused() {
        assert_eq!(DaemonStatus::from_stats(&stats(3)), DaemonStatus::Active);
        assert_eq!(DaemonStatus::from_stats(&stats(1)), DaemonStatus::Active);
        assert_eq!(DaemonStatus::from_stats(&stats(0)), DaemonStatus::Paused);
    }

    #[test]
    fn every_error_kind_is_disconnected() {
        let errors = [
            RpcError::Network("refused".into()),
            RpcError::Timeout,
            RpcError::Protocol { status: 500 },
            RpcError::Session,
            RpcError::Decode("bad".into()),
        ];
        for e in errors {
            assert_eq!(DaemonStatus::from_fetch(&Err(e)), DaemonStatus::Disconnected);
        }
    }

    #[test]
    fn default_is_disconnected() {
        assert_eq!(DaemonStatus::default(), DaemonStatus::Disconnected);
    }

    // ── AgentStatus::new ──────────────────────────────────────────────────────

    #[test]
    fn new_starts_disconnected() {
        let s = AgentStatus::new();
        assert_eq!(s.state, DaemonStatus::Disconnected);
        assert_eq!(s.tooltip, "Transmission Tray Agent - Disconnected");
        assert!(s.since.is_none());
        assert!(s.last_notification.is_none());
    }

    #[test]
    fn new_version_matches_cargo_pkg() {
        assert_eq!(AgentStatus::new().version, env!("CARGO_PKG_VERSION"));
    }

    #[test]
    fn state_serializes_to_lowercase() {
        let mut s = AgentStatus::new();
        for (state, text) in [
            (DaemonStatus::Disconnected, "state = \"disconnected\""),
            (DaemonStatus::Active, "state = \"active\""),
            (DaemonStatus::Paused, "state = \"paused\""),
        ] {
            s.state = state;
            assert!(toml::to_string_pretty(&s).unwrap().contains(text));
        }
    }

    // ── write_status ──────────────────────────────────────────────────────────

    #[test]
    fn write_status_creates_parent_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("dir").join("status.toml");
        write_status(&path, &AgentStatus::new());
        assert!(path.exists());
    }

    #[test]
    fn write_status_content_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("status.toml");

        let mut original = AgentStatus::new();
        original.state = DaemonStatus::Paused;
        original.since = Some("2024-01-01T00:00:00+00:00".to_string());
        original.last_notification = Some(NotificationRecord::new(
            &Notification::new("Game Detected", "x started", Severity::Warning),
            "2024-01-01T00:00:01+00:00".to_string(),
        ));

        write_status(&path, &original);

        let content = std::fs::read_to_string(&path).unwrap();
        let parsed: AgentStatus = toml::from_str(&content).unwrap();
        assert_eq!(parsed, original);
    }

    #[test]
    fn write_status_omits_none_optional_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("status.toml");
        write_status(&path, &AgentStatus::new());

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(!content.contains("since"));
        assert!(!content.contains("last_notification"));
    }
}
