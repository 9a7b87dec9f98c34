/// Intents emitted towards the presentation layer.
///
/// The agent never draws anything itself: it tells a [`Presenter`] which state
/// the indicator should show and which messages the user should see.
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{error, info, warn};

use crate::status::{self, tooltip_text, AgentStatus, DaemonStatus, NotificationRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub title: String,
    pub body: String,
    pub severity: Severity,
}

impl Notification {
    pub fn new(title: impl Into<String>, body: impl Into<String>, severity: Severity) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
            severity,
        }
    }
}

/// Sink for indicator updates and user-facing messages.
pub trait Presenter: Send {
    fn set_indicator(&mut self, status: DaemonStatus);
    fn show_notification(&mut self, notification: Notification);
}

/// [`Presenter`] that mirrors everything into the status file read by the tray GUI.
pub struct StatusFilePresenter {
    path: PathBuf,
    snapshot: AgentStatus,
}

impl StatusFilePresenter {
    /// Writes the initial disconnected snapshot to `path`.
    pub fn new(path: PathBuf) -> Self {
        let snapshot = AgentStatus::new();
        status::write_status(&path, &snapshot);
        Self { path, snapshot }
    }

    pub fn snapshot(&self) -> &AgentStatus {
        &self.snapshot
    }
}

impl Presenter for StatusFilePresenter {
    fn set_indicator(&mut self, state: DaemonStatus) {
        if self.snapshot.state == state && self.snapshot.since.is_some() {
            return;
        }
        info!("indicator: {:?} -> {:?}", self.snapshot.state, state);
        self.snapshot.state = state;
        self.snapshot.tooltip = tooltip_text(state);
        self.snapshot.since = Some(chrono::Local::now().to_rfc3339());
        status::write_status(&self.path, &self.snapshot);
    }

    fn show_notification(&mut self, notification: Notification) {
        match notification.severity {
            Severity::Info => info!("[{}] {}", notification.title, notification.body),
            Severity::Warning => warn!("[{}] {}", notification.title, notification.body),
            Severity::Error => error!("[{}] {}", notification.title, notification.body),
        }
        self.snapshot.last_notification = Some(NotificationRecord::new(
            &notification,
            chrono::Local::now().to_rfc3339(),
        ));
        status::write_status(&self.path, &self.snapshot);
    }
}
