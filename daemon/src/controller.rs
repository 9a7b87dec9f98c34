/// Run-state changes against the daemon, from the user and from the activity policy.
///
/// At most one intent (stop-all / start-all plus the follow-up status refresh)
/// is in flight at a time. A request arriving while one is running is dropped,
/// not queued. The controller also remembers whether the current pause was
/// caused by the policy, which is the only thing that allows an automatic resume.
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::config::{Config, PolicyMode};
use crate::notification::{Notification, Presenter, Severity};
use crate::rpc::TorrentRpc;
use crate::status::DaemonStatus;

const APP_TITLE: &str = "Transmission Tray Agent";

/// How an intent ended. Returned for logging and tests; callers need not act on it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntentOutcome {
    /// Stop-all succeeded.
    Paused,
    /// Start-all succeeded.
    Resumed,
    /// Only a notification was raised.
    Notified,
    /// The event did not apply in the current state.
    Ignored,
    /// Another intent was in flight.
    Busy,
    /// The daemon is unreachable; nothing was sent.
    NotConnected,
    /// The daemon call failed.
    Failed,
}

/// Tracks the single in-flight intent and when the most recent one ended.
#[derive(Debug, Default)]
pub struct IntentGate {
    in_flight_since: Option<Instant>,
    last_finished: Option<Instant>,
}

impl IntentGate {
    pub fn is_in_flight(&self) -> bool {
        self.in_flight_since.is_some()
    }

    /// Marks an intent as started. Returns false if one is already running.
    pub fn try_begin(&mut self) -> bool {
        if self.is_in_flight() {
            return false;
        }
        self.in_flight_since = Some(Instant::now());
        true
    }

    pub fn finish(&mut self) {
        if self.in_flight_since.take().is_some() {
            self.last_finished = Some(Instant::now());
        }
    }

    /// True if a request made at `at` is stale: an intent is running, or one
    /// finished after the request was made. Queued requests then never replay
    /// against a state they were not made in.
    pub fn overlaps(&self, at: Instant) -> bool {
        if self.in_flight_since.is_some() {
            return true;
        }
        matches!(self.last_finished, Some(end) if at <= end)
    }
}

pub struct Controller<R, P> {
    rpc: R,
    presenter: P,
    status: DaemonStatus,
    gate: IntentGate,
    /// Watched process whose start caused the current pause, if the policy owns it.
    auto_paused_by: Option<String>,
    mode: PolicyMode,
    notifications_disabled: bool,
}

impl<R: TorrentRpc, P: Presenter> Controller<R, P> {
    pub fn new(config: &Config, rpc: R, presenter: P) -> Self {
        Self {
            rpc,
            presenter,
            status: DaemonStatus::Disconnected,
            gate: IntentGate::default(),
            auto_paused_by: None,
            mode: config.activity.mode,
            notifications_disabled: config.notifications.disabled,
        }
    }

    pub fn status(&self) -> DaemonStatus {
        self.status
    }

    pub fn auto_paused_by(&self) -> Option<&str> {
        self.auto_paused_by.as_deref()
    }

    pub fn intent_in_flight(&self) -> bool {
        self.gate.is_in_flight()
    }

    #[cfg(test)]
    pub(crate) fn gate_mut(&mut self) -> &mut IntentGate {
        &mut self.gate
    }

    /// Applies new policy settings and swaps in a client for the new endpoint.
    pub fn reconfigure(&mut self, config: &Config, rpc: R) {
        self.rpc = rpc;
        self.mode = config.activity.mode;
        self.notifications_disabled = config.notifications.disabled;
    }

    /// Fetches aggregate stats and publishes the derived status.
    /// Returns whether the daemon answered.
    pub async fn refresh_status(&mut self) -> bool {
        let fetch = self.rpc.session_stats().await;
        match &fetch {
            Ok(stats) => debug!(
                active = stats.active_torrent_count,
                down = stats.download_speed,
                up = stats.upload_speed,
                "session stats"
            ),
            Err(e) if self.status != DaemonStatus::Disconnected => {
                warn!("lost connection to Transmission: {e}")
            }
            Err(e) => debug!("still disconnected: {e}"),
        }
        self.publish(DaemonStatus::from_fetch(&fetch));
        fetch.is_ok()
    }

    pub fn publish(&mut self, status: DaemonStatus) {
        self.status = status;
        self.presenter.set_indicator(status);
    }

    /// Flips the daemon between running and stopped on the user's behalf.
    ///
    /// `requested_at` is when the user asked; `watched_running` is whether a
    /// watched process is currently believed to be running.
    pub async fn user_toggle(&mut self, requested_at: Instant, watched_running: bool) -> IntentOutcome {
        if self.gate.overlaps(requested_at) {
            debug!("toggle ignored: another intent was in flight");
            return IntentOutcome::Busy;
        }
        if self.status == DaemonStatus::Disconnected {
            self.notify(Notification::new(
                APP_TITLE,
                "Cannot toggle: Not connected to Transmission server",
                Severity::Error,
            ));
            return IntentOutcome::NotConnected;
        }
        if !self.gate.try_begin() {
            return IntentOutcome::Busy;
        }

        let outcome = self.apply_user_toggle(watched_running).await;
        self.gate.finish();
        outcome
    }

    async fn apply_user_toggle(&mut self, watched_running: bool) -> IntentOutcome {
        let pausing = self.status == DaemonStatus::Active;
        let result = if pausing {
            self.rpc.stop_all().await
        } else {
            self.rpc.start_all().await
        };

        if let Err(e) = result {
            warn!("toggle failed: {e}");
            self.notify(Notification::new(APP_TITLE, format!("Error: {e}"), Severity::Error));
            self.publish(DaemonStatus::Disconnected);
            return IntentOutcome::Failed;
        }

        self.refresh_status().await;

        if pausing && self.auto_paused_by.is_some() {
            // The user now owns the pause; do not resume when the process exits.
            info!("manual pause replaces automatic pause");
            self.auto_paused_by = None;
        } else if !pausing && watched_running {
            info!("manual resume while a watched process runs; not pausing again");
            self.auto_paused_by = None;
        }

        let (body, outcome) = if pausing {
            ("All torrents paused", IntentOutcome::Paused)
        } else {
            ("All torrents resumed", IntentOutcome::Resumed)
        };
        info!("{body}");
        self.notify(Notification::new(APP_TITLE, body, Severity::Info));
        outcome
    }

    /// Reacts to a watched process appearing.
    pub async fn on_activity_started(&mut self, name: &str) -> IntentOutcome {
        if self.auto_paused_by.is_some() || self.status == DaemonStatus::Disconnected {
            return IntentOutcome::Ignored;
        }

        match self.mode {
            PolicyMode::NotifyOnly => {
                self.notify(Notification::new(
                    "Game Detected",
                    format!("{name} is running. You may want to pause torrents to reduce lag."),
                    Severity::Warning,
                ));
                IntentOutcome::Notified
            }
            PolicyMode::AutoPause => {
                if !self.gate.try_begin() {
                    return IntentOutcome::Busy;
                }
                let outcome = self.auto_pause(name).await;
                self.gate.finish();
                outcome
            }
        }
    }

    async fn auto_pause(&mut self, name: &str) -> IntentOutcome {
        match self.rpc.stop_all().await {
            Ok(()) => {
                info!("{name} started, torrents paused automatically");
                self.auto_paused_by = Some(name.to_string());
                self.refresh_status().await;
                self.notify(Notification::new(
                    "Game Detected",
                    format!("{name} started. Torrents automatically paused."),
                    Severity::Info,
                ));
                IntentOutcome::Paused
            }
            Err(e) => {
                warn!("auto-pause failed: {e}");
                self.notify(Notification::new(
                    "Auto-Pause Failed",
                    format!("Could not pause torrents: {e}"),
                    Severity::Error,
                ));
                IntentOutcome::Failed
            }
        }
    }

    /// Reacts to the remembered watched process exiting.
    ///
    /// A pause the policy owns is always undone, even if the mode has since
    /// been switched to notify-only.
    pub async fn on_activity_stopped(&mut self, name: &str) -> IntentOutcome {
        if self.auto_paused_by.is_some() {
            if !self.gate.try_begin() {
                return IntentOutcome::Busy;
            }
            let outcome = self.auto_resume(name).await;
            self.gate.finish();
            return outcome;
        }

        match self.mode {
            PolicyMode::NotifyOnly => {
                self.notify(Notification::new(
                    "Game Closed",
                    format!("{name} has closed."),
                    Severity::Info,
                ));
                IntentOutcome::Notified
            }
            PolicyMode::AutoPause => IntentOutcome::Ignored,
        }
    }

    async fn auto_resume(&mut self, name: &str) -> IntentOutcome {
        let result = self.rpc.start_all().await;
        // Cleared either way: a failed resume must not leave the pause policy-owned.
        let trigger = self.auto_paused_by.take().unwrap_or_else(|| name.to_string());

        match result {
            Ok(()) => {
                info!("{trigger} closed, torrents resumed automatically");
                self.refresh_status().await;
                self.notify(Notification::new(
                    "Game Closed",
                    format!("{trigger} has closed. Torrents automatically resumed."),
                    Severity::Info,
                ));
                IntentOutcome::Resumed
            }
            Err(e) => {
                warn!("auto-resume failed: {e}");
                self.notify(Notification::new(
                    "Auto-Resume Failed",
                    format!("Could not resume torrents: {e}"),
                    Severity::Error,
                ));
                IntentOutcome::Failed
            }
        }
    }

    fn notify(&mut self, notification: Notification) {
        if self.notifications_disabled {
            debug!("notification suppressed: {}", notification.body);
            return;
        }
        self.presenter.show_notification(notification);
    }
}
