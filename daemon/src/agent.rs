/// Reconciliation loop: one logical timeline owning all agent state.
///
/// Each tick fetches aggregate stats, publishes the derived status and, when
/// activity monitoring is on, polls the observer and routes its events to the
/// controller. User toggles and config reloads arrive as [`AgentEvent`]s and
/// run between ticks, so status and attribution never see interleaved writes.
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::controller::{Controller, IntentOutcome};
use crate::event::AgentEvent;
use crate::notification::Presenter;
use crate::process_monitor::{ActivityChange, ActivityObserver, ProcessSource};
use crate::rpc::TorrentRpc;
use crate::status::DaemonStatus;

pub struct Agent<R, S, P> {
    controller: Controller<R, P>,
    observer: ActivityObserver<S>,
    monitoring: bool,
    poll_interval: Duration,
}

impl<R: TorrentRpc, S: ProcessSource, P: Presenter> Agent<R, S, P> {
    pub fn new(config: &Config, rpc: R, source: S, presenter: P) -> Self {
        Self {
            controller: Controller::new(config, rpc, presenter),
            observer: ActivityObserver::new(source, config.activity.watched_processes.clone()),
            monitoring: config.activity.monitoring_active(),
            poll_interval: config.transmission.poll_interval(),
        }
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    pub fn status(&self) -> DaemonStatus {
        self.controller.status()
    }

    /// One scheduled reconciliation pass. Skipped entirely while an intent is in flight.
    pub async fn tick(&mut self) {
        if self.controller.intent_in_flight() {
            debug!("tick skipped: intent in flight");
            return;
        }

        let reachable = self.controller.refresh_status().await;
        // Events consumed while disconnected would be lost, so only observe
        // when the daemon answered.
        if !reachable || !self.monitoring {
            return;
        }

        let outcome = match self.observer.poll() {
            ActivityChange::NoChange => return,
            ActivityChange::Started(name) => self.controller.on_activity_started(&name).await,
            ActivityChange::Stopped(name) => self.controller.on_activity_stopped(&name).await,
        };
        debug!(?outcome, "activity event handled");
    }

    pub async fn user_toggle(&mut self, requested_at: Instant) -> IntentOutcome {
        let watched_running = self.observer.current().is_some();
        let outcome = self.controller.user_toggle(requested_at, watched_running).await;
        debug!(?outcome, "user toggle handled");
        outcome
    }

    /// Applies a reloaded config. `rpc` is a fresh client for the (possibly new)
    /// endpoint.
    ///
    /// Auto-pause attribution is kept while the process that owns it is still
    /// observed. If the reload stops observing it (dropped from the watch list or
    /// monitoring turned off), no stop would ever be seen, so it is treated as
    /// stopped now.
    pub async fn reconfigure(&mut self, config: &Config, rpc: R) {
        self.controller.reconfigure(config, rpc);
        self.monitoring = config.activity.monitoring_active();
        self.poll_interval = config.transmission.poll_interval();

        let mut released = self
            .observer
            .set_watched(config.activity.watched_processes.clone());
        if !self.monitoring {
            released = released.or_else(|| self.observer.forget());
        }
        info!(
            monitoring = self.monitoring,
            interval_secs = self.poll_interval.as_secs(),
            "configuration applied"
        );

        if let Some(name) = released {
            if self.controller.auto_paused_by().is_some() {
                info!("{name} no longer observed, releasing automatic pause");
                let outcome = self.controller.on_activity_stopped(&name).await;
                debug!(?outcome, "released automatic pause");
            }
        }
    }

    /// Final publish before exit.
    pub fn shutdown(&mut self) {
        self.controller.publish(DaemonStatus::Disconnected);
    }
}

/// Runs the agent until [`AgentEvent::Shutdown`] or until every sender is gone.
///
/// The first tick fires immediately. After each tick the loop sleeps for the
/// full interval, so a slow tick delays the next one instead of overlapping it.
/// `reload` builds a client for a reloaded config.
pub async fn run<R, S, P, F>(
    mut agent: Agent<R, S, P>,
    mut events: mpsc::Receiver<AgentEvent>,
    mut reload: F,
) where
    R: TorrentRpc,
    S: ProcessSource,
    P: Presenter,
    F: FnMut(&Config) -> anyhow::Result<R>,
{
    let mut next_tick = tokio::time::Instant::now();

    loop {
        tokio::select! {
            biased;

            _ = tokio::time::sleep_until(next_tick) => {
                agent.tick().await;
                next_tick = tokio::time::Instant::now() + agent.poll_interval();
            }

            event = events.recv() => match event {
                Some(AgentEvent::ToggleRequested(at)) => {
                    agent.user_toggle(at).await;
                }
                Some(AgentEvent::ConfigReloaded(config)) => match reload(&config) {
                    Ok(rpc) => {
                        agent.reconfigure(&config, rpc).await;
                        next_tick = tokio::time::Instant::now();
                    }
                    Err(e) => warn!("keeping previous connection settings: {e:#}"),
                },
                Some(AgentEvent::Shutdown) | None => {
                    info!("shutting down");
                    agent.shutdown();
                    break;
                }
            }
        }
    }
}
