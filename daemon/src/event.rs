use std::time::Instant;

use crate::config::Config;

pub enum AgentEvent {
    /// The user asked to flip all torrents between running and stopped.
    /// Carries the moment of the request so presses made during an intent can be dropped.
    ToggleRequested(Instant),
    /// The config file changed on disk and was successfully re-parsed.
    ConfigReloaded(Config),
    /// Ctrl+C received; the agent should publish a final status and exit.
    Shutdown,
}
