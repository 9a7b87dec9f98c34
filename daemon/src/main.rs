mod agent;
mod config;
mod controller;
mod event;
mod hotkey;
mod notification;
mod paths;
mod process_monitor;
mod rpc;
mod status;

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::agent::Agent;
use crate::config::Config;
use crate::event::AgentEvent;
use crate::notification::StatusFilePresenter;
use crate::process_monitor::SysinfoProcessSource;
use crate::rpc::{RpcClient, TorrentRpc};

/// Background agent that mirrors a Transmission daemon's state and toggles it.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// Use this configuration file instead of the per-user default.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Check that the configured daemon is reachable, then exit.
    #[arg(long)]
    check: bool,

    /// Write a default configuration file if none exists, then exit.
    #[arg(long)]
    write_default_config: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    match run(args).await {
        Ok(code) => code,
        Err(e) => {
            error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<ExitCode> {
    // ── Configuration ─────────────────────────────────────────────────────────
    let config_path = match args.config {
        Some(path) => paths::resolve_config_path(&path)?,
        None => paths::config_file_path()?,
    };
    if let Some(dir) = config_path.parent() {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create directory {}", dir.display()))?;
    }

    if args.write_default_config {
        if config_path.exists() {
            info!("{} already exists; leaving it untouched", config_path.display());
        } else {
            config::save(&config_path, &Config::default())?;
            info!("wrote default configuration to {}", config_path.display());
        }
        return Ok(ExitCode::SUCCESS);
    }

    let initial_config = config::load_or_default(&config_path).unwrap_or_else(|e| {
        warn!("{e:#} (using defaults)");
        Config::default()
    });

    if args.check {
        return check(&initial_config).await;
    }

    // ── Agent ─────────────────────────────────────────────────────────────────
    let rpc = RpcClient::new(&initial_config.transmission)?;
    info!(url = rpc.url(), "watching Transmission");
    let presenter = StatusFilePresenter::new(paths::status_file_path_for(&config_path));
    let agent = Agent::new(&initial_config, rpc, SysinfoProcessSource::new(), presenter);

    let (event_tx, event_rx) = mpsc::channel::<AgentEvent>(32);

    // ── Background tasks ──────────────────────────────────────────────────────
    tokio::spawn(config::watch_config(config_path.clone(), event_tx.clone()));
    let hotkey_handle = hotkey::start(&initial_config.hotkey.toggle, event_tx.clone());

    // Graceful shutdown on Ctrl+C.
    {
        let tx = event_tx.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                let _ = tx.send(AgentEvent::Shutdown).await;
            }
        });
    }

    // SIGUSR1 toggles, for headless setups without a hotkey.
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let tx = event_tx.clone();
        tokio::spawn(async move {
            let mut usr1 = match signal(SignalKind::user_defined1()) {
                Ok(s) => s,
                Err(e) => {
                    warn!("SIGUSR1 toggle unavailable: {e}");
                    return;
                }
            };
            while usr1.recv().await.is_some() {
                let requested = AgentEvent::ToggleRequested(std::time::Instant::now());
                if tx.send(requested).await.is_err() {
                    break;
                }
            }
        });
    }

    info!("transmission-tray-daemon v{} started", env!("CARGO_PKG_VERSION"));

    let hotkey_ref = hotkey_handle.as_ref();
    agent::run(agent, event_rx, |config: &Config| {
        if let Some(h) = hotkey_ref {
            h.update_key(&config.hotkey.toggle);
        }
        let client = RpcClient::new(&config.transmission)?;
        info!(url = client.url(), "reconnecting with reloaded settings");
        Ok(client)
    })
    .await;

    if let Some(h) = hotkey_handle {
        h.stop();
    }
    Ok(ExitCode::SUCCESS)
}

/// Connectivity probe plus a one-line torrent summary.
async fn check(config: &Config) -> Result<ExitCode> {
    let mut client = RpcClient::new(&config.transmission)?;
    println!("Checking {}", client.url());

    if !client.probe().await {
        println!("Could not reach Transmission (run with RUST_LOG=debug for details)");
        return Ok(ExitCode::FAILURE);
    }

    let torrents = client
        .torrent_statuses()
        .await
        .context("Connected, but listing torrents failed")?;
    let running = torrents.iter().filter(|t| t.status.is_running()).count();
    println!(
        "Connected: {} torrents, {running} running, {} stopped",
        torrents.len(),
        torrents.len() - running
    );
    Ok(ExitCode::SUCCESS)
}
