/*
 *  main.rs
 *
 *  QuMonS - next please
 *  (c) 2020-26 Stuart Hunter
 *
 *  This program is free software: you can redistribute it and/or modify
 *  it under the terms of the GNU General Public License as published by
 *  the Free Software Foundation, either version 3 of the License, or
 *  (at your option) any later version.
 *
 *  This program is distributed in the hope that it will be useful,
 *  but WITHOUT ANY WARRANTY; without even the implied warranty of
 *  MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 *  GNU General Public License for more details.
 *
 *  See <http://www.gnu.org/licenses/> to get a copy of the GNU General
 *  Public License.
 *
 */

use anyhow::{Context, Result};
use clap::Parser;
use env_logger::Env;
use local_ip_address::local_ip;
use log::{error, info, warn};
use std::io::{self, BufRead, Write};
use std::sync::Arc;

#[cfg(unix)] // Only compile this block on Unix-like systems
use tokio::signal::unix::{signal, SignalKind};

use qumons::config::{self, Cli, Commands, Config, PresetCommand};
use qumons::display::LayoutResolver;
use qumons::httprpc::{QueueServer, QueueServerClient};
use qumons::mac_addr::resolve_device_id;
use qumons::model::QueueConfig;
use qumons::presets::ConfigLifecycle;
use qumons::speech::build_speaker;
use qumons::store::{FallbackPresetStore, LocalPresetStore, MemoryPresetStore, PresetStore, RemotePresetStore};
use qumons::sync::{Connectivity, SyncController};
use qumons::terminal::TerminalSession;

include!(concat!(env!("OUT_DIR"), "/build_info.rs"));

/// Waits for SIGINT, SIGTERM or SIGHUP and returns, allowing a graceful shutdown.
async fn signal_handler() -> io::Result<()> {
    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sighup = signal(SignalKind::hangup())?;

    tokio::select! {
        _ = sigint.recv() => {
            info!("SIGINT received. Initiating graceful shutdown.");
        }
        _ = sigterm.recv() => {
            info!("SIGTERM received. Initiating graceful shutdown.");
        }
        _ = sighup.recv() => {
            info!("SIGHUP received. Initiating graceful shutdown.");
        }
    }
    Ok(())
}

fn server_client(cfg: &Config) -> Result<Arc<QueueServerClient>> {
    let client = QueueServerClient::new(cfg.server_url(), cfg.connect_timeout(), cfg.request_timeout())
        .with_context(|| format!("building client for {}", cfg.server_url()))?;
    Ok(Arc::new(client))
}

async fn run_terminal(cfg: &Config) -> Result<()> {
    let device_id = resolve_device_id(cfg.device_id(), cfg.interface()).context("resolving device id")?;
    match device_id.as_deref() {
        Some(id) => info!("Device id {}", id),
        None => warn!("No device id configured, the terminal cannot be registered"),
    }

    let inet = match local_ip() {
        Ok(ip) => Some(ip),
        Err(e) => {
            warn!("Local address unknown: {}", e);
            None
        }
    };

    let speaker = match build_speaker(cfg.speech_backend(), cfg.speech_command()) {
        Ok(speaker) => speaker,
        Err(e) => {
            warn!("Announcements disabled: {}", e);
            None
        }
    };

    let client = server_client(cfg)?;
    if let Err(e) = client.health().await {
        warn!("Queue server {} not reachable yet: {}", client.base_url(), e);
    }

    let initial = Arc::new(QueueConfig::unregistered(device_id));
    let connectivity = Connectivity::default();
    let controller = SyncController::new(Arc::clone(&client), Arc::clone(&initial), connectivity);

    let (width, height) = cfg.viewport();
    let resolver = LayoutResolver::new(width, height).with_local_ip(inet);
    let mut session = TerminalSession::new(resolver, initial, speaker);

    let mut handle = controller.spawn();

    tokio::select! {
        res = signal_handler() => {
            if let Err(e) = res {
                error!("Signal handler failed: {}", e);
            }
        }
        _ = session.run(&mut handle.event_rx) => {
            info!("Closed terminal loop.");
        }
    }

    info!("Stopping sync after {} screen updates.", session.redraws());
    handle.shutdown().await;
    Ok(())
}

fn confirm(prompt: &str) -> bool {
    print!("{} [y/N] ", prompt);
    if io::stdout().flush().is_err() {
        return false;
    }
    let mut line = String::new();
    match io::stdin().lock().read_line(&mut line) {
        Ok(_) => matches!(line.trim(), "y" | "Y" | "yes"),
        Err(_) => false,
    }
}

async fn preset_command<P: PresetStore>(mut lifecycle: ConfigLifecycle<P>, action: PresetCommand) -> Result<()> {
    match action {
        PresetCommand::List => {
            let presets = lifecycle.list().await?;
            if presets.is_empty() {
                println!("no presets stored");
            }
            for p in presets {
                println!("{:<32} {:<24} {}", p.id, p.name, p.updated_at.as_deref().unwrap_or("-"));
            }
        }
        PresetCommand::Show { id } => {
            let config = lifecycle.load(&id).await?;
            println!("{}", serde_json::to_string_pretty(&*config)?);
        }
        PresetCommand::SaveDefault { name } => {
            lifecycle.load_default();
            let saved = lifecycle.save_as(&name).await?;
            println!("saved {} as {}", saved.name, saved.id);
        }
        PresetCommand::Delete { id, yes } => {
            if !yes && !confirm(&format!("Delete preset {}?", id)) {
                println!("nothing deleted");
                return Ok(());
            }
            lifecycle.delete(&id).await?;
            println!("deleted {}", id);
        }
    }
    Ok(())
}

async fn run_presets(cfg: &Config, action: PresetCommand) -> Result<()> {
    let client = server_client(cfg)?;
    let connectivity = Connectivity::default();
    if let Err(e) = client.health().await {
        warn!("Queue server unavailable, using local presets: {}", e);
        connectivity.set_healthy(false);
    }
    let remote = RemotePresetStore::new(client);

    match cfg.preset_dir() {
        Some(dir) => {
            info!("Local presets in {}", dir.display());
            let store = FallbackPresetStore::new(remote, LocalPresetStore::new(dir), connectivity);
            preset_command(ConfigLifecycle::new(store), action).await
        }
        None => {
            warn!("No data directory, local presets are not kept");
            let store = FallbackPresetStore::new(remote, MemoryPresetStore::new(), connectivity);
            preset_command(ConfigLifecycle::new(store), action).await
        }
    }
}

#[tokio::main] // Requires the `tokio` runtime with `macros` and `rt-multi-thread` features
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let cfg = config::load(&cli)?;

    if cli.dump_config {
        println!("{}", config::dump(&cfg)?);
        return Ok(());
    }

    let filter = if cli.debug {
        "debug".to_string()
    } else {
        cfg.log_level.clone().unwrap_or_else(|| "info".to_string())
    };

    // Initialize the logger with the appropriate level based on debug flag
    env_logger::Builder::from_env(Env::default().default_filter_or(filter))
        .format_timestamp_secs()
        .init();

    info!("{} - next please", env!("CARGO_PKG_NAME"));
    info!("v.{} built {} ({})", env!("CARGO_PKG_VERSION"), BUILD_DATE, BUILD_PROFILE);

    match cli.command.clone().unwrap_or(Commands::Run) {
        Commands::Run => run_terminal(&cfg).await?,
        Commands::Presets { action } => run_presets(&cfg, action).await?,
    }

    info!("Main application exiting.");
    Ok(())
}
