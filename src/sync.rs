/*
 *  sync.rs
 *
 *  QuMonS - next please
 *  (c) 2020-26 Stuart Hunter
 *
 *  Sync controller - keeps a terminal's configuration in step with the
 *  queue server at minimal network cost
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

use log::{debug, info, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc::{self, Receiver, Sender};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, Duration, Instant};

use crate::constants::{MIN_POLL_INTERVAL_SECS, REGISTRATION_RETRY_INTERVAL, STATIC_POLL_INTERVAL};
use crate::display::is_static_config;
use crate::httprpc::{QueueServer, QueueServerError};
use crate::model::{BroadcastMode, Orientation, PollingStrategy, QueueConfig};

/// Shared "can we reach the server" flag
#[derive(Debug, Clone)]
pub struct Connectivity(Arc<AtomicBool>);

impl Default for Connectivity {
    fn default() -> Self {
        Self::new(true)
    }
}

impl Connectivity {
    pub fn new(healthy: bool) -> Self {
        Self(Arc::new(AtomicBool::new(healthy)))
    }

    pub fn is_healthy(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Returns the previous state
    pub fn set_healthy(&self, healthy: bool) -> bool {
        self.0.swap(healthy, Ordering::SeqCst)
    }
}

/// What a single tick did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Server unreachable; nothing fetched
    Offline,
    /// Device still unknown to the server
    Unregistered,
    /// Device binding found; full configuration replaced
    Registered,
    LayoutUnchanged,
    LayoutApplied,
    SnapshotUnchanged,
    SnapshotApplied,
    /// A fetch failed; previous configuration kept
    Failed,
}

/// Inputs that decide how the loop is scheduled. Any change restarts the
/// schedule; other configuration edits keep the pending deadline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleKey {
    registered: bool,
    is_static: bool,
    strategy: PollingStrategy,
    interval_secs: u64,
    broadcast_mode: BroadcastMode,
    window_filter: Option<String>,
    orientation: Orientation,
}

impl ScheduleKey {
    pub fn of(config: &QueueConfig) -> Self {
        Self {
            registered: config.system.is_registered,
            is_static: is_static_config(config),
            strategy: config.data_source.polling_strategy,
            interval_secs: config.data_source.polling_interval,
            broadcast_mode: config.speech.broadcast_mode,
            window_filter: config.window_filter().map(str::to_string),
            orientation: config.layout.orientation,
        }
    }

    pub fn delay(&self) -> Duration {
        if !self.registered {
            REGISTRATION_RETRY_INTERVAL
        } else if self.is_static && self.strategy == PollingStrategy::Smart {
            STATIC_POLL_INTERVAL
        } else {
            Duration::from_secs(self.interval_secs.max(MIN_POLL_INTERVAL_SECS))
        }
    }
}

/// Commands accepted by a running sync task
#[derive(Debug)]
pub enum SyncCommand {
    /// Publish a whole new configuration, e.g. from the preset editor
    Replace(Arc<QueueConfig>),
    Shutdown,
}

/// Notifications from a running sync task
#[derive(Debug, Clone)]
pub enum SyncEvent {
    /// Layout or whole configuration changed
    ConfigReplaced(Arc<QueueConfig>),
    /// Only the queue fields changed
    QueueReplaced(Arc<QueueConfig>),
}

impl SyncEvent {
    pub fn config(&self) -> &Arc<QueueConfig> {
        match self {
            SyncEvent::ConfigReplaced(c) | SyncEvent::QueueReplaced(c) => c,
        }
    }
}

/// Handles to a spawned sync loop
pub struct SyncHandle {
    pub cmd_tx: Sender<SyncCommand>,
    pub config_rx: watch::Receiver<Arc<QueueConfig>>,
    pub event_rx: Receiver<SyncEvent>,
    pub join: JoinHandle<()>,
}

impl SyncHandle {
    /// Ask the loop to stop and wait for it
    pub async fn shutdown(self) {
        let _ = self.cmd_tx.send(SyncCommand::Shutdown).await;
        if let Err(e) = self.join.await {
            warn!("Sync task failed to join: {}", e);
        }
    }
}

/// One terminal's sync state. The live configuration is an immutable value
/// replaced wholesale on every accepted update.
pub struct SyncController<S: QueueServer> {
    server: Arc<S>,
    connectivity: Connectivity,
    live: Arc<QueueConfig>,
    last_version: Option<String>,
}

impl<S: QueueServer + 'static> SyncController<S> {
    pub fn new(server: Arc<S>, initial: Arc<QueueConfig>, connectivity: Connectivity) -> Self {
        Self {
            server,
            connectivity,
            live: initial,
            last_version: None,
        }
    }

    pub fn config(&self) -> &Arc<QueueConfig> {
        &self.live
    }

    pub fn connectivity(&self) -> &Connectivity {
        &self.connectivity
    }

    pub fn last_version(&self) -> Option<&str> {
        self.last_version.as_deref()
    }

    /// Replace the whole configuration; the next snapshot is always applied
    pub fn replace(&mut self, config: Arc<QueueConfig>) {
        self.live = config;
        self.last_version = None;
    }

    /// Delay before the next tick for the current configuration
    pub fn next_delay(&self) -> Duration {
        ScheduleKey::of(&self.live).delay()
    }

    fn short_circuits(&self) -> bool {
        self.live.data_source.polling_strategy == PollingStrategy::Smart
            && self.live.is_bound_display()
            && is_static_config(&self.live)
    }

    /// Run one sync step
    pub async fn tick(&mut self) -> TickOutcome {
        if !self.connectivity.is_healthy() {
            match self.server.health().await {
                Ok(()) => {
                    info!("Queue server reachable again");
                    self.connectivity.set_healthy(true);
                }
                Err(e) => {
                    debug!("Health probe failed: {}", e);
                    return TickOutcome::Offline;
                }
            }
        }

        let result = if !self.live.system.is_registered {
            self.register().await
        } else if self.short_circuits() {
            self.check_layout().await
        } else {
            self.poll_snapshot().await
        };

        match result {
            Ok(outcome) => outcome,
            Err(e) => {
                if self.connectivity.set_healthy(false) {
                    warn!("Queue server sync failed, going offline: {}", e);
                }
                TickOutcome::Failed
            }
        }
    }

    async fn register(&mut self) -> Result<TickOutcome, QueueServerError> {
        let Some(device_id) = self.live.system.device_id.clone() else {
            return Ok(TickOutcome::Unregistered);
        };
        match self.server.get_device_config(&device_id).await? {
            Some(mut config) => {
                config.system.device_id = Some(device_id.clone());
                config.system.is_registered = true;
                self.replace(Arc::new(config.stamped()));
                info!("Device {} is bound, configuration applied", device_id);
                Ok(TickOutcome::Registered)
            }
            None => {
                debug!("Device {} not registered yet", device_id);
                Ok(TickOutcome::Unregistered)
            }
        }
    }

    async fn check_layout(&mut self) -> Result<TickOutcome, QueueServerError> {
        let Some(device_id) = self.live.system.device_id.as_deref() else {
            return Ok(TickOutcome::LayoutUnchanged);
        };
        let layout = self.server.get_device_layout(device_id).await?;

        let is_static = crate::display::is_static_layout(&layout);
        if is_static && layout == self.live.layout {
            debug!("Static layout unchanged");
            return Ok(TickOutcome::LayoutUnchanged);
        }

        info!(
            "Applying remote layout ({})",
            if is_static { "static" } else { "queue driven" }
        );
        self.live = Arc::new(self.live.with_layout(layout).stamped());
        Ok(TickOutcome::LayoutApplied)
    }

    async fn poll_snapshot(&mut self) -> Result<TickOutcome, QueueServerError> {
        let snapshot = self.server.get_queue_snapshot(self.live.window_filter()).await?;

        let unchanged = if snapshot.version.is_empty() {
            // no token from the server, fall back to comparing the data
            snapshot.data == self.live.queue_data()
        } else {
            self.last_version.as_deref() == Some(snapshot.version.as_str())
        };
        if unchanged {
            debug!("Snapshot {} unchanged", snapshot.version);
            return Ok(TickOutcome::SnapshotUnchanged);
        }

        info!(
            "Applying snapshot {} ({} waiting, {} passed)",
            snapshot.version,
            snapshot.data.waiting_list.len(),
            snapshot.data.passed_list.len()
        );
        self.live = Arc::new(self.live.with_queue(snapshot.data));
        self.last_version = Some(snapshot.version).filter(|v| !v.is_empty());
        Ok(TickOutcome::SnapshotApplied)
    }

    /// Spawn the polling loop. The first tick runs immediately.
    pub fn spawn(mut self) -> SyncHandle {
        let (cmd_tx, mut cmd_rx) = mpsc::channel::<SyncCommand>(8);
        let (evt_tx, evt_rx) = mpsc::channel::<SyncEvent>(32);
        let (config_tx, config_rx) = watch::channel(Arc::clone(&self.live));

        let join = tokio::spawn(async move {
            let mut key = ScheduleKey::of(&self.live);
            let mut deadline = Instant::now();

            loop {
                tokio::select! {
                    _ = time::sleep_until(deadline) => {
                        let outcome = self.tick().await;
                        let event = match outcome {
                            TickOutcome::Registered | TickOutcome::LayoutApplied => {
                                Some(SyncEvent::ConfigReplaced(Arc::clone(&self.live)))
                            }
                            TickOutcome::SnapshotApplied => Some(SyncEvent::QueueReplaced(Arc::clone(&self.live))),
                            _ => None,
                        };
                        if let Some(event) = event {
                            config_tx.send_replace(Arc::clone(&self.live));
                            let _ = evt_tx.send(event).await;
                        }

                        let next = ScheduleKey::of(&self.live);
                        if next != key {
                            debug!("Sync schedule restarted: {:?}", next);
                            key = next;
                        }
                        deadline = Instant::now() + key.delay();
                    }

                    cmd = cmd_rx.recv() => {
                        match cmd {
                            Some(SyncCommand::Replace(config)) => {
                                self.replace(config);
                                config_tx.send_replace(Arc::clone(&self.live));
                                let _ = evt_tx.send(SyncEvent::ConfigReplaced(Arc::clone(&self.live))).await;

                                let next = ScheduleKey::of(&self.live);
                                if next != key {
                                    debug!("Sync schedule restarted: {:?}", next);
                                    key = next;
                                    deadline = Instant::now();
                                }
                            }
                            Some(SyncCommand::Shutdown) | None => {
                                debug!("Sync loop: shutdown");
                                break;
                            }
                        }
                    }
                }
            }
        });

        SyncHandle { cmd_tx, config_rx, event_rx: evt_rx, join }
    }
}
