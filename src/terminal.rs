/*
 *  terminal.rs
 *
 *  QuMonS - next please
 *  (c) 2020-26 Stuart Hunter
 *
 *  Terminal session - applies sync events to the screen plan and announcer
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

use log::{debug, info};
use std::sync::Arc;
use tokio::sync::mpsc::Receiver;

use crate::announce::{Announcement, AnnouncementEngine};
use crate::display::{LayoutResolver, RenderPlan, ScreenPlan};
use crate::model::QueueConfig;
use crate::speech::Speaker;
use crate::sync::SyncEvent;

/// Everything one panel shows, kept current from the sync loop
pub struct TerminalSession {
    resolver: LayoutResolver,
    announcer: AnnouncementEngine,
    config: Arc<QueueConfig>,
    plan: RenderPlan,
    redraws: u64,
}

impl TerminalSession {
    pub fn new(resolver: LayoutResolver, initial: Arc<QueueConfig>, speaker: Option<Box<dyn Speaker>>) -> Self {
        let announcer = AnnouncementEngine::new(&initial, speaker);
        let plan = resolver.resolve(&initial);
        log_plan(&plan);
        Self { resolver, announcer, config: initial, plan, redraws: 1 }
    }

    pub fn config(&self) -> &Arc<QueueConfig> {
        &self.config
    }

    pub fn plan(&self) -> &RenderPlan {
        &self.plan
    }

    pub fn announcer(&self) -> &AnnouncementEngine {
        &self.announcer
    }

    /// Number of plans built so far, the initial one included
    pub fn redraws(&self) -> u64 {
        self.redraws
    }

    /// Apply one event. Only queue replacements can trigger an announcement.
    pub fn apply(&mut self, event: &SyncEvent) -> Announcement {
        let config = Arc::clone(event.config());
        let outcome = match event {
            SyncEvent::ConfigReplaced(_) => {
                self.announcer.rebind(&config);
                Announcement::Unchanged
            }
            SyncEvent::QueueReplaced(_) => self.announcer.on_queue_replaced(&config),
        };
        self.config = config;
        self.redraw();
        outcome
    }

    fn redraw(&mut self) {
        let plan = self.resolver.resolve(&self.config);
        if plan != self.plan {
            log_plan(&plan);
        }
        self.plan = plan;
        self.redraws += 1;
    }

    /// Consume events until the sync loop goes away
    pub async fn run(&mut self, events: &mut Receiver<SyncEvent>) {
        while let Some(event) = events.recv().await {
            match self.apply(&event) {
                Announcement::Unchanged => {}
                other => debug!("Announcement outcome: {:?}", other),
            }
        }
        info!("Sync events closed, terminal session done");
    }
}

fn log_plan(plan: &RenderPlan) {
    match plan {
        RenderPlan::Unregistered { device_id, local_ip } => info!(
            "Unregistered device {} at {}",
            device_id.as_deref().unwrap_or("(no id)"),
            local_ip.map(|ip| ip.to_string()).unwrap_or_else(|| "unknown address".to_string())
        ),
        RenderPlan::Screen(screen) => info!("Screen: {}", describe(screen)),
    }
}

/// One line summary of a screen, e.g. `static, 2 zones [topLeft:static-text ...]`
pub fn describe(screen: &ScreenPlan) -> String {
    let zones = screen
        .zones()
        .iter()
        .map(|z| format!("{}:{}", z.name(), z.kind().as_str()))
        .collect::<Vec<_>>()
        .join(" ");
    format!(
        "{}, {} zone{} [{}]",
        if screen.is_static { "static" } else { "queue driven" },
        screen.zones().len(),
        if screen.zones().len() == 1 { "" } else { "s" },
        zones
    )
}
