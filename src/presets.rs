/*
 *  presets.rs
 *
 *  QuMonS - next please
 *  (c) 2020-26 Stuart Hunter
 *
 *  Configuration lifecycle - load, save and version stamp named presets
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

use chrono::Utc;
use log::{info, warn};
use std::sync::Arc;
use thiserror::Error;

use crate::constants::DEFAULT_PRESET_ID;
use crate::httprpc::QueueServerError;
use crate::model::QueueConfig;
use crate::store::{PresetStore, PresetSummary, StoredPreset};

/// Attempts at finding an unused preset id before giving up
const MAX_ID_ATTEMPTS: usize = 8;

#[derive(Debug, Error)]
pub enum PresetError {
    #[error("preset '{0}' not found")]
    NotFound(String),

    #[error("preset id '{0}' is already in use")]
    IdCollision(String),

    #[error("preset '{id}' holds an unreadable configuration: {source}")]
    Decode {
        id: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("preset '{id}' could not be serialized: {source}")]
    Encode {
        id: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("no preset is loaded for editing")]
    NoPresetLoaded,

    #[error("overwrite of preset '{0}' was not confirmed")]
    Declined(String),

    #[error("preset storage error: {0}")]
    Storage(#[from] std::io::Error),

    #[error("queue server error: {0}")]
    Server(#[from] QueueServerError),
}

impl PresetError {
    /// The server could not be reached; another store may still answer
    pub fn is_connectivity(&self) -> bool {
        matches!(self, PresetError::Server(e) if e.is_transport())
    }
}

/// The preset the operator is currently editing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditingPreset {
    pub id: String,
    pub name: String,
}

type IdSource = Box<dyn FnMut() -> String + Send + Sync>;

fn new_preset_id() -> String {
    format!("preset-{}-{:04x}", Utc::now().timestamp_millis(), rand::random::<u16>())
}

/// Administrative view over presets.
///
/// Owns its own copy of the configuration; nothing reaches a running
/// terminal until the caller publishes [`ConfigLifecycle::snapshot`].
pub struct ConfigLifecycle<P: PresetStore> {
    store: P,
    default_config: QueueConfig,
    current: Arc<QueueConfig>,
    editing: Option<EditingPreset>,
    next_id: IdSource,
}

impl<P: PresetStore> ConfigLifecycle<P> {
    pub fn new(store: P) -> Self {
        Self::with_default(store, QueueConfig::default())
    }

    /// Use a different built-in default
    pub fn with_default(store: P, default_config: QueueConfig) -> Self {
        let mut lifecycle = Self {
            store,
            current: Arc::new(default_config.clone()),
            default_config,
            editing: None,
            next_id: Box::new(new_preset_id),
        };
        lifecycle.load_default();
        lifecycle
    }

    /// Builder: replace the preset id generator
    pub fn with_id_source(mut self, source: impl FnMut() -> String + Send + Sync + 'static) -> Self {
        self.next_id = Box::new(source);
        self
    }

    pub fn store(&self) -> &P {
        &self.store
    }

    pub fn current(&self) -> &QueueConfig {
        &self.current
    }

    /// Shared handle to the current configuration, ready to publish
    pub fn snapshot(&self) -> Arc<QueueConfig> {
        Arc::clone(&self.current)
    }

    pub fn editing(&self) -> Option<&EditingPreset> {
        self.editing.as_ref()
    }

    /// Apply an in-memory edit; the result is a fresh snapshot
    pub fn edit(&mut self, f: impl FnOnce(&mut QueueConfig)) -> Arc<QueueConfig> {
        let mut next = (*self.current).clone();
        f(&mut next);
        next.stamp_version();
        self.current = Arc::new(next);
        self.snapshot()
    }

    fn prepare(mut config: QueueConfig) -> QueueConfig {
        config.system.is_registered = true;
        config.stamped()
    }

    /// Fresh independent copy of the built-in default
    pub fn load_default(&mut self) -> Arc<QueueConfig> {
        self.current = Arc::new(Self::prepare(self.default_config.clone()));
        self.editing = None;
        self.snapshot()
    }

    /// Load a stored preset. The current configuration is untouched unless
    /// the stored one decodes cleanly.
    pub async fn load(&mut self, id: &str) -> Result<Arc<QueueConfig>, PresetError> {
        if id == DEFAULT_PRESET_ID {
            return Ok(self.load_default());
        }

        let stored = self.store.get(id).await?;
        let config = stored.decode()?;

        self.current = Arc::new(Self::prepare(config));
        self.editing = Some(EditingPreset { id: stored.id, name: stored.name });
        info!("Loaded preset {}", id);
        Ok(self.snapshot())
    }

    /// Save the current configuration under a newly allocated id.
    /// An existing preset is never replaced.
    pub async fn save_as(&mut self, name: &str) -> Result<PresetSummary, PresetError> {
        let mut last = None;
        for _ in 0..MAX_ID_ATTEMPTS {
            let id = (self.next_id)();
            if id == DEFAULT_PRESET_ID {
                last = Some(id);
                continue;
            }
            let preset = StoredPreset::new(id.clone(), name, &self.current)?;
            let summary = preset.summary();
            match self.store.insert(preset).await {
                Ok(()) => {
                    info!("Saved preset {} as {}", name, id);
                    self.editing = Some(EditingPreset { id, name: name.to_string() });
                    return Ok(summary);
                }
                Err(PresetError::IdCollision(taken)) => {
                    warn!("Preset id {} already taken, trying another", taken);
                    last = Some(taken);
                }
                Err(e) => return Err(e),
            }
        }
        Err(PresetError::IdCollision(last.unwrap_or_default()))
    }

    /// Replace the stored copy of the preset being edited.
    ///
    /// `confirm` is asked before anything is written; returning `false`
    /// leaves storage untouched.
    pub async fn overwrite<F>(&mut self, confirm: F) -> Result<(), PresetError>
    where
        F: FnOnce(&EditingPreset) -> bool,
    {
        let editing = self.editing.clone().ok_or(PresetError::NoPresetLoaded)?;
        if !confirm(&editing) {
            return Err(PresetError::Declined(editing.id));
        }
        let preset = StoredPreset::new(editing.id.clone(), editing.name.clone(), &self.current)?;
        self.store.put(preset).await?;
        info!("Overwrote preset {}", editing.id);
        Ok(())
    }

    /// Remove a stored preset; editing it ends the association
    pub async fn delete(&mut self, id: &str) -> Result<(), PresetError> {
        self.store.delete(id).await?;
        if self.editing.as_ref().is_some_and(|e| e.id == id) {
            self.editing = None;
        }
        info!("Deleted preset {}", id);
        Ok(())
    }

    pub async fn list(&self) -> Result<Vec<PresetSummary>, PresetError> {
        self.store.list().await
    }
}
