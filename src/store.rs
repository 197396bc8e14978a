/*
 *  store.rs
 *
 *  QuMonS - next please
 *  (c) 2020-26 Stuart Hunter
 *
 *  Preset persistence - remote, local directory and connectivity fallback
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
use log::{debug, info, warn};
use mini_moka::sync::Cache;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::future::Future;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokio::fs;

use crate::constants::{PRESET_CACHE_CAPACITY, PRESET_CACHE_TTL};
use crate::deutils::decode_config_value;
use crate::httprpc::QueueServer;
use crate::model::QueueConfig;
use crate::presets::PresetError;
use crate::sync::Connectivity;

/// Listing entry for a stored preset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresetSummary {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

/// A preset as persisted. `config` is kept undecoded because stores and
/// servers hand it back either as an object or as serialized JSON text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredPreset {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub config: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

impl StoredPreset {
    pub fn new(id: impl Into<String>, name: impl Into<String>, config: &QueueConfig) -> Result<Self, PresetError> {
        let id = id.into();
        let config = serde_json::to_value(config).map_err(encode_error(&id))?;
        Ok(Self {
            id,
            name: name.into(),
            config,
            updated_at: Some(Utc::now().to_rfc3339()),
        })
    }

    /// Decode the stored configuration
    pub fn decode(&self) -> Result<QueueConfig, PresetError> {
        decode_config_value(&self.config).map_err(|source| PresetError::Decode { id: self.id.clone(), source })
    }

    pub fn summary(&self) -> PresetSummary {
        PresetSummary {
            id: self.id.clone(),
            name: self.name.clone(),
            updated_at: self.updated_at.clone(),
        }
    }
}

fn encode_error(id: &str) -> impl FnOnce(serde_json::Error) -> PresetError + '_ {
    move |source| PresetError::Encode { id: id.to_string(), source }
}

/// File name stem for a preset id. Anything outside `[A-Za-z0-9_-]` is
/// percent-encoded so ids cannot escape the preset directory.
fn file_stem(id: &str) -> String {
    let mut stem = String::with_capacity(id.len());
    for b in id.bytes() {
        if b.is_ascii_alphanumeric() || b == b'-' || b == b'_' {
            stem.push(b as char);
        } else {
            stem.push_str(&format!("%{:02X}", b));
        }
    }
    stem
}

fn sort_summaries(list: &mut [PresetSummary]) {
    list.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
}

/// Storage seam for named presets
pub trait PresetStore: Send + Sync {
    /// All presets, sorted by name
    fn list(&self) -> impl Future<Output = Result<Vec<PresetSummary>, PresetError>> + Send;

    /// Fails with [`PresetError::NotFound`] when absent
    fn get(&self, id: &str) -> impl Future<Output = Result<StoredPreset, PresetError>> + Send;

    fn exists(&self, id: &str) -> impl Future<Output = Result<bool, PresetError>> + Send;

    /// Store a new preset; never replaces an existing one
    fn insert(&self, preset: StoredPreset) -> impl Future<Output = Result<(), PresetError>> + Send;

    /// Store a preset, replacing any existing one with the same id
    fn put(&self, preset: StoredPreset) -> impl Future<Output = Result<(), PresetError>> + Send;

    /// Fails with [`PresetError::NotFound`] when absent
    fn delete(&self, id: &str) -> impl Future<Output = Result<(), PresetError>> + Send;
}

// ---------------------------------------------------------------------------
// memory

/// Volatile store, used when no preset directory is available
#[derive(Debug, Default, Clone)]
pub struct MemoryPresetStore {
    presets: Arc<Mutex<BTreeMap<String, StoredPreset>>>,
}

impl MemoryPresetStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn with<R>(&self, f: impl FnOnce(&mut BTreeMap<String, StoredPreset>) -> R) -> R {
        let mut guard = self.presets.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut guard)
    }
}

impl PresetStore for MemoryPresetStore {
    async fn list(&self) -> Result<Vec<PresetSummary>, PresetError> {
        let mut list: Vec<_> = self.with(|m| m.values().map(StoredPreset::summary).collect());
        sort_summaries(&mut list);
        Ok(list)
    }

    async fn get(&self, id: &str) -> Result<StoredPreset, PresetError> {
        self.with(|m| m.get(id).cloned())
            .ok_or_else(|| PresetError::NotFound(id.to_string()))
    }

    async fn exists(&self, id: &str) -> Result<bool, PresetError> {
        Ok(self.with(|m| m.contains_key(id)))
    }

    async fn insert(&self, preset: StoredPreset) -> Result<(), PresetError> {
        self.with(|m| {
            if m.contains_key(&preset.id) {
                return Err(PresetError::IdCollision(preset.id));
            }
            m.insert(preset.id.clone(), preset);
            Ok(())
        })
    }

    async fn put(&self, preset: StoredPreset) -> Result<(), PresetError> {
        self.with(|m| m.insert(preset.id.clone(), preset));
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<(), PresetError> {
        self.with(|m| m.remove(id))
            .map(|_| ())
            .ok_or_else(|| PresetError::NotFound(id.to_string()))
    }
}

// ---------------------------------------------------------------------------
// local directory

/// One JSON file per preset inside a directory
#[derive(Debug, Clone)]
pub struct LocalPresetStore {
    dir: PathBuf,
}

impl LocalPresetStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{}.json", file_stem(id)))
    }

    async fn read(&self, path: &Path) -> Result<Option<StoredPreset>, PresetError> {
        match fs::read_to_string(path).await {
            Ok(text) => {
                let preset = serde_json::from_str(&text).map_err(|source| PresetError::Decode {
                    id: path.display().to_string(),
                    source,
                })?;
                Ok(Some(preset))
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn write(&self, preset: &StoredPreset) -> Result<(), PresetError> {
        fs::create_dir_all(&self.dir).await?;
        let text = serde_json::to_string_pretty(preset).map_err(encode_error(&preset.id))?;
        let path = self.path_for(&preset.id);
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, text).await?;
        fs::rename(&tmp, &path).await?;
        Ok(())
    }
}

impl PresetStore for LocalPresetStore {
    async fn list(&self) -> Result<Vec<PresetSummary>, PresetError> {
        let mut entries = match fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut list = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            match self.read(&path).await {
                Ok(Some(preset)) => list.push(preset.summary()),
                Ok(None) => {}
                Err(e) => warn!("Skipping unreadable preset file {}: {}", path.display(), e),
            }
        }
        sort_summaries(&mut list);
        Ok(list)
    }

    async fn get(&self, id: &str) -> Result<StoredPreset, PresetError> {
        self.read(&self.path_for(id))
            .await?
            .ok_or_else(|| PresetError::NotFound(id.to_string()))
    }

    async fn exists(&self, id: &str) -> Result<bool, PresetError> {
        Ok(fs::try_exists(self.path_for(id)).await?)
    }

    async fn insert(&self, preset: StoredPreset) -> Result<(), PresetError> {
        if self.exists(&preset.id).await? {
            return Err(PresetError::IdCollision(preset.id));
        }
        self.write(&preset).await
    }

    async fn put(&self, preset: StoredPreset) -> Result<(), PresetError> {
        self.write(&preset).await
    }

    async fn delete(&self, id: &str) -> Result<(), PresetError> {
        match fs::remove_file(self.path_for(id)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(PresetError::NotFound(id.to_string())),
            Err(e) => Err(e.into()),
        }
    }
}

// ---------------------------------------------------------------------------
// remote

/// Presets kept by the queue server, with a short-lived read cache
pub struct RemotePresetStore<S: QueueServer> {
    server: Arc<S>,
    cache: Cache<String, StoredPreset>,
}

impl<S: QueueServer> RemotePresetStore<S> {
    pub fn new(server: Arc<S>) -> Self {
        let cache = Cache::builder()
            .max_capacity(PRESET_CACHE_CAPACITY)
            .time_to_live(PRESET_CACHE_TTL)
            .build();
        Self { server, cache }
    }

    fn not_found_or(id: &str, e: crate::httprpc::QueueServerError) -> PresetError {
        if e.is_not_found() {
            PresetError::NotFound(id.to_string())
        } else {
            PresetError::Server(e)
        }
    }
}

impl<S: QueueServer> PresetStore for RemotePresetStore<S> {
    async fn list(&self) -> Result<Vec<PresetSummary>, PresetError> {
        let mut list = self.server.list_presets().await?;
        sort_summaries(&mut list);
        Ok(list)
    }

    async fn get(&self, id: &str) -> Result<StoredPreset, PresetError> {
        if let Some(hit) = self.cache.get(&id.to_string()) {
            debug!("Preset cache hit: {}", id);
            return Ok(hit);
        }
        let preset = self
            .server
            .get_preset(id)
            .await
            .map_err(|e| Self::not_found_or(id, e))?;
        self.cache.insert(id.to_string(), preset.clone());
        Ok(preset)
    }

    async fn exists(&self, id: &str) -> Result<bool, PresetError> {
        match self.get(id).await {
            Ok(_) => Ok(true),
            Err(PresetError::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn insert(&self, preset: StoredPreset) -> Result<(), PresetError> {
        if self.exists(&preset.id).await? {
            return Err(PresetError::IdCollision(preset.id));
        }
        self.put(preset).await
    }

    async fn put(&self, preset: StoredPreset) -> Result<(), PresetError> {
        self.cache.invalidate(&preset.id);
        self.server.save_preset(&preset).await?;
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<(), PresetError> {
        self.cache.invalidate(&id.to_string());
        self.server
            .delete_preset(id)
            .await
            .map_err(|e| Self::not_found_or(id, e))
    }
}

// ---------------------------------------------------------------------------
// fallback

/// Routes to the remote store while the server is reachable and to the
/// local store otherwise. Remote results are mirrored locally so the
/// terminal keeps working through an outage.
pub struct FallbackPresetStore<R: PresetStore, L: PresetStore> {
    remote: R,
    local: L,
    connectivity: Connectivity,
}

impl<R: PresetStore, L: PresetStore> FallbackPresetStore<R, L> {
    pub fn new(remote: R, local: L, connectivity: Connectivity) -> Self {
        Self { remote, local, connectivity }
    }

    pub fn local(&self) -> &L {
        &self.local
    }

    /// Run against the remote store when healthy; a connectivity failure
    /// flips the shared flag and reports `None` so the caller falls back.
    async fn try_remote<T>(&self, op: &str, result: impl Future<Output = Result<T, PresetError>>) -> Result<Option<T>, PresetError> {
        if !self.connectivity.is_healthy() {
            return Ok(None);
        }
        match result.await {
            Ok(v) => Ok(Some(v)),
            Err(e) if e.is_connectivity() => {
                warn!("Preset {} falling back to local store: {}", op, e);
                self.connectivity.set_healthy(false);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    async fn mirror(&self, preset: StoredPreset) {
        let id = preset.id.clone();
        if let Err(e) = self.local.put(preset).await {
            warn!("Could not mirror preset {} locally: {}", id, e);
        }
    }
}

impl<R: PresetStore, L: PresetStore> PresetStore for FallbackPresetStore<R, L> {
    async fn list(&self) -> Result<Vec<PresetSummary>, PresetError> {
        match self.try_remote("list", self.remote.list()).await? {
            Some(list) => Ok(list),
            None => self.local.list().await,
        }
    }

    async fn get(&self, id: &str) -> Result<StoredPreset, PresetError> {
        match self.try_remote("get", self.remote.get(id)).await? {
            Some(preset) => {
                self.mirror(preset.clone()).await;
                Ok(preset)
            }
            None => self.local.get(id).await,
        }
    }

    async fn exists(&self, id: &str) -> Result<bool, PresetError> {
        match self.try_remote("lookup", self.remote.exists(id)).await? {
            Some(found) => Ok(found),
            None => self.local.exists(id).await,
        }
    }

    async fn insert(&self, preset: StoredPreset) -> Result<(), PresetError> {
        match self.try_remote("insert", self.remote.insert(preset.clone())).await? {
            Some(()) => {
                self.mirror(preset).await;
                Ok(())
            }
            None => {
                info!("Preset {} saved locally only", preset.id);
                self.local.insert(preset).await
            }
        }
    }

    async fn put(&self, preset: StoredPreset) -> Result<(), PresetError> {
        match self.try_remote("save", self.remote.put(preset.clone())).await? {
            Some(()) => {
                self.mirror(preset).await;
                Ok(())
            }
            None => self.local.put(preset).await,
        }
    }

    async fn delete(&self, id: &str) -> Result<(), PresetError> {
        match self.try_remote("delete", self.remote.delete(id)).await? {
            Some(()) => {
                match self.local.delete(id).await {
                    Ok(()) | Err(PresetError::NotFound(_)) => {}
                    Err(e) => warn!("Could not drop local copy of preset {}: {}", id, e),
                }
                Ok(())
            }
            None => self.local.delete(id).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::httprpc::QueueServerError;
    use crate::model::{LayoutConfig, QueueSnapshot};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn preset(id: &str, name: &str) -> StoredPreset {
        StoredPreset::new(id, name, &QueueConfig::default()).unwrap()
    }

    fn temp_dir(tag: &str) -> PathBuf {
        std::env::temp_dir().join(format!("qumons-store-{}-{}-{:x}", tag, std::process::id(), rand::random::<u32>()))
    }

    /// Server holding presets in memory, optionally unreachable
    #[derive(Default)]
    struct PresetServer {
        presets: Mutex<BTreeMap<String, StoredPreset>>,
        offline: std::sync::atomic::AtomicBool,
        gets: AtomicUsize,
    }

    impl PresetServer {
        fn check(&self) -> Result<(), QueueServerError> {
            if self.offline.load(Ordering::SeqCst) {
                Err(QueueServerError::Status { status: reqwest::StatusCode::SERVICE_UNAVAILABLE, url: "test".into() })
            } else {
                Ok(())
            }
        }

        fn missing() -> QueueServerError {
            QueueServerError::Status { status: reqwest::StatusCode::NOT_FOUND, url: "test".into() }
        }
    }

    impl QueueServer for PresetServer {
        async fn health(&self) -> Result<(), QueueServerError> {
            self.check()
        }
        async fn get_device_config(&self, _: &str) -> Result<Option<QueueConfig>, QueueServerError> {
            Ok(None)
        }
        async fn get_device_layout(&self, _: &str) -> Result<LayoutConfig, QueueServerError> {
            Err(Self::missing())
        }
        async fn get_queue_snapshot(&self, _: Option<&str>) -> Result<QueueSnapshot, QueueServerError> {
            Ok(QueueSnapshot::default())
        }
        async fn list_presets(&self) -> Result<Vec<PresetSummary>, QueueServerError> {
            self.check()?;
            Ok(self.presets.lock().unwrap().values().map(StoredPreset::summary).collect())
        }
        async fn get_preset(&self, id: &str) -> Result<StoredPreset, QueueServerError> {
            self.check()?;
            self.gets.fetch_add(1, Ordering::SeqCst);
            self.presets.lock().unwrap().get(id).cloned().ok_or_else(Self::missing)
        }
        async fn save_preset(&self, preset: &StoredPreset) -> Result<(), QueueServerError> {
            self.check()?;
            self.presets.lock().unwrap().insert(preset.id.clone(), preset.clone());
            Ok(())
        }
        async fn delete_preset(&self, id: &str) -> Result<(), QueueServerError> {
            self.check()?;
            self.presets.lock().unwrap().remove(id).map(|_| ()).ok_or_else(Self::missing)
        }
    }

    #[tokio::test]
    async fn test_memory_store_insert_never_overwrites() {
        let store = MemoryPresetStore::new();
        store.insert(preset("a", "Morning")).await.unwrap();
        let err = store.insert(preset("a", "Other")).await.unwrap_err();
        assert!(matches!(err, PresetError::IdCollision(id) if id == "a"));
        assert_eq!(store.get("a").await.unwrap().name, "Morning");
    }

    #[test]
    fn test_serialization_failure_is_an_encode_error() {
        // json object keys must be strings
        let bad: BTreeMap<(u8, u8), u8> = BTreeMap::from([((1, 2), 3)]);
        let err = serde_json::to_value(&bad).map_err(encode_error("p1")).unwrap_err();
        assert!(matches!(err, PresetError::Encode { ref id, .. } if id == "p1"));
        assert!(err.to_string().contains("could not be serialized"));
    }

    #[test]
    fn test_file_stem_keeps_ids_inside_the_directory() {
        assert_eq!(file_stem("preset_1-a"), "preset_1-a");
        assert_eq!(file_stem("../etc/passwd"), "%2E%2E%2Fetc%2Fpasswd");
        assert_eq!(file_stem("a b"), "a%20b");

        let store = LocalPresetStore::new("/var/qumons");
        assert_eq!(store.path_for("x/y"), PathBuf::from("/var/qumons/x%2Fy.json"));
    }

    #[tokio::test]
    async fn test_local_store_round_trip() {
        let dir = temp_dir("local");
        let store = LocalPresetStore::new(&dir);

        assert!(store.list().await.unwrap().is_empty());
        store.insert(preset("p-2", "Zeta")).await.unwrap();
        store.insert(preset("p/1", "Alpha")).await.unwrap();

        let names: Vec<_> = store.list().await.unwrap().into_iter().map(|s| s.name).collect();
        assert_eq!(names, vec!["Alpha", "Zeta"]);
        assert_eq!(store.get("p/1").await.unwrap().id, "p/1");
        assert!(matches!(store.insert(preset("p-2", "Again")).await, Err(PresetError::IdCollision(_))));

        store.delete("p-2").await.unwrap();
        assert!(matches!(store.get("p-2").await, Err(PresetError::NotFound(_))));
        assert!(matches!(store.delete("p-2").await, Err(PresetError::NotFound(_))));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn test_remote_reads_are_cached_until_written() {
        let server = Arc::new(PresetServer::default());
        let store = RemotePresetStore::new(server.clone());
        store.put(preset("r1", "One")).await.unwrap();

        store.get("r1").await.unwrap();
        store.get("r1").await.unwrap();
        assert_eq!(server.gets.load(Ordering::SeqCst), 1);

        let mut renamed = preset("r1", "Uno");
        renamed.updated_at = None;
        store.put(renamed).await.unwrap();
        assert_eq!(store.get("r1").await.unwrap().name, "Uno");
        assert_eq!(server.gets.load(Ordering::SeqCst), 2);

        assert!(matches!(store.get("nope").await, Err(PresetError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_fallback_switches_to_local_when_offline() {
        let server = Arc::new(PresetServer::default());
        let connectivity = Connectivity::new(true);
        let store = FallbackPresetStore::new(
            RemotePresetStore::new(server.clone()),
            MemoryPresetStore::new(),
            connectivity.clone(),
        );

        store.insert(preset("f1", "Front")).await.unwrap();
        // mirrored locally
        assert!(store.local().exists("f1").await.unwrap());

        server.offline.store(true, Ordering::SeqCst);
        store.insert(preset("f2", "Back")).await.unwrap();
        assert!(!connectivity.is_healthy());
        assert!(!server.presets.lock().unwrap().contains_key("f2"));

        let ids: Vec<_> = store.list().await.unwrap().into_iter().map(|s| s.id).collect();
        assert_eq!(ids, vec!["f2", "f1"]);
    }

    #[tokio::test]
    async fn test_fallback_does_not_hide_missing_presets() {
        let server = Arc::new(PresetServer::default());
        let store = FallbackPresetStore::new(
            RemotePresetStore::new(server),
            MemoryPresetStore::new(),
            Connectivity::new(true),
        );
        assert!(matches!(store.get("ghost").await, Err(PresetError::NotFound(_))));
    }
}
