/*
 *  tests/terminal_integration.rs
 *
 *  Integration tests: sync loop, terminal session and presets together
 *
 *  QuMonS - next please
 *  (c) 2020-26 Stuart Hunter
 */

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use qumons::announce::Announcement;
use qumons::display::{LayoutResolver, Quadrant, ZoneContent};
use qumons::httprpc::{QueueServer, QueueServerError};
use qumons::model::{
    BroadcastMode, LayoutConfig, Patient, QueueConfig, QueueData, QueueSnapshot, StaticTextZone, ZoneConfig,
};
use qumons::presets::{ConfigLifecycle, PresetError};
use qumons::speech::{Speaker, SpeechError, Utterance};
use qumons::store::{FallbackPresetStore, MemoryPresetStore, PresetSummary, RemotePresetStore, StoredPreset};
use qumons::sync::{Connectivity, SyncCommand, SyncController, SyncEvent, TickOutcome};
use qumons::terminal::TerminalSession;

#[derive(Default)]
struct FakeServer {
    down: AtomicBool,
    device: Mutex<Option<QueueConfig>>,
    layout: Mutex<LayoutConfig>,
    snapshot: Mutex<QueueSnapshot>,
    presets: Mutex<Vec<StoredPreset>>,
}

impl FakeServer {
    fn check(&self) -> Result<(), QueueServerError> {
        if self.down.load(Ordering::SeqCst) {
            Err(QueueServerError::Status { status: reqwest::StatusCode::BAD_GATEWAY, url: "fake".into() })
        } else {
            Ok(())
        }
    }

    fn serve(&self, version: &str, current: Option<Patient>, waiting: Vec<Patient>) {
        *self.snapshot.lock().unwrap() = QueueSnapshot {
            data: QueueData { current_patient: current, waiting_list: waiting, passed_list: Vec::new() },
            version: version.into(),
        };
    }
}

impl QueueServer for FakeServer {
    async fn health(&self) -> Result<(), QueueServerError> {
        self.check()
    }
    async fn get_device_config(&self, _: &str) -> Result<Option<QueueConfig>, QueueServerError> {
        self.check()?;
        Ok(self.device.lock().unwrap().clone())
    }
    async fn get_device_layout(&self, _: &str) -> Result<LayoutConfig, QueueServerError> {
        self.check()?;
        Ok(self.layout.lock().unwrap().clone())
    }
    async fn get_queue_snapshot(&self, _: Option<&str>) -> Result<QueueSnapshot, QueueServerError> {
        self.check()?;
        Ok(self.snapshot.lock().unwrap().clone())
    }
    async fn list_presets(&self) -> Result<Vec<PresetSummary>, QueueServerError> {
        self.check()?;
        Ok(self.presets.lock().unwrap().iter().map(StoredPreset::summary).collect())
    }
    async fn get_preset(&self, id: &str) -> Result<StoredPreset, QueueServerError> {
        self.check()?;
        self.presets
            .lock()
            .unwrap()
            .iter()
            .find(|p| p.id == id)
            .cloned()
            .ok_or(QueueServerError::Status { status: reqwest::StatusCode::NOT_FOUND, url: id.into() })
    }
    async fn save_preset(&self, preset: &StoredPreset) -> Result<(), QueueServerError> {
        self.check()?;
        let mut presets = self.presets.lock().unwrap();
        presets.retain(|p| p.id != preset.id);
        presets.push(preset.clone());
        Ok(())
    }
    async fn delete_preset(&self, id: &str) -> Result<(), QueueServerError> {
        self.check()?;
        let mut presets = self.presets.lock().unwrap();
        let before = presets.len();
        presets.retain(|p| p.id != id);
        if presets.len() == before {
            return Err(QueueServerError::Status { status: reqwest::StatusCode::NOT_FOUND, url: id.into() });
        }
        Ok(())
    }
}

#[derive(Clone, Default)]
struct Recorder(Arc<Mutex<Vec<String>>>);

impl Speaker for Recorder {
    fn speak(&self, utterance: &Utterance) -> Result<(), SpeechError> {
        self.0.lock().unwrap().push(utterance.text.clone());
        Ok(())
    }
}

impl Recorder {
    fn spoken(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }
}

fn device_config() -> QueueConfig {
    let mut cfg = QueueConfig::default();
    cfg.system.window_number = Some("2".into());
    cfg.system.window_name = Some("Counter 2".into());
    cfg.speech.template = "{number} to {window}".into();
    cfg.data_source.polling_interval = 1;
    cfg
}

fn event_for(outcome: TickOutcome, config: &Arc<QueueConfig>) -> Option<SyncEvent> {
    match outcome {
        TickOutcome::Registered | TickOutcome::LayoutApplied => Some(SyncEvent::ConfigReplaced(Arc::clone(config))),
        TickOutcome::SnapshotApplied => Some(SyncEvent::QueueReplaced(Arc::clone(config))),
        _ => None,
    }
}

#[tokio::test]
async fn test_register_then_announce_calls() {
    let server = Arc::new(FakeServer::default());
    let rec = Recorder::default();
    let initial = Arc::new(QueueConfig::unregistered(Some("dev-7".into())));
    let mut sync = SyncController::new(Arc::clone(&server), Arc::clone(&initial), Connectivity::default());
    let mut session = TerminalSession::new(LayoutResolver::new(1280, 720), initial, Some(Box::new(rec.clone())));

    // not bound yet
    assert_eq!(sync.tick().await, TickOutcome::Unregistered);
    assert!(session.plan().is_unregistered());

    *server.device.lock().unwrap() = Some(device_config());
    let outcome = sync.tick().await;
    assert_eq!(outcome, TickOutcome::Registered);
    session.apply(&event_for(outcome, sync.config()).unwrap());
    let screen = session.plan().screen().unwrap();
    assert_eq!(screen.zones().len(), 4);
    assert!(sync.config().system.is_registered);
    assert_eq!(sync.config().system.device_id.as_deref(), Some("dev-7"));

    // p1 was already being served when the terminal came up
    server.serve("v1", Some(Patient::new("p1", "Ann", "A001").called_at(1000)), vec![Patient::new("p2", "Bo", "A002")]);
    let outcome = sync.tick().await;
    assert_eq!(outcome, TickOutcome::SnapshotApplied);
    let out = session.apply(&event_for(outcome, sync.config()).unwrap());
    assert_eq!(out, Announcement::Unchanged);
    assert!(rec.spoken().is_empty());

    match &session.plan().screen().unwrap().get_zone(Quadrant::TopRight).unwrap().content {
        ZoneContent::WaitingList { entries, .. } => {
            assert!(entries.iter().any(|e| e.patient.number == "A002"));
        }
        other => panic!("unexpected {:?}", other),
    }

    // same version again: nothing to do
    assert_eq!(sync.tick().await, TickOutcome::SnapshotUnchanged);

    // the next call is announced
    server.serve("v2", Some(Patient::new("p2", "Bo", "A002").called_at(1001)), Vec::new());
    let outcome = sync.tick().await;
    let out = session.apply(&event_for(outcome, sync.config()).unwrap());
    assert!(matches!(out, Announcement::Spoken { recall: false, .. }));
    assert_eq!(rec.spoken(), vec!["A002 to Counter 2".to_string()]);

    // recall with a newer timestamp
    server.serve("v3", Some(Patient::new("p2", "Bo", "A002").called_at(1002)), Vec::new());
    let outcome = sync.tick().await;
    let out = session.apply(&event_for(outcome, sync.config()).unwrap());
    assert!(matches!(out, Announcement::Spoken { recall: true, .. }));
    assert_eq!(rec.spoken().len(), 2);
}

#[tokio::test]
async fn test_local_broadcast_only_speaks_for_own_window() {
    let server = Arc::new(FakeServer::default());
    let rec = Recorder::default();
    let mut cfg = device_config();
    cfg.system.is_registered = true;
    cfg.system.device_id = Some("dev-7".into());
    cfg.speech.broadcast_mode = BroadcastMode::Local;
    let initial = Arc::new(cfg);

    let mut sync = SyncController::new(Arc::clone(&server), Arc::clone(&initial), Connectivity::default());
    let mut session = TerminalSession::new(LayoutResolver::default(), initial, Some(Box::new(rec.clone())));

    server.serve("v1", Some(Patient::new("p1", "Ann", "A001").at_window("1")), Vec::new());
    let outcome = sync.tick().await;
    let out = session.apply(&event_for(outcome, sync.config()).unwrap());
    assert_eq!(out, Announcement::Filtered { recall: false });

    server.serve("v2", Some(Patient::new("p2", "Bo", "A002").at_window("2")), Vec::new());
    let outcome = sync.tick().await;
    session.apply(&event_for(outcome, sync.config()).unwrap());
    assert_eq!(rec.spoken(), vec!["A002 to Counter 2".to_string()]);
}

#[tokio::test]
async fn test_static_layout_polls_layout_not_queue() {
    let server = Arc::new(FakeServer::default());
    let mut cfg = device_config();
    cfg.system.is_registered = true;
    cfg.system.device_id = Some("dev-7".into());
    let promo = LayoutConfig {
        top_left: ZoneConfig::StaticText(StaticTextZone { html: "<b>Flu shots</b>".into(), font_size: 40 }),
        bottom_left: ZoneConfig::Hidden,
        top_right: ZoneConfig::Hidden,
        bottom_right: ZoneConfig::Hidden,
        ..LayoutConfig::default()
    };
    cfg.layout = promo.clone();
    *server.layout.lock().unwrap() = promo;

    let mut sync = SyncController::new(Arc::clone(&server), Arc::new(cfg), Connectivity::default());
    assert_eq!(sync.tick().await, TickOutcome::LayoutUnchanged);
    assert_eq!(sync.next_delay(), Duration::from_secs(10));

    // the operator switches the panel back to the queue
    *server.layout.lock().unwrap() = LayoutConfig::default();
    assert_eq!(sync.tick().await, TickOutcome::LayoutApplied);
    assert_eq!(sync.next_delay(), Duration::from_secs(1));
}

#[tokio::test]
async fn test_outage_goes_offline_and_recovers() {
    let server = Arc::new(FakeServer::default());
    let mut cfg = device_config();
    cfg.system.is_registered = true;
    cfg.system.device_id = Some("dev-7".into());
    let connectivity = Connectivity::default();
    let mut sync = SyncController::new(Arc::clone(&server), Arc::new(cfg), connectivity.clone());

    server.down.store(true, Ordering::SeqCst);
    assert_eq!(sync.tick().await, TickOutcome::Failed);
    assert!(!connectivity.is_healthy());
    assert_eq!(sync.tick().await, TickOutcome::Offline);

    server.down.store(false, Ordering::SeqCst);
    server.serve("v1", None, Vec::new());
    assert_eq!(sync.tick().await, TickOutcome::SnapshotApplied);
    assert!(connectivity.is_healthy());
}

#[tokio::test]
async fn test_spawned_loop_publishes_events() {
    let server = Arc::new(FakeServer::default());
    *server.device.lock().unwrap() = Some(device_config());
    let initial = Arc::new(QueueConfig::unregistered(Some("dev-7".into())));
    let sync = SyncController::new(Arc::clone(&server), initial, Connectivity::default());
    let mut handle = sync.spawn();

    let first = tokio::time::timeout(Duration::from_secs(5), handle.event_rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert!(matches!(first, SyncEvent::ConfigReplaced(_)));
    assert!(handle.config_rx.borrow().system.is_registered);

    // an editor push is published straight away
    let mut edited = (**first.config()).clone();
    edited.header.title = "Pharmacy".into();
    handle.cmd_tx.send(SyncCommand::Replace(Arc::new(edited.stamped()))).await.unwrap();
    let next = tokio::time::timeout(Duration::from_secs(5), handle.event_rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(next.config().header.title, "Pharmacy");

    handle.shutdown().await;
}

#[tokio::test]
async fn test_presets_fall_back_to_local_during_outage() {
    let server = Arc::new(FakeServer::default());
    let connectivity = Connectivity::default();
    let store = FallbackPresetStore::new(
        RemotePresetStore::new(Arc::clone(&server)),
        MemoryPresetStore::new(),
        connectivity.clone(),
    );
    let mut lifecycle = ConfigLifecycle::new(store);

    lifecycle.load_default();
    lifecycle.edit(|c| c.header.title = "Morning".into());
    let morning = lifecycle.save_as("Morning").await.unwrap();
    assert_eq!(server.presets.lock().unwrap().len(), 1);

    server.down.store(true, Ordering::SeqCst);
    lifecycle.edit(|c| c.header.title = "Evening".into());
    let evening = lifecycle.save_as("Evening").await.unwrap();
    assert!(!connectivity.is_healthy());
    assert_eq!(server.presets.lock().unwrap().len(), 1);

    // both are still readable from the local copy
    let names: Vec<String> = lifecycle.list().await.unwrap().into_iter().map(|p| p.name).collect();
    assert_eq!(names, vec!["Evening".to_string(), "Morning".to_string()]);
    let loaded = lifecycle.load(&morning.id).await.unwrap();
    assert_eq!(loaded.header.title, "Morning");

    lifecycle.delete(&evening.id).await.unwrap();
    assert!(matches!(lifecycle.load(&evening.id).await, Err(PresetError::NotFound(_))));
}
