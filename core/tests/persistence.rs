//! Save snapshot and SQLite save store tests.

use chrono::{Duration, TimeZone, Utc};
use harbor_core::{
    building::WorkSource,
    config::GameConfig,
    engine::SimEngine,
    error::SimError,
    event::SimEvent,
    nav::LinearNavigator,
    snapshot::{SaveSnapshot, SNAPSHOT_VERSION},
    store::SaveStore,
};
use std::rc::Rc;

fn store() -> SaveStore {
    let store = SaveStore::in_memory().expect("in-memory store");
    store.migrate().expect("migration");
    store
}

/// House at level 2, two boats, a villager on boat-1.
fn developed_engine(run_id: &str) -> SimEngine {
    let mut engine = SimEngine::build_test(run_id).unwrap();
    engine.build("house-1", false).unwrap();
    engine.upgrade("house-1", true).unwrap();
    engine.build("boat-1", false).unwrap();
    engine.upgrade("boat-1", false).unwrap();
    engine.build("boat-2", true).unwrap();
    let villager = engine.villagers()[0].id().to_string();
    engine.assign(&villager, "boat-1").unwrap();
    engine.ledger_mut().add_fish(12);
    engine
}

#[test]
fn snapshot_captures_durable_state() {
    let engine = developed_engine("snapshot");
    let now = Utc.with_ymd_and_hms(2026, 5, 4, 8, 30, 0).unwrap();
    let snapshot = engine.snapshot(now);

    assert_eq!(snapshot.version, SNAPSHOT_VERSION);
    assert_eq!(snapshot.gold, engine.ledger().gold());
    assert_eq!(snapshot.fish, 12);
    assert_eq!(snapshot.max_fish_capacity, 100);
    assert_eq!(snapshot.last_online, now);
    assert_eq!(snapshot.buildings.len(), engine.buildings().len());

    let boat = snapshot.buildings.iter().find(|b| b.building_id == "boat-1").unwrap();
    assert!(boat.built);
    assert_eq!(boat.level, 2);

    assert_eq!(snapshot.villagers.len(), 2);
    let assigned: Vec<_> = snapshot
        .villagers
        .iter()
        .filter_map(|v| v.assigned_workplace_id.as_deref())
        .collect();
    assert_eq!(assigned, vec!["boat-1"]);
    assert!(snapshot.villagers.iter().all(|v| v.origin_house_id == "house-1"));
}

#[test]
fn restore_reproduces_ids_levels_and_assignments() {
    let original = developed_engine("restore-a");
    let now = Utc.with_ymd_and_hms(2026, 5, 4, 8, 30, 0).unwrap();
    let snapshot = original.snapshot(now);

    let mut restored = SimEngine::build_test("restore-b").unwrap();
    let report = restored.restore(&snapshot, now);
    assert_eq!(report.total_gold, 0, "no time passed");

    assert_eq!(restored.snapshot(now), snapshot);

    let worker = snapshot
        .villagers
        .iter()
        .find(|v| v.assigned_workplace_id.is_some())
        .unwrap();
    let v = restored.villager(&worker.villager_id).unwrap();
    assert!(v.is_working(), "restored assignments resume work");
    assert_eq!(restored.building("boat-1").unwrap().occupant(), Some(worker.villager_id.as_str()));
    assert_eq!(restored.building("house-1").unwrap().level(), 2);
}

#[test]
fn restoring_an_older_save_replaces_building_state() {
    let now = Utc.with_ymd_and_hms(2026, 5, 4, 8, 30, 0).unwrap();
    let fresh = SimEngine::build_test("older-save-a").unwrap().snapshot(now);

    let mut engine = developed_engine("older-save-b");
    assert!(engine.start_work("boat-2", WorkSource::Player).unwrap());
    engine.flush_events().unwrap();

    engine.restore(&fresh, now);

    assert_eq!(engine.snapshot(now), fresh);
    assert!(!engine.building("boat-1").unwrap().is_built());
    assert_eq!(engine.building("boat-1").unwrap().level(), 1);
    assert!(!engine.building("boat-2").unwrap().is_working());
    assert!(!engine.building("boat-1").unwrap().is_occupied());
    assert!(engine.villagers().is_empty());

    let events = engine.flush_events().unwrap();
    assert!(events.contains(&SimEvent::WorkStopped { building_id: "boat-2".into() }));

    engine.run_for(10.0, 0.25).unwrap();
    assert_eq!(engine.ledger().fish(), 0, "stopped session must not produce");
}

#[test]
fn scene_buildings_missing_from_the_save_return_to_their_layout() {
    let mut config = GameConfig::default_test();
    let lighthouse = config.scene.buildings.iter_mut().find(|b| b.id == "lighthouse").unwrap();
    lighthouse.start_built = true;
    let mut engine = SimEngine::new("layout".into(), config, Rc::new(LinearNavigator::new())).unwrap();
    engine.build("boat-1", true).unwrap();
    engine.upgrade("lighthouse", true).unwrap();

    let now = Utc::now();
    let mut snapshot = engine.snapshot(now);
    snapshot.buildings.clear();
    engine.restore(&snapshot, now);

    assert!(!engine.building("boat-1").unwrap().is_built());
    let lighthouse = engine.building("lighthouse").unwrap();
    assert!(lighthouse.is_built());
    assert_eq!(lighthouse.level(), 1);
}

#[test]
fn restore_forgets_navigation_agents_of_dropped_villagers() {
    let nav = Rc::new(LinearNavigator::new());
    let mut engine =
        SimEngine::new("forget-agents".into(), GameConfig::default_test(), nav.clone()).unwrap();
    engine.build("house-1", true).unwrap();
    let villager = engine.villagers()[0].id().to_string();
    assert!(nav.position(&villager).is_some());

    let now = Utc::now();
    let empty = SimEngine::build_test("forget-agents-empty").unwrap().snapshot(now);
    engine.restore(&empty, now);

    assert!(engine.villagers().is_empty());
    assert_eq!(nav.position(&villager), None);
}

#[test]
fn save_and_load_through_the_store() {
    let mut engine = developed_engine("save-load");
    engine.attach_store(store()).unwrap();
    let saved_at = Utc.with_ymd_and_hms(2026, 6, 1, 0, 0, 0).unwrap();
    engine.save("main", saved_at).unwrap();
    let gold = engine.ledger().gold();

    engine.ledger_mut().set_gold(1);
    engine.load("main", saved_at + Duration::seconds(1)).unwrap();
    assert_eq!(engine.ledger().gold(), gold);
    assert_eq!(engine.ledger().fish(), 12);

    let slots = engine.store().unwrap().list_slots().unwrap();
    assert_eq!(slots, vec!["main".to_string()]);
}

#[test]
fn missing_save_keeps_defaults() {
    let mut engine = SimEngine::build_test("missing-save").unwrap();
    engine.attach_store(store()).unwrap();

    let report = engine.load("main", Utc::now()).unwrap();
    assert!(report.is_empty());
    assert_eq!(engine.ledger().gold(), 500);
}

#[test]
fn malformed_save_keeps_defaults() {
    let store = store();
    store.save_game("main", SNAPSHOT_VERSION, "{ not json", Utc::now()).unwrap();
    let mut engine = SimEngine::build_test("malformed-save").unwrap();
    engine.attach_store(store).unwrap();

    let report = engine.load("main", Utc::now()).unwrap();
    assert!(report.is_empty());
    assert_eq!(engine.ledger().gold(), 500);
    assert!(engine.villagers().is_empty());
}

#[test]
fn newer_save_version_is_ignored() {
    let engine = developed_engine("future-save-a");
    let mut snapshot = engine.snapshot(Utc::now());
    snapshot.version = SNAPSHOT_VERSION + 1;

    let store = store();
    store.save_game("main", snapshot.version, &snapshot.to_json().unwrap(), Utc::now()).unwrap();
    let mut fresh = SimEngine::build_test("future-save-b").unwrap();
    fresh.attach_store(store).unwrap();
    fresh.load("main", Utc::now()).unwrap();
    assert_eq!(fresh.ledger().gold(), 500);
}

#[test]
fn save_requires_a_store() {
    let engine = SimEngine::build_test("no-store").unwrap();
    assert!(matches!(engine.save("main", Utc::now()), Err(SimError::NoStore)));
}

#[test]
fn store_overwrites_and_deletes_slots() {
    let store = store();
    let now = Utc::now();
    store.save_game("a", 1, "{\"first\":true}", now).unwrap();
    store.save_game("a", 1, "{\"second\":true}", now).unwrap();
    assert_eq!(store.load_game("a").unwrap().as_deref(), Some("{\"second\":true}"));

    assert!(store.delete_save("a").unwrap());
    assert!(!store.delete_save("a").unwrap());
    assert_eq!(store.load_game("a").unwrap(), None);
}

#[test]
fn snapshot_json_tolerates_missing_lists() {
    let json = r#"{
        "version": 1,
        "gold": 42,
        "fish": 3,
        "max_fish_capacity": 50,
        "last_online": "2026-01-01T00:00:00Z"
    }"#;
    let snapshot = SaveSnapshot::from_json(json).unwrap();
    assert!(snapshot.buildings.is_empty());
    assert!(snapshot.villagers.is_empty());
    assert_eq!(snapshot.seconds_offline(snapshot.last_online + Duration::seconds(90)), 90.0);
}

#[test]
fn event_log_is_written_per_tick() {
    let mut engine = SimEngine::build_test("event-log").unwrap();
    engine.attach_store(store()).unwrap();
    engine.build("boat-1", false).unwrap();
    engine.tick(0.25).unwrap();

    let entries = engine.store().unwrap().events_for_tick("event-log", 1).unwrap();
    let types: Vec<&str> = entries.iter().map(|e| e.event_type.as_str()).collect();
    assert_eq!(types.first(), Some(&"run_initialized"));
    assert!(types.contains(&"building_state_changed"));
    assert!(types.contains(&"gold_changed"));
    assert_eq!(types.last(), Some(&"tick_completed"));
}
