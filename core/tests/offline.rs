//! Offline progress estimator tests.

use chrono::{Duration, TimeZone, Utc};
use harbor_core::{
    config::{GameConfig, VillagerStats},
    engine::SimEngine,
    event::SimEvent,
    nav::InstantNavigator,
    offline,
};
use std::rc::Rc;

/// Boat catching 2 per 4s cycle, villagers carrying 30.
fn offline_config() -> GameConfig {
    let mut config = GameConfig::default_test();
    config.balance.boat.base_catch_amount = 2;
    config.balance.boat.base_cycle_seconds = 4.0;
    config.balance.villager_house.level_stats = vec![VillagerStats { move_speed: 3.0, carry_capacity: 30 }];
    config.balance.villager_house.max_level = 1;
    config
}

fn staffed_engine(run_id: &str, with_lighthouse: bool) -> SimEngine {
    let mut engine = SimEngine::new(run_id.into(), offline_config(), Rc::new(InstantNavigator)).unwrap();
    engine.build("house-1", true).unwrap();
    engine.build("boat-1", true).unwrap();
    if with_lighthouse {
        engine.build("lighthouse", true).unwrap();
    }
    let villager = engine.villagers()[0].id().to_string();
    engine.assign(&villager, "boat-1").unwrap();
    engine
}

#[test]
fn one_trip_in_130_seconds_at_fallback_price() {
    let engine = staffed_engine("offline-fallback", false);
    let report = offline::estimate(
        130.0,
        engine.buildings(),
        engine.villagers(),
        &engine.config().balance.offline,
    );

    // fill 60s + travel 5s + sell 10s = 75s per trip.
    assert_eq!(report.lines.len(), 1);
    assert!((report.lines[0].trip_seconds - 75.0).abs() < 1e-9);
    assert_eq!(report.lines[0].trips, 1);
    assert_eq!(report.total_gold, 30);
}

#[test]
fn lighthouse_price_applies_when_built() {
    let mut engine = staffed_engine("offline-lighthouse", true);
    engine.upgrade("lighthouse", true).unwrap();
    let report = offline::estimate(
        130.0,
        engine.buildings(),
        engine.villagers(),
        &engine.config().balance.offline,
    );
    assert_eq!(report.total_gold, 30 * 3);
}

#[test]
fn elapsed_time_is_capped() {
    let engine = staffed_engine("offline-cap", false);
    let offline_config = &engine.config().balance.offline;
    let week = 7.0 * 24.0 * 3600.0;

    let report = offline::estimate(week, engine.buildings(), engine.villagers(), offline_config);
    assert_eq!(report.capped_seconds, 6.0 * 3600.0);
    // 21600 / 75 = 288 trips.
    assert_eq!(report.total_gold, 288 * 30);

    let backwards = offline::estimate(-50.0, engine.buildings(), engine.villagers(), offline_config);
    assert_eq!(backwards.total_gold, 0);
    assert_eq!(backwards.capped_seconds, 0.0);
}

#[test]
fn unstaffed_workplaces_earn_nothing() {
    let mut engine = SimEngine::new("offline-empty".into(), offline_config(), Rc::new(InstantNavigator)).unwrap();
    engine.build("house-1", true).unwrap();
    engine.build("boat-1", true).unwrap();

    let report = offline::estimate(
        3600.0,
        engine.buildings(),
        engine.villagers(),
        &engine.config().balance.offline,
    );
    assert!(report.is_empty());
    assert!(report.lines.is_empty());
}

#[test]
fn restore_credits_offline_income_once() {
    let engine = staffed_engine("offline-restore-a", false);
    let saved_at = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
    let snapshot = engine.snapshot(saved_at);
    let gold_at_save = snapshot.gold;

    let mut restored =
        SimEngine::new("offline-restore-b".into(), offline_config(), Rc::new(InstantNavigator)).unwrap();
    let report = restored.restore(&snapshot, saved_at + Duration::seconds(130));

    assert_eq!(report.total_gold, 30);
    assert_eq!(restored.ledger().gold(), gold_at_save + 30);

    let events = restored.flush_events().unwrap();
    let awards: Vec<_> = events
        .iter()
        .filter(|e| matches!(e, SimEvent::OfflineIncomeAwarded { .. }))
        .collect();
    assert_eq!(awards, vec![&SimEvent::OfflineIncomeAwarded { seconds: 130.0, gold: 30 }]);
}
