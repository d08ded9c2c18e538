//! Engine command queue, clock control and event bus tests.

use harbor_core::{
    building::WorkSource,
    clock::SimSpeed,
    command::PlayerCommand,
    engine::SimEngine,
    event::{EventTopic, SimEvent},
};
use std::cell::RefCell;
use std::rc::Rc;

#[test]
fn commands_apply_on_the_next_tick() {
    let mut engine = SimEngine::build_test("commands").unwrap();
    engine.submit_command(PlayerCommand::Build { building_id: "boat-1".into(), bypass_cost: false });
    assert!(!engine.building("boat-1").unwrap().is_built());

    let events = engine.tick(0.25).unwrap();
    assert!(engine.building("boat-1").unwrap().is_built());
    assert!(events.contains(&SimEvent::PlayerCommandReceived { tick: 1, command_type: "build".into() }));
}

#[test]
fn bad_commands_do_not_stop_the_engine() {
    let mut engine = SimEngine::build_test("bad-commands").unwrap();
    engine.submit_command(PlayerCommand::Build { building_id: "nowhere".into(), bypass_cost: false });
    engine.submit_command(PlayerCommand::AssignTo { workplace_id: "boat-1".into() });
    engine.submit_command(PlayerCommand::Unassign { villager_id: "ghost".into() });
    engine.submit_command(PlayerCommand::Build { building_id: "boat-2".into(), bypass_cost: false });

    engine.tick(0.25).unwrap();
    assert!(engine.building("boat-2").unwrap().is_built());
}

#[test]
fn commands_parse_from_json() {
    let command: PlayerCommand =
        serde_json::from_str(r#"{"cmd":"start_work","building_id":"boat-1"}"#).unwrap();
    assert_eq!(
        command,
        PlayerCommand::StartWork { building_id: "boat-1".into(), source: WorkSource::Player }
    );

    let command: PlayerCommand = serde_json::from_str(r#"{"cmd":"set_speed","speed":"fast_forward"}"#).unwrap();
    assert_eq!(command, PlayerCommand::SetSpeed { speed: SimSpeed::FastForward });
}

#[test]
fn speed_scales_work_and_pause_stops_it() {
    let mut engine = SimEngine::build_test("speed").unwrap();
    engine.build("boat-1", false).unwrap();
    engine.start_work("boat-1", WorkSource::Player).unwrap();
    engine.submit_command(PlayerCommand::SetSpeed { speed: SimSpeed::FastForward });

    // The first frame runs before the speed change lands.
    engine.run_for(0.25, 0.25).unwrap();
    // 0.25 + 4 x 1.0 scaled seconds crosses the 4s cycle once.
    engine.run_for(1.0, 0.25).unwrap();
    assert_eq!(engine.ledger().fish(), 3);

    engine.submit_command(PlayerCommand::Pause);
    engine.run_for(10.0, 0.25).unwrap();
    assert!(engine.clock.paused);
    assert_eq!(engine.ledger().fish(), 3);
}

#[test]
fn capacity_command_clamps_fish() {
    let mut engine = SimEngine::build_test("capacity").unwrap();
    engine.ledger_mut().add_fish(80);
    engine.submit_command(PlayerCommand::SetMaxFishCapacity { capacity: 20 });
    engine.tick(0.25).unwrap();
    assert_eq!(engine.ledger().fish(), 20);
    assert_eq!(engine.ledger().max_fish_capacity(), 20);
}

#[test]
fn bus_filters_by_topic_and_unsubscribes() {
    let mut engine = SimEngine::build_test("bus").unwrap();
    let ledger_events = Rc::new(RefCell::new(Vec::new()));
    let all_events = Rc::new(RefCell::new(0usize));

    let sink = Rc::clone(&ledger_events);
    let ledger_sub = engine
        .bus_mut()
        .subscribe_topic(EventTopic::Ledger, move |e| sink.borrow_mut().push(e.clone()));
    let counter = Rc::clone(&all_events);
    engine.bus_mut().subscribe(move |_| *counter.borrow_mut() += 1);

    engine.build("boat-1", false).unwrap();
    engine.tick(0.25).unwrap();
    assert_eq!(*ledger_events.borrow(), vec![SimEvent::GoldChanged { gold: 400 }]);
    assert!(*all_events.borrow() > 1);

    assert!(engine.bus_mut().unsubscribe(ledger_sub));
    assert!(!engine.bus_mut().unsubscribe(ledger_sub));
    engine.build("boat-2", false).unwrap();
    engine.tick(0.25).unwrap();
    assert_eq!(ledger_events.borrow().len(), 1);
}

#[test]
fn run_for_rejects_a_zero_frame() {
    let mut engine = SimEngine::build_test("zero-frame").unwrap();
    assert!(engine.run_for(1.0, 0.0).is_err());
}
