//! Economy ledger tests.

use harbor_core::{
    config::LedgerConfig,
    event::{self, SimEvent},
    ledger::Ledger,
};

fn ledger_with(gold: i64, fish: i64, capacity: i64) -> (Ledger, std::sync::mpsc::Receiver<SimEvent>) {
    let (tx, rx) = event::channel();
    let config = LedgerConfig {
        starting_gold: gold,
        starting_fish: fish,
        max_fish_capacity: capacity,
    };
    (Ledger::new(&config, tx), rx)
}

#[test]
fn spend_fails_without_mutation_when_short() {
    let (mut ledger, rx) = ledger_with(50, 0, 100);
    assert!(!ledger.try_spend_gold(100));
    assert_eq!(ledger.gold(), 50);
    assert!(rx.try_iter().next().is_none(), "failed spend must not emit");
}

#[test]
fn spend_succeeds_and_emits_new_balance() {
    let (mut ledger, rx) = ledger_with(500, 0, 100);
    assert!(ledger.try_spend_gold(100));
    assert_eq!(ledger.gold(), 400);
    assert_eq!(rx.try_iter().collect::<Vec<_>>(), vec![SimEvent::GoldChanged { gold: 400 }]);
}

#[test]
fn non_positive_spend_is_a_free_no_op() {
    let (mut ledger, rx) = ledger_with(0, 0, 100);
    assert!(ledger.try_spend_gold(0));
    assert!(ledger.try_spend_gold(-5));
    assert!(ledger.try_spend_fish(0));
    assert_eq!(ledger.gold(), 0);
    assert!(rx.try_iter().next().is_none());
}

#[test]
fn fish_is_clamped_to_capacity() {
    let (mut ledger, _rx) = ledger_with(0, 0, 30);
    ledger.add_fish(25);
    ledger.add_fish(25);
    assert_eq!(ledger.fish(), 30);

    ledger.add_fish(-100);
    assert_eq!(ledger.fish(), 0);
}

#[test]
fn lowering_capacity_clamps_fish() {
    let (mut ledger, rx) = ledger_with(0, 80, 100);
    ledger.set_max_fish_capacity(50);
    assert_eq!(ledger.fish(), 50);
    assert_eq!(
        rx.try_iter().collect::<Vec<_>>(),
        vec![
            SimEvent::FishCapacityChanged { capacity: 50 },
            SimEvent::FishChanged { fish: 50 },
        ]
    );
}

#[test]
fn fish_spend_respects_balance() {
    let (mut ledger, _rx) = ledger_with(0, 10, 100);
    assert!(!ledger.try_spend_fish(11));
    assert!(ledger.try_spend_fish(10));
    assert_eq!(ledger.fish(), 0);
}

#[test]
fn restore_setters_keep_the_invariant() {
    let (mut ledger, _rx) = ledger_with(0, 0, 40);
    ledger.set_gold(1234);
    ledger.set_fish(90);
    assert_eq!(ledger.gold(), 1234);
    assert_eq!(ledger.fish(), 40);
}
