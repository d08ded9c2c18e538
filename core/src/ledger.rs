//! Economy ledger: gold and capacity-bounded fish.
//!
//! Invariants:
//!   - 0 <= fish <= max_fish_capacity after every mutation.
//!   - gold is only checked for sufficiency at spend time.
//!   - Every mutation emits the new value; the ledger knows nothing else
//!     about its observers.

use crate::{
    config::LedgerConfig,
    event::{EventSender, SimEvent},
    types::Amount,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerTotals {
    pub gold:              Amount,
    pub fish:              Amount,
    pub max_fish_capacity: Amount,
}

#[derive(Debug)]
pub struct Ledger {
    gold:              Amount,
    fish:              Amount,
    max_fish_capacity: Amount,
    events:            EventSender,
}

impl Ledger {
    pub fn new(config: &LedgerConfig, events: EventSender) -> Self {
        let max_fish_capacity = config.max_fish_capacity.max(0);
        Self {
            gold: config.starting_gold,
            fish: config.starting_fish.clamp(0, max_fish_capacity),
            max_fish_capacity,
            events,
        }
    }

    pub fn gold(&self) -> Amount { self.gold }
    pub fn fish(&self) -> Amount { self.fish }
    pub fn max_fish_capacity(&self) -> Amount { self.max_fish_capacity }

    pub fn totals(&self) -> LedgerTotals {
        LedgerTotals {
            gold:              self.gold,
            fish:              self.fish,
            max_fish_capacity: self.max_fish_capacity,
        }
    }

    /// Spend gold if the balance covers it. Non-positive amounts are free.
    pub fn try_spend_gold(&mut self, amount: Amount) -> bool {
        if amount <= 0 {
            return true;
        }
        if self.gold < amount {
            return false;
        }
        self.gold -= amount;
        self.emit_gold();
        true
    }

    pub fn add_gold(&mut self, amount: Amount) {
        if amount == 0 {
            return;
        }
        self.gold = self.gold.saturating_add(amount);
        self.emit_gold();
    }

    /// Spend fish if the balance covers it. Non-positive amounts are free.
    pub fn try_spend_fish(&mut self, amount: Amount) -> bool {
        if amount <= 0 {
            return true;
        }
        if self.fish < amount {
            return false;
        }
        self.fish -= amount;
        self.emit_fish();
        true
    }

    /// Add fish, clamped into [0, capacity].
    pub fn add_fish(&mut self, amount: Amount) {
        if amount == 0 {
            return;
        }
        self.fish = self.fish.saturating_add(amount).clamp(0, self.max_fish_capacity);
        self.emit_fish();
    }

    /// Change the fish capacity, clamping the current balance down if needed.
    pub fn set_max_fish_capacity(&mut self, capacity: Amount) {
        self.max_fish_capacity = capacity.max(0);
        self.events.emit(SimEvent::FishCapacityChanged { capacity: self.max_fish_capacity });
        if self.fish > self.max_fish_capacity {
            self.fish = self.max_fish_capacity;
            self.emit_fish();
        }
    }

    /// Overwrite gold. Restore path only.
    pub fn set_gold(&mut self, value: Amount) {
        self.gold = value;
        self.emit_gold();
    }

    /// Overwrite fish, clamped into [0, capacity]. Restore path only.
    pub fn set_fish(&mut self, value: Amount) {
        self.fish = value.clamp(0, self.max_fish_capacity);
        self.emit_fish();
    }

    fn emit_gold(&self) {
        self.events.emit(SimEvent::GoldChanged { gold: self.gold });
    }

    fn emit_fish(&self) {
        self.events.emit(SimEvent::FishChanged { fish: self.fish });
    }
}
