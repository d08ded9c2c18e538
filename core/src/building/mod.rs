//! Buildings: construction, upgrades, direct work sessions and the
//! workplace side of villager production.
//!
//! States: Unbuilt -> Built(level). Upgrades move level up to the kind's
//! max; work never changes level. Invalid transitions are silent no-ops.

pub mod kind;

use crate::{
    clock::FrameDelta,
    config::{BalanceConfig, BuildingKindTag, PlacementConfig},
    event::{EventSender, SimEvent},
    ledger::Ledger,
    task::{CancelToken, Promise, Spawner, Timebase},
    types::{Amount, EntityId, Point, Seconds},
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub use kind::{BuildingKind, WorkMode};

/// Progress value reported for sessions nobody watches.
pub const AUTOMATED_PROGRESS: f64 = -1.0;

/// Cycles shorter than this are stretched to it.
const MIN_WORK_SECONDS: Seconds = 0.01;

/// Who started a work session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkSource {
    /// The player, watching a progress bar.
    Player,
    /// A headless caller that does not need progress.
    Automated,
}

#[derive(Debug)]
struct WorkSession {
    token:    CancelToken,
    source:   WorkSource,
    timer:    Seconds,
    duration: Seconds,
}

#[derive(Debug)]
pub struct Building {
    id:               EntityId,
    kind:             BuildingKind,
    built:            bool,
    level:            u32,
    index_multiplier: u32,
    position:         Point,
    work_point:       Point,
    start_built:      bool,
    occupant:         Option<EntityId>,
    session:          Option<WorkSession>,
    events:           EventSender,
}

impl Building {
    pub fn new(placement: &PlacementConfig, balance: &BalanceConfig, events: EventSender) -> Self {
        let mut building = Self {
            id:               placement.id.clone(),
            kind:             BuildingKind::from_tag(placement.kind, balance),
            built:            false,
            level:            1,
            index_multiplier: placement.index_multiplier.max(1),
            position:         placement.position,
            work_point:       placement.work_point.unwrap_or(placement.position),
            start_built:      placement.start_built,
            occupant:         None,
            session:          None,
            events,
        };
        if placement.start_built {
            building.built = true;
            building.emit_state();
        }
        building
    }

    // ── Accessors ──────────────────────────────────────────────

    pub fn id(&self) -> &str { &self.id }
    pub fn kind(&self) -> &BuildingKind { &self.kind }
    pub fn tag(&self) -> BuildingKindTag { self.kind.tag() }
    pub fn name(&self) -> &str { self.kind.display_name() }
    pub fn is_built(&self) -> bool { self.built }
    pub fn level(&self) -> u32 { self.level }
    pub fn max_level(&self) -> u32 { self.kind.max_level() }
    pub fn index_multiplier(&self) -> u32 { self.index_multiplier }
    pub fn position(&self) -> Point { self.position }
    pub fn work_point(&self) -> Point { self.work_point }
    pub fn is_working(&self) -> bool { self.session.is_some() }
    pub fn is_workplace(&self) -> bool { self.kind.is_workplace() }

    pub fn cycle_seconds(&self) -> Seconds {
        self.kind.cycle_seconds(self.level, self.index_multiplier)
    }

    pub fn yield_amount(&self) -> Amount {
        self.kind.yield_amount(self.level, self.index_multiplier)
    }

    pub fn build_cost(&self) -> Amount {
        self.kind.build_cost(self.index_multiplier)
    }

    pub fn upgrade_cost(&self) -> Amount {
        self.kind.upgrade_cost(self.level, self.index_multiplier)
    }

    pub fn cycle_label(&self) -> &'static str { self.kind.cycle_label() }
    pub fn amount_label(&self) -> &'static str { self.kind.amount_label() }

    /// Gold per fish, if this is a built lighthouse.
    pub fn fish_price(&self) -> Option<Amount> {
        match self.kind {
            BuildingKind::Lighthouse(_) if self.built => Some(self.yield_amount()),
            _ => None,
        }
    }

    // ── Construction ───────────────────────────────────────────

    /// Returns true if the building went from unbuilt to built.
    pub fn build(&mut self, ledger: &mut Ledger, bypass_cost: bool) -> bool {
        if self.built {
            return false;
        }
        if !bypass_cost && !ledger.try_spend_gold(self.build_cost()) {
            log::debug!("build {}: insufficient gold", self.id);
            return false;
        }
        self.built = true;
        self.level = self.level.max(1);
        log::debug!("built {} ({})", self.id, self.name());
        self.emit_state();
        true
    }

    /// Mark built at `level` without paying. Restore path.
    pub fn force_build(&mut self, level: u32) {
        self.built = true;
        self.level = level.clamp(1, self.max_level());
        self.emit_state();
    }

    pub fn set_level(&mut self, level: u32) {
        self.level = level.clamp(1, self.max_level());
        self.emit_state();
    }

    /// Back to unbuilt at level 1. Any running session is torn down and the
    /// occupant slot is cleared. Restore path.
    pub fn unbuild(&mut self) {
        self.end_session();
        self.occupant = None;
        self.built = false;
        self.level = 1;
        self.emit_state();
    }

    /// Back to the scene layout: unbuilt, or built at level 1 when the
    /// placement starts built.
    pub fn reset_to_scene(&mut self) {
        self.unbuild();
        if self.start_built {
            self.force_build(1);
        }
    }

    /// Returns true if the level went up.
    pub fn upgrade(&mut self, ledger: &mut Ledger, bypass_cost: bool) -> bool {
        if !self.built || self.level >= self.max_level() {
            return false;
        }
        if !bypass_cost && !ledger.try_spend_gold(self.upgrade_cost()) {
            log::debug!("upgrade {}: insufficient gold", self.id);
            return false;
        }
        self.level += 1;
        log::debug!("upgraded {} to level {}", self.id, self.level);
        self.emit_state();
        true
    }

    fn emit_state(&self) {
        self.events.emit(SimEvent::BuildingStateChanged {
            building_id: self.id.clone(),
            built:       self.built,
            level:       self.level,
        });
    }

    // ── Occupancy ──────────────────────────────────────────────

    pub fn occupant(&self) -> Option<&str> {
        self.occupant.as_deref()
    }

    pub fn is_occupied(&self) -> bool {
        self.occupant.is_some()
    }

    pub(crate) fn set_occupant(&mut self, villager: Option<EntityId>) {
        self.occupant = villager;
    }

    // ── Direct work sessions ───────────────────────────────────

    /// Start a work session driven by `step_work`. Returns false when
    /// nothing was started: unbuilt, already working, or nothing to do.
    pub fn start_work(&mut self, token: CancelToken, source: WorkSource, ledger: &Ledger) -> bool {
        if !self.built || self.session.is_some() {
            return false;
        }
        let duration = match self.kind.work_mode() {
            WorkMode::Idle => return false,
            // Shop work needs someone inside; automated callers are ignored.
            WorkMode::SingleCycle if source == WorkSource::Automated => return false,
            WorkMode::Continuous | WorkMode::SingleCycle => self.cycle_seconds(),
            WorkMode::Sale => {
                let capacity = ledger.max_fish_capacity();
                let fish = ledger.fish().min(capacity);
                if fish <= 0 {
                    self.events.emit(SimEvent::WorkStopped { building_id: self.id.clone() });
                    return false;
                }
                self.cycle_seconds() * (fish as f64 / capacity as f64)
            }
        };

        self.session = Some(WorkSession {
            token,
            source,
            timer: 0.0,
            duration: duration.max(MIN_WORK_SECONDS),
        });
        self.events.emit(SimEvent::WorkStarted { building_id: self.id.clone(), source });
        self.emit_progress(match source {
            WorkSource::Player    => 0.0,
            WorkSource::Automated => AUTOMATED_PROGRESS,
        });
        true
    }

    /// Advance the active session by one frame.
    pub fn step_work(&mut self, delta: FrameDelta, ledger: &mut Ledger) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        if session.token.is_cancelled() {
            self.end_session();
            return;
        }

        session.timer += delta.scaled;
        let crossed = session.timer >= session.duration;
        if crossed {
            session.timer -= session.duration;
        }
        let progress = (session.timer / session.duration).clamp(0.0, 1.0);
        let source = session.source;

        if crossed {
            match self.kind.work_mode() {
                WorkMode::Continuous => self.credit_cycle(ledger),
                WorkMode::SingleCycle => {
                    self.credit_cycle(ledger);
                    self.end_session();
                    return;
                }
                WorkMode::Sale => {
                    self.sell_from_ledger(ledger);
                    self.end_session();
                    return;
                }
                WorkMode::Idle => {
                    self.end_session();
                    return;
                }
            }
        }

        if source == WorkSource::Player {
            self.emit_progress(progress);
        }
    }

    fn credit_cycle(&mut self, ledger: &mut Ledger) {
        let amount = self.yield_amount();
        ledger.add_fish(amount);
        self.emit_yield(amount);
    }

    fn sell_from_ledger(&mut self, ledger: &mut Ledger) {
        let mut sold = ledger.fish().min(ledger.max_fish_capacity());
        if !ledger.try_spend_fish(sold) {
            sold = 0;
        }
        let gold = sold * self.yield_amount();
        ledger.add_gold(gold);
        log::debug!("{} sold {sold} fish for {gold} gold", self.id);
        self.emit_yield(gold);
    }

    /// The one teardown path for every session exit.
    fn end_session(&mut self) {
        if self.session.take().is_some() {
            self.emit_progress(0.0);
            self.events.emit(SimEvent::WorkStopped { building_id: self.id.clone() });
        }
    }

    fn emit_progress(&self, progress: f64) {
        self.events.emit(SimEvent::ProgressUpdated { building_id: self.id.clone(), progress });
    }

    fn emit_yield(&self, amount: Amount) {
        self.events.emit(SimEvent::YieldProduced { building_id: self.id.clone(), amount });
    }

    // ── Villager-driven production ─────────────────────────────

    /// Schedule one production cycle for a villager. The promise resolves
    /// when the cycle is done; call `finish_villager_cycle` then.
    pub fn begin_villager_cycle(&self, spawner: &Spawner, token: &CancelToken) -> Option<Promise<()>> {
        if !self.built || !self.is_workplace() {
            return None;
        }
        let seconds = self.cycle_seconds().max(MIN_WORK_SECONDS);
        Some(spawner.delay(seconds, Timebase::Scaled, token))
    }

    /// Yield of the cycle that just completed. The caller credits it to the
    /// villager rather than the ledger.
    pub fn finish_villager_cycle(&self) -> Amount {
        let amount = self.yield_amount();
        self.emit_yield(amount);
        amount
    }

    /// Schedule a villager's sale at a built lighthouse.
    pub fn begin_villager_sale(&self, spawner: &Spawner, token: &CancelToken) -> Option<Promise<()>> {
        if !self.built {
            return None;
        }
        let seconds = self.kind.sale_seconds()?;
        Some(spawner.delay(seconds, Timebase::Scaled, token))
    }

    /// Convert a villager's load into gold. Returns the gold credited.
    pub fn finish_villager_sale(&self, carried: Amount, ledger: &mut Ledger) -> Amount {
        let Some(price) = self.fish_price() else {
            return 0;
        };
        if carried <= 0 {
            return 0;
        }
        let gold = carried * price;
        ledger.add_gold(gold);
        self.emit_yield(gold);
        gold
    }
}

/// All buildings of a scene, addressable by id.
#[derive(Debug, Default)]
pub struct BuildingSet {
    buildings: Vec<Building>,
    index:     HashMap<EntityId, usize>,
}

impl BuildingSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_scene(placements: &[PlacementConfig], balance: &BalanceConfig, events: &EventSender) -> Self {
        let mut set = Self::new();
        for placement in placements {
            set.insert(Building::new(placement, balance, events.clone()));
        }
        set
    }

    pub fn insert(&mut self, building: Building) {
        if let Some(&i) = self.index.get(building.id()) {
            self.buildings[i] = building;
            return;
        }
        self.index.insert(building.id().to_string(), self.buildings.len());
        self.buildings.push(building);
    }

    pub fn get(&self, id: &str) -> Option<&Building> {
        self.index.get(id).map(|&i| &self.buildings[i])
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut Building> {
        self.index.get(id).map(|&i| &mut self.buildings[i])
    }

    pub fn iter(&self) -> impl Iterator<Item = &Building> {
        self.buildings.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Building> {
        self.buildings.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.buildings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buildings.is_empty()
    }

    /// The first built lighthouse, which is where villagers sell.
    pub fn sell_point(&self) -> Option<&Building> {
        self.buildings
            .iter()
            .find(|b| b.tag() == BuildingKindTag::Lighthouse && b.is_built())
    }

    /// Current gold per fish, falling back when no lighthouse is built.
    pub fn fish_price_or(&self, fallback: Amount) -> Amount {
        self.sell_point().and_then(Building::fish_price).unwrap_or(fallback)
    }
}
