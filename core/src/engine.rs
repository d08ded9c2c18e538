//! The simulation engine. Owns every piece of harbor state and advances it
//! one host frame at a time.
//!
//! EXECUTION ORDER per tick (fixed, never reordered):
//!   1. Clock advance (pause and speed applied)
//!   2. Queued player commands, in submission order
//!   3. Navigator advance
//!   4. Frame scheduler (deferred operations complete here)
//!   5. Building work sessions
//!   6. Villager work loops
//!   7. Event drain: log store, then bus subscribers
//!
//! RULES:
//!   - Only the engine mutates state; everything runs on the caller's thread.
//!   - Subjects report changes through the event channel, never by calling
//!     observers directly.
//!   - Game-level mistakes (bad ids, no gold) are logged and ignored; only
//!     infrastructure faults surface as errors.

use crate::{
    assignment::{AssignmentError, AssignmentRegistry},
    building::{Building, BuildingSet, WorkSource},
    bus::EventBus,
    clock::SimClock,
    command::{PlayerCommand, QueuedCommand},
    config::{BuildingKindTag, GameConfig, VillagerStats},
    error::{SimError, SimResult},
    event::{self, EventLogEntry, EventSender, SimEvent},
    ledger::Ledger,
    nav::{InstantNavigator, Navigator},
    offline::{self, OfflineReport},
    snapshot::{BuildingSave, SaveSnapshot, VillagerSave, SNAPSHOT_VERSION},
    store::SaveStore,
    task::{CancelSource, FrameScheduler, Spawner},
    types::{EntityId, Point, RunId, Seconds},
    villager::{LoopContext, Villager},
};
use chrono::{DateTime, Utc};
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;
use std::sync::mpsc::Receiver;

/// A house never has more villagers than this.
pub const MAX_VILLAGERS_PER_HOUSE: u32 = 3;

pub struct SimEngine {
    pub run_id:    RunId,
    pub clock:     SimClock,
    config:        GameConfig,
    scheduler:     FrameScheduler,
    spawner:       Spawner,
    ledger:        Ledger,
    buildings:     BuildingSet,
    villagers:     Vec<Villager>,
    registry:      AssignmentRegistry,
    nav:           Rc<dyn Navigator>,
    bus:           EventBus,
    events:        EventSender,
    inbox:         Receiver<SimEvent>,
    store:         Option<SaveStore>,
    commands:      VecDeque<QueuedCommand>,
    work_sessions: HashMap<EntityId, CancelSource>,
}

impl SimEngine {
    /// Build a fully wired engine for `config`, moving agents with `nav`.
    pub fn new(run_id: RunId, config: GameConfig, nav: Rc<dyn Navigator>) -> SimResult<Self> {
        config.validate()?;
        let (events, inbox) = event::channel();
        let scheduler = FrameScheduler::new();
        let spawner = scheduler.spawner();
        let ledger = Ledger::new(&config.balance.ledger, events.clone());
        let buildings = BuildingSet::from_scene(&config.scene.buildings, &config.balance, &events);

        let mut engine = Self {
            clock: SimClock::new(),
            scheduler,
            spawner,
            ledger,
            buildings,
            villagers: Vec::new(),
            registry: AssignmentRegistry::new(events.clone()),
            nav,
            bus: EventBus::new(),
            events,
            inbox,
            store: None,
            commands: VecDeque::new(),
            work_sessions: HashMap::new(),
            config,
            run_id,
        };

        let prebuilt_houses: Vec<EntityId> = engine
            .buildings
            .iter()
            .filter(|b| b.tag() == BuildingKindTag::VillagerHouse && b.is_built())
            .map(|b| b.id().to_string())
            .collect();
        for house_id in prebuilt_houses {
            engine.sync_house(&house_id);
        }

        engine.events.emit(SimEvent::RunInitialized { run_id: engine.run_id.clone() });
        log::info!(
            "engine {} ready: {} buildings, {} villagers",
            engine.run_id,
            engine.buildings.len(),
            engine.villagers.len()
        );
        Ok(engine)
    }

    /// Default test harbor with instant movement. No store attached.
    pub fn build_test(run_id: &str) -> SimResult<Self> {
        Self::new(run_id.to_string(), GameConfig::default_test(), Rc::new(InstantNavigator))
    }

    /// Route the event log into `store` from now on.
    pub fn attach_store(&mut self, store: SaveStore) -> SimResult<()> {
        store.insert_run(&self.run_id, env!("CARGO_PKG_VERSION"), Utc::now())?;
        self.store = Some(store);
        Ok(())
    }

    pub fn store(&self) -> Option<&SaveStore> {
        self.store.as_ref()
    }

    // ── Accessors ──────────────────────────────────────────────

    pub fn config(&self) -> &GameConfig { &self.config }
    pub fn ledger(&self) -> &Ledger { &self.ledger }
    pub fn ledger_mut(&mut self) -> &mut Ledger { &mut self.ledger }
    pub fn buildings(&self) -> &BuildingSet { &self.buildings }
    pub fn villagers(&self) -> &[Villager] { &self.villagers }
    pub fn registry(&self) -> &AssignmentRegistry { &self.registry }
    pub fn scheduler(&self) -> &FrameScheduler { &self.scheduler }
    pub fn bus_mut(&mut self) -> &mut EventBus { &mut self.bus }

    /// Handle for scheduling deferred operations on this engine's frames.
    pub fn spawner(&self) -> Spawner {
        self.spawner.clone()
    }

    pub fn building(&self, id: &str) -> SimResult<&Building> {
        self.buildings
            .get(id)
            .ok_or_else(|| SimError::UnknownBuilding { id: id.to_string() })
    }

    pub fn villager(&self, id: &str) -> SimResult<&Villager> {
        self.villagers
            .iter()
            .find(|v| v.id() == id)
            .ok_or_else(|| SimError::UnknownVillager { id: id.to_string() })
    }

    pub fn villagers_of<'a>(&'a self, house_id: &'a str) -> impl Iterator<Item = &'a Villager> + 'a {
        self.villagers.iter().filter(move |v| v.house_id() == house_id)
    }

    // ── Commands ───────────────────────────────────────────────

    /// Queue a command for the next tick. Returns its id.
    pub fn submit_command(&mut self, command: PlayerCommand) -> String {
        let command_id = uuid::Uuid::new_v4().to_string();
        self.commands.push_back(QueuedCommand {
            run_id:     self.run_id.clone(),
            queued_at:  self.clock.current_tick,
            command_id: command_id.clone(),
            command,
        });
        command_id
    }

    fn apply_commands(&mut self) {
        let tick = self.clock.current_tick;
        while let Some(queued) = self.commands.pop_front() {
            let command = queued.command;
            self.events.emit(SimEvent::PlayerCommandReceived {
                tick,
                command_type: command.type_name().to_string(),
            });
            if let Err(err) = self.apply_command(command) {
                log::warn!("command {} ignored: {err}", queued.command_id);
            }
        }
    }

    fn apply_command(&mut self, command: PlayerCommand) -> SimResult<()> {
        match command {
            PlayerCommand::Pause             => self.clock.pause(),
            PlayerCommand::Resume            => self.clock.resume(),
            PlayerCommand::SetSpeed { speed } => self.clock.set_speed(speed),
            PlayerCommand::Build { building_id, bypass_cost } => {
                self.build(&building_id, bypass_cost)?;
            }
            PlayerCommand::Upgrade { building_id, bypass_cost } => {
                self.upgrade(&building_id, bypass_cost)?;
            }
            PlayerCommand::StartWork { building_id, source } => {
                self.start_work(&building_id, source)?;
            }
            PlayerCommand::StopWork { building_id } => {
                self.stop_work(&building_id)?;
            }
            PlayerCommand::SelectVillager { villager_id } => {
                self.villager(&villager_id)?;
                self.registry.start_assignment(&villager_id);
            }
            PlayerCommand::AssignTo { workplace_id } => {
                // Rejections are reported as events; nothing to propagate.
                let _ = self.assign_selected(&workplace_id);
            }
            PlayerCommand::CancelAssignment => self.registry.cancel_assignment(),
            PlayerCommand::Unassign { villager_id } => {
                if let Err(err) = self.unassign(&villager_id) {
                    log::debug!("unassign {villager_id}: {err}");
                }
            }
            PlayerCommand::SetMaxFishCapacity { capacity } => {
                self.ledger.set_max_fish_capacity(capacity);
            }
        }
        Ok(())
    }

    // ── Tick ───────────────────────────────────────────────────

    /// Advance one host frame of `real_dt` seconds. Returns every event
    /// emitted during the frame, in emission order.
    pub fn tick(&mut self, real_dt: Seconds) -> SimResult<Vec<SimEvent>> {
        let delta = self.clock.advance(real_dt);
        let tick = self.clock.current_tick;
        self.events.emit(SimEvent::TickStarted { tick });

        self.apply_commands();

        self.nav.advance(delta.scaled);

        let report = self.scheduler.tick(delta);
        if report.cancelled > 0 {
            log::debug!("tick={tick} scheduler cancelled {} ops", report.cancelled);
        }

        for building in self.buildings.iter_mut() {
            building.step_work(delta, &mut self.ledger);
        }
        let buildings = &self.buildings;
        self.work_sessions
            .retain(|id, _| buildings.get(id).is_some_and(|b| b.is_working()));

        let mut ctx = LoopContext {
            buildings: &self.buildings,
            ledger:    &mut self.ledger,
            spawner:   &self.spawner,
            nav:       &self.nav,
        };
        for villager in &mut self.villagers {
            villager.step(&mut ctx);
        }

        self.events.emit(SimEvent::TickCompleted { tick });
        self.drain_events()
    }

    /// Run `seconds` of real time in frames of `dt`.
    pub fn run_for(&mut self, seconds: Seconds, dt: Seconds) -> SimResult<()> {
        if dt <= 0.0 {
            return Err(SimError::Config(format!("frame delta must be > 0, got {dt}")));
        }
        let frames = (seconds / dt).round().max(0.0) as u64;
        for _ in 0..frames {
            self.tick(dt)?;
        }
        Ok(())
    }

    /// Run `seconds` at the configured frame rate.
    pub fn run_seconds(&mut self, seconds: Seconds) -> SimResult<()> {
        let dt = self.config.balance.engine.frame_seconds;
        self.run_for(seconds, dt)
    }

    /// Deliver everything emitted since the last drain.
    fn drain_events(&mut self) -> SimResult<Vec<SimEvent>> {
        let drained: Vec<SimEvent> = self.inbox.try_iter().collect();
        if let Some(store) = &self.store {
            for event in &drained {
                let entry = EventLogEntry {
                    id:         None,
                    run_id:     self.run_id.clone(),
                    tick:       self.clock.current_tick,
                    event_type: event.type_name().to_string(),
                    payload:    serde_json::to_string(event)?,
                };
                store.append_event(&entry)?;
            }
        }
        for event in &drained {
            self.bus.publish(event);
        }
        Ok(drained)
    }

    /// Flush events emitted outside `tick` (construction, load, direct calls).
    pub fn flush_events(&mut self) -> SimResult<Vec<SimEvent>> {
        self.drain_events()
    }

    // ── Buildings ──────────────────────────────────────────────

    /// Returns true if the building was built.
    pub fn build(&mut self, building_id: &str, bypass_cost: bool) -> SimResult<bool> {
        let building = self
            .buildings
            .get_mut(building_id)
            .ok_or_else(|| SimError::UnknownBuilding { id: building_id.to_string() })?;
        let built = building.build(&mut self.ledger, bypass_cost);
        if built {
            self.sync_house(building_id);
        }
        Ok(built)
    }

    /// Returns true if the level went up.
    pub fn upgrade(&mut self, building_id: &str, bypass_cost: bool) -> SimResult<bool> {
        let building = self
            .buildings
            .get_mut(building_id)
            .ok_or_else(|| SimError::UnknownBuilding { id: building_id.to_string() })?;
        let upgraded = building.upgrade(&mut self.ledger, bypass_cost);
        if upgraded {
            self.sync_house(building_id);
        }
        Ok(upgraded)
    }

    /// Start a direct work session. Returns false if nothing started.
    pub fn start_work(&mut self, building_id: &str, source: WorkSource) -> SimResult<bool> {
        let building = self
            .buildings
            .get_mut(building_id)
            .ok_or_else(|| SimError::UnknownBuilding { id: building_id.to_string() })?;
        let cancel = CancelSource::new();
        let started = building.start_work(cancel.token(), source, &self.ledger);
        if started {
            self.work_sessions.insert(building_id.to_string(), cancel);
        }
        Ok(started)
    }

    /// Cancel a direct work session. It tears down on the next tick.
    pub fn stop_work(&mut self, building_id: &str) -> SimResult<bool> {
        self.building(building_id)?;
        match self.work_sessions.remove(building_id) {
            Some(cancel) => {
                cancel.cancel();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Spawn villagers up to the house's level cap and refresh their stats.
    /// Does nothing for buildings that are not built villager houses.
    fn sync_house(&mut self, house_id: &str) {
        let Some(house) = self.buildings.get(house_id) else { return };
        if !house.is_built() {
            return;
        }
        let Some(stats) = house.kind().villager_stats(house.level()) else { return };
        let desired = house.level().clamp(1, MAX_VILLAGERS_PER_HOUSE) as usize;
        let spawn_point = house.position();

        for villager in self.villagers.iter_mut().filter(|v| v.house_id() == house_id) {
            villager.apply_stats(stats);
        }

        let existing = self.villagers.iter().filter(|v| v.house_id() == house_id).count();
        for _ in existing..desired {
            let id = uuid::Uuid::new_v4().to_string();
            self.spawn_villager(id, house_id, spawn_point, stats);
        }
    }

    fn spawn_villager(
        &mut self,
        id: EntityId,
        house_id: &str,
        position: Point,
        stats: VillagerStats,
    ) {
        self.nav.warp(&id, position);
        log::debug!("spawned villager {id} at {house_id}");
        self.events.emit(SimEvent::VillagerSpawned {
            villager_id: id.clone(),
            house_id:    house_id.to_string(),
        });
        self.villagers.push(Villager::new(id, house_id.to_string(), stats, self.events.clone()));
    }

    // ── Assignment ─────────────────────────────────────────────

    pub fn select_villager(&mut self, villager_id: &str) -> SimResult<()> {
        self.villager(villager_id)?;
        self.registry.start_assignment(villager_id);
        Ok(())
    }

    pub fn cancel_assignment(&mut self) {
        self.registry.cancel_assignment();
    }

    pub fn assign_selected(&mut self, workplace_id: &str) -> Result<(), AssignmentError> {
        self.registry.try_assign_to(workplace_id, &mut self.buildings, &mut self.villagers)
    }

    /// Select and assign in one go.
    pub fn assign(&mut self, villager_id: &str, workplace_id: &str) -> Result<(), AssignmentError> {
        self.registry.start_assignment(villager_id);
        self.assign_selected(workplace_id)
    }

    pub fn unassign(&mut self, villager_id: &str) -> Result<(), AssignmentError> {
        self.registry.unassign(villager_id, &mut self.buildings, &mut self.villagers)
    }

    // ── Save / load ────────────────────────────────────────────

    pub fn snapshot(&self, now: DateTime<Utc>) -> SaveSnapshot {
        let ledger = self.ledger.totals();
        SaveSnapshot {
            version:           SNAPSHOT_VERSION,
            gold:              ledger.gold,
            fish:              ledger.fish,
            max_fish_capacity: ledger.max_fish_capacity,
            buildings: self
                .buildings
                .iter()
                .map(|b| BuildingSave {
                    building_id: b.id().to_string(),
                    built:       b.is_built(),
                    level:       b.level(),
                })
                .collect(),
            villagers: self
                .villagers
                .iter()
                .map(|v| VillagerSave {
                    villager_id:           v.id().to_string(),
                    assigned_workplace_id: v.workplace().map(str::to_string),
                    origin_house_id:       v.house_id().to_string(),
                })
                .collect(),
            last_online: now,
        }
    }

    /// Replace the current state with `snapshot` and credit offline income
    /// for the time between its save and `now`. Running sessions are torn
    /// down and buildings the save does not name go back to their scene
    /// layout.
    pub fn restore(&mut self, snapshot: &SaveSnapshot, now: DateTime<Utc>) -> OfflineReport {
        self.scheduler.cancel_all();
        for (_, cancel) in self.work_sessions.drain() {
            cancel.cancel();
        }
        for building in self.buildings.iter_mut() {
            building.reset_to_scene();
        }
        for villager in &self.villagers {
            self.nav.forget(villager.id());
        }
        self.villagers.clear();
        self.registry.cancel_assignment();

        self.ledger.set_max_fish_capacity(snapshot.max_fish_capacity);
        self.ledger.set_gold(snapshot.gold);
        self.ledger.set_fish(snapshot.fish);

        for saved in &snapshot.buildings {
            match self.buildings.get_mut(&saved.building_id) {
                Some(building) if saved.built => building.force_build(saved.level),
                Some(building) => {
                    building.unbuild();
                    building.set_level(saved.level);
                }
                None => log::warn!("save names unknown building '{}', skipped", saved.building_id),
            }
        }

        for saved in &snapshot.villagers {
            let Some(house) = self.buildings.get(&saved.origin_house_id).filter(|h| h.is_built()) else {
                log::warn!("villager {} has no built house, skipped", saved.villager_id);
                continue;
            };
            let Some(stats) = house.kind().villager_stats(house.level()) else { continue };
            let position = house.position();
            self.spawn_villager(saved.villager_id.clone(), &saved.origin_house_id, position, stats);
        }

        let houses: Vec<EntityId> = self
            .buildings
            .iter()
            .filter(|b| b.tag() == BuildingKindTag::VillagerHouse)
            .map(|b| b.id().to_string())
            .collect();
        for house_id in houses {
            self.sync_house(&house_id);
        }

        for saved in &snapshot.villagers {
            let Some(workplace_id) = saved.assigned_workplace_id.as_deref() else { continue };
            let Some(villager) = self.villagers.iter_mut().find(|v| v.id() == saved.villager_id) else {
                continue;
            };
            let built = self.buildings.get(workplace_id).is_some_and(|w| w.is_built());
            if built && self.registry.bind(villager, workplace_id, &mut self.buildings) {
                villager.start_work(workplace_id.to_string());
            } else {
                log::warn!("villager {} could not return to {workplace_id}", saved.villager_id);
            }
        }

        let report = offline::estimate(
            snapshot.seconds_offline(now),
            &self.buildings,
            &self.villagers,
            &self.config.balance.offline,
        );
        if report.total_gold > 0 {
            self.ledger.add_gold(report.total_gold);
            self.events.emit(SimEvent::OfflineIncomeAwarded {
                seconds: report.capped_seconds,
                gold:    report.total_gold,
            });
        }
        log::info!(
            "restored save: gold={} fish={} villagers={} offline={:.0}s (+{} gold)",
            self.ledger.gold(),
            self.ledger.fish(),
            self.villagers.len(),
            report.capped_seconds,
            report.total_gold
        );
        report
    }

    /// Write the current state to `slot` of the attached store.
    pub fn save(&self, slot: &str, now: DateTime<Utc>) -> SimResult<()> {
        let store = self.store.as_ref().ok_or(SimError::NoStore)?;
        let json = self.snapshot(now).to_json()?;
        store.save_game(slot, SNAPSHOT_VERSION, &json, now)?;
        self.events.emit(SimEvent::GameSaved { slot: slot.to_string() });
        log::info!("saved slot '{slot}' ({} bytes)", json.len());
        Ok(())
    }

    /// Restore `slot` from the attached store. A missing, unreadable or
    /// newer-version save leaves the default state in place.
    pub fn load(&mut self, slot: &str, now: DateTime<Utc>) -> SimResult<OfflineReport> {
        let store = self.store.as_ref().ok_or(SimError::NoStore)?;
        let Some(json) = store.load_game(slot)? else {
            log::info!("no save in slot '{slot}', starting fresh");
            return Ok(OfflineReport::default());
        };
        let snapshot = match SaveSnapshot::from_json(&json) {
            Ok(snapshot) => snapshot,
            Err(err) => {
                log::warn!("save in slot '{slot}' is unreadable, starting fresh: {err}");
                return Ok(OfflineReport::default());
            }
        };
        if snapshot.version > SNAPSHOT_VERSION {
            log::warn!(
                "save in slot '{slot}' has version {} (> {SNAPSHOT_VERSION}), starting fresh",
                snapshot.version
            );
            return Ok(OfflineReport::default());
        }
        let report = self.restore(&snapshot, now);
        self.events.emit(SimEvent::GameLoaded { slot: slot.to_string() });
        Ok(report)
    }
}
