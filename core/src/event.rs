//! Change notifications.
//!
//! RULE: Simulation objects never hold references to their observers.
//! They push `SimEvent`s into an `EventSender`; the engine drains the
//! channel once per phase, logs the events and republishes them on the
//! `EventBus` for presentation layers.

use crate::{
    building::WorkSource,
    types::{Amount, EntityId, RunId, Seconds, Tick},
};
use serde::{Deserialize, Serialize};
use std::sync::mpsc::{self, Receiver, Sender};

/// Every event emitted during simulation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SimEvent {
    // ── Engine events ──────────────────────────────
    TickStarted {
        tick: Tick,
    },
    TickCompleted {
        tick: Tick,
    },
    RunInitialized {
        run_id: RunId,
    },
    GameLoaded {
        slot: String,
    },
    GameSaved {
        slot: String,
    },

    // ── Ledger events ──────────────────────────────
    GoldChanged {
        gold: Amount,
    },
    FishChanged {
        fish: Amount,
    },
    FishCapacityChanged {
        capacity: Amount,
    },

    // ── Building events ────────────────────────────
    BuildingStateChanged {
        building_id: EntityId,
        built: bool,
        level: u32,
    },
    WorkStarted {
        building_id: EntityId,
        source: WorkSource,
    },
    /// 0..=1 for player sessions, -1 for automated ones.
    ProgressUpdated {
        building_id: EntityId,
        progress: f64,
    },
    WorkStopped {
        building_id: EntityId,
    },
    YieldProduced {
        building_id: EntityId,
        amount: Amount,
    },

    // ── Villager events ────────────────────────────
    VillagerSpawned {
        villager_id: EntityId,
        house_id: EntityId,
    },
    VillagerAssigned {
        villager_id: EntityId,
        workplace_id: EntityId,
    },
    VillagerUnassigned {
        villager_id: EntityId,
        workplace_id: EntityId,
    },
    AssignmentRejected {
        villager_id: Option<EntityId>,
        workplace_id: EntityId,
        reason: String,
    },
    FishCollected {
        villager_id: EntityId,
        workplace_id: EntityId,
        amount: Amount,
        carried: Amount,
    },
    FishSold {
        villager_id: EntityId,
        amount: Amount,
        gold: Amount,
    },

    // ── Offline progress ───────────────────────────
    OfflineIncomeAwarded {
        seconds: Seconds,
        gold: Amount,
    },

    // ── Player command events ──────────────────────
    PlayerCommandReceived {
        tick: Tick,
        command_type: String,
    },
}

/// Coarse grouping used by bus subscriptions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventTopic {
    Engine,
    Ledger,
    Building,
    Villager,
    Offline,
    Command,
}

impl SimEvent {
    pub fn topic(&self) -> EventTopic {
        match self {
            Self::TickStarted { .. }
            | Self::TickCompleted { .. }
            | Self::RunInitialized { .. }
            | Self::GameLoaded { .. }
            | Self::GameSaved { .. } => EventTopic::Engine,
            Self::GoldChanged { .. }
            | Self::FishChanged { .. }
            | Self::FishCapacityChanged { .. } => EventTopic::Ledger,
            Self::BuildingStateChanged { .. }
            | Self::WorkStarted { .. }
            | Self::ProgressUpdated { .. }
            | Self::WorkStopped { .. }
            | Self::YieldProduced { .. } => EventTopic::Building,
            Self::VillagerSpawned { .. }
            | Self::VillagerAssigned { .. }
            | Self::VillagerUnassigned { .. }
            | Self::AssignmentRejected { .. }
            | Self::FishCollected { .. }
            | Self::FishSold { .. } => EventTopic::Villager,
            Self::OfflineIncomeAwarded { .. } => EventTopic::Offline,
            Self::PlayerCommandReceived { .. } => EventTopic::Command,
        }
    }

    /// Stable string name, used for the event_type column in event_log.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::TickStarted { .. }          => "tick_started",
            Self::TickCompleted { .. }        => "tick_completed",
            Self::RunInitialized { .. }       => "run_initialized",
            Self::GameLoaded { .. }           => "game_loaded",
            Self::GameSaved { .. }            => "game_saved",
            Self::GoldChanged { .. }          => "gold_changed",
            Self::FishChanged { .. }          => "fish_changed",
            Self::FishCapacityChanged { .. }  => "fish_capacity_changed",
            Self::BuildingStateChanged { .. } => "building_state_changed",
            Self::WorkStarted { .. }          => "work_started",
            Self::ProgressUpdated { .. }      => "progress_updated",
            Self::WorkStopped { .. }          => "work_stopped",
            Self::YieldProduced { .. }        => "yield_produced",
            Self::VillagerSpawned { .. }      => "villager_spawned",
            Self::VillagerAssigned { .. }     => "villager_assigned",
            Self::VillagerUnassigned { .. }   => "villager_unassigned",
            Self::AssignmentRejected { .. }   => "assignment_rejected",
            Self::FishCollected { .. }        => "fish_collected",
            Self::FishSold { .. }             => "fish_sold",
            Self::OfflineIncomeAwarded { .. } => "offline_income_awarded",
            Self::PlayerCommandReceived { .. }=> "player_command_received",
        }
    }
}

/// Sending half of the event channel, cloned into every subject.
#[derive(Debug, Clone)]
pub struct EventSender {
    tx: Sender<SimEvent>,
}

impl EventSender {
    /// Emit an event. A dropped receiver is not an error; nobody is listening.
    pub fn emit(&self, event: SimEvent) {
        let _ = self.tx.send(event);
    }

    /// A sender whose receiver is already gone.
    pub fn detached() -> Self {
        channel().0
    }
}

pub fn channel() -> (EventSender, Receiver<SimEvent>) {
    let (tx, rx) = mpsc::channel();
    (EventSender { tx }, rx)
}

/// The event log entry as persisted to SQLite.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventLogEntry {
    pub id:         Option<i64>,
    pub run_id:     RunId,
    pub tick:       Tick,
    pub event_type: String,
    pub payload:    String, // JSON-serialized SimEvent
}
