use serde::{Deserialize, Serialize};
use crate::{
    building::WorkSource,
    clock::SimSpeed,
    types::{Amount, EntityId, RunId, Tick},
};

/// All player-issued commands. Applied at the start of the next tick, in
/// submission order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum PlayerCommand {
    // ── Clock control ─────────────────────────────
    Pause,
    Resume,
    SetSpeed { speed: SimSpeed },

    // ── Buildings ─────────────────────────────────
    Build {
        building_id: EntityId,
        #[serde(default)]
        bypass_cost: bool,
    },
    Upgrade {
        building_id: EntityId,
        #[serde(default)]
        bypass_cost: bool,
    },
    StartWork {
        building_id: EntityId,
        #[serde(default = "default_source")]
        source: WorkSource,
    },
    StopWork {
        building_id: EntityId,
    },

    // ── Villagers ─────────────────────────────────
    SelectVillager {
        villager_id: EntityId,
    },
    AssignTo {
        workplace_id: EntityId,
    },
    CancelAssignment,
    Unassign {
        villager_id: EntityId,
    },

    // ── Economy ───────────────────────────────────
    SetMaxFishCapacity {
        capacity: Amount,
    },
}

fn default_source() -> WorkSource {
    WorkSource::Player
}

impl PlayerCommand {
    /// Stable name for logs and the `player_command_received` event.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Pause                     => "pause",
            Self::Resume                    => "resume",
            Self::SetSpeed { .. }           => "set_speed",
            Self::Build { .. }              => "build",
            Self::Upgrade { .. }            => "upgrade",
            Self::StartWork { .. }          => "start_work",
            Self::StopWork { .. }           => "stop_work",
            Self::SelectVillager { .. }     => "select_villager",
            Self::AssignTo { .. }           => "assign_to",
            Self::CancelAssignment          => "cancel_assignment",
            Self::Unassign { .. }           => "unassign",
            Self::SetMaxFishCapacity { .. } => "set_max_fish_capacity",
        }
    }
}

/// A queued player command with its submission tick.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueuedCommand {
    pub run_id:     RunId,
    pub queued_at:  Tick,
    pub command_id: String,
    pub command:    PlayerCommand,
}
