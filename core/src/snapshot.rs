//! Save snapshot: the persisted state of a session.
//!
//! Only durable progress is captured: balances, building levels, villager
//! identities and their workplaces. In-flight work (carried fish, running
//! cycles, walks) is not saved; loops restart from the beginning on load.

use crate::types::{Amount, EntityId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildingSave {
    pub building_id: EntityId,
    pub built:       bool,
    pub level:       u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VillagerSave {
    pub villager_id:           EntityId,
    #[serde(default)]
    pub assigned_workplace_id: Option<EntityId>,
    pub origin_house_id:       EntityId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaveSnapshot {
    pub version:           u32,
    pub gold:              Amount,
    pub fish:              Amount,
    pub max_fish_capacity: Amount,
    #[serde(default)]
    pub buildings:         Vec<BuildingSave>,
    #[serde(default)]
    pub villagers:         Vec<VillagerSave>,
    pub last_online:       DateTime<Utc>,
}

impl SaveSnapshot {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    /// Seconds between the save and `now`; zero if the clock went backwards.
    pub fn seconds_offline(&self, now: DateTime<Utc>) -> f64 {
        let elapsed = now.signed_duration_since(self.last_online);
        (elapsed.num_milliseconds() as f64 / 1000.0).max(0.0)
    }
}
