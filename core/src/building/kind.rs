//! Per-kind balance formulas.
//!
//! Each building kind carries its own parameter struct; every formula is a
//! pure function of (params, level, index multiplier). Adding a kind means
//! adding a variant and one arm per function.

use crate::{
    config::{
        BalanceConfig, BoatConfig, BuildingKindTag, LighthouseConfig, MeatShopConfig,
        VillagerHouseConfig, VillagerStats,
    },
    types::{Amount, Seconds},
};

/// Floor for any production cycle.
pub const MIN_CYCLE_SECONDS: Seconds = 0.5;

/// How a building behaves when someone starts working it directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkMode {
    /// Produce every cycle until cancelled.
    Continuous,
    /// Produce one cycle, then stop.
    SingleCycle,
    /// Sell the ledger's fish for gold, then stop.
    Sale,
    /// Nothing to work.
    Idle,
}

#[derive(Debug, Clone)]
pub enum BuildingKind {
    Boat(BoatConfig),
    MeatShop(MeatShopConfig),
    Lighthouse(LighthouseConfig),
    VillagerHouse(VillagerHouseConfig),
}

impl BuildingKind {
    pub fn from_tag(tag: BuildingKindTag, balance: &BalanceConfig) -> Self {
        match tag {
            BuildingKindTag::Boat          => Self::Boat(balance.boat.clone()),
            BuildingKindTag::MeatShop      => Self::MeatShop(balance.meat_shop.clone()),
            BuildingKindTag::Lighthouse    => Self::Lighthouse(balance.lighthouse.clone()),
            BuildingKindTag::VillagerHouse => Self::VillagerHouse(balance.villager_house.clone()),
        }
    }

    pub fn tag(&self) -> BuildingKindTag {
        match self {
            Self::Boat(_)          => BuildingKindTag::Boat,
            Self::MeatShop(_)      => BuildingKindTag::MeatShop,
            Self::Lighthouse(_)    => BuildingKindTag::Lighthouse,
            Self::VillagerHouse(_) => BuildingKindTag::VillagerHouse,
        }
    }

    pub fn display_name(&self) -> &str {
        match self {
            Self::Boat(c)          => &c.display_name,
            Self::MeatShop(c)      => &c.display_name,
            Self::Lighthouse(c)    => &c.display_name,
            Self::VillagerHouse(c) => &c.display_name,
        }
    }

    pub fn max_level(&self) -> u32 {
        let max = match self {
            Self::Boat(c)          => c.max_level,
            Self::MeatShop(c)      => c.max_level,
            Self::Lighthouse(c)    => c.max_level,
            Self::VillagerHouse(c) => c.max_level,
        };
        max.max(1)
    }

    /// Can a villager be assigned here?
    pub fn is_workplace(&self) -> bool {
        matches!(self, Self::Boat(_) | Self::MeatShop(_))
    }

    pub fn work_mode(&self) -> WorkMode {
        match self {
            Self::Boat(_)          => WorkMode::Continuous,
            Self::MeatShop(_)      => WorkMode::SingleCycle,
            Self::Lighthouse(_)    => WorkMode::Sale,
            Self::VillagerHouse(_) => WorkMode::Idle,
        }
    }

    /// Seconds per cycle. For a villager house this is the villagers' move
    /// speed, which is what its "Speed" label shows.
    pub fn cycle_seconds(&self, level: u32, index_multiplier: u32) -> Seconds {
        let level = self.clamp_level(level);
        match self {
            Self::Boat(c) => {
                let base = c.base_cycle_seconds * c.cycle_time_per_level_mult.powi(level as i32 - 1);
                (base * index_reduction(index_multiplier)).max(MIN_CYCLE_SECONDS)
            }
            Self::MeatShop(c) => {
                let base = (c.base_cycle_seconds - 0.25 * f64::from(level - 1)).max(MIN_CYCLE_SECONDS);
                (base * index_reduction(index_multiplier)).max(MIN_CYCLE_SECONDS)
            }
            Self::Lighthouse(c)    => c.base_cycle_seconds,
            Self::VillagerHouse(c) => c.stats(level).move_speed,
        }
    }

    /// Units per cycle. For a lighthouse this is the gold price per fish,
    /// for a villager house the villagers' carry capacity.
    pub fn yield_amount(&self, level: u32, index_multiplier: u32) -> Amount {
        let level = self.clamp_level(level);
        let idx = Amount::from(index_multiplier.max(1));
        let steps = Amount::from(level - 1);
        match self {
            Self::Boat(c)          => (c.base_catch_amount + steps * c.catch_per_level_add) * idx,
            Self::MeatShop(c)      => (c.base_meat_amount + steps * c.meat_per_level_add) * idx,
            Self::Lighthouse(c)    => c.base_gold_per_fish + steps * c.gold_per_level_add,
            Self::VillagerHouse(c) => c.stats(level).carry_capacity,
        }
    }

    pub fn build_cost(&self, index_multiplier: u32) -> Amount {
        let idx = Amount::from(index_multiplier.max(1));
        let base = match self {
            Self::Boat(c)          => c.build_base_cost,
            Self::MeatShop(c)      => c.build_base_cost,
            Self::Lighthouse(c)    => c.build_base_cost,
            Self::VillagerHouse(c) => c.build_base_cost,
        };
        base * idx
    }

    /// Cost of going from `level` to `level + 1`.
    pub fn upgrade_cost(&self, level: u32, index_multiplier: u32) -> Amount {
        let idx = Amount::from(index_multiplier.max(1));
        match self {
            Self::Boat(c) => {
                let lvl = level.clamp(1, (self.max_level() - 1).max(1));
                growth_cost(c.upgrade_base_cost, c.upgrade_cost_growth, lvl) * idx
            }
            Self::MeatShop(c) => growth_cost(c.upgrade_base_cost, c.upgrade_cost_growth, level.max(1)) * idx,
            Self::Lighthouse(c) => {
                let lvl = level.clamp(1, (self.max_level() - 1).max(1));
                growth_cost(c.upgrade_base_cost, c.upgrade_cost_growth, lvl) * idx
            }
            Self::VillagerHouse(c) => c.upgrade_base_cost * Amount::from(level.max(1)) * idx,
        }
    }

    pub fn cycle_label(&self) -> &'static str {
        match self {
            Self::Boat(_) | Self::MeatShop(_)           => "Cycle",
            Self::Lighthouse(_) | Self::VillagerHouse(_) => "Speed",
        }
    }

    pub fn amount_label(&self) -> &'static str {
        match self {
            Self::Boat(_)          => "Catch",
            Self::MeatShop(_)      => "Meat",
            Self::Lighthouse(_)    => "Fish Price",
            Self::VillagerHouse(_) => "Fish Capacity",
        }
    }

    /// Villager stats granted by a house at `level`.
    pub fn villager_stats(&self, level: u32) -> Option<VillagerStats> {
        match self {
            Self::VillagerHouse(c) => Some(c.stats(level)),
            _ => None,
        }
    }

    /// Seconds for a villager to hand over a full load at the lighthouse.
    pub fn sale_seconds(&self) -> Option<Seconds> {
        match self {
            Self::Lighthouse(c) => Some(c.base_cycle_seconds),
            _ => None,
        }
    }

    fn clamp_level(&self, level: u32) -> u32 {
        level.clamp(1, self.max_level())
    }
}

/// Higher index multipliers shave 5% off the cycle per step.
fn index_reduction(index_multiplier: u32) -> f64 {
    1.0 - 0.05 * f64::from(index_multiplier.max(1) - 1)
}

fn growth_cost(base: Amount, growth: f64, level: u32) -> Amount {
    (base as f64 * growth.powi(level as i32 - 1)).ceil() as Amount
}
