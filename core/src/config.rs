use crate::{
    error::{SimError, SimResult},
    types::{Amount, Point, Seconds},
};
use serde::{Deserialize, Serialize};

// ── Ledger ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerConfig {
    pub starting_gold: Amount,
    pub starting_fish: Amount,
    pub max_fish_capacity: Amount,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            starting_gold: 500,
            starting_fish: 0,
            max_fish_capacity: 100,
        }
    }
}

// ── Per-kind building balance ──────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoatConfig {
    pub display_name: String,
    pub max_level: u32,
    pub build_base_cost: Amount,
    pub upgrade_base_cost: Amount,
    pub upgrade_cost_growth: f64,
    pub base_cycle_seconds: Seconds,
    pub base_catch_amount: Amount,
    pub cycle_time_per_level_mult: f64,
    pub catch_per_level_add: Amount,
}

impl Default for BoatConfig {
    fn default() -> Self {
        Self {
            display_name: "Boat".into(),
            max_level: 10,
            build_base_cost: 100,
            upgrade_base_cost: 50,
            upgrade_cost_growth: 1.15,
            base_cycle_seconds: 4.0,
            base_catch_amount: 3,
            cycle_time_per_level_mult: 0.98,
            catch_per_level_add: 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeatShopConfig {
    pub display_name: String,
    pub max_level: u32,
    pub build_base_cost: Amount,
    pub upgrade_base_cost: Amount,
    pub upgrade_cost_growth: f64,
    pub base_cycle_seconds: Seconds,
    pub base_meat_amount: Amount,
    pub meat_per_level_add: Amount,
}

impl Default for MeatShopConfig {
    fn default() -> Self {
        Self {
            display_name: "Meat Shop".into(),
            max_level: 10,
            build_base_cost: 120,
            upgrade_base_cost: 180,
            upgrade_cost_growth: 1.1,
            base_cycle_seconds: 6.0,
            base_meat_amount: 3,
            meat_per_level_add: 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LighthouseConfig {
    pub display_name: String,
    pub max_level: u32,
    pub build_base_cost: Amount,
    pub upgrade_base_cost: Amount,
    pub upgrade_cost_growth: f64,
    /// Duration of one full sale.
    pub base_cycle_seconds: Seconds,
    pub base_gold_per_fish: Amount,
    pub gold_per_level_add: Amount,
}

impl Default for LighthouseConfig {
    fn default() -> Self {
        Self {
            display_name: "Lighthouse".into(),
            max_level: 10,
            build_base_cost: 100,
            upgrade_base_cost: 75,
            upgrade_cost_growth: 1.2,
            base_cycle_seconds: 2.0,
            base_gold_per_fish: 2,
            gold_per_level_add: 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VillagerStats {
    pub move_speed: f64,
    pub carry_capacity: Amount,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VillagerHouseConfig {
    pub display_name: String,
    pub max_level: u32,
    pub build_base_cost: Amount,
    pub upgrade_base_cost: Amount,
    /// Indexed by level - 1.
    pub level_stats: Vec<VillagerStats>,
}

impl VillagerHouseConfig {
    /// Stats for `level`, clamped into the table.
    pub fn stats(&self, level: u32) -> VillagerStats {
        let last = self.level_stats.len().saturating_sub(1);
        let index = (level.max(1) as usize - 1).min(last);
        self.level_stats
            .get(index)
            .copied()
            .unwrap_or(VillagerStats { move_speed: 3.0, carry_capacity: 15 })
    }
}

impl Default for VillagerHouseConfig {
    fn default() -> Self {
        Self {
            display_name: "Villager House".into(),
            max_level: 3,
            build_base_cost: 150,
            upgrade_base_cost: 100,
            level_stats: vec![
                VillagerStats { move_speed: 3.0, carry_capacity: 15 },
                VillagerStats { move_speed: 3.5, carry_capacity: 25 },
                VillagerStats { move_speed: 4.0, carry_capacity: 40 },
            ],
        }
    }
}

// ── Offline estimator ──────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OfflineConfig {
    pub max_offline_seconds: Seconds,
    pub travel_seconds: Seconds,
    pub sell_seconds: Seconds,
    /// Gold per fish when no lighthouse is built.
    pub fallback_fish_price: Amount,
}

impl Default for OfflineConfig {
    fn default() -> Self {
        Self {
            max_offline_seconds: 6.0 * 3600.0,
            travel_seconds: 5.0,
            sell_seconds: 10.0,
            fallback_fish_price: 1,
        }
    }
}

// ── Engine ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Real seconds per frame for headless runs.
    pub frame_seconds: Seconds,
    /// Slot used by save/load when none is given.
    pub save_slot: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            frame_seconds: 1.0 / 60.0,
            save_slot: "main".into(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BalanceConfig {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub ledger: LedgerConfig,
    #[serde(default)]
    pub boat: BoatConfig,
    #[serde(default)]
    pub meat_shop: MeatShopConfig,
    #[serde(default)]
    pub lighthouse: LighthouseConfig,
    #[serde(default)]
    pub villager_house: VillagerHouseConfig,
    #[serde(default)]
    pub offline: OfflineConfig,
}

// ── Scene layout ───────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildingKindTag {
    Boat,
    MeatShop,
    Lighthouse,
    VillagerHouse,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlacementConfig {
    pub id: String,
    pub kind: BuildingKindTag,
    #[serde(default = "default_index_multiplier")]
    pub index_multiplier: u32,
    #[serde(default)]
    pub start_built: bool,
    pub position: Point,
    /// Where villagers stand while working or selling. Defaults to `position`.
    #[serde(default)]
    pub work_point: Option<Point>,
}

fn default_index_multiplier() -> u32 { 1 }

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SceneConfig {
    pub buildings: Vec<PlacementConfig>,
}

// ── Root ───────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct GameConfig {
    pub balance: BalanceConfig,
    pub scene: SceneConfig,
}

impl GameConfig {
    /// Load from the data/ directory.
    /// In tests, use GameConfig::default_test().
    pub fn load(data_dir: &str) -> anyhow::Result<Self> {
        let balance_path = format!("{data_dir}/balance.json");
        let balance_content = std::fs::read_to_string(&balance_path)
            .map_err(|e| anyhow::anyhow!("Cannot read {balance_path}: {e}"))?;
        let balance: BalanceConfig = serde_json::from_str(&balance_content)?;

        let scene_path = format!("{data_dir}/scene.json");
        let scene_content = std::fs::read_to_string(&scene_path)
            .map_err(|e| anyhow::anyhow!("Cannot read {scene_path}: {e}"))?;
        let scene: SceneConfig = serde_json::from_str(&scene_content)?;

        let config = Self { balance, scene };
        config.validate()?;
        log::info!(
            "Loaded config from {data_dir}: {} buildings",
            config.scene.buildings.len()
        );
        Ok(config)
    }

    pub fn validate(&self) -> SimResult<()> {
        let b = &self.balance;
        for (name, max_level) in [
            ("boat", b.boat.max_level),
            ("meat_shop", b.meat_shop.max_level),
            ("lighthouse", b.lighthouse.max_level),
            ("villager_house", b.villager_house.max_level),
        ] {
            if max_level == 0 {
                return Err(SimError::Config(format!("{name}.max_level must be >= 1")));
            }
        }
        if b.villager_house.level_stats.is_empty() {
            return Err(SimError::Config("villager_house.level_stats is empty".into()));
        }
        if b.engine.frame_seconds <= 0.0 {
            return Err(SimError::Config("engine.frame_seconds must be > 0".into()));
        }
        if b.ledger.max_fish_capacity < 0 {
            return Err(SimError::Config("ledger.max_fish_capacity must be >= 0".into()));
        }

        let mut seen = std::collections::HashSet::new();
        for placement in &self.scene.buildings {
            if !seen.insert(placement.id.as_str()) {
                return Err(SimError::Config(format!("duplicate building id '{}'", placement.id)));
            }
        }
        Ok(())
    }

    /// Default balance with a small harbor: two boats, a meat shop,
    /// a lighthouse and one villager house.
    pub fn default_test() -> Self {
        let place = |id: &str, kind, index_multiplier, x: f64, z: f64| PlacementConfig {
            id: id.into(),
            kind,
            index_multiplier,
            start_built: false,
            position: Point::new(x, z),
            work_point: Some(Point::new(x, z + 1.0)),
        };
        Self {
            balance: BalanceConfig::default(),
            scene: SceneConfig {
                buildings: vec![
                    place("boat-1", BuildingKindTag::Boat, 1, 10.0, 0.0),
                    place("boat-2", BuildingKindTag::Boat, 2, 20.0, 0.0),
                    place("meat-shop", BuildingKindTag::MeatShop, 1, -10.0, 5.0),
                    place("lighthouse", BuildingKindTag::Lighthouse, 1, 0.0, 20.0),
                    place("house-1", BuildingKindTag::VillagerHouse, 1, 0.0, -5.0),
                ],
            },
        }
    }
}
