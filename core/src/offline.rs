//! Offline progress. Estimates the gold villagers would have earned while
//! the game was closed.
//!
//! Each staffed workplace is modelled as an endless trip: fill the villager's
//! load at the workplace's throughput, walk, sell the full load. Only whole
//! trips count.

use crate::{
    building::BuildingSet,
    config::{BuildingKindTag, OfflineConfig},
    types::{Amount, EntityId, Seconds},
    villager::Villager,
};
use serde::{Deserialize, Serialize};

const MIN_CYCLE_SECONDS: Seconds = 0.01;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OfflineYield {
    pub workplace_id: EntityId,
    pub villager_id:  EntityId,
    pub trip_seconds: Seconds,
    pub trips:        u64,
    pub gold:         Amount,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OfflineReport {
    /// Elapsed seconds after the cap.
    pub capped_seconds: Seconds,
    pub lines:          Vec<OfflineYield>,
    pub total_gold:     Amount,
}

impl OfflineReport {
    pub fn is_empty(&self) -> bool {
        self.total_gold == 0
    }
}

/// Estimate income for `elapsed_seconds` away. Negative elapsed time (clock
/// moved backwards) counts as zero.
pub fn estimate(
    elapsed_seconds: Seconds,
    buildings: &BuildingSet,
    villagers: &[Villager],
    config: &OfflineConfig,
) -> OfflineReport {
    let capped_seconds = elapsed_seconds.clamp(0.0, config.max_offline_seconds.max(0.0));
    let mut report = OfflineReport { capped_seconds, ..OfflineReport::default() };
    if capped_seconds <= 0.0 {
        return report;
    }

    let price = buildings.fish_price_or(config.fallback_fish_price);

    for workplace in buildings.iter() {
        if !workplace.is_built()
            || !matches!(workplace.tag(), BuildingKindTag::Boat | BuildingKindTag::MeatShop)
        {
            continue;
        }
        let Some(occupant) = workplace.occupant() else { continue };
        let Some(villager) = villagers.iter().find(|v| v.id() == occupant) else { continue };
        // The house must still stand for its villager to keep working.
        if !buildings.get(villager.house_id()).is_some_and(|h| h.is_built()) {
            continue;
        }

        let yield_per_cycle = workplace.yield_amount();
        if yield_per_cycle <= 0 {
            continue;
        }
        let capacity = villager.carry_capacity();
        let throughput = yield_per_cycle as f64 / workplace.cycle_seconds().max(MIN_CYCLE_SECONDS);
        let fill_seconds = capacity as f64 / throughput;
        let trip_seconds = fill_seconds + config.travel_seconds + config.sell_seconds;
        if trip_seconds <= 0.0 {
            continue;
        }

        let trips = (capped_seconds / trip_seconds).floor() as u64;
        let gold = (trips as Amount).saturating_mul(capacity).saturating_mul(price);
        log::debug!(
            "offline: {} staffed by {occupant}: {trips} trips of {trip_seconds:.1}s -> {gold} gold",
            workplace.id()
        );
        report.total_gold = report.total_gold.saturating_add(gold);
        report.lines.push(OfflineYield {
            workplace_id: workplace.id().to_string(),
            villager_id: occupant.to_string(),
            trip_seconds,
            trips,
            gold,
        });
    }
    report
}
