//! Workplace assignment: which villager works where.
//!
//! Invariants:
//!   - A workplace has at most one occupant.
//!   - A villager is bound to at most one workplace.
//!   - Both sides of a binding are always updated together.

use crate::{
    building::BuildingSet,
    event::{EventSender, SimEvent},
    types::EntityId,
    villager::Villager,
};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AssignmentError {
    #[error("no villager selected")]
    NoSelection,

    #[error("villager '{0}' not found")]
    UnknownVillager(EntityId),

    #[error("building '{0}' not found")]
    UnknownBuilding(EntityId),

    #[error("building '{0}' is not a workplace")]
    NotAWorkplace(EntityId),

    #[error("workplace '{0}' is not built")]
    NotBuilt(EntityId),

    #[error("workplace '{workplace}' is occupied by '{occupant}'")]
    Occupied { workplace: EntityId, occupant: EntityId },
}

#[derive(Debug)]
pub struct AssignmentRegistry {
    selected: Option<EntityId>,
    events:   EventSender,
}

impl AssignmentRegistry {
    pub fn new(events: EventSender) -> Self {
        Self { selected: None, events }
    }

    /// Select a villager; the next `try_assign_to` moves it.
    pub fn start_assignment(&mut self, villager_id: &str) {
        log::debug!("assignment: selected {villager_id}");
        self.selected = Some(villager_id.to_string());
    }

    pub fn cancel_assignment(&mut self) {
        self.selected = None;
    }

    pub fn selected(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    /// Assign the selected villager to `workplace_id` and start its loop.
    pub fn try_assign_to(
        &mut self,
        workplace_id: &str,
        buildings: &mut BuildingSet,
        villagers: &mut [Villager],
    ) -> Result<(), AssignmentError> {
        let result = self.assign_selected(workplace_id, buildings, villagers);
        if let Err(err) = &result {
            log::debug!("assignment to {workplace_id} rejected: {err}");
            self.events.emit(SimEvent::AssignmentRejected {
                villager_id:  self.selected.clone(),
                workplace_id: workplace_id.to_string(),
                reason:       err.to_string(),
            });
            if matches!(err, AssignmentError::NotBuilt(_) | AssignmentError::Occupied { .. }) {
                self.selected = None;
            }
        }
        result
    }

    fn assign_selected(
        &mut self,
        workplace_id: &str,
        buildings: &mut BuildingSet,
        villagers: &mut [Villager],
    ) -> Result<(), AssignmentError> {
        let villager_id = self.selected.clone().ok_or(AssignmentError::NoSelection)?;

        let target = buildings
            .get(workplace_id)
            .ok_or_else(|| AssignmentError::UnknownBuilding(workplace_id.to_string()))?;
        if !target.is_workplace() {
            return Err(AssignmentError::NotAWorkplace(workplace_id.to_string()));
        }
        if !target.is_built() {
            return Err(AssignmentError::NotBuilt(workplace_id.to_string()));
        }
        if let Some(occupant) = target.occupant().filter(|o| *o != villager_id) {
            return Err(AssignmentError::Occupied {
                workplace: workplace_id.to_string(),
                occupant:  occupant.to_string(),
            });
        }

        let villager = villagers
            .iter_mut()
            .find(|v| v.id() == villager_id)
            .ok_or_else(|| AssignmentError::UnknownVillager(villager_id.clone()))?;

        if let Some(previous) = villager.clear_workplace() {
            vacate(buildings, &previous, &villager_id);
            if previous != workplace_id {
                self.events.emit(SimEvent::VillagerUnassigned {
                    villager_id:  villager_id.clone(),
                    workplace_id: previous,
                });
            }
        }

        if let Some(workplace) = buildings.get_mut(workplace_id) {
            workplace.set_occupant(Some(villager_id.clone()));
        }
        villager.start_work(workplace_id.to_string());
        self.selected = None;

        log::info!("villager {villager_id} assigned to {workplace_id}");
        self.events.emit(SimEvent::VillagerAssigned {
            villager_id,
            workplace_id: workplace_id.to_string(),
        });
        Ok(())
    }

    /// Cancel the villager's loop and vacate its workplace.
    pub fn unassign(
        &mut self,
        villager_id: &str,
        buildings: &mut BuildingSet,
        villagers: &mut [Villager],
    ) -> Result<(), AssignmentError> {
        let villager = villagers
            .iter_mut()
            .find(|v| v.id() == villager_id)
            .ok_or_else(|| AssignmentError::UnknownVillager(villager_id.to_string()))?;

        if let Some(previous) = villager.clear_workplace() {
            vacate(buildings, &previous, villager_id);
            log::info!("villager {villager_id} unassigned from {previous}");
            self.events.emit(SimEvent::VillagerUnassigned {
                villager_id:  villager_id.to_string(),
                workplace_id: previous,
            });
        }
        Ok(())
    }

    /// Restore path: bind without starting a loop, skipping invalid pairs.
    /// Returns true when the binding was made.
    pub fn bind(
        &mut self,
        villager: &mut Villager,
        workplace_id: &str,
        buildings: &mut BuildingSet,
    ) -> bool {
        let Some(workplace) = buildings.get_mut(workplace_id) else {
            return false;
        };
        if !workplace.is_workplace() || workplace.occupant().is_some_and(|o| o != villager.id()) {
            return false;
        }
        workplace.set_occupant(Some(villager.id().to_string()));
        villager.set_workplace(Some(workplace_id.to_string()));
        true
    }
}

/// Clear the occupant of `workplace_id` if it is still `villager_id`.
fn vacate(buildings: &mut BuildingSet, workplace_id: &str, villager_id: &str) {
    if let Some(workplace) = buildings.get_mut(workplace_id) {
        if workplace.occupant() == Some(villager_id) {
            workplace.set_occupant(None);
        }
    }
}
