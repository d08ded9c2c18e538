//! Villagers and their produce-and-sell loop.
//!
//! A work loop is an explicit state machine. Each engine tick `step` looks at
//! the promise the current phase is suspended on; when it has completed the
//! loop moves on and usually suspends on a fresh promise. Loops never block
//! and never outlive their cancel source: `stop_work` signals it and drops
//! the loop in one go.
//!
//!   Begin ──move──▶ ToWorkplace ──cycle──▶ Producing ──(not full)──▶ Begin
//!                                              │ (full)
//!                                              ▼
//!   Begin ◀──sell── Selling ◀──move── ToSellPoint ◀── ResolveSellPoint ⟲ next frame

use crate::{
    building::BuildingSet,
    config::VillagerStats,
    event::{EventSender, SimEvent},
    ledger::Ledger,
    nav::Navigator,
    task::{CancelSource, CancelToken, Completion, Promise, Spawner},
    types::{Amount, EntityId, Point},
};
use serde::{Deserialize, Serialize};
use std::rc::Rc;

/// Upper bound on phase transitions in a single tick. Only already-resolved
/// promises chain within a tick, so this is never reached in practice.
const MAX_TRANSITIONS_PER_STEP: usize = 16;

/// Coarse view of what a villager is doing, for presentation and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Activity {
    Idle,
    WalkingToWork,
    Producing,
    WaitingForSellPoint,
    WalkingToSell,
    Selling,
}

enum Phase {
    Begin,
    ToWorkplace { arrival: Promise<()> },
    Producing { cycle: Promise<()> },
    ResolveSellPoint,
    AwaitSellPoint { retry: Promise<()> },
    ToSellPoint { sell_point: EntityId, arrival: Promise<()> },
    Selling { sell_point: EntityId, sale: Promise<()> },
}

struct WorkLoop {
    cancel: CancelSource,
    phase:  Phase,
}

/// What a loop needs from the rest of the world for one step.
pub struct LoopContext<'a> {
    pub buildings: &'a BuildingSet,
    pub ledger:    &'a mut Ledger,
    pub spawner:   &'a Spawner,
    pub nav:       &'a Rc<dyn Navigator>,
}

enum Outcome {
    Next(Phase),
    Suspended(Phase),
    Finished,
}

enum Poll {
    Pending,
    Ready,
    Stop,
}

/// Return from the current arm unless `$promise` has resolved.
macro_rules! suspend_unless_ready {
    ($self:ident, $promise:ident, $waiting:expr) => {
        match $self.poll(&$promise) {
            Poll::Pending => return Outcome::Suspended($waiting),
            Poll::Stop => return Outcome::Finished,
            Poll::Ready => {}
        }
    };
}

pub struct Villager {
    id:             EntityId,
    house_id:       EntityId,
    workplace:      Option<EntityId>,
    move_speed:     f64,
    carry_capacity: Amount,
    carried:        Amount,
    work_loop:      Option<WorkLoop>,
    events:         EventSender,
}

impl Villager {
    pub fn new(id: EntityId, house_id: EntityId, stats: VillagerStats, events: EventSender) -> Self {
        let mut villager = Self {
            id,
            house_id,
            workplace: None,
            move_speed: 0.0,
            carry_capacity: 1,
            carried: 0,
            work_loop: None,
            events,
        };
        villager.apply_stats(stats);
        villager
    }

    pub fn id(&self) -> &str { &self.id }
    pub fn house_id(&self) -> &str { &self.house_id }
    pub fn workplace(&self) -> Option<&str> { self.workplace.as_deref() }
    pub fn move_speed(&self) -> f64 { self.move_speed }
    pub fn carry_capacity(&self) -> Amount { self.carry_capacity }
    pub fn carried(&self) -> Amount { self.carried }
    pub fn is_working(&self) -> bool { self.work_loop.is_some() }

    pub fn apply_stats(&mut self, stats: VillagerStats) {
        self.move_speed = stats.move_speed;
        self.carry_capacity = stats.carry_capacity.max(1);
        self.carried = self.carried.min(self.carry_capacity);
    }

    pub fn activity(&self) -> Activity {
        match self.work_loop.as_ref().map(|l| &l.phase) {
            None => Activity::Idle,
            Some(Phase::Begin | Phase::ToWorkplace { .. })              => Activity::WalkingToWork,
            Some(Phase::Producing { .. })                               => Activity::Producing,
            Some(Phase::ResolveSellPoint | Phase::AwaitSellPoint { .. }) => Activity::WaitingForSellPoint,
            Some(Phase::ToSellPoint { .. })                             => Activity::WalkingToSell,
            Some(Phase::Selling { .. })                                 => Activity::Selling,
        }
    }

    /// Bind to `workplace` and start a fresh loop, cancelling any old one.
    /// The building side of the binding is the registry's job.
    pub(crate) fn start_work(&mut self, workplace: EntityId) {
        self.stop_work();
        log::debug!("villager {} starts working at {workplace}", self.id);
        self.workplace = Some(workplace);
        self.work_loop = Some(WorkLoop { cancel: CancelSource::new(), phase: Phase::Begin });
    }

    /// Cancel the loop, keeping whatever is carried.
    pub(crate) fn stop_work(&mut self) {
        if let Some(work_loop) = self.work_loop.take() {
            work_loop.cancel.cancel();
        }
    }

    /// Cancel the loop and forget the workplace.
    pub(crate) fn clear_workplace(&mut self) -> Option<EntityId> {
        self.stop_work();
        self.workplace.take()
    }

    /// Restore path: remember the workplace without starting the loop.
    pub(crate) fn set_workplace(&mut self, workplace: Option<EntityId>) {
        self.workplace = workplace;
    }

    /// Advance the loop as far as it can go this tick.
    pub fn step(&mut self, ctx: &mut LoopContext<'_>) {
        let Some(mut work_loop) = self.work_loop.take() else {
            return;
        };
        let token = work_loop.cancel.token();
        let mut phase = work_loop.phase;

        for _ in 0..MAX_TRANSITIONS_PER_STEP {
            match self.advance(phase, &token, ctx) {
                Outcome::Next(next) => phase = next,
                Outcome::Suspended(waiting) => {
                    work_loop.phase = waiting;
                    self.work_loop = Some(work_loop);
                    return;
                }
                Outcome::Finished => return,
            }
        }
        work_loop.phase = phase;
        self.work_loop = Some(work_loop);
    }

    fn advance(&mut self, phase: Phase, token: &CancelToken, ctx: &mut LoopContext<'_>) -> Outcome {
        if token.is_cancelled() {
            return Outcome::Finished;
        }
        match phase {
            Phase::Begin => {
                let Some(workplace) = self.workplace.as_deref().and_then(|id| ctx.buildings.get(id)) else {
                    log::warn!("villager {}: workplace vanished, stopping", self.id);
                    return Outcome::Finished;
                };
                if self.carried >= self.carry_capacity {
                    return Outcome::Next(Phase::ResolveSellPoint);
                }
                let arrival = self.walk_to(workplace.work_point(), token, ctx);
                Outcome::Next(Phase::ToWorkplace { arrival })
            }

            Phase::ToWorkplace { arrival } => {
                suspend_unless_ready!(self, arrival, Phase::ToWorkplace { arrival });
                let cycle = self
                    .workplace
                    .as_deref()
                    .and_then(|id| ctx.buildings.get(id))
                    .and_then(|w| w.begin_villager_cycle(ctx.spawner, token));
                match cycle {
                    Some(cycle) => Outcome::Next(Phase::Producing { cycle }),
                    None => {
                        log::warn!("villager {}: workplace cannot produce, stopping", self.id);
                        Outcome::Finished
                    }
                }
            }

            Phase::Producing { cycle } => {
                suspend_unless_ready!(self, cycle, Phase::Producing { cycle });
                let Some(workplace) = self.workplace.as_deref().and_then(|id| ctx.buildings.get(id)) else {
                    return Outcome::Finished;
                };
                let produced = workplace.finish_villager_cycle();
                let collected = produced.clamp(0, self.carry_capacity - self.carried);
                self.carried += collected;
                self.events.emit(SimEvent::FishCollected {
                    villager_id:  self.id.clone(),
                    workplace_id: workplace.id().to_string(),
                    amount:       collected,
                    carried:      self.carried,
                });
                Outcome::Next(Phase::Begin)
            }

            Phase::ResolveSellPoint => match ctx.buildings.sell_point() {
                Some(sell_point) => {
                    let arrival = self.walk_to(sell_point.work_point(), token, ctx);
                    Outcome::Next(Phase::ToSellPoint { sell_point: sell_point.id().to_string(), arrival })
                }
                None => Outcome::Suspended(Phase::AwaitSellPoint { retry: ctx.spawner.next_frame(token) }),
            },

            Phase::AwaitSellPoint { retry } => {
                suspend_unless_ready!(self, retry, Phase::AwaitSellPoint { retry });
                Outcome::Next(Phase::ResolveSellPoint)
            }

            Phase::ToSellPoint { sell_point, arrival } => {
                suspend_unless_ready!(self, arrival, Phase::ToSellPoint { sell_point, arrival });
                let sale = ctx
                    .buildings
                    .get(&sell_point)
                    .and_then(|b| b.begin_villager_sale(ctx.spawner, token));
                match sale {
                    Some(sale) => Outcome::Next(Phase::Selling { sell_point, sale }),
                    None => Outcome::Next(Phase::ResolveSellPoint),
                }
            }

            Phase::Selling { sell_point, sale } => {
                suspend_unless_ready!(self, sale, Phase::Selling { sell_point, sale });
                let Some(lighthouse) = ctx.buildings.get(&sell_point).filter(|b| b.is_built()) else {
                    return Outcome::Next(Phase::ResolveSellPoint);
                };
                let amount = self.carried;
                let gold = lighthouse.finish_villager_sale(amount, ctx.ledger);
                self.carried = 0;
                log::debug!("villager {} sold {amount} fish for {gold} gold", self.id);
                self.events.emit(SimEvent::FishSold { villager_id: self.id.clone(), amount, gold });
                Outcome::Next(Phase::Begin)
            }
        }
    }

    fn poll(&self, promise: &Promise<()>) -> Poll {
        match promise.try_take() {
            None => Poll::Pending,
            Some(Completion::Resolved(())) => Poll::Ready,
            Some(Completion::Cancelled) => Poll::Stop,
            Some(Completion::Failed(err)) => {
                log::warn!("villager {}: work loop stopped: {err}", self.id);
                Poll::Stop
            }
        }
    }

    /// Request a move and suspend until the navigator reports arrival.
    fn walk_to(&self, target: Point, token: &CancelToken, ctx: &LoopContext<'_>) -> Promise<()> {
        if !ctx.nav.move_to(&self.id, target, self.move_speed) {
            return Promise::resolved(());
        }
        let nav = Rc::clone(ctx.nav);
        let agent = self.id.clone();
        ctx.spawner.try_wait_until(move || Ok(nav.has_arrived(&agent)), token)
    }
}
