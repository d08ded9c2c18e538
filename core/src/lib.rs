//! harbor-core: the simulation core of a small harbor tycoon game.
//!
//! Host-agnostic: the host drives `SimEngine::tick` once per frame, supplies
//! a `Navigator` for movement and listens on the `EventBus`.

pub mod assignment;
pub mod building;
pub mod bus;
pub mod clock;
pub mod command;
pub mod config;
pub mod engine;
pub mod error;
pub mod event;
pub mod format;
pub mod ledger;
pub mod nav;
pub mod offline;
pub mod snapshot;
pub mod store;
pub mod task;
pub mod types;
pub mod villager;
