//! Tick-driven cooperative tasks: cancellation tokens, promises, deferred
//! operations and the frame scheduler that runs them.

pub mod cancel;
pub mod ops;
pub mod promise;
pub mod scheduler;

pub use cancel::{CancelSource, CancelToken};
pub use ops::{DeferredOp, OpState, Timebase};
pub use promise::{Completion, Promise, TaskStatus};
pub use scheduler::{FrameScheduler, Spawner, TickReport};
