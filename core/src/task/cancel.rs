//! Cooperative cancellation.
//!
//! A `CancelSource` owns the signal; any number of `CancelToken`s observe it.
//! Nothing is interrupted when the signal flips; holders check the token at
//! their next suspension point, and the scheduler checks it once per tick.

use std::cell::Cell;
use std::rc::Rc;

#[derive(Debug, Default)]
pub struct CancelSource {
    flag: Rc<Cell<bool>>,
}

impl CancelSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn token(&self) -> CancelToken {
        CancelToken { flag: Some(Rc::clone(&self.flag)) }
    }

    /// Signal every token handed out by this source. Idempotent.
    pub fn cancel(&self) {
        self.flag.set(true);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.get()
    }
}

#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Option<Rc<Cell<bool>>>,
}

impl CancelToken {
    /// A token that can never be cancelled.
    pub fn none() -> Self {
        Self { flag: None }
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.as_ref().is_some_and(|f| f.get())
    }
}
