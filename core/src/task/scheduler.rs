//! The frame scheduler. Runs every outstanding deferred operation once per
//! host frame on a single logical thread.
//!
//! RULES:
//!   - New operations go into a pending buffer and join the live set at the
//!     start of the next tick. The live set is never mutated mid-iteration
//!     except for removal of the entry being visited.
//!   - The live set is walked in reverse so removal never skips an entry.
//!   - A signalled token wins over stepping: the operation is completed as
//!     cancelled and dropped without running its logic again.

use crate::{
    clock::FrameDelta,
    task::{
        cancel::CancelToken,
        ops::{
            DeferredOp, DelayFrames, DelaySeconds, NextFrame, OpState, Timebase, Timeout,
            WaitPredicate, WhenAll, WhenAny, WorkerResult,
        },
        promise::{self, Promise},
    },
    types::{Seconds, Tick},
};
use std::cell::RefCell;
use std::rc::Rc;
use std::sync::mpsc;
use std::thread;

struct Scheduled {
    op:    Box<dyn DeferredOp>,
    token: CancelToken,
}

type PendingBuffer = Rc<RefCell<Vec<Scheduled>>>;

pub struct FrameScheduler {
    live:    Vec<Scheduled>,
    pending: PendingBuffer,
    frame:   Tick,
}

/// Cloneable handle for registering operations, usable from anywhere on the
/// scheduler's thread, including from inside a running tick.
#[derive(Clone)]
pub struct Spawner {
    pending: PendingBuffer,
}

/// What happened during one scheduler tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    pub merged:    usize,
    pub finished:  usize,
    pub cancelled: usize,
}

impl FrameScheduler {
    pub fn new() -> Self {
        Self {
            live:    Vec::with_capacity(256),
            pending: Rc::new(RefCell::new(Vec::with_capacity(64))),
            frame:   0,
        }
    }

    pub fn spawner(&self) -> Spawner {
        Spawner { pending: Rc::clone(&self.pending) }
    }

    /// Run one pass over every live operation.
    pub fn tick(&mut self, delta: FrameDelta) -> TickReport {
        self.frame += 1;
        let mut report = TickReport::default();

        {
            let mut pending = self.pending.borrow_mut();
            report.merged = pending.len();
            self.live.append(&mut pending);
        }

        for i in (0..self.live.len()).rev() {
            let entry = &mut self.live[i];
            if entry.token.is_cancelled() {
                log::debug!("frame={} cancelled {}", self.frame, entry.op.kind());
                entry.op.cancel();
                self.live.swap_remove(i);
                report.cancelled += 1;
                continue;
            }
            if entry.op.step(delta) == OpState::Finished {
                self.live.swap_remove(i);
                report.finished += 1;
            }
        }

        report
    }

    pub fn frame(&self) -> Tick {
        self.frame
    }

    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.borrow().len()
    }

    /// Cancel everything, live and pending. Used on engine teardown.
    pub fn cancel_all(&mut self) {
        let mut pending = self.pending.borrow_mut();
        self.live.append(&mut pending);
        for entry in &mut self.live {
            entry.op.cancel();
        }
        self.live.clear();
    }
}

impl Default for FrameScheduler {
    fn default() -> Self { Self::new() }
}

impl Spawner {
    pub fn schedule(&self, op: Box<dyn DeferredOp>, token: &CancelToken) {
        self.pending.borrow_mut().push(Scheduled { op, token: token.clone() });
    }

    /// Completes on the first tick after scheduling.
    pub fn next_frame(&self, token: &CancelToken) -> Promise<()> {
        let (completer, promise) = promise::pair();
        self.schedule(Box::new(NextFrame::new(completer)), token);
        promise
    }

    /// Completes once `seconds` of the chosen clock have elapsed.
    /// Non-positive durations complete immediately without scheduling.
    pub fn delay(&self, seconds: Seconds, timebase: Timebase, token: &CancelToken) -> Promise<()> {
        if seconds <= 0.0 {
            return Promise::resolved(());
        }
        let (completer, promise) = promise::pair();
        self.schedule(Box::new(DelaySeconds::new(completer, seconds, timebase)), token);
        promise
    }

    pub fn delay_frames(&self, frames: u32, token: &CancelToken) -> Promise<()> {
        let (completer, promise) = promise::pair();
        self.schedule(Box::new(DelayFrames::new(completer, frames)), token);
        promise
    }

    pub fn wait_until(
        &self,
        mut predicate: impl FnMut() -> bool + 'static,
        token: &CancelToken,
    ) -> Promise<()> {
        self.try_wait(Box::new(move || Ok(predicate())), false, token)
    }

    pub fn wait_while(
        &self,
        mut predicate: impl FnMut() -> bool + 'static,
        token: &CancelToken,
    ) -> Promise<()> {
        self.try_wait(Box::new(move || Ok(predicate())), true, token)
    }

    /// Like `wait_until`, but an `Err` from the predicate fails the promise.
    pub fn try_wait_until(
        &self,
        predicate: impl FnMut() -> Result<bool, String> + 'static,
        token: &CancelToken,
    ) -> Promise<()> {
        self.try_wait(Box::new(predicate), false, token)
    }

    fn try_wait(
        &self,
        predicate: Box<dyn FnMut() -> Result<bool, String>>,
        negate: bool,
        token: &CancelToken,
    ) -> Promise<()> {
        let (completer, promise) = promise::pair();
        self.schedule(Box::new(WaitPredicate::new(completer, predicate, negate)), token);
        promise
    }

    /// Run CPU-bound work on a background thread. The result is handed back
    /// on a later tick of this scheduler, never on the worker thread.
    pub fn run_on_worker<T, F>(&self, work: F) -> Promise<T>
    where
        T: Send + 'static,
        F: FnOnce() -> T + Send + 'static,
    {
        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            // The receiver may be gone if the operation was cancelled.
            let _ = tx.send(work());
        });
        let (completer, promise) = promise::pair();
        self.schedule(Box::new(WorkerResult::new(completer, rx)), &CancelToken::none());
        promise
    }

    /// Resolves with every value once all inputs resolve. The first failure
    /// or cancellation among the inputs is propagated instead.
    pub fn when_all<T: 'static>(&self, promises: Vec<Promise<T>>) -> Promise<Vec<T>> {
        if promises.is_empty() {
            return Promise::resolved(Vec::new());
        }
        let (completer, promise) = promise::pair();
        self.schedule(Box::new(WhenAll::new(completer, promises)), &CancelToken::none());
        promise
    }

    /// Resolves with the index of the first input to finish, in any state.
    pub fn when_any<T: 'static>(&self, promises: &[Promise<T>]) -> Promise<usize> {
        let (completer, promise) = promise::pair();
        self.schedule(Box::new(WhenAny::new(completer, promises.to_vec())), &CancelToken::none());
        promise
    }

    /// Fails with `TaskError::Timeout` if `inner` is still pending after
    /// `seconds` of game time.
    pub fn with_timeout<T: 'static>(&self, inner: Promise<T>, seconds: Seconds) -> Promise<T> {
        if seconds <= 0.0 {
            return inner;
        }
        if let Some(done) = inner.try_take() {
            return Promise::from_completion(done);
        }
        let (completer, promise) = promise::pair();
        self.schedule(Box::new(Timeout::new(completer, inner, seconds)), &CancelToken::none());
        promise
    }
}
