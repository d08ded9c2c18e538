//! Deferred operation variants.
//!
//! Every variant is stepped once per scheduler tick and reports whether it
//! has finished. Completion always goes through the operation's `Completer`,
//! so the waiting side observes exactly one outcome.

use crate::{
    clock::FrameDelta,
    error::TaskError,
    task::promise::{Completer, Completion, Promise, TaskStatus},
    types::Seconds,
};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{Receiver, TryRecvError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpState {
    Pending,
    Finished,
}

/// Which clock a timed operation consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Timebase {
    /// Game time, affected by speed and pause.
    Scaled,
    /// Wall-clock time.
    Unscaled,
}

/// The contract every schedulable operation fulfils.
pub trait DeferredOp {
    /// Stable name for logging.
    fn kind(&self) -> &'static str;

    /// Advance one tick. Return `Finished` once the completer has been used.
    fn step(&mut self, delta: FrameDelta) -> OpState;

    /// Complete as cancelled. Called by the scheduler instead of `step`
    /// once the operation's token is signalled.
    fn cancel(&mut self);
}

// ── Delay by time ─────────────────────────────────────────────

pub(crate) struct DelaySeconds {
    completer: Completer<()>,
    remaining: Seconds,
    timebase:  Timebase,
}

impl DelaySeconds {
    pub(crate) fn new(completer: Completer<()>, seconds: Seconds, timebase: Timebase) -> Self {
        Self { completer, remaining: seconds.max(0.0), timebase }
    }
}

impl DeferredOp for DelaySeconds {
    fn kind(&self) -> &'static str { "delay_seconds" }

    fn step(&mut self, delta: FrameDelta) -> OpState {
        self.remaining -= match self.timebase {
            Timebase::Scaled   => delta.scaled,
            Timebase::Unscaled => delta.unscaled,
        };
        if self.remaining <= 0.0 {
            self.completer.resolve(());
            return OpState::Finished;
        }
        OpState::Pending
    }

    fn cancel(&mut self) { self.completer.cancel(); }
}

// ── Delay by frames ───────────────────────────────────────────

pub(crate) struct DelayFrames {
    completer: Completer<()>,
    frames:    u32,
}

impl DelayFrames {
    pub(crate) fn new(completer: Completer<()>, frames: u32) -> Self {
        Self { completer, frames: frames.max(1) }
    }
}

impl DeferredOp for DelayFrames {
    fn kind(&self) -> &'static str { "delay_frames" }

    fn step(&mut self, _delta: FrameDelta) -> OpState {
        self.frames -= 1;
        if self.frames == 0 {
            self.completer.resolve(());
            return OpState::Finished;
        }
        OpState::Pending
    }

    fn cancel(&mut self) { self.completer.cancel(); }
}

// ── Wait for predicate ────────────────────────────────────────

pub(crate) type Predicate = Box<dyn FnMut() -> Result<bool, String>>;

pub(crate) struct WaitPredicate {
    completer: Completer<()>,
    predicate: Predicate,
    negate:    bool,
}

impl WaitPredicate {
    pub(crate) fn new(completer: Completer<()>, predicate: Predicate, negate: bool) -> Self {
        Self { completer, predicate, negate }
    }
}

impl DeferredOp for WaitPredicate {
    fn kind(&self) -> &'static str { "wait_predicate" }

    fn step(&mut self, _delta: FrameDelta) -> OpState {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| (self.predicate)()));
        let ok = match outcome {
            Ok(Ok(value)) => value != self.negate,
            Ok(Err(reason)) => {
                self.completer.fail(TaskError::PredicateFailed(reason));
                return OpState::Finished;
            }
            Err(payload) => {
                self.completer.fail(TaskError::PredicatePanicked(panic_message(payload.as_ref())));
                return OpState::Finished;
            }
        };
        if ok {
            self.completer.resolve(());
            return OpState::Finished;
        }
        OpState::Pending
    }

    fn cancel(&mut self) { self.completer.cancel(); }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

// ── Next frame ────────────────────────────────────────────────

pub(crate) struct NextFrame {
    completer: Completer<()>,
}

impl NextFrame {
    pub(crate) fn new(completer: Completer<()>) -> Self {
        Self { completer }
    }
}

impl DeferredOp for NextFrame {
    fn kind(&self) -> &'static str { "next_frame" }

    fn step(&mut self, _delta: FrameDelta) -> OpState {
        self.completer.resolve(());
        OpState::Finished
    }

    fn cancel(&mut self) { self.completer.cancel(); }
}

// ── Worker result ─────────────────────────────────────────────

/// Polls a background thread's result channel so the value is delivered on
/// the scheduler's thread.
pub(crate) struct WorkerResult<T> {
    completer: Completer<T>,
    rx:        Receiver<T>,
}

impl<T> WorkerResult<T> {
    pub(crate) fn new(completer: Completer<T>, rx: Receiver<T>) -> Self {
        Self { completer, rx }
    }
}

impl<T> DeferredOp for WorkerResult<T> {
    fn kind(&self) -> &'static str { "worker_result" }

    fn step(&mut self, _delta: FrameDelta) -> OpState {
        match self.rx.try_recv() {
            Ok(value) => {
                self.completer.resolve(value);
                OpState::Finished
            }
            Err(TryRecvError::Empty) => OpState::Pending,
            // The sender is dropped without sending only when the worker panicked.
            Err(TryRecvError::Disconnected) => {
                self.completer.fail(TaskError::WorkerPanicked);
                OpState::Finished
            }
        }
    }

    fn cancel(&mut self) { self.completer.cancel(); }
}

// ── Combinators ───────────────────────────────────────────────

pub(crate) struct WhenAll<T> {
    completer: Completer<Vec<T>>,
    promises:  Vec<Promise<T>>,
}

impl<T> WhenAll<T> {
    pub(crate) fn new(completer: Completer<Vec<T>>, promises: Vec<Promise<T>>) -> Self {
        Self { completer, promises }
    }
}

impl<T> DeferredOp for WhenAll<T> {
    fn kind(&self) -> &'static str { "when_all" }

    fn step(&mut self, _delta: FrameDelta) -> OpState {
        if let Some(failed) = self.promises.iter().find(|p| p.status() == TaskStatus::Failed) {
            let error = match failed.try_take() {
                Some(Completion::Failed(e)) => e,
                _ => TaskError::Cancelled,
            };
            self.completer.fail(error);
            return OpState::Finished;
        }
        if self.promises.iter().any(|p| p.status() == TaskStatus::Cancelled) {
            self.completer.cancel();
            return OpState::Finished;
        }
        if self.promises.iter().any(Promise::is_pending) {
            return OpState::Pending;
        }
        let mut values = Vec::with_capacity(self.promises.len());
        for promise in &self.promises {
            match promise.try_take() {
                Some(Completion::Resolved(v)) => values.push(v),
                // Someone else consumed the value first.
                _ => {
                    self.completer.fail(TaskError::Cancelled);
                    return OpState::Finished;
                }
            }
        }
        self.completer.resolve(values);
        OpState::Finished
    }

    fn cancel(&mut self) { self.completer.cancel(); }
}

pub(crate) struct WhenAny<T> {
    completer: Completer<usize>,
    promises:  Vec<Promise<T>>,
}

impl<T> WhenAny<T> {
    pub(crate) fn new(completer: Completer<usize>, promises: Vec<Promise<T>>) -> Self {
        Self { completer, promises }
    }
}

impl<T> DeferredOp for WhenAny<T> {
    fn kind(&self) -> &'static str { "when_any" }

    fn step(&mut self, _delta: FrameDelta) -> OpState {
        match self.promises.iter().position(Promise::is_finished) {
            Some(index) => {
                self.completer.resolve(index);
                OpState::Finished
            }
            None => OpState::Pending,
        }
    }

    fn cancel(&mut self) { self.completer.cancel(); }
}

/// Races `inner` against a scaled-time delay.
pub(crate) struct Timeout<T> {
    completer: Completer<T>,
    inner:     Promise<T>,
    seconds:   Seconds,
    remaining: Seconds,
}

impl<T> Timeout<T> {
    pub(crate) fn new(completer: Completer<T>, inner: Promise<T>, seconds: Seconds) -> Self {
        Self { completer, inner, seconds, remaining: seconds }
    }
}

impl<T> DeferredOp for Timeout<T> {
    fn kind(&self) -> &'static str { "timeout" }

    fn step(&mut self, delta: FrameDelta) -> OpState {
        if let Some(completion) = self.inner.try_take() {
            self.completer.complete(completion);
            return OpState::Finished;
        }
        self.remaining -= delta.scaled;
        if self.remaining <= 0.0 {
            self.completer.fail(TaskError::Timeout { seconds: self.seconds });
            return OpState::Finished;
        }
        OpState::Pending
    }

    fn cancel(&mut self) { self.completer.cancel(); }
}
