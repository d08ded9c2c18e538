//! Single-assignment completion slots shared between a deferred operation
//! (the `Completer`) and whoever is waiting on it (the `Promise`).

use crate::error::TaskError;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// Terminal outcome of a deferred operation.
#[derive(Debug, Clone, PartialEq)]
pub enum Completion<T> {
    Resolved(T),
    Cancelled,
    Failed(TaskError),
}

impl<T> Completion<T> {
    pub fn is_resolved(&self) -> bool {
        matches!(self, Self::Resolved(_))
    }

    pub fn into_result(self) -> Result<T, TaskError> {
        match self {
            Self::Resolved(v) => Ok(v),
            Self::Cancelled   => Err(TaskError::Cancelled),
            Self::Failed(e)   => Err(e),
        }
    }

    fn status(&self) -> TaskStatus {
        match self {
            Self::Resolved(_) => TaskStatus::Resolved,
            Self::Cancelled   => TaskStatus::Cancelled,
            Self::Failed(_)   => TaskStatus::Failed,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    Pending,
    Resolved,
    Cancelled,
    Failed,
}

enum Slot<T> {
    Pending,
    Done(Completion<T>),
    /// The completion was consumed; only its status survives.
    Taken(TaskStatus),
}

pub struct Promise<T> {
    slot: Rc<RefCell<Slot<T>>>,
}

pub(crate) struct Completer<T> {
    slot: Rc<RefCell<Slot<T>>>,
}

pub(crate) fn pair<T>() -> (Completer<T>, Promise<T>) {
    let slot = Rc::new(RefCell::new(Slot::Pending));
    (Completer { slot: Rc::clone(&slot) }, Promise { slot })
}

impl<T> Promise<T> {
    /// A promise that is already resolved; nothing gets scheduled.
    pub fn resolved(value: T) -> Self {
        Self { slot: Rc::new(RefCell::new(Slot::Done(Completion::Resolved(value)))) }
    }

    pub(crate) fn from_completion(completion: Completion<T>) -> Self {
        Self { slot: Rc::new(RefCell::new(Slot::Done(completion))) }
    }

    pub fn status(&self) -> TaskStatus {
        match &*self.slot.borrow() {
            Slot::Pending      => TaskStatus::Pending,
            Slot::Done(c)      => c.status(),
            Slot::Taken(s)     => *s,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status() == TaskStatus::Pending
    }

    pub fn is_finished(&self) -> bool {
        !self.is_pending()
    }

    /// Consume the completion. Returns `None` while pending and after the
    /// completion has already been taken by another handle.
    pub fn try_take(&self) -> Option<Completion<T>> {
        let mut slot = self.slot.borrow_mut();
        let status = match &*slot {
            Slot::Done(c) => c.status(),
            _ => return None,
        };
        match std::mem::replace(&mut *slot, Slot::Taken(status)) {
            Slot::Done(c) => Some(c),
            _ => None,
        }
    }
}

impl<T> Clone for Promise<T> {
    fn clone(&self) -> Self {
        Self { slot: Rc::clone(&self.slot) }
    }
}

impl<T> fmt::Debug for Promise<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Promise").field("status", &self.status()).finish()
    }
}

impl<T> Completer<T> {
    /// Store the outcome. Only the first call has any effect.
    pub fn complete(&self, completion: Completion<T>) -> bool {
        let mut slot = self.slot.borrow_mut();
        if !matches!(*slot, Slot::Pending) {
            return false;
        }
        *slot = Slot::Done(completion);
        true
    }

    pub fn resolve(&self, value: T) -> bool {
        self.complete(Completion::Resolved(value))
    }

    pub fn cancel(&self) -> bool {
        self.complete(Completion::Cancelled)
    }

    pub fn fail(&self, error: TaskError) -> bool {
        self.complete(Completion::Failed(error))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn completes_at_most_once() {
        let (completer, promise) = pair::<u32>();
        assert!(promise.is_pending());
        assert!(completer.resolve(7));
        assert!(!completer.cancel());
        assert!(!completer.resolve(8));
        assert_eq!(promise.try_take(), Some(Completion::Resolved(7)));
    }

    #[test]
    fn take_is_consumed_but_status_remains() {
        let (completer, promise) = pair::<()>();
        let other = promise.clone();
        completer.cancel();
        assert_eq!(other.try_take(), Some(Completion::Cancelled));
        assert_eq!(promise.try_take(), None);
        assert_eq!(promise.status(), TaskStatus::Cancelled);
    }
}
