//! Persistent settlement cache
//!
//! A [`SettlementSlot`] is written exactly once and can be read any number of
//! times afterwards, from any thread.

use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

use crate::error::{Error, Outcome, PromiseError, Rejection};

/// The four states of a settlement channel
#[derive(Clone, Debug)]
pub enum Settlement<T> {
    Pending,
    Resolved(T),
    Rejected(T),
    Failed(Error),
}

impl<T> Settlement<T> {
    pub fn is_pending(&self) -> bool {
        matches!(self, Settlement::Pending)
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, Settlement::Resolved(_))
    }

    /// Typed rejections and opaque failures both count as rejected
    pub fn is_rejected(&self) -> bool {
        matches!(self, Settlement::Rejected(_) | Settlement::Failed(_))
    }
}

impl<T: Clone> Settlement<T> {
    /// Read the settled outcome; a pending settlement is not ready
    pub fn outcome(&self) -> Outcome<T> {
        match self {
            Settlement::Pending => Err(Rejection::Error(PromiseError::NotReady.into())),
            Settlement::Resolved(value) => Ok(value.clone()),
            Settlement::Rejected(value) => Err(Rejection::Value(value.clone())),
            Settlement::Failed(error) => Err(Rejection::Error(error.clone())),
        }
    }
}

impl<T> From<Outcome<T>> for Settlement<T> {
    fn from(outcome: Outcome<T>) -> Self {
        match outcome {
            Ok(value) => Settlement::Resolved(value),
            Err(Rejection::Value(value)) => Settlement::Rejected(value),
            Err(Rejection::Error(error)) => Settlement::Failed(error),
        }
    }
}

/// Write-once, read-many slot
pub struct SettlementSlot<T> {
    settlement: Mutex<Settlement<T>>,
    settled: Condvar,
}

impl<T> SettlementSlot<T> {
    pub fn new() -> Self {
        Self {
            settlement: Mutex::new(Settlement::Pending),
            settled: Condvar::new(),
        }
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, Settlement<T>> {
        self.settlement
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Store the outcome; returns false if the slot was already settled
    pub fn settle(&self, outcome: Outcome<T>) -> bool {
        {
            let mut settlement = self.lock();
            if !settlement.is_pending() {
                return false;
            }
            *settlement = Settlement::from(outcome);
        }
        self.settled.notify_all();
        true
    }

    pub fn is_pending(&self) -> bool {
        self.lock().is_pending()
    }

    pub fn is_resolved(&self) -> bool {
        self.lock().is_resolved()
    }

    pub fn is_rejected(&self) -> bool {
        self.lock().is_rejected()
    }

    /// Block until the slot is settled
    pub(crate) fn wait_settled(&self) -> MutexGuard<'_, Settlement<T>> {
        let mut guard = self.lock();
        while guard.is_pending() {
            guard = self
                .settled
                .wait(guard)
                .unwrap_or_else(PoisonError::into_inner);
        }
        guard
    }
}

impl<T: Clone> SettlementSlot<T> {
    /// Read the cached outcome, failing with `NotReady` while pending
    pub fn get(&self) -> Outcome<T> {
        self.lock().outcome()
    }

    /// Block until settled and read the cached outcome
    pub fn wait(&self) -> Outcome<T> {
        self.wait_settled().outcome()
    }

    pub fn snapshot(&self) -> Settlement<T> {
        self.lock().clone()
    }
}

impl<T> Default for SettlementSlot<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_slot_settles_once() {
        let slot = SettlementSlot::new();
        assert!(slot.is_pending());
        assert!(slot.settle(Ok(1)));
        assert!(!slot.settle(Ok(2)));
        assert!(!slot.settle(Err(Rejection::Value(3))));
        assert_eq!(slot.get().ok(), Some(1));
        assert!(slot.is_resolved());
    }

    #[test]
    fn test_pending_slot_is_not_ready() {
        let slot = SettlementSlot::<i32>::new();
        let error = slot.get().unwrap_err().error().unwrap();
        assert_eq!(error.downcast_ref::<PromiseError>(), Some(&PromiseError::NotReady));
    }

    #[test]
    fn test_failed_counts_as_rejected() {
        let slot = SettlementSlot::<i32>::new();
        slot.settle(Err(Rejection::Error(Error::msg("bad"))));
        assert!(slot.is_rejected());
        assert!(!slot.is_resolved());
        assert!(matches!(slot.snapshot(), Settlement::Failed(_)));
    }

    #[test]
    fn test_wait_blocks_for_writer() {
        let slot = Arc::new(SettlementSlot::new());
        let writer = {
            let slot = slot.clone();
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(10));
                slot.settle(Err(Rejection::Value(666)));
            })
        };

        match slot.wait() {
            Err(Rejection::Value(v)) => assert_eq!(v, 666),
            _ => panic!("expected typed rejection"),
        }
        writer.join().unwrap();
    }
}
