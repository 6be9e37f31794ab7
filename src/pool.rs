//! Best-effort holding pool for detached computations
//!
//! Detaching a promise moves its in-flight handle here so the promise itself
//! can be dropped or re-settled without waiting. The pool only keeps handles
//! alive until their computation finishes; results are discarded.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crossbeam_queue::SegQueue;

use crate::config::{DEFAULT_SWEEP_INTERVAL, DRAIN_POLL_INTERVAL_MS};
use crate::handle::AsyncHandle;

/// Anything the pool can keep alive
pub(crate) trait Detached: Send {
    fn is_settled(&self) -> bool;
}

impl<T: Send> Detached for AsyncHandle<T> {
    fn is_settled(&self) -> bool {
        AsyncHandle::is_settled(self)
    }
}

/// Concurrent, append-only store of detached handles
pub struct HoldingPool {
    held: SegQueue<Box<dyn Detached>>,
    inserts: AtomicUsize,
    sweep_interval: usize,
}

impl HoldingPool {
    pub fn new() -> Self {
        Self::with_sweep_interval(DEFAULT_SWEEP_INTERVAL)
    }

    /// Create a pool that sweeps settled entries every `interval` insertions
    pub fn with_sweep_interval(interval: usize) -> Self {
        Self {
            held: SegQueue::new(),
            inserts: AtomicUsize::new(0),
            sweep_interval: interval.max(1),
        }
    }

    /// Keep `handle` alive until its computation settles
    pub fn hold<T: Send + 'static>(&self, handle: AsyncHandle<T>) {
        if !handle.valid() || handle.is_settled() {
            return;
        }

        self.held.push(Box::new(handle));
        tracing::debug!("detached computation into holding pool");

        let inserts = self.inserts.fetch_add(1, Ordering::Relaxed) + 1;
        if inserts % self.sweep_interval == 0 {
            self.sweep();
        }
    }

    /// Drop every held entry that has settled; returns how many remain
    pub fn sweep(&self) -> usize {
        let mut released = 0usize;
        for _ in 0..self.held.len() {
            match self.held.pop() {
                Some(item) if item.is_settled() => released += 1,
                Some(item) => self.held.push(item),
                None => break,
            }
        }
        let remaining = self.held.len();
        if released > 0 {
            tracing::debug!(
                "holding pool released {} settled entries, {} still in flight",
                released,
                remaining
            );
        }
        remaining
    }

    /// Block until every held computation has settled
    pub fn drain(&self) {
        while self.sweep() > 0 {
            std::thread::sleep(Duration::from_millis(DRAIN_POLL_INTERVAL_MS));
        }
    }

    /// Number of entries currently held, settled or not
    pub fn len(&self) -> usize {
        self.held.len()
    }

    pub fn is_empty(&self) -> bool {
        self.held.is_empty()
    }
}

impl Default for HoldingPool {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::future::channel;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_settled_handles_are_not_held() {
        let pool = HoldingPool::new();
        pool.hold(AsyncHandle::resolved(1));
        pool.hold(AsyncHandle::<i32>::invalid());
        assert!(pool.is_empty());
    }

    #[test]
    fn test_sweep_releases_settled_entries() {
        let pool = HoldingPool::with_sweep_interval(1000);
        let (completion, completer) = channel::<i32>();
        let (pending, _keep) = channel::<i32>();

        pool.hold(AsyncHandle::new(completion));
        pool.hold(AsyncHandle::new(pending));
        assert_eq!(pool.len(), 2);

        completer.complete(Ok(7));
        assert_eq!(pool.sweep(), 1);
    }

    #[test]
    fn test_pool_does_not_grow_under_steady_load() {
        let pool = HoldingPool::with_sweep_interval(8);
        for _ in 0..256 {
            let (completion, completer) = channel::<u64>();
            pool.hold(AsyncHandle::new(completion));
            completer.complete(Ok(1));
        }
        assert!(pool.len() < 8);
    }

    #[test]
    fn test_concurrent_hold_and_drain() {
        let pool = Arc::new(HoldingPool::with_sweep_interval(4));
        let workers: Vec<_> = (0..4)
            .map(|_| {
                let pool = pool.clone();
                thread::spawn(move || {
                    for _ in 0..50 {
                        let (completion, completer) = channel::<usize>();
                        pool.hold(AsyncHandle::new(completion));
                        thread::spawn(move || completer.complete(Ok(0)));
                    }
                })
            })
            .collect();

        for worker in workers {
            worker.join().unwrap();
        }
        pool.drain();
        assert!(pool.is_empty());
    }
}
