//! Configuration constants for the promise runtime
//!
//! These are the defaults a [`RuntimeBuilder`](crate::RuntimeBuilder) starts
//! from; every one of them can be overridden per runtime.

/// Name prefix for worker threads
///
/// Each dispatched body runs on its own thread named `<prefix>-<job id>`,
/// which makes promise work easy to spot in debuggers and thread dumps.
pub const WORKER_THREAD_PREFIX: &str = "promise-worker";

/// How many insertions into the holding pool trigger a sweep of settled entries
///
/// Sweeps only run on insertion: between insertions, at most this many settled
/// entries accumulate before a sweep.
pub const DEFAULT_SWEEP_INTERVAL: usize = 64;

/// Poll interval used while draining the holding pool (in milliseconds)
pub const DRAIN_POLL_INTERVAL_MS: u64 = 1;
