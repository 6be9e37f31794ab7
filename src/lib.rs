//! rust-pro: chainable promises over thread-dispatched computations
//!
//! This crate provides JavaScript-style promises for blocking Rust code:
//! - Every promise body runs on its own worker, so the caller never blocks
//! - Continuations with separate paths for values, typed rejections and errors
//! - Pollable promises that cache their outcome and broadcast it to subscribers
//! - `all`, `race` and `any` aggregates
//!
//! ## Outcomes
//!
//! Bodies and callbacks return an [`Outcome`]: `Ok(value)` resolves, an
//! `Err(Rejection::Value(v))` is a typed rejection of the promise's own value
//! type, and `Err(Rejection::Error(e))` is an opaque [`Error`]. Any standard
//! error converts into the opaque channel through `?`, and a panicking body is
//! captured as an opaque error as well.
//!
//! ## Examples
//!
//! ```rust,no_run
//! use rust_pro::{reject, Rejection, Runtime};
//!
//! let runtime = Runtime::new();
//!
//! let mut parsed = runtime.spawn(|| Ok("42".parse::<i32>()?));
//! let mut doubled = parsed.then(|n| if n < 0 { reject(n) } else { Ok(n * 2) });
//! let recovered = doubled.fail(|negative| Ok(-negative), |_error| Ok(0));
//!
//! match recovered.get() {
//!     Ok(value) => println!("value: {}", value),
//!     Err(Rejection::Value(value)) => println!("rejected with {}", value),
//!     Err(Rejection::Error(error)) => println!("failed: {}", error),
//! }
//! ```
//!
//! # Detached Work
//!
//! Dropping a promise that is still running does not wait for it. The running
//! computation is moved into the runtime's [`HoldingPool`], which keeps it
//! alive until it finishes. Call [`Runtime::drain`] before exiting when that
//! work has to complete.

pub mod combinators;
pub mod config;
pub mod error;
pub mod executor;
pub mod future;
pub mod handle;
pub mod pool;
pub mod promise;
pub mod ready;
pub mod state;

// Re-export core types
pub use combinators::{all, all_of, any, race, PromiseTuple};
pub use error::{fail, reject, AggregateError, Error, Outcome, PromiseError, Rejection};
pub use executor::{
    make_failed_promise, make_promise, make_rejected_promise, Execute, Job, JobId, Runtime,
    RuntimeBuilder, ThreadExecutor,
};
pub use handle::{AsyncHandle, SharedHandle};
pub use pool::HoldingPool;
pub use promise::{Continuation, Promise};
pub use ready::ReadyPromise;
pub use state::{Settlement, SettlementSlot};
