//! Aggregate combinators over groups of promises
//!
//! Every combinator attaches a full three-way continuation to each input and
//! reports into a shared collector. The collector owns the completer of the
//! aggregate promise and settles it exactly once; reports that arrive after
//! that are ignored, while the inputs keep running in the background.
//!
//! When several inputs settle at almost the same time, whichever report takes
//! the collector lock first wins.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::error::{Error, Outcome, PromiseError};
use crate::executor::Runtime;
use crate::future::{channel, Completer};
use crate::handle::AsyncHandle;
use crate::promise::Promise;

pub mod all;
pub mod any;
pub mod race;
pub mod tuple;

pub use all::all;
pub use any::any;
pub use race::race;
pub use tuple::{all_of, PromiseTuple};

/// Settles an aggregate promise once
pub(crate) struct Latch<T> {
    completer: Mutex<Option<Completer<T>>>,
}

impl<T> Latch<T> {
    fn new(completer: Completer<T>) -> Self {
        Self {
            completer: Mutex::new(Some(completer)),
        }
    }

    /// Complete the aggregate; returns false if it was already settled
    pub(crate) fn settle(&self, outcome: Outcome<T>) -> bool {
        let completer = self
            .completer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        match completer {
            Some(completer) => {
                completer.complete(outcome);
                true
            }
            None => false,
        }
    }

    pub(crate) fn is_settled(&self) -> bool {
        self.completer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }
}

/// Create the aggregate promise together with the latch that settles it
pub(crate) fn latched<T>(runtime: Runtime) -> (Arc<Latch<T>>, Promise<T>)
where
    T: Send + Sync + 'static,
{
    let (completion, completer) = channel();
    let promise = Promise::from_handle(runtime, AsyncHandle::new(completion));
    (Arc::new(Latch::new(completer)), promise)
}

/// Runtime the aggregate promise is created on
///
/// Continuations of the aggregate run where its first input runs; an empty
/// input gets a runtime of its own.
pub(crate) fn runtime_of<T>(promises: &[Promise<T>]) -> Runtime
where
    T: Send + Sync + 'static,
{
    promises
        .first()
        .map(|promise| promise.runtime().clone())
        .unwrap_or_default()
}

/// Report every settlement kind of `promise` to the given callbacks
///
/// A consumed input is reported straight to `on_error` as
/// [`PromiseError::Invalid`].
pub(crate) fn observe<T, R, J, E>(mut promise: Promise<T>, on_resolve: R, on_reject: J, on_error: E)
where
    T: Send + Sync + 'static,
    R: FnOnce(T) + Send + 'static,
    J: FnOnce(T) + Send + 'static,
    E: FnOnce(Error) + Send + 'static,
{
    if !promise.valid() {
        on_error(PromiseError::Invalid.into());
        return;
    }

    let mut link = promise.then_or_fail(
        move |value| {
            on_resolve(value);
            Ok(())
        },
        move |value| {
            on_reject(value);
            Ok(())
        },
        move |error| {
            on_error(error);
            Ok(())
        },
    );
    link.detach();
}

/// Lock a collector's bookkeeping, recovering from poisoning
pub(crate) fn lock<S>(state: &Mutex<S>) -> MutexGuard<'_, S> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::reject;

    #[test]
    fn test_latch_settles_once() {
        let (latch, promise) = latched::<i32>(Runtime::new());
        assert!(!latch.is_settled());
        assert!(latch.settle(Ok(1)));
        assert!(!latch.settle(reject(2)));
        assert!(latch.is_settled());
        assert_eq!(promise.get().ok(), Some(1));
    }

    #[test]
    fn test_observe_reports_consumed_input_as_invalid() {
        let runtime = Runtime::new();
        let mut consumed = runtime.resolved(1);
        let _next = consumed.then(Ok);

        let (latch, promise) = latched::<i32>(runtime);
        let on_error = latch.clone();
        observe(
            consumed,
            |_| {},
            |_| {},
            move |error| {
                on_error.settle(Err(error.into()));
            },
        );

        let error = promise.get().unwrap_err().error().unwrap();
        assert_eq!(error.downcast_ref::<PromiseError>(), Some(&PromiseError::Invalid));
    }
}
