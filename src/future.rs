//! One-shot settlement primitive
//!
//! A [`Completion`] is the single consumer of a result that its paired
//! [`Completer`] produces exactly once. This is the substrate every promise is
//! built on: a worker runs a body and completes the pair, while the owner of
//! the `Completion` may block on it, poll it as a `std::future::Future`, or
//! turn it into a [`SharedCompletion`] that many readers can wait on.

use std::pin::Pin;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll, Waker};

use futures::future::FusedFuture;

use crate::error::{Outcome, PromiseError, Rejection};

/// Consumer side of a one-shot result
pub struct Completion<T> {
    shared: Arc<Shared<T>>,
    consumed: bool,
}

/// Producer side of a one-shot result
///
/// Dropping a `Completer` without completing it settles the pair with
/// [`PromiseError::Abandoned`].
pub struct Completer<T> {
    shared: Option<Arc<Shared<T>>>,
}

/// A completion that many readers can wait on; every read clones the outcome
pub struct SharedCompletion<T> {
    shared: Arc<Shared<T>>,
}

/// Shared state between Completion and Completer
struct Shared<T> {
    state: Mutex<State<T>>,
    settled: Condvar,
}

struct State<T> {
    completed: bool,
    result: Option<Outcome<T>>,
    /// Only the owning `Completion` polls, so one waker is enough
    waker: Option<Waker>,
}

impl<T> Shared<T> {
    fn lock(&self) -> MutexGuard<'_, State<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn wait_completed(&self) -> MutexGuard<'_, State<T>> {
        let mut state = self.lock();
        while !state.completed {
            state = self
                .settled
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
        state
    }

    fn complete(&self, outcome: Outcome<T>) {
        let waker = {
            let mut state = self.lock();
            if state.completed {
                return;
            }
            state.completed = true;
            state.result = Some(outcome);
            state.waker.take()
        };
        self.settled.notify_all();
        if let Some(waker) = waker {
            waker.wake();
        }
    }
}

/// Create a new Completion/Completer pair
pub fn channel<T>() -> (Completion<T>, Completer<T>) {
    let shared = Arc::new(Shared {
        state: Mutex::new(State {
            completed: false,
            result: None,
            waker: None,
        }),
        settled: Condvar::new(),
    });

    let completion = Completion {
        shared: shared.clone(),
        consumed: false,
    };
    let completer = Completer {
        shared: Some(shared),
    };

    (completion, completer)
}

impl<T> Completion<T> {
    /// Create a completion that is already settled
    pub fn settled(outcome: Outcome<T>) -> Self {
        let (completion, completer) = channel();
        completer.complete(outcome);
        completion
    }

    /// Check if the outcome is available without blocking
    pub fn is_ready(&self) -> bool {
        self.shared.lock().completed
    }

    /// Block until the outcome is available, without taking it
    pub fn wait_ready(&self) {
        drop(self.shared.wait_completed());
    }

    /// Block until the outcome is available and take it
    pub fn wait(mut self) -> Outcome<T> {
        self.consumed = true;
        let mut state = self.shared.wait_completed();
        state
            .result
            .take()
            .unwrap_or_else(|| Err(Rejection::Error(PromiseError::Invalid.into())))
    }

    /// Turn this completion into one that many readers can wait on
    pub fn share(self) -> SharedCompletion<T>
    where
        T: Clone,
    {
        SharedCompletion {
            shared: self.shared,
        }
    }
}

impl<T> std::future::Future for Completion<T> {
    type Output = Outcome<T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        if self.consumed {
            return Poll::Ready(Err(Rejection::Error(PromiseError::Invalid.into())));
        }

        let result = {
            let mut state = self.shared.lock();
            if state.completed {
                // Take the result (this can only happen once)
                state.result.take()
            } else {
                // Store the waker for later notification
                state.waker = Some(cx.waker().clone());
                return Poll::Pending;
            }
        };

        self.consumed = true;
        Poll::Ready(result.unwrap_or_else(|| Err(Rejection::Error(PromiseError::Invalid.into()))))
    }
}

impl<T> FusedFuture for Completion<T> {
    fn is_terminated(&self) -> bool {
        self.consumed
    }
}

impl<T> Completer<T> {
    /// Settle the paired completion
    pub fn complete(mut self, outcome: Outcome<T>) {
        if let Some(shared) = self.shared.take() {
            shared.complete(outcome);
        }
    }

    /// Check if the paired completion has been settled
    pub fn is_completed(&self) -> bool {
        self.shared
            .as_ref()
            .map_or(true, |shared| shared.lock().completed)
    }
}

impl<T> Drop for Completer<T> {
    fn drop(&mut self) {
        if let Some(shared) = self.shared.take() {
            shared.complete(Err(Rejection::Error(PromiseError::Abandoned.into())));
        }
    }
}

impl<T: Clone> SharedCompletion<T> {
    /// Block until settled and return a copy of the outcome
    pub fn wait(&self) -> Outcome<T> {
        let state = self.shared.wait_completed();
        state
            .result
            .clone()
            .unwrap_or_else(|| Err(Rejection::Error(PromiseError::Invalid.into())))
    }

    pub fn is_ready(&self) -> bool {
        self.shared.lock().completed
    }
}

impl<T> Clone for SharedCompletion<T> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}
