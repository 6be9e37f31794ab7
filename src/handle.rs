//! Exclusive handle over an in-flight computation

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use crate::error::{Error, Outcome, PromiseError, Rejection};
use crate::future::{Completion, SharedCompletion};

/// Owns the result of a dispatched computation, or an already-settled one
///
/// Not clonable: there is exactly one consumer of the result. Moving the
/// handle out with [`AsyncHandle::take`] leaves an invalid handle behind.
pub struct AsyncHandle<T> {
    completion: Option<Completion<T>>,
}

impl<T> AsyncHandle<T> {
    /// Adopt an already-dispatched computation
    pub fn new(completion: Completion<T>) -> Self {
        Self {
            completion: Some(completion),
        }
    }

    pub fn resolved(value: T) -> Self {
        Self::new(Completion::settled(Ok(value)))
    }

    pub fn rejected(value: T) -> Self {
        Self::new(Completion::settled(Err(Rejection::Value(value))))
    }

    pub fn failed(error: Error) -> Self {
        Self::new(Completion::settled(Err(Rejection::Error(error))))
    }

    /// A handle that owns nothing
    pub fn invalid() -> Self {
        Self { completion: None }
    }

    /// True while the handle owns an unconsumed computation
    pub fn valid(&self) -> bool {
        self.completion.is_some()
    }

    /// True once the owned computation has produced its outcome
    pub fn is_settled(&self) -> bool {
        self.completion.as_ref().map_or(false, Completion::is_ready)
    }

    /// Move the computation out, leaving this handle invalid
    pub fn take(&mut self) -> AsyncHandle<T> {
        AsyncHandle {
            completion: self.completion.take(),
        }
    }

    /// Replace the owned computation, returning the previous one
    pub fn replace(&mut self, other: AsyncHandle<T>) -> AsyncHandle<T> {
        std::mem::replace(self, other)
    }

    /// Block until the computation settles and take its outcome
    pub fn wait(self) -> Outcome<T> {
        match self.completion {
            Some(completion) => completion.wait(),
            None => Err(Rejection::Error(PromiseError::Invalid.into())),
        }
    }

    /// Block until the computation settles without consuming it
    pub fn wait_ready(&self) {
        if let Some(completion) = &self.completion {
            completion.wait_ready();
        }
    }

    /// Convert into a form that many continuations can wait on
    pub fn share(self) -> SharedHandle<T>
    where
        T: Clone,
    {
        let completion = self.completion.unwrap_or_else(|| {
            Completion::settled(Err(Rejection::Error(PromiseError::Invalid.into())))
        });
        SharedHandle {
            inner: completion.share(),
        }
    }

    pub fn into_completion(self) -> Option<Completion<T>> {
        self.completion
    }
}

impl<T> Default for AsyncHandle<T> {
    fn default() -> Self {
        Self::invalid()
    }
}

impl<T> From<Completion<T>> for AsyncHandle<T> {
    fn from(completion: Completion<T>) -> Self {
        Self::new(completion)
    }
}

impl<T> Future for AsyncHandle<T> {
    type Output = Outcome<T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match self.completion.as_mut() {
            Some(completion) => Pin::new(completion).poll(cx),
            None => Poll::Ready(Err(Rejection::Error(PromiseError::Invalid.into()))),
        }
    }
}

/// Clonable handle over one computation; every reader gets its own copy of
/// the outcome and the computation never runs twice.
pub struct SharedHandle<T> {
    inner: SharedCompletion<T>,
}

impl<T: Clone> SharedHandle<T> {
    /// Block until settled and return a copy of the outcome
    pub fn get(&self) -> Outcome<T> {
        self.inner.wait()
    }

    pub fn is_settled(&self) -> bool {
        self.inner.is_ready()
    }
}

impl<T> Clone for SharedHandle<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}
