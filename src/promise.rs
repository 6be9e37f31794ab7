//! Chainable promises
//!
//! A [`Promise`] owns one [`AsyncHandle`]. Attaching a continuation moves that
//! handle into a new worker that blocks on the parent outcome and then runs
//! the settlement protocol:
//!
//! 1. resolved: the resolve callback gets the value. A typed rejection it
//!    returns rejects the new link; an opaque error goes to this link's error
//!    callback if there is one, otherwise it propagates.
//! 2. typed rejection: the reject callback handles it if present, otherwise the
//!    rejection passes through untouched.
//! 3. opaque error: the error callback handles it if present, otherwise it
//!    propagates unchanged.
//!
//! Continuations never block the caller. A promise is a single-use chain link:
//! after the first `then`/`fail` it reports `valid() == false`.

use std::fmt;
use std::future::IntoFuture;

use crate::error::{carry, guard, Error, Outcome, PromiseError, Rejection};
use crate::executor::Runtime;
use crate::handle::{AsyncHandle, SharedHandle};
use crate::pool::HoldingPool;

pub type ResolveFn<T, U> = Box<dyn FnOnce(T) -> Outcome<U> + Send + 'static>;
pub type RejectFn<T, U> = Box<dyn FnOnce(T) -> Outcome<U> + Send + 'static>;
pub type ErrorFn<U> = Box<dyn FnOnce(Error) -> Outcome<U> + Send + 'static>;

/// The callbacks supplied to one chain link
pub enum Continuation<T, U> {
    OnResolve(ResolveFn<T, U>),
    OnResolveReject(ResolveFn<T, U>, RejectFn<T, U>),
    OnResolveRejectError(ResolveFn<T, U>, RejectFn<T, U>, ErrorFn<U>),
}

impl<T, U> Continuation<T, U> {
    fn into_parts(self) -> (ResolveFn<T, U>, Option<RejectFn<T, U>>, Option<ErrorFn<U>>) {
        match self {
            Continuation::OnResolve(on_resolve) => (on_resolve, None, None),
            Continuation::OnResolveReject(on_resolve, on_reject) => {
                (on_resolve, Some(on_reject), None)
            }
            Continuation::OnResolveRejectError(on_resolve, on_reject, on_error) => {
                (on_resolve, Some(on_reject), Some(on_error))
            }
        }
    }
}

/// Settle one chain link from its parent's outcome
pub(crate) fn settle<T, U>(parent: Outcome<T>, continuation: Continuation<T, U>) -> Outcome<U>
where
    T: Send + Sync + 'static,
    U: Send + Sync + 'static,
{
    let (on_resolve, on_reject, on_error) = continuation.into_parts();

    match parent {
        Ok(value) => match guard(move || on_resolve(value)) {
            Err(Rejection::Error(error)) => match on_error {
                Some(on_error) => guard(move || on_error(error)),
                None => Err(Rejection::Error(error)),
            },
            // a typed rejection raised here belongs to the next link
            other => other,
        },
        Err(Rejection::Value(value)) => match on_reject {
            Some(on_reject) => guard(move || on_reject(value)),
            None => Err(carry(value)),
        },
        Err(Rejection::Error(error)) => match on_error {
            Some(on_error) => guard(move || on_error(error)),
            None => Err(Rejection::Error(error)),
        },
    }
}

/// A single-use link in a chain of asynchronous computations
pub struct Promise<T>
where
    T: Send + Sync + 'static,
{
    handle: AsyncHandle<T>,
    runtime: Runtime,
}

impl<T> Promise<T>
where
    T: Send + Sync + 'static,
{
    /// Wrap an existing handle; continuations will be dispatched on `runtime`
    pub fn from_handle(runtime: Runtime, handle: AsyncHandle<T>) -> Self {
        Self { handle, runtime }
    }

    /// A promise that waits on a shared computation without re-running it
    pub fn from_shared(runtime: Runtime, shared: &SharedHandle<T>) -> Self
    where
        T: Clone,
    {
        let shared = shared.clone();
        runtime.spawn(move || shared.get())
    }

    pub fn runtime(&self) -> &Runtime {
        &self.runtime
    }

    /// True while this promise still owns its computation
    pub fn valid(&self) -> bool {
        self.handle.valid()
    }

    /// True once the owned computation has settled
    pub fn is_settled(&self) -> bool {
        self.handle.is_settled()
    }

    /// Attach a continuation; this promise is consumed and the new link returned
    pub fn chain<U>(&mut self, continuation: Continuation<T, U>) -> Promise<U>
    where
        U: Send + Sync + 'static,
    {
        let parent = self.handle.take();
        if !parent.valid() {
            return Promise::from_handle(
                self.runtime.clone(),
                AsyncHandle::failed(PromiseError::Invalid.into()),
            );
        }

        let handle = self
            .runtime
            .dispatch(move || settle(parent.wait(), continuation));
        Promise::from_handle(self.runtime.clone(), handle)
    }

    /// Handle the resolved value; rejections and errors pass through
    pub fn then<U, R>(&mut self, on_resolve: R) -> Promise<U>
    where
        U: Send + Sync + 'static,
        R: FnOnce(T) -> Outcome<U> + Send + 'static,
    {
        self.chain(Continuation::OnResolve(Box::new(on_resolve)))
    }

    /// Handle the resolved value or a typed rejection; errors pass through
    pub fn then_or<U, R, J>(&mut self, on_resolve: R, on_reject: J) -> Promise<U>
    where
        U: Send + Sync + 'static,
        R: FnOnce(T) -> Outcome<U> + Send + 'static,
        J: FnOnce(T) -> Outcome<U> + Send + 'static,
    {
        self.chain(Continuation::OnResolveReject(
            Box::new(on_resolve),
            Box::new(on_reject),
        ))
    }

    /// Handle every settlement kind
    pub fn then_or_fail<U, R, J, E>(&mut self, on_resolve: R, on_reject: J, on_error: E) -> Promise<U>
    where
        U: Send + Sync + 'static,
        R: FnOnce(T) -> Outcome<U> + Send + 'static,
        J: FnOnce(T) -> Outcome<U> + Send + 'static,
        E: FnOnce(Error) -> Outcome<U> + Send + 'static,
    {
        self.chain(Continuation::OnResolveRejectError(
            Box::new(on_resolve),
            Box::new(on_reject),
            Box::new(on_error),
        ))
    }

    /// Handle typed rejections and errors; a resolved value passes through
    pub fn fail<J, E>(&mut self, on_reject: J, on_error: E) -> Promise<T>
    where
        J: FnOnce(T) -> Outcome<T> + Send + 'static,
        E: FnOnce(Error) -> Outcome<T> + Send + 'static,
    {
        self.chain(Continuation::OnResolveRejectError(
            Box::new(Ok::<T, Rejection<T>>),
            Box::new(on_reject),
            Box::new(on_error),
        ))
    }

    /// Handle errors only; values and typed rejections pass through
    pub fn fail_error<E>(&mut self, on_error: E) -> Promise<T>
    where
        E: FnOnce(Error) -> Outcome<T> + Send + 'static,
    {
        self.chain(Continuation::OnResolveRejectError(
            Box::new(Ok::<T, Rejection<T>>),
            Box::new(|value: T| Err(Rejection::Value(value))),
            Box::new(on_error),
        ))
    }

    /// Block until settled and take the outcome
    pub fn get(mut self) -> Outcome<T> {
        self.handle.take().wait()
    }

    /// Block until settled without consuming the promise
    pub fn wait(&self) {
        self.handle.wait_ready();
    }

    /// Give up the computation as its underlying handle
    pub fn into_handle(mut self) -> AsyncHandle<T> {
        self.handle.take()
    }

    /// Let many continuations wait on this computation
    pub fn share(mut self) -> SharedHandle<T>
    where
        T: Clone,
    {
        self.handle.take().share()
    }

    /// Settle now with `value`; pending work is detached and its result ignored
    pub fn resolve(&mut self, value: T) {
        self.settle_now(AsyncHandle::resolved(value));
    }

    /// Settle now with a typed rejection
    pub fn reject(&mut self, value: T) {
        self.settle_now(AsyncHandle::rejected(value));
    }

    /// Settle now with an opaque error
    pub fn reject_error(&mut self, error: impl Into<Error>) {
        self.settle_now(AsyncHandle::failed(error.into()));
    }

    fn settle_now(&mut self, settled: AsyncHandle<T>) {
        let previous = self.handle.replace(settled);
        self.runtime.pool().hold(previous);
    }

    /// Release the computation to the runtime's holding pool
    pub fn detach(&mut self) {
        let handle = self.handle.take();
        self.runtime.pool().hold(handle);
    }

    /// Release the computation to `pool`
    pub fn detach_into(&mut self, pool: &HoldingPool) {
        pool.hold(self.handle.take());
    }
}

impl<T> Drop for Promise<T>
where
    T: Send + Sync + 'static,
{
    fn drop(&mut self) {
        if self.handle.valid() && !self.handle.is_settled() {
            self.detach();
        }
    }
}

impl<T> From<Promise<T>> for AsyncHandle<T>
where
    T: Send + Sync + 'static,
{
    fn from(promise: Promise<T>) -> Self {
        promise.into_handle()
    }
}

impl<T> IntoFuture for Promise<T>
where
    T: Send + Sync + 'static,
{
    type Output = Outcome<T>;
    type IntoFuture = AsyncHandle<T>;

    fn into_future(self) -> Self::IntoFuture {
        self.into_handle()
    }
}

impl<T> fmt::Debug for Promise<T>
where
    T: Send + Sync + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Promise")
            .field("valid", &self.valid())
            .field("settled", &self.is_settled())
            .finish()
    }
}
