//! Worker dispatch and the promise runtime
//!
//! Every promise body runs on an independently dispatched worker. The default
//! [`ThreadExecutor`] starts one named OS thread per body, so a chain link can
//! block on its parent without ever starving another link.
//!
//! ## Panic Handling
//!
//! Bodies are wrapped with `std::panic::catch_unwind` before they reach the
//! executor. A panicking body settles its promise with an opaque error instead
//! of tearing down the worker silently.
//!
//! ## Runtime
//!
//! A [`Runtime`] is an explicitly created service: it owns the executor and the
//! [`HoldingPool`] detached work is handed to. Promises carry a clone of the
//! runtime they were created on and pass it to every continuation.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;

use crate::config::{DEFAULT_SWEEP_INTERVAL, WORKER_THREAD_PREFIX};
use crate::error::{guard, Error, Outcome, PromiseError};
use crate::future::channel;
use crate::handle::AsyncHandle;
use crate::pool::HoldingPool;
use crate::promise::Promise;
use crate::ready::ReadyPromise;

/// Identifies one dispatched body
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct JobId(pub(crate) u64);

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A unit of work handed to an executor
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Runs jobs somewhere other than the calling thread
pub trait Execute: Send + Sync + 'static {
    /// Start `job`; it must not run on the calling thread's stack
    fn execute(&self, id: JobId, job: Job) -> Result<(), PromiseError>;
}

/// Executor that gives every job its own detached thread
pub struct ThreadExecutor {
    name_prefix: String,
    stack_size: Option<usize>,
}

impl ThreadExecutor {
    pub fn new() -> Self {
        Self {
            name_prefix: WORKER_THREAD_PREFIX.to_string(),
            stack_size: None,
        }
    }
}

impl Default for ThreadExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl Execute for ThreadExecutor {
    fn execute(&self, id: JobId, job: Job) -> Result<(), PromiseError> {
        let mut builder = thread::Builder::new().name(format!("{}-{}", self.name_prefix, id));
        if let Some(size) = self.stack_size {
            builder = builder.stack_size(size);
        }
        builder
            .spawn(job)
            .map(|_detached| ())
            .map_err(|e| PromiseError::Spawn(e.to_string()))
    }
}

/// Builder for customizing a runtime
pub struct RuntimeBuilder {
    name_prefix: Option<String>,
    stack_size: Option<usize>,
    sweep_interval: usize,
    executor: Option<Box<dyn Execute>>,
}

impl RuntimeBuilder {
    /// Create a new runtime builder
    pub fn new() -> Self {
        Self {
            name_prefix: None,
            stack_size: None,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
            executor: None,
        }
    }

    /// Set the worker thread name prefix for debugging
    pub fn thread_name(mut self, prefix: impl Into<String>) -> Self {
        self.name_prefix = Some(prefix.into());
        self
    }

    /// Set the stack size of worker threads
    pub fn stack_size(mut self, size: usize) -> Self {
        self.stack_size = Some(size);
        self
    }

    /// Sweep settled entries out of the holding pool every `interval` insertions
    pub fn sweep_interval(mut self, interval: usize) -> Self {
        self.sweep_interval = interval;
        self
    }

    /// Replace the default thread-per-job executor
    ///
    /// The executor must not run jobs inline and must not bound the number of
    /// concurrently blocked jobs, because chain links block on their parents.
    pub fn executor(mut self, executor: impl Execute) -> Self {
        self.executor = Some(Box::new(executor));
        self
    }

    pub fn build(self) -> Runtime {
        let executor = self.executor.unwrap_or_else(|| {
            Box::new(ThreadExecutor {
                name_prefix: self
                    .name_prefix
                    .unwrap_or_else(|| WORKER_THREAD_PREFIX.to_string()),
                stack_size: self.stack_size,
            })
        });

        Runtime {
            inner: Arc::new(RuntimeInner {
                executor,
                pool: HoldingPool::with_sweep_interval(self.sweep_interval),
                next_job_id: AtomicU64::new(1),
            }),
        }
    }
}

impl Default for RuntimeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Shared service that dispatches promise bodies and holds detached work
///
/// Dropping the last handle does not wait for in-flight work; call
/// [`Runtime::drain`] first when every detached computation must finish.
#[derive(Clone)]
pub struct Runtime {
    inner: Arc<RuntimeInner>,
}

struct RuntimeInner {
    executor: Box<dyn Execute>,
    pool: HoldingPool,
    next_job_id: AtomicU64,
}

impl Runtime {
    /// Create a runtime with the default thread-per-job executor
    pub fn new() -> Self {
        RuntimeBuilder::new().build()
    }

    pub fn builder() -> RuntimeBuilder {
        RuntimeBuilder::new()
    }

    /// The pool detached computations are handed to
    pub fn pool(&self) -> &HoldingPool {
        &self.inner.pool
    }

    /// Block until every detached computation has settled
    pub fn drain(&self) {
        self.inner.pool.drain();
    }

    fn next_job_id(&self) -> JobId {
        JobId(self.inner.next_job_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Run `body` on a worker and return the handle to its outcome
    ///
    /// A body that cannot be started yields an already-failed handle.
    pub(crate) fn dispatch<T, F>(&self, body: F) -> AsyncHandle<T>
    where
        T: Send + 'static,
        F: FnOnce() -> Outcome<T> + Send + 'static,
    {
        self.try_dispatch(body)
            .unwrap_or_else(|e| AsyncHandle::failed(Error::from(e)))
    }

    pub(crate) fn try_dispatch<T, F>(&self, body: F) -> Result<AsyncHandle<T>, PromiseError>
    where
        T: Send + 'static,
        F: FnOnce() -> Outcome<T> + Send + 'static,
    {
        let id = self.next_job_id();
        let (completion, completer) = channel();

        let job: Job = Box::new(move || {
            let outcome = guard(body);
            tracing::trace!("job {} settled", id);
            completer.complete(outcome);
        });

        tracing::trace!("dispatching job {}", id);
        if let Err(e) = self.inner.executor.execute(id, job) {
            tracing::error!("job {} could not be dispatched: {}", id, e);
            return Err(e);
        }

        Ok(AsyncHandle::new(completion))
    }

    /// Dispatch `f` and wrap its outcome in a promise
    pub fn spawn<T, F>(&self, f: F) -> Promise<T>
    where
        T: Send + Sync + 'static,
        F: FnOnce() -> Outcome<T> + Send + 'static,
    {
        Promise::from_handle(self.clone(), self.dispatch(f))
    }

    /// Dispatch `f(args)`
    pub fn spawn_with<T, A, F>(&self, f: F, args: A) -> Promise<T>
    where
        T: Send + Sync + 'static,
        A: Send + 'static,
        F: FnOnce(A) -> Outcome<T> + Send + 'static,
    {
        self.spawn(move || f(args))
    }

    /// Adopt an already-dispatched computation
    pub fn adopt<T>(&self, handle: AsyncHandle<T>) -> Promise<T>
    where
        T: Send + Sync + 'static,
    {
        Promise::from_handle(self.clone(), handle)
    }

    pub fn resolved<T>(&self, value: T) -> Promise<T>
    where
        T: Send + Sync + 'static,
    {
        self.adopt(AsyncHandle::resolved(value))
    }

    pub fn rejected<T>(&self, value: T) -> Promise<T>
    where
        T: Send + Sync + 'static,
    {
        self.adopt(AsyncHandle::rejected(value))
    }

    pub fn failed<T>(&self, error: impl Into<Error>) -> Promise<T>
    where
        T: Send + Sync + 'static,
    {
        self.adopt(AsyncHandle::failed(error.into()))
    }

    /// Dispatch `f` and cache its outcome for polling and subscribers
    pub fn ready<T, F>(&self, f: F) -> ReadyPromise<T>
    where
        T: Clone + Send + Sync + 'static,
        F: FnOnce() -> Outcome<T> + Send + 'static,
    {
        ReadyPromise::new(self.spawn(f))
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("held", &self.inner.pool.len())
            .finish()
    }
}

/// Dispatch `f` on `runtime`
pub fn make_promise<T, F>(runtime: &Runtime, f: F) -> Promise<T>
where
    T: Send + Sync + 'static,
    F: FnOnce() -> Outcome<T> + Send + 'static,
{
    runtime.spawn(f)
}

/// Create a promise that is already rejected with `value`
pub fn make_rejected_promise<T>(runtime: &Runtime, value: T) -> Promise<T>
where
    T: Send + Sync + 'static,
{
    runtime.rejected(value)
}

/// Create a promise that already failed with `error`
pub fn make_failed_promise<T>(runtime: &Runtime, error: impl Into<Error>) -> Promise<T>
where
    T: Send + Sync + 'static,
{
    runtime.adopt(AsyncHandle::failed(error.into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Executor that refuses every job
    struct Refusing;

    impl Execute for Refusing {
        fn execute(&self, _id: JobId, _job: Job) -> Result<(), PromiseError> {
            Err(PromiseError::Spawn("no threads left".into()))
        }
    }

    /// Executor that records the jobs it was handed
    struct Recording(Arc<Mutex<Vec<JobId>>>);

    impl Execute for Recording {
        fn execute(&self, id: JobId, job: Job) -> Result<(), PromiseError> {
            self.0.lock().unwrap().push(id);
            ThreadExecutor::new().execute(id, job)
        }
    }

    #[test]
    fn test_runtime_creation() {
        let runtime = Runtime::new();
        assert!(runtime.pool().is_empty());
    }

    #[test]
    fn test_spawn_runs_on_named_worker() {
        let runtime = Runtime::builder().thread_name("test-worker").build();
        let name = runtime
            .spawn(|| Ok(thread::current().name().map(str::to_string)))
            .get()
            .ok()
            .flatten();
        assert!(name.unwrap().starts_with("test-worker-"));
    }

    #[test]
    fn test_refused_job_fails_promise() {
        let runtime = Runtime::builder().executor(Refusing).build();
        let error = runtime.spawn(|| Ok(1)).get().unwrap_err().error().unwrap();
        assert!(matches!(
            error.downcast_ref::<PromiseError>(),
            Some(PromiseError::Spawn(_))
        ));
    }

    #[test]
    fn test_job_ids_are_sequential() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let runtime = Runtime::builder().executor(Recording(seen.clone())).build();
        runtime.spawn(|| Ok(1)).get().ok();
        runtime.spawn(|| Ok(2)).get().ok();
        assert_eq!(*seen.lock().unwrap(), vec![JobId(1), JobId(2)]);
    }

    #[test]
    fn test_panicking_body_fails_promise() {
        let runtime = Runtime::new();
        let error = runtime
            .spawn(|| -> Outcome<i32> { panic!("worker blew up") })
            .get()
            .unwrap_err()
            .error()
            .unwrap();
        assert!(error.is_panic());
    }
}
