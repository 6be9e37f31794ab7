//! Pollable, multi-observer promises
//!
//! A [`ReadyPromise`] watches one computation and caches its outcome in a
//! [`SettlementSlot`]. The cache can be polled and read any number of times,
//! and subscribers registered with [`ReadyPromise::on_resolve`] or
//! [`ReadyPromise::on_reject`] are called once, in registration order, on the
//! thread that settles the slot. Subscribers registered while that broadcast
//! is still running are queued behind it.
//!
//! Opaque errors are cached like any other outcome but are not broadcast; only
//! resolved values and typed rejections reach subscribers.

use std::fmt;
use std::mem;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::error::{Error, Outcome, Rejection};
use crate::executor::Runtime;
use crate::handle::{AsyncHandle, SharedHandle};
use crate::promise::Promise;
use crate::state::{Settlement, SettlementSlot};

type Subscriber<T> = Box<dyn FnOnce(&T) + Send + 'static>;

struct Subscribers<T> {
    on_resolve: Vec<Subscriber<T>>,
    on_reject: Vec<Subscriber<T>>,
    /// Set from settlement until the settling thread has run every subscriber
    broadcasting: bool,
}

/// Slot plus subscriber lists; subscribers are always locked before the slot
struct Broadcast<T> {
    slot: SettlementSlot<T>,
    subscribers: Mutex<Subscribers<T>>,
}

impl<T: Clone> Broadcast<T> {
    fn new() -> Self {
        Self {
            slot: SettlementSlot::new(),
            subscribers: Mutex::new(Subscribers {
                on_resolve: Vec::new(),
                on_reject: Vec::new(),
                broadcasting: false,
            }),
        }
    }

    fn subscribers(&self) -> MutexGuard<'_, Subscribers<T>> {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Write the slot once and run the matching subscribers
    ///
    /// Subscribers that arrive during the broadcast are drained in further
    /// rounds until none are left.
    fn publish(&self, outcome: Outcome<T>) {
        {
            let mut subscribers = self.subscribers();
            if !self.slot.settle(outcome) {
                return;
            }
            subscribers.broadcasting = true;
        }

        let settlement = self.slot.snapshot();
        if let Settlement::Failed(error) = &settlement {
            tracing::trace!("ready promise failed without broadcast: {}", error);
        }

        loop {
            let (on_resolve, on_reject) = {
                let mut subscribers = self.subscribers();
                if subscribers.on_resolve.is_empty() && subscribers.on_reject.is_empty() {
                    subscribers.broadcasting = false;
                    return;
                }
                (
                    mem::take(&mut subscribers.on_resolve),
                    mem::take(&mut subscribers.on_reject),
                )
            };

            match &settlement {
                Settlement::Resolved(value) => notify(on_resolve, value),
                Settlement::Rejected(value) => notify(on_reject, value),
                Settlement::Failed(_) | Settlement::Pending => {}
            }
        }
    }

    /// Queue `subscriber` or run it now if the broadcast is over
    fn subscribe(&self, subscriber: Subscriber<T>, on_resolve: bool) {
        let mut subscribers = self.subscribers();
        let settlement = self.slot.snapshot();
        if settlement.is_pending() || subscribers.broadcasting {
            if on_resolve {
                subscribers.on_resolve.push(subscriber);
            } else {
                subscribers.on_reject.push(subscriber);
            }
            return;
        }
        drop(subscribers);

        match (settlement, on_resolve) {
            (Settlement::Resolved(value), true) | (Settlement::Rejected(value), false) => {
                notify(vec![subscriber], &value)
            }
            _ => {}
        }
    }
}

fn notify<T>(subscribers: Vec<Subscriber<T>>, value: &T) {
    for (index, subscriber) in subscribers.into_iter().enumerate() {
        if let Err(payload) = catch_unwind(AssertUnwindSafe(|| subscriber(value))) {
            tracing::warn!(
                "subscriber {} panicked: {}",
                index,
                Error::from_panic(payload)
            );
        }
    }
}

/// Promise whose outcome is cached for polling and broadcast to subscribers
pub struct ReadyPromise<T>
where
    T: Clone + Send + Sync + 'static,
{
    state: Arc<Broadcast<T>>,
    source: SharedHandle<T>,
    /// Settles after the slot is written and every subscriber has run
    broadcast: SharedHandle<()>,
    runtime: Runtime,
}

impl<T> ReadyPromise<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Start watching `promise`
    pub fn new(promise: Promise<T>) -> Self {
        let runtime = promise.runtime().clone();
        let source = promise.share();
        let state = Arc::new(Broadcast::new());

        let watcher = {
            let state = state.clone();
            let source = source.clone();
            move || -> Outcome<()> {
                state.publish(source.get());
                Ok(())
            }
        };

        let broadcast = match runtime.try_dispatch(watcher) {
            Ok(handle) => handle.share(),
            Err(e) => {
                let error = Error::from(e);
                state.publish(Err(Rejection::Error(error.clone())));
                AsyncHandle::failed(error).share()
            }
        };

        Self {
            state,
            source,
            broadcast,
            runtime,
        }
    }

    /// Call `f` with the value once the promise resolves
    ///
    /// A subscriber registered after the broadcast finished runs immediately
    /// on the calling thread.
    pub fn on_resolve<F>(&self, f: F)
    where
        F: FnOnce(&T) + Send + 'static,
    {
        self.state.subscribe(Box::new(f), true);
    }

    /// Call `f` with the rejected value once the promise is rejected
    pub fn on_reject<F>(&self, f: F)
    where
        F: FnOnce(&T) + Send + 'static,
    {
        self.state.subscribe(Box::new(f), false);
    }

    /// True once the outcome is cached
    pub fn ready(&self) -> bool {
        !self.state.slot.is_pending()
    }

    /// True while nothing is cached and the computation is still running
    pub fn pending(&self) -> bool {
        self.state.slot.is_pending() && !self.source.is_settled()
    }

    pub fn resolved(&self) -> bool {
        self.state.slot.is_resolved()
    }

    /// True for typed rejections and opaque errors alike
    pub fn rejected(&self) -> bool {
        self.state.slot.is_rejected()
    }

    /// Read the cached outcome
    ///
    /// Fails with [`PromiseError::NotReady`](crate::PromiseError::NotReady)
    /// before the outcome is cached.
    pub fn get(&self) -> Outcome<T> {
        self.state.slot.get()
    }

    /// Block until the outcome is cached and every subscriber has run
    pub fn wait(&self) -> Outcome<T> {
        let _ = self.broadcast.get();
        self.state.slot.wait()
    }

    /// Current settlement without blocking
    pub fn settlement(&self) -> Settlement<T> {
        self.state.slot.snapshot()
    }

    /// Continue with the cached outcome
    ///
    /// The callback sees `(Some(v), None)` for a resolved value,
    /// `(Some(v), Some(error))` for a typed rejection, where `error` carries
    /// `v`, and `(None, Some(error))` for an opaque failure.
    pub fn then<U, C>(&self, callback: C) -> Promise<U>
    where
        U: Send + Sync + 'static,
        C: FnOnce(Option<T>, Option<Error>) -> Outcome<U> + Send + 'static,
    {
        let state = self.state.clone();
        let broadcast = self.broadcast.clone();
        self.runtime.spawn(move || {
            let _ = broadcast.get();
            match state.slot.wait() {
                Ok(value) => callback(Some(value), None),
                Err(Rejection::Value(value)) => {
                    let error = Error::from_value(value.clone());
                    callback(Some(value), Some(error))
                }
                Err(Rejection::Error(error)) => callback(None, Some(error)),
            }
        })
    }

    /// An ordinary promise that replays the cached outcome
    pub fn promisify(&self) -> Promise<T> {
        let state = self.state.clone();
        let broadcast = self.broadcast.clone();
        self.runtime.spawn(move || {
            let _ = broadcast.get();
            state.slot.wait()
        })
    }
}

impl<T> From<Promise<T>> for ReadyPromise<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn from(promise: Promise<T>) -> Self {
        Self::new(promise)
    }
}

impl<T> fmt::Debug for ReadyPromise<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReadyPromise")
            .field("ready", &self.ready())
            .field("resolved", &self.resolved())
            .finish()
    }
}
