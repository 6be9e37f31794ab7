//! Collection form of `all`

use std::sync::{Arc, Mutex};

use crate::error::{fail, reject, Error, PromiseError};
use crate::promise::Promise;

use super::{latched, lock, observe, runtime_of, Latch};

struct Collector<T> {
    slots: Mutex<Slots<T>>,
    latch: Arc<Latch<Vec<T>>>,
}

struct Slots<T> {
    values: Vec<Option<T>>,
    remaining: usize,
}

impl<T> Collector<T>
where
    T: Send + Sync + 'static,
{
    fn fill(&self, index: usize, value: T) {
        if self.latch.is_settled() {
            return;
        }

        let values = {
            let mut slots = lock(&self.slots);
            slots.values[index] = Some(value);
            slots.remaining -= 1;
            if slots.remaining > 0 {
                return;
            }
            std::mem::take(&mut slots.values)
        };

        let values: Option<Vec<T>> = values.into_iter().collect();
        match values {
            Some(values) => self.latch.settle(Ok(values)),
            None => self
                .latch
                .settle(fail(PromiseError::UnhandledPath("all collector"))),
        };
    }

    fn reject(&self, value: T) {
        self.latch.settle(reject(vec![value]));
    }

    fn fail(&self, error: Error) {
        self.latch.settle(fail(error));
    }
}

/// Resolve with every value in input order, or settle with the first failure
///
/// A typed rejection `v` of any input rejects the result with `vec![v]`; an
/// opaque error is passed on unchanged. An empty input resolves with an empty
/// vector.
pub fn all<T>(promises: Vec<Promise<T>>) -> Promise<Vec<T>>
where
    T: Send + Sync + 'static,
{
    let runtime = runtime_of(&promises);
    if promises.is_empty() {
        return runtime.resolved(Vec::new());
    }

    let (latch, result) = latched(runtime);
    let count = promises.len();
    let collector = Arc::new(Collector {
        slots: Mutex::new(Slots {
            values: (0..count).map(|_| None).collect(),
            remaining: count,
        }),
        latch,
    });

    for (index, promise) in promises.into_iter().enumerate() {
        let on_resolve = collector.clone();
        let on_reject = collector.clone();
        let on_error = collector.clone();
        observe(
            promise,
            move |value| on_resolve.fill(index, value),
            move |value| on_reject.reject(value),
            move |error| on_error.fail(error),
        );
    }

    result
}
