//! First success wins

use std::sync::{Arc, Mutex};

use crate::error::{fail, AggregateError, Error, PromiseError, Rejection};
use crate::promise::Promise;

use super::{latched, lock, observe, runtime_of, Latch};

struct Collector<T> {
    rejections: Mutex<Rejections<T>>,
    latch: Arc<Latch<T>>,
}

struct Rejections<T> {
    entries: Vec<Option<Rejection<T>>>,
    remaining: usize,
}

impl<T> Collector<T>
where
    T: Send + Sync + 'static,
{
    fn resolve(&self, value: T) {
        self.latch.settle(Ok(value));
    }

    fn record(&self, index: usize, rejection: Rejection<T>) {
        let entries = {
            let mut rejections = lock(&self.rejections);
            rejections.entries[index] = Some(rejection);
            rejections.remaining -= 1;
            if rejections.remaining > 0 {
                return;
            }
            std::mem::take(&mut rejections.entries)
        };

        let entries: Option<Vec<Rejection<T>>> = entries.into_iter().collect();
        match entries {
            Some(entries) => self.latch.settle(fail(aggregate(entries))),
            None => self
                .latch
                .settle(fail(PromiseError::UnhandledPath("any collector"))),
        };
    }
}

/// Combine one rejection per input into a single error
///
/// Only typed rejections yield an error carrying `Vec<T>`; as soon as one of
/// them is opaque every entry becomes an [`Error`] inside an
/// [`AggregateError`].
fn aggregate<T>(entries: Vec<Rejection<T>>) -> Error
where
    T: Send + Sync + 'static,
{
    if entries.iter().all(Rejection::is_value) {
        let values: Vec<T> = entries.into_iter().filter_map(Rejection::value).collect();
        return Error::from_value(values);
    }

    let errors = entries
        .into_iter()
        .map(|entry| match entry {
            Rejection::Value(value) => Error::from_value(value),
            Rejection::Error(error) => error,
        })
        .collect();
    Error::new(AggregateError::new(errors))
}

/// Resolve with the first input that resolves
///
/// The result fails only once every input has failed. An empty input fails
/// with [`PromiseError::EmptyCollection`].
pub fn any<T>(promises: Vec<Promise<T>>) -> Promise<T>
where
    T: Send + Sync + 'static,
{
    let runtime = runtime_of(&promises);
    if promises.is_empty() {
        return runtime.failed(PromiseError::EmptyCollection);
    }

    let (latch, result) = latched(runtime);
    let count = promises.len();
    let collector = Arc::new(Collector {
        rejections: Mutex::new(Rejections {
            entries: (0..count).map(|_| None).collect(),
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
            move |value| on_resolve.resolve(value),
            move |value| on_reject.record(index, Rejection::Value(value)),
            move |error| on_error.record(index, Rejection::Error(error)),
        );
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::reject;
    use crate::executor::Runtime;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_any_first_success_wins() {
        let runtime = Runtime::new();
        let promises = vec![
            runtime.rejected(0),
            runtime.spawn(|| {
                thread::sleep(Duration::from_millis(20));
                Ok(2)
            }),
            runtime.failed(Error::msg("nope")),
        ];

        assert_eq!(any(promises).get().ok(), Some(2));
    }

    #[test]
    fn test_any_all_typed_rejections_carry_values() {
        let runtime = Runtime::new();
        let promises = vec![
            runtime.spawn(|| {
                thread::sleep(Duration::from_millis(20));
                reject(1)
            }),
            runtime.rejected(2),
            runtime.rejected(3),
        ];

        let error = any(promises).get().unwrap_err().error().unwrap();
        assert_eq!(error.downcast_ref::<Vec<i32>>(), Some(&vec![1, 2, 3]));
    }

    #[test]
    fn test_any_mixed_rejections_aggregate() {
        let runtime = Runtime::new();
        let promises = vec![runtime.rejected(1), runtime.failed(Error::msg("opaque"))];

        let error = any(promises).get().unwrap_err().error().unwrap();
        let aggregate = error.downcast_ref::<AggregateError>().unwrap();
        assert_eq!(aggregate.len(), 2);
        assert_eq!(aggregate.errors()[0].downcast_ref::<i32>(), Some(&1));
        assert_eq!(aggregate.errors()[1].to_string(), "opaque");
    }

    #[test]
    fn test_any_of_nothing_fails() {
        let error = any(Vec::<Promise<i32>>::new())
            .get()
            .unwrap_err()
            .error()
            .unwrap();
        assert!(error.is::<PromiseError>());
    }
}
