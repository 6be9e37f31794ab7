//! First settlement wins

use crate::error::{fail, reject, PromiseError};
use crate::promise::Promise;

use super::{latched, observe, runtime_of};

/// Settle with the outcome of whichever input settles first
///
/// Success, typed rejection and opaque error all count as settling. An empty
/// input fails with [`PromiseError::EmptyCollection`].
pub fn race<T>(promises: Vec<Promise<T>>) -> Promise<T>
where
    T: Send + Sync + 'static,
{
    let runtime = runtime_of(&promises);
    if promises.is_empty() {
        return runtime.failed(PromiseError::EmptyCollection);
    }

    let (latch, result) = latched(runtime);
    for promise in promises {
        let on_resolve = latch.clone();
        let on_reject = latch.clone();
        let on_error = latch.clone();
        observe(
            promise,
            move |value| {
                on_resolve.settle(Ok(value));
            },
            move |value| {
                on_reject.settle(reject(value));
            },
            move |error| {
                on_error.settle(fail(error));
            },
        );
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Error, Rejection};
    use crate::executor::Runtime;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_race_fastest_resolution_wins() {
        let runtime = Runtime::new();
        let promises = vec![
            runtime.spawn(|| {
                thread::sleep(Duration::from_millis(200));
                Ok("slow")
            }),
            runtime.spawn(|| {
                thread::sleep(Duration::from_millis(10));
                Ok("fast")
            }),
        ];

        assert_eq!(race(promises).get().ok(), Some("fast"));
    }

    #[test]
    fn test_race_fast_rejection_beats_slow_resolution() {
        let runtime = Runtime::new();
        let promises = vec![
            runtime.spawn(|| {
                thread::sleep(Duration::from_millis(200));
                Ok(1)
            }),
            runtime.spawn(|| fail(Error::from_value(-7i32))),
        ];

        let error = race(promises).get().unwrap_err().error().unwrap();
        assert_eq!(error.downcast_ref::<i32>(), Some(&-7));
    }

    #[test]
    fn test_race_typed_rejection_stays_typed() {
        let runtime = Runtime::new();
        let promises = vec![runtime.rejected(5)];
        assert!(matches!(race(promises).get(), Err(Rejection::Value(5))));
    }

    #[test]
    fn test_race_of_nothing_fails() {
        let error = race(Vec::<Promise<i32>>::new())
            .get()
            .unwrap_err()
            .error()
            .unwrap();
        assert_eq!(
            error.downcast_ref::<PromiseError>(),
            Some(&PromiseError::EmptyCollection)
        );
    }
}
