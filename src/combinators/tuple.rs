//! Fixed-arity, heterogeneous form of `all`

use std::sync::{Arc, Mutex};

use crate::error::{fail, Error, PromiseError};
use crate::executor::Runtime;
use crate::promise::Promise;

use super::{latched, lock, observe, Latch};

/// Positional slots of one tuple aggregate
struct Collector<S, O> {
    slots: Mutex<(S, usize)>,
    finish: fn(&mut S) -> Option<O>,
    latch: Arc<Latch<O>>,
}

impl<S, O> Collector<S, O>
where
    O: Send + Sync + 'static,
{
    fn new(slots: S, count: usize, finish: fn(&mut S) -> Option<O>, latch: Arc<Latch<O>>) -> Self {
        Self {
            slots: Mutex::new((slots, count)),
            finish,
            latch,
        }
    }

    fn fill(&self, write: impl FnOnce(&mut S)) {
        if self.latch.is_settled() {
            return;
        }

        let output = {
            let mut slots = lock(&self.slots);
            write(&mut slots.0);
            slots.1 -= 1;
            if slots.1 > 0 {
                return;
            }
            (self.finish)(&mut slots.0)
        };

        match output {
            Some(output) => self.latch.settle(Ok(output)),
            None => self
                .latch
                .settle(fail(PromiseError::UnhandledPath("all_of collector"))),
        };
    }

    fn fail(&self, error: Error) {
        self.latch.settle(fail(error));
    }
}

/// A tuple of promises that can be awaited together
pub trait PromiseTuple {
    type Output: Send + Sync + 'static;

    fn all(self) -> Promise<Self::Output>;
}

/// Resolve with a tuple of every value, in argument order
///
/// The first input to fail settles the result: typed rejections travel on as
/// opaque errors carrying the rejected value. A consumed input counts as
/// resolved with its type's default value.
pub fn all_of<P: PromiseTuple>(promises: P) -> Promise<P::Output> {
    promises.all()
}

macro_rules! tuple_all {
    ($count:expr; $($name:ident : $idx:tt),+) => {
        impl<$($name),+> PromiseTuple for ($(Promise<$name>,)+)
        where
            $($name: Default + Send + Sync + 'static,)+
        {
            type Output = ($($name,)+);

            fn all(self) -> Promise<Self::Output> {
                let runtime: Runtime = self.0.runtime().clone();
                let (latch, result) = latched::<Self::Output>(runtime);
                let collector = Arc::new(Collector::<_, Self::Output>::new(
                    ($(None::<$name>,)+),
                    $count,
                    |slots: &mut ($(Option<$name>,)+)| Some(($(slots.$idx.take()?,)+)),
                    latch,
                ));

                $(
                    let promise: Promise<$name> = self.$idx;
                    if promise.valid() {
                        let on_resolve = collector.clone();
                        let on_reject = collector.clone();
                        let on_error = collector.clone();
                        observe(
                            promise,
                            move |value| on_resolve.fill(move |slots| slots.$idx = Some(value)),
                            move |value| on_reject.fail(Error::from_value(value)),
                            move |error| on_error.fail(error),
                        );
                    } else {
                        collector.fill(|slots| slots.$idx = Some(<$name as Default>::default()));
                    }
                )+

                result
            }
        }
    };
}

tuple_all!(1; A: 0);
tuple_all!(2; A: 0, B: 1);
tuple_all!(3; A: 0, B: 1, C: 2);
tuple_all!(4; A: 0, B: 1, C: 2, D: 3);
tuple_all!(5; A: 0, B: 1, C: 2, D: 3, E: 4);
tuple_all!(6; A: 0, B: 1, C: 2, D: 3, E: 4, F: 5);
tuple_all!(7; A: 0, B: 1, C: 2, D: 3, E: 4, F: 5, G: 6);
tuple_all!(8; A: 0, B: 1, C: 2, D: 3, E: 4, F: 5, G: 6, H: 7);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::reject;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_all_of_heterogeneous_values() {
        let runtime = Runtime::new();
        let first = runtime.spawn(|| {
            thread::sleep(Duration::from_millis(20));
            Ok(1i32)
        });
        let second = runtime.spawn(|| Ok(9i64));
        let third = runtime.resolved(String::from("x"));

        let (a, b, c) = all_of((first, second, third)).get().ok().unwrap();
        assert_eq!(i64::from(a) + b, 10);
        assert_eq!(c, "x");
    }

    #[test]
    fn test_all_of_typed_rejection_becomes_error() {
        let runtime = Runtime::new();
        let first = runtime.resolved(1i32);
        let second = runtime.spawn(|| reject(115i32));

        let error = all_of((first, second)).get().unwrap_err().error().unwrap();
        assert_eq!(error.downcast_ref::<i32>(), Some(&115));
    }

    #[test]
    fn test_all_of_consumed_input_defaults() {
        let runtime = Runtime::new();
        let mut consumed = runtime.resolved(5u32);
        let _next = consumed.then(Ok);

        let values = all_of((consumed, runtime.resolved(true))).get().ok();
        assert_eq!(values, Some((0u32, true)));
    }

    #[test]
    fn test_all_of_single() {
        let runtime = Runtime::new();
        assert_eq!(all_of((runtime.resolved('z'),)).get().ok(), Some(('z',)));
    }
}
