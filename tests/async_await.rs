//! Promises awaited from an async runtime

mod common;

use common::setup_tracing;
use rust_pro::*;
use std::thread;
use std::time::Duration;

#[tokio::test]
async fn test_promise_can_be_awaited() {
    setup_tracing();
    let runtime = Runtime::new();
    let mut promise = runtime.spawn(|| {
        thread::sleep(Duration::from_millis(20));
        Ok(20)
    });

    let outcome = promise.then(|v| Ok(v + 1)).await;
    assert_eq!(outcome.ok(), Some(21));
}

#[tokio::test]
async fn test_awaited_rejection_keeps_its_channel() {
    let runtime = Runtime::new();
    let outcome = runtime.spawn(|| reject(String::from("no"))).await;
    assert!(matches!(outcome, Err(Rejection::Value(ref v)) if v == "no"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_await_many_promises_concurrently() {
    let runtime = Runtime::new();
    let promises: Vec<_> = (0..8u64)
        .map(|i| {
            runtime.spawn(move || {
                thread::sleep(Duration::from_millis(10 * (8 - i)));
                Ok(i)
            })
        })
        .collect();

    let outcomes = futures::future::join_all(promises.into_iter().map(Promise::into_handle)).await;
    let values: Vec<u64> = outcomes.into_iter().filter_map(Result::ok).collect();
    assert_eq!(values, (0..8).collect::<Vec<_>>());
}

#[test]
fn test_block_on_with_futures_executor() {
    let runtime = Runtime::new();
    let handle = runtime.spawn(|| Ok('x')).into_handle();
    assert_eq!(futures::executor::block_on(handle).ok(), Some('x'));
}
