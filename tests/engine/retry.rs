//! Recovery of lost invocations through the retry ticker

use crate::common::*;
use callqueue::executor::api::ExecutorOptions;
use callqueue::queue::api::{CallRequest, QueueError};
use futures::future::join_all;
use serde_json::json;

#[tokio::test]
async fn test_dropped_invocations_are_republished() {
    let harness = Harness::start(
        "dropped",
        ExecutorOptions {
            workers: 1,
            drop_invocations: 2,
            ..Default::default()
        },
    );

    let mut calls = Vec::new();
    for i in 1..=3i64 {
        calls.push(harness.call(&format!("r{}", i), "square", json!(i)).await);
    }
    let results = within(join_all(calls)).await;
    let values: Vec<_> = results.into_iter().map(value).collect();
    assert_eq!(values, vec![json!(1), json!(4), json!(9)]);

    assert_eq!(harness.executor().dropped(), 2);
    assert!(harness.executor().invocations() >= 5);
    assert!(harness.sink.contains(log::Level::Info, "Re-published call r1"));
    assert!(harness.sink.contains(log::Level::Info, "Re-published call r2"));
    harness.shutdown().await;
}

#[tokio::test]
async fn test_started_calls_are_not_republished() {
    let harness = Harness::start("started", ExecutorOptions::default());

    // Runs well past the retry grace period
    let result = within(harness.call("long", "slow", json!({ "ms": 400 })).await).await;
    assert_eq!(value(result)["ms"], json!(400));

    assert_eq!(harness.executor().invocations(), 1);
    assert!(!harness.sink.contains(log::Level::Info, "Re-published call long"));
    harness.shutdown().await;
}

#[tokio::test]
async fn test_failed_publish_is_retried() {
    let harness = Harness::start("flaky", ExecutorOptions::default());
    harness.backend.requests().fail_next_publishes(1);

    let err = harness
        .engine
        .enqueue_call_request(
            CallRequest::new("lost", "echo", json!("hello")),
            harness.backend.response_queue_id(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, QueueError::Backend(_)));
    assert_eq!(harness.engine.pending_count().unwrap(), 1);

    // The retry ticker publishes it again and the result drains the entry
    assert!(eventually(|| harness.engine.pending_count().unwrap() == 0).await);
    assert!(harness.executor().completed() >= 1);
    assert!(harness.sink.contains(log::Level::Info, "Re-published call lost"));
    harness.shutdown().await;
}

#[tokio::test]
async fn test_large_backlog_disables_retries() {
    // retry-max-pending defaults to 10: with 12 unanswered calls nothing is re-sent
    let harness = Harness::without_executor("backlog");
    let mut calls = Vec::new();
    for i in 0..12 {
        calls.push(harness.call(&format!("b{}", i), "echo", json!(i)).await);
    }
    tokio::time::sleep(fast_settings().retry_interval * 4).await;

    assert_eq!(harness.backend.requests().size(), 12);
    assert!(!harness.sink.contains(log::Level::Info, "Re-published"));
    harness.shutdown().await;
    for call in calls {
        assert!(within(call).await.unwrap_err().is_cancelled());
    }
}
