//! Result delivery through the full engine

use crate::common::*;
use callqueue::executor::api::ExecutorOptions;
use futures::future::join_all;
use serde_json::json;

#[tokio::test]
async fn test_each_call_gets_its_own_result() {
    let harness = Harness::start("resolve", ExecutorOptions::default());

    let mut calls = Vec::new();
    for i in 1..=20i64 {
        calls.push((i, harness.call(&format!("c{}", i), "square", json!(i)).await));
    }
    let results = within(join_all(
        calls
            .into_iter()
            .map(|(i, call)| async move { (i, call.await) }),
    ))
    .await;

    for (i, result) in results {
        assert_eq!(value(result), json!(i * i));
    }
    assert_eq!(harness.engine.pending_count().unwrap(), 0);
    harness.shutdown().await;
}

#[tokio::test]
async fn test_result_message_carries_call_id() {
    use callqueue::queue::api::{QueueMessage, CALL_ID_ATTRIBUTE};

    let harness = Harness::start("attrs", ExecutorOptions::default());
    let result = within(harness.call("tagged", "echo", json!({"k": "v"})).await)
        .await
        .unwrap();

    assert_eq!(result.message.attribute(CALL_ID_ATTRIBUTE), Some("tagged"));
    assert_eq!(result.value(), Some(&json!({"k": "v"})));
    assert!(result.remote_execution_end_time().is_some());
    harness.shutdown().await;
}

#[tokio::test]
async fn test_function_errors_are_results_not_failures() {
    let harness = Harness::start("errors", ExecutorOptions::default());

    let failed = within(harness.call("f1", "fail", json!("bad input")).await)
        .await
        .unwrap();
    assert!(failed.is_error());
    assert_eq!(failed.error(), Some("bad input"));

    let unknown = within(harness.call("f2", "cube", json!(3)).await)
        .await
        .unwrap();
    assert_eq!(unknown.error(), Some("unknown function 'cube'"));
    harness.shutdown().await;
}

#[tokio::test]
async fn test_duplicate_deliveries_resolve_once() {
    let harness = Harness::without_executor("dupes");
    let first = harness.call("d1", "square", json!(3)).await;
    let second = harness.call("d2", "square", json!(4)).await;

    // The first result is delivered twice; d2 keeps the collectors polling
    harness.backend.responses().duplicate_next_deliveries(1);
    harness
        .backend
        .respond("d1", json!({ "value": 9 }).to_string())
        .unwrap();
    assert_eq!(value(within(first).await), json!(9));

    harness
        .backend
        .respond("d2", json!({ "value": 16 }).to_string())
        .unwrap();
    assert_eq!(value(within(second).await), json!(16));

    assert!(harness
        .sink
        .contains(log::Level::Debug, "Discarding duplicate result for call d1"));
    assert_eq!(harness.engine.pending_count().unwrap(), 0);
    harness.shutdown().await;
}

#[tokio::test]
async fn test_collectors_scale_with_backlog() {
    let harness = Harness::with_executor(fast_backend("scale").with_batch_size(2), None, fast_settings());

    let mut calls = Vec::new();
    for i in 0..30 {
        calls.push(harness.call(&format!("s{}", i), "echo", json!(i)).await);
    }
    assert_eq!(harness.engine.collector_max_concurrency(), 2);

    // No await in this loop, so collectors see the whole backlog at once
    for i in 0..30 {
        harness
            .backend
            .respond(&format!("s{}", i), json!({ "value": i }).to_string())
            .unwrap();
    }
    let results = within(join_all(calls)).await;
    for (i, result) in results.into_iter().enumerate() {
        assert_eq!(value(result), json!(i));
    }

    // 30 pending on a full batch asks for 30 / 5 + 2 collectors, capped at 4
    assert!(harness
        .sink
        .contains(log::Level::Trace, "30 pending, collector ceiling 4"));
    assert!(harness.engine.collector_max_concurrency() <= 4);
    harness.shutdown().await;
}
