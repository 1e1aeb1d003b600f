//! Stopping the engine

use crate::common::*;
use callqueue::executor::api::ExecutorOptions;
use callqueue::queue::api::{CallRequest, DrainReport, QueueError};
use serde_json::json;

#[tokio::test]
async fn test_stop_cancels_outstanding_calls() {
    let harness = Harness::without_executor("cancel");
    let first = harness.call("o1", "echo", json!(1)).await;
    let second = harness.call("o2", "echo", json!(2)).await;

    let report = within(harness.engine.stop()).await.unwrap();
    assert_eq!(report.rejected, 2);
    assert!(report.stop_signals_sent >= 1);
    assert_eq!(report.collectors_remaining, 0);
    assert_eq!(harness.engine.collector_concurrency(), 0);

    for call in [first, second] {
        let err = within(call).await.unwrap_err();
        assert!(err.is_cancelled(), "expected cancellation, got {}", err);
    }
    assert!(harness.sink.contains(log::Level::Info, "Cancelled 2 pending call(s)"));
}

#[tokio::test]
async fn test_stop_after_all_results_rejects_nothing() {
    let harness = Harness::start("clean", ExecutorOptions::default());
    let call = harness.call("done", "square", json!(6)).await;
    assert_eq!(value(within(call).await), json!(36));

    let report = within(harness.engine.stop()).await.unwrap();
    assert_eq!(report.rejected, 0);
    assert_eq!(report.collectors_remaining, 0);

    // Second stop is a no-op
    assert_eq!(within(harness.engine.stop()).await.unwrap(), DrainReport::default());
    harness.shutdown().await;
}

#[tokio::test]
async fn test_enqueue_after_stop_fails() {
    let harness = Harness::without_executor("closed");
    within(harness.engine.stop()).await.unwrap();
    assert!(harness.engine.is_stopped());

    let err = harness
        .engine
        .enqueue_call_request(
            CallRequest::new("late", "echo", json!(null)),
            harness.backend.response_queue_id(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, QueueError::Stopped));
    assert!(harness.backend.requests().is_empty());
}

#[tokio::test]
async fn test_results_after_stop_are_not_delivered() {
    let harness = Harness::without_executor("late-result");
    let call = harness.call("x", "echo", json!(1)).await;
    within(harness.engine.stop()).await.unwrap();

    // A result arriving after the drain finds no collector and no ledger entry
    harness
        .backend
        .respond("x", json!({ "value": 1 }).to_string())
        .unwrap();
    assert!(within(call).await.unwrap_err().is_cancelled());
    assert_eq!(harness.engine.pending_count().unwrap(), 0);
}
