mod common;

use std::sync::Arc;
use std::time::{Duration, Instant};

use common::{HangingSink, Outcome, scanners};
use sitepulse_rs::core::events::{LogLevel, ProgressEvent};
use sitepulse_rs::core::models::ScanRequest;
use sitepulse_rs::core::orchestrator::Orchestrator;
use sitepulse_rs::core::sink::{ProgressReporter, ProgressSink, SinkRegistry, forward_events, forward_events_with_timeout};
use sitepulse_rs::core::store::MemoryStore;

#[tokio::test]
async fn test_forwarder_preserves_order_and_counts_deliveries() {
    let registry = Arc::new(SinkRegistry::new());
    let mut rx = registry.register("scan").await;
    let (reporter, events) = ProgressReporter::channel("dns");

    let forwarder = tokio::spawn(forward_events("scan".into(), events, registry.clone()));
    for i in 0..50 {
        reporter.info(format!("event {i}"));
    }
    drop(reporter);

    assert_eq!(forwarder.await.unwrap(), 50);
    for i in 0..50 {
        match rx.recv().await.unwrap() {
            ProgressEvent::Log { message, .. } => assert_eq!(message, format!("event {i}")),
            other => panic!("unexpected event {other:?}"),
        }
    }
}

#[tokio::test]
async fn test_events_for_other_scans_are_not_delivered() {
    let registry = SinkRegistry::new();
    let mut mine = registry.register("mine").await;

    registry
        .push("theirs", &ProgressEvent::log("seo", LogLevel::Info, "not for me"))
        .await
        .unwrap();
    registry
        .push("mine", &ProgressEvent::log("seo", LogLevel::Success, "for me"))
        .await
        .unwrap();

    let event = mine.recv().await.unwrap();
    assert!(matches!(event, ProgressEvent::Log { level: LogLevel::Success, .. }));
    assert!(mine.try_recv().is_err());
}

#[tokio::test]
async fn test_scan_completes_after_viewer_disconnects() {
    let registry = Arc::new(SinkRegistry::new());
    let store = Arc::new(MemoryStore::new());
    let viewer = registry.register("gone").await;
    drop(viewer);

    let orchestrator = Orchestrator::new(scanners([Outcome::Score(88); 5]), store.clone(), registry.clone());
    let state = orchestrator
        .run(&ScanRequest::with_id("gone", "example.com").unwrap())
        .await;

    assert_eq!(state.overall_score, Some(88));
    assert!(!registry.is_registered("gone").await);
    assert_eq!(store.module_results("gone").await.len(), 5);
}

#[tokio::test]
async fn test_stalled_sink_is_abandoned_after_one_timeout() {
    let (reporter, events) = ProgressReporter::channel("performance");
    for i in 0..20 {
        reporter.progress(i * 5, "ramping", None);
    }
    drop(reporter);

    let started = Instant::now();
    let delivered =
        forward_events_with_timeout("scan".into(), events, Arc::new(HangingSink), Duration::from_millis(50)).await;

    assert_eq!(delivered, 0);
    assert!(started.elapsed() < Duration::from_secs(1));
}
