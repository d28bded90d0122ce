mod common;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::timeout;

use common::{Outcome, scanners};
use sitepulse_rs::core::events::ProgressEvent;
use sitepulse_rs::core::jobs::{Job, JobQueue, JobTrigger, Worker};
use sitepulse_rs::core::models::{ScanRequest, ScanStatus};
use sitepulse_rs::core::orchestrator::Orchestrator;
use sitepulse_rs::core::sink::SinkRegistry;
use sitepulse_rs::core::store::MemoryStore;

struct Harness {
    queue: JobQueue,
    registry: Arc<SinkRegistry>,
    store: Arc<MemoryStore>,
    reports: mpsc::UnboundedReceiver<String>,
}

fn start_worker(outcomes: [Outcome; 5]) -> Harness {
    let registry = Arc::new(SinkRegistry::new());
    let store = Arc::new(MemoryStore::new());
    let orchestrator = Arc::new(Orchestrator::new(scanners(outcomes), store.clone(), registry.clone()));
    let (queue, jobs) = JobQueue::new();
    let (report_tx, reports) = mpsc::unbounded_channel();
    tokio::spawn(Worker::new(orchestrator, Arc::new(queue.clone()), report_tx).run(jobs));
    Harness {
        queue,
        registry,
        store,
        reports,
    }
}

async fn wait_for_scan_complete(rx: &mut mpsc::UnboundedReceiver<ProgressEvent>) -> ProgressEvent {
    loop {
        let event = timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("scan timed out")
            .expect("progress stream closed");
        if event.kind() == "scan_complete" {
            return event;
        }
    }
}

#[tokio::test]
async fn test_completed_scan_triggers_report_job() {
    let mut harness = start_worker([Outcome::Score(90); 5]);
    let request = ScanRequest::with_id("job-1", "example.com").unwrap();
    let mut events = harness.registry.register("job-1").await;

    harness.queue.submit_scan(request).unwrap();

    let report_for = timeout(Duration::from_secs(5), harness.reports.recv()).await.unwrap();
    assert_eq!(report_for.as_deref(), Some("job-1"));

    let complete = wait_for_scan_complete(&mut events).await;
    assert!(matches!(
        complete,
        ProgressEvent::ScanComplete {
            overall_score: 90,
            report_generating: true,
            ..
        }
    ));
    let state = harness.store.scan_state("job-1").await.unwrap();
    assert_eq!(state.status, ScanStatus::Completed);
}

#[tokio::test]
async fn test_failed_scan_does_not_trigger_report_job() {
    let mut harness = start_worker([Outcome::Fail; 5]);
    let mut events = harness.registry.register("job-2").await;

    harness
        .queue
        .submit_scan(ScanRequest::with_id("job-2", "example.com").unwrap())
        .unwrap();

    wait_for_scan_complete(&mut events).await;
    // The scan is over; give the worker a moment to (not) queue a report.
    let report = timeout(Duration::from_millis(200), harness.reports.recv()).await;
    assert!(report.is_err());
    assert_eq!(
        harness.store.scan_state("job-2").await.map(|s| s.status),
        Some(ScanStatus::Failed)
    );
}

#[tokio::test]
async fn test_report_jobs_are_forwarded() {
    let mut harness = start_worker([Outcome::Score(50); 5]);
    harness
        .queue
        .enqueue(Job::GenerateReport {
            scan_id: "external".into(),
        })
        .unwrap();

    let forwarded = timeout(Duration::from_secs(1), harness.reports.recv()).await.unwrap();
    assert_eq!(forwarded.as_deref(), Some("external"));
}

#[tokio::test]
async fn test_enqueue_after_worker_gone_is_an_error() {
    let (queue, jobs) = JobQueue::new();
    drop(jobs);
    let result = queue.submit_scan(ScanRequest::new("example.com").unwrap());
    assert!(result.is_err());
}
