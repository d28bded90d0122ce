mod common;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use common::{FailingSink, HangingSink, MODULE_ORDER, Outcome, RecordingSink, scanners};
use sitepulse_rs::core::error::StoreError;
use sitepulse_rs::core::events::{LogLevel, ProgressEvent};
use sitepulse_rs::core::models::{Grade, ModuleKind, ModuleResult, ScanRequest, ScanState, ScanStatus};
use sitepulse_rs::core::orchestrator::{ORCHESTRATOR_PHASE, Orchestrator};
use sitepulse_rs::core::store::{MemoryStore, ResultStore};

fn request(id: &str) -> ScanRequest {
    ScanRequest::with_id(id, "https://example.com").unwrap()
}

#[tokio::test]
async fn test_overall_score_averages_successful_modules() {
    let store = Arc::new(MemoryStore::new());
    let sink = Arc::new(RecordingSink::default());
    let orchestrator = Orchestrator::new(
        scanners([
            Outcome::Score(80),
            Outcome::Fail,
            Outcome::Score(60),
            Outcome::Fail,
            Outcome::Score(70),
        ]),
        store.clone(),
        sink.clone(),
    );

    let state = orchestrator.run(&request("scan-1")).await;

    assert_eq!(state.status, ScanStatus::Completed);
    assert_eq!(state.overall_score, Some(70));
    assert!(state.started_at.is_some());
    assert!(state.completed_at.is_some());
    assert_eq!(store.scan_state("scan-1").await, Some(state));

    let results = store.module_results("scan-1").await;
    let modules: Vec<ModuleKind> = results.iter().map(|r| r.module).collect();
    assert_eq!(modules, [ModuleKind::Dns, ModuleKind::Performance, ModuleKind::Seo]);
    assert_eq!(results[0].grade, Grade::B);
    assert_eq!(results[0].issue_counts.low, 1);
    assert_eq!(results[0].raw_findings["score"], 80);

    let failures: Vec<String> = sink
        .events()
        .into_iter()
        .filter_map(|event| match event {
            ProgressEvent::Log {
                phase,
                level: LogLevel::Error,
                message,
                ..
            } if message.starts_with("Module failed") => Some(phase),
            _ => None,
        })
        .collect();
    assert_eq!(failures, ["ssl", "security"]);
}

#[tokio::test]
async fn test_all_modules_failing_fails_the_scan() {
    let store = Arc::new(MemoryStore::new());
    let sink = Arc::new(RecordingSink::default());
    let orchestrator = Orchestrator::new(scanners([Outcome::Fail; 5]), store.clone(), sink.clone());

    let state = orchestrator.run(&request("scan-2")).await;

    assert_eq!(state.status, ScanStatus::Failed);
    assert_eq!(state.overall_score, Some(0));
    assert!(store.module_results("scan-2").await.is_empty());
    assert_eq!(
        sink.events().last(),
        Some(&ProgressEvent::ScanComplete {
            overall_score: 0,
            duration_seconds: state.duration_seconds,
            report_generating: false,
        })
    );
}

#[tokio::test]
async fn test_events_are_ordered_and_scan_complete_is_last() {
    let store = Arc::new(MemoryStore::new());
    let sink = Arc::new(RecordingSink::default());
    let orchestrator = Orchestrator::new(scanners([Outcome::Score(90); 5]), store, sink.clone());

    orchestrator.run(&request("scan-3")).await;

    let events = sink.events();
    let phase_changes: Vec<(String, usize, usize)> = events
        .iter()
        .filter_map(|event| match event {
            ProgressEvent::PhaseChange {
                phase,
                phase_index,
                total_phases,
                ..
            } => Some((phase.clone(), *phase_index, *total_phases)),
            _ => None,
        })
        .collect();
    let expected: Vec<(String, usize, usize)> = MODULE_ORDER
        .iter()
        .enumerate()
        .map(|(i, module)| (module.to_string(), i + 1, 5))
        .collect();
    assert_eq!(phase_changes, expected);

    // Every module's own events sit between its phase change and its completion.
    for module in MODULE_ORDER {
        let phase = module.to_string();
        let start = events
            .iter()
            .position(|e| matches!(e, ProgressEvent::PhaseChange { phase: p, .. } if *p == phase))
            .unwrap();
        let end = events
            .iter()
            .position(|e| matches!(e, ProgressEvent::ModuleComplete { phase: p, .. } if *p == phase))
            .unwrap();
        assert!(start < end);
        assert!(events[start..end].iter().skip(1).all(|e| e.phase() == Some(phase.as_str())));
    }

    assert_eq!(sink.kinds().iter().filter(|k| **k == "scan_complete").count(), 1);
    assert_eq!(sink.kinds().last(), Some(&"scan_complete"));
    assert!(sink.events.lock().unwrap().iter().all(|(id, _)| id == "scan-3"));
}

#[tokio::test]
async fn test_failing_sink_does_not_affect_the_scan() {
    let store = Arc::new(MemoryStore::new());
    let orchestrator = Orchestrator::new(
        scanners([Outcome::Score(100), Outcome::Score(50), Outcome::Fail, Outcome::Score(60), Outcome::Score(40)]),
        store.clone(),
        Arc::new(FailingSink),
    );

    let state = orchestrator.run(&request("scan-4")).await;

    assert_eq!(state.status, ScanStatus::Completed);
    assert_eq!(state.overall_score, Some(62));
    assert_eq!(store.module_results("scan-4").await.len(), 4);
}

#[tokio::test]
async fn test_hanging_sink_does_not_stall_the_scan() {
    let store = Arc::new(MemoryStore::new());
    let orchestrator = Orchestrator::new(scanners([Outcome::Score(90); 5]), store.clone(), Arc::new(HangingSink));

    let state = tokio::time::timeout(Duration::from_secs(10), orchestrator.run(&request("scan-hang")))
        .await
        .expect("run must return while the sink hangs");

    assert_eq!(state.status, ScanStatus::Completed);
    assert_eq!(state.overall_score, Some(90));
    assert_eq!(store.scan_state("scan-hang").await.map(|s| s.status), Some(ScanStatus::Completed));
}

#[tokio::test]
async fn test_rerunning_a_finished_scan_keeps_its_stored_result() {
    let store = Arc::new(MemoryStore::new());
    let sink = Arc::new(RecordingSink::default());
    let orchestrator = Orchestrator::new(scanners([Outcome::Score(90); 5]), store.clone(), sink.clone());

    let first = orchestrator.run(&request("dup")).await;
    assert_eq!(first.status, ScanStatus::Completed);

    let second = orchestrator.run(&request("dup")).await;
    assert_eq!(second.status, ScanStatus::Failed);

    let stored = store.scan_state("dup").await.unwrap();
    assert_eq!(stored.status, ScanStatus::Completed);
    assert_eq!(stored.overall_score, Some(90));
    assert_eq!(store.module_results("dup").await.len(), 5);
    assert_eq!(sink.kinds().iter().filter(|k| **k == "scan_complete").count(), 1);
}

#[tokio::test]
async fn test_panicking_scanner_is_isolated() {
    let store = Arc::new(MemoryStore::new());
    let sink = Arc::new(RecordingSink::default());
    let orchestrator = Orchestrator::new(
        scanners([
            Outcome::Score(90),
            Outcome::Panic,
            Outcome::Score(70),
            Outcome::Score(80),
            Outcome::Score(60),
        ]),
        store.clone(),
        sink.clone(),
    );

    let state = orchestrator.run(&request("scan-5")).await;

    assert_eq!(state.status, ScanStatus::Completed);
    assert_eq!(state.overall_score, Some(75));
    assert!(
        store
            .module_results("scan-5")
            .await
            .iter()
            .all(|r| r.module != ModuleKind::Ssl)
    );
    assert!(sink.events().iter().any(|event| matches!(
        event,
        ProgressEvent::Log { phase, level: LogLevel::Error, .. } if phase == "ssl"
    )));
}

/// Accepts the scan state but refuses module results.
struct BrokenStore {
    inner: MemoryStore,
}

#[async_trait]
impl ResultStore for BrokenStore {
    async fn persist_module_result(&self, _result: ModuleResult) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("disk full".into()))
    }

    async fn update_scan_state(&self, state: &ScanState) -> Result<(), StoreError> {
        self.inner.update_scan_state(state).await
    }
}

#[tokio::test]
async fn test_store_failure_forces_failed_state() {
    let store = Arc::new(BrokenStore {
        inner: MemoryStore::new(),
    });
    let sink = Arc::new(RecordingSink::default());
    let orchestrator = Orchestrator::new(scanners([Outcome::Score(90); 5]), store.clone(), sink.clone());

    let state = orchestrator.run(&request("scan-6")).await;

    assert_eq!(state.status, ScanStatus::Failed);
    assert_eq!(store.inner.scan_state("scan-6").await.map(|s| s.status), Some(ScanStatus::Failed));
    let last = sink.events().pop().unwrap();
    assert!(matches!(
        last,
        ProgressEvent::Log { ref phase, level: LogLevel::Error, ref message, .. }
            if phase == ORCHESTRATOR_PHASE && message == "Critical orchestration failure."
    ));
    assert!(!sink.kinds().contains(&"scan_complete"));
}
