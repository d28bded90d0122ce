mod common;

use std::sync::Arc;

use common::{Outcome, RecordingSink, scanners};
use sitepulse_rs::core::error::ExportError;
use sitepulse_rs::core::export::{export_report, export_scan};
use sitepulse_rs::core::models::ScanRequest;
use sitepulse_rs::core::orchestrator::Orchestrator;
use sitepulse_rs::core::store::MemoryStore;

#[tokio::test]
async fn test_export_writes_state_and_module_results() {
    let store = Arc::new(MemoryStore::new());
    let orchestrator = Orchestrator::new(
        scanners([
            Outcome::Score(95),
            Outcome::Score(85),
            Outcome::Fail,
            Outcome::Score(75),
            Outcome::Score(65),
        ]),
        store.clone(),
        Arc::new(RecordingSink::default()),
    );
    orchestrator
        .run(&ScanRequest::with_id("export-1", "https://example.com").unwrap())
        .await;

    let dir = tempfile::tempdir().unwrap();
    let path = export_scan(&store, "export-1", dir.path()).await.unwrap();
    assert_eq!(path.file_name().unwrap(), "scan-export-1.json");

    let written: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(written["scan"]["scan_id"], "export-1");
    assert_eq!(written["scan"]["status"], "completed");
    assert_eq!(written["scan"]["overall_score"], 80);
    let modules = written["modules"].as_array().unwrap();
    assert_eq!(modules.len(), 4);
    assert_eq!(modules[0]["module"], "dns");
    assert_eq!(modules[0]["grade"], "A+");
}

#[tokio::test]
async fn test_export_of_unknown_scan_fails() {
    let store = MemoryStore::new();
    let dir = tempfile::tempdir().unwrap();
    let result = export_scan(&store, "missing", dir.path()).await;
    assert!(matches!(result, Err(ExportError::UnknownScan(id)) if id == "missing"));
}

#[tokio::test]
async fn test_export_creates_missing_directories() {
    let store = Arc::new(MemoryStore::new());
    let orchestrator = Orchestrator::new(
        scanners([Outcome::Score(70); 5]),
        store.clone(),
        Arc::new(RecordingSink::default()),
    );
    orchestrator
        .run(&ScanRequest::with_id("export-2", "example.com").unwrap())
        .await;

    let dir = tempfile::tempdir().unwrap();
    let nested = dir.path().join("reports").join("2026");
    let report = store.report("export-2").await.unwrap();
    let path = export_report(&report, &nested).unwrap();
    assert!(path.starts_with(&nested));
    assert!(path.exists());
}
