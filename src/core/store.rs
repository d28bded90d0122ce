// src/core/store.rs

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use crate::core::error::StoreError;
use crate::core::models::{ModuleResult, ScanReport, ScanState};

/// Where the orchestrator records scan progress and module results.
#[async_trait]
pub trait ResultStore: Send + Sync {
    /// Persists one module's result. A result is written at most once per scan and module.
    async fn persist_module_result(&self, result: ModuleResult) -> Result<(), StoreError>;

    /// Records the current status, phase and score of a scan. A write that would move the
    /// stored status backwards, or touch a terminal scan, is rejected.
    async fn update_scan_state(&self, state: &ScanState) -> Result<(), StoreError>;
}

/// In-process store backing the terminal front-end and the report exporter.
#[derive(Debug, Default)]
pub struct MemoryStore {
    scans: RwLock<HashMap<String, ScanState>>,
    results: RwLock<HashMap<String, Vec<ModuleResult>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn scan_state(&self, scan_id: &str) -> Option<ScanState> {
        self.scans.read().await.get(scan_id).cloned()
    }

    pub async fn module_results(&self, scan_id: &str) -> Vec<ModuleResult> {
        self.results.read().await.get(scan_id).cloned().unwrap_or_default()
    }

    /// The scan state with every persisted module result, in persistence order.
    pub async fn report(&self, scan_id: &str) -> Option<ScanReport> {
        let scan = self.scan_state(scan_id).await?;
        Some(ScanReport {
            scan,
            modules: self.module_results(scan_id).await,
        })
    }
}

#[async_trait]
impl ResultStore for MemoryStore {
    async fn persist_module_result(&self, result: ModuleResult) -> Result<(), StoreError> {
        let mut results = self.results.write().await;
        let entries = results.entry(result.scan_id.clone()).or_default();
        if entries.iter().any(|existing| existing.module == result.module) {
            return Err(StoreError::AlreadyPersisted {
                scan_id: result.scan_id,
                module: result.module,
            });
        }
        debug!(scan_id = %result.scan_id, module = %result.module, score = result.score, "Module result stored.");
        entries.push(result);
        Ok(())
    }

    async fn update_scan_state(&self, state: &ScanState) -> Result<(), StoreError> {
        let mut scans = self.scans.write().await;
        if let Some(stored) = scans.get(&state.scan_id) {
            let same_phase_update = stored.status == state.status && !stored.status.is_terminal();
            if !same_phase_update && !stored.status.can_transition_to(state.status) {
                return Err(StoreError::StaleState {
                    scan_id: state.scan_id.clone(),
                    stored: stored.status,
                    requested: state.status,
                });
            }
        }
        scans.insert(state.scan_id.clone(), state.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::core::models::{Grade, IssueCounts, ModuleKind, ScanRequest, ScanStatus};

    fn result(scan_id: &str, module: ModuleKind, score: u8) -> ModuleResult {
        ModuleResult {
            scan_id: scan_id.into(),
            module,
            score,
            grade: Grade::from_score(score),
            raw_findings: serde_json::json!({"score": score}),
            issue_counts: IssueCounts::default(),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn module_results_are_written_once() {
        let store = MemoryStore::new();
        store.persist_module_result(result("s1", ModuleKind::Dns, 90)).await.unwrap();
        store.persist_module_result(result("s1", ModuleKind::Seo, 70)).await.unwrap();

        let duplicate = store.persist_module_result(result("s1", ModuleKind::Dns, 10)).await;
        assert!(matches!(duplicate, Err(StoreError::AlreadyPersisted { module: ModuleKind::Dns, .. })));

        let stored = store.module_results("s1").await;
        assert_eq!(stored.len(), 2);
        assert_eq!(stored[0].score, 90);
        assert!(store.module_results("other").await.is_empty());
    }

    #[tokio::test]
    async fn terminal_scan_state_is_not_overwritten() {
        let store = MemoryStore::new();
        let request = ScanRequest::with_id("s3", "https://example.com").unwrap();
        let mut state = ScanState::new(&request);
        state.start().unwrap();
        store.update_scan_state(&state).await.unwrap();
        state.enter_phase("dns").unwrap();
        store.update_scan_state(&state).await.unwrap();
        state.complete(90).unwrap();
        store.update_scan_state(&state).await.unwrap();

        let mut rerun = ScanState::new(&request);
        rerun.start().unwrap();
        let rejected = store.update_scan_state(&rerun).await;
        assert!(matches!(
            rejected,
            Err(StoreError::StaleState {
                stored: ScanStatus::Completed,
                requested: ScanStatus::Running,
                ..
            })
        ));

        let mut failed = rerun.clone();
        failed.fail(0).unwrap();
        assert!(store.update_scan_state(&failed).await.is_err());

        let stored = store.scan_state("s3").await.unwrap();
        assert_eq!(stored.status, ScanStatus::Completed);
        assert_eq!(stored.overall_score, Some(90));
    }

    #[tokio::test]
    async fn report_combines_state_and_results() {
        let store = MemoryStore::new();
        let request = ScanRequest::with_id("s2", "https://example.com").unwrap();
        let mut state = ScanState::new(&request);
        assert!(store.report("s2").await.is_none());

        state.start().unwrap();
        store.update_scan_state(&state).await.unwrap();
        store.persist_module_result(result("s2", ModuleKind::Ssl, 88)).await.unwrap();

        let report = store.report("s2").await.unwrap();
        assert_eq!(report.scan.current_phase.as_deref(), Some("starting"));
        assert_eq!(report.modules.len(), 1);
    }
}
