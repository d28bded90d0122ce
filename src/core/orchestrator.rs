// src/core/orchestrator.rs

//! Runs the scanners of one scan in order and owns its state machine.
//!
//! A failing or panicking scanner only removes its module from the aggregate. Store
//! failures are fatal for the scan and force it into `Failed`.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use chrono::Utc;
use futures::FutureExt;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::core::error::{OrchestrationError, ScanError};
use crate::core::events::{PhaseStatus, ProgressEvent};
use crate::core::models::{ModuleResult, ScanRequest, ScanState};
use crate::core::scanner::{ModuleFindings, Scanner};
use crate::core::sink::{forward_events, ProgressReporter, ProgressSink};
use crate::core::store::ResultStore;

pub const ORCHESTRATOR_PHASE: &str = "orchestrator";

pub struct Orchestrator {
    scanners: Vec<Box<dyn Scanner>>,
    store: Arc<dyn ResultStore>,
    sink: Arc<dyn ProgressSink>,
}

impl Orchestrator {
    pub fn new(scanners: Vec<Box<dyn Scanner>>, store: Arc<dyn ResultStore>, sink: Arc<dyn ProgressSink>) -> Self {
        Self { scanners, store, sink }
    }

    /// Runs the scan to a terminal state and returns it. By the time this returns every
    /// event has been handed to the sink, unless a push stalled and the sink was given up on.
    pub async fn run(&self, request: &ScanRequest) -> ScanState {
        let (tx, rx) = mpsc::unbounded_channel();
        let forwarder = tokio::spawn(forward_events(request.scan_id.clone(), rx, self.sink.clone()));
        let reporter = ProgressReporter::new(ORCHESTRATOR_PHASE, tx);

        let mut state = ScanState::new(request);
        if let Err(e) = self.execute(&mut state, &reporter).await {
            error!(scan_id = %request.scan_id, error = %e, "Critical orchestration error.");
            self.abort(&mut state, &reporter).await;
        }

        drop(reporter);
        match forwarder.await {
            Ok(delivered) => info!(scan_id = %request.scan_id, delivered, "Progress stream closed."),
            Err(e) => warn!(scan_id = %request.scan_id, error = %e, "Progress forwarder stopped abnormally."),
        }
        state
    }

    async fn execute(&self, state: &mut ScanState, reporter: &ProgressReporter) -> Result<(), OrchestrationError> {
        info!(scan_id = %state.scan_id, target = %state.target, "Starting orchestration.");
        state.start()?;
        self.store.update_scan_state(state).await?;

        let total_phases = self.scanners.len();
        let mut total_score: u32 = 0;
        let mut successful_modules: u32 = 0;

        for (index, scanner) in self.scanners.iter().enumerate() {
            let module = scanner.module();
            let phase = module.as_ref();
            info!(scan_id = %state.scan_id, module = phase, "Starting module.");

            state.enter_phase(phase)?;
            self.store.update_scan_state(state).await?;
            reporter.emit(ProgressEvent::PhaseChange {
                phase: phase.to_string(),
                phase_index: index + 1,
                total_phases,
                status: PhaseStatus::Running,
            });

            let module_reporter = reporter.for_phase(phase);
            let findings = match run_guarded(scanner.as_ref(), state, &module_reporter).await {
                Ok(findings) => findings,
                Err(e) => {
                    error!(scan_id = %state.scan_id, module = phase, error = %e, "Module failed.");
                    module_reporter.error(format!("Module failed: {e}"));
                    continue;
                }
            };

            let score = scanner.calculate_score(&findings).min(100);
            let grade = scanner.calculate_grade(&findings, score);
            let issues_count = findings.issue_counts();
            self.store
                .persist_module_result(ModuleResult {
                    scan_id: state.scan_id.clone(),
                    module,
                    score,
                    grade,
                    raw_findings: findings.to_raw(score, grade),
                    issue_counts: issues_count,
                    created_at: Utc::now(),
                })
                .await?;

            total_score += u32::from(score);
            successful_modules += 1;
            reporter.emit(ProgressEvent::ModuleComplete {
                phase: phase.to_string(),
                score,
                grade,
                issues_count,
            });
        }

        // Terminal transitions are committed locally only once the store accepted them,
        // so a store failure here can still fall back to Failed.
        let mut finished = state.clone();
        if successful_modules > 0 {
            let overall_score = (total_score / successful_modules) as u8;
            finished.complete(overall_score)?;
            self.store.update_scan_state(&finished).await?;
            *state = finished;
            info!(scan_id = %state.scan_id, overall_score, "Scan completed.");
        } else {
            finished.fail(0)?;
            self.store.update_scan_state(&finished).await?;
            *state = finished;
            error!(scan_id = %state.scan_id, "Scan failed: all modules failed.");
        }

        reporter.emit(ProgressEvent::ScanComplete {
            overall_score: state.overall_score.unwrap_or(0),
            duration_seconds: state.duration_seconds,
            report_generating: successful_modules > 0,
        });
        Ok(())
    }

    /// Forces the scan into `Failed` after an error escaped the module sequence.
    async fn abort(&self, state: &mut ScanState, reporter: &ProgressReporter) {
        if !state.status.is_terminal() {
            let mut failed = state.clone();
            match failed.fail(state.overall_score.unwrap_or(0)) {
                Ok(()) => {
                    if let Err(e) = self.store.update_scan_state(&failed).await {
                        warn!(scan_id = %state.scan_id, error = %e, "Could not persist failed scan state.");
                    }
                    *state = failed;
                }
                Err(e) => warn!(scan_id = %state.scan_id, error = %e, "Scan could not be marked failed."),
            }
        }
        reporter.for_phase(ORCHESTRATOR_PHASE).error("Critical orchestration failure.");
    }
}

/// Runs a scanner with panics turned into module failures.
async fn run_guarded(
    scanner: &dyn Scanner,
    state: &ScanState,
    reporter: &ProgressReporter,
) -> Result<ModuleFindings, ScanError> {
    match AssertUnwindSafe(scanner.run(&state.target, reporter)).catch_unwind().await {
        Ok(result) => result,
        Err(_) => Err(ScanError::Module {
            module: scanner.module(),
            reason: "scanner panicked".to_string(),
        }),
    }
}
