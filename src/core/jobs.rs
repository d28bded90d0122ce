// src/core/jobs.rs

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::core::error::JobError;
use crate::core::models::{ScanRequest, ScanStatus};
use crate::core::orchestrator::Orchestrator;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Job {
    RunScan(ScanRequest),
    GenerateReport { scan_id: String },
}

/// Hands work to whatever executes scans. Delivery is at-least-once and jobs are not
/// deduplicated.
pub trait JobTrigger: Send + Sync {
    fn enqueue(&self, job: Job) -> Result<(), JobError>;
}

/// In-process job queue over an unbounded channel.
#[derive(Debug, Clone)]
pub struct JobQueue {
    tx: mpsc::UnboundedSender<Job>,
}

impl JobQueue {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Job>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn submit_scan(&self, request: ScanRequest) -> Result<(), JobError> {
        self.enqueue(Job::RunScan(request))
    }
}

impl JobTrigger for JobQueue {
    fn enqueue(&self, job: Job) -> Result<(), JobError> {
        debug!(?job, "Job enqueued.");
        self.tx.send(job).map_err(|_| JobError::QueueClosed)
    }
}

/// Consumes the job queue: each scan runs on its own task, and a scan that completes
/// queues its report job through the same trigger.
pub struct Worker {
    orchestrator: Arc<Orchestrator>,
    trigger: Arc<dyn JobTrigger>,
    reports: mpsc::UnboundedSender<String>,
}

impl Worker {
    pub fn new(
        orchestrator: Arc<Orchestrator>,
        trigger: Arc<dyn JobTrigger>,
        reports: mpsc::UnboundedSender<String>,
    ) -> Self {
        Self {
            orchestrator,
            trigger,
            reports,
        }
    }

    /// Runs until the queue is closed.
    pub async fn run(self, mut jobs: mpsc::UnboundedReceiver<Job>) {
        while let Some(job) = jobs.recv().await {
            match job {
                Job::RunScan(request) => {
                    info!(scan_id = %request.scan_id, "Received scan job.");
                    let orchestrator = self.orchestrator.clone();
                    let trigger = self.trigger.clone();
                    tokio::spawn(async move {
                        let state = orchestrator.run(&request).await;
                        if state.status == ScanStatus::Completed {
                            info!(scan_id = %state.scan_id, "Scan completed. Triggering report generation.");
                            if let Err(e) = trigger.enqueue(Job::GenerateReport {
                                scan_id: state.scan_id.clone(),
                            }) {
                                warn!(scan_id = %state.scan_id, error = %e, "Report job could not be queued.");
                            }
                        }
                    });
                }
                Job::GenerateReport { scan_id } => {
                    info!(scan_id = %scan_id, "Received report generation job.");
                    if self.reports.send(scan_id).is_err() {
                        warn!("Report consumer has gone away.");
                    }
                }
            }
        }
        debug!("Job queue closed; worker stopping.");
    }
}
