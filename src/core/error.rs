// src/core/error.rs

use crate::core::models::{ModuleKind, ScanStatus};

/// A scanner could not produce findings at all.
#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    #[error("invalid target URL {0:?}")]
    InvalidTarget(String),

    #[error("target URL has no host: {0}")]
    MissingHost(String),

    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("{module} scanner failed: {reason}")]
    Module { module: ModuleKind, reason: String },
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("result store unavailable: {0}")]
    Unavailable(String),

    #[error("{module} result for scan {scan_id} is already persisted")]
    AlreadyPersisted { scan_id: String, module: ModuleKind },

    #[error("scan {scan_id} is {stored}; refusing to record it as {requested}")]
    StaleState {
        scan_id: String,
        stored: ScanStatus,
        requested: ScanStatus,
    },
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SinkError {
    #[error("progress destination for scan {0} has gone away")]
    Disconnected(String),

    #[error("progress sink rejected event: {0}")]
    Rejected(String),
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum JobError {
    #[error("job queue is closed")]
    QueueClosed,
}

#[derive(Debug, thiserror::Error)]
pub enum OrchestrationError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("illegal scan state transition {from} -> {to}")]
    IllegalTransition { from: ScanStatus, to: ScanStatus },
}

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("failed to write report: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to serialize report: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("no report available for scan {0}")]
    UnknownScan(String),
}
