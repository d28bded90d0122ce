// src/core/events.rs

//! Progress events streamed while a scan runs.
//!
//! The wire shape is an internally tagged JSON object (`"type": "log"`, ...), the form
//! downstream consumers of the progress stream expect.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::Display;

use crate::core::models::{Grade, IssueCounts};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum LogLevel {
    Info,
    Success,
    Warning,
    Error,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PhaseStatus {
    Running,
}

/// Snapshot of a running load tier, recomputed from every sample on each report tick.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct LiveMetrics {
    pub active_users: usize,
    pub total_requests: u64,
    pub avg_response_time: f64,
    pub p50: f64,
    pub p95: f64,
    pub p99: f64,
    pub throughput: f64,
    pub error_rate: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProgressEvent {
    Log {
        phase: String,
        level: LogLevel,
        message: String,
        timestamp: DateTime<Utc>,
    },
    Progress {
        phase: String,
        progress_percent: u8,
        message: String,
        live_metrics: Option<LiveMetrics>,
        timestamp: DateTime<Utc>,
    },
    PhaseChange {
        phase: String,
        phase_index: usize,
        total_phases: usize,
        status: PhaseStatus,
    },
    ModuleComplete {
        phase: String,
        score: u8,
        grade: Grade,
        issues_count: IssueCounts,
    },
    ScanComplete {
        overall_score: u8,
        duration_seconds: Option<u64>,
        report_generating: bool,
    },
}

impl ProgressEvent {
    pub fn log(phase: &str, level: LogLevel, message: impl Into<String>) -> Self {
        ProgressEvent::Log {
            phase: phase.to_string(),
            level,
            message: message.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn progress(phase: &str, percent: u8, message: impl Into<String>, live_metrics: Option<LiveMetrics>) -> Self {
        ProgressEvent::Progress {
            phase: phase.to_string(),
            progress_percent: percent.min(100),
            message: message.into(),
            live_metrics,
            timestamp: Utc::now(),
        }
    }

    pub fn phase(&self) -> Option<&str> {
        match self {
            ProgressEvent::Log { phase, .. }
            | ProgressEvent::Progress { phase, .. }
            | ProgressEvent::PhaseChange { phase, .. }
            | ProgressEvent::ModuleComplete { phase, .. } => Some(phase),
            ProgressEvent::ScanComplete { .. } => None,
        }
    }

    /// The wire `type` tag.
    pub fn kind(&self) -> &'static str {
        match self {
            ProgressEvent::Log { .. } => "log",
            ProgressEvent::Progress { .. } => "progress",
            ProgressEvent::PhaseChange { .. } => "phase_change",
            ProgressEvent::ModuleComplete { .. } => "module_complete",
            ProgressEvent::ScanComplete { .. } => "scan_complete",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn phase_change_wire_shape() {
        let event = ProgressEvent::PhaseChange {
            phase: "dns".into(),
            phase_index: 1,
            total_phases: 5,
            status: PhaseStatus::Running,
        };
        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            json!({"type": "phase_change", "phase": "dns", "phase_index": 1, "total_phases": 5, "status": "running"})
        );
    }

    #[test]
    fn module_complete_wire_shape() {
        let event = ProgressEvent::ModuleComplete {
            phase: "ssl".into(),
            score: 96,
            grade: Grade::APlus,
            issues_count: IssueCounts { critical: 0, high: 1, medium: 0, low: 2 },
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "module_complete");
        assert_eq!(value["grade"], "A+");
        assert_eq!(value["issues_count"]["low"], 2);
    }

    #[test]
    fn log_level_and_kind() {
        let event = ProgressEvent::log("seo", LogLevel::Warning, "Sitemap missing");
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "log");
        assert_eq!(value["level"], "warning");
        assert!(value["timestamp"].is_string());
        assert_eq!(event.kind(), "log");
        assert_eq!(event.phase(), Some("seo"));
    }
}
