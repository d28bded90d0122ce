#![allow(dead_code)]

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use url::Url;

use sitepulse_rs::core::error::{ScanError, SinkError};
use sitepulse_rs::core::events::ProgressEvent;
use sitepulse_rs::core::models::{AnalysisFinding, DnsFindings, ModuleKind, Severity};
use sitepulse_rs::core::scanner::{ModuleFindings, Scanner};
use sitepulse_rs::core::sink::{ProgressReporter, ProgressSink};

pub const MODULE_ORDER: [ModuleKind; 5] = [
    ModuleKind::Dns,
    ModuleKind::Ssl,
    ModuleKind::Performance,
    ModuleKind::Security,
    ModuleKind::Seo,
];

#[derive(Debug, Clone, Copy)]
pub enum Outcome {
    Score(u8),
    Fail,
    Panic,
}

/// Scanner with a scripted outcome. Successful runs report one low-severity finding.
pub struct MockScanner {
    module: ModuleKind,
    outcome: Outcome,
    delay: Duration,
}

impl MockScanner {
    pub fn new(module: ModuleKind, outcome: Outcome) -> Self {
        Self {
            module,
            outcome,
            delay: Duration::ZERO,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

#[async_trait]
impl Scanner for MockScanner {
    fn module(&self) -> ModuleKind {
        self.module
    }

    async fn run(&self, target: &Url, reporter: &ProgressReporter) -> Result<ModuleFindings, ScanError> {
        reporter.info(format!("{} running", self.module));
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        match self.outcome {
            Outcome::Score(_) => Ok(ModuleFindings::Dns(DnsFindings {
                hostname: target.host_str().unwrap_or_default().to_string(),
                analysis: vec![AnalysisFinding::new(Severity::Low, "DNS_IPV6_MISSING")],
                ..Default::default()
            })),
            Outcome::Fail => Err(ScanError::Module {
                module: self.module,
                reason: "scripted failure".into(),
            }),
            Outcome::Panic => panic!("scripted panic in {}", self.module),
        }
    }

    fn calculate_score(&self, _findings: &ModuleFindings) -> u8 {
        match self.outcome {
            Outcome::Score(score) => score,
            _ => 0,
        }
    }
}

/// Builds one scanner per module in orchestration order.
pub fn scanners(outcomes: [Outcome; 5]) -> Vec<Box<dyn Scanner>> {
    MODULE_ORDER
        .iter()
        .zip(outcomes)
        .map(|(module, outcome)| Box::new(MockScanner::new(*module, outcome)) as Box<dyn Scanner>)
        .collect()
}

/// Keeps every pushed event in order.
#[derive(Default)]
pub struct RecordingSink {
    pub events: Mutex<Vec<(String, ProgressEvent)>>,
}

impl RecordingSink {
    pub fn events(&self) -> Vec<ProgressEvent> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .map(|(_, event)| event.clone())
            .collect()
    }

    pub fn kinds(&self) -> Vec<&'static str> {
        self.events().iter().map(ProgressEvent::kind).collect()
    }
}

#[async_trait]
impl ProgressSink for RecordingSink {
    async fn push(&self, scan_id: &str, event: &ProgressEvent) -> Result<(), SinkError> {
        self.events.lock().unwrap().push((scan_id.to_string(), event.clone()));
        Ok(())
    }
}

/// Rejects every event.
pub struct FailingSink;

#[async_trait]
impl ProgressSink for FailingSink {
    async fn push(&self, _scan_id: &str, _event: &ProgressEvent) -> Result<(), SinkError> {
        Err(SinkError::Rejected("sink offline".into()))
    }
}

/// Never resolves a push.
pub struct HangingSink;

#[async_trait]
impl ProgressSink for HangingSink {
    async fn push(&self, _scan_id: &str, _event: &ProgressEvent) -> Result<(), SinkError> {
        std::future::pending().await
    }
}
