// src/core/scanner/mod.rs

// Public interface of the `scanner` module: the scanner contract, the findings
// envelope shared by the five modules, and the modules themselves.
pub mod dns_scanner;
pub mod load_generator;
pub mod performance_scanner;
pub mod security_scanner;
pub mod seo_scanner;
pub mod ssl_scanner;
pub mod tls_probe;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::redirect::Policy;
use serde::Serialize;
use url::Url;

use crate::config::ScanConfig;
use crate::core::error::ScanError;
use crate::core::models::{
    AnalysisFinding, DnsFindings, Grade, IssueCounts, ModuleKind, PerformanceFindings, SecurityFindings,
    SeoFindings, TlsFindings,
};
use crate::core::sink::ProgressReporter;

use self::dns_scanner::DnsScanner;
use self::performance_scanner::PerformanceScanner;
use self::security_scanner::SecurityScanner;
use self::seo_scanner::SeoScanner;
use self::ssl_scanner::SslScanner;

/// Structured findings of one module.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum ModuleFindings {
    Dns(DnsFindings),
    Ssl(TlsFindings),
    Performance(PerformanceFindings),
    Security(SecurityFindings),
    Seo(SeoFindings),
}

impl ModuleFindings {
    pub fn module(&self) -> ModuleKind {
        match self {
            ModuleFindings::Dns(_) => ModuleKind::Dns,
            ModuleFindings::Ssl(_) => ModuleKind::Ssl,
            ModuleFindings::Performance(_) => ModuleKind::Performance,
            ModuleFindings::Security(_) => ModuleKind::Security,
            ModuleFindings::Seo(_) => ModuleKind::Seo,
        }
    }

    pub fn calculate_score(&self) -> u8 {
        match self {
            ModuleFindings::Dns(findings) => dns_scanner::calculate_score(findings),
            ModuleFindings::Ssl(findings) => ssl_scanner::calculate_score(findings),
            ModuleFindings::Performance(findings) => performance_scanner::calculate_score(findings),
            ModuleFindings::Security(findings) => security_scanner::calculate_score(findings),
            ModuleFindings::Seo(findings) => seo_scanner::calculate_score(findings),
        }
    }

    /// Only TLS deviates from the shared table.
    pub fn calculate_grade(&self, score: u8) -> Grade {
        match self {
            ModuleFindings::Ssl(findings) => ssl_scanner::calculate_grade(findings, score),
            _ => Grade::from_score(score),
        }
    }

    pub fn analysis(&self) -> &[AnalysisFinding] {
        match self {
            ModuleFindings::Dns(findings) => &findings.analysis,
            ModuleFindings::Ssl(findings) => &findings.analysis,
            ModuleFindings::Performance(findings) => &findings.analysis,
            ModuleFindings::Security(findings) => &findings.analysis,
            ModuleFindings::Seo(findings) => &findings.analysis,
        }
    }

    pub fn issue_counts(&self) -> IssueCounts {
        IssueCounts::from_findings(self.analysis())
    }

    /// Raw findings map with `score` and `grade` appended as the last keys.
    pub fn to_raw(&self, score: u8, grade: Grade) -> serde_json::Value {
        let mut raw = match serde_json::to_value(self) {
            Ok(serde_json::Value::Object(map)) => map,
            Ok(other) => {
                let mut map = serde_json::Map::new();
                map.insert("findings".to_string(), other);
                map
            }
            Err(e) => {
                let mut map = serde_json::Map::new();
                map.insert("error".to_string(), serde_json::Value::String(e.to_string()));
                map
            }
        };
        raw.insert("score".to_string(), score.into());
        raw.insert("grade".to_string(), grade.to_string().into());
        serde_json::Value::Object(raw)
    }
}

/// The contract every scan module implements.
///
/// `run` executes an ordered battery of probes. Each probe is fault-isolated: a failing
/// probe yields a default sub-result plus a log event and the run continues. A scanner
/// only returns `Err` when it cannot produce findings at all.
#[async_trait]
pub trait Scanner: Send + Sync {
    fn module(&self) -> ModuleKind;

    async fn run(&self, target: &Url, reporter: &ProgressReporter) -> Result<ModuleFindings, ScanError>;

    fn calculate_score(&self, findings: &ModuleFindings) -> u8 {
        findings.calculate_score().min(100)
    }

    fn calculate_grade(&self, findings: &ModuleFindings, score: u8) -> Grade {
        findings.calculate_grade(score)
    }
}

/// The production scanners in orchestration order: DNS, TLS, Performance, Security, SEO.
pub fn default_scanners(config: Arc<ScanConfig>) -> Vec<Box<dyn Scanner>> {
    vec![
        Box::new(DnsScanner::new(config.clone())),
        Box::new(SslScanner::new(config.clone())),
        Box::new(PerformanceScanner::new(config.clone())),
        Box::new(SecurityScanner::new(config.clone())),
        Box::new(SeoScanner::new(config)),
    ]
}

pub(crate) fn target_host(target: &Url) -> Result<String, ScanError> {
    target
        .host_str()
        .map(|host| host.trim_start_matches('[').trim_end_matches(']').to_string())
        .ok_or_else(|| ScanError::MissingHost(target.to_string()))
}

pub(crate) fn http_client(
    config: &ScanConfig,
    timeout: Duration,
    redirect: Policy,
) -> Result<reqwest::Client, ScanError> {
    Ok(reqwest::Client::builder()
        .user_agent(config.user_agent.clone())
        .timeout(timeout)
        .redirect(redirect)
        .danger_accept_invalid_certs(true)
        .build()?)
}

pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
