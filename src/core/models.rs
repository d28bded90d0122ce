// src/core/models.rs

use std::collections::BTreeMap;
use std::net::IpAddr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter};
use url::Url;

use crate::core::error::{OrchestrationError, ScanError};

// --- Reusable Result Types ---

// Outcome of a single probe: found (`Ok(Some)`), absent (`Ok(None)`) or probe error (`Err`).
pub type ScanResult<T> = Result<Option<T>, String>;

// --- Core Data Models ---

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
    Info,
}

// A coded issue raised by one of the scanners. `code` keys into the knowledge base.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AnalysisFinding {
    pub severity: Severity,
    pub code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl AnalysisFinding {
    pub fn new(severity: Severity, code: &str) -> Self {
        Self {
            severity,
            code: code.to_string(),
            detail: None,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

/// Per-severity tally of a module's issues. Informational findings are not counted.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct IssueCounts {
    pub critical: u32,
    pub high: u32,
    pub medium: u32,
    pub low: u32,
}

impl IssueCounts {
    pub fn from_findings(findings: &[AnalysisFinding]) -> Self {
        findings.iter().fold(Self::default(), |mut counts, finding| {
            match finding.severity {
                Severity::Critical => counts.critical += 1,
                Severity::High => counts.high += 1,
                Severity::Medium => counts.medium += 1,
                Severity::Low => counts.low += 1,
                Severity::Info => {}
            }
            counts
        })
    }

    pub fn total(&self) -> u32 {
        self.critical + self.high + self.medium + self.low
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Display)]
pub enum Grade {
    #[serde(rename = "A+")]
    #[strum(serialize = "A+")]
    APlus,
    A,
    B,
    C,
    D,
    #[default]
    F,
}

impl Grade {
    /// Shared score to letter table.
    pub fn from_score(score: u8) -> Self {
        match score {
            95..=u8::MAX => Grade::APlus,
            85..=94 => Grade::A,
            70..=84 => Grade::B,
            55..=69 => Grade::C,
            40..=54 => Grade::D,
            _ => Grade::F,
        }
    }
}

/// The five scan modules, in the order the orchestrator runs them.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord, Display, AsRefStr, EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ModuleKind {
    Dns,
    Ssl,
    Performance,
    Security,
    Seo,
}

impl ModuleKind {
    pub fn title(&self) -> &'static str {
        match self {
            ModuleKind::Dns => "DNS",
            ModuleKind::Ssl => "SSL/TLS",
            ModuleKind::Performance => "Performance",
            ModuleKind::Security => "Security",
            ModuleKind::Seo => "SEO",
        }
    }
}

// --- Scan Lifecycle ---

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ScanStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl ScanStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ScanStatus::Completed | ScanStatus::Failed)
    }

    /// States only move forward: Pending -> Running -> {Completed | Failed}.
    pub fn can_transition_to(&self, next: ScanStatus) -> bool {
        matches!(
            (self, next),
            (ScanStatus::Pending, ScanStatus::Running)
                | (ScanStatus::Pending, ScanStatus::Failed)
                | (ScanStatus::Running, ScanStatus::Completed)
                | (ScanStatus::Running, ScanStatus::Failed)
        )
    }
}

/// One analysis job. Immutable once created.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScanRequest {
    pub scan_id: String,
    pub target: Url,
}

impl ScanRequest {
    /// Parses a user-supplied target, defaulting to `https://` when no scheme is given.
    pub fn new(target: &str) -> Result<Self, ScanError> {
        Self::with_id(uuid::Uuid::new_v4().to_string(), target)
    }

    pub fn with_id(scan_id: impl Into<String>, target: &str) -> Result<Self, ScanError> {
        let trimmed = target.trim();
        if trimmed.is_empty() {
            return Err(ScanError::InvalidTarget(target.to_string()));
        }
        let candidate = if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
            trimmed.to_string()
        } else {
            format!("https://{trimmed}")
        };
        let target = Url::parse(&candidate).map_err(|_| ScanError::InvalidTarget(target.to_string()))?;
        if target.host_str().is_none() {
            return Err(ScanError::MissingHost(candidate));
        }

        Ok(Self {
            scan_id: scan_id.into(),
            target,
        })
    }
}

/// Mutable run record of a scan. Only the orchestrator mutates it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScanState {
    pub scan_id: String,
    pub target: Url,
    pub status: ScanStatus,
    pub current_phase: Option<String>,
    pub overall_score: Option<u8>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub duration_seconds: Option<u64>,
}

impl ScanState {
    pub fn new(request: &ScanRequest) -> Self {
        Self {
            scan_id: request.scan_id.clone(),
            target: request.target.clone(),
            status: ScanStatus::Pending,
            current_phase: None,
            overall_score: None,
            started_at: None,
            completed_at: None,
            duration_seconds: None,
        }
    }

    fn transition(&mut self, next: ScanStatus) -> Result<(), OrchestrationError> {
        if !self.status.can_transition_to(next) {
            return Err(OrchestrationError::IllegalTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        Ok(())
    }

    pub fn start(&mut self) -> Result<(), OrchestrationError> {
        self.transition(ScanStatus::Running)?;
        self.current_phase = Some("starting".to_string());
        self.started_at = Some(Utc::now());
        Ok(())
    }

    pub fn enter_phase(&mut self, phase: &str) -> Result<(), OrchestrationError> {
        if self.status != ScanStatus::Running {
            return Err(OrchestrationError::IllegalTransition {
                from: self.status,
                to: ScanStatus::Running,
            });
        }
        self.current_phase = Some(phase.to_string());
        Ok(())
    }

    pub fn complete(&mut self, overall_score: u8) -> Result<(), OrchestrationError> {
        self.finish(ScanStatus::Completed, overall_score)
    }

    pub fn fail(&mut self, overall_score: u8) -> Result<(), OrchestrationError> {
        self.finish(ScanStatus::Failed, overall_score)
    }

    fn finish(&mut self, status: ScanStatus, overall_score: u8) -> Result<(), OrchestrationError> {
        self.transition(status)?;
        let completed_at = Utc::now();
        self.current_phase = Some(status.to_string());
        self.overall_score = Some(overall_score.min(100));
        self.completed_at = Some(completed_at);
        self.duration_seconds = self
            .started_at
            .map(|started| (completed_at - started).num_seconds().max(0) as u64);
        Ok(())
    }
}

/// One scanner's persisted output. Never mutated after persistence.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModuleResult {
    pub scan_id: String,
    pub module: ModuleKind,
    pub score: u8,
    pub grade: Grade,
    pub raw_findings: serde_json::Value,
    pub issue_counts: IssueCounts,
    pub created_at: DateTime<Utc>,
}

impl ModuleResult {
    /// Coded issues stored in the raw findings under `analysis`.
    pub fn analysis(&self) -> Vec<AnalysisFinding> {
        self.raw_findings
            .get("analysis")
            .and_then(|value| serde_json::from_value(value.clone()).ok())
            .unwrap_or_default()
    }
}

// --- Main Report ---

// The state of a scan together with every module result persisted for it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanReport {
    pub scan: ScanState,
    pub modules: Vec<ModuleResult>,
}

// --- DNS Scanner Models ---

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordLookup {
    pub record_type: String,
    pub answers: ScanResult<Vec<String>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResolutionTiming {
    pub resolution_ms: Option<f64>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DnssecStatus {
    pub enabled: bool,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PropagationResult {
    pub resolver: String,
    pub address: IpAddr,
    pub answers: ScanResult<Vec<String>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LatencyResult {
    pub port: Option<u16>,
    pub latency_ms: Option<f64>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct PortStatus {
    pub port: u16,
    pub open: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RedirectResult {
    pub redirects_to_https: bool,
    pub status_code: Option<u16>,
    pub location: Option<String>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Ipv6Result {
    pub supported: bool,
    pub addresses: Vec<String>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DnsFindings {
    pub hostname: String,
    pub records: Vec<RecordLookup>,
    pub resolution: ResolutionTiming,
    pub dnssec: DnssecStatus,
    pub propagation: Vec<PropagationResult>,
    pub latency: LatencyResult,
    pub ports: Vec<PortStatus>,
    pub https_redirect: RedirectResult,
    pub ipv6: Ipv6Result,
    pub analysis: Vec<AnalysisFinding>,
}

impl DnsFindings {
    pub fn answers(&self, record_type: &str) -> &[String] {
        self.records
            .iter()
            .find(|lookup| lookup.record_type == record_type)
            .and_then(|lookup| match &lookup.answers {
                Ok(Some(values)) => Some(values.as_slice()),
                _ => None,
            })
            .unwrap_or(&[])
    }

    pub fn port_open(&self, port: u16) -> bool {
        self.ports.iter().any(|status| status.port == port && status.open)
    }
}

// --- SSL/TLS Scanner Models ---

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CertificateInfo {
    pub subject_name: String,
    pub issuer_name: String,
    pub not_before: DateTime<Utc>,
    pub not_after: DateTime<Utc>,
    pub days_until_expiry: i64,
    pub signature_algorithm: String,
    pub key_size: Option<u32>,
    pub is_trusted: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SslData {
    pub is_valid: bool,
    pub certificate_info: CertificateInfo,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProtocolSupport {
    #[serde(rename = "SSL 2.0")]
    pub ssl_2_0: bool,
    #[serde(rename = "SSL 3.0")]
    pub ssl_3_0: bool,
    #[serde(rename = "TLS 1.0")]
    pub tls_1_0: bool,
    #[serde(rename = "TLS 1.1")]
    pub tls_1_1: bool,
    #[serde(rename = "TLS 1.2")]
    pub tls_1_2: bool,
    #[serde(rename = "TLS 1.3")]
    pub tls_1_3: bool,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TlsVulnerabilities {
    pub heartbleed: bool,
    pub ccs_injection: bool,
    pub compression: bool,
}

impl TlsVulnerabilities {
    pub fn any(&self) -> bool {
        self.heartbleed || self.ccs_injection || self.compression
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeaderData {
    pub value: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TlsFindings {
    pub hostname: String,
    pub certificate: ScanResult<SslData>,
    pub protocols: ProtocolSupport,
    /// Negotiated cipher suite per protocol label.
    pub cipher_suites: BTreeMap<String, String>,
    pub vulnerabilities: TlsVulnerabilities,
    pub hsts: ScanResult<HeaderData>,
    pub error: Option<String>,
    pub analysis: Vec<AnalysisFinding>,
}

impl Default for TlsFindings {
    fn default() -> Self {
        Self {
            hostname: String::new(),
            certificate: Ok(None),
            protocols: ProtocolSupport::default(),
            cipher_suites: BTreeMap::new(),
            vulnerabilities: TlsVulnerabilities::default(),
            hsts: Ok(None),
            error: None,
            analysis: Vec::new(),
        }
    }
}

impl TlsFindings {
    pub fn certificate_data(&self) -> Option<&SslData> {
        self.certificate.as_ref().ok().and_then(|data| data.as_ref())
    }

    pub fn has_hsts(&self) -> bool {
        matches!(self.hsts, Ok(Some(_)))
    }
}

// --- Security (DAST) Scanner Models ---

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CookieAudit {
    pub name: String,
    pub secure: bool,
    pub http_only: bool,
    pub same_site: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CorsResult {
    pub allow_origin: Option<String>,
    pub allow_credentials: Option<String>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResourceRef {
    pub tag: String,
    pub url: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SecurityFindings {
    pub url: String,
    pub status_code: Option<u16>,
    /// Raw response header dump, lower-cased names.
    pub headers: BTreeMap<String, String>,
    pub cookies: Vec<CookieAudit>,
    pub cors: CorsResult,
    pub mixed_content: Vec<ResourceRef>,
    pub missing_sri: Vec<ResourceRef>,
    pub directory_listings: Vec<String>,
    pub error: Option<String>,
    pub analysis: Vec<AnalysisFinding>,
}

// --- SEO Scanner Models ---

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TagCheck {
    pub exists: bool,
    pub text: Option<String>,
    pub length: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetaTagsCheck {
    pub score: u8,
    pub title: TagCheck,
    pub description: TagCheck,
    pub canonical: Option<String>,
    pub robots: Option<String>,
    pub open_graph: Vec<String>,
    pub twitter_cards: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContentCheck {
    pub score: u8,
    pub h1_texts: Vec<String>,
    /// Counts of h1..h6.
    pub heading_counts: [usize; 6],
    pub hierarchy_valid: bool,
    pub total_images: usize,
    pub images_without_alt: usize,
    pub total_links: usize,
    pub non_descriptive_links: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TechnicalCheck {
    pub score: u8,
    pub compression: Option<String>,
    pub page_size_kb: f64,
    pub response_time_ms: f64,
    pub unminified_inline_scripts: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MobileCheck {
    pub score: u8,
    pub viewport: Option<String>,
    pub has_media_queries: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IndexationCheck {
    pub score: u8,
    pub robots_txt: bool,
    pub sitemap: bool,
    pub noindex: bool,
    pub nofollow: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StructuredData {
    pub json_ld_count: usize,
    pub json_ld_types: Vec<String>,
    pub microdata_items: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SeoFindings {
    pub url: String,
    pub meta: MetaTagsCheck,
    pub content: ContentCheck,
    pub technical: TechnicalCheck,
    pub mobile: MobileCheck,
    pub indexation: IndexationCheck,
    pub structured_data: StructuredData,
    pub error: Option<String>,
    pub analysis: Vec<AnalysisFinding>,
}

// --- Performance Scanner Models ---

/// Final metrics of one load tier.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TierResult {
    pub users: usize,
    pub duration: f64,
    pub spawn_rate: u32,
    pub total_requests: u64,
    pub avg_response_time: f64,
    pub p50: f64,
    pub p95: f64,
    pub p99: f64,
    pub throughput: f64,
    pub error_rate: f64,
    pub success_rate: f64,
    pub ttfb: f64,
    pub data_rate_kb: f64,
    pub active_connections: usize,
    pub network_errors: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PerformanceFindings {
    pub url: String,
    pub levels: Vec<TierResult>,
    pub error: Option<String>,
    pub analysis: Vec<AnalysisFinding>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grade_boundaries() {
        assert_eq!(Grade::from_score(100), Grade::APlus);
        assert_eq!(Grade::from_score(95), Grade::APlus);
        assert_eq!(Grade::from_score(94), Grade::A);
        assert_eq!(Grade::from_score(85), Grade::A);
        assert_eq!(Grade::from_score(70), Grade::B);
        assert_eq!(Grade::from_score(55), Grade::C);
        assert_eq!(Grade::from_score(40), Grade::D);
        assert_eq!(Grade::from_score(39), Grade::F);
        assert_eq!(Grade::from_score(0), Grade::F);
        assert_eq!(Grade::APlus.to_string(), "A+");
        assert_eq!(serde_json::to_value(Grade::APlus).unwrap(), "A+");
    }

    #[test]
    fn state_machine_only_moves_forward() {
        let request = ScanRequest::with_id("scan-1", "example.com").unwrap();
        let mut state = ScanState::new(&request);
        assert!(state.enter_phase("dns").is_err());

        state.start().unwrap();
        assert_eq!(state.current_phase.as_deref(), Some("starting"));
        state.enter_phase("dns").unwrap();
        state.complete(72).unwrap();

        assert_eq!(state.status, ScanStatus::Completed);
        assert_eq!(state.current_phase.as_deref(), Some("completed"));
        assert!(state.duration_seconds.is_some());
        assert!(state.start().is_err());
        assert!(state.fail(0).is_err());
    }

    #[test]
    fn request_defaults_to_https() {
        let request = ScanRequest::new("example.com/path").unwrap();
        assert_eq!(request.target.as_str(), "https://example.com/path");
        assert!(ScanRequest::new("   ").is_err());
    }

    #[test]
    fn issue_counts_skip_informational() {
        let findings = vec![
            AnalysisFinding::new(Severity::Critical, "A"),
            AnalysisFinding::new(Severity::High, "B"),
            AnalysisFinding::new(Severity::High, "C"),
            AnalysisFinding::new(Severity::Info, "D"),
        ];
        let counts = IssueCounts::from_findings(&findings);
        assert_eq!(counts.critical, 1);
        assert_eq!(counts.high, 2);
        assert_eq!(counts.total(), 3);
    }
}
