// src/core/scanner/ssl_scanner.rs

use std::collections::BTreeMap;
use std::net::{TcpStream, ToSocketAddrs};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use native_tls::TlsConnector;
use reqwest::redirect::Policy;
use tokio::task::spawn_blocking;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};
use url::Url;
use x509_parser::prelude::*;
use x509_parser::public_key::PublicKey;

use crate::config::ScanConfig;
use crate::core::error::ScanError;
use crate::core::models::{
    AnalysisFinding, CertificateInfo, Grade, HeaderData, ModuleKind, ProtocolSupport, ScanResult, Severity,
    SslData, TlsFindings, TlsVulnerabilities,
};
use crate::core::scanner::tls_probe::{self, ProtocolVersion};
use crate::core::scanner::{http_client, target_host, ModuleFindings, Scanner};
use crate::core::sink::ProgressReporter;

const TLS_PORT: u16 = 443;

pub struct SslScanner {
    config: Arc<ScanConfig>,
}

impl SslScanner {
    pub fn new(config: Arc<ScanConfig>) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Scanner for SslScanner {
    fn module(&self) -> ModuleKind {
        ModuleKind::Ssl
    }

    async fn run(&self, target: &Url, reporter: &ProgressReporter) -> Result<ModuleFindings, ScanError> {
        let hostname = target_host(target)?;
        Ok(ModuleFindings::Ssl(run_ssl_scan(&hostname, &self.config, reporter).await))
    }
}

/// Runs the SSL/TLS scan against the specified hostname on port 443.
///
/// The certificate is fetched first (trusted handshake, then a permissive one so untrusted
/// chains can still be inspected). Each protocol version is then probed with a raw
/// ClientHello, followed by the Heartbleed, CCS injection and compression probes and an
/// HTTPS request for the HSTS header.
///
/// # Arguments
/// * `hostname` - The host to connect to, without scheme or port.
/// * `config` - Handshake and fetch timeouts.
/// * `reporter` - Receives one log line per check as it completes.
///
/// # Returns
/// A `TlsFindings` struct with the raw probe data and its analysis findings. An
/// unresolvable host short-circuits with `error` set and no probes run.
pub async fn run_ssl_scan(hostname: &str, config: &ScanConfig, reporter: &ProgressReporter) -> TlsFindings {
    info!(target = %hostname, "Starting SSL/TLS scan.");
    reporter.info(format!("Starting SSL/TLS scan for {hostname}"));

    let mut findings = TlsFindings {
        hostname: hostname.to_string(),
        ..Default::default()
    };

    // Nothing else can succeed without an address.
    if !resolves(hostname, config.timeouts.dns).await {
        reporter.error(format!("Hostname {hostname} could not be resolved"));
        findings.error = Some("Hostname could not be resolved".to_string());
        findings.analysis = vec![AnalysisFinding::new(Severity::Critical, "TLS_HOST_UNRESOLVED")];
        return findings;
    }

    // Certificate details come from the platform TLS stack.
    findings.certificate = fetch_certificate(hostname, config.timeouts.tls_handshake, reporter).await;

    // Protocol support and cipher suites come from our own handshakes, since the platform
    // stack refuses the legacy versions.
    let negotiated = check_protocols(hostname, config.timeouts.tls_handshake, reporter).await;
    findings.protocols = negotiated.support;
    findings.cipher_suites = negotiated.cipher_suites;
    let suites = if findings.cipher_suites.is_empty() {
        "none".to_string()
    } else {
        findings
            .cipher_suites
            .iter()
            .map(|(protocol, suite)| format!("{protocol} {suite}"))
            .collect::<Vec<_>>()
            .join(", ")
    };
    reporter.info(format!("Negotiated cipher suites: {suites}"));

    findings.vulnerabilities =
        check_vulnerabilities(hostname, &findings.protocols, config.timeouts.tls_handshake, reporter).await;
    findings.hsts = check_hsts(hostname, config, reporter).await;

    debug!("SSL scan probes finished, starting analysis.");
    findings.analysis = analyze_ssl_results(&findings);
    info!(findings = %findings.analysis.len(), "SSL/TLS scan finished.");
    findings
}

/// Scores the TLS findings out of 100.
///
/// Deductions: invalid certificate 40, fewer than 30 days left 10, weak key 15, SSLv2 20,
/// SSLv3 15, TLS 1.0 10, TLS 1.1 5, neither TLS 1.2 nor 1.3 20, Heartbleed 25,
/// CCS injection 20, compression 5, no HSTS 5. The result is clamped to 0..=100 and an
/// unresolvable host scores 0.
pub fn calculate_score(findings: &TlsFindings) -> u8 {
    if findings.error.is_some() {
        return 0;
    }

    let mut score: i32 = 100;
    let protocols = &findings.protocols;
    let vulns = &findings.vulnerabilities;

    // --- Certificate ---
    if let Some(cert) = findings.certificate_data() {
        if !cert.is_valid {
            score -= 40;
        }
        if cert.certificate_info.days_until_expiry < 30 {
            score -= 10;
        }
        if has_weak_key(&cert.certificate_info) {
            score -= 15;
        }
    }

    // --- Protocols ---
    if protocols.ssl_2_0 {
        score -= 20;
    }
    if protocols.ssl_3_0 {
        score -= 15;
    }
    if protocols.tls_1_0 {
        score -= 10;
    }
    if protocols.tls_1_1 {
        score -= 5;
    }
    if !protocols.tls_1_2 && !protocols.tls_1_3 {
        score -= 20;
    }

    // --- Vulnerabilities ---
    if vulns.heartbleed {
        score -= 25;
    }
    if vulns.ccs_injection {
        score -= 20;
    }
    if vulns.compression {
        score -= 5;
    }

    if !findings.has_hsts() {
        score -= 5;
    }

    score.clamp(0, 100) as u8
}

/// TLS grade with the override rules applied before the shared table.
pub fn calculate_grade(findings: &TlsFindings, score: u8) -> Grade {
    if findings.error.is_some() {
        return Grade::F;
    }
    let cert = findings.certificate_data();
    let protocols = &findings.protocols;
    let vulns = &findings.vulnerabilities;

    if cert.is_some_and(|c| !c.is_valid) {
        return Grade::F;
    }
    if vulns.heartbleed || vulns.ccs_injection {
        return Grade::D;
    }
    if protocols.tls_1_0 {
        return if score >= 55 { Grade::C } else { Grade::D };
    }
    if protocols.tls_1_1 {
        return if score >= 70 { Grade::B } else { Grade::C };
    }

    let only_modern = !protocols.ssl_2_0 && !protocols.ssl_3_0;
    let strong_key = cert.is_some_and(|c| !has_weak_key(&c.certificate_info));
    let earns_a_plus = only_modern && findings.has_hsts() && !vulns.any() && strong_key && score >= 95;

    match Grade::from_score(score) {
        Grade::APlus if !earns_a_plus => Grade::A,
        grade => grade,
    }
}

/// Only RSA and DSA key sizes are comparable against 2048 bits.
fn has_weak_key(info: &CertificateInfo) -> bool {
    info.key_size.is_some_and(|bits| bits < 2048)
}

/// Analyzes the collected TLS data and turns each problem into a coded finding.
///
/// # Arguments
/// * `findings` - The probe results gathered by `run_ssl_scan`.
///
/// # Returns
/// A vector of `AnalysisFinding`, in certificate, protocol, vulnerability, HSTS order.
fn analyze_ssl_results(findings: &TlsFindings) -> Vec<AnalysisFinding> {
    let mut analyses = Vec::new();

    match &findings.certificate {
        Err(e) => {
            debug!(error = %e, "Certificate could not be retrieved.");
            analyses.push(AnalysisFinding::new(Severity::High, "TLS_HANDSHAKE_FAILED").with_detail(e.clone()));
        }
        Ok(None) => analyses.push(AnalysisFinding::new(Severity::Medium, "TLS_NO_CERTIFICATE")),
        Ok(Some(cert)) => {
            let info = &cert.certificate_info;
            if !cert.is_valid {
                analyses.push(
                    AnalysisFinding::new(Severity::Critical, "TLS_CERT_INVALID")
                        .with_detail(format!("valid {} to {}", info.not_before, info.not_after)),
                );
            } else if info.days_until_expiry < 30 {
                analyses.push(
                    AnalysisFinding::new(Severity::Medium, "TLS_CERT_EXPIRING_SOON")
                        .with_detail(format!("{} days remaining", info.days_until_expiry)),
                );
            }
            if has_weak_key(info) {
                analyses.push(
                    AnalysisFinding::new(Severity::High, "TLS_WEAK_KEY")
                        .with_detail(format!("{} bits", info.key_size.unwrap_or_default())),
                );
            }
            if !info.is_trusted {
                analyses.push(AnalysisFinding::new(Severity::High, "TLS_CERT_UNTRUSTED"));
            }
        }
    }

    let protocols = &findings.protocols;
    if protocols.ssl_2_0 {
        analyses.push(AnalysisFinding::new(Severity::Critical, "TLS_SSLV2_ENABLED"));
    }
    if protocols.ssl_3_0 {
        analyses.push(AnalysisFinding::new(Severity::High, "TLS_SSLV3_ENABLED"));
    }
    if protocols.tls_1_0 {
        analyses.push(AnalysisFinding::new(Severity::Medium, "TLS_1_0_ENABLED"));
    }
    if protocols.tls_1_1 {
        analyses.push(AnalysisFinding::new(Severity::Low, "TLS_1_1_ENABLED"));
    }
    if !protocols.tls_1_2 && !protocols.tls_1_3 {
        analyses.push(AnalysisFinding::new(Severity::High, "TLS_NO_MODERN_PROTOCOL"));
    }

    let vulns = &findings.vulnerabilities;
    if vulns.heartbleed {
        analyses.push(AnalysisFinding::new(Severity::Critical, "TLS_HEARTBLEED"));
    }
    if vulns.ccs_injection {
        analyses.push(AnalysisFinding::new(Severity::Critical, "TLS_CCS_INJECTION"));
    }
    if vulns.compression {
        analyses.push(AnalysisFinding::new(Severity::Medium, "TLS_COMPRESSION"));
    }

    if !findings.has_hsts() {
        analyses.push(AnalysisFinding::new(Severity::Low, "TLS_HSTS_MISSING"));
    }

    analyses
}

async fn resolves(hostname: &str, wait: Duration) -> bool {
    match timeout(wait, tokio::net::lookup_host((hostname, TLS_PORT))).await {
        Ok(Ok(mut addrs)) => addrs.next().is_some(),
        Ok(Err(e)) => {
            warn!(target = %hostname, error = %e, "Hostname resolution failed.");
            false
        }
        Err(_) => false,
    }
}

/// Runs the blocking handshake on the blocking pool and reports what the certificate says.
async fn fetch_certificate(hostname: &str, wait: Duration, reporter: &ProgressReporter) -> ScanResult<SslData> {
    let target = hostname.to_string();

    debug!("Spawning blocking task for TLS connection.");
    let result = spawn_blocking(move || perform_tls_scan(&target, wait))
        .await
        .unwrap_or_else(|e| {
            error!(panic = %e, "Blocking SSL scan task panicked!");
            Err(format!("Task panicked: {e}"))
        });

    match &result {
        Ok(Some(cert)) => {
            let info = &cert.certificate_info;
            let message = format!(
                "Certificate valid until {} ({} days remaining)",
                info.not_after.format("%Y-%m-%d"),
                info.days_until_expiry
            );
            if cert.is_valid && info.days_until_expiry > 30 {
                reporter.success(message);
            } else {
                reporter.warning(message);
            }
            if !info.is_trusted {
                reporter.warning(format!("Certificate is not trusted (issuer: {})", info.issuer_name));
            }
        }
        Ok(None) => reporter.warning("Server presented no certificate"),
        Err(e) => reporter.error(format!("Certificate info extraction failed: {e}")),
    }

    result
}

fn tls_connect(
    target: &str,
    wait: Duration,
    connector: &TlsConnector,
) -> Result<native_tls::TlsStream<TcpStream>, String> {
    let addr = (target, TLS_PORT)
        .to_socket_addrs()
        .map_err(|e| format!("Resolution Error: {e}"))?
        .next()
        .ok_or_else(|| "Resolution Error: no address".to_string())?;

    let stream = TcpStream::connect_timeout(&addr, wait).map_err(|e| {
        error!(error = %e, "TCP connection failed");
        format!("TCP Connection Error: {e}")
    })?;
    stream
        .set_read_timeout(Some(wait))
        .and_then(|_| stream.set_write_timeout(Some(wait)))
        .map_err(|e| format!("TCP Connection Error: {e}"))?;

    connector
        .connect(target, stream)
        .map_err(|e| format!("TLS Handshake Error: {e}"))
}

/// Performs the handshake and parses the leaf certificate.
///
/// This is a blocking function and must be run on a dedicated thread.
///
/// # Returns
/// `Ok(Some(SslData))` on success, `Ok(None)` when the server sent no certificate, and
/// `Err(String)` when neither the trusted nor the permissive handshake succeeded.
fn perform_tls_scan(target: &str, wait: Duration) -> ScanResult<SslData> {
    debug!(target, "Performing TLS connection and handshake.");

    let verified = TlsConnector::new().map_err(|e| format!("TlsConnector Error: {e}"))?;
    let (stream, is_trusted) = match tls_connect(target, wait, &verified) {
        Ok(stream) => (stream, true),
        Err(e) => {
            debug!(target, error = %e, "Verified handshake failed, retrying without verification.");
            let permissive = TlsConnector::builder()
                .danger_accept_invalid_certs(true)
                .danger_accept_invalid_hostnames(true)
                .build()
                .map_err(|e| format!("TlsConnector Error: {e}"))?;
            (tls_connect(target, wait, &permissive)?, false)
        }
    };

    let cert = match stream.peer_certificate() {
        Ok(Some(c)) => c,
        Ok(None) => {
            debug!("TLS connection successful, but no peer certificate provided.");
            return Ok(None);
        }
        Err(e) => return Err(format!("Could not get peer certificate: {e}")),
    };

    let cert_der = cert
        .to_der()
        .map_err(|e| format!("Could not convert certificate to DER: {e}"))?;
    let (_, x509) = parse_x509_certificate(&cert_der).map_err(|e| format!("X.509 Parse Error: {e}"))?;

    info!(subject = %x509.subject(), issuer = %x509.issuer(), "Successfully parsed certificate.");

    let validity = x509.validity();
    let not_after = asn1_time_to_chrono_utc(&validity.not_after);
    let not_before = asn1_time_to_chrono_utc(&validity.not_before);
    let now = Utc::now();
    let days_until_expiry = not_after.signed_duration_since(now).num_days();
    let is_valid = now >= not_before && now <= not_after;

    Ok(Some(SslData {
        is_valid,
        certificate_info: CertificateInfo {
            subject_name: x509.subject().to_string(),
            issuer_name: x509.issuer().to_string(),
            not_before,
            not_after,
            days_until_expiry,
            signature_algorithm: signature_algorithm_name(&x509.signature_algorithm.algorithm.to_id_string()),
            key_size: comparable_key_size(&x509),
            is_trusted,
        },
    }))
}

fn asn1_time_to_chrono_utc(time: &ASN1Time) -> DateTime<Utc> {
    DateTime::from_timestamp(time.timestamp(), 0).unwrap_or_default()
}

fn comparable_key_size(x509: &X509Certificate<'_>) -> Option<u32> {
    match x509.public_key().parsed() {
        Ok(PublicKey::RSA(rsa)) => Some(rsa.key_size() as u32),
        Ok(PublicKey::DSA(y)) => Some((y.len() * 8) as u32),
        _ => None,
    }
}

fn signature_algorithm_name(oid: &str) -> String {
    let name = match oid {
        "1.2.840.113549.1.1.5" => "sha1WithRSAEncryption",
        "1.2.840.113549.1.1.10" => "rsassaPss",
        "1.2.840.113549.1.1.11" => "sha256WithRSAEncryption",
        "1.2.840.113549.1.1.12" => "sha384WithRSAEncryption",
        "1.2.840.113549.1.1.13" => "sha512WithRSAEncryption",
        "1.2.840.10045.4.3.2" => "ecdsa-with-SHA256",
        "1.2.840.10045.4.3.3" => "ecdsa-with-SHA384",
        "1.2.840.10045.4.3.4" => "ecdsa-with-SHA512",
        "1.3.101.112" => "ed25519",
        other => return other.to_string(),
    };
    name.to_string()
}

struct NegotiatedProtocols {
    support: ProtocolSupport,
    cipher_suites: BTreeMap<String, String>,
}

/// Probes every protocol version from SSLv2 to TLS 1.3 and records the suite the server
/// picked for the modern ones.
async fn check_protocols(hostname: &str, wait: Duration, reporter: &ProgressReporter) -> NegotiatedProtocols {
    let mut support = ProtocolSupport::default();
    let mut cipher_suites = BTreeMap::new();

    for version in ProtocolVersion::ALL {
        let probe = match tls_probe::probe_protocol(hostname, TLS_PORT, version, wait).await {
            Ok(probe) => probe,
            Err(e) => {
                debug!(target = %hostname, version = version.label(), error = %e, "Protocol probe failed.");
                Default::default()
            }
        };

        let supported = probe.supported;
        match version {
            ProtocolVersion::Ssl2 => support.ssl_2_0 = supported,
            ProtocolVersion::Ssl3 => support.ssl_3_0 = supported,
            ProtocolVersion::Tls10 => support.tls_1_0 = supported,
            ProtocolVersion::Tls11 => support.tls_1_1 = supported,
            ProtocolVersion::Tls12 => support.tls_1_2 = supported,
            ProtocolVersion::Tls13 => support.tls_1_3 = supported,
        }
        if let (Some(suite), false) = (probe.cipher_suite, version.is_legacy()) {
            cipher_suites.insert(version.label().to_string(), tls_probe::cipher_suite_name(suite));
        }

        let status = if supported { "supported" } else { "not supported" };
        let message = format!("{}: {status}", version.label());
        match version {
            ProtocolVersion::Ssl2 | ProtocolVersion::Ssl3 if supported => reporter.error(message),
            ProtocolVersion::Tls10 | ProtocolVersion::Tls11 if supported => reporter.warning(message),
            _ => reporter.success(message),
        }
    }

    NegotiatedProtocols { support, cipher_suites }
}

/// Highest pre-1.3 protocol the server accepted; the handshake probes need one.
fn vulnerability_probe_version(protocols: &ProtocolSupport) -> Option<ProtocolVersion> {
    [
        (protocols.tls_1_2, ProtocolVersion::Tls12),
        (protocols.tls_1_1, ProtocolVersion::Tls11),
        (protocols.tls_1_0, ProtocolVersion::Tls10),
        (protocols.ssl_3_0, ProtocolVersion::Ssl3),
    ]
    .into_iter()
    .find_map(|(supported, version)| supported.then_some(version))
}

/// Runs the Heartbleed, CCS injection and compression probes over the best legacy-capable
/// protocol. A probe that fails to complete counts as not vulnerable and is logged.
///
/// # Arguments
/// * `hostname` - The host to probe.
/// * `protocols` - Supported versions from `check_protocols`; picks the probe version.
/// * `wait` - Per-probe connect and read timeout.
/// * `reporter` - Receives one line per probe.
async fn check_vulnerabilities(
    hostname: &str,
    protocols: &ProtocolSupport,
    wait: Duration,
    reporter: &ProgressReporter,
) -> TlsVulnerabilities {
    let Some(version) = vulnerability_probe_version(protocols) else {
        reporter.info("Vulnerability probes skipped: no TLS 1.2 or older protocol negotiated");
        return TlsVulnerabilities::default();
    };

    let heartbleed = match tls_probe::probe_heartbleed(hostname, TLS_PORT, version, wait).await {
        Ok(true) => {
            reporter.error("VULNERABLE to Heartbleed!");
            true
        }
        Ok(false) => {
            reporter.success("Not vulnerable to Heartbleed");
            false
        }
        Err(e) => {
            reporter.warning(format!("Heartbleed check failed: {e}"));
            false
        }
    };

    let ccs_injection = match tls_probe::probe_ccs_injection(hostname, TLS_PORT, version, wait).await {
        Ok(true) => {
            reporter.error("VULNERABLE to CCS Injection!");
            true
        }
        Ok(false) => {
            reporter.success("Not vulnerable to CCS Injection");
            false
        }
        Err(e) => {
            reporter.warning(format!("CCS Injection check failed: {e}"));
            false
        }
    };

    let compression = match tls_probe::probe_compression(hostname, TLS_PORT, version, wait).await {
        Ok(true) => {
            reporter.warning("TLS Compression enabled (CRIME risk)");
            true
        }
        Ok(false) => {
            reporter.success("TLS Compression disabled");
            false
        }
        Err(e) => {
            reporter.warning(format!("TLS Compression check failed: {e}"));
            false
        }
    };

    TlsVulnerabilities {
        heartbleed,
        ccs_injection,
        compression,
    }
}

/// Fetches the HTTPS front page and reads its `Strict-Transport-Security` header.
async fn check_hsts(hostname: &str, config: &ScanConfig, reporter: &ProgressReporter) -> ScanResult<HeaderData> {
    let client = http_client(config, config.timeouts.aux_fetch, Policy::limited(10)).map_err(|e| e.to_string())?;

    match client.get(format!("https://{hostname}")).send().await {
        Ok(response) => {
            let header = response
                .headers()
                .get("strict-transport-security")
                .and_then(|value| value.to_str().ok())
                .map(|value| value.to_string());
            match header {
                Some(value) => {
                    reporter.success(format!("HSTS header present: {value}"));
                    Ok(Some(HeaderData { value }))
                }
                None => {
                    reporter.warning("HSTS header not found");
                    Ok(None)
                }
            }
        }
        Err(e) => {
            reporter.warning(format!("HSTS check failed: {e}"));
            Err(e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn modern() -> TlsFindings {
        let now = Utc::now();
        TlsFindings {
            hostname: "example.com".into(),
            certificate: Ok(Some(SslData {
                is_valid: true,
                certificate_info: CertificateInfo {
                    subject_name: "CN=example.com".into(),
                    issuer_name: "CN=Test CA".into(),
                    not_before: now - chrono::Duration::days(30),
                    not_after: now + chrono::Duration::days(200),
                    days_until_expiry: 200,
                    signature_algorithm: "sha256WithRSAEncryption".into(),
                    key_size: Some(2048),
                    is_trusted: true,
                },
            })),
            protocols: ProtocolSupport {
                tls_1_2: true,
                tls_1_3: true,
                ..Default::default()
            },
            hsts: Ok(Some(HeaderData {
                value: "max-age=31536000".into(),
            })),
            ..Default::default()
        }
    }

    #[test]
    fn modern_server_earns_a_plus() {
        let findings = modern();
        let score = calculate_score(&findings);
        assert_eq!(score, 100);
        assert_eq!(calculate_grade(&findings, score), Grade::APlus);
    }

    #[test]
    fn missing_hsts_caps_at_a() {
        let mut findings = modern();
        findings.hsts = Ok(None);
        let score = calculate_score(&findings);
        assert_eq!(score, 95);
        assert_eq!(calculate_grade(&findings, score), Grade::A);
    }

    #[test]
    fn invalid_certificate_is_graded_f() {
        let mut findings = modern();
        if let Ok(Some(cert)) = findings.certificate.as_mut() {
            cert.is_valid = false;
            cert.certificate_info.days_until_expiry = -3;
        }
        let score = calculate_score(&findings);
        assert_eq!(score, 50);
        assert_eq!(calculate_grade(&findings, score), Grade::F);
    }

    #[test]
    fn legacy_protocols_override_grade() {
        let mut findings = modern();
        findings.protocols.tls_1_0 = true;
        findings.protocols.tls_1_1 = true;
        let score = calculate_score(&findings);
        assert_eq!(score, 85);
        assert_eq!(calculate_grade(&findings, score), Grade::C);

        let mut findings = modern();
        findings.protocols.tls_1_1 = true;
        let score = calculate_score(&findings);
        assert_eq!(calculate_grade(&findings, score), Grade::B);
        assert_eq!(calculate_grade(&findings, 60), Grade::C);
    }

    #[test]
    fn vulnerabilities_force_d() {
        let mut findings = modern();
        findings.vulnerabilities.heartbleed = true;
        let score = calculate_score(&findings);
        assert_eq!(score, 75);
        assert_eq!(calculate_grade(&findings, score), Grade::D);
    }

    #[test]
    fn worst_case_floors_at_zero() {
        let mut findings = modern();
        findings.protocols = ProtocolSupport {
            ssl_2_0: true,
            ssl_3_0: true,
            tls_1_0: true,
            tls_1_1: true,
            ..Default::default()
        };
        findings.vulnerabilities = TlsVulnerabilities {
            heartbleed: true,
            ccs_injection: true,
            compression: true,
        };
        findings.hsts = Ok(None);
        if let Ok(Some(cert)) = findings.certificate.as_mut() {
            cert.is_valid = false;
            cert.certificate_info.key_size = Some(1024);
        }
        assert_eq!(calculate_score(&findings), 0);
    }

    #[test]
    fn certificate_expiring_within_30_days_costs_10() {
        let mut findings = modern();
        if let Ok(Some(cert)) = findings.certificate.as_mut() {
            cert.certificate_info.days_until_expiry = 30;
        }
        assert_eq!(calculate_score(&findings), 100);

        if let Ok(Some(cert)) = findings.certificate.as_mut() {
            cert.certificate_info.days_until_expiry = 29;
        }
        let score = calculate_score(&findings);
        assert_eq!(score, 90);
        assert_eq!(calculate_grade(&findings, score), Grade::A);
        assert!(analyze_ssl_results(&findings).iter().any(|f| f.code == "TLS_CERT_EXPIRING_SOON"));
    }

    #[test]
    fn ccs_injection_alone_costs_20_and_forces_d() {
        let mut findings = modern();
        findings.vulnerabilities.ccs_injection = true;
        let score = calculate_score(&findings);
        assert_eq!(score, 80);
        assert_eq!(calculate_grade(&findings, score), Grade::D);
        let codes: Vec<_> = analyze_ssl_results(&findings).into_iter().map(|f| f.code).collect();
        assert_eq!(codes, ["TLS_CCS_INJECTION"]);
    }

    #[test]
    fn compression_alone_costs_5_and_denies_a_plus() {
        let mut findings = modern();
        findings.vulnerabilities.compression = true;
        let score = calculate_score(&findings);
        assert_eq!(score, 95);
        assert_eq!(calculate_grade(&findings, score), Grade::A);
        let codes: Vec<_> = analyze_ssl_results(&findings).into_iter().map(|f| f.code).collect();
        assert_eq!(codes, ["TLS_COMPRESSION"]);
    }

    #[test]
    fn unresolvable_host_scores_zero() {
        let findings = TlsFindings {
            error: Some("Hostname could not be resolved".into()),
            ..Default::default()
        };
        assert_eq!(calculate_score(&findings), 0);
        assert_eq!(calculate_grade(&findings, 0), Grade::F);
    }

    #[test]
    fn vulnerability_probes_use_highest_legacy_capable_version() {
        let protocols = ProtocolSupport {
            tls_1_0: true,
            tls_1_2: true,
            tls_1_3: true,
            ..Default::default()
        };
        assert_eq!(vulnerability_probe_version(&protocols), Some(ProtocolVersion::Tls12));

        let only_13 = ProtocolSupport {
            tls_1_3: true,
            ..Default::default()
        };
        assert_eq!(vulnerability_probe_version(&only_13), None);
    }
}
