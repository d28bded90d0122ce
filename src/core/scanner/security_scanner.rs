// src/core/scanner/security_scanner.rs

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::header::HeaderMap;
use reqwest::redirect::Policy;
use scraper::{Html, Selector};
use tracing::{debug, error, info, warn};
use url::Url;

use crate::config::ScanConfig;
use crate::core::error::ScanError;
use crate::core::models::{
    AnalysisFinding, CookieAudit, CorsResult, HeaderData, ModuleKind, ResourceRef, ScanResult, SecurityFindings,
    Severity,
};
use crate::core::scanner::{http_client, ModuleFindings, Scanner};
use crate::core::sink::ProgressReporter;

/// Recommended response headers, their finding code and the severity when absent.
const SECURITY_HEADERS: [(&str, &str, Severity); 7] = [
    ("Content-Security-Policy", "SEC_CSP_MISSING", Severity::High),
    ("X-Content-Type-Options", "SEC_XCTO_MISSING", Severity::Medium),
    ("X-Frame-Options", "SEC_XFO_MISSING", Severity::Medium),
    ("Strict-Transport-Security", "SEC_HSTS_MISSING", Severity::High),
    ("Referrer-Policy", "SEC_REFERRER_POLICY_MISSING", Severity::Low),
    ("Permissions-Policy", "SEC_PERMISSIONS_POLICY_MISSING", Severity::Low),
    ("X-XSS-Protection", "SEC_XXSS_PROTECTION_MISSING", Severity::Low),
];

static RE_PY_TRACEBACK: Lazy<Regex> = Lazy::new(|| Regex::new(r"Traceback \(most recent call last\)").unwrap());
static RE_JAVA_FRAME: Lazy<Regex> = Lazy::new(|| Regex::new(r"at .+\.java:\d+").unwrap());
static RE_JAVA_THREAD: Lazy<Regex> = Lazy::new(|| Regex::new(r"Exception in thread").unwrap());
static RE_PHP_FATAL: Lazy<Regex> = Lazy::new(|| Regex::new(r"Fatal error:.+on line \d+").unwrap());
static RE_PHP_WARNING: Lazy<Regex> = Lazy::new(|| Regex::new(r"<b>Warning</b>:").unwrap());
static RE_STACK_TRACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"Stack trace:").unwrap());

static STACK_TRACE_PATTERNS: [&Lazy<Regex>; 6] = [
    &RE_PY_TRACEBACK,
    &RE_JAVA_FRAME,
    &RE_JAVA_THREAD,
    &RE_PHP_FATAL,
    &RE_PHP_WARNING,
    &RE_STACK_TRACE,
];

static SEL_SCRIPT_SRC: Lazy<Selector> = Lazy::new(|| Selector::parse("script[src]").unwrap());
static SEL_LINK_HREF: Lazy<Selector> = Lazy::new(|| Selector::parse("link[href]").unwrap());
static SEL_IMG_SRC: Lazy<Selector> = Lazy::new(|| Selector::parse("img[src]").unwrap());
static SEL_IFRAME_SRC: Lazy<Selector> = Lazy::new(|| Selector::parse("iframe[src]").unwrap());
static SEL_STYLESHEET: Lazy<Selector> = Lazy::new(|| Selector::parse(r#"link[rel~="stylesheet"][href]"#).unwrap());

const MAX_RESOURCE_URL: usize = 200;

pub struct SecurityScanner {
    config: Arc<ScanConfig>,
}

impl SecurityScanner {
    pub fn new(config: Arc<ScanConfig>) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Scanner for SecurityScanner {
    fn module(&self) -> ModuleKind {
        ModuleKind::Security
    }

    async fn run(&self, target: &Url, reporter: &ProgressReporter) -> Result<ModuleFindings, ScanError> {
        Ok(ModuleFindings::Security(run_security_scan(target, &self.config, reporter).await?))
    }
}

/// Runs the passive and lightly active web application checks against `target`.
///
/// Only a missing HTTP client is an error. An unreachable page produces findings with
/// `error` set, which score 0.
pub async fn run_security_scan(
    target: &Url,
    config: &ScanConfig,
    reporter: &ProgressReporter,
) -> Result<SecurityFindings, ScanError> {
    info!(target = %target, "Starting security scan.");

    let client = http_client(config, config.timeouts.page_fetch, Policy::limited(10))?;
    let mut findings = SecurityFindings {
        url: target.to_string(),
        ..Default::default()
    };

    let response = match client.get(target.as_str()).send().await {
        Ok(response) => response,
        Err(e) => {
            error!(url = %target, error = %e, "HTTP request failed for security scan.");
            reporter.error(format!("Failed to fetch URL: {e}"));
            findings.error = Some(e.to_string());
            findings.analysis = vec![AnalysisFinding::new(Severity::Critical, "SEC_FETCH_FAILED").with_detail(e.to_string())];
            return Ok(findings);
        }
    };

    info!(status = %response.status(), "Received HTTP response for security scan.");
    findings.status_code = Some(response.status().as_u16());
    let headers = response.headers().clone();
    findings.headers = dump_headers(&headers);
    let body = response.text().await.unwrap_or_else(|e| {
        warn!(error = %e, "Failed to read response body; continuing with an empty page.");
        String::new()
    });

    let host = target.host_str().unwrap_or_default();
    let resources = extract_resources(&body, host);
    let mut analysis = Vec::new();

    analysis.extend(check_security_headers(&headers, reporter));

    let (cookies, cookie_issues) = check_cookies(&headers, reporter);
    findings.cookies = cookies;
    analysis.extend(cookie_issues);

    let cors_client = http_client(config, config.timeouts.aux_fetch, Policy::none())?;
    let (cors, cors_issues) = check_cors(&cors_client, target, &config.cors_probe_origin, reporter).await;
    findings.cors = cors;
    analysis.extend(cors_issues);

    analysis.extend(check_info_disclosure(&headers, &body, reporter));

    if target.scheme() == "https" {
        findings.mixed_content = resources.mixed_content;
        if findings.mixed_content.is_empty() {
            reporter.success("No mixed content detected");
        } else {
            let count = findings.mixed_content.len();
            reporter.warning(format!("Mixed content: {count} HTTP resource(s) on HTTPS page"));
            analysis.push(
                AnalysisFinding::new(Severity::Medium, "SEC_MIXED_CONTENT").with_detail(format!("{count} resource(s)")),
            );
        }
    }

    findings.missing_sri = resources.missing_sri;
    if findings.missing_sri.is_empty() {
        reporter.success("All external resources have SRI or none are loaded");
    } else {
        let count = findings.missing_sri.len();
        reporter.warning(format!("SRI: {count} external resource(s) missing integrity attribute"));
        analysis.push(AnalysisFinding::new(Severity::Medium, "SEC_SRI_MISSING").with_detail(format!("{count} resource(s)")));
    }

    let listing_client = http_client(config, config.timeouts.directory_probe, Policy::limited(10))?;
    findings.directory_listings =
        check_directory_listing(&listing_client, target, &config.directory_probe_paths, reporter).await;
    for path in &findings.directory_listings {
        analysis.push(AnalysisFinding::new(Severity::Medium, "SEC_DIRECTORY_LISTING").with_detail(path.clone()));
    }

    findings.analysis = analysis;
    info!(findings = %findings.analysis.len(), "Security scan finished.");
    Ok(findings)
}

pub fn calculate_score(findings: &SecurityFindings) -> u8 {
    if findings.error.is_some() {
        return 0;
    }
    let penalty: u32 = findings.analysis.iter().map(|f| severity_weight(f.severity)).sum();
    100u32.saturating_sub(penalty) as u8
}

fn severity_weight(severity: Severity) -> u32 {
    match severity {
        Severity::Critical => 25,
        Severity::High => 15,
        Severity::Medium => 8,
        Severity::Low => 3,
        Severity::Info => 0,
    }
}

fn dump_headers(headers: &HeaderMap) -> BTreeMap<String, String> {
    let mut dump: BTreeMap<String, String> = BTreeMap::new();
    for (name, value) in headers {
        let value = value.to_str().unwrap_or("[Invalid UTF-8]");
        dump.entry(name.as_str().to_string())
            .and_modify(|existing| {
                existing.push_str(", ");
                existing.push_str(value);
            })
            .or_insert_with(|| value.to_string());
    }
    dump
}

/// Checks for the presence of a specific HTTP header in a `HeaderMap`.
///
/// Non-UTF-8 values still count as present.
fn check_header(headers: &HeaderMap, name: &str) -> ScanResult<HeaderData> {
    debug!(header_name = name, "Checking for header.");
    match headers.get(name) {
        Some(value) => match value.to_str() {
            Ok(s) => Ok(Some(HeaderData { value: s.to_string() })),
            Err(_) => {
                warn!(header_name = name, "Header found but contained invalid UTF-8.");
                Ok(Some(HeaderData {
                    value: "[Invalid UTF-8]".to_string(),
                }))
            }
        },
        None => Ok(None),
    }
}

fn check_security_headers(headers: &HeaderMap, reporter: &ProgressReporter) -> Vec<AnalysisFinding> {
    let mut analyses = Vec::new();
    for (name, code, severity) in SECURITY_HEADERS {
        match check_header(headers, name) {
            Ok(Some(header)) => {
                reporter.success(format!("Header {name} present: {}", truncate(&header.value, 80)));
            }
            _ => {
                reporter.warning(format!("Missing security header: {name}"));
                analyses.push(AnalysisFinding::new(severity, code));
            }
        }
    }
    analyses
}

fn audit_cookie(raw: &str) -> CookieAudit {
    let lower = raw.to_lowercase();
    CookieAudit {
        name: raw.split('=').next().unwrap_or_default().trim().to_string(),
        secure: lower.contains("secure"),
        http_only: lower.contains("httponly"),
        same_site: lower.contains("samesite"),
    }
}

fn check_cookies(headers: &HeaderMap, reporter: &ProgressReporter) -> (Vec<CookieAudit>, Vec<AnalysisFinding>) {
    let cookies: Vec<CookieAudit> = headers
        .get_all("set-cookie")
        .iter()
        .filter_map(|value| value.to_str().ok())
        .map(audit_cookie)
        .collect();

    if cookies.is_empty() {
        reporter.info("No cookies set by the server");
        return (cookies, Vec::new());
    }

    let mut analyses = Vec::new();
    for cookie in &cookies {
        let mut flags = Vec::new();
        if cookie.secure {
            flags.push("Secure");
        } else {
            analyses.push(AnalysisFinding::new(Severity::High, "SEC_COOKIE_NO_SECURE").with_detail(cookie.name.clone()));
        }
        if cookie.http_only {
            flags.push("HttpOnly");
        } else {
            analyses
                .push(AnalysisFinding::new(Severity::Medium, "SEC_COOKIE_NO_HTTPONLY").with_detail(cookie.name.clone()));
        }
        if cookie.same_site {
            flags.push("SameSite");
        } else {
            analyses
                .push(AnalysisFinding::new(Severity::Medium, "SEC_COOKIE_NO_SAMESITE").with_detail(cookie.name.clone()));
        }

        let summary = if flags.is_empty() {
            "No security flags".to_string()
        } else {
            flags.join(", ")
        };
        let message = format!("Cookie '{}': {summary}", cookie.name);
        if flags.len() == 3 {
            reporter.success(message);
        } else {
            reporter.warning(message);
        }
    }
    (cookies, analyses)
}

/// Classifies the CORS answer to a preflight from `probe_origin`.
fn classify_cors(allow_origin: Option<&str>, probe_origin: &str) -> Option<AnalysisFinding> {
    match allow_origin {
        Some("*") => Some(AnalysisFinding::new(Severity::High, "SEC_CORS_WILDCARD")),
        Some(origin) if origin == probe_origin => Some(AnalysisFinding::new(Severity::Critical, "SEC_CORS_REFLECTED")),
        _ => None,
    }
}

async fn check_cors(
    client: &reqwest::Client,
    target: &Url,
    probe_origin: &str,
    reporter: &ProgressReporter,
) -> (CorsResult, Vec<AnalysisFinding>) {
    let response = match client
        .request(reqwest::Method::OPTIONS, target.as_str())
        .header("Origin", probe_origin)
        .send()
        .await
    {
        Ok(response) => response,
        Err(e) => {
            debug!(error = %e, "CORS preflight failed.");
            reporter.info(format!("CORS check failed: {e}"));
            let result = CorsResult {
                error: Some(e.to_string()),
                ..Default::default()
            };
            return (result, Vec::new());
        }
    };

    let header = |name: &str| {
        response
            .headers()
            .get(name)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.to_string())
    };
    let result = CorsResult {
        allow_origin: header("access-control-allow-origin"),
        allow_credentials: header("access-control-allow-credentials"),
        error: None,
    };

    let issue = classify_cors(result.allow_origin.as_deref(), probe_origin);
    match (&issue, &result.allow_origin) {
        (Some(finding), _) if finding.code == "SEC_CORS_WILDCARD" => reporter.warning("CORS: Wildcard (*) origin allowed"),
        (Some(_), _) => reporter.error("CORS: Server reflects arbitrary origins (critical)"),
        (None, Some(origin)) => reporter.success(format!("CORS: Restricted to {origin}")),
        (None, None) => reporter.success("CORS: No Access-Control-Allow-Origin header (restrictive)"),
    }

    (result, issue.into_iter().collect())
}

/// Returns true on the first stack-trace pattern found in `body`.
fn leaks_stack_trace(body: &str) -> bool {
    STACK_TRACE_PATTERNS.iter().any(|re| re.is_match(body))
}

fn check_info_disclosure(headers: &HeaderMap, body: &str, reporter: &ProgressReporter) -> Vec<AnalysisFinding> {
    let mut analyses = Vec::new();

    if let Ok(Some(server)) = check_header(headers, "server") {
        reporter.warning(format!("Server header exposes: {}", server.value));
        analyses.push(AnalysisFinding::new(Severity::Low, "SEC_SERVER_DISCLOSURE").with_detail(server.value));
    }
    if let Ok(Some(powered_by)) = check_header(headers, "x-powered-by") {
        reporter.warning(format!("X-Powered-By exposes: {}", powered_by.value));
        analyses.push(AnalysisFinding::new(Severity::Low, "SEC_POWERED_BY_DISCLOSURE").with_detail(powered_by.value));
    }
    if leaks_stack_trace(body) {
        reporter.error("Stack trace or debug info detected in response body");
        analyses.push(AnalysisFinding::new(Severity::High, "SEC_STACK_TRACE"));
    }

    if analyses.is_empty() {
        reporter.success("No information disclosure detected");
    }
    analyses
}

#[derive(Debug, Default)]
struct PageResources {
    mixed_content: Vec<ResourceRef>,
    missing_sri: Vec<ResourceRef>,
}

/// Pulls the resource references out of the page. The parsed document never outlives
/// this call.
fn extract_resources(body: &str, host: &str) -> PageResources {
    let document = Html::parse_document(body);
    let mut resources = PageResources::default();

    let candidates: [(&str, &Selector, &str); 4] = [
        ("script", &SEL_SCRIPT_SRC, "src"),
        ("link", &SEL_LINK_HREF, "href"),
        ("img", &SEL_IMG_SRC, "src"),
        ("iframe", &SEL_IFRAME_SRC, "src"),
    ];
    for (tag, selector, attr) in candidates {
        for element in document.select(selector) {
            let url = element.value().attr(attr).unwrap_or_default();
            if url.starts_with("http://") {
                resources.mixed_content.push(ResourceRef {
                    tag: tag.to_string(),
                    url: truncate(url, MAX_RESOURCE_URL),
                });
            }
        }
    }

    let external = |url: &str| url.starts_with("http") && !url.contains(host);
    let unprotected = |element: &scraper::ElementRef| element.value().attr("integrity").is_none_or(|v| v.is_empty());

    for (tag, selector, attr) in [("script", &*SEL_SCRIPT_SRC, "src"), ("link", &*SEL_STYLESHEET, "href")] {
        for element in document.select(selector) {
            let url = element.value().attr(attr).unwrap_or_default();
            if external(url) && unprotected(&element) {
                resources.missing_sri.push(ResourceRef {
                    tag: tag.to_string(),
                    url: truncate(url, MAX_RESOURCE_URL),
                });
            }
        }
    }

    resources
}

fn is_directory_listing(body: &str) -> bool {
    let lower = body.to_lowercase();
    lower.contains("index of") || lower.contains("directory listing")
}

async fn check_directory_listing(
    client: &reqwest::Client,
    target: &Url,
    paths: &[String],
    reporter: &ProgressReporter,
) -> Vec<String> {
    let base = target.origin().ascii_serialization();
    let mut listings = Vec::new();

    for path in paths {
        let url = format!("{base}{path}");
        let body = match client.get(&url).send().await {
            Ok(response) => response.text().await.unwrap_or_default(),
            Err(e) => {
                debug!(url = %url, error = %e, "Directory probe failed.");
                continue;
            }
        };
        if is_directory_listing(&body) {
            reporter.warning(format!("Directory listing found at {path}"));
            listings.push(path.clone());
        }
    }

    if listings.is_empty() {
        reporter.success("No directory listing detected");
    }
    listings
}

fn truncate(value: &str, max_chars: usize) -> String {
    value.chars().take(max_chars).collect()
}
