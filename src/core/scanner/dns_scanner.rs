// src/core/scanner/dns_scanner.rs

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use hickory_resolver::config::{NameServerConfigGroup, ResolverConfig, ResolverOpts};
use hickory_resolver::error::{ResolveError, ResolveErrorKind};
use hickory_resolver::proto::op::{Edns, Message, MessageType, OpCode, Query, ResponseCode};
use hickory_resolver::proto::rr::{Name, RecordType};
use hickory_resolver::system_conf::read_system_conf;
use hickory_resolver::TokioAsyncResolver;
use reqwest::redirect::Policy;
use tokio::net::{TcpStream, UdpSocket};
use tokio::time::timeout;
use tracing::{debug, info, warn};
use url::Url;

use crate::config::ScanConfig;
use crate::core::error::ScanError;
use crate::core::models::{
    AnalysisFinding, DnsFindings, DnssecStatus, Ipv6Result, LatencyResult, ModuleKind, PortStatus,
    PropagationResult, RecordLookup, RedirectResult, ResolutionTiming, Severity,
};
use crate::core::scanner::{http_client, round2, target_host, ModuleFindings, Scanner};
use crate::core::sink::ProgressReporter;

const RECORD_TYPES: &[RecordType] = &[
    RecordType::A,
    RecordType::AAAA,
    RecordType::MX,
    RecordType::NS,
    RecordType::TXT,
    RecordType::SOA,
    RecordType::CNAME,
];

const REDIRECT_CODES: &[u16] = &[301, 302, 307, 308];

pub struct DnsScanner {
    config: Arc<ScanConfig>,
}

impl DnsScanner {
    pub fn new(config: Arc<ScanConfig>) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Scanner for DnsScanner {
    fn module(&self) -> ModuleKind {
        ModuleKind::Dns
    }

    async fn run(&self, target: &Url, reporter: &ProgressReporter) -> Result<ModuleFindings, ScanError> {
        let hostname = target_host(target)?;
        Ok(ModuleFindings::Dns(run_dns_scan(&hostname, &self.config, reporter).await))
    }
}

/// Runs the DNS battery against `hostname`.
///
/// Probes run one after another: record resolution, resolution latency, DNSSEC, propagation
/// across public resolvers, TCP latency, port openness, the HTTP to HTTPS redirect and IPv6
/// support. Every probe failure is logged and turned into a default sub-result.
///
/// # Arguments
/// * `hostname` - The host to scan, as it appears in the target URL.
/// * `config` - Timeouts, the ports to probe and the public resolvers to compare.
/// * `reporter` - Receives one log line per probe.
///
/// # Returns
/// A `DnsFindings` struct containing the raw probe data and the analysis findings.
pub async fn run_dns_scan(hostname: &str, config: &ScanConfig, reporter: &ProgressReporter) -> DnsFindings {
    info!(target = %hostname, "Starting DNS scan.");

    // One system resolver serves the record, timing and IPv6 lookups.
    let resolver = system_resolver(config.timeouts.dns);

    let mut findings = DnsFindings {
        hostname: hostname.to_string(),
        ..Default::default()
    };

    // --- Name resolution ---
    findings.records = resolve_records(&resolver, hostname, reporter).await;
    findings.resolution = measure_resolution_time(&resolver, hostname, reporter).await;
    findings.dnssec = check_dnssec(hostname, config, reporter).await;
    findings.propagation = check_propagation(hostname, config, reporter).await;
    // --- Reachability ---
    findings.latency = check_latency(hostname, config.timeouts.tcp_latency, reporter).await;
    findings.ports = scan_ports(hostname, &config.scan_ports, config.timeouts.port_probe, reporter).await;
    findings.https_redirect = check_https_redirect(hostname, config, reporter).await;
    findings.ipv6 = check_ipv6(&resolver, hostname, reporter).await;

    debug!("All DNS probes completed, starting analysis.");
    findings.analysis = analyze_dns_results(&findings);
    info!(findings = %findings.analysis.len(), "DNS scan finished.");
    findings
}

/// 100 minus the weight of every failed condition, floored at 0.
///
/// Weights: no A record 30, port 443 closed 20, no HTTPS redirect 15, no DNSSEC 10,
/// no IPv6 5.
pub fn calculate_score(findings: &DnsFindings) -> u8 {
    let mut score: i32 = 100;
    if findings.answers("A").is_empty() {
        score -= 30;
    }
    if !findings.https_redirect.redirects_to_https {
        score -= 15;
    }
    if !findings.port_open(443) {
        score -= 20;
    }
    if !findings.ipv6.supported {
        score -= 5;
    }
    if !findings.dnssec.enabled {
        score -= 10;
    }
    score.clamp(0, 100) as u8
}

/// Analyzes the collected DNS data to generate coded findings, one per failed condition
/// that `calculate_score` deducts for.
///
/// # Arguments
/// * `findings` - The probe results gathered by `run_dns_scan`.
///
/// # Returns
/// A vector of `AnalysisFinding`.
fn analyze_dns_results(findings: &DnsFindings) -> Vec<AnalysisFinding> {
    let mut analyses = Vec::new();

    if findings.answers("A").is_empty() {
        analyses.push(AnalysisFinding::new(Severity::Critical, "DNS_A_RECORD_MISSING"));
    }
    if !findings.https_redirect.redirects_to_https {
        analyses.push(AnalysisFinding::new(Severity::Medium, "DNS_HTTPS_REDIRECT_MISSING"));
    }
    if !findings.port_open(443) {
        analyses.push(AnalysisFinding::new(Severity::High, "DNS_PORT_443_CLOSED"));
    }
    if !findings.ipv6.supported {
        analyses.push(AnalysisFinding::new(Severity::Low, "DNS_IPV6_MISSING"));
    }
    if !findings.dnssec.enabled {
        analyses.push(AnalysisFinding::new(Severity::Medium, "DNS_DNSSEC_MISSING"));
    }

    analyses
}

fn resolver_opts(dns_timeout: Duration) -> ResolverOpts {
    let mut opts = ResolverOpts::default();
    opts.timeout = dns_timeout;
    opts.attempts = 1;
    opts
}

fn system_resolver(dns_timeout: Duration) -> TokioAsyncResolver {
    let config = match read_system_conf() {
        Ok((config, _)) => config,
        Err(e) => {
            warn!(error = %e, "Could not read system resolver configuration, using defaults.");
            ResolverConfig::default()
        }
    };
    TokioAsyncResolver::tokio(config, resolver_opts(dns_timeout))
}

fn is_nxdomain(error: &ResolveError) -> bool {
    matches!(
        error.kind(),
        ResolveErrorKind::NoRecordsFound { response_code, .. } if *response_code == ResponseCode::NXDomain
    )
}

fn is_no_answer(error: &ResolveError) -> bool {
    matches!(error.kind(), ResolveErrorKind::NoRecordsFound { .. })
}

async fn resolve_records(
    resolver: &TokioAsyncResolver,
    hostname: &str,
    reporter: &ProgressReporter,
) -> Vec<RecordLookup> {
    let mut records = Vec::with_capacity(RECORD_TYPES.len());

    for record_type in RECORD_TYPES {
        debug!(target = %hostname, %record_type, "Resolving records.");
        let answers = match resolver.lookup(hostname, *record_type).await {
            Ok(lookup) => {
                let values: Vec<String> = lookup.iter().map(|rdata| rdata.to_string()).collect();
                if values.is_empty() {
                    reporter.info(format!("No {record_type} records found"));
                    Ok(None)
                } else {
                    reporter.success(format!("{record_type} records found ({})", values.len()));
                    Ok(Some(values))
                }
            }
            Err(e) if is_nxdomain(&e) => {
                reporter.error(format!("Domain does not exist (NXDOMAIN) when querying {record_type}"));
                Ok(None)
            }
            Err(e) if is_no_answer(&e) => {
                reporter.info(format!("No {record_type} records found"));
                Ok(None)
            }
            Err(e) => {
                warn!(target = %hostname, %record_type, error = %e, "Record lookup failed.");
                reporter.warning(format!("Failed to resolve {record_type}: {e}"));
                Err(format!("DNS Error: {e}"))
            }
        };
        records.push(RecordLookup {
            record_type: record_type.to_string(),
            answers,
        });
    }

    records
}

async fn measure_resolution_time(
    resolver: &TokioAsyncResolver,
    hostname: &str,
    reporter: &ProgressReporter,
) -> ResolutionTiming {
    let start = Instant::now();
    match resolver.lookup(hostname, RecordType::A).await {
        Ok(_) => {
            let elapsed_ms = round2(start.elapsed().as_secs_f64() * 1000.0);
            reporter.success(format!("DNS resolution time: {elapsed_ms}ms"));
            ResolutionTiming {
                resolution_ms: Some(elapsed_ms),
                error: None,
            }
        }
        Err(e) => {
            reporter.error(format!("DNS resolution failed: {e}"));
            ResolutionTiming {
                resolution_ms: None,
                error: Some(e.to_string()),
            }
        }
    }
}

async fn check_dnssec(hostname: &str, config: &ScanConfig, reporter: &ProgressReporter) -> DnssecStatus {
    let server = config
        .propagation_resolvers
        .first()
        .map(|resolver| resolver.address)
        .unwrap_or(IpAddr::V4(Ipv4Addr::new(8, 8, 8, 8)));

    match query_authentic_data(hostname, SocketAddr::new(server, 53), config.timeouts.dns).await {
        Ok(true) => {
            reporter.success("DNSSEC is enabled");
            DnssecStatus {
                enabled: true,
                error: None,
            }
        }
        Ok(false) => {
            reporter.warning("DNSSEC is not enabled");
            DnssecStatus::default()
        }
        Err(e) => {
            reporter.warning(format!("DNSSEC check failed: {e}"));
            DnssecStatus {
                enabled: false,
                error: Some(e),
            }
        }
    }
}

/// Sends an A query with the DO bit to a validating resolver and reports the AD flag of
/// the answer.
async fn query_authentic_data(hostname: &str, server: SocketAddr, wait: Duration) -> Result<bool, String> {
    let name = Name::from_ascii(hostname).map_err(|e| e.to_string())?;

    let mut edns = Edns::new();
    edns.set_dnssec_ok(true);
    edns.set_max_payload(4096);

    let mut message = Message::new();
    message
        .set_id(rand_id())
        .set_message_type(MessageType::Query)
        .set_op_code(OpCode::Query)
        .set_recursion_desired(true)
        .set_authentic_data(true)
        .add_query(Query::query(name, RecordType::A));
    message.set_edns(edns);
    let request = message.to_vec().map_err(|e| e.to_string())?;

    let bind: SocketAddr = match server {
        SocketAddr::V4(_) => SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 0),
        SocketAddr::V6(_) => SocketAddr::new(IpAddr::V6(Ipv6Addr::UNSPECIFIED), 0),
    };
    let socket = UdpSocket::bind(bind).await.map_err(|e| e.to_string())?;
    socket.send_to(&request, server).await.map_err(|e| e.to_string())?;

    let mut buffer = vec![0u8; 4096];
    let (len, _) = timeout(wait, socket.recv_from(&mut buffer))
        .await
        .map_err(|_| "DNSSEC query timed out".to_string())?
        .map_err(|e| e.to_string())?;

    let response = Message::from_vec(&buffer[..len]).map_err(|e| e.to_string())?;
    if response.response_code() != ResponseCode::NoError {
        return Err(format!("resolver answered {}", response.response_code()));
    }
    Ok(response.authentic_data())
}

fn rand_id() -> u16 {
    let bytes = uuid::Uuid::new_v4().into_bytes();
    u16::from_be_bytes([bytes[0], bytes[1]])
}

async fn check_propagation(
    hostname: &str,
    config: &ScanConfig,
    reporter: &ProgressReporter,
) -> Vec<PropagationResult> {
    let mut propagation = Vec::with_capacity(config.propagation_resolvers.len());

    for public in &config.propagation_resolvers {
        let group = NameServerConfigGroup::from_ips_clear(&[public.address], 53, true);
        let resolver = TokioAsyncResolver::tokio(
            ResolverConfig::from_parts(None, vec![], group),
            resolver_opts(config.timeouts.dns),
        );

        let answers = match resolver.lookup(hostname, RecordType::A).await {
            Ok(lookup) => {
                let ips: Vec<String> = lookup.iter().map(|rdata| rdata.to_string()).collect();
                reporter.success(format!(
                    "Propagation OK on {} DNS ({}): {}",
                    public.name,
                    public.address,
                    ips.join(", ")
                ));
                Ok(Some(ips))
            }
            Err(e) => {
                reporter.warning(format!(
                    "Propagation failed on {} DNS ({}): {e}",
                    public.name, public.address
                ));
                Err(e.to_string())
            }
        };

        propagation.push(PropagationResult {
            resolver: public.name.clone(),
            address: public.address,
            answers,
        });
    }

    propagation
}

async fn tcp_connect(hostname: &str, port: u16, wait: Duration) -> Result<Duration, String> {
    let start = Instant::now();
    match timeout(wait, TcpStream::connect((hostname, port))).await {
        Ok(Ok(_stream)) => Ok(start.elapsed()),
        Ok(Err(e)) => Err(e.to_string()),
        Err(_) => Err("connection timed out".to_string()),
    }
}

async fn check_latency(hostname: &str, wait: Duration, reporter: &ProgressReporter) -> LatencyResult {
    for port in [443, 80] {
        match tcp_connect(hostname, port, wait).await {
            Ok(elapsed) => {
                let latency_ms = round2(elapsed.as_secs_f64() * 1000.0);
                reporter.success(format!("TCP latency to port {port}: {latency_ms}ms"));
                return LatencyResult {
                    port: Some(port),
                    latency_ms: Some(latency_ms),
                };
            }
            Err(e) => debug!(port, error = %e, "Latency probe failed."),
        }
    }

    reporter.error("Could not measure latency (ports 443 and 80 unreachable)");
    LatencyResult::default()
}

async fn scan_ports(hostname: &str, ports: &[u16], wait: Duration, reporter: &ProgressReporter) -> Vec<PortStatus> {
    let mut statuses = Vec::with_capacity(ports.len());
    for &port in ports {
        let open = tcp_connect(hostname, port, wait).await.is_ok();
        if open {
            reporter.success(format!("Port {port} is open"));
        } else if port == 443 {
            reporter.error(format!("Port {port} is closed"));
        } else {
            reporter.info(format!("Port {port} is closed"));
        }
        statuses.push(PortStatus { port, open });
    }
    statuses
}

async fn check_https_redirect(hostname: &str, config: &ScanConfig, reporter: &ProgressReporter) -> RedirectResult {
    let client = match http_client(config, config.timeouts.redirect, Policy::none()) {
        Ok(client) => client,
        Err(e) => {
            reporter.warning(format!("HTTPS redirect check failed: {e}"));
            return RedirectResult {
                error: Some(e.to_string()),
                ..Default::default()
            };
        }
    };

    let host = if hostname.contains(':') {
        format!("[{hostname}]")
    } else {
        hostname.to_string()
    };

    match client.get(format!("http://{host}")).send().await {
        Ok(response) => {
            let status = response.status().as_u16();
            let location = response
                .headers()
                .get(reqwest::header::LOCATION)
                .and_then(|value| value.to_str().ok())
                .unwrap_or_default()
                .to_string();
            let redirects = REDIRECT_CODES.contains(&status);
            let to_https = redirects && location.starts_with("https://");

            if to_https {
                reporter.success(format!("HTTP redirects to HTTPS ({status} -> {location})"));
            } else if redirects {
                reporter.warning(format!("HTTP redirects but not to HTTPS ({location})"));
            } else {
                reporter.warning("No HTTP -> HTTPS redirect detected");
            }

            RedirectResult {
                redirects_to_https: to_https,
                status_code: Some(status),
                location: (!location.is_empty()).then_some(location),
                error: None,
            }
        }
        Err(e) => {
            reporter.warning(format!("HTTPS redirect check failed: {e}"));
            RedirectResult {
                error: Some(e.to_string()),
                ..Default::default()
            }
        }
    }
}

async fn check_ipv6(resolver: &TokioAsyncResolver, hostname: &str, reporter: &ProgressReporter) -> Ipv6Result {
    match resolver.ipv6_lookup(hostname).await {
        Ok(lookup) => {
            let addresses: Vec<String> = lookup.iter().map(|aaaa| aaaa.to_string()).collect();
            if addresses.is_empty() {
                reporter.warning("No IPv6 (AAAA) records found");
                return Ipv6Result::default();
            }
            reporter.success(format!("IPv6 supported: {}", addresses.join(", ")));
            Ipv6Result {
                supported: true,
                addresses,
                error: None,
            }
        }
        Err(e) if is_no_answer(&e) => {
            reporter.warning("No IPv6 (AAAA) records found");
            Ipv6Result::default()
        }
        Err(e) => {
            reporter.warning(format!("IPv6 check failed: {e}"));
            Ipv6Result {
                error: Some(e.to_string()),
                ..Default::default()
            }
        }
    }
}
