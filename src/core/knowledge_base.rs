// src/core/knowledge_base.rs

//! Static, read-only database of every finding code the scanners can raise,
//! with human-readable explanations and remediation steps.
//!
//! Severity is not stored here: it travels with each [`AnalysisFinding`] because the
//! same code can be raised at different severities (for example a slow baseline).
//!
//! [`AnalysisFinding`]: crate::core::models::AnalysisFinding

use std::fmt;

use crate::core::models::ModuleKind;

/// Groups findings by the scan module that raises them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum FindingCategory {
    Dns,
    Tls,
    Performance,
    Security,
    Seo,
}

impl FindingCategory {
    /// Short tag used as a prefix in finding lists.
    pub fn tag(&self) -> &'static str {
        match self {
            FindingCategory::Dns => "[DNS]",
            FindingCategory::Tls => "[TLS]",
            FindingCategory::Performance => "[PERF]",
            FindingCategory::Security => "[SEC]",
            FindingCategory::Seo => "[SEO]",
        }
    }
}

impl From<ModuleKind> for FindingCategory {
    fn from(module: ModuleKind) -> Self {
        match module {
            ModuleKind::Dns => FindingCategory::Dns,
            ModuleKind::Ssl => FindingCategory::Tls,
            ModuleKind::Performance => FindingCategory::Performance,
            ModuleKind::Security => FindingCategory::Security,
            ModuleKind::Seo => FindingCategory::Seo,
        }
    }
}

impl fmt::Display for FindingCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FindingCategory::Dns => write!(f, "DNS & Infrastructure"),
            FindingCategory::Tls => write!(f, "SSL/TLS"),
            FindingCategory::Performance => write!(f, "Performance"),
            FindingCategory::Security => write!(f, "Security"),
            FindingCategory::Seo => write!(f, "SEO"),
        }
    }
}

/// Everything needed to present a finding to a user.
#[derive(Debug)]
pub struct FindingDetail {
    /// Machine-readable identifier, e.g. "SEC_CSP_MISSING".
    pub code: &'static str,
    pub title: &'static str,
    pub category: FindingCategory,
    /// What the finding means and why it matters.
    pub description: &'static str,
    /// Actionable steps to fix it.
    pub remediation: &'static str,
}

static FINDINGS: &[FindingDetail] = &[
    // --- DNS & Infrastructure ---
    FindingDetail {
        code: "DNS_A_RECORD_MISSING",
        title: "No A Record",
        category: FindingCategory::Dns,
        description: "The domain does not resolve to any IPv4 address. Most visitors and crawlers cannot reach the site at all.",
        remediation: "Add an A record pointing the domain to your web server's public IPv4 address and verify it with 'dig A <domain>'.",
    },
    FindingDetail {
        code: "DNS_HTTPS_REDIRECT_MISSING",
        title: "HTTP Does Not Redirect to HTTPS",
        category: FindingCategory::Dns,
        description: "Requests made over plain HTTP are served without being redirected to HTTPS, so visitors who type the bare domain stay on an unencrypted connection.",
        remediation: "Configure the web server or load balancer to answer every HTTP request with a 301 redirect to the HTTPS URL.",
    },
    FindingDetail {
        code: "DNS_PORT_443_CLOSED",
        title: "Port 443 Closed",
        category: FindingCategory::Dns,
        description: "The server does not accept connections on the HTTPS port. Secure traffic cannot be served.",
        remediation: "Open TCP port 443 in the firewall and make sure the web server listens on it with a valid certificate.",
    },
    FindingDetail {
        code: "DNS_IPV6_MISSING",
        title: "No IPv6 Support",
        category: FindingCategory::Dns,
        description: "The domain has no AAAA record. Visitors on IPv6-only networks depend on translation layers to reach the site.",
        remediation: "Enable IPv6 on your hosting and publish an AAAA record for the domain.",
    },
    FindingDetail {
        code: "DNS_DNSSEC_MISSING",
        title: "DNSSEC Not Enabled",
        category: FindingCategory::Dns,
        description: "DNS answers for the domain are not signed. Resolvers cannot detect forged responses, which leaves room for cache poisoning.",
        remediation: "Enable DNSSEC signing at your DNS provider and publish the DS record at your registrar.",
    },
    // --- SSL/TLS ---
    FindingDetail {
        code: "TLS_HOST_UNRESOLVED",
        title: "Host Could Not Be Resolved",
        category: FindingCategory::Tls,
        description: "The hostname did not resolve, so no TLS connection could be attempted.",
        remediation: "Check the domain's DNS records and make sure the hostname is spelled correctly.",
    },
    FindingDetail {
        code: "TLS_HANDSHAKE_FAILED",
        title: "TLS Handshake Failed",
        category: FindingCategory::Tls,
        description: "No TLS session could be established with the server on port 443, even without certificate verification.",
        remediation: "Verify that the server listens on port 443 with TLS enabled and supports at least TLS 1.2.",
    },
    FindingDetail {
        code: "TLS_NO_CERTIFICATE",
        title: "No Certificate Presented",
        category: FindingCategory::Tls,
        description: "The server completed a handshake without presenting a certificate that could be inspected.",
        remediation: "Install a certificate for the domain on the server and make sure it is sent during the handshake.",
    },
    FindingDetail {
        code: "TLS_CERT_INVALID",
        title: "Certificate Invalid or Expired",
        category: FindingCategory::Tls,
        description: "The certificate is outside its validity window. Browsers show a full-page warning and most visitors leave.",
        remediation: "Renew the certificate immediately and automate renewal, for example with an ACME client such as certbot.",
    },
    FindingDetail {
        code: "TLS_CERT_EXPIRING_SOON",
        title: "Certificate Expiring Soon",
        category: FindingCategory::Tls,
        description: "The certificate expires within 30 days. Once it lapses, browsers will refuse the connection.",
        remediation: "Renew the certificate now and set up automated renewal with monitoring.",
    },
    FindingDetail {
        code: "TLS_WEAK_KEY",
        title: "Weak Certificate Key",
        category: FindingCategory::Tls,
        description: "The certificate's RSA or DSA key is shorter than 2048 bits and can be broken with modest resources.",
        remediation: "Reissue the certificate with an RSA key of at least 2048 bits or switch to an ECDSA key.",
    },
    FindingDetail {
        code: "TLS_CERT_UNTRUSTED",
        title: "Certificate Not Trusted",
        category: FindingCategory::Tls,
        description: "The certificate chain could not be verified against the system trust store. It may be self-signed, issued for another name, or missing intermediates.",
        remediation: "Use a certificate from a public CA that matches the hostname and serve the full intermediate chain.",
    },
    FindingDetail {
        code: "TLS_SSLV2_ENABLED",
        title: "SSLv2 Enabled",
        category: FindingCategory::Tls,
        description: "SSLv2 is fundamentally broken and enables attacks such as DROWN against every service sharing the key.",
        remediation: "Disable SSLv2 in the server's TLS configuration.",
    },
    FindingDetail {
        code: "TLS_SSLV3_ENABLED",
        title: "SSLv3 Enabled",
        category: FindingCategory::Tls,
        description: "SSLv3 is vulnerable to the POODLE attack, which lets an attacker decrypt parts of the traffic.",
        remediation: "Disable SSLv3 and allow only TLS 1.2 and TLS 1.3.",
    },
    FindingDetail {
        code: "TLS_1_0_ENABLED",
        title: "TLS 1.0 Enabled",
        category: FindingCategory::Tls,
        description: "TLS 1.0 is deprecated and lacks modern cipher suites. Compliance standards such as PCI DSS forbid it.",
        remediation: "Disable TLS 1.0 in the server configuration.",
    },
    FindingDetail {
        code: "TLS_1_1_ENABLED",
        title: "TLS 1.1 Enabled",
        category: FindingCategory::Tls,
        description: "TLS 1.1 is deprecated and no longer supported by current browsers.",
        remediation: "Disable TLS 1.1 in the server configuration.",
    },
    FindingDetail {
        code: "TLS_NO_MODERN_PROTOCOL",
        title: "No Modern TLS Version",
        category: FindingCategory::Tls,
        description: "Neither TLS 1.2 nor TLS 1.3 was accepted. Current browsers will fail to connect.",
        remediation: "Enable TLS 1.2 and TLS 1.3 on the server.",
    },
    FindingDetail {
        code: "TLS_HEARTBLEED",
        title: "Heartbleed (CVE-2014-0160)",
        category: FindingCategory::Tls,
        description: "The server answers malformed heartbeat requests, leaking process memory that can include private keys and session data.",
        remediation: "Upgrade OpenSSL immediately, then revoke and reissue the certificate and rotate any secrets.",
    },
    FindingDetail {
        code: "TLS_CCS_INJECTION",
        title: "CCS Injection (CVE-2014-0224)",
        category: FindingCategory::Tls,
        description: "The server accepts an early ChangeCipherSpec message, allowing a man-in-the-middle to force weak keying material.",
        remediation: "Upgrade the TLS library to a release that fixes CVE-2014-0224.",
    },
    FindingDetail {
        code: "TLS_COMPRESSION",
        title: "TLS Compression Enabled",
        category: FindingCategory::Tls,
        description: "TLS-level compression exposes the connection to the CRIME attack, which can recover cookies.",
        remediation: "Disable TLS compression in the server or TLS library configuration.",
    },
    FindingDetail {
        code: "TLS_HSTS_MISSING",
        title: "HSTS Not Configured",
        category: FindingCategory::Tls,
        description: "Without Strict-Transport-Security, browsers may still try plain HTTP first, which opens the door to SSL stripping.",
        remediation: "Send 'Strict-Transport-Security: max-age=31536000; includeSubDomains' on HTTPS responses.",
    },
    // --- Performance ---
    FindingDetail {
        code: "PERF_NO_TIERS",
        title: "No Load Tiers Measured",
        category: FindingCategory::Performance,
        description: "The load test produced no measurements, so performance could not be assessed.",
        remediation: "Check the configured load profile and that the target is reachable from the scanner.",
    },
    FindingDetail {
        code: "PERF_SLOW_BASELINE",
        title: "Slow Baseline Response",
        category: FindingCategory::Performance,
        description: "A single user already waits more than half a second on average for the page.",
        remediation: "Profile server-side rendering, add caching and move static assets behind a CDN.",
    },
    FindingDetail {
        code: "PERF_HIGH_ERROR_RATE",
        title: "High Error Rate Under Load",
        category: FindingCategory::Performance,
        description: "A significant share of requests failed or returned server errors at this concurrency level.",
        remediation: "Inspect server logs for 5xx responses and timeouts, and raise worker or connection limits.",
    },
    FindingDetail {
        code: "PERF_HIGH_P95",
        title: "High 95th Percentile Latency",
        category: FindingCategory::Performance,
        description: "At peak load, one request in twenty takes several seconds or more.",
        remediation: "Look for contention such as database locks or exhausted pools, and scale horizontally.",
    },
    FindingDetail {
        code: "PERF_THROUGHPUT_COLLAPSE",
        title: "Throughput Collapse",
        category: FindingCategory::Performance,
        description: "Requests served per user dropped below a tenth of the single-user baseline, showing the server saturates.",
        remediation: "Identify the saturated resource (CPU, memory, connections) and add capacity or caching.",
    },
    // --- Security ---
    FindingDetail {
        code: "SEC_FETCH_FAILED",
        title: "Page Could Not Be Fetched",
        category: FindingCategory::Security,
        description: "The page did not respond, so no security checks could run.",
        remediation: "Make sure the site is reachable and responds within the timeout.",
    },
    FindingDetail {
        code: "SEC_CSP_MISSING",
        title: "Content-Security-Policy Missing",
        category: FindingCategory::Security,
        description: "CSP limits where scripts and other resources may load from. Without it, an XSS flaw can run arbitrary code.",
        remediation: "Add a Content-Security-Policy header listing trusted sources. Start in report-only mode and tighten it gradually.",
    },
    FindingDetail {
        code: "SEC_XCTO_MISSING",
        title: "X-Content-Type-Options Missing",
        category: FindingCategory::Security,
        description: "Browsers may MIME-sniff responses and execute a file disguised as another type.",
        remediation: "Send 'X-Content-Type-Options: nosniff'.",
    },
    FindingDetail {
        code: "SEC_XFO_MISSING",
        title: "X-Frame-Options Missing",
        category: FindingCategory::Security,
        description: "The page can be framed by any site, which enables clickjacking.",
        remediation: "Send 'X-Frame-Options: DENY' or 'SAMEORIGIN', or use the CSP frame-ancestors directive.",
    },
    FindingDetail {
        code: "SEC_HSTS_MISSING",
        title: "Strict-Transport-Security Missing",
        category: FindingCategory::Security,
        description: "Browsers are not told to insist on HTTPS, leaving first visits open to downgrade attacks.",
        remediation: "Send 'Strict-Transport-Security: max-age=31536000; includeSubDomains'.",
    },
    FindingDetail {
        code: "SEC_REFERRER_POLICY_MISSING",
        title: "Referrer-Policy Missing",
        category: FindingCategory::Security,
        description: "Full URLs, possibly with tokens in query strings, may leak to third parties through the Referer header.",
        remediation: "Send 'Referrer-Policy: strict-origin-when-cross-origin' or stricter.",
    },
    FindingDetail {
        code: "SEC_PERMISSIONS_POLICY_MISSING",
        title: "Permissions-Policy Missing",
        category: FindingCategory::Security,
        description: "Embedded content may request powerful browser features such as camera or geolocation.",
        remediation: "Send a Permissions-Policy header disabling the features the site does not use.",
    },
    FindingDetail {
        code: "SEC_XXSS_PROTECTION_MISSING",
        title: "X-XSS-Protection Missing",
        category: FindingCategory::Security,
        description: "Older browsers fall back to their default XSS auditor behaviour.",
        remediation: "Send 'X-XSS-Protection: 0' together with a strong CSP, or '1; mode=block' for legacy clients.",
    },
    FindingDetail {
        code: "SEC_COOKIE_NO_SECURE",
        title: "Cookie Without Secure Flag",
        category: FindingCategory::Security,
        description: "The cookie may be sent over plain HTTP, where it can be intercepted.",
        remediation: "Set the Secure attribute on every cookie.",
    },
    FindingDetail {
        code: "SEC_COOKIE_NO_HTTPONLY",
        title: "Cookie Without HttpOnly Flag",
        category: FindingCategory::Security,
        description: "Scripts can read the cookie, so an XSS flaw can steal sessions.",
        remediation: "Set the HttpOnly attribute on cookies that scripts do not need.",
    },
    FindingDetail {
        code: "SEC_COOKIE_NO_SAMESITE",
        title: "Cookie Without SameSite",
        category: FindingCategory::Security,
        description: "The cookie is attached to cross-site requests, which helps CSRF attacks.",
        remediation: "Set 'SameSite=Lax' or 'SameSite=Strict' on the cookie.",
    },
    FindingDetail {
        code: "SEC_CORS_WILDCARD",
        title: "CORS Allows Any Origin",
        category: FindingCategory::Security,
        description: "Access-Control-Allow-Origin is '*', so any site may read the responses.",
        remediation: "Restrict Access-Control-Allow-Origin to an explicit list of trusted origins.",
    },
    FindingDetail {
        code: "SEC_CORS_REFLECTED",
        title: "CORS Reflects Arbitrary Origins",
        category: FindingCategory::Security,
        description: "The server echoes any Origin back as allowed. Combined with credentials, any site can read authenticated data.",
        remediation: "Validate the Origin header against an allow-list instead of reflecting it.",
    },
    FindingDetail {
        code: "SEC_SERVER_DISCLOSURE",
        title: "Server Version Disclosed",
        category: FindingCategory::Security,
        description: "The Server header reveals software and often its version, helping attackers find known vulnerabilities.",
        remediation: "Remove the Server header or reduce it to a generic value.",
    },
    FindingDetail {
        code: "SEC_POWERED_BY_DISCLOSURE",
        title: "X-Powered-By Disclosed",
        category: FindingCategory::Security,
        description: "The X-Powered-By header reveals the application framework in use.",
        remediation: "Disable the X-Powered-By header in the framework or proxy configuration.",
    },
    FindingDetail {
        code: "SEC_STACK_TRACE",
        title: "Stack Trace in Response",
        category: FindingCategory::Security,
        description: "The page contains error output such as a stack trace, exposing file paths and internals.",
        remediation: "Turn off debug mode in production and serve generic error pages.",
    },
    FindingDetail {
        code: "SEC_MIXED_CONTENT",
        title: "Mixed Content",
        category: FindingCategory::Security,
        description: "An HTTPS page loads resources over plain HTTP, which can be tampered with in transit.",
        remediation: "Load every script, stylesheet, image and frame over HTTPS.",
    },
    FindingDetail {
        code: "SEC_SRI_MISSING",
        title: "Subresource Integrity Missing",
        category: FindingCategory::Security,
        description: "A third-party script or stylesheet is loaded without an integrity hash, so a compromised CDN can inject code.",
        remediation: "Add integrity and crossorigin attributes to external script and link tags.",
    },
    FindingDetail {
        code: "SEC_DIRECTORY_LISTING",
        title: "Directory Listing Enabled",
        category: FindingCategory::Security,
        description: "The server lists the contents of a directory, exposing files that were never meant to be linked.",
        remediation: "Disable automatic indexes (e.g. 'autoindex off' in nginx, 'Options -Indexes' in Apache).",
    },
    // --- SEO ---
    FindingDetail {
        code: "SEO_FETCH_FAILED",
        title: "Page Could Not Be Fetched",
        category: FindingCategory::Seo,
        description: "The page did not respond, so search engines are likely unable to crawl it either.",
        remediation: "Make sure the site is reachable and responds within the timeout.",
    },
    FindingDetail {
        code: "SEO_TITLE_MISSING",
        title: "Title Tag Missing",
        category: FindingCategory::Seo,
        description: "The page has no <title>. Search results will show a generated title, which hurts click-through.",
        remediation: "Add a unique, descriptive <title> of 30 to 60 characters.",
    },
    FindingDetail {
        code: "SEO_TITLE_LENGTH",
        title: "Title Length Out of Range",
        category: FindingCategory::Seo,
        description: "Titles shorter than 30 characters carry little context; longer than 60 get truncated in results.",
        remediation: "Rewrite the title to between 30 and 60 characters.",
    },
    FindingDetail {
        code: "SEO_DESCRIPTION_MISSING",
        title: "Meta Description Missing",
        category: FindingCategory::Seo,
        description: "Without a meta description, search engines pick an arbitrary snippet from the page.",
        remediation: "Add a meta description summarising the page in 120 to 160 characters.",
    },
    FindingDetail {
        code: "SEO_DESCRIPTION_LENGTH",
        title: "Meta Description Length Out of Range",
        category: FindingCategory::Seo,
        description: "The description is too short to be useful or long enough to be truncated.",
        remediation: "Rewrite the description to between 120 and 160 characters.",
    },
    FindingDetail {
        code: "SEO_CANONICAL_MISSING",
        title: "Canonical Link Missing",
        category: FindingCategory::Seo,
        description: "Without rel=canonical, duplicate URLs of the same page can split ranking signals.",
        remediation: "Add <link rel=\"canonical\" href=\"...\"> pointing at the preferred URL.",
    },
    FindingDetail {
        code: "SEO_OPEN_GRAPH_INCOMPLETE",
        title: "Open Graph Tags Incomplete",
        category: FindingCategory::Seo,
        description: "Social networks cannot build a rich preview when og:title, og:description, og:image or og:url is missing.",
        remediation: "Add the four core Open Graph meta tags.",
    },
    FindingDetail {
        code: "SEO_TWITTER_CARDS_INCOMPLETE",
        title: "Twitter Card Tags Incomplete",
        category: FindingCategory::Seo,
        description: "Shared links render as plain text when twitter:card, twitter:title or twitter:description is missing.",
        remediation: "Add the Twitter card meta tags.",
    },
    FindingDetail {
        code: "SEO_H1_MISSING",
        title: "No H1 Heading",
        category: FindingCategory::Seo,
        description: "The page has no main heading, which weakens the signal of what it is about.",
        remediation: "Add exactly one <h1> describing the page's main topic.",
    },
    FindingDetail {
        code: "SEO_H1_MULTIPLE",
        title: "Multiple H1 Headings",
        category: FindingCategory::Seo,
        description: "Several <h1> elements dilute the page's main topic.",
        remediation: "Keep one <h1> and demote the others to <h2> or lower.",
    },
    FindingDetail {
        code: "SEO_HEADING_GAP",
        title: "Heading Levels Skipped",
        category: FindingCategory::Seo,
        description: "The heading outline jumps levels (for example h1 to h3), confusing assistive technology and crawlers.",
        remediation: "Use heading levels in order without skipping.",
    },
    FindingDetail {
        code: "SEO_IMAGES_MISSING_ALT",
        title: "Images Without Alt Text",
        category: FindingCategory::Seo,
        description: "Images without alt text are invisible to screen readers and image search.",
        remediation: "Add a short descriptive alt attribute to every meaningful image.",
    },
    FindingDetail {
        code: "SEO_NON_DESCRIPTIVE_LINKS",
        title: "Non-Descriptive Link Text",
        category: FindingCategory::Seo,
        description: "Links such as 'click here' or 'read more' tell crawlers nothing about their target.",
        remediation: "Use link text that describes the destination.",
    },
    FindingDetail {
        code: "SEO_NO_COMPRESSION",
        title: "Response Not Compressed",
        category: FindingCategory::Seo,
        description: "The HTML is served without gzip or brotli, making the page slower to load.",
        remediation: "Enable gzip or brotli compression on the web server.",
    },
    FindingDetail {
        code: "SEO_PAGE_TOO_LARGE",
        title: "Page Too Large",
        category: FindingCategory::Seo,
        description: "The HTML document exceeds 3 MB, which slows rendering and may be truncated by crawlers.",
        remediation: "Move inline data and scripts to separate cached files and paginate long content.",
    },
    FindingDetail {
        code: "SEO_PAGE_HEAVY",
        title: "Heavy Page",
        category: FindingCategory::Seo,
        description: "The HTML document is larger than 1 MB.",
        remediation: "Trim inline content and defer non-critical markup.",
    },
    FindingDetail {
        code: "SEO_UNMINIFIED_SCRIPTS",
        title: "Unminified Inline Scripts",
        category: FindingCategory::Seo,
        description: "Inline scripts contain comments and whitespace that add weight to every page view.",
        remediation: "Minify scripts as part of the build.",
    },
    FindingDetail {
        code: "SEO_VIEWPORT_MISSING",
        title: "Viewport Meta Tag Missing",
        category: FindingCategory::Seo,
        description: "Without a viewport tag the page renders at desktop width on phones, hurting mobile-first ranking.",
        remediation: "Add <meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">.",
    },
    FindingDetail {
        code: "SEO_VIEWPORT_MISCONFIGURED",
        title: "Viewport Misconfigured",
        category: FindingCategory::Seo,
        description: "The viewport tag does not set width=device-width, so the layout does not adapt to the screen.",
        remediation: "Include 'width=device-width' in the viewport content.",
    },
    FindingDetail {
        code: "SEO_ROBOTS_TXT_MISSING",
        title: "robots.txt Missing",
        category: FindingCategory::Seo,
        description: "Crawlers get no guidance about which parts of the site to skip.",
        remediation: "Publish a robots.txt at the site root, referencing the sitemap.",
    },
    FindingDetail {
        code: "SEO_SITEMAP_MISSING",
        title: "Sitemap Missing",
        category: FindingCategory::Seo,
        description: "No sitemap.xml was found, so crawlers must discover every page through links.",
        remediation: "Generate a sitemap.xml and reference it from robots.txt.",
    },
    FindingDetail {
        code: "SEO_NOINDEX",
        title: "Page Excluded From Indexing",
        category: FindingCategory::Seo,
        description: "A robots meta tag tells search engines not to index this page.",
        remediation: "Remove 'noindex' from the robots meta tag if the page should appear in search results.",
    },
];

/// Retrieves the full detail for a finding code, or `None` for an unknown code.
pub fn get_finding_detail(code: &str) -> Option<&'static FindingDetail> {
    FINDINGS.iter().find(|f| f.code == code)
}
