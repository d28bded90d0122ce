// src/core/scanner/seo_scanner.rs

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use reqwest::header::{ACCEPT_ENCODING, CONTENT_ENCODING, CONTENT_TYPE};
use reqwest::redirect::Policy;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, error, info};
use url::Url;

use crate::config::ScanConfig;
use crate::core::error::ScanError;
use crate::core::models::{
    AnalysisFinding, ContentCheck, IndexationCheck, MetaTagsCheck, MobileCheck, ModuleKind, SeoFindings, Severity,
    StructuredData, TagCheck, TechnicalCheck,
};
use crate::core::scanner::{http_client, round2, ModuleFindings, Scanner};
use crate::core::sink::ProgressReporter;

const OPEN_GRAPH_PROPERTIES: [&str; 5] = ["og:title", "og:description", "og:image", "og:url", "og:type"];
const TWITTER_CARD_NAMES: [&str; 4] = ["twitter:card", "twitter:title", "twitter:description", "twitter:image"];
const GENERIC_LINK_TEXTS: [&str; 5] = ["click here", "here", "read more", "more", "link"];
const COMPRESSED_ENCODINGS: [&str; 3] = ["gzip", "br", "deflate"];

static SEL_TITLE: Lazy<Selector> = Lazy::new(|| Selector::parse("title").unwrap());
static SEL_CANONICAL: Lazy<Selector> = Lazy::new(|| Selector::parse(r#"link[rel~="canonical"]"#).unwrap());
static SEL_H1: Lazy<Selector> = Lazy::new(|| Selector::parse("h1").unwrap());
static SEL_IMG: Lazy<Selector> = Lazy::new(|| Selector::parse("img").unwrap());
static SEL_LINK: Lazy<Selector> = Lazy::new(|| Selector::parse("a[href]").unwrap());
static SEL_INLINE_SCRIPT: Lazy<Selector> = Lazy::new(|| Selector::parse("script:not([src])").unwrap());
static SEL_STYLE: Lazy<Selector> = Lazy::new(|| Selector::parse("style").unwrap());
static SEL_JSON_LD: Lazy<Selector> = Lazy::new(|| Selector::parse(r#"script[type="application/ld+json"]"#).unwrap());
static SEL_MICRODATA: Lazy<Selector> = Lazy::new(|| Selector::parse("[itemtype]").unwrap());
static SEL_HEADINGS: Lazy<[Selector; 6]> = Lazy::new(|| {
    ["h1", "h2", "h3", "h4", "h5", "h6"].map(|tag| Selector::parse(tag).unwrap())
});

pub struct SeoScanner {
    config: Arc<ScanConfig>,
}

impl SeoScanner {
    pub fn new(config: Arc<ScanConfig>) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Scanner for SeoScanner {
    fn module(&self) -> ModuleKind {
        ModuleKind::Seo
    }

    async fn run(&self, target: &Url, reporter: &ProgressReporter) -> Result<ModuleFindings, ScanError> {
        Ok(ModuleFindings::Seo(run_seo_scan(target, &self.config, reporter).await?))
    }
}

pub async fn run_seo_scan(
    target: &Url,
    config: &ScanConfig,
    reporter: &ProgressReporter,
) -> Result<SeoFindings, ScanError> {
    info!(target = %target, "Starting SEO scan.");

    let client = http_client(config, config.timeouts.page_fetch, Policy::limited(10))?;
    let mut findings = SeoFindings {
        url: target.to_string(),
        ..Default::default()
    };

    let started = Instant::now();
    let response = match client.get(target.as_str()).send().await {
        Ok(response) => response,
        Err(e) => {
            error!(url = %target, error = %e, "HTTP request failed for SEO scan.");
            reporter.error(format!("Failed to fetch URL: {e}"));
            findings.error = Some(e.to_string());
            findings.analysis = vec![AnalysisFinding::new(Severity::Critical, "SEO_FETCH_FAILED").with_detail(e.to_string())];
            return Ok(findings);
        }
    };
    let response_time_ms = round2(started.elapsed().as_secs_f64() * 1000.0);
    let html = match response.text().await {
        Ok(text) => text,
        Err(e) => {
            reporter.error(format!("Failed to read page body: {e}"));
            findings.error = Some(e.to_string());
            findings.analysis = vec![AnalysisFinding::new(Severity::Critical, "SEO_FETCH_FAILED").with_detail(e.to_string())];
            return Ok(findings);
        }
    };
    debug!(bytes = %html.len(), "Successfully read page body.");

    let page = PageSnapshot::parse(&html);
    let encoding = probe_compression(target, config).await;
    let mut analysis = Vec::new();

    let (meta, issues) = check_meta(&page, reporter);
    findings.meta = meta;
    analysis.extend(issues);

    let (content, issues) = check_content(&page, reporter);
    findings.content = content;
    analysis.extend(issues);

    let page_size_kb = html.len() as f64 / 1024.0;
    let (technical, issues) = check_technical(
        encoding.as_deref(),
        page_size_kb,
        response_time_ms,
        page.unminified_inline_scripts,
        reporter,
    );
    findings.technical = technical;
    analysis.extend(issues);

    let (mobile, issues) = check_mobile(&page, reporter);
    findings.mobile = mobile;
    analysis.extend(issues);

    let aux_client = http_client(config, config.timeouts.aux_fetch, Policy::none())?;
    let crawl_files = fetch_crawl_files(&aux_client, target, reporter).await;
    let (indexation, issues) = check_indexation(crawl_files, page.robots.as_deref(), reporter);
    findings.indexation = indexation;
    analysis.extend(issues);

    findings.structured_data = report_structured_data(page.structured_data, reporter);
    findings.meta.robots = page.robots;

    findings.analysis = analysis;
    info!(findings = %findings.analysis.len(), "SEO scan finished.");
    Ok(findings)
}

/// Weighted blend of the five sub-scores: meta 20%, content 25%, technical 25%,
/// mobile 15%, indexation 15%. Halves round to even.
pub fn calculate_score(findings: &SeoFindings) -> u8 {
    if findings.error.is_some() {
        return 0;
    }
    let weighted = f64::from(findings.meta.score) * 0.20
        + f64::from(findings.content.score) * 0.25
        + f64::from(findings.technical.score) * 0.25
        + f64::from(findings.mobile.score) * 0.15
        + f64::from(findings.indexation.score) * 0.15;
    weighted.round_ties_even().clamp(0.0, 100.0) as u8
}

fn floor_score(score: i32) -> u8 {
    score.clamp(0, 100) as u8
}

// --- Page parsing ---

/// Everything the checks need from the document. `Html` is not `Send`, so the page is
/// reduced to plain data before the scan awaits anything else.
#[derive(Debug, Default)]
struct PageSnapshot {
    title: Option<String>,
    description: Option<String>,
    canonical: Option<String>,
    robots: Option<String>,
    open_graph: Vec<String>,
    twitter_cards: Vec<String>,
    h1_texts: Vec<String>,
    heading_counts: [usize; 6],
    total_images: usize,
    images_without_alt: usize,
    total_links: usize,
    non_descriptive_links: usize,
    unminified_inline_scripts: usize,
    viewport: Option<String>,
    has_media_queries: bool,
    structured_data: StructuredData,
}

impl PageSnapshot {
    fn parse(html: &str) -> Self {
        let doc = Html::parse_document(html);

        let title = doc.select(&SEL_TITLE).next().map(stripped_text);
        let description = meta_content(&doc, "name", "description").map(|text| text.trim().to_string());
        let canonical = doc
            .select(&SEL_CANONICAL)
            .next()
            .map(|el| el.value().attr("href").unwrap_or_default().to_string());

        let present = |attr: &str, names: &[&str]| -> Vec<String> {
            names
                .iter()
                .filter(|name| meta_content(&doc, attr, name).is_some_and(|content| !content.is_empty()))
                .map(|name| name.to_string())
                .collect()
        };
        let open_graph = present("property", &OPEN_GRAPH_PROPERTIES);
        let twitter_cards = present("name", &TWITTER_CARD_NAMES);

        let h1_texts = doc
            .select(&SEL_H1)
            .map(|el| stripped_text(el).chars().take(100).collect())
            .collect();
        let heading_counts = SEL_HEADINGS.each_ref().map(|selector| doc.select(selector).count());

        let images: Vec<ElementRef> = doc.select(&SEL_IMG).collect();
        let images_without_alt = images
            .iter()
            .filter(|img| img.value().attr("alt").is_none_or(str::is_empty))
            .count();

        let links: Vec<ElementRef> = doc.select(&SEL_LINK).collect();
        let non_descriptive_links = links
            .iter()
            .filter(|a| GENERIC_LINK_TEXTS.contains(&stripped_text(**a).to_lowercase().as_str()))
            .count();

        let unminified_inline_scripts = doc
            .select(&SEL_INLINE_SCRIPT)
            .map(|script| script.text().collect::<String>())
            .filter(|text| looks_unminified(text))
            .count();

        let has_media_queries = doc
            .select(&SEL_STYLE)
            .any(|style| style.text().collect::<String>().contains("@media"));

        Self {
            title,
            description,
            canonical,
            robots: meta_content(&doc, "name", "robots"),
            open_graph,
            twitter_cards,
            h1_texts,
            heading_counts,
            total_images: images.len(),
            images_without_alt,
            total_links: links.len(),
            non_descriptive_links,
            unminified_inline_scripts,
            viewport: meta_content(&doc, "name", "viewport"),
            has_media_queries,
            structured_data: extract_structured_data(&doc),
        }
    }
}

/// Text of an element with every text node trimmed and concatenated.
fn stripped_text(el: ElementRef) -> String {
    el.text().map(str::trim).collect()
}

/// Content of the first `<meta {attr}="{value}">` tag; an absent `content` reads as empty.
fn meta_content(doc: &Html, attr: &str, value: &str) -> Option<String> {
    let selector_str = format!("meta[{attr}='{value}']");
    let selector = Selector::parse(&selector_str).ok()?;
    doc.select(&selector)
        .next()
        .map(|el| el.value().attr("content").unwrap_or_default().to_string())
}

/// Long inline scripts spread over many lines were not run through a minifier.
fn looks_unminified(script: &str) -> bool {
    script.chars().count() > 200 && script.trim().split('\n').count() > 10
}

fn extract_structured_data(doc: &Html) -> StructuredData {
    let mut json_ld_types = Vec::new();
    for script in doc.select(&SEL_JSON_LD) {
        let raw: String = script.text().collect();
        let type_of = |item: &serde_json::Value| match item.get("@type") {
            Some(serde_json::Value::String(name)) => name.clone(),
            Some(other) => other.to_string(),
            None => "unknown".to_string(),
        };
        match serde_json::from_str::<serde_json::Value>(&raw) {
            Ok(item @ serde_json::Value::Object(_)) => json_ld_types.push(type_of(&item)),
            Ok(serde_json::Value::Array(items)) => {
                json_ld_types.extend(items.iter().filter(|item| item.is_object()).map(type_of));
            }
            Ok(_) => {}
            Err(e) => debug!(error = %e, "Ignoring unparsable JSON-LD block."),
        }
    }
    StructuredData {
        json_ld_types,
        json_ld_count: doc.select(&SEL_JSON_LD).count(),
        microdata_items: doc.select(&SEL_MICRODATA).count(),
    }
}

// --- Checks ---

fn check_meta(page: &PageSnapshot, reporter: &ProgressReporter) -> (MetaTagsCheck, Vec<AnalysisFinding>) {
    let mut score: i32 = 100;
    let mut analyses = Vec::new();

    let title_len = page.title.as_deref().map_or(0, |t| t.chars().count());
    match page.title.as_deref() {
        None | Some("") => {
            score -= 25;
            reporter.error("Missing <title> tag");
            analyses.push(AnalysisFinding::new(Severity::High, "SEO_TITLE_MISSING"));
        }
        Some(_) if !(30..=60).contains(&title_len) => {
            score -= 10;
            reporter.warning(format!("Title length ({title_len} chars) outside optimal range (30-60)"));
            analyses.push(AnalysisFinding::new(Severity::Low, "SEO_TITLE_LENGTH").with_detail(format!("{title_len} chars")));
        }
        Some(_) => reporter.success(format!("Title tag present ({title_len} chars)")),
    }

    let desc_len = page.description.as_deref().map_or(0, |d| d.chars().count());
    match page.description.as_deref() {
        None | Some("") => {
            score -= 20;
            reporter.error("Missing meta description");
            analyses.push(AnalysisFinding::new(Severity::Medium, "SEO_DESCRIPTION_MISSING"));
        }
        Some(_) if !(120..=160).contains(&desc_len) => {
            score -= 5;
            reporter.warning(format!(
                "Meta description length ({desc_len} chars) outside optimal range (120-160)"
            ));
            analyses
                .push(AnalysisFinding::new(Severity::Low, "SEO_DESCRIPTION_LENGTH").with_detail(format!("{desc_len} chars")));
        }
        Some(_) => reporter.success(format!("Meta description present ({desc_len} chars)")),
    }

    match &page.canonical {
        Some(href) => reporter.success(format!("Canonical URL: {href}")),
        None => {
            score -= 10;
            reporter.warning("Missing canonical URL");
            analyses.push(AnalysisFinding::new(Severity::Low, "SEO_CANONICAL_MISSING"));
        }
    }

    let og_present = page.open_graph.len();
    if og_present < 3 {
        score -= 10;
        reporter.warning(format!("Only {og_present}/5 Open Graph tags found"));
        analyses.push(AnalysisFinding::new(Severity::Low, "SEO_OPEN_GRAPH_INCOMPLETE").with_detail(format!("{og_present}/5")));
    } else {
        reporter.success(format!("Open Graph tags: {og_present}/5 present"));
    }

    if page.twitter_cards.len() < 2 {
        score -= 5;
        analyses.push(
            AnalysisFinding::new(Severity::Low, "SEO_TWITTER_CARDS_INCOMPLETE")
                .with_detail(format!("{}/4", page.twitter_cards.len())),
        );
    }

    let meta = MetaTagsCheck {
        score: floor_score(score),
        title: TagCheck {
            exists: page.title.is_some(),
            text: page.title.clone(),
            length: title_len,
        },
        description: TagCheck {
            exists: desc_len > 0,
            text: page.description.clone(),
            length: desc_len,
        },
        canonical: page.canonical.clone(),
        robots: None,
        open_graph: page.open_graph.clone(),
        twitter_cards: page.twitter_cards.clone(),
    };
    (meta, analyses)
}

/// A heading level is used while the level above it is not.
fn has_heading_gap(counts: &[usize; 6]) -> bool {
    counts.windows(2).any(|pair| pair[1] > 0 && pair[0] == 0)
}

fn check_content(page: &PageSnapshot, reporter: &ProgressReporter) -> (ContentCheck, Vec<AnalysisFinding>) {
    let mut score: i32 = 100;
    let mut analyses = Vec::new();

    match page.h1_texts.as_slice() {
        [] => {
            score -= 25;
            reporter.error("No H1 tag found");
            analyses.push(AnalysisFinding::new(Severity::High, "SEO_H1_MISSING"));
        }
        [only] => {
            let preview: String = only.chars().take(60).collect();
            reporter.success(format!("Single H1 tag: \"{preview}\""));
        }
        many => {
            score -= 10;
            reporter.warning(format!("Multiple H1 tags found ({}). Use only one H1.", many.len()));
            analyses.push(AnalysisFinding::new(Severity::Medium, "SEO_H1_MULTIPLE").with_detail(many.len().to_string()));
        }
    }

    let hierarchy_valid = !has_heading_gap(&page.heading_counts);
    if hierarchy_valid {
        reporter.success("Heading hierarchy is valid");
    } else {
        score -= 10;
        reporter.warning("Heading hierarchy has gaps (e.g. H1 -> H3 without H2)");
        analyses.push(AnalysisFinding::new(Severity::Low, "SEO_HEADING_GAP"));
    }

    let (total, missing) = (page.total_images, page.images_without_alt);
    if total > 0 && missing > 0 {
        let pct = missing as f64 / total as f64 * 100.0;
        score -= ((pct / 5.0) as i32).min(20);
        reporter.warning(format!("{missing}/{total} images missing alt attribute"));
        analyses.push(
            AnalysisFinding::new(Severity::Medium, "SEO_IMAGES_MISSING_ALT").with_detail(format!("{missing}/{total}")),
        );
    } else if total > 0 {
        reporter.success(format!("All {total} images have alt attributes"));
    }

    let vague = page.non_descriptive_links;
    if vague > 0 {
        score -= (vague as i32 * 2).min(10);
        reporter.warning(format!("{vague} link(s) with non-descriptive text"));
        analyses.push(AnalysisFinding::new(Severity::Low, "SEO_NON_DESCRIPTIVE_LINKS").with_detail(vague.to_string()));
    }

    let content = ContentCheck {
        score: floor_score(score),
        h1_texts: page.h1_texts.clone(),
        heading_counts: page.heading_counts,
        hierarchy_valid,
        total_images: total,
        images_without_alt: missing,
        total_links: page.total_links,
        non_descriptive_links: vague,
    };
    (content, analyses)
}

fn check_technical(
    encoding: Option<&str>,
    page_size_kb: f64,
    response_time_ms: f64,
    unminified_inline_scripts: usize,
    reporter: &ProgressReporter,
) -> (TechnicalCheck, Vec<AnalysisFinding>) {
    let mut score: i32 = 100;
    let mut analyses = Vec::new();

    let compression = encoding
        .map(str::to_lowercase)
        .filter(|enc| COMPRESSED_ENCODINGS.contains(&enc.as_str()));
    match &compression {
        Some(enc) => reporter.success(format!("Compression enabled: {enc}")),
        None => {
            score -= 15;
            reporter.warning("No compression (Gzip/Brotli) detected");
            analyses.push(AnalysisFinding::new(Severity::Medium, "SEO_NO_COMPRESSION"));
        }
    }

    if page_size_kb > 500.0 {
        score -= 20;
        reporter.warning(format!("Large page size: {page_size_kb:.0} KB"));
        analyses.push(AnalysisFinding::new(Severity::Medium, "SEO_PAGE_TOO_LARGE").with_detail(format!("{page_size_kb:.0} KB")));
    } else if page_size_kb > 200.0 {
        score -= 10;
        reporter.warning(format!("Page size: {page_size_kb:.0} KB (consider optimizing)"));
        analyses.push(AnalysisFinding::new(Severity::Low, "SEO_PAGE_HEAVY").with_detail(format!("{page_size_kb:.0} KB")));
    } else {
        reporter.success(format!("Page size: {page_size_kb:.0} KB"));
    }

    if unminified_inline_scripts > 0 {
        score -= 5;
        reporter.info(format!("{unminified_inline_scripts} inline script(s) appear unminified"));
        analyses.push(
            AnalysisFinding::new(Severity::Low, "SEO_UNMINIFIED_SCRIPTS").with_detail(unminified_inline_scripts.to_string()),
        );
    }

    let technical = TechnicalCheck {
        score: floor_score(score),
        compression,
        page_size_kb: round2(page_size_kb),
        response_time_ms,
        unminified_inline_scripts,
    };
    (technical, analyses)
}

fn check_mobile(page: &PageSnapshot, reporter: &ProgressReporter) -> (MobileCheck, Vec<AnalysisFinding>) {
    let mut score: i32 = 100;
    let mut analyses = Vec::new();

    match page.viewport.as_deref() {
        None => {
            score -= 40;
            reporter.error("Missing viewport meta tag (critical for mobile)");
            analyses.push(AnalysisFinding::new(Severity::High, "SEO_VIEWPORT_MISSING"));
        }
        Some(content) if content.contains("width=device-width") => {
            reporter.success("Viewport meta tag configured correctly");
        }
        Some(content) => {
            score -= 15;
            reporter.warning(format!("Viewport configuration may not be optimal: {content}"));
            analyses.push(AnalysisFinding::new(Severity::Medium, "SEO_VIEWPORT_MISCONFIGURED").with_detail(content));
        }
    }

    let mobile = MobileCheck {
        score: floor_score(score),
        viewport: page.viewport.clone(),
        has_media_queries: page.has_media_queries,
    };
    (mobile, analyses)
}

/// Presence of the crawler files, or the probe error.
#[derive(Debug, Clone, PartialEq, Eq)]
struct CrawlFiles {
    robots_txt: Result<bool, String>,
    sitemap: Result<bool, String>,
}

async fn fetch_crawl_files(client: &reqwest::Client, target: &Url, reporter: &ProgressReporter) -> CrawlFiles {
    let base = target.origin().ascii_serialization();

    let robots_txt = match client.get(format!("{base}/robots.txt")).send().await {
        Ok(response) => Ok(response.status().as_u16() == 200),
        Err(e) => {
            reporter.warning(format!("robots.txt check failed: {e}"));
            Err(e.to_string())
        }
    };

    let sitemap = match client.get(format!("{base}/sitemap.xml")).send().await {
        Ok(response) => {
            let is_xml = response
                .headers()
                .get(CONTENT_TYPE)
                .and_then(|value| value.to_str().ok())
                .is_some_and(|value| value.contains("xml"));
            Ok(response.status().as_u16() == 200 && is_xml)
        }
        Err(e) => {
            reporter.warning(format!("sitemap.xml check failed: {e}"));
            Err(e.to_string())
        }
    };

    CrawlFiles { robots_txt, sitemap }
}

fn check_indexation(
    files: CrawlFiles,
    robots_meta: Option<&str>,
    reporter: &ProgressReporter,
) -> (IndexationCheck, Vec<AnalysisFinding>) {
    let mut score: i32 = 100;
    let mut analyses = Vec::new();

    // A failed probe was already reported when it happened.
    let robots_txt = matches!(files.robots_txt, Ok(true));
    if robots_txt {
        reporter.success("robots.txt found");
    } else {
        score -= 10;
        if files.robots_txt.is_ok() {
            reporter.warning("robots.txt not found");
        }
        analyses.push(AnalysisFinding::new(Severity::Low, "SEO_ROBOTS_TXT_MISSING"));
    }

    let sitemap = matches!(files.sitemap, Ok(true));
    if sitemap {
        reporter.success("sitemap.xml found");
    } else {
        score -= 15;
        if files.sitemap.is_ok() {
            reporter.warning("sitemap.xml not found or invalid");
        }
        analyses.push(AnalysisFinding::new(Severity::Medium, "SEO_SITEMAP_MISSING"));
    }

    let directives = robots_meta.unwrap_or_default().to_lowercase();
    let noindex = directives.contains("noindex");
    let nofollow = directives.contains("nofollow");
    if noindex {
        score -= 30;
        reporter.error("Page has noindex directive - will not be indexed");
        analyses.push(AnalysisFinding::new(Severity::Critical, "SEO_NOINDEX"));
    }

    let indexation = IndexationCheck {
        score: floor_score(score),
        robots_txt,
        sitemap,
        noindex,
        nofollow,
    };
    (indexation, analyses)
}

fn report_structured_data(data: StructuredData, reporter: &ProgressReporter) -> StructuredData {
    if data.json_ld_count + data.microdata_items > 0 {
        reporter.success(format!(
            "Structured data found: {} JSON-LD, {} microdata",
            data.json_ld_count, data.microdata_items
        ));
    } else {
        reporter.warning("No structured data (JSON-LD or microdata) found");
    }
    data
}

/// Asks for a compressed page without letting the client decode it, so the server's
/// `Content-Encoding` stays visible.
async fn probe_compression(target: &Url, config: &ScanConfig) -> Option<String> {
    let client = reqwest::Client::builder()
        .user_agent(config.user_agent.clone())
        .timeout(config.timeouts.aux_fetch)
        .danger_accept_invalid_certs(true)
        .no_gzip()
        .no_brotli()
        .no_deflate()
        .build()
        .ok()?;

    match client
        .get(target.as_str())
        .header(ACCEPT_ENCODING, "gzip, deflate, br")
        .send()
        .await
    {
        Ok(response) => response
            .headers()
            .get(CONTENT_ENCODING)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.to_string()),
        Err(e) => {
            debug!(error = %e, "Compression probe failed.");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::events::{LogLevel, ProgressEvent};

    const GOOD_PAGE: &str = r#"<!doctype html><html><head>
        <title>Handmade Ceramics and Pottery Studio Shop</title>
        <meta name="description" content="Browse handmade mugs, bowls and vases thrown on the wheel in our small studio. Every piece is glazed by hand and fired to stoneware temperature.">
        <meta name="viewport" content="width=device-width, initial-scale=1">
        <meta name="robots" content="index, follow">
        <link rel="canonical" href="https://ceramics.example.com/">
        <meta property="og:title" content="Ceramics">
        <meta property="og:description" content="Handmade">
        <meta property="og:image" content="https://ceramics.example.com/og.png">
        <meta name="twitter:card" content="summary">
        <meta name="twitter:title" content="Ceramics">
        <style>@media (max-width: 600px) { body { margin: 0 } }</style>
        <script type="application/ld+json">{"@context":"https://schema.org","@type":"Store"}</script>
    </head><body>
        <h1> Studio <em>Ceramics</em> </h1><h2>Mugs</h2><h3>Large</h3>
        <img src="a.png" alt="A mug"><img src="b.png" alt="A bowl">
        <a href="/mugs">Browse mugs</a>
        <div itemscope itemtype="https://schema.org/Product"></div>
    </body></html>"#;

    fn logs(mut rx: tokio::sync::mpsc::UnboundedReceiver<ProgressEvent>) -> Vec<(LogLevel, String)> {
        let mut out = Vec::new();
        while let Ok(event) = rx.try_recv() {
            if let ProgressEvent::Log { level, message, .. } = event {
                out.push((level, message));
            }
        }
        out
    }

    #[test]
    fn weighted_score_rounds_half_to_even() {
        let mut findings = SeoFindings::default();
        findings.meta.score = 80;
        findings.content.score = 60;
        findings.technical.score = 100;
        findings.mobile.score = 100;
        findings.indexation.score = 100;
        assert_eq!(calculate_score(&findings), 86);

        // 0.20*90 + 0.25*90 + 0.25*100 + 0.15*100 + 0.15*30 = 85.0
        findings.meta.score = 90;
        findings.content.score = 90;
        findings.indexation.score = 30;
        assert_eq!(calculate_score(&findings), 85);

        findings.error = Some("timeout".into());
        assert_eq!(calculate_score(&findings), 0);
    }

    #[test]
    fn snapshot_extracts_page_structure() {
        let page = PageSnapshot::parse(GOOD_PAGE);
        assert_eq!(page.title.as_deref(), Some("Handmade Ceramics and Pottery Studio Shop"));
        assert_eq!(page.h1_texts, vec!["StudioCeramics".to_string()]);
        assert_eq!(page.heading_counts, [1, 1, 1, 0, 0, 0]);
        assert_eq!(page.open_graph.len(), 3);
        assert_eq!(page.twitter_cards.len(), 2);
        assert_eq!(page.canonical.as_deref(), Some("https://ceramics.example.com/"));
        assert!(page.has_media_queries);
        assert_eq!(page.structured_data.json_ld_types, vec!["Store".to_string()]);
        assert_eq!(page.structured_data.microdata_items, 1);
    }

    #[test]
    fn well_formed_page_keeps_full_meta_and_content_scores() {
        let page = PageSnapshot::parse(GOOD_PAGE);
        let (reporter, _rx) = ProgressReporter::channel("seo");
        let (meta, meta_issues) = check_meta(&page, &reporter);
        let (content, content_issues) = check_content(&page, &reporter);
        let (mobile, _) = check_mobile(&page, &reporter);
        assert_eq!(meta.score, 100, "{meta_issues:?}");
        assert_eq!(content.score, 100, "{content_issues:?}");
        assert_eq!(mobile.score, 100);
    }

    #[test]
    fn bare_page_collects_meta_and_content_penalties() {
        let page = PageSnapshot::parse(
            r#"<html><head><title>Hi</title></head><body>
               <h1>One</h1><h1>Two</h1><h3>Skipped</h3>
               <img src="1.png"><img src="2.png" alt=""><img src="3.png" alt="ok"><img src="4.png" alt="ok">
               <a href="/x">Click here</a><a href="/y">more</a><a href="/z">Pricing</a>
            </body></html>"#,
        );
        let (reporter, rx) = ProgressReporter::channel("seo");

        let (meta, _) = check_meta(&page, &reporter);
        // title length -10, description -20, canonical -10, og -10, twitter -5
        assert_eq!(meta.score, 45);

        let (content, issues) = check_content(&page, &reporter);
        // multiple h1 -10, gap -10, 50% without alt -10, two vague links -4
        assert_eq!(content.score, 66);
        assert_eq!(content.images_without_alt, 2);
        assert!(issues.iter().any(|f| f.code == "SEO_HEADING_GAP"));

        drop(reporter);
        let logs = logs(rx);
        assert_eq!(logs[0], (LogLevel::Warning, "Title length (2 chars) outside optimal range (30-60)".into()));
        assert!(logs.contains(&(LogLevel::Warning, "Multiple H1 tags found (2). Use only one H1.".into())));
    }

    #[test]
    fn heading_gap_requires_missing_parent_level() {
        assert!(!has_heading_gap(&[1, 2, 1, 0, 0, 0]));
        assert!(has_heading_gap(&[1, 0, 1, 0, 0, 0]));
        assert!(has_heading_gap(&[0, 1, 0, 0, 0, 0]));
        assert!(!has_heading_gap(&[0, 0, 0, 0, 0, 0]));
    }

    #[test]
    fn technical_penalties() {
        let (reporter, _rx) = ProgressReporter::channel("seo");
        let (tech, _) = check_technical(Some("GZIP"), 120.0, 80.0, 0, &reporter);
        assert_eq!(tech.score, 100);
        assert_eq!(tech.compression.as_deref(), Some("gzip"));

        let (tech, _) = check_technical(None, 250.4, 80.0, 1, &reporter);
        assert_eq!(tech.score, 100 - 15 - 10 - 5);

        let (tech, issues) = check_technical(Some("identity"), 812.0, 80.0, 0, &reporter);
        assert_eq!(tech.score, 65);
        assert!(issues.iter().any(|f| f.code == "SEO_PAGE_TOO_LARGE"));
    }

    #[test]
    fn unminified_heuristic_needs_length_and_lines() {
        let minified = "var a=1;".repeat(40);
        assert!(!looks_unminified(&minified));
        let spread = (0..12).map(|i| format!("  const value{i} = compute({i});")).collect::<Vec<_>>().join("\n");
        assert!(looks_unminified(&spread));
    }

    #[test]
    fn viewport_rules() {
        let (reporter, _rx) = ProgressReporter::channel("seo");
        let missing = PageSnapshot::default();
        assert_eq!(check_mobile(&missing, &reporter).0.score, 60);

        let fixed = PageSnapshot {
            viewport: Some("width=1024".into()),
            ..Default::default()
        };
        assert_eq!(check_mobile(&fixed, &reporter).0.score, 85);
    }

    #[test]
    fn indexation_penalties() {
        let (reporter, _rx) = ProgressReporter::channel("seo");
        let present = CrawlFiles {
            robots_txt: Ok(true),
            sitemap: Ok(true),
        };
        let (index, _) = check_indexation(present, Some("index, follow"), &reporter);
        assert_eq!(index.score, 100);

        let absent = CrawlFiles {
            robots_txt: Ok(false),
            sitemap: Err("timed out".into()),
        };
        let (index, issues) = check_indexation(absent, Some("NOINDEX, nofollow"), &reporter);
        assert_eq!(index.score, 100 - 10 - 15 - 30);
        assert!(index.noindex && index.nofollow);
        assert_eq!(issues.len(), 3);
    }

    #[test]
    fn failed_crawl_fetch_counts_as_missing_without_second_warning() {
        let (reporter, mut rx) = ProgressReporter::channel("seo");
        let files = CrawlFiles {
            robots_txt: Err("connection reset".into()),
            sitemap: Ok(false),
        };
        let (index, issues) = check_indexation(files, None, &reporter);
        drop(reporter);

        assert!(!index.robots_txt && !index.sitemap);
        assert_eq!(index.score, 75);
        let codes: Vec<_> = issues.iter().map(|f| f.code.as_str()).collect();
        assert_eq!(codes, ["SEO_ROBOTS_TXT_MISSING", "SEO_SITEMAP_MISSING"]);

        let mut warnings = Vec::new();
        while let Ok(event) = rx.try_recv() {
            if let ProgressEvent::Log { level: LogLevel::Warning, message, .. } = event {
                warnings.push(message);
            }
        }
        assert_eq!(warnings, ["sitemap.xml not found or invalid"]);
    }
}
