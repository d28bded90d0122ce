// src/core/scanner/performance_scanner.rs

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;
use url::Url;

use crate::config::ScanConfig;
use crate::core::error::ScanError;
use crate::core::events::LiveMetrics;
use crate::core::models::{AnalysisFinding, ModuleKind, PerformanceFindings, Severity, TierResult};
use crate::core::scanner::load_generator::LoadGenerator;
use crate::core::scanner::{ModuleFindings, Scanner};
use crate::core::sink::ProgressReporter;

pub struct PerformanceScanner {
    config: Arc<ScanConfig>,
}

impl PerformanceScanner {
    pub fn new(config: Arc<ScanConfig>) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Scanner for PerformanceScanner {
    fn module(&self) -> ModuleKind {
        ModuleKind::Performance
    }

    async fn run(&self, target: &Url, reporter: &ProgressReporter) -> Result<ModuleFindings, ScanError> {
        Ok(ModuleFindings::Performance(run_performance_scan(target, &self.config, reporter).await?))
    }
}

/// Runs every configured load tier in order against `target`.
///
/// All tiers share one connection pool. Each tier emits a progress event when it starts,
/// periodic live metrics while it runs, and a summary log line when it ends.
///
/// # Arguments
/// * `target` - The URL every virtual user requests.
/// * `config` - The load tiers and request timeouts.
/// * `reporter` - Receives the tier progress and live metrics.
///
/// # Returns
/// `PerformanceFindings` with one `TierResult` per tier and the analysis findings, or a
/// `ScanError` if the HTTP client could not be built.
pub async fn run_performance_scan(
    target: &Url,
    config: &ScanConfig,
    reporter: &ProgressReporter,
) -> Result<PerformanceFindings, ScanError> {
    info!(target = %target, tiers = config.load_tiers.len(), "Starting performance scan.");

    let generator = LoadGenerator::new(config, target.clone())?;
    let tier_count = config.load_tiers.len();
    let mut findings = PerformanceFindings {
        url: target.to_string(),
        ..Default::default()
    };

    for (index, tier) in config.load_tiers.iter().enumerate() {
        // Clears the metrics panel before the tier's first snapshot arrives.
        reporter.progress(
            (index * 100 / tier_count.max(1)) as u8,
            format!(
                "Starting tier {}/{tier_count} - {} users for {}s",
                index + 1,
                tier.users,
                tier.duration.as_secs()
            ),
            Some(LiveMetrics::default()),
        );

        let result = generator.run_tier(tier, index, tier_count, reporter).await;
        reporter.success(format!(
            "Tier {} complete - avg: {:.0}ms, p95: {:.0}ms, throughput: {:.1} req/s, error_rate: {:.1}%",
            index + 1,
            result.avg_response_time,
            result.p95,
            result.throughput,
            result.error_rate
        ));
        findings.levels.push(result);
    }

    findings.analysis = analyze_performance_results(&findings.levels);
    info!(findings = %findings.analysis.len(), "Performance scan finished.");
    Ok(findings)
}

fn baseline_penalty(avg_ms: f64) -> i32 {
    match avg_ms {
        ms if ms > 2000.0 => 20,
        ms if ms > 1000.0 => 10,
        ms if ms > 500.0 => 5,
        _ => 0,
    }
}

fn error_rate_penalty(error_rate: f64) -> i32 {
    match error_rate {
        rate if rate > 50.0 => 15,
        rate if rate > 20.0 => 10,
        rate if rate > 5.0 => 5,
        _ => 0,
    }
}

fn p95_penalty(p95_ms: f64) -> i32 {
    match p95_ms {
        ms if ms > 10000.0 => 15,
        ms if ms > 5000.0 => 10,
        ms if ms > 3000.0 => 5,
        _ => 0,
    }
}

/// Per-user throughput of every tier after the first, measured against the baseline.
/// Yields the tiers that fell below 10% of it.
fn collapsed_tiers(levels: &[TierResult]) -> impl Iterator<Item = &TierResult> {
    let baseline = levels.first().map_or(1.0, |first| {
        let throughput = if first.throughput > 0.0 { first.throughput } else { 1.0 };
        throughput / first.users.max(1) as f64
    });
    levels
        .iter()
        .skip(1)
        .filter(move |level| level.throughput / (level.users.max(1) as f64) < baseline * 0.1)
}

/// Scores the load test out of 100.
///
/// Deducts for a slow baseline (first tier average), for the error rate of every tier,
/// for the p95 of the last tier and 5 for each tier whose per-user throughput collapsed.
/// No tiers at all scores 0.
pub fn calculate_score(findings: &PerformanceFindings) -> u8 {
    let levels = &findings.levels;
    let (Some(baseline), Some(highest)) = (levels.first(), levels.last()) else {
        return 0;
    };

    let mut score: i32 = 100;
    score -= baseline_penalty(baseline.avg_response_time);
    score -= levels.iter().map(|level| error_rate_penalty(level.error_rate)).sum::<i32>();
    score -= p95_penalty(highest.p95);
    score -= 5 * collapsed_tiers(levels).count() as i32;
    score.clamp(0, 100) as u8
}

/// Turns every penalty `calculate_score` applies into a coded finding; the severity follows
/// the size of the penalty.
fn analyze_performance_results(levels: &[TierResult]) -> Vec<AnalysisFinding> {
    let mut analyses = Vec::new();
    let (Some(baseline), Some(highest)) = (levels.first(), levels.last()) else {
        analyses.push(AnalysisFinding::new(Severity::High, "PERF_NO_TIERS"));
        return analyses;
    };

    let severity_for = |penalty: i32| match penalty {
        p if p >= 15 => Severity::High,
        10 => Severity::Medium,
        _ => Severity::Low,
    };

    let penalty = baseline_penalty(baseline.avg_response_time);
    if penalty > 0 {
        analyses.push(
            AnalysisFinding::new(severity_for(penalty.min(15)), "PERF_SLOW_BASELINE")
                .with_detail(format!("{:.0} ms average", baseline.avg_response_time)),
        );
    }

    for level in levels {
        let penalty = error_rate_penalty(level.error_rate);
        if penalty > 0 {
            analyses.push(
                AnalysisFinding::new(severity_for(penalty), "PERF_HIGH_ERROR_RATE")
                    .with_detail(format!("{:.1}% at {} users", level.error_rate, level.users)),
            );
        }
    }

    let penalty = p95_penalty(highest.p95);
    if penalty > 0 {
        analyses.push(
            AnalysisFinding::new(severity_for(penalty), "PERF_HIGH_P95")
                .with_detail(format!("{:.0} ms at {} users", highest.p95, highest.users)),
        );
    }

    for level in collapsed_tiers(levels) {
        analyses.push(
            AnalysisFinding::new(Severity::Low, "PERF_THROUGHPUT_COLLAPSE")
                .with_detail(format!("{:.2} req/s at {} users", level.throughput, level.users)),
        );
    }

    analyses
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tier(users: usize, avg: f64, p95: f64, throughput: f64, error_rate: f64) -> TierResult {
        TierResult {
            users,
            avg_response_time: avg,
            p95,
            throughput,
            error_rate,
            ..Default::default()
        }
    }

    fn healthy() -> Vec<TierResult> {
        vec![
            tier(1, 120.0, 180.0, 8.0, 0.0),
            tier(50, 150.0, 260.0, 320.0, 0.0),
            tier(100, 190.0, 400.0, 600.0, 0.5),
            tier(500, 400.0, 900.0, 2000.0, 1.0),
            tier(1000, 800.0, 2100.0, 3000.0, 2.0),
        ]
    }

    #[test]
    fn no_tiers_scores_zero() {
        let findings = PerformanceFindings::default();
        assert_eq!(calculate_score(&findings), 0);
        assert_eq!(analyze_performance_results(&[])[0].code, "PERF_NO_TIERS");
    }

    #[test]
    fn healthy_site_scores_full() {
        let findings = PerformanceFindings {
            levels: healthy(),
            ..Default::default()
        };
        assert_eq!(calculate_score(&findings), 100);
        assert!(analyze_performance_results(&findings.levels).is_empty());
    }

    #[test]
    fn each_rule_applies_its_weight() {
        let mut levels = healthy();
        levels[0].avg_response_time = 1500.0;
        let findings = PerformanceFindings {
            levels: levels.clone(),
            ..Default::default()
        };
        assert_eq!(calculate_score(&findings), 90);

        levels[0].avg_response_time = 120.0;
        levels[2].error_rate = 25.0;
        levels[3].error_rate = 60.0;
        levels[4].p95 = 6000.0;
        let findings = PerformanceFindings {
            levels,
            ..Default::default()
        };
        assert_eq!(calculate_score(&findings), 100 - 10 - 15 - 10);
    }

    #[test]
    fn throughput_collapse_is_per_tier() {
        let mut levels = healthy();
        // baseline 8 req/s per user; 0.5 per user is below 10%
        levels[3].throughput = 250.0;
        levels[4].throughput = 500.0;
        let findings = PerformanceFindings {
            levels,
            ..Default::default()
        };
        assert_eq!(calculate_score(&findings), 90);
        let codes: Vec<String> = analyze_performance_results(&findings.levels)
            .into_iter()
            .map(|f| f.code)
            .collect();
        assert_eq!(codes, ["PERF_THROUGHPUT_COLLAPSE", "PERF_THROUGHPUT_COLLAPSE"]);
    }

    #[test]
    fn worst_case_floors_at_zero() {
        let levels: Vec<TierResult> = (0..5)
            .map(|i| tier(if i == 0 { 1 } else { 100 * i }, 2500.0, 12000.0, 0.01, 90.0))
            .collect();
        let findings = PerformanceFindings {
            levels,
            ..Default::default()
        };
        // 20 + 5*15 + 15 + 4*5 = 130
        assert_eq!(calculate_score(&findings), 0);
    }
}
