// src/core/scanner/load_generator.rs

//! Synthetic traffic for the performance scanner.
//!
//! A tier ramps virtual users up at its spawn rate. Every user is a lightweight task
//! looping request, measure, record, think, until the tier deadline. At the deadline the
//! remaining users are aborted and awaited, so in-flight requests are dropped and their
//! connections released before the final metrics are computed.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use reqwest::redirect::Policy;
use tokio::task::JoinSet;
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};
use url::Url;

use crate::config::{LoadTier, ScanConfig};
use crate::core::error::ScanError;
use crate::core::events::LiveMetrics;
use crate::core::models::TierResult;
use crate::core::scanner::{http_client, round2};
use crate::core::sink::ProgressReporter;

/// Value at index `floor(n * fraction)` of an ascending slice, clamped to the last sample.
pub fn percentile(sorted: &[f64], fraction: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let index = ((sorted.len() as f64 * fraction) as usize).min(sorted.len() - 1);
    sorted[index]
}

/// Every sample recorded during one tier.
#[derive(Debug, Default, Clone)]
pub struct TierSamples {
    response_times: Vec<f64>,
    ttfb_times: Vec<f64>,
    total_requests: u64,
    errors: u64,
    network_errors: u64,
    total_bytes: u64,
}

/// How a single request ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestOutcome {
    /// The server answered; statuses >= 400 count as errors.
    Response { status: u16, bytes: u64 },
    /// Connection, timeout or body failure.
    Transport,
}

impl TierSamples {
    pub fn record(&mut self, elapsed_ms: f64, outcome: RequestOutcome) {
        self.total_requests += 1;
        self.response_times.push(elapsed_ms);
        match outcome {
            RequestOutcome::Response { status, bytes } => {
                self.ttfb_times.push(elapsed_ms);
                self.total_bytes += bytes;
                if status >= 400 {
                    self.errors += 1;
                }
            }
            RequestOutcome::Transport => {
                self.errors += 1;
                self.network_errors += 1;
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.response_times.is_empty()
    }

    pub fn total_requests(&self) -> u64 {
        self.total_requests
    }

    fn sorted_times(&self) -> Vec<f64> {
        let mut sorted = self.response_times.clone();
        sorted.sort_by(f64::total_cmp);
        sorted
    }

    fn error_rate(&self) -> f64 {
        self.errors as f64 / self.total_requests.max(1) as f64 * 100.0
    }

    /// Snapshot recomputed from all samples so far.
    pub fn live_metrics(&self, active_users: usize, elapsed: Duration) -> LiveMetrics {
        let sorted = self.sorted_times();
        let n = sorted.len().max(1) as f64;
        LiveMetrics {
            active_users,
            total_requests: self.total_requests,
            avg_response_time: round2(sorted.iter().sum::<f64>() / n),
            p50: round2(percentile(&sorted, 0.50)),
            p95: round2(percentile(&sorted, 0.95)),
            p99: round2(percentile(&sorted, 0.99)),
            throughput: round2(self.total_requests as f64 / elapsed.as_secs_f64().max(0.01)),
            error_rate: round2(self.error_rate()),
        }
    }

    pub fn finalize(&self, tier: &LoadTier, elapsed: Duration) -> TierResult {
        let sorted = self.sorted_times();
        let n = sorted.len().max(1) as f64;
        let secs = elapsed.as_secs_f64().max(0.01);
        let requests = self.total_requests.max(1) as f64;
        let ttfb = self.ttfb_times.iter().sum::<f64>() / self.ttfb_times.len().max(1) as f64;

        TierResult {
            users: tier.users,
            duration: (elapsed.as_secs_f64() * 10.0).round() / 10.0,
            spawn_rate: tier.spawn_rate,
            total_requests: self.total_requests,
            avg_response_time: round2(sorted.iter().sum::<f64>() / n),
            p50: round2(percentile(&sorted, 0.50)),
            p95: round2(percentile(&sorted, 0.95)),
            p99: round2(percentile(&sorted, 0.99)),
            throughput: round2(self.total_requests as f64 / secs),
            error_rate: round2(self.error_rate()),
            success_rate: round2((self.total_requests - self.errors) as f64 / requests * 100.0),
            ttfb: round2(ttfb),
            data_rate_kb: round2(self.total_bytes as f64 / 1024.0 / secs),
            active_connections: tier.users,
            network_errors: self.network_errors,
        }
    }
}

/// Drives the load tiers against one URL with a shared connection pool.
#[derive(Debug, Clone)]
pub struct LoadGenerator {
    client: reqwest::Client,
    target: Url,
    think_time: Duration,
    report_interval: Duration,
}

impl LoadGenerator {
    pub fn new(config: &ScanConfig, target: Url) -> Result<Self, ScanError> {
        Ok(Self {
            client: http_client(config, config.timeouts.load_request, Policy::limited(10))?,
            target,
            think_time: config.think_time,
            report_interval: config.report_interval,
        })
    }

    /// Runs one tier to its deadline and returns its final metrics.
    ///
    /// `tier_index` and `tier_count` place the tier in the overall progress bar.
    pub async fn run_tier(
        &self,
        tier: &LoadTier,
        tier_index: usize,
        tier_count: usize,
        reporter: &ProgressReporter,
    ) -> TierResult {
        let start = Instant::now();
        let deadline = start + tier.duration;
        let samples = Arc::new(Mutex::new(TierSamples::default()));
        let mut users = JoinSet::new();
        let spawn_interval = Duration::from_secs_f64(1.0 / f64::from(tier.spawn_rate.max(1)));
        let mut last_report = start;

        info!(users = tier.users, duration = ?tier.duration, spawn_rate = tier.spawn_rate, "Starting load tier.");

        for user in 0..tier.users {
            if Instant::now() >= deadline {
                warn!(spawned = user, "Tier deadline reached before all users were spawned.");
                break;
            }
            users.spawn(self.clone().user_loop(deadline, samples.clone()));

            let now = Instant::now();
            if now.duration_since(last_report) >= self.report_interval
                && self.report(&samples, user + 1, start, tier, tier_index, tier_count, reporter)
            {
                last_report = now;
            }

            if user + 1 < tier.users {
                sleep(spawn_interval.min(deadline.saturating_duration_since(Instant::now()))).await;
            }
        }
        let spawned = users.len();

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            sleep(self.report_interval.min(remaining)).await;
            self.report(&samples, spawned, start, tier, tier_index, tier_count, reporter);
        }

        users.abort_all();
        while let Some(joined) = users.join_next().await {
            if let Err(e) = joined {
                if !e.is_cancelled() {
                    warn!(error = %e, "Virtual user task failed.");
                }
            }
        }

        let elapsed = start.elapsed();
        let result = match samples.lock() {
            Ok(samples) => samples.finalize(tier, elapsed),
            Err(poisoned) => poisoned.into_inner().finalize(tier, elapsed),
        };
        debug!(requests = result.total_requests, p95 = result.p95, "Load tier finished.");
        result
    }

    async fn user_loop(self, deadline: Instant, samples: Arc<Mutex<TierSamples>>) {
        while Instant::now() < deadline {
            let started = Instant::now();
            let outcome = match self.client.get(self.target.as_str()).send().await {
                Ok(response) => {
                    let status = response.status().as_u16();
                    match response.bytes().await {
                        Ok(body) => RequestOutcome::Response {
                            status,
                            bytes: body.len() as u64,
                        },
                        Err(_) => RequestOutcome::Transport,
                    }
                }
                Err(_) => RequestOutcome::Transport,
            };
            let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;

            if let Ok(mut samples) = samples.lock() {
                samples.record(elapsed_ms, outcome);
            }
            sleep(self.think_time).await;
        }
    }

    /// Emits a live progress event; returns false while there is nothing to report yet.
    #[allow(clippy::too_many_arguments)]
    fn report(
        &self,
        samples: &Mutex<TierSamples>,
        active_users: usize,
        start: Instant,
        tier: &LoadTier,
        tier_index: usize,
        tier_count: usize,
        reporter: &ProgressReporter,
    ) -> bool {
        let elapsed = start.elapsed();
        let live = match samples.lock() {
            Ok(samples) if !samples.is_empty() => samples.live_metrics(active_users, elapsed),
            _ => return false,
        };

        let tier_fraction = (elapsed.as_secs_f64() / tier.duration.as_secs_f64().max(0.001)).min(1.0);
        let percent = (tier_index as f64 + tier_fraction) / tier_count.max(1) as f64 * 100.0;
        reporter.progress(
            percent.clamp(0.0, 100.0) as u8,
            format!("Testing {active_users} users - {}s elapsed", elapsed.as_secs()),
            Some(live),
        );
        true
    }
}
