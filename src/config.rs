// src/config.rs

//! Runtime configuration for the scanning engine.
//!
//! Every timeout, the load tier table and the probe constants live here so the
//! scanners never hard-code them. `ScanConfig::default()` is the production
//! profile; `ScanConfig::from_env()` overlays `<CRATE>_*` environment variables,
//! following the same naming scheme as the `<CRATE>_LOGLEVEL` variable read by
//! the logging module.

use std::net::{IpAddr, Ipv4Addr};
use std::str::FromStr;
use std::time::Duration;

use crate::logging::PROJECT_NAME;

/// One step of escalating synthetic load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadTier {
    /// Number of concurrent virtual users once ramp-up is done.
    pub users: usize,
    /// Wall-clock length of the tier, measured from the tier start.
    pub duration: Duration,
    /// Virtual users spawned per second during ramp-up.
    pub spawn_rate: u32,
}

impl LoadTier {
    pub const fn new(users: usize, duration_secs: u64, spawn_rate: u32) -> Self {
        Self {
            users,
            duration: Duration::from_secs(duration_secs),
            spawn_rate,
        }
    }
}

/// The production tier table: (users, seconds, spawn rate).
pub const DEFAULT_LOAD_TIERS: [LoadTier; 5] = [
    LoadTier::new(1, 30, 1),
    LoadTier::new(50, 60, 10),
    LoadTier::new(100, 60, 20),
    LoadTier::new(500, 90, 50),
    LoadTier::new(1000, 120, 100),
];

/// Which load table the performance scanner uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadProfile {
    /// The exact production table.
    Full,
    /// A scaled-down table for local smoke runs.
    Quick,
}

impl FromStr for LoadProfile {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "full" => Ok(LoadProfile::Full),
            "quick" => Ok(LoadProfile::Quick),
            other => Err(ConfigError::InvalidValue {
                var: "LOAD_PROFILE".to_string(),
                value: other.to_string(),
            }),
        }
    }
}

/// A public recursive resolver used for the propagation comparison.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicResolver {
    pub name: String,
    pub address: IpAddr,
}

impl PublicResolver {
    fn new(name: &str, address: Ipv4Addr) -> Self {
        Self {
            name: name.to_string(),
            address: IpAddr::V4(address),
        }
    }
}

/// Per-probe network timeouts. A timeout is a probe outcome, never a crash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Timeouts {
    pub dns: Duration,
    pub tcp_latency: Duration,
    pub port_probe: Duration,
    pub redirect: Duration,
    pub page_fetch: Duration,
    pub aux_fetch: Duration,
    pub directory_probe: Duration,
    pub load_request: Duration,
    pub tls_handshake: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            dns: Duration::from_secs(5),
            tcp_latency: Duration::from_secs(5),
            port_probe: Duration::from_secs(3),
            redirect: Duration::from_secs(10),
            page_fetch: Duration::from_secs(15),
            aux_fetch: Duration::from_secs(10),
            directory_probe: Duration::from_secs(5),
            load_request: Duration::from_secs(30),
            tls_handshake: Duration::from_secs(10),
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {var}")]
    InvalidValue { var: String, value: String },
}

/// Everything the scanners and the load generator need to know.
#[derive(Debug, Clone)]
pub struct ScanConfig {
    pub user_agent: String,
    pub timeouts: Timeouts,
    pub load_tiers: Vec<LoadTier>,
    /// Maximum gap between two live-metrics progress events.
    pub report_interval: Duration,
    /// Pause each virtual user takes between two requests.
    pub think_time: Duration,
    pub propagation_resolvers: Vec<PublicResolver>,
    /// Hostile origin sent by the CORS probe.
    pub cors_probe_origin: String,
    pub directory_probe_paths: Vec<String>,
    pub scan_ports: Vec<u16>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            user_agent: format!("SitePulseRS/{}", env!("CARGO_PKG_VERSION")),
            timeouts: Timeouts::default(),
            load_tiers: DEFAULT_LOAD_TIERS.to_vec(),
            report_interval: Duration::from_secs(2),
            think_time: Duration::from_millis(100),
            propagation_resolvers: vec![
                PublicResolver::new("Google", Ipv4Addr::new(8, 8, 8, 8)),
                PublicResolver::new("Cloudflare", Ipv4Addr::new(1, 1, 1, 1)),
                PublicResolver::new("OpenDNS", Ipv4Addr::new(208, 67, 222, 222)),
            ],
            cors_probe_origin: "https://evil.example.com".to_string(),
            directory_probe_paths: ["/", "/images/", "/assets/", "/uploads/", "/static/"]
                .iter()
                .map(|p| p.to_string())
                .collect(),
            scan_ports: vec![80, 443, 8080, 8443],
        }
    }
}

impl ScanConfig {
    /// Builds the configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(|name| std::env::var(name).ok())
    }

    /// Builds the configuration from an arbitrary variable lookup.
    ///
    /// Recognised keys (prefixed with the upper-cased crate name):
    /// `_USER_AGENT`, `_LOAD_PROFILE` (`full` or `quick`), `_REPORT_INTERVAL_MS`.
    pub fn from_vars<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        let key = |suffix: &str| format!("{}_{}", PROJECT_NAME.as_str(), suffix);

        if let Some(agent) = lookup(&key("USER_AGENT")).filter(|v| !v.trim().is_empty()) {
            config.user_agent = agent;
        }

        if let Some(profile) = lookup(&key("LOAD_PROFILE")) {
            config = config.with_profile(profile.parse()?);
        }

        if let Some(raw) = lookup(&key("REPORT_INTERVAL_MS")) {
            let millis: u64 = raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
                var: key("REPORT_INTERVAL_MS"),
                value: raw.clone(),
            })?;
            if millis == 0 {
                return Err(ConfigError::InvalidValue {
                    var: key("REPORT_INTERVAL_MS"),
                    value: raw,
                });
            }
            config.report_interval = Duration::from_millis(millis);
        }

        Ok(config)
    }

    /// Replaces the load table according to `profile`.
    pub fn with_profile(mut self, profile: LoadProfile) -> Self {
        self.load_tiers = match profile {
            LoadProfile::Full => DEFAULT_LOAD_TIERS.to_vec(),
            LoadProfile::Quick => DEFAULT_LOAD_TIERS
                .iter()
                .map(|tier| LoadTier {
                    users: (tier.users / 10).max(1),
                    duration: tier.duration / 6,
                    spawn_rate: tier.spawn_rate,
                })
                .collect(),
        };
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (format!("{}_{}", PROJECT_NAME.as_str(), k), v.to_string()))
            .collect()
    }

    #[test]
    fn default_tiers_match_production_table() {
        let config = ScanConfig::default();
        let table: Vec<(usize, u64, u32)> = config
            .load_tiers
            .iter()
            .map(|t| (t.users, t.duration.as_secs(), t.spawn_rate))
            .collect();
        assert_eq!(
            table,
            vec![(1, 30, 1), (50, 60, 10), (100, 60, 20), (500, 90, 50), (1000, 120, 100)]
        );
        assert_eq!(config.report_interval, Duration::from_secs(2));
        assert_eq!(config.think_time, Duration::from_millis(100));
        assert_eq!(config.propagation_resolvers.len(), 3);
    }

    #[test]
    fn quick_profile_scales_down_tiers() {
        let config = ScanConfig::default().with_profile(LoadProfile::Quick);
        assert_eq!(config.load_tiers[0].users, 1);
        assert_eq!(config.load_tiers[0].duration, Duration::from_secs(5));
        assert_eq!(config.load_tiers[4].users, 100);
        assert_eq!(config.load_tiers[4].duration, Duration::from_secs(20));
    }

    #[test]
    fn env_overrides_are_applied() {
        let env = vars(&[
            ("USER_AGENT", "probe/1.0"),
            ("LOAD_PROFILE", "quick"),
            ("REPORT_INTERVAL_MS", "500"),
        ]);
        let config = ScanConfig::from_vars(|k| env.get(k).cloned()).unwrap();
        assert_eq!(config.user_agent, "probe/1.0");
        assert_eq!(config.report_interval, Duration::from_millis(500));
        assert_eq!(config.load_tiers[1].users, 5);
    }

    #[test]
    fn invalid_values_are_rejected() {
        let env = vars(&[("LOAD_PROFILE", "turbo")]);
        assert!(ScanConfig::from_vars(|k| env.get(k).cloned()).is_err());

        let env = vars(&[("REPORT_INTERVAL_MS", "0")]);
        assert!(ScanConfig::from_vars(|k| env.get(k).cloned()).is_err());
    }
}
