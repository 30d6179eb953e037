//! Orchestrator configuration — tunables for the timers, sweepers, and
//! rate-limit windows described in §5/§9, validated the way
//! `sa_domain::config::Config::validate` validates the gateway's config.

use serde::{Deserialize, Serialize};
use std::fmt;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Top-level config
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub participation: ParticipationConfig,
    #[serde(default)]
    pub health: HealthConfig,
    #[serde(default)]
    pub cleanup: CleanupConfig,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            cache: CacheConfig::default(),
            participation: ParticipationConfig::default(),
            health: HealthConfig::default(),
            cleanup: CleanupConfig::default(),
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Discussion cache (§4.4)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Soft TTL of inactivity before a cached discussion is evicted.
    #[serde(default = "d_cache_ttl_secs")]
    pub ttl_secs: u64,
    /// How often the sweeper scans for expired entries.
    #[serde(default = "d_cache_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
}

fn d_cache_ttl_secs() -> u64 {
    3600
}
fn d_cache_sweep_interval_secs() -> u64 {
    60
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: d_cache_ttl_secs(),
            sweep_interval_secs: d_cache_sweep_interval_secs(),
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Participation trigger (§4.9)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParticipationConfig {
    /// How often the sweeper evaluates active discussions.
    #[serde(default = "d_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
    /// Minimum time between two triggers for the same discussion.
    #[serde(default = "d_rate_limit_secs")]
    pub rate_limit_secs: u64,
    /// Minimum time between two requests for the same `(agent_id,
    /// participant_id)` pair.
    #[serde(default = "d_dedup_window_secs")]
    pub dedup_window_secs: u64,
    /// Re-trigger dampener: skip if the strategy's pick equals the last
    /// message's sender and fewer than this many seconds have elapsed.
    #[serde(default = "d_retrigger_dampener_secs")]
    pub retrigger_dampener_secs: u64,
    /// Bound on the recent-message context sent with each request.
    #[serde(default = "d_context_window")]
    pub context_window_messages: usize,
}

fn d_sweep_interval_secs() -> u64 {
    5
}
fn d_rate_limit_secs() -> u64 {
    30
}
fn d_dedup_window_secs() -> u64 {
    120
}
fn d_retrigger_dampener_secs() -> u64 {
    5
}
fn d_context_window() -> usize {
    20
}

impl Default for ParticipationConfig {
    fn default() -> Self {
        Self {
            sweep_interval_secs: d_sweep_interval_secs(),
            rate_limit_secs: d_rate_limit_secs(),
            dedup_window_secs: d_dedup_window_secs(),
            retrigger_dampener_secs: d_retrigger_dampener_secs(),
            context_window_messages: d_context_window(),
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Health monitor (§4.9)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthConfig {
    #[serde(default = "d_health_interval_secs")]
    pub sweep_interval_secs: u64,
    /// Time since last activity before a discussion is flagged idle.
    #[serde(default = "d_inactivity_threshold_secs")]
    pub inactivity_threshold_secs: u64,
}

fn d_health_interval_secs() -> u64 {
    30
}
fn d_inactivity_threshold_secs() -> u64 {
    600
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            sweep_interval_secs: d_health_interval_secs(),
            inactivity_threshold_secs: d_inactivity_threshold_secs(),
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Cleanup (§5 — scrub rate-limit/dedup maps; clear orphaned locks)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CleanupConfig {
    #[serde(default = "d_cleanup_interval_secs")]
    pub sweep_interval_secs: u64,
    /// Operation locks held longer than this are treated as orphaned and
    /// forcibly cleared (a safety net that should never trigger).
    #[serde(default = "d_orphan_lock_secs")]
    pub orphan_lock_secs: u64,
}

fn d_cleanup_interval_secs() -> u64 {
    600
}
fn d_orphan_lock_secs() -> u64 {
    300
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            sweep_interval_secs: d_cleanup_interval_secs(),
            orphan_lock_secs: d_orphan_lock_secs(),
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Validation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSeverity {
    Error,
    Warning,
}

#[derive(Debug, Clone)]
pub struct ConfigIssue {
    pub severity: ConfigSeverity,
    pub field: String,
    pub message: String,
}

impl fmt::Display for ConfigIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.severity {
            ConfigSeverity::Error => "ERROR",
            ConfigSeverity::Warning => "WARN",
        };
        write!(f, "[{tag}] {}: {}", self.field, self.message)
    }
}

impl OrchestratorConfig {
    /// Validate the configuration and return a list of issues. Empty
    /// means everything looks good.
    pub fn validate(&self) -> Vec<ConfigIssue> {
        let mut issues = Vec::new();

        let nonzero = |field: &str, value: u64, issues: &mut Vec<ConfigIssue>| {
            if value == 0 {
                issues.push(ConfigIssue {
                    severity: ConfigSeverity::Error,
                    field: field.into(),
                    message: "must be greater than 0".into(),
                });
            }
        };

        nonzero("cache.sweep_interval_secs", self.cache.sweep_interval_secs, &mut issues);
        nonzero("cache.ttl_secs", self.cache.ttl_secs, &mut issues);
        nonzero(
            "participation.sweep_interval_secs",
            self.participation.sweep_interval_secs,
            &mut issues,
        );
        nonzero(
            "participation.rate_limit_secs",
            self.participation.rate_limit_secs,
            &mut issues,
        );
        nonzero(
            "participation.dedup_window_secs",
            self.participation.dedup_window_secs,
            &mut issues,
        );
        nonzero("health.sweep_interval_secs", self.health.sweep_interval_secs, &mut issues);
        nonzero("cleanup.sweep_interval_secs", self.cleanup.sweep_interval_secs, &mut issues);

        // TTL shorter than the sweep interval would evict entries before
        // the sweeper that refreshes their activity ever runs.
        if self.cache.ttl_secs < self.cache.sweep_interval_secs {
            issues.push(ConfigIssue {
                severity: ConfigSeverity::Error,
                field: "cache.ttl_secs".into(),
                message: format!(
                    "ttl_secs ({}) must be >= cache.sweep_interval_secs ({}), otherwise entries evict before the sweeper can refresh them",
                    self.cache.ttl_secs, self.cache.sweep_interval_secs
                ),
            });
        }

        if self.participation.context_window_messages == 0 {
            issues.push(ConfigIssue {
                severity: ConfigSeverity::Warning,
                field: "participation.context_window_messages".into(),
                message: "0 means agents receive no conversation context at all".into(),
            });
        }

        if self.participation.retrigger_dampener_secs >= self.participation.rate_limit_secs {
            issues.push(ConfigIssue {
                severity: ConfigSeverity::Warning,
                field: "participation.retrigger_dampener_secs".into(),
                message: "dampener window is not shorter than the trigger rate limit; it will never engage before the rate limit already would".into(),
            });
        }

        issues
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let cfg = OrchestratorConfig::default();
        let issues = cfg.validate();
        assert!(issues.iter().all(|i| i.severity != ConfigSeverity::Error));
    }

    #[test]
    fn zero_sweep_interval_is_an_error() {
        let mut cfg = OrchestratorConfig::default();
        cfg.participation.sweep_interval_secs = 0;
        let issues = cfg.validate();
        assert!(issues
            .iter()
            .any(|i| i.field == "participation.sweep_interval_secs" && i.severity == ConfigSeverity::Error));
    }

    #[test]
    fn ttl_below_sweep_interval_is_an_error() {
        let mut cfg = OrchestratorConfig::default();
        cfg.cache.ttl_secs = 10;
        cfg.cache.sweep_interval_secs = 60;
        let issues = cfg.validate();
        assert!(issues
            .iter()
            .any(|i| i.field == "cache.ttl_secs" && i.severity == ConfigSeverity::Error));
    }

    #[test]
    fn toml_roundtrip() {
        let cfg = OrchestratorConfig::default();
        let text = toml::to_string(&cfg).unwrap();
        let back: OrchestratorConfig = toml::from_str(&text).unwrap();
        assert_eq!(back.cache.ttl_secs, cfg.cache.ttl_secs);
    }
}
