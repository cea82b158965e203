//! Configuration file parsing and management.
//!
//! This module loads TOML configuration files, merges them with proper
//! precedence rules and reads `NV_*` environment variables. Resolved values
//! are applied on top of [`EngineConfig`] and [`VetConfig`] defaults.

use crate::error::NameVetError;
use crate::types::{EngineConfig, RateLimit, VetConfig};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Configuration loaded from TOML files.
///
/// ```toml
/// [defaults]
/// tlds = ["com", "io"]
/// budget = "8s"
///
/// [engine]
/// probe_timeout = "3s"
/// manual_platforms = ["LinkedIn"]
///
/// [rate_limits]
/// per_second = 2.0
/// burst = 6.0
///
/// [rate_limits.overrides."rdap.verisign.com"]
/// per_second = 5.0
/// burst = 10.0
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FileConfig {
    /// Default values for per-run CLI options
    #[serde(skip_serializing_if = "Option::is_none")]
    pub defaults: Option<DefaultsConfig>,

    /// Engine timeouts, cache lifetimes and request identity
    #[serde(skip_serializing_if = "Option::is_none")]
    pub engine: Option<EngineSection>,

    /// Token bucket settings
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rate_limits: Option<RateLimitSection>,

    /// Similar-name search settings
    #[serde(skip_serializing_if = "Option::is_none")]
    pub similarity: Option<SimilaritySection>,
}

/// Default values that map to CLI options.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DefaultsConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tlds: Option<Vec<String>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub platforms: Option<Vec<String>>,

    /// Total time budget per vetting run (e.g. "12s")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub budget: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub json: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub pretty: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct EngineSection {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub probe_timeout: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_ttl: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_cache_ttl: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub health_check_url: Option<String>,

    /// Platforms never probed, always answered with a manual-check link
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manual_platforms: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RateLimitSection {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub per_second: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub burst: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_wait: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub cooldown: Option<String>,

    /// Per-upstream buckets keyed by host or platform name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub overrides: Option<HashMap<String, RateLimit>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SimilaritySection {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub threshold: Option<usize>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_k: Option<usize>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub zone: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub corpus_limit: Option<usize>,
}

impl FileConfig {
    /// Apply file values on top of an engine configuration.
    pub fn apply_to_engine(&self, mut config: EngineConfig) -> Result<EngineConfig, NameVetError> {
        if let Some(engine) = &self.engine {
            if let Some(value) = &engine.probe_timeout {
                config.probe_timeout = require_duration("engine.probe_timeout", value)?;
            }
            if let Some(value) = &engine.cache_ttl {
                config.cache_ttl = require_duration("engine.cache_ttl", value)?;
            }
            if let Some(value) = &engine.failure_cache_ttl {
                config.failure_cache_ttl = require_duration("engine.failure_cache_ttl", value)?;
            }
            if let Some(agent) = &engine.user_agent {
                config.user_agent = agent.clone();
            }
            if let Some(url) = &engine.health_check_url {
                config.health_check_url = url.clone();
            }
            if let Some(platforms) = &engine.manual_platforms {
                config.manual_platforms = platforms.clone();
            }
        }

        if let Some(rates) = &self.rate_limits {
            if let Some(per_second) = rates.per_second {
                config.rate_limits.default.per_second = per_second;
            }
            if let Some(burst) = rates.burst {
                config.rate_limits.default.burst = burst;
            }
            if let Some(value) = &rates.max_wait {
                config.rate_limits.max_wait = require_duration("rate_limits.max_wait", value)?;
            }
            if let Some(value) = &rates.cooldown {
                config.rate_limits.cooldown = require_duration("rate_limits.cooldown", value)?;
            }
            if let Some(overrides) = &rates.overrides {
                config.rate_limits.overrides.extend(
                    overrides
                        .iter()
                        .map(|(upstream, limit)| (upstream.to_lowercase(), *limit)),
                );
            }
        }

        if let Some(similarity) = &self.similarity {
            if let Some(threshold) = similarity.threshold {
                config.similarity.threshold = threshold;
            }
            if let Some(top_k) = similarity.top_k {
                config.similarity.top_k = top_k;
            }
            if let Some(zone) = &similarity.zone {
                config.similarity.zone = zone.trim_start_matches('.').to_lowercase();
            }
            if let Some(limit) = similarity.corpus_limit {
                config.similarity.corpus_limit = limit;
            }
        }

        Ok(config)
    }

    /// Apply file defaults on top of a per-run configuration.
    pub fn apply_to_vet(&self, mut config: VetConfig) -> Result<VetConfig, NameVetError> {
        if let Some(defaults) = &self.defaults {
            if let Some(tlds) = &defaults.tlds {
                config = config.with_tlds(tlds.as_slice());
            }
            if let Some(platforms) = &defaults.platforms {
                config = config.with_platforms(platforms.as_slice());
            }
            if let Some(budget) = &defaults.budget {
                config.timeout_budget = require_duration("defaults.budget", budget)?;
            }
        }
        Ok(config)
    }
}

/// Configuration discovery and loading functionality.
pub struct ConfigManager {
    /// Whether to emit warnings for config issues
    pub verbose: bool,
}

impl ConfigManager {
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }

    /// Load configuration from a specific file.
    ///
    /// # Errors
    ///
    /// `FileError` when the file is missing or unreadable, `ConfigError`
    /// when it does not parse or fails validation.
    pub fn load_file<P: AsRef<Path>>(&self, path: P) -> Result<FileConfig, NameVetError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(NameVetError::file_error(
                path.to_string_lossy(),
                "Configuration file not found",
            ));
        }

        let content = fs::read_to_string(path).map_err(|e| {
            NameVetError::file_error(
                path.to_string_lossy(),
                format!("Failed to read configuration file: {}", e),
            )
        })?;

        let config: FileConfig = toml::from_str(&content).map_err(|e| {
            NameVetError::config(format!("Failed to parse TOML configuration: {}", e))
        })?;

        self.validate_config(&config)?;
        Ok(config)
    }

    /// Discover and load configuration files in precedence order.
    ///
    /// XDG config is lowest, then the home directory, then the current
    /// directory. Files that fail to load are skipped with a warning.
    pub fn discover_and_load(&self) -> Result<FileConfig, NameVetError> {
        let mut merged_config = FileConfig::default();
        let mut loaded_files = Vec::new();

        let candidates = [
            self.get_xdg_config_path(),
            self.get_global_config_path(),
            self.get_local_config_path(),
        ];
        for path in candidates.into_iter().flatten() {
            match self.load_file(&path) {
                Ok(config) => {
                    merged_config = self.merge_configs(merged_config, config);
                    loaded_files.push(path);
                }
                Err(err) => {
                    tracing::warn!(path = %path.display(), error = %err, "skipping config file");
                    if self.verbose {
                        eprintln!("⚠️  Skipping {}: {}", path.display(), err);
                    }
                }
            }
        }

        if self.verbose && loaded_files.len() > 1 {
            eprintln!("⚠️  Multiple config files found. Later files override earlier ones:");
            for path in &loaded_files {
                eprintln!("   {}", path.display());
            }
        }

        Ok(merged_config)
    }

    fn get_local_config_path(&self) -> Option<PathBuf> {
        ["./namevet.toml", "./.namevet.toml"]
            .iter()
            .map(Path::new)
            .find(|path| path.exists())
            .map(Path::to_path_buf)
    }

    fn get_global_config_path(&self) -> Option<PathBuf> {
        let home = env::var_os("HOME")?;
        [".namevet.toml", "namevet.toml"]
            .iter()
            .map(|candidate| Path::new(&home).join(candidate))
            .find(|path| path.exists())
    }

    fn get_xdg_config_path(&self) -> Option<PathBuf> {
        let config_dir = env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| env::var_os("HOME").map(|home| Path::new(&home).join(".config")))?;

        let path = config_dir.join("namevet").join("config.toml");
        path.exists().then_some(path)
    }

    /// Merge two configurations; values from `higher` win field by field.
    pub fn merge_configs(&self, lower: FileConfig, higher: FileConfig) -> FileConfig {
        FileConfig {
            defaults: merge_section(lower.defaults, higher.defaults, |low, high| {
                DefaultsConfig {
                    tlds: high.tlds.or(low.tlds),
                    platforms: high.platforms.or(low.platforms),
                    budget: high.budget.or(low.budget),
                    json: high.json.or(low.json),
                    pretty: high.pretty.or(low.pretty),
                }
            }),
            engine: merge_section(lower.engine, higher.engine, |low, high| EngineSection {
                probe_timeout: high.probe_timeout.or(low.probe_timeout),
                cache_ttl: high.cache_ttl.or(low.cache_ttl),
                failure_cache_ttl: high.failure_cache_ttl.or(low.failure_cache_ttl),
                user_agent: high.user_agent.or(low.user_agent),
                health_check_url: high.health_check_url.or(low.health_check_url),
                manual_platforms: high.manual_platforms.or(low.manual_platforms),
            }),
            rate_limits: merge_section(lower.rate_limits, higher.rate_limits, |low, high| {
                RateLimitSection {
                    per_second: high.per_second.or(low.per_second),
                    burst: high.burst.or(low.burst),
                    max_wait: high.max_wait.or(low.max_wait),
                    cooldown: high.cooldown.or(low.cooldown),
                    overrides: match (low.overrides, high.overrides) {
                        (Some(mut low), Some(high)) => {
                            low.extend(high);
                            Some(low)
                        }
                        (low, high) => high.or(low),
                    },
                }
            }),
            similarity: merge_section(lower.similarity, higher.similarity, |low, high| {
                SimilaritySection {
                    threshold: high.threshold.or(low.threshold),
                    top_k: high.top_k.or(low.top_k),
                    zone: high.zone.or(low.zone),
                    corpus_limit: high.corpus_limit.or(low.corpus_limit),
                }
            }),
        }
    }

    /// Validate a configuration for common issues.
    fn validate_config(&self, config: &FileConfig) -> Result<(), NameVetError> {
        if let Some(defaults) = &config.defaults {
            if let Some(tlds) = &defaults.tlds {
                for tld in tlds {
                    let tld = tld.trim().trim_start_matches('.');
                    if tld.is_empty() || tld.contains('.') || tld.contains(' ') {
                        return Err(NameVetError::config(format!(
                            "Invalid TLD '{}' in defaults.tlds",
                            tld
                        )));
                    }
                }
            }
            if let Some(budget) = &defaults.budget {
                require_duration("defaults.budget", budget)?;
            }
        }

        if let Some(engine) = &config.engine {
            for (field, value) in [
                ("engine.probe_timeout", &engine.probe_timeout),
                ("engine.cache_ttl", &engine.cache_ttl),
                ("engine.failure_cache_ttl", &engine.failure_cache_ttl),
            ] {
                if let Some(value) = value {
                    parse_duration_string(value).ok_or_else(|| invalid_duration(field, value))?;
                }
            }
            if let Some(value) = &engine.probe_timeout {
                require_duration("engine.probe_timeout", value)?;
            }
        }

        if let Some(rates) = &config.rate_limits {
            if matches!(rates.per_second, Some(rate) if rate <= 0.0) {
                return Err(NameVetError::config(
                    "rate_limits.per_second must be greater than zero",
                ));
            }
            if matches!(rates.burst, Some(burst) if burst < 1.0) {
                return Err(NameVetError::config("rate_limits.burst must be at least 1"));
            }
            for (field, value) in [
                ("rate_limits.max_wait", &rates.max_wait),
                ("rate_limits.cooldown", &rates.cooldown),
            ] {
                if let Some(value) = value {
                    parse_duration_string(value).ok_or_else(|| invalid_duration(field, value))?;
                }
            }
            for (upstream, limit) in rates.overrides.iter().flatten() {
                if limit.per_second <= 0.0 || limit.burst < 1.0 {
                    return Err(NameVetError::config(format!(
                        "Rate limit override for '{}' must have per_second > 0 and burst >= 1",
                        upstream
                    )));
                }
            }
        }

        if let Some(similarity) = &config.similarity {
            if similarity.top_k == Some(0) {
                return Err(NameVetError::config("similarity.top_k must be at least 1"));
            }
        }

        Ok(())
    }
}

fn merge_section<T>(lower: Option<T>, higher: Option<T>, merge: impl FnOnce(T, T) -> T) -> Option<T> {
    match (lower, higher) {
        (Some(low), Some(high)) => Some(merge(low, high)),
        (low, high) => high.or(low),
    }
}

/// Environment variable configuration that mirrors CLI options.
#[derive(Debug, Clone, Default)]
pub struct EnvConfig {
    pub tlds: Option<Vec<String>>,
    pub platforms: Option<Vec<String>>,
    pub budget: Option<Duration>,
    pub probe_timeout: Option<Duration>,
    pub cache_ttl: Option<Duration>,
    pub json: Option<bool>,
    pub config: Option<String>,
}

impl EnvConfig {
    /// Apply environment values on top of an engine configuration.
    pub fn apply_to_engine(&self, mut config: EngineConfig) -> EngineConfig {
        if let Some(timeout) = self.probe_timeout {
            config.probe_timeout = timeout;
        }
        if let Some(ttl) = self.cache_ttl {
            config.cache_ttl = ttl;
        }
        config
    }

    /// Apply environment values on top of a per-run configuration.
    pub fn apply_to_vet(&self, mut config: VetConfig) -> VetConfig {
        if let Some(tlds) = &self.tlds {
            config = config.with_tlds(tlds.as_slice());
        }
        if let Some(platforms) = &self.platforms {
            config = config.with_platforms(platforms.as_slice());
        }
        if let Some(budget) = self.budget {
            config.timeout_budget = budget;
        }
        config
    }
}

/// Load configuration from `NV_*` environment variables.
///
/// Invalid values are reported (when `verbose`) and ignored.
pub fn load_env_config(verbose: bool) -> EnvConfig {
    load_env_with(verbose, |key| env::var(key).ok())
}

fn load_env_with<F: Fn(&str) -> Option<String>>(verbose: bool, lookup: F) -> EnvConfig {
    let report = |key: &str, value: &str, accepted: bool, hint: &str| {
        if accepted {
            tracing::debug!(key, value, "using environment override");
        } else if verbose {
            eprintln!("⚠️ Invalid {}='{}', {}", key, value, hint);
        }
    };

    let list = |key: &str| -> Option<Vec<String>> {
        let raw = lookup(key)?;
        let items: Vec<String> = raw
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        report(key, &raw, !items.is_empty(), "expected a comma-separated list");
        (!items.is_empty()).then_some(items)
    };

    let duration = |key: &str| -> Option<Duration> {
        let raw = lookup(key)?;
        let parsed = parse_duration_string(&raw).filter(|d| !d.is_zero());
        report(key, &raw, parsed.is_some(), "use a format like '500ms', '5s', '2m'");
        parsed
    };

    let flag = |key: &str| -> Option<bool> {
        let raw = lookup(key)?;
        let parsed = parse_bool_string(&raw);
        report(key, &raw, parsed.is_some(), "use true/false");
        parsed
    };

    EnvConfig {
        tlds: list("NV_TLDS"),
        platforms: list("NV_PLATFORMS"),
        budget: duration("NV_BUDGET"),
        probe_timeout: duration("NV_PROBE_TIMEOUT"),
        cache_ttl: duration("NV_CACHE_TTL"),
        json: flag("NV_JSON"),
        config: lookup("NV_CONFIG").filter(|path| !path.trim().is_empty()),
    }
}

/// Longest duration any setting accepts.
pub const MAX_DURATION: Duration = Duration::from_secs(24 * 60 * 60);

/// Parse a duration like "500ms", "5s", "2m" or bare seconds.
///
/// Values that overflow or exceed [`MAX_DURATION`] are rejected.
pub fn parse_duration_string(value: &str) -> Option<Duration> {
    parse_duration_unbounded(value).filter(|duration| *duration <= MAX_DURATION)
}

fn parse_duration_unbounded(value: &str) -> Option<Duration> {
    let value = value.trim().to_lowercase();

    if let Some(millis) = value.strip_suffix("ms") {
        millis.trim().parse::<u64>().ok().map(Duration::from_millis)
    } else if let Some(secs) = value.strip_suffix('s') {
        secs.trim().parse::<u64>().ok().map(Duration::from_secs)
    } else if let Some(mins) = value.strip_suffix('m') {
        mins.trim()
            .parse::<u64>()
            .ok()
            .and_then(|m| m.checked_mul(60))
            .map(Duration::from_secs)
    } else {
        value.parse::<u64>().ok().map(Duration::from_secs)
    }
}

fn parse_bool_string(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn invalid_duration(field: &str, value: &str) -> NameVetError {
    NameVetError::config(format!(
        "Invalid duration '{}' for {}. Use a format like '500ms', '5s', '2m'",
        value, field
    ))
}

/// A duration that must parse and be non-zero.
fn require_duration(field: &str, value: &str) -> Result<Duration, NameVetError> {
    match parse_duration_string(value) {
        Some(duration) if !duration.is_zero() => Ok(duration),
        Some(_) => Err(NameVetError::config(format!(
            "{} must be greater than zero",
            field
        ))),
        None => Err(invalid_duration(field, value)),
    }
}
