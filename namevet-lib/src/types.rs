//! Core data types for name vetting.
//!
//! This module defines the check targets, verdicts and reports produced by
//! the engine, plus the configuration structs that drive it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

/// Something to verify: a domain under one TLD, or a handle on one platform.
///
/// Used as the cache key, so two targets are equal exactly when they would
/// produce the same network calls.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CheckTarget {
    /// A second-level label under a TLD, e.g. `acme` + `io`
    Domain { name: String, tld: String },
    /// A handle on a social platform, e.g. `Threads` + `acme`
    Social { platform: String, handle: String },
}

impl CheckTarget {
    /// Build a domain target, normalizing case and stray dots.
    pub fn domain<N: AsRef<str>, T: AsRef<str>>(name: N, tld: T) -> Self {
        Self::Domain {
            name: name.as_ref().trim().to_lowercase(),
            tld: tld.as_ref().trim().trim_start_matches('.').to_lowercase(),
        }
    }

    /// Build a social target. The platform keeps its canonical display name.
    pub fn social<P: Into<String>, H: AsRef<str>>(platform: P, handle: H) -> Self {
        Self::Social {
            platform: platform.into(),
            handle: handle.as_ref().trim().to_lowercase(),
        }
    }

    /// The fully qualified domain for domain targets.
    pub fn fqdn(&self) -> Option<String> {
        match self {
            Self::Domain { name, tld } => Some(format!("{}.{}", name, tld)),
            Self::Social { .. } => None,
        }
    }
}

impl fmt::Display for CheckTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Domain { name, tld } => write!(f, "{}.{}", name, tld),
            Self::Social { platform, handle } => write!(f, "{}:@{}", platform, handle),
        }
    }
}

/// Availability status of a target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Availability {
    Available,
    Taken,
    Unknown,
}

impl fmt::Display for Availability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Availability::Available => write!(f, "available"),
            Availability::Taken => write!(f, "taken"),
            Availability::Unknown => write!(f, "unknown"),
        }
    }
}

/// Which probe produced a verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VerdictSource {
    #[serde(rename = "rdap")]
    Rdap,
    #[serde(rename = "whois")]
    Whois,
    #[serde(rename = "dns")]
    Dns,
    #[serde(rename = "http_probe")]
    HttpProbe,
    /// The platform is known to defeat automated checks; nothing was called
    #[serde(rename = "manual_fallback")]
    ManualFallback,
    /// No probe produced a usable answer
    #[serde(rename = "none")]
    None,
}

impl fmt::Display for VerdictSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VerdictSource::Rdap => write!(f, "RDAP"),
            VerdictSource::Whois => write!(f, "WHOIS"),
            VerdictSource::Dns => write!(f, "DNS"),
            VerdictSource::HttpProbe => write!(f, "HTTP"),
            VerdictSource::ManualFallback => write!(f, "manual"),
            VerdictSource::None => write!(f, "none"),
        }
    }
}

/// How much weight a verdict deserves.
///
/// Registry protocols answer authoritatively. DNS only proves that a name
/// resolves; the absence of records says nothing about registration, so a
/// DNS-derived `Available` is provisional. Profile-page probes are
/// heuristics for the same reason.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    Authoritative,
    Provisional,
    None,
}

impl Confidence {
    fn for_outcome(status: Availability, source: VerdictSource) -> Self {
        match (status, source) {
            (Availability::Unknown, _) => Confidence::None,
            (_, VerdictSource::Rdap | VerdictSource::Whois) => Confidence::Authoritative,
            (_, VerdictSource::Dns | VerdictSource::HttpProbe) => Confidence::Provisional,
            (_, VerdictSource::ManualFallback | VerdictSource::None) => Confidence::None,
        }
    }
}

/// Outcome of checking one target.
///
/// Verdicts are built once through the constructors below and never patched;
/// a newer answer replaces the old verdict wholesale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    pub target: CheckTarget,
    pub status: Availability,
    pub source: VerdictSource,
    pub confidence: Confidence,

    /// Registrar, profile URL, manual-check link or failure summary
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,

    pub checked_at: DateTime<Utc>,
}

impl Verdict {
    fn build(
        target: CheckTarget,
        status: Availability,
        source: VerdictSource,
        detail: Option<String>,
    ) -> Self {
        Self {
            confidence: Confidence::for_outcome(status, source),
            target,
            status,
            source,
            detail,
            checked_at: Utc::now(),
        }
    }

    pub fn available(target: CheckTarget, source: VerdictSource, detail: Option<String>) -> Self {
        Self::build(target, Availability::Available, source, detail)
    }

    pub fn taken(target: CheckTarget, source: VerdictSource, detail: Option<String>) -> Self {
        Self::build(target, Availability::Taken, source, detail)
    }

    /// Insufficient evidence. Always carries `source = None`.
    pub fn unknown<D: Into<String>>(target: CheckTarget, detail: D) -> Self {
        Self::build(
            target,
            Availability::Unknown,
            VerdictSource::None,
            Some(detail.into()),
        )
    }

    /// Deliberate "check this by hand" answer with a link for the user.
    pub fn manual_fallback<L: Into<String>>(target: CheckTarget, link: L) -> Self {
        Self::build(
            target,
            Availability::Unknown,
            VerdictSource::ManualFallback,
            Some(link.into()),
        )
    }

    /// Unknown because something upstream failed, as opposed to policy.
    pub fn is_infrastructure_failure(&self) -> bool {
        self.status == Availability::Unknown && self.source != VerdictSource::ManualFallback
    }

    /// Available, but only on weak evidence (DNS or page heuristics).
    pub fn is_provisional(&self) -> bool {
        self.status == Availability::Available && self.confidence == Confidence::Provisional
    }
}

/// A registered domain lexically close to the queried name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimilarMatch {
    pub domain: String,
    pub distance: usize,
}

impl Ord for SimilarMatch {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.distance
            .cmp(&other.distance)
            .then_with(|| self.domain.cmp(&other.domain))
    }
}

impl PartialOrd for SimilarMatch {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

/// Aggregated answer for one candidate name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VettingReport {
    /// The name as the caller supplied it
    pub name: String,

    /// Normalized label used for domains and handles
    pub handle: String,

    /// One verdict per requested TLD, in request order
    pub domains: Vec<Verdict>,

    /// One verdict per requested platform, in request order
    pub social: Vec<Verdict>,

    /// Closest registered look-alikes first
    pub similar: Vec<SimilarMatch>,

    /// False when any verdict is Unknown because of an upstream failure
    pub completeness: bool,

    pub checked_at: DateTime<Utc>,

    /// Wall-clock time the vetting took
    #[serde(with = "duration_millis")]
    pub elapsed: Duration,
}

impl VettingReport {
    /// All verdicts, domains first.
    pub fn verdicts(&self) -> impl Iterator<Item = &Verdict> {
        self.domains.iter().chain(self.social.iter())
    }
}

/// Which targets one `vet` call covers and how long it may take.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VetConfig {
    /// TLDs to check, in output order (e.g. ["com", "io"])
    pub tlds: Vec<String>,

    /// Platforms to check, in output order (e.g. ["Instagram", "Threads"])
    pub platforms: Vec<String>,

    /// Hard ceiling on total latency for one `vet` call
    #[serde(with = "duration_millis")]
    pub timeout_budget: Duration,
}

impl Default for VetConfig {
    fn default() -> Self {
        Self {
            tlds: DEFAULT_TLDS.iter().map(|s| s.to_string()).collect(),
            platforms: DEFAULT_PLATFORMS.iter().map(|s| s.to_string()).collect(),
            timeout_budget: Duration::from_secs(12),
        }
    }
}

impl VetConfig {
    /// Replace the TLD list. Leading dots and duplicates are dropped.
    pub fn with_tlds<S: AsRef<str>>(mut self, tlds: &[S]) -> Self {
        self.tlds = dedupe_preserving_order(
            tlds.iter()
                .map(|t| t.as_ref().trim().trim_start_matches('.').to_lowercase()),
        );
        self
    }

    /// Replace the platform list. Duplicates are dropped.
    pub fn with_platforms<S: AsRef<str>>(mut self, platforms: &[S]) -> Self {
        self.platforms =
            dedupe_preserving_order(platforms.iter().map(|p| p.as_ref().trim().to_string()));
        self
    }

    pub fn with_timeout_budget(mut self, budget: Duration) -> Self {
        self.timeout_budget = budget;
        self
    }
}

fn dedupe_preserving_order<I: Iterator<Item = String>>(items: I) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    items
        .filter(|item| !item.is_empty())
        .filter(|item| seen.insert(item.to_lowercase()))
        .collect()
}

/// TLDs checked when the caller does not choose.
pub const DEFAULT_TLDS: &[&str] = &["com", "co", "io", "net", "org", "ai"];

/// Platforms checked when the caller does not choose.
pub const DEFAULT_PLATFORMS: &[&str] = &[
    "Instagram",
    "TikTok",
    "YouTube",
    "X",
    "Facebook",
    "LinkedIn",
    "Threads",
];

/// Token bucket parameters for one upstream.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RateLimit {
    /// Sustained calls per second
    pub per_second: f64,
    /// Bucket capacity (calls allowed in a burst)
    pub burst: f64,
}

impl RateLimit {
    pub fn new(per_second: f64, burst: f64) -> Self {
        Self { per_second, burst }
    }
}

impl Default for RateLimit {
    fn default() -> Self {
        Self::new(2.0, 6.0)
    }
}

/// Shared rate limiter settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Applied to any upstream without an override
    pub default: RateLimit,

    /// Per-upstream overrides, keyed by upstream name (host or platform)
    pub overrides: HashMap<String, RateLimit>,

    /// Longest a caller may wait for the next token before giving up
    #[serde(with = "duration_millis")]
    pub max_wait: Duration,

    /// How long an upstream is left alone after it throttles us
    #[serde(with = "duration_millis")]
    pub cooldown: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            default: RateLimit::default(),
            overrides: HashMap::new(),
            max_wait: Duration::from_millis(500),
            cooldown: Duration::from_secs(30),
        }
    }
}

/// Similarity matcher settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimilarityConfig {
    /// Largest edit distance still considered a near-duplicate
    pub threshold: usize,
    /// Maximum number of matches returned
    pub top_k: usize,
    /// Zone searched in the domain corpus
    pub zone: String,
    /// Number of raw candidates requested from the corpus
    pub corpus_limit: usize,
}

impl Default for SimilarityConfig {
    fn default() -> Self {
        Self {
            threshold: 3,
            top_k: 8,
            zone: "com".to_string(),
            corpus_limit: 20,
        }
    }
}

/// Process-wide engine settings.
///
/// One engine is built per process from this configuration; everything
/// per-request lives in [`VetConfig`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Timeout applied to every individual probe call
    /// Default: 4 seconds
    #[serde(with = "duration_millis")]
    pub probe_timeout: Duration,

    /// How long definitive verdicts stay cached
    /// Default: 90 seconds
    #[serde(with = "duration_millis")]
    pub cache_ttl: Duration,

    /// How long Unknown verdicts caused by upstream failure stay cached
    /// Default: 10 seconds
    #[serde(with = "duration_millis")]
    pub failure_cache_ttl: Duration,

    pub rate_limits: RateLimitConfig,

    pub similarity: SimilarityConfig,

    /// User agent sent on HTTP probes
    pub user_agent: String,

    /// URL fetched by the active health check
    pub health_check_url: String,

    /// Platforms forced to manual fallback on top of the built-in table
    pub manual_platforms: Vec<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            probe_timeout: Duration::from_secs(4),
            cache_ttl: Duration::from_secs(90),
            failure_cache_ttl: Duration::from_secs(10),
            rate_limits: RateLimitConfig::default(),
            similarity: SimilarityConfig::default(),
            user_agent: BROWSER_USER_AGENT.to_string(),
            health_check_url: "https://rdap.org/".to_string(),
            manual_platforms: Vec::new(),
        }
    }
}

impl EngineConfig {
    /// Set the per-probe timeout.
    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    /// Set the TTL for definitive verdicts.
    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    /// Set the TTL for failure verdicts.
    pub fn with_failure_cache_ttl(mut self, ttl: Duration) -> Self {
        self.failure_cache_ttl = ttl;
        self
    }

    /// Replace rate limiter settings.
    pub fn with_rate_limits(mut self, rate_limits: RateLimitConfig) -> Self {
        self.rate_limits = rate_limits;
        self
    }

    /// Replace similarity settings.
    pub fn with_similarity(mut self, similarity: SimilarityConfig) -> Self {
        self.similarity = similarity;
        self
    }

    /// Force extra platforms to manual fallback.
    pub fn with_manual_platforms(mut self, platforms: Vec<String>) -> Self {
        self.manual_platforms = platforms;
        self
    }
}

/// Some platforms serve a login wall to obvious bots; look like a browser.
pub(crate) const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Overall engine health.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    Ok,
    Degraded,
    Down,
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HealthStatus::Ok => write!(f, "ok"),
            HealthStatus::Degraded => write!(f, "degraded"),
            HealthStatus::Down => write!(f, "down"),
        }
    }
}

/// Readiness signal for the request layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthReport {
    pub status: HealthStatus,
    /// Outbound network reached the health-check endpoint
    pub outbound: bool,
    /// Rate limiter state is usable
    pub rate_limiter: bool,
    /// Probe calls in a row that could not reach their upstream
    pub consecutive_unreachable: u64,
    /// Upstreams currently cooling down after throttling us
    pub throttled_upstreams: Vec<String>,
    pub cached_verdicts: usize,
    pub version: String,
    pub checked_at: DateTime<Utc>,
}

/// Serialize durations as integer milliseconds.
pub(crate) mod duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(d)?))
    }
}
