//! Verification engine: the entry point of the library.
//!
//! The engine owns the shared cache, rate limiter and health monitor, and
//! fans a vetting run out over the domain resolver, the social prober and
//! the similarity matcher. Everything shared is held behind `Arc`s, so an
//! engine is cheap to clone into spawned tasks.

use crate::cache::VerdictCache;
use crate::config::MAX_DURATION;
use crate::error::NameVetError;
use crate::health::HealthMonitor;
use crate::limiter::RateLimiter;
use crate::protocols::http::{HttpFetcher, ReqwestFetcher, HTML_ACCEPT};
use crate::protocols::DomainProbe;
use crate::resolver::DomainResolver;
use crate::similarity::{CorpusSearch, DomainsDbCorpus, SimilarityMatcher};
use crate::social::{default_platforms, PlatformSpec, SocialProber};
use crate::types::{
    CheckTarget, EngineConfig, HealthReport, SimilarMatch, Verdict, VerdictSource, VetConfig,
    VettingReport,
};
use crate::utils::normalize_handle;
use crate::Result;
use chrono::Utc;
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinHandle;

/// Main engine that coordinates availability checks.
///
/// # Example
///
/// ```rust,no_run
/// use namevet_lib::{EngineConfig, VerificationEngine, VetConfig};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let engine = VerificationEngine::new(EngineConfig::default())?;
///     let report = engine.vet("Acme Robotics", &VetConfig::default()).await?;
///
///     for verdict in report.verdicts() {
///         println!("{}: {}", verdict.target, verdict.status);
///     }
///     Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct VerificationEngine {
    inner: Arc<EngineInner>,
}

struct EngineInner {
    config: EngineConfig,
    cache: Arc<VerdictCache>,
    limiter: Arc<RateLimiter>,
    health: Arc<HealthMonitor>,
    fetcher: Arc<dyn HttpFetcher>,
    resolver: DomainResolver,
    social: SocialProber,
    similarity: SimilarityMatcher,
}

/// A report slot: either answered from cache or still running.
enum Pending<T> {
    Ready(T),
    Running(JoinHandle<T>),
}

impl VerificationEngine {
    /// Build an engine with real network transports.
    ///
    /// Must be called inside a Tokio runtime (the DNS resolver binds to it).
    pub fn new(config: EngineConfig) -> Result<Self> {
        EngineBuilder::new(config).build()
    }

    /// Start building an engine with injected parts.
    pub fn builder(config: EngineConfig) -> EngineBuilder {
        EngineBuilder::new(config)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    /// Platforms this engine knows, in table order.
    pub fn platforms(&self) -> &[PlatformSpec] {
        self.inner.social.platforms()
    }

    /// Vet a candidate name across domains, social handles and look-alikes.
    ///
    /// Returns within `timeout_budget` plus scheduling slack no matter how
    /// the upstreams behave. Checks still running at the deadline are
    /// reported `Unknown` and left to finish in the background, where their
    /// verdicts still land in the cache.
    ///
    /// # Errors
    ///
    /// `NameVetError::InvalidName` when the name has nothing usable in it.
    /// Per-target failures never surface here; they become `Unknown`
    /// verdicts.
    pub async fn vet(&self, name: &str, vet_config: &VetConfig) -> Result<VettingReport> {
        let started = Instant::now();
        let deadline = tokio::time::Instant::now() + vet_config.timeout_budget.min(MAX_DURATION);
        let handle = normalize_handle(name)?;

        let domain_targets: Vec<CheckTarget> = vet_config
            .tlds
            .iter()
            .map(|tld| CheckTarget::domain(&handle, tld))
            .collect();
        let social_targets: Vec<CheckTarget> = vet_config
            .platforms
            .iter()
            .map(|platform| self.inner.social.target_for(platform, &handle))
            .collect();

        let domain_slots: Vec<_> = domain_targets.iter().map(|t| self.dispatch(t)).collect();
        let social_slots: Vec<_> = social_targets.iter().map(|t| self.dispatch(t)).collect();
        let similar_task: JoinHandle<Vec<SimilarMatch>> = {
            let engine = self.clone();
            let handle = handle.clone();
            tokio::spawn(async move { engine.inner.similarity.find_similar(&handle).await })
        };

        let mut domains = Vec::with_capacity(domain_slots.len());
        for (target, slot) in domain_targets.into_iter().zip(domain_slots) {
            domains.push(Self::collect(target, slot, deadline).await);
        }
        let mut social = Vec::with_capacity(social_slots.len());
        for (target, slot) in social_targets.into_iter().zip(social_slots) {
            social.push(Self::collect(target, slot, deadline).await);
        }
        let similar = match tokio::time::timeout_at(deadline, similar_task).await {
            Ok(Ok(similar)) => similar,
            Ok(Err(err)) => {
                tracing::warn!(error = %err, "similarity task failed");
                Vec::new()
            }
            Err(_) => {
                tracing::warn!(handle = %handle, "similarity search exceeded the budget");
                Vec::new()
            }
        };

        let completeness = !domains
            .iter()
            .chain(social.iter())
            .any(Verdict::is_infrastructure_failure);
        let elapsed = started.elapsed();

        tracing::info!(
            name,
            handle = %handle,
            domains = domains.len(),
            social = social.len(),
            similar = similar.len(),
            complete = completeness,
            elapsed_ms = elapsed.as_millis() as u64,
            "vetting finished"
        );

        Ok(VettingReport {
            name: name.to_string(),
            handle,
            domains,
            social,
            similar,
            completeness,
            checked_at: Utc::now(),
            elapsed,
        })
    }

    /// Check one fully qualified domain through the fallback chain.
    ///
    /// Never fails: invalid names and exhausted chains come back `Unknown`.
    pub async fn resolve_domain(&self, domain: &str) -> Verdict {
        match DomainResolver::target_for(domain) {
            Ok(target) => self.check_target(&target).await,
            Err(_) => self.inner.resolver.resolve(domain).await,
        }
    }

    /// Check one handle on one platform. Never fails.
    pub async fn check_social(&self, platform: &str, handle: &str) -> Verdict {
        let target = self.inner.social.target_for(platform, handle);
        self.check_target(&target).await
    }

    /// Readiness of the engine for the request layer.
    ///
    /// Combines the passive unreachable streak with one active request to
    /// the configured health-check URL and a check of the limiter's locks.
    pub async fn health(&self) -> HealthReport {
        let inner = &self.inner;
        let outbound = matches!(
            tokio::time::timeout(
                inner.config.probe_timeout,
                inner.fetcher.get(&inner.config.health_check_url, HTML_ACCEPT),
            )
            .await,
            Ok(Ok(_))
        );
        let rate_limiter = inner.limiter.is_operational();
        let throttled_upstreams = inner.limiter.throttled_upstreams();
        inner.cache.purge_expired();

        let status = inner
            .health
            .assess(outbound, rate_limiter, throttled_upstreams.len());
        if status != crate::types::HealthStatus::Ok {
            tracing::warn!(%status, outbound, rate_limiter, "engine health check");
        }

        HealthReport {
            status,
            outbound,
            rate_limiter,
            consecutive_unreachable: inner.health.consecutive_unreachable(),
            throttled_upstreams,
            cached_verdicts: inner.cache.len(),
            version: crate::VERSION.to_string(),
            checked_at: Utc::now(),
        }
    }

    /// Serve from cache or run the check now.
    async fn check_target(&self, target: &CheckTarget) -> Verdict {
        match self.inner.cache.get(target) {
            Some(verdict) => verdict,
            None => self.check_uncached(target).await,
        }
    }

    fn dispatch(&self, target: &CheckTarget) -> Pending<Verdict> {
        if let Some(verdict) = self.inner.cache.get(target) {
            tracing::debug!(target = %target, "cache hit");
            return Pending::Ready(verdict);
        }
        let engine = self.clone();
        let target = target.clone();
        Pending::Running(tokio::spawn(async move {
            engine.check_uncached(&target).await
        }))
    }

    async fn collect(
        target: CheckTarget,
        slot: Pending<Verdict>,
        deadline: tokio::time::Instant,
    ) -> Verdict {
        match slot {
            Pending::Ready(verdict) => verdict,
            Pending::Running(task) => match tokio::time::timeout_at(deadline, task).await {
                Ok(Ok(verdict)) => verdict,
                Ok(Err(err)) => {
                    tracing::warn!(target = %target, error = %err, "check task failed");
                    Verdict::unknown(target, "check task failed")
                }
                Err(_) => {
                    // Dropping the handle detaches the task; it still caches its verdict
                    tracing::warn!(target = %target, "verification budget exceeded");
                    Verdict::unknown(target, "verification budget exceeded")
                }
            },
        }
    }

    /// Run the check for a target and cache whatever comes back.
    async fn check_uncached(&self, target: &CheckTarget) -> Verdict {
        let verdict = match target {
            CheckTarget::Domain { .. } => self.inner.resolver.resolve_target(target).await,
            CheckTarget::Social { platform, handle } => {
                self.inner.social.check(platform, handle).await
            }
        };
        self.store(&verdict);
        verdict
    }

    fn store(&self, verdict: &Verdict) {
        if verdict.source == VerdictSource::ManualFallback {
            return;
        }
        let config = &self.inner.config;
        let ttl = if verdict.is_infrastructure_failure() {
            config.failure_cache_ttl
        } else {
            config.cache_ttl
        };
        self.inner.cache.insert(verdict.clone(), ttl);
    }
}

/// Assembles a [`VerificationEngine`], letting callers swap in their own
/// cache, limiter, transports and probes.
pub struct EngineBuilder {
    config: EngineConfig,
    cache: Option<Arc<VerdictCache>>,
    limiter: Option<Arc<RateLimiter>>,
    fetcher: Option<Arc<dyn HttpFetcher>>,
    domain_probes: Option<Vec<Arc<dyn DomainProbe>>>,
    corpus: Option<Arc<dyn CorpusSearch>>,
    platforms: Option<Vec<PlatformSpec>>,
}

impl EngineBuilder {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            cache: None,
            limiter: None,
            fetcher: None,
            domain_probes: None,
            corpus: None,
            platforms: None,
        }
    }

    pub fn with_cache(mut self, cache: Arc<VerdictCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_rate_limiter(mut self, limiter: Arc<RateLimiter>) -> Self {
        self.limiter = Some(limiter);
        self
    }

    /// HTTP transport for profile pages, the corpus, health checks and the
    /// default RDAP probe.
    pub fn with_fetcher(mut self, fetcher: Arc<dyn HttpFetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    /// Replace the whole fallback chain, in order.
    pub fn with_domain_probes(mut self, probes: Vec<Arc<dyn DomainProbe>>) -> Self {
        self.domain_probes = Some(probes);
        self
    }

    pub fn with_corpus(mut self, corpus: Arc<dyn CorpusSearch>) -> Self {
        self.corpus = Some(corpus);
        self
    }

    pub fn with_platforms(mut self, platforms: Vec<PlatformSpec>) -> Self {
        self.platforms = Some(platforms);
        self
    }

    pub fn build(self) -> Result<VerificationEngine> {
        validate_engine_config(&self.config)?;
        let config = self.config;

        let cache = self.cache.unwrap_or_default();
        let limiter = self
            .limiter
            .unwrap_or_else(|| Arc::new(RateLimiter::new(config.rate_limits.clone())));
        let health = Arc::new(HealthMonitor::new());
        let fetcher: Arc<dyn HttpFetcher> = match self.fetcher {
            Some(fetcher) => fetcher,
            None => Arc::new(ReqwestFetcher::new(&config.user_agent, config.probe_timeout)?),
        };
        let probes = match self.domain_probes {
            Some(probes) => probes,
            None => default_domain_probes(&config, &fetcher),
        };
        let corpus: Arc<dyn CorpusSearch> = self
            .corpus
            .unwrap_or_else(|| Arc::new(DomainsDbCorpus::new(fetcher.clone())));

        let resolver = DomainResolver::new(
            probes,
            limiter.clone(),
            health.clone(),
            config.probe_timeout,
        );
        let social = SocialProber::new(
            self.platforms.unwrap_or_else(default_platforms),
            fetcher.clone(),
            limiter.clone(),
            health.clone(),
            config.probe_timeout,
        )
        .with_manual_platforms(config.manual_platforms.as_slice());
        let similarity = SimilarityMatcher::new(
            corpus,
            config.similarity.clone(),
            limiter.clone(),
            health.clone(),
            config.probe_timeout,
        );

        Ok(VerificationEngine {
            inner: Arc::new(EngineInner {
                config,
                cache,
                limiter,
                health,
                fetcher,
                resolver,
                social,
                similarity,
            }),
        })
    }
}

/// RDAP, then WHOIS, then DNS, as far as the enabled features allow.
fn default_domain_probes(
    config: &EngineConfig,
    fetcher: &Arc<dyn HttpFetcher>,
) -> Vec<Arc<dyn DomainProbe>> {
    #[cfg(feature = "rdap")]
    let rdap: Option<Arc<dyn DomainProbe>> =
        Some(Arc::new(crate::protocols::RdapProbe::new(fetcher.clone())));
    #[cfg(not(feature = "rdap"))]
    let rdap: Option<Arc<dyn DomainProbe>> = {
        let _ = fetcher;
        None
    };

    #[cfg(feature = "whois")]
    let whois: Option<Arc<dyn DomainProbe>> = Some(Arc::new(crate::protocols::WhoisProbe::new(
        Arc::new(crate::protocols::TcpWhoisTransport::new()),
    )));
    #[cfg(not(feature = "whois"))]
    let whois: Option<Arc<dyn DomainProbe>> = None;

    #[cfg(feature = "dns")]
    let dns: Option<Arc<dyn DomainProbe>> = Some(Arc::new(
        crate::protocols::DnsProbe::from_system_conf(config.probe_timeout),
    ));
    #[cfg(not(feature = "dns"))]
    let dns: Option<Arc<dyn DomainProbe>> = {
        let _ = config;
        None
    };

    [rdap, whois, dns].into_iter().flatten().collect()
}

fn validate_engine_config(config: &EngineConfig) -> std::result::Result<(), NameVetError> {
    if config.probe_timeout.is_zero() {
        return Err(NameVetError::config("probe timeout must be greater than zero"));
    }
    if config.rate_limits.default.per_second <= 0.0 || config.rate_limits.default.burst < 1.0 {
        return Err(NameVetError::config(
            "rate limit must allow at least one call per second and a burst of one",
        ));
    }
    for (upstream, limit) in &config.rate_limits.overrides {
        if limit.per_second <= 0.0 || limit.burst < 1.0 {
            return Err(NameVetError::config(format!(
                "rate limit override for '{}' must be positive",
                upstream
            )));
        }
    }
    if config.similarity.top_k == 0 {
        return Err(NameVetError::config("similarity top_k must be at least 1"));
    }
    Ok(())
}
