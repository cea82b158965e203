//! Domain resolver: the RDAP -> WHOIS -> DNS fallback chain.
//!
//! The resolver never fails. It walks its probes in order, returns the first
//! definitive finding, and folds every failure into the detail of an
//! `Unknown` verdict when nothing answered.

use crate::error::{NameVetError, ProbeFailure};
use crate::health::HealthMonitor;
use crate::limiter::RateLimiter;
use crate::protocols::DomainProbe;
use crate::types::{CheckTarget, Verdict};
use crate::utils::split_domain;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Run one outbound call under the shared rate limiter and per-call timeout.
///
/// A local bucket refusal comes back as `RateLimited` without touching the
/// network. An upstream that throttles us gets its bucket penalised. Every
/// call that went out is reported to the health monitor.
pub(crate) async fn guarded_call<T, F>(
    limiter: &RateLimiter,
    health: &HealthMonitor,
    upstream: &str,
    timeout: Duration,
    call: F,
) -> Result<T, ProbeFailure>
where
    F: Future<Output = Result<T, ProbeFailure>>,
{
    limiter.acquire(upstream).await?;

    let result = match tokio::time::timeout(timeout, call).await {
        Ok(result) => result,
        Err(_) => Err(ProbeFailure::Timeout),
    };

    if matches!(result, Err(ProbeFailure::RateLimited)) {
        limiter.penalize(upstream);
    }
    health.record(&result);
    result
}

/// Resolves one domain to one verdict through an ordered list of probes.
pub struct DomainResolver {
    probes: Vec<Arc<dyn DomainProbe>>,
    limiter: Arc<RateLimiter>,
    health: Arc<HealthMonitor>,
    probe_timeout: Duration,
}

impl DomainResolver {
    pub fn new(
        probes: Vec<Arc<dyn DomainProbe>>,
        limiter: Arc<RateLimiter>,
        health: Arc<HealthMonitor>,
        probe_timeout: Duration,
    ) -> Self {
        Self {
            probes,
            limiter,
            health,
            probe_timeout,
        }
    }

    /// Parse a fully qualified domain into its check target.
    pub fn target_for(domain: &str) -> Result<CheckTarget, NameVetError> {
        let (name, tld) = split_domain(domain)?;
        Ok(CheckTarget::domain(name, tld))
    }

    /// Check a fully qualified domain such as `acme.io`.
    ///
    /// Syntactically invalid names come back `Unknown` without any call.
    pub async fn resolve(&self, domain: &str) -> Verdict {
        match Self::target_for(domain) {
            Ok(target) => self.resolve_target(&target).await,
            Err(err) => {
                let trimmed = domain.trim().trim_end_matches('.');
                let (name, tld) = trimmed.rsplit_once('.').unwrap_or((trimmed, ""));
                Verdict::unknown(CheckTarget::domain(name, tld), err.to_string())
            }
        }
    }

    /// Walk the fallback chain for a domain target.
    pub async fn resolve_target(&self, target: &CheckTarget) -> Verdict {
        let Some(fqdn) = target.fqdn() else {
            return Verdict::unknown(target.clone(), "not a domain target");
        };
        if let Err(err) = crate::utils::validate_domain(&fqdn) {
            return Verdict::unknown(target.clone(), err.to_string());
        }
        if self.probes.is_empty() {
            return Verdict::unknown(target.clone(), "no domain probes configured");
        }

        let mut failures = Vec::with_capacity(self.probes.len());
        for probe in &self.probes {
            let source = probe.source();
            let result = if probe.serves(&fqdn) {
                let upstream = probe.upstream(&fqdn);
                guarded_call(
                    &self.limiter,
                    &self.health,
                    &upstream,
                    self.probe_timeout,
                    probe.probe(&fqdn),
                )
                .await
            } else {
                // Nothing went out, so neither the limiter nor health hears of it
                Err(ProbeFailure::Unreachable)
            };

            match result {
                Ok(finding) => {
                    tracing::debug!(domain = %fqdn, probe = %source, outcome = %finding.status, "probe answered");
                    return finding.into_verdict(target.clone(), source);
                }
                Err(failure) => {
                    tracing::debug!(domain = %fqdn, probe = %source, outcome = %failure, "probe failed, falling back");
                    failures.push(format!("{}: {}", source.to_string().to_lowercase(), failure));
                }
            }
        }

        Verdict::unknown(target.clone(), failures.join("; "))
    }
}
