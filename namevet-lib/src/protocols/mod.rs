//! Protocol probes for domain availability checking.
//!
//! Each probe makes exactly one network call against one upstream and
//! classifies the answer. Probes never retry and never apply their own
//! timeout; the resolver wraps every call in the same per-probe deadline.

/// RDAP (Registration Data Access Protocol) probe
pub mod rdap;

/// WHOIS probe over TCP port 43
pub mod whois;

/// DNS existence probe
pub mod dns;

/// HTTP transport shared by RDAP, social and corpus lookups
pub mod http;

/// Per-TLD registry profiles
pub mod registry;

use crate::error::ProbeFailure;
use crate::types::{Availability, CheckTarget, Verdict, VerdictSource};
use async_trait::async_trait;

pub use dns::DnsProbe;
pub use http::{HttpFetcher, HttpResponse, ReqwestFetcher};
pub use rdap::RdapProbe;
pub use registry::{list_tld_profiles, tld_profile, RdapService, TldProfile, WhoisDialect};
pub use whois::{TcpWhoisTransport, WhoisProbe, WhoisTransport};

/// A definitive answer from one probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeFinding {
    /// Either `Available` or `Taken`; a probe that cannot tell fails instead
    pub status: Availability,
    pub detail: Option<String>,
}

impl ProbeFinding {
    pub fn available(detail: Option<String>) -> Self {
        Self {
            status: Availability::Available,
            detail,
        }
    }

    pub fn taken(detail: Option<String>) -> Self {
        Self {
            status: Availability::Taken,
            detail,
        }
    }

    /// Turn the finding into the verdict for `target`.
    pub fn into_verdict(self, target: CheckTarget, source: VerdictSource) -> Verdict {
        match self.status {
            Availability::Available => Verdict::available(target, source, self.detail),
            Availability::Taken => Verdict::taken(target, source, self.detail),
            Availability::Unknown => Verdict::unknown(
                target,
                self.detail.unwrap_or_else(|| format!("{} was inconclusive", source)),
            ),
        }
    }
}

/// One step of the domain fallback chain.
#[async_trait]
pub trait DomainProbe: Send + Sync {
    /// Which verdict source a finding from this probe carries.
    fn source(&self) -> VerdictSource;

    /// Rate limiter key for the upstream this probe would call for `domain`.
    fn upstream(&self, domain: &str) -> String;

    /// Whether this probe has anything to ask for `domain`.
    ///
    /// A probe that cannot serve a domain is skipped without a call.
    fn serves(&self, _domain: &str) -> bool {
        true
    }

    /// Check a fully qualified domain such as `acme.io`.
    async fn probe(&self, domain: &str) -> Result<ProbeFinding, ProbeFailure>;
}

/// The TLD of a fully qualified domain, lowercased.
pub(crate) fn tld_of(domain: &str) -> Result<String, ProbeFailure> {
    domain
        .trim_end_matches('.')
        .rsplit_once('.')
        .map(|(_, tld)| tld.to_lowercase())
        .filter(|tld| !tld.is_empty())
        .ok_or(ProbeFailure::Unreachable)
}
