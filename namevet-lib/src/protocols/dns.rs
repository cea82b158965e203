//! DNS existence probe, the last step of the fallback chain.
//!
//! DNS cannot prove a name is unregistered: a registered domain may simply
//! have no zone. It can prove a name is in use, and NXDOMAIN from the TLD's
//! servers is a decent hint that nobody holds it. Findings from here are
//! therefore labelled provisional by the verdict constructors.

use super::{DomainProbe, ProbeFinding};
use crate::error::ProbeFailure;
use crate::types::VerdictSource;
use async_trait::async_trait;
use hickory_resolver::config::{ResolverConfig, ResolverOpts};
use hickory_resolver::error::{ResolveError, ResolveErrorKind};
use hickory_resolver::proto::op::ResponseCode;
use hickory_resolver::proto::rr::RecordType;
use hickory_resolver::TokioAsyncResolver;
use std::time::Duration;

/// Record types asked for, most telling first.
const RECORD_TYPES: [RecordType; 4] = [RecordType::NS, RecordType::A, RecordType::AAAA, RecordType::MX];

/// Result of one record-type lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupOutcome {
    /// At least one record came back
    Records,
    /// NOERROR with an empty answer: the name exists
    NoData,
    /// The name does not exist
    NxDomain,
    Failed(ProbeFailure),
}

impl From<&ResolveError> for LookupOutcome {
    fn from(err: &ResolveError) -> Self {
        match err.kind() {
            ResolveErrorKind::NoRecordsFound { response_code, .. } => {
                if *response_code == ResponseCode::NXDomain {
                    Self::NxDomain
                } else if *response_code == ResponseCode::NoError {
                    Self::NoData
                } else {
                    Self::Failed(ProbeFailure::Unreachable)
                }
            }
            ResolveErrorKind::Timeout => Self::Failed(ProbeFailure::Timeout),
            _ => Self::Failed(ProbeFailure::Unreachable),
        }
    }
}

/// Probe that resolves NS, A, AAAA and MX for the apex.
pub struct DnsProbe {
    resolver: TokioAsyncResolver,
}

impl DnsProbe {
    /// Use the system resolver configuration, or public defaults when it
    /// cannot be read. One attempt per query, bounded by `timeout`.
    pub fn from_system_conf(timeout: Duration) -> Self {
        let (config, mut opts) = hickory_resolver::system_conf::read_system_conf()
            .unwrap_or_else(|_| (ResolverConfig::default(), ResolverOpts::default()));
        opts.timeout = timeout;
        opts.attempts = 1;
        Self::with_config(config, opts)
    }

    pub fn with_config(config: ResolverConfig, opts: ResolverOpts) -> Self {
        Self {
            resolver: TokioAsyncResolver::tokio(config, opts),
        }
    }

    async fn lookup(&self, name: &str, record_type: RecordType) -> (RecordType, LookupOutcome) {
        let outcome = match self.resolver.lookup(name, record_type).await {
            Ok(lookup) if lookup.iter().next().is_some() => LookupOutcome::Records,
            Ok(_) => LookupOutcome::NoData,
            Err(err) => LookupOutcome::from(&err),
        };
        (record_type, outcome)
    }
}

#[async_trait]
impl DomainProbe for DnsProbe {
    fn source(&self) -> VerdictSource {
        VerdictSource::Dns
    }

    fn upstream(&self, _domain: &str) -> String {
        "dns".to_string()
    }

    async fn probe(&self, domain: &str) -> Result<ProbeFinding, ProbeFailure> {
        // Fully qualified, so search domains never apply
        let name = format!("{}.", domain.trim_end_matches('.'));
        let outcomes = futures::future::join_all(
            RECORD_TYPES
                .iter()
                .map(|record_type| self.lookup(&name, *record_type)),
        )
        .await;

        let labelled: Vec<(String, LookupOutcome)> = outcomes
            .into_iter()
            .map(|(record_type, outcome)| (record_type.to_string(), outcome))
            .collect();
        classify_lookups(&labelled)
    }
}

/// Combine per-type outcomes into one finding.
///
/// Any record means the name is in use. NXDOMAIN without records is a
/// provisional Available. NODATA means the name exists in the zone. Only
/// when every lookup failed does the probe fail, preferring Timeout.
pub fn classify_lookups(outcomes: &[(String, LookupOutcome)]) -> Result<ProbeFinding, ProbeFailure> {
    let found: Vec<&str> = outcomes
        .iter()
        .filter(|(_, outcome)| *outcome == LookupOutcome::Records)
        .map(|(label, _)| label.as_str())
        .collect();
    if !found.is_empty() {
        return Ok(ProbeFinding::taken(Some(format!(
            "resolves ({})",
            found.join(", ")
        ))));
    }

    let has = |wanted: LookupOutcome| outcomes.iter().any(|(_, outcome)| *outcome == wanted);

    if has(LookupOutcome::NxDomain) {
        return Ok(ProbeFinding::available(Some("NXDOMAIN".to_string())));
    }
    if has(LookupOutcome::NoData) {
        return Ok(ProbeFinding::taken(Some(
            "name exists without records".to_string(),
        )));
    }
    if has(LookupOutcome::Failed(ProbeFailure::Timeout)) {
        return Err(ProbeFailure::Timeout);
    }
    Err(ProbeFailure::Unreachable)
}
