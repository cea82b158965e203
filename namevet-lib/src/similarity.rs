//! Similar-name detection against a corpus of registered domains.
//!
//! Similarity is advisory: any upstream trouble yields an empty list rather
//! than an error, and it never holds up the rest of a vetting run.

use crate::error::ProbeFailure;
use crate::health::HealthMonitor;
use crate::limiter::RateLimiter;
use crate::protocols::http::{HttpFetcher, JSON_ACCEPT};
use crate::resolver::guarded_call;
use crate::types::{SimilarMatch, SimilarityConfig};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

/// Search over registered domain names.
#[async_trait]
pub trait CorpusSearch: Send + Sync {
    /// Rate limiter key for the corpus service.
    fn upstream(&self) -> String;

    /// Registered domains related to `name` in `zone`, at most `limit`.
    async fn search(&self, name: &str, zone: &str, limit: usize)
        -> Result<Vec<String>, ProbeFailure>;
}

/// Public domainsdb.info search API.
pub struct DomainsDbCorpus {
    fetcher: Arc<dyn HttpFetcher>,
    base_url: String,
}

pub const DOMAINSDB_URL: &str = "https://api.domainsdb.info";

#[derive(Debug, Deserialize)]
struct DomainsDbResponse {
    #[serde(default)]
    domains: Vec<DomainsDbEntry>,
}

#[derive(Debug, Deserialize)]
struct DomainsDbEntry {
    domain: String,
}

impl DomainsDbCorpus {
    pub fn new(fetcher: Arc<dyn HttpFetcher>) -> Self {
        Self::with_base_url(fetcher, DOMAINSDB_URL)
    }

    pub fn with_base_url<U: Into<String>>(fetcher: Arc<dyn HttpFetcher>, base_url: U) -> Self {
        Self {
            fetcher,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl CorpusSearch for DomainsDbCorpus {
    fn upstream(&self) -> String {
        reqwest::Url::parse(&self.base_url)
            .ok()
            .and_then(|url| url.host_str().map(str::to_string))
            .unwrap_or_else(|| "domainsdb".to_string())
    }

    async fn search(
        &self,
        name: &str,
        zone: &str,
        limit: usize,
    ) -> Result<Vec<String>, ProbeFailure> {
        let url = format!(
            "{}/v1/domains/search?domain={}&zone={}&limit={}",
            self.base_url, name, zone, limit
        );
        let response = self.fetcher.get(&url, JSON_ACCEPT).await?;

        match response.status {
            200 => {
                let parsed: DomainsDbResponse = serde_json::from_str(&response.body)
                    .map_err(|_| ProbeFailure::MalformedResponse)?;
                Ok(parsed.domains.into_iter().map(|d| d.domain).collect())
            }
            // domainsdb answers 404 when nothing matched
            404 => Ok(Vec::new()),
            429 => Err(ProbeFailure::RateLimited),
            _ => Err(ProbeFailure::MalformedResponse),
        }
    }
}

/// Levenshtein edit distance over chars.
pub fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];
    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let substitution = prev[j] + usize::from(ca != cb);
            curr[j + 1] = substitution.min(prev[j + 1] + 1).min(curr[j] + 1);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

/// Everything left of the final label: `shop.myco.com` -> `shop.myco`.
fn strip_tld(domain: &str) -> &str {
    domain
        .trim_end_matches('.')
        .rsplit_once('.')
        .map_or(domain, |(base, _)| base)
}

/// Score and filter raw corpus candidates against `name`.
///
/// Case-insensitive, TLD ignored on both sides. Candidates further than
/// `threshold` are dropped, duplicates collapse, closest first with a
/// lexical tie-break, at most `top_k` kept.
///
/// Distance 0 is kept: the same name registered under another TLD
/// (`myco.com` when vetting `myco.io`, or `myco.com` itself) is the closest
/// look-alike there is, so it leads the list.
pub fn rank_candidates(name: &str, candidates: &[String], config: &SimilarityConfig) -> Vec<SimilarMatch> {
    let name = name.trim().to_lowercase();
    let base_name = if name.contains('.') {
        strip_tld(&name).to_string()
    } else {
        name
    };

    let mut seen = HashSet::new();
    let mut matches: Vec<SimilarMatch> = candidates
        .iter()
        .map(|c| c.trim().trim_end_matches('.').to_lowercase())
        .filter(|c| !c.is_empty() && seen.insert(c.clone()))
        .filter_map(|domain| {
            let distance = levenshtein(&base_name, strip_tld(&domain));
            (distance <= config.threshold).then_some(SimilarMatch { domain, distance })
        })
        .collect();

    matches.sort();
    matches.truncate(config.top_k);
    matches
}

/// Finds registered look-alikes of a name.
pub struct SimilarityMatcher {
    corpus: Arc<dyn CorpusSearch>,
    config: SimilarityConfig,
    limiter: Arc<RateLimiter>,
    health: Arc<HealthMonitor>,
    probe_timeout: Duration,
}

impl SimilarityMatcher {
    pub fn new(
        corpus: Arc<dyn CorpusSearch>,
        config: SimilarityConfig,
        limiter: Arc<RateLimiter>,
        health: Arc<HealthMonitor>,
        probe_timeout: Duration,
    ) -> Self {
        Self {
            corpus,
            config,
            limiter,
            health,
            probe_timeout,
        }
    }

    /// Closest registered domains first. Empty on any upstream failure.
    pub async fn find_similar(&self, name: &str) -> Vec<SimilarMatch> {
        let query = name.trim().to_lowercase();
        if query.is_empty() {
            return Vec::new();
        }

        let result = guarded_call(
            &self.limiter,
            &self.health,
            &self.corpus.upstream(),
            self.probe_timeout,
            self.corpus
                .search(&query, &self.config.zone, self.config.corpus_limit),
        )
        .await;

        match result {
            Ok(candidates) => rank_candidates(&query, &candidates, &self.config),
            Err(failure) => {
                tracing::debug!(name = %query, outcome = %failure, "similarity search failed");
                Vec::new()
            }
        }
    }
}
