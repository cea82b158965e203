// namevet-lib/tests/integration.rs

//! Integration tests for the verification engine with scripted upstreams.
//!
//! Nothing here touches the network: every transport is an in-memory fake
//! injected through `EngineBuilder`.

use async_trait::async_trait;
use namevet_lib::{
    Availability, Confidence, CorpusSearch, DomainProbe, EngineConfig, HealthStatus, HttpFetcher,
    HttpResponse, ProbeFailure, ProbeFinding, RdapProbe, VerdictSource, VerificationEngine,
    VetConfig, WhoisProbe, WhoisTransport,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Domain probe with a fixed answer per domain and an optional delay.
struct ScriptedProbe {
    source: VerdictSource,
    answers: HashMap<String, (Duration, Result<ProbeFinding, ProbeFailure>)>,
    fallback: Option<Result<ProbeFinding, ProbeFailure>>,
    calls: AtomicUsize,
}

impl ScriptedProbe {
    fn new(source: VerdictSource) -> Self {
        Self {
            source,
            answers: HashMap::new(),
            fallback: None,
            calls: AtomicUsize::new(0),
        }
    }

    fn answer(mut self, domain: &str, delay: Duration, answer: Result<ProbeFinding, ProbeFailure>) -> Self {
        self.answers.insert(domain.to_string(), (delay, answer));
        self
    }

    /// Answer for any domain not scripted; `None` hangs forever.
    fn otherwise(mut self, answer: Option<Result<ProbeFinding, ProbeFailure>>) -> Self {
        self.fallback = answer;
        self
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DomainProbe for ScriptedProbe {
    fn source(&self) -> VerdictSource {
        self.source
    }

    fn upstream(&self, _domain: &str) -> String {
        format!("scripted-{}", self.source).to_lowercase()
    }

    async fn probe(&self, domain: &str) -> Result<ProbeFinding, ProbeFailure> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some((delay, answer)) = self.answers.get(domain) {
            tokio::time::sleep(*delay).await;
            return answer.clone();
        }
        match &self.fallback {
            Some(answer) => answer.clone(),
            None => std::future::pending().await,
        }
    }
}

/// HTTP fetcher answering by URL prefix; unmatched URLs hang forever.
#[derive(Default)]
struct ScriptedFetcher {
    routes: Vec<(String, Result<HttpResponse, ProbeFailure>)>,
    hang_unmatched: bool,
    calls: AtomicUsize,
}

impl ScriptedFetcher {
    fn route(mut self, prefix: &str, response: Result<HttpResponse, ProbeFailure>) -> Self {
        self.routes.push((prefix.to_string(), response));
        self
    }

    fn hanging(mut self) -> Self {
        self.hang_unmatched = true;
        self
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HttpFetcher for ScriptedFetcher {
    async fn get(&self, url: &str, _accept: &str) -> Result<HttpResponse, ProbeFailure> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        for (prefix, response) in &self.routes {
            if url.starts_with(prefix.as_str()) {
                return response.clone();
            }
        }
        if self.hang_unmatched {
            std::future::pending().await
        } else {
            Err(ProbeFailure::Unreachable)
        }
    }
}

struct ScriptedCorpus(Option<Vec<String>>);

#[async_trait]
impl CorpusSearch for ScriptedCorpus {
    fn upstream(&self) -> String {
        "corpus".to_string()
    }

    async fn search(&self, _name: &str, _zone: &str, _limit: usize) -> Result<Vec<String>, ProbeFailure> {
        match &self.0 {
            Some(domains) => Ok(domains.clone()),
            None => std::future::pending().await,
        }
    }
}

struct ScriptedWhois {
    reply: String,
    queries: AtomicUsize,
}

#[async_trait]
impl WhoisTransport for ScriptedWhois {
    async fn query(&self, _server: &str, _query: &str) -> Result<String, ProbeFailure> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        Ok(self.reply.clone())
    }
}

fn corpus(domains: &[&str]) -> Arc<ScriptedCorpus> {
    Arc::new(ScriptedCorpus(Some(domains.iter().map(|d| d.to_string()).collect())))
}

fn domains_only(tlds: &[&str]) -> VetConfig {
    let none: &[&str] = &[];
    VetConfig::default().with_tlds(tlds).with_platforms(none)
}

#[tokio::test(start_paused = true)]
async fn test_vet_returns_within_budget_when_everything_hangs() {
    let engine = VerificationEngine::builder(EngineConfig::default())
        .with_domain_probes(vec![Arc::new(ScriptedProbe::new(VerdictSource::Rdap))])
        .with_fetcher(Arc::new(ScriptedFetcher::default().hanging()))
        .with_corpus(Arc::new(ScriptedCorpus(None)))
        .build()
        .unwrap();

    let budget = Duration::from_secs(2);
    let started = tokio::time::Instant::now();
    let report = engine
        .vet("Acme", &VetConfig::default().with_timeout_budget(budget))
        .await
        .unwrap();

    assert!(started.elapsed() <= budget + Duration::from_millis(50));
    assert_eq!(report.domains.len(), 6);
    assert_eq!(report.social.len(), 7);
    assert!(report.similar.is_empty());
    assert!(!report.completeness);

    for verdict in &report.domains {
        assert_eq!(verdict.status, Availability::Unknown);
        assert_eq!(verdict.detail.as_deref(), Some("verification budget exceeded"));
    }

    // Manual fallbacks need no network and still make it in
    let threads = report.social.last().unwrap();
    assert_eq!(threads.source, VerdictSource::ManualFallback);
    assert_eq!(threads.detail.as_deref(), Some("https://www.threads.net/@acme"));
}

#[tokio::test]
async fn test_rdap_answer_skips_whois_and_dns() {
    let fetcher = ScriptedFetcher::default().route(
        "https://rdap.verisign.com/com/v1/domain/acme.com",
        Ok(HttpResponse::new(404, "", "")),
    );
    let whois = Arc::new(ScriptedProbe::new(VerdictSource::Whois).otherwise(Some(Ok(ProbeFinding::taken(None)))));
    let dns = Arc::new(ScriptedProbe::new(VerdictSource::Dns).otherwise(Some(Ok(ProbeFinding::taken(None)))));

    let fetcher: Arc<dyn HttpFetcher> = Arc::new(fetcher);
    let engine = VerificationEngine::builder(EngineConfig::default())
        .with_domain_probes(vec![
            Arc::new(RdapProbe::new(fetcher.clone())),
            whois.clone(),
            dns.clone(),
        ])
        .with_fetcher(fetcher)
        .build()
        .unwrap();

    let verdict = engine.resolve_domain("acme.com").await;
    assert_eq!(verdict.status, Availability::Available);
    assert_eq!(verdict.source, VerdictSource::Rdap);
    assert_eq!(verdict.confidence, Confidence::Authoritative);
    assert_eq!(whois.calls(), 0);
    assert_eq!(dns.calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_rdap_timeout_falls_back_to_whois() {
    let fetcher: Arc<dyn HttpFetcher> = Arc::new(ScriptedFetcher::default().hanging());
    let transport = Arc::new(ScriptedWhois {
        reply: "No match for \"ACME.COM\".\r\n>>> Last update of whois database: 2024-05-01T00:00:00Z <<<\r\n"
            .to_string(),
        queries: AtomicUsize::new(0),
    });
    let dns = Arc::new(ScriptedProbe::new(VerdictSource::Dns));

    let engine = VerificationEngine::builder(
        EngineConfig::default().with_probe_timeout(Duration::from_secs(1)),
    )
    .with_domain_probes(vec![
        Arc::new(RdapProbe::new(fetcher.clone())),
        Arc::new(WhoisProbe::new(transport.clone())),
        dns.clone(),
    ])
    .with_fetcher(fetcher)
    .build()
    .unwrap();

    let verdict = engine.resolve_domain("acme.com").await;
    assert_eq!(verdict.status, Availability::Available);
    assert_eq!(verdict.source, VerdictSource::Whois);
    assert_eq!(transport.queries.load(Ordering::SeqCst), 1);
    assert_eq!(dns.calls(), 0);
}

#[tokio::test]
async fn test_all_probes_failing_is_unknown_with_reasons() {
    let engine = VerificationEngine::builder(EngineConfig::default())
        .with_domain_probes(vec![
            Arc::new(ScriptedProbe::new(VerdictSource::Rdap).otherwise(Some(Err(ProbeFailure::MalformedResponse)))),
            Arc::new(ScriptedProbe::new(VerdictSource::Whois).otherwise(Some(Err(ProbeFailure::Unreachable)))),
            Arc::new(ScriptedProbe::new(VerdictSource::Dns).otherwise(Some(Err(ProbeFailure::Unreachable)))),
        ])
        .with_fetcher(Arc::new(ScriptedFetcher::default()))
        .with_corpus(corpus(&[]))
        .build()
        .unwrap();

    let report = engine.vet("acme", &domains_only(&["io"])).await.unwrap();
    let verdict = &report.domains[0];
    assert_eq!(verdict.status, Availability::Unknown);
    assert_eq!(verdict.source, VerdictSource::None);
    assert_eq!(verdict.confidence, Confidence::None);
    assert_eq!(
        verdict.detail.as_deref(),
        Some("rdap: malformed response; whois: unreachable; dns: unreachable")
    );
    assert!(!report.completeness);
}

#[tokio::test]
async fn test_dns_answer_is_provisional() {
    let engine = VerificationEngine::builder(EngineConfig::default())
        .with_domain_probes(vec![
            Arc::new(ScriptedProbe::new(VerdictSource::Rdap).otherwise(Some(Err(ProbeFailure::Timeout)))),
            Arc::new(ScriptedProbe::new(VerdictSource::Dns).otherwise(Some(Ok(ProbeFinding::available(None))))),
        ])
        .with_fetcher(Arc::new(ScriptedFetcher::default()))
        .build()
        .unwrap();

    let verdict = engine.resolve_domain("acme.dev").await;
    assert_eq!(verdict.status, Availability::Available);
    assert_eq!(verdict.source, VerdictSource::Dns);
    assert_eq!(verdict.confidence, Confidence::Provisional);
}

#[tokio::test]
async fn test_threads_is_manual_fallback_without_network() {
    let fetcher = Arc::new(ScriptedFetcher::default());
    let engine = VerificationEngine::builder(EngineConfig::default())
        .with_domain_probes(Vec::new())
        .with_fetcher(fetcher.clone())
        .build()
        .unwrap();

    let verdict = engine.check_social("threads", "Acme").await;
    assert_eq!(verdict.status, Availability::Unknown);
    assert_eq!(verdict.source, VerdictSource::ManualFallback);
    assert_eq!(verdict.detail.as_deref(), Some("https://www.threads.net/@acme"));
    assert_eq!(fetcher.calls(), 0);
}

#[tokio::test]
async fn test_manual_fallback_keeps_report_complete() {
    let rdap = Arc::new(
        ScriptedProbe::new(VerdictSource::Rdap)
            .answer("acme.com", Duration::ZERO, Ok(ProbeFinding::taken(None))),
    );
    let fetcher = ScriptedFetcher::default().route(
        "https://www.instagram.com/acme/",
        Ok(HttpResponse::new(404, "https://www.instagram.com/acme/", "")),
    );
    let engine = VerificationEngine::builder(EngineConfig::default())
        .with_domain_probes(vec![rdap])
        .with_fetcher(Arc::new(fetcher))
        .with_corpus(corpus(&[]))
        .build()
        .unwrap();

    let config = VetConfig::default()
        .with_tlds(&["com"])
        .with_platforms(&["Threads", "Instagram"]);
    let report = engine.vet("Acme", &config).await.unwrap();

    assert_eq!(report.domains[0].status, Availability::Taken);
    assert_eq!(report.social[0].source, VerdictSource::ManualFallback);
    assert_eq!(report.social[0].status, Availability::Unknown);
    assert_eq!(report.social[1].status, Availability::Available);
    assert!(report.completeness);

    // An upstream failure on the same run shape does flip it
    let offline = VerificationEngine::builder(EngineConfig::default())
        .with_domain_probes(vec![Arc::new(
            ScriptedProbe::new(VerdictSource::Rdap).otherwise(Some(Ok(ProbeFinding::taken(None)))),
        )])
        .with_fetcher(Arc::new(ScriptedFetcher::default()))
        .with_corpus(corpus(&[]))
        .build()
        .unwrap();
    let report = offline.vet("Acme", &config).await.unwrap();
    assert_eq!(report.social[0].source, VerdictSource::ManualFallback);
    assert!(report.social[1].is_infrastructure_failure());
    assert!(!report.completeness);
}

#[tokio::test]
async fn test_social_profile_probes() {
    let fetcher = ScriptedFetcher::default()
        .route("https://www.instagram.com/acme/", Ok(HttpResponse::new(404, "https://www.instagram.com/acme/", "")))
        .route(
            "https://x.com/acme",
            Ok(HttpResponse::new(200, "https://x.com/i/flow/login?redirect=acme", "<html>")),
        )
        .route(
            "https://www.tiktok.com/@acme",
            Ok(HttpResponse::new(200, "https://www.tiktok.com/@acme", "<h1>Acme Official</h1>")),
        );
    let engine = VerificationEngine::builder(EngineConfig::default())
        .with_domain_probes(Vec::new())
        .with_fetcher(Arc::new(fetcher))
        .build()
        .unwrap();

    let instagram = engine.check_social("Instagram", "acme").await;
    assert_eq!(instagram.status, Availability::Available);
    assert_eq!(instagram.source, VerdictSource::HttpProbe);
    assert_eq!(instagram.confidence, Confidence::Provisional);

    // Bounced to a login page: no evidence either way
    let x = engine.check_social("twitter", "acme").await;
    assert_eq!(x.status, Availability::Unknown);
    assert_eq!(x.target.to_string(), "X:@acme");

    let tiktok = engine.check_social("TikTok", "acme").await;
    assert_eq!(tiktok.status, Availability::Taken);

    let unknown = engine.check_social("Myspace", "acme").await;
    assert_eq!(unknown.status, Availability::Unknown);
    assert_eq!(unknown.source, VerdictSource::None);
}

#[tokio::test]
async fn test_second_vet_is_served_from_cache() {
    let rdap = Arc::new(
        ScriptedProbe::new(VerdictSource::Rdap)
            .answer("acme.com", Duration::ZERO, Ok(ProbeFinding::taken(Some("registrar: Example Registrar".to_string()))))
            .answer("acme.io", Duration::ZERO, Ok(ProbeFinding::available(None))),
    );
    let engine = VerificationEngine::builder(EngineConfig::default())
        .with_domain_probes(vec![rdap.clone()])
        .with_fetcher(Arc::new(ScriptedFetcher::default()))
        .with_corpus(corpus(&[]))
        .build()
        .unwrap();

    let config = domains_only(&["com", "io"]);
    let first = engine.vet("Acme", &config).await.unwrap();
    let second = engine.vet("acme!", &config).await.unwrap();

    assert_eq!(rdap.calls(), 2);
    assert!(first.completeness && second.completeness);
    for (a, b) in first.domains.iter().zip(&second.domains) {
        assert_eq!(a.target, b.target);
        assert_eq!(a.status, b.status);
        assert_eq!(a.source, b.source);
        assert_eq!(a.detail, b.detail);
    }
}

#[tokio::test(start_paused = true)]
async fn test_report_keeps_request_order() {
    let ok = || Ok(ProbeFinding::taken(None));
    let rdap = Arc::new(
        ScriptedProbe::new(VerdictSource::Rdap)
            .answer("acme.com", Duration::from_millis(900), ok())
            .answer("acme.io", Duration::from_millis(500), ok())
            .answer("acme.net", Duration::from_millis(100), ok()),
    );
    let engine = VerificationEngine::builder(EngineConfig::default())
        .with_domain_probes(vec![rdap])
        .with_fetcher(Arc::new(ScriptedFetcher::default()))
        .with_corpus(corpus(&[]))
        .build()
        .unwrap();

    let report = engine
        .vet("acme", &domains_only(&["com", "io", "net"]))
        .await
        .unwrap();

    let order: Vec<String> = report.domains.iter().map(|v| v.target.to_string()).collect();
    assert_eq!(order, vec!["acme.com", "acme.io", "acme.net"]);
    assert!(report.domains.iter().all(|v| v.status == Availability::Taken));
}

#[tokio::test]
async fn test_similar_names_closest_first() {
    let engine = VerificationEngine::builder(EngineConfig::default())
        .with_domain_probes(Vec::new())
        .with_fetcher(Arc::new(ScriptedFetcher::default()))
        .with_corpus(corpus(&["mycoo.com", "myco.com", "completely-different.com"]))
        .build()
        .unwrap();

    let report = engine.vet("MyCo", &domains_only(&["com"])).await.unwrap();
    let similar: Vec<(&str, usize)> = report
        .similar
        .iter()
        .map(|m| (m.domain.as_str(), m.distance))
        .collect();
    assert_eq!(similar, vec![("myco.com", 0), ("mycoo.com", 1)]);
}

#[tokio::test]
async fn test_invalid_name_is_rejected() {
    let engine = VerificationEngine::builder(EngineConfig::default())
        .with_domain_probes(Vec::new())
        .with_fetcher(Arc::new(ScriptedFetcher::default()))
        .build()
        .unwrap();

    for name in ["", "   ", "!!!", "ü"] {
        let err = engine.vet(name, &VetConfig::default()).await.unwrap_err();
        assert!(err.is_input_error(), "{}", name);
    }

    // Bad domains are answered, not raised
    let verdict = engine.resolve_domain("not a domain").await;
    assert_eq!(verdict.status, Availability::Unknown);
}

#[tokio::test]
async fn test_health_ok_with_working_outbound() {
    let fetcher = ScriptedFetcher::default().route("https://rdap.org/", Ok(HttpResponse::new(200, "", "")));
    let engine = VerificationEngine::builder(EngineConfig::default())
        .with_domain_probes(Vec::new())
        .with_fetcher(Arc::new(fetcher))
        .build()
        .unwrap();

    let report = engine.health().await;
    assert_eq!(report.status, HealthStatus::Ok);
    assert!(report.outbound);
    assert!(report.rate_limiter);
    assert!(report.throttled_upstreams.is_empty());
    assert_eq!(report.version, namevet_lib::VERSION);
}
