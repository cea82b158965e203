//! Social handle prober.
//!
//! Each platform is one row in a data table: where its profile pages live,
//! how a missing profile shows up, and which redirects mean "log in first".
//! Platforms that cannot be checked reliably without an account are marked
//! for manual fallback and never called.

use crate::error::ProbeFailure;
use crate::health::HealthMonitor;
use crate::limiter::RateLimiter;
use crate::protocols::http::{HttpFetcher, HttpResponse, HTML_ACCEPT};
use crate::protocols::ProbeFinding;
use crate::resolver::guarded_call;
use crate::types::{CheckTarget, Verdict, VerdictSource};
use crate::utils::truncate_chars;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

/// Login-wall markers in the body are only looked for near the top.
const WALL_SCAN_CHARS: usize = 3000;

/// How a platform's profile page gives away a missing account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProbeStrategy {
    /// 404 means free, 200 means taken
    StatusCode,
    /// Like `StatusCode`, but a 200 page containing one of the markers
    /// (case-insensitive) is a "not found" page
    ContentAware { missing_markers: Vec<String> },
    /// Never probed; the verdict links to the profile for a manual check
    ManualFallback,
}

/// One supported platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlatformSpec {
    /// Canonical display name, e.g. `X`
    pub name: String,
    /// Other accepted spellings, lowercase
    pub aliases: Vec<String>,
    /// Profile URL with a `{handle}` placeholder
    pub url_template: String,
    pub strategy: ProbeStrategy,
    /// Final-URL fragments that mean we were bounced to a login page
    pub login_url_markers: Vec<String>,
    /// Body fragments that mean the page is a login wall
    pub login_body_markers: Vec<String>,
}

impl PlatformSpec {
    fn new(name: &str, url_template: &str, strategy: ProbeStrategy) -> Self {
        Self {
            name: name.to_string(),
            aliases: Vec::new(),
            url_template: url_template.to_string(),
            strategy,
            login_url_markers: Vec::new(),
            login_body_markers: Vec::new(),
        }
    }

    fn aliases(mut self, aliases: &[&str]) -> Self {
        self.aliases = aliases.iter().map(|a| a.to_lowercase()).collect();
        self
    }

    fn login_urls(mut self, markers: &[&str]) -> Self {
        self.login_url_markers = markers.iter().map(|m| m.to_string()).collect();
        self
    }

    fn login_bodies(mut self, markers: &[&str]) -> Self {
        self.login_body_markers = markers.iter().map(|m| m.to_lowercase()).collect();
        self
    }

    /// Whether `name` refers to this platform (case-insensitive).
    pub fn matches(&self, name: &str) -> bool {
        let name = name.trim().to_lowercase();
        self.name.to_lowercase() == name || self.aliases.iter().any(|a| *a == name)
    }

    pub fn profile_url(&self, handle: &str) -> String {
        self.url_template.replace("{handle}", handle)
    }

    pub fn is_manual(&self) -> bool {
        self.strategy == ProbeStrategy::ManualFallback
    }

    /// Host used as the rate limiter key.
    pub fn upstream(&self) -> String {
        reqwest::Url::parse(&self.profile_url("x"))
            .ok()
            .and_then(|url| url.host_str().map(str::to_string))
            .unwrap_or_else(|| self.name.to_lowercase())
    }

    /// Classify a profile page response.
    pub fn classify(&self, response: &HttpResponse) -> Result<ProbeFinding, ProbeFailure> {
        if response.status == 404 {
            return Ok(ProbeFinding::available(None));
        }
        if self.is_login_wall(response) {
            return Err(ProbeFailure::RateLimited);
        }

        match response.status {
            200 => match &self.strategy {
                ProbeStrategy::ContentAware { missing_markers } => {
                    let body = response.body.to_lowercase();
                    if missing_markers.iter().any(|m| body.contains(m.as_str())) {
                        Ok(ProbeFinding::available(None))
                    } else {
                        Ok(ProbeFinding::taken(None))
                    }
                }
                _ => Ok(ProbeFinding::taken(None)),
            },
            429 => Err(ProbeFailure::RateLimited),
            _ => Err(ProbeFailure::MalformedResponse),
        }
    }

    fn is_login_wall(&self, response: &HttpResponse) -> bool {
        if self
            .login_url_markers
            .iter()
            .any(|m| response.final_url.contains(m.as_str()))
        {
            return true;
        }
        if self.login_body_markers.is_empty() {
            return false;
        }
        let head = truncate_chars(&response.body, WALL_SCAN_CHARS).to_lowercase();
        self.login_body_markers.iter().any(|m| head.contains(m.as_str()))
    }
}

fn markers(list: &[&str]) -> ProbeStrategy {
    ProbeStrategy::ContentAware {
        missing_markers: list.iter().map(|m| m.to_lowercase()).collect(),
    }
}

/// Built-in platform table, in default check order.
pub fn default_platforms() -> Vec<PlatformSpec> {
    vec![
        PlatformSpec::new(
            "Instagram",
            "https://www.instagram.com/{handle}/",
            ProbeStrategy::StatusCode,
        )
        .aliases(&["ig", "insta"])
        .login_urls(&["/accounts/login"]),
        PlatformSpec::new(
            "TikTok",
            "https://www.tiktok.com/@{handle}",
            markers(&["couldn't find this account", "couldn&#39;t find this account"]),
        ),
        PlatformSpec::new(
            "YouTube",
            "https://www.youtube.com/@{handle}",
            markers(&["this page isn't available", "this page isn&#39;t available"]),
        )
        .aliases(&["yt"]),
        PlatformSpec::new(
            "X",
            "https://x.com/{handle}",
            markers(&["this account doesn't exist", "this account doesn\u{2019}t exist"]),
        )
        .aliases(&["twitter", "x (twitter)", "x.com"])
        .login_urls(&["/i/flow/login"]),
        PlatformSpec::new(
            "Facebook",
            "https://www.facebook.com/{handle}",
            markers(&["page not found", "this content isn't available", "this content isn&#39;t available"]),
        )
        .aliases(&["fb"])
        .login_urls(&["/login"]),
        PlatformSpec::new(
            "LinkedIn",
            "https://www.linkedin.com/company/{handle}",
            ProbeStrategy::StatusCode,
        )
        .login_urls(&["/authwall"])
        .login_bodies(&["authwall"]),
        // Threads answers 200 for missing profiles without a login
        PlatformSpec::new(
            "Threads",
            "https://www.threads.net/@{handle}",
            ProbeStrategy::ManualFallback,
        ),
    ]
}

/// Handles are checked as given; anything outside this set never exists.
fn is_valid_handle(handle: &str) -> bool {
    !handle.is_empty()
        && handle.len() <= 64
        && handle
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.' || c == '-')
}

/// Checks one handle on one platform per call.
pub struct SocialProber {
    platforms: Vec<PlatformSpec>,
    fetcher: Arc<dyn HttpFetcher>,
    limiter: Arc<RateLimiter>,
    health: Arc<HealthMonitor>,
    probe_timeout: Duration,
}

impl SocialProber {
    pub fn new(
        platforms: Vec<PlatformSpec>,
        fetcher: Arc<dyn HttpFetcher>,
        limiter: Arc<RateLimiter>,
        health: Arc<HealthMonitor>,
        probe_timeout: Duration,
    ) -> Self {
        Self {
            platforms,
            fetcher,
            limiter,
            health,
            probe_timeout,
        }
    }

    /// Force the named platforms to manual fallback.
    pub fn with_manual_platforms<S: AsRef<str>>(mut self, names: &[S]) -> Self {
        for spec in &mut self.platforms {
            if names.iter().any(|n| spec.matches(n.as_ref())) {
                spec.strategy = ProbeStrategy::ManualFallback;
            }
        }
        self
    }

    pub fn platforms(&self) -> &[PlatformSpec] {
        &self.platforms
    }

    /// Look up a platform by name or alias.
    pub fn find_platform(&self, name: &str) -> Option<&PlatformSpec> {
        self.platforms.iter().find(|p| p.matches(name))
    }

    /// The check target for a platform/handle pair, using the canonical
    /// platform name when the platform is known.
    pub fn target_for(&self, platform: &str, handle: &str) -> CheckTarget {
        let name = self
            .find_platform(platform)
            .map(|p| p.name.clone())
            .unwrap_or_else(|| platform.trim().to_string());
        CheckTarget::social(name, handle)
    }

    /// Check a handle on a platform. Never fails and never retries.
    pub async fn check(&self, platform: &str, handle: &str) -> Verdict {
        let target = self.target_for(platform, handle);
        let handle = handle.trim().to_lowercase();

        let Some(spec) = self.find_platform(platform) else {
            return Verdict::unknown(target, format!("unsupported platform '{}'", platform.trim()));
        };
        if !is_valid_handle(&handle) {
            return Verdict::unknown(target, format!("invalid handle '{}'", handle));
        }

        let url = spec.profile_url(&handle);
        if spec.is_manual() {
            return Verdict::manual_fallback(target, url);
        }

        let result = guarded_call(
            &self.limiter,
            &self.health,
            &spec.upstream(),
            self.probe_timeout,
            async {
                let response = self.fetcher.get(&url, HTML_ACCEPT).await?;
                spec.classify(&response)
            },
        )
        .await;

        match result {
            Ok(finding) => {
                tracing::debug!(platform = %spec.name, handle = %handle, outcome = %finding.status, "profile probe answered");
                let ProbeFinding { status, detail } = finding;
                ProbeFinding {
                    status,
                    detail: detail.or(Some(url)),
                }
                .into_verdict(target, VerdictSource::HttpProbe)
            }
            Err(failure) => {
                tracing::debug!(platform = %spec.name, handle = %handle, outcome = %failure, "profile probe failed");
                Verdict::unknown(target, format!("http: {}", failure))
            }
        }
    }
}
