//! HTTP transport for RDAP, profile pages and the domain corpus.
//!
//! Probes talk to an [`HttpFetcher`] rather than to `reqwest` directly so
//! tests can script responses without a network.

use crate::error::{NameVetError, ProbeFailure};
use crate::utils::truncate_chars;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE};
use std::time::Duration;

/// Accept header for profile pages.
pub const HTML_ACCEPT: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";

/// Accept header for RDAP queries.
pub const RDAP_ACCEPT: &str = "application/rdap+json, application/json;q=0.9";

/// Accept header for JSON APIs.
pub const JSON_ACCEPT: &str = "application/json";

/// Bodies larger than this are cut; nothing we classify needs more.
const MAX_BODY_CHARS: usize = 512 * 1024;

/// What a GET came back with, after redirects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    /// URL of the last hop, used to spot login redirects
    pub final_url: String,
    pub body: String,
}

impl HttpResponse {
    pub fn new<U: Into<String>, B: Into<String>>(status: u16, final_url: U, body: B) -> Self {
        Self {
            status,
            final_url: final_url.into(),
            body: body.into(),
        }
    }
}

/// Minimal GET interface used by every HTTP-based probe.
#[async_trait]
pub trait HttpFetcher: Send + Sync {
    /// GET `url`, following redirects.
    ///
    /// Any status code is a successful fetch; only transport problems fail.
    async fn get(&self, url: &str, accept: &str) -> Result<HttpResponse, ProbeFailure>;
}

/// [`HttpFetcher`] backed by a shared `reqwest::Client`.
#[derive(Clone)]
pub struct ReqwestFetcher {
    client: reqwest::Client,
}

impl ReqwestFetcher {
    /// Build a client that looks like a desktop browser.
    ///
    /// `timeout` is a transport-level backstop; the resolver applies the
    /// real per-probe deadline.
    pub fn new(user_agent: &str, timeout: Duration) -> Result<Self, NameVetError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.5"));

        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .default_headers(headers)
            .timeout(timeout + Duration::from_secs(1))
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .map_err(|e| {
                NameVetError::network_with_source("Failed to create HTTP client", e.to_string())
            })?;

        Ok(Self { client })
    }
}

#[async_trait]
impl HttpFetcher for ReqwestFetcher {
    async fn get(&self, url: &str, accept: &str) -> Result<HttpResponse, ProbeFailure> {
        let response = self.client.get(url).header(ACCEPT, accept).send().await?;

        let status = response.status().as_u16();
        let final_url = response.url().to_string();
        let body = response.text().await?;

        tracing::trace!(url, status, final_url = %final_url, bytes = body.len(), "http response");

        Ok(HttpResponse {
            status,
            final_url,
            body: truncate_chars(&body, MAX_BODY_CHARS).to_string(),
        })
    }
}
