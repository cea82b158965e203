//! # NameVetter Library
//!
//! Availability verification for candidate company names: domains through
//! an RDAP, WHOIS and DNS fallback chain, handles on social platforms, and
//! registered look-alike domains.
//!
//! Every check is bounded in time and never fails on its own; upstream
//! trouble turns into an `Unknown` verdict that says what went wrong.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use namevet_lib::{EngineConfig, VerificationEngine, VetConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let engine = VerificationEngine::new(EngineConfig::default())?;
//!
//!     let verdict = engine.resolve_domain("example.com").await;
//!     println!("{}: {} via {}", verdict.target, verdict.status, verdict.source);
//!
//!     let config = VetConfig::default().with_tlds(&["com", "io"]);
//!     let report = engine.vet("Acme Robotics", &config).await?;
//!     println!("complete: {}", report.completeness);
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - **RDAP Protocol**: Registry answers with registrar and dates
//! - **WHOIS Fallback**: Per-registry dialects, IANA referral discovery
//! - **DNS Last Resort**: Provisional answers from NS/A/AAAA/MX records
//! - **Social Handles**: Data-driven platform table with manual fallbacks
//! - **Shared Limits**: Per-upstream token buckets and a short verdict cache

// Re-export main public API types and functions
pub use cache::VerdictCache;
pub use config::{
    load_env_config, parse_duration_string, ConfigManager, DefaultsConfig, EngineSection,
    EnvConfig, FileConfig, RateLimitSection, SimilaritySection,
};
pub use engine::{EngineBuilder, VerificationEngine};
pub use error::{NameVetError, ProbeFailure};
pub use health::HealthMonitor;
pub use limiter::{RateLimiter, TokenBucket};
pub use protocols::{
    list_tld_profiles, tld_profile, DnsProbe, DomainProbe, HttpFetcher, HttpResponse,
    ProbeFinding, RdapProbe, RdapService, ReqwestFetcher, TcpWhoisTransport, TldProfile,
    WhoisDialect, WhoisProbe, WhoisTransport,
};
pub use resolver::DomainResolver;
pub use similarity::{levenshtein, rank_candidates, CorpusSearch, DomainsDbCorpus, SimilarityMatcher};
pub use social::{default_platforms, PlatformSpec, ProbeStrategy, SocialProber};
pub use types::{
    Availability, CheckTarget, Confidence, EngineConfig, HealthReport, HealthStatus, RateLimit,
    RateLimitConfig, SimilarMatch, SimilarityConfig, Verdict, VerdictSource, VetConfig,
    VettingReport, DEFAULT_PLATFORMS, DEFAULT_TLDS,
};
pub use utils::{normalize_handle, split_domain, validate_domain};

// Internal modules - reachable through the re-exports above
mod cache;
mod config;
mod engine;
mod error;
mod health;
mod limiter;
mod protocols;
mod resolver;
mod similarity;
mod social;
mod types;
mod utils;

// Type alias for convenience
pub type Result<T> = std::result::Result<T, NameVetError>;

// Library version and metadata
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const AUTHOR: &str = env!("CARGO_PKG_AUTHORS");

/// Get library information for debugging or display purposes.
pub fn info() -> LibraryInfo {
    LibraryInfo {
        version: VERSION,
        author: AUTHOR,
        features: get_enabled_features(),
    }
}

/// Information about the library build and features
#[derive(Debug, Clone)]
pub struct LibraryInfo {
    pub version: &'static str,
    pub author: &'static str,
    pub features: Vec<&'static str>,
}

/// Get list of enabled features at compile time
#[allow(clippy::vec_init_then_push)]
fn get_enabled_features() -> Vec<&'static str> {
    let mut features = Vec::new();

    #[cfg(feature = "rdap")]
    features.push("rdap");

    #[cfg(feature = "whois")]
    features.push("whois");

    #[cfg(feature = "dns")]
    features.push("dns");

    features
}
