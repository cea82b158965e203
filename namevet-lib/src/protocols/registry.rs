//! Per-TLD registry profiles.
//!
//! Every registry differs in where its RDAP service lives (or whether it has
//! one), which WHOIS server answers for it, and how that server words a
//! "not registered" reply. Those differences live in this table instead of
//! in branches inside the probes.

use serde::Serialize;

/// RDAP redirector used for TLDs missing from the table.
pub const RDAP_FALLBACK_ENDPOINT: &str = "https://rdap.org/domain/";

/// Server asked for WHOIS referrals when a TLD has no known server.
pub const IANA_WHOIS_SERVER: &str = "whois.iana.org";

/// Where a TLD's RDAP service lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RdapService {
    /// Base URL; the domain is appended
    Endpoint(&'static str),
    /// The registry has no working RDAP service; probes fail fast
    Unsupported,
}

/// How a WHOIS server phrases its answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WhoisDialect {
    /// Verisign thin registry: `No match for "ACME.COM".`
    Verisign,
    /// Identity Digital / PIR style: `Domain not found.` or `NOT FOUND`
    IdentityDigital,
    /// DENIC: `Status: free`
    Denic,
    /// Nominet: `No match for "acme.uk".` with indented blocks
    Nominet,
    /// AFNIC and EURid: `%% NOT FOUND` / `Status: AVAILABLE`
    Afnic,
    /// JPRS: `No match!!`
    Jprs,
    /// Anything else; only the generic pattern list applies
    Generic,
}

/// Everything the probes need to know about one TLD.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TldProfile {
    pub tld: &'static str,
    pub rdap: RdapService,
    pub whois_server: Option<&'static str>,
    pub dialect: WhoisDialect,
}

const fn profile(
    tld: &'static str,
    rdap: RdapService,
    whois_server: Option<&'static str>,
    dialect: WhoisDialect,
) -> TldProfile {
    TldProfile {
        tld,
        rdap,
        whois_server,
        dialect,
    }
}

use RdapService::{Endpoint, Unsupported};
use WhoisDialect::*;

const IDENTITY_DIGITAL_RDAP: &str = "https://rdap.identitydigital.services/rdap/domain/";
const GOOGLE_RDAP: &str = "https://pubapi.registry.google/rdap/domain/";

/// Built-in profiles, alphabetical by TLD.
static TLD_PROFILES: &[TldProfile] = &[
    profile("ai", Endpoint(IDENTITY_DIGITAL_RDAP), Some("whois.nic.ai"), IdentityDigital),
    profile("app", Endpoint(GOOGLE_RDAP), Some("whois.nic.google"), Generic),
    profile("au", Endpoint("https://rdap.cctld.au/rdap/domain/"), Some("whois.auda.org.au"), Generic),
    profile("biz", Endpoint("https://rdap.nic.biz/domain/"), Some("whois.nic.biz"), Generic),
    profile("blog", Endpoint("https://rdap.blog.fury.ca/rdap/domain/"), Some("whois.nic.blog"), Generic),
    profile("br", Endpoint("https://rdap.registro.br/domain/"), Some("whois.registro.br"), Generic),
    profile("ca", Endpoint("https://rdap.ca.fury.ca/rdap/domain/"), Some("whois.cira.ca"), Generic),
    profile("cc", Endpoint("https://tld-rdap.verisign.com/cc/v1/domain/"), Some("ccwhois.verisign-grs.com"), Verisign),
    profile("cloud", Endpoint("https://rdap.registry.cloud/rdap/domain/"), Some("whois.nic.cloud"), Generic),
    // .co has no working RDAP service; WHOIS answers
    profile("co", Unsupported, Some("whois.registry.co"), Generic),
    profile("com", Endpoint("https://rdap.verisign.com/com/v1/domain/"), Some("whois.verisign-grs.com"), Verisign),
    profile("de", Endpoint("https://rdap.denic.de/domain/"), Some("whois.denic.de"), Denic),
    profile("dev", Endpoint(GOOGLE_RDAP), Some("whois.nic.google"), Generic),
    profile("digital", Endpoint(IDENTITY_DIGITAL_RDAP), Some("whois.nic.digital"), IdentityDigital),
    profile("es", Unsupported, None, Generic),
    profile("eu", Unsupported, Some("whois.eu"), Afnic),
    profile("fr", Endpoint("https://rdap.nic.fr/domain/"), Some("whois.nic.fr"), Afnic),
    profile("in", Endpoint("https://rdap.nixiregistry.in/rdap/domain/"), Some("whois.nixiregistry.in"), Generic),
    profile("info", Endpoint(IDENTITY_DIGITAL_RDAP), Some("whois.nic.info"), IdentityDigital),
    profile("io", Endpoint(IDENTITY_DIGITAL_RDAP), Some("whois.nic.io"), IdentityDigital),
    profile("it", Unsupported, Some("whois.nic.it"), Generic),
    profile("jp", Unsupported, Some("whois.jprs.jp"), Jprs),
    profile("me", Endpoint(IDENTITY_DIGITAL_RDAP), Some("whois.nic.me"), IdentityDigital),
    profile("net", Endpoint("https://rdap.verisign.com/net/v1/domain/"), Some("whois.verisign-grs.com"), Verisign),
    profile("nl", Endpoint("https://rdap.sidn.nl/domain/"), Some("whois.domain-registry.nl"), Generic),
    profile("online", Endpoint("https://rdap.centralnic.com/online/domain/"), Some("whois.nic.online"), Generic),
    profile("org", Endpoint("https://rdap.publicinterestregistry.org/rdap/domain/"), Some("whois.publicinterestregistry.org"), IdentityDigital),
    profile("page", Endpoint(GOOGLE_RDAP), Some("whois.nic.google"), Generic),
    profile("shop", Endpoint("https://rdap.gmoregistry.net/rdap/domain/"), Some("whois.nic.shop"), Generic),
    profile("site", Endpoint("https://rdap.centralnic.com/site/domain/"), Some("whois.nic.site"), Generic),
    profile("tech", Endpoint("https://rdap.centralnic.com/tech/domain/"), Some("whois.nic.tech"), Generic),
    profile("tv", Endpoint("https://rdap.nic.tv/domain/"), Some("whois.nic.tv"), Verisign),
    profile("uk", Endpoint("https://rdap.nominet.uk/domain/"), Some("whois.nic.uk"), Nominet),
    profile("us", Endpoint("https://rdap.nic.us/domain/"), Some("whois.nic.us"), Generic),
    profile("website", Endpoint("https://rdap.centralnic.com/website/domain/"), Some("whois.nic.website"), Generic),
    profile("xyz", Endpoint("https://rdap.centralnic.com/xyz/domain/"), Some("whois.nic.xyz"), Generic),
    profile("zone", Endpoint(IDENTITY_DIGITAL_RDAP), Some("whois.nic.zone"), IdentityDigital),
];

/// Look up the built-in profile for a TLD (case-insensitive, leading dot ok).
pub fn tld_profile(tld: &str) -> Option<&'static TldProfile> {
    let tld = tld.trim().trim_start_matches('.').to_lowercase();
    TLD_PROFILES.iter().find(|p| p.tld == tld)
}

/// All built-in profiles, sorted by TLD.
pub fn list_tld_profiles() -> &'static [TldProfile] {
    TLD_PROFILES
}

/// RDAP base URL for a TLD.
///
/// `None` means the registry is known to have no working RDAP service.
/// TLDs missing from the table go through the rdap.org redirector.
pub fn rdap_endpoint(tld: &str) -> Option<&'static str> {
    match tld_profile(tld).map(|p| p.rdap) {
        Some(Endpoint(url)) => Some(url),
        Some(Unsupported) => None,
        None => Some(RDAP_FALLBACK_ENDPOINT),
    }
}

/// WHOIS dialect for a TLD, `Generic` when unknown.
pub fn whois_dialect(tld: &str) -> WhoisDialect {
    tld_profile(tld).map_or(WhoisDialect::Generic, |p| p.dialect)
}
