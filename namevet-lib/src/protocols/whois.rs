//! WHOIS probe over TCP port 43.
//!
//! WHOIS is the fallback when RDAP is missing or failing. Replies are free
//! text whose wording varies by registry, so classification is driven by the
//! dialect recorded in the TLD profile, backed by a generic pattern list.

use super::registry::{tld_profile, whois_dialect, WhoisDialect, IANA_WHOIS_SERVER};
use super::{tld_of, DomainProbe, ProbeFinding};
use crate::error::ProbeFailure;
use crate::types::VerdictSource;
use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

/// Standard WHOIS port.
pub const WHOIS_PORT: u16 = 43;

/// Replies longer than this are cut; registration markers come early.
const MAX_RESPONSE_BYTES: u64 = 64 * 1024;

/// Raw WHOIS exchange: send a query line, read until the server closes.
#[async_trait]
pub trait WhoisTransport: Send + Sync {
    async fn query(&self, server: &str, query: &str) -> Result<String, ProbeFailure>;
}

/// [`WhoisTransport`] speaking plain TCP.
#[derive(Debug, Clone)]
pub struct TcpWhoisTransport {
    port: u16,
}

impl TcpWhoisTransport {
    pub fn new() -> Self {
        Self { port: WHOIS_PORT }
    }

    pub fn with_port(port: u16) -> Self {
        Self { port }
    }
}

impl Default for TcpWhoisTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl WhoisTransport for TcpWhoisTransport {
    async fn query(&self, server: &str, query: &str) -> Result<String, ProbeFailure> {
        let mut stream = TcpStream::connect((server, self.port)).await?;
        stream.write_all(format!("{}\r\n", query).as_bytes()).await?;

        let mut buf = Vec::new();
        stream
            .take(MAX_RESPONSE_BYTES)
            .read_to_end(&mut buf)
            .await?;

        Ok(String::from_utf8_lossy(&buf).into_owned())
    }
}

/// Probe that asks the registry's WHOIS server.
///
/// Servers discovered through IANA referral are remembered for the lifetime
/// of the probe, so each TLD costs at most one referral query.
pub struct WhoisProbe {
    transport: Arc<dyn WhoisTransport>,
    discovered: Mutex<HashMap<String, String>>,
}

impl WhoisProbe {
    pub fn new(transport: Arc<dyn WhoisTransport>) -> Self {
        Self {
            transport,
            discovered: Mutex::new(HashMap::new()),
        }
    }

    /// WHOIS server for a TLD: table first, then memo, then IANA referral.
    async fn server_for(&self, tld: &str) -> Result<String, ProbeFailure> {
        if let Some(server) = tld_profile(tld).and_then(|p| p.whois_server) {
            return Ok(server.to_string());
        }

        if let Some(server) = self
            .discovered
            .lock()
            .ok()
            .and_then(|memo| memo.get(tld).cloned())
        {
            return Ok(server);
        }

        let referral = self.transport.query(IANA_WHOIS_SERVER, tld).await?;
        let server = parse_iana_refer_response(&referral).ok_or(ProbeFailure::Unreachable)?;
        tracing::debug!(tld, server = %server, "discovered WHOIS server via IANA referral");

        if let Ok(mut memo) = self.discovered.lock() {
            memo.insert(tld.to_string(), server.clone());
        }
        Ok(server)
    }
}

#[async_trait]
impl DomainProbe for WhoisProbe {
    fn source(&self) -> VerdictSource {
        VerdictSource::Whois
    }

    fn upstream(&self, domain: &str) -> String {
        let tld = tld_of(domain).unwrap_or_default();
        let known = tld_profile(&tld).and_then(|p| p.whois_server).map(String::from);
        let discovered = || {
            self.discovered
                .lock()
                .ok()
                .and_then(|memo| memo.get(&tld).cloned())
        };
        known
            .or_else(discovered)
            .unwrap_or_else(|| IANA_WHOIS_SERVER.to_string())
    }

    async fn probe(&self, domain: &str) -> Result<ProbeFinding, ProbeFailure> {
        let tld = tld_of(domain)?;
        let server = self.server_for(&tld).await?;
        let response = self.transport.query(&server, domain).await?;
        classify_response(&response, whois_dialect(&tld))
    }
}

lazy_static! {
    static ref RATE_LIMITED: Regex = Regex::new(
        r"(?i)(rate limit|too many (requests|queries)|try again later|quota exceeded|limit exceeded|query limit|throttled)"
    )
    .expect("valid regex");

    static ref NO_SERVER: Regex = Regex::new(
        r"(?i)(no whois server is known|invalid tld|unknown tld|tld not found|no such tld|invalid domain extension)"
    )
    .expect("valid regex");

    static ref GENERIC_AVAILABLE: Regex = Regex::new(
        r"(?i)(no match|not found|no data found|no entries found|status:\s*(available|free)|not registered|no matching (record|entry)|no object found|object does not exist|has not been registered)"
    )
    .expect("valid regex");

    static ref DIALECT_AVAILABLE: HashMap<WhoisDialect, Regex> = {
        let mut patterns: HashMap<WhoisDialect, Regex> = HashMap::new();
        let mut add = |dialect: WhoisDialect, pattern: &str| {
            patterns.insert(dialect, Regex::new(pattern).expect("valid regex"));
        };
        add(WhoisDialect::Verisign, r#"(?mi)^\s*no match for ""#);
        add(WhoisDialect::IdentityDigital, r"(?mi)^\s*(domain not found|not found)\.?\s*$");
        add(WhoisDialect::Denic, r"(?mi)^status:\s*free\s*$");
        add(WhoisDialect::Nominet, r"(?mi)^\s*no match for ");
        add(WhoisDialect::Afnic, r"(?mi)(^%+\s*not found|^status:\s*available)");
        add(WhoisDialect::Jprs, r"(?mi)^\s*no match!!");
        patterns
    };

    static ref TAKEN_MARKERS: Vec<Regex> = [
        r"(?mi)^\s*domain status:",
        r"(?mi)^\s*registrar:",
        r"(?mi)^\s*(creation date|created|registered on|registered):",
        r"(?mi)^\s*registry domain id:",
        r"(?mi)^\s*registrant",
        r"(?mi)^\s*(name server|nameservers|nserver):",
        r"(?mi)^\s*(registry expiry date|expiry date|expires|expiration date):",
        r"(?mi)^\s*status:\s*connect",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("valid regex"))
    .collect();

    static ref REGISTRAR: Regex =
        Regex::new(r"(?mi)^\s*registrar:[ \t]*(\S[^\r\n]*)").expect("valid regex");

    static ref CREATED: Regex = Regex::new(
        r"(?mi)^\s*(?:creation date|created|registered on):[ \t]*(\S[^\r\n]*)"
    )
    .expect("valid regex");
}

/// Classify a WHOIS reply for a TLD with the given dialect.
///
/// Order matters: throttling text wins over everything, then the dialect's
/// own "not found" wording, then generic wording, then registration markers.
/// A reply matching none of them is malformed rather than guessed.
pub fn classify_response(response: &str, dialect: WhoisDialect) -> Result<ProbeFinding, ProbeFailure> {
    if response.trim().is_empty() {
        return Err(ProbeFailure::MalformedResponse);
    }
    if RATE_LIMITED.is_match(response) {
        return Err(ProbeFailure::RateLimited);
    }
    if NO_SERVER.is_match(response) {
        return Err(ProbeFailure::Unreachable);
    }

    let dialect_match = DIALECT_AVAILABLE
        .get(&dialect)
        .is_some_and(|pattern| pattern.is_match(response));
    if dialect_match || GENERIC_AVAILABLE.is_match(response) {
        return Ok(ProbeFinding::available(None));
    }

    let markers = TAKEN_MARKERS.iter().filter(|m| m.is_match(response)).count();
    if markers >= 2 {
        return Ok(ProbeFinding::taken(registration_detail(response)));
    }

    Err(ProbeFailure::MalformedResponse)
}

fn registration_detail(response: &str) -> Option<String> {
    let capture = |re: &Regex| {
        re.captures(response)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().trim().to_string())
    };

    let mut parts = Vec::new();
    if let Some(registrar) = capture(&REGISTRAR) {
        parts.push(format!("registrar: {}", registrar));
    }
    if let Some(created) = capture(&CREATED) {
        let day = created.split('T').next().unwrap_or(&created).to_string();
        parts.push(format!("registered: {}", day));
    }

    if parts.is_empty() {
        None
    } else {
        Some(parts.join("; "))
    }
}

/// Parse an IANA WHOIS reply for the authoritative server of a TLD.
///
/// IANA uses `refer:` and sometimes only `whois:`; `refer:` wins when both
/// are present.
///
/// ```text
/// refer:        whois.verisign-grs.com
/// whois:        whois.verisign-grs.com
/// ```
pub fn parse_iana_refer_response(response: &str) -> Option<String> {
    let mut whois_server = None;

    for line in response.lines().map(str::trim) {
        if let Some(server) = line.strip_prefix("refer:") {
            let server = server.trim();
            if !server.is_empty() {
                return Some(server.to_string());
            }
        } else if let Some(server) = line.strip_prefix("whois:") {
            let server = server.trim();
            if !server.is_empty() {
                whois_server = Some(server.to_string());
            }
        }
    }

    whois_server
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Availability;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const VERISIGN_NO_MATCH: &str = "No match for \"ACMEXYZ123.COM\".\r\n>>> Last update of whois database: 2024-05-01T10:00:00Z <<<\r\n\r\nNOTICE: The expiration date displayed in this record is the date the\r\nregistrar's sponsorship of the domain name registration in the registry is\r\ncurrently set to expire.\r\n";

    const VERISIGN_TAKEN: &str = "   Domain Name: GOOGLE.COM\r\n   Registry Domain ID: 2138514_DOMAIN_COM-VRSN\r\n   Registrar WHOIS Server: whois.markmonitor.com\r\n   Updated Date: 2019-09-09T15:39:04Z\r\n   Creation Date: 1997-09-15T04:00:00Z\r\n   Registry Expiry Date: 2028-09-14T04:00:00Z\r\n   Registrar: MarkMonitor Inc.\r\n   Domain Status: clientDeleteProhibited\r\n   Name Server: NS1.GOOGLE.COM\r\n";

    #[test]
    fn test_verisign_no_match_is_available() {
        let finding = classify_response(VERISIGN_NO_MATCH, WhoisDialect::Verisign).unwrap();
        assert_eq!(finding.status, Availability::Available);
    }

    #[test]
    fn test_taken_with_registrar_detail() {
        let finding = classify_response(VERISIGN_TAKEN, WhoisDialect::Verisign).unwrap();
        assert_eq!(finding.status, Availability::Taken);
        assert_eq!(
            finding.detail.as_deref(),
            Some("registrar: MarkMonitor Inc.; registered: 1997-09-15")
        );
    }

    #[test]
    fn test_dialect_patterns() {
        let denic = "Domain: acmexyz.de\nStatus: free\n";
        assert_eq!(
            classify_response(denic, WhoisDialect::Denic).unwrap().status,
            Availability::Available
        );

        let jprs = "[ JPRS database provides information on network administration. ]\n\nNo match!!\n";
        assert_eq!(
            classify_response(jprs, WhoisDialect::Jprs).unwrap().status,
            Availability::Available
        );

        let denic_taken = "Domain: denic.de\nNserver: ns1.denic.de\nStatus: connect\nChanged: 2020-01-01\n";
        assert_eq!(
            classify_response(denic_taken, WhoisDialect::Denic)
                .unwrap()
                .status,
            Availability::Taken
        );
    }

    #[test]
    fn test_throttling_and_garbage() {
        assert_eq!(
            classify_response("Query rate limit exceeded. Try again later.", WhoisDialect::Generic),
            Err(ProbeFailure::RateLimited)
        );
        assert_eq!(
            classify_response("Welcome to our WHOIS service", WhoisDialect::Generic),
            Err(ProbeFailure::MalformedResponse)
        );
        assert_eq!(
            classify_response("", WhoisDialect::Generic),
            Err(ProbeFailure::MalformedResponse)
        );
        assert_eq!(
            classify_response("No whois server is known for this kind of object.", WhoisDialect::Generic),
            Err(ProbeFailure::Unreachable)
        );
    }

    #[test]
    fn test_parse_iana_refer_response() {
        let response = "% IANA WHOIS server\n\nrefer:        whois.verisign-grs.com\n\ndomain:       COM\n";
        assert_eq!(
            parse_iana_refer_response(response),
            Some("whois.verisign-grs.com".to_string())
        );

        let no_refer = "% IANA WHOIS server\ndomain: TEST\nstatus: ACTIVE\n";
        assert_eq!(parse_iana_refer_response(no_refer), None);

        let whois_field = "domain:       MUSEUM\nwhois:        whois.nic.museum\n";
        assert_eq!(
            parse_iana_refer_response(whois_field),
            Some("whois.nic.museum".to_string())
        );

        let both_fields = "whois:        whois.old-server.com\nrefer:        whois.correct-server.com\n";
        assert_eq!(
            parse_iana_refer_response(both_fields),
            Some("whois.correct-server.com".to_string())
        );

        assert_eq!(parse_iana_refer_response("refer:        \n"), None);
    }

    /// Replies from a canned table and counts queries per server.
    struct ScriptedTransport {
        replies: HashMap<String, String>,
        calls: AtomicUsize,
        iana_calls: AtomicUsize,
    }

    impl ScriptedTransport {
        fn new(replies: &[(&str, &str)]) -> Self {
            Self {
                replies: replies
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
                calls: AtomicUsize::new(0),
                iana_calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl WhoisTransport for ScriptedTransport {
        async fn query(&self, server: &str, query: &str) -> Result<String, ProbeFailure> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if server == IANA_WHOIS_SERVER {
                self.iana_calls.fetch_add(1, Ordering::SeqCst);
            }
            self.replies
                .get(&format!("{} {}", server, query))
                .cloned()
                .ok_or(ProbeFailure::Unreachable)
        }
    }

    #[tokio::test]
    async fn test_probe_uses_table_server() {
        let transport = Arc::new(ScriptedTransport::new(&[(
            "whois.verisign-grs.com acmexyz123.com",
            VERISIGN_NO_MATCH,
        )]));
        let probe = WhoisProbe::new(transport.clone());

        assert_eq!(probe.upstream("acmexyz123.com"), "whois.verisign-grs.com");
        let finding = probe.probe("acmexyz123.com").await.unwrap();
        assert_eq!(finding.status, Availability::Available);
        assert_eq!(transport.iana_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_referral_is_memoised() {
        let transport = Arc::new(ScriptedTransport::new(&[
            ("whois.iana.org museum", "refer:        whois.nic.museum\n"),
            ("whois.nic.museum acme.museum", "Domain not found.\n"),
            ("whois.nic.museum other.museum", "Domain not found.\n"),
        ]));
        let probe = WhoisProbe::new(transport.clone());

        assert_eq!(probe.upstream("acme.museum"), IANA_WHOIS_SERVER);
        probe.probe("acme.museum").await.unwrap();
        probe.probe("other.museum").await.unwrap();

        assert_eq!(transport.iana_calls.load(Ordering::SeqCst), 1);
        assert_eq!(transport.calls.load(Ordering::SeqCst), 3);
        assert_eq!(probe.upstream("acme.museum"), "whois.nic.museum");
    }

    #[tokio::test]
    async fn test_missing_referral_is_unreachable() {
        let transport = Arc::new(ScriptedTransport::new(&[(
            "whois.iana.org zz",
            "% This query returned 0 objects.\n",
        )]));
        let probe = WhoisProbe::new(transport);
        assert_eq!(probe.probe("acme.zz").await, Err(ProbeFailure::Unreachable));
    }
}
