//! RDAP (Registration Data Access Protocol) probe.
//!
//! RDAP is the structured JSON successor to WHOIS. A registry answers 404
//! for names it does not hold and a domain object for names it does, which
//! makes it the most trustworthy step of the fallback chain.

use super::http::{HttpFetcher, HttpResponse, RDAP_ACCEPT};
use super::registry::rdap_endpoint;
use super::{tld_of, DomainProbe, ProbeFinding};
use crate::error::ProbeFailure;
use crate::types::VerdictSource;
use async_trait::async_trait;
use std::sync::Arc;

/// Registration details pulled out of an RDAP domain object.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RdapRecord {
    pub registrar: Option<String>,
    pub creation_date: Option<String>,
    pub expiration_date: Option<String>,
    pub updated_date: Option<String>,
    pub status: Vec<String>,
    pub nameservers: Vec<String>,
}

impl RdapRecord {
    /// One-line summary for a verdict's detail, dates trimmed to the day.
    pub fn summary(&self) -> Option<String> {
        let mut parts = Vec::new();
        if let Some(registrar) = &self.registrar {
            parts.push(format!("registrar: {}", registrar));
        }
        if let Some(created) = &self.creation_date {
            parts.push(format!("registered: {}", date_part(created)));
        }
        if let Some(expires) = &self.expiration_date {
            parts.push(format!("expires: {}", date_part(expires)));
        }

        if parts.is_empty() {
            None
        } else {
            Some(parts.join("; "))
        }
    }
}

/// Probe that asks the registry's RDAP service.
#[derive(Clone)]
pub struct RdapProbe {
    fetcher: Arc<dyn HttpFetcher>,
}

impl RdapProbe {
    pub fn new(fetcher: Arc<dyn HttpFetcher>) -> Self {
        Self { fetcher }
    }
}

#[async_trait]
impl DomainProbe for RdapProbe {
    fn source(&self) -> VerdictSource {
        VerdictSource::Rdap
    }

    fn upstream(&self, domain: &str) -> String {
        tld_of(domain)
            .ok()
            .and_then(|tld| rdap_endpoint(&tld))
            .and_then(|endpoint| reqwest::Url::parse(endpoint).ok())
            .and_then(|url| url.host_str().map(str::to_string))
            .unwrap_or_else(|| "rdap".to_string())
    }

    fn serves(&self, domain: &str) -> bool {
        tld_of(domain)
            .ok()
            .and_then(|tld| rdap_endpoint(&tld))
            .is_some()
    }

    async fn probe(&self, domain: &str) -> Result<ProbeFinding, ProbeFailure> {
        let tld = tld_of(domain)?;
        let endpoint = rdap_endpoint(&tld).ok_or(ProbeFailure::Unreachable)?;
        let url = format!("{}{}", endpoint, domain);

        let response = self.fetcher.get(&url, RDAP_ACCEPT).await?;
        classify_response(&response)
    }
}

/// Turn an RDAP HTTP response into a finding.
///
/// 404 means the registry does not hold the name. 200 counts only when the
/// body really is a domain object; registries behind captive portals or CDNs
/// sometimes answer 200 with HTML.
pub fn classify_response(response: &HttpResponse) -> Result<ProbeFinding, ProbeFailure> {
    match response.status {
        404 => Ok(ProbeFinding::available(None)),
        200 => {
            let json: serde_json::Value = serde_json::from_str(&response.body)
                .map_err(|_| ProbeFailure::MalformedResponse)?;
            if !is_domain_object(&json) {
                return Err(ProbeFailure::MalformedResponse);
            }
            Ok(ProbeFinding::taken(extract_domain_info(&json).summary()))
        }
        429 => Err(ProbeFailure::RateLimited),
        _ => Err(ProbeFailure::MalformedResponse),
    }
}

fn is_domain_object(json: &serde_json::Value) -> bool {
    if !json.is_object() {
        return false;
    }
    match json.get("objectClassName").and_then(|c| c.as_str()) {
        Some(class) => class.eq_ignore_ascii_case("domain"),
        None => json.get("ldhName").is_some() || json.get("handle").is_some(),
    }
}

/// Extract registration details from an RDAP domain object.
pub fn extract_domain_info(json: &serde_json::Value) -> RdapRecord {
    let mut info = RdapRecord::default();

    // Registrar from entities
    if let Some(entities) = json.get("entities").and_then(|e| e.as_array()) {
        for entity in entities {
            let is_registrar = entity
                .get("roles")
                .and_then(|r| r.as_array())
                .is_some_and(|roles| roles.iter().any(|role| role.as_str() == Some("registrar")));

            if is_registrar {
                if let Some(name) =
                    extract_vcard_name(entity).or_else(|| extract_entity_identifier(entity))
                {
                    info.registrar = Some(name);
                    break;
                }
            }
        }
    }

    if let Some(events) = json.get("events").and_then(|e| e.as_array()) {
        for event in events {
            if let (Some(action), Some(date)) = (
                event.get("eventAction").and_then(|a| a.as_str()),
                event.get("eventDate").and_then(|d| d.as_str()),
            ) {
                match action {
                    "registration" => info.creation_date = Some(date.to_string()),
                    "expiration" => info.expiration_date = Some(date.to_string()),
                    "last changed" | "last update of RDAP database" => {
                        info.updated_date = Some(date.to_string())
                    }
                    _ => {}
                }
            }
        }
    }

    if let Some(statuses) = json.get("status").and_then(|s| s.as_array()) {
        info.status = statuses
            .iter()
            .filter_map(|s| s.as_str().map(String::from))
            .collect();
    }

    if let Some(nameservers) = json.get("nameservers").and_then(|ns| ns.as_array()) {
        info.nameservers = nameservers
            .iter()
            .filter_map(|ns| ns.get("ldhName").and_then(|n| n.as_str()))
            .map(|n| n.to_lowercase())
            .collect();
    }

    info
}

/// Organization name from the `fn` property of an entity's vCard.
fn extract_vcard_name(entity: &serde_json::Value) -> Option<String> {
    entity
        .get("vcardArray")
        .and_then(|v| v.get(1))
        .and_then(|items| items.as_array())
        .and_then(|items| {
            items.iter().find_map(|item| {
                let item = item.as_array()?;
                if item.len() >= 4 && item.first()?.as_str()? == "fn" {
                    item.get(3)?.as_str().map(String::from)
                } else {
                    None
                }
            })
        })
        .filter(|name| !name.trim().is_empty())
}

/// Entity identifier from publicIds, handle or name.
fn extract_entity_identifier(entity: &serde_json::Value) -> Option<String> {
    entity
        .get("publicIds")
        .and_then(|p| p.as_array())
        .and_then(|ids| ids.first())
        .and_then(|id| id.get("identifier"))
        .or_else(|| entity.get("handle"))
        .or_else(|| entity.get("name"))
        .and_then(|v| v.as_str())
        .map(String::from)
}

fn date_part(timestamp: &str) -> &str {
    timestamp.split('T').next().unwrap_or(timestamp)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Availability;

    fn verisign_object() -> serde_json::Value {
        serde_json::json!({
            "objectClassName": "domain",
            "ldhName": "GOOGLE.COM",
            "entities": [{
                "objectClassName": "entity",
                "roles": ["registrar"],
                "publicIds": [{"type": "IANA Registrar ID", "identifier": "292"}],
                "vcardArray": ["vcard", [
                    ["version", {}, "text", "4.0"],
                    ["fn", {}, "text", "MarkMonitor Inc."]
                ]]
            }],
            "events": [
                {"eventAction": "registration", "eventDate": "1997-09-15T04:00:00Z"},
                {"eventAction": "expiration", "eventDate": "2028-09-14T04:00:00Z"},
                {"eventAction": "last update of RDAP database", "eventDate": "2024-05-01T10:00:00Z"}
            ],
            "status": ["client delete prohibited", "server transfer prohibited"],
            "nameservers": [{"ldhName": "NS1.GOOGLE.COM"}, {"ldhName": "NS2.GOOGLE.COM"}]
        })
    }

    #[test]
    fn test_not_found_is_available() {
        let finding = classify_response(&HttpResponse::new(404, "", "")).unwrap();
        assert_eq!(finding.status, Availability::Available);
        assert_eq!(finding.detail, None);
    }

    #[test]
    fn test_domain_object_is_taken_with_detail() {
        let body = verisign_object().to_string();
        let finding = classify_response(&HttpResponse::new(200, "", body)).unwrap();
        assert_eq!(finding.status, Availability::Taken);
        assert_eq!(
            finding.detail.as_deref(),
            Some("registrar: MarkMonitor Inc.; registered: 1997-09-15; expires: 2028-09-14")
        );
    }

    #[test]
    fn test_html_with_200_is_malformed() {
        let response = HttpResponse::new(200, "", "<html><body>Welcome</body></html>");
        assert_eq!(
            classify_response(&response),
            Err(ProbeFailure::MalformedResponse)
        );

        let error_object = HttpResponse::new(200, "", r#"{"errorCode": 400, "title": "bad"}"#);
        assert_eq!(
            classify_response(&error_object),
            Err(ProbeFailure::MalformedResponse)
        );
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            classify_response(&HttpResponse::new(429, "", "")),
            Err(ProbeFailure::RateLimited)
        );
        assert_eq!(
            classify_response(&HttpResponse::new(503, "", "")),
            Err(ProbeFailure::MalformedResponse)
        );
    }

    #[test]
    fn test_extract_domain_info() {
        let info = extract_domain_info(&verisign_object());
        assert_eq!(info.registrar.as_deref(), Some("MarkMonitor Inc."));
        assert_eq!(info.updated_date.as_deref(), Some("2024-05-01T10:00:00Z"));
        assert_eq!(info.status.len(), 2);
        assert_eq!(info.nameservers, vec!["ns1.google.com", "ns2.google.com"]);
    }

    #[test]
    fn test_registrar_falls_back_to_identifier() {
        let entity = serde_json::json!({
            "roles": ["registrar"],
            "publicIds": [{"identifier": "1068"}]
        });
        assert_eq!(extract_vcard_name(&entity), None);
        assert_eq!(extract_entity_identifier(&entity), Some("1068".to_string()));

        let handle_only = serde_json::json!({"handle": "REG-42"});
        assert_eq!(
            extract_entity_identifier(&handle_only),
            Some("REG-42".to_string())
        );
    }

    #[test]
    fn test_summary_without_details() {
        assert_eq!(RdapRecord::default().summary(), None);
    }

    #[test]
    fn test_upstream_is_endpoint_host() {
        struct NoFetch;
        #[async_trait]
        impl HttpFetcher for NoFetch {
            async fn get(&self, _: &str, _: &str) -> Result<HttpResponse, ProbeFailure> {
                Err(ProbeFailure::Unreachable)
            }
        }

        let probe = RdapProbe::new(Arc::new(NoFetch));
        assert_eq!(probe.upstream("acme.com"), "rdap.verisign.com");
        assert_eq!(probe.upstream("acme.museum"), "rdap.org");
        assert_eq!(probe.upstream("acme.co"), "rdap");

        assert!(probe.serves("acme.com"));
        assert!(probe.serves("acme.museum"));
        assert!(!probe.serves("acme.co"));
    }

    #[tokio::test]
    async fn test_unsupported_tld_fails_fast() {
        struct Panicking;
        #[async_trait]
        impl HttpFetcher for Panicking {
            async fn get(&self, url: &str, _: &str) -> Result<HttpResponse, ProbeFailure> {
                panic!("no request expected, got {}", url);
            }
        }

        let probe = RdapProbe::new(Arc::new(Panicking));
        assert_eq!(probe.probe("acme.co").await, Err(ProbeFailure::Unreachable));
    }
}
