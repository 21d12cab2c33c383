//! WHOIS fallback through an HTTP WHOIS API.
//!
//! The API is queried with `?domain=` and answers with a JSON document whose
//! `parsedData` member carries the registration fields. That shape is mapped
//! into the same [`LookupRecord`] the RDAP client produces.

use crate::error::DomainLookupError;
use crate::types::{LookupMethod, LookupRecord};
use async_trait::async_trait;
use reqwest::header::{ACCEPT, USER_AGENT};
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

/// Source of WHOIS data for the lookup fallback.
///
/// Implementations must report every failure as
/// [`DomainLookupError::WhoisFailure`].
#[async_trait]
pub trait WhoisSource: Send + Sync {
    async fn lookup(&self, domain: &str) -> Result<LookupRecord, DomainLookupError>;
}

/// [`WhoisSource`] backed by the WHOIS HTTP API.
#[derive(Clone)]
pub struct WhoisApiClient {
    http: reqwest::Client,
    base_url: String,
    timeout: Duration,
    user_agent: String,
}

impl WhoisApiClient {
    pub fn new(
        http: reqwest::Client,
        base_url: impl Into<String>,
        timeout: Duration,
        user_agent: impl Into<String>,
    ) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            timeout,
            user_agent: user_agent.into(),
        }
    }

    async fn query(&self, domain: &str) -> Result<LookupRecord, DomainLookupError> {
        let response = self
            .http
            .get(&self.base_url)
            .query(&[("domain", domain)])
            .header(ACCEPT, "application/json")
            .header(USER_AGENT, &self.user_agent)
            .send()
            .await
            .map_err(|e| DomainLookupError::whois(domain, format!("Request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(DomainLookupError::whois(
                domain,
                format!(
                    "WHOIS API responded with status {}: {}",
                    status.as_u16(),
                    status.canonical_reason().unwrap_or_default()
                ),
            ));
        }

        let body = response
            .text()
            .await
            .map_err(|e| DomainLookupError::whois(domain, format!("Failed to read response: {}", e)))?;
        let json: Value = serde_json::from_str(&body)
            .map_err(|e| DomainLookupError::whois(domain, format!("Invalid JSON: {}", e)))?;

        Ok(map_whois_response(&json, domain))
    }
}

#[async_trait]
impl WhoisSource for WhoisApiClient {
    async fn lookup(&self, domain: &str) -> Result<LookupRecord, DomainLookupError> {
        debug!(domain = %domain, url = %self.base_url, "Querying WHOIS API");

        // The bound covers the body read as well as the response headers.
        match tokio::time::timeout(self.timeout, self.query(domain)).await {
            Ok(result) => result,
            Err(_) => Err(DomainLookupError::whois(
                domain,
                format!("Timed out after {:?}", self.timeout),
            )),
        }
    }
}

/// Map a WHOIS API document into a lookup record.
///
/// `found` is true iff `parsedData.domainName` is a non-empty string.
/// `status` and `nameservers` may each be a single string or a list.
pub fn map_whois_response(json: &Value, domain: &str) -> LookupRecord {
    let parsed = json.get("parsedData").unwrap_or(&Value::Null);
    let text = |key: &str| {
        parsed
            .get(key)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    };

    let mut record = LookupRecord::new(domain, LookupMethod::Whois);
    record.found = text("domainName").is_some();
    record.registrar = text("registrar");
    record.registration_date = text("creationDate");
    record.expiration_date = text("expirationDate");
    record.last_changed_date = text("updatedDate");
    record.status = one_or_many(parsed.get("status"));
    record.nameservers = one_or_many(parsed.get("nameservers"));
    record.raw_data = json.clone();
    record
}

fn one_or_many(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::String(s)) if !s.is_empty() => vec![s.clone()],
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer, timeout: Duration) -> WhoisApiClient {
        WhoisApiClient::new(
            reqwest::Client::new(),
            format!("{}/api/whois", server.uri()),
            timeout,
            "domain-lookup-tests",
        )
    }

    #[test]
    fn test_map_whois_response() {
        let json = json!({
            "parsedData": {
                "domainName": "EXAMPLE.IT",
                "registrar": "Example Registrar S.p.A.",
                "creationDate": "1999-01-01T00:00:00Z",
                "expirationDate": "2030-01-01T00:00:00Z",
                "updatedDate": "2024-01-01T00:00:00Z",
                "status": ["ok", "clientTransferProhibited"],
                "nameservers": ["ns1.example.it", "ns2.example.it"]
            }
        });

        let record = map_whois_response(&json, "example.it");
        assert!(record.found);
        assert_eq!(record.method, LookupMethod::Whois);
        assert_eq!(record.registrar.as_deref(), Some("Example Registrar S.p.A."));
        assert_eq!(
            record.registration_date.as_deref(),
            Some("1999-01-01T00:00:00Z")
        );
        assert_eq!(
            record.last_changed_date.as_deref(),
            Some("2024-01-01T00:00:00Z")
        );
        assert_eq!(record.status.len(), 2);
        assert_eq!(record.nameservers, vec!["ns1.example.it", "ns2.example.it"]);
        assert_eq!(record.raw_data, json);
    }

    #[test]
    fn test_found_requires_domain_name() {
        let missing = map_whois_response(&json!({ "parsedData": { "registrar": "X" } }), "a.it");
        assert!(!missing.found);

        let empty = map_whois_response(&json!({ "parsedData": { "domainName": "" } }), "a.it");
        assert!(!empty.found);

        let no_parsed = map_whois_response(&json!({ "error": "not found" }), "a.it");
        assert!(!no_parsed.found);
    }

    #[test]
    fn test_status_as_single_string() {
        let record = map_whois_response(
            &json!({ "parsedData": { "domainName": "a.it", "status": "ok" } }),
            "a.it",
        );
        assert_eq!(record.status, vec!["ok"]);
        assert!(record.nameservers.is_empty());
    }

    #[tokio::test]
    async fn test_lookup_sends_domain_query() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/whois"))
            .and(query_param("domain", "example.it"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "parsedData": { "domainName": "example.it" }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let record = client_for(&server, Duration::from_secs(5))
            .lookup("example.it")
            .await
            .unwrap();
        assert!(record.found);
    }

    #[tokio::test]
    async fn test_lookup_failures_are_whois_failures() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param("domain", "error.it"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(query_param("domain", "garbage.it"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(query_param("domain", "slow.it"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
            .mount(&server)
            .await;

        let client = client_for(&server, Duration::from_millis(200));
        for domain in ["error.it", "garbage.it", "slow.it"] {
            let err = client.lookup(domain).await.unwrap_err();
            assert!(
                matches!(err, DomainLookupError::WhoisFailure { .. }),
                "{}: {:?}",
                domain,
                err
            );
        }

        let err = client.lookup("error.it").await.unwrap_err();
        assert!(err.to_string().contains("status 500"));
    }

    #[tokio::test]
    async fn test_lookup_bounded_when_body_stalls() {
        // Headers and part of the body arrive, then the server goes quiet.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        std::thread::spawn(move || {
            use std::io::{Read, Write};
            if let Ok((mut stream, _)) = listener.accept() {
                let mut request = [0u8; 1024];
                let _ = stream.read(&mut request);
                let _ = stream.write_all(
                    b"HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: 100\r\n\r\n{\"parsedData\":",
                );
                let _ = stream.flush();
                std::thread::sleep(Duration::from_secs(10));
            }
        });

        let client = WhoisApiClient::new(
            reqwest::Client::new(),
            format!("http://{}/api/whois", addr),
            Duration::from_millis(300),
            "domain-lookup-tests",
        );

        let started = std::time::Instant::now();
        let result = tokio::time::timeout(Duration::from_secs(5), client.lookup("stall.it"))
            .await
            .expect("lookup must finish within its own timeout");

        match result {
            Err(DomainLookupError::WhoisFailure { message, .. }) => {
                assert!(message.contains("Timed out"), "{}", message)
            }
            other => panic!("unexpected result: {:?}", other),
        }
        assert!(started.elapsed() < Duration::from_secs(2));
    }
}
