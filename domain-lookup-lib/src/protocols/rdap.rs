//! RDAP (Registration Data Access Protocol) client.
//!
//! Queries the registry endpoint chosen by [`RegistryBootstrap`] and
//! normalizes the RDAP domain object into a [`LookupRecord`].

use crate::error::DomainLookupError;
use crate::protocols::registry::{zone_of, RegistryBootstrap};
use crate::types::{Contact, LookupMethod, LookupRecord, ParsedEntity, RdapEvent};
use reqwest::header::{ACCEPT, USER_AGENT};
use reqwest::StatusCode;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

const RDAP_ACCEPT: &str = "application/rdap+json, application/json";

/// RDAP client bound to a registry resolver.
#[derive(Clone)]
pub struct RdapClient {
    http: reqwest::Client,
    bootstrap: Arc<RegistryBootstrap>,
    timeout: Duration,
    user_agent: String,
}

impl RdapClient {
    pub fn new(
        http: reqwest::Client,
        bootstrap: Arc<RegistryBootstrap>,
        timeout: Duration,
        user_agent: impl Into<String>,
    ) -> Self {
        Self {
            http,
            bootstrap,
            timeout,
            user_agent: user_agent.into(),
        }
    }

    /// Look up a canonical domain over RDAP.
    ///
    /// A 404 from the registry is a successful lookup with `found: false`.
    ///
    /// # Errors
    ///
    /// - [`DomainLookupError::NoEndpoint`] when no registry is known for the zone
    /// - [`DomainLookupError::Timeout`] when the registry does not answer in time
    /// - [`DomainLookupError::UpstreamError`] for any other non-2xx status
    /// - [`DomainLookupError::MalformedResponse`] when the body is not a JSON object
    /// - [`DomainLookupError::Network`] for transport failures
    pub async fn lookup(&self, domain: &str) -> Result<LookupRecord, DomainLookupError> {
        let endpoint = self
            .bootstrap
            .endpoint_for(domain)
            .await
            .ok_or_else(|| DomainLookupError::no_endpoint(domain, zone_of(domain)))?;

        let url = format!("{}domain/{}", endpoint, domain);
        debug!(url = %url, "Querying RDAP");

        // Dropping the request future on timeout aborts the connection.
        match tokio::time::timeout(self.timeout, self.query(&url, domain)).await {
            Ok(result) => result,
            Err(_) => Err(DomainLookupError::timeout("RDAP request", self.timeout)),
        }
    }

    async fn query(&self, url: &str, domain: &str) -> Result<LookupRecord, DomainLookupError> {
        let response = self
            .http
            .get(url)
            .header(ACCEPT, RDAP_ACCEPT)
            .header(USER_AGENT, &self.user_agent)
            .send()
            .await
            .map_err(|e| DomainLookupError::network_with_source("RDAP request failed", e.to_string()))?;

        let status = response.status();
        debug!(domain = %domain, status = %status, "RDAP response");

        if status == StatusCode::NOT_FOUND {
            return Ok(LookupRecord::not_found(domain, LookupMethod::Rdap));
        }
        if !status.is_success() {
            return Err(DomainLookupError::upstream(
                domain,
                status.as_u16(),
                status.canonical_reason().unwrap_or_default(),
            ));
        }

        let body = response.text().await.map_err(|e| {
            DomainLookupError::network_with_source("Failed to read RDAP response", e.to_string())
        })?;
        let json: Value = serde_json::from_str(&body)?;
        if !json.is_object() {
            return Err(DomainLookupError::malformed(
                "RDAP response is not a JSON object",
            ));
        }

        Ok(parse_response(&json, domain))
    }
}

/// Normalize an RDAP domain object into a lookup record.
///
/// Missing members leave the corresponding field empty. When the registry
/// reports the same event action more than once, the first one is used for
/// the top-level date.
pub fn parse_response(json: &Value, domain: &str) -> LookupRecord {
    let mut record = LookupRecord::new(domain, LookupMethod::Rdap);
    record.found = true;
    record.object_class_name = str_member(json, "objectClassName");
    record.ldh_name = str_member(json, "ldhName").or_else(|| Some(domain.to_string()));
    record.status = string_list(json.get("status"));

    if let Some(events) = json.get("events").and_then(Value::as_array) {
        record.events = events.iter().map(parse_event).collect();
        record.registration_date = first_event_date(&record.events, "registration");
        record.expiration_date = first_event_date(&record.events, "expiration");
        record.last_changed_date = first_event_date(&record.events, "last changed");
    }

    if let Some(entities) = json.get("entities").and_then(Value::as_array) {
        record.entities = entities.iter().map(parse_entity).collect();
        record.registrar = entities
            .iter()
            .find(|entity| string_list(entity.get("roles")).iter().any(|r| r == "registrar"))
            .and_then(vcard_items)
            .and_then(|items| parse_vcard(items).name);
    }

    if let Some(nameservers) = json.get("nameservers").and_then(Value::as_array) {
        record.nameservers = nameservers
            .iter()
            .filter_map(|ns| ns.get("ldhName").and_then(Value::as_str))
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .collect();
    }

    record.raw_data = json.clone();
    record
}

/// Reduce an RDAP entity to its handle, roles and vCard contact.
pub fn parse_entity(entity: &Value) -> ParsedEntity {
    let has_vcard = entity
        .get("vcardArray")
        .and_then(Value::as_array)
        .is_some_and(|card| card.len() > 1);

    ParsedEntity {
        handle: str_member(entity, "handle"),
        roles: string_list(entity.get("roles")),
        contact: has_vcard.then(|| parse_vcard(vcard_items(entity).unwrap_or_default())),
    }
}

/// Extract contact fields from jCard properties.
///
/// Each item is `[property, parameters, type, value]`. `fn`, `org`,
/// `email` and `tel` are recognized case-insensitively; anything else, and
/// any item that is not a four-element array, is skipped.
pub fn parse_vcard(items: &[Value]) -> Contact {
    let mut contact = Contact::default();

    for item in items {
        let Some(fields) = item.as_array().filter(|f| f.len() >= 4) else {
            continue;
        };
        let Some(property) = fields[0].as_str() else {
            continue;
        };
        let value = &fields[3];

        match property.to_ascii_lowercase().as_str() {
            "fn" => {
                if let Some(name) = value.as_str() {
                    contact.name = Some(name.to_string());
                }
            }
            "org" => {
                let org = match value {
                    Value::Array(parts) => parts.first().and_then(Value::as_str),
                    other => other.as_str(),
                };
                if let Some(org) = org {
                    contact.organization = Some(org.to_string());
                }
            }
            "email" => {
                if let Some(email) = value.as_str() {
                    contact.emails.push(email.to_string());
                }
            }
            "tel" => {
                if let Some(tel) = value.as_str() {
                    contact.phones.push(tel.to_string());
                }
            }
            _ => {}
        }
    }

    contact
}

/// The property list of an entity's `vcardArray` (`["vcard", [...]]`).
fn vcard_items(entity: &Value) -> Option<&[Value]> {
    entity
        .get("vcardArray")
        .and_then(Value::as_array)
        .and_then(|card| card.get(1))
        .and_then(Value::as_array)
        .map(Vec::as_slice)
}

fn parse_event(event: &Value) -> RdapEvent {
    RdapEvent {
        action: str_member(event, "eventAction"),
        date: str_member(event, "eventDate"),
        actor: str_member(event, "eventActor"),
    }
}

fn first_event_date(events: &[RdapEvent], action: &str) -> Option<String> {
    events
        .iter()
        .find(|event| event.action.as_deref() == Some(action))
        .and_then(|event| event.date.clone())
}

fn str_member(json: &Value, key: &str) -> Option<String> {
    json.get(key).and_then(Value::as_str).map(str::to_string)
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    value
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::LookupConfig;
    use serde_json::json;
    use wiremock::matchers::{header, header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer, timeout: Duration) -> RdapClient {
        let config = LookupConfig::default();
        let endpoint = format!("{}/rdap/", server.uri());
        let bootstrap = RegistryBootstrap::with_table(&config, &[("test", endpoint.as_str())]);
        RdapClient::new(
            reqwest::Client::new(),
            Arc::new(bootstrap),
            timeout,
            "domain-lookup-tests",
        )
    }

    fn sample_domain() -> Value {
        json!({
            "objectClassName": "domain",
            "ldhName": "EXAMPLE.TEST",
            "status": ["client transfer prohibited", 42],
            "events": [
                { "eventAction": "registration", "eventDate": "1995-08-14T04:00:00Z" },
                { "eventAction": "expiration", "eventDate": "2030-08-13T04:00:00Z" },
                { "eventAction": "registration", "eventDate": "2001-01-01T00:00:00Z" },
                { "eventAction": "last changed", "eventDate": "2024-08-14T07:01:44Z", "eventActor": "registry" }
            ],
            "entities": [
                {
                    "handle": "ABUSE-1",
                    "roles": ["abuse"],
                    "vcardArray": ["vcard", [["fn", {}, "text", "Abuse Desk"]]]
                },
                {
                    "handle": "292",
                    "roles": ["registrar"],
                    "vcardArray": ["vcard", [
                        ["version", {}, "text", "4.0"],
                        ["fn", {}, "text", "Example Registrar, Inc."],
                        ["tel", {"type": "voice"}, "uri", "tel:+1.5555550100"]
                    ]]
                },
                { "handle": "NO-CARD", "roles": ["technical"] }
            ],
            "nameservers": [
                { "ldhName": "A.IANA-SERVERS.NET" },
                { "objectClassName": "nameserver" },
                { "ldhName": null },
                { "ldhName": "B.IANA-SERVERS.NET" }
            ]
        })
    }

    #[test]
    fn test_parse_vcard_example() {
        let items = json!([
            ["fn", {}, "text", "Jane Doe"],
            ["org", {}, "text", ["Acme Inc"]],
            ["email", {}, "text", "j@acme.com"]
        ]);

        let contact = parse_vcard(items.as_array().unwrap());
        assert_eq!(
            contact,
            Contact {
                name: Some("Jane Doe".to_string()),
                organization: Some("Acme Inc".to_string()),
                emails: vec!["j@acme.com".to_string()],
                phones: vec![],
            }
        );
    }

    #[test]
    fn test_parse_vcard_skips_malformed_items() {
        let items = json!([
            "not a tuple",
            ["fn", {}, "text"],
            ["FN", {}, "text", "Upper Case"],
            ["org", {}, "text", "Plain Org"],
            ["TEL", {}, "uri", "tel:+1.555"],
            ["adr", {}, "text", ["", "", "Main St"]],
            [42, {}, "text", "numeric property"]
        ]);

        let contact = parse_vcard(items.as_array().unwrap());
        assert_eq!(contact.name.as_deref(), Some("Upper Case"));
        assert_eq!(contact.organization.as_deref(), Some("Plain Org"));
        assert_eq!(contact.phones, vec!["tel:+1.555"]);
        assert!(contact.emails.is_empty());
    }

    #[test]
    fn test_parse_response() {
        let record = parse_response(&sample_domain(), "example.test");

        assert!(record.found);
        assert_eq!(record.method, LookupMethod::Rdap);
        assert_eq!(record.object_class_name.as_deref(), Some("domain"));
        assert_eq!(record.ldh_name.as_deref(), Some("EXAMPLE.TEST"));
        assert_eq!(record.status, vec!["client transfer prohibited"]);
        assert_eq!(record.registrar.as_deref(), Some("Example Registrar, Inc."));
        assert_eq!(
            record.nameservers,
            vec!["A.IANA-SERVERS.NET", "B.IANA-SERVERS.NET"]
        );
        assert_eq!(record.events.len(), 4);
        assert_eq!(record.events[3].actor.as_deref(), Some("registry"));
        assert_eq!(
            record.expiration_date.as_deref(),
            Some("2030-08-13T04:00:00Z")
        );
        assert_eq!(
            record.last_changed_date.as_deref(),
            Some("2024-08-14T07:01:44Z")
        );
        assert_eq!(record.raw_data["ldhName"], "EXAMPLE.TEST");
    }

    #[test]
    fn test_duplicate_events_first_match_wins() {
        let record = parse_response(&sample_domain(), "example.test");
        assert_eq!(
            record.registration_date.as_deref(),
            Some("1995-08-14T04:00:00Z")
        );
    }

    #[test]
    fn test_parse_entities() {
        let record = parse_response(&sample_domain(), "example.test");

        assert_eq!(record.entities.len(), 3);
        assert_eq!(record.entities[0].handle.as_deref(), Some("ABUSE-1"));
        assert_eq!(record.entities[1].roles, vec!["registrar"]);
        let registrar = record.entities[1].contact.as_ref().unwrap();
        assert_eq!(registrar.phones, vec!["tel:+1.5555550100"]);
        assert!(record.entities[2].contact.is_none());
    }

    #[test]
    fn test_parse_minimal_response() {
        let record = parse_response(&json!({}), "example.test");

        assert!(record.found);
        assert!(record.status.is_empty());
        assert!(record.events.is_empty());
        assert!(record.registrar.is_none());
        assert_eq!(record.ldh_name.as_deref(), Some("example.test"));
    }

    #[test]
    fn test_registrar_without_name_is_skipped() {
        let json = json!({
            "entities": [
                { "roles": ["registrar"], "vcardArray": ["vcard", [["org", {}, "text", "Org Only"]]] },
                { "roles": ["registrar"], "vcardArray": ["vcard", [["fn", {}, "text", "Second"]]] }
            ]
        });

        let record = parse_response(&json, "example.test");
        assert!(record.registrar.is_none());
    }

    #[tokio::test]
    async fn test_lookup_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rdap/domain/example.test"))
            .and(header_exists("accept"))
            .and(header("user-agent", "domain-lookup-tests"))
            .respond_with(ResponseTemplate::new(200).set_body_json(sample_domain()))
            .expect(1)
            .mount(&server)
            .await;

        let record = client_for(&server, Duration::from_secs(5))
            .lookup("example.test")
            .await
            .unwrap();

        assert!(record.found);
        assert_eq!(record.registrar.as_deref(), Some("Example Registrar, Inc."));
    }

    #[tokio::test]
    async fn test_lookup_404_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rdap/domain/missing.test"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let record = client_for(&server, Duration::from_secs(5))
            .lookup("missing.test")
            .await
            .unwrap();

        assert!(!record.found);
        assert_eq!(record.method, LookupMethod::Rdap);
        assert_eq!(record.message.as_deref(), Some("Domain not found in registry"));
    }

    #[tokio::test]
    async fn test_lookup_server_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let err = client_for(&server, Duration::from_secs(5))
            .lookup("example.test")
            .await
            .unwrap_err();

        match err {
            DomainLookupError::UpstreamError {
                status,
                status_text,
                ..
            } => {
                assert_eq!(status, 503);
                assert_eq!(status_text, "Service Unavailable");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_lookup_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(sample_domain())
                    .set_delay(Duration::from_secs(5)),
            )
            .mount(&server)
            .await;

        let err = client_for(&server, Duration::from_millis(200))
            .lookup("example.test")
            .await
            .unwrap_err();

        assert!(matches!(err, DomainLookupError::Timeout { .. }));
    }

    #[tokio::test]
    async fn test_lookup_malformed_bodies() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rdap/domain/html.test"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html></html>"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/rdap/domain/array.test"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([1, 2, 3])))
            .mount(&server)
            .await;

        let client = client_for(&server, Duration::from_secs(5));
        for domain in ["html.test", "array.test"] {
            let err = client.lookup(domain).await.unwrap_err();
            assert!(
                matches!(err, DomainLookupError::MalformedResponse { .. }),
                "{}: {:?}",
                domain,
                err
            );
        }
    }

    #[tokio::test]
    async fn test_lookup_without_endpoint() {
        let server = MockServer::start().await;
        let err = client_for(&server, Duration::from_secs(5))
            .lookup("example.nothere")
            .await
            .unwrap_err();

        match err {
            DomainLookupError::NoEndpoint { zone, .. } => {
                assert_eq!(zone.as_deref(), Some("nothere"))
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_lookup_connection_refused() {
        // Reserve a port, then release it so nothing is listening there.
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let config = LookupConfig::default();
        let endpoint = format!("http://127.0.0.1:{}/rdap/", port);
        let bootstrap = RegistryBootstrap::with_table(&config, &[("test", endpoint.as_str())]);
        let client = RdapClient::new(
            reqwest::Client::new(),
            Arc::new(bootstrap),
            Duration::from_secs(5),
            "domain-lookup-tests",
        );

        let err = client.lookup("example.test").await.unwrap_err();
        assert!(matches!(err, DomainLookupError::Network { .. }), "{:?}", err);
        assert!(err.triggers_fallback());
    }
}
