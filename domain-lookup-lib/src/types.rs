//! Core data types for domain lookups.
//!
//! This module defines the unified lookup record that both RDAP and WHOIS
//! answers are normalized into, its parts, and the configuration options
//! for the lookup pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Unified result of a single domain lookup.
///
/// Produced once per request by either the RDAP pipeline or the WHOIS
/// fallback. Serialized with camelCase keys so the JSON output matches the
/// shape presentation layers expect.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LookupRecord {
    /// The canonical domain that was looked up (e.g., "example.com")
    pub domain: String,

    /// Whether the registry knows the domain
    pub found: bool,

    /// Which protocol produced this record
    pub method: LookupMethod,

    /// True when RDAP was attempted and failed before WHOIS answered
    pub fallback_used: bool,

    /// When the record was produced
    pub timestamp: DateTime<Utc>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub registrar: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub registration_date: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub expiration_date: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_changed_date: Option<String>,

    /// Domain status codes (e.g., "client transfer prohibited")
    #[serde(default)]
    pub status: Vec<String>,

    /// Nameserver host names
    #[serde(default)]
    pub nameservers: Vec<String>,

    /// Contacts attached to the domain (RDAP only)
    #[serde(default)]
    pub entities: Vec<ParsedEntity>,

    /// Every event the registry reported, in registry order (RDAP only)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub events: Vec<RdapEvent>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub object_class_name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub ldh_name: Option<String>,

    /// Human-readable note, set when the registry has no such domain
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// The untouched upstream payload
    #[serde(default)]
    pub raw_data: serde_json::Value,
}

impl LookupRecord {
    /// An empty record for `domain` produced by `method`.
    pub fn new<D: Into<String>>(domain: D, method: LookupMethod) -> Self {
        Self {
            domain: domain.into(),
            found: false,
            method,
            fallback_used: false,
            timestamp: Utc::now(),
            registrar: None,
            registration_date: None,
            expiration_date: None,
            last_changed_date: None,
            status: Vec::new(),
            nameservers: Vec::new(),
            entities: Vec::new(),
            events: Vec::new(),
            object_class_name: None,
            ldh_name: None,
            message: None,
            raw_data: serde_json::Value::Null,
        }
    }

    /// The registry's "domain does not exist" outcome.
    pub fn not_found<D: Into<String>>(domain: D, method: LookupMethod) -> Self {
        Self {
            message: Some("Domain not found in registry".to_string()),
            ..Self::new(domain, method)
        }
    }

    /// Attach the orchestrator's metadata and stamp the completion time.
    pub fn finalize(self, fallback_used: bool) -> Self {
        Self {
            fallback_used,
            timestamp: Utc::now(),
            ..self
        }
    }

    /// Whole days from `now` until the expiration date.
    ///
    /// Negative when the domain has already expired. `None` when there is no
    /// expiration date or it is not RFC 3339.
    pub fn days_until_expiration(&self, now: DateTime<Utc>) -> Option<i64> {
        let expires = self.expiration_date.as_deref()?;
        let expires = DateTime::parse_from_rfc3339(expires).ok()?;
        Some((expires.with_timezone(&Utc) - now).num_days())
    }
}

/// Protocol that produced a lookup record.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum LookupMethod {
    #[serde(rename = "rdap")]
    Rdap,

    #[serde(rename = "whois")]
    Whois,
}

impl std::fmt::Display for LookupMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LookupMethod::Rdap => write!(f, "RDAP"),
            LookupMethod::Whois => write!(f, "WHOIS"),
        }
    }
}

/// One RDAP event (`eventAction`, `eventDate`, `eventActor`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct RdapEvent {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub actor: Option<String>,
}

/// An RDAP entity reduced to its handle, roles and contact card.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ParsedEntity {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub handle: Option<String>,

    #[serde(default)]
    pub roles: Vec<String>,

    /// `None` when the entity carried no vCard
    pub contact: Option<Contact>,
}

/// Contact details extracted from a vCard.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Contact {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub organization: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub emails: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub phones: Vec<String>,
}

/// A hostname split into its registrable root and the labels in front of it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainParts {
    pub root_domain: String,

    /// `None` when the hostname is its own root
    pub subdomain: Option<String>,
}

impl DomainParts {
    /// The full hostname these parts were split from.
    pub fn hostname(&self) -> String {
        match &self.subdomain {
            Some(sub) => format!("{}.{}", sub, self.root_domain),
            None => self.root_domain.clone(),
        }
    }
}

/// IANA RDAP bootstrap document for DNS zones.
pub const DEFAULT_BOOTSTRAP_URL: &str = "https://data.iana.org/rdap/dns.json";

/// WHOIS HTTP API queried when RDAP is unavailable.
pub const DEFAULT_WHOIS_API_URL: &str = "https://api.domaindetails.com/api/whois";

/// Configuration options for the lookup pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LookupConfig {
    /// Timeout for the RDAP query
    /// Default: 10 seconds
    #[serde(skip)]
    pub rdap_timeout: Duration,

    /// Timeout for the WHOIS API request
    /// Default: 10 seconds
    #[serde(skip)]
    pub whois_timeout: Duration,

    /// How long a fetched bootstrap table stays fresh
    /// Default: 7 days
    #[serde(skip)]
    pub bootstrap_ttl: Duration,

    /// Whether to consult the dynamic IANA bootstrap table
    /// Default: true when built with the `bootstrap` feature
    pub enable_bootstrap: bool,

    /// Whether to fall back to WHOIS when RDAP fails or is unsupported
    /// Default: true when built with the `whois` feature
    pub enable_whois_fallback: bool,

    /// Bootstrap document location
    pub bootstrap_url: String,

    /// WHOIS API base URL (queried with `?domain=`)
    pub whois_api_url: String,

    /// Sent as `User-Agent` on every request
    pub user_agent: String,
}

impl Default for LookupConfig {
    fn default() -> Self {
        Self {
            rdap_timeout: Duration::from_secs(10),
            whois_timeout: Duration::from_secs(10),
            bootstrap_ttl: Duration::from_secs(7 * 24 * 3600),
            enable_bootstrap: cfg!(feature = "bootstrap"),
            enable_whois_fallback: cfg!(feature = "whois"),
            bootstrap_url: DEFAULT_BOOTSTRAP_URL.to_string(),
            whois_api_url: DEFAULT_WHOIS_API_URL.to_string(),
            user_agent: format!("domain-lookup/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl LookupConfig {
    /// Set the RDAP query timeout.
    pub fn with_rdap_timeout(mut self, timeout: Duration) -> Self {
        self.rdap_timeout = timeout;
        self
    }

    /// Set the WHOIS API timeout.
    pub fn with_whois_timeout(mut self, timeout: Duration) -> Self {
        self.whois_timeout = timeout;
        self
    }

    /// Set the bootstrap cache lifetime.
    pub fn with_bootstrap_ttl(mut self, ttl: Duration) -> Self {
        self.bootstrap_ttl = ttl;
        self
    }

    /// Enable or disable the dynamic bootstrap tiers.
    pub fn with_bootstrap(mut self, enabled: bool) -> Self {
        self.enable_bootstrap = enabled;
        self
    }

    /// Enable or disable the WHOIS fallback.
    pub fn with_whois_fallback(mut self, enabled: bool) -> Self {
        self.enable_whois_fallback = enabled;
        self
    }

    /// Point the bootstrap fetch at another document.
    pub fn with_bootstrap_url<U: Into<String>>(mut self, url: U) -> Self {
        self.bootstrap_url = url.into();
        self
    }

    /// Point the WHOIS fallback at another API.
    pub fn with_whois_api_url<U: Into<String>>(mut self, url: U) -> Self {
        self.whois_api_url = url.into();
        self
    }
}
