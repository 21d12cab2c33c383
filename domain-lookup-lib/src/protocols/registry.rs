//! Zone to RDAP endpoint resolution.
//!
//! Endpoints are resolved in three tiers:
//! 1. the built-in table below (no I/O)
//! 2. the cached IANA bootstrap table, while it is fresh
//! 3. a live fetch of the IANA bootstrap document when the cache is missing
//!    or stale, which rebuilds and persists the whole table
//!
//! The cache is owned by [`RegistryBootstrap`] and persisted through the
//! injected [`KeyValueStore`].

use crate::error::DomainLookupError;
use crate::storage::KeyValueStore;
use crate::types::LookupConfig;
use chrono::{DateTime, Utc};
use reqwest::header::ACCEPT;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Storage key holding the serialized zone table.
pub const BOOTSTRAP_STORAGE_KEY: &str = "iana_rdap_bootstrap";

/// Storage key holding the cache expiry as epoch milliseconds.
pub const EXPIRY_STORAGE_KEY: &str = "iana_rdap_expiry";

/// Second-level zones that select their own registry service.
const SECOND_LEVEL_ZONES: &[&str] = &[
    "co.uk", "org.uk", "me.uk", "ltd.uk", "plc.uk", "com.au", "net.au", "org.au", "edu.au",
];

/// Built-in RDAP endpoints for popular zones.
///
/// Every value is an RDAP base URL ending in `/`; the domain path is
/// appended by the client.
pub fn static_registry() -> HashMap<&'static str, &'static str> {
    HashMap::from([
        // Generic TLDs
        ("com", "https://rdap.verisign.com/com/v1/"),
        ("net", "https://rdap.verisign.com/net/v1/"),
        ("org", "https://rdap.publicinterestregistry.org/rdap/"),
        ("info", "https://rdap.identitydigital.services/rdap/"),
        ("biz", "https://rdap.nic.biz/"),
        // Google Registry
        ("app", "https://pubapi.registry.google/rdap/"),
        ("dev", "https://pubapi.registry.google/rdap/"),
        ("page", "https://pubapi.registry.google/rdap/"),
        // CentralNic
        ("xyz", "https://rdap.centralnic.com/xyz/"),
        ("tech", "https://rdap.centralnic.com/tech/"),
        ("online", "https://rdap.centralnic.com/online/"),
        ("site", "https://rdap.centralnic.com/site/"),
        ("website", "https://rdap.centralnic.com/website/"),
        ("blog", "https://rdap.blog.fury.ca/rdap/"),
        ("shop", "https://rdap.gmoregistry.net/rdap/"),
        ("cloud", "https://rdap.registry.cloud/rdap/"),
        // Identity Digital
        ("ai", "https://rdap.identitydigital.services/rdap/"),
        ("io", "https://rdap.identitydigital.services/rdap/"),
        ("me", "https://rdap.identitydigital.services/rdap/"),
        ("zone", "https://rdap.identitydigital.services/rdap/"),
        ("digital", "https://rdap.identitydigital.services/rdap/"),
        // Country codes
        ("us", "https://rdap.nic.us/"),
        ("uk", "https://rdap.nominet.uk/"),
        ("de", "https://rdap.denic.de/"),
        ("ca", "https://rdap.ca.fury.ca/rdap/"),
        ("au", "https://rdap.cctld.au/rdap/"),
        ("fr", "https://rdap.nic.fr/"),
        ("nl", "https://rdap.sidn.nl/"),
        ("br", "https://rdap.registro.br/"),
        ("in", "https://rdap.nixiregistry.in/rdap/"),
        ("ru", "https://rdap.tcinet.ru/"),
        ("tv", "https://rdap.nic.tv/"),
        ("cc", "https://tld-rdap.verisign.com/cc/v1/"),
        // Second-level zones served by their parent registry
        ("co.uk", "https://rdap.nominet.uk/"),
        ("org.uk", "https://rdap.nominet.uk/"),
        ("me.uk", "https://rdap.nominet.uk/"),
        ("ltd.uk", "https://rdap.nominet.uk/"),
        ("plc.uk", "https://rdap.nominet.uk/"),
        ("com.au", "https://rdap.cctld.au/rdap/"),
        ("net.au", "https://rdap.cctld.au/rdap/"),
        ("org.au", "https://rdap.cctld.au/rdap/"),
        ("edu.au", "https://rdap.cctld.au/rdap/"),
        // co, eu, it, jp, es and cn have no working RDAP service and go
        // through the WHOIS fallback.
    ])
}

/// The zone label that selects a registry for `domain`.
///
/// `example.co.uk` → `co.uk`, `example.com` → `com`, `localhost` → `None`.
pub fn zone_of(domain: &str) -> Option<String> {
    let domain = domain.to_lowercase();
    let labels: Vec<&str> = domain.split('.').collect();

    if labels.len() < 2 {
        return None;
    }

    if labels.len() >= 3 {
        let second_level = labels[labels.len() - 2..].join(".");
        if SECOND_LEVEL_ZONES.contains(&second_level.as_str()) {
            return Some(second_level);
        }
    }

    labels.last().map(|label| label.to_string())
}

/// A fetched IANA bootstrap table and its freshness window.
#[derive(Debug, Clone, PartialEq)]
pub struct BootstrapCache {
    /// Zone → RDAP base URL
    pub entries: HashMap<String, String>,
    pub fetched_at: DateTime<Utc>,
    pub ttl: Duration,
    /// `publication` timestamp of the IANA document, when present
    pub publication: Option<String>,
}

impl BootstrapCache {
    pub fn new(
        entries: HashMap<String, String>,
        fetched_at: DateTime<Utc>,
        ttl: Duration,
        publication: Option<String>,
    ) -> Self {
        Self {
            entries,
            fetched_at,
            ttl,
            publication,
        }
    }

    /// Epoch milliseconds at which the table goes stale.
    pub fn expires_at_millis(&self) -> i64 {
        let ttl_ms = i64::try_from(self.ttl.as_millis()).unwrap_or(i64::MAX);
        self.fetched_at.timestamp_millis().saturating_add(ttl_ms)
    }

    /// Stale once `now >= fetched_at + ttl`.
    pub fn is_stale_at(&self, now: DateTime<Utc>) -> bool {
        now.timestamp_millis() >= self.expires_at_millis()
    }

    pub fn endpoint(&self, zone: &str) -> Option<&str> {
        self.entries.get(zone).map(String::as_str)
    }
}

/// Persisted form of the zone table.
#[derive(Debug, Serialize, Deserialize)]
struct StoredBootstrap {
    entries: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    publication: Option<String>,
}

enum CacheLookup {
    Hit(String),
    /// Fresh table without this zone
    Absent,
    /// Nothing cached, or the table has expired
    Stale,
}

/// Resolves a domain's zone to its authoritative RDAP endpoint.
pub struct RegistryBootstrap {
    http: reqwest::Client,
    store: Arc<dyn KeyValueStore>,
    bootstrap_url: String,
    fetch_timeout: Duration,
    ttl: Duration,
    enabled: bool,
    cache: RwLock<Option<BootstrapCache>>,
    // Held for the duration of a live fetch so concurrent stale lookups
    // wait for one refresh instead of issuing their own.
    refresh: tokio::sync::Mutex<()>,
}

impl RegistryBootstrap {
    /// Create a resolver and load any fresh table from `store`.
    pub fn new(config: &LookupConfig, http: reqwest::Client, store: Arc<dyn KeyValueStore>) -> Self {
        let bootstrap = Self {
            http,
            store,
            bootstrap_url: config.bootstrap_url.clone(),
            fetch_timeout: config.rdap_timeout,
            ttl: config.bootstrap_ttl,
            enabled: config.enable_bootstrap,
            cache: RwLock::new(None),
            refresh: tokio::sync::Mutex::new(()),
        };

        if bootstrap.enabled {
            bootstrap.load_cache();
        }

        bootstrap
    }

    /// Load the persisted table if it is present and fresh.
    ///
    /// Returns whether a table was installed. Storage and parse failures are
    /// logged and treated as an empty cache.
    pub fn load_cache(&self) -> bool {
        match self.read_stored(Utc::now()) {
            Ok(Some(cache)) => {
                debug!(zones = cache.entries.len(), "Loaded bootstrap table from storage");
                self.install(cache);
                true
            }
            Ok(None) => false,
            Err(e) => {
                warn!(error = %e, "Failed to load bootstrap table from storage");
                false
            }
        }
    }

    /// Persist `cache` under the two storage keys.
    ///
    /// Failures are logged and otherwise ignored.
    pub fn save_cache(&self, cache: &BootstrapCache) {
        let stored = StoredBootstrap {
            entries: cache
                .entries
                .iter()
                .map(|(zone, endpoint)| (zone.clone(), endpoint.clone()))
                .collect(),
            publication: cache.publication.clone(),
        };

        let result = serde_json::to_string(&stored)
            .map_err(DomainLookupError::from)
            .and_then(|json| self.store.set(BOOTSTRAP_STORAGE_KEY, &json))
            .and_then(|_| {
                self.store
                    .set(EXPIRY_STORAGE_KEY, &cache.expires_at_millis().to_string())
            });

        match result {
            Ok(()) => debug!(zones = cache.entries.len(), "Saved bootstrap table to storage"),
            Err(e) => warn!(error = %e, "Failed to save bootstrap table to storage"),
        }
    }

    /// The RDAP base URL for `domain`'s zone, or `None` if no tier knows it.
    ///
    /// May perform one live bootstrap fetch. Fetch failures are logged and
    /// reported as `None`.
    pub async fn endpoint_for(&self, domain: &str) -> Option<String> {
        let zone = zone_of(domain)?;

        if let Some(endpoint) = static_registry().get(zone.as_str()) {
            debug!(zone = %zone, "Using built-in RDAP endpoint");
            return Some(endpoint.to_string());
        }

        if !self.enabled {
            debug!(zone = %zone, "No built-in RDAP endpoint and bootstrap disabled");
            return None;
        }

        match self.lookup_cached(&zone, Utc::now()) {
            CacheLookup::Hit(endpoint) => {
                debug!(zone = %zone, "Using cached IANA RDAP endpoint");
                return Some(endpoint);
            }
            CacheLookup::Absent => {
                debug!(zone = %zone, "Zone not in fresh bootstrap table");
                return None;
            }
            CacheLookup::Stale => {}
        }

        let _guard = self.refresh.lock().await;

        // Another lookup may have refreshed while we waited.
        match self.lookup_cached(&zone, Utc::now()) {
            CacheLookup::Hit(endpoint) => return Some(endpoint),
            CacheLookup::Absent => return None,
            CacheLookup::Stale => {}
        }

        match self.fetch_bootstrap().await {
            Ok(cache) => {
                let endpoint = cache.endpoint(&zone).map(str::to_string);
                self.save_cache(&cache);
                self.install(cache);

                match &endpoint {
                    Some(_) => debug!(zone = %zone, "Using fresh IANA RDAP endpoint"),
                    None => debug!(zone = %zone, "No RDAP service for zone"),
                }
                endpoint
            }
            Err(e) => {
                warn!(error = %e, "Failed to fetch IANA bootstrap registry");
                None
            }
        }
    }

    /// Whether any tier can resolve an endpoint for `domain`.
    pub async fn has_support(&self, domain: &str) -> bool {
        self.endpoint_for(domain).await.is_some()
    }

    /// Fetch and parse the IANA bootstrap document.
    ///
    /// Does not touch the cache; [`endpoint_for`](Self::endpoint_for)
    /// installs and persists the result.
    pub async fn fetch_bootstrap(&self) -> Result<BootstrapCache, DomainLookupError> {
        info!(url = %self.bootstrap_url, "Fetching IANA bootstrap registry");

        let json = match tokio::time::timeout(self.fetch_timeout, self.fetch_document()).await {
            Ok(result) => result?,
            Err(_) => {
                return Err(DomainLookupError::timeout(
                    "Bootstrap registry fetch",
                    self.fetch_timeout,
                ))
            }
        };
        let (entries, publication) = parse_bootstrap_document(&json)?;

        info!(zones = entries.len(), "IANA bootstrap registry loaded");
        Ok(BootstrapCache::new(entries, Utc::now(), self.ttl, publication))
    }

    async fn fetch_document(&self) -> Result<serde_json::Value, DomainLookupError> {
        let response = self
            .http
            .get(&self.bootstrap_url)
            .header(ACCEPT, "application/json")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(DomainLookupError::network_with_source(
                "Bootstrap registry fetch failed",
                format!("HTTP {}", status),
            ));
        }

        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }

    fn read_stored(&self, now: DateTime<Utc>) -> Result<Option<BootstrapCache>, DomainLookupError> {
        let (Some(table), Some(expiry)) = (
            self.store.get(BOOTSTRAP_STORAGE_KEY)?,
            self.store.get(EXPIRY_STORAGE_KEY)?,
        ) else {
            return Ok(None);
        };

        let expires_at: i64 = expiry.trim().parse().map_err(|_| {
            DomainLookupError::storage(format!("Invalid bootstrap expiry '{}'", expiry))
        })?;
        if now.timestamp_millis() >= expires_at {
            debug!("Stored bootstrap table has expired");
            return Ok(None);
        }

        let stored: StoredBootstrap = serde_json::from_str(&table)?;
        let ttl_ms = i64::try_from(self.ttl.as_millis()).unwrap_or(i64::MAX);
        let fetched_at = DateTime::<Utc>::from_timestamp_millis(expires_at.saturating_sub(ttl_ms))
            .unwrap_or(now);

        Ok(Some(BootstrapCache::new(
            stored.entries.into_iter().collect(),
            fetched_at,
            self.ttl,
            stored.publication,
        )))
    }

    fn lookup_cached(&self, zone: &str, now: DateTime<Utc>) -> CacheLookup {
        match self.read_cache().as_ref() {
            Some(cache) if !cache.is_stale_at(now) => match cache.endpoint(zone) {
                Some(endpoint) => CacheLookup::Hit(endpoint.to_string()),
                None => CacheLookup::Absent,
            },
            _ => CacheLookup::Stale,
        }
    }

    fn read_cache(&self) -> RwLockReadGuard<'_, Option<BootstrapCache>> {
        self.cache.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn install(&self, cache: BootstrapCache) {
        let mut slot = self.cache.write().unwrap_or_else(PoisonError::into_inner);
        *slot = Some(cache);
    }

    /// A resolver whose dynamic tier already holds `entries`, fresh.
    #[cfg(test)]
    pub(crate) fn with_table(config: &LookupConfig, entries: &[(&str, &str)]) -> Self {
        let bootstrap = Self::new(
            config,
            reqwest::Client::new(),
            Arc::new(crate::storage::MemoryStore::new()),
        );
        let entries = entries
            .iter()
            .map(|(zone, endpoint)| (zone.to_string(), endpoint.to_string()))
            .collect();
        bootstrap.install(BootstrapCache::new(entries, Utc::now(), config.bootstrap_ttl, None));
        bootstrap
    }
}

/// Build the zone table from an IANA `dns.json` document.
///
/// Each service is `[[zones...], [servers...]]`; the first server is
/// authoritative. Entries that do not have that shape are skipped.
fn parse_bootstrap_document(
    json: &serde_json::Value,
) -> Result<(HashMap<String, String>, Option<String>), DomainLookupError> {
    let services = json
        .get("services")
        .and_then(|s| s.as_array())
        .ok_or_else(|| {
            DomainLookupError::malformed("Bootstrap document has no 'services' array")
        })?;

    let mut entries = HashMap::new();

    for service in services {
        let Some(pair) = service.as_array() else {
            continue;
        };
        let (Some(zones), Some(servers)) = (
            pair.first().and_then(|z| z.as_array()),
            pair.get(1).and_then(|s| s.as_array()),
        ) else {
            continue;
        };
        let Some(server) = servers.first().and_then(|s| s.as_str()) else {
            continue;
        };

        let endpoint = if server.ends_with('/') {
            server.to_string()
        } else {
            format!("{}/", server)
        };

        for zone in zones.iter().filter_map(|z| z.as_str()) {
            entries.insert(zone.to_lowercase(), endpoint.clone());
        }
    }

    let publication = json
        .get("publication")
        .and_then(|p| p.as_str())
        .map(str::to_string);

    Ok((entries, publication))
}
