//! Lookup orchestration.
//!
//! This module provides [`LookupOrchestrator`], which turns raw user input
//! into a single [`LookupRecord`]: RDAP first when the zone has a registry
//! service, the WHOIS API otherwise or when RDAP fails.

use crate::error::DomainLookupError;
use crate::http::build_client;
use crate::normalize::{normalize, validate_canonical};
use crate::protocols::registry::{zone_of, RegistryBootstrap};
use crate::protocols::{RdapClient, WhoisApiClient, WhoisSource};
use crate::storage::{KeyValueStore, MemoryStore};
use crate::types::{LookupConfig, LookupRecord};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Coordinates registry resolution, the RDAP query and the WHOIS fallback.
///
/// Each call to [`lookup`](Self::lookup) makes at most one RDAP attempt and
/// at most one WHOIS attempt, in that order, and ends in exactly one record
/// or one error.
///
/// # Example
///
/// ```rust,no_run
/// use domain_lookup_lib::LookupOrchestrator;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let orchestrator = LookupOrchestrator::new()?;
///     let record = orchestrator.lookup("https://www.example.com/about").await?;
///     println!("{} via {} (found: {})", record.domain, record.method, record.found);
///     Ok(())
/// }
/// ```
pub struct LookupOrchestrator {
    config: LookupConfig,
    bootstrap: Arc<RegistryBootstrap>,
    rdap: RdapClient,
    whois: Arc<dyn WhoisSource>,
}

impl LookupOrchestrator {
    /// Create an orchestrator with default configuration and an in-memory
    /// bootstrap cache.
    pub fn new() -> Result<Self, DomainLookupError> {
        Self::with_config(LookupConfig::default(), Arc::new(MemoryStore::new()))
    }

    /// Create an orchestrator whose bootstrap cache persists to `store`.
    ///
    /// ```rust
    /// use domain_lookup_lib::{LookupConfig, LookupOrchestrator, MemoryStore};
    /// use std::sync::Arc;
    /// use std::time::Duration;
    ///
    /// let config = LookupConfig::default()
    ///     .with_rdap_timeout(Duration::from_secs(5))
    ///     .with_whois_fallback(false);
    ///
    /// let orchestrator = LookupOrchestrator::with_config(config, Arc::new(MemoryStore::new()));
    /// assert!(orchestrator.is_ok());
    /// ```
    pub fn with_config(
        config: LookupConfig,
        store: Arc<dyn KeyValueStore>,
    ) -> Result<Self, DomainLookupError> {
        let http = build_client(&config)?;
        let bootstrap = Arc::new(RegistryBootstrap::new(&config, http.clone(), store));
        let rdap = RdapClient::new(
            http.clone(),
            bootstrap.clone(),
            config.rdap_timeout,
            config.user_agent.clone(),
        );
        let whois = Arc::new(WhoisApiClient::new(
            http,
            config.whois_api_url.clone(),
            config.whois_timeout,
            config.user_agent.clone(),
        ));

        Ok(Self::with_components(config, bootstrap, rdap, whois))
    }

    /// Assemble an orchestrator from already-built collaborators.
    pub fn with_components(
        config: LookupConfig,
        bootstrap: Arc<RegistryBootstrap>,
        rdap: RdapClient,
        whois: Arc<dyn WhoisSource>,
    ) -> Self {
        Self {
            config,
            bootstrap,
            rdap,
            whois,
        }
    }

    /// Get the configuration this orchestrator was built with.
    pub fn config(&self) -> &LookupConfig {
        &self.config
    }

    /// Look up a URL or hostname.
    ///
    /// # Errors
    ///
    /// - [`DomainLookupError::InvalidInput`] when no hostname can be extracted
    /// - [`DomainLookupError::WhoisFailure`] when the WHOIS fallback fails; the
    ///   preceding RDAP failure, if any, is attached as context
    /// - the RDAP error itself when WHOIS fallback is disabled
    pub async fn lookup(&self, domain_or_url: &str) -> Result<LookupRecord, DomainLookupError> {
        let domain = canonical_domain(domain_or_url)?;

        let rdap_failure = if self.bootstrap.has_support(&domain).await {
            match self.rdap.lookup(&domain).await {
                Ok(record) => {
                    info!(domain = %domain, found = record.found, "RDAP lookup complete");
                    return Ok(record.finalize(false));
                }
                Err(e) if e.triggers_fallback() => {
                    warn!(domain = %domain, error = %e, "RDAP lookup failed");
                    Some(e)
                }
                Err(e) => return Err(e),
            }
        } else {
            debug!(domain = %domain, "No RDAP support for zone");
            None
        };

        if !self.config.enable_whois_fallback {
            return Err(rdap_failure
                .unwrap_or_else(|| DomainLookupError::no_endpoint(&domain, zone_of(&domain))));
        }

        let fallback_used = rdap_failure.is_some();
        info!(domain = %domain, fallback_used, "Using WHOIS");

        match self.whois.lookup(&domain).await {
            Ok(record) => Ok(record.finalize(fallback_used)),
            Err(e) => Err(match &rdap_failure {
                Some(rdap) => e.with_rdap_context(rdap),
                None => e,
            }),
        }
    }
}

/// Normalize and validate raw input into a canonical domain.
fn canonical_domain(input: &str) -> Result<String, DomainLookupError> {
    let domain = normalize(input)
        .ok_or_else(|| DomainLookupError::invalid_input(input, "No hostname found"))?;
    validate_canonical(&domain).map_err(|reason| DomainLookupError::invalid_input(input, reason))?;
    Ok(domain)
}
