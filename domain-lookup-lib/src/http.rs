//! Shared HTTP client construction.

use crate::error::DomainLookupError;
use crate::types::LookupConfig;
use reqwest::Client;
use std::time::Duration;

/// Build the client shared by the bootstrap fetch, RDAP and WHOIS calls.
///
/// No client-wide timeout is set: each call site bounds its own request
/// with the timeout from [`LookupConfig`].
pub fn build_client(config: &LookupConfig) -> Result<Client, DomainLookupError> {
    Client::builder()
        .user_agent(config.user_agent.clone())
        .pool_idle_timeout(Duration::from_secs(90))
        .tcp_keepalive(Duration::from_secs(60))
        .tcp_nodelay(true)
        .use_rustls_tls()
        .build()
        .map_err(|e| DomainLookupError::network_with_source("Failed to create HTTP client", e.to_string()))
}
