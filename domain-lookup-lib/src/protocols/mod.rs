//! Registry protocols.
//!
//! Endpoint resolution, the RDAP client and the WHOIS API fallback.

/// Zone → RDAP endpoint resolution and the IANA bootstrap cache
pub mod registry;

/// RDAP query and response normalization
pub mod rdap;

/// WHOIS HTTP API fallback
pub mod whois;

pub use rdap::{parse_entity, parse_response, parse_vcard, RdapClient};
pub use registry::{zone_of, BootstrapCache, RegistryBootstrap};
pub use whois::{map_whois_response, WhoisApiClient, WhoisSource};
