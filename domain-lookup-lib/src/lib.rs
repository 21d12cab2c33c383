//! # Domain Lookup Library
//!
//! Registration data for any hostname: resolve the authoritative registry,
//! query it over RDAP, and fall back to a WHOIS API when RDAP is not
//! available. Both paths produce the same [`LookupRecord`].
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use domain_lookup_lib::LookupOrchestrator;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let orchestrator = LookupOrchestrator::new()?;
//!     let record = orchestrator.lookup("https://www.example.com/").await?;
//!
//!     println!("{}: registrar {:?}", record.domain, record.registrar);
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - **Normalization**: URLs, ports, paths and `www.` prefixes reduced to a canonical domain
//! - **Registry resolution**: Built-in endpoints plus the cached IANA bootstrap registry
//! - **RDAP**: Structured registration data with contacts and events
//! - **WHOIS Fallback**: Automatic fallback when RDAP is unsupported or fails

// Re-export main public API types and functions
pub use config::{
    load_env_config, load_env_config_from, parse_duration_string, CacheConfig, ConfigManager,
    DefaultsConfig, EndpointsConfig, EnvConfig, FileConfig, OutputConfig,
};
pub use error::DomainLookupError;
pub use http::build_client;
pub use lookup::LookupOrchestrator;
pub use normalize::{is_subdomain, normalize, root_of, split, subdomain_part};
pub use protocols::registry::{static_registry, BOOTSTRAP_STORAGE_KEY, EXPIRY_STORAGE_KEY};
pub use protocols::{
    map_whois_response, parse_entity, parse_response, parse_vcard, zone_of, BootstrapCache,
    RdapClient, RegistryBootstrap, WhoisApiClient, WhoisSource,
};
pub use storage::{FileStore, KeyValueStore, MemoryStore};
pub use types::{
    Contact, DomainParts, LookupConfig, LookupMethod, LookupRecord, ParsedEntity, RdapEvent,
    DEFAULT_BOOTSTRAP_URL, DEFAULT_WHOIS_API_URL,
};

// Internal modules - these are not part of the public API
mod config;
mod error;
mod http;
mod lookup;
mod normalize;
mod protocols;
mod storage;
mod types;

// Type alias for convenience
pub type Result<T> = std::result::Result<T, DomainLookupError>;

// Library version and metadata
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const AUTHOR: &str = env!("CARGO_PKG_AUTHORS");

/// Get library information for debugging or display purposes.
pub fn info() -> LibraryInfo {
    LibraryInfo {
        version: VERSION,
        author: AUTHOR,
        features: get_enabled_features(),
    }
}

/// Information about the library build and features
#[derive(Debug, Clone)]
pub struct LibraryInfo {
    pub version: &'static str,
    pub author: &'static str,
    pub features: Vec<&'static str>,
}

/// Get list of enabled features at compile time
#[allow(clippy::vec_init_then_push)]
fn get_enabled_features() -> Vec<&'static str> {
    let mut features = vec!["rdap"];

    #[cfg(feature = "whois")]
    features.push("whois");

    #[cfg(feature = "bootstrap")]
    features.push("bootstrap");

    features
}
