//! Error handling for domain lookup operations.
//!
//! This module defines the single error type that covers every way a lookup
//! can fail, from unparsable input through registry failures to the final
//! WHOIS fallback failing.

use std::time::Duration;
use thiserror::Error;

/// Main error type for domain lookup operations.
///
/// Variants fall into three groups: input errors that end a request
/// immediately, RDAP-side failures that trigger the WHOIS fallback, and the
/// terminal WHOIS failure. Storage and configuration errors are reported by
/// the helpers that own those concerns.
#[derive(Debug, Clone, Error)]
pub enum DomainLookupError {
    /// The input could not be turned into a domain name
    #[error("Invalid input '{input}': {reason}")]
    InvalidInput { input: String, reason: String },

    /// No RDAP service is known for the domain's zone
    #[error("No RDAP endpoint for '{domain}'{}", zone_suffix(.zone))]
    NoEndpoint {
        domain: String,
        zone: Option<String>,
    },

    /// An operation did not complete within its time budget
    #[error("Timeout after {duration:?} during: {operation}")]
    Timeout {
        operation: String,
        duration: Duration,
    },

    /// The registry answered with a non-success status other than 404
    #[error("RDAP query for '{domain}' failed: {status} {status_text}")]
    UpstreamError {
        domain: String,
        status: u16,
        status_text: String,
    },

    /// The registry answered 2xx but the body was unusable
    #[error("Malformed response: {message}")]
    MalformedResponse { message: String },

    /// Transport-level failures (connect, TLS, body read)
    #[error("Network error: {message}{}", detail_suffix(.detail))]
    Network {
        message: String,
        detail: Option<String>,
    },

    /// The WHOIS fallback failed; this is always terminal
    #[error("WHOIS lookup for '{domain}' failed: {message}{}", rdap_suffix(.rdap_error))]
    WhoisFailure {
        domain: String,
        message: String,
        rdap_error: Option<String>,
    },

    /// Persistent storage could not be read or written
    #[error("Storage error: {message}")]
    Storage { message: String },

    /// Invalid configuration values
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// File I/O errors when reading configuration
    #[error("File error at '{path}': {message}")]
    File { path: String, message: String },
}

fn zone_suffix(zone: &Option<String>) -> String {
    match zone {
        Some(zone) => format!(" (zone .{})", zone),
        None => String::new(),
    }
}

fn detail_suffix(detail: &Option<String>) -> String {
    match detail {
        Some(detail) => format!(" ({})", detail),
        None => String::new(),
    }
}

fn rdap_suffix(rdap_error: &Option<String>) -> String {
    match rdap_error {
        Some(rdap) => format!(" (after RDAP failure: {})", rdap),
        None => String::new(),
    }
}

impl DomainLookupError {
    /// Create a new invalid input error.
    pub fn invalid_input<I: Into<String>, R: Into<String>>(input: I, reason: R) -> Self {
        Self::InvalidInput {
            input: input.into(),
            reason: reason.into(),
        }
    }

    /// Create a new missing endpoint error.
    pub fn no_endpoint<D: Into<String>>(domain: D, zone: Option<String>) -> Self {
        Self::NoEndpoint {
            domain: domain.into(),
            zone,
        }
    }

    /// Create a new timeout error.
    pub fn timeout<O: Into<String>>(operation: O, duration: Duration) -> Self {
        Self::Timeout {
            operation: operation.into(),
            duration,
        }
    }

    /// Create a new upstream status error.
    pub fn upstream<D: Into<String>, T: Into<String>>(domain: D, status: u16, status_text: T) -> Self {
        Self::UpstreamError {
            domain: domain.into(),
            status,
            status_text: status_text.into(),
        }
    }

    /// Create a new malformed response error.
    pub fn malformed<M: Into<String>>(message: M) -> Self {
        Self::MalformedResponse {
            message: message.into(),
        }
    }

    /// Create a new network error.
    pub fn network<M: Into<String>>(message: M) -> Self {
        Self::Network {
            message: message.into(),
            detail: None,
        }
    }

    /// Create a new network error with source information.
    pub fn network_with_source<M: Into<String>, S: Into<String>>(message: M, source: S) -> Self {
        Self::Network {
            message: message.into(),
            detail: Some(source.into()),
        }
    }

    /// Create a new WHOIS failure.
    pub fn whois<D: Into<String>, M: Into<String>>(domain: D, message: M) -> Self {
        Self::WhoisFailure {
            domain: domain.into(),
            message: message.into(),
            rdap_error: None,
        }
    }

    /// Create a new storage error.
    pub fn storage<M: Into<String>>(message: M) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    /// Create a new configuration error.
    pub fn config<M: Into<String>>(message: M) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a new file error.
    pub fn file_error<P: Into<String>, M: Into<String>>(path: P, message: M) -> Self {
        Self::File {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Whether the orchestrator should fall back to WHOIS on this error.
    pub fn triggers_fallback(&self) -> bool {
        matches!(
            self,
            Self::NoEndpoint { .. }
                | Self::Timeout { .. }
                | Self::UpstreamError { .. }
                | Self::MalformedResponse { .. }
                | Self::Network { .. }
        )
    }

    /// Attach the RDAP failure that preceded a WHOIS failure.
    ///
    /// Other variants are returned unchanged.
    pub fn with_rdap_context(self, rdap: &DomainLookupError) -> Self {
        match self {
            Self::WhoisFailure {
                domain, message, ..
            } => Self::WhoisFailure {
                domain,
                message,
                rdap_error: Some(rdap.to_string()),
            },
            other => other,
        }
    }
}

impl From<reqwest::Error> for DomainLookupError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::network_with_source("HTTP request timed out", err.to_string())
        } else if err.is_connect() {
            Self::network_with_source("Connection failed", err.to_string())
        } else if err.is_decode() {
            Self::malformed(format!("Failed to decode body: {}", err))
        } else {
            Self::network_with_source("HTTP request failed", err.to_string())
        }
    }
}

impl From<serde_json::Error> for DomainLookupError {
    fn from(err: serde_json::Error) -> Self {
        Self::malformed(format!("JSON parsing failed: {}", err))
    }
}

impl From<std::io::Error> for DomainLookupError {
    fn from(err: std::io::Error) -> Self {
        Self::storage(format!("I/O error: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fallback_classification() {
        assert!(DomainLookupError::no_endpoint("a.zz", Some("zz".into())).triggers_fallback());
        assert!(DomainLookupError::timeout("RDAP", Duration::from_secs(1)).triggers_fallback());
        assert!(DomainLookupError::upstream("a.com", 503, "Service Unavailable").triggers_fallback());
        assert!(DomainLookupError::malformed("not json").triggers_fallback());
        assert!(DomainLookupError::network("reset").triggers_fallback());

        assert!(!DomainLookupError::invalid_input("", "empty").triggers_fallback());
        assert!(!DomainLookupError::whois("a.com", "HTTP 500").triggers_fallback());
        assert!(!DomainLookupError::storage("disk full").triggers_fallback());
    }

    #[test]
    fn test_display_messages() {
        let err = DomainLookupError::upstream("example.com", 502, "Bad Gateway");
        assert_eq!(
            err.to_string(),
            "RDAP query for 'example.com' failed: 502 Bad Gateway"
        );

        let err = DomainLookupError::no_endpoint("example.zz", Some("zz".to_string()));
        assert_eq!(err.to_string(), "No RDAP endpoint for 'example.zz' (zone .zz)");

        let err = DomainLookupError::network("reset");
        assert_eq!(err.to_string(), "Network error: reset");
    }

    #[test]
    fn test_whois_failure_carries_rdap_context() {
        let rdap = DomainLookupError::timeout("RDAP request", Duration::from_secs(10));
        let err = DomainLookupError::whois("example.com", "HTTP 500").with_rdap_context(&rdap);

        match &err {
            DomainLookupError::WhoisFailure { rdap_error, .. } => {
                assert!(rdap_error.as_deref().unwrap().contains("Timeout"));
            }
            other => panic!("unexpected variant: {:?}", other),
        }
        assert!(err.to_string().contains("after RDAP failure"));
    }

    #[test]
    fn test_rdap_context_ignored_for_other_variants() {
        let rdap = DomainLookupError::network("reset");
        let err = DomainLookupError::invalid_input("", "empty").with_rdap_context(&rdap);
        assert!(matches!(err, DomainLookupError::InvalidInput { .. }));
    }

    #[tokio::test]
    async fn test_reqwest_timeout_maps_to_network() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        // Accept the connection and never answer
        std::thread::spawn(move || {
            let _conn = listener.accept();
            std::thread::sleep(Duration::from_secs(5));
        });

        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(100))
            .build()
            .unwrap();
        let err: DomainLookupError = client
            .get(format!("http://{}/", addr))
            .send()
            .await
            .unwrap_err()
            .into();

        match &err {
            DomainLookupError::Network { message, .. } => {
                assert_eq!(message, "HTTP request timed out");
            }
            other => panic!("unexpected variant: {:?}", other),
        }
        assert!(err.triggers_fallback());
    }
}
