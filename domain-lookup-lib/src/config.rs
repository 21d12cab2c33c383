//! Configuration file parsing and management.
//!
//! This module handles loading configuration from TOML files and `DL_*`
//! environment variables, and merging configurations with proper
//! precedence rules.

use crate::error::DomainLookupError;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Configuration loaded from TOML files.
///
/// ```toml
/// [defaults]
/// timeout = "10s"
/// whois_fallback = true
///
/// [endpoints]
/// whois_api_url = "https://api.domaindetails.com/api/whois"
///
/// [cache]
/// ttl = "7d"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FileConfig {
    /// Default values for lookup options
    #[serde(skip_serializing_if = "Option::is_none")]
    pub defaults: Option<DefaultsConfig>,

    /// Upstream service locations
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoints: Option<EndpointsConfig>,

    /// Bootstrap cache settings
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache: Option<CacheConfig>,

    /// Output formatting preferences
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<OutputConfig>,
}

/// Default configuration values that map to CLI options.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DefaultsConfig {
    /// RDAP timeout (as string, e.g., "5s", "30s")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<String>,

    /// WHOIS API timeout
    #[serde(skip_serializing_if = "Option::is_none")]
    pub whois_timeout: Option<String>,

    /// Default WHOIS fallback setting
    #[serde(skip_serializing_if = "Option::is_none")]
    pub whois_fallback: Option<bool>,

    /// Default bootstrap setting
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bootstrap: Option<bool>,
}

/// Upstream endpoints.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct EndpointsConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bootstrap_url: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub whois_api_url: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
}

/// Bootstrap cache configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CacheConfig {
    /// Directory for the persisted bootstrap table
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dir: Option<String>,

    /// How long a fetched table stays fresh (e.g., "7d")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ttl: Option<String>,

    /// Persist the table to disk at all
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
}

/// Output formatting configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct OutputConfig {
    /// Print records as JSON by default
    #[serde(skip_serializing_if = "Option::is_none")]
    pub json: Option<bool>,

    /// Include the raw upstream payload in text output
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw: Option<bool>,
}

/// Configuration discovery and loading functionality.
pub struct ConfigManager {
    /// Whether to report which config files were loaded
    pub verbose: bool,
}

impl ConfigManager {
    /// Create a new configuration manager.
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }

    /// Load configuration from a specific file.
    ///
    /// The file is parsed and validated; a missing file is an error.
    pub fn load_file<P: AsRef<Path>>(&self, path: P) -> Result<FileConfig, DomainLookupError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(DomainLookupError::file_error(
                path.to_string_lossy(),
                "Configuration file not found",
            ));
        }

        let content = fs::read_to_string(path).map_err(|e| {
            DomainLookupError::file_error(
                path.to_string_lossy(),
                format!("Failed to read configuration file: {}", e),
            )
        })?;

        let config: FileConfig = toml::from_str(&content).map_err(|e| {
            DomainLookupError::config(format!("Failed to parse TOML configuration: {}", e))
        })?;

        self.validate_config(&config)?;

        debug!(path = %path.display(), "Loaded configuration file");
        Ok(config)
    }

    /// Discover and load configuration files in precedence order.
    ///
    /// XDG config is lowest, then the home directory, then the current
    /// directory. Files that fail to load are skipped with a warning.
    pub fn discover_and_load(&self) -> Result<FileConfig, DomainLookupError> {
        let mut merged_config = FileConfig::default();
        let mut loaded_files = Vec::new();

        let candidates = [
            self.get_xdg_config_path(),
            self.get_global_config_path(),
            self.get_local_config_path(),
        ];

        for path in candidates.into_iter().flatten() {
            match self.load_file(&path) {
                Ok(config) => {
                    merged_config = self.merge_configs(merged_config, config);
                    loaded_files.push(path);
                }
                Err(e) => warn!(path = %path.display(), error = %e, "Ignoring configuration file"),
            }
        }

        if self.verbose && !loaded_files.is_empty() {
            for path in &loaded_files {
                info!(path = %path.display(), "Using configuration file");
            }
        }

        Ok(merged_config)
    }

    /// Get the local configuration file path.
    fn get_local_config_path(&self) -> Option<PathBuf> {
        let candidates = ["./domain-lookup.toml", "./.domain-lookup.toml"];

        candidates
            .iter()
            .map(Path::new)
            .find(|path| path.exists())
            .map(Path::to_path_buf)
    }

    /// Get the global configuration file path from the home directory.
    fn get_global_config_path(&self) -> Option<PathBuf> {
        let home = env::var_os("HOME")?;
        [".domain-lookup.toml", "domain-lookup.toml"]
            .iter()
            .map(|candidate| Path::new(&home).join(candidate))
            .find(|path| path.exists())
    }

    /// Get the XDG configuration file path.
    fn get_xdg_config_path(&self) -> Option<PathBuf> {
        let config_dir = env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| env::var_os("HOME").map(|home| Path::new(&home).join(".config")))?;

        let path = config_dir.join("domain-lookup").join("config.toml");
        if path.exists() {
            Some(path)
        } else {
            None
        }
    }

    /// Merge two configurations with proper precedence.
    ///
    /// Values from `higher` take precedence over values from `lower`.
    pub fn merge_configs(&self, lower: FileConfig, higher: FileConfig) -> FileConfig {
        FileConfig {
            defaults: merge_section(lower.defaults, higher.defaults, |lower, higher| {
                DefaultsConfig {
                    timeout: higher.timeout.or(lower.timeout),
                    whois_timeout: higher.whois_timeout.or(lower.whois_timeout),
                    whois_fallback: higher.whois_fallback.or(lower.whois_fallback),
                    bootstrap: higher.bootstrap.or(lower.bootstrap),
                }
            }),
            endpoints: merge_section(lower.endpoints, higher.endpoints, |lower, higher| {
                EndpointsConfig {
                    bootstrap_url: higher.bootstrap_url.or(lower.bootstrap_url),
                    whois_api_url: higher.whois_api_url.or(lower.whois_api_url),
                    user_agent: higher.user_agent.or(lower.user_agent),
                }
            }),
            cache: merge_section(lower.cache, higher.cache, |lower, higher| CacheConfig {
                dir: higher.dir.or(lower.dir),
                ttl: higher.ttl.or(lower.ttl),
                enabled: higher.enabled.or(lower.enabled),
            }),
            output: merge_section(lower.output, higher.output, |lower, higher| OutputConfig {
                json: higher.json.or(lower.json),
                raw: higher.raw.or(lower.raw),
            }),
        }
    }

    /// Validate a configuration for common issues.
    fn validate_config(&self, config: &FileConfig) -> Result<(), DomainLookupError> {
        if let Some(defaults) = &config.defaults {
            validate_duration("defaults.timeout", defaults.timeout.as_deref())?;
            validate_duration("defaults.whois_timeout", defaults.whois_timeout.as_deref())?;
        }

        if let Some(endpoints) = &config.endpoints {
            validate_url("endpoints.bootstrap_url", endpoints.bootstrap_url.as_deref())?;
            validate_url("endpoints.whois_api_url", endpoints.whois_api_url.as_deref())?;

            if matches!(&endpoints.user_agent, Some(ua) if ua.trim().is_empty()) {
                return Err(DomainLookupError::config(
                    "endpoints.user_agent cannot be empty",
                ));
            }
        }

        if let Some(cache) = &config.cache {
            validate_duration("cache.ttl", cache.ttl.as_deref())?;
        }

        Ok(())
    }
}

fn merge_section<T>(lower: Option<T>, higher: Option<T>, merge: impl FnOnce(T, T) -> T) -> Option<T> {
    match (lower, higher) {
        (Some(lower), Some(higher)) => Some(merge(lower, higher)),
        (lower, higher) => higher.or(lower),
    }
}

fn validate_duration(field: &str, value: Option<&str>) -> Result<(), DomainLookupError> {
    match value {
        Some(s) if parse_duration_string(s).is_none() => Err(DomainLookupError::config(format!(
            "Invalid {} '{}'. Use format like '10s', '2m', '7d'",
            field, s
        ))),
        _ => Ok(()),
    }
}

fn validate_url(field: &str, value: Option<&str>) -> Result<(), DomainLookupError> {
    match value {
        Some(url) if !(url.starts_with("https://") || url.starts_with("http://")) => {
            Err(DomainLookupError::config(format!(
                "Invalid {} '{}'. Must be an http(s) URL",
                field, url
            )))
        }
        _ => Ok(()),
    }
}

/// Environment variable configuration that mirrors CLI options.
///
/// This represents configuration values that can be set via `DL_*`
/// environment variables.
#[derive(Debug, Clone, Default)]
pub struct EnvConfig {
    pub timeout: Option<Duration>,
    pub whois_timeout: Option<Duration>,
    pub whois_fallback: Option<bool>,
    pub bootstrap: Option<bool>,
    pub bootstrap_url: Option<String>,
    pub whois_api_url: Option<String>,
    pub cache_dir: Option<String>,
    pub cache_ttl: Option<Duration>,
    pub json: Option<bool>,
    pub config: Option<String>,
}

/// Load configuration from the process environment.
///
/// Invalid values are logged as warnings and ignored.
pub fn load_env_config(verbose: bool) -> EnvConfig {
    load_env_config_from(|name| env::var(name).ok(), verbose)
}

/// Load `DL_*` configuration through `lookup` instead of the process
/// environment.
pub fn load_env_config_from<F>(lookup: F, verbose: bool) -> EnvConfig
where
    F: Fn(&str) -> Option<String>,
{
    let text = |name: &str| {
        let value = lookup(name).filter(|v| !v.trim().is_empty())?;
        if verbose {
            info!("Using {}={}", name, value);
        }
        Some(value)
    };

    let flag = |name: &str| {
        let value = lookup(name)?;
        match value.to_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Some(true),
            "false" | "0" | "no" | "off" => Some(false),
            _ => {
                warn!("Invalid {}='{}', use true/false", name, value);
                None
            }
        }
    };

    let duration = |name: &str| {
        let value = lookup(name)?;
        let parsed = parse_duration_string(&value);
        if parsed.is_none() {
            warn!("Invalid {}='{}', use format like '10s', '2m', '7d'", name, value);
        }
        parsed
    };

    EnvConfig {
        timeout: duration("DL_TIMEOUT"),
        whois_timeout: duration("DL_WHOIS_TIMEOUT"),
        whois_fallback: flag("DL_WHOIS_FALLBACK"),
        bootstrap: flag("DL_BOOTSTRAP"),
        bootstrap_url: text("DL_BOOTSTRAP_URL"),
        whois_api_url: text("DL_WHOIS_API_URL"),
        cache_dir: text("DL_CACHE_DIR"),
        cache_ttl: duration("DL_CACHE_TTL"),
        json: flag("DL_JSON"),
        config: text("DL_CONFIG"),
    }
}

/// Parse a duration like "500ms", "10s", "2m", "1h" or "7d".
///
/// A bare number is taken as seconds. Zero is rejected.
///
/// ```rust
/// use domain_lookup_lib::parse_duration_string;
/// use std::time::Duration;
///
/// assert_eq!(parse_duration_string("2m"), Some(Duration::from_secs(120)));
/// assert_eq!(parse_duration_string("soon"), None);
/// ```
pub fn parse_duration_string(value: &str) -> Option<Duration> {
    let value = value.trim().to_lowercase();

    let (number, unit_secs) = if let Some(ms) = value.strip_suffix("ms") {
        let millis = ms.trim().parse::<u64>().ok()?;
        return (millis > 0).then(|| Duration::from_millis(millis));
    } else if let Some(n) = value.strip_suffix('s') {
        (n, 1)
    } else if let Some(n) = value.strip_suffix('m') {
        (n, 60)
    } else if let Some(n) = value.strip_suffix('h') {
        (n, 3600)
    } else if let Some(n) = value.strip_suffix('d') {
        (n, 86_400)
    } else {
        (value.as_str(), 1)
    };

    let secs = number.trim().parse::<u64>().ok()?.checked_mul(unit_secs)?;
    (secs > 0).then(|| Duration::from_secs(secs))
}
