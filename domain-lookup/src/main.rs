//! Domain Lookup CLI Application
//!
//! A command-line interface for registry lookups using RDAP with WHOIS fallback.
//! This CLI application provides a user-friendly interface to the domain-lookup-lib library.

mod ui;

use clap::builder::styling::{AnsiColor, Effects, Styles};
use clap::Parser;
use domain_lookup_lib::{load_env_config, parse_duration_string, ConfigManager, FileConfig};
use domain_lookup_lib::{root_of, FileStore, KeyValueStore, MemoryStore};
use domain_lookup_lib::{LookupConfig, LookupOrchestrator, LookupRecord};
use std::io::BufRead;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

const STYLES: Styles = Styles::styled()
    .header(AnsiColor::Yellow.on_default().effects(Effects::BOLD))
    .usage(AnsiColor::Yellow.on_default().effects(Effects::BOLD))
    .literal(AnsiColor::Green.on_default().effects(Effects::BOLD))
    .placeholder(AnsiColor::Cyan.on_default());

/// CLI arguments for domain-lookup
#[derive(Parser, Debug)]
#[command(name = "domain-lookup")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(author = "Sai Dutt G.V <gvs46@protonmail.com>")]
#[command(about = "Look up domain registration data using RDAP with WHOIS fallback")]
#[command(
    long_about = "Look up domain registration data using RDAP with automatic WHOIS fallback.\n\nAccepts bare domains, hostnames or full URLs. The registry for each domain is\nresolved from built-in endpoints or the IANA bootstrap registry, which is cached on disk."
)]
#[command(styles = STYLES)]
pub struct Args {
    /// Domains, hostnames or URLs to look up
    #[arg(value_name = "INPUTS", help_heading = "Input")]
    pub inputs: Vec<String>,

    /// Also read inputs from stdin (one per line)
    #[arg(long = "stdin", help_heading = "Input")]
    pub stdin: bool,

    /// Look up the root domain of each input instead of the full hostname
    #[arg(long = "root", help_heading = "Input")]
    pub root: bool,

    /// Output results in JSON format
    #[arg(short = 'j', long = "json", help_heading = "Output")]
    pub json: bool,

    /// Include the raw registry payload in the output
    #[arg(long = "raw", help_heading = "Output")]
    pub raw: bool,

    /// Show lookup decisions and timings on stderr
    #[arg(short = 'v', long = "verbose", help_heading = "Output")]
    pub verbose: bool,

    /// Use only built-in registry endpoints
    #[arg(long = "no-bootstrap", help_heading = "Protocol")]
    pub no_bootstrap: bool,

    /// Disable the WHOIS fallback
    #[arg(long = "no-whois", help_heading = "Protocol")]
    pub no_whois: bool,

    /// RDAP request timeout (e.g. 10s, 2m, 500ms)
    #[arg(long = "timeout", value_name = "DURATION", value_parser = parse_duration_arg, help_heading = "Protocol")]
    pub timeout: Option<Duration>,

    /// WHOIS API request timeout
    #[arg(long = "whois-timeout", value_name = "DURATION", value_parser = parse_duration_arg, help_heading = "Protocol")]
    pub whois_timeout: Option<Duration>,

    /// IANA bootstrap registry URL
    #[arg(long = "bootstrap-url", value_name = "URL", help_heading = "Protocol")]
    pub bootstrap_url: Option<String>,

    /// WHOIS API URL
    #[arg(long = "whois-api-url", value_name = "URL", help_heading = "Protocol")]
    pub whois_api_url: Option<String>,

    /// Configuration file (overrides discovery)
    #[arg(
        short = 'c',
        long = "config",
        value_name = "FILE",
        help_heading = "Configuration"
    )]
    pub config: Option<String>,

    /// Directory for the bootstrap cache
    #[arg(long = "cache-dir", value_name = "DIR", help_heading = "Configuration")]
    pub cache_dir: Option<PathBuf>,

    /// Keep the bootstrap cache in memory only
    #[arg(long = "no-cache", help_heading = "Configuration")]
    pub no_cache: bool,
}

/// Everything the run needs after file, environment and CLI have been merged.
#[derive(Debug, Clone)]
struct Settings {
    lookup: LookupConfig,
    cache_dir: Option<PathBuf>,
    cache_enabled: bool,
    json: bool,
    raw: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            lookup: LookupConfig::default(),
            cache_dir: None,
            cache_enabled: true,
            json: false,
            raw: false,
        }
    }
}

fn parse_duration_arg(value: &str) -> Result<Duration, String> {
    parse_duration_string(value)
        .ok_or_else(|| format!("invalid duration '{}', use a format like 10s, 2m or 500ms", value))
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    // Validate arguments
    if let Err(e) = validate_args(&args) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }

    init_logging(args.verbose);

    match run_lookups(args).await {
        Ok(true) => {}
        Ok(false) => process::exit(1),
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    }
}

fn validate_args(args: &Args) -> Result<(), String> {
    if args.inputs.is_empty() && !args.stdin {
        return Err("You must specify at least one domain, or pass --stdin".to_string());
    }

    if args.no_cache && args.cache_dir.is_some() {
        return Err("Cannot specify both --cache-dir and --no-cache".to_string());
    }

    for url in [&args.bootstrap_url, &args.whois_api_url].into_iter().flatten() {
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(format!("Invalid URL '{}': must start with http:// or https://", url));
        }
    }

    Ok(())
}

/// Install the stderr subscriber. `RUST_LOG` wins over `--verbose`.
fn init_logging(verbose: bool) {
    let default_filter = if verbose {
        "domain_lookup=debug,domain_lookup_lib=debug"
    } else {
        "warn"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_level(true)
        .try_init();
}

/// Look up every input in order. Returns `Ok(false)` when any lookup failed.
async fn run_lookups(args: Args) -> Result<bool, Box<dyn std::error::Error>> {
    let settings = build_settings(&args)?;
    let inputs = collect_inputs(&args)?;

    if inputs.is_empty() {
        return Err("No domains to look up".into());
    }

    let store = open_store(&settings);
    let orchestrator = LookupOrchestrator::with_config(settings.lookup.clone(), store)?;

    let mut records: Vec<LookupRecord> = Vec::new();
    let mut failures = 0usize;

    for input in &inputs {
        let target = if args.root {
            match root_of(input) {
                Some(root) => root,
                None => {
                    failures += 1;
                    eprintln!("Error: '{}' has no root domain", input);
                    continue;
                }
            }
        } else {
            input.clone()
        };

        let started = std::time::Instant::now();
        match orchestrator.lookup(&target).await {
            Ok(record) => {
                debug!(
                    "Looked up {} in {}ms via {}",
                    record.domain,
                    started.elapsed().as_millis(),
                    record.method
                );
                if !settings.json {
                    if !records.is_empty() {
                        println!();
                    }
                    ui::print_record(&record, settings.raw);
                }
                records.push(record);
            }
            Err(e) => {
                failures += 1;
                eprintln!("Error: {}", e);
            }
        }
    }

    if settings.json {
        display_json_results(&records, settings.raw)?;
    }

    Ok(failures == 0)
}

/// Build the run settings.
///
/// Precedence: config file (explicit `--config`, then `DL_CONFIG`, then
/// discovery) < `DL_*` environment < CLI flags.
fn build_settings(args: &Args) -> Result<Settings, Box<dyn std::error::Error>> {
    let mut settings = Settings::default();
    let config_manager = ConfigManager::new(args.verbose);
    let env_config_path = std::env::var("DL_CONFIG")
        .ok()
        .filter(|p| !p.trim().is_empty());

    if let Some(explicit_config_path) = args.config.as_ref().or(env_config_path.as_ref()) {
        debug!("Using config file: {}", explicit_config_path);

        let file_config = config_manager
            .load_file(explicit_config_path)
            .map_err(|e| {
                format!(
                    "Failed to load config file '{}': {}",
                    explicit_config_path, e
                )
            })?;

        settings = merge_file_config(settings, file_config);
    } else {
        match config_manager.discover_and_load() {
            Ok(file_config) => {
                settings = merge_file_config(settings, file_config);
            }
            Err(e) => debug!("Config discovery: {}", e),
        }
    }

    settings = apply_environment_config(settings, args.verbose);
    settings = apply_cli_args(settings, args);

    Ok(settings)
}

fn merge_file_config(mut settings: Settings, file_config: FileConfig) -> Settings {
    if let Some(defaults) = file_config.defaults {
        if let Some(timeout) = defaults.timeout.as_deref().and_then(parse_duration_string) {
            settings.lookup.rdap_timeout = timeout;
        }
        if let Some(timeout) = defaults
            .whois_timeout
            .as_deref()
            .and_then(parse_duration_string)
        {
            settings.lookup.whois_timeout = timeout;
        }
        if let Some(whois_fallback) = defaults.whois_fallback {
            settings.lookup.enable_whois_fallback = whois_fallback;
        }
        if let Some(bootstrap) = defaults.bootstrap {
            settings.lookup.enable_bootstrap = bootstrap;
        }
    }

    if let Some(endpoints) = file_config.endpoints {
        if let Some(url) = endpoints.bootstrap_url {
            settings.lookup.bootstrap_url = url;
        }
        if let Some(url) = endpoints.whois_api_url {
            settings.lookup.whois_api_url = url;
        }
        if let Some(user_agent) = endpoints.user_agent {
            settings.lookup.user_agent = user_agent;
        }
    }

    if let Some(cache) = file_config.cache {
        if let Some(dir) = cache.dir {
            settings.cache_dir = Some(PathBuf::from(dir));
        }
        if let Some(ttl) = cache.ttl.as_deref().and_then(parse_duration_string) {
            settings.lookup.bootstrap_ttl = ttl;
        }
        if let Some(enabled) = cache.enabled {
            settings.cache_enabled = enabled;
        }
    }

    if let Some(output) = file_config.output {
        if let Some(json) = output.json {
            settings.json = json;
        }
        if let Some(raw) = output.raw {
            settings.raw = raw;
        }
    }

    settings
}

/// Apply `DL_*` environment variables on top of the file configuration.
fn apply_environment_config(mut settings: Settings, verbose: bool) -> Settings {
    let env_config = load_env_config(verbose);

    if let Some(timeout) = env_config.timeout {
        settings.lookup.rdap_timeout = timeout;
    }
    if let Some(timeout) = env_config.whois_timeout {
        settings.lookup.whois_timeout = timeout;
    }
    if let Some(whois_fallback) = env_config.whois_fallback {
        settings.lookup.enable_whois_fallback = whois_fallback;
    }
    if let Some(bootstrap) = env_config.bootstrap {
        settings.lookup.enable_bootstrap = bootstrap;
    }
    if let Some(url) = env_config.bootstrap_url {
        settings.lookup.bootstrap_url = url;
    }
    if let Some(url) = env_config.whois_api_url {
        settings.lookup.whois_api_url = url;
    }
    if let Some(dir) = env_config.cache_dir {
        settings.cache_dir = Some(PathBuf::from(dir));
    }
    if let Some(ttl) = env_config.cache_ttl {
        settings.lookup.bootstrap_ttl = ttl;
    }
    if let Some(json) = env_config.json {
        settings.json = json;
    }

    settings
}

/// Apply CLI arguments (highest precedence).
///
/// Boolean flags only ever switch a setting on or off; their absence leaves
/// file and environment values alone.
fn apply_cli_args(mut settings: Settings, args: &Args) -> Settings {
    if let Some(timeout) = args.timeout {
        settings.lookup.rdap_timeout = timeout;
    }
    if let Some(timeout) = args.whois_timeout {
        settings.lookup.whois_timeout = timeout;
    }
    if args.no_bootstrap {
        settings.lookup.enable_bootstrap = false;
    }
    if args.no_whois {
        settings.lookup.enable_whois_fallback = false;
    }
    if let Some(url) = &args.bootstrap_url {
        settings.lookup.bootstrap_url = url.clone();
    }
    if let Some(url) = &args.whois_api_url {
        settings.lookup.whois_api_url = url.clone();
    }
    if let Some(dir) = &args.cache_dir {
        settings.cache_dir = Some(dir.clone());
        settings.cache_enabled = true;
    }
    if args.no_cache {
        settings.cache_enabled = false;
    }
    if args.json {
        settings.json = true;
    }
    if args.raw {
        settings.raw = true;
    }

    settings
}

/// Gather inputs from the command line and, with `--stdin`, from stdin.
///
/// Blank lines and `#` comments are skipped.
fn collect_inputs(args: &Args) -> Result<Vec<String>, Box<dyn std::error::Error>> {
    let mut inputs: Vec<String> = args
        .inputs
        .iter()
        .map(|i| i.trim().to_string())
        .filter(|i| !i.is_empty())
        .collect();

    if args.stdin {
        let stdin = std::io::stdin();
        inputs.extend(read_inputs(stdin.lock())?);
    }

    Ok(inputs)
}

fn read_inputs<R: BufRead>(reader: R) -> Result<Vec<String>, std::io::Error> {
    let mut inputs = Vec::new();

    for line in reader.lines() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        // Allow trailing comments: "example.com  # work"
        let input = trimmed.split('#').next().unwrap_or("").trim();
        if !input.is_empty() {
            inputs.push(input.to_string());
        }
    }

    Ok(inputs)
}

/// Pick the bootstrap cache store: a file store when caching is enabled and
/// a directory is known, memory otherwise.
fn open_store(settings: &Settings) -> Arc<dyn KeyValueStore> {
    if !settings.cache_enabled {
        debug!("Bootstrap cache kept in memory (cache disabled)");
        return Arc::new(MemoryStore::new());
    }

    match settings.cache_dir.clone().or_else(FileStore::default_dir) {
        Some(dir) => {
            debug!("Bootstrap cache directory: {}", dir.display());
            Arc::new(FileStore::new(dir))
        }
        None => {
            warn!("No cache directory available, bootstrap cache kept in memory");
            Arc::new(MemoryStore::new())
        }
    }
}

/// Display results in JSON format.
///
/// A single record is printed as an object, several as an array.
fn display_json_results(
    records: &[LookupRecord],
    raw: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let values = records
        .iter()
        .map(|record| record_to_json(record, raw))
        .collect::<Result<Vec<_>, _>>()?;

    let json = match values.as_slice() {
        [single] => serde_json::to_string_pretty(single)?,
        _ => serde_json::to_string_pretty(&values)?,
    };
    println!("{}", json);
    Ok(())
}

fn record_to_json(record: &LookupRecord, raw: bool) -> Result<serde_json::Value, serde_json::Error> {
    let mut value = serde_json::to_value(record)?;
    if !raw {
        if let Some(object) = value.as_object_mut() {
            object.remove("rawData");
        }
    }
    Ok(value)
}
