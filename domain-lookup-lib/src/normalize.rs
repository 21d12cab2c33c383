//! Hostname canonicalization and root/subdomain splitting.
//!
//! Everything here is pure: no I/O, no allocation beyond the returned
//! strings. The root-domain heuristic uses a small static list of
//! multi-label public suffixes rather than the full public suffix list.

use crate::types::DomainParts;

/// Multi-label public suffixes under which registrations happen at the
/// third label (e.g. `example.co.uk`).
const MULTI_LABEL_SUFFIXES: &[&str] = &[
    "co.uk", "org.uk", "me.uk", "ltd.uk", "plc.uk", "net.uk", "ac.uk", "sch.uk", "police.uk",
    "com.au", "net.au", "org.au", "edu.au", "gov.au",
    "co.nz", "net.nz", "org.nz", "govt.nz",
    "co.za", "org.za", "net.za",
    "com.br", "net.br", "org.br",
    "co.jp", "ne.jp", "or.jp", "go.jp",
    "com.cn", "net.cn", "org.cn", "edu.cn",
    "com.mx", "net.mx", "org.mx",
];

/// Canonicalize a URL or hostname into a bare lowercase domain.
///
/// Strips a leading `http://`/`https://`, any `:port`, everything from the
/// first `/`, `?` or `#`, leading `www.` labels and trailing dots.
/// Returns `None` when nothing is left.
///
/// ```rust
/// use domain_lookup_lib::normalize;
///
/// assert_eq!(
///     normalize("https://WWW.Example.com:8080/path?q=1#f").as_deref(),
///     Some("example.com")
/// );
/// assert_eq!(normalize("   "), None);
/// ```
pub fn normalize(input: &str) -> Option<String> {
    let mut domain = input.trim();

    domain = strip_prefix_ignore_case(domain, "https://")
        .or_else(|| strip_prefix_ignore_case(domain, "http://"))
        .unwrap_or(domain)
        .trim_start();

    domain = domain.split(':').next().unwrap_or_default();
    domain = domain
        .split(['/', '?', '#'])
        .next()
        .unwrap_or_default();

    // Repeated so that "www.www.example.com" normalizes in one pass.
    while let Some(rest) = strip_prefix_ignore_case(domain, "www.") {
        domain = rest.trim_start();
    }

    let domain = domain
        .trim_end_matches(|c: char| c == '.' || c.is_whitespace())
        .to_lowercase();

    if domain.is_empty() {
        None
    } else {
        Some(domain)
    }
}

fn strip_prefix_ignore_case<'a>(value: &'a str, prefix: &str) -> Option<&'a str> {
    let head = value.get(..prefix.len())?;
    if head.eq_ignore_ascii_case(prefix) {
        value.get(prefix.len()..)
    } else {
        None
    }
}

/// The registrable root of a hostname.
///
/// `a.b.example.co.uk` → `example.co.uk`, `shop.example.com` → `example.com`.
/// Single-label input is returned as-is.
pub fn root_of(hostname: &str) -> Option<String> {
    let normalized = normalize(hostname)?;
    let labels: Vec<&str> = normalized.split('.').collect();

    if labels.len() >= 3 {
        let suffix = labels[labels.len() - 2..].join(".");
        if MULTI_LABEL_SUFFIXES.contains(&suffix.as_str()) {
            return Some(labels[labels.len() - 3..].join("."));
        }
    }

    if labels.len() >= 2 {
        return Some(labels[labels.len() - 2..].join("."));
    }

    Some(normalized)
}

/// True when the hostname has labels in front of its root.
pub fn is_subdomain(hostname: &str) -> bool {
    normalize(hostname) != root_of(hostname)
}

/// The labels in front of the root, e.g. `shop` for `shop.example.com`.
///
/// The root is removed as a whole trailing label sequence, so a root that
/// also appears earlier in the hostname is left alone there.
pub fn subdomain_part(hostname: &str) -> Option<String> {
    let normalized = normalize(hostname)?;
    let root = root_of(hostname)?;

    if normalized == root {
        return None;
    }

    normalized
        .strip_suffix(root.as_str())
        .and_then(|prefix| prefix.strip_suffix('.'))
        .filter(|prefix| !prefix.is_empty())
        .map(str::to_string)
}

/// Split a hostname into root domain and subdomain in one step.
pub fn split(hostname: &str) -> Option<DomainParts> {
    Some(DomainParts {
        root_domain: root_of(hostname)?,
        subdomain: subdomain_part(hostname),
    })
}

/// Reject canonical domains whose labels could not be a hostname.
///
/// Labels must be non-empty, at most 63 characters, and made of
/// alphanumerics, `-` or `_`.
pub(crate) fn validate_canonical(domain: &str) -> Result<(), String> {
    if domain.len() > 253 {
        return Err("Domain name longer than 253 characters".to_string());
    }

    for label in domain.split('.') {
        if label.is_empty() {
            return Err("Domain contains an empty label".to_string());
        }
        if label.len() > 63 {
            return Err(format!("Label '{}' is longer than 63 characters", label));
        }
        if !label
            .chars()
            .all(|c| c.is_alphanumeric() || c == '-' || c == '_')
        {
            return Err(format!("Label '{}' contains invalid characters", label));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_full_url() {
        assert_eq!(
            normalize("https://WWW.Example.com:8080/path?q=1#f").as_deref(),
            Some("example.com")
        );
        assert_eq!(normalize("http://example.org/").as_deref(), Some("example.org"));
        assert_eq!(normalize("HTTPS://Example.NET").as_deref(), Some("example.net"));
        assert_eq!(normalize("example.com?x=1").as_deref(), Some("example.com"));
        assert_eq!(normalize("example.com#top").as_deref(), Some("example.com"));
        assert_eq!(normalize("example.com.").as_deref(), Some("example.com"));
        assert_eq!(normalize("  shop.example.com  ").as_deref(), Some("shop.example.com"));
    }

    #[test]
    fn test_normalize_empty_input() {
        assert_eq!(normalize(""), None);
        assert_eq!(normalize("   "), None);
        assert_eq!(normalize("https://"), None);
        assert_eq!(normalize("www."), None);
        assert_eq!(normalize("/path/only"), None);
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let inputs = [
            "https://WWW.Example.com:8080/path?q=1#f",
            "www.www.example.com",
            "https:// example.com",
            "https:// www.example.com",
            "www. www.example.com",
            "example.com. .",
            "http://https://example.com",
            "https://www.https://x.org",
            "EXAMPLE.CO.UK...",
            "a.b.c.d.example.com/x",
            "localhost:3000",
            "xn--bcher-kva.example",
        ];

        for input in inputs {
            let once = normalize(input);
            let twice = once.as_deref().and_then(normalize);
            assert_eq!(once, twice, "normalize is not idempotent for {:?}", input);
        }
    }

    #[test]
    fn test_root_of() {
        assert_eq!(root_of("a.b.example.co.uk").as_deref(), Some("example.co.uk"));
        assert_eq!(root_of("example.com").as_deref(), Some("example.com"));
        assert_eq!(root_of("shop.example.com").as_deref(), Some("example.com"));
        assert_eq!(root_of("www.example.com.au").as_deref(), Some("example.com.au"));
        assert_eq!(root_of("co.uk").as_deref(), Some("co.uk"));
        assert_eq!(root_of("localhost").as_deref(), Some("localhost"));
        assert_eq!(root_of(""), None);
    }

    #[test]
    fn test_is_subdomain_agrees_with_root() {
        let inputs = [
            "example.com",
            "shop.example.com",
            "a.b.example.co.uk",
            "example.co.uk",
            "https://www.example.com/",
            "localhost",
            "",
        ];

        for input in inputs {
            assert_eq!(
                is_subdomain(input),
                normalize(input) != root_of(input),
                "disagreement for {:?}",
                input
            );
        }

        assert!(is_subdomain("shop.example.com"));
        assert!(!is_subdomain("www.example.com"));
    }

    #[test]
    fn test_subdomain_part() {
        assert_eq!(subdomain_part("shop.example.com").as_deref(), Some("shop"));
        assert_eq!(subdomain_part("example.com"), None);
        assert_eq!(subdomain_part("a.b.example.co.uk").as_deref(), Some("a.b"));
    }

    #[test]
    fn test_subdomain_part_root_repeated_inside_hostname() {
        // A substring replace would also eat the first "example.com".
        assert_eq!(
            subdomain_part("example.com.example.com").as_deref(),
            Some("example.com")
        );
        assert_eq!(
            subdomain_part("myexample.com.example.com").as_deref(),
            Some("myexample.com")
        );
    }

    #[test]
    fn test_split_reconstructs_hostname() {
        for input in ["shop.example.com", "example.com", "x.y.example.co.uk"] {
            let parts = split(input).unwrap();
            assert_eq!(parts.hostname(), normalize(input).unwrap());
            assert_eq!(parts.subdomain.is_none(), !is_subdomain(input));
        }
    }

    #[test]
    fn test_validate_canonical() {
        assert!(validate_canonical("example.com").is_ok());
        assert!(validate_canonical("_dmarc.example.com").is_ok());
        assert!(validate_canonical("bücher.de").is_ok());
        assert!(validate_canonical("localhost").is_ok());

        assert!(validate_canonical("exa mple.com").is_err());
        assert!(validate_canonical("example..com").is_err());
        assert!(validate_canonical(".example.com").is_err());
        assert!(validate_canonical(&format!("{}.com", "a".repeat(64))).is_err());
    }
}
