//! Domain normalization
//!
//! Commands may carry full URLs (`https://www.youtube.com/watch?v=..`) or bare
//! hosts (`Reddit.com`). Everything is reduced to a lowercase registrable host
//! without the `www.` prefix before rules are generated; the rule pair built
//! for each domain covers `www.` again through the subdomain pattern.

use crate::error::{Error, Result};
use std::collections::BTreeSet;

/// Reduce a URL or host to the bare domain used for rule generation
pub fn normalize_domain(input: &str) -> Result<String> {
    let invalid = |reason| Error::InvalidDomain {
        input: input.to_string(),
        reason,
    };

    let mut host = input.trim();

    if let Some((_, rest)) = host.split_once("://") {
        host = rest;
    }

    // Cut path, query and fragment
    if let Some(pos) = host.find(&['/', '?', '#'][..]) {
        host = &host[..pos];
    }

    // Drop credentials and port
    if let Some((_, rest)) = host.rsplit_once('@') {
        host = rest;
    }
    if let Some((name, port)) = host.rsplit_once(':') {
        if port.chars().all(|c| c.is_ascii_digit()) {
            host = name;
        }
    }

    let mut host = host.trim_end_matches('.').to_lowercase();
    if let Some(stripped) = host.strip_prefix("www.") {
        host = stripped.to_string();
    }

    if host.is_empty() {
        return Err(invalid("empty host"));
    }
    if host.starts_with('.') || host.starts_with('-') || host.contains("..") {
        return Err(invalid("malformed label"));
    }
    if !host
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '.')
    {
        return Err(invalid("unsupported character"));
    }

    Ok(host)
}

/// Normalize a list of sites, dropping duplicates
///
/// Entries that fail to normalize are skipped with a warning. An error is
/// returned only when nothing usable is left.
pub fn normalize_domains<I, S>(inputs: I) -> Result<BTreeSet<String>>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut domains = BTreeSet::new();

    for input in inputs {
        match normalize_domain(input.as_ref()) {
            Ok(domain) => {
                domains.insert(domain);
            }
            Err(e) => tracing::warn!("Skipping site: {}", e),
        }
    }

    if domains.is_empty() {
        return Err(Error::invalid_command("no valid domains"));
    }

    Ok(domains)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bare_domain() {
        assert_eq!(normalize_domain("example.com").unwrap(), "example.com");
        assert_eq!(normalize_domain("  Reddit.COM ").unwrap(), "reddit.com");
    }

    #[test]
    fn test_strips_www() {
        assert_eq!(normalize_domain("www.youtube.com").unwrap(), "youtube.com");
        assert_eq!(
            normalize_domain("https://www.youtube.com/watch?v=abc").unwrap(),
            "youtube.com"
        );
    }

    #[test]
    fn test_url_parts_removed() {
        assert_eq!(
            normalize_domain("http://user:pw@news.ycombinator.com:8080/item?id=1").unwrap(),
            "news.ycombinator.com"
        );
        assert_eq!(normalize_domain("twitter.com/home").unwrap(), "twitter.com");
        assert_eq!(normalize_domain("example.com.").unwrap(), "example.com");
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(normalize_domain("").is_err());
        assert!(normalize_domain("https://").is_err());
        assert!(normalize_domain("*.example.com").is_err());
        assert!(normalize_domain("exa mple.com").is_err());
        assert!(normalize_domain("a..b").is_err());
    }

    #[test]
    fn test_normalize_domains_dedups() {
        let domains =
            normalize_domains(["youtube.com", "https://www.youtube.com/", "reddit.com"]).unwrap();
        assert_eq!(domains.len(), 2);
        assert!(domains.contains("youtube.com"));
        assert!(domains.contains("reddit.com"));
    }

    #[test]
    fn test_normalize_domains_all_invalid() {
        assert!(normalize_domains(["", "  "]).is_err());
        assert!(normalize_domains(Vec::<String>::new()).is_err());
    }
}
