//! Domain normalization and the user whitelist
//!
//! Whitelist membership is subdomain-inclusive: an entry `example.org`
//! exempts `example.org` itself and every `*.example.org`, but never a host
//! that merely shares the suffix (`evilexample.org`).
//!
//! # Examples
//!
//! ```
//! use sg_core::domain::{normalize_domain, Whitelist};
//!
//! assert_eq!(normalize_domain(" WWW.Example.ORG/ "), "example.org");
//!
//! let whitelist = Whitelist::from_domains(["example.org"]);
//! assert!(whitelist.is_whitelisted("cdn.example.org"));
//! assert!(!whitelist.is_whitelisted("evilexample.org"));
//! ```

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::url::{extract_host, extract_scheme, Scheme};

const WWW_PREFIX: &str = "www.";

// =============================================================================
// Normalization
// =============================================================================

/// Normalize a user- or browser-supplied domain.
///
/// Lowercases, trims, drops every character outside `[a-z0-9.-]` and strips
/// a single leading `www.`.
pub fn normalize_domain(domain: &str) -> String {
    let mut normalized: String = domain
        .trim()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '.' || *c == '-')
        .map(|c| c.to_ascii_lowercase())
        .collect();

    if normalized.starts_with(WWW_PREFIX) {
        normalized.drain(..WWW_PREFIX.len());
    }

    normalized
}

/// Extract the (normalized) domain of a page URL.
///
/// Browser-internal pages, unparseable URLs and URLs without a host have no
/// domain.
pub fn extract_domain_from_url(url: &str) -> Option<String> {
    extract_domain(url, true)
}

/// Extract the domain of a URL, optionally skipping normalization.
pub fn extract_domain(url: &str, normalize: bool) -> Option<String> {
    if extract_scheme(url) == Some(Scheme::Browser) {
        return None;
    }

    let host = extract_host(url)?;
    if host.is_empty() {
        return None;
    }

    if normalize {
        Some(normalize_domain(host))
    } else {
        Some(host.to_ascii_lowercase())
    }
}

/// Initiator domain for a tab, or the placeholder when it has none.
pub fn domain_or_placeholder(url: Option<&str>, placeholder: &str) -> String {
    url.and_then(extract_domain_from_url)
        .unwrap_or_else(|| placeholder.to_string())
}

// =============================================================================
// Whitelist
// =============================================================================

/// Set of normalized domains exempt from interception.
///
/// Persisted as a JSON object mapping each domain to `true`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    from = "BTreeMap<String, serde_json::Value>",
    into = "BTreeMap<String, bool>"
)]
pub struct Whitelist {
    domains: BTreeSet<String>,
}

impl Whitelist {
    /// Create an empty whitelist.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a whitelist from raw domains, normalizing each one.
    pub fn from_domains<I, S>(domains: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut whitelist = Self::new();
        for domain in domains {
            whitelist.insert(domain.as_ref());
        }
        whitelist
    }

    /// True iff `domain` equals an entry or is a subdomain of one.
    pub fn is_whitelisted(&self, domain: &str) -> bool {
        self.domains.iter().any(|entry| covers(entry, domain))
    }

    /// Add a domain. Returns false if it was already present or normalizes
    /// to nothing.
    pub fn insert(&mut self, domain: &str) -> bool {
        let domain = normalize_domain(domain);
        if domain.is_empty() {
            return false;
        }
        self.domains.insert(domain)
    }

    /// Remove every entry that covers `domain`.
    ///
    /// Since subdomains inherit exemptions, un-whitelisting a subdomain also
    /// removes the parent entry that exempted it. Returns the number of
    /// entries removed.
    pub fn remove_covering(&mut self, domain: &str) -> usize {
        let domain = normalize_domain(domain);
        let before = self.domains.len();
        self.domains.retain(|entry| !covers(entry, &domain));
        before - self.domains.len()
    }

    pub fn contains(&self, domain: &str) -> bool {
        self.domains.contains(domain)
    }

    pub fn domains(&self) -> impl Iterator<Item = &str> {
        self.domains.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.domains.len()
    }

    pub fn is_empty(&self) -> bool {
        self.domains.is_empty()
    }
}

#[inline]
fn covers(entry: &str, domain: &str) -> bool {
    domain == entry
        || (domain.len() > entry.len()
            && domain.ends_with(entry)
            && domain.as_bytes()[domain.len() - entry.len() - 1] == b'.')
}

impl From<BTreeMap<String, serde_json::Value>> for Whitelist {
    fn from(map: BTreeMap<String, serde_json::Value>) -> Self {
        Self::from_domains(map.keys())
    }
}

impl From<Whitelist> for BTreeMap<String, bool> {
    fn from(whitelist: Whitelist) -> Self {
        whitelist.domains.into_iter().map(|d| (d, true)).collect()
    }
}
