//! Domain exceptions
//!
//! Sites known to break when their CDN scripts are substituted. Requests
//! initiated from these domains are never intercepted, independent of the
//! user whitelist.

use std::collections::BTreeSet;
use std::sync::OnceLock;

use wildmatch::WildMatch;

/// Literal and wildcard initiator domains exempt from substitution.
#[derive(Debug, Clone, Default)]
pub struct DomainExceptions {
    literals: BTreeSet<String>,
    patterns: Vec<(String, WildMatch)>,
}

impl DomainExceptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// The exception list shipped with the agent.
    pub fn bundled() -> &'static DomainExceptions {
        static EXCEPTIONS: OnceLock<DomainExceptions> = OnceLock::new();
        EXCEPTIONS.get_or_init(|| {
            let mut exceptions = DomainExceptions::new();
            exceptions.add_literal("accounts.google.com");
            exceptions.add_literal("login.microsoftonline.com");
            exceptions.add_pattern("*.translate.goog");
            exceptions
        })
    }

    pub fn add_literal(&mut self, domain: &str) {
        self.literals.insert(domain.to_ascii_lowercase());
    }

    /// Add a `*`/`?` wildcard pattern matched against the whole domain.
    pub fn add_pattern(&mut self, pattern: &str) {
        let pattern = pattern.to_ascii_lowercase();
        let matcher = WildMatch::new(&pattern);
        self.patterns.push((pattern, matcher));
    }

    pub fn is_literal_exception(&self, domain: &str) -> bool {
        self.literals.contains(domain)
    }

    pub fn is_pattern_exception(&self, domain: &str) -> bool {
        self.patterns.iter().any(|(_, matcher)| matcher.matches(domain))
    }

    pub fn is_exception(&self, domain: &str) -> bool {
        self.is_literal_exception(domain) || self.is_pattern_exception(domain)
    }

    /// Initiator domains for the declarative exception rule.
    ///
    /// Rule initiator domains already cover subdomains, so a `*.suffix`
    /// pattern contributes `suffix`.
    pub fn rule_domains(&self) -> Vec<String> {
        let mut domains: BTreeSet<String> = self.literals.clone();
        for (pattern, _) in &self.patterns {
            let domain = pattern.trim_start_matches("*.");
            if !domain.contains(['*', '?']) {
                domains.insert(domain.to_string());
            }
        }
        domains.into_iter().collect()
    }
}
