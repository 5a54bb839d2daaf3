//! Request Gatekeeper
//!
//! Decides what happens to an outbound request addressed to a mapped CDN:
//! ignored entirely (whitelisted initiator, non-GET), treated as a missing
//! resource, or accepted as a substitution candidate.

use crate::domain::domain_or_placeholder;
use crate::resolver::Resolver;
use crate::resource::DomainExceptions;
use crate::settings::Settings;
use crate::types::{LocalTarget, RequestDetails, RequestType, PLACEHOLDER_DOMAIN};

/// Why a request has no usable local substitute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissingReason {
    /// XHR from a page other than the self-test domain
    Xhr,
    /// Initiated from a site known to break under substitution
    DomainException,
    /// The URL does not resolve to any bundled resource
    NoTarget,
    /// The resolved resource is not part of the active environment
    NotInEnvironment,
}

/// Outcome of analyzing a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Candidacy {
    /// Not eligible for interception at all
    Ineligible,
    /// Eligible, but nothing local can be served
    Missing(MissingReason),
    /// Eligible and resolvable
    Candidate { target: LocalTarget, is_silent: bool },
}

/// Request analysis over a resolver and an exception list.
#[derive(Debug, Clone)]
pub struct Analyzer<'a> {
    resolver: Resolver<'a>,
    exceptions: &'a DomainExceptions,
    placeholder_domain: String,
}

impl Analyzer<'static> {
    /// Analyzer over the bundled tables.
    pub fn bundled() -> Self {
        Self::new(Resolver::bundled(), DomainExceptions::bundled())
    }
}

impl<'a> Analyzer<'a> {
    pub fn new(resolver: Resolver<'a>, exceptions: &'a DomainExceptions) -> Self {
        Self {
            resolver,
            exceptions,
            placeholder_domain: PLACEHOLDER_DOMAIN.to_string(),
        }
    }

    /// Use `domain` for tabs without a parseable domain.
    pub fn with_placeholder_domain(mut self, domain: impl Into<String>) -> Self {
        self.placeholder_domain = domain.into();
        self
    }

    pub fn resolver(&self) -> &Resolver<'a> {
        &self.resolver
    }

    /// Domain of the initiating tab, falling back to the placeholder.
    pub fn tab_domain(&self, tab_url: Option<&str>) -> String {
        domain_or_placeholder(tab_url, &self.placeholder_domain)
    }

    /// True iff the request may be intercepted at all.
    pub fn is_valid_candidate(&self, request: &RequestDetails, tab_url: Option<&str>, settings: &Settings) -> bool {
        let domain = self.tab_domain(tab_url);

        if settings.whitelist().is_whitelisted(&domain) {
            return false;
        }

        request.is_get()
    }

    /// Full gatekeeper decision for a request.
    pub fn analyze(&self, request: &RequestDetails, tab_url: Option<&str>, settings: &Settings) -> Candidacy {
        if !self.is_valid_candidate(request, tab_url, settings) {
            return Candidacy::Ineligible;
        }

        let domain = self.tab_domain(tab_url);
        let mut is_silent = false;

        if request.request_type().contains(RequestType::XMLHTTPREQUEST) {
            if domain != settings.xhr_test_domain() {
                return Candidacy::Missing(MissingReason::Xhr);
            }
            is_silent = true;
        }

        if self.exceptions.is_exception(&domain) {
            return Candidacy::Missing(MissingReason::DomainException);
        }

        let Some(target) = self.resolver.resolve(&request.url) else {
            return Candidacy::Missing(MissingReason::NoTarget);
        };

        if !settings.environment().manifest().contains(&target.path) {
            return Candidacy::Missing(MissingReason::NotInEnvironment);
        }

        Candidacy::Candidate { target, is_silent }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Map, Value};

    const JQUERY_364: &str = "https://ajax.googleapis.com/ajax/libs/jquery/3.6.4/jquery.min.js";

    fn request(url: &str, method: &str, resource_type: &str) -> RequestDetails {
        RequestDetails {
            request_id: "1".to_string(),
            url: url.to_string(),
            method: method.to_string(),
            tab_id: 1,
            frame_id: 0,
            resource_type: resource_type.to_string(),
        }
    }

    fn settings(local: Value) -> Settings {
        let local = match local {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        Settings::resolve(&local, &Map::new())
    }

    #[test]
    fn test_candidate() {
        let analyzer = Analyzer::bundled();
        let candidacy = analyzer.analyze(
            &request(JQUERY_364, "GET", "script"),
            Some("https://news.test/"),
            &Settings::default(),
        );

        match candidacy {
            Candidacy::Candidate { target, is_silent } => {
                assert_eq!(target.version, "3.6.4");
                assert!(target.path.contains("jquery"));
                assert!(!is_silent);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_whitelisted_and_non_get_are_ineligible() {
        let analyzer = Analyzer::bundled();
        let whitelisted = settings(json!({"whitelistedDomains": {"news.test": true}}));

        assert_eq!(
            analyzer.analyze(&request(JQUERY_364, "GET", "script"), Some("https://www.sub.news.test/"), &whitelisted),
            Candidacy::Ineligible
        );
        assert_eq!(
            analyzer.analyze(&request(JQUERY_364, "POST", "script"), Some("https://news.test/"), &Settings::default()),
            Candidacy::Ineligible
        );
    }

    #[test]
    fn test_unparseable_tab_uses_placeholder() {
        let analyzer = Analyzer::bundled();
        let request = request(JQUERY_364, "GET", "script");

        assert!(analyzer.is_valid_candidate(&request, None, &Settings::default()));

        let whitelisted = settings(json!({"whitelistedDomains": {"example.org": true}}));
        assert!(!analyzer.is_valid_candidate(&request, Some("chrome://newtab/"), &whitelisted));

        let custom = Analyzer::bundled().with_placeholder_domain("placeholder.test");
        assert!(custom.is_valid_candidate(&request, Some("chrome://newtab/"), &whitelisted));
    }

    #[test]
    fn test_xhr_only_on_test_domain() {
        let analyzer = Analyzer::bundled();
        let xhr = request(JQUERY_364, "GET", "xmlhttprequest");

        assert_eq!(
            analyzer.analyze(&xhr, Some("https://news.test/"), &Settings::default()),
            Candidacy::Missing(MissingReason::Xhr)
        );

        let candidacy = analyzer.analyze(&xhr, Some("https://surrogate-cdn.org/test"), &Settings::default());
        assert!(matches!(candidacy, Candidacy::Candidate { is_silent: true, .. }));
    }

    #[test]
    fn test_domain_exceptions() {
        let analyzer = Analyzer::bundled();
        let script = request(JQUERY_364, "GET", "script");

        assert_eq!(
            analyzer.analyze(&script, Some("https://accounts.google.com/"), &Settings::default()),
            Candidacy::Missing(MissingReason::DomainException)
        );
        assert_eq!(
            analyzer.analyze(&script, Some("https://news-test.translate.goog/"), &Settings::default()),
            Candidacy::Missing(MissingReason::DomainException)
        );
    }

    #[test]
    fn test_missing_targets() {
        let analyzer = Analyzer::bundled();

        let unknown = request("https://ajax.googleapis.com/ajax/libs/lodash/4.17.21/lodash.min.js", "GET", "script");
        assert_eq!(
            analyzer.analyze(&unknown, Some("https://news.test/"), &Settings::default()),
            Candidacy::Missing(MissingReason::NoTarget)
        );

        let unbundled = request("https://ajax.googleapis.com/ajax/libs/jquery/3.6.3/jquery.min.js", "GET", "script");
        assert_eq!(
            analyzer.analyze(&unbundled, Some("https://news.test/"), &Settings::default()),
            Candidacy::Missing(MissingReason::NotInEnvironment)
        );

        let staging = settings(json!({"enforceStaging": true}));
        assert!(matches!(
            analyzer.analyze(&unbundled, Some("https://news.test/"), &staging),
            Candidacy::Candidate { .. }
        ));
    }
}
