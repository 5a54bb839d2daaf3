//! Target Resolver
//!
//! Maps a request URL to the bundled resource that can stand in for it.
//! Every step is first-match-wins over the mapping table's declaration order.

use crate::resource::{ResourceAliases, ResourceMappings};
use crate::types::LocalTarget;
use crate::url::{extract_host_with_port, extract_path, is_source_map};
use crate::version::{extract_version, substitute, templatize};

/// Resolves request URLs against a mapping table and its aliases.
#[derive(Debug, Clone, Copy)]
pub struct Resolver<'a> {
    mappings: &'a ResourceMappings,
    aliases: &'a ResourceAliases,
}

impl Default for Resolver<'static> {
    fn default() -> Self {
        Self::bundled()
    }
}

impl<'a> Resolver<'a> {
    pub fn new(mappings: &'a ResourceMappings, aliases: &'a ResourceAliases) -> Self {
        Self { mappings, aliases }
    }

    pub fn mappings(&self) -> &'a ResourceMappings {
        self.mappings
    }

    /// Resolve a full request URL.
    pub fn resolve(&self, url: &str) -> Option<LocalTarget> {
        let host = extract_host_with_port(url)?.to_ascii_lowercase();
        self.resolve_path(&host, extract_path(url))
    }

    /// Resolve a request already split into host and path.
    pub fn resolve_path(&self, host: &str, path: &str) -> Option<LocalTarget> {
        if is_source_map(path) {
            return None;
        }

        let base = self.mappings.host(host)?.match_base_path(path)?;

        let (pattern, url_version) = templatize(&path[base.path.len()..]);
        let mold = base.find_mold(&pattern)?;

        let target_path = match url_version {
            Some(version) => substitute(mold.target.path, version),
            None => mold.target.path.to_string(),
        };

        if let Some(alias) = self.aliases.lookup(host, &target_path) {
            return Some(LocalTarget {
                source: host.to_string(),
                version: alias.version.clone(),
                path: alias.path.clone(),
            });
        }

        // Pinned shorthand molds carry the version in their target path
        let version = url_version
            .or_else(|| extract_version(&target_path))
            .map(str::to_string)?;

        log::trace!("Resolved {host}{path} to {target_path}");

        Some(LocalTarget {
            source: host.to_string(),
            version,
            path: target_path,
        })
    }
}

impl Resolver<'static> {
    /// Resolver over the bundled mapping and alias tables.
    pub fn bundled() -> Self {
        Self::new(ResourceMappings::bundled(), ResourceAliases::bundled())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::version::VERSION_PLACEHOLDER;

    #[test]
    fn test_resolve_google_jquery() {
        let target = Resolver::bundled()
            .resolve("https://ajax.googleapis.com/ajax/libs/jquery/3.6.4/jquery.min.js")
            .unwrap();
        assert_eq!(target.source, "ajax.googleapis.com");
        assert_eq!(target.version, "3.6.4");
        assert_eq!(target.path, "resources/jquery/3.6.4/jquery.min.jsm");
    }

    #[test]
    fn test_resolve_ignores_query_and_case_of_host() {
        let target = Resolver::bundled()
            .resolve("https://CDNJS.cloudflare.com/ajax/libs/moment.js/2.29.4/moment.min.js?v=1")
            .unwrap();
        assert_eq!(target.source, "cdnjs.cloudflare.com");
        assert_eq!(target.path, "resources/moment.js/2.29.4/moment.min.jsm");
    }

    #[test]
    fn test_resolve_drops_default_port() {
        let resolver = Resolver::bundled();
        let target = resolver
            .resolve("https://ajax.googleapis.com:443/ajax/libs/jquery/3.6.4/jquery.min.js")
            .unwrap();
        assert_eq!(target.source, "ajax.googleapis.com");
        assert_eq!(target.version, "3.6.4");

        assert!(resolver
            .resolve("https://ajax.googleapis.com:8443/ajax/libs/jquery/3.6.4/jquery.min.js")
            .is_none());
    }

    #[test]
    fn test_resolve_rejects_source_maps() {
        let resolver = Resolver::bundled();
        assert!(resolver
            .resolve("https://ajax.googleapis.com/ajax/libs/jquery/3.6.4/jquery.min.map")
            .is_none());
        assert!(resolver
            .resolve("https://ajax.googleapis.com/ajax/libs/jquery/3.6.4/jquery.min.MAP")
            .is_none());
    }

    #[test]
    fn test_resolve_unknown_host_or_path() {
        let resolver = Resolver::bundled();
        assert!(resolver.resolve("https://example.com/jquery/3.6.4/jquery.min.js").is_none());
        assert!(resolver.resolve("https://ajax.googleapis.com/other/jquery/3.6.4/jquery.js").is_none());
        assert!(resolver.resolve("https://ajax.googleapis.com/ajax/libs/lodash/4.17.21/lodash.js").is_none());
        assert!(resolver.resolve("not a url").is_none());
    }

    #[test]
    fn test_resolve_alias_pins_version() {
        let target = Resolver::bundled()
            .resolve("https://ajax.googleapis.com/ajax/libs/jquery/1.8/jquery.min.js")
            .unwrap();
        assert_eq!(target.version, "1.8.3");
        assert_eq!(target.path, "resources/jquery/1.8.3/jquery.min.jsm");

        // No alias on other hosts, the abbreviated version is kept
        let target = Resolver::bundled()
            .resolve("https://cdnjs.cloudflare.com/ajax/libs/jquery/1.8/jquery.min.js")
            .unwrap();
        assert_eq!(target.version, "1.8");
    }

    #[test]
    fn test_resolve_shorthand_falls_back_to_target_version() {
        let target = Resolver::bundled()
            .resolve("https://ajax.googleapis.com/ajax/libs/jquery/1/jquery.min.js")
            .unwrap();
        assert_eq!(target.version, "1.11.1");
        assert_eq!(target.path, "resources/jquery/1.11.1/jquery.min.jsm");

        let target = Resolver::bundled()
            .resolve("https://code.jquery.com/jquery-latest.min.js")
            .unwrap();
        assert_eq!(target.version, "1.11.1");
    }

    #[test]
    fn test_resolve_code_jquery() {
        let target = Resolver::bundled()
            .resolve("https://code.jquery.com/jquery-3.7.1.min.js")
            .unwrap();
        assert_eq!(target.source, "code.jquery.com");
        assert_eq!(target.path, "resources/jquery/3.7.1/jquery.min.jsm");

        let target = Resolver::bundled()
            .resolve("https://code.jquery.com/ui/1.13.2/jquery-ui.min.js")
            .unwrap();
        assert_eq!(target.path, "resources/jqueryui/1.13.2/jquery-ui.min.jsm");
    }

    #[test]
    fn test_every_versioned_mold_keeps_embedded_version() {
        let resolver = Resolver::bundled();

        for mapping in resolver.mappings().hosts() {
            for base in &mapping.base_paths {
                for mold in base.molds.iter().filter(|m| m.pattern.contains(VERSION_PLACEHOLDER)) {
                    let path = format!("{}{}js", base.path, substitute(mold.pattern, "3.6.4"));
                    let target = resolver
                        .resolve_path(mapping.host, &path)
                        .unwrap_or_else(|| panic!("{}{} did not resolve", mapping.host, path));
                    assert_eq!(target.version, "3.6.4", "{}{}", mapping.host, path);
                    assert!(target.path.contains("3.6.4"));
                }
            }
        }
    }
}
