//! Per-host aliases
//!
//! Some CDNs accept abbreviated versions (`jquery/1.8/jquery.min.js` serves
//! the newest 1.8.x). Those resolve to target paths that were never bundled;
//! an alias pins such a path to the concrete bundled version.

use std::collections::HashMap;
use std::sync::OnceLock;

use serde::Serialize;

use super::sets::{self, ResourceSet};
use crate::version::substitute;

/// Concrete replacement for an abbreviated target path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Alias {
    pub path: String,
    pub version: String,
}

/// Alias tables keyed by host, then by resolved target path.
#[derive(Debug, Clone, Default)]
pub struct ResourceAliases {
    hosts: HashMap<String, HashMap<String, Alias>>,
}

impl ResourceAliases {
    pub fn new() -> Self {
        Self::default()
    }

    /// The alias tables shipped with the agent.
    pub fn bundled() -> &'static ResourceAliases {
        static ALIASES: OnceLock<ResourceAliases> = OnceLock::new();
        ALIASES.get_or_init(bundled_aliases)
    }

    /// Pin `from` (a version as written in request URLs) to the bundled `to`
    /// version of `set` for requests addressed to `host`.
    pub fn pin(&mut self, host: &str, set: &ResourceSet, from: &str, to: &str) {
        self.hosts.entry(host.to_string()).or_default().insert(
            substitute(set.path, from),
            Alias {
                path: substitute(set.path, to),
                version: to.to_string(),
            },
        );
    }

    pub fn lookup(&self, host: &str, target_path: &str) -> Option<&Alias> {
        self.hosts.get(host)?.get(target_path)
    }

    /// Every alias registered for `host`, keyed by the path it replaces.
    pub fn for_host(&self, host: &str) -> impl Iterator<Item = (&str, &Alias)> {
        self.hosts
            .get(host)
            .into_iter()
            .flat_map(|aliases| aliases.iter().map(|(path, alias)| (path.as_str(), alias)))
    }
}

const GOOGLE_HOSTS: &[&str] = &["ajax.googleapis.com", "sdn.geekzu.org", "ajax.proxy.ustclug.org"];

const JQUERY_PINS: &[(&str, &str)] = &[
    ("1.2", "1.2.6"),
    ("1.3", "1.3.2"),
    ("1.4", "1.4.4"),
    ("1.5", "1.5.2"),
    ("1.6", "1.6.4"),
    ("1.7", "1.7.2"),
    ("1.8", "1.8.3"),
    ("1.9", "1.9.1"),
    ("1.10", "1.10.2"),
    ("1.11", "1.11.3"),
    ("2.0", "2.0.3"),
    ("2.1", "2.1.4"),
    ("2.2", "2.2.4"),
];

const JQUERY_UI_PINS: &[(&str, &str)] = &[
    ("1.8", "1.8.24"),
    ("1.9", "1.9.2"),
    ("1.10", "1.10.4"),
    ("1.11", "1.11.4"),
];

const ANGULAR_PINS: &[(&str, &str)] = &[("1.0", "1.0.8"), ("1.2", "1.2.32")];

fn bundled_aliases() -> ResourceAliases {
    let mut aliases = ResourceAliases::new();

    for host in GOOGLE_HOSTS {
        for (set, pins) in [
            (&sets::JQUERY, JQUERY_PINS),
            (&sets::JQUERY_UI, JQUERY_UI_PINS),
            (&sets::ANGULAR, ANGULAR_PINS),
        ] {
            for (from, to) in pins {
                aliases.pin(host, set, from, to);
            }
        }
    }

    aliases
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_pins_abbreviated_versions() {
        let aliases = ResourceAliases::bundled();
        let alias = aliases
            .lookup("ajax.googleapis.com", "resources/jquery/1.8/jquery.min.jsm")
            .unwrap();
        assert_eq!(alias.path, "resources/jquery/1.8.3/jquery.min.jsm");
        assert_eq!(alias.version, "1.8.3");
    }

    #[test]
    fn test_lookup_is_per_host() {
        let aliases = ResourceAliases::bundled();
        assert!(aliases
            .lookup("cdnjs.cloudflare.com", "resources/jquery/1.8/jquery.min.jsm")
            .is_none());
        assert!(aliases
            .lookup("sdn.geekzu.org", "resources/jquery/1.8/jquery.min.jsm")
            .is_some());
    }

    #[test]
    fn test_for_host() {
        let aliases = ResourceAliases::bundled();
        let count = aliases.for_host("ajax.googleapis.com").count();
        assert_eq!(count, JQUERY_PINS.len() + JQUERY_UI_PINS.len() + ANGULAR_PINS.len());
        assert_eq!(aliases.for_host("yandex.st").count(), 0);
    }
}
