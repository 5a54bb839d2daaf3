//! Environment manifests
//!
//! The bundle ships two environments. `stable` holds the vetted copies;
//! `staging` is a superset carrying newer releases that are still being
//! audited. A resolved target is only served when its path is listed in the
//! active environment's manifest.

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};

use super::sets::{self, ResourceSet};
use crate::version::substitute;

/// A named set of bundled resource versions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Stable,
    Staging,
}

impl Environment {
    pub const ALL: [Environment; 2] = [Environment::Stable, Environment::Staging];

    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Stable => "stable",
            Environment::Staging => "staging",
        }
    }

    /// Environment selected by the strictness settings.
    pub fn select(block_missing: bool, enforce_staging: bool) -> Self {
        if block_missing || enforce_staging {
            Environment::Staging
        } else {
            Environment::Stable
        }
    }

    pub fn manifest(&self) -> &'static EnvironmentManifest {
        EnvironmentManifest::bundled(*self)
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "stable" => Ok(Environment::Stable),
            "staging" => Ok(Environment::Staging),
            other => Err(format!("Unknown environment: {other}")),
        }
    }
}

// =============================================================================
// Manifest
// =============================================================================

/// Versions bundled per resource set, with a path index for membership tests.
#[derive(Debug, Clone, Default)]
pub struct EnvironmentManifest {
    versions: BTreeMap<&'static str, Vec<&'static str>>,
    paths: HashSet<String>,
}

impl EnvironmentManifest {
    pub fn new() -> Self {
        Self::default()
    }

    /// The manifest shipped for `environment`.
    pub fn bundled(environment: Environment) -> &'static EnvironmentManifest {
        static STABLE: OnceLock<EnvironmentManifest> = OnceLock::new();
        static STAGING: OnceLock<EnvironmentManifest> = OnceLock::new();

        match environment {
            Environment::Stable => STABLE.get_or_init(|| build_manifest(STABLE_VERSIONS, &[])),
            Environment::Staging => STAGING.get_or_init(|| build_manifest(STABLE_VERSIONS, STAGING_VERSIONS)),
        }
    }

    /// Register `versions` of `set`.
    pub fn add(&mut self, set: &ResourceSet, versions: &[&'static str]) {
        let entry = self.versions.entry(set.name).or_default();
        for version in versions {
            if !entry.contains(version) {
                entry.push(version);
                self.paths.insert(substitute(set.path, version));
            }
        }
    }

    /// True iff the bundle-relative `path` is served in this environment.
    pub fn contains(&self, path: &str) -> bool {
        self.paths.contains(path)
    }

    /// Bundled versions of the set named `set`, in registration order.
    pub fn versions_of(&self, set: &str) -> &[&'static str] {
        self.versions.get(set).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.paths.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

type VersionTable = &'static [(ResourceSet, &'static [&'static str])];

fn build_manifest(base: VersionTable, extra: VersionTable) -> EnvironmentManifest {
    let mut manifest = EnvironmentManifest::new();
    for (set, versions) in base.iter().chain(extra) {
        manifest.add(set, versions);
    }
    manifest
}

const STABLE_VERSIONS: VersionTable = &[
    (sets::ANGULAR, &["1.0.1", "1.0.8", "1.2.32", "1.3.20", "1.4.14", "1.5.11", "1.6.10", "1.7.9", "1.8.2"]),
    (sets::BACKBONE, &["0.9.10", "1.0.0", "1.1.2", "1.2.3", "1.3.3", "1.4.0"]),
    (sets::DOJO, &["1.4.1", "1.5.0", "1.6.1", "1.7.4", "1.8.14", "1.9.11", "1.10.9"]),
    (sets::EMBER, &["1.0.0", "1.13.13", "2.18.2", "3.28.12"]),
    (sets::EXT_CORE, &["3.0.0", "3.1.0"]),
    (sets::JQUERY, &[
        "1.2.3", "1.2.6", "1.3.0", "1.3.1", "1.3.2", "1.4.0", "1.4.1", "1.4.2", "1.4.3", "1.4.4",
        "1.5.0", "1.5.1", "1.5.2", "1.6.0", "1.6.1", "1.6.2", "1.6.3", "1.6.4", "1.7.0", "1.7.1",
        "1.7.2", "1.8.0", "1.8.1", "1.8.2", "1.8.3", "1.9.0", "1.9.1", "1.10.0", "1.10.1", "1.10.2",
        "1.11.0", "1.11.1", "1.11.2", "1.11.3", "1.12.0", "1.12.4", "2.0.0", "2.0.3", "2.1.0", "2.1.1",
        "2.1.3", "2.1.4", "2.2.0", "2.2.4", "3.0.0", "3.1.0", "3.1.1", "3.2.0", "3.2.1", "3.3.0",
        "3.3.1", "3.4.0", "3.4.1", "3.5.0", "3.5.1", "3.6.0", "3.6.1", "3.6.4", "3.7.0", "3.7.1",
    ]),
    (sets::JQUERY_UI, &["1.8.24", "1.9.2", "1.10.4", "1.11.4", "1.12.1", "1.13.2"]),
    (sets::MODERNIZR, &["2.6.2", "2.8.3"]),
    (sets::MOMENT, &["2.10.6", "2.18.1", "2.24.0", "2.29.1", "2.29.4"]),
    (sets::MOOTOOLS, &["1.1.2", "1.2.5", "1.3.2", "1.4.5", "1.5.2", "1.6.0"]),
    (sets::PROTOTYPE_JS, &["1.6.1.0", "1.7.1.0", "1.7.2.0", "1.7.3.0"]),
    (sets::SCRIPTACULOUS, &["1.8.3", "1.9.0"]),
    (sets::SWFOBJECT, &["2.1", "2.2"]),
    (sets::UNDERSCORE, &["1.4.4", "1.8.3", "1.9.1", "1.13.4"]),
    (sets::WEBFONT, &["1.5.18", "1.6.28"]),
];

const STAGING_VERSIONS: VersionTable = &[
    (sets::ANGULAR, &["1.8.3"]),
    (sets::BACKBONE, &["1.4.1"]),
    (sets::JQUERY, &["3.6.2", "3.6.3"]),
    (sets::JQUERY_UI, &["1.13.3"]),
    (sets::MOMENT, &["2.30.1"]),
    (sets::UNDERSCORE, &["1.13.6"]),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_environment_select() {
        assert_eq!(Environment::select(false, false), Environment::Stable);
        assert_eq!(Environment::select(true, false), Environment::Staging);
        assert_eq!(Environment::select(false, true), Environment::Staging);
    }

    #[test]
    fn test_environment_parse() {
        assert_eq!("staging".parse::<Environment>(), Ok(Environment::Staging));
        assert!("beta".parse::<Environment>().is_err());
        assert_eq!(serde_json::to_string(&Environment::Stable).unwrap(), "\"stable\"");
    }

    #[test]
    fn test_manifest_contains() {
        let stable = Environment::Stable.manifest();
        assert!(stable.contains("resources/jquery/3.6.4/jquery.min.jsm"));
        assert!(!stable.contains("resources/jquery/3.6.3/jquery.min.jsm"));
        assert!(!stable.contains("resources/jquery/9.9.9/jquery.min.jsm"));

        let staging = Environment::Staging.manifest();
        assert!(staging.contains("resources/jquery/3.6.3/jquery.min.jsm"));
        assert!(staging.contains("resources/jquery/3.6.4/jquery.min.jsm"));
    }

    #[test]
    fn test_staging_is_superset_of_stable() {
        let stable = Environment::Stable.manifest();
        let staging = Environment::Staging.manifest();
        assert!(stable.paths().all(|path| staging.contains(path)));
        assert!(staging.len() > stable.len());
    }

    #[test]
    fn test_versions_of() {
        let staging = Environment::Staging.manifest();
        let versions = staging.versions_of("jQuery");
        assert_eq!(versions.first(), Some(&"1.2.3"));
        assert_eq!(versions.last(), Some(&"3.6.3"));
        assert!(staging.versions_of("unknown").is_empty());
    }

    #[test]
    fn test_pinned_shorthand_targets_are_bundled() {
        let stable = Environment::Stable.manifest();
        for path in [
            "resources/jquery/1.11.1/jquery.min.jsm",
            "resources/dojo/1.6.1/dojo/dojo.jsm",
            "resources/jqueryui/1.10.4/jquery-ui.min.jsm",
            "resources/mootools/1.1.2/mootools-yui-compressed.jsm",
            "resources/prototype/1.7.1.0/prototype.jsm",
            "resources/scriptaculous/1.9.0/scriptaculous.jsm",
            "resources/swfobject/2.2/swfobject.jsm",
            "resources/webfont/1.5.18/webfont.jsm",
        ] {
            assert!(stable.contains(path), "{path} missing");
        }
    }
}
