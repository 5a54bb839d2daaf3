//! Settings with provenance
//!
//! Stored settings come from two places: the user's local values and values
//! pushed by an administrator (managed). A managed value wins when it is
//! truthy. `environmentName` is derived from the other settings and can not
//! be written.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::domain::Whitelist;
use crate::resource::Environment;

/// Test domain for XHR self-tests unless configured otherwise.
pub const DEFAULT_XHR_TEST_DOMAIN: &str = "surrogate-cdn.org";

// =============================================================================
// Errors
// =============================================================================

/// Errors raised by the settings and statistics contract.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SettingError {
    #[error("Setting \"{0}\" does not exist.")]
    UnknownSetting(String),

    #[error("Statistic \"{0}\" does not exist.")]
    UnknownStatistic(String),

    #[error("Setting \"{0}\" is read-only.")]
    ReadOnly(String),

    #[error("Setting \"{key}\" expects {expected}.")]
    InvalidValue { key: String, expected: &'static str },
}

// =============================================================================
// Keys
// =============================================================================

/// Every known setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SettingKey {
    BlockMissing,
    DisablePrefetch,
    EnforceStaging,
    ShowIconBadge,
    ShowReleaseNotes,
    StripMetadata,
    WhitelistedDomains,
    XhrTestDomain,
    /// Computed from `blockMissing` and `enforceStaging`
    EnvironmentName,
}

impl SettingKey {
    pub const ALL: [SettingKey; 9] = [
        SettingKey::BlockMissing,
        SettingKey::DisablePrefetch,
        SettingKey::EnforceStaging,
        SettingKey::ShowIconBadge,
        SettingKey::ShowReleaseNotes,
        SettingKey::StripMetadata,
        SettingKey::WhitelistedDomains,
        SettingKey::XhrTestDomain,
        SettingKey::EnvironmentName,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SettingKey::BlockMissing => "blockMissing",
            SettingKey::DisablePrefetch => "disablePrefetch",
            SettingKey::EnforceStaging => "enforceStaging",
            SettingKey::ShowIconBadge => "showIconBadge",
            SettingKey::ShowReleaseNotes => "showReleaseNotes",
            SettingKey::StripMetadata => "stripMetadata",
            SettingKey::WhitelistedDomains => "whitelistedDomains",
            SettingKey::XhrTestDomain => "xhrTestDomain",
            SettingKey::EnvironmentName => "environmentName",
        }
    }

    pub fn is_computed(&self) -> bool {
        matches!(self, SettingKey::EnvironmentName)
    }

    /// Keys backed by storage, in declaration order.
    pub fn stored() -> impl Iterator<Item = SettingKey> {
        Self::ALL.into_iter().filter(|key| !key.is_computed())
    }

    /// Default value of a stored setting.
    pub fn default_value(&self) -> Value {
        match self {
            SettingKey::BlockMissing => Value::Bool(false),
            SettingKey::DisablePrefetch => Value::Bool(true),
            SettingKey::EnforceStaging => Value::Bool(false),
            SettingKey::ShowIconBadge => Value::Bool(true),
            SettingKey::ShowReleaseNotes => Value::Bool(true),
            SettingKey::StripMetadata => Value::Bool(true),
            SettingKey::WhitelistedDomains => Value::Object(Map::new()),
            SettingKey::XhrTestDomain => Value::String(DEFAULT_XHR_TEST_DOMAIN.to_string()),
            SettingKey::EnvironmentName => Value::String(Environment::Stable.as_str().to_string()),
        }
    }

    /// Reject writes this key can never accept.
    pub fn check_writable(&self, value: &Value) -> Result<(), SettingError> {
        let expected = match self {
            SettingKey::EnvironmentName => return Err(SettingError::ReadOnly(self.to_string())),
            SettingKey::WhitelistedDomains if !value.is_object() => "an object of domains",
            SettingKey::XhrTestDomain if !value.is_string() => "a domain string",
            SettingKey::WhitelistedDomains | SettingKey::XhrTestDomain => return Ok(()),
            _ if !value.is_boolean() => "a boolean",
            _ => return Ok(()),
        };

        Err(SettingError::InvalidValue {
            key: self.to_string(),
            expected,
        })
    }
}

impl fmt::Display for SettingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SettingKey {
    type Err = SettingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|key| key.as_str() == s)
            .ok_or_else(|| SettingError::UnknownSetting(s.to_string()))
    }
}

// =============================================================================
// Resolved Settings
// =============================================================================

/// Where a setting's effective value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    Local,
    Managed,
    Computed,
}

/// Effective value of a setting with its provenance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettingEntry {
    pub value: Value,
    pub origin: Origin,
}

/// A complete, resolved view of every setting.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    entries: BTreeMap<SettingKey, SettingEntry>,
}

impl Default for Settings {
    fn default() -> Self {
        Self::resolve(&Map::new(), &Map::new())
    }
}

impl Settings {
    /// Merge local and managed values over the defaults and derive computed
    /// settings. Unknown keys in either source are ignored.
    pub fn resolve(local: &Map<String, Value>, managed: &Map<String, Value>) -> Self {
        let mut entries = BTreeMap::new();

        for key in SettingKey::stored() {
            let entry = match managed.get(key.as_str()) {
                Some(value) if is_truthy(value) => SettingEntry {
                    value: value.clone(),
                    origin: Origin::Managed,
                },
                _ => SettingEntry {
                    value: local
                        .get(key.as_str())
                        .cloned()
                        .unwrap_or_else(|| key.default_value()),
                    origin: Origin::Local,
                },
            };
            entries.insert(key, entry);
        }

        let mut settings = Self { entries };
        let environment = Environment::select(settings.block_missing(), settings.enforce_staging());
        settings.entries.insert(
            SettingKey::EnvironmentName,
            SettingEntry {
                value: Value::String(environment.as_str().to_string()),
                origin: Origin::Computed,
            },
        );

        settings
    }

    pub fn entry(&self, key: SettingKey) -> Option<&SettingEntry> {
        self.entries.get(&key)
    }

    pub fn get(&self, key: SettingKey) -> &Value {
        static NULL: Value = Value::Null;
        self.entries.get(&key).map_or(&NULL, |entry| &entry.value)
    }

    /// Look a setting up by its storage name.
    pub fn get_by_name(&self, name: &str) -> Result<&Value, SettingError> {
        Ok(self.get(name.parse()?))
    }

    pub fn origin(&self, key: SettingKey) -> Option<Origin> {
        self.entries.get(&key).map(|entry| entry.origin)
    }

    fn is_true(&self, key: SettingKey) -> bool {
        self.get(key) == &Value::Bool(true)
    }

    pub fn block_missing(&self) -> bool {
        self.is_true(SettingKey::BlockMissing)
    }

    pub fn disable_prefetch(&self) -> bool {
        self.get(SettingKey::DisablePrefetch) != &Value::Bool(false)
    }

    pub fn enforce_staging(&self) -> bool {
        self.is_true(SettingKey::EnforceStaging)
    }

    pub fn show_icon_badge(&self) -> bool {
        self.is_true(SettingKey::ShowIconBadge)
    }

    pub fn show_release_notes(&self) -> bool {
        self.is_true(SettingKey::ShowReleaseNotes)
    }

    /// Metadata is stripped unless explicitly disabled.
    pub fn strip_metadata(&self) -> bool {
        self.get(SettingKey::StripMetadata) != &Value::Bool(false)
    }

    pub fn whitelist(&self) -> Whitelist {
        serde_json::from_value(self.get(SettingKey::WhitelistedDomains).clone()).unwrap_or_default()
    }

    pub fn xhr_test_domain(&self) -> &str {
        self.get(SettingKey::XhrTestDomain)
            .as_str()
            .unwrap_or(DEFAULT_XHR_TEST_DOMAIN)
    }

    pub fn environment(&self) -> Environment {
        self.get(SettingKey::EnvironmentName)
            .as_str()
            .and_then(|name| name.parse().ok())
            .unwrap_or_default()
    }

    /// Plain `key -> value` object.
    pub fn concise(&self) -> Map<String, Value> {
        self.entries
            .iter()
            .map(|(key, entry)| (key.to_string(), entry.value.clone()))
            .collect()
    }

    /// `key -> {value, origin}` object.
    pub fn detailed(&self) -> BTreeMap<String, SettingEntry> {
        self.entries
            .iter()
            .map(|(key, entry)| (key.to_string(), entry.clone()))
            .collect()
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0 && !n.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert!(!settings.block_missing());
        assert!(settings.disable_prefetch());
        assert!(settings.show_icon_badge());
        assert!(settings.strip_metadata());
        assert!(settings.whitelist().is_empty());
        assert_eq!(settings.xhr_test_domain(), DEFAULT_XHR_TEST_DOMAIN);
        assert_eq!(settings.environment(), Environment::Stable);
        assert_eq!(settings.origin(SettingKey::BlockMissing), Some(Origin::Local));
        assert_eq!(settings.origin(SettingKey::EnvironmentName), Some(Origin::Computed));
    }

    #[test]
    fn test_unknown_key_fails() {
        let err = "unknownKey".parse::<SettingKey>().unwrap_err();
        assert_eq!(err.to_string(), "Setting \"unknownKey\" does not exist.");
        assert!(Settings::default().get_by_name("unknownKey").is_err());
    }

    #[test]
    fn test_computed_key_is_read_only() {
        let err = SettingKey::EnvironmentName
            .check_writable(&json!("staging"))
            .unwrap_err();
        assert_eq!(err.to_string(), "Setting \"environmentName\" is read-only.");
    }

    #[test]
    fn test_check_writable_validates_types() {
        assert!(SettingKey::BlockMissing.check_writable(&json!(true)).is_ok());
        assert!(SettingKey::BlockMissing.check_writable(&json!("yes")).is_err());
        assert!(SettingKey::WhitelistedDomains.check_writable(&json!({"a.com": true})).is_ok());
        assert!(SettingKey::WhitelistedDomains.check_writable(&json!(["a.com"])).is_err());
        assert!(SettingKey::XhrTestDomain.check_writable(&json!("test.org")).is_ok());
        assert!(SettingKey::XhrTestDomain.check_writable(&json!(1)).is_err());
    }

    #[test]
    fn test_managed_overrides_only_when_truthy() {
        let local = object(json!({"blockMissing": true, "showIconBadge": false, "xhrTestDomain": "local.test"}));
        let managed = object(json!({"blockMissing": false, "showIconBadge": true, "xhrTestDomain": ""}));
        let settings = Settings::resolve(&local, &managed);

        assert!(settings.block_missing());
        assert_eq!(settings.origin(SettingKey::BlockMissing), Some(Origin::Local));

        assert!(settings.show_icon_badge());
        assert_eq!(settings.origin(SettingKey::ShowIconBadge), Some(Origin::Managed));

        assert_eq!(settings.xhr_test_domain(), "local.test");
    }

    #[test]
    fn test_environment_is_computed() {
        let settings = Settings::resolve(&object(json!({"enforceStaging": true})), &Map::new());
        assert_eq!(settings.environment(), Environment::Staging);
        assert_eq!(settings.get(SettingKey::EnvironmentName), &json!("staging"));

        let settings = Settings::resolve(&Map::new(), &object(json!({"blockMissing": true})));
        assert_eq!(settings.environment(), Environment::Staging);
    }

    #[test]
    fn test_whitelist_accessor() {
        let local = object(json!({"whitelistedDomains": {"Example.org": true}}));
        let settings = Settings::resolve(&local, &Map::new());
        assert!(settings.whitelist().is_whitelisted("shop.example.org"));
    }

    #[test]
    fn test_concise_and_detailed() {
        let settings = Settings::default();
        let concise = settings.concise();
        assert_eq!(concise.len(), SettingKey::ALL.len());
        assert_eq!(concise["environmentName"], json!("stable"));

        let detailed = serde_json::to_value(settings.detailed()).unwrap();
        assert_eq!(detailed["stripMetadata"], json!({"value": true, "origin": "local"}));
    }
}
