//! Statistics
//!
//! Three monotonically increasing counters, each stamped with the moment it
//! started counting. Counters persisted by older releases as bare numbers are
//! migrated on load with an unknown creation time.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::settings::SettingError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StatisticKey {
    AmountInjected,
    AmountSanitized,
    AmountBlocked,
}

impl StatisticKey {
    pub const ALL: [StatisticKey; 3] = [
        StatisticKey::AmountInjected,
        StatisticKey::AmountSanitized,
        StatisticKey::AmountBlocked,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StatisticKey::AmountInjected => "amountInjected",
            StatisticKey::AmountSanitized => "amountSanitized",
            StatisticKey::AmountBlocked => "amountBlocked",
        }
    }
}

impl fmt::Display for StatisticKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StatisticKey {
    type Err = SettingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|key| key.as_str() == s)
            .ok_or_else(|| SettingError::UnknownStatistic(s.to_string()))
    }
}

/// One counter in its persisted form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Statistic {
    pub value: u64,
    pub created_at: Option<DateTime<Utc>>,
}

impl Statistic {
    pub fn new(created_at: DateTime<Utc>) -> Self {
        Self {
            value: 0,
            created_at: Some(created_at),
        }
    }
}

/// In-memory counters, always holding every key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statistics {
    counters: BTreeMap<StatisticKey, Statistic>,
}

impl Statistics {
    /// Fresh counters created at `now`.
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            counters: StatisticKey::ALL
                .into_iter()
                .map(|key| (key, Statistic::new(now)))
                .collect(),
        }
    }

    /// Load counters from their stored form, defaulting missing or
    /// unreadable entries to fresh counters created at `now`.
    pub fn load(stored: &Map<String, Value>, now: DateTime<Utc>) -> Self {
        let mut statistics = Self::new(now);

        for key in StatisticKey::ALL {
            let statistic = match stored.get(key.as_str()) {
                Some(Value::Number(n)) => n.as_u64().map(|value| Statistic {
                    value,
                    created_at: None,
                }),
                Some(value) => serde_json::from_value(value.clone()).ok(),
                None => None,
            };

            match statistic {
                Some(statistic) => {
                    statistics.counters.insert(key, statistic);
                }
                None if stored.contains_key(key.as_str()) => {
                    log::warn!("Discarding unreadable statistic {key}");
                }
                None => {}
            }
        }

        statistics
    }

    pub fn get(&self, key: StatisticKey) -> Statistic {
        self.counters.get(&key).copied().unwrap_or(Statistic {
            value: 0,
            created_at: None,
        })
    }

    pub fn value(&self, key: StatisticKey) -> u64 {
        self.get(key).value
    }

    /// Increment a counter, returning its new value.
    pub fn increment(&mut self, key: StatisticKey) -> u64 {
        let statistic = self.counters.entry(key).or_insert(Statistic {
            value: 0,
            created_at: None,
        });
        statistic.value += 1;
        statistic.value
    }

    /// Restart a counter from zero.
    pub fn reset(&mut self, key: StatisticKey, now: DateTime<Utc>) {
        self.counters.insert(key, Statistic::new(now));
    }

    /// Stored form, one entry per key.
    pub fn to_map(&self) -> Map<String, Value> {
        self.counters
            .iter()
            .filter_map(|(key, statistic)| {
                serde_json::to_value(statistic)
                    .ok()
                    .map(|value| (key.to_string(), value))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 10, 10, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_unknown_statistic() {
        let err = "amountFetched".parse::<StatisticKey>().unwrap_err();
        assert_eq!(err.to_string(), "Statistic \"amountFetched\" does not exist.");
    }

    #[test]
    fn test_increment() {
        let mut statistics = Statistics::new(now());
        assert_eq!(statistics.increment(StatisticKey::AmountInjected), 1);
        assert_eq!(statistics.increment(StatisticKey::AmountInjected), 2);
        assert_eq!(statistics.value(StatisticKey::AmountBlocked), 0);
    }

    #[test]
    fn test_load_migrates_legacy_counter() {
        let stored = json!({
            "amountInjected": 42,
            "amountSanitized": {"value": 3, "createdAt": "2024-01-01T00:00:00Z"}
        });
        let statistics = Statistics::load(stored.as_object().unwrap(), now());

        let injected = statistics.get(StatisticKey::AmountInjected);
        assert_eq!(injected.value, 42);
        assert_eq!(injected.created_at, None);

        assert_eq!(statistics.value(StatisticKey::AmountSanitized), 3);

        let blocked = statistics.get(StatisticKey::AmountBlocked);
        assert_eq!(blocked.value, 0);
        assert_eq!(blocked.created_at, Some(now()));
    }

    #[test]
    fn test_to_map() {
        let mut statistics = Statistics::new(now());
        statistics.increment(StatisticKey::AmountSanitized);
        let map = statistics.to_map();

        assert_eq!(map["amountSanitized"]["value"], json!(1));
        assert_eq!(map["amountSanitized"]["createdAt"], json!("2024-10-10T12:00:00Z"));
        assert_eq!(map.len(), 3);
    }

    #[test]
    fn test_reset() {
        let mut statistics = Statistics::load(json!({"amountBlocked": 9}).as_object().unwrap(), now());
        statistics.reset(StatisticKey::AmountBlocked, now());
        assert_eq!(statistics.get(StatisticKey::AmountBlocked), Statistic::new(now()));
    }
}
