//! Settings, statistics and session state on top of the storage areas
//!
//! - Settings are cached after the first read and invalidated on every write.
//! - Statistics live in memory and are written back after a quiet period;
//!   readers always see the in-memory value.
//! - Tab contexts are kept in the session area under a single key and are
//!   always written as a whole.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::Utc;
use serde_json::{Map, Value};
use sg_core::{SettingError, SettingKey, Settings, Statistic, StatisticKey, Statistics, TabContext};
use tokio::task::JoinHandle;

use crate::area::StorageArea;
use crate::config::DEFAULT_STATISTICS_DEBOUNCE_MS;
use crate::error::{RuntimeError, StorageError};

const TAB_CONTEXTS_KEY: &str = "tabContexts";

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct Storage {
    local: Arc<dyn StorageArea>,
    managed: Arc<dyn StorageArea>,
    session: Arc<dyn StorageArea>,
    settings: Mutex<Option<Settings>>,
    statistics: Arc<Mutex<Option<Statistics>>>,
    pending_flush: Mutex<Option<JoinHandle<()>>>,
    debounce: Duration,
}

impl Storage {
    pub fn new(local: Arc<dyn StorageArea>, managed: Arc<dyn StorageArea>, session: Arc<dyn StorageArea>) -> Self {
        Self {
            local,
            managed,
            session,
            settings: Mutex::new(None),
            statistics: Arc::new(Mutex::new(None)),
            pending_flush: Mutex::new(None),
            debounce: Duration::from_millis(DEFAULT_STATISTICS_DEBOUNCE_MS),
        }
    }

    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    // =========================================================================
    // Settings
    // =========================================================================

    pub async fn get_settings(&self) -> Result<Settings, StorageError> {
        if let Some(settings) = lock(&self.settings).as_ref() {
            return Ok(settings.clone());
        }

        let local = self.local.get_all().await?;
        let managed = match self.managed.get_all().await {
            Ok(managed) => managed,
            Err(e) => {
                log::warn!("Ignoring managed settings: {e}");
                Map::new()
            }
        };

        let settings = Settings::resolve(&local, &managed);
        *lock(&self.settings) = Some(settings.clone());
        Ok(settings)
    }

    pub async fn get_setting(&self, name: &str) -> Result<Value, RuntimeError> {
        let key: SettingKey = name.parse()?;
        Ok(self.get_settings().await?.get(key).clone())
    }

    /// Store a local value and return the settings it results in.
    pub async fn update_setting(&self, name: &str, value: Value) -> Result<Settings, RuntimeError> {
        let key: SettingKey = name.parse()?;
        key.check_writable(&value)?;

        let mut items = Map::new();
        items.insert(key.to_string(), value);
        self.local.set(items).await?;

        self.invalidate_settings();
        Ok(self.get_settings().await?)
    }

    /// Drop the local value so the default applies again.
    pub async fn clear_setting(&self, name: &str) -> Result<Settings, RuntimeError> {
        let key: SettingKey = name.parse()?;
        if key.is_computed() {
            return Err(SettingError::ReadOnly(key.to_string()).into());
        }

        self.local.remove(key.as_str()).await?;

        self.invalidate_settings();
        Ok(self.get_settings().await?)
    }

    pub fn invalidate_settings(&self) {
        lock(&self.settings).take();
    }

    // =========================================================================
    // Statistics
    // =========================================================================

    async fn ensure_statistics(&self) -> Result<(), StorageError> {
        if lock(&self.statistics).is_some() {
            return Ok(());
        }

        let stored = self.local.get_all().await?;
        let loaded = Statistics::load(&stored, Utc::now());
        lock(&self.statistics).get_or_insert(loaded);
        Ok(())
    }

    pub async fn get_statistics(&self) -> Result<Statistics, StorageError> {
        self.ensure_statistics().await?;
        Ok(lock(&self.statistics).clone().unwrap_or_else(|| Statistics::new(Utc::now())))
    }

    pub async fn get_statistic(&self, name: &str) -> Result<Statistic, RuntimeError> {
        let key: StatisticKey = name.parse()?;
        Ok(self.get_statistics().await?.get(key))
    }

    /// Bump a counter in memory and schedule a write. Returns the new value.
    pub async fn increment_statistic(&self, key: StatisticKey) -> Result<u64, StorageError> {
        self.ensure_statistics().await?;

        let value = lock(&self.statistics)
            .get_or_insert_with(|| Statistics::new(Utc::now()))
            .increment(key);

        self.schedule_flush();
        Ok(value)
    }

    /// Restart a counter, removing its stored value.
    pub async fn clear_statistic(&self, name: &str) -> Result<(), RuntimeError> {
        let key: StatisticKey = name.parse()?;
        self.ensure_statistics().await?;

        let was_pending = self.cancel_flush();
        self.local.remove(key.as_str()).await?;

        if let Some(statistics) = lock(&self.statistics).as_mut() {
            statistics.reset(key, Utc::now());
        }

        if was_pending {
            self.schedule_flush();
        }

        Ok(())
    }

    /// Write the counters now, cancelling any scheduled write.
    pub async fn flush_statistics(&self) -> Result<(), StorageError> {
        self.cancel_flush();

        let Some(items) = snapshot(&self.statistics) else {
            return Ok(());
        };

        self.local.set(items).await
    }

    pub fn has_pending_flush(&self) -> bool {
        lock(&self.pending_flush)
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    fn cancel_flush(&self) -> bool {
        match lock(&self.pending_flush).take() {
            Some(handle) => {
                let pending = !handle.is_finished();
                handle.abort();
                pending
            }
            None => false,
        }
    }

    fn schedule_flush(&self) {
        let local = Arc::clone(&self.local);
        let statistics = Arc::clone(&self.statistics);
        let debounce = self.debounce;

        let mut pending = lock(&self.pending_flush);
        if let Some(handle) = pending.take() {
            handle.abort();
        }

        *pending = Some(tokio::spawn(async move {
            tokio::time::sleep(debounce).await;

            let Some(items) = snapshot(&statistics) else {
                return;
            };

            match local.set(items).await {
                Ok(()) => log::debug!("Flushed statistics"),
                Err(e) => log::warn!("Failed to flush statistics: {e}"),
            }
        }));
    }

    // =========================================================================
    // Tab Contexts
    // =========================================================================

    pub async fn load_tab_contexts(&self) -> Result<BTreeMap<i32, TabContext>, StorageError> {
        match self.session.get(TAB_CONTEXTS_KEY).await? {
            Some(value) => Ok(serde_json::from_value(value)?),
            None => Ok(BTreeMap::new()),
        }
    }

    pub async fn save_tab_contexts(&self, tabs: &BTreeMap<i32, TabContext>) -> Result<(), StorageError> {
        let mut items = Map::new();
        items.insert(TAB_CONTEXTS_KEY.to_string(), serde_json::to_value(tabs)?);
        self.session.set(items).await
    }
}

impl Drop for Storage {
    fn drop(&mut self) {
        if let Some(handle) = lock(&self.pending_flush).take() {
            handle.abort();
        }
    }
}

fn snapshot(statistics: &Mutex<Option<Statistics>>) -> Option<Map<String, Value>> {
    lock(statistics).as_ref().map(Statistics::to_map)
}
