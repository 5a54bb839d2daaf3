//! Interception coordinator
//!
//! Owns all request and tab state and reacts to browser events:
//!
//! ```text
//! before-request ──▶ analyze ──▶ pending context ──┬─ completed ──▶ tab injection
//!                                                   └─ error ──────▶ discarded
//! ```
//!
//! Setting changes made through the coordinator are followed by the rule,
//! ruleset and view updates they imply.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use serde_json::Value;
use sg_core::resource::DomainExceptions;
use sg_core::types::{MAIN_FRAME_ID, TAB_ID_NONE};
use sg_core::url::extract_host;
use sg_core::{
    extract_domain_from_url, Analyzer, Candidacy, Promotion, RequestContext, RequestDetails, RequestType,
    SettingKey, Settings, StateTracker, Statistic, StatisticKey, Statistics, TabContext, Whitelist,
};

use crate::applier::RuleApplier;
use crate::area::{JsonFileArea, MemoryArea, StorageArea};
use crate::config::RuntimeConfig;
use crate::error::{RuntimeError, StorageError};
use crate::rule_engine::RuleEngine;
use crate::storage::Storage;
use crate::view::View;

const LOCAL_AREA_FILE: &str = "local.json";

pub struct Coordinator {
    storage: Storage,
    applier: RuleApplier,
    view: Arc<dyn View>,
    analyzer: Analyzer<'static>,
    state: Mutex<StateTracker>,
    /// Held for a whole whitelist read, change, persist and rule update
    whitelist_lock: tokio::sync::Mutex<()>,
}

impl Coordinator {
    pub fn new(storage: Storage, engine: Arc<dyn RuleEngine>, view: Arc<dyn View>) -> Self {
        Self {
            storage,
            applier: RuleApplier::new(engine),
            view,
            analyzer: Analyzer::bundled(),
            state: Mutex::new(StateTracker::new()),
            whitelist_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Build a coordinator with the storage areas described by `config`.
    pub fn from_config(config: &RuntimeConfig, engine: Arc<dyn RuleEngine>, view: Arc<dyn View>) -> Result<Self, RuntimeError> {
        let local: Arc<dyn StorageArea> = match &config.state_dir {
            Some(dir) => Arc::new(JsonFileArea::new(local_area_path(dir))),
            None => Arc::new(MemoryArea::new()),
        };
        let managed = Arc::new(MemoryArea::read_only("managed", config.load_managed_settings()?));

        let storage = Storage::new(local, managed, Arc::new(MemoryArea::new()))
            .with_debounce(config.statistics_debounce());

        let mut coordinator = Self::new(storage, engine, view);
        coordinator.analyzer = Analyzer::bundled().with_placeholder_domain(config.placeholder_domain.clone());
        Ok(coordinator)
    }

    fn state(&self) -> MutexGuard<'_, StateTracker> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    pub fn applier(&self) -> &RuleApplier {
        &self.applier
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Pick up tabs that were open before the coordinator started and bring
    /// every rule group in line with the stored settings.
    pub async fn start<I>(&self, tabs: I) -> Result<(), RuntimeError>
    where
        I: IntoIterator<Item = (i32, Option<String>)>,
    {
        let tabs: Vec<_> = tabs.into_iter().collect();
        let stored = self.storage.load_tab_contexts().await?;
        let settings = self.storage.get_settings().await?;
        let whitelist = settings.whitelist();

        for (tab, url) in &tabs {
            if let Some(url) = url {
                self.view
                    .render_initial_tab_state(*tab, url, is_url_whitelisted(&whitelist, url), false);
            }
        }

        let snapshot = {
            let mut state = self.state();
            state.replace_tab_contexts(stored);
            state.create_tab_contexts(tabs, false);
            state.tab_contexts().clone()
        };
        self.storage.save_tab_contexts(&snapshot).await?;

        self.applier.apply_domain_exceptions(DomainExceptions::bundled()).await?;
        self.applier.apply_settings(&settings).await?;

        log::info!(
            "Coordinator started with {} tabs in the {} environment",
            snapshot.len(),
            settings.environment()
        );
        Ok(())
    }

    pub async fn on_tab_created(&self, tab: i32, url: Option<String>) -> Result<(), RuntimeError> {
        let snapshot = {
            let mut state = self.state();
            state.create_tab_contexts([(tab, url)], true);
            state.tab_contexts().clone()
        };
        Ok(self.storage.save_tab_contexts(&snapshot).await?)
    }

    pub async fn on_tab_removed(&self, tab: i32) -> Result<(), RuntimeError> {
        let snapshot = {
            let mut state = self.state();
            if state.remove_tab_context(tab).is_none() {
                return Ok(());
            }
            state.tab_contexts().clone()
        };
        Ok(self.storage.save_tab_contexts(&snapshot).await?)
    }

    // =========================================================================
    // Requests
    // =========================================================================

    /// True if `url` points at a CDN host from the mapping table.
    pub fn is_mapped_host(&self, url: &str) -> bool {
        extract_host(url)
            .map(str::to_ascii_lowercase)
            .is_some_and(|host| self.analyzer.resolver().mappings().host(&host).is_some())
    }

    /// Decide what happens to an outbound request and track candidates.
    pub async fn on_before_request(&self, request: &RequestDetails) -> Result<Candidacy, RuntimeError> {
        if request.request_type().contains(RequestType::MAIN_FRAME) {
            self.update_tab_url(request.tab_id, &request.url).await?;
        }

        if !self.is_mapped_host(&request.url) {
            return Ok(Candidacy::Ineligible);
        }

        let settings = self.storage.get_settings().await?;
        let tab_url = self.tab_url(request.tab_id);
        let candidacy = self.analyzer.analyze(request, tab_url.as_deref(), &settings);

        match &candidacy {
            Candidacy::Candidate { target, is_silent } => {
                log::debug!("Request {} resolves to {}", request.request_id, target.path);
                self.state().create_request_context(
                    &request.request_id,
                    RequestContext {
                        tab_identifier: request.tab_id,
                        target_details: target.clone(),
                        is_silent: *is_silent,
                    },
                );
            }
            Candidacy::Missing(reason) => {
                log::debug!("Request {} has no local target: {reason:?}", request.request_id);
                if settings.block_missing() {
                    self.storage.increment_statistic(StatisticKey::AmountBlocked).await?;
                }
            }
            Candidacy::Ineligible => {
                log::debug!("Request {} is not eligible", request.request_id);
            }
        }

        Ok(candidacy)
    }

    /// Promote a completed request into its tab's injections.
    pub async fn on_request_completed(&self, request_id: &str) -> Result<Promotion, RuntimeError> {
        let (promotion, snapshot) = {
            let mut state = self.state();
            let promotion = state.register_injection(request_id, Utc::now());
            let snapshot = matches!(promotion, Promotion::Injected { .. }).then(|| state.tab_contexts().clone());
            (promotion, snapshot)
        };

        if let Promotion::Injected {
            tab_identifier,
            injection_count,
            ..
        } = &promotion
        {
            self.storage.increment_statistic(StatisticKey::AmountInjected).await?;

            if let Some(count) = injection_count {
                let show_badge = self.storage.get_settings().await?.show_icon_badge();
                self.view.render_injection_count(*tab_identifier, *count, show_badge);
            }
        }

        if let Some(snapshot) = snapshot {
            self.storage.save_tab_contexts(&snapshot).await?;
        }

        Ok(promotion)
    }

    /// Forget a failed request. Returns true if it was being tracked.
    pub fn on_request_error(&self, request_id: &str) -> bool {
        self.state().delete_request_context(request_id).is_some()
    }

    /// Count a request whose identifying headers are stripped.
    pub async fn on_before_send_headers(&self, request: &RequestDetails) -> Result<bool, RuntimeError> {
        if !self.is_mapped_host(&request.url) {
            return Ok(false);
        }

        if !self.storage.get_settings().await?.strip_metadata() {
            return Ok(false);
        }

        self.storage.increment_statistic(StatisticKey::AmountSanitized).await?;
        Ok(true)
    }

    /// Top-level navigation committed or failed: injections start over.
    pub async fn on_navigation(&self, tab: i32, frame: i32, url: &str) -> Result<(), RuntimeError> {
        if frame != MAIN_FRAME_ID || tab == TAB_ID_NONE {
            return Ok(());
        }

        let snapshot = {
            let mut state = self.state();
            state.clear_injections(tab).then(|| state.tab_contexts().clone())
        };

        if let Some(snapshot) = snapshot {
            self.storage.save_tab_contexts(&snapshot).await?;
        }

        let settings = self.storage.get_settings().await?;
        self.view.render_initial_tab_state(
            tab,
            url,
            is_url_whitelisted(&settings.whitelist(), url),
            settings.show_icon_badge(),
        );
        Ok(())
    }

    async fn update_tab_url(&self, tab: i32, url: &str) -> Result<(), RuntimeError> {
        let snapshot = {
            let mut state = self.state();
            state.update_tab_url(tab, url).then(|| state.tab_contexts().clone())
        };

        if let Some(snapshot) = snapshot {
            self.storage.save_tab_contexts(&snapshot).await?;
        }
        Ok(())
    }

    fn tab_url(&self, tab: i32) -> Option<String> {
        self.state().tab_context(tab).and_then(|context| context.url.clone())
    }

    pub fn tab_context(&self, tab: i32) -> Option<TabContext> {
        self.state().tab_context(tab).cloned()
    }

    pub fn tab_contexts(&self) -> BTreeMap<i32, TabContext> {
        self.state().tab_contexts().clone()
    }

    pub fn pending_requests(&self) -> usize {
        self.state().pending_requests()
    }

    // =========================================================================
    // Settings
    // =========================================================================

    pub async fn get_settings(&self) -> Result<Settings, RuntimeError> {
        Ok(self.storage.get_settings().await?)
    }

    pub async fn get_setting(&self, name: &str) -> Result<Value, RuntimeError> {
        self.storage.get_setting(name).await
    }

    pub async fn update_setting(&self, name: &str, value: Value) -> Result<Settings, RuntimeError> {
        let before = self.storage.get_settings().await?;
        let after = self.storage.update_setting(name, value).await?;
        self.handle_settings_change(&before, &after).await?;
        Ok(after)
    }

    pub async fn clear_setting(&self, name: &str) -> Result<Settings, RuntimeError> {
        let before = self.storage.get_settings().await?;
        let after = self.storage.clear_setting(name).await?;
        self.handle_settings_change(&before, &after).await?;
        Ok(after)
    }

    /// Whitelist `domain`. Returns false if nothing changed.
    pub async fn add_to_whitelist(&self, domain: &str) -> Result<bool, RuntimeError> {
        let _guard = self.whitelist_lock.lock().await;
        let mut whitelist = self.storage.get_settings().await?.whitelist();
        if !whitelist.insert(domain) {
            return Ok(false);
        }

        self.store_whitelist(&whitelist).await?;
        Ok(true)
    }

    /// Stop exempting `domain`, including any parent entry covering it.
    /// Returns false if nothing changed.
    pub async fn remove_from_whitelist(&self, domain: &str) -> Result<bool, RuntimeError> {
        let _guard = self.whitelist_lock.lock().await;
        let mut whitelist = self.storage.get_settings().await?.whitelist();
        if whitelist.remove_covering(domain) == 0 {
            return Ok(false);
        }

        self.store_whitelist(&whitelist).await?;
        Ok(true)
    }

    async fn store_whitelist(&self, whitelist: &Whitelist) -> Result<(), RuntimeError> {
        let value = serde_json::to_value(whitelist).map_err(StorageError::from)?;
        self.update_setting(SettingKey::WhitelistedDomains.as_str(), value).await?;
        Ok(())
    }

    async fn handle_settings_change(&self, before: &Settings, after: &Settings) -> Result<(), RuntimeError> {
        let whitelist_changed = before.get(SettingKey::WhitelistedDomains) != after.get(SettingKey::WhitelistedDomains);
        let whitelist = after.whitelist();

        if whitelist_changed {
            self.applier.apply_whitelist(&whitelist).await?;
        }

        if whitelist_changed || before.xhr_test_domain() != after.xhr_test_domain() {
            self.applier.apply_xhr(&whitelist, after.xhr_test_domain()).await?;
        }

        if before.environment() != after.environment()
            || before.block_missing() != after.block_missing()
            || before.strip_metadata() != after.strip_metadata()
        {
            self.applier.sync_rulesets(after).await?;
        }

        if before.disable_prefetch() != after.disable_prefetch() {
            log::debug!("Prefetching preference is now {}", after.disable_prefetch());
        }

        let tabs = self.tab_contexts();

        if before.show_icon_badge() != after.show_icon_badge() {
            for tab in tabs.values() {
                if after.show_icon_badge() {
                    self.view
                        .render_injection_count(tab.identifier, tab.injection_count(), true);
                } else {
                    self.view.clear_badge(tab.identifier);
                }
            }
        }

        if whitelist_changed {
            for tab in tabs.values() {
                let whitelisted = tab
                    .url
                    .as_deref()
                    .is_some_and(|url| is_url_whitelisted(&whitelist, url));
                self.view
                    .render_whitelist_state(tab.identifier, whitelisted, tab.injection_count());
            }
        }

        Ok(())
    }

    // =========================================================================
    // Statistics
    // =========================================================================

    pub async fn get_statistics(&self) -> Result<Statistics, RuntimeError> {
        Ok(self.storage.get_statistics().await?)
    }

    pub async fn get_statistic(&self, name: &str) -> Result<Statistic, RuntimeError> {
        self.storage.get_statistic(name).await
    }

    pub async fn clear_statistic(&self, name: &str) -> Result<(), RuntimeError> {
        self.storage.clear_statistic(name).await
    }

    pub async fn flush_statistics(&self) -> Result<(), RuntimeError> {
        Ok(self.storage.flush_statistics().await?)
    }
}

/// Path of the persisted local area inside a state directory.
pub fn local_area_path(state_dir: &Path) -> std::path::PathBuf {
    state_dir.join(LOCAL_AREA_FILE)
}

fn is_url_whitelisted(whitelist: &Whitelist, url: &str) -> bool {
    extract_domain_from_url(url).is_some_and(|domain| whitelist.is_whitelisted(&domain))
}
