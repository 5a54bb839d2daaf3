//! Rule synchronisation
//!
//! Translates settings into rule engine calls. Every call goes through the
//! scheduler under a fixed key, so concurrent setting changes apply in order
//! and unchanged rule sets are never rewritten.

use std::sync::Arc;

use serde::Serialize;
use sg_compiler::dynamic::{DOMAIN_EXCEPTIONS_RULE_ID, WHITELIST_RULE_ID, XHR_TEST_RULE_ID};
use sg_compiler::{domain_exceptions_rule, whitelist_rule, xhr_test_rule, RuleUpdate, RulesetId};
use sg_core::resource::{DomainExceptions, Environment};
use sg_core::{Settings, Whitelist};

use crate::error::ApplyError;
use crate::rule_engine::RuleEngine;
use crate::scheduler::{Job, Outcome, Scheduler};

pub const WHITELIST_KEY: &str = "whitelist";
pub const XHR_KEY: &str = "xhr";
pub const DOMAIN_EXCEPTIONS_KEY: &str = "exceptions";
pub const RULESETS_KEY: &str = "rulesets";

/// Static ruleset state derived from settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RulesetToggles {
    pub enable: Vec<RulesetId>,
    pub disable: Vec<RulesetId>,
}

impl RulesetToggles {
    pub fn from_settings(settings: &Settings) -> Self {
        let wanted = [
            (RulesetId::RedirectStaging, settings.environment() == Environment::Staging),
            (RulesetId::Block, settings.block_missing()),
            (RulesetId::Sanitize, settings.strip_metadata()),
        ];

        let (enable, disable): (Vec<_>, Vec<_>) = wanted.into_iter().partition(|(_, enabled)| *enabled);

        Self {
            enable: enable.into_iter().map(|(id, _)| id).collect(),
            disable: disable.into_iter().map(|(id, _)| id).collect(),
        }
    }
}

#[derive(Clone)]
pub struct RuleApplier {
    engine: Arc<dyn RuleEngine>,
    scheduler: Scheduler,
}

impl RuleApplier {
    pub fn new(engine: Arc<dyn RuleEngine>) -> Self {
        Self {
            engine,
            scheduler: Scheduler::new(),
        }
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// Replace the whitelist allow rule.
    pub async fn apply_whitelist(&self, whitelist: &Whitelist) -> Result<Outcome, ApplyError> {
        let update = RuleUpdate::replace(WHITELIST_RULE_ID, whitelist_rule(whitelist));
        self.apply_update(WHITELIST_KEY, update).await
    }

    /// Replace the XHR self-test redirect.
    pub async fn apply_xhr(&self, whitelist: &Whitelist, xhr_test_domain: &str) -> Result<Outcome, ApplyError> {
        let update = RuleUpdate::replace(XHR_TEST_RULE_ID, xhr_test_rule(whitelist, xhr_test_domain));
        self.apply_update(XHR_KEY, update).await
    }

    pub async fn apply_domain_exceptions(&self, exceptions: &DomainExceptions) -> Result<Outcome, ApplyError> {
        let update = RuleUpdate::replace(DOMAIN_EXCEPTIONS_RULE_ID, domain_exceptions_rule(exceptions));
        self.apply_update(DOMAIN_EXCEPTIONS_KEY, update).await
    }

    /// Enable and disable static rulesets to match `settings`.
    pub async fn sync_rulesets(&self, settings: &Settings) -> Result<Outcome, ApplyError> {
        let toggles = RulesetToggles::from_settings(settings);
        let engine = Arc::clone(&self.engine);

        let job = Job::new(&toggles, {
            let RulesetToggles { enable, disable } = toggles.clone();
            move || async move { engine.update_enabled_rulesets(enable, disable).await }
        })?;

        let outcome = self.scheduler.schedule(RULESETS_KEY, job).await?;
        if outcome == Outcome::Applied {
            log::info!("Rulesets enabled: {:?}, disabled: {:?}", toggles.enable, toggles.disable);
        }
        Ok(outcome)
    }

    /// Bring every rule group in line with `settings`.
    pub async fn apply_settings(&self, settings: &Settings) -> Result<(), ApplyError> {
        let whitelist = settings.whitelist();
        self.apply_whitelist(&whitelist).await?;
        self.apply_xhr(&whitelist, settings.xhr_test_domain()).await?;
        self.sync_rulesets(settings).await?;
        Ok(())
    }

    async fn apply_update(&self, key: &'static str, update: RuleUpdate) -> Result<Outcome, ApplyError> {
        let engine = Arc::clone(&self.engine);
        let job = Job::new(&update, {
            let update = update.clone();
            move || async move { engine.update_dynamic_rules(update).await }
        })?;

        let outcome = self.scheduler.schedule(key, job).await?;
        if outcome == Outcome::Applied {
            log::info!(
                "Applied {key} rules: removed {:?}, added {}",
                update.remove_rule_ids,
                update.add_rules.len()
            );
        }
        Ok(outcome)
    }
}
