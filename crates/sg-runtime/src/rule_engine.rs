//! Rule engine collaborator
//!
//! The network rule engine evaluating declarative rules. The runtime only
//! ever replaces dynamic rules by id and toggles static rulesets by name.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use sg_compiler::{Rule, RuleUpdate, RulesetId};

use crate::error::RuleEngineError;

#[async_trait]
pub trait RuleEngine: Send + Sync {
    /// Remove `update.remove_rule_ids`, then add `update.add_rules`.
    async fn update_dynamic_rules(&self, update: RuleUpdate) -> Result<(), RuleEngineError>;

    async fn update_enabled_rulesets(&self, enable: Vec<RulesetId>, disable: Vec<RulesetId>) -> Result<(), RuleEngineError>;
}

#[derive(Debug)]
struct EngineState {
    dynamic: BTreeMap<u32, Rule>,
    enabled: BTreeSet<RulesetId>,
    dynamic_updates: usize,
    ruleset_updates: usize,
    fail_next: Option<RuleEngineError>,
}

/// In-process rule engine recording the effective rule state.
#[derive(Debug)]
pub struct MemoryRuleEngine {
    state: Mutex<EngineState>,
}

impl Default for MemoryRuleEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryRuleEngine {
    /// Engine with the rulesets that are enabled before any setting applies.
    pub fn new() -> Self {
        let enabled = RulesetId::ALL
            .into_iter()
            .filter(RulesetId::enabled_by_default)
            .collect();

        Self {
            state: Mutex::new(EngineState {
                dynamic: BTreeMap::new(),
                enabled,
                dynamic_updates: 0,
                ruleset_updates: 0,
                fail_next: None,
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, EngineState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn dynamic_rules(&self) -> Vec<Rule> {
        self.state().dynamic.values().cloned().collect()
    }

    pub fn dynamic_rule(&self, id: u32) -> Option<Rule> {
        self.state().dynamic.get(&id).cloned()
    }

    pub fn enabled_rulesets(&self) -> BTreeSet<RulesetId> {
        self.state().enabled.clone()
    }

    pub fn is_enabled(&self, ruleset: RulesetId) -> bool {
        self.state().enabled.contains(&ruleset)
    }

    /// Number of dynamic rule updates accepted so far.
    pub fn dynamic_update_count(&self) -> usize {
        self.state().dynamic_updates
    }

    pub fn ruleset_update_count(&self) -> usize {
        self.state().ruleset_updates
    }

    /// Reject the next call of either kind with `error`.
    pub fn fail_next(&self, error: RuleEngineError) {
        self.state().fail_next = Some(error);
    }
}

#[async_trait]
impl RuleEngine for MemoryRuleEngine {
    async fn update_dynamic_rules(&self, update: RuleUpdate) -> Result<(), RuleEngineError> {
        let mut state = self.state();
        if let Some(error) = state.fail_next.take() {
            return Err(error);
        }

        let mut dynamic = state.dynamic.clone();
        for id in &update.remove_rule_ids {
            dynamic.remove(id);
        }

        for rule in update.add_rules {
            if rule.id == 0 {
                return Err(RuleEngineError::Rejected("Rule id must be positive".to_string()));
            }
            if dynamic.contains_key(&rule.id) {
                return Err(RuleEngineError::Rejected(format!("Rule with id {} already exists", rule.id)));
            }
            dynamic.insert(rule.id, rule);
        }

        state.dynamic = dynamic;
        state.dynamic_updates += 1;
        Ok(())
    }

    async fn update_enabled_rulesets(&self, enable: Vec<RulesetId>, disable: Vec<RulesetId>) -> Result<(), RuleEngineError> {
        let mut state = self.state();
        if let Some(error) = state.fail_next.take() {
            return Err(error);
        }

        for ruleset in disable {
            state.enabled.remove(&ruleset);
        }
        state.enabled.extend(enable);
        state.ruleset_updates += 1;
        Ok(())
    }
}
