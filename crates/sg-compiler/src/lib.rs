//! Surrogate Rule Compiler
//!
//! This crate turns the mapping table and user settings into declarative
//! network rules: the static rulesets shipped with the agent and the dynamic
//! rules regenerated whenever the whitelist changes.

pub mod rule;
pub mod dynamic;
pub mod builder;
pub mod optimizer;

pub use builder::{build_ruleset, build_rulesets, RulesetId};
pub use dynamic::{domain_exceptions_rule, whitelist_rule, xhr_test_rule, RuleUpdate};
pub use optimizer::optimize_rules;
pub use rule::{ActionType, Rule, RuleAction, RuleCondition};
