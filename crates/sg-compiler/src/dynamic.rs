//! Dynamic rules
//!
//! Rules that depend on user settings and are replaced by id whenever those
//! settings change. Each builder returns `None` when its rule should not
//! exist; the caller then only removes the old one.

use serde::{Deserialize, Serialize};
use sg_core::resource::DomainExceptions;
use sg_core::{RequestType, Whitelist};

use crate::rule::{Rule, RuleAction, RuleCondition};

pub const WHITELIST_RULE_ID: u32 = 5000;
pub const DOMAIN_EXCEPTIONS_RULE_ID: u32 = 7000;
pub const XHR_TEST_RULE_ID: u32 = 8000;

const ALLOW_PRIORITY: u32 = 3;
const XHR_TEST_PRIORITY: u32 = 5;

const XHR_TEST_URL_FILTER: &str = "|https://ajax.googleapis.com/ajax/libs/jquery/2.1.4/jquery.min.js|";
const XHR_TEST_TARGET: &str = "/resources/jquery/2.1.4/jquery.min.jsm";

/// One replace-by-id update of the dynamic rule set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleUpdate {
    pub remove_rule_ids: Vec<u32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub add_rules: Vec<Rule>,
}

impl RuleUpdate {
    /// Remove rule `id` and add `rule` in its place, if any.
    pub fn replace(id: u32, rule: Option<Rule>) -> Self {
        Self {
            remove_rule_ids: vec![id],
            add_rules: rule.into_iter().collect(),
        }
    }
}

fn allow_initiators(id: u32, domains: Vec<String>) -> Option<Rule> {
    if domains.is_empty() {
        return None;
    }

    Some(Rule::new(
        id,
        ALLOW_PRIORITY,
        RuleAction::allow(),
        RuleCondition::for_types(RequestType::RULE_TYPES).initiator_domains(domains),
    ))
}

/// Allow rule exempting every whitelisted initiator.
pub fn whitelist_rule(whitelist: &Whitelist) -> Option<Rule> {
    allow_initiators(WHITELIST_RULE_ID, whitelist.domains().map(str::to_string).collect())
}

/// Allow rule exempting sites known to break under substitution.
pub fn domain_exceptions_rule(exceptions: &DomainExceptions) -> Option<Rule> {
    allow_initiators(DOMAIN_EXCEPTIONS_RULE_ID, exceptions.rule_domains())
}

/// Redirect serving the self-test resource to XHRs from the test domain.
///
/// Absent when the test domain itself is whitelisted.
pub fn xhr_test_rule(whitelist: &Whitelist, xhr_test_domain: &str) -> Option<Rule> {
    if whitelist.is_whitelisted(xhr_test_domain) {
        return None;
    }

    Some(Rule::new(
        XHR_TEST_RULE_ID,
        XHR_TEST_PRIORITY,
        RuleAction::redirect(XHR_TEST_TARGET),
        RuleCondition::for_types(RequestType::RULE_TYPES)
            .url_filter(XHR_TEST_URL_FILTER)
            .initiator_domains(vec![xhr_test_domain.to_string()])
            .excluded_initiator_domains(whitelist.domains().map(str::to_string).collect()),
    ))
}
