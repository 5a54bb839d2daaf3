use std::collections::{HashMap, HashSet};

use crate::rule::{Rule, RuleAction, RuleCondition};

pub struct OptimizeStats {
    pub before: usize,
    pub after: usize,
    pub deduped: usize,
}

/// Drop rules with an identical action and condition, keeping the
/// highest-priority copy in its original position, then number the
/// remaining rules from 1.
pub fn optimize_rules(rules: &mut Vec<Rule>) -> OptimizeStats {
    let before = rules.len();

    let keep: Vec<bool> = {
        let mut best: HashMap<RuleKey<'_>, (u32, usize)> = HashMap::new();
        for (index, rule) in rules.iter().enumerate() {
            best.entry(RuleKey::from(rule))
                .and_modify(|(priority, kept)| {
                    if rule.priority > *priority {
                        *priority = rule.priority;
                        *kept = index;
                    }
                })
                .or_insert((rule.priority, index));
        }

        let kept: HashSet<usize> = best.into_values().map(|(_, index)| index).collect();
        (0..rules.len()).map(|index| kept.contains(&index)).collect()
    };

    let mut keep = keep.into_iter();
    rules.retain(|_| keep.next().unwrap_or(false));

    for (index, rule) in rules.iter_mut().enumerate() {
        rule.id = index as u32 + 1;
    }

    let after = rules.len();

    OptimizeStats {
        before,
        after,
        deduped: before - after,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct RuleKey<'a> {
    action: &'a RuleAction,
    condition: &'a RuleCondition,
}

impl<'a> From<&'a Rule> for RuleKey<'a> {
    fn from(rule: &'a Rule) -> Self {
        Self {
            action: &rule.action,
            condition: &rule.condition,
        }
    }
}
