//! Static Ruleset Builder
//!
//! Compiles the mapping table into the rulesets shipped with the agent:
//!
//! - `redirect/<environment>`: one redirect per (host, mold, bundled version)
//! - `block`: blocks everything else on mapped hosts (enabled with `blockMissing`)
//! - `sanitize`: strips identifying request headers sent to mapped hosts
//!
//! Redirect targets are resolved with the same resolver the runtime uses, so
//! a URL is redirected by the static rules exactly when the runtime would
//! accept it as a candidate.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use sg_core::resource::{BasePath, Environment, HostMapping, Mold, ResourceAliases};
use sg_core::version::{extract_version, substitute, VERSION_PLACEHOLDER};
use sg_core::{RequestType, Resolver, ResourceMappings};

use crate::optimizer::{optimize_rules, OptimizeStats};
use crate::rule::{Rule, RuleAction, RuleCondition};

const BLOCK_PRIORITY: u32 = 1;
const REDIRECT_PRIORITY: u32 = 2;
const SOURCE_MAP_PRIORITY: u32 = 3;

const STRIPPED_HEADERS: &[&str] = &["Cookie", "Origin", "Referer"];

// =============================================================================
// Ruleset Identifiers
// =============================================================================

/// The static rulesets, named as the rule engine knows them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum RulesetId {
    #[serde(rename = "redirect/stable")]
    RedirectStable,
    #[serde(rename = "redirect/staging")]
    RedirectStaging,
    #[serde(rename = "block")]
    Block,
    #[serde(rename = "sanitize")]
    Sanitize,
}

impl RulesetId {
    pub const ALL: [RulesetId; 4] = [
        RulesetId::RedirectStable,
        RulesetId::RedirectStaging,
        RulesetId::Block,
        RulesetId::Sanitize,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RulesetId::RedirectStable => "redirect/stable",
            RulesetId::RedirectStaging => "redirect/staging",
            RulesetId::Block => "block",
            RulesetId::Sanitize => "sanitize",
        }
    }

    pub fn redirect(environment: Environment) -> Self {
        match environment {
            Environment::Stable => RulesetId::RedirectStable,
            Environment::Staging => RulesetId::RedirectStaging,
        }
    }

    /// Whether the ruleset is enabled before any setting is applied.
    pub fn enabled_by_default(&self) -> bool {
        !matches!(self, RulesetId::RedirectStaging | RulesetId::Block)
    }

    /// Relative file the ruleset is written to.
    pub fn file_name(&self) -> String {
        format!("{}.json", self.as_str())
    }
}

impl fmt::Display for RulesetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RulesetId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|id| id.as_str() == s)
            .ok_or_else(|| format!("Unknown ruleset: {s}"))
    }
}

// =============================================================================
// Builders
// =============================================================================

/// Build one ruleset.
pub fn build_ruleset(id: RulesetId, mappings: &ResourceMappings, aliases: &ResourceAliases) -> (Vec<Rule>, OptimizeStats) {
    let mut rules = match id {
        RulesetId::RedirectStable => build_redirects(mappings, aliases, Environment::Stable),
        RulesetId::RedirectStaging => build_redirects(mappings, aliases, Environment::Staging),
        RulesetId::Block => vec![build_block(mappings)],
        RulesetId::Sanitize => vec![build_sanitize(mappings)],
    };

    let stats = optimize_rules(&mut rules);
    log::info!(
        "Built ruleset {id}: {} rules ({} duplicates removed)",
        stats.after,
        stats.deduped
    );

    (rules, stats)
}

/// Build every static ruleset.
pub fn build_rulesets(mappings: &ResourceMappings, aliases: &ResourceAliases) -> BTreeMap<RulesetId, Vec<Rule>> {
    RulesetId::ALL
        .into_iter()
        .map(|id| (id, build_ruleset(id, mappings, aliases).0))
        .collect()
}

fn host_domains(mappings: &ResourceMappings) -> Vec<String> {
    mappings.host_names().into_iter().map(str::to_string).collect()
}

fn build_block(mappings: &ResourceMappings) -> Rule {
    Rule::new(
        1,
        BLOCK_PRIORITY,
        RuleAction::block(),
        RuleCondition::for_types(RequestType::SCRIPT | RequestType::XMLHTTPREQUEST)
            .request_domains(host_domains(mappings)),
    )
}

fn build_sanitize(mappings: &ResourceMappings) -> Rule {
    Rule::new(
        1,
        BLOCK_PRIORITY,
        RuleAction::remove_request_headers(STRIPPED_HEADERS),
        RuleCondition::for_types(RequestType::SCRIPT | RequestType::XMLHTTPREQUEST)
            .request_domains(host_domains(mappings)),
    )
}

fn build_redirects(mappings: &ResourceMappings, aliases: &ResourceAliases, environment: Environment) -> Vec<Rule> {
    let resolver = Resolver::new(mappings, aliases);
    let manifest = environment.manifest();
    let mut rules = Vec::new();

    for mapping in mappings.hosts() {
        // Source maps are never bundled, let them through to the CDN
        rules.push(Rule::new(
            0,
            SOURCE_MAP_PRIORITY,
            RuleAction::allow(),
            RuleCondition::for_types(RequestType::SCRIPT | RequestType::XMLHTTPREQUEST)
                .url_filter(format!("||{}/*.map|", mapping.host)),
        ));

        for base in &mapping.base_paths {
            for mold in &base.molds {
                for path in candidate_paths(mapping, base, mold, aliases, environment) {
                    let Some(target) = resolver.resolve_path(mapping.host, &path) else {
                        continue;
                    };

                    if !manifest.contains(&target.path) {
                        continue;
                    }

                    rules.push(Rule::new(
                        0,
                        REDIRECT_PRIORITY,
                        RuleAction::redirect(&target.path),
                        RuleCondition::for_types(RequestType::SCRIPT)
                            .url_filter(format!("||{}{}", mapping.host, path)),
                    ));
                }
            }
        }
    }

    rules
}

/// Request path prefixes a mold can match: one per bundled version of its
/// resource set plus one per abbreviated version aliased on this host.
fn candidate_paths(
    mapping: &HostMapping,
    base: &BasePath,
    mold: &Mold,
    aliases: &ResourceAliases,
    environment: Environment,
) -> Vec<String> {
    if !mold.pattern.contains(VERSION_PLACEHOLDER) {
        return vec![format!("{}{}", base.path, mold.pattern)];
    }

    let mut versions: BTreeSet<String> = mold
        .target
        .set
        .map(|set| environment.manifest().versions_of(set))
        .unwrap_or_default()
        .iter()
        .map(|version| version.to_string())
        .collect();

    for (aliased_path, _) in aliases.for_host(mapping.host) {
        if let Some(version) = extract_version(aliased_path) {
            if substitute(mold.target.path, version) == aliased_path {
                versions.insert(version.to_string());
            }
        }
    }

    versions
        .iter()
        .map(|version| format!("{}{}", base.path, substitute(mold.pattern, version)))
        .collect()
}
