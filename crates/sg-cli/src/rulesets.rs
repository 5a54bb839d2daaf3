use std::fs;
use std::path::Path;
use std::time::Instant;

use sg_compiler::{build_ruleset, Rule, RulesetId};
use sg_core::resource::ResourceAliases;
use sg_core::ResourceMappings;

#[derive(Debug, Clone)]
pub struct CompileStats {
    pub ruleset: RulesetId,
    pub rules_before: usize,
    pub rules_after: usize,
    pub bytes: usize,
}

/// Serialize one ruleset the way the rule engine loads it.
pub fn ruleset_json(rules: &[Rule]) -> Result<Vec<u8>, String> {
    serde_json::to_vec_pretty(rules).map_err(|e| format!("Failed to serialize rules: {}", e))
}

/// Build every static ruleset into `output`, one file per ruleset.
pub fn compile_rulesets(output: &Path, verbose: bool) -> Result<Vec<CompileStats>, String> {
    let mappings = ResourceMappings::bundled();
    let aliases = ResourceAliases::bundled();
    let mut all_stats = Vec::new();

    for id in RulesetId::ALL {
        let start = Instant::now();
        let (rules, stats) = build_ruleset(id, mappings, aliases);
        let bytes = ruleset_json(&rules)?;

        let path = output.join(id.file_name());
        write_ruleset(&path, &bytes)?;

        if verbose {
            println!(
                "  {:<18} {} rules in {:.1}ms -> {}",
                id.as_str(),
                rules.len(),
                start.elapsed().as_secs_f64() * 1000.0,
                path.display()
            );
        }

        all_stats.push(CompileStats {
            ruleset: id,
            rules_before: stats.before,
            rules_after: stats.after,
            bytes: bytes.len(),
        });
    }

    Ok(all_stats)
}

pub fn write_ruleset(path: &Path, bytes: &[u8]) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| format!("Failed to create '{}': {}", parent.display(), e))?;
    }

    fs::write(path, bytes).map_err(|e| format!("Failed to write '{}': {}", path.display(), e))
}
