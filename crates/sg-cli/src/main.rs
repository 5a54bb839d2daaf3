//! Surrogate CLI
//!
//! CLI tool for inspecting the mapping table, compiling static rulesets and
//! driving the runtime from the command line.

mod rulesets;
mod simulate;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use clap::{Parser, Subcommand};
use serde_json::Value;

use sg_core::{Environment, Resolver, ResourceMappings};
use sg_runtime::{Coordinator, LogView, MemoryRuleEngine, RuntimeConfig};

#[derive(Parser)]
#[command(name = "sg-cli")]
#[command(about = "Surrogate CDN substitution tools")]
struct Cli {
    /// Runtime configuration file (JSON)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve request URLs to their local substitutes
    Resolve {
        /// Request URLs
        #[arg(required = true)]
        urls: Vec<String>,

        /// Environment to check bundled targets against
        #[arg(short, long, default_value = "stable")]
        environment: Environment,
    },

    /// List the CDN hosts that are intercepted
    Hosts {
        /// Print match patterns instead of host names
        #[arg(short, long)]
        patterns: bool,
    },

    /// Compile the static rulesets to JSON
    Compile {
        /// Output directory
        #[arg(short, long, default_value = "rulesets")]
        output: PathBuf,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Manage the persisted whitelist
    Whitelist {
        #[command(subcommand)]
        action: WhitelistAction,
    },

    /// Read and write persisted settings
    Settings {
        #[command(subcommand)]
        action: SettingsAction,
    },

    /// Replay a JSON event script through the runtime
    Simulate {
        /// Event script file
        #[arg(short, long)]
        script: PathBuf,
    },
}

#[derive(Subcommand)]
enum WhitelistAction {
    /// Exempt a domain and its subdomains
    Add { domain: String },
    /// Stop exempting a domain
    Remove { domain: String },
    /// Print every whitelisted domain
    List,
}

#[derive(Subcommand)]
enum SettingsAction {
    /// Print every setting with its origin
    Show,
    /// Print one setting
    Get { key: String },
    /// Store a setting; the value is parsed as JSON, falling back to a string
    Set { key: String, value: String },
    /// Remove a stored setting
    Clear { key: String },
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    let result = load_config(cli.config.as_deref()).and_then(|config| match cli.command {
        Commands::Resolve { urls, environment } => cmd_resolve(&urls, environment),
        Commands::Hosts { patterns } => cmd_hosts(patterns),
        Commands::Compile { output, verbose } => cmd_compile(&output, verbose),
        Commands::Whitelist { action } => cmd_whitelist(&config, action),
        Commands::Settings { action } => cmd_settings(&config, action),
        Commands::Simulate { script } => cmd_simulate(&config, &script),
    });

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn load_config(path: Option<&Path>) -> Result<RuntimeConfig, String> {
    match path {
        Some(path) => RuntimeConfig::load(path).map_err(|e| e.to_string()),
        None => Ok(RuntimeConfig::default()),
    }
}

fn cmd_resolve(urls: &[String], environment: Environment) -> Result<(), String> {
    let resolver = Resolver::bundled();
    let manifest = environment.manifest();

    for url in urls {
        match resolver.resolve(url) {
            Some(target) => {
                let bundled = if manifest.contains(&target.path) {
                    "bundled"
                } else {
                    "missing"
                };
                println!("{url}");
                println!("  Source:   {}", target.source);
                println!("  Version:  {}", target.version);
                println!("  Path:     {} ({bundled} in {environment})", target.path);
            }
            None => println!("{url}\n  No local target"),
        }
    }

    Ok(())
}

fn cmd_hosts(patterns: bool) -> Result<(), String> {
    let mappings = ResourceMappings::bundled();

    if patterns {
        for pattern in mappings.valid_host_patterns() {
            println!("{pattern}");
        }
    } else {
        for host in mappings.host_names() {
            println!("{host}");
        }
    }

    Ok(())
}

fn cmd_compile(output: &Path, verbose: bool) -> Result<(), String> {
    let start = Instant::now();
    let stats = rulesets::compile_rulesets(output, verbose)?;

    println!("Compiled {} rulesets to '{}'", stats.len(), output.display());
    for stat in &stats {
        println!(
            "  {:<18} {} -> {} rules (dedupe removed {}), {:.1} KB",
            stat.ruleset.as_str(),
            stat.rules_before,
            stat.rules_after,
            stat.rules_before - stat.rules_after,
            stat.bytes as f64 / 1024.0
        );
    }
    println!("  Time:     {:.1}ms", start.elapsed().as_secs_f64() * 1000.0);

    Ok(())
}

/// Run `f` against a coordinator over the persisted state directory.
fn with_coordinator<F, T>(config: &RuntimeConfig, f: F) -> Result<T, String>
where
    F: for<'a> FnOnce(&'a Coordinator) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<T, String>> + 'a>>,
{
    if config.state_dir.is_none() {
        return Err("No state directory configured; set \"stateDir\" in the config file".to_string());
    }

    let runtime = tokio::runtime::Runtime::new()
        .map_err(|e| format!("Failed to start tokio runtime: {}", e))?;

    runtime.block_on(async {
        let coordinator = Coordinator::from_config(config, Arc::new(MemoryRuleEngine::new()), Arc::new(LogView))
            .map_err(|e| e.to_string())?;
        f(&coordinator).await
    })
}

fn cmd_whitelist(config: &RuntimeConfig, action: WhitelistAction) -> Result<(), String> {
    with_coordinator(config, |coordinator| {
        Box::pin(async move {
            match action {
                WhitelistAction::Add { domain } => {
                    let added = coordinator.add_to_whitelist(&domain).await.map_err(|e| e.to_string())?;
                    println!("{}", if added { "Added" } else { "Already whitelisted" });
                }
                WhitelistAction::Remove { domain } => {
                    let removed = coordinator
                        .remove_from_whitelist(&domain)
                        .await
                        .map_err(|e| e.to_string())?;
                    println!("{}", if removed { "Removed" } else { "Not whitelisted" });
                }
                WhitelistAction::List => {
                    let settings = coordinator.get_settings().await.map_err(|e| e.to_string())?;
                    for domain in settings.whitelist().domains() {
                        println!("{domain}");
                    }
                }
            }
            Ok(())
        })
    })
}

fn cmd_settings(config: &RuntimeConfig, action: SettingsAction) -> Result<(), String> {
    with_coordinator(config, |coordinator| {
        Box::pin(async move {
            match action {
                SettingsAction::Show => {
                    let settings = coordinator.get_settings().await.map_err(|e| e.to_string())?;
                    let json = serde_json::to_string_pretty(&settings.detailed()).map_err(|e| e.to_string())?;
                    println!("{json}");
                }
                SettingsAction::Get { key } => {
                    let value = coordinator.get_setting(&key).await.map_err(|e| e.to_string())?;
                    println!("{value}");
                }
                SettingsAction::Set { key, value } => {
                    let value = serde_json::from_str(&value).unwrap_or(Value::String(value));
                    coordinator.update_setting(&key, value).await.map_err(|e| e.to_string())?;
                }
                SettingsAction::Clear { key } => {
                    coordinator.clear_setting(&key).await.map_err(|e| e.to_string())?;
                }
            }
            Ok(())
        })
    })
}

fn cmd_simulate(config: &RuntimeConfig, script: &Path) -> Result<(), String> {
    let events = simulate::load_script(script)?;
    let summary = simulate::run_simulation(config, events)?;

    println!();
    println!("Replayed {} events", summary.events);
    println!("  Injected:   {}", summary.injected);
    println!("  Sanitized:  {}", summary.sanitized);
    println!("  Blocked:    {}", summary.blocked);

    Ok(())
}
