//! Surrogate Runtime
//!
//! The event-driven half of the agent. A [`Coordinator`] receives browser
//! events (requests, navigations, tab lifecycle), consults the synchronous
//! core, and keeps storage, declarative rules and the view in sync.
//!
//! # Modules
//!
//! - `area`: Storage areas with whole-value get/set
//! - `storage`: Settings, debounced statistics and session tab state
//! - `scheduler`: Per-key serialized rule updates
//! - `rule_engine`: Rule engine collaborator
//! - `applier`: Settings to rule engine calls
//! - `view`: View collaborator
//! - `coordinator`: Event handling
//! - `config`: Runtime configuration

pub mod applier;
pub mod area;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod rule_engine;
pub mod scheduler;
pub mod storage;
pub mod view;

pub use applier::RuleApplier;
pub use area::{JsonFileArea, MemoryArea, StorageArea};
pub use config::RuntimeConfig;
pub use coordinator::Coordinator;
pub use error::{ApplyError, ConfigError, RuleEngineError, RuntimeError, StorageError};
pub use rule_engine::{MemoryRuleEngine, RuleEngine};
pub use scheduler::{Job, Outcome, Scheduler};
pub use storage::Storage;
pub use view::{LogView, View};
