//! Surrogate Core Library
//!
//! This crate provides the synchronous half of the Surrogate CDN substitution
//! agent: given an outbound request for a known third-party library CDN, it
//! decides whether the request is a candidate for substitution and resolves it
//! to a locally bundled, versioned copy.
//!
//! # Architecture
//!
//! The resource mapping table is built once and shared for the lifetime of the
//! process. Resolution walks it in declaration order (first match wins) and
//! never allocates more than the resulting target.
//!
//! # Modules
//!
//! - `url`: Fast URL parsing without allocations
//! - `version`: Version token extraction for resource paths
//! - `domain`: Domain normalization and the user whitelist
//! - `resource`: Mapping table, resource sets, aliases, environments, exceptions
//! - `resolver`: Request URL to local target resolution
//! - `analyzer`: Candidate analysis for intercepted requests
//! - `settings`: Setting keys, defaults and provenance
//! - `statistics`: Counters and their persisted form
//! - `state`: Per-request and per-tab state tracking
//! - `types`: Shared type definitions

pub mod analyzer;
pub mod domain;
pub mod resolver;
pub mod resource;
pub mod settings;
pub mod state;
pub mod statistics;
pub mod types;
pub mod url;
pub mod version;

// Re-export commonly used types
pub use analyzer::{Analyzer, Candidacy, MissingReason};
pub use domain::{extract_domain_from_url, normalize_domain, Whitelist};
pub use resolver::Resolver;
pub use resource::{Environment, ResourceMappings};
pub use settings::{SettingError, SettingKey, Settings};
pub use state::{Promotion, RequestContext, StateTracker, TabContext};
pub use statistics::{Statistic, StatisticKey, Statistics};
pub use types::{LocalTarget, RequestDetails, RequestType};
