//! Bundled Resource Data
//!
//! This module holds the static tables the resolver works from: the
//! host/base-path/mold mapping table, the resource sets molds point at,
//! per-host aliases, the environment manifests and the domain exceptions.

mod aliases;
mod environment;
mod exceptions;
mod mappings;
pub mod sets;

pub use aliases::*;
pub use environment::*;
pub use exceptions::*;
pub use mappings::*;
pub use sets::ResourceSet;
