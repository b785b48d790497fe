//! Layered rule registry.
//!
//! Holds the three rule tiers (namespace-scoped, cluster-scoped,
//! configuration-sourced), the controller configuration, the injection
//! templates and the collector registries as one immutable
//! [`RegistryState`]. Writers validate and resolve outside the lock, then
//! swap in a new state; readers take an `Arc` snapshot and never observe a
//! partially applied change.

mod collectors;
mod core;
mod error;


pub use self::collectors::{parse_collector_map, CollectorRegistry};
pub use self::core::{
    ConfigurationBatch, RegisteredRule, Registry, RegistryState, ReplaceSummary, RuleScope,
};
pub use self::error::{RegistryError, Result};
