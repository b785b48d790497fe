//! Instrumentation rule model, registry and resolution.
//!
//! This crate provides:
//! - YAML/JSON schema for rules, templates, controller and collector configuration
//! - Regex matching of workload metadata against rule criteria
//! - Template inheritance and default filling for injection specs
//! - The layered rule registry with validated, all-or-nothing writes
//! - Tiered rule resolution (namespace → cluster → configuration)
//! - Filesystem loader with hot-reload via `notify` watcher

pub mod inheritance;
pub mod loader;
pub mod matcher;
pub mod registry;
pub mod resolver;
pub mod schema;
pub mod validation;

pub use registry::{Registry, RegistryState};
pub use resolver::RuleResolver;
