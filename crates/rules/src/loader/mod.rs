//! Filesystem configuration loader with hot-reload via `notify` watcher.
//!
//! Scans the configuration directory for YAML objects (the configuration and
//! collector ConfigMaps, rule and collector custom resources), applies them
//! to the [`Registry`](crate::registry::Registry), and undoes resource-sourced
//! entries when their file disappears.
//! Supports all object kinds via two-pass deserialization (ObjectEnvelope -> ClusterObject).

mod apply;
mod core;
mod error;
mod watcher;

#[cfg(test)]
mod tests;

pub use self::apply::{
    collector_binding, parse_configuration, qualified_rule, AppliedObject, ObjectApplier,
    CLUSTER_SCOPE_PREFIX, DEFAULT_SIDECAR_INIT_IMAGE,
};
pub use self::core::{parse_object, ConfigLoader};
pub use self::error::{LoadResult, LoadStatus, Result, RuleError};
