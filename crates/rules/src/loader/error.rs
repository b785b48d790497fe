//! Loader failures and per-file outcomes.

use std::fmt;
use std::path::PathBuf;

use crate::registry::RegistryError;

#[derive(Debug, thiserror::Error)]
pub enum RuleError {
    #[error("reading configuration: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed YAML: {0}")]
    Parse(#[from] serde_yaml::Error),

    /// Unknown kind, missing ConfigMap key, unusable collector.
    #[error("invalid object: {0}")]
    Invalid(String),

    #[error("registry rejected object: {0}")]
    Registry(#[from] RegistryError),

    #[error("file watcher: {0}")]
    Notify(#[from] notify::Error),
}

pub type Result<T> = std::result::Result<T, RuleError>;

/// What happened to one file during a scan or reload.
#[derive(Debug)]
pub struct LoadResult {
    pub path: PathBuf,
    pub status: LoadStatus,
}

#[derive(Debug)]
pub enum LoadStatus {
    /// Applied; `object` names what landed in the registry.
    Loaded { object: String },
    Skipped { reason: String },
    Failed { error: String },
}

impl LoadStatus {
    pub fn is_loaded(&self) -> bool {
        matches!(self, LoadStatus::Loaded { .. })
    }
}

impl fmt::Display for LoadResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.status {
            LoadStatus::Loaded { object } => write!(f, "{}: loaded {}", self.path.display(), object),
            LoadStatus::Skipped { reason } => write!(f, "{}: skipped ({})", self.path.display(), reason),
            LoadStatus::Failed { error } => write!(f, "{}: failed: {}", self.path.display(), error),
        }
    }
}
