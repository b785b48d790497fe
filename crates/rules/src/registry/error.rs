//! Error types for registry writes.

use crate::inheritance::UnknownTemplate;
use crate::validation::ValidationResult;

/// Why a registry write was rejected. The previous state stays live.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// Incoming configuration failed validation.
    #[error("validation failed: {}", .0.summary())]
    Invalid(ValidationResult),

    /// A rule references a template that is not registered.
    #[error(transparent)]
    UnknownTemplate(#[from] UnknownTemplate),

    /// A match regex did not compile.
    #[error("invalid match regex in rule '{rule}': {source}")]
    Regex {
        rule: String,
        #[source]
        source: regex::Error,
    },
}

/// Result alias for registry operations.
pub type Result<T> = std::result::Result<T, RegistryError>;
