use injector_core::InjectorError;
use injector_rules::loader::RuleError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SynthError {
    /// No controller configuration has been applied yet.
    #[error("instrumentor configuration not read from configmap")]
    MissingConfiguration,

    #[error("cannot find OTel collector definition {0}")]
    CollectorNotFound(String),

    #[error("cannot read namespace {0}")]
    NamespaceNotFound(String),

    #[error("could not deserialize {kind} object: {message}")]
    Decode { kind: String, message: String },

    #[error("Patch encoding error: {0}")]
    Encode(#[from] InjectorError),

    #[error("Rule error: {0}")]
    Rule(#[from] RuleError),
}

pub type Result<T> = std::result::Result<T, SynthError>;
