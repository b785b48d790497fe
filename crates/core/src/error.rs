use thiserror::Error;

#[derive(Error, Debug)]
pub enum InjectorError {
    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Container index {0} out of range")]
    ContainerIndex(usize),
}

pub type Result<T> = std::result::Result<T, InjectorError>;
