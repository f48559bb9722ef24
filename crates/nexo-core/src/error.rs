use thiserror::Error;

/// Top-level error type shared by the Nexo crates.
///
/// Subsystem crates define their own error types and convert into or out of
/// `NexoError` so that `?` works across crate boundaries.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum NexoError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Validation error: {0}")]
    Validation(String),
}

impl From<toml::de::Error> for NexoError {
    fn from(err: toml::de::Error) -> Self {
        NexoError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for NexoError {
    fn from(err: toml::ser::Error) -> Self {
        NexoError::Config(err.to_string())
    }
}

/// A specialized `Result` type for Nexo operations.
pub type Result<T> = std::result::Result<T, NexoError>;
