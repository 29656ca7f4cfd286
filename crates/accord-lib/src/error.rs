use thiserror::Error;

/// Errors surfaced by the comparison pipelines.
#[derive(Debug, Error)]
pub enum Error {
    /// An input was rejected before any computation started.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A step that structurally needs data (an interpolation domain, a
    /// rate function) had nothing to work with.
    #[error("insufficient data: {0}")]
    InsufficientData(String),
}

pub type Result<T> = std::result::Result<T, Error>;
