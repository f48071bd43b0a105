//! Core domain errors.

use thiserror::Error;

/// Core domain errors for nfdeploy.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Invalid input.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A record is missing a field required to persist it.
    #[error("Missing required field: {0}")]
    MissingField(&'static str),
}
