//! Error types for registry transport operations

pub mod diagnostics;

pub use diagnostics::{Diagnostic, DiagnosticError};

use thiserror::Error;

pub type Result<T> = std::result::Result<T, RegistryError>;

#[derive(Debug, Error)]
pub enum RegistryError {
    /// The registry or auth endpoint answered in a way the protocol does not allow
    #[error("state error: {0}")]
    State(String),
    /// A final response status outside the accepted set, with decoded diagnostics
    #[error(transparent)]
    Diagnostic(#[from] DiagnosticError),
    /// Transport-level failures from the underlying HTTP client
    #[error("network error: {0}")]
    Network(String),
}

impl From<reqwest::Error> for RegistryError {
    fn from(err: reqwest::Error) -> Self {
        RegistryError::Network(err.to_string())
    }
}

impl From<serde_json::Error> for RegistryError {
    fn from(err: serde_json::Error) -> Self {
        RegistryError::State(format!("malformed JSON response: {}", err))
    }
}
