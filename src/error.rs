//! Error taxonomy shared by both subcommands.
//!
//! Every variant is terminal for the invocation: `main` returns the error and
//! the process exits with status 1.  Nothing is retried.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BackendError {
    /// Bad input: an invalid flag value or a list root that is not a
    /// directory.  Raised before any side effect.
    #[error("{0}")]
    Usage(String),

    /// A required tool is missing or the identity check failed.  Raised
    /// before any side effect.
    #[error("{what}\n  hint: {hint}")]
    Preflight { what: String, hint: String },

    /// Directory creation, file write, or `terraform init` failed.  Anything
    /// created before the failing step is left in place.
    #[error("{0}")]
    Operation(String),

    #[error("configuration error: {0}")]
    Config(String),
}

impl BackendError {
    pub fn usage(msg: impl Into<String>) -> Self {
        Self::Usage(msg.into())
    }

    pub fn preflight(what: impl Into<String>, hint: impl Into<String>) -> Self {
        Self::Preflight {
            what: what.into(),
            hint: hint.into(),
        }
    }

    pub fn operation(msg: impl Into<String>) -> Self {
        Self::Operation(msg.into())
    }
}
