//! Authentication error types

use thiserror::Error;
use warden_common::StoreError;

/// Errors surfaced by token authenticators.
///
/// "This token is not mine" and "the credential is wrong" are not errors;
/// authenticators report those as a negative result. Errors are reserved for
/// infrastructure failures that should abort the authentication chain.
#[derive(Debug, Error)]
pub enum AuthnError {
    #[error("lookup failure: {0}")]
    Lookup(#[from] StoreError),

    #[error("error reading token file {path}, line {line}: {reason}")]
    TokenFile {
        path: String,
        line: usize,
        reason: String,
    },

    #[error("error reading token file {path}: {source}")]
    TokenFileIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("token review webhook unavailable: {0}")]
    WebhookUnavailable(String),

    #[error("invalid authentication configuration: {0}")]
    Configuration(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl AuthnError {
    /// Whether a retry against the same backend may succeed
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::WebhookUnavailable(_))
    }
}
