//! Authorization error types

use thiserror::Error;
use warden_common::{AggregateError, StoreError};

/// Errors surfaced by authorizers and the composition machinery.
#[derive(Debug, Error)]
pub enum AuthzError {
    #[error("error reading policy file {path}, line {line}: {reason}")]
    PolicyLoad {
        path: String,
        line: usize,
        reason: String,
    },

    #[error("error reading policy file {path}: {source}")]
    PolicyRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("authorization mode {0:?} is already registered")]
    AlreadyRegistered(String),

    #[error("unknown authorization mode {0:?}")]
    UnknownMode(String),

    #[error("lookup failure: {0}")]
    Lookup(#[from] StoreError),

    #[error("access review webhook unavailable: {0}")]
    WebhookUnavailable(String),

    #[error(transparent)]
    Aggregate(#[from] AggregateError),

    #[error("invalid authorization configuration: {0}")]
    Configuration(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl AuthzError {
    /// Whether a retry against the same backend may succeed
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::WebhookUnavailable(_))
    }
}
