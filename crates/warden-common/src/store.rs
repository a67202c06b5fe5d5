//! Errors reported by storage collaborators
//!
//! Lister interfaces (secrets, roles, bindings) are implemented outside the
//! engine; this module pins down how they report failures so that "the record
//! does not exist" stays distinguishable from "the lookup itself failed".

use thiserror::Error;

/// Error returned by a lister lookup
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{kind} not found: {name}")]
    NotFound { kind: &'static str, name: String },

    #[error("store error: {0}")]
    Internal(String),
}

impl StoreError {
    /// A distinguished not-found error for the given record kind and name
    pub fn not_found(kind: &'static str, name: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            name: name.into(),
        }
    }

    /// Whether this error means the record does not exist
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}
