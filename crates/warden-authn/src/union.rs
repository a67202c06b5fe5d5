//! Priority-ordered authenticator aggregate

use async_trait::async_trait;
use std::sync::Arc;
use warden_common::UserInfo;

use crate::authenticator::TokenAuthenticator;
use crate::error::AuthnError;

/// Aggregate of token authenticators, tried in ascending priority order.
///
/// Unavailable constituents are skipped at registration time. The first
/// constituent that recognizes the token wins; an infrastructure error from a
/// constituent aborts the chain. If nobody recognizes the token the result is
/// `Ok(None)` — authentication failed, which is not an error.
pub struct TokenAuthenticators {
    authenticators: Vec<Arc<dyn TokenAuthenticator>>,
}

impl TokenAuthenticators {
    /// Create an empty aggregate
    pub fn new() -> Self {
        Self {
            authenticators: Vec::new(),
        }
    }

    /// Register an authenticator, keeping the list sorted by priority
    pub fn add<A: TokenAuthenticator + 'static>(&mut self, authenticator: A) -> &mut Self {
        self.add_arc(Arc::new(authenticator))
    }

    /// Register an Arc-wrapped authenticator
    pub fn add_arc(&mut self, authenticator: Arc<dyn TokenAuthenticator>) -> &mut Self {
        if !authenticator.available() {
            tracing::debug!("authn.{} is unavailable, skipping", authenticator.name());
            return self;
        }
        tracing::debug!(
            "add token authenticator {} priority {}",
            authenticator.name(),
            authenticator.priority()
        );
        self.authenticators.push(authenticator);
        self.authenticators.sort_by_key(|a| a.priority());
        self
    }

    /// Whether no authenticators are registered
    pub fn is_empty(&self) -> bool {
        self.authenticators.is_empty()
    }

    /// Number of registered authenticators
    pub fn len(&self) -> usize {
        self.authenticators.len()
    }
}

impl Default for TokenAuthenticators {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TokenAuthenticator for TokenAuthenticators {
    fn name(&self) -> &str {
        "union"
    }

    async fn authenticate_token(&self, token: &str) -> Result<Option<UserInfo>, AuthnError> {
        for authenticator in &self.authenticators {
            match authenticator.authenticate_token(token).await? {
                Some(user) => {
                    tracing::debug!("authn.{} authenticated {}", authenticator.name(), user.name);
                    return Ok(Some(user));
                }
                None => continue,
            }
        }
        Ok(None)
    }
}
