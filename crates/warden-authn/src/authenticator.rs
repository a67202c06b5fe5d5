//! Token authenticator contract

use async_trait::async_trait;
use warden_common::UserInfo;

use crate::error::AuthnError;

/// Priority of the bootstrap-secret authenticator (tried first).
pub const PRIORITY_BOOTSTRAP: i32 = 10;
/// Priority of the static token-file authenticator.
pub const PRIORITY_TOKEN_FILE: i32 = 20;
/// Priority of the service-account JWT authenticator.
pub const PRIORITY_SERVICE_ACCOUNT: i32 = 30;
/// Priority of the OIDC authenticator.
pub const PRIORITY_OIDC: i32 = 40;
/// Priority of the token-review webhook authenticator (tried last).
pub const PRIORITY_WEBHOOK: i32 = 50;
/// Priority assigned to authenticators that do not declare one.
pub const PRIORITY_DEFAULT: i32 = 100;

/// A single token authentication strategy.
///
/// `authenticate_token` returns `Ok(Some(user))` when the token is recognized,
/// `Ok(None)` when the token is not this strategy's to judge (or fails its
/// checks), and `Err` only for infrastructure failures such as lister I/O.
#[async_trait]
pub trait TokenAuthenticator: Send + Sync {
    /// Strategy name for logging
    fn name(&self) -> &str;

    /// Evaluation order; lower values are tried first
    fn priority(&self) -> i32 {
        PRIORITY_DEFAULT
    }

    /// Whether the strategy is configured and usable
    fn available(&self) -> bool {
        true
    }

    /// Resolve a bearer token to an identity
    async fn authenticate_token(&self, token: &str) -> Result<Option<UserInfo>, AuthnError>;
}
