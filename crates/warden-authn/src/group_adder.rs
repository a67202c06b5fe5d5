//! Authenticated-group decoration

use async_trait::async_trait;
use std::sync::Arc;
use warden_common::UserInfo;
use warden_common::user::GROUP_AUTHENTICATED;

use crate::authenticator::TokenAuthenticator;
use crate::error::AuthnError;

/// Wraps an authenticator and appends well-known groups to every identity it
/// produces. Used to stamp `system:authenticated` onto successful
/// authentications so group-based authorizers can rely on it.
pub struct GroupAdder {
    inner: Arc<dyn TokenAuthenticator>,
    groups: Vec<String>,
}

impl GroupAdder {
    /// Wrap `inner`, adding `system:authenticated` to every identity
    pub fn authenticated(inner: Arc<dyn TokenAuthenticator>) -> Self {
        Self::new(inner, vec![GROUP_AUTHENTICATED.to_string()])
    }

    /// Wrap `inner`, adding the given groups to every identity
    pub fn new(inner: Arc<dyn TokenAuthenticator>, groups: Vec<String>) -> Self {
        Self { inner, groups }
    }
}

#[async_trait]
impl TokenAuthenticator for GroupAdder {
    fn name(&self) -> &str {
        "group-adder"
    }

    fn priority(&self) -> i32 {
        self.inner.priority()
    }

    fn available(&self) -> bool {
        self.inner.available()
    }

    async fn authenticate_token(&self, token: &str) -> Result<Option<UserInfo>, AuthnError> {
        let Some(mut user) = self.inner.authenticate_token(token).await? else {
            return Ok(None);
        };
        for group in &self.groups {
            if !user.has_group(group) {
                user.groups.push(group.clone());
            }
        }
        Ok(Some(user))
    }
}
