//! Token result caching

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use warden_common::{ExpiringCache, UserInfo};

use crate::authenticator::TokenAuthenticator;
use crate::error::AuthnError;

const CACHE_CAPACITY: usize = 4096;

/// Caches the outcome of an underlying authenticator per token.
///
/// Successful results are held for `success_ttl`, negative results for
/// `failure_ttl`; a zero TTL disables caching for that outcome. Errors are
/// never cached.
pub struct CachedTokenAuthenticator {
    inner: Arc<dyn TokenAuthenticator>,
    cache: ExpiringCache<String, Option<UserInfo>>,
    success_ttl: Duration,
    failure_ttl: Duration,
}

impl CachedTokenAuthenticator {
    /// Wrap `inner` with the given success/failure TTLs
    pub fn new(
        inner: Arc<dyn TokenAuthenticator>,
        success_ttl: Duration,
        failure_ttl: Duration,
    ) -> Self {
        Self {
            inner,
            cache: ExpiringCache::new(CACHE_CAPACITY),
            success_ttl,
            failure_ttl,
        }
    }
}

#[async_trait]
impl TokenAuthenticator for CachedTokenAuthenticator {
    fn name(&self) -> &str {
        "cached"
    }

    fn priority(&self) -> i32 {
        self.inner.priority()
    }

    fn available(&self) -> bool {
        self.inner.available()
    }

    async fn authenticate_token(&self, token: &str) -> Result<Option<UserInfo>, AuthnError> {
        if let Some(cached) = self.cache.get(&token.to_string()) {
            tracing::debug!("token cache hit");
            return Ok(cached);
        }

        let result = self.inner.authenticate_token(token).await?;
        let ttl = if result.is_some() {
            self.success_ttl
        } else {
            self.failure_ttl
        };
        if !ttl.is_zero() {
            self.cache.insert(token.to_string(), result.clone(), ttl);
        }
        Ok(result)
    }
}
