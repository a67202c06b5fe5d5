//! Remote token-review authentication
//!
//! Delegates token validation to a remote service. Results are cached in two
//! TTL regions (recognized vs. rejected tokens) and the remote call retries
//! per the configured backoff schedule; the wire payload is an opaque
//! token-review JSON document.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use warden_common::{Backoff, ExpiringCache, UserInfo, retry};

use crate::authenticator::{PRIORITY_WEBHOOK, TokenAuthenticator};
use crate::error::AuthnError;

const CACHE_CAPACITY: usize = 8192;

/// Review request sent to the remote service.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenReviewSpec {
    pub token: String,
}

/// Identity reported back by the remote service.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewUser {
    #[serde(default)]
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,
    #[serde(default)]
    pub groups: Vec<String>,
    #[serde(default)]
    pub extra: HashMap<String, Vec<String>>,
}

/// Outcome reported back by the remote service.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenReviewStatus {
    #[serde(default)]
    pub authenticated: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<ReviewUser>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Performs one remote token review. Transient failures should map to
/// `AuthnError::WebhookUnavailable` so the retry schedule applies.
#[async_trait]
pub trait TokenReviewClient: Send + Sync {
    async fn review(&self, spec: &TokenReviewSpec) -> Result<TokenReviewStatus, AuthnError>;
}

/// Authenticates tokens by asking a remote token-review service.
pub struct WebhookTokenAuthenticator {
    client: Arc<dyn TokenReviewClient>,
    retry_backoff: Backoff,
    authenticated: ExpiringCache<String, TokenReviewStatus>,
    unauthenticated: ExpiringCache<String, TokenReviewStatus>,
    authenticated_ttl: Duration,
    unauthenticated_ttl: Duration,
}

impl WebhookTokenAuthenticator {
    /// Create an authenticator delegating to `client`
    pub fn new(
        client: Arc<dyn TokenReviewClient>,
        authenticated_ttl: Duration,
        unauthenticated_ttl: Duration,
        retry_backoff: Backoff,
    ) -> Self {
        Self {
            client,
            retry_backoff,
            authenticated: ExpiringCache::new(CACHE_CAPACITY),
            unauthenticated: ExpiringCache::new(CACHE_CAPACITY),
            authenticated_ttl,
            unauthenticated_ttl,
        }
    }

    fn to_user(status: &TokenReviewStatus) -> Option<UserInfo> {
        if !status.authenticated {
            if let Some(error) = &status.error {
                tracing::debug!("token review rejected token: {error}");
            }
            return None;
        }
        let reviewed = status.user.as_ref()?;
        let mut user = UserInfo::new(reviewed.username.clone()).with_groups(reviewed.groups.clone());
        user.uid = reviewed.uid.clone();
        user.extra = reviewed.extra.clone();
        Some(user)
    }
}

#[async_trait]
impl TokenAuthenticator for WebhookTokenAuthenticator {
    fn name(&self) -> &str {
        "webhook"
    }

    fn priority(&self) -> i32 {
        PRIORITY_WEBHOOK
    }

    async fn authenticate_token(&self, token: &str) -> Result<Option<UserInfo>, AuthnError> {
        let key = token.to_string();
        if let Some(status) = self
            .authenticated
            .get(&key)
            .or_else(|| self.unauthenticated.get(&key))
        {
            tracing::debug!("token review cache hit");
            return Ok(Self::to_user(&status));
        }

        let spec = TokenReviewSpec {
            token: token.to_string(),
        };
        let status = retry(&self.retry_backoff, AuthnError::is_retryable, || {
            self.client.review(&spec)
        })
        .await
        .map_err(|err| {
            tracing::error!("failed to make webhook authenticator request: {err}");
            err
        })?;

        if status.authenticated {
            self.authenticated
                .insert(key, status.clone(), self.authenticated_ttl);
        } else {
            self.unauthenticated
                .insert(key, status.clone(), self.unauthenticated_ttl);
        }
        Ok(Self::to_user(&status))
    }
}

#[cfg(feature = "webhook")]
pub use self::http::{HttpTokenReviewClient, WebhookConnectionConfig};

#[cfg(feature = "webhook")]
mod http {
    use super::*;
    use std::fs;
    use std::path::Path;

    /// Connection settings for the remote token-review service, loaded from a
    /// small JSON config file.
    #[derive(Debug, Clone, Deserialize)]
    pub struct WebhookConnectionConfig {
        pub url: String,
        #[serde(default = "default_timeout_ms")]
        pub timeout_ms: u64,
    }

    fn default_timeout_ms() -> u64 {
        30_000
    }

    impl WebhookConnectionConfig {
        pub fn from_file(path: impl AsRef<Path>) -> Result<Self, AuthnError> {
            let path = path.as_ref();
            let contents = fs::read_to_string(path).map_err(|err| {
                AuthnError::Configuration(format!(
                    "cannot read webhook config file {}: {err}",
                    path.display()
                ))
            })?;
            serde_json::from_str(&contents).map_err(|err| {
                AuthnError::Configuration(format!(
                    "invalid webhook config file {}: {err}",
                    path.display()
                ))
            })
        }
    }

    #[derive(Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct TokenReview {
        #[serde(default)]
        spec: TokenReviewSpec,
        #[serde(default)]
        status: TokenReviewStatus,
    }

    /// Posts token reviews to a remote HTTP endpoint.
    pub struct HttpTokenReviewClient {
        client: reqwest::Client,
        url: String,
    }

    impl HttpTokenReviewClient {
        pub fn new(config: &WebhookConnectionConfig) -> Result<Self, AuthnError> {
            let client = reqwest::Client::builder()
                .timeout(Duration::from_millis(config.timeout_ms))
                .build()
                .map_err(|err| AuthnError::Configuration(err.to_string()))?;
            Ok(Self {
                client,
                url: config.url.clone(),
            })
        }
    }

    #[async_trait]
    impl TokenReviewClient for HttpTokenReviewClient {
        async fn review(&self, spec: &TokenReviewSpec) -> Result<TokenReviewStatus, AuthnError> {
            let body = TokenReview {
                spec: spec.clone(),
                status: TokenReviewStatus::default(),
            };
            let response = self
                .client
                .post(&self.url)
                .json(&body)
                .send()
                .await
                .map_err(|err| AuthnError::WebhookUnavailable(err.to_string()))?;

            let status = response.status();
            if status.is_server_error() || status.as_u16() == 429 {
                return Err(AuthnError::WebhookUnavailable(format!(
                    "token review endpoint returned status {status}"
                )));
            }
            if !status.is_success() {
                return Err(AuthnError::Internal(format!(
                    "token review endpoint returned status {status}"
                )));
            }

            let review: TokenReview = response
                .json()
                .await
                .map_err(|err| AuthnError::Internal(err.to_string()))?;
            Ok(review.status)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_backoff() -> Backoff {
        Backoff {
            initial_delay_ms: 1,
            factor: 1.5,
            jitter: 0.2,
            max_steps: 5,
        }
    }

    struct MockReviewer {
        calls: AtomicU32,
        fail_times: u32,
        status: TokenReviewStatus,
    }

    #[async_trait]
    impl TokenReviewClient for MockReviewer {
        async fn review(&self, _spec: &TokenReviewSpec) -> Result<TokenReviewStatus, AuthnError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.fail_times {
                return Err(AuthnError::WebhookUnavailable("down".into()));
            }
            Ok(self.status.clone())
        }
    }

    fn recognized(name: &str) -> TokenReviewStatus {
        TokenReviewStatus {
            authenticated: true,
            user: Some(ReviewUser {
                username: name.to_string(),
                groups: vec!["ops".to_string()],
                ..Default::default()
            }),
            error: None,
        }
    }

    #[tokio::test]
    async fn test_cache_hit_avoids_remote_call() {
        let client = Arc::new(MockReviewer {
            calls: AtomicU32::new(0),
            fail_times: 0,
            status: recognized("jane"),
        });
        let authn = WebhookTokenAuthenticator::new(
            client.clone(),
            Duration::from_secs(60),
            Duration::from_secs(60),
            fast_backoff(),
        );

        for _ in 0..3 {
            let user = authn.authenticate_token("tok").await.unwrap().unwrap();
            assert_eq!(user.name, "jane");
            assert!(user.has_group("ops"));
        }
        assert_eq!(client.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_rejected_tokens_cached_separately() {
        let client = Arc::new(MockReviewer {
            calls: AtomicU32::new(0),
            fail_times: 0,
            status: TokenReviewStatus {
                authenticated: false,
                user: None,
                error: Some("unknown token".to_string()),
            },
        });
        let authn = WebhookTokenAuthenticator::new(
            client.clone(),
            Duration::from_secs(60),
            Duration::from_secs(60),
            fast_backoff(),
        );

        for _ in 0..2 {
            assert!(authn.authenticate_token("bad").await.unwrap().is_none());
        }
        assert_eq!(client.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_retries_then_surfaces_unavailable() {
        let client = Arc::new(MockReviewer {
            calls: AtomicU32::new(0),
            fail_times: u32::MAX,
            status: recognized("jane"),
        });
        let authn = WebhookTokenAuthenticator::new(
            client.clone(),
            Duration::from_secs(60),
            Duration::from_secs(60),
            fast_backoff(),
        );

        let err = authn.authenticate_token("tok").await.unwrap_err();
        assert!(matches!(err, AuthnError::WebhookUnavailable(_)));
        assert_eq!(client.calls.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn test_recovers_within_backoff_schedule() {
        let client = Arc::new(MockReviewer {
            calls: AtomicU32::new(0),
            fail_times: 2,
            status: recognized("jane"),
        });
        let authn = WebhookTokenAuthenticator::new(
            client,
            Duration::from_secs(60),
            Duration::from_secs(60),
            fast_backoff(),
        );

        let user = authn.authenticate_token("tok").await.unwrap().unwrap();
        assert_eq!(user.name, "jane");
    }
}
