//! Remote access-review authorization
//!
//! Delegates the decision to a remote policy service. The remote call never
//! happens per request: decisions are cached in two TTL regions keyed by the
//! canonical serialization of the review, and cache misses retry per the
//! configured backoff schedule. Exhausting the schedule surfaces an error —
//! which union composition treats as no-opinion-with-error, so another
//! allowing strategy can still win — never an implicit deny.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use warden_common::{Attributes, Backoff, ExpiringCache, UserInfo, retry};

use crate::authorizer::{Authorizer, Decision, RuleResolver, RuleSet};
use crate::error::AuthzError;

const CACHE_CAPACITY: usize = 8192;

/// The maximum length of requester-controlled attributes to allow caching.
const MAX_CONTROLLED_ATTR_CACHE_SIZE: usize = 10000;

/// Resource half of an access review.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceAttributes {
    #[serde(default)]
    pub namespace: String,
    #[serde(default)]
    pub verb: String,
    #[serde(default)]
    pub group: String,
    #[serde(default)]
    pub resource: String,
    #[serde(default)]
    pub subresource: String,
    #[serde(default)]
    pub name: String,
}

/// Non-resource half of an access review.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NonResourceAttributes {
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub verb: String,
}

/// The question sent to the remote service: who wants to do what.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessReviewSpec {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub user: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub groups: Vec<String>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub extra: HashMap<String, Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_attributes: Option<ResourceAttributes>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub non_resource_attributes: Option<NonResourceAttributes>,
}

impl AccessReviewSpec {
    /// Build the review for a request's attributes
    pub fn from_attributes(attrs: &Attributes) -> Self {
        let mut spec = Self {
            user: attrs.user.name.clone(),
            groups: attrs.user.groups.clone(),
            extra: attrs.user.extra.clone(),
            resource_attributes: None,
            non_resource_attributes: None,
        };
        if attrs.is_resource_request() {
            spec.resource_attributes = Some(ResourceAttributes {
                namespace: attrs.namespace.clone(),
                verb: attrs.verb.clone(),
                group: attrs.api_group.clone(),
                resource: attrs.resource.clone(),
                subresource: attrs.subresource.clone(),
                name: attrs.name.clone(),
            });
        } else {
            spec.non_resource_attributes = Some(NonResourceAttributes {
                path: attrs.path.clone(),
                verb: attrs.verb.clone(),
            });
        }
        spec
    }
}

/// The answer reported back by the remote service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewStatus {
    #[serde(default)]
    pub allowed: bool,
    #[serde(default)]
    pub denied: bool,
    #[serde(default)]
    pub reason: String,
}

/// Performs one remote access review. Transient failures should map to
/// `AuthzError::WebhookUnavailable` so the retry schedule applies.
#[async_trait]
pub trait AccessReviewClient: Send + Sync {
    async fn review(&self, spec: &AccessReviewSpec) -> Result<ReviewStatus, AuthzError>;
}

/// Authorizer delegating to a remote access-review service.
pub struct WebhookAuthorizer {
    client: Arc<dyn AccessReviewClient>,
    authorized: ExpiringCache<String, ReviewStatus>,
    unauthorized: ExpiringCache<String, ReviewStatus>,
    authorized_ttl: Duration,
    unauthorized_ttl: Duration,
    retry_backoff: Backoff,
}

impl WebhookAuthorizer {
    /// Create an authorizer delegating to `client`
    pub fn new(
        client: Arc<dyn AccessReviewClient>,
        authorized_ttl: Duration,
        unauthorized_ttl: Duration,
        retry_backoff: Backoff,
    ) -> Self {
        Self {
            client,
            authorized: ExpiringCache::new(CACHE_CAPACITY),
            unauthorized: ExpiringCache::new(CACHE_CAPACITY),
            authorized_ttl,
            unauthorized_ttl,
            retry_backoff,
        }
    }

    fn to_decision(status: &ReviewStatus) -> (Decision, String) {
        if status.denied && status.allowed {
            tracing::error!("access review returned both allow and deny, treating as deny");
            return (Decision::Deny, status.reason.clone());
        }
        if status.denied {
            return (Decision::Deny, status.reason.clone());
        }
        if status.allowed {
            return (Decision::Allow, status.reason.clone());
        }
        (Decision::NoOpinion, status.reason.clone())
    }
}

/// Whether it is safe to cache the given request attributes. Oversized
/// requester-controlled attributes may be a deliberate cache-flooding
/// attempt, so they skip the cache.
fn should_cache(attrs: &Attributes) -> bool {
    let controlled_size = attrs.namespace.len()
        + attrs.verb.len()
        + attrs.api_group.len()
        + attrs.resource.len()
        + attrs.subresource.len()
        + attrs.name.len()
        + attrs.path.len();
    controlled_size < MAX_CONTROLLED_ATTR_CACHE_SIZE
}

#[async_trait]
impl Authorizer for WebhookAuthorizer {
    async fn authorize(&self, attrs: &Attributes) -> Result<(Decision, String), AuthzError> {
        let spec = AccessReviewSpec::from_attributes(attrs);
        let key = serde_json::to_string(&spec).map_err(|err| {
            AuthzError::Internal(format!("cannot serialize access review: {err}"))
        })?;

        if let Some(status) = self
            .authorized
            .get(&key)
            .or_else(|| self.unauthorized.get(&key))
        {
            tracing::debug!("access review cache hit");
            return Ok(Self::to_decision(&status));
        }

        let status = retry(&self.retry_backoff, AuthzError::is_retryable, || {
            self.client.review(&spec)
        })
        .await
        .map_err(|err| {
            tracing::error!("failed to make webhook authorizer request: {err}");
            err
        })?;

        if should_cache(attrs) {
            if status.allowed && !status.denied {
                self.authorized
                    .insert(key, status.clone(), self.authorized_ttl);
            } else {
                self.unauthorized
                    .insert(key, status.clone(), self.unauthorized_ttl);
            }
        }
        Ok(Self::to_decision(&status))
    }
}

impl RuleResolver for WebhookAuthorizer {
    fn rules_for(&self, _user: &UserInfo, _namespace: &str) -> (RuleSet, Option<AuthzError>) {
        let rules = RuleSet {
            incomplete: true,
            ..Default::default()
        };
        (
            rules,
            Some(AuthzError::Internal(
                "webhook authorizer does not support user rule resolution".to_string(),
            )),
        )
    }
}

#[cfg(feature = "webhook")]
pub use self::http::{HttpReviewClient, WebhookConnectionConfig};

#[cfg(feature = "webhook")]
mod http {
    use super::*;
    use std::fs;
    use std::path::Path;

    /// Connection settings for the remote access-review service, loaded from
    /// a small JSON config file.
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
        pub fn from_file(path: impl AsRef<Path>) -> Result<Self, AuthzError> {
            let path = path.as_ref();
            let contents = fs::read_to_string(path).map_err(|err| {
                AuthzError::Configuration(format!(
                    "cannot read webhook config file {}: {err}",
                    path.display()
                ))
            })?;
            serde_json::from_str(&contents).map_err(|err| {
                AuthzError::Configuration(format!(
                    "invalid webhook config file {}: {err}",
                    path.display()
                ))
            })
        }
    }

    #[derive(Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct AccessReview {
        #[serde(default, skip_serializing_if = "String::is_empty")]
        api_version: String,
        #[serde(default)]
        spec: AccessReviewSpec,
        #[serde(default)]
        status: ReviewStatus,
    }

    /// Posts access reviews to a remote HTTP endpoint.
    pub struct HttpReviewClient {
        client: reqwest::Client,
        url: String,
        api_version: String,
    }

    impl HttpReviewClient {
        pub fn new(config: &WebhookConnectionConfig) -> Result<Self, AuthzError> {
            let client = reqwest::Client::builder()
                .timeout(Duration::from_millis(config.timeout_ms))
                .build()
                .map_err(|err| AuthzError::Configuration(err.to_string()))?;
            Ok(Self {
                client,
                url: config.url.clone(),
                api_version: String::new(),
            })
        }

        /// Stamp the given API version into posted reviews
        pub fn with_api_version(mut self, version: impl Into<String>) -> Self {
            self.api_version = version.into();
            self
        }
    }

    #[async_trait]
    impl AccessReviewClient for HttpReviewClient {
        async fn review(&self, spec: &AccessReviewSpec) -> Result<ReviewStatus, AuthzError> {
            let body = AccessReview {
                api_version: self.api_version.clone(),
                spec: spec.clone(),
                status: ReviewStatus::default(),
            };
            let response = self
                .client
                .post(&self.url)
                .json(&body)
                .send()
                .await
                .map_err(|err| AuthzError::WebhookUnavailable(err.to_string()))?;

            let status = response.status();
            if status.is_server_error() || status.as_u16() == 429 {
                return Err(AuthzError::WebhookUnavailable(format!(
                    "access review endpoint returned status {status}"
                )));
            }
            if !status.is_success() {
                return Err(AuthzError::Internal(format!(
                    "access review endpoint returned status {status}"
                )));
            }

            let review: AccessReview = response
                .json()
                .await
                .map_err(|err| AuthzError::Internal(err.to_string()))?;
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
        status: ReviewStatus,
    }

    impl MockReviewer {
        fn allowing() -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicU32::new(0),
                fail_times: 0,
                status: ReviewStatus {
                    allowed: true,
                    denied: false,
                    reason: String::new(),
                },
            })
        }
    }

    #[async_trait]
    impl AccessReviewClient for MockReviewer {
        async fn review(&self, _spec: &AccessReviewSpec) -> Result<ReviewStatus, AuthzError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.fail_times {
                return Err(AuthzError::WebhookUnavailable("down".into()));
            }
            Ok(self.status.clone())
        }
    }

    fn attrs(name: &str, verb: &str) -> Attributes {
        Attributes::resource(UserInfo::new(name), verb, "sales", "widgets")
    }

    fn authorizer(client: Arc<MockReviewer>) -> WebhookAuthorizer {
        WebhookAuthorizer::new(
            client,
            Duration::from_secs(300),
            Duration::from_secs(30),
            fast_backoff(),
        )
    }

    #[tokio::test]
    async fn test_identical_requests_hit_cache() {
        let client = MockReviewer::allowing();
        let authz = authorizer(client.clone());

        for _ in 0..2 {
            let (decision, _) = authz.authorize(&attrs("jane", "get")).await.unwrap();
            assert_eq!(decision, Decision::Allow);
        }
        assert_eq!(client.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_different_attributes_miss_cache() {
        let client = MockReviewer::allowing();
        let authz = authorizer(client.clone());

        authz.authorize(&attrs("jane", "get")).await.unwrap();
        authz.authorize(&attrs("jane", "delete")).await.unwrap();
        authz.authorize(&attrs("bob", "get")).await.unwrap();
        assert_eq!(client.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_denied_response_maps_to_deny() {
        let client = Arc::new(MockReviewer {
            calls: AtomicU32::new(0),
            fail_times: 0,
            status: ReviewStatus {
                allowed: false,
                denied: true,
                reason: "user may not read widgets".to_string(),
            },
        });
        let authz = authorizer(client);

        let (decision, reason) = authz.authorize(&attrs("jane", "get")).await.unwrap();
        assert_eq!(decision, Decision::Deny);
        assert_eq!(reason, "user may not read widgets");
    }

    #[tokio::test]
    async fn test_neither_flag_is_no_opinion() {
        let client = Arc::new(MockReviewer {
            calls: AtomicU32::new(0),
            fail_times: 0,
            status: ReviewStatus::default(),
        });
        let authz = authorizer(client);

        let (decision, _) = authz.authorize(&attrs("jane", "get")).await.unwrap();
        assert_eq!(decision, Decision::NoOpinion);
    }

    #[tokio::test]
    async fn test_exhausted_retries_surface_error() {
        let client = Arc::new(MockReviewer {
            calls: AtomicU32::new(0),
            fail_times: u32::MAX,
            status: ReviewStatus::default(),
        });
        let authz = authorizer(client.clone());

        let err = authz.authorize(&attrs("jane", "get")).await.unwrap_err();
        assert!(matches!(err, AuthzError::WebhookUnavailable(_)));
        assert_eq!(client.calls.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn test_transient_failure_recovers() {
        let client = Arc::new(MockReviewer {
            calls: AtomicU32::new(0),
            fail_times: 2,
            status: ReviewStatus {
                allowed: true,
                ..Default::default()
            },
        });
        let authz = authorizer(client);

        let (decision, _) = authz.authorize(&attrs("jane", "get")).await.unwrap();
        assert_eq!(decision, Decision::Allow);
    }

    #[tokio::test]
    async fn test_oversized_attributes_skip_cache() {
        let client = MockReviewer::allowing();
        let authz = authorizer(client.clone());

        let huge = Attributes::resource(
            UserInfo::new("jane"),
            "get",
            "sales",
            "x".repeat(MAX_CONTROLLED_ATTR_CACHE_SIZE),
        );
        authz.authorize(&huge).await.unwrap();
        authz.authorize(&huge).await.unwrap();
        assert_eq!(client.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_rule_resolution_unsupported() {
        let authz = authorizer(MockReviewer::allowing());
        let (rules, err) = authz.rules_for(&UserInfo::new("jane"), "sales");
        assert!(rules.incomplete);
        assert!(err.is_some());
    }
}
