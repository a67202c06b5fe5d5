//! Authentication configuration and aggregate assembly
//!
//! The embedding process resolves flags/files into `AuthenticationConfig`,
//! validates it once at startup, and calls `build` with the storage
//! collaborators to obtain the composed authenticator. Configuration errors
//! are fatal: the process must not serve traffic with an invalid security
//! configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use warden_common::{AggregateError, Backoff};

use crate::authenticator::TokenAuthenticator;
use crate::bootstrap::{BootstrapTokenAuthenticator, SecretLister};
use crate::cache::CachedTokenAuthenticator;
use crate::error::AuthnError;
use crate::group_adder::GroupAdder;
use crate::tokenfile::TokenFileAuthenticator;
use crate::union::TokenAuthenticators;
use crate::webhook::{TokenReviewClient, WebhookTokenAuthenticator};

#[cfg(feature = "jwt")]
use crate::jwt::{OidcAuthenticator, ServiceAccountAuthenticator};

fn default_webhook_cache_authenticated_ttl_secs() -> u64 {
    120
}

fn default_webhook_cache_unauthenticated_ttl_secs() -> u64 {
    30
}

fn default_token_success_cache_ttl_secs() -> u64 {
    10
}

/// All authentication options consumed by the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthenticationConfig {
    /// Static token file (`token,user,uid[,"g1,g2"]` records)
    pub token_auth_file: Option<PathBuf>,
    /// Enable bootstrap-secret token authentication
    pub enable_bootstrap_token_auth: bool,
    /// OIDC issuer URL; requires `oidc_client_id`
    pub oidc_issuer_url: Option<String>,
    /// OIDC client id the tokens must be addressed to
    pub oidc_client_id: Option<String>,
    /// Claim to use as the user name (default "sub")
    pub oidc_username_claim: Option<String>,
    /// Claim holding group memberships
    pub oidc_groups_claim: Option<String>,
    /// PEM files holding service-account verification keys
    pub service_account_key_files: Vec<PathBuf>,
    /// Connection config file for the token-review webhook
    pub webhook_config_file: Option<PathBuf>,
    /// TTL for cached recognized tokens from the webhook
    pub webhook_cache_authenticated_ttl_secs: u64,
    /// TTL for cached rejected tokens from the webhook
    pub webhook_cache_unauthenticated_ttl_secs: u64,
    /// Retry schedule for the webhook call
    pub retry_backoff: Backoff,
    /// TTL for caching successful authentications across all strategies
    pub token_success_cache_ttl_secs: u64,
    /// TTL for caching failed authentications across all strategies
    pub token_failure_cache_ttl_secs: u64,
}

impl Default for AuthenticationConfig {
    fn default() -> Self {
        Self {
            token_auth_file: None,
            enable_bootstrap_token_auth: false,
            oidc_issuer_url: None,
            oidc_client_id: None,
            oidc_username_claim: None,
            oidc_groups_claim: None,
            service_account_key_files: Vec::new(),
            webhook_config_file: None,
            webhook_cache_authenticated_ttl_secs: default_webhook_cache_authenticated_ttl_secs(),
            webhook_cache_unauthenticated_ttl_secs: default_webhook_cache_unauthenticated_ttl_secs(),
            retry_backoff: Backoff::default_webhook(),
            token_success_cache_ttl_secs: default_token_success_cache_ttl_secs(),
            token_failure_cache_ttl_secs: 0,
        }
    }
}

impl AuthenticationConfig {
    /// Check invalid option combinations, reporting every problem at once
    pub fn validate(&self) -> Result<(), AggregateError> {
        let mut errors = AggregateError::new();

        if self.oidc_issuer_url.is_some() && self.oidc_client_id.is_none() {
            errors.push("oidc-issuer-url requires oidc-client-id");
        }
        if self.oidc_client_id.is_some() && self.oidc_issuer_url.is_none() {
            errors.push("oidc-client-id requires oidc-issuer-url");
        }
        if !cfg!(feature = "jwt")
            && (self.oidc_issuer_url.is_some() || !self.service_account_key_files.is_empty())
        {
            errors.push("OIDC and service-account authentication require the jwt feature");
        }
        if self.retry_backoff.max_steps == 0 {
            errors.push("webhook retry backoff steps must be greater than 0");
        }

        errors.into_result()
    }

    /// Assemble the composed authenticator from this configuration and the
    /// supplied collaborators.
    pub fn build(
        &self,
        resources: AuthenticatorResources,
    ) -> Result<Arc<dyn TokenAuthenticator>, AuthnError> {
        let mut union = TokenAuthenticators::new();

        if self.enable_bootstrap_token_auth {
            let lister = resources.secret_lister.clone().ok_or_else(|| {
                AuthnError::Configuration(
                    "bootstrap token authentication requires a secret lister".to_string(),
                )
            })?;
            union.add(BootstrapTokenAuthenticator::new(lister));
        }

        if let Some(path) = &self.token_auth_file {
            union.add(TokenFileAuthenticator::new_csv(path)?);
        }

        #[cfg(feature = "jwt")]
        {
            let mut keys = resources.service_account_keys;
            for path in &self.service_account_key_files {
                let pem = std::fs::read(path).map_err(|err| {
                    AuthnError::Configuration(format!(
                        "cannot read service account key file {}: {err}",
                        path.display()
                    ))
                })?;
                keys.push(jsonwebtoken::DecodingKey::from_rsa_pem(&pem).map_err(|err| {
                    AuthnError::Configuration(format!(
                        "invalid service account key file {}: {err}",
                        path.display()
                    ))
                })?);
            }
            if !keys.is_empty() {
                union.add(ServiceAccountAuthenticator::new(keys));
            }

            if let (Some(issuer), Some(client_id)) = (&self.oidc_issuer_url, &self.oidc_client_id)
            {
                let key = resources.oidc_key.ok_or_else(|| {
                    AuthnError::Configuration(
                        "OIDC authentication requires a decoding key for the issuer".to_string(),
                    )
                })?;
                let mut oidc = OidcAuthenticator::new(issuer.clone(), client_id.clone(), key);
                if let Some(claim) = &self.oidc_username_claim {
                    oidc = oidc.with_username_claim(claim.clone());
                }
                if let Some(claim) = &self.oidc_groups_claim {
                    oidc = oidc.with_groups_claim(claim.clone());
                }
                union.add(oidc);
            }
        }
        #[cfg(not(feature = "jwt"))]
        {
            if self.oidc_issuer_url.is_some() || !self.service_account_key_files.is_empty() {
                return Err(AuthnError::Configuration(
                    "OIDC and service-account authentication require the jwt feature".to_string(),
                ));
            }
        }

        if let Some(client) = resources.token_review_client {
            union.add(self.webhook_authenticator(client));
        } else if let Some(path) = &self.webhook_config_file {
            #[cfg(feature = "webhook")]
            {
                let config = crate::webhook::WebhookConnectionConfig::from_file(path)?;
                let client = crate::webhook::HttpTokenReviewClient::new(&config)?;
                union.add(self.webhook_authenticator(Arc::new(client)));
            }
            #[cfg(not(feature = "webhook"))]
            {
                return Err(AuthnError::Configuration(format!(
                    "webhook config file {} requires the webhook feature",
                    path.display()
                )));
            }
        }

        let mut authenticator: Arc<dyn TokenAuthenticator> = Arc::new(union);

        if self.token_success_cache_ttl_secs > 0 || self.token_failure_cache_ttl_secs > 0 {
            authenticator = Arc::new(CachedTokenAuthenticator::new(
                authenticator,
                Duration::from_secs(self.token_success_cache_ttl_secs),
                Duration::from_secs(self.token_failure_cache_ttl_secs),
            ));
        }

        Ok(Arc::new(GroupAdder::authenticated(authenticator)))
    }

    fn webhook_authenticator(&self, client: Arc<dyn TokenReviewClient>) -> WebhookTokenAuthenticator {
        WebhookTokenAuthenticator::new(
            client,
            Duration::from_secs(self.webhook_cache_authenticated_ttl_secs),
            Duration::from_secs(self.webhook_cache_unauthenticated_ttl_secs),
            self.retry_backoff,
        )
    }
}

/// Collaborators the configuration cannot carry itself: storage listers, key
/// material, and (mainly for tests) a pre-built token-review client.
pub struct AuthenticatorResources {
    /// Secret lister backing bootstrap token authentication
    pub secret_lister: Option<Arc<dyn SecretLister>>,
    /// Decoding key for the configured OIDC issuer
    #[cfg(feature = "jwt")]
    pub oidc_key: Option<jsonwebtoken::DecodingKey>,
    /// Service-account keys supplied directly instead of via key files
    #[cfg(feature = "jwt")]
    pub service_account_keys: Vec<jsonwebtoken::DecodingKey>,
    /// Token-review client overriding the HTTP transport
    pub token_review_client: Option<Arc<dyn TokenReviewClient>>,
}

impl Default for AuthenticatorResources {
    fn default() -> Self {
        Self {
            secret_lister: None,
            #[cfg(feature = "jwt")]
            oidc_key: None,
            #[cfg(feature = "jwt")]
            service_account_keys: Vec::new(),
            token_review_client: None,
        }
    }
}
