//! JWT-based authentication: OIDC and service-account tokens
//!
//! Both strategies validate a signed JWT; they differ in who issued it. OIDC
//! tokens come from an external identity provider and are checked against the
//! configured issuer and client id. Service-account tokens are minted by the
//! embedding process itself and signed with one of the configured
//! service-account keys.

use async_trait::async_trait;
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use serde_json::Value;
use warden_common::UserInfo;

use crate::authenticator::{PRIORITY_OIDC, PRIORITY_SERVICE_ACCOUNT, TokenAuthenticator};
use crate::error::AuthnError;

/// Issuer claim stamped into service-account tokens.
pub const SERVICE_ACCOUNT_ISSUER: &str = "warden/serviceaccount";
/// Username prefix of service-account identities.
pub const SERVICE_ACCOUNT_USER_PREFIX: &str = "system:serviceaccount:";
/// Group carried by every service account.
pub const GROUP_SERVICE_ACCOUNTS: &str = "system:serviceaccounts";

fn looks_like_jwt(token: &str) -> bool {
    token.split('.').count() == 3
}

/// Validates OIDC identity tokens against a single issuer's key.
///
/// The `sub` claim (or a configured username claim) becomes the user name and
/// an optional groups claim becomes the group list. Tokens that are not JWTs,
/// or fail signature/claim validation, are a negative result, not an error.
pub struct OidcAuthenticator {
    issuer: String,
    client_id: String,
    key: DecodingKey,
    algorithm: Algorithm,
    username_claim: String,
    groups_claim: Option<String>,
}

impl OidcAuthenticator {
    /// Create an authenticator for the given issuer and client id
    pub fn new(
        issuer: impl Into<String>,
        client_id: impl Into<String>,
        key: DecodingKey,
    ) -> Self {
        Self {
            issuer: issuer.into(),
            client_id: client_id.into(),
            key,
            algorithm: Algorithm::RS256,
            username_claim: "sub".to_string(),
            groups_claim: None,
        }
    }

    /// Set the expected signing algorithm (default RS256)
    pub fn with_algorithm(mut self, algorithm: Algorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    /// Use a different claim as the user name
    pub fn with_username_claim(mut self, claim: impl Into<String>) -> Self {
        self.username_claim = claim.into();
        self
    }

    /// Read group memberships from the given claim
    pub fn with_groups_claim(mut self, claim: impl Into<String>) -> Self {
        self.groups_claim = Some(claim.into());
        self
    }

    fn validation(&self) -> Validation {
        let mut validation = Validation::new(self.algorithm);
        validation.set_issuer(&[&self.issuer]);
        validation.set_audience(&[&self.client_id]);
        validation
    }
}

#[async_trait]
impl TokenAuthenticator for OidcAuthenticator {
    fn name(&self) -> &str {
        "oidc"
    }

    fn priority(&self) -> i32 {
        PRIORITY_OIDC
    }

    async fn authenticate_token(&self, token: &str) -> Result<Option<UserInfo>, AuthnError> {
        if !looks_like_jwt(token) {
            return Ok(None);
        }

        let claims = match decode::<Value>(token, &self.key, &self.validation()) {
            Ok(data) => data.claims,
            Err(err) => {
                tracing::debug!("oidc token rejected: {err}");
                return Ok(None);
            }
        };

        let Some(name) = claims.get(&self.username_claim).and_then(Value::as_str) else {
            tracing::debug!("oidc token has no {} claim", self.username_claim);
            return Ok(None);
        };

        let mut user = UserInfo::new(name);
        if let Some(groups_claim) = &self.groups_claim {
            match claims.get(groups_claim) {
                Some(Value::Array(values)) => {
                    user.groups = values
                        .iter()
                        .filter_map(Value::as_str)
                        .map(str::to_string)
                        .collect();
                }
                Some(Value::String(group)) => user.groups = vec![group.clone()],
                Some(_) => {
                    tracing::debug!("oidc token {groups_claim} claim is not a string or array");
                    return Ok(None);
                }
                None => {}
            }
        }

        Ok(Some(user))
    }
}

/// Validates service-account JWTs signed with any of the configured keys.
///
/// The subject must be `system:serviceaccount:<namespace>:<name>`; the
/// identity carries `system:serviceaccounts` and the per-namespace group.
pub struct ServiceAccountAuthenticator {
    keys: Vec<DecodingKey>,
    algorithm: Algorithm,
}

impl ServiceAccountAuthenticator {
    /// Create an authenticator trying each of the given keys in order
    pub fn new(keys: Vec<DecodingKey>) -> Self {
        Self {
            keys,
            algorithm: Algorithm::RS256,
        }
    }

    /// Set the expected signing algorithm (default RS256)
    pub fn with_algorithm(mut self, algorithm: Algorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    fn validation(&self) -> Validation {
        let mut validation = Validation::new(self.algorithm);
        validation.set_issuer(&[SERVICE_ACCOUNT_ISSUER]);
        // Legacy service-account tokens carry neither exp nor aud.
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.set_required_spec_claims::<&str>(&[]);
        validation
    }
}

#[async_trait]
impl TokenAuthenticator for ServiceAccountAuthenticator {
    fn name(&self) -> &str {
        "service-account"
    }

    fn priority(&self) -> i32 {
        PRIORITY_SERVICE_ACCOUNT
    }

    fn available(&self) -> bool {
        !self.keys.is_empty()
    }

    async fn authenticate_token(&self, token: &str) -> Result<Option<UserInfo>, AuthnError> {
        if !looks_like_jwt(token) {
            return Ok(None);
        }

        let validation = self.validation();
        let claims = match self
            .keys
            .iter()
            .find_map(|key| decode::<Value>(token, key, &validation).ok())
        {
            Some(data) => data.claims,
            None => {
                tracing::debug!("service account token matched no configured key");
                return Ok(None);
            }
        };

        let Some(subject) = claims.get("sub").and_then(Value::as_str) else {
            return Ok(None);
        };
        let Some(qualified) = subject.strip_prefix(SERVICE_ACCOUNT_USER_PREFIX) else {
            tracing::debug!("service account token subject {subject} has unexpected form");
            return Ok(None);
        };
        let Some((namespace, _name)) = qualified.split_once(':') else {
            tracing::debug!("service account token subject {subject} has unexpected form");
            return Ok(None);
        };

        Ok(Some(UserInfo::new(subject).with_groups(vec![
            GROUP_SERVICE_ACCOUNTS.to_string(),
            format!("{GROUP_SERVICE_ACCOUNTS}:{namespace}"),
        ])))
    }
}
