//! Bootstrap-secret token authentication
//!
//! Bootstrap tokens have the form `<token-id>.<token-secret>` (6-character id,
//! 16-character secret, lowercase alphanumeric). They resolve against secrets
//! named `bootstrap-token-<id>` served by a `SecretLister` collaborator, and
//! authenticate as `system:bootstrap:<id>` in group `system:bootstrappers`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use regex::Regex;
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, OnceLock};
use warden_common::{StoreError, UserInfo};

use crate::authenticator::{PRIORITY_BOOTSTRAP, TokenAuthenticator};
use crate::error::AuthnError;

/// Secret type evaluated for bootstrap authentication.
pub const SECRET_TYPE_BOOTSTRAP_TOKEN: &str = "bootstrap.kubernetes.io/token";
/// Prefix of the secret name holding a bootstrap token.
pub const BOOTSTRAP_TOKEN_SECRET_PREFIX: &str = "bootstrap-token-";
/// Data key holding the public token id.
pub const TOKEN_ID_KEY: &str = "token-id";
/// Data key holding the private token secret.
pub const TOKEN_SECRET_KEY: &str = "token-secret";
/// Data key that must be "true" for the secret to authenticate anyone.
pub const USAGE_AUTHENTICATION_KEY: &str = "usage-bootstrap-authentication";
/// Data key holding a comma-separated list of extra groups.
pub const EXTRA_GROUPS_KEY: &str = "auth-extra-groups";
/// Data key holding an RFC 3339 expiry timestamp.
pub const EXPIRATION_KEY: &str = "expiration";
/// Username prefix for bootstrap identities.
pub const BOOTSTRAP_USER_PREFIX: &str = "system:bootstrap:";
/// Group carried by every bootstrap identity.
pub const GROUP_BOOTSTRAPPERS: &str = "system:bootstrappers";
/// Required prefix of any extra group declared by a bootstrap secret.
pub const EXTRA_GROUP_PREFIX: &str = "system:bootstrappers:";

const TOKEN_PATTERN: &str = r"^([a-z0-9]{6})\.([a-z0-9]{16})$";

/// A secret record served by the storage collaborator.
#[derive(Debug, Clone, Default)]
pub struct Secret {
    pub name: String,
    pub namespace: String,
    pub secret_type: String,
    pub data: HashMap<String, String>,
    /// Set when the secret is deleted and awaiting removal
    pub deletion_timestamp: Option<DateTime<Utc>>,
}

impl Secret {
    /// Look up a data value by key
    pub fn data(&self, key: &str) -> Option<&str> {
        self.data.get(key).map(String::as_str)
    }
}

/// Answers "get secret by name" from storage. `get` on a missing name returns
/// a distinguished `StoreError::NotFound`, not a generic error.
pub trait SecretLister: Send + Sync {
    fn get(&self, name: &str) -> Result<Secret, StoreError>;
}

/// In-memory secret store for embedding and tests
pub struct MemorySecretStore {
    secrets: RwLock<HashMap<String, Secret>>,
}

impl MemorySecretStore {
    pub fn new() -> Self {
        Self {
            secrets: RwLock::new(HashMap::new()),
        }
    }

    pub fn insert(&self, secret: Secret) {
        self.secrets.write().insert(secret.name.clone(), secret);
    }

    pub fn remove(&self, name: &str) {
        self.secrets.write().remove(name);
    }
}

impl Default for MemorySecretStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SecretLister for MemorySecretStore {
    fn get(&self, name: &str) -> Result<Secret, StoreError> {
        self.secrets
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| StoreError::not_found("secret", name))
    }
}

fn token_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(TOKEN_PATTERN).expect("static pattern is valid"))
}

/// Split a bearer token into (id, secret) if it has the bootstrap shape
pub fn parse_token(token: &str) -> Option<(&str, &str)> {
    let captures = token_regex().captures(token)?;
    let id = captures.get(1)?.as_str();
    let secret = captures.get(2)?.as_str();
    Some((id, secret))
}

/// Constant-time string comparison to prevent timing attacks
fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result: u8 = 0;
    for (x, y) in a.bytes().zip(b.bytes()) {
        result |= x ^ y;
    }
    result == 0
}

/// Authenticates bootstrap tokens against secrets from a `SecretLister`.
pub struct BootstrapTokenAuthenticator {
    lister: Arc<dyn SecretLister>,
}

impl BootstrapTokenAuthenticator {
    /// Create an authenticator backed by the given secret lister
    pub fn new(lister: Arc<dyn SecretLister>) -> Self {
        Self { lister }
    }

    fn groups(secret: &Secret) -> Result<Vec<String>, String> {
        let mut groups = BTreeSet::new();
        groups.insert(GROUP_BOOTSTRAPPERS.to_string());
        if let Some(extra) = secret.data(EXTRA_GROUPS_KEY) {
            for group in extra.split(',').map(str::trim).filter(|g| !g.is_empty()) {
                if !group.starts_with(EXTRA_GROUP_PREFIX) {
                    return Err(format!(
                        "group {group} does not have the required prefix {EXTRA_GROUP_PREFIX}"
                    ));
                }
                groups.insert(group.to_string());
            }
        }
        Ok(groups.into_iter().collect())
    }

    fn has_expired(secret: &Secret, now: DateTime<Utc>) -> bool {
        let Some(raw) = secret.data(EXPIRATION_KEY) else {
            return false;
        };
        match DateTime::parse_from_rfc3339(raw) {
            Ok(expiry) => expiry.with_timezone(&Utc) <= now,
            Err(err) => {
                tracing::debug!(
                    "bootstrap secret {} has unparseable expiration {raw}: {err}",
                    secret.name
                );
                true
            }
        }
    }
}

#[async_trait]
impl TokenAuthenticator for BootstrapTokenAuthenticator {
    fn name(&self) -> &str {
        "bootstrap"
    }

    fn priority(&self) -> i32 {
        PRIORITY_BOOTSTRAP
    }

    async fn authenticate_token(&self, token: &str) -> Result<Option<UserInfo>, AuthnError> {
        // Token isn't of the bootstrap form, ignore it.
        let Some((token_id, token_secret)) = parse_token(token) else {
            return Ok(None);
        };

        let secret_name = format!("{BOOTSTRAP_TOKEN_SECRET_PREFIX}{token_id}");
        let secret = match self.lister.get(&secret_name) {
            Ok(secret) => secret,
            Err(err) if err.is_not_found() => {
                tracing::debug!("no secret {secret_name} to match bootstrap bearer token");
                return Ok(None);
            }
            Err(err) => return Err(err.into()),
        };

        if secret.deletion_timestamp.is_some() {
            tracing::debug!("bootstrap secret {secret_name} is deleted and awaiting removal");
            return Ok(None);
        }

        if secret.secret_type != SECRET_TYPE_BOOTSTRAP_TOKEN {
            tracing::debug!(
                "bootstrap secret {secret_name} has invalid type {}",
                secret.secret_type
            );
            return Ok(None);
        }

        let stored_secret = secret.data(TOKEN_SECRET_KEY).unwrap_or_default();
        if !constant_time_eq(stored_secret, token_secret) {
            tracing::debug!("bootstrap secret {secret_name} has mismatched {TOKEN_SECRET_KEY}");
            return Ok(None);
        }

        if secret.data(TOKEN_ID_KEY) != Some(token_id) {
            tracing::debug!("bootstrap secret {secret_name} has mismatched {TOKEN_ID_KEY}");
            return Ok(None);
        }

        if Self::has_expired(&secret, Utc::now()) {
            tracing::debug!("bootstrap secret {secret_name} has expired");
            return Ok(None);
        }

        if secret.data(USAGE_AUTHENTICATION_KEY) != Some("true") {
            tracing::debug!("bootstrap secret {secret_name} not marked {USAGE_AUTHENTICATION_KEY}=true");
            return Ok(None);
        }

        let groups = match Self::groups(&secret) {
            Ok(groups) => groups,
            Err(reason) => {
                tracing::debug!("bootstrap secret {secret_name} has invalid {EXTRA_GROUPS_KEY}: {reason}");
                return Ok(None);
            }
        };

        Ok(Some(
            UserInfo::new(format!("{BOOTSTRAP_USER_PREFIX}{token_id}")).with_groups(groups),
        ))
    }
}
