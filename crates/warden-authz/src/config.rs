//! Authorization configuration and validation
//!
//! Configuration selects an ordered list of registered mode names plus the
//! mode-specific settings. Validation collects every problem into one
//! aggregate error so operators see the whole misconfiguration in one pass;
//! any validation failure is fatal at startup.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::PathBuf;
use warden_common::{AggregateError, Backoff};

use crate::registry::AuthorizerRegistry;

/// Mode name of the always-allow authorizer.
pub const MODE_ALWAYS_ALLOW: &str = "AlwaysAllow";
/// Mode name of the always-deny authorizer.
pub const MODE_ALWAYS_DENY: &str = "AlwaysDeny";
/// Mode name of the ABAC policy-file authorizer.
pub const MODE_ABAC: &str = "ABAC";
/// Mode name of the RBAC authorizer.
pub const MODE_RBAC: &str = "RBAC";
/// Mode name of the access-review webhook authorizer.
pub const MODE_WEBHOOK: &str = "Webhook";
/// Mode name of the login authorizer.
pub const MODE_LOGIN: &str = "Login";

fn default_always_allow_paths() -> Vec<String> {
    vec![
        "/healthz".to_string(),
        "/readyz".to_string(),
        "/livez".to_string(),
    ]
}

fn default_always_allow_groups() -> Vec<String> {
    vec![warden_common::user::GROUP_MASTERS.to_string()]
}

fn default_webhook_cache_authorized_ttl_secs() -> u64 {
    300
}

fn default_webhook_cache_unauthorized_ttl_secs() -> u64 {
    30
}

fn default_webhook_version() -> String {
    "v1".to_string()
}

/// All authorization options consumed by the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthorizationConfig {
    /// Ordered list of modes to compose; names must be registered
    pub modes: Vec<String>,
    /// ABAC policy file; required by (and only valid with) mode ABAC
    pub policy_file: Option<PathBuf>,
    /// Webhook connection config file; required by (and only valid with)
    /// mode Webhook
    pub webhook_config_file: Option<PathBuf>,
    /// API version of access reviews sent to the webhook
    pub webhook_version: String,
    /// TTL for cached authorized webhook responses
    pub webhook_cache_authorized_ttl_secs: u64,
    /// TTL for cached unauthorized webhook responses
    pub webhook_cache_unauthorized_ttl_secs: u64,
    /// Retry schedule for the webhook call
    pub retry_backoff: Backoff,
    /// HTTP paths excluded from authorization; trailing `*` is a prefix match
    pub always_allow_paths: Vec<String>,
    /// Groups allowed to take any action
    pub always_allow_groups: Vec<String>,
}

impl Default for AuthorizationConfig {
    fn default() -> Self {
        Self {
            modes: Vec::new(),
            policy_file: None,
            webhook_config_file: None,
            webhook_version: default_webhook_version(),
            webhook_cache_authorized_ttl_secs: default_webhook_cache_authorized_ttl_secs(),
            webhook_cache_unauthorized_ttl_secs: default_webhook_cache_unauthorized_ttl_secs(),
            retry_backoff: Backoff::default_webhook(),
            always_allow_paths: default_always_allow_paths(),
            always_allow_groups: default_always_allow_groups(),
        }
    }
}

impl AuthorizationConfig {
    /// A configuration running only the given modes
    pub fn with_modes(modes: &[&str]) -> Self {
        Self {
            modes: modes.iter().map(|m| m.to_string()).collect(),
            ..Default::default()
        }
    }

    /// Check invalid option combinations against the registered modes,
    /// reporting every problem at once.
    pub fn validate(&self, registry: &AuthorizerRegistry) -> Result<(), AggregateError> {
        let mut errors = AggregateError::new();

        if self.modes.is_empty() {
            errors.push("at least one authorization mode must be passed");
        }

        let choices = registry.modes();
        for mode in &self.modes {
            if !registry.is_valid_mode(mode) {
                errors.push(format!(
                    "authorization mode {mode:?} is not a valid mode, choices: {choices:?}"
                ));
            }
        }

        let unique: HashSet<&String> = self.modes.iter().collect();
        if unique.len() != self.modes.len() {
            errors.push(format!(
                "authorization modes {:?} has a mode specified more than once",
                self.modes
            ));
        }

        let has_abac = self.modes.iter().any(|m| m == MODE_ABAC);
        if has_abac && self.policy_file.is_none() {
            errors.push("authorization mode ABAC requires a policy file");
        }
        if self.policy_file.is_some() && !has_abac {
            errors.push("cannot specify a policy file without authorization mode ABAC");
        }

        let has_webhook = self.modes.iter().any(|m| m == MODE_WEBHOOK);
        if has_webhook && self.webhook_config_file.is_none() {
            errors.push("authorization mode Webhook requires a webhook config file");
        }
        if self.webhook_config_file.is_some() && !has_webhook {
            errors.push("cannot specify a webhook config file without authorization mode Webhook");
        }

        if self.retry_backoff.max_steps == 0 {
            errors.push("webhook retry backoff steps must be greater than 0");
        }

        errors.into_result()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{AuthorizerResources, register_builtin};

    fn registry() -> AuthorizerRegistry {
        let registry = AuthorizerRegistry::new();
        let config = AuthorizationConfig::default();
        register_builtin(&registry, &config, AuthorizerResources::default()).unwrap();
        registry
    }

    #[test]
    fn test_empty_modes_rejected() {
        let config = AuthorizationConfig::default();
        let err = config.validate(&registry()).unwrap_err();
        assert!(err.to_string().contains("at least one"));
    }

    #[test]
    fn test_duplicate_mode_rejected() {
        let config = AuthorizationConfig {
            policy_file: Some(PathBuf::from("/etc/warden/policy.jsonl")),
            ..AuthorizationConfig::with_modes(&[MODE_ABAC, MODE_ABAC])
        };
        let err = config.validate(&registry()).unwrap_err();
        assert!(err.to_string().contains("more than once"));
    }

    #[test]
    fn test_unknown_mode_rejected() {
        let config = AuthorizationConfig::with_modes(&["Quantum"]);
        let err = config.validate(&registry()).unwrap_err();
        assert!(err.to_string().contains("Quantum"));
    }

    #[test]
    fn test_abac_requires_policy_file() {
        let config = AuthorizationConfig::with_modes(&[MODE_ABAC]);
        let err = config.validate(&registry()).unwrap_err();
        assert!(err.to_string().contains("policy file"));
    }

    #[test]
    fn test_policy_file_without_abac_rejected() {
        let config = AuthorizationConfig {
            policy_file: Some(PathBuf::from("/etc/warden/policy.jsonl")),
            ..AuthorizationConfig::with_modes(&[MODE_ALWAYS_ALLOW])
        };
        let err = config.validate(&registry()).unwrap_err();
        assert!(err.to_string().contains("without authorization mode ABAC"));
    }

    #[test]
    fn test_webhook_requires_config_file() {
        let config = AuthorizationConfig::with_modes(&[MODE_WEBHOOK]);
        assert!(config.validate(&registry()).is_err());
    }

    #[test]
    fn test_all_errors_reported_together() {
        let config = AuthorizationConfig {
            retry_backoff: Backoff {
                max_steps: 0,
                ..Backoff::default_webhook()
            },
            ..AuthorizationConfig::with_modes(&[MODE_ABAC, MODE_ABAC, "Quantum"])
        };
        let err = config.validate(&registry()).unwrap_err();
        assert!(err.len() >= 4);
    }

    #[test]
    fn test_valid_config_passes() {
        let config = AuthorizationConfig::with_modes(&[MODE_ALWAYS_ALLOW, MODE_LOGIN]);
        assert!(config.validate(&registry()).is_ok());
    }
}
