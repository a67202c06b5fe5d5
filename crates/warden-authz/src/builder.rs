//! Built-in mode registration and composition
//!
//! `register_builtin` installs one factory per built-in strategy on a
//! registry; `new_from_registry` then resolves the configured mode list into
//! the composed authorizer and rule resolver. Factories defer expensive setup
//! (policy-file parsing, webhook clients) until their mode is actually
//! selected, and a factory may report its mode as intentionally absent.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::abac::PolicyList;
use crate::authorizer::{AuthorizationMode, Authorizer, RuleResolver};
use crate::config::{
    AuthorizationConfig, MODE_ABAC, MODE_ALWAYS_ALLOW, MODE_ALWAYS_DENY, MODE_LOGIN, MODE_RBAC,
    MODE_WEBHOOK,
};
use crate::error::AuthzError;
use crate::login::LoginAuthorizer;
use crate::path::PathAuthorizer;
use crate::privileged::PrivilegedGroupAuthorizer;
use crate::rbac::{
    ClusterRoleBindingLister, ClusterRoleGetter, RbacAuthorizer, RoleBindingLister, RoleGetter,
    StaticRoleSet,
};
use crate::registry::AuthorizerRegistry;
use crate::union::{UnionAuthorizer, UnionRuleResolver};
use crate::webhook::{AccessReviewClient, WebhookAuthorizer};

/// The four lister collaborators backing RBAC.
#[derive(Clone)]
pub struct RbacListers {
    pub roles: Arc<dyn RoleGetter>,
    pub role_bindings: Arc<dyn RoleBindingLister>,
    pub cluster_roles: Arc<dyn ClusterRoleGetter>,
    pub cluster_role_bindings: Arc<dyn ClusterRoleBindingLister>,
}

impl RbacListers {
    /// All four contracts served by one store
    pub fn from_store(store: Arc<StaticRoleSet>) -> Self {
        Self {
            roles: store.clone(),
            role_bindings: store.clone(),
            cluster_roles: store.clone(),
            cluster_role_bindings: store,
        }
    }
}

/// Collaborators the configuration cannot carry itself.
#[derive(Default)]
pub struct AuthorizerResources {
    /// Listers backing the RBAC mode; RBAC resolves as intentionally absent
    /// without them
    pub rbac_listers: Option<RbacListers>,
    /// Access-review client overriding the HTTP transport
    pub review_client: Option<Arc<dyn AccessReviewClient>>,
}

#[cfg(feature = "webhook")]
fn http_review_client(path: &Path, version: &str) -> Result<Arc<dyn AccessReviewClient>, AuthzError> {
    let config = crate::webhook::WebhookConnectionConfig::from_file(path)?;
    let client = crate::webhook::HttpReviewClient::new(&config)?.with_api_version(version);
    Ok(Arc::new(client))
}

#[cfg(not(feature = "webhook"))]
fn http_review_client(path: &Path, _version: &str) -> Result<Arc<dyn AccessReviewClient>, AuthzError> {
    Err(AuthzError::Configuration(format!(
        "webhook config file {} requires the webhook feature",
        path.display()
    )))
}

/// Register the built-in strategies on `registry`.
///
/// Mode-specific settings are captured from `config` into each factory; the
/// factories run later, when composition selects their mode.
pub fn register_builtin(
    registry: &AuthorizerRegistry,
    config: &AuthorizationConfig,
    resources: AuthorizerResources,
) -> Result<(), AuthzError> {
    registry.register(
        MODE_ALWAYS_ALLOW,
        Box::new(|| Ok(Some(Arc::new(crate::simple::AlwaysAllowAuthorizer) as Arc<dyn AuthorizationMode>))),
    )?;
    registry.register(
        MODE_ALWAYS_DENY,
        Box::new(|| Ok(Some(Arc::new(crate::simple::AlwaysDenyAuthorizer) as Arc<dyn AuthorizationMode>))),
    )?;
    registry.register(
        MODE_LOGIN,
        Box::new(|| Ok(Some(Arc::new(LoginAuthorizer) as Arc<dyn AuthorizationMode>))),
    )?;

    let policy_file = config.policy_file.clone();
    registry.register(
        MODE_ABAC,
        Box::new(move || {
            let Some(path) = &policy_file else {
                return Err(AuthzError::Configuration(
                    "authorization mode ABAC requires a policy file".to_string(),
                ));
            };
            let policies = PolicyList::from_file(path)?;
            Ok(Some(Arc::new(policies) as Arc<dyn AuthorizationMode>))
        }),
    )?;

    let rbac_listers = resources.rbac_listers;
    registry.register(
        MODE_RBAC,
        Box::new(move || match &rbac_listers {
            Some(listers) => Ok(Some(Arc::new(RbacAuthorizer::new(
                listers.roles.clone(),
                listers.role_bindings.clone(),
                listers.cluster_roles.clone(),
                listers.cluster_role_bindings.clone(),
            )) as Arc<dyn AuthorizationMode>)),
            None => Ok(None),
        }),
    )?;

    let review_client = resources.review_client;
    let webhook_config_file = config.webhook_config_file.clone();
    let webhook_version = config.webhook_version.clone();
    let authorized_ttl = Duration::from_secs(config.webhook_cache_authorized_ttl_secs);
    let unauthorized_ttl = Duration::from_secs(config.webhook_cache_unauthorized_ttl_secs);
    let retry_backoff = config.retry_backoff;
    registry.register(
        MODE_WEBHOOK,
        Box::new(move || {
            let client = match (&review_client, &webhook_config_file) {
                (Some(client), _) => client.clone(),
                (None, Some(path)) => http_review_client(path, &webhook_version)?,
                (None, None) => {
                    return Err(AuthzError::Configuration(
                        "authorization mode Webhook requires a webhook config file".to_string(),
                    ));
                }
            };
            Ok(Some(Arc::new(WebhookAuthorizer::new(
                client,
                authorized_ttl,
                unauthorized_ttl,
                retry_backoff,
            )) as Arc<dyn AuthorizationMode>))
        }),
    )?;

    Ok(())
}

/// Resolve the configured mode list into a composed authorizer and rule
/// resolver. Validation runs first, so a misconfigured mode list never
/// produces a partially-working authorizer.
pub fn new_from_registry(
    registry: &AuthorizerRegistry,
    config: &AuthorizationConfig,
) -> Result<(Arc<UnionAuthorizer>, Arc<UnionRuleResolver>), AuthzError> {
    config.validate(registry)?;

    let mut authorizers: Vec<Arc<dyn Authorizer>> = Vec::new();
    let mut resolvers: Vec<Arc<dyn RuleResolver>> = Vec::new();

    if !config.always_allow_groups.is_empty() {
        authorizers.push(Arc::new(PrivilegedGroupAuthorizer::new(
            config.always_allow_groups.clone(),
        )));
    }
    if !config.always_allow_paths.is_empty() {
        authorizers.push(Arc::new(PathAuthorizer::new(&config.always_allow_paths)?));
    }

    for mode in &config.modes {
        match registry.resolve(mode)? {
            Some(instance) => {
                tracing::debug!("authorization mode {mode} loaded");
                let authorizer: Arc<dyn Authorizer> = instance.clone();
                let resolver: Arc<dyn RuleResolver> = instance;
                authorizers.push(authorizer);
                resolvers.push(resolver);
            }
            None => {
                tracing::warn!("authorization mode {mode} is absent, skipping");
            }
        }
    }

    Ok((
        Arc::new(UnionAuthorizer::new(authorizers)),
        Arc::new(UnionRuleResolver::new(resolvers)),
    ))
}
