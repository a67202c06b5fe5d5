//! Warden authorization
//!
//! This crate answers "may this caller do this?" for a request's security
//! attributes. Independent strategies implement the `Authorizer` and
//! `RuleResolver` contracts, register named factories on an
//! `AuthorizerRegistry`, and configuration composes an ordered subset of them
//! into one union authorizer:
//! - `AlwaysAllow` / `AlwaysDeny`: trivial modes
//! - `ABAC`: policy file matched on subject/verb/target
//! - `RBAC`: role bindings resolved through storage listers
//! - `Webhook`: remote access reviews with caching and bounded retries
//! - `Login`: allow any authenticated user
//!
//! # Features
//!
//! - `webhook`: HTTP transport for the access-review webhook
//! - `full` (default): all of the above
//!
//! # Example
//!
//! ```rust,ignore
//! use warden_authz::{
//!     AuthorizationConfig, AuthorizerRegistry, AuthorizerResources,
//!     new_from_registry, register_builtin,
//! };
//!
//! let registry = AuthorizerRegistry::new();
//! let config = AuthorizationConfig {
//!     policy_file: Some("/etc/warden/policy.jsonl".into()),
//!     ..AuthorizationConfig::with_modes(&["ABAC", "Webhook"])
//! };
//! register_builtin(&registry, &config, AuthorizerResources::default())?;
//! let (authorizer, rule_resolver) = new_from_registry(&registry, &config)?;
//! // let (decision, reason) = authorizer.authorize(&attrs).await?;
//! ```

pub mod abac;
pub mod authorizer;
pub mod builder;
pub mod config;
pub mod error;
pub mod login;
pub mod path;
pub mod privileged;
pub mod rbac;
pub mod registry;
pub mod simple;
pub mod union;
pub mod webhook;

pub use abac::{Policy, PolicyList, PolicySpec};
pub use authorizer::{
    AuthorizationMode, Authorizer, Decision, NonResourceRule, ResourceRule, RuleResolver, RuleSet,
};
pub use builder::{AuthorizerResources, RbacListers, new_from_registry, register_builtin};
pub use config::{
    AuthorizationConfig, MODE_ABAC, MODE_ALWAYS_ALLOW, MODE_ALWAYS_DENY, MODE_LOGIN, MODE_RBAC,
    MODE_WEBHOOK,
};
pub use error::AuthzError;
pub use login::LoginAuthorizer;
pub use path::PathAuthorizer;
pub use privileged::PrivilegedGroupAuthorizer;
pub use rbac::{RbacAuthorizer, StaticRoleSet};
pub use registry::{AuthorizerFactory, AuthorizerRegistry};
pub use simple::{AlwaysAllowAuthorizer, AlwaysDenyAuthorizer};
pub use union::{UnionAuthorizer, UnionRuleResolver};
pub use webhook::{
    AccessReviewClient, AccessReviewSpec, ReviewStatus, WebhookAuthorizer,
};

#[cfg(feature = "webhook")]
pub use webhook::{HttpReviewClient, WebhookConnectionConfig};
