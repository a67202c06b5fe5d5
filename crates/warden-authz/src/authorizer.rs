//! Authorizer and rule-resolver contracts

use async_trait::async_trait;
use warden_common::{Attributes, UserInfo};

use crate::error::AuthzError;

/// Outcome of one authorization evaluation.
///
/// `NoOpinion` means "this strategy does not rule either way"; it is the
/// default outcome of composition absent any Allow. Callers interpret
/// anything other than `Allow` as forbidden.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny,
    NoOpinion,
}

impl Decision {
    /// Whether the decision permits the action
    #[must_use]
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow)
    }
}

/// A single authorization strategy.
///
/// Returns the decision together with a human-readable reason; `Err` is
/// reserved for infrastructure failures (lister I/O, unreachable webhook),
/// which union composition accumulates without aborting.
#[async_trait]
pub trait Authorizer: Send + Sync {
    async fn authorize(&self, attrs: &Attributes) -> Result<(Decision, String), AuthzError>;
}

/// A resource rule reported by `rules_for` introspection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourceRule {
    pub verbs: Vec<String>,
    pub api_groups: Vec<String>,
    pub resources: Vec<String>,
    pub resource_names: Vec<String>,
}

/// A non-resource rule reported by `rules_for` introspection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NonResourceRule {
    pub verbs: Vec<String>,
    pub non_resource_urls: Vec<String>,
}

/// Rules applying to a user in a namespace, possibly incomplete.
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    pub resource_rules: Vec<ResourceRule>,
    pub non_resource_rules: Vec<NonResourceRule>,
    /// True when the resolver cannot enumerate everything it enforces
    pub incomplete: bool,
}

impl RuleSet {
    /// Append another rule set, keeping the weaker completeness claim
    pub fn extend(&mut self, other: RuleSet) {
        self.resource_rules.extend(other.resource_rules);
        self.non_resource_rules.extend(other.non_resource_rules);
        self.incomplete |= other.incomplete;
    }
}

/// Enumerates the rules a strategy would grant a user; used by introspection
/// endpoints, not enforcement. Partial results are meaningful, so the error
/// travels alongside the rules instead of replacing them.
pub trait RuleResolver: Send + Sync {
    fn rules_for(&self, user: &UserInfo, namespace: &str) -> (RuleSet, Option<AuthzError>);
}

/// One registered authorization mode: every built-in strategy answers both
/// authorization and rule introspection.
pub trait AuthorizationMode: Authorizer + RuleResolver {}

impl<T: Authorizer + RuleResolver> AuthorizationMode for T {}
