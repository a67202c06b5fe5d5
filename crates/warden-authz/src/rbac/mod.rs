//! Role-based access control
//!
//! Access derives from bindings: every binding that references the caller
//! (directly, by group, or as a service account) contributes its role's
//! rules, and the request is allowed if any contributed rule covers it.

pub mod resolver;
pub mod types;

use async_trait::async_trait;
use std::sync::Arc;
use warden_common::{AggregateError, Attributes, UserInfo};

use crate::authorizer::{
    Authorizer, Decision, NonResourceRule, ResourceRule, RuleResolver, RuleSet,
};
use crate::error::AuthzError;

pub use resolver::{
    ClusterRoleBindingLister, ClusterRoleGetter, DefaultRuleResolver, RoleBindingLister,
    RoleGetter, StaticRoleSet,
};
pub use types::{
    ClusterRole, ClusterRoleBinding, PolicyRule, Role, RoleBinding, RoleRef, Subject,
};

/// Whether a single rule covers the request.
pub fn rule_allows(attrs: &Attributes, rule: &PolicyRule) -> bool {
    if attrs.is_resource_request() {
        let combined = if attrs.subresource.is_empty() {
            attrs.resource.clone()
        } else {
            format!("{}/{}", attrs.resource, attrs.subresource)
        };
        return types::verb_matches(rule, &attrs.verb)
            && types::resource_matches(rule, &combined, &attrs.subresource)
            && types::resource_name_matches(rule, &attrs.name);
    }
    types::verb_matches(rule, &attrs.verb)
        && types::non_resource_url_matches(rule, &attrs.path)
}

/// RBAC authorizer driven by the binding/role resolver.
pub struct RbacAuthorizer {
    resolver: DefaultRuleResolver,
}

impl RbacAuthorizer {
    /// Create an authorizer over the four lister collaborators
    pub fn new(
        roles: Arc<dyn RoleGetter>,
        role_bindings: Arc<dyn RoleBindingLister>,
        cluster_roles: Arc<dyn ClusterRoleGetter>,
        cluster_role_bindings: Arc<dyn ClusterRoleBindingLister>,
    ) -> Self {
        Self {
            resolver: DefaultRuleResolver::new(
                roles,
                role_bindings,
                cluster_roles,
                cluster_role_bindings,
            ),
        }
    }

    /// Create an authorizer over a single store implementing all four contracts
    pub fn from_store(store: Arc<StaticRoleSet>) -> Self {
        Self::new(store.clone(), store.clone(), store.clone(), store)
    }
}

#[async_trait]
impl Authorizer for RbacAuthorizer {
    async fn authorize(&self, attrs: &Attributes) -> Result<(Decision, String), AuthzError> {
        let mut allowed = false;
        let mut reason = String::new();
        let mut errors = Vec::new();

        self.resolver
            .visit_rules_for(&attrs.user, &attrs.namespace, &mut |source, rule, err| {
                if let Some(rule) = rule {
                    if rule_allows(attrs, rule) {
                        allowed = true;
                        if let Some(source) = source {
                            reason = format!("RBAC: allowed by {source}");
                        }
                        return false;
                    }
                }
                if let Some(err) = err {
                    errors.push(err.to_string());
                }
                true
            });

        if allowed {
            return Ok((Decision::Allow, reason));
        }

        tracing::debug!(
            "RBAC: no rules authorize user {:?} with groups {:?} to {} {}",
            attrs.user.name,
            attrs.user.groups,
            attrs.verb,
            if attrs.is_resource_request() {
                &attrs.resource
            } else {
                &attrs.path
            },
        );

        // Rules are additive, so resolution errors cannot have hidden an
        // allow that was found; but without an allow they must surface
        // rather than read as a clean deny.
        if !errors.is_empty() {
            let aggregate: AggregateError = errors.into_iter().collect();
            return Err(aggregate.into());
        }
        Ok((Decision::NoOpinion, String::new()))
    }
}

impl RuleResolver for RbacAuthorizer {
    fn rules_for(&self, user: &UserInfo, namespace: &str) -> (RuleSet, Option<AuthzError>) {
        let (policy_rules, errors) = self.resolver.rules_for(user, namespace);

        let mut rules = RuleSet::default();
        for rule in policy_rules {
            if !rule.resources.is_empty() {
                rules.resource_rules.push(ResourceRule {
                    verbs: rule.verbs.clone(),
                    api_groups: rule.api_groups.clone(),
                    resources: rule.resources.clone(),
                    resource_names: rule.resource_names.clone(),
                });
            }
            if !rule.non_resource_urls.is_empty() {
                rules.non_resource_rules.push(NonResourceRule {
                    verbs: rule.verbs,
                    non_resource_urls: rule.non_resource_urls,
                });
            }
        }

        let err = if errors.is_empty() {
            None
        } else {
            let aggregate: AggregateError = errors.into_iter().collect();
            Some(aggregate.into())
        };
        (rules, err)
    }
}
