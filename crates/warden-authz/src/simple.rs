//! Trivial always-allow / always-deny authorizers

use async_trait::async_trait;
use warden_common::{Attributes, UserInfo};

use crate::authorizer::{
    Authorizer, Decision, NonResourceRule, ResourceRule, RuleResolver, RuleSet,
};
use crate::error::AuthzError;

/// Permits every request. Useful in tests and fully open deployments.
pub struct AlwaysAllowAuthorizer;

#[async_trait]
impl Authorizer for AlwaysAllowAuthorizer {
    async fn authorize(&self, _attrs: &Attributes) -> Result<(Decision, String), AuthzError> {
        Ok((Decision::Allow, String::new()))
    }
}

impl RuleResolver for AlwaysAllowAuthorizer {
    fn rules_for(&self, _user: &UserInfo, _namespace: &str) -> (RuleSet, Option<AuthzError>) {
        let rules = RuleSet {
            resource_rules: vec![ResourceRule {
                verbs: vec!["*".to_string()],
                api_groups: vec!["*".to_string()],
                resources: vec!["*".to_string()],
                resource_names: Vec::new(),
            }],
            non_resource_rules: vec![NonResourceRule {
                verbs: vec!["*".to_string()],
                non_resource_urls: vec!["*".to_string()],
            }],
            incomplete: false,
        };
        (rules, None)
    }
}

/// Permits nothing: it never allows, leaving the final say to composition.
pub struct AlwaysDenyAuthorizer;

#[async_trait]
impl Authorizer for AlwaysDenyAuthorizer {
    async fn authorize(&self, _attrs: &Attributes) -> Result<(Decision, String), AuthzError> {
        Ok((Decision::NoOpinion, "Everything is forbidden.".to_string()))
    }
}

impl RuleResolver for AlwaysDenyAuthorizer {
    fn rules_for(&self, _user: &UserInfo, _namespace: &str) -> (RuleSet, Option<AuthzError>) {
        (RuleSet::default(), None)
    }
}
