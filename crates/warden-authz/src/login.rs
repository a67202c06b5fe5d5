//! Login authorizer
//!
//! Allows any request whose user completed authentication, i.e. carries the
//! `system:authenticated` group. Useful for deployments where being logged in
//! is the only requirement.

use async_trait::async_trait;
use warden_common::user::GROUP_AUTHENTICATED;
use warden_common::{Attributes, UserInfo};

use crate::authorizer::{
    Authorizer, Decision, NonResourceRule, ResourceRule, RuleResolver, RuleSet,
};
use crate::error::AuthzError;

pub struct LoginAuthorizer;

#[async_trait]
impl Authorizer for LoginAuthorizer {
    async fn authorize(&self, attrs: &Attributes) -> Result<(Decision, String), AuthzError> {
        if attrs.user.has_group(GROUP_AUTHENTICATED) {
            return Ok((Decision::Allow, "Authorized".to_string()));
        }
        Ok((Decision::NoOpinion, "Unauthorized".to_string()))
    }
}

impl RuleResolver for LoginAuthorizer {
    fn rules_for(&self, user: &UserInfo, _namespace: &str) -> (RuleSet, Option<AuthzError>) {
        if !user.has_group(GROUP_AUTHENTICATED) {
            return (RuleSet::default(), None);
        }
        let rules = RuleSet {
            resource_rules: vec![ResourceRule {
                verbs: vec!["*".to_string()],
                resources: vec!["*".to_string()],
                ..Default::default()
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

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_authenticated_user_allowed() {
        let user = UserInfo::new("jane").with_group(GROUP_AUTHENTICATED);
        let attrs = Attributes::resource(user, "create", "ns", "widgets");
        let (decision, reason) = LoginAuthorizer.authorize(&attrs).await.unwrap();
        assert_eq!(decision, Decision::Allow);
        assert_eq!(reason, "Authorized");
    }

    #[tokio::test]
    async fn test_unauthenticated_user_gets_no_opinion() {
        let attrs = Attributes::resource(UserInfo::new("jane"), "get", "ns", "widgets");
        let (decision, reason) = LoginAuthorizer.authorize(&attrs).await.unwrap();
        assert_eq!(decision, Decision::NoOpinion);
        assert_eq!(reason, "Unauthorized");
    }

    #[test]
    fn test_rules_only_for_authenticated() {
        let (rules, _) = LoginAuthorizer.rules_for(&UserInfo::new("jane"), "");
        assert!(rules.resource_rules.is_empty());

        let user = UserInfo::new("jane").with_group(GROUP_AUTHENTICATED);
        let (rules, _) = LoginAuthorizer.rules_for(&user, "");
        assert!(!rules.resource_rules.is_empty());
    }
}
