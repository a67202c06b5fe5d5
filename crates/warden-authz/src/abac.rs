//! Attribute-based access control
//!
//! Policies load from a newline-delimited JSON file, one policy object per
//! line; blank lines and `#` comments are skipped. Policies are evaluated in
//! file order and the first full match wins.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use warden_common::{Attributes, UserInfo};

use crate::authorizer::{
    Authorizer, Decision, NonResourceRule, ResourceRule, RuleResolver, RuleSet,
};
use crate::error::AuthzError;

/// One ABAC policy rule.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Policy {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub kind: String,
    #[serde(default)]
    pub spec: PolicySpec,
}

/// Matching attributes of a policy rule. An absent field means "not
/// constrained on that axis"; `"*"` matches everything on its axis.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PolicySpec {
    /// User name this rule applies to; `"*"` matches all users
    pub user: String,
    /// Group this rule applies to; `"*"` matches all groups
    pub group: String,
    /// When true the rule only permits read-only requests
    pub readonly: bool,
    /// API group of a resource target; `"*"` matches all
    pub api_group: String,
    /// Resource type target; `"*"` matches all
    pub resource: String,
    /// Namespace target; `"*"` matches all
    pub namespace: String,
    /// Non-resource path target: exact, `"*"`, or trailing-`*` prefix
    pub non_resource_path: String,
}

/// An ordered list of policies, the whole of which acts as one authorizer.
#[derive(Debug)]
pub struct PolicyList {
    policies: Vec<Policy>,
}

impl PolicyList {
    /// Load policies from a file of newline-delimited JSON objects.
    ///
    /// Loading aborts on the first malformed line; the error carries the file
    /// path and 1-based line number so operators can locate the fault.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, AuthzError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| AuthzError::PolicyRead {
            path: path.display().to_string(),
            source,
        })?;

        let mut policies = Vec::new();
        for (index, line) in contents.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            let policy: Policy =
                serde_json::from_str(trimmed).map_err(|err| AuthzError::PolicyLoad {
                    path: path.display().to_string(),
                    line: index + 1,
                    reason: err.to_string(),
                })?;
            tracing::debug!("abac policy {} loaded: {policy:?}", index + 1);
            policies.push(policy);
        }
        Ok(Self { policies })
    }

    /// Build a list directly from policies (tests, embedded defaults)
    pub fn new(policies: Vec<Policy>) -> Self {
        Self { policies }
    }

    /// Number of loaded policies
    pub fn len(&self) -> usize {
        self.policies.len()
    }

    /// Whether no policies are loaded
    pub fn is_empty(&self) -> bool {
        self.policies.is_empty()
    }
}

fn subject_matches(policy: &Policy, user: &UserInfo) -> bool {
    let mut matched = false;

    // If the policy specifies a user, it must hold.
    if !policy.spec.user.is_empty() {
        if policy.spec.user == "*" {
            matched = true;
        } else if policy.spec.user == user.name {
            matched = true;
        } else {
            return false;
        }
    }

    // If the policy specifies a group, it must hold.
    if !policy.spec.group.is_empty() {
        if policy.spec.group == "*" {
            matched = true;
        } else if user.has_group(&policy.spec.group) {
            matched = true;
        } else {
            return false;
        }
    }

    matched
}

fn verb_matches(policy: &Policy, attrs: &Attributes) -> bool {
    // All policies allow read-only requests.
    if attrs.is_read_only() {
        return true;
    }
    !policy.spec.readonly
}

fn resource_matches(policy: &Policy, attrs: &Attributes) -> bool {
    // A resource policy cannot match a non-resource request.
    if attrs.is_resource_request() {
        return policy.spec.resource == "*" || policy.spec.resource == attrs.resource;
    }
    false
}

fn non_resource_matches(policy: &Policy, attrs: &Attributes) -> bool {
    // A non-resource policy cannot match a resource request.
    if !attrs.is_resource_request() {
        if policy.spec.non_resource_path == "*" {
            return true;
        }
        if policy.spec.non_resource_path == attrs.path {
            return true;
        }
        if let Some(prefix) = policy.spec.non_resource_path.strip_suffix('*') {
            return !prefix.is_empty() && attrs.path.starts_with(prefix);
        }
    }
    false
}

fn matches(policy: &Policy, attrs: &Attributes) -> bool {
    if subject_matches(policy, &attrs.user) && verb_matches(policy, attrs) {
        // A policy that names no target is unconstrained on that axis.
        if policy.spec.resource.is_empty() && policy.spec.non_resource_path.is_empty() {
            return true;
        }
        // Resource and non-resource targets are mutually exclusive;
        // at most one branch can match a given request.
        if resource_matches(policy, attrs) {
            return true;
        }
        if non_resource_matches(policy, attrs) {
            return true;
        }
    }
    false
}

fn verbs_for(readonly: bool) -> Vec<String> {
    if readonly {
        vec!["get".to_string(), "list".to_string(), "watch".to_string()]
    } else {
        vec!["*".to_string()]
    }
}

#[async_trait]
impl Authorizer for PolicyList {
    async fn authorize(&self, attrs: &Attributes) -> Result<(Decision, String), AuthzError> {
        for policy in &self.policies {
            if matches(policy, attrs) {
                return Ok((Decision::Allow, String::new()));
            }
        }
        tracing::debug!(
            "abac: no policy matched user {} verb {} path {}",
            attrs.user.name,
            attrs.verb,
            attrs.path
        );
        Ok((Decision::NoOpinion, "No policy matched.".to_string()))
    }
}

impl RuleResolver for PolicyList {
    fn rules_for(&self, user: &UserInfo, _namespace: &str) -> (RuleSet, Option<AuthzError>) {
        let mut rules = RuleSet::default();
        for policy in &self.policies {
            if !subject_matches(policy, user) {
                continue;
            }
            if !policy.spec.resource.is_empty() {
                rules.resource_rules.push(ResourceRule {
                    verbs: verbs_for(policy.spec.readonly),
                    resources: vec![policy.spec.resource.clone()],
                    ..Default::default()
                });
            }
            if !policy.spec.non_resource_path.is_empty() {
                rules.non_resource_rules.push(NonResourceRule {
                    verbs: verbs_for(policy.spec.readonly),
                    non_resource_urls: vec![policy.spec.non_resource_path.clone()],
                });
            }
        }
        (rules, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn policy(json: &str) -> Policy {
        serde_json::from_str(json).unwrap()
    }

    fn user(name: &str, groups: &[&str]) -> UserInfo {
        UserInfo::new(name).with_groups(groups.iter().map(|g| g.to_string()).collect())
    }

    #[tokio::test]
    async fn test_wildcard_user_matches_any_readonly_request() {
        let list = PolicyList::new(vec![policy(r#"{"spec":{"user":"*","readonly":true}}"#)]);
        for name in ["jane", "bob", "system:anonymous"] {
            let attrs = Attributes::non_resource(user(name, &[]), "get", "/anything");
            let (decision, _) = list.authorize(&attrs).await.unwrap();
            assert_eq!(decision, Decision::Allow, "user {name}");
        }
    }

    #[tokio::test]
    async fn test_readonly_policy_rejects_writes() {
        let list = PolicyList::new(vec![policy(r#"{"spec":{"user":"*","readonly":true}}"#)]);
        let attrs = Attributes::non_resource(user("jane", &[]), "create", "/rw");
        let (decision, reason) = list.authorize(&attrs).await.unwrap();
        assert_eq!(decision, Decision::NoOpinion);
        assert_eq!(reason, "No policy matched.");
    }

    #[tokio::test]
    async fn test_non_resource_prefix_match() {
        let list = PolicyList::new(vec![policy(
            r#"{"spec":{"user":"*","nonResourcePath":"/api/*"}}"#,
        )]);

        let hit = Attributes::non_resource(user("jane", &[]), "create", "/api/v1/foo");
        assert_eq!(list.authorize(&hit).await.unwrap().0, Decision::Allow);

        let miss = Attributes::non_resource(user("jane", &[]), "create", "/other");
        assert_eq!(list.authorize(&miss).await.unwrap().0, Decision::NoOpinion);
    }

    #[tokio::test]
    async fn test_group_subject_match() {
        let list = PolicyList::new(vec![policy(
            r#"{"spec":{"group":"ops","resource":"widgets"}}"#,
        )]);

        let member = Attributes::resource(user("jane", &["ops"]), "create", "ns", "widgets");
        assert_eq!(list.authorize(&member).await.unwrap().0, Decision::Allow);

        let outsider = Attributes::resource(user("bob", &["dev"]), "create", "ns", "widgets");
        assert_eq!(list.authorize(&outsider).await.unwrap().0, Decision::NoOpinion);
    }

    #[tokio::test]
    async fn test_empty_subject_matches_nothing() {
        let list = PolicyList::new(vec![policy(r#"{"spec":{"resource":"*"}}"#)]);
        let attrs = Attributes::resource(user("jane", &["ops"]), "get", "ns", "widgets");
        assert_eq!(list.authorize(&attrs).await.unwrap().0, Decision::NoOpinion);
    }

    #[tokio::test]
    async fn test_resource_policy_ignores_non_resource_request() {
        let list = PolicyList::new(vec![policy(r#"{"spec":{"user":"*","resource":"*"}}"#)]);
        let attrs = Attributes::non_resource(user("jane", &[]), "create", "/api/foo");
        assert_eq!(list.authorize(&attrs).await.unwrap().0, Decision::NoOpinion);
    }

    #[tokio::test]
    async fn test_first_match_wins_in_file_order() {
        let list = PolicyList::new(vec![
            policy(r#"{"spec":{"user":"jane","resource":"widgets"}}"#),
            policy(r#"{"spec":{"user":"*","resource":"*"}}"#),
        ]);
        let attrs = Attributes::resource(user("jane", &[]), "create", "ns", "widgets");
        assert_eq!(list.authorize(&attrs).await.unwrap().0, Decision::Allow);
    }

    #[test]
    fn test_from_file_skips_comments_and_blanks() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "# readers").unwrap();
        writeln!(file).unwrap();
        writeln!(file, r#"{{"spec":{{"user":"*","readonly":true}}}}"#).unwrap();
        let list = PolicyList::from_file(file.path()).unwrap();
        assert_eq!(list.len(), 1);
    }

    #[test]
    fn test_malformed_line_carries_path_and_line_number() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, r#"{{"spec":{{"user":"*"}}}}"#).unwrap();
        writeln!(file, "not json").unwrap();
        let err = PolicyList::from_file(file.path()).unwrap_err();
        match err {
            AuthzError::PolicyLoad { path, line, .. } => {
                assert_eq!(line, 2);
                assert!(path.contains(
                    file.path().file_name().unwrap().to_str().unwrap()
                ));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_rules_for_projects_subject_policies() {
        let list = PolicyList::new(vec![
            policy(r#"{"spec":{"user":"jane","resource":"widgets","readonly":true}}"#),
            policy(r#"{"spec":{"user":"bob","nonResourcePath":"/metrics"}}"#),
        ]);
        let (rules, err) = list.rules_for(&user("jane", &[]), "ns");
        assert!(err.is_none());
        assert_eq!(rules.resource_rules.len(), 1);
        assert_eq!(
            rules.resource_rules[0].verbs,
            vec!["get".to_string(), "list".to_string(), "watch".to_string()]
        );
        assert!(rules.non_resource_rules.is_empty());
    }
}
