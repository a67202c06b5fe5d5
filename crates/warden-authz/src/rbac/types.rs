//! RBAC object model and rule matching

use serde::{Deserialize, Serialize};

/// Matches every verb.
pub const VERB_ALL: &str = "*";
/// Matches every resource.
pub const RESOURCE_ALL: &str = "*";
/// Matches every non-resource URL.
pub const NON_RESOURCE_ALL: &str = "*";

/// Subject kind naming a single user.
pub const USER_KIND: &str = "User";
/// Subject kind naming a group.
pub const GROUP_KIND: &str = "Group";
/// Subject kind naming a service account.
pub const SERVICE_ACCOUNT_KIND: &str = "ServiceAccount";

/// Role reference kind for a namespaced role.
pub const ROLE_KIND: &str = "Role";
/// Role reference kind for a cluster role.
pub const CLUSTER_ROLE_KIND: &str = "ClusterRole";

const SERVICE_ACCOUNT_USER_PREFIX: &str = "system:serviceaccount:";

/// A single permission grant: verbs over resources or non-resource URLs.
/// Rules are purely additive; there is no way to phrase a denial.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PolicyRule {
    pub verbs: Vec<String>,
    pub api_groups: Vec<String>,
    pub resources: Vec<String>,
    pub resource_names: Vec<String>,
    pub non_resource_urls: Vec<String>,
}

/// A namespaced collection of policy rules.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Role {
    pub name: String,
    pub namespace: String,
    pub rules: Vec<PolicyRule>,
}

/// A cluster-wide collection of policy rules.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterRole {
    pub name: String,
    pub rules: Vec<PolicyRule>,
}

/// Who a binding grants to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Subject {
    /// `User`, `Group`, or `ServiceAccount`
    pub kind: String,
    pub name: String,
    /// Namespace of a service-account subject; defaults to the binding's
    pub namespace: String,
}

/// Which role a binding grants.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoleRef {
    /// `Role` or `ClusterRole`
    pub kind: String,
    pub name: String,
}

/// Grants a role to subjects within one namespace.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RoleBinding {
    pub name: String,
    pub namespace: String,
    pub subjects: Vec<Subject>,
    pub role_ref: RoleRef,
}

/// Grants a cluster role to subjects in every namespace.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClusterRoleBinding {
    pub name: String,
    pub subjects: Vec<Subject>,
    pub role_ref: RoleRef,
}

/// The conventional user name of a service account.
pub fn service_account_username(namespace: &str, name: &str) -> String {
    format!("{SERVICE_ACCOUNT_USER_PREFIX}{namespace}:{name}")
}

/// Whether `username` names the given service account.
pub fn matches_service_account_username(namespace: &str, name: &str, username: &str) -> bool {
    let Some(qualified) = username.strip_prefix(SERVICE_ACCOUNT_USER_PREFIX) else {
        return false;
    };
    qualified
        .split_once(':')
        .is_some_and(|(ns, n)| ns == namespace && n == name)
}

pub fn verb_matches(rule: &PolicyRule, requested_verb: &str) -> bool {
    rule.verbs
        .iter()
        .any(|v| v == VERB_ALL || v == requested_verb)
}

pub fn resource_matches(
    rule: &PolicyRule,
    combined_requested_resource: &str,
    requested_subresource: &str,
) -> bool {
    for rule_resource in &rule.resources {
        if rule_resource == RESOURCE_ALL {
            return true;
        }
        if rule_resource == combined_requested_resource {
            return true;
        }
        // A rule of the form */subresource covers that subresource on
        // every resource type.
        if requested_subresource.is_empty() {
            continue;
        }
        if let Some(rule_subresource) = rule_resource.strip_prefix("*/") {
            if rule_subresource == requested_subresource {
                return true;
            }
        }
    }
    false
}

pub fn resource_name_matches(rule: &PolicyRule, requested_name: &str) -> bool {
    if rule.resource_names.is_empty() {
        return true;
    }
    rule.resource_names.iter().any(|n| n == requested_name)
}

pub fn non_resource_url_matches(rule: &PolicyRule, requested_url: &str) -> bool {
    for rule_url in &rule.non_resource_urls {
        if rule_url == NON_RESOURCE_ALL {
            return true;
        }
        if rule_url == requested_url {
            return true;
        }
        if let Some(prefix) = rule_url.strip_suffix('*') {
            if requested_url.starts_with(prefix) {
                return true;
            }
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(verbs: &[&str], resources: &[&str]) -> PolicyRule {
        PolicyRule {
            verbs: verbs.iter().map(|s| s.to_string()).collect(),
            resources: resources.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        }
    }

    #[test]
    fn test_verb_wildcard() {
        let r = rule(&["*"], &["widgets"]);
        assert!(verb_matches(&r, "delete"));

        let r = rule(&["get", "list"], &["widgets"]);
        assert!(verb_matches(&r, "get"));
        assert!(!verb_matches(&r, "delete"));
    }

    #[test]
    fn test_resource_wildcard_and_subresource() {
        let r = rule(&["get"], &["*"]);
        assert!(resource_matches(&r, "widgets", ""));

        let r = rule(&["get"], &["widgets/status"]);
        assert!(resource_matches(&r, "widgets/status", "status"));
        assert!(!resource_matches(&r, "widgets", ""));

        let r = rule(&["get"], &["*/status"]);
        assert!(resource_matches(&r, "widgets/status", "status"));
        assert!(resource_matches(&r, "gadgets/status", "status"));
        assert!(!resource_matches(&r, "widgets/scale", "scale"));
    }

    #[test]
    fn test_resource_names() {
        let mut r = rule(&["get"], &["widgets"]);
        assert!(resource_name_matches(&r, "anything"));

        r.resource_names = vec!["w1".to_string()];
        assert!(resource_name_matches(&r, "w1"));
        assert!(!resource_name_matches(&r, "w2"));
    }

    #[test]
    fn test_non_resource_url_prefix() {
        let r = PolicyRule {
            verbs: vec!["get".to_string()],
            non_resource_urls: vec!["/metrics".to_string(), "/debug/*".to_string()],
            ..Default::default()
        };
        assert!(non_resource_url_matches(&r, "/metrics"));
        assert!(non_resource_url_matches(&r, "/debug/pprof"));
        assert!(!non_resource_url_matches(&r, "/healthz"));
    }

    #[test]
    fn test_service_account_username_round_trip() {
        let username = service_account_username("billing", "reporter");
        assert_eq!(username, "system:serviceaccount:billing:reporter");
        assert!(matches_service_account_username(
            "billing", "reporter", &username
        ));
        assert!(!matches_service_account_username(
            "billing", "other", &username
        ));
        assert!(!matches_service_account_username("billing", "reporter", "jane"));
    }
}
