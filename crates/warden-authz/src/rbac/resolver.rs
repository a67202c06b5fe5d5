//! Binding and role resolution
//!
//! Walks every binding that references a user — directly, via group
//! membership, or as a service account — resolves each referenced role to its
//! rule set, and visits the rules. Lookup failures are reported to the
//! visitor rather than swallowed: rules are purely additive, so a partial
//! walk can still allow, but a denial must mention what could not be read.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use warden_common::{StoreError, UserInfo};

use super::types::{
    CLUSTER_ROLE_KIND, ClusterRole, ClusterRoleBinding, GROUP_KIND, PolicyRule, ROLE_KIND, Role,
    RoleBinding, RoleRef, SERVICE_ACCOUNT_KIND, Subject, USER_KIND,
    matches_service_account_username,
};
use crate::error::AuthzError;

/// Answers "get role by namespace and name" from storage.
pub trait RoleGetter: Send + Sync {
    fn get_role(&self, namespace: &str, name: &str) -> Result<Role, StoreError>;
}

/// Answers "list role bindings in a namespace" from storage.
pub trait RoleBindingLister: Send + Sync {
    fn list_role_bindings(&self, namespace: &str) -> Result<Vec<RoleBinding>, StoreError>;
}

/// Answers "get cluster role by name" from storage.
pub trait ClusterRoleGetter: Send + Sync {
    fn get_cluster_role(&self, name: &str) -> Result<ClusterRole, StoreError>;
}

/// Answers "list all cluster role bindings" from storage.
pub trait ClusterRoleBindingLister: Send + Sync {
    fn list_cluster_role_bindings(&self) -> Result<Vec<ClusterRoleBinding>, StoreError>;
}

/// What a visited rule was granted through, for deny-reason messages.
#[derive(Debug, Clone)]
pub enum RuleSource {
    RoleBinding { binding: String, role: String },
    ClusterRoleBinding { binding: String, role: String },
}

impl std::fmt::Display for RuleSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RuleSource::RoleBinding { binding, role } => {
                write!(f, "RoleBinding {binding:?} of role {role:?}")
            }
            RuleSource::ClusterRoleBinding { binding, role } => {
                write!(f, "ClusterRoleBinding {binding:?} of role {role:?}")
            }
        }
    }
}

fn applies_to_user(user: &UserInfo, subject: &Subject, namespace: &str) -> bool {
    match subject.kind.as_str() {
        USER_KIND => user.name == subject.name,
        GROUP_KIND => user.has_group(&subject.name),
        SERVICE_ACCOUNT_KIND => {
            // Subjects may omit the namespace to reference a service account
            // local to the binding's namespace.
            let sa_namespace = if subject.namespace.is_empty() {
                namespace
            } else {
                &subject.namespace
            };
            if sa_namespace.is_empty() {
                return false;
            }
            matches_service_account_username(sa_namespace, &subject.name, &user.name)
        }
        _ => false,
    }
}

fn applies_to(user: &UserInfo, subjects: &[Subject], namespace: &str) -> bool {
    subjects.iter().any(|s| applies_to_user(user, s, namespace))
}

/// Resolves the bindings and roles that apply to a user via the four lister
/// collaborators.
pub struct DefaultRuleResolver {
    roles: Arc<dyn RoleGetter>,
    role_bindings: Arc<dyn RoleBindingLister>,
    cluster_roles: Arc<dyn ClusterRoleGetter>,
    cluster_role_bindings: Arc<dyn ClusterRoleBindingLister>,
}

impl DefaultRuleResolver {
    pub fn new(
        roles: Arc<dyn RoleGetter>,
        role_bindings: Arc<dyn RoleBindingLister>,
        cluster_roles: Arc<dyn ClusterRoleGetter>,
        cluster_role_bindings: Arc<dyn ClusterRoleBindingLister>,
    ) -> Self {
        Self {
            roles,
            role_bindings,
            cluster_roles,
            cluster_role_bindings,
        }
    }

    /// Resolve the rules granted by a role reference. The binding's namespace
    /// scopes `Role` references; `ClusterRole` references are global.
    pub fn role_reference_rules(
        &self,
        role_ref: &RoleRef,
        binding_namespace: &str,
    ) -> Result<Vec<PolicyRule>, AuthzError> {
        match role_ref.kind.as_str() {
            ROLE_KIND => Ok(self
                .roles
                .get_role(binding_namespace, &role_ref.name)?
                .rules),
            CLUSTER_ROLE_KIND => Ok(self.cluster_roles.get_cluster_role(&role_ref.name)?.rules),
            other => Err(AuthzError::Internal(format!(
                "unsupported role reference kind {other:?}"
            ))),
        }
    }

    /// Invoke `visitor` with each rule that applies to `user` in `namespace`
    /// and each error encountered resolving those rules. Returning `false`
    /// from the visitor short-circuits the walk.
    pub fn visit_rules_for(
        &self,
        user: &UserInfo,
        namespace: &str,
        visitor: &mut dyn FnMut(Option<&RuleSource>, Option<&PolicyRule>, Option<&AuthzError>) -> bool,
    ) {
        match self.cluster_role_bindings.list_cluster_role_bindings() {
            Err(err) => {
                if !visitor(None, None, Some(&err.into())) {
                    return;
                }
            }
            Ok(bindings) => {
                for binding in &bindings {
                    if !applies_to(user, &binding.subjects, "") {
                        continue;
                    }
                    let source = RuleSource::ClusterRoleBinding {
                        binding: binding.name.clone(),
                        role: binding.role_ref.name.clone(),
                    };
                    match self.role_reference_rules(&binding.role_ref, "") {
                        Err(err) => {
                            if !visitor(None, None, Some(&err)) {
                                return;
                            }
                        }
                        Ok(rules) => {
                            for rule in &rules {
                                if !visitor(Some(&source), Some(rule), None) {
                                    return;
                                }
                            }
                        }
                    }
                }
            }
        }

        if namespace.is_empty() {
            return;
        }

        match self.role_bindings.list_role_bindings(namespace) {
            Err(err) => {
                visitor(None, None, Some(&err.into()));
            }
            Ok(bindings) => {
                for binding in &bindings {
                    if !applies_to(user, &binding.subjects, namespace) {
                        continue;
                    }
                    let source = RuleSource::RoleBinding {
                        binding: format!("{}/{}", namespace, binding.name),
                        role: binding.role_ref.name.clone(),
                    };
                    match self.role_reference_rules(&binding.role_ref, namespace) {
                        Err(err) => {
                            if !visitor(None, None, Some(&err)) {
                                return;
                            }
                        }
                        Ok(rules) => {
                            for rule in &rules {
                                if !visitor(Some(&source), Some(rule), None) {
                                    return;
                                }
                            }
                        }
                    }
                }
            }
        }
    }

    /// All rules that apply to `user` in `namespace`, plus any resolution
    /// errors. Returned rules are valid even when errors occurred.
    pub fn rules_for(
        &self,
        user: &UserInfo,
        namespace: &str,
    ) -> (Vec<PolicyRule>, Vec<AuthzError>) {
        let mut rules = Vec::new();
        let mut errors = Vec::new();
        self.visit_rules_for(user, namespace, &mut |_source, rule, err| {
            if let Some(rule) = rule {
                rules.push(rule.clone());
            }
            if let Some(err) = err {
                errors.push(AuthzError::Internal(err.to_string()));
            }
            true
        });
        (rules, errors)
    }
}

/// In-memory implementation of all four lister contracts, for embedding
/// fixed role sets and for tests.
pub struct StaticRoleSet {
    roles: RwLock<HashMap<(String, String), Role>>,
    role_bindings: RwLock<Vec<RoleBinding>>,
    cluster_roles: RwLock<HashMap<String, ClusterRole>>,
    cluster_role_bindings: RwLock<Vec<ClusterRoleBinding>>,
}

impl StaticRoleSet {
    pub fn new() -> Self {
        Self {
            roles: RwLock::new(HashMap::new()),
            role_bindings: RwLock::new(Vec::new()),
            cluster_roles: RwLock::new(HashMap::new()),
            cluster_role_bindings: RwLock::new(Vec::new()),
        }
    }

    pub fn add_role(&self, role: Role) {
        self.roles
            .write()
            .insert((role.namespace.clone(), role.name.clone()), role);
    }

    pub fn add_role_binding(&self, binding: RoleBinding) {
        self.role_bindings.write().push(binding);
    }

    pub fn add_cluster_role(&self, role: ClusterRole) {
        self.cluster_roles.write().insert(role.name.clone(), role);
    }

    pub fn add_cluster_role_binding(&self, binding: ClusterRoleBinding) {
        self.cluster_role_bindings.write().push(binding);
    }
}

impl Default for StaticRoleSet {
    fn default() -> Self {
        Self::new()
    }
}

impl RoleGetter for StaticRoleSet {
    fn get_role(&self, namespace: &str, name: &str) -> Result<Role, StoreError> {
        self.roles
            .read()
            .get(&(namespace.to_string(), name.to_string()))
            .cloned()
            .ok_or_else(|| StoreError::not_found("role", format!("{namespace}/{name}")))
    }
}

impl RoleBindingLister for StaticRoleSet {
    fn list_role_bindings(&self, namespace: &str) -> Result<Vec<RoleBinding>, StoreError> {
        Ok(self
            .role_bindings
            .read()
            .iter()
            .filter(|b| b.namespace == namespace)
            .cloned()
            .collect())
    }
}

impl ClusterRoleGetter for StaticRoleSet {
    fn get_cluster_role(&self, name: &str) -> Result<ClusterRole, StoreError> {
        self.cluster_roles
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| StoreError::not_found("clusterrole", name))
    }
}

impl ClusterRoleBindingLister for StaticRoleSet {
    fn list_cluster_role_bindings(&self) -> Result<Vec<ClusterRoleBinding>, StoreError> {
        Ok(self.cluster_role_bindings.read().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rbac::test_fixtures::*;

    #[test]
    fn test_namespaced_binding_scopes_to_namespace() {
        let store = fixture_store();
        let resolver = resolver_for(&store);

        let user = UserInfo::new("jane");
        let (rules, errors) = resolver.rules_for(&user, "sales");
        assert!(errors.is_empty());
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].resources, vec!["widgets".to_string()]);

        let (rules, _) = resolver.rules_for(&user, "billing");
        assert!(rules.is_empty());
    }

    #[test]
    fn test_cluster_binding_applies_everywhere() {
        let store = fixture_store();
        let resolver = resolver_for(&store);

        let admin = UserInfo::new("root").with_group("wheel");
        for namespace in ["sales", "billing", ""] {
            let (rules, errors) = resolver.rules_for(&admin, namespace);
            assert!(errors.is_empty());
            assert!(!rules.is_empty(), "namespace {namespace:?}");
        }
    }

    #[test]
    fn test_service_account_subject_defaults_to_binding_namespace() {
        let store = fixture_store();
        store.add_role_binding(RoleBinding {
            name: "sa-readers".to_string(),
            namespace: "sales".to_string(),
            subjects: vec![Subject {
                kind: SERVICE_ACCOUNT_KIND.to_string(),
                name: "reporter".to_string(),
                namespace: String::new(),
            }],
            role_ref: RoleRef {
                kind: ROLE_KIND.to_string(),
                name: "widget-reader".to_string(),
            },
        });
        let resolver = resolver_for(&store);

        let sa = UserInfo::new(super::super::types::service_account_username(
            "sales", "reporter",
        ));
        let (rules, errors) = resolver.rules_for(&sa, "sales");
        assert!(errors.is_empty());
        assert_eq!(rules.len(), 1);
    }

    #[test]
    fn test_missing_role_reports_error_and_continues() {
        let store = fixture_store();
        store.add_role_binding(RoleBinding {
            name: "dangling".to_string(),
            namespace: "sales".to_string(),
            subjects: vec![Subject {
                kind: USER_KIND.to_string(),
                name: "jane".to_string(),
                namespace: String::new(),
            }],
            role_ref: RoleRef {
                kind: ROLE_KIND.to_string(),
                name: "does-not-exist".to_string(),
            },
        });
        let resolver = resolver_for(&store);

        let (rules, errors) = resolver.rules_for(&UserInfo::new("jane"), "sales");
        assert_eq!(rules.len(), 1);
        assert_eq!(errors.len(), 1);
    }
}
