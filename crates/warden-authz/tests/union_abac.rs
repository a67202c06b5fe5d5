//! End-to-end composition: config → registry → union → decision.

use std::io::Write;
use std::sync::Arc;

use warden_authz::rbac::types::{
    CLUSTER_ROLE_KIND, ClusterRole, ClusterRoleBinding, GROUP_KIND, PolicyRule, RoleRef, Subject,
};
use warden_authz::{
    AuthorizationConfig, AuthorizerRegistry, AuthorizerResources, Authorizer, Decision,
    MODE_ABAC, MODE_RBAC, RbacListers, RuleResolver, StaticRoleSet, new_from_registry,
    register_builtin,
};
use warden_common::{Attributes, UserInfo};

fn read_only_policy_file() -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, r#"{{"spec":{{"user":"*","readonly":true}}}}"#).unwrap();
    file
}

fn compose(
    config: &AuthorizationConfig,
    resources: AuthorizerResources,
) -> (Arc<dyn Authorizer>, Arc<dyn RuleResolver>) {
    let registry = AuthorizerRegistry::new();
    register_builtin(&registry, config, resources).unwrap();
    let (authorizer, resolver) = new_from_registry(&registry, config).unwrap();
    (authorizer, resolver)
}

#[tokio::test]
async fn read_only_abac_policy_allows_gets_and_rejects_posts() {
    let file = read_only_policy_file();
    let config = AuthorizationConfig {
        policy_file: Some(file.path().to_path_buf()),
        always_allow_groups: Vec::new(),
        always_allow_paths: Vec::new(),
        ..AuthorizationConfig::with_modes(&[MODE_ABAC])
    };
    let (authorizer, _) = compose(&config, AuthorizerResources::default());

    // Any authenticated bearer may GET.
    let get = Attributes::non_resource(UserInfo::new("anyone"), "get", "/ro");
    let (decision, _) = authorizer.authorize(&get).await.unwrap();
    assert_eq!(decision, Decision::Allow);

    // The same user may not POST; the caller renders this as HTTP 403.
    let post = Attributes::non_resource(UserInfo::new("anyone"), "create", "/rw");
    let (decision, reason) = authorizer.authorize(&post).await.unwrap();
    assert_eq!(decision, Decision::NoOpinion);
    assert_eq!(reason, "No policy matched.");
}

#[tokio::test]
async fn abac_then_rbac_compose_first_allow_wins() {
    let file = read_only_policy_file();

    let store = StaticRoleSet::new();
    store.add_cluster_role(ClusterRole {
        name: "widget-writer".to_string(),
        rules: vec![PolicyRule {
            verbs: vec!["create".to_string()],
            resources: vec!["widgets".to_string()],
            ..Default::default()
        }],
    });
    store.add_cluster_role_binding(ClusterRoleBinding {
        name: "writers".to_string(),
        subjects: vec![Subject {
            kind: GROUP_KIND.to_string(),
            name: "writers".to_string(),
            namespace: String::new(),
        }],
        role_ref: RoleRef {
            kind: CLUSTER_ROLE_KIND.to_string(),
            name: "widget-writer".to_string(),
        },
    });

    let config = AuthorizationConfig {
        policy_file: Some(file.path().to_path_buf()),
        always_allow_groups: Vec::new(),
        always_allow_paths: Vec::new(),
        ..AuthorizationConfig::with_modes(&[MODE_ABAC, MODE_RBAC])
    };
    let (authorizer, resolver) = compose(
        &config,
        AuthorizerResources {
            rbac_listers: Some(RbacListers::from_store(Arc::new(store))),
            review_client: None,
        },
    );

    // ABAC has no opinion on writes; RBAC allows members of "writers".
    let writer = UserInfo::new("jane").with_group("writers");
    let create = Attributes::resource(writer.clone(), "create", "sales", "widgets");
    let (decision, reason) = authorizer.authorize(&create).await.unwrap();
    assert_eq!(decision, Decision::Allow);
    assert!(reason.contains("RBAC"));

    // Outsiders get the concatenated no-opinion reasons.
    let outsider = Attributes::resource(UserInfo::new("bob"), "create", "sales", "widgets");
    let (decision, reason) = authorizer.authorize(&outsider).await.unwrap();
    assert_eq!(decision, Decision::NoOpinion);
    assert!(reason.contains("No policy matched."));

    // Introspection concatenates both strategies' rules.
    let (rules, err) = resolver.rules_for(&writer, "sales");
    assert!(err.is_none());
    assert!(!rules.resource_rules.is_empty());
}
