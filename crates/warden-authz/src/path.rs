//! Path allow-list authorizer
//!
//! Excludes a fixed set of HTTP paths from authorization, typically health
//! endpoints. Paths are matched exactly, or by prefix when they end in `*`;
//! a leading `/` is optional in the configuration.

use async_trait::async_trait;
use std::collections::HashSet;
use warden_common::Attributes;

use crate::authorizer::{Authorizer, Decision};
use crate::error::AuthzError;

pub struct PathAuthorizer {
    paths: HashSet<String>,
    prefixes: Vec<String>,
}

impl PathAuthorizer {
    /// Build an authorizer allowing the given paths
    pub fn new(allowed_paths: &[String]) -> Result<Self, AuthzError> {
        let mut paths = HashSet::new();
        let mut prefixes = Vec::new();
        for path in allowed_paths {
            let normalized = format!("/{}", path.trim_start_matches('/'));
            if let Some(prefix) = normalized.strip_suffix('*') {
                if prefix.contains('*') {
                    return Err(AuthzError::Configuration(format!(
                        "only trailing * allowed in path {path:?}"
                    )));
                }
                prefixes.push(prefix.to_string());
            } else if normalized.contains('*') {
                return Err(AuthzError::Configuration(format!(
                    "only trailing * allowed in path {path:?}"
                )));
            } else {
                paths.insert(normalized);
            }
        }
        Ok(Self { paths, prefixes })
    }
}

#[async_trait]
impl Authorizer for PathAuthorizer {
    async fn authorize(&self, attrs: &Attributes) -> Result<(Decision, String), AuthzError> {
        if attrs.is_resource_request() || attrs.path.is_empty() {
            return Ok((Decision::NoOpinion, String::new()));
        }
        if self.paths.contains(&attrs.path)
            || self.prefixes.iter().any(|p| attrs.path.starts_with(p))
        {
            return Ok((Decision::Allow, String::new()));
        }
        Ok((Decision::NoOpinion, String::new()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use warden_common::UserInfo;

    fn attrs(path: &str) -> Attributes {
        Attributes::non_resource(UserInfo::new("anyone"), "get", path)
    }

    async fn decide(authz: &PathAuthorizer, path: &str) -> Decision {
        authz.authorize(&attrs(path)).await.unwrap().0
    }

    #[tokio::test]
    async fn test_exact_and_prefix_match() {
        let authz = PathAuthorizer::new(&[
            "/healthz".to_string(),
            "healthz/*".to_string(),
            "readyz".to_string(),
        ])
        .unwrap();

        assert_eq!(decide(&authz, "/healthz").await, Decision::Allow);
        assert_eq!(decide(&authz, "/healthz/live").await, Decision::Allow);
        assert_eq!(decide(&authz, "/readyz").await, Decision::Allow);
        assert_eq!(decide(&authz, "/metrics").await, Decision::NoOpinion);
    }

    #[tokio::test]
    async fn test_resource_requests_not_matched() {
        let authz = PathAuthorizer::new(&["/healthz".to_string()]).unwrap();
        let user = UserInfo::new("anyone");
        let attrs = Attributes::resource(user, "get", "ns", "widgets");
        let (decision, _) = authz.authorize(&attrs).await.unwrap();
        assert_eq!(decision, Decision::NoOpinion);
    }

    #[test]
    fn test_interior_wildcard_rejected() {
        assert!(PathAuthorizer::new(&["/api/*/status".to_string()]).is_err());
    }
}
