//! Union composition of authorizers
//!
//! Constituents are evaluated in configured order. The first `Allow` wins and
//! stops evaluation; that is the only early exit. An explicit `Deny` does not
//! short-circuit — a later constituent may still allow — and a failing
//! constituent cannot mask an allow from another: its error is accumulated
//! and only surfaced if nobody allows.

use async_trait::async_trait;
use std::sync::Arc;
use warden_common::{AggregateError, Attributes, UserInfo};

use crate::authorizer::{Authorizer, Decision, RuleResolver, RuleSet};
use crate::error::AuthzError;

/// An ordered union of authorizers behaving as one.
pub struct UnionAuthorizer {
    authorizers: Vec<Arc<dyn Authorizer>>,
}

impl UnionAuthorizer {
    /// Compose the given authorizers in order
    pub fn new(authorizers: Vec<Arc<dyn Authorizer>>) -> Self {
        Self { authorizers }
    }

    /// Number of constituents
    pub fn len(&self) -> usize {
        self.authorizers.len()
    }

    /// Whether the union has no constituents
    pub fn is_empty(&self) -> bool {
        self.authorizers.is_empty()
    }
}

#[async_trait]
impl Authorizer for UnionAuthorizer {
    async fn authorize(&self, attrs: &Attributes) -> Result<(Decision, String), AuthzError> {
        let mut errors = Vec::new();
        let mut reasons = Vec::new();

        for authorizer in &self.authorizers {
            match authorizer.authorize(attrs).await {
                Ok((Decision::Allow, reason)) => return Ok((Decision::Allow, reason)),
                Ok((_, reason)) => {
                    if !reason.is_empty() {
                        reasons.push(reason);
                    }
                }
                Err(err) => {
                    tracing::warn!("authorizer failed, continuing: {err}");
                    errors.push(err);
                }
            }
        }

        if !errors.is_empty() {
            let aggregate: AggregateError = errors.into_iter().collect();
            return Err(aggregate.into());
        }
        Ok((Decision::NoOpinion, reasons.join("\n")))
    }
}

/// Concatenates the rule sets reported by every constituent resolver.
pub struct UnionRuleResolver {
    resolvers: Vec<Arc<dyn RuleResolver>>,
}

impl UnionRuleResolver {
    /// Compose the given resolvers in order
    pub fn new(resolvers: Vec<Arc<dyn RuleResolver>>) -> Self {
        Self { resolvers }
    }
}

impl RuleResolver for UnionRuleResolver {
    fn rules_for(&self, user: &UserInfo, namespace: &str) -> (RuleSet, Option<AuthzError>) {
        let mut rules = RuleSet::default();
        let mut errors = AggregateError::new();

        for resolver in &self.resolvers {
            let (set, err) = resolver.rules_for(user, namespace);
            rules.extend(set);
            if let Some(err) = err {
                errors.push(err);
            }
        }

        let err = errors.into_result().err().map(AuthzError::from);
        (rules, err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct Fixed {
        decision: Decision,
        reason: &'static str,
        fail: bool,
        calls: AtomicU32,
    }

    impl Fixed {
        fn deciding(decision: Decision, reason: &'static str) -> Arc<Self> {
            Arc::new(Self {
                decision,
                reason,
                fail: false,
                calls: AtomicU32::new(0),
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                decision: Decision::NoOpinion,
                reason: "",
                fail: true,
                calls: AtomicU32::new(0),
            })
        }
    }

    #[async_trait]
    impl Authorizer for Fixed {
        async fn authorize(&self, _attrs: &Attributes) -> Result<(Decision, String), AuthzError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(AuthzError::Internal("broken".into()));
            }
            Ok((self.decision, self.reason.to_string()))
        }
    }

    fn attrs() -> Attributes {
        Attributes::non_resource(UserInfo::new("jane"), "get", "/any")
    }

    #[tokio::test]
    async fn test_first_allow_short_circuits() {
        let first = Fixed::deciding(Decision::NoOpinion, "");
        let second = Fixed::deciding(Decision::Allow, "ok");
        let third = Fixed::deciding(Decision::NoOpinion, "");
        let union = UnionAuthorizer::new(vec![first.clone(), second.clone(), third.clone()]);

        let (decision, reason) = union.authorize(&attrs()).await.unwrap();
        assert_eq!(decision, Decision::Allow);
        assert_eq!(reason, "ok");
        assert_eq!(first.calls.load(Ordering::SeqCst), 1);
        assert_eq!(second.calls.load(Ordering::SeqCst), 1);
        assert_eq!(third.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_deny_does_not_override_later_allow() {
        let deny = Fixed::deciding(Decision::Deny, "denied");
        let allow = Fixed::deciding(Decision::Allow, "allowed");
        let union = UnionAuthorizer::new(vec![deny, allow]);

        let (decision, _) = union.authorize(&attrs()).await.unwrap();
        assert_eq!(decision, Decision::Allow);
    }

    #[tokio::test]
    async fn test_error_does_not_mask_later_allow() {
        let broken = Fixed::failing();
        let allow = Fixed::deciding(Decision::Allow, "allowed");
        let union = UnionAuthorizer::new(vec![broken, allow]);

        let (decision, _) = union.authorize(&attrs()).await.unwrap();
        assert_eq!(decision, Decision::Allow);
    }

    #[tokio::test]
    async fn test_errors_surface_when_nobody_allows() {
        let broken = Fixed::failing();
        let silent = Fixed::deciding(Decision::NoOpinion, "");
        let union = UnionAuthorizer::new(vec![broken, silent]);

        assert!(union.authorize(&attrs()).await.is_err());
    }

    #[tokio::test]
    async fn test_reasons_concatenate() {
        let a = Fixed::deciding(Decision::NoOpinion, "no policy matched");
        let b = Fixed::deciding(Decision::Deny, "quota exceeded");
        let union = UnionAuthorizer::new(vec![a, b]);

        let (decision, reason) = union.authorize(&attrs()).await.unwrap();
        assert_eq!(decision, Decision::NoOpinion);
        assert_eq!(reason, "no policy matched\nquota exceeded");
    }

    #[tokio::test]
    async fn test_empty_union_has_no_opinion() {
        let union = UnionAuthorizer::new(Vec::new());
        let (decision, reason) = union.authorize(&attrs()).await.unwrap();
        assert_eq!(decision, Decision::NoOpinion);
        assert!(reason.is_empty());
    }
}
