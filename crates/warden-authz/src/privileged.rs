//! Privileged-group authorizer

use async_trait::async_trait;
use warden_common::Attributes;

use crate::authorizer::{Authorizer, Decision};
use crate::error::AuthzError;

/// Allows any action to members of the configured groups
/// (conventionally `system:masters`).
pub struct PrivilegedGroupAuthorizer {
    groups: Vec<String>,
}

impl PrivilegedGroupAuthorizer {
    pub fn new(groups: Vec<String>) -> Self {
        Self { groups }
    }
}

#[async_trait]
impl Authorizer for PrivilegedGroupAuthorizer {
    async fn authorize(&self, attrs: &Attributes) -> Result<(Decision, String), AuthzError> {
        for group in &self.groups {
            if attrs.user.has_group(group) {
                return Ok((Decision::Allow, String::new()));
            }
        }
        Ok((Decision::NoOpinion, String::new()))
    }
}
