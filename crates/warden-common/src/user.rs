//! Authenticated identity types

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Group implicitly carried by every successfully authenticated user.
pub const GROUP_AUTHENTICATED: &str = "system:authenticated";

/// Group carried by requests that presented no recognized credential.
pub const GROUP_UNAUTHENTICATED: &str = "system:unauthenticated";

/// Members of this group are allowed to take any action.
pub const GROUP_MASTERS: &str = "system:masters";

/// Identity produced by an authenticator, immutable once attached to a request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInfo {
    /// Unique user name (e.g. "jane", "system:bootstrap:abcdef")
    pub name: String,
    /// Unique identifier across time; optional
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,
    /// Group memberships; insertion order is irrelevant for matching
    #[serde(default)]
    pub groups: Vec<String>,
    /// Provider-specific extra attributes
    #[serde(default)]
    pub extra: HashMap<String, Vec<String>>,
}

impl UserInfo {
    /// Create a new identity with the given name
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            uid: None,
            groups: Vec::new(),
            extra: HashMap::new(),
        }
    }

    /// Set the uid
    pub fn with_uid(mut self, uid: impl Into<String>) -> Self {
        self.uid = Some(uid.into());
        self
    }

    /// Set the group list
    pub fn with_groups(mut self, groups: Vec<String>) -> Self {
        self.groups = groups;
        self
    }

    /// Append a single group
    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.groups.push(group.into());
        self
    }

    /// Add an extra attribute
    pub fn with_extra(mut self, key: impl Into<String>, values: Vec<String>) -> Self {
        self.extra.insert(key.into(), values);
        self
    }

    /// Whether the identity is a member of the given group
    pub fn has_group(&self, group: &str) -> bool {
        self.groups.iter().any(|g| g == group)
    }
}
