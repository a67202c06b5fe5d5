//! Request attributes evaluated by authorizers

use crate::user::UserInfo;

/// Security-relevant facts of one request.
///
/// Produced once per request by the serving layer and read-only afterwards.
/// A request is either a resource request (structured API object, matched by
/// group/resource/name) or a non-resource request (raw URL path); the two
/// target kinds are mutually exclusive during policy evaluation.
#[derive(Debug, Clone, Default)]
pub struct Attributes {
    /// The user the request acts as
    pub user: UserInfo,
    /// Request verb ("get", "list", "create", "delete", ...)
    pub verb: String,
    /// Namespace of the object, if any
    pub namespace: String,
    /// API group of the resource
    pub api_group: String,
    /// Resource type being requested
    pub resource: String,
    /// Subresource being requested, if any
    pub subresource: String,
    /// Name of the object being requested, if any
    pub name: String,
    /// Whether this targets a structured API object rather than a raw path
    pub resource_request: bool,
    /// Raw request URL path
    pub path: String,
}

impl Attributes {
    /// Attributes for a resource request
    pub fn resource(
        user: UserInfo,
        verb: impl Into<String>,
        namespace: impl Into<String>,
        resource: impl Into<String>,
    ) -> Self {
        Self {
            user,
            verb: verb.into(),
            namespace: namespace.into(),
            resource: resource.into(),
            resource_request: true,
            ..Default::default()
        }
    }

    /// Attributes for a non-resource (raw path) request
    pub fn non_resource(user: UserInfo, verb: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            user,
            verb: verb.into(),
            path: path.into(),
            resource_request: false,
            ..Default::default()
        }
    }

    /// Set the API group
    pub fn with_api_group(mut self, api_group: impl Into<String>) -> Self {
        self.api_group = api_group.into();
        self
    }

    /// Set the subresource
    pub fn with_subresource(mut self, subresource: impl Into<String>) -> Self {
        self.subresource = subresource.into();
        self
    }

    /// Set the object name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Whether the request only reads state
    pub fn is_read_only(&self) -> bool {
        matches!(self.verb.as_str(), "get" | "list" | "watch")
    }

    /// Whether the request targets a structured API object
    pub fn is_resource_request(&self) -> bool {
        self.resource_request
    }
}
