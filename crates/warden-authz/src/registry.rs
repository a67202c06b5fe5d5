//! Authorization mode registry
//!
//! Strategies register a named factory during the embedding process's startup
//! phase; configuration later selects an ordered subset of the registered
//! names. The registry is an explicit object passed by reference, not
//! process-global state, and holds constructors rather than instances so
//! expensive setup (policy file parsing, webhook clients) only happens for
//! modes that are actually enabled.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

use crate::authorizer::AuthorizationMode;
use crate::error::AuthzError;

/// Lazily constructs a mode's authorizer. Returning `Ok(None)` marks the mode
/// as registered but intentionally absent (skipped with a warning).
pub type AuthorizerFactory =
    Box<dyn Fn() -> Result<Option<Arc<dyn AuthorizationMode>>, AuthzError> + Send + Sync>;

/// Name → factory map populated during startup and read-only afterwards.
pub struct AuthorizerRegistry {
    factories: RwLock<HashMap<String, AuthorizerFactory>>,
    order: RwLock<Vec<String>>,
}

impl AuthorizerRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            factories: RwLock::new(HashMap::new()),
            order: RwLock::new(Vec::new()),
        }
    }

    /// Register a factory under `name`; re-registering an existing name is a
    /// programming error and fails with `AlreadyRegistered`.
    pub fn register(
        &self,
        name: impl Into<String>,
        factory: AuthorizerFactory,
    ) -> Result<(), AuthzError> {
        let name = name.into();
        let mut factories = self.factories.write();
        if factories.contains_key(&name) {
            return Err(AuthzError::AlreadyRegistered(name));
        }
        factories.insert(name.clone(), factory);
        self.order.write().push(name);
        Ok(())
    }

    /// Registered mode names, in registration order
    pub fn modes(&self) -> Vec<String> {
        self.order.read().clone()
    }

    /// Whether `name` is a registered mode
    pub fn is_valid_mode(&self, name: &str) -> bool {
        self.factories.read().contains_key(name)
    }

    /// Invoke the factory registered under `name`
    pub fn resolve(&self, name: &str) -> Result<Option<Arc<dyn AuthorizationMode>>, AuthzError> {
        let factories = self.factories.read();
        let factory = factories
            .get(name)
            .ok_or_else(|| AuthzError::UnknownMode(name.to_string()))?;
        factory()
    }
}

impl Default for AuthorizerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simple::AlwaysAllowAuthorizer;

    fn allow_factory() -> AuthorizerFactory {
        Box::new(|| Ok(Some(Arc::new(AlwaysAllowAuthorizer) as Arc<dyn AuthorizationMode>)))
    }

    #[test]
    fn test_register_and_resolve() {
        let registry = AuthorizerRegistry::new();
        registry.register("AlwaysAllow", allow_factory()).unwrap();

        assert!(registry.is_valid_mode("AlwaysAllow"));
        assert!(!registry.is_valid_mode("Nope"));
        assert!(registry.resolve("AlwaysAllow").unwrap().is_some());
    }

    #[test]
    fn test_duplicate_registration_rejected() {
        let registry = AuthorizerRegistry::new();
        registry.register("AlwaysAllow", allow_factory()).unwrap();
        let err = registry
            .register("AlwaysAllow", allow_factory())
            .unwrap_err();
        assert!(matches!(err, AuthzError::AlreadyRegistered(_)));
    }

    #[test]
    fn test_unknown_mode_errors() {
        let registry = AuthorizerRegistry::new();
        assert!(matches!(
            registry.resolve("Nope"),
            Err(AuthzError::UnknownMode(_))
        ));
    }

    #[test]
    fn test_absent_factory_resolves_to_none() {
        let registry = AuthorizerRegistry::new();
        registry
            .register("Disabled", Box::new(|| Ok(None)))
            .unwrap();
        assert!(registry.resolve("Disabled").unwrap().is_none());
    }

    #[test]
    fn test_modes_in_registration_order() {
        let registry = AuthorizerRegistry::new();
        registry.register("B", allow_factory()).unwrap();
        registry.register("A", allow_factory()).unwrap();
        assert_eq!(registry.modes(), vec!["B".to_string(), "A".to_string()]);
    }
}
