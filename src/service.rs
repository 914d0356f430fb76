use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use crate::assertion::Assertion;
use crate::cache::{CacheStats, ResolutionCache};
use crate::checker;
use crate::errors::AuthzError;
use crate::resolver;
use crate::store::RoleStore;
use crate::types::Identity;

/// Façade combining role resolution, permission checking and assertion
/// evaluation. Receives its role store at construction (ordinary dependency
/// injection, no registry); every check is a stateless evaluation over the
/// identity's roles and the current store snapshot.
pub struct AuthorizationService<S> {
    store: S,
    cache: Option<ResolutionCache>,
}

impl<S: RoleStore> AuthorizationService<S> {
    pub fn new(store: S) -> Self {
        Self { store, cache: None }
    }

    /// Memoize resolved permission sets for `ttl`. The caller is
    /// responsible for calling `invalidate_cache` when role data changes.
    pub fn with_cache(store: S, ttl: Duration) -> Self {
        Self {
            store,
            cache: Some(ResolutionCache::new(ttl)),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Effective permission set for the identity: the union of its roles'
    /// own and all ancestor roles' permissions.
    pub fn effective_permissions(
        &self,
        identity: &Identity,
    ) -> Result<Arc<HashSet<String>>, AuthzError> {
        if let Some(cache) = &self.cache {
            if let Some(hit) = cache.get(&identity.roles) {
                return Ok(hit);
            }
            let resolved = resolver::resolve_permissions(&self.store, &identity.roles)?;
            return Ok(cache.insert(&identity.roles, resolved));
        }
        Ok(Arc::new(resolver::resolve_permissions(
            &self.store,
            &identity.roles,
        )?))
    }

    /// Whether the identity holds the permission. Denial is `Ok(false)`;
    /// errors mean the check could not be evaluated (unknown role, cyclic
    /// hierarchy), never "denied".
    pub fn is_granted(&self, identity: &Identity, permission: &str) -> Result<bool, AuthzError> {
        let effective = self.effective_permissions(identity)?;
        Ok(checker::has_permission(&effective, permission))
    }

    /// Like `is_granted`, narrowed by a contextual assertion. The assertion
    /// runs only when the base permission check passes; a failed base check
    /// never invokes it.
    pub fn is_granted_with(
        &self,
        identity: &Identity,
        permission: &str,
        assertion: &dyn Assertion,
        context: &Value,
    ) -> Result<bool, AuthzError> {
        let effective = self.effective_permissions(identity)?;
        if !checker::has_permission(&effective, permission) {
            return Ok(false);
        }
        assertion
            .check(identity, context)
            .map_err(AuthzError::Assertion)
    }

    pub fn invalidate_cache(&self) {
        if let Some(cache) = &self.cache {
            cache.invalidate_all();
        }
    }

    pub fn cache_stats(&self) -> Option<CacheStats> {
        self.cache.as_ref().map(ResolutionCache::stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assertion::AssertionError;
    use crate::store::InMemoryRoleStore;
    use crate::types::Role;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn make_service() -> AuthorizationService<InMemoryRoleStore> {
        AuthorizationService::new(InMemoryRoleStore::new([
            Role::new("viewer").with_permissions(["post.view"]),
            Role::new("editor")
                .with_permissions(["post.edit"])
                .with_parents(["viewer"]),
        ]))
    }

    #[test]
    fn test_granted_inherited_permission() {
        let service = make_service();
        let alice = Identity::new("alice", ["editor"]);
        assert!(service.is_granted(&alice, "post.view").unwrap());
        assert!(service.is_granted(&alice, "post.edit").unwrap());
    }

    #[test]
    fn test_denied_is_false_not_error() {
        let service = make_service();
        let alice = Identity::new("alice", ["editor"]);
        assert!(!service.is_granted(&alice, "post.delete").unwrap());
    }

    #[test]
    fn test_unknown_role_is_error() {
        let service = make_service();
        let mallory = Identity::new("mallory", ["superuser"]);
        let err = service.is_granted(&mallory, "post.view").unwrap_err();
        assert!(matches!(err, AuthzError::UnknownRole(id) if id == "superuser"));
    }

    #[test]
    fn test_no_roles_denied() {
        let service = make_service();
        let anon = Identity::new("anonymous", Vec::<String>::new());
        assert!(!service.is_granted(&anon, "post.view").unwrap());
    }

    #[test]
    fn test_assertion_result_returned_when_base_check_passes() {
        let service = make_service();
        let alice = Identity::new("alice", ["editor"]);
        let ctx = json!({ "resource": { "author": "bob" } });

        let is_author = |identity: &Identity, context: &Value| -> Result<bool, AssertionError> {
            Ok(context["resource"]["author"] == json!(identity.id))
        };
        assert!(!service
            .is_granted_with(&alice, "post.edit", &is_author, &ctx)
            .unwrap());

        let ctx = json!({ "resource": { "author": "alice" } });
        assert!(service
            .is_granted_with(&alice, "post.edit", &is_author, &ctx)
            .unwrap());
    }

    #[test]
    fn test_assertion_not_evaluated_when_base_check_fails() {
        let service = make_service();
        let alice = Identity::new("alice", ["editor"]);
        let calls = AtomicUsize::new(0);

        let counting = |_: &Identity, _: &Value| -> Result<bool, AssertionError> {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(true)
        };
        let granted = service
            .is_granted_with(&alice, "post.delete", &counting, &Value::Null)
            .unwrap();
        assert!(!granted);
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        service
            .is_granted_with(&alice, "post.edit", &counting, &Value::Null)
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_assertion_error_propagates() {
        let service = make_service();
        let alice = Identity::new("alice", ["editor"]);
        let failing = |_: &Identity, _: &Value| -> Result<bool, AssertionError> {
            Err(AssertionError::new("ownership lookup failed"))
        };
        let err = service
            .is_granted_with(&alice, "post.edit", &failing, &Value::Null)
            .unwrap_err();
        assert!(matches!(err, AuthzError::Assertion(_)));
    }

    #[test]
    fn test_cyclic_hierarchy_is_error() {
        let service = AuthorizationService::new(InMemoryRoleStore::new([
            Role::new("a").with_parents(["b"]),
            Role::new("b").with_parents(["a"]),
        ]));
        let ident = Identity::new("x", ["a"]);
        let err = service.is_granted(&ident, "anything").unwrap_err();
        assert!(matches!(err, AuthzError::CyclicRoleHierarchy(_)));
    }

    #[test]
    fn test_cached_and_uncached_results_agree() {
        let store = InMemoryRoleStore::new([
            Role::new("viewer").with_permissions(["post.view"]),
            Role::new("editor")
                .with_permissions(["post.edit"])
                .with_parents(["viewer"]),
        ]);
        let uncached = AuthorizationService::new(store.clone());
        let cached = AuthorizationService::with_cache(store, Duration::from_secs(60));
        let alice = Identity::new("alice", ["editor"]);

        for permission in ["post.view", "post.edit", "post.delete"] {
            assert_eq!(
                uncached.is_granted(&alice, permission).unwrap(),
                cached.is_granted(&alice, permission).unwrap(),
            );
        }
    }

    #[test]
    fn test_cache_invalidation_forces_reresolution() {
        let store = InMemoryRoleStore::new([Role::new("viewer").with_permissions(["post.view"])]);
        let service = AuthorizationService::with_cache(store, Duration::from_secs(60));
        let alice = Identity::new("alice", ["viewer"]);

        service.is_granted(&alice, "post.view").unwrap();
        service.is_granted(&alice, "post.view").unwrap();
        let stats = service.cache_stats().unwrap();
        assert_eq!(stats.hits, 1);

        service.invalidate_cache();
        service.is_granted(&alice, "post.view").unwrap();
        let stats = service.cache_stats().unwrap();
        assert_eq!(stats.misses, 2);
    }
}
