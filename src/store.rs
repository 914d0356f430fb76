use std::collections::HashMap;
use std::sync::Arc;

use crate::errors::AuthzError;
use crate::types::Role;

/// Read contract the authorization core depends on. Backed by any
/// persistence collaborator (file, database); loading must be deterministic
/// and side-effect-free from the core's perspective.
pub trait RoleStore: Send + Sync {
    /// Fetch a single role by id. `UnknownRole` if absent.
    fn role(&self, id: &str) -> Result<Role, AuthzError>;

    /// Fetch several roles in input order, skipping ids that do not exist
    /// with a recorded warning.
    fn roles(&self, ids: &[String]) -> Vec<Role> {
        ids.iter()
            .filter_map(|id| match self.role(id) {
                Ok(role) => Some(role),
                Err(AuthzError::UnknownRole(_)) => {
                    tracing::warn!(role = %id, "skipping unknown role");
                    None
                }
                Err(e) => {
                    tracing::warn!(role = %id, error = %e, "failed to load role");
                    None
                }
            })
            .collect()
    }
}

impl<S: RoleStore + ?Sized> RoleStore for &S {
    fn role(&self, id: &str) -> Result<Role, AuthzError> {
        (**self).role(id)
    }
}

impl<S: RoleStore + ?Sized> RoleStore for Arc<S> {
    fn role(&self, id: &str) -> Result<Role, AuthzError> {
        (**self).role(id)
    }
}

/// Role store over an in-memory map, built once from parsed policy files
/// (or directly from `Role` values) and immutable afterwards.
#[derive(Debug, Clone, Default)]
pub struct InMemoryRoleStore {
    roles: HashMap<String, Role>,
}

impl InMemoryRoleStore {
    pub fn new<I>(roles: I) -> Self
    where
        I: IntoIterator<Item = Role>,
    {
        Self {
            roles: roles.into_iter().map(|r| (r.id.clone(), r)).collect(),
        }
    }

    pub fn role_count(&self) -> usize {
        self.roles.len()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.roles.contains_key(id)
    }

    /// Iterate over all stored roles, in arbitrary order.
    pub fn iter(&self) -> impl Iterator<Item = &Role> {
        self.roles.values()
    }
}

impl RoleStore for InMemoryRoleStore {
    fn role(&self, id: &str) -> Result<Role, AuthzError> {
        self.roles
            .get(id)
            .cloned()
            .ok_or_else(|| AuthzError::UnknownRole(id.to_string()))
    }
}

impl FromIterator<Role> for InMemoryRoleStore {
    fn from_iter<I: IntoIterator<Item = Role>>(iter: I) -> Self {
        Self::new(iter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_store() -> InMemoryRoleStore {
        InMemoryRoleStore::new([
            Role::new("viewer").with_permissions(["post.view"]),
            Role::new("editor")
                .with_permissions(["post.edit"])
                .with_parents(["viewer"]),
        ])
    }

    #[test]
    fn test_role_found() {
        let store = make_store();
        let role = store.role("editor").unwrap();
        assert_eq!(role.permissions, vec!["post.edit"]);
        assert_eq!(role.parents, vec!["viewer"]);
    }

    #[test]
    fn test_role_not_found() {
        let store = make_store();
        let err = store.role("admin").unwrap_err();
        assert!(matches!(err, AuthzError::UnknownRole(id) if id == "admin"));
    }

    #[test]
    fn test_roles_skips_unknown_preserving_order() {
        let store = make_store();
        let ids = vec![
            "editor".to_string(),
            "ghost".to_string(),
            "viewer".to_string(),
        ];
        let roles = store.roles(&ids);
        let got: Vec<&str> = roles.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(got, vec!["editor", "viewer"]);
    }

    #[test]
    fn test_store_through_arc() {
        let store = Arc::new(make_store());
        assert!(store.role("viewer").is_ok());
    }
}
