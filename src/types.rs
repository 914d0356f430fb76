use serde::{Deserialize, Serialize};

/// A named bundle of permissions, optionally inheriting from parent roles.
/// Immutable value object once constructed; the parent graph must be acyclic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub id: String,
    /// Permission identifiers this role grants directly, e.g. "post.edit"
    #[serde(default)]
    pub permissions: Vec<String>,
    /// Ids of roles this role inherits permissions from
    #[serde(default)]
    pub parents: Vec<String>,
}

impl Role {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            permissions: Vec::new(),
            parents: Vec::new(),
        }
    }

    pub fn with_permissions<I, S>(mut self, permissions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.permissions = permissions.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_parents<I, S>(mut self, parents: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.parents = parents.into_iter().map(Into::into).collect();
        self
    }
}

/// The principal being checked. Supplied by the caller per request; the
/// core never persists or mutates it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: String,
    /// Ids of the roles directly assigned to this identity
    #[serde(default)]
    pub roles: Vec<String>,
}

impl Identity {
    pub fn new<I, S>(id: impl Into<String>, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            id: id.into(),
            roles: roles.into_iter().map(Into::into).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_builder() {
        let role = Role::new("editor")
            .with_permissions(["post.edit", "post.publish"])
            .with_parents(["viewer"]);
        assert_eq!(role.id, "editor");
        assert_eq!(role.permissions, vec!["post.edit", "post.publish"]);
        assert_eq!(role.parents, vec!["viewer"]);
    }

    #[test]
    fn test_identity_new() {
        let identity = Identity::new("alice", ["editor", "viewer"]);
        assert_eq!(identity.id, "alice");
        assert_eq!(identity.roles, vec!["editor", "viewer"]);
    }

    #[test]
    fn test_role_deserialize_defaults() {
        let role: Role = serde_json::from_str(r#"{ "id": "viewer" }"#).unwrap();
        assert_eq!(role.id, "viewer");
        assert!(role.permissions.is_empty());
        assert!(role.parents.is_empty());
    }
}
