use std::collections::{HashMap, HashSet};
use std::path::Path;

use crate::errors::AuthzError;
use crate::policy::parse_kdl_document;
use crate::store::InMemoryRoleStore;
use crate::types::Role;

/// Load all `.kdl` policy files from the given directory into an immutable
/// role store, validating the hierarchy for cycles up front so a malformed
/// configuration fails loudly at startup instead of at check time.
pub fn load_roles(dir: &Path) -> Result<InMemoryRoleStore, AuthzError> {
    if !dir.is_dir() {
        return Err(AuthzError::InvalidPolicy(format!(
            "policies directory `{}` does not exist or is not a directory",
            dir.display()
        )));
    }

    let mut entries: Vec<_> = std::fs::read_dir(dir)?
        .filter_map(|e| e.ok())
        .filter(|e| {
            e.path()
                .extension()
                .map(|ext| ext == "kdl")
                .unwrap_or(false)
        })
        .collect();
    entries.sort_by_key(|e| e.path());

    let mut all_roles = Vec::new();
    let mut file_count = 0;

    for entry in entries {
        let path = entry.path();
        let contents =
            std::fs::read_to_string(&path).map_err(|source| AuthzError::PolicyLoad {
                path: path.display().to_string(),
                source,
            })?;
        all_roles.extend(parse_kdl_document(&contents)?);
        file_count += 1;
    }

    let store = compile_roles(all_roles)?;

    tracing::info!(
        files = file_count,
        roles = store.role_count(),
        "Loaded role definitions"
    );

    Ok(store)
}

/// Merge role definitions (later definitions win on duplicate ids) and
/// validate the parent graph.
pub fn compile_roles(all_roles: Vec<Role>) -> Result<InMemoryRoleStore, AuthzError> {
    let mut merged: HashMap<String, Role> = HashMap::new();
    for role in all_roles {
        if merged.insert(role.id.clone(), role).is_some() {
            tracing::debug!("duplicate role definition, later one wins");
        }
    }

    check_role_cycles(&merged)?;

    // Unknown parents are tolerated at resolve time (skipped with a
    // warning), but flag them here where the operator can still fix them.
    for role in merged.values() {
        for parent in &role.parents {
            if !merged.contains_key(parent) {
                tracing::warn!(role = %role.id, parent = %parent, "role references undefined parent");
            }
        }
    }

    Ok(InMemoryRoleStore::new(merged.into_values()))
}

/// Check for cycles in the parent graph using DFS.
fn check_role_cycles(roles: &HashMap<String, Role>) -> Result<(), AuthzError> {
    let mut visited = HashSet::new();
    let mut in_stack = HashSet::new();

    for id in roles.keys() {
        if !visited.contains(id) {
            dfs_cycle_check(id, roles, &mut visited, &mut in_stack)?;
        }
    }
    Ok(())
}

fn dfs_cycle_check(
    id: &str,
    roles: &HashMap<String, Role>,
    visited: &mut HashSet<String>,
    in_stack: &mut HashSet<String>,
) -> Result<(), AuthzError> {
    visited.insert(id.to_string());
    in_stack.insert(id.to_string());

    if let Some(role) = roles.get(id) {
        for parent in &role.parents {
            if in_stack.contains(parent.as_str()) {
                return Err(AuthzError::CyclicRoleHierarchy(format!("{id} -> {parent}")));
            }
            if !visited.contains(parent.as_str()) {
                dfs_cycle_check(parent, roles, visited, in_stack)?;
            }
        }
    }

    in_stack.remove(id);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compile_basic() {
        let store = compile_roles(vec![
            Role::new("viewer").with_permissions(["post.view"]),
            Role::new("editor")
                .with_permissions(["post.edit"])
                .with_parents(["viewer"]),
        ])
        .unwrap();
        assert_eq!(store.role_count(), 2);
        assert!(store.contains("editor"));
    }

    #[test]
    fn test_compile_duplicate_role_later_wins() {
        let store = compile_roles(vec![
            Role::new("viewer").with_permissions(["post.view"]),
            Role::new("viewer").with_permissions(["post.view", "comment.view"]),
        ])
        .unwrap();
        assert_eq!(store.role_count(), 1);
        let role = crate::store::RoleStore::role(&store, "viewer").unwrap();
        assert_eq!(role.permissions.len(), 2);
    }

    #[test]
    fn test_compile_cycle_rejected() {
        let err = compile_roles(vec![
            Role::new("a").with_parents(["b"]),
            Role::new("b").with_parents(["a"]),
        ])
        .unwrap_err();
        assert!(matches!(err, AuthzError::CyclicRoleHierarchy(_)));
    }

    #[test]
    fn test_compile_undefined_parent_tolerated() {
        let store = compile_roles(vec![Role::new("editor").with_parents(["ghost"])]).unwrap();
        assert_eq!(store.role_count(), 1);
    }

    #[test]
    fn test_load_from_directory() {
        let dir = tempfile::tempdir().unwrap();

        std::fs::write(
            dir.path().join("base.kdl"),
            r#"
role "viewer" {
    permissions {
        - "post.view"
    }
}
"#,
        )
        .unwrap();

        std::fs::write(
            dir.path().join("editorial.kdl"),
            r#"
role "editor" {
    parents {
        - "viewer"
    }
    permissions {
        - "post.edit"
    }
}
"#,
        )
        .unwrap();

        // Non-KDL files are ignored
        std::fs::write(dir.path().join("README.md"), "not a policy").unwrap();

        let store = load_roles(dir.path()).unwrap();
        assert_eq!(store.role_count(), 2);
        assert!(store.contains("viewer"));
        assert!(store.contains("editor"));
    }

    #[test]
    fn test_load_cycle_across_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.kdl"), "role \"a\" {\n parents {\n - \"b\"\n }\n}").unwrap();
        std::fs::write(dir.path().join("b.kdl"), "role \"b\" {\n parents {\n - \"a\"\n }\n}").unwrap();

        let err = load_roles(dir.path()).unwrap_err();
        assert!(matches!(err, AuthzError::CyclicRoleHierarchy(_)));
    }

    #[test]
    fn test_load_nonexistent_directory() {
        let err = load_roles(Path::new("/nonexistent/path")).unwrap_err();
        assert!(matches!(err, AuthzError::InvalidPolicy(_)));
    }
}
