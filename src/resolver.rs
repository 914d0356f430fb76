use std::collections::HashSet;

use crate::errors::AuthzError;
use crate::store::RoleStore;
use crate::types::Role;

/// Resolve directly assigned role ids into the effective flattened
/// permission set: the union of each role's own permissions and those of
/// all transitive ancestors, deduplicated.
///
/// Roles assigned directly to an identity must exist (`UnknownRole`
/// otherwise). A missing *parent* referenced by a stored role is skipped
/// with a warning, matching the `RoleStore::roles` contract.
pub fn resolve_permissions<S>(store: &S, role_ids: &[String]) -> Result<HashSet<String>, AuthzError>
where
    S: RoleStore + ?Sized,
{
    let mut permissions = HashSet::new();
    let mut expanded = HashSet::new();
    let mut in_progress = HashSet::new();

    for id in role_ids {
        let role = store.role(id)?;
        expand(store, &role, &mut permissions, &mut expanded, &mut in_progress)?;
    }

    Ok(permissions)
}

/// DFS over the parent graph. `expanded` guarantees each role is visited
/// at most once under diamond inheritance; `in_progress` holds the current
/// expansion path so a revisit means a cycle, not a diamond.
fn expand<S>(
    store: &S,
    role: &Role,
    permissions: &mut HashSet<String>,
    expanded: &mut HashSet<String>,
    in_progress: &mut HashSet<String>,
) -> Result<(), AuthzError>
where
    S: RoleStore + ?Sized,
{
    if expanded.contains(&role.id) {
        return Ok(());
    }
    in_progress.insert(role.id.clone());

    permissions.extend(role.permissions.iter().cloned());

    for parent_id in &role.parents {
        if expanded.contains(parent_id) {
            continue;
        }
        if in_progress.contains(parent_id) {
            return Err(AuthzError::CyclicRoleHierarchy(format!(
                "{} -> {}",
                role.id, parent_id
            )));
        }
        match store.role(parent_id) {
            Ok(parent) => {
                expand(store, &parent, permissions, expanded, in_progress)?;
            }
            Err(AuthzError::UnknownRole(_)) => {
                tracing::warn!(role = %role.id, parent = %parent_id, "skipping unknown parent role");
            }
            Err(e) => return Err(e),
        }
    }

    in_progress.remove(&role.id);
    expanded.insert(role.id.clone());
    Ok(())
}
