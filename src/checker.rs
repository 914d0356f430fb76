use std::collections::HashSet;

/// Exact-match membership test over a resolved permission set.
///
/// Deliberately has no wildcard semantics: `admin.*` would be a
/// pattern-matching feature with its own design, not a default behavior.
pub fn has_permission(effective: &HashSet<String>, requested: &str) -> bool {
    effective.contains(requested)
}
