use kdl::KdlDocument;

use crate::errors::AuthzError;
use crate::types::Role;

/// Parse a KDL document string into role definitions.
///
/// Expected shape:
/// ```kdl
/// role "editor" {
///     parents {
///         - "viewer"
///     }
///     permissions {
///         - "post.edit"
///     }
/// }
/// ```
pub fn parse_kdl_document(source: &str) -> Result<Vec<Role>, AuthzError> {
    let doc: KdlDocument = source
        .parse()
        .map_err(|e: kdl::KdlError| AuthzError::KdlParse(e.to_string()))?;

    let mut roles = Vec::new();

    for node in doc.nodes() {
        match node.name().value() {
            "role" => {
                let id = first_string_arg(node).ok_or_else(|| {
                    AuthzError::InvalidPolicy(
                        "role node requires a string argument (e.g. role \"editor\")".into(),
                    )
                })?;

                let mut permissions = Vec::new();
                let mut parents = Vec::new();

                if let Some(children) = node.children() {
                    for child in children.nodes() {
                        match child.name().value() {
                            "permissions" => {
                                permissions = dash_list(child);
                            }
                            "parents" => {
                                parents = dash_list(child);
                            }
                            other => {
                                return Err(AuthzError::InvalidPolicy(format!(
                                    "unexpected child `{other}` in role `{id}` (expected `permissions` or `parents`)"
                                )));
                            }
                        }
                    }
                }

                roles.push(Role {
                    id,
                    permissions,
                    parents,
                });
            }
            other => {
                // Ignore unknown top-level nodes with a warning
                tracing::warn!("ignoring unknown top-level KDL node `{other}`");
            }
        }
    }

    Ok(roles)
}

/// Extract the first string argument from a KDL node.
fn first_string_arg(node: &kdl::KdlNode) -> Option<String> {
    node.entries()
        .iter()
        .find(|e| e.name().is_none())
        .and_then(|e| e.value().as_string())
        .map(|s| s.to_string())
}

/// Extract dash-list children: nodes named "-" whose first argument is a
/// string.
fn dash_list(node: &kdl::KdlNode) -> Vec<String> {
    let Some(children) = node.children() else {
        return Vec::new();
    };
    children
        .nodes()
        .iter()
        .filter(|n| n.name().value() == "-")
        .filter_map(first_string_arg)
        .collect()
}
