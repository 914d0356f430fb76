use miette::Diagnostic;
use thiserror::Error;

use crate::assertion::AssertionError;

#[derive(Debug, Error, Diagnostic)]
pub enum AuthzError {
    #[error("Failed to load policy file `{path}`")]
    #[diagnostic(
        code(fulcrum::policy_load),
        help("Check that the file exists and contains valid KDL syntax")
    )]
    PolicyLoad {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid policy: {0}")]
    #[diagnostic(
        code(fulcrum::invalid_policy),
        help("Each policy file must contain `role` KDL nodes with optional `permissions` and `parents` children")
    )]
    InvalidPolicy(String),

    #[error("KDL parse error: {0}")]
    #[diagnostic(
        code(fulcrum::kdl_parse),
        help("Check your KDL file syntax, see https://kdl.dev for the specification")
    )]
    KdlParse(String),

    #[error("Unknown role `{0}`")]
    #[diagnostic(
        code(fulcrum::unknown_role),
        help("Define the role with: role \"<name>\" {{ permissions {{ ... }} }}")
    )]
    UnknownRole(String),

    #[error("Cyclic role hierarchy detected: {0}")]
    #[diagnostic(
        code(fulcrum::cyclic_roles),
        help("Check the `parents` lists in your role definitions for circular references")
    )]
    CyclicRoleHierarchy(String),

    #[error("Invalid assertion expression: {0}")]
    #[diagnostic(
        code(fulcrum::invalid_expr),
        help("Supported operators: ==, !=, >, <, >=, <=, &&, ||, !, in. Paths use dot notation (e.g. resource.author)")
    )]
    InvalidExpr(String),

    #[error("Assertion failed to evaluate")]
    #[diagnostic(code(fulcrum::assertion))]
    Assertion(#[source] AssertionError),

    #[error("I/O error: {0}")]
    #[diagnostic(code(fulcrum::io))]
    Io(#[from] std::io::Error),
}
