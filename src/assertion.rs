//! Caller-supplied contextual predicates, evaluated only after a positive
//! base permission check.

use std::fmt;

use serde_json::Value;

use crate::errors::AuthzError;
use crate::expr::{self, Expr};
use crate::types::Identity;

/// Error raised from inside an assertion. Propagated unmodified to the
/// caller (wrapped in `AuthzError::Assertion`) rather than being coerced to
/// a denial: "could not evaluate" and "evaluated, not granted" stay distinct.
#[derive(Debug)]
pub struct AssertionError {
    message: String,
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl AssertionError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source(
        message: impl Into<String>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self {
            message: message.into(),
            source: Some(source.into()),
        }
    }
}

impl fmt::Display for AssertionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for AssertionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_deref()
            .map(|e| e as &(dyn std::error::Error + 'static))
    }
}

/// Contextual predicate narrowing a permission grant to specific data,
/// e.g. "the identity is the author of this resource". Stateless from the
/// engine's point of view; may close over external resources, which is the
/// caller's responsibility.
pub trait Assertion {
    fn check(&self, identity: &Identity, context: &Value) -> Result<bool, AssertionError>;
}

impl<F> Assertion for F
where
    F: Fn(&Identity, &Value) -> Result<bool, AssertionError>,
{
    fn check(&self, identity: &Identity, context: &Value) -> Result<bool, AssertionError> {
        self(identity, context)
    }
}

/// Assertion compiled from a condition expression, evaluated against the
/// JSON context. The identity is exposed to the expression under the
/// `identity` key (`identity.id`, `identity.roles`).
#[derive(Debug, Clone)]
pub struct ExprAssertion {
    expr: Expr,
}

impl ExprAssertion {
    pub fn parse(input: &str) -> Result<Self, AuthzError> {
        Ok(Self {
            expr: expr::parse(input)?,
        })
    }
}

impl Assertion for ExprAssertion {
    fn check(&self, identity: &Identity, context: &Value) -> Result<bool, AssertionError> {
        let scope = match context {
            // merge the identity into object contexts without clobbering
            // a caller-supplied `identity` key
            Value::Object(fields) if !fields.contains_key("identity") => {
                let mut fields = fields.clone();
                fields.insert(
                    "identity".to_string(),
                    serde_json::to_value(identity).unwrap_or(Value::Null),
                );
                Value::Object(fields)
            }
            Value::Null => serde_json::json!({
                "identity": serde_json::to_value(identity).unwrap_or(Value::Null)
            }),
            other => other.clone(),
        };
        expr::evaluate(&self.expr, &scope)
            .map_err(|e| AssertionError::with_source("condition evaluation failed", e))
    }
}
