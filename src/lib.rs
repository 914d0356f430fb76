//! Fulcrum - role-based authorization engine
//!
//! Decides, for a given identity and requested permission (optionally
//! narrowed by a contextual assertion), whether access is granted. Role
//! definitions come from a [`RoleStore`]; the engine itself holds no state
//! beyond an optional resolution cache.

pub mod assertion;
pub mod cache;
pub mod checker;
pub mod errors;
pub mod expr;
pub mod loader;
pub mod policy;
pub mod resolver;
pub mod service;
pub mod settings;
pub mod store;
pub mod types;

pub use assertion::{Assertion, AssertionError, ExprAssertion};
pub use errors::AuthzError;
pub use service::AuthorizationService;
pub use store::{InMemoryRoleStore, RoleStore};
pub use types::{Identity, Role};
