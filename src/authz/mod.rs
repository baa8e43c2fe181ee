//! Hierarchical role-based authorization (`spec.md` §3, §4.7).

pub mod namespace;
pub mod permissions;

pub use namespace::NamespaceAuthorizer;
pub use permissions::{builtin_roles, Action, Permission, PermissionSet, ResourceType};
