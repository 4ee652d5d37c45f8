//! Roles and role attributes.

mod options;
mod registry;

use std::collections::BTreeSet;

pub use options::{
    AttributeSpec, OptionError, OptionKind, OptionValue, RoleAttribute, RoleOptions,
    ROLE_ATTRIBUTES,
};
pub use registry::InstanceColumnRegistry;

/// A role as it should exist in the target instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Role {
    pub name: String,
    pub comment: String,
    /// Roles this role is a member of.
    pub parents: BTreeSet<String>,
    pub options: RoleOptions,
}
