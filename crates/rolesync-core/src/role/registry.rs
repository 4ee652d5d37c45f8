//! Column visibility of the target instance.

use std::collections::BTreeSet;

use tracing::debug;

use super::{RoleAttribute, ROLE_ATTRIBUTES};

/// Role attributes the target instance exposes to the connected role.
///
/// Built once per run from the introspected `pg_roles` columns, then passed
/// by reference to every rendering call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceColumnRegistry {
    visible: BTreeSet<RoleAttribute>,
}

impl InstanceColumnRegistry {
    /// Builds the registry from catalog column names.
    ///
    /// Without superuser privileges, `SUPERUSER`, `REPLICATION` and
    /// `BYPASSRLS` are hidden whatever the catalog says.
    pub fn build<I, S>(columns: I, is_superuser: bool) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut visible = BTreeSet::new();
        for column in columns {
            let column = column.as_ref();
            let Some(spec) = ROLE_ATTRIBUTES.iter().find(|spec| spec.column == column) else {
                continue;
            };
            if !is_superuser && spec.attribute.is_privileged() {
                debug!(column, "Ignoring privileged role column.");
                continue;
            }
            visible.insert(spec.attribute);
        }
        Self { visible }
    }

    /// Registry of a superuser connection to an instance exposing every column.
    #[must_use]
    pub fn all_visible() -> Self {
        Self::build(ROLE_ATTRIBUTES.iter().map(|spec| spec.column), true)
    }

    #[must_use]
    pub fn is_visible(&self, attribute: RoleAttribute) -> bool {
        self.visible.contains(&attribute)
    }

    /// Catalog columns to select when inspecting roles, in rendering order.
    pub fn columns(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.visible.iter().map(|attribute| attribute.spec().column)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::role::RoleOptions;

    #[test]
    fn test_build_from_catalog() {
        let registry = InstanceColumnRegistry::build(["rolname", "rolcanlogin", "rolsuper"], true);
        assert!(registry.is_visible(RoleAttribute::CanLogin));
        assert!(registry.is_visible(RoleAttribute::Super));
        assert!(!registry.is_visible(RoleAttribute::BypassRls));
        assert_eq!(
            registry.columns().collect::<Vec<_>>(),
            vec!["rolsuper", "rolcanlogin"]
        );
    }

    #[test]
    fn test_non_superuser_hides_privileged_columns() {
        let columns: Vec<&str> = ROLE_ATTRIBUTES.iter().map(|spec| spec.column).collect();
        let registry = InstanceColumnRegistry::build(&columns, false);
        assert!(!registry.is_visible(RoleAttribute::Super));
        assert!(!registry.is_visible(RoleAttribute::Replication));
        assert!(!registry.is_visible(RoleAttribute::BypassRls));
        assert!(registry.is_visible(RoleAttribute::CreateRole));
        assert!(registry.is_visible(RoleAttribute::ConnLimit));
    }

    #[test]
    fn test_non_superuser_never_renders_privileged_tokens() {
        let columns: Vec<&str> = ROLE_ATTRIBUTES.iter().map(|spec| spec.column).collect();
        let registry = InstanceColumnRegistry::build(&columns, false);
        for clause in [
            "SUPERUSER REPLICATION BYPASSRLS",
            "NOSUPERUSER NOREPLICATION NOBYPASSRLS LOGIN",
        ] {
            let rendered = RoleOptions::parse(clause).unwrap().render(&registry);
            assert!(!rendered.contains("SUPERUSER"), "{rendered}");
            assert!(!rendered.contains("REPLICATION"), "{rendered}");
            assert!(!rendered.contains("BYPASSRLS"), "{rendered}");
        }
    }
}
