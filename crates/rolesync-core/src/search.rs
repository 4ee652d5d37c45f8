//! Directory search definitions.

use std::collections::{BTreeMap, BTreeSet};

use serde::Deserialize;

/// Depth of a directory search.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    /// The base object only.
    Base,
    /// Direct children of the base object.
    #[serde(alias = "onelevel")]
    One,
    /// The whole subtree under the base object.
    #[default]
    #[serde(alias = "subtree")]
    Sub,
}

fn default_filter() -> String {
    "(objectClass=*)".to_string()
}

/// A search run once per entry of the parent search, joined on an
/// attribute of that entry.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Subsearch {
    #[serde(default = "default_filter")]
    pub filter: String,
    #[serde(default)]
    pub scope: Scope,
    #[serde(default)]
    pub attributes: BTreeSet<String>,
}

impl Subsearch {
    /// Creates a sub-search matching every object.
    #[must_use]
    pub fn new() -> Self {
        Self {
            filter: default_filter(),
            scope: Scope::default(),
            attributes: BTreeSet::new(),
        }
    }
}

impl Default for Subsearch {
    fn default() -> Self {
        Self::new()
    }
}

/// Parameters of a directory search feeding one set of rules.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SearchDefinition {
    #[serde(default)]
    pub base: String,
    #[serde(default)]
    pub scope: Scope,
    #[serde(default = "default_filter")]
    pub filter: String,
    #[serde(default)]
    pub attributes: BTreeSet<String>,
    /// Sub-searches keyed by the join attribute of the parent entry.
    #[serde(default, rename = "joins")]
    pub subsearches: BTreeMap<String, Subsearch>,
}

impl SearchDefinition {
    /// Creates a subtree search under `base`.
    #[must_use]
    pub fn new(base: impl Into<String>) -> Self {
        Self {
            base: base.into(),
            scope: Scope::default(),
            filter: default_filter(),
            attributes: BTreeSet::new(),
            subsearches: BTreeMap::new(),
        }
    }

    /// Sets the filter.
    #[must_use]
    pub fn filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = filter.into();
        self
    }

    /// Requests an attribute.
    #[must_use]
    pub fn attribute(mut self, name: impl Into<String>) -> Self {
        self.attributes.insert(name.into());
        self
    }

    /// Declares a sub-search joined on `attribute`.
    #[must_use]
    pub fn join(mut self, attribute: impl Into<String>, subsearch: Subsearch) -> Self {
        self.subsearches.insert(attribute.into(), subsearch);
        self
    }

    /// Returns the join attribute and the sub-search, if any.
    ///
    /// Only meaningful once cardinality is validated: with several
    /// sub-searches declared, the first by join attribute is returned.
    #[must_use]
    pub fn subsearch(&self) -> Option<(&str, &Subsearch)> {
        self.subsearches
            .iter()
            .next()
            .map(|(attribute, subsearch)| (attribute.as_str(), subsearch))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_defaults() {
        let search: SearchDefinition = serde_yaml::from_str("base: ou=groups,dc=acme").unwrap();
        assert_eq!(search.scope, Scope::Sub);
        assert_eq!(search.filter, "(objectClass=*)");
        assert!(search.attributes.is_empty());
        assert!(search.subsearch().is_none());
    }

    #[test]
    fn test_deserialize_join() {
        let search: SearchDefinition = serde_yaml::from_str(
            r"
base: ou=groups,dc=acme
scope: one
attributes: [cn, cn, member]
joins:
  member:
    filter: (objectClass=person)
    attributes: [uid]
",
        )
        .unwrap();
        assert_eq!(search.scope, Scope::One);
        assert_eq!(search.attributes.len(), 2);
        let (attribute, subsearch) = search.subsearch().unwrap();
        assert_eq!(attribute, "member");
        assert_eq!(subsearch.filter, "(objectClass=person)");
        assert!(subsearch.attributes.contains("uid"));
    }

    #[test]
    fn test_reject_unknown_scope() {
        assert!(serde_yaml::from_str::<Scope>("deep").is_err());
    }
}
