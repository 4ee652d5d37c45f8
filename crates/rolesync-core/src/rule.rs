//! Role rules and the search items they are bound to.

use std::collections::BTreeSet;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};

use crate::role::{Role, RoleOptions};
use crate::search::SearchDefinition;
use crate::template::{AttributeTemplate, Field, TemplateError};

/// Comment set on roles whose rule declares none.
pub const DEFAULT_COMMENT: &str = "Managed by rolesync.";

fn default_comment() -> AttributeTemplate {
    AttributeTemplate::literal(DEFAULT_COMMENT)
}

/// Accepts either a single value or a list of values.
fn one_or_many<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    match serde_yaml::Value::deserialize(deserializer)? {
        serde_yaml::Value::Null => Ok(Vec::new()),
        serde_yaml::Value::Sequence(items) => items
            .into_iter()
            .map(|item| serde_yaml::from_value(item).map_err(serde::de::Error::custom))
            .collect(),
        item => serde_yaml::from_value(item)
            .map(|one| vec![one])
            .map_err(serde::de::Error::custom),
    }
}

/// Templates generating one role per combination of attribute values.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuleTemplate {
    pub name: AttributeTemplate,
    #[serde(default = "default_comment")]
    pub comment: AttributeTemplate,
    #[serde(default, alias = "parent", deserialize_with = "one_or_many")]
    pub parents: Vec<AttributeTemplate>,
    #[serde(default)]
    pub options: RoleOptions,
}

impl RuleTemplate {
    /// Creates a rule from a name pattern, with the default comment.
    ///
    /// # Errors
    ///
    /// Returns a [`TemplateError`] if `name` is not a valid pattern.
    pub fn new(name: &str) -> Result<Self, TemplateError> {
        Ok(Self {
            name: AttributeTemplate::parse(name)?,
            comment: default_comment(),
            parents: Vec::new(),
            options: RoleOptions::default(),
        })
    }

    /// Sets the comment pattern.
    ///
    /// # Errors
    ///
    /// Returns a [`TemplateError`] if `comment` is not a valid pattern.
    pub fn comment(mut self, comment: &str) -> Result<Self, TemplateError> {
        self.comment = AttributeTemplate::parse(comment)?;
        Ok(self)
    }

    /// Adds a parent pattern.
    ///
    /// # Errors
    ///
    /// Returns a [`TemplateError`] if `parent` is not a valid pattern.
    pub fn parent(mut self, parent: &str) -> Result<Self, TemplateError> {
        self.parents.push(AttributeTemplate::parse(parent)?);
        Ok(self)
    }

    /// Sets the role options.
    #[must_use]
    pub fn options(mut self, options: RoleOptions) -> Self {
        self.options = options;
        self
    }

    /// Iterates the name, comment and parent templates.
    pub fn templates(&self) -> impl Iterator<Item = &AttributeTemplate> {
        std::iter::once(&self.name)
            .chain(std::iter::once(&self.comment))
            .chain(self.parents.iter())
    }

    /// Iterates every field referenced by the rule.
    pub fn fields(&self) -> impl Iterator<Item = &Field> {
        self.templates().flat_map(AttributeTemplate::fields)
    }

    /// A static rule needs no directory entry to produce its role.
    #[must_use]
    pub fn is_static(&self) -> bool {
        self.templates().all(AttributeTemplate::is_constant)
    }

    /// Produces the role of a static rule, or `None` for a dynamic rule.
    #[must_use]
    pub fn generate_static(&self) -> Option<Role> {
        Some(Role {
            name: self.name.as_literal()?,
            comment: self.comment.as_literal()?,
            parents: self
                .parents
                .iter()
                .map(AttributeTemplate::as_literal)
                .collect::<Option<BTreeSet<_>>>()?,
            options: self.options,
        })
    }
}

/// A directory search and the rules fed by its entries.
///
/// Items without a search hold static rules only.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SyncItem {
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, rename = "ldapsearch")]
    pub search: Option<SearchDefinition>,
    #[serde(default, alias = "role", deserialize_with = "one_or_many")]
    pub roles: Vec<RuleTemplate>,
}

impl SyncItem {
    /// Creates an item with no search.
    #[must_use]
    pub fn new(description: Option<String>) -> Self {
        Self {
            description,
            search: None,
            roles: Vec::new(),
        }
    }

    /// Sets the search.
    #[must_use]
    pub fn search(mut self, search: SearchDefinition) -> Self {
        self.search = Some(search);
        self
    }

    /// Adds a rule.
    #[must_use]
    pub fn rule(mut self, rule: RuleTemplate) -> Self {
        self.roles.push(rule);
        self
    }

    #[must_use]
    pub const fn has_search(&self) -> bool {
        self.search.is_some()
    }
}
