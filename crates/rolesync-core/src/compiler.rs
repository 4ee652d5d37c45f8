//! Rule compilation.
//!
//! Turns decoded [`SyncItem`]s into a validated rule set:
//!
//! 1. reject items declaring more than one sub-search,
//! 2. infer the attributes each search must request,
//! 3. rewrite fields resolving against the sub-search as subentry fields,
//! 4. move static rules into search-less items.
//!
//! When an attribute is requested by both the main search and the
//! sub-search, a field naming it resolves against the main entry.

use tracing::debug;

use crate::rule::{RuleTemplate, SyncItem};
use crate::search::SearchDefinition;
use crate::template::{Field, TemplateError};

/// Errors raised while compiling rules.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CompileError {
    /// More than one sub-search under a single search.
    #[error("multiple sub-search unsupported (joins: {})", .joins.join(", "))]
    MultipleSubsearch {
        /// Join attributes declared.
        joins: Vec<String>,
    },

    /// A field names an attribute requested by no search.
    #[error("Field '{field}' references attribute '{attribute}' requested by no search")]
    UnresolvedAttribute {
        /// The field as written in the template.
        field: String,
        /// The attribute that could not be resolved.
        attribute: String,
    },

    /// A template failed to parse or render.
    #[error(transparent)]
    Template(#[from] TemplateError),
}

/// Fails if the item declares more than one sub-search.
///
/// Expansion of wanted roles joins a single sub-search per entry.
///
/// # Errors
///
/// Returns [`CompileError::MultipleSubsearch`].
pub fn validate_subsearch_cardinality(item: &SyncItem) -> Result<(), CompileError> {
    match &item.search {
        Some(search) if search.subsearches.len() > 1 => Err(CompileError::MultipleSubsearch {
            joins: search.subsearches.keys().cloned().collect(),
        }),
        _ => Ok(()),
    }
}

/// Adds to the item's search every attribute its rules reference.
///
/// The join attribute of a sub-search is always requested from the main
/// entry. `join.attr` fields request `attr` from the sub-search. Running it
/// twice changes nothing.
pub fn infer_attributes(item: &mut SyncItem) {
    let Some(search) = item.search.as_mut() else {
        return;
    };

    for join in search.subsearches.keys() {
        search.attributes.insert(join.clone());
    }

    for field in item.roles.iter().flat_map(RuleTemplate::fields) {
        if field.is_subentry() {
            if let Some(subsearch) = search.subsearches.values_mut().next() {
                subsearch.attributes.insert(field.attribute().to_string());
            }
            continue;
        }

        search.attributes.insert(field.attribute().to_string());
        if let Some(sub_attribute) = field.sub_attribute() {
            if let Some(subsearch) = search.subsearches.get_mut(field.attribute()) {
                subsearch.attributes.insert(sub_attribute.to_string());
            }
        }
    }
}

fn unresolved(field: &Field, attribute: &str) -> CompileError {
    CompileError::UnresolvedAttribute {
        field: field.name().to_string(),
        attribute: attribute.to_string(),
    }
}

fn resolve_field(field: &Field, search: Option<&SearchDefinition>) -> Result<Field, CompileError> {
    if field.is_subentry() {
        return Ok(field.clone());
    }
    let Some(search) = search else {
        return Err(unresolved(field, field.attribute()));
    };
    let join = search.subsearch();

    if let (Some((join_attribute, subsearch)), Some(sub_attribute)) = (join, field.sub_attribute()) {
        if field.attribute() == join_attribute {
            if !subsearch.attributes.contains(sub_attribute) {
                return Err(unresolved(field, sub_attribute));
            }
            return Ok(field.clone().into_subentry(sub_attribute));
        }
    }

    if search.attributes.contains(field.attribute()) {
        return Ok(field.clone());
    }

    match join {
        Some((_, subsearch)) if subsearch.attributes.contains(field.attribute()) => {
            Ok(field.clone().into_subentry(field.name()))
        }
        _ => Err(unresolved(field, field.attribute())),
    }
}

/// Rewrites fields that resolve against the sub-search into subentry
/// fields, so expansion reads them from joined entries.
///
/// The item is left untouched on error.
///
/// # Errors
///
/// Returns [`CompileError::UnresolvedAttribute`] if a field resolves
/// against neither the main search nor the sub-search.
pub fn replace_attribute_as_subentry_field(item: &mut SyncItem) -> Result<(), CompileError> {
    let search = item.search.as_ref();
    let roles = item
        .roles
        .iter()
        .map(|rule| -> Result<RuleTemplate, CompileError> {
            let resolve = |field: &Field| resolve_field(field, search);
            Ok(RuleTemplate {
                name: rule.name.try_map_fields(resolve)?,
                comment: rule.comment.try_map_fields(resolve)?,
                parents: rule
                    .parents
                    .iter()
                    .map(|parent| parent.try_map_fields(resolve))
                    .collect::<Result<Vec<_>, _>>()?,
                options: rule.options,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;
    item.roles = roles;
    Ok(())
}

/// Stable partition of rules into `(static, dynamic)`.
#[must_use]
pub fn split_static_rules(rules: Vec<RuleTemplate>) -> (Vec<RuleTemplate>, Vec<RuleTemplate>) {
    rules.into_iter().partition(RuleTemplate::is_static)
}

/// Moves static rules of items with a search into a preceding search-less
/// item, so they are generated without querying the directory.
///
/// An item with a search and no dynamic rule left is dropped.
#[must_use]
pub fn split_static_items(items: Vec<SyncItem>) -> Vec<SyncItem> {
    let mut out = Vec::with_capacity(items.len());
    for mut item in items {
        if !item.has_search() {
            out.push(item);
            continue;
        }

        let (static_rules, dynamic_rules) = split_static_rules(std::mem::take(&mut item.roles));
        if !static_rules.is_empty() {
            out.push(SyncItem {
                description: item.description.clone(),
                search: None,
                roles: static_rules,
            });
        }
        if !dynamic_rules.is_empty() {
            item.roles = dynamic_rules;
            out.push(item);
        }
    }
    out
}

/// Validates and compiles decoded items.
///
/// Cardinality is checked on every item before any of them is modified.
///
/// # Errors
///
/// Returns the first [`CompileError`] met.
pub fn compile(mut items: Vec<SyncItem>) -> Result<Vec<SyncItem>, CompileError> {
    for item in &items {
        validate_subsearch_cardinality(item)?;
    }
    for item in &mut items {
        infer_attributes(item);
        replace_attribute_as_subentry_field(item)?;
        if let Some(search) = &item.search {
            debug!(
                description = item.description.as_deref().unwrap_or_default(),
                base = %search.base,
                attributes = ?search.attributes,
                "Inferred search attributes."
            );
        }
    }
    Ok(split_static_items(items))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::Subsearch;
    use crate::template::FieldSource;

    fn groups_item() -> SyncItem {
        SyncItem::new(Some("Groups".to_string()))
            .search(
                SearchDefinition::new("ou=groups,dc=acme")
                    .join("member", Subsearch::new()),
            )
            .rule(
                RuleTemplate::new("{cn}")
                    .unwrap()
                    .parent("{member.uid}")
                    .unwrap(),
            )
    }

    #[test]
    fn test_infer_attributes() {
        let mut item = groups_item();
        infer_attributes(&mut item);
        let search = item.search.as_ref().unwrap();
        assert_eq!(
            search.attributes.iter().collect::<Vec<_>>(),
            vec!["cn", "member"]
        );
        let (_, subsearch) = search.subsearch().unwrap();
        assert!(subsearch.attributes.contains("uid"));
    }

    #[test]
    fn test_infer_attributes_is_idempotent() {
        let mut item = groups_item();
        infer_attributes(&mut item);
        let once = item.clone();
        infer_attributes(&mut item);
        assert_eq!(item, once);

        replace_attribute_as_subentry_field(&mut item).unwrap();
        let replaced = item.clone();
        infer_attributes(&mut item);
        assert_eq!(item.search, replaced.search);
    }

    #[test]
    fn test_multiple_subsearch_rejected_without_mutation() {
        let mut item = groups_item();
        item.search = item
            .search
            .map(|search| search.join("owner", Subsearch::new()));
        let before = item.clone();

        let err = compile(vec![before.clone()]).unwrap_err();
        assert!(err.to_string().contains("multiple sub-search unsupported"));
        assert_eq!(
            validate_subsearch_cardinality(&item).unwrap_err(),
            CompileError::MultipleSubsearch {
                joins: vec!["member".to_string(), "owner".to_string()],
            }
        );
        assert_eq!(item, before);
    }

    #[test]
    fn test_replace_join_field_with_subentry() {
        let mut item = groups_item();
        infer_attributes(&mut item);
        replace_attribute_as_subentry_field(&mut item).unwrap();
        let parent = item.roles[0].parents[0].fields().next().unwrap();
        assert_eq!(parent.source(), FieldSource::Subentry);
        assert_eq!(parent.name(), "uid");
        let name = item.roles[0].name.fields().next().unwrap();
        assert_eq!(name.source(), FieldSource::Entry);
    }

    #[test]
    fn test_replace_prefers_main_entry() {
        let mut item = SyncItem::new(None)
            .search(
                SearchDefinition::new("dc=acme")
                    .attribute("cn")
                    .join("member", Subsearch::new()),
            )
            .rule(RuleTemplate::new("{cn}").unwrap());
        if let Some(search) = item.search.as_mut() {
            search.subsearches.get_mut("member").unwrap().attributes.insert("cn".to_string());
        }
        replace_attribute_as_subentry_field(&mut item).unwrap();
        let field = item.roles[0].name.fields().next().unwrap();
        assert_eq!(field.source(), FieldSource::Entry);
    }

    #[test]
    fn test_replace_resolves_sub_only_attribute() {
        let mut sub = Subsearch::new();
        sub.attributes.insert("mail".to_string());
        let mut item = SyncItem::new(None)
            .search(SearchDefinition::new("dc=acme").join("member", sub))
            .rule(RuleTemplate::new("{mail}").unwrap());
        replace_attribute_as_subentry_field(&mut item).unwrap();
        let field = item.roles[0].name.fields().next().unwrap();
        assert!(field.is_subentry());
        assert_eq!(field.name(), "mail");
    }

    #[test]
    fn test_replace_fails_on_unknown_attribute() {
        let mut item = SyncItem::new(None)
            .search(SearchDefinition::new("dc=acme").attribute("cn"))
            .rule(RuleTemplate::new("{cn}").unwrap())
            .rule(RuleTemplate::new("{uid}").unwrap());
        let before = item.clone();
        let err = replace_attribute_as_subentry_field(&mut item).unwrap_err();
        assert_eq!(
            err,
            CompileError::UnresolvedAttribute {
                field: "uid".to_string(),
                attribute: "uid".to_string(),
            }
        );
        assert_eq!(item, before);
    }

    #[test]
    fn test_dynamic_rule_without_search_fails() {
        let items = vec![SyncItem::new(None).rule(RuleTemplate::new("{cn}").unwrap())];
        assert!(matches!(
            compile(items),
            Err(CompileError::UnresolvedAttribute { .. })
        ));
    }

    #[test]
    fn test_split_static_rules_is_stable() {
        let rules = vec![
            RuleTemplate::new("a").unwrap(),
            RuleTemplate::new("{cn}").unwrap(),
            RuleTemplate::new("b").unwrap(),
            RuleTemplate::new("{uid}").unwrap(),
        ];
        let (static_rules, dynamic_rules) = split_static_rules(rules);
        let names = |rules: &[RuleTemplate]| {
            rules
                .iter()
                .map(|r| r.name.pattern().to_string())
                .collect::<Vec<_>>()
        };
        assert_eq!(names(&static_rules), vec!["a", "b"]);
        assert_eq!(names(&dynamic_rules), vec!["{cn}", "{uid}"]);
    }

    #[test]
    fn test_split_static_items() {
        let item = groups_item().rule(RuleTemplate::new("readers").unwrap());
        let static_only = SyncItem::new(None).rule(RuleTemplate::new("writers").unwrap());
        let items = split_static_items(vec![item, static_only]);

        assert_eq!(items.len(), 3);
        assert!(!items[0].has_search());
        assert_eq!(items[0].roles[0].name.pattern(), "readers");
        assert_eq!(items[0].description.as_deref(), Some("Groups"));
        assert!(items[1].has_search());
        assert_eq!(items[1].roles.len(), 1);
        assert_eq!(items[2].roles[0].name.pattern(), "writers");
    }

    #[test]
    fn test_compile() {
        let items = compile(vec![groups_item()]).unwrap();
        assert_eq!(items.len(), 1);
        let search = items[0].search.as_ref().unwrap();
        assert!(search.attributes.contains("member"));
        assert!(items[0].roles[0].parents[0].fields().all(Field::is_subentry));
    }
}
