mod common;

use common::{compile_err, compiled, rule_names};
use rolesync_core::{CompileError, FieldSource, InstanceColumnRegistry, Scope};

const GROUPS: &str = r"
- description: Static roles
  roles:
  - name: readers
    options: NOLOGIN
  - name: writers
    parent: readers
- description: Groups and members
  ldapsearch:
    base: ou=groups,dc=acme,dc=tld
    filter: (objectClass=groupOfNames)
    joins:
      member:
        filter: (objectClass=person)
  roles:
  - name: ldap_roles
  - name: '{cn}'
    options: {LOGIN: false}
  - name: '{member.uid}'
    parent: '{cn}'
    comment: 'Member of {cn}.'
    options: LOGIN CONNECTION LIMIT 10
";

#[test]
fn test_static_rules_precede_their_search() {
    let items = compiled(GROUPS);
    assert_eq!(items.len(), 3);

    assert!(!items[0].has_search());
    assert_eq!(rule_names(&items[0]), vec!["readers", "writers"]);

    assert!(!items[1].has_search());
    assert_eq!(items[1].description.as_deref(), Some("Groups and members"));
    assert_eq!(rule_names(&items[1]), vec!["ldap_roles"]);

    assert!(items[2].has_search());
    assert_eq!(rule_names(&items[2]), vec!["{cn}", "{member.uid}"]);
}

#[test]
fn test_search_attributes_are_inferred() {
    let items = compiled(GROUPS);
    let search = items[2].search.as_ref().unwrap();
    assert_eq!(search.scope, Scope::Sub);
    let attributes: Vec<&str> = search.attributes.iter().map(String::as_str).collect();
    assert_eq!(attributes, vec!["cn", "member"]);

    let (join, sub) = search.subsearch().unwrap();
    assert_eq!(join, "member");
    assert!(sub.attributes.contains("uid"));
    assert_eq!(sub.filter, "(objectClass=person)");
}

#[test]
fn test_member_fields_resolve_against_subentries() {
    let items = compiled(GROUPS);
    let rule = &items[2].roles[1];
    let name_field = rule.name.fields().next().unwrap();
    assert_eq!(name_field.source(), FieldSource::Subentry);
    assert_eq!(name_field.name(), "uid");

    let parent_field = rule.parents[0].fields().next().unwrap();
    assert_eq!(parent_field.source(), FieldSource::Entry);
    assert_eq!(parent_field.name(), "cn");
}

#[test]
fn test_static_roles_render_with_registry() {
    let items = compiled(GROUPS);
    let registry = InstanceColumnRegistry::build(["rolcanlogin", "rolsuper"], false);
    let readers = items[0].roles[0].generate_static().unwrap();
    assert_eq!(readers.options.render(&registry), "NOLOGIN");

    let writers = items[0].roles[1].generate_static().unwrap();
    assert!(writers.parents.contains("readers"));
    assert_eq!(writers.options.render(&registry), "");
}

#[test]
fn test_multiple_joins_fail_before_inference() {
    let err = compile_err(
        r"
- ldapsearch:
    base: ou=groups,dc=acme,dc=tld
    joins:
      member: {}
      owner: {}
  role:
    name: '{cn}'
",
    );
    assert!(matches!(err, CompileError::MultipleSubsearch { .. }));
    assert!(err.to_string().contains("multiple sub-search unsupported"));
}

#[test]
fn test_dynamic_rule_without_search_is_rejected() {
    let err = compile_err(
        r"
- role:
    name: '{cn}'
",
    );
    assert!(matches!(err, CompileError::UnresolvedAttribute { ref attribute, .. } if attribute == "cn"));
}

#[test]
fn test_bad_option_type_is_rejected() {
    let result: Result<Vec<rolesync_core::SyncItem>, _> = serde_yaml::from_str(
        r"
- role:
    name: readers
    options: {CONNECTION LIMIT: many}
",
    );
    assert!(result.is_err());
}
