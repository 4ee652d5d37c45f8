//! Role options codec.
//!
//! Maps declarative option maps (`{LOGIN: true, CONNECTION LIMIT: 5}`) to
//! [`RoleOptions`] and renders them back to the clause text accepted by
//! `CREATE ROLE` and `ALTER ROLE`.

use serde::{Deserialize, Deserializer};
use serde_yaml::{Mapping, Value};
use tracing::debug;

use super::InstanceColumnRegistry;

/// A role attribute managed by the codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RoleAttribute {
    Super,
    CreateDb,
    CreateRole,
    Inherit,
    CanLogin,
    Replication,
    BypassRls,
    ConnLimit,
}

impl RoleAttribute {
    /// Attributes only a superuser can read or change.
    #[must_use]
    pub const fn is_privileged(self) -> bool {
        matches!(self, Self::Super | Self::Replication | Self::BypassRls)
    }

    /// Returns the descriptor of this attribute.
    #[must_use]
    pub fn spec(self) -> &'static AttributeSpec {
        // ROLE_ATTRIBUTES is indexed by declaration order.
        &ROLE_ATTRIBUTES[self as usize]
    }
}

/// Value type of a role attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionKind {
    Bool,
    Int,
}

/// Static description of one role attribute.
#[derive(Debug)]
pub struct AttributeSpec {
    /// The attribute described.
    pub attribute: RoleAttribute,
    /// Key in configuration maps.
    pub key: &'static str,
    /// Column in `pg_catalog.pg_roles`.
    pub column: &'static str,
    /// SQL keyword.
    pub token: &'static str,
    pub kind: OptionKind,
}

/// Role attributes in rendering order.
pub const ROLE_ATTRIBUTES: [AttributeSpec; 8] = [
    AttributeSpec {
        attribute: RoleAttribute::Super,
        key: "SUPERUSER",
        column: "rolsuper",
        token: "SUPERUSER",
        kind: OptionKind::Bool,
    },
    AttributeSpec {
        attribute: RoleAttribute::CreateDb,
        key: "CREATEDB",
        column: "rolcreatedb",
        token: "CREATEDB",
        kind: OptionKind::Bool,
    },
    AttributeSpec {
        attribute: RoleAttribute::CreateRole,
        key: "CREATEROLE",
        column: "rolcreaterole",
        token: "CREATEROLE",
        kind: OptionKind::Bool,
    },
    AttributeSpec {
        attribute: RoleAttribute::Inherit,
        key: "INHERIT",
        column: "rolinherit",
        token: "INHERIT",
        kind: OptionKind::Bool,
    },
    AttributeSpec {
        attribute: RoleAttribute::CanLogin,
        key: "LOGIN",
        column: "rolcanlogin",
        token: "LOGIN",
        kind: OptionKind::Bool,
    },
    AttributeSpec {
        attribute: RoleAttribute::Replication,
        key: "REPLICATION",
        column: "rolreplication",
        token: "REPLICATION",
        kind: OptionKind::Bool,
    },
    AttributeSpec {
        attribute: RoleAttribute::BypassRls,
        key: "BYPASSRLS",
        column: "rolbypassrls",
        token: "BYPASSRLS",
        kind: OptionKind::Bool,
    },
    AttributeSpec {
        attribute: RoleAttribute::ConnLimit,
        key: "CONNECTION LIMIT",
        column: "rolconnlimit",
        token: "CONNECTION LIMIT",
        kind: OptionKind::Int,
    },
];

/// Errors decoding role options.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OptionError {
    /// A recognised key has a value of the wrong type.
    #[error("Role option '{key}' expects {expected}, got {found}")]
    InvalidType {
        key: String,
        expected: &'static str,
        found: &'static str,
    },

    /// Connection limit outside of what PostgreSQL accepts.
    #[error("Role option '{key}' out of range: {value}")]
    OutOfRange { key: String, value: i64 },

    /// Unknown keyword in an option string.
    #[error("Unknown role option '{0}'")]
    UnknownOption(String),

    /// `CONNECTION LIMIT` without a valid number in an option string.
    #[error("CONNECTION LIMIT requires an integer value")]
    MissingLimit,
}

/// A single option value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionValue {
    Bool(bool),
    Int(i32),
}

/// Role attributes declared by a rule.
///
/// Options are tri-state: `None` means the attribute is not managed and is
/// left out of rendered clauses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RoleOptions {
    pub super_user: Option<bool>,
    pub create_db: Option<bool>,
    pub create_role: Option<bool>,
    pub inherit: Option<bool>,
    pub can_login: Option<bool>,
    pub replication: Option<bool>,
    pub bypass_rls: Option<bool>,
    pub conn_limit: Option<i32>,
}

impl RoleOptions {
    /// Creates options with nothing declared.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the declared value of an attribute.
    #[must_use]
    pub const fn get(&self, attribute: RoleAttribute) -> Option<OptionValue> {
        let flag = match attribute {
            RoleAttribute::Super => self.super_user,
            RoleAttribute::CreateDb => self.create_db,
            RoleAttribute::CreateRole => self.create_role,
            RoleAttribute::Inherit => self.inherit,
            RoleAttribute::CanLogin => self.can_login,
            RoleAttribute::Replication => self.replication,
            RoleAttribute::BypassRls => self.bypass_rls,
            RoleAttribute::ConnLimit => {
                return match self.conn_limit {
                    Some(limit) => Some(OptionValue::Int(limit)),
                    None => None,
                };
            }
        };
        match flag {
            Some(value) => Some(OptionValue::Bool(value)),
            None => None,
        }
    }

    fn set_flag(&mut self, attribute: RoleAttribute, value: bool) {
        let slot = match attribute {
            RoleAttribute::Super => &mut self.super_user,
            RoleAttribute::CreateDb => &mut self.create_db,
            RoleAttribute::CreateRole => &mut self.create_role,
            RoleAttribute::Inherit => &mut self.inherit,
            RoleAttribute::CanLogin => &mut self.can_login,
            RoleAttribute::Replication => &mut self.replication,
            RoleAttribute::BypassRls => &mut self.bypass_rls,
            RoleAttribute::ConnLimit => return,
        };
        *slot = Some(value);
    }

    fn set_limit(&mut self, key: &str, value: i64) -> Result<(), OptionError> {
        let limit = i32::try_from(value)
            .ok()
            .filter(|limit| *limit >= -1)
            .ok_or_else(|| OptionError::OutOfRange {
                key: key.to_string(),
                value,
            })?;
        self.conn_limit = Some(limit);
        Ok(())
    }

    /// Decodes options from a configuration map.
    ///
    /// Unknown keys are ignored.
    ///
    /// # Errors
    ///
    /// Returns an [`OptionError`] if a recognised key carries a value of the
    /// wrong type or an out of range connection limit.
    pub fn from_map(map: &Mapping) -> Result<Self, OptionError> {
        let mut options = Self::new();
        for (key, value) in map {
            let Some(key) = key.as_str() else {
                debug!(key = ?key, "Ignoring non-string role option key.");
                continue;
            };
            let Some(spec) = ROLE_ATTRIBUTES.iter().find(|spec| spec.key == key) else {
                debug!(key, "Ignoring unknown role option.");
                continue;
            };
            match spec.kind {
                OptionKind::Bool => {
                    let flag = value.as_bool().ok_or_else(|| OptionError::InvalidType {
                        key: key.to_string(),
                        expected: "a boolean",
                        found: value_kind(value),
                    })?;
                    options.set_flag(spec.attribute, flag);
                }
                OptionKind::Int => {
                    let limit = value.as_i64().ok_or_else(|| OptionError::InvalidType {
                        key: key.to_string(),
                        expected: "an integer",
                        found: value_kind(value),
                    })?;
                    options.set_limit(key, limit)?;
                }
            }
        }
        Ok(options)
    }

    /// Parses options written as a role clause, e.g.
    /// `LOGIN NOSUPERUSER CONNECTION LIMIT 5`.
    ///
    /// # Errors
    ///
    /// Returns an [`OptionError`] on unknown keywords or a malformed
    /// connection limit.
    pub fn parse(clause: &str) -> Result<Self, OptionError> {
        let mut options = Self::new();
        let mut words = clause.split_whitespace();
        while let Some(word) = words.next() {
            let upper = word.to_ascii_uppercase();
            if upper == "CONNECTION" {
                let limit = match (words.next(), words.next()) {
                    (Some(kw), Some(n)) if kw.eq_ignore_ascii_case("LIMIT") => {
                        n.parse::<i64>().map_err(|_| OptionError::MissingLimit)?
                    }
                    _ => return Err(OptionError::MissingLimit),
                };
                options.set_limit("CONNECTION LIMIT", limit)?;
                continue;
            }

            let (token, value) = match upper.strip_prefix("NO") {
                Some(rest) if find_flag(rest).is_some() => (rest, false),
                _ => (upper.as_str(), true),
            };
            let spec = find_flag(token).ok_or_else(|| OptionError::UnknownOption(word.to_string()))?;
            options.set_flag(spec.attribute, value);
        }
        Ok(options)
    }

    /// Renders declared options visible in `registry` as role clause text.
    ///
    /// Attributes are rendered in a fixed order so output is stable across
    /// runs. An empty string is a valid result.
    #[must_use]
    pub fn render(&self, registry: &InstanceColumnRegistry) -> String {
        let mut out = String::new();
        for spec in &ROLE_ATTRIBUTES {
            if !registry.is_visible(spec.attribute) {
                continue;
            }
            let Some(value) = self.get(spec.attribute) else {
                continue;
            };
            if !out.is_empty() {
                out.push(' ');
            }
            match value {
                OptionValue::Bool(flag) => {
                    if !flag {
                        out.push_str("NO");
                    }
                    out.push_str(spec.token);
                }
                OptionValue::Int(n) => {
                    out.push_str(spec.token);
                    out.push(' ');
                    out.push_str(&n.to_string());
                }
            }
        }
        out
    }
}

fn find_flag(token: &str) -> Option<&'static AttributeSpec> {
    ROLE_ATTRIBUTES
        .iter()
        .find(|spec| spec.kind == OptionKind::Bool && spec.token == token)
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(n) if n.is_i64() || n.is_u64() => "an integer",
        Value::Number(_) => "a float",
        Value::String(_) => "a string",
        Value::Sequence(_) => "a list",
        Value::Mapping(_) => "a map",
        Value::Tagged(_) => "a tagged value",
    }
}

impl<'de> Deserialize<'de> for RoleOptions {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match Value::deserialize(deserializer)? {
            Value::Null => Ok(Self::new()),
            Value::Mapping(map) => Self::from_map(&map).map_err(serde::de::Error::custom),
            Value::String(clause) => Self::parse(&clause).map_err(serde::de::Error::custom),
            other => Err(serde::de::Error::custom(format!(
                "role options must be a map or a string, got {}",
                value_kind(&other)
            ))),
        }
    }
}
