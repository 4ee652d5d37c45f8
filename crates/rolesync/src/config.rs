//! Configuration loading.
//!
//! The configuration is a YAML document gated by a `version` key. Rules are
//! compiled right after decoding, so a loaded [`Config`] always holds
//! validated, inferred and split sync items.

use std::io::Read;
use std::path::Path;

use rolesync_core::{compile, SyncItem};
use serde::Deserialize;
use serde_yaml::Value;
use tracing::debug;

use crate::error::{Error, Result};

/// The only configuration version this tool understands.
pub const SUPPORTED_VERSION: i64 = 5;

fn default_version() -> i64 {
    SUPPORTED_VERSION
}

fn default_max_connections() -> u32 {
    5
}

/// Directory connection parameters.
#[derive(Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LdapConfig {
    #[serde(default)]
    pub uri: Option<String>,
    #[serde(default)]
    pub binddn: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

impl std::fmt::Debug for LdapConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LdapConfig")
            .field("uri", &self.uri)
            .field("binddn", &self.binddn)
            .field("password", &self.password.as_ref().map(|_| "********"))
            .finish()
    }
}

impl LdapConfig {
    /// Overrides file values with values given on the command line or in
    /// the environment.
    #[must_use]
    pub fn merge(
        mut self,
        uri: Option<String>,
        binddn: Option<String>,
        password: Option<String>,
    ) -> Self {
        self.uri = uri.or(self.uri);
        self.binddn = binddn.or(self.binddn);
        self.password = password.or(self.password);
        self
    }

    /// Returns the directory URI.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if no URI is set.
    pub fn uri(&self) -> Result<&str> {
        self.uri
            .as_deref()
            .ok_or_else(|| Error::config("ldap.uri", "missing directory URI"))
    }
}

/// Database connection parameters.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PostgresConfig {
    /// Connection string. libpq environment variables apply when absent.
    #[serde(default)]
    pub dsn: Option<String>,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

impl Default for PostgresConfig {
    fn default() -> Self {
        Self {
            dsn: None,
            max_connections: default_max_connections(),
        }
    }
}

/// A loaded configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default = "default_version")]
    pub version: i64,
    #[serde(default)]
    pub ldap: LdapConfig,
    #[serde(default)]
    pub postgres: PostgresConfig,
    #[serde(default, alias = "sync_map")]
    pub rules: Vec<SyncItem>,
}

impl Config {
    /// Loads a configuration file. The path `-` reads standard input.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, is not valid YAML, has
    /// an unsupported version or holds invalid rules.
    pub fn load(path: &Path) -> Result<Self> {
        let text = if path == Path::new("-") {
            debug!("Reading configuration from standard input.");
            let mut text = String::new();
            std::io::stdin().read_to_string(&mut text)?;
            text
        } else {
            debug!(path = %path.display(), "Reading configuration.");
            std::fs::read_to_string(path)?
        };
        Self::from_yaml(&text)
    }

    /// Parses and compiles a configuration document.
    ///
    /// # Errors
    ///
    /// See [`Config::load`].
    pub fn from_yaml(text: &str) -> Result<Self> {
        let mut value: Value = serde_yaml::from_str(text)?;
        if value.is_null() {
            value = Value::Mapping(serde_yaml::Mapping::new());
        }
        let version = check_version(&value)?;
        debug!(version, "Configuration version accepted.");

        let mut config: Self = serde_yaml::from_value(value)?;
        config.version = version;
        config.rules = compile(config.rules)?;
        debug!(items = config.rules.len(), "Rules compiled.");
        Ok(config)
    }

    /// Items whose rules need no directory search.
    pub fn static_items(&self) -> impl Iterator<Item = &SyncItem> {
        self.rules.iter().filter(|item| !item.has_search())
    }

    /// Items bound to a directory search.
    pub fn search_items(&self) -> impl Iterator<Item = &SyncItem> {
        self.rules.iter().filter(|item| item.has_search())
    }
}

/// Reads the `version` key of a raw document. An absent key means the
/// supported version.
///
/// # Errors
///
/// Returns [`Error::Config`] for a non-integer version and
/// [`Error::UnsupportedVersion`] for any other version.
pub fn check_version(document: &Value) -> Result<i64> {
    let version = match document.get("version") {
        None => SUPPORTED_VERSION,
        Some(Value::Number(number)) => number
            .as_i64()
            .ok_or_else(|| Error::config("version", format!("expected an integer, got {number}")))?,
        Some(other) => {
            return Err(Error::config(
                "version",
                format!("expected an integer, got {other:?}"),
            ))
        }
    };
    if version != SUPPORTED_VERSION {
        return Err(Error::UnsupportedVersion(version));
    }
    Ok(version)
}
