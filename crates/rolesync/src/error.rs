//! Error types for role synchronization.

use rolesync_core::CompileError;

/// Errors that can occur while loading configuration or synchronizing roles.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid configuration value.
    #[error("Configuration error in '{field}': {message}")]
    Config {
        /// The offending configuration field.
        field: String,
        /// Error message.
        message: String,
    },

    /// Configuration written for another version of the tool.
    #[error("Unsupported configuration version {0}")]
    UnsupportedVersion(i64),

    /// Rules failed to compile.
    #[error("Configuration error in rules: {0}")]
    Compile(#[from] CompileError),

    /// Malformed YAML, including invalid templates and role options.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// IO error (reading configuration or operations).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Dialing the directory failed.
    #[error("LDAP connection to {uri} failed: {source}")]
    DirectoryConnect {
        /// Directory URI.
        uri: String,
        #[source]
        source: ldap3::LdapError,
    },

    /// The directory rejected the bind.
    #[error("LDAP bind as '{binddn}' failed: {source}")]
    DirectoryBind {
        /// Bind DN.
        binddn: String,
        #[source]
        source: ldap3::LdapError,
    },

    /// The identity round-trip after bind failed.
    #[error("LDAP whoami failed: {0}")]
    DirectoryIdentity(#[source] ldap3::LdapError),

    /// Acquiring a connection to a database failed.
    #[error("PostgreSQL connection to database '{database}' failed: {source}")]
    DatabaseConnect {
        /// Target database.
        database: String,
        #[source]
        source: sqlx::Error,
    },

    /// A synchronization statement failed.
    #[error("sync: {description} in database '{database}' failed: {source}")]
    Execution {
        /// Target database.
        database: String,
        /// Description of the failed operation.
        description: String,
        #[source]
        source: sqlx::Error,
    },

    /// Database error outside of synchronization (inspection).
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// The run was cancelled.
    #[error("Cancelled")]
    Cancelled,
}

impl Error {
    /// Creates a configuration error for `field`.
    pub fn config(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Config {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// A synchronization run aborted after observing `count` operations.
#[derive(Debug, thiserror::Error)]
#[error("{source} ({count} operations observed)")]
pub struct ApplyError {
    /// Operations observed before the abort, the failed one included.
    pub count: usize,
    pub source: Error,
}

/// Result type for role synchronization.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_message() {
        assert!(Error::UnsupportedVersion(4)
            .to_string()
            .contains("Unsupported configuration version"));
    }

    #[test]
    fn test_compile_error_keeps_message() {
        let err = Error::from(CompileError::MultipleSubsearch {
            joins: vec!["member".to_string(), "owner".to_string()],
        });
        assert!(err.to_string().contains("multiple sub-search unsupported"));
    }

    #[test]
    fn test_apply_error_reports_count() {
        let err = ApplyError {
            count: 2,
            source: Error::Cancelled,
        };
        assert_eq!(err.to_string(), "Cancelled (2 operations observed)");
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_config_field() {
        let err = Error::config("ldap.uri", "missing");
        assert_eq!(err.to_string(), "Configuration error in 'ldap.uri': missing");
    }
}
