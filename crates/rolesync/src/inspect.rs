//! Instance inspection.
//!
//! Only what the role options codec needs: which `pg_roles` columns exist
//! and whether we connect as superuser.

use rolesync_core::InstanceColumnRegistry;
use sqlx::PgConnection;
use tracing::debug;

use crate::error::Result;

const ROLE_COLUMNS_QUERY: &str = "\
SELECT attname::text
FROM pg_catalog.pg_attribute
WHERE attrelid = 'pg_catalog.pg_roles'::regclass
  AND attnum > 0
  AND NOT attisdropped
ORDER BY attnum";

const CURRENT_ROLE_QUERY: &str = "\
SELECT rolname::text, rolsuper
FROM pg_catalog.pg_roles
WHERE rolname = CURRENT_USER";

/// Facts about the PostgreSQL instance and the connected role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceInfo {
    pub current_user: String,
    pub is_superuser: bool,
    pub role_columns: Vec<String>,
}

impl InstanceInfo {
    /// Reads instance facts over `conn`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Database`] if a catalog query fails.
    pub async fn fetch(conn: &mut PgConnection) -> Result<Self> {
        let role_columns: Vec<String> = sqlx::query_scalar(ROLE_COLUMNS_QUERY)
            .fetch_all(&mut *conn)
            .await?;
        let (current_user, is_superuser): (String, bool) = sqlx::query_as(CURRENT_ROLE_QUERY)
            .fetch_one(&mut *conn)
            .await?;
        debug!(
            current_user = %current_user,
            is_superuser,
            columns = role_columns.len(),
            "Inspected instance."
        );
        Ok(Self {
            current_user,
            is_superuser,
            role_columns,
        })
    }

    /// Role option columns the connected role may manage.
    #[must_use]
    pub fn registry(&self) -> InstanceColumnRegistry {
        let registry = InstanceColumnRegistry::build(&self.role_columns, self.is_superuser);
        debug!(
            columns = ?registry.columns().collect::<Vec<_>>(),
            "Managing role columns."
        );
        registry
    }
}
