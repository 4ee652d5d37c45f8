//! Directory-driven PostgreSQL role synchronization.
//!
//! `rolesync` wires the pure building blocks of [`rolesync_core`] to the
//! outside world:
//!
//! - **Config** - YAML configuration, version gate and rule compilation
//! - **Directory** - LDAP session with retried dialing
//! - **Pool** - PostgreSQL connections keyed by database name
//! - **Inspect** - role columns visible to the connected user
//! - **Sync** - ordered, fail-fast execution of reconciliation statements,
//!   with a dry-run mode
//!
//! # CLI Usage
//!
//! ```bash
//! # Check a configuration
//! rolesync --config rolesync.yml check
//!
//! # Show the directory identity
//! rolesync --config rolesync.yml whoami
//!
//! # Show static roles with options rendered for this instance
//! rolesync --config rolesync.yml roles
//!
//! # Simulate, then run, a list of statements
//! rolesync --config rolesync.yml apply --operations ops.yml
//! rolesync --config rolesync.yml apply --operations ops.yml --real
//! ```

pub mod config;
pub mod error;
pub mod inspect;
pub mod ldap;
pub mod logging;
pub mod perf;
pub mod pool;
pub mod retry;
pub mod sync;

pub use error::{ApplyError, Error, Result};

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::config::{Config, LdapConfig, PostgresConfig};
    pub use crate::error::{ApplyError, Error, Result};
    pub use crate::inspect::InstanceInfo;
    pub use crate::ldap::DirectorySession;
    pub use crate::perf::StopWatch;
    pub use crate::pool::{ConnectionPool, DbPool};
    pub use crate::retry::Backoff;
    pub use crate::sync::{apply, describe, SyncQuery};
}
