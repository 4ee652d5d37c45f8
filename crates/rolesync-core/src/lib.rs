//! # rolesync-core
//!
//! Pure building blocks for synchronizing PostgreSQL roles from a directory:
//!
//! - [`template`]: attribute templates such as `"{cn}_readers"`
//! - [`rule`] and [`search`]: role rules bound to directory searches
//! - [`compiler`]: attribute inference, sub-search checks and static/dynamic
//!   partitioning of rules
//! - [`role`]: role options, their rendering to `CREATE ROLE` clauses and the
//!   instance column registry gating it
//! - [`rewrite`]: pasteable rendering of parameterized statements
//!
//! Nothing here performs I/O.
//!
//! ```rust
//! use rolesync_core::role::{InstanceColumnRegistry, RoleOptions};
//!
//! let options = RoleOptions::parse("LOGIN NOSUPERUSER").unwrap();
//! let registry = InstanceColumnRegistry::build(["rolcanlogin"], false);
//! assert_eq!(options.render(&registry), "LOGIN");
//! ```

pub mod compiler;
pub mod rewrite;
pub mod role;
pub mod rule;
pub mod search;
pub mod template;
pub mod value;

pub use compiler::{compile, CompileError};
pub use rewrite::{rewrite_query, RewriteError};
pub use role::{InstanceColumnRegistry, OptionError, Role, RoleOptions};
pub use rule::{RuleTemplate, SyncItem};
pub use search::{Scope, SearchDefinition, Subsearch};
pub use template::{AttributeTemplate, Field, FieldSource, TemplateError};
pub use value::SqlValue;
