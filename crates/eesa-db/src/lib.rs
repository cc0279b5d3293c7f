//! EESA Database: SurrealDB connection management, schema migrations and
//! the repository implementations for the `eesa-core` traits.
//!
//! Every audited mutation runs inside one SurrealDB transaction together
//! with its audit entries.

mod audit_write;
mod connection;
mod error;
pub mod repository;
mod schema;

pub use connection::{DbConfig, DbManager};
pub use error::DbError;
pub use schema::{run_migrations, schema_v1};
