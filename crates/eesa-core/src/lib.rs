//! Core domain types for the EESA governance layer: users and groups,
//! the permission matrix, approvable registry records and the audit
//! trail, plus the repository traits the storage layer implements.

pub mod authz;
pub mod error;
pub mod models;
pub mod repository;

pub use error::{EesaError, EesaResult};
