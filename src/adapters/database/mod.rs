//! Relational store abstraction layer
//!
//! The pipeline only ever talks to [`SqlStore`]; the PostgreSQL
//! implementation lives in [`crate::adapters::postgresql`].

pub mod connectivity;
pub mod factory;
pub mod traits;

pub use connectivity::{schedule_from_secs, verify_connectivity};
pub use factory::create_sql_store;
pub use traits::{RowStream, SqlStore, TextRow};
