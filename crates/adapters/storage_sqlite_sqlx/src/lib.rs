//! # areaflow-adapter-storage-sqlite-sqlx
//!
//! `SQLite` persistence adapter using [sqlx](https://docs.rs/sqlx).
//!
//! ## Responsibilities
//! - Implement the repository port traits defined in `areaflow-app::ports`
//!   (token store, execution records, catalog lookups, trigger counter)
//! - Manage `SQLite` connection pool lifecycle
//! - Run database migrations (using sqlx embedded migrations)
//! - Map between domain types and database rows
//!
//! ## Dependency rule
//! Depends on `areaflow-app` (for port traits) and `areaflow-domain` (for domain types).
//! The `app` and `domain` crates must never reference this adapter.

mod codec;

pub mod catalog_repo;
pub mod error;
pub mod execution_repo;
pub mod pool;
pub mod service_account_repo;
pub mod trigger_counter;
