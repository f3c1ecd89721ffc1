//! `db` crate — pure persistence layer over MongoDB.
//!
//! Provides a connection pool, typed document structs, and repository
//! functions for every collection the state manager persists to. No
//! business logic lives here; domain types and rules live in `engine`.

pub mod error;
pub mod pool;
pub mod repository;
pub mod models;

pub use pool::DbPool;
pub use error::DbError;
