//! Persistent store for the QSky customer event processor.
//!
//! The processor never talks to a database directly. It reads through the
//! [`Store`] trait and hands every write of one unit of work to
//! [`Store::commit`] as a single [`ChangeSet`], which the store applies
//! all-or-nothing.
//!
//! # Implementations
//!
//! ```text
//! CustomerEvents
//!     |
//!     +-- reads ----------> Store::find_customer / find_step / ...
//!     |
//!     +-- one ChangeSet --> Store::commit
//!                              |-- MemoryStore (tests, single process)
//!                              +-- PgStore     (PostgreSQL, one transaction)
//! ```
//!
//! # Modules
//!
//! - [`store`] -- The [`Store`] trait and the [`ChangeSet`] unit of commit
//! - [`memory`] -- Lock-guarded in-memory store with failure injection
//! - [`postgres`] -- `PostgreSQL` store on a [`sqlx`] connection pool
//! - [`error`] -- Shared error types

pub mod error;
pub mod memory;
pub mod postgres;
pub mod store;

// Re-export primary types for convenience.
pub use error::DbError;
pub use memory::MemoryStore;
pub use postgres::{PgStore, PostgresConfig};
pub use store::{ChangeSet, Store};
