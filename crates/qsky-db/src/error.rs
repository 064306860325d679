//! Error types for the persistent store.
//!
//! All store operations report failures through [`DbError`], which wraps
//! the underlying [`sqlx`] errors and adds the store-level conditions.

/// Errors that can occur in the persistent store.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    /// A `PostgreSQL` operation failed.
    #[error("PostgreSQL error: {0}")]
    Postgres(#[from] sqlx::Error),

    /// A `PostgreSQL` migration failed.
    #[error("PostgreSQL migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A stored row cannot be decoded into a record.
    #[error("corrupt row in {table}: {reason}")]
    Corrupt {
        /// Table the row came from.
        table: &'static str,
        /// What is wrong with it.
        reason: String,
    },

    /// A configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A commit was failed on purpose by a test harness.
    #[error("injected commit failure")]
    InjectedFailure,
}
