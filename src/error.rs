//! # Error Types
//!
//! Structured error handling for the execution cache using thiserror.
//!
//! Three kinds of failure originate in this crate:
//!
//! - **Structural**: an execution tree that cannot be walked to its root. Fatal;
//!   the surrounding operation must abort.
//! - **Concurrency conflict**: an optimistic-locking update that affected zero
//!   rows. Recoverable by the caller (retry or fail the business operation).
//! - **Storage**: anything the store reports, propagated unchanged.

use thiserror::Error;

/// Errors surfaced by the cache, the tree cache and the data manager
#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("Invalid execution tree at execution {execution_id}: {reason}")]
    InvalidExecutionTree {
        execution_id: String,
        reason: String,
    },

    #[error("Optimistic locking conflict on {entity} {id}: {message}")]
    OptimisticLocking {
        entity: String,
        id: String,
        message: String,
    },

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl PersistenceError {
    /// Create an invalid execution tree error
    pub fn invalid_execution_tree(execution_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidExecutionTree {
            execution_id: execution_id.into(),
            reason: reason.into(),
        }
    }

    /// Create an optimistic locking error
    pub fn optimistic_locking(
        entity: impl Into<String>,
        id: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::OptimisticLocking {
            entity: entity.into(),
            id: id.into(),
            message: message.into(),
        }
    }

    /// Whether the caller may retry the operation that produced this error
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::OptimisticLocking { .. })
    }
}

/// Errors reported by an [`ExecutionStore`](crate::store::ExecutionStore) implementation
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Query not supported by this store: {query}")]
    UnsupportedQuery { query: String },

    #[error("Internal store error: {message}")]
    Internal { message: String },
}

impl StoreError {
    /// Create an unsupported query error
    pub fn unsupported_query(query: impl Into<String>) -> Self {
        Self::UnsupportedQuery {
            query: query.into(),
        }
    }

    /// Create an internal store error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

pub type PersistenceResult<T> = std::result::Result<T, PersistenceError>;
pub type StoreResult<T> = std::result::Result<T, StoreError>;
