//! # Query Builder System
//!
//! SQL generation for the PostgreSQL execution store.
//!
//! ## Key Components
//!
//! - [`builder`] - Core query builder with SQL generation
//! - [`conditions`] - WHERE clause building with positional bind values
//! - [`joins`] - LEFT JOIN clauses
//! - [`pagination`] - LIMIT/OFFSET from first-result / max-results windows
//! - [`scopes`] - One scope per execution query shape
//!
//! ## Binding
//!
//! Conditions never splice values into SQL text. Each value becomes a `$n`
//! placeholder numbered in rendering order, and [`builder::arguments`]
//! encodes the collected values for `sqlx`.
//!
//! ## Example Usage
//!
//! ```rust,ignore
//! use execution_cache::query_builder::ExecutionScopes;
//! use execution_cache::store::ExecutionSelect;
//!
//! let scope = ExecutionScopes::select(&ExecutionSelect::ByParentExecutionId(parent_id));
//! let rows: Vec<ExecutionRow> = scope.fetch_all(&pool).await?;
//! ```

pub mod builder;
pub mod conditions;
pub mod joins;
pub mod pagination;
pub mod scopes;

pub use builder::{arguments, QueryBuilder};
pub use conditions::{Condition, SqlValue, WhereClause};
pub use joins::Join;
pub use pagination::Pagination;
pub use scopes::{ExecutionScopes, ProcessInstanceScopes};
