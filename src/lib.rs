#![allow(clippy::doc_markdown)] // Allow technical terms like PostgreSQL, SQLx in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Execution Cache
//!
//! Session-scoped entity cache and data access mediator for the execution
//! trees of a workflow process engine.
//!
//! ## Overview
//!
//! A process instance executes as a tree of executions: child executions
//! under their parent, and sub-process instances (whole nested trees) under
//! the execution that called them. Every unit of work owns an
//! [`EntityCache`] that guarantees one live instance per execution id, and
//! an [`ExecutionDataManager`] answers lookups against that cache before
//! asking the store.
//!
//! With eager fetching enabled, the first lookup of any execution loads its
//! whole nested tree in a single query, and the following parent, child and
//! sub-process lookups are served from the cache.
//!
//! ## Module Organization
//!
//! - [`models`] - Executions, the cached entity state bitmask and query types
//! - [`cache`] - Per-session entity cache and the execution tree cache
//! - [`matcher`] - Predicates selecting cached executions for a query
//! - [`data_manager`] - Cache/store reconciliation and the execution queries
//! - [`store`] - Storage trait with in-memory and PostgreSQL implementations
//! - [`query_builder`] - Parameterized SQL for the PostgreSQL store
//! - [`config`] - Layered configuration
//! - [`error`] - Structured error handling
//! - [`logging`] - Default `tracing` subscriber setup
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use execution_cache::{EntityCache, ExecutionDataManager, InMemoryExecutionStore, PersistenceConfig};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = Arc::new(InMemoryExecutionStore::new());
//! let config = PersistenceConfig {
//!     eagerly_fetch_execution_tree: true,
//!     ..Default::default()
//! };
//! let data_manager = ExecutionDataManager::new(store, &config);
//!
//! let mut cache = EntityCache::new();
//! if let Some(execution) = data_manager.find_by_id(&mut cache, "execution-1").await? {
//!     let parent = execution.read().parent();
//!     println!("parent cached: {}", parent.is_some());
//! }
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod config;
pub mod constants;
pub mod data_manager;
pub mod error;
pub mod logging;
pub mod matcher;
pub mod models;
pub mod query_builder;
pub mod store;

pub use cache::{CachedEntity, EntityCache, ExecutionTreeCache};
pub use config::{ConfigLoader, DatabaseConfig, PersistenceConfig};
pub use constants::PROCESS_INSTANCE_VARIABLES_LIMIT;
pub use data_manager::ExecutionDataManager;
pub use error::{PersistenceError, PersistenceResult, StoreError, StoreResult};
pub use matcher::{CachedEntityMatcher, SingleCachedEntityMatcher};
pub use models::{
    CachedEntityState, Entity, EntityRef, ExecutionEntity, ExecutionQuery, ExecutionRef,
    ExecutionRow, NativeQuery, Page, ProcessInstanceQuery, ProcessInstanceWithVariables,
};
pub use store::{ExecutionSelect, ExecutionStore, InMemoryExecutionStore, PgExecutionStore};
