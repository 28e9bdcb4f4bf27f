//! # Session Cache
//!
//! The identity map guaranteeing at most one live instance per entity id
//! within a unit of work, and the tree-aware population built on top of it.
//!
//! A cache is created at the start of a unit of work, handed by reference to
//! every component that reads entities, and dropped at its end. It is never
//! shared between sessions.
//!
//! - [`cached_entity`] - Live instance plus as-read snapshot
//! - [`entity_cache`] - Generic per-kind identity map
//! - [`execution_tree_cache`] - Root finding and whole-tree population

pub mod cached_entity;
pub mod entity_cache;
pub mod execution_tree_cache;

pub use cached_entity::CachedEntity;
pub use entity_cache::EntityCache;
pub use execution_tree_cache::{link_execution_tree, ExecutionTreeCache};
