//! # Models
//!
//! Entities held by the session cache and the query parameter types exchanged
//! with the store.
//!
//! - [`execution`] - Execution tree nodes and their persisted row form
//! - [`cached_entity_state`] - Bitmask of derived per-execution facts
//! - [`query`] - Criteria, pagination and native query parameters

pub mod cached_entity_state;
pub mod execution;
pub mod query;

pub use cached_entity_state::CachedEntityState;
pub use execution::{AncestorEdge, ExecutionEntity, ExecutionRef, ExecutionRow};
pub use query::{
    ExecutionQuery, InactiveExecutionFilter, NativeQuery, Page, ParentActivityFilter,
    ProcessInstanceQuery, ProcessInstanceWithVariables,
};

use parking_lot::RwLock;
use std::fmt::Debug;
use std::sync::Arc;

/// Shared, mutable handle to one live entity instance.
///
/// Within a session every reader of the same entity id holds a clone of the
/// same handle, so identity can be checked with [`Arc::ptr_eq`].
pub type EntityRef<E> = Arc<RwLock<E>>;

/// An entity the session cache can hold
pub trait Entity: Send + Sync + 'static {
    /// Snapshot type compared to detect in-session modifications
    type PersistentState: PartialEq + Clone + Debug + Send + Sync;

    fn id(&self) -> &str;

    fn persistent_state(&self) -> Self::PersistentState;
}
