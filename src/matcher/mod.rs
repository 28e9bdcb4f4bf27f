//! # Cached Entity Matchers
//!
//! A matcher decides, for one query shape, whether an entity that is already
//! live in the session cache belongs in that query's result. The data manager
//! merges the retained cached instances with the rows the store returned, so
//! in-session changes not yet flushed are still visible to the query.
//!
//! Two forms exist:
//!
//! - [`CachedEntityMatcher`]: a one-shot [`pre_process`] pass over both
//!   candidate pools, followed by a per-candidate [`is_retained`] predicate.
//!   Both methods have adapter defaults (no-op and `false`).
//! - [`SingleCachedEntityMatcher`]: only the predicate. Every single matcher
//!   can be used wherever a full matcher is expected.
//!
//! [`pre_process`]: CachedEntityMatcher::pre_process
//! [`is_retained`]: CachedEntityMatcher::is_retained

pub mod execution_matchers;

pub use execution_matchers::{
    ChildExecutionsByProcessInstanceIdMatcher, ExecutionsByParentAndActivityIdsMatcher,
    ExecutionsByParentExecutionIdMatcher, ExecutionsByProcessInstanceIdMatcher,
    ExecutionsByRootProcessInstanceIdMatcher, ExecutionsWithSameRootProcessInstanceIdMatcher,
    InactiveExecutionsMatcher, SubProcessInstanceBySuperExecutionIdMatcher,
};

use crate::cache::CachedEntity;
use crate::models::{Entity, EntityRef};

/// Condition deciding whether a cached entity is part of a query result
pub trait CachedEntityMatcher<E: Entity, P: ?Sized> {
    /// One-time pass over the store's rows and the session's cached entities,
    /// run before any [`is_retained`](Self::is_retained) call of the same query
    fn pre_process(&mut self, _database_entities: &[EntityRef<E>], _cached_entities: &[&CachedEntity<E>]) {}

    /// True when the cached `entity` should be used in the result
    fn is_retained(&self, _entity: &E, _param: &P) -> bool {
        false
    }
}

/// Condition needing nothing but the entity and the query parameter
pub trait SingleCachedEntityMatcher<E: Entity, P: ?Sized> {
    fn is_retained(&self, entity: &E, param: &P) -> bool;
}

impl<E, P, M> CachedEntityMatcher<E, P> for M
where
    E: Entity,
    P: ?Sized,
    M: SingleCachedEntityMatcher<E, P>,
{
    fn is_retained(&self, entity: &E, param: &P) -> bool {
        SingleCachedEntityMatcher::is_retained(self, entity, param)
    }
}
