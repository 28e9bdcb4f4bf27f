//! # Data Managers
//!
//! Mediators between the session cache and the store. A data manager turns
//! every row the store returns into the session's live instance for that id,
//! and folds in cached instances a query's matcher retains.
//!
//! The reconciliation helpers here are entity-agnostic; the execution data
//! manager builds its queries on top of them.

pub mod execution_data_manager;

pub use execution_data_manager::ExecutionDataManager;

use crate::cache::EntityCache;
use crate::matcher::CachedEntityMatcher;
use crate::models::{Entity, EntityRef};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// Map loaded rows onto live instances, preferring an instance the session
/// already holds.
///
/// With `cache_new_rows` set, rows seen for the first time are cached too;
/// otherwise they are returned detached and the caller decides what to cache.
pub fn reconcile<E, R>(cache: &mut EntityCache, rows: Vec<R>, cache_new_rows: bool) -> Vec<EntityRef<E>>
where
    E: Entity + From<R>,
{
    rows.into_iter()
        .map(|row| {
            let entity = E::from(row);
            match cache.find_in_cache::<E>(entity.id()) {
                Some(cached) => cached,
                None if cache_new_rows => cache.put(Arc::new(RwLock::new(entity)), true),
                None => Arc::new(RwLock::new(entity)),
            }
        })
        .collect()
}

/// Merge the store's result with the cached instances `matcher` retains.
///
/// Store order comes first; retained cached instances replace a store entry
/// with the same id in place, and the rest are appended in cache order.
pub fn merge_with_cache<E, P, M>(
    cache: &EntityCache,
    database_entities: Vec<EntityRef<E>>,
    matcher: &mut M,
    param: &P,
) -> Vec<EntityRef<E>>
where
    E: Entity,
    P: ?Sized,
    M: CachedEntityMatcher<E, P>,
{
    let cached_entities = cache.find_in_cache_as_cached_objects::<E>();
    if cached_entities.is_empty() {
        return database_entities;
    }

    matcher.pre_process(&database_entities, &cached_entities);

    let mut result = database_entities;
    let mut positions: HashMap<String, usize> = result
        .iter()
        .enumerate()
        .map(|(position, entity)| (entity.read().id().to_string(), position))
        .collect();

    for cached in cached_entities {
        let entity = cached.entity();
        let (id, retained) = {
            let guard = entity.read();
            (guard.id().to_string(), matcher.is_retained(&guard, param))
        };
        if !retained {
            continue;
        }
        match positions.get(&id) {
            Some(&position) => result[position] = Arc::clone(entity),
            None => {
                positions.insert(id, result.len());
                result.push(Arc::clone(entity));
            }
        }
    }
    result
}

/// Every cached instance `matcher` retains, in cache order
pub fn list_from_cache<E, P, M>(cache: &EntityCache, matcher: &M, param: &P) -> Vec<EntityRef<E>>
where
    E: Entity,
    P: ?Sized,
    M: CachedEntityMatcher<E, P>,
{
    cache
        .find_all::<E>()
        .into_iter()
        .filter(|entity| matcher.is_retained(&entity.read(), param))
        .collect()
}

/// First cached instance `matcher` retains
pub fn find_in_cache_by_matcher<E, P, M>(cache: &EntityCache, matcher: &M, param: &P) -> Option<EntityRef<E>>
where
    E: Entity,
    P: ?Sized,
    M: CachedEntityMatcher<E, P>,
{
    cache
        .find_all::<E>()
        .into_iter()
        .find(|entity| matcher.is_retained(&entity.read(), param))
}
