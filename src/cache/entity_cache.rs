//! # Entity Cache
//!
//! Session-scoped identity map: entity kind → id → [`CachedEntity`].
//!
//! The cache never talks to storage. It only answers "is this entity already
//! live in this session?" and records entities that become live. Once an
//! entity is cached, every lookup of its id returns the same instance for the
//! rest of the session; nothing is evicted before the cache is dropped.

use super::CachedEntity;
use crate::models::{Entity, EntityRef};
use parking_lot::RwLock;
use std::any::{Any, TypeId};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, warn};

/// Cached entities of one kind, remembering insertion order
struct KindCache<E: Entity> {
    entries: HashMap<String, CachedEntity<E>>,
    insertion_order: Vec<String>,
}

impl<E: Entity> Default for KindCache<E> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
            insertion_order: Vec::new(),
        }
    }
}

impl<E: Entity> KindCache<E> {
    fn ordered(&self) -> impl Iterator<Item = &CachedEntity<E>> {
        self.insertion_order
            .iter()
            .filter_map(|id| self.entries.get(id))
    }
}

/// Identity map owned by exactly one unit of work
#[derive(Default)]
pub struct EntityCache {
    cached_objects: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
    /// Root ids of trees cached in full in this session
    populated_trees: HashSet<String>,
}

impl EntityCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The live instance for `id`, if this session has one
    pub fn find_in_cache<E: Entity>(&self, id: &str) -> Option<EntityRef<E>> {
        self.kind::<E>()
            .and_then(|kind| kind.entries.get(id))
            .map(|cached| Arc::clone(cached.entity()))
    }

    /// Register `entity` under its id, snapshotting its state when `store_state` is set.
    ///
    /// Putting the instance that is already cached keeps the existing entry.
    pub fn put<E: Entity>(&mut self, entity: EntityRef<E>, store_state: bool) -> EntityRef<E> {
        let id = entity.read().id().to_string();
        let kind = self.kind_mut::<E>();

        match kind.entries.get(&id) {
            Some(existing) if existing.holds(&entity) => return entity,
            Some(_) => {
                warn!(
                    entity_id = %id,
                    "Replacing a different live instance in the session cache"
                );
            }
            None => kind.insertion_order.push(id.clone()),
        }

        kind.entries
            .insert(id, CachedEntity::new(Arc::clone(&entity), store_state));
        entity
    }

    /// Return the cached instance for the entity's id, or cache and return the
    /// given (freshly loaded) one
    pub fn cache_load_or_store<E: Entity>(&mut self, entity: E) -> EntityRef<E> {
        if let Some(cached) = self.find_in_cache::<E>(entity.id()) {
            debug!(entity_id = %entity.id(), "Loaded row superseded by cached instance");
            return cached;
        }
        self.put(Arc::new(RwLock::new(entity)), true)
    }

    /// All cache entries of one kind, in insertion order
    pub fn find_in_cache_as_cached_objects<E: Entity>(&self) -> Vec<&CachedEntity<E>> {
        self.kind::<E>()
            .map(|kind| kind.ordered().collect())
            .unwrap_or_default()
    }

    /// All live instances of one kind, in insertion order
    pub fn find_all<E: Entity>(&self) -> Vec<EntityRef<E>> {
        self.kind::<E>()
            .map(|kind| kind.ordered().map(|cached| Arc::clone(cached.entity())).collect())
            .unwrap_or_default()
    }

    /// Live instances whose state differs from what was read (or that are new)
    pub fn changed_entities<E: Entity>(&self) -> Vec<EntityRef<E>> {
        self.kind::<E>()
            .map(|kind| {
                kind.ordered()
                    .filter(|cached| cached.has_changed())
                    .map(|cached| Arc::clone(cached.entity()))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn contains<E: Entity>(&self, id: &str) -> bool {
        self.kind::<E>()
            .is_some_and(|kind| kind.entries.contains_key(id))
    }

    /// Number of cached entities of one kind
    pub fn count<E: Entity>(&self) -> usize {
        self.kind::<E>().map_or(0, |kind| kind.entries.len())
    }

    pub fn is_empty(&self) -> bool {
        self.cached_objects.is_empty()
    }

    /// Record that every node of the tree rooted at `root_id` is cached
    pub fn mark_tree_populated(&mut self, root_id: impl Into<String>) {
        self.populated_trees.insert(root_id.into());
    }

    /// Whether the tree rooted at `root_id` was cached in full.
    ///
    /// Entities cached one at a time by list queries do not count; only a
    /// whole-tree population marks its root.
    pub fn is_tree_populated(&self, root_id: &str) -> bool {
        self.populated_trees.contains(root_id)
    }

    fn kind<E: Entity>(&self) -> Option<&KindCache<E>> {
        self.cached_objects
            .get(&TypeId::of::<E>())
            .and_then(|kind| kind.downcast_ref::<KindCache<E>>())
    }

    fn kind_mut<E: Entity>(&mut self) -> &mut KindCache<E> {
        let slot = self
            .cached_objects
            .entry(TypeId::of::<E>())
            .or_insert_with(|| Box::new(KindCache::<E>::default()));
        match slot.downcast_mut::<KindCache<E>>() {
            Some(kind) => kind,
            None => unreachable!("cache slots are keyed by the TypeId of their entity kind"),
        }
    }
}

impl std::fmt::Debug for EntityCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntityCache")
            .field("kinds", &self.cached_objects.len())
            .field("populated_trees", &self.populated_trees.len())
            .finish()
    }
}
