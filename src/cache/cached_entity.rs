//! Cache entry pairing a live entity with its as-read snapshot.

use crate::models::{Entity, EntityRef};
use std::sync::Arc;

/// One live entity instance plus the persistent state it had when it entered
/// the cache. Entities created in the session carry no snapshot.
#[derive(Debug)]
pub struct CachedEntity<E: Entity> {
    entity: EntityRef<E>,
    original_persistent_state: Option<E::PersistentState>,
}

impl<E: Entity> CachedEntity<E> {
    /// Wrap `entity`, snapshotting its persistent state when `store_state` is set
    pub fn new(entity: EntityRef<E>, store_state: bool) -> Self {
        let original_persistent_state = store_state.then(|| entity.read().persistent_state());
        Self {
            entity,
            original_persistent_state,
        }
    }

    pub fn entity(&self) -> &EntityRef<E> {
        &self.entity
    }

    pub fn original_persistent_state(&self) -> Option<&E::PersistentState> {
        self.original_persistent_state.as_ref()
    }

    /// True when the live instance no longer matches its snapshot.
    ///
    /// An entity without a snapshot was never persisted and always counts as changed.
    pub fn has_changed(&self) -> bool {
        match &self.original_persistent_state {
            Some(original) => *original != self.entity.read().persistent_state(),
            None => true,
        }
    }

    /// Whether this entry holds exactly the given instance
    pub fn holds(&self, entity: &EntityRef<E>) -> bool {
        Arc::ptr_eq(&self.entity, entity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ExecutionEntity, ExecutionRow};
    use parking_lot::RwLock;

    fn loaded(id: &str) -> EntityRef<ExecutionEntity> {
        Arc::new(RwLock::new(ExecutionEntity::from_row(ExecutionRow {
            id: id.to_string(),
            revision: 1,
            process_instance_id: Some(id.to_string()),
            is_active: true,
            ..Default::default()
        })))
    }

    #[test]
    fn test_unmodified_entity_is_clean() {
        let cached = CachedEntity::new(loaded("pi"), true);
        assert!(!cached.has_changed());
        assert_eq!(cached.original_persistent_state().map(|s| s.id.as_str()), Some("pi"));
    }

    #[test]
    fn test_in_place_mutation_is_detected() {
        let entity = loaded("pi");
        let cached = CachedEntity::new(Arc::clone(&entity), true);

        entity.write().activity_id = Some("approve".to_string());
        assert!(cached.has_changed());

        entity.write().activity_id = None;
        assert!(!cached.has_changed());
    }

    #[test]
    fn test_flag_mutation_is_detected() {
        let entity = loaded("pi");
        let cached = CachedEntity::new(Arc::clone(&entity), true);

        entity.write().cached_entity_state.set_has_jobs(true);
        assert!(cached.has_changed());
    }

    #[test]
    fn test_new_entity_without_snapshot_counts_as_changed() {
        let cached = CachedEntity::new(loaded("fresh"), false);
        assert!(cached.original_persistent_state().is_none());
        assert!(cached.has_changed());
    }
}
