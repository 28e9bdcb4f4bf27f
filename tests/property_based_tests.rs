mod common;

use common::strategies::*;
use common::{data_manager, ids};
use execution_cache::{CachedEntityState, EntityCache, ExecutionEntity, InMemoryExecutionStore, Page};
use proptest::prelude::*;
use std::collections::HashSet;
use std::sync::Arc;

fn flags(state: CachedEntityState) -> [bool; 4] {
    [
        state.has_event_subscriptions(),
        state.has_tasks(),
        state.has_jobs(),
        state.has_variables(),
    ]
}

proptest! {
    /// Property: setting one flag never changes the other flags or the bits above them
    #[test]
    fn cached_state_flags_are_isolated(bits in any::<i32>(), flag in 0usize..4, on in any::<bool>()) {
        let before = CachedEntityState::from_bits(bits);
        let mut after = before;
        match flag {
            0 => after.set_has_event_subscriptions(on),
            1 => after.set_has_tasks(on),
            2 => after.set_has_jobs(on),
            _ => after.set_has_variables(on),
        }

        let (before_flags, after_flags) = (flags(before), flags(after));
        for index in 0..4 {
            if index == flag {
                prop_assert_eq!(after_flags[index], on);
            } else {
                prop_assert_eq!(after_flags[index], before_flags[index]);
            }
        }
        prop_assert_eq!(after.bits() & !0b1111, bits & !0b1111);
    }

    /// Property: a window returns exactly the overlapping part of the list
    #[test]
    fn page_slice_matches_window((first_result, max_results) in window_strategy(), len in 0usize..30) {
        let items: Vec<usize> = (0..len).collect();
        let sliced = Page::new(first_result, max_results).slice(items);

        if first_result < 0 || max_results <= 0 {
            prop_assert!(sliced.is_empty());
        } else {
            let start = (first_result as usize).min(len);
            let end = (start + max_results as usize).min(len);
            prop_assert_eq!(sliced, (start..end).collect::<Vec<_>>());
        }
    }

    /// Property: a cache holds one live instance per id
    #[test]
    fn cache_holds_one_instance_per_id(id_list in prop::collection::vec(execution_id_strategy(), 1..20)) {
        let mut cache = EntityCache::new();
        for id in &id_list {
            let first = cache.cache_load_or_store(ExecutionEntity::new(id.clone()));
            let second = cache.cache_load_or_store(ExecutionEntity::new(id.clone()));
            prop_assert!(Arc::ptr_eq(&first, &second));
        }
        let distinct: HashSet<_> = id_list.iter().collect();
        prop_assert_eq!(cache.count::<ExecutionEntity>(), distinct.len());
    }

    /// Property: eager fetching from any node caches every tree node exactly once
    #[test]
    fn eager_fetch_caches_every_node_once(shape in tree_shape_strategy(), start in any::<prop::sample::Index>()) {
        let rows = tree_rows("gen", &shape);
        let start_id = rows[start.index(rows.len())].id.clone();

        let store = Arc::new(InMemoryExecutionStore::new());
        store.insert_executions(rows.clone());
        store.insert_executions(tree_rows("unrelated", &shape));
        let manager = data_manager(&store, true);

        let (found, cached, children) = tokio_test::block_on(async {
            let mut cache = EntityCache::new();
            let found = manager.find_by_id(&mut cache, &start_id).await.unwrap();
            let children = manager
                .find_child_executions_by_parent_execution_id(&mut cache, "gen-0")
                .await
                .unwrap();
            (found, cache.count::<ExecutionEntity>(), ids(&children))
        });

        prop_assert!(found.is_some());
        prop_assert_eq!(cached, rows.len());
        prop_assert_eq!(store.query_count(), 1);

        let mut expected: Vec<String> = rows
            .iter()
            .filter(|row| row.parent_id.as_deref() == Some("gen-0"))
            .map(|row| row.id.clone())
            .collect();
        expected.sort();
        let mut children = children;
        children.sort();
        prop_assert_eq!(children, expected);
    }
}
