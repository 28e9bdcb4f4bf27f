//! Execution data manager queries in the default (non-eager) mode, and
//! agreement between the two fetch modes.

mod common;

use common::{data_manager, execution_tree_rows, execution_tree_store, ids, sorted_ids, ExecutionRowBuilder};
use execution_cache::{
    EntityCache, ExecutionEntity, ExecutionQuery, NativeQuery, Page, PersistenceError,
    ProcessInstanceQuery, StoreError,
};
use std::sync::Arc;

#[tokio::test]
async fn test_find_by_id_loads_single_execution() {
    let store = execution_tree_store();
    let manager = data_manager(&store, false);
    let mut cache = EntityCache::new();

    let c1 = manager.find_by_id(&mut cache, "c1").await.unwrap().unwrap();
    assert_eq!(c1.read().activity_id.as_deref(), Some("task-a"));
    assert_eq!(cache.count::<ExecutionEntity>(), 1);

    let again = manager.find_by_id(&mut cache, "c1").await.unwrap().unwrap();
    assert!(Arc::ptr_eq(&c1, &again));
    assert_eq!(store.query_count(), 1);
}

#[tokio::test]
async fn test_child_queries_return_session_instances() {
    let store = execution_tree_store();
    let manager = data_manager(&store, false);
    let mut cache = EntityCache::new();

    let c2 = manager.find_by_id(&mut cache, "c2").await.unwrap().unwrap();
    let children = manager
        .find_child_executions_by_parent_execution_id(&mut cache, "root")
        .await
        .unwrap();

    assert_eq!(ids(&children), vec!["c1", "c2"]);
    assert!(Arc::ptr_eq(&children[1], &c2));
    assert!(cache.contains::<ExecutionEntity>("c1"));
}

#[tokio::test]
async fn test_unflushed_child_is_appended_to_store_rows() {
    let store = execution_tree_store();
    let manager = data_manager(&store, false);
    let mut cache = EntityCache::new();

    let created = manager.create(&mut cache);
    created.write().parent_id = Some("root".to_string());

    let children = manager
        .find_child_executions_by_parent_execution_id(&mut cache, "root")
        .await
        .unwrap();
    assert_eq!(children.len(), 3);
    assert!(Arc::ptr_eq(&children[2], &created));
}

#[tokio::test]
async fn test_process_instance_queries() {
    let store = execution_tree_store();
    let manager = data_manager(&store, false);
    let mut cache = EntityCache::new();

    let children = manager
        .find_child_executions_by_process_instance_id(&mut cache, "root")
        .await
        .unwrap();
    assert_eq!(sorted_ids(&children), vec!["c1", "c2", "c4"]);

    let all = manager
        .find_executions_by_process_instance_id(&mut cache, "root")
        .await
        .unwrap();
    assert_eq!(sorted_ids(&all), vec!["c1", "c2", "c4", "root"]);

    let tree = manager
        .find_executions_by_root_process_instance_id(&mut cache, "root")
        .await
        .unwrap();
    assert_eq!(sorted_ids(&tree), vec!["c1", "c2", "c3", "c4", "root", "sub"]);
}

#[tokio::test]
async fn test_sub_process_instance_lookup() {
    let store = execution_tree_store();
    let manager = data_manager(&store, false);
    let mut cache = EntityCache::new();

    let sub = manager
        .find_sub_process_instance_by_super_execution_id(&mut cache, "c2")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(sub.read().id, "sub");

    let cached = manager
        .find_sub_process_instance_by_super_execution_id(&mut cache, "c2")
        .await
        .unwrap()
        .unwrap();
    assert!(Arc::ptr_eq(&sub, &cached));
    assert_eq!(store.query_count(), 1);

    let none = manager
        .find_sub_process_instance_by_super_execution_id(&mut cache, "c1")
        .await
        .unwrap();
    assert!(none.is_none());
}

#[tokio::test]
async fn test_parent_and_activity_ids_filter() {
    let store = execution_tree_store();
    let manager = data_manager(&store, false);
    let mut cache = EntityCache::new();

    let matching = manager
        .find_executions_by_parent_execution_and_activity_ids(
            &mut cache,
            "root",
            &["task-a".to_string(), "missing-activity".to_string()],
        )
        .await
        .unwrap();
    assert_eq!(ids(&matching), vec!["c1"]);

    let none = manager
        .find_executions_by_parent_execution_and_activity_ids(&mut cache, "root", &[])
        .await
        .unwrap();
    assert!(none.is_empty());
}

#[tokio::test]
async fn test_inactive_execution_queries() {
    let store = execution_tree_store();
    let manager = data_manager(&store, false);
    let mut cache = EntityCache::new();

    let by_activity = manager
        .find_inactive_executions_by_activity_id(&mut cache, "join")
        .await
        .unwrap();
    assert_eq!(sorted_ids(&by_activity), vec!["c3", "c4"]);

    let by_process_instance = manager
        .find_inactive_executions_by_process_instance_id(&mut cache, "sub")
        .await
        .unwrap();
    assert_eq!(ids(&by_process_instance), vec!["c3"]);

    let by_both = manager
        .find_inactive_executions_by_activity_id_and_process_instance_id(&mut cache, "join", "root")
        .await
        .unwrap();
    assert_eq!(ids(&by_both), vec!["c4"]);
}

#[tokio::test]
async fn test_inactive_unflushed_execution_is_retained() {
    let store = execution_tree_store();
    let manager = data_manager(&store, false);
    let mut cache = EntityCache::new();

    let created = manager.create(&mut cache);
    {
        let mut execution = created.write();
        execution.parent_id = Some("c2".to_string());
        execution.process_instance_id = Some("root".to_string());
        execution.activity_id = Some("join".to_string());
        execution.is_active = false;
    }

    let inactive = manager
        .find_inactive_executions_by_activity_id_and_process_instance_id(&mut cache, "join", "root")
        .await
        .unwrap();
    assert_eq!(inactive.len(), 2);
    assert!(inactive.iter().any(|execution| Arc::ptr_eq(execution, &created)));
}

#[tokio::test]
async fn test_criteria_queries() {
    let store = execution_tree_store();
    let manager = data_manager(&store, false);
    let mut cache = EntityCache::new();

    let query = ExecutionQuery::new().process_instance_id("root");
    assert_eq!(manager.find_execution_count_by_query_criteria(&query).await.unwrap(), 4);

    let page = manager
        .find_executions_by_query_criteria(&mut cache, &query, Page::new(1, 2))
        .await
        .unwrap();
    assert_eq!(page.len(), 2);
    assert_eq!(cache.count::<ExecutionEntity>(), 2);

    let instances = ProcessInstanceQuery::new().process_definition_id("def-order");
    assert_eq!(
        manager
            .find_process_instance_count_by_query_criteria(&instances)
            .await
            .unwrap(),
        2
    );
    let found = manager
        .find_process_instances_by_query_criteria(&mut cache, &instances)
        .await
        .unwrap();
    assert_eq!(sorted_ids(&found), vec!["other", "root"]);

    let first_only = manager
        .find_process_instances_by_query_criteria(&mut cache, &instances.clone().page(0, 1))
        .await
        .unwrap();
    assert_eq!(first_only.len(), 1);
}

#[tokio::test]
async fn test_process_instance_ids_by_definition() {
    let store = execution_tree_store();
    let manager = data_manager(&store, false);

    let ids = manager
        .find_process_instance_ids_by_process_definition_id("def-billing")
        .await
        .unwrap();
    assert_eq!(ids, vec!["sub"]);
}

#[tokio::test]
async fn test_native_queries_bypass_cache() {
    let store = execution_tree_store();
    let manager = data_manager(&store, false);
    let cache = EntityCache::new();

    let sql = "SELECT * FROM exec_executions WHERE business_key_ = $1";
    let rows: Vec<_> = execution_tree_rows().into_iter().filter(|row| row.parent_id.is_none()).collect();
    store.register_native_result(sql, rows);

    let query = NativeQuery::new(sql).parameter(serde_json::json!("order-1"));
    let found = manager
        .find_executions_by_native_query(&query, Page::new(0, 10))
        .await
        .unwrap();
    assert_eq!(found.len(), 3);
    assert_eq!(manager.find_execution_count_by_native_query(&query).await.unwrap(), 3);

    let instances = manager
        .find_process_instances_by_native_query(&query, Page::new(1, 1))
        .await
        .unwrap();
    assert_eq!(instances.len(), 1);
    assert!(cache.is_empty());

    let err = manager
        .find_execution_count_by_native_query(&NativeQuery::new("SELECT 1"))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        PersistenceError::Store(StoreError::UnsupportedQuery { .. })
    ));
}

#[tokio::test]
async fn test_tenant_update_leaves_cached_instances_alone() {
    let store = execution_tree_store();
    let manager = data_manager(&store, false);
    let mut cache = EntityCache::new();

    let root = manager.find_by_id(&mut cache, "root").await.unwrap().unwrap();
    let updated = manager
        .update_execution_tenant_id_for_deployment("deployment-1", "acme")
        .await
        .unwrap();

    assert_eq!(updated, 6);
    assert_eq!(store.execution("root").unwrap().tenant_id.as_deref(), Some("acme"));
    assert_eq!(store.execution("c3").unwrap().tenant_id, None);
    assert_eq!(root.read().tenant_id, None);
}

#[tokio::test]
async fn test_fetch_modes_agree_on_persisted_state() {
    let store = execution_tree_store();
    let all_ids: Vec<String> = execution_tree_rows().into_iter().map(|row| row.id).collect();

    for id in &all_ids {
        let mut results = Vec::new();
        for eager in [false, true] {
            let manager = data_manager(&store, eager);
            let mut cache = EntityCache::new();

            let found = manager.find_by_id(&mut cache, id).await.unwrap().map(|e| e.read().id.clone());
            let children = manager
                .find_child_executions_by_parent_execution_id(&mut cache, id)
                .await
                .unwrap();
            let instance_children = manager
                .find_child_executions_by_process_instance_id(&mut cache, id)
                .await
                .unwrap();
            let sub = manager
                .find_sub_process_instance_by_super_execution_id(&mut cache, id)
                .await
                .unwrap()
                .map(|e| e.read().id.clone());

            results.push((found, sorted_ids(&children), sorted_ids(&instance_children), sub));
        }
        assert_eq!(results[0], results[1], "fetch modes disagree for {id}");
    }
}

#[tokio::test]
async fn test_fetch_modes_agree_after_list_queries_cache_part_of_tree() {
    let store = execution_tree_store();

    let mut results = Vec::new();
    for eager in [false, true] {
        let manager = data_manager(&store, eager);
        let mut cache = EntityCache::new();

        let task_a = manager
            .find_executions_by_parent_execution_and_activity_ids(&mut cache, "root", &["task-a".to_string()])
            .await
            .unwrap();
        assert_eq!(ids(&task_a), vec!["c1"]);
        assert!(cache.contains::<ExecutionEntity>("c1"));

        let children = manager
            .find_child_executions_by_parent_execution_id(&mut cache, "c1")
            .await
            .unwrap();
        let sub = manager
            .find_sub_process_instance_by_super_execution_id(&mut cache, "c2")
            .await
            .unwrap()
            .map(|e| e.read().id.clone());

        results.push((sorted_ids(&children), sub));
    }

    assert_eq!(results[0], (vec!["c4".to_string()], Some("sub".to_string())));
    assert_eq!(results[0], results[1]);
}

#[tokio::test]
async fn test_event_scope_executions_come_from_store_only() {
    let store = execution_tree_store();
    let rows = execution_tree_rows();
    let c1 = rows.iter().find(|row| row.id == "c1").unwrap();
    store.insert_executions(vec![
        ExecutionRowBuilder::child("es-1", c1).activity("boundary").event_scope().build(),
        ExecutionRowBuilder::child("es-2", c1).activity("other-boundary").event_scope().build(),
        ExecutionRowBuilder::child("plain", c1).activity("boundary").build(),
    ]);
    let manager = data_manager(&store, false);
    let mut cache = EntityCache::new();

    let cached = manager.find_by_id(&mut cache, "es-1").await.unwrap().unwrap();
    let unflushed = manager.create(&mut cache);
    {
        let mut execution = unflushed.write();
        execution.parent_id = Some("c1".to_string());
        execution.activity_id = Some("boundary".to_string());
        execution.is_event_scope = true;
    }

    let event_scopes = manager
        .find_event_scope_executions_by_activity_id(&mut cache, "boundary", "c1")
        .await
        .unwrap();
    assert_eq!(ids(&event_scopes), vec!["es-1"]);
    assert!(Arc::ptr_eq(&event_scopes[0], &cached));

    let none = manager
        .find_event_scope_executions_by_activity_id(&mut cache, "boundary", "root")
        .await
        .unwrap();
    assert!(none.is_empty());
}
