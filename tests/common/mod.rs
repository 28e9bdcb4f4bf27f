//! Shared fixtures for the integration tests.
//!
//! The main fixture is one nested tree plus an unrelated process instance:
//!
//! ```text
//! root (process instance, def-order)
//! ├── c1 (task-a)
//! │   └── c4 (join, inactive)
//! └── c2 (call-activity)
//!     └── sub (process instance, def-billing, super execution c2)
//!         └── c3 (join, inactive)
//!
//! other (process instance, def-order)
//! └── other-c1 (task-a)
//! ```

#![allow(dead_code)]

pub mod strategies;

use execution_cache::{
    ExecutionDataManager, ExecutionRef, ExecutionRow, InMemoryExecutionStore, PersistenceConfig,
};
use std::sync::Arc;

/// Builder for persisted execution rows
pub struct ExecutionRowBuilder {
    row: ExecutionRow,
}

impl ExecutionRowBuilder {
    pub fn process_instance(id: &str, process_definition_id: &str) -> Self {
        Self {
            row: ExecutionRow {
                id: id.to_string(),
                revision: 1,
                process_instance_id: Some(id.to_string()),
                root_process_instance_id: Some(id.to_string()),
                process_definition_id: Some(process_definition_id.to_string()),
                is_active: true,
                is_scope: true,
                ..Default::default()
            },
        }
    }

    pub fn child(id: &str, parent: &ExecutionRow) -> Self {
        Self {
            row: ExecutionRow {
                id: id.to_string(),
                revision: 1,
                parent_id: Some(parent.id.clone()),
                process_instance_id: parent.process_instance_id.clone(),
                root_process_instance_id: parent.root_process_instance_id.clone(),
                process_definition_id: parent.process_definition_id.clone(),
                tenant_id: parent.tenant_id.clone(),
                is_active: true,
                ..Default::default()
            },
        }
    }

    pub fn sub_process_instance(id: &str, super_execution: &ExecutionRow, process_definition_id: &str) -> Self {
        let mut builder = Self::process_instance(id, process_definition_id);
        builder.row.super_execution_id = Some(super_execution.id.clone());
        builder.row.root_process_instance_id = super_execution.root_process_instance_id.clone();
        builder
    }

    pub fn activity(mut self, activity_id: &str) -> Self {
        self.row.activity_id = Some(activity_id.to_string());
        self
    }

    pub fn business_key(mut self, business_key: &str) -> Self {
        self.row.business_key = Some(business_key.to_string());
        self
    }

    pub fn event_scope(mut self) -> Self {
        self.row.is_event_scope = true;
        self.row.is_active = false;
        self
    }

    pub fn inactive(mut self) -> Self {
        self.row.is_active = false;
        self
    }

    pub fn build(self) -> ExecutionRow {
        self.row
    }
}

/// Rows of the fixture tree, in store order
pub fn execution_tree_rows() -> Vec<ExecutionRow> {
    let root = ExecutionRowBuilder::process_instance("root", "def-order")
        .business_key("order-1")
        .build();
    let c1 = ExecutionRowBuilder::child("c1", &root).activity("task-a").build();
    let c2 = ExecutionRowBuilder::child("c2", &root).activity("call-activity").build();
    let sub = ExecutionRowBuilder::sub_process_instance("sub", &c2, "def-billing").build();
    let c3 = ExecutionRowBuilder::child("c3", &sub).activity("join").inactive().build();
    let c4 = ExecutionRowBuilder::child("c4", &c1).activity("join").inactive().build();

    let other = ExecutionRowBuilder::process_instance("other", "def-order")
        .business_key("order-2")
        .build();
    let other_c1 = ExecutionRowBuilder::child("other-c1", &other).activity("task-a").build();

    vec![root, c1, c2, sub, c3, c4, other, other_c1]
}

/// An in-memory store seeded with the fixture tree
pub fn execution_tree_store() -> Arc<InMemoryExecutionStore> {
    let store = Arc::new(InMemoryExecutionStore::new());
    store.insert_executions(execution_tree_rows());
    store.register_process_definition("def-order", "deployment-1");
    store.register_process_definition("def-billing", "deployment-2");
    store
}

pub fn data_manager(store: &Arc<InMemoryExecutionStore>, eager: bool) -> ExecutionDataManager {
    let config = PersistenceConfig {
        eagerly_fetch_execution_tree: eager,
        ..Default::default()
    };
    ExecutionDataManager::new(store.clone(), &config)
}

/// Ids in result order
pub fn ids(executions: &[ExecutionRef]) -> Vec<String> {
    executions.iter().map(|execution| execution.read().id.clone()).collect()
}

/// Ids sorted, for comparisons that ignore order
pub fn sorted_ids(executions: &[ExecutionRef]) -> Vec<String> {
    let mut ids = ids(executions);
    ids.sort();
    ids
}
