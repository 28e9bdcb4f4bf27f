//! In-memory execution store.
//!
//! Rows live in a single mutex-guarded state, so every operation, including
//! the conditional lock update, is atomic with respect to the others.

use super::{ExecutionSelect, ExecutionStore};
use crate::error::{StoreError, StoreResult};
use crate::models::{
    ExecutionQuery, ExecutionRow, NativeQuery, Page, ProcessInstanceQuery,
    ProcessInstanceWithVariables,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::debug;

#[derive(Debug, Default)]
struct MemoryState {
    executions: Vec<ExecutionRow>,
    variables: HashMap<String, BTreeMap<String, Value>>,
    /// process definition id → deployment id
    process_definitions: HashMap<String, String>,
    native_results: HashMap<String, Vec<ExecutionRow>>,
}

impl MemoryState {
    fn execution(&self, id: &str) -> Option<&ExecutionRow> {
        self.executions.iter().find(|row| row.id == id)
    }

    fn filtered(&self, predicate: impl Fn(&ExecutionRow) -> bool) -> Vec<ExecutionRow> {
        self.executions
            .iter()
            .filter(|row| predicate(row))
            .cloned()
            .collect()
    }

    fn process_instances(&self, query: &ProcessInstanceQuery) -> Vec<ExecutionRow> {
        let super_process_instance_of = |super_execution_id: &str| {
            self.execution(super_execution_id)
                .and_then(|row| row.process_instance_id.clone())
        };
        self.filtered(|row| query.matches(row, super_process_instance_of))
    }

    fn select(&self, select: &ExecutionSelect) -> Vec<ExecutionRow> {
        match select {
            ExecutionSelect::ById(id) => self.filtered(|row| row.id == *id),
            ExecutionSelect::WithSameRootProcessInstanceId(execution_id) => {
                match self
                    .execution(execution_id)
                    .and_then(|row| row.root_process_instance_id.clone())
                {
                    Some(root) => self.filtered(|row| row.root_process_instance_id.as_ref() == Some(&root)),
                    None => Vec::new(),
                }
            }
            ExecutionSelect::ByParentExecutionId(parent_id) => {
                self.filtered(|row| row.parent_id.as_ref() == Some(parent_id))
            }
            ExecutionSelect::ChildExecutionsByProcessInstanceId(process_instance_id) => {
                self.filtered(|row| {
                    row.parent_id.is_some() && row.process_instance_id.as_ref() == Some(process_instance_id)
                })
            }
            ExecutionSelect::ByRootProcessInstanceId(root) => {
                self.filtered(|row| row.root_process_instance_id.as_ref() == Some(root))
            }
            ExecutionSelect::ByProcessInstanceId(process_instance_id) => {
                self.filtered(|row| row.process_instance_id.as_ref() == Some(process_instance_id))
            }
            ExecutionSelect::SubProcessInstanceBySuperExecutionId(super_execution_id) => {
                self.filtered(|row| row.super_execution_id.as_ref() == Some(super_execution_id))
            }
            ExecutionSelect::ByParentAndActivityIds(filter) => self.filtered(|row| {
                row.parent_id.as_ref() == Some(&filter.parent_execution_id)
                    && row
                        .activity_id
                        .as_ref()
                        .is_some_and(|activity_id| filter.activity_ids.contains(activity_id))
            }),
            ExecutionSelect::Inactive(filter) => self.filtered(|row| {
                !row.is_active
                    && filter
                        .activity_id
                        .as_ref()
                        .map_or(true, |activity_id| row.activity_id.as_ref() == Some(activity_id))
                    && filter
                        .process_instance_id
                        .as_ref()
                        .map_or(true, |id| row.process_instance_id.as_ref() == Some(id))
            }),
            ExecutionSelect::EventScopeByParentAndActivityId {
                parent_execution_id,
                activity_id,
            } => self.filtered(|row| {
                row.is_event_scope
                    && row.parent_id.as_ref() == Some(parent_execution_id)
                    && row.activity_id.as_ref() == Some(activity_id)
            }),
        }
    }
}

/// Execution store keeping every row in process memory.
///
/// Counts the store round trips it serves, so callers can assert that a
/// result came from the session cache rather than from storage.
#[derive(Debug, Default)]
pub struct InMemoryExecutionStore {
    state: Mutex<MemoryState>,
    query_count: AtomicUsize,
}

impl InMemoryExecutionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a row by id
    pub fn insert_execution(&self, row: ExecutionRow) {
        let mut state = self.state.lock();
        match state.executions.iter_mut().find(|existing| existing.id == row.id) {
            Some(existing) => *existing = row,
            None => state.executions.push(row),
        }
    }

    pub fn insert_executions(&self, rows: impl IntoIterator<Item = ExecutionRow>) {
        for row in rows {
            self.insert_execution(row);
        }
    }

    pub fn set_variable(&self, process_instance_id: &str, name: &str, value: Value) {
        self.state
            .lock()
            .variables
            .entry(process_instance_id.to_string())
            .or_default()
            .insert(name.to_string(), value);
    }

    pub fn register_process_definition(&self, process_definition_id: &str, deployment_id: &str) {
        self.state
            .lock()
            .process_definitions
            .insert(process_definition_id.to_string(), deployment_id.to_string());
    }

    /// Native SQL cannot be evaluated in memory; register the rows a given
    /// statement should return instead
    pub fn register_native_result(&self, sql: &str, rows: Vec<ExecutionRow>) {
        self.state
            .lock()
            .native_results
            .insert(sql.to_string(), rows);
    }

    /// Current stored form of one execution
    pub fn execution(&self, id: &str) -> Option<ExecutionRow> {
        self.state.lock().execution(id).cloned()
    }

    /// Number of store operations served so far
    pub fn query_count(&self) -> usize {
        self.query_count.load(Ordering::SeqCst)
    }

    pub fn reset_query_count(&self) {
        self.query_count.store(0, Ordering::SeqCst);
    }

    fn record(&self, operation: &str) {
        let count = self.query_count.fetch_add(1, Ordering::SeqCst) + 1;
        debug!(operation = %operation, query_count = count, "In-memory store operation");
    }

    fn native_rows(&self, query: &NativeQuery) -> StoreResult<Vec<ExecutionRow>> {
        self.state
            .lock()
            .native_results
            .get(&query.sql)
            .cloned()
            .ok_or_else(|| StoreError::unsupported_query(query.sql.clone()))
    }
}

fn to_count(len: usize) -> i64 {
    i64::try_from(len).unwrap_or(i64::MAX)
}

#[async_trait]
impl ExecutionStore for InMemoryExecutionStore {
    async fn select_executions(&self, select: &ExecutionSelect) -> StoreResult<Vec<ExecutionRow>> {
        self.record(select.name());
        Ok(self.state.lock().select(select))
    }

    async fn select_execution_count_by_criteria(&self, query: &ExecutionQuery) -> StoreResult<i64> {
        self.record("select_execution_count_by_criteria");
        Ok(to_count(self.state.lock().filtered(|row| query.matches(row)).len()))
    }

    async fn select_executions_by_criteria(
        &self,
        query: &ExecutionQuery,
        page: Page,
    ) -> StoreResult<Vec<ExecutionRow>> {
        self.record("select_executions_by_criteria");
        Ok(page.slice(self.state.lock().filtered(|row| query.matches(row))))
    }

    async fn select_process_instance_count_by_criteria(
        &self,
        query: &ProcessInstanceQuery,
    ) -> StoreResult<i64> {
        self.record("select_process_instance_count_by_criteria");
        Ok(to_count(self.state.lock().process_instances(query).len()))
    }

    async fn select_process_instances_by_criteria(
        &self,
        query: &ProcessInstanceQuery,
        page: Page,
    ) -> StoreResult<Vec<ExecutionRow>> {
        self.record("select_process_instances_by_criteria");
        Ok(page.slice(self.state.lock().process_instances(query)))
    }

    async fn select_process_instances_with_variables(
        &self,
        query: &ProcessInstanceQuery,
        page: Page,
    ) -> StoreResult<Vec<ProcessInstanceWithVariables>> {
        self.record("select_process_instances_with_variables");
        let state = self.state.lock();
        let rows = state
            .process_instances(query)
            .into_iter()
            .map(|process_instance| ProcessInstanceWithVariables {
                variables: state
                    .variables
                    .get(&process_instance.id)
                    .cloned()
                    .unwrap_or_default(),
                process_instance,
            })
            .collect();
        Ok(page.slice(rows))
    }

    async fn select_process_instance_ids_by_process_definition_id(
        &self,
        process_definition_id: &str,
    ) -> StoreResult<Vec<String>> {
        self.record("select_process_instance_ids_by_process_definition_id");
        Ok(self
            .state
            .lock()
            .filtered(|row| {
                row.parent_id.is_none()
                    && row.process_definition_id.as_deref() == Some(process_definition_id)
            })
            .into_iter()
            .map(|row| row.id)
            .collect())
    }

    async fn select_executions_by_native_query(
        &self,
        query: &NativeQuery,
        page: Page,
    ) -> StoreResult<Vec<ExecutionRow>> {
        self.record("select_executions_by_native_query");
        Ok(page.slice(self.native_rows(query)?))
    }

    async fn select_execution_count_by_native_query(&self, query: &NativeQuery) -> StoreResult<i64> {
        self.record("select_execution_count_by_native_query");
        Ok(to_count(self.native_rows(query)?.len()))
    }

    async fn update_execution_tenant_id_for_deployment(
        &self,
        deployment_id: &str,
        tenant_id: &str,
    ) -> StoreResult<u64> {
        self.record("update_execution_tenant_id_for_deployment");
        let mut state = self.state.lock();
        let MemoryState {
            executions,
            process_definitions,
            ..
        } = &mut *state;

        let mut updated = 0;
        for row in executions.iter_mut() {
            let in_deployment = row
                .process_definition_id
                .as_ref()
                .and_then(|definition| process_definitions.get(definition))
                .is_some_and(|deployment| deployment == deployment_id);
            if in_deployment {
                row.tenant_id = Some(tenant_id.to_string());
                updated += 1;
            }
        }
        Ok(updated)
    }

    async fn update_process_instance_lock_time(
        &self,
        process_instance_id: &str,
        lock_time: DateTime<Utc>,
        expiration_time: DateTime<Utc>,
    ) -> StoreResult<u64> {
        self.record("update_process_instance_lock_time");
        let mut state = self.state.lock();
        let lockable = state.executions.iter_mut().find(|row| {
            row.id == process_instance_id
                && row.lock_time.map_or(true, |locked_at| locked_at < expiration_time)
        });
        match lockable {
            Some(row) => {
                row.lock_time = Some(lock_time);
                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn clear_process_instance_lock_time(&self, process_instance_id: &str) -> StoreResult<u64> {
        self.record("clear_process_instance_lock_time");
        let mut state = self.state.lock();
        match state.executions.iter_mut().find(|row| row.id == process_instance_id) {
            Some(row) => {
                row.lock_time = None;
                Ok(1)
            }
            None => Ok(0),
        }
    }
}
