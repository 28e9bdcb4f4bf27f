//! # Execution Store
//!
//! The storage collaborator behind the data manager. A store knows nothing
//! about the session cache: it turns query shapes into rows and reports
//! affected-row counts for updates.
//!
//! ## Implementations
//!
//! - [`InMemoryExecutionStore`] - Mutex-guarded rows, used by tests and embedders
//! - [`PgExecutionStore`] - PostgreSQL via `sqlx`, tables from `migrations/`

pub mod memory;
pub mod postgres;

pub use memory::InMemoryExecutionStore;
pub use postgres::PgExecutionStore;

use crate::error::StoreResult;
use crate::models::{
    ExecutionQuery, ExecutionRow, InactiveExecutionFilter, NativeQuery, Page, ParentActivityFilter,
    ProcessInstanceQuery, ProcessInstanceWithVariables,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::fmt;

/// The structural execution queries, one per tree-shaped lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionSelect {
    ById(String),
    /// Every execution sharing the root process instance of the given execution
    WithSameRootProcessInstanceId(String),
    ByParentExecutionId(String),
    /// Executions of a process instance, the process instance itself excluded
    ChildExecutionsByProcessInstanceId(String),
    ByRootProcessInstanceId(String),
    ByProcessInstanceId(String),
    SubProcessInstanceBySuperExecutionId(String),
    ByParentAndActivityIds(ParentActivityFilter),
    Inactive(InactiveExecutionFilter),
    /// Event scope children of a parent execution at one activity
    EventScopeByParentAndActivityId {
        parent_execution_id: String,
        activity_id: String,
    },
}

impl ExecutionSelect {
    /// Stable query name used in logs
    pub fn name(&self) -> &'static str {
        match self {
            Self::ById(_) => "select_execution_by_id",
            Self::WithSameRootProcessInstanceId(_) => {
                "select_executions_with_same_root_process_instance_id"
            }
            Self::ByParentExecutionId(_) => "select_executions_by_parent_execution_id",
            Self::ChildExecutionsByProcessInstanceId(_) => {
                "select_child_executions_by_process_instance_id"
            }
            Self::ByRootProcessInstanceId(_) => "select_executions_by_root_process_instance_id",
            Self::ByProcessInstanceId(_) => "select_executions_by_process_instance_id",
            Self::SubProcessInstanceBySuperExecutionId(_) => {
                "select_sub_process_instance_by_super_execution_id"
            }
            Self::ByParentAndActivityIds(_) => "select_executions_by_parent_and_activity_ids",
            Self::Inactive(_) => "select_inactive_executions",
            Self::EventScopeByParentAndActivityId { .. } => {
                "select_event_scope_executions_by_activity_id"
            }
        }
    }
}

impl fmt::Display for ExecutionSelect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Async storage collaborator for executions and process instances
#[async_trait]
pub trait ExecutionStore: Send + Sync {
    /// Run one structural query; rows come back in a stable order
    async fn select_executions(&self, select: &ExecutionSelect) -> StoreResult<Vec<ExecutionRow>>;

    async fn select_execution_count_by_criteria(&self, query: &ExecutionQuery) -> StoreResult<i64>;

    async fn select_executions_by_criteria(
        &self,
        query: &ExecutionQuery,
        page: Page,
    ) -> StoreResult<Vec<ExecutionRow>>;

    async fn select_process_instance_count_by_criteria(
        &self,
        query: &ProcessInstanceQuery,
    ) -> StoreResult<i64>;

    async fn select_process_instances_by_criteria(
        &self,
        query: &ProcessInstanceQuery,
        page: Page,
    ) -> StoreResult<Vec<ExecutionRow>>;

    /// Process instances with their variables; `page` caps the fetched rows
    async fn select_process_instances_with_variables(
        &self,
        query: &ProcessInstanceQuery,
        page: Page,
    ) -> StoreResult<Vec<ProcessInstanceWithVariables>>;

    async fn select_process_instance_ids_by_process_definition_id(
        &self,
        process_definition_id: &str,
    ) -> StoreResult<Vec<String>>;

    async fn select_executions_by_native_query(
        &self,
        query: &NativeQuery,
        page: Page,
    ) -> StoreResult<Vec<ExecutionRow>>;

    async fn select_execution_count_by_native_query(&self, query: &NativeQuery) -> StoreResult<i64>;

    /// Returns the number of executions updated
    async fn update_execution_tenant_id_for_deployment(
        &self,
        deployment_id: &str,
        tenant_id: &str,
    ) -> StoreResult<u64>;

    /// Set the lock time of a process instance that is unlocked or whose lock
    /// is older than `expiration_time`; returns the number of rows updated
    async fn update_process_instance_lock_time(
        &self,
        process_instance_id: &str,
        lock_time: DateTime<Utc>,
        expiration_time: DateTime<Utc>,
    ) -> StoreResult<u64>;

    /// Clear the lock time unconditionally; returns the number of rows updated
    async fn clear_process_instance_lock_time(&self, process_instance_id: &str) -> StoreResult<u64>;
}
