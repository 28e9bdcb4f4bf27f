//! PostgreSQL execution store.
//!
//! Structural and criteria queries are generated by the
//! [`query_builder`](crate::query_builder) scopes; updates are fixed
//! statements. Tables are created by the migrations under `migrations/`,
//! embedded in [`MIGRATOR`] and applied by [`PgExecutionStore::migrate`].

use super::{ExecutionSelect, ExecutionStore};
use crate::config::DatabaseConfig;
use crate::constants::tables;
use crate::error::{StoreError, StoreResult};
use crate::models::{
    ExecutionQuery, ExecutionRow, NativeQuery, Page, ProcessInstanceQuery,
    ProcessInstanceWithVariables,
};
use crate::query_builder::{
    arguments, ExecutionScopes, Pagination, ProcessInstanceScopes, SqlValue,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::{debug, info};

/// One process instance row joined with at most one of its variables
#[derive(Debug, sqlx::FromRow)]
struct ProcessInstanceVariableRow {
    #[sqlx(flatten)]
    execution: ExecutionRow,
    variable_name: Option<String>,
    variable_value: Option<serde_json::Value>,
}

/// Fold joined rows (ordered by process instance) into one entry per instance
fn group_variables(rows: Vec<ProcessInstanceVariableRow>) -> Vec<ProcessInstanceWithVariables> {
    let mut grouped: Vec<ProcessInstanceWithVariables> = Vec::new();
    for row in rows {
        let same_instance = grouped
            .last()
            .is_some_and(|last| last.process_instance.id == row.execution.id);
        if !same_instance {
            grouped.push(ProcessInstanceWithVariables {
                process_instance: row.execution,
                variables: Default::default(),
            });
        }
        if let (Some(name), Some(last)) = (row.variable_name, grouped.last_mut()) {
            last.variables
                .insert(name, row.variable_value.unwrap_or(serde_json::Value::Null));
        }
    }
    grouped
}

fn native_list_sql(query: &NativeQuery, page: Page) -> String {
    format!(
        "SELECT * FROM ({}) native{}",
        query.sql,
        Pagination::from_page(page).to_sql()
    )
}

fn native_count_sql(query: &NativeQuery) -> String {
    format!("SELECT COUNT(*) FROM ({}) native", query.sql)
}

fn native_binds(query: &NativeQuery) -> Vec<SqlValue> {
    query.parameters.iter().map(SqlValue::from_json).collect()
}

/// Schema migrations for the execution tables
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

/// Execution store backed by a PostgreSQL pool
#[derive(Debug, Clone)]
pub struct PgExecutionStore {
    pool: PgPool,
}

impl PgExecutionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Open a pool from configuration
    pub async fn connect(config: &DatabaseConfig) -> StoreResult<Self> {
        let url = config
            .url
            .as_deref()
            .ok_or_else(|| StoreError::internal("database.url is not configured"))?;

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.acquire_timeout())
            .connect(url)
            .await?;

        info!(
            max_connections = config.max_connections,
            acquire_timeout_seconds = config.acquire_timeout_seconds,
            "Connected PostgreSQL execution store"
        );
        Ok(Self::new(pool))
    }

    /// Apply pending schema migrations; already applied ones are skipped
    pub async fn migrate(&self) -> StoreResult<()> {
        MIGRATOR.run(&self.pool).await?;
        info!(migrations = MIGRATOR.iter().count(), "Execution tables migrated");
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl ExecutionStore for PgExecutionStore {
    async fn select_executions(&self, select: &ExecutionSelect) -> StoreResult<Vec<ExecutionRow>> {
        debug!(query = %select, "Selecting executions");
        Ok(ExecutionScopes::select(select).fetch_all(&self.pool).await?)
    }

    async fn select_execution_count_by_criteria(&self, query: &ExecutionQuery) -> StoreResult<i64> {
        Ok(ExecutionScopes::by_criteria(query).count(&self.pool).await?)
    }

    async fn select_executions_by_criteria(
        &self,
        query: &ExecutionQuery,
        page: Page,
    ) -> StoreResult<Vec<ExecutionRow>> {
        Ok(ExecutionScopes::by_criteria(query)
            .paginate(Pagination::from_page(page))
            .fetch_all(&self.pool)
            .await?)
    }

    async fn select_process_instance_count_by_criteria(
        &self,
        query: &ProcessInstanceQuery,
    ) -> StoreResult<i64> {
        Ok(ProcessInstanceScopes::by_criteria(query).count(&self.pool).await?)
    }

    async fn select_process_instances_by_criteria(
        &self,
        query: &ProcessInstanceQuery,
        page: Page,
    ) -> StoreResult<Vec<ExecutionRow>> {
        Ok(ProcessInstanceScopes::by_criteria(query)
            .paginate(Pagination::from_page(page))
            .fetch_all(&self.pool)
            .await?)
    }

    async fn select_process_instances_with_variables(
        &self,
        query: &ProcessInstanceQuery,
        page: Page,
    ) -> StoreResult<Vec<ProcessInstanceWithVariables>> {
        // the window caps joined rows, not process instances
        let rows: Vec<ProcessInstanceVariableRow> = ProcessInstanceScopes::with_variables(query)
            .paginate(Pagination::from_page(page))
            .fetch_all(&self.pool)
            .await?;
        Ok(group_variables(rows))
    }

    async fn select_process_instance_ids_by_process_definition_id(
        &self,
        process_definition_id: &str,
    ) -> StoreResult<Vec<String>> {
        let (sql, binds) =
            ProcessInstanceScopes::ids_by_process_definition_id(process_definition_id).build_sql();
        Ok(sqlx::query_scalar_with::<_, String, _>(&sql, arguments(&binds)?)
            .fetch_all(&self.pool)
            .await?)
    }

    async fn select_executions_by_native_query(
        &self,
        query: &NativeQuery,
        page: Page,
    ) -> StoreResult<Vec<ExecutionRow>> {
        let sql = native_list_sql(query, page);
        debug!(sql = %sql, "Running native execution query");
        Ok(
            sqlx::query_as_with::<_, ExecutionRow, _>(&sql, arguments(&native_binds(query))?)
                .fetch_all(&self.pool)
                .await?,
        )
    }

    async fn select_execution_count_by_native_query(&self, query: &NativeQuery) -> StoreResult<i64> {
        let sql = native_count_sql(query);
        Ok(
            sqlx::query_scalar_with::<_, i64, _>(&sql, arguments(&native_binds(query))?)
                .fetch_one(&self.pool)
                .await?,
        )
    }

    async fn update_execution_tenant_id_for_deployment(
        &self,
        deployment_id: &str,
        tenant_id: &str,
    ) -> StoreResult<u64> {
        let sql = format!(
            "UPDATE {} SET tenant_id = $1 WHERE process_definition_id IN \
             (SELECT id FROM {} WHERE deployment_id = $2)",
            tables::EXECUTIONS,
            tables::PROCESS_DEFINITIONS
        );
        let result = sqlx::query(&sql)
            .bind(tenant_id)
            .bind(deployment_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn update_process_instance_lock_time(
        &self,
        process_instance_id: &str,
        lock_time: DateTime<Utc>,
        expiration_time: DateTime<Utc>,
    ) -> StoreResult<u64> {
        let sql = format!(
            "UPDATE {} SET lock_time = $1 WHERE id = $2 AND (lock_time IS NULL OR lock_time < $3)",
            tables::EXECUTIONS
        );
        let result = sqlx::query(&sql)
            .bind(lock_time)
            .bind(process_instance_id)
            .bind(expiration_time)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn clear_process_instance_lock_time(&self, process_instance_id: &str) -> StoreResult<u64> {
        let sql = format!(
            "UPDATE {} SET lock_time = NULL WHERE id = $1",
            tables::EXECUTIONS
        );
        let result = sqlx::query(&sql)
            .bind(process_instance_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
