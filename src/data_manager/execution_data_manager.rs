//! # Execution Data Manager
//!
//! Answers every execution lookup of a unit of work against that unit's
//! [`EntityCache`], falling back to the [`ExecutionStore`].
//!
//! ## Fetch Modes
//!
//! - **Non-eager** (default): each structural lookup issues its own scoped
//!   store query. Rows are reconciled against the cache and cached instances
//!   the query's matcher retains are merged in.
//! - **Eager**: the first lookup of any execution fetches its whole nested
//!   tree in one query and populates the cache from the root. Later parent,
//!   child and sub-process lookups of that tree are answered from the cache.
//!
//! Both modes return the same executions for the same persisted state.
//! Unflushed modifications made in the session can make them differ: eager
//! lookups answered from the cache see the modified instances only.

use super::{find_in_cache_by_matcher, list_from_cache, merge_with_cache, reconcile};
use crate::cache::{link_execution_tree, EntityCache, ExecutionTreeCache};
use crate::config::PersistenceConfig;
use crate::constants::entities;
use crate::error::{PersistenceError, PersistenceResult};
use crate::matcher::{
    CachedEntityMatcher, ChildExecutionsByProcessInstanceIdMatcher,
    ExecutionsByParentAndActivityIdsMatcher, ExecutionsByParentExecutionIdMatcher,
    ExecutionsByProcessInstanceIdMatcher, ExecutionsByRootProcessInstanceIdMatcher,
    ExecutionsWithSameRootProcessInstanceIdMatcher, InactiveExecutionsMatcher,
    SubProcessInstanceBySuperExecutionIdMatcher,
};
use crate::models::{
    ExecutionEntity, ExecutionQuery, ExecutionRef, ExecutionRow, InactiveExecutionFilter,
    NativeQuery, Page, ParentActivityFilter, ProcessInstanceQuery, ProcessInstanceWithVariables,
};
use crate::store::{ExecutionSelect, ExecutionStore};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

/// Query mediator for executions and process instances
#[derive(Clone)]
pub struct ExecutionDataManager {
    store: Arc<dyn ExecutionStore>,
    eagerly_fetch_execution_tree: bool,
    process_instance_variables_limit: usize,
}

impl ExecutionDataManager {
    pub fn new(store: Arc<dyn ExecutionStore>, config: &PersistenceConfig) -> Self {
        Self {
            store,
            eagerly_fetch_execution_tree: config.eagerly_fetch_execution_tree,
            process_instance_variables_limit: config.process_instance_variables_limit,
        }
    }

    pub fn is_eagerly_fetching_execution_tree(&self) -> bool {
        self.eagerly_fetch_execution_tree
    }

    pub fn process_instance_variables_limit(&self) -> usize {
        self.process_instance_variables_limit
    }

    pub fn store(&self) -> &Arc<dyn ExecutionStore> {
        &self.store
    }

    /// A new execution with a generated id, cached as inserted in this session
    pub fn create(&self, cache: &mut EntityCache) -> ExecutionRef {
        let execution = ExecutionEntity::new(Uuid::new_v4().to_string());
        debug!(execution_id = %execution.id, "Created execution");
        cache.put(Arc::new(RwLock::new(execution)), false)
    }

    pub async fn find_by_id(
        &self,
        cache: &mut EntityCache,
        execution_id: &str,
    ) -> PersistenceResult<Option<ExecutionRef>> {
        if self.eagerly_fetch_execution_tree {
            return self.find_by_id_and_fetch_execution_tree(cache, execution_id).await;
        }

        if let Some(cached) = cache.find_in_cache::<ExecutionEntity>(execution_id) {
            debug!(execution_id = %execution_id, "Execution cache hit");
            return Ok(Some(cached));
        }

        let rows = self
            .store
            .select_executions(&ExecutionSelect::ById(execution_id.to_string()))
            .await?;
        Ok(rows
            .into_iter()
            .next()
            .map(|row| cache.cache_load_or_store(ExecutionEntity::from_row(row))))
    }

    /// Fetch the whole tree `execution_id` belongs to and cache it from the root.
    ///
    /// A cached execution is returned without touching the store only when
    /// its tree was populated in full earlier in the session. Executions
    /// cached one at a time by list queries still trigger the tree fetch.
    async fn find_by_id_and_fetch_execution_tree(
        &self,
        cache: &mut EntityCache,
        execution_id: &str,
    ) -> PersistenceResult<Option<ExecutionRef>> {
        let cached = cache.find_in_cache::<ExecutionEntity>(execution_id);
        if let Some(cached) = &cached {
            let root_id = cached.read().root_process_instance_id.clone();
            if root_id.is_some_and(|root_id| cache.is_tree_populated(&root_id)) {
                debug!(execution_id = %execution_id, "Execution tree cache hit");
                return Ok(Some(Arc::clone(cached)));
            }
        }

        let select = ExecutionSelect::WithSameRootProcessInstanceId(execution_id.to_string());
        let rows = self.store.select_executions(&select).await?;
        let fetched = rows.len();

        let database = reconcile::<ExecutionEntity, _>(cache, rows, false);
        if !database.iter().any(|execution| execution.read().id == execution_id) {
            // not flushed yet, or gone; there is no stored tree to populate
            debug!(execution_id = %execution_id, fetched, "Execution tree not in store");
            return Ok(cached);
        }

        let mut matcher = ExecutionsWithSameRootProcessInstanceIdMatcher::new(execution_id);
        let tree = merge_with_cache(cache, database, &mut matcher, execution_id);

        let requested = tree
            .iter()
            .find(|execution| execution.read().id == execution_id)
            .cloned();
        let Some(requested) = requested else {
            debug!(execution_id = %execution_id, fetched, "Execution not found");
            return Ok(None);
        };

        link_execution_tree(&tree);
        let root = ExecutionTreeCache::new(cache).populate_from_root(&requested)?;
        debug!(
            execution_id = %execution_id,
            root_execution_id = %root.read().id,
            fetched,
            tree_size = tree.len(),
            "Fetched execution tree"
        );

        Ok(Some(
            cache
                .find_in_cache::<ExecutionEntity>(execution_id)
                .unwrap_or(requested),
        ))
    }

    pub async fn find_sub_process_instance_by_super_execution_id(
        &self,
        cache: &mut EntityCache,
        super_execution_id: &str,
    ) -> PersistenceResult<Option<ExecutionRef>> {
        if self.eagerly_fetch_execution_tree {
            self.find_by_id_and_fetch_execution_tree(cache, super_execution_id)
                .await?;
        }

        self.get_entity(
            cache,
            ExecutionSelect::SubProcessInstanceBySuperExecutionId(super_execution_id.to_string()),
            &SubProcessInstanceBySuperExecutionIdMatcher,
            super_execution_id,
            !self.eagerly_fetch_execution_tree,
        )
        .await
    }

    pub async fn find_child_executions_by_parent_execution_id(
        &self,
        cache: &mut EntityCache,
        parent_execution_id: &str,
    ) -> PersistenceResult<Vec<ExecutionRef>> {
        if self.eagerly_fetch_execution_tree {
            self.find_by_id_and_fetch_execution_tree(cache, parent_execution_id)
                .await?;
            return Ok(list_from_cache(
                cache,
                &ExecutionsByParentExecutionIdMatcher,
                parent_execution_id,
            ));
        }

        self.get_list(
            cache,
            ExecutionSelect::ByParentExecutionId(parent_execution_id.to_string()),
            &mut ExecutionsByParentExecutionIdMatcher,
            parent_execution_id,
        )
        .await
    }

    /// Executions of a process instance, the process instance itself excluded
    pub async fn find_child_executions_by_process_instance_id(
        &self,
        cache: &mut EntityCache,
        process_instance_id: &str,
    ) -> PersistenceResult<Vec<ExecutionRef>> {
        if self.eagerly_fetch_execution_tree {
            self.find_by_id_and_fetch_execution_tree(cache, process_instance_id)
                .await?;
            return Ok(list_from_cache(
                cache,
                &ChildExecutionsByProcessInstanceIdMatcher,
                process_instance_id,
            ));
        }

        self.get_list(
            cache,
            ExecutionSelect::ChildExecutionsByProcessInstanceId(process_instance_id.to_string()),
            &mut ChildExecutionsByProcessInstanceIdMatcher,
            process_instance_id,
        )
        .await
    }

    pub async fn find_executions_by_parent_execution_and_activity_ids(
        &self,
        cache: &mut EntityCache,
        parent_execution_id: &str,
        activity_ids: &[String],
    ) -> PersistenceResult<Vec<ExecutionRef>> {
        let filter = ParentActivityFilter {
            parent_execution_id: parent_execution_id.to_string(),
            activity_ids: activity_ids.to_vec(),
        };
        self.get_list(
            cache,
            ExecutionSelect::ByParentAndActivityIds(filter.clone()),
            &mut ExecutionsByParentAndActivityIdsMatcher,
            &filter,
        )
        .await
    }

    /// Every execution of a nested tree, across sub-process instances
    pub async fn find_executions_by_root_process_instance_id(
        &self,
        cache: &mut EntityCache,
        root_process_instance_id: &str,
    ) -> PersistenceResult<Vec<ExecutionRef>> {
        self.get_list(
            cache,
            ExecutionSelect::ByRootProcessInstanceId(root_process_instance_id.to_string()),
            &mut ExecutionsByRootProcessInstanceIdMatcher,
            root_process_instance_id,
        )
        .await
    }

    /// Every execution of one process instance, the process instance included
    pub async fn find_executions_by_process_instance_id(
        &self,
        cache: &mut EntityCache,
        process_instance_id: &str,
    ) -> PersistenceResult<Vec<ExecutionRef>> {
        self.get_list(
            cache,
            ExecutionSelect::ByProcessInstanceId(process_instance_id.to_string()),
            &mut ExecutionsByProcessInstanceIdMatcher,
            process_instance_id,
        )
        .await
    }

    pub async fn find_inactive_executions_by_activity_id(
        &self,
        cache: &mut EntityCache,
        activity_id: &str,
    ) -> PersistenceResult<Vec<ExecutionRef>> {
        self.find_inactive_executions(
            cache,
            InactiveExecutionFilter {
                activity_id: Some(activity_id.to_string()),
                process_instance_id: None,
            },
        )
        .await
    }

    pub async fn find_inactive_executions_by_process_instance_id(
        &self,
        cache: &mut EntityCache,
        process_instance_id: &str,
    ) -> PersistenceResult<Vec<ExecutionRef>> {
        self.find_inactive_executions(
            cache,
            InactiveExecutionFilter {
                activity_id: None,
                process_instance_id: Some(process_instance_id.to_string()),
            },
        )
        .await
    }

    pub async fn find_inactive_executions_by_activity_id_and_process_instance_id(
        &self,
        cache: &mut EntityCache,
        activity_id: &str,
        process_instance_id: &str,
    ) -> PersistenceResult<Vec<ExecutionRef>> {
        self.find_inactive_executions(
            cache,
            InactiveExecutionFilter {
                activity_id: Some(activity_id.to_string()),
                process_instance_id: Some(process_instance_id.to_string()),
            },
        )
        .await
    }

    async fn find_inactive_executions(
        &self,
        cache: &mut EntityCache,
        filter: InactiveExecutionFilter,
    ) -> PersistenceResult<Vec<ExecutionRef>> {
        self.get_list(
            cache,
            ExecutionSelect::Inactive(filter.clone()),
            &mut InactiveExecutionsMatcher,
            &filter,
        )
        .await
    }

    /// Event scope executions below `parent_execution_id` at `activity_id`.
    ///
    /// Store only: unflushed event scopes are not merged in, but rows already
    /// cached resolve to their cached instances.
    pub async fn find_event_scope_executions_by_activity_id(
        &self,
        cache: &mut EntityCache,
        activity_id: &str,
        parent_execution_id: &str,
    ) -> PersistenceResult<Vec<ExecutionRef>> {
        let select = ExecutionSelect::EventScopeByParentAndActivityId {
            parent_execution_id: parent_execution_id.to_string(),
            activity_id: activity_id.to_string(),
        };
        let rows = self.store.select_executions(&select).await?;
        debug!(query = %select, fetched = rows.len(), "Execution list query");
        Ok(reconcile(cache, rows, true))
    }

    pub async fn find_execution_count_by_query_criteria(
        &self,
        query: &ExecutionQuery,
    ) -> PersistenceResult<i64> {
        Ok(self.store.select_execution_count_by_criteria(query).await?)
    }

    pub async fn find_executions_by_query_criteria(
        &self,
        cache: &mut EntityCache,
        query: &ExecutionQuery,
        page: Page,
    ) -> PersistenceResult<Vec<ExecutionRef>> {
        let rows = self.store.select_executions_by_criteria(query, page).await?;
        Ok(reconcile(cache, rows, true))
    }

    pub async fn find_process_instance_count_by_query_criteria(
        &self,
        query: &ProcessInstanceQuery,
    ) -> PersistenceResult<i64> {
        Ok(self
            .store
            .select_process_instance_count_by_criteria(query)
            .await?)
    }

    pub async fn find_process_instances_by_query_criteria(
        &self,
        cache: &mut EntityCache,
        query: &ProcessInstanceQuery,
    ) -> PersistenceResult<Vec<ExecutionRef>> {
        let rows = self
            .store
            .select_process_instances_by_criteria(query, query.window())
            .await?;
        Ok(reconcile(cache, rows, true))
    }

    /// Process instances with their variables, paginated in memory.
    ///
    /// The store fetch is capped at the configured limit and always starts at
    /// the first row; the requested window is then applied to that list. A
    /// window that cannot contain any row returns nothing without a fetch.
    pub async fn find_process_instances_and_variables_by_query_criteria(
        &self,
        query: &ProcessInstanceQuery,
    ) -> PersistenceResult<Vec<ProcessInstanceWithVariables>> {
        let window = query.window();
        if !window.is_valid() {
            debug!(
                first_result = window.first_result,
                max_results = window.max_results,
                "Empty process instance window, skipping fetch"
            );
            return Ok(Vec::new());
        }

        let limit = i64::try_from(self.process_instance_variables_limit).unwrap_or(i64::MAX);
        let instances = self
            .store
            .select_process_instances_with_variables(query, Page::first(limit))
            .await?;
        debug!(
            fetched = instances.len(),
            limit,
            first_result = window.first_result,
            max_results = window.max_results,
            "Paginating process instances with variables in memory"
        );
        Ok(window.slice(instances))
    }

    pub async fn find_process_instance_ids_by_process_definition_id(
        &self,
        process_definition_id: &str,
    ) -> PersistenceResult<Vec<String>> {
        Ok(self
            .store
            .select_process_instance_ids_by_process_definition_id(process_definition_id)
            .await?)
    }

    /// Native query results bypass the session cache
    pub async fn find_executions_by_native_query(
        &self,
        query: &NativeQuery,
        page: Page,
    ) -> PersistenceResult<Vec<ExecutionRow>> {
        Ok(self.store.select_executions_by_native_query(query, page).await?)
    }

    /// Native query results bypass the session cache
    pub async fn find_process_instances_by_native_query(
        &self,
        query: &NativeQuery,
        page: Page,
    ) -> PersistenceResult<Vec<ExecutionRow>> {
        Ok(self.store.select_executions_by_native_query(query, page).await?)
    }

    pub async fn find_execution_count_by_native_query(&self, query: &NativeQuery) -> PersistenceResult<i64> {
        Ok(self.store.select_execution_count_by_native_query(query).await?)
    }

    /// Store-only update; cached instances keep their previous tenant
    pub async fn update_execution_tenant_id_for_deployment(
        &self,
        deployment_id: &str,
        tenant_id: &str,
    ) -> PersistenceResult<u64> {
        let updated = self
            .store
            .update_execution_tenant_id_for_deployment(deployment_id, tenant_id)
            .await?;
        debug!(
            deployment_id = %deployment_id,
            tenant_id = %tenant_id,
            updated,
            "Updated execution tenant for deployment"
        );
        Ok(updated)
    }

    /// Lock a process instance unless another holder's lock is still valid.
    ///
    /// Fails with [`PersistenceError::OptimisticLocking`] when no row was
    /// updated: the instance is locked by someone else, or does not exist.
    pub async fn update_process_instance_lock_time(
        &self,
        process_instance_id: &str,
        lock_time: DateTime<Utc>,
        expiration_time: DateTime<Utc>,
    ) -> PersistenceResult<()> {
        let updated = self
            .store
            .update_process_instance_lock_time(process_instance_id, lock_time, expiration_time)
            .await?;

        if updated == 0 {
            warn!(
                process_instance_id = %process_instance_id,
                lock_time = %lock_time,
                expiration_time = %expiration_time,
                "Could not lock process instance"
            );
            return Err(PersistenceError::optimistic_locking(
                entities::PROCESS_INSTANCE,
                process_instance_id,
                "Could not lock process instance",
            ));
        }
        Ok(())
    }

    pub async fn clear_process_instance_lock_time(&self, process_instance_id: &str) -> PersistenceResult<()> {
        let updated = self
            .store
            .clear_process_instance_lock_time(process_instance_id)
            .await?;
        debug!(process_instance_id = %process_instance_id, updated, "Cleared process instance lock");
        Ok(())
    }

    /// Run a structural query and reconcile it with the session cache
    async fn get_list<P, M>(
        &self,
        cache: &mut EntityCache,
        select: ExecutionSelect,
        matcher: &mut M,
        param: &P,
    ) -> PersistenceResult<Vec<ExecutionRef>>
    where
        P: ?Sized,
        M: CachedEntityMatcher<ExecutionEntity, P>,
    {
        let rows = self.store.select_executions(&select).await?;
        let fetched = rows.len();
        let database = reconcile(cache, rows, true);
        let result = merge_with_cache(cache, database, matcher, param);
        debug!(query = %select, fetched, returned = result.len(), "Execution list query");
        Ok(result)
    }

    /// Cache first; the store only when `check_database` is set
    async fn get_entity<P, M>(
        &self,
        cache: &mut EntityCache,
        select: ExecutionSelect,
        matcher: &M,
        param: &P,
        check_database: bool,
    ) -> PersistenceResult<Option<ExecutionRef>>
    where
        P: ?Sized,
        M: CachedEntityMatcher<ExecutionEntity, P>,
    {
        if let Some(cached) = find_in_cache_by_matcher(cache, matcher, param) {
            debug!(query = %select, "Execution cache hit");
            return Ok(Some(cached));
        }
        if !check_database {
            return Ok(None);
        }

        let rows = self.store.select_executions(&select).await?;
        Ok(rows
            .into_iter()
            .next()
            .map(|row| cache.cache_load_or_store(ExecutionEntity::from_row(row))))
    }
}

impl std::fmt::Debug for ExecutionDataManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionDataManager")
            .field("eagerly_fetch_execution_tree", &self.eagerly_fetch_execution_tree)
            .field(
                "process_instance_variables_limit",
                &self.process_instance_variables_limit,
            )
            .finish()
    }
}
