use super::{QueryBuilder, SqlValue};
use crate::constants::tables;
use crate::models::{ExecutionQuery, ProcessInstanceQuery};
use crate::store::ExecutionSelect;

fn executions() -> QueryBuilder {
    QueryBuilder::new(&format!("{} e", tables::EXECUTIONS)).select(&["e.*"])
}

/// Execution query scopes, one per structural lookup and criteria query
pub struct ExecutionScopes;

impl ExecutionScopes {
    /// Scope for one structural select, ordered by id
    pub fn select(select: &ExecutionSelect) -> QueryBuilder {
        let query = match select {
            ExecutionSelect::ById(id) => executions().where_eq("e.id", id.as_str()),
            ExecutionSelect::WithSameRootProcessInstanceId(execution_id) => executions().where_exists(
                &format!(
                    "SELECT 1 FROM {} r WHERE r.id = ? \
                     AND r.root_process_instance_id = e.root_process_instance_id",
                    tables::EXECUTIONS
                ),
                vec![execution_id.as_str().into()],
            ),
            ExecutionSelect::ByParentExecutionId(parent_id) => {
                executions().where_eq("e.parent_id", parent_id.as_str())
            }
            ExecutionSelect::ChildExecutionsByProcessInstanceId(process_instance_id) => executions()
                .where_eq("e.process_instance_id", process_instance_id.as_str())
                .where_not_null("e.parent_id"),
            ExecutionSelect::ByRootProcessInstanceId(root) => {
                executions().where_eq("e.root_process_instance_id", root.as_str())
            }
            ExecutionSelect::ByProcessInstanceId(process_instance_id) => {
                executions().where_eq("e.process_instance_id", process_instance_id.as_str())
            }
            ExecutionSelect::SubProcessInstanceBySuperExecutionId(super_execution_id) => {
                executions().where_eq("e.super_execution_id", super_execution_id.as_str())
            }
            ExecutionSelect::ByParentAndActivityIds(filter) => executions()
                .where_eq("e.parent_id", filter.parent_execution_id.as_str())
                .where_in(
                    "e.activity_id",
                    filter.activity_ids.iter().map(|id| id.as_str().into()).collect(),
                ),
            ExecutionSelect::Inactive(filter) => executions()
                .where_eq("e.is_active", false)
                .where_eq_opt("e.activity_id", filter.activity_id.as_ref())
                .where_eq_opt("e.process_instance_id", filter.process_instance_id.as_ref()),
            ExecutionSelect::EventScopeByParentAndActivityId {
                parent_execution_id,
                activity_id,
            } => executions()
                .where_eq("e.parent_id", parent_execution_id.as_str())
                .where_eq("e.activity_id", activity_id.as_str())
                .where_eq("e.is_event_scope", true),
        };
        query.order_asc("e.id")
    }

    /// Criteria query over all executions
    pub fn by_criteria(criteria: &ExecutionQuery) -> QueryBuilder {
        let mut query = executions()
            .where_eq_opt("e.id", criteria.execution_id.as_ref())
            .where_eq_opt("e.parent_id", criteria.parent_id.as_ref())
            .where_eq_opt("e.process_instance_id", criteria.process_instance_id.as_ref())
            .where_eq_opt("e.root_process_instance_id", criteria.root_process_instance_id.as_ref())
            .where_eq_opt("e.process_definition_id", criteria.process_definition_id.as_ref())
            .where_eq_opt("e.activity_id", criteria.activity_id.as_ref())
            .where_eq_opt("e.business_key", criteria.business_key.as_ref())
            .where_eq_opt("e.tenant_id", criteria.tenant_id.as_ref());

        if let Some(active) = criteria.active {
            query = query.where_eq("e.is_active", active);
        }
        if criteria.only_process_instances {
            query = query.where_null("e.parent_id");
        }
        query.order_asc("e.id")
    }
}

/// Process instance query scopes (executions without a parent)
pub struct ProcessInstanceScopes;

impl ProcessInstanceScopes {
    pub fn by_criteria(criteria: &ProcessInstanceQuery) -> QueryBuilder {
        let mut query = executions()
            .where_null("e.parent_id")
            .where_eq_opt("e.id", criteria.process_instance_id.as_ref())
            .where_eq_opt("e.process_definition_id", criteria.process_definition_id.as_ref())
            .where_eq_opt("e.business_key", criteria.business_key.as_ref())
            .where_eq_opt("e.tenant_id", criteria.tenant_id.as_ref())
            .where_eq_opt("e.root_process_instance_id", criteria.root_process_instance_id.as_ref());

        if !criteria.process_instance_ids.is_empty() {
            query = query.where_in(
                "e.id",
                criteria
                    .process_instance_ids
                    .iter()
                    .map(|id| SqlValue::from(id.as_str()))
                    .collect(),
            );
        }
        if let Some(active) = criteria.active {
            query = query.where_eq("e.is_active", active);
        }
        if let Some(super_process_instance_id) = &criteria.super_process_instance_id {
            query = query.where_exists(
                &format!(
                    "SELECT 1 FROM {} s WHERE s.id = e.super_execution_id AND s.process_instance_id = ?",
                    tables::EXECUTIONS
                ),
                vec![super_process_instance_id.as_str().into()],
            );
        }
        query.order_asc("e.id")
    }

    /// Process instances joined with their own variables, one row per variable
    pub fn with_variables(criteria: &ProcessInstanceQuery) -> QueryBuilder {
        Self::by_criteria(criteria)
            .select(&["e.*", "v.name AS variable_name", "v.value AS variable_value"])
            .left_join(
                &format!("{} v", tables::VARIABLES),
                "v.execution_id = e.id",
            )
            .order_asc("v.name")
    }

    pub fn ids_by_process_definition_id(process_definition_id: &str) -> QueryBuilder {
        QueryBuilder::new(&format!("{} e", tables::EXECUTIONS))
            .select(&["e.id"])
            .where_null("e.parent_id")
            .where_eq("e.process_definition_id", process_definition_id)
            .order_asc("e.id")
    }
}
