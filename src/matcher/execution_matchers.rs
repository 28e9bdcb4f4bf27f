//! Matchers for the execution query shapes.

use super::{CachedEntityMatcher, SingleCachedEntityMatcher};
use crate::cache::CachedEntity;
use crate::models::{
    ExecutionEntity, ExecutionRef, InactiveExecutionFilter, ParentActivityFilter,
};

/// Executions whose parent is the given execution
#[derive(Debug, Clone, Copy, Default)]
pub struct ExecutionsByParentExecutionIdMatcher;

impl SingleCachedEntityMatcher<ExecutionEntity, str> for ExecutionsByParentExecutionIdMatcher {
    fn is_retained(&self, execution: &ExecutionEntity, parent_execution_id: &str) -> bool {
        execution.parent_id.as_deref() == Some(parent_execution_id)
    }
}

/// Child executions of a process instance, excluding the process instance itself
#[derive(Debug, Clone, Copy, Default)]
pub struct ChildExecutionsByProcessInstanceIdMatcher;

impl SingleCachedEntityMatcher<ExecutionEntity, str> for ChildExecutionsByProcessInstanceIdMatcher {
    fn is_retained(&self, execution: &ExecutionEntity, process_instance_id: &str) -> bool {
        execution.parent_id.is_some()
            && execution.process_instance_id.as_deref() == Some(process_instance_id)
    }
}

/// All executions of a process instance, the process instance included
#[derive(Debug, Clone, Copy, Default)]
pub struct ExecutionsByProcessInstanceIdMatcher;

impl SingleCachedEntityMatcher<ExecutionEntity, str> for ExecutionsByProcessInstanceIdMatcher {
    fn is_retained(&self, execution: &ExecutionEntity, process_instance_id: &str) -> bool {
        execution.process_instance_id.as_deref() == Some(process_instance_id)
    }
}

/// The process instance spawned by a super execution
#[derive(Debug, Clone, Copy, Default)]
pub struct SubProcessInstanceBySuperExecutionIdMatcher;

impl SingleCachedEntityMatcher<ExecutionEntity, str> for SubProcessInstanceBySuperExecutionIdMatcher {
    fn is_retained(&self, execution: &ExecutionEntity, super_execution_id: &str) -> bool {
        execution.super_execution_id.as_deref() == Some(super_execution_id)
    }
}

/// Every execution of a nested tree, across sub-process instance boundaries
#[derive(Debug, Clone, Copy, Default)]
pub struct ExecutionsByRootProcessInstanceIdMatcher;

impl SingleCachedEntityMatcher<ExecutionEntity, str> for ExecutionsByRootProcessInstanceIdMatcher {
    fn is_retained(&self, execution: &ExecutionEntity, root_process_instance_id: &str) -> bool {
        execution.root_process_instance_id.as_deref() == Some(root_process_instance_id)
    }
}

/// Children of one parent positioned on any of the given activities
#[derive(Debug, Clone, Copy, Default)]
pub struct ExecutionsByParentAndActivityIdsMatcher;

impl SingleCachedEntityMatcher<ExecutionEntity, ParentActivityFilter>
    for ExecutionsByParentAndActivityIdsMatcher
{
    fn is_retained(&self, execution: &ExecutionEntity, filter: &ParentActivityFilter) -> bool {
        execution.parent_id.as_deref() == Some(filter.parent_execution_id.as_str())
            && execution
                .activity_id
                .as_ref()
                .is_some_and(|activity_id| filter.activity_ids.contains(activity_id))
    }
}

/// Inactive executions, optionally narrowed to one activity and/or process instance
#[derive(Debug, Clone, Copy, Default)]
pub struct InactiveExecutionsMatcher;

impl SingleCachedEntityMatcher<ExecutionEntity, InactiveExecutionFilter> for InactiveExecutionsMatcher {
    fn is_retained(&self, execution: &ExecutionEntity, filter: &InactiveExecutionFilter) -> bool {
        !execution.is_active
            && filter
                .activity_id
                .as_ref()
                .map_or(true, |activity_id| execution.activity_id.as_ref() == Some(activity_id))
            && filter.process_instance_id.as_ref().map_or(true, |process_instance_id| {
                execution.process_instance_id.as_ref() == Some(process_instance_id)
            })
    }
}

/// Executions sharing the root process instance of one requested execution.
///
/// The root id is not part of the query; [`pre_process`] finds the requested
/// execution among the candidates (cached instances first, then store rows)
/// and records its root id once. Every [`is_retained`] call of the same query
/// compares against that recorded value.
///
/// [`pre_process`]: CachedEntityMatcher::pre_process
/// [`is_retained`]: CachedEntityMatcher::is_retained
#[derive(Debug, Clone)]
pub struct ExecutionsWithSameRootProcessInstanceIdMatcher {
    execution_id: String,
    reference_root_process_instance_id: Option<Option<String>>,
}

impl ExecutionsWithSameRootProcessInstanceIdMatcher {
    pub fn new(execution_id: impl Into<String>) -> Self {
        Self {
            execution_id: execution_id.into(),
            reference_root_process_instance_id: None,
        }
    }

    /// Root id of the requested execution, once `pre_process` located it
    pub fn reference_root_process_instance_id(&self) -> Option<&str> {
        self.reference_root_process_instance_id
            .as_ref()
            .and_then(|root| root.as_deref())
    }

    /// Whether `pre_process` found the requested execution in either pool
    pub fn found_reference(&self) -> bool {
        self.reference_root_process_instance_id.is_some()
    }

    fn locate(&self, candidate: &ExecutionRef) -> Option<Option<String>> {
        let execution = candidate.read();
        (execution.id == self.execution_id).then(|| execution.root_process_instance_id.clone())
    }
}

impl CachedEntityMatcher<ExecutionEntity, str> for ExecutionsWithSameRootProcessInstanceIdMatcher {
    fn pre_process(
        &mut self,
        database_entities: &[ExecutionRef],
        cached_entities: &[&CachedEntity<ExecutionEntity>],
    ) {
        if self.reference_root_process_instance_id.is_some() {
            return;
        }

        self.reference_root_process_instance_id = cached_entities
            .iter()
            .find_map(|cached| self.locate(cached.entity()))
            .or_else(|| database_entities.iter().find_map(|candidate| self.locate(candidate)));
    }

    fn is_retained(&self, execution: &ExecutionEntity, _execution_id: &str) -> bool {
        match self.reference_root_process_instance_id() {
            Some(root) => execution.root_process_instance_id.as_deref() == Some(root),
            None => false,
        }
    }
}
