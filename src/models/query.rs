//! # Query Criteria
//!
//! Parameter types for the structured, criteria-based and native queries the
//! data manager forwards to the store.

use super::ExecutionRow;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A window over a result list, in the engine's first-result / max-results form.
///
/// Both fields are signed: callers may pass out-of-range values, which the
/// data manager treats as "no results" rather than as an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    pub first_result: i64,
    pub max_results: i64,
}

impl Page {
    pub fn new(first_result: i64, max_results: i64) -> Self {
        Self {
            first_result,
            max_results,
        }
    }

    /// Everything from the first row, capped at `max_results`
    pub fn first(max_results: i64) -> Self {
        Self::new(0, max_results)
    }

    /// Whether the window can contain any row at all
    pub fn is_valid(&self) -> bool {
        self.first_result >= 0 && self.max_results > 0
    }

    /// Apply the window to an in-memory list
    pub fn slice<T>(&self, items: Vec<T>) -> Vec<T> {
        if !self.is_valid() {
            return Vec::new();
        }
        items
            .into_iter()
            .skip(self.first_result as usize)
            .take(self.max_results as usize)
            .collect()
    }
}

/// Filter for children of one parent positioned on any of a set of activities
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParentActivityFilter {
    pub parent_execution_id: String,
    pub activity_ids: Vec<String>,
}

/// Filter for inactive executions; absent fields do not constrain
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InactiveExecutionFilter {
    pub activity_id: Option<String>,
    pub process_instance_id: Option<String>,
}

/// Criteria for execution queries
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutionQuery {
    pub execution_id: Option<String>,
    pub parent_id: Option<String>,
    pub process_instance_id: Option<String>,
    pub root_process_instance_id: Option<String>,
    pub process_definition_id: Option<String>,
    pub activity_id: Option<String>,
    pub business_key: Option<String>,
    pub tenant_id: Option<String>,
    pub active: Option<bool>,
    pub only_process_instances: bool,
}

impl ExecutionQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn process_instance_id(mut self, process_instance_id: impl Into<String>) -> Self {
        self.process_instance_id = Some(process_instance_id.into());
        self
    }

    pub fn process_definition_id(mut self, process_definition_id: impl Into<String>) -> Self {
        self.process_definition_id = Some(process_definition_id.into());
        self
    }

    pub fn activity_id(mut self, activity_id: impl Into<String>) -> Self {
        self.activity_id = Some(activity_id.into());
        self
    }

    pub fn parent_id(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }

    pub fn tenant_id(mut self, tenant_id: impl Into<String>) -> Self {
        self.tenant_id = Some(tenant_id.into());
        self
    }

    pub fn active(mut self, active: bool) -> Self {
        self.active = Some(active);
        self
    }

    pub fn only_process_instances(mut self) -> Self {
        self.only_process_instances = true;
        self
    }

    /// Evaluate the criteria against a row (used by in-memory stores)
    pub fn matches(&self, row: &ExecutionRow) -> bool {
        eq_if_set(&self.execution_id, Some(&row.id))
            && eq_if_set(&self.parent_id, row.parent_id.as_ref())
            && eq_if_set(&self.process_instance_id, row.process_instance_id.as_ref())
            && eq_if_set(&self.root_process_instance_id, row.root_process_instance_id.as_ref())
            && eq_if_set(&self.process_definition_id, row.process_definition_id.as_ref())
            && eq_if_set(&self.activity_id, row.activity_id.as_ref())
            && eq_if_set(&self.business_key, row.business_key.as_ref())
            && eq_if_set(&self.tenant_id, row.tenant_id.as_ref())
            && self.active.map_or(true, |active| row.is_active == active)
            && (!self.only_process_instances || row.parent_id.is_none())
    }
}

/// Criteria for process instance queries (executions without a parent)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProcessInstanceQuery {
    pub process_instance_id: Option<String>,
    pub process_instance_ids: Vec<String>,
    pub process_definition_id: Option<String>,
    pub business_key: Option<String>,
    pub tenant_id: Option<String>,
    pub super_process_instance_id: Option<String>,
    pub root_process_instance_id: Option<String>,
    pub active: Option<bool>,
    pub first_result: i64,
    pub max_results: i64,
}

impl ProcessInstanceQuery {
    pub fn new() -> Self {
        Self {
            max_results: i64::from(i32::MAX),
            ..Default::default()
        }
    }

    pub fn process_definition_id(mut self, process_definition_id: impl Into<String>) -> Self {
        self.process_definition_id = Some(process_definition_id.into());
        self
    }

    pub fn business_key(mut self, business_key: impl Into<String>) -> Self {
        self.business_key = Some(business_key.into());
        self
    }

    pub fn tenant_id(mut self, tenant_id: impl Into<String>) -> Self {
        self.tenant_id = Some(tenant_id.into());
        self
    }

    pub fn page(mut self, first_result: i64, max_results: i64) -> Self {
        self.first_result = first_result;
        self.max_results = max_results;
        self
    }

    /// The requested result window
    pub fn window(&self) -> Page {
        Page::new(self.first_result, self.max_results)
    }

    /// Evaluate the criteria against a row (used by in-memory stores).
    ///
    /// `super_process_instance_of` resolves the process instance owning a
    /// super execution, which the row alone cannot answer.
    pub fn matches(
        &self,
        row: &ExecutionRow,
        super_process_instance_of: impl Fn(&str) -> Option<String>,
    ) -> bool {
        row.parent_id.is_none()
            && eq_if_set(&self.process_instance_id, Some(&row.id))
            && (self.process_instance_ids.is_empty() || self.process_instance_ids.contains(&row.id))
            && eq_if_set(&self.process_definition_id, row.process_definition_id.as_ref())
            && eq_if_set(&self.business_key, row.business_key.as_ref())
            && eq_if_set(&self.tenant_id, row.tenant_id.as_ref())
            && eq_if_set(&self.root_process_instance_id, row.root_process_instance_id.as_ref())
            && self.active.map_or(true, |active| row.is_active == active)
            && self.super_process_instance_id.as_ref().map_or(true, |expected| {
                row.super_execution_id
                    .as_deref()
                    .and_then(&super_process_instance_of)
                    .as_ref()
                    == Some(expected)
            })
    }
}

/// A process instance together with its variables
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessInstanceWithVariables {
    pub process_instance: ExecutionRow,
    pub variables: BTreeMap<String, serde_json::Value>,
}

/// A raw SQL query forwarded to the store untouched, with positional parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NativeQuery {
    pub sql: String,
    pub parameters: Vec<serde_json::Value>,
}

impl NativeQuery {
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            parameters: Vec::new(),
        }
    }

    pub fn parameter(mut self, value: serde_json::Value) -> Self {
        self.parameters.push(value);
        self
    }
}

fn eq_if_set(expected: &Option<String>, actual: Option<&String>) -> bool {
    expected.as_ref().map_or(true, |expected| actual == Some(expected))
}
