//! # Execution Model
//!
//! One branch of concurrent control flow within a running process instance.
//!
//! ## Tree Shape
//!
//! Executions form a tree rooted at the process instance (the execution whose
//! `process_instance_id` equals its own `id`). A process instance started by a
//! call activity is itself the root of an independent tree, attached to the
//! spawning execution of the outer tree through `super_execution_id`. Every
//! execution of the nested structure shares one `root_process_instance_id`.
//!
//! ## Ownership
//!
//! Downward references (children, sub-process instance) are strong; upward
//! references (parent, process instance, super execution) are weak, so a tree
//! is dropped as soon as its root is no longer referenced.
//!
//! ## Database Schema
//!
//! Maps to the `exec_executions` table:
//! ```sql
//! CREATE TABLE exec_executions (
//!   id VARCHAR(64) PRIMARY KEY,
//!   revision INTEGER NOT NULL DEFAULT 1,
//!   parent_id VARCHAR(64),
//!   process_instance_id VARCHAR(64),
//!   super_execution_id VARCHAR(64),
//!   root_process_instance_id VARCHAR(64),
//!   -- ... other fields
//!   cached_entity_state INTEGER NOT NULL DEFAULT 0
//! );
//! ```

use super::{CachedEntityState, Entity, EntityRef};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use std::sync::{Arc, Weak};

/// Shared handle to a live execution instance
pub type ExecutionRef = EntityRef<ExecutionEntity>;

/// Flat persisted form of an execution, as read from and written to the store.
///
/// This is also the persistent-state snapshot used for dirty detection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, FromRow)]
pub struct ExecutionRow {
    pub id: String,
    pub revision: i32,
    pub parent_id: Option<String>,
    pub process_instance_id: Option<String>,
    pub super_execution_id: Option<String>,
    pub root_process_instance_id: Option<String>,
    pub process_definition_id: Option<String>,
    pub activity_id: Option<String>,
    pub business_key: Option<String>,
    pub tenant_id: Option<String>,
    pub name: Option<String>,
    pub is_active: bool,
    pub is_scope: bool,
    pub is_concurrent: bool,
    pub is_event_scope: bool,
    pub lock_time: Option<DateTime<Utc>>,
    pub cached_entity_state: i32,
}

/// The edge that brings an execution one step closer to its tree root.
///
/// Edges are resolved in a fixed priority order: process instance first, then
/// super execution, then parent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AncestorEdge {
    ProcessInstance(String),
    SuperExecution(String),
    Parent(String),
    None,
}

impl AncestorEdge {
    /// Human readable edge kind for logs and errors
    pub fn kind(&self) -> &'static str {
        match self {
            AncestorEdge::ProcessInstance(_) => "process instance",
            AncestorEdge::SuperExecution(_) => "super execution",
            AncestorEdge::Parent(_) => "parent",
            AncestorEdge::None => "none",
        }
    }

    /// Id of the execution this edge points at
    pub fn target_id(&self) -> Option<&str> {
        match self {
            AncestorEdge::ProcessInstance(id)
            | AncestorEdge::SuperExecution(id)
            | AncestorEdge::Parent(id) => Some(id),
            AncestorEdge::None => None,
        }
    }
}

/// Live, mutable execution held by the session cache.
#[derive(Default)]
pub struct ExecutionEntity {
    pub id: String,
    pub revision: i32,
    pub parent_id: Option<String>,
    pub process_instance_id: Option<String>,
    pub super_execution_id: Option<String>,
    pub root_process_instance_id: Option<String>,
    pub process_definition_id: Option<String>,
    pub activity_id: Option<String>,
    pub business_key: Option<String>,
    pub tenant_id: Option<String>,
    pub name: Option<String>,
    pub is_active: bool,
    pub is_scope: bool,
    pub is_concurrent: bool,
    pub is_event_scope: bool,
    pub lock_time: Option<DateTime<Utc>>,
    pub cached_entity_state: CachedEntityState,

    children: Vec<ExecutionRef>,
    sub_process_instance: Option<ExecutionRef>,
    parent: Weak<RwLock<ExecutionEntity>>,
    process_instance: Weak<RwLock<ExecutionEntity>>,
    super_execution: Weak<RwLock<ExecutionEntity>>,
}

impl ExecutionEntity {
    /// Create a detached execution with the given id
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            revision: 1,
            is_active: true,
            ..Default::default()
        }
    }

    /// Create a new top-level process instance, already wrapped for sharing
    pub fn new_process_instance(
        id: impl Into<String>,
        process_definition_id: impl Into<String>,
    ) -> ExecutionRef {
        let id = id.into();
        let mut execution = Self::new(id.clone());
        execution.process_instance_id = Some(id.clone());
        execution.root_process_instance_id = Some(id);
        execution.process_definition_id = Some(process_definition_id.into());
        execution.is_scope = true;
        Arc::new(RwLock::new(execution))
    }

    /// Create a child execution of `parent` and link it into the tree
    pub fn new_child(parent: &ExecutionRef, id: impl Into<String>) -> ExecutionRef {
        let mut child = Self::new(id);
        {
            let parent = parent.read();
            child.parent_id = Some(parent.id.clone());
            child.process_instance_id = parent.process_instance_id.clone();
            child.root_process_instance_id = parent.root_process_instance_id.clone();
            child.process_definition_id = parent.process_definition_id.clone();
            child.tenant_id = parent.tenant_id.clone();
            child.process_instance = parent.process_instance.clone();
        }
        let child = Arc::new(RwLock::new(child));
        Self::link_child(parent, &child);
        if child.read().process_instance.upgrade().is_none() {
            let parent_is_process_instance = parent.read().is_process_instance();
            if parent_is_process_instance {
                child.write().process_instance = Arc::downgrade(parent);
            }
        }
        child
    }

    /// Create a process instance spawned by `super_execution` (call activity)
    /// and link it as that execution's sub-process instance
    pub fn new_sub_process_instance(
        super_execution: &ExecutionRef,
        id: impl Into<String>,
        process_definition_id: impl Into<String>,
    ) -> ExecutionRef {
        let sub = Self::new_process_instance(id, process_definition_id);
        {
            let outer = super_execution.read();
            let mut sub = sub.write();
            sub.super_execution_id = Some(outer.id.clone());
            sub.root_process_instance_id = outer.root_process_instance_id.clone();
            sub.tenant_id = outer.tenant_id.clone();
        }
        Self::link_sub_process_instance(super_execution, &sub);
        sub
    }

    /// Hydrate an execution from its persisted row
    pub fn from_row(row: ExecutionRow) -> Self {
        Self {
            id: row.id,
            revision: row.revision,
            parent_id: row.parent_id,
            process_instance_id: row.process_instance_id,
            super_execution_id: row.super_execution_id,
            root_process_instance_id: row.root_process_instance_id,
            process_definition_id: row.process_definition_id,
            activity_id: row.activity_id,
            business_key: row.business_key,
            tenant_id: row.tenant_id,
            name: row.name,
            is_active: row.is_active,
            is_scope: row.is_scope,
            is_concurrent: row.is_concurrent,
            is_event_scope: row.is_event_scope,
            lock_time: row.lock_time,
            cached_entity_state: CachedEntityState::from_bits(row.cached_entity_state),
            ..Default::default()
        }
    }

    /// Flatten into the persisted row form
    pub fn to_row(&self) -> ExecutionRow {
        ExecutionRow {
            id: self.id.clone(),
            revision: self.revision,
            parent_id: self.parent_id.clone(),
            process_instance_id: self.process_instance_id.clone(),
            super_execution_id: self.super_execution_id.clone(),
            root_process_instance_id: self.root_process_instance_id.clone(),
            process_definition_id: self.process_definition_id.clone(),
            activity_id: self.activity_id.clone(),
            business_key: self.business_key.clone(),
            tenant_id: self.tenant_id.clone(),
            name: self.name.clone(),
            is_active: self.is_active,
            is_scope: self.is_scope,
            is_concurrent: self.is_concurrent,
            is_event_scope: self.is_event_scope,
            lock_time: self.lock_time,
            cached_entity_state: self.cached_entity_state.bits(),
        }
    }

    /// True when this execution is the root of its own process instance tree
    pub fn is_process_instance(&self) -> bool {
        self.process_instance_id.as_deref() == Some(self.id.as_str())
    }

    /// Resolve the edge leading towards the tree root
    pub fn ancestor_edge(&self) -> AncestorEdge {
        match (&self.process_instance_id, &self.super_execution_id, &self.parent_id) {
            (Some(process_instance_id), _, _) if *process_instance_id != self.id => {
                AncestorEdge::ProcessInstance(process_instance_id.clone())
            }
            (_, Some(super_execution_id), _) if *super_execution_id != self.id => {
                AncestorEdge::SuperExecution(super_execution_id.clone())
            }
            (_, _, Some(parent_id)) => AncestorEdge::Parent(parent_id.clone()),
            _ => AncestorEdge::None,
        }
    }

    /// The linked execution an ancestor edge points at, if it is loaded
    pub fn linked_ancestor(&self, edge: &AncestorEdge) -> Option<ExecutionRef> {
        match edge {
            AncestorEdge::ProcessInstance(_) => self.process_instance.upgrade(),
            AncestorEdge::SuperExecution(_) => self.super_execution.upgrade(),
            AncestorEdge::Parent(_) => self.parent.upgrade(),
            AncestorEdge::None => None,
        }
    }

    pub fn children(&self) -> &[ExecutionRef] {
        &self.children
    }

    pub fn sub_process_instance(&self) -> Option<&ExecutionRef> {
        self.sub_process_instance.as_ref()
    }

    pub fn parent(&self) -> Option<ExecutionRef> {
        self.parent.upgrade()
    }

    pub fn process_instance(&self) -> Option<ExecutionRef> {
        self.process_instance.upgrade()
    }

    pub fn super_execution(&self) -> Option<ExecutionRef> {
        self.super_execution.upgrade()
    }

    /// Attach `child` under `parent`; linking the same pair twice is a no-op
    pub fn link_child(parent: &ExecutionRef, child: &ExecutionRef) {
        if Arc::ptr_eq(parent, child) {
            return;
        }
        {
            let mut parent = parent.write();
            if !parent.children.iter().any(|existing| Arc::ptr_eq(existing, child)) {
                parent.children.push(Arc::clone(child));
            }
        }
        child.write().parent = Arc::downgrade(parent);
    }

    /// Attach `sub` as the sub-process instance spawned by `super_execution`
    pub fn link_sub_process_instance(super_execution: &ExecutionRef, sub: &ExecutionRef) {
        if Arc::ptr_eq(super_execution, sub) {
            return;
        }
        super_execution.write().sub_process_instance = Some(Arc::clone(sub));
        sub.write().super_execution = Arc::downgrade(super_execution);
    }

    /// Point `execution` at its process instance
    pub fn link_process_instance(execution: &ExecutionRef, process_instance: &ExecutionRef) {
        if Arc::ptr_eq(execution, process_instance) {
            return;
        }
        execution.write().process_instance = Arc::downgrade(process_instance);
    }
}

impl Entity for ExecutionEntity {
    type PersistentState = ExecutionRow;

    fn id(&self) -> &str {
        &self.id
    }

    fn persistent_state(&self) -> ExecutionRow {
        self.to_row()
    }
}

impl From<ExecutionRow> for ExecutionEntity {
    fn from(row: ExecutionRow) -> Self {
        Self::from_row(row)
    }
}

impl fmt::Debug for ExecutionEntity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let child_ids: Vec<String> = self
            .children
            .iter()
            .map(|child| child.try_read().map_or_else(|| "<locked>".to_string(), |c| c.id.clone()))
            .collect();
        let sub_process_instance_id = self
            .sub_process_instance
            .as_ref()
            .map(|sub| sub.try_read().map_or_else(|| "<locked>".to_string(), |s| s.id.clone()));

        f.debug_struct("ExecutionEntity")
            .field("id", &self.id)
            .field("parent_id", &self.parent_id)
            .field("process_instance_id", &self.process_instance_id)
            .field("super_execution_id", &self.super_execution_id)
            .field("root_process_instance_id", &self.root_process_instance_id)
            .field("activity_id", &self.activity_id)
            .field("is_active", &self.is_active)
            .field("cached_entity_state", &self.cached_entity_state)
            .field("children", &child_ids)
            .field("sub_process_instance", &sub_process_instance_id)
            .finish()
    }
}
