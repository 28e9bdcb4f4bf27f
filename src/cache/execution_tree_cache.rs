//! # Execution Tree Cache
//!
//! Populates the session cache with a whole execution tree at once.
//!
//! ## Root Finding
//!
//! Starting from any execution, the walk follows [`AncestorEdge`]s (process
//! instance, then super execution, then parent) until it reaches an execution
//! that is its own process instance and has no super execution. Each step
//! moves strictly closer to that root, so a well-formed tree always
//! terminates; a node without any edge that is not its own process instance
//! is a corrupt tree and aborts the operation.
//!
//! ## Population
//!
//! From the root the tree is walked depth-first: each execution is cached,
//! then its children, then its sub-process instance (the root of a nested
//! tree). A per-pass visited set guarantees every execution is handled once.

use super::EntityCache;
use crate::error::{PersistenceError, PersistenceResult};
use crate::models::{AncestorEdge, ExecutionEntity, ExecutionRef};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::debug;

/// Tree-aware view over a session's [`EntityCache`]
pub struct ExecutionTreeCache<'a> {
    cache: &'a mut EntityCache,
}

impl<'a> ExecutionTreeCache<'a> {
    pub fn new(cache: &'a mut EntityCache) -> Self {
        Self { cache }
    }

    /// Cache every execution reachable from the root of `execution`'s tree.
    ///
    /// Returns the resolved root. Executions already cached are kept as they
    /// are, so repopulating a cached tree changes nothing.
    pub fn populate_from_root(&mut self, execution: &ExecutionRef) -> PersistenceResult<ExecutionRef> {
        let root = self.find_root_process_instance_execution(execution)?;

        let mut visited = HashSet::new();
        let before = self.cache.count::<ExecutionEntity>();
        self.add_execution_tree(&root, &mut visited);
        let root_id = root.read().id.clone();
        self.cache.mark_tree_populated(root_id);

        debug!(
            root_execution_id = %root.read().id,
            visited = visited.len(),
            newly_cached = self.cache.count::<ExecutionEntity>() - before,
            "Populated execution tree cache"
        );
        Ok(root)
    }

    /// Cache-only lookup; never falls back to storage
    pub fn get(&self, execution_id: &str) -> Option<ExecutionRef> {
        self.cache.find_in_cache::<ExecutionEntity>(execution_id)
    }

    /// Walk up from `execution` to the root process instance of the whole nested tree
    pub fn find_root_process_instance_execution(
        &self,
        execution: &ExecutionRef,
    ) -> PersistenceResult<ExecutionRef> {
        let mut current = Arc::clone(execution);
        let mut walked = HashSet::new();

        loop {
            let (id, edge, is_process_instance) = {
                let node = current.read();
                (node.id.clone(), node.ancestor_edge(), node.is_process_instance())
            };

            if !walked.insert(id.clone()) {
                return Err(PersistenceError::invalid_execution_tree(
                    id,
                    "ancestor edges form a cycle",
                ));
            }

            let target_id = match edge.target_id() {
                Some(target_id) => target_id.to_string(),
                None if is_process_instance => return Ok(current),
                None => {
                    return Err(PersistenceError::invalid_execution_tree(
                        id,
                        "no process instance, super execution or parent id",
                    ))
                }
            };

            let ancestor = self.resolve_ancestor(&current, &edge).ok_or_else(|| {
                PersistenceError::invalid_execution_tree(
                    id.clone(),
                    format!("{} {} is neither linked nor cached", edge.kind(), target_id),
                )
            })?;
            current = ancestor;
        }
    }

    fn resolve_ancestor(&self, execution: &ExecutionRef, edge: &AncestorEdge) -> Option<ExecutionRef> {
        let linked = execution.read().linked_ancestor(edge);
        linked.or_else(|| edge.target_id().and_then(|id| self.get(id)))
    }

    fn add_execution_tree(&mut self, execution: &ExecutionRef, visited: &mut HashSet<String>) {
        let (id, children, sub_process_instance) = {
            let node = execution.read();
            (
                node.id.clone(),
                node.children().to_vec(),
                node.sub_process_instance().cloned(),
            )
        };

        if !visited.insert(id.clone()) {
            return;
        }
        if !self.cache.contains::<ExecutionEntity>(&id) {
            self.cache.put(Arc::clone(execution), true);
        }

        for child in &children {
            self.add_execution_tree(child, visited);
        }
        if let Some(sub_process_instance) = sub_process_instance {
            self.add_execution_tree(&sub_process_instance, visited);
        }
    }
}

/// Wire a flat set of executions loaded together into a tree: children under
/// their parent, sub-process instances under their super execution, and the
/// upward process instance references.
///
/// Edges pointing outside the set are left unresolved.
pub fn link_execution_tree(executions: &[ExecutionRef]) {
    let by_id: HashMap<String, &ExecutionRef> = executions
        .iter()
        .map(|execution| (execution.read().id.clone(), execution))
        .collect();

    for execution in executions {
        let (id, parent_id, super_execution_id, process_instance_id) = {
            let node = execution.read();
            (
                node.id.clone(),
                node.parent_id.clone(),
                node.super_execution_id.clone(),
                node.process_instance_id.clone(),
            )
        };

        if let Some(parent) = parent_id.as_ref().and_then(|parent_id| by_id.get(parent_id)) {
            ExecutionEntity::link_child(parent, execution);
        }
        if let Some(super_execution) = super_execution_id
            .as_ref()
            .filter(|super_execution_id| **super_execution_id != id)
            .and_then(|super_execution_id| by_id.get(super_execution_id))
        {
            ExecutionEntity::link_sub_process_instance(super_execution, execution);
        }
        if let Some(process_instance) = process_instance_id
            .as_ref()
            .filter(|process_instance_id| **process_instance_id != id)
            .and_then(|process_instance_id| by_id.get(process_instance_id))
        {
            ExecutionEntity::link_process_instance(execution, process_instance);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ExecutionRow;
    use parking_lot::RwLock;

    fn node(id: &str, parent: Option<&str>, process_instance: Option<&str>, super_execution: Option<&str>) -> ExecutionRef {
        Arc::new(RwLock::new(ExecutionEntity::from_row(ExecutionRow {
            id: id.to_string(),
            revision: 1,
            parent_id: parent.map(str::to_string),
            process_instance_id: process_instance.map(str::to_string),
            super_execution_id: super_execution.map(str::to_string),
            root_process_instance_id: Some("R".to_string()),
            is_active: true,
            ..Default::default()
        })))
    }

    /// R { C1, C2 { S { C3 } } } where S is a sub-process instance spawned by C2
    fn nested_tree() -> Vec<ExecutionRef> {
        let tree = vec![
            node("R", None, Some("R"), None),
            node("C1", Some("R"), Some("R"), None),
            node("C2", Some("R"), Some("R"), None),
            node("S", None, Some("S"), Some("C2")),
            node("C3", Some("S"), Some("S"), None),
        ];
        link_execution_tree(&tree);
        tree
    }

    fn ids(cache: &EntityCache) -> Vec<String> {
        let mut ids: Vec<String> = cache
            .find_all::<ExecutionEntity>()
            .iter()
            .map(|e| e.read().id.clone())
            .collect();
        ids.sort();
        ids
    }

    #[test]
    fn test_populate_from_nested_leaf_caches_whole_tree() {
        let tree = nested_tree();
        let mut cache = EntityCache::new();
        let mut tree_cache = ExecutionTreeCache::new(&mut cache);

        let root = tree_cache.populate_from_root(&tree[4]).unwrap();
        assert!(Arc::ptr_eq(&root, &tree[0]));

        for id in ["R", "C1", "C2", "S", "C3"] {
            assert!(tree_cache.get(id).is_some(), "{id} should be cached");
        }
        assert!(tree_cache.get("unrelated").is_none());
        assert_eq!(ids(&cache), vec!["C1", "C2", "C3", "R", "S"]);
        assert!(cache.is_tree_populated("R"));
        assert!(!cache.is_tree_populated("S"));
    }

    #[test]
    fn test_populate_keeps_identity() {
        let tree = nested_tree();
        let mut cache = EntityCache::new();
        ExecutionTreeCache::new(&mut cache).populate_from_root(&tree[1]).unwrap();

        for execution in &tree {
            let id = execution.read().id.clone();
            let cached = cache.find_in_cache::<ExecutionEntity>(&id).unwrap();
            assert!(Arc::ptr_eq(&cached, execution));
        }
    }

    #[test]
    fn test_repopulating_is_a_no_op() {
        let tree = nested_tree();
        let mut cache = EntityCache::new();
        ExecutionTreeCache::new(&mut cache).populate_from_root(&tree[0]).unwrap();
        let first: Vec<ExecutionRef> = cache.find_all::<ExecutionEntity>();

        ExecutionTreeCache::new(&mut cache).populate_from_root(&tree[3]).unwrap();
        let second: Vec<ExecutionRef> = cache.find_all::<ExecutionEntity>();

        assert_eq!(first.len(), second.len());
        for (a, b) in first.iter().zip(second.iter()) {
            assert!(Arc::ptr_eq(a, b));
        }
    }

    #[test]
    fn test_only_reachable_nodes_are_cached() {
        let mut tree = nested_tree();
        let stranger = node("X", None, Some("X"), None);
        tree.push(Arc::clone(&stranger));

        let mut cache = EntityCache::new();
        ExecutionTreeCache::new(&mut cache).populate_from_root(&tree[2]).unwrap();
        assert!(!cache.contains::<ExecutionEntity>("X"));
        assert_eq!(cache.count::<ExecutionEntity>(), 5);
    }

    #[test]
    fn test_node_without_ancestor_edge_is_fatal() {
        let broken = node("B", None, None, None);
        let mut cache = EntityCache::new();
        let err = ExecutionTreeCache::new(&mut cache)
            .populate_from_root(&broken)
            .unwrap_err();

        assert!(matches!(
            err,
            PersistenceError::InvalidExecutionTree { ref execution_id, .. } if execution_id == "B"
        ));
        assert!(cache.is_empty());
        assert!(!cache.is_tree_populated("B"));
    }

    #[test]
    fn test_unresolvable_ancestor_is_fatal() {
        let orphan = node("C9", Some("gone"), Some("gone"), None);
        let mut cache = EntityCache::new();
        let err = ExecutionTreeCache::new(&mut cache)
            .populate_from_root(&orphan)
            .unwrap_err();
        assert!(err.to_string().contains("process instance gone"));
    }

    #[test]
    fn test_ancestor_cycle_is_fatal() {
        let a = node("A", Some("B"), None, None);
        let b = node("B", Some("A"), None, None);
        link_execution_tree(&[Arc::clone(&a), Arc::clone(&b)]);

        let mut cache = EntityCache::new();
        let err = ExecutionTreeCache::new(&mut cache)
            .find_root_process_instance_execution(&a)
            .unwrap_err();
        assert!(err.to_string().contains("cycle"));
    }

    #[test]
    fn test_ancestor_resolved_through_cache_when_not_linked() {
        let mut cache = EntityCache::new();
        let root = cache.put(node("R", None, Some("R"), None), true);
        let detached_child = node("C1", Some("R"), Some("R"), None);

        let resolved = ExecutionTreeCache::new(&mut cache)
            .find_root_process_instance_execution(&detached_child)
            .unwrap();
        assert!(Arc::ptr_eq(&resolved, &root));
    }

    #[test]
    fn test_child_re_entry_is_guarded() {
        let root = node("R", None, Some("R"), None);
        let child = node("C1", Some("R"), Some("R"), None);
        link_execution_tree(&[Arc::clone(&root), Arc::clone(&child)]);
        // a malformed back edge: the child claims the root as its sub-process instance
        ExecutionEntity::link_sub_process_instance(&child, &root);

        let mut cache = EntityCache::new();
        ExecutionTreeCache::new(&mut cache).populate_from_root(&root).unwrap();
        assert_eq!(cache.count::<ExecutionEntity>(), 2);
    }
}
