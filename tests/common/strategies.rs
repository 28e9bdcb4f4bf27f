use super::ExecutionRowBuilder;
use execution_cache::ExecutionRow;
use proptest::prelude::*;

/// Strategy for execution ids
pub fn execution_id_strategy() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9-]{0,15}"
}

/// Strategy for result windows, including out-of-range values
pub fn window_strategy() -> impl Strategy<Value = (i64, i64)> {
    (-5i64..40, -5i64..40)
}

/// Strategy for a single-instance tree: a list of parent indexes where entry
/// `i` is the parent of execution `i + 1` (execution 0 is the process instance)
pub fn tree_shape_strategy() -> impl Strategy<Value = Vec<usize>> {
    prop::collection::vec(any::<prop::sample::Index>(), 0..12).prop_map(|indexes| {
        indexes
            .into_iter()
            .enumerate()
            .map(|(position, index)| index.index(position + 1))
            .collect()
    })
}

/// Rows for a generated tree shape; the process instance is `{prefix}-0`
pub fn tree_rows(prefix: &str, shape: &[usize]) -> Vec<ExecutionRow> {
    let mut rows = vec![ExecutionRowBuilder::process_instance(&format!("{prefix}-0"), "def-generated").build()];
    for (position, parent) in shape.iter().enumerate() {
        let child = ExecutionRowBuilder::child(&format!("{prefix}-{}", position + 1), &rows[*parent]).build();
        rows.push(child);
    }
    rows
}
