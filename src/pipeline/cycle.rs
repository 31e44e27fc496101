//! Directed cycle detection (three-color DFS, iterative).

use std::collections::HashMap;

use crate::pipeline::PipelineGraph;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum VisitState {
    /// On the current DFS path.
    OnPath,
    /// Fully explored; no cycle reachable from here.
    Done,
}

/// Returns true if `graph` contains at least one directed cycle.
///
/// Uses an explicit stack of `(node, next neighbor index)` frames instead of
/// recursion, so input depth cannot exhaust the thread stack. Neighbors that
/// are not nodes of the graph are treated as sinks.
pub fn has_cycle(graph: &PipelineGraph) -> bool {
    // Absent from the map = unvisited
    let mut state: HashMap<&str, VisitState> = HashMap::with_capacity(graph.node_count());
    let mut stack: Vec<(&str, usize)> = Vec::new();

    for start in graph.node_ids() {
        if state.contains_key(start) {
            continue;
        }

        state.insert(start, VisitState::OnPath);
        stack.push((start, 0));

        while let Some(frame) = stack.last_mut() {
            let (node, cursor) = *frame;
            let Some(next) = graph.neighbors(node).get(cursor) else {
                state.insert(node, VisitState::Done);
                stack.pop();
                continue;
            };
            frame.1 += 1;

            match state.get(next.as_str()) {
                Some(VisitState::OnPath) => {
                    log::debug!("Back edge {} -> {} closes a cycle", node, next);
                    return true;
                }
                Some(VisitState::Done) => {}
                None if graph.contains(next) => {
                    state.insert(next.as_str(), VisitState::OnPath);
                    stack.push((next.as_str(), 0));
                }
                None => {
                    state.insert(next.as_str(), VisitState::Done);
                }
            }
        }
    }

    false
}
