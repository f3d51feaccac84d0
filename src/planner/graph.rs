//! Dependency graph over one planning batch.
//!
//! Nodes are index handles into the caller's priority-ordered item slice, so
//! index order doubles as priority order. Edges point from a blocked item to
//! its blocker and only exist when both ends are in the batch; blockers that
//! are done or belong elsewhere impose nothing.
//!
//! Cycles are found with a DFS that tracks the recursion stack. Each one is
//! reported on every member and broken by dropping the edge picked by the
//! `CycleBreakPolicy`; detection reruns until the graph is acyclic.

use std::cmp::Reverse;
use std::collections::{BTreeSet, BinaryHeap, HashMap};

use crate::domain::{PlanningWarning, WarningKind};
use crate::planner::policy::{CycleBreakPolicy, CycleEdge};

/// One item as the graph sees it
#[derive(Debug, Clone, Copy)]
pub struct GraphNode<'a> {
    pub key: &'a str,
    pub score: f64,
    pub blocked_by: &'a [String],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    OnStack,
    Done,
}

#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    /// blockers[i]: items i waits for, ascending
    blockers: Vec<Vec<usize>>,
    order: Vec<usize>,
    dropped: Vec<(usize, usize)>,
}

impl DependencyGraph {
    /// Build an acyclic graph, appending a CIRCULAR_DEPENDENCY warning for
    /// every item found on a cycle.
    pub fn build(
        nodes: &[GraphNode<'_>],
        policy: &dyn CycleBreakPolicy,
        warnings: &mut Vec<PlanningWarning>,
    ) -> Self {
        let index: HashMap<&str, usize> = nodes.iter().enumerate().map(|(i, n)| (n.key, i)).collect();

        let mut blockers: Vec<Vec<usize>> = nodes
            .iter()
            .map(|node| {
                let set: BTreeSet<usize> = node
                    .blocked_by
                    .iter()
                    .filter_map(|key| index.get(key.as_str()).copied())
                    .collect();
                set.into_iter().collect()
            })
            .collect();

        let mut dropped = Vec::new();
        let mut warned = BTreeSet::new();

        while let Some(cycle) = find_cycle(&blockers) {
            let edges: Vec<(usize, usize)> = cycle
                .iter()
                .enumerate()
                .map(|(pos, &from)| (from, cycle[(pos + 1) % cycle.len()]))
                .collect();
            let views: Vec<CycleEdge<'_>> = edges
                .iter()
                .map(|&(from, to)| CycleEdge {
                    from_key: nodes[from].key,
                    from_score: nodes[from].score,
                    to_key: nodes[to].key,
                })
                .collect();
            let chosen = policy.choose(&views).min(edges.len() - 1);
            let (from, to) = edges[chosen];

            let path = cycle
                .iter()
                .chain(cycle.first())
                .map(|&i| nodes[i].key)
                .collect::<Vec<_>>()
                .join(" -> ");
            tracing::debug!(cycle = %path, from = nodes[from].key, to = nodes[to].key, "Breaking dependency cycle");

            for &member in &cycle {
                if warned.insert(member) {
                    warnings.push(PlanningWarning::new(
                        nodes[member].key,
                        WarningKind::CircularDependency,
                        format!(
                            "dependency cycle {}; ignoring {} blocked by {}",
                            path, nodes[from].key, nodes[to].key
                        ),
                    ));
                }
            }

            blockers[from].retain(|&b| b != to);
            dropped.push((from, to));
        }

        let order = topological_order(&blockers);
        Self {
            blockers,
            order,
            dropped,
        }
    }

    pub fn len(&self) -> usize {
        self.blockers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blockers.is_empty()
    }

    /// In-batch blockers of `idx` that survived cycle breaking
    pub fn blockers(&self, idx: usize) -> &[usize] {
        &self.blockers[idx]
    }

    /// True when nothing in the batch blocks `idx`
    pub fn can_start(&self, idx: usize) -> bool {
        self.blockers[idx].is_empty()
    }

    /// Blockers before the items they block; among ready items the lowest
    /// index (highest priority) goes first.
    pub fn topological_order(&self) -> &[usize] {
        &self.order
    }

    /// Edges removed to break cycles, as `(blocked, blocker)`
    pub fn dropped_edges(&self) -> &[(usize, usize)] {
        &self.dropped
    }
}

/// Returns the nodes of one cycle in edge order, if any exists.
fn find_cycle(blockers: &[Vec<usize>]) -> Option<Vec<usize>> {
    let mut marks = vec![Mark::Unvisited; blockers.len()];

    for start in 0..blockers.len() {
        if marks[start] != Mark::Unvisited {
            continue;
        }

        // (node, next edge to explore)
        let mut stack: Vec<(usize, usize)> = vec![(start, 0)];
        marks[start] = Mark::OnStack;

        while let Some(top) = stack.last_mut() {
            let node = top.0;
            if let Some(&target) = blockers[node].get(top.1) {
                top.1 += 1;
                match marks[target] {
                    Mark::OnStack => {
                        let pos = stack.iter().position(|&(n, _)| n == target).unwrap_or(0);
                        return Some(stack[pos..].iter().map(|&(n, _)| n).collect());
                    }
                    Mark::Unvisited => {
                        marks[target] = Mark::OnStack;
                        stack.push((target, 0));
                    }
                    Mark::Done => {}
                }
            } else {
                marks[node] = Mark::Done;
                stack.pop();
            }
        }
    }

    None
}

/// Kahn's algorithm with a min-heap on the index.
fn topological_order(blockers: &[Vec<usize>]) -> Vec<usize> {
    let mut pending: Vec<usize> = blockers.iter().map(Vec::len).collect();
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); blockers.len()];
    for (node, list) in blockers.iter().enumerate() {
        for &blocker in list {
            dependents[blocker].push(node);
        }
    }

    let mut ready: BinaryHeap<Reverse<usize>> = pending
        .iter()
        .enumerate()
        .filter(|(_, count)| **count == 0)
        .map(|(i, _)| Reverse(i))
        .collect();

    let mut order = Vec::with_capacity(blockers.len());
    while let Some(Reverse(node)) = ready.pop() {
        order.push(node);
        for &dependent in &dependents[node] {
            pending[dependent] -= 1;
            if pending[dependent] == 0 {
                ready.push(Reverse(dependent));
            }
        }
    }
    order
}
