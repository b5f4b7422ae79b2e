//! Deterministic emission order.
//!
//! Kahn's algorithm over the dependency graph. When several declarations
//! are ready at once, the one with the smallest path goes first, so the
//! order only depends on the graph and never on insertion or hashing.

use std::cmp::Reverse;
use std::collections::{BTreeMap, BTreeSet, BinaryHeap, VecDeque};
use std::fmt;

use strata_core::ConstructPath;
use tracing::debug;

use crate::error::GraphError;
use crate::graph::DependencyGraph;

/// Kahn's algorithm stopped with declarations left over.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleError {
    /// Shortest cycle in the residual graph, closed: the first path is
    /// repeated at the end. Each consecutive pair is an edge.
    pub cycle: Vec<ConstructPath>,
    /// Every declaration that could not be ordered.
    pub residual: Vec<ConstructPath>,
}

impl CycleError {
    /// Number of distinct declarations on the cycle.
    pub fn len(&self) -> usize {
        self.cycle.len().saturating_sub(1)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn describe(&self) -> String {
        self.cycle
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(" -> ")
    }
}

impl fmt::Display for CycleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Cyclic dependency: {}", self.describe())
    }
}

impl std::error::Error for CycleError {}

impl From<CycleError> for GraphError {
    fn from(err: CycleError) -> Self {
        GraphError::CyclicDependency {
            cycle: err.cycle.iter().map(ToString::to_string).collect(),
        }
    }
}

/// Order declarations so that every dependency comes before its dependents.
pub fn topological_order(graph: &DependencyGraph) -> Result<Vec<ConstructPath>, CycleError> {
    // Unresolved dependency count per declaration, and the reverse edges.
    let mut pending: BTreeMap<&ConstructPath, usize> =
        graph.nodes().iter().map(|path| (path, 0)).collect();
    let mut dependents: BTreeMap<&ConstructPath, Vec<&ConstructPath>> = BTreeMap::new();

    for (from, to, _) in graph.edges() {
        if !graph.contains(from) || !graph.contains(to) {
            continue;
        }
        *pending.entry(from).or_default() += 1;
        dependents.entry(to).or_default().push(from);
    }

    let mut ready: BinaryHeap<Reverse<&ConstructPath>> = pending
        .iter()
        .filter(|(_, count)| **count == 0)
        .map(|(path, _)| Reverse(*path))
        .collect();

    let mut ordered = Vec::with_capacity(pending.len());
    while let Some(Reverse(path)) = ready.pop() {
        ordered.push(path.clone());
        for dependent in dependents.get(path).into_iter().flatten() {
            if let Some(count) = pending.get_mut(dependent) {
                *count -= 1;
                if *count == 0 {
                    ready.push(Reverse(*dependent));
                }
            }
        }
    }

    if ordered.len() == pending.len() {
        debug!(declarations = ordered.len(), "Computed emission order");
        return Ok(ordered);
    }

    let placed: BTreeSet<&ConstructPath> = ordered.iter().collect();
    let residual: BTreeSet<&ConstructPath> = pending
        .keys()
        .filter(|path| !placed.contains(*path))
        .copied()
        .collect();

    let cycle = shortest_cycle(graph, &residual).unwrap_or_default();
    Err(CycleError {
        cycle,
        residual: residual.into_iter().cloned().collect(),
    })
}

/// Shortest cycle among `residual`, searched breadth-first from each node
/// in path order. Ties keep the cycle found first.
fn shortest_cycle(
    graph: &DependencyGraph,
    residual: &BTreeSet<&ConstructPath>,
) -> Option<Vec<ConstructPath>> {
    let mut best: Option<Vec<ConstructPath>> = None;

    for start in residual {
        let bound = best.as_ref().map(Vec::len);
        if let Some(cycle) = cycle_through(graph, residual, start, bound) {
            best = Some(cycle);
        }
    }

    best
}

/// Shortest cycle through `start`, if shorter than `bound` (closed length).
fn cycle_through(
    graph: &DependencyGraph,
    residual: &BTreeSet<&ConstructPath>,
    start: &ConstructPath,
    bound: Option<usize>,
) -> Option<Vec<ConstructPath>> {
    let mut parents: BTreeMap<&ConstructPath, &ConstructPath> = BTreeMap::new();
    let mut queue: VecDeque<(&ConstructPath, usize)> = VecDeque::new();
    queue.push_back((start, 0));

    while let Some((current, depth)) = queue.pop_front() {
        // A cycle closing here has depth + 2 entries, start repeated.
        if bound.is_some_and(|bound| depth + 2 >= bound) {
            return None;
        }
        for next in graph.successors(current) {
            if !residual.contains(next) {
                continue;
            }
            if next == start {
                let mut cycle = vec![start.clone()];
                let mut back = Vec::new();
                let mut cursor = current;
                while cursor != start {
                    back.push(cursor.clone());
                    cursor = parents[cursor];
                }
                cycle.extend(back.into_iter().rev());
                cycle.push(start.clone());
                return Some(cycle);
            }
            if !parents.contains_key(next) {
                parents.insert(next, current);
                queue.push_back((next, depth + 1));
            }
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(s: &str) -> ConstructPath {
        ConstructPath::parse(s)
    }

    fn graph(nodes: &[&str], edges: &[(&str, &str)]) -> DependencyGraph {
        let mut graph = DependencyGraph::with_nodes(nodes.iter().map(|n| path(n)));
        for (from, to) in edges {
            graph.add_edge(path(from), path(to), false);
        }
        graph
    }

    fn names(paths: &[ConstructPath]) -> Vec<String> {
        paths.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn test_dependency_comes_first() {
        let g = graph(&["/A", "/B"], &[("/A", "/B")]);
        assert_eq!(names(&g.topological_order().unwrap()), vec!["/B", "/A"]);
    }

    #[test]
    fn test_ties_break_on_smallest_path() {
        let g = graph(&["/c", "/a", "/b", "/x-y", "/x/y"], &[]);
        assert_eq!(
            names(&g.topological_order().unwrap()),
            vec!["/a", "/b", "/c", "/x/y", "/x-y"]
        );
    }

    #[test]
    fn test_order_respects_every_edge() {
        let g = graph(
            &["/App", "/Db", "/Vpc", "/Subnet", "/Queue"],
            &[
                ("/App", "/Db"),
                ("/App", "/Queue"),
                ("/Db", "/Subnet"),
                ("/Subnet", "/Vpc"),
            ],
        );
        let order = g.topological_order().unwrap();
        let position = |p: &str| order.iter().position(|o| o == &path(p)).unwrap();
        for (from, to, _) in g.edges() {
            let from = order.iter().position(|o| o == from).unwrap();
            let to = order.iter().position(|o| o == to).unwrap();
            assert!(to < from);
        }
        assert_eq!(position("/Queue"), 0);
        assert_eq!(position("/App"), 4);
    }

    #[test]
    fn test_three_cycle_is_reported() {
        let g = graph(&["/A", "/B", "/C"], &[("/A", "/B"), ("/B", "/C"), ("/C", "/A")]);
        let err = g.topological_order().unwrap_err();
        assert_eq!(names(&err.cycle), vec!["/A", "/B", "/C", "/A"]);
        assert_eq!(err.len(), 3);
        for pair in err.cycle.windows(2) {
            assert!(g.has_edge(&pair[0], &pair[1]));
        }
    }

    #[test]
    fn test_shortest_cycle_is_preferred() {
        // A 4-cycle and a 2-cycle sharing /B, plus a dependent of the cycle.
        let g = graph(
            &["/A", "/B", "/C", "/D", "/E", "/Z"],
            &[
                ("/A", "/B"),
                ("/B", "/C"),
                ("/C", "/D"),
                ("/D", "/A"),
                ("/C", "/B"),
                ("/Z", "/A"),
            ],
        );
        let err = g.topological_order().unwrap_err();
        assert_eq!(names(&err.cycle), vec!["/B", "/C", "/B"]);
        assert!(err.residual.contains(&path("/Z")));
        assert!(!err.residual.contains(&path("/E")));
    }

    #[test]
    fn test_self_reference_is_a_cycle_of_one() {
        let g = graph(&["/A", "/B"], &[("/A", "/A")]);
        let err = g.topological_order().unwrap_err();
        assert_eq!(names(&err.cycle), vec!["/A", "/A"]);
        assert_eq!(err.len(), 1);
    }
}
