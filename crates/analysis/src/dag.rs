//! Acyclic view of an [`AttributedGraph`].
//!
//! Built once, after self-loop removal and an acyclicity check; every query
//! afterwards is infallible. Node indices equal first-seen positions in the
//! source graph.
//!
//! The total cost is checked once at construction. Every path and stage sum
//! is bounded by it, so later additions cannot overflow.

use crate::AnalysisError;
use dp_graph::AttributedGraph;
use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct Dag<'g> {
    names: Vec<&'g str>,
    costs: Vec<u64>,
    work: u64,
    inner: DiGraph<(), ()>,
    /// Predecessors of each node in input edge order (parallel edges repeat).
    incoming: Vec<Vec<usize>>,
    self_loops: usize,
}

impl<'g> Dag<'g> {
    /// Strip self-loops and verify acyclicity. Undirected input is read as
    /// both directions per edge, so any edge there is a cycle.
    pub fn new(g: &'g AttributedGraph) -> Result<Self, AnalysisError> {
        let names: Vec<&str> = g.nodes().map(|n| n.name.as_str()).collect();
        let costs: Vec<u64> = g.nodes().map(|n| n.cost()).collect();
        let work = costs
            .iter()
            .try_fold(0u64, |acc, &c| acc.checked_add(c))
            .ok_or(AnalysisError::CostOverflow)?;
        let mut inner = DiGraph::with_capacity(names.len(), g.edge_count());
        for _ in &names {
            inner.add_node(());
        }
        let mut incoming = vec![Vec::new(); names.len()];
        let mut self_loops = 0;
        for e in g.edges() {
            if e.is_self_loop() {
                self_loops += 1;
                continue;
            }
            let (Some(u), Some(v)) = (g.node_position(&e.source), g.node_position(&e.target)) else {
                continue;
            };
            inner.add_edge(NodeIndex::new(u), NodeIndex::new(v), ());
            incoming[v].push(u);
            if !g.directed {
                inner.add_edge(NodeIndex::new(v), NodeIndex::new(u), ());
                incoming[u].push(v);
            }
        }
        if self_loops > 0 {
            debug!(self_loops, "removed self-loop edges");
        }
        if let Err(cycle) = toposort(&inner, None) {
            return Err(AnalysisError::Cycle {
                node: names[cycle.node_id().index()].to_string(),
            });
        }
        Ok(Self { names, costs, work, inner, incoming, self_loops })
    }

    pub fn node_count(&self) -> usize {
        self.names.len()
    }

    /// Edge count after self-loop removal (both directions for undirected input).
    pub fn edge_count(&self) -> usize {
        self.inner.edge_count()
    }

    pub fn self_loops_removed(&self) -> usize {
        self.self_loops
    }

    pub fn name(&self, i: usize) -> &'g str {
        self.names[i]
    }

    pub fn cost(&self, i: usize) -> u64 {
        self.costs[i]
    }

    pub fn work(&self) -> u64 {
        self.work
    }

    /// Earliest-layer antichains by repeated removal of nodes whose remaining
    /// in-degree is zero. Each layer lists node indices in first-seen order.
    pub fn generations(&self) -> Vec<Vec<usize>> {
        let n = self.node_count();
        let mut indeg: Vec<usize> = (0..n)
            .map(|i| self.inner.neighbors_directed(NodeIndex::new(i), Direction::Incoming).count())
            .collect();
        let mut current: Vec<usize> = (0..n).filter(|&i| indeg[i] == 0).collect();
        let mut out = Vec::new();
        while !current.is_empty() {
            let mut next = Vec::new();
            for &u in &current {
                for v in self.inner.neighbors_directed(NodeIndex::new(u), Direction::Outgoing) {
                    let v = v.index();
                    indeg[v] -= 1;
                    if indeg[v] == 0 {
                        next.push(v);
                    }
                }
            }
            next.sort_unstable();
            out.push(current);
            current = next;
        }
        out
    }

    /// Longest path where each traversed edge weighs its source node's cost;
    /// the endpoint's own cost is added when choosing where the path ends.
    ///
    /// Returns the path (node indices) and the sum of node costs along it.
    /// An empty graph yields an empty path.
    pub fn critical_path(&self) -> (Vec<usize>, u64) {
        let order: Vec<usize> = self.generations().into_iter().flatten().collect();
        let n = self.node_count();
        let mut dist = vec![0u64; n];
        let mut pred: Vec<Option<usize>> = vec![None; n];
        for &v in &order {
            let mut best: Option<u64> = None;
            for &u in &self.incoming[v] {
                let d = dist[u] + self.costs[u];
                if best.map_or(true, |b| d > b) {
                    best = Some(d);
                    pred[v] = Some(u);
                }
            }
            dist[v] = best.unwrap_or(0);
        }
        let mut end: Option<(usize, u64)> = None;
        for &v in &order {
            let total = dist[v] + self.costs[v];
            if end.map_or(true, |(_, t)| total > t) {
                end = Some((v, total));
            }
        }
        let Some((mut v, span)) = end else {
            return (Vec::new(), 0);
        };
        let mut path = vec![v];
        while let Some(u) = pred[v] {
            path.push(u);
            v = u;
        }
        path.reverse();
        (path, span)
    }
}
