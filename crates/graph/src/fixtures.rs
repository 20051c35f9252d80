//! Small synthetic task graphs for tests and benches.

use crate::{AttributedGraph, Attributes};

/// `n0 -> n1 -> ...`, one node per cost.
pub fn chain(costs: &[u64]) -> AttributedGraph {
    let mut g = AttributedGraph::new("chain");
    for (i, c) in costs.iter().enumerate() {
        g.add_node(&format!("n{i}"), Attributes::with_cost(*c));
    }
    for i in 1..costs.len() {
        // endpoints exist and the cost attribute is absent
        let _ = g.add_edge(&format!("n{}", i - 1), &format!("n{i}"), Attributes::new());
    }
    g
}

/// `center -> s0..s{spokes-1}`.
pub fn star(center_cost: u64, spoke_cost: u64, spokes: usize) -> AttributedGraph {
    let mut g = AttributedGraph::new("star");
    g.add_node("center", Attributes::with_cost(center_cost));
    for i in 0..spokes {
        let s = format!("s{i}");
        g.add_node(&s, Attributes::with_cost(spoke_cost));
        let _ = g.add_edge("center", &s, Attributes::new());
    }
    g
}

/// `depth` layers of `width` unit-cost nodes, every node wired to every node
/// of the next layer.
pub fn layered(width: usize, depth: usize) -> AttributedGraph {
    let mut g = AttributedGraph::new("layered");
    for l in 0..depth {
        for i in 0..width {
            g.add_node(&format!("l{l}_{i}"), Attributes::with_cost(1));
        }
    }
    for l in 1..depth {
        for i in 0..width {
            for j in 0..width {
                let _ = g.add_edge(&format!("l{}_{i}", l - 1), &format!("l{l}_{j}"), Attributes::new());
            }
        }
    }
    g
}
