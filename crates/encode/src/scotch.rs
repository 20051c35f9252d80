//! Format B: Scotch new-style source graph.
//!
//! ```text
//! 0
//! <numVertices> <numArcs>
//! 0 011
//! <vertexWeight> <degree> <edgeWeight> <neighborId> [...]
//! ```
//! Ids are 0-based and nodes literally named `node` are left out. Each
//! vertex lists distinct `(neighbor, weight)` pairs sorted by neighbor id;
//! `numArcs` is twice the number of distinct unordered endpoint pairs.
//! Parallel edges with different weights keep one entry per weight, so the
//! degree sum can exceed `numArcs`.
//! The mapping stays in memory with the caller.

use crate::{Adjacency, GraphEncoder};
use std::collections::{BTreeSet, HashSet};
use std::fmt::Write as _;
use tracing::warn;

/// Node name treated as a template artifact rather than a task.
pub const PLACEHOLDER_NODE: &str = "node";

#[derive(Debug, Clone, Copy, Default)]
pub struct ScotchEncoder;

impl GraphEncoder for ScotchEncoder {
    fn name(&self) -> &'static str {
        "scotch"
    }

    fn base(&self) -> usize {
        0
    }

    fn include(&self, name: &str) -> bool {
        name != PLACEHOLDER_NODE
    }

    fn render(&self, adj: &Adjacency) -> (usize, String) {
        if adj.filtered_edges > 0 {
            warn!(count = adj.filtered_edges, "edges touching '{PLACEHOLDER_NODE}' left out");
        }
        let mut pairs: HashSet<(usize, usize)> = HashSet::new();
        for (u, nbrs) in adj.neighbors.iter().enumerate() {
            for &(v, _) in nbrs {
                pairs.insert((u.min(v), u.max(v)));
            }
        }
        let num_arcs = pairs.len() * 2;

        let mut out = String::new();
        out.push_str("0\n");
        let _ = writeln!(out, "{} {}", adj.weights.len(), num_arcs);
        out.push_str("0 011\n");
        for (w, nbrs) in adj.weights.iter().zip(&adj.neighbors) {
            let distinct: BTreeSet<(usize, u64)> = nbrs.iter().copied().collect();
            let _ = write!(out, "{w} {}", distinct.len());
            for (id, ew) in distinct {
                let _ = write!(out, " {ew} {id}");
            }
            out.push('\n');
        }
        (num_arcs, out)
    }
}
