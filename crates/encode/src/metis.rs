//! Format A: METIS-style compact adjacency.
//!
//! ```text
//! <numNodes> <numEdges> 11
//! <nodeWeight> <neighborId> <edgeWeight> [<neighborId> <edgeWeight> ...]
//! ```
//! Ids are 1-based. `numEdges` counts every encoded input edge once; parallel
//! edges are kept. The id -> name mapping is persisted next to the file.

use crate::{mapping_path_for, Adjacency, EncodedGraph, GraphEncoder};
use anyhow::Result;
use std::fmt::Write as _;
use std::path::Path;
use tracing::info;

/// Header flag: node weights and edge weights present.
pub const FORMAT_FLAG: &str = "11";

#[derive(Debug, Clone, Copy, Default)]
pub struct MetisEncoder;

impl GraphEncoder for MetisEncoder {
    fn name(&self) -> &'static str {
        "metis"
    }

    fn base(&self) -> usize {
        1
    }

    fn render(&self, adj: &Adjacency) -> (usize, String) {
        let records: usize = adj.neighbors.iter().map(Vec::len).sum();
        let num_edges = records / 2;
        let mut out = String::new();
        let _ = writeln!(out, "{} {} {FORMAT_FLAG}", adj.weights.len(), num_edges);
        for (w, nbrs) in adj.weights.iter().zip(&adj.neighbors) {
            out.push_str(&w.to_string());
            for (id, ew) in nbrs {
                let _ = write!(out, " {id} {ew}");
            }
            out.push('\n');
        }
        (num_edges, out)
    }

    /// Writes the graph file and `<path>.mapping.json`.
    fn persist(&self, enc: &EncodedGraph, path: &Path) -> Result<()> {
        crate::write_text(enc, path)?;
        let side = mapping_path_for(path);
        enc.mapping.write_json(&side)?;
        info!("mapping file written to {}", side.display());
        Ok(())
    }
}
