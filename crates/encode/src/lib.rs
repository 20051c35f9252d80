//! Encoders from attributed task graphs to partitioner input formats.
//!
//! Both formats share one pre-pass ([`Adjacency::build`]): dense ids in
//! first-seen order and a symmetric weighted adjacency where every directed
//! input edge contributes an entry to both endpoints. Self-loops never reach
//! an encoding. The encoders differ in numbering base, node filtering and
//! record layout.

use anyhow::{bail, Context, Result};
pub use dp_graph as graph;
use graph::AttributedGraph;
use std::path::Path;
use tracing::{debug, info};

mod mapping;
pub mod metis;
pub mod scotch;

pub use mapping::{mapping_path_for, MappingError, NodeIndexMapping};
pub use metis::MetisEncoder;
pub use scotch::ScotchEncoder;

/// Undirected weighted adjacency over the included nodes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Adjacency {
    pub mapping: NodeIndexMapping,
    /// Node cost per dense position (id - base).
    pub weights: Vec<u64>,
    /// (neighbor id, edge cost) per dense position, in input edge order.
    pub neighbors: Vec<Vec<(usize, u64)>>,
    /// Input edges that were encoded (each appears twice in `neighbors`).
    pub edges: usize,
    pub self_loops_skipped: usize,
    /// Edges dropped because an endpoint was filtered out.
    pub filtered_edges: usize,
}

impl Adjacency {
    pub fn build(g: &AttributedGraph, base: usize, include: impl Fn(&str) -> bool) -> Self {
        let mut mapping = NodeIndexMapping::new(base);
        let mut weights = Vec::with_capacity(g.node_count());
        for n in g.nodes() {
            if include(&n.name) {
                mapping.insert(&n.name);
                weights.push(n.cost());
            } else {
                debug!(node = %n.name, "skipping filtered node");
            }
        }
        let mut neighbors = vec![Vec::new(); weights.len()];
        let (mut edges, mut self_loops_skipped, mut filtered_edges) = (0, 0, 0);
        for e in g.edges() {
            if e.is_self_loop() {
                self_loops_skipped += 1;
                continue;
            }
            let (Some(u), Some(v)) = (mapping.id_of(&e.source), mapping.id_of(&e.target)) else {
                filtered_edges += 1;
                continue;
            };
            neighbors[u - base].push((v, e.cost));
            neighbors[v - base].push((u, e.cost));
            edges += 1;
        }
        Self { mapping, weights, neighbors, edges, self_loops_skipped, filtered_edges }
    }
}

/// One serialized graph plus the numbering used to produce it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedGraph {
    pub format: &'static str,
    pub text: String,
    pub mapping: NodeIndexMapping,
    /// Vertex count from the header.
    pub vertices: usize,
    /// Edge count from the header (pairs for format A, arcs for format B).
    pub header_edges: usize,
}

pub trait GraphEncoder {
    fn name(&self) -> &'static str;

    /// First id handed out.
    fn base(&self) -> usize;

    /// Whether a node takes part in the encoding.
    fn include(&self, _name: &str) -> bool {
        true
    }

    /// Header edge count and full file text.
    fn render(&self, adj: &Adjacency) -> (usize, String);

    fn encode(&self, g: &AttributedGraph) -> EncodedGraph {
        let adj = Adjacency::build(g, self.base(), |n| self.include(n));
        if adj.self_loops_skipped > 0 {
            debug!(encoder = self.name(), count = adj.self_loops_skipped, "self-loops left out");
        }
        let (header_edges, text) = self.render(&adj);
        EncodedGraph {
            format: self.name(),
            text,
            vertices: adj.mapping.len(),
            header_edges,
            mapping: adj.mapping,
        }
    }

    /// Write the encoded file, creating parent directories.
    fn persist(&self, enc: &EncodedGraph, path: &Path) -> Result<()> {
        write_text(enc, path)
    }
}

pub(crate) fn write_text(enc: &EncodedGraph, path: &Path) -> Result<()> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir).with_context(|| format!("cannot create {}", dir.display()))?;
    }
    std::fs::write(path, &enc.text).with_context(|| format!("cannot write {}", path.display()))?;
    info!(
        format = enc.format,
        vertices = enc.vertices,
        edges = enc.header_edges,
        "graph file written to {}",
        path.display()
    );
    Ok(())
}

/// Encode `g` and persist it at `path`.
pub fn encode_to_path(enc: &dyn GraphEncoder, g: &AttributedGraph, path: &Path) -> Result<EncodedGraph> {
    let out = enc.encode(g);
    enc.persist(&out, path)?;
    Ok(out)
}

/// Look an encoder up by name.
pub fn build_encoder(name: &str) -> Result<Box<dyn GraphEncoder>> {
    let enc: Box<dyn GraphEncoder> = match name {
        "metis" | "a" | "format-a" => Box::new(MetisEncoder),
        "scotch" | "b" | "format-b" => Box::new(ScotchEncoder),
        other => bail!("unknown encoder '{other}'"),
    };
    Ok(enc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use graph::parse_dot;

    #[test]
    fn adjacency_is_symmetric_and_keeps_parallel_edges() {
        let g = parse_dot("digraph { a -> b [cost=2]; a -> b [cost=2]; b -> c; c -> c }").unwrap();
        let adj = Adjacency::build(&g, 1, |_| true);
        assert_eq!(adj.neighbors[0], vec![(2, 2), (2, 2)]);
        assert_eq!(adj.neighbors[1], vec![(1, 2), (1, 2), (3, 1)]);
        assert_eq!(adj.neighbors[2], vec![(2, 1)]);
        assert_eq!(adj.edges, 3);
        assert_eq!(adj.self_loops_skipped, 1);
    }

    #[test]
    fn filtered_nodes_drop_their_edges() {
        let g = parse_dot("digraph { \"node\" -> a; a -> b }").unwrap();
        let adj = Adjacency::build(&g, 0, |n| n != "node");
        assert_eq!(adj.mapping.len(), 2);
        assert_eq!(adj.mapping.id_of("a"), Some(0));
        assert_eq!(adj.filtered_edges, 1);
        assert_eq!(adj.edges, 1);
    }

    #[test]
    fn encoder_lookup() {
        assert_eq!(build_encoder("metis").unwrap().name(), "metis");
        assert_eq!(build_encoder("format-b").unwrap().base(), 0);
        let err = build_encoder("chaco").err().unwrap();
        assert!(err.to_string().contains("unknown encoder"));
    }
}
