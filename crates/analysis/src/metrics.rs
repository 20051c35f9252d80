//! DAG metrics report.
//! All values are pure functions of the input graph.

use crate::dag::Dag;
use crate::AnalysisError;
use dp_graph::AttributedGraph;
use serde::Serialize;
use std::fmt::Write as _;

/// One topological generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Stage {
    pub nodes: Vec<String>,
    /// Sum of node costs in this stage.
    pub cost: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Slackness {
    pub processors: u32,
    /// work / (processors * span)
    pub value: f64,
}

/// Parallel structure of a task DAG.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DagMetrics {
    /// Number of nodes.
    pub node_count: usize,
    /// Edges left after self-loop removal.
    pub edge_count: usize,
    pub self_loops_removed: usize,
    /// Sum of node costs.
    pub work: u64,
    /// Total node cost along the critical path, never below 1.
    pub span: u64,
    /// Node names along a maximum-cost path; empty for an empty graph.
    pub critical_path: Vec<String>,
    /// Earliest-layer generations.
    pub stages: Vec<Stage>,
    /// Largest stage size (0 for an empty graph).
    pub max_parallel: usize,
    /// work / span.
    pub parallelism_ratio: f64,
    pub slackness: Vec<Slackness>,
}

/// work / (P * span). `processors` and `span` are expected to be at least 1;
/// [`compute_metrics`] rejects a zero processor count before calling this.
pub fn slackness(work: u64, span: u64, processors: u32) -> f64 {
    work as f64 / (f64::from(processors) * span as f64)
}

/// Compute every metric for `g`.
///
/// Semantics:
/// - Self-loops are dropped before the acyclicity check.
/// - An empty critical path (empty graph) or a zero-cost one reports span 1.
/// - Stage membership lists nodes in first-seen order.
/// - A zero processor count or a cost total past `u64::MAX` is an error.
pub fn compute_metrics(g: &AttributedGraph, processors: &[u32]) -> Result<DagMetrics, AnalysisError> {
    if processors.contains(&0) {
        return Err(AnalysisError::ZeroProcessors);
    }
    let dag = Dag::new(g)?;
    let work = dag.work();

    let stages: Vec<Stage> = dag
        .generations()
        .into_iter()
        .map(|layer| Stage {
            cost: layer.iter().map(|&i| dag.cost(i)).sum(),
            nodes: layer.iter().map(|&i| dag.name(i).to_string()).collect(),
        })
        .collect();
    let max_parallel = stages.iter().map(|s| s.nodes.len()).max().unwrap_or(0);

    let (path, span) = dag.critical_path();
    let (critical_path, span) = if path.is_empty() {
        (Vec::new(), 1)
    } else {
        (path.iter().map(|&i| dag.name(i).to_string()).collect(), span.max(1))
    };

    Ok(DagMetrics {
        node_count: dag.node_count(),
        edge_count: dag.edge_count(),
        self_loops_removed: dag.self_loops_removed(),
        work,
        span,
        critical_path,
        stages,
        max_parallel,
        parallelism_ratio: work as f64 / span as f64,
        slackness: processors
            .iter()
            .map(|&p| Slackness { processors: p, value: slackness(work, span, p) })
            .collect(),
    })
}

impl DagMetrics {
    /// Human-readable report.
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Total nodes: {}", self.node_count);
        let _ = writeln!(out, "Work (sum of node costs): {}", self.work);
        let _ = writeln!(out, "Span (critical path cost): {}", self.span);
        let _ = writeln!(out, "Max parallel width (stage size): {}", self.max_parallel);
        let _ = writeln!(out, "Parallelism Ratio: {:.2}", self.parallelism_ratio);
        for s in &self.slackness {
            let _ = writeln!(out, "Slackness @ P={:>2}: {:.2}", s.processors, s.value);
        }
        out.push('\n');
        out.push_str("Critical path:\n");
        let _ = writeln!(out, "{}", self.critical_path.join(" -> "));
        out.push('\n');
        out.push_str("Parallel Stages (with cost):\n");
        for (i, s) in self.stages.iter().enumerate() {
            let _ = writeln!(out, "  Stage {i}: {} nodes, total cost = {}", s.nodes.len(), s.cost);
        }
        out
    }
}
