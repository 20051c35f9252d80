//! Static DAG metrics over attributed task graphs: work, span, critical path,
//! topological stages, parallelism ratio and slackness.

pub use dp_graph as graph;
pub mod dag;
pub mod metrics;

pub use dag::Dag;
pub use metrics::{compute_metrics, DagMetrics, Slackness, Stage};

#[cfg(feature = "telemetry")]
use dp_telemetry as telemetry;

/// Processor counts reported when the caller supplies none.
pub const DEFAULT_PROCESSORS: [u32; 7] = [1, 2, 4, 8, 16, 32, 64];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AnalysisError {
    /// The graph still has a cycle after self-loop removal.
    #[error("the input graph is not a DAG (cycle through node '{node}')")]
    Cycle { node: String },
    /// Node costs sum past `u64::MAX`.
    #[error("total node cost does not fit in 64 bits")]
    CostOverflow,
    #[error("processor count must be at least 1")]
    ZeroProcessors,
}

/// Analyze with [`DEFAULT_PROCESSORS`].
pub fn analyze(g: &graph::AttributedGraph) -> Result<DagMetrics, AnalysisError> {
    analyze_with(g, &DEFAULT_PROCESSORS)
}

/// Analyze, reporting slackness for each of `processors`.
///
/// With the `telemetry` feature and `DAGPART_PROFILE_JSONL` set, the elapsed
/// time and the work total are appended to that JSONL file.
pub fn analyze_with(g: &graph::AttributedGraph, processors: &[u32]) -> Result<DagMetrics, AnalysisError> {
    #[cfg(feature = "telemetry")]
    let app = std::env::var("DAGPART_PROFILE_JSONL")
        .ok()
        .and_then(|p| telemetry::profiling::Appender::open(p).ok());

    #[cfg(feature = "telemetry")]
    let graph_name = g.name.clone().unwrap_or_default();
    #[cfg(feature = "telemetry")]
    let _timer = app
        .as_ref()
        .map(|a| a.start_timer("analysis.analyze_ms", telemetry::labels::graph(&graph_name)));

    let m = compute_metrics(g, processors)?;

    #[cfg(feature = "telemetry")]
    if let Some(a) = &app {
        let _ = a.counter("analysis.work", m.work as f64, telemetry::labels::graph(&graph_name));
    }
    Ok(m)
}
