//! Everything that happens after an external partitioner has run: reading
//! its assignment, coloring the original graph by group, and measuring how
//! balanced the groups are.

pub use dp_encode::{MappingError, NodeIndexMapping};
pub use dp_graph as graph;
use thiserror::Error;

pub mod assignment;
pub mod load;
pub mod merge;
pub mod quality;

pub use assignment::{parse_by_position, parse_pairs, AssignmentFormat, PartitionAssignment};
pub use load::{load_by_color, render_load, ColorLoad};
pub use merge::{build_strategy, merge_partition, ColorStrategy, FirstSeenColors, GroupModuloColors, MergeReport};
pub use quality::{imbalance, sweep, EngineRun, QualityReport, SweepPoint, SweepSeries, WeightedGraphFile};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PartitionError {
    /// Counts or ids that do not line up with the encoded graph.
    #[error("format mismatch: {what} (expected {expected}, found {found})")]
    FormatMismatch {
        what: &'static str,
        expected: usize,
        found: usize,
    },
    #[error("assignment line {line}: '{text}' is not a group index")]
    MalformedLine { line: usize, text: String },
    #[error("graph file line {line}: {message}")]
    MalformedGraph { line: usize, message: String },
    #[error("vertex weights sum past 64 bits")]
    WeightOverflow,
    #[error(transparent)]
    Mapping(#[from] MappingError),
}
