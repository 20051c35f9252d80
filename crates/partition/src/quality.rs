//! Balance of a k-way assignment over a format A graph file, and the k-sweep
//! that collects edge cut, communication volume and imbalance per k.

use crate::{parse_by_position, PartitionError};
use anyhow::{Context, Result};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::ops::RangeInclusive;
use std::path::Path;
use tracing::{info, warn};

/// Header format tokens that mean "vertex lines start with a weight".
pub const NODE_WEIGHT_FORMATS: [&str; 3] = ["1", "10", "11"];

/// The parts of a format A graph file that balance needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeightedGraphFile {
    pub nodes: usize,
    pub edges: usize,
    pub format: Option<String>,
    /// One weight per vertex line, all 1 when the file carries none.
    pub weights: Vec<u64>,
}

impl WeightedGraphFile {
    /// `%` lines are comments. After the header every line is a vertex,
    /// including blank ones (isolated vertices without weights). The weights
    /// must sum to at most `u64::MAX`.
    pub fn parse(text: &str) -> Result<Self, PartitionError> {
        let mut lines = text.lines().enumerate().filter(|(_, l)| !l.trim_start().starts_with('%'));
        let (hline, header) = lines.next().ok_or(PartitionError::MalformedGraph {
            line: 1,
            message: "missing header".into(),
        })?;
        let tokens: Vec<&str> = header.split_whitespace().collect();
        let count = |i: usize, what: &str| -> Result<usize, PartitionError> {
            tokens.get(i).and_then(|t| t.parse().ok()).ok_or_else(|| PartitionError::MalformedGraph {
                line: hline + 1,
                message: format!("header lacks a {what} count"),
            })
        };
        let nodes = count(0, "vertex")?;
        let edges = count(1, "edge")?;
        let format = tokens.get(2).map(|s| s.to_string());
        let weighted = format.as_deref().is_some_and(|f| NODE_WEIGHT_FORMATS.contains(&f));

        let mut weights = Vec::with_capacity(nodes);
        let mut total = 0u64;
        for (i, line) in lines {
            let w = if weighted {
                let tok = line.split_whitespace().next().unwrap_or_default();
                tok.parse::<u64>().map_err(|_| PartitionError::MalformedGraph {
                    line: i + 1,
                    message: format!("'{tok}' is not a vertex weight"),
                })?
            } else {
                1
            };
            total = total.checked_add(w).ok_or_else(|| PartitionError::MalformedGraph {
                line: i + 1,
                message: "vertex weights sum past 64 bits".into(),
            })?;
            weights.push(w);
        }
        if weights.len() != nodes {
            return Err(PartitionError::FormatMismatch {
                what: "graph file vertex lines",
                expected: nodes,
                found: weights.len(),
            });
        }
        Ok(Self { nodes, edges, format, weights })
    }

    pub fn read<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).with_context(|| format!("cannot read {}", path.display()))?;
        let g = Self::parse(&text).with_context(|| format!("invalid graph file {}", path.display()))?;
        Ok(g)
    }

    pub fn has_node_weights(&self) -> bool {
        self.format.as_deref().is_some_and(|f| NODE_WEIGHT_FORMATS.contains(&f))
    }

    /// Sum of vertex weights, saturating at `u64::MAX`.
    pub fn total_weight(&self) -> u64 {
        self.weights.iter().fold(0, |acc, &w| acc.saturating_add(w))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QualityReport {
    pub k: u32,
    pub group_weights: BTreeMap<u32, u64>,
    pub total_weight: u64,
    pub ideal_weight: f64,
    pub max_weight: u64,
    pub imbalance: f64,
}

impl QualityReport {
    pub fn render_text(&self) -> String {
        let mut s = String::new();
        for (g, w) in &self.group_weights {
            let _ = writeln!(s, "Group {g}: weight = {w}");
        }
        let _ = writeln!(s, "Total weight: {}", self.total_weight);
        let _ = writeln!(s, "Ideal weight: {:.3}", self.ideal_weight);
        let _ = writeln!(s, "k={}, Imbalance={:.3}", self.k, self.imbalance);
        s
    }
}

/// Group weights and imbalance of a by-position assignment.
///
/// The ideal share divides by `k`, or by the number of distinct groups if
/// the engine used more, so the ratio never drops below 1. A graph with no
/// weight at all is reported as perfectly balanced.
pub fn imbalance(graph: &WeightedGraphFile, groups: &[u32], k: u32) -> Result<QualityReport, PartitionError> {
    if groups.len() != graph.weights.len() {
        return Err(PartitionError::FormatMismatch {
            what: "assignment entries",
            expected: graph.weights.len(),
            found: groups.len(),
        });
    }
    let total_weight = graph
        .weights
        .iter()
        .try_fold(0u64, |acc, &w| acc.checked_add(w))
        .ok_or(PartitionError::WeightOverflow)?;
    // bounded by the checked total
    let mut group_weights: BTreeMap<u32, u64> = BTreeMap::new();
    for (&g, &w) in groups.iter().zip(&graph.weights) {
        *group_weights.entry(g).or_default() += w;
    }
    let max_weight = group_weights.values().copied().max().unwrap_or_default();
    let parts = (k as usize).max(group_weights.len()).max(1);
    let ideal_weight = total_weight as f64 / parts as f64;
    let imbalance = if total_weight == 0 { 1.0 } else { max_weight as f64 / ideal_weight };
    Ok(QualityReport { k, group_weights, total_weight, ideal_weight, max_weight, imbalance })
}

/// What one engine run produced for a given k.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EngineRun {
    pub edgecut: Option<u64>,
    pub comm_volume: Option<u64>,
    /// Contents of `<file>.part.<k>`, when the engine left one.
    pub assignment: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SweepPoint {
    pub k: u32,
    pub edgecut: Option<u64>,
    pub comm_volume: Option<u64>,
    pub imbalance: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SweepSeries {
    pub points: Vec<SweepPoint>,
    /// (k, reason) for every k that contributed nothing.
    pub skipped: Vec<(u32, String)>,
}

impl SweepSeries {
    pub fn edgecuts(&self) -> Vec<(u32, u64)> {
        self.points.iter().filter_map(|p| Some((p.k, p.edgecut?))).collect()
    }

    pub fn comm_volumes(&self) -> Vec<(u32, u64)> {
        self.points.iter().filter_map(|p| Some((p.k, p.comm_volume?))).collect()
    }

    pub fn imbalances(&self) -> Vec<(u32, f64)> {
        self.points.iter().filter_map(|p| Some((p.k, p.imbalance?))).collect()
    }

    /// `(metric, k, value)` for every recorded value, metric-major.
    pub fn records(&self) -> Vec<(&'static str, u32, f64)> {
        let mut out = Vec::new();
        out.extend(self.edgecuts().into_iter().map(|(k, v)| ("edgecut", k, v as f64)));
        out.extend(self.comm_volumes().into_iter().map(|(k, v)| ("comm_volume", k, v as f64)));
        out.extend(self.imbalances().into_iter().map(|(k, v)| ("imbalance", k, v)));
        out
    }

    pub fn render_text(&self) -> String {
        let mut s = String::from("k,edgecut,comm_volume,imbalance\n");
        for p in &self.points {
            let opt = |v: Option<u64>| v.map(|v| v.to_string()).unwrap_or_default();
            let imb = p.imbalance.map(|v| format!("{v:.3}")).unwrap_or_default();
            let _ = writeln!(s, "{},{},{},{}", p.k, opt(p.edgecut), opt(p.comm_volume), imb);
        }
        s
    }
}

/// Run `engine` for each k and collect what it reports.
///
/// A k whose run fails is skipped with a warning. With `require_complete`
/// a k counts only when both edge cut and communication volume came back;
/// otherwise each metric is kept on its own. Imbalance needs the assignment
/// and is dropped (with a warning) when that is missing or does not fit.
pub fn sweep<F>(graph: &WeightedGraphFile, ks: RangeInclusive<u32>, require_complete: bool, mut engine: F) -> SweepSeries
where
    F: FnMut(u32) -> Result<EngineRun>,
{
    let mut series = SweepSeries::default();
    for k in ks {
        let run = match engine(k) {
            Ok(r) => r,
            Err(e) => {
                warn!(k, "engine run failed: {e:#}");
                series.skipped.push((k, format!("{e:#}")));
                continue;
            }
        };
        if run.edgecut.is_none() {
            warn!(k, "no Edgecut found");
        }
        if run.comm_volume.is_none() {
            warn!(k, "no communication volume found");
        }
        if require_complete && (run.edgecut.is_none() || run.comm_volume.is_none()) {
            series.skipped.push((k, "incomplete engine output".into()));
            continue;
        }
        let imb = match run.assignment.as_deref() {
            None => {
                warn!(k, "missing assignment; imbalance not computed");
                None
            }
            Some(text) => match parse_by_position(text).and_then(|groups| imbalance(graph, &groups, k)) {
                Ok(q) => Some(q.imbalance),
                Err(e) => {
                    warn!(k, "assignment unusable: {e}");
                    None
                }
            },
        };
        if run.edgecut.is_none() && run.comm_volume.is_none() && imb.is_none() {
            series.skipped.push((k, "no metrics".into()));
            continue;
        }
        info!(k, edgecut = ?run.edgecut, comm_volume = ?run.comm_volume, imbalance = ?imb, "sweep point");
        series.points.push(SweepPoint { k, edgecut: run.edgecut, comm_volume: run.comm_volume, imbalance: imb });
    }
    series
}
