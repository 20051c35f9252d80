//! Color the original graph by partition group.

use crate::{NodeIndexMapping, PartitionAssignment};
use anyhow::{bail, Result};
use dp_graph::{AttributedGraph, Node};
use indexmap::IndexMap;
use tracing::{info, warn};

/// Binds group indices to colors and writes them onto nodes.
pub trait ColorStrategy {
    fn name(&self) -> &'static str;
    fn color_for(&mut self, group: u32) -> &'static str;
    fn decorate(&self, node: &mut Node, color: &'static str);
}

/// `palette[group % len]`: a group always gets the same color.
#[derive(Debug, Clone, Copy, Default)]
pub struct GroupModuloColors;

impl GroupModuloColors {
    pub const PALETTE: [&'static str; 15] = [
        "lightblue",
        "lightgreen",
        "lightcoral",
        "khaki",
        "plum",
        "lightsalmon",
        "gold",
        "lightgrey",
        "aquamarine",
        "thistle",
        "orange",
        "cyan",
        "salmon",
        "palegreen",
        "lavender",
    ];
}

impl ColorStrategy for GroupModuloColors {
    fn name(&self) -> &'static str {
        "modulo"
    }

    fn color_for(&mut self, group: u32) -> &'static str {
        Self::PALETTE[group as usize % Self::PALETTE.len()]
    }

    fn decorate(&self, node: &mut Node, color: &'static str) {
        node.attrs.set("style", "filled");
        node.attrs.set("fillcolor", color);
    }
}

/// Next palette color for each group in the order groups are met while
/// scanning nodes. Labels are reset to the node name and drawn in white.
#[derive(Debug, Clone, Default)]
pub struct FirstSeenColors {
    bound: IndexMap<u32, &'static str>,
}

impl FirstSeenColors {
    pub const PALETTE: [&'static str; 14] = [
        "red", "blue", "green", "orange", "purple", "cyan", "gold", "brown", "pink", "gray", "olive", "magenta",
        "teal", "lime",
    ];

    pub fn new() -> Self {
        Self::default()
    }
}

impl ColorStrategy for FirstSeenColors {
    fn name(&self) -> &'static str {
        "first-seen"
    }

    fn color_for(&mut self, group: u32) -> &'static str {
        let next = Self::PALETTE[self.bound.len() % Self::PALETTE.len()];
        *self.bound.entry(group).or_insert(next)
    }

    fn decorate(&self, node: &mut Node, color: &'static str) {
        node.attrs.set("fillcolor", color);
        node.attrs.set("style", "filled");
        node.attrs.set("fontcolor", "white");
        let label = node.name.clone();
        node.attrs.set("label", label);
    }
}

pub fn build_strategy(name: &str) -> Result<Box<dyn ColorStrategy>> {
    let s: Box<dyn ColorStrategy> = match name {
        "modulo" | "group-modulo" => Box::new(GroupModuloColors),
        "first-seen" | "first" => Box::new(FirstSeenColors::new()),
        other => bail!("unknown color strategy '{other}' (expected 'modulo' or 'first-seen')"),
    };
    Ok(s)
}

#[derive(Debug, Clone)]
pub struct MergeReport {
    pub graph: AttributedGraph,
    /// Nodes with no id or no group, in graph order.
    pub missing: Vec<String>,
    pub colored: usize,
    /// Group -> color, in first use.
    pub legend: IndexMap<u32, &'static str>,
}

impl MergeReport {
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty()
    }
}

/// Copy `g`, coloring every node that resolves through `mapping` to a
/// group in `assignment`. Unresolved nodes are collected, not fatal.
pub fn merge_partition(
    g: &AttributedGraph,
    assignment: &PartitionAssignment,
    mapping: &NodeIndexMapping,
    strategy: &mut dyn ColorStrategy,
) -> MergeReport {
    let mut graph = g.clone();
    let mut missing = Vec::new();
    let mut legend = IndexMap::new();
    let mut colored = 0;
    for node in graph.nodes_mut() {
        let group = mapping.id_of(&node.name).and_then(|id| assignment.group(id));
        let Some(group) = group else {
            missing.push(node.name.clone());
            continue;
        };
        let color = strategy.color_for(group);
        legend.entry(group).or_insert(color);
        strategy.decorate(node, color);
        colored += 1;
    }
    if missing.is_empty() {
        info!(colored, strategy = strategy.name(), "all nodes matched with partition groups");
    } else {
        warn!("{} node(s) not found in partition map: {:?}", missing.len(), missing);
    }
    MergeReport { graph, missing, colored, legend }
}
