//! Computation cost per partition color of an already colored graph.

use dp_graph::AttributedGraph;
use serde::Serialize;
use std::fmt::Write as _;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColorLoad {
    pub color: String,
    pub cost: u64,
    pub nodes: usize,
}

/// Sum node cost per `fillcolor`, colors in first-seen order. Only nodes
/// carrying both a `cost` and a `fillcolor` attribute count. Sums saturate
/// at `u64::MAX`.
pub fn load_by_color(g: &AttributedGraph) -> Vec<ColorLoad> {
    let mut out: Vec<ColorLoad> = Vec::new();
    for node in g.nodes() {
        if node.attrs.raw_cost().is_none() {
            continue;
        }
        let Some(color) = node.attrs.get("fillcolor") else {
            continue;
        };
        match out.iter_mut().find(|l| l.color == color.as_str()) {
            Some(l) => {
                l.cost = l.cost.saturating_add(node.cost());
                l.nodes += 1;
            }
            None => out.push(ColorLoad { color: color.to_string(), cost: node.cost(), nodes: 1 }),
        }
    }
    out
}

pub fn render_load(loads: &[ColorLoad]) -> String {
    let mut s = String::from("Computation Cost by Partition (fillcolor):\n");
    for l in loads {
        let _ = writeln!(s, "{:12}: {}", l.color, l.cost);
    }
    s
}
