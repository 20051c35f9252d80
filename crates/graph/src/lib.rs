//! Attributed directed task graphs.
//!
//! An [`AttributedGraph`] is read from DOT text, carries a `cost` per node and
//! per edge, and keeps every other attribute as an opaque pass-through so the
//! graph can be written back with additions (see [`write`]).

use anyhow::Context;
use indexmap::IndexMap;
use std::fmt;
use std::path::Path;
use thiserror::Error;

mod parse;
pub mod fixtures;
pub mod write;

pub use parse::parse_dot;

/// Cost used when a node or edge has no usable `cost` attribute.
pub const DEFAULT_COST: u64 = 1;

/// Name of the recognised weight attribute.
pub const COST_KEY: &str = "cost";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("{line}:{column}: {message}")]
    Syntax {
        line: usize,
        column: usize,
        message: String,
    },
    #[error("{line}:{column}: unterminated {what}")]
    Unterminated {
        line: usize,
        column: usize,
        what: &'static str,
    },
    #[error("edge '{from}' -> '{to}': cost '{value}' is not a non-negative integer")]
    InvalidEdgeCost {
        from: String,
        to: String,
        value: String,
    },
}

/// A DOT attribute value: a plain/quoted id, or an HTML string kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AttrValue {
    Text(String),
    Html(String),
}

impl AttrValue {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Text(s) | Self::Html(s) => s,
        }
    }
}

impl fmt::Display for AttrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for AttrValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

/// Attribute record: the recognised `cost` key plus an ordered bag of
/// everything else.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Attributes {
    cost: Option<AttrValue>,
    other: IndexMap<String, AttrValue>,
}

impl Attributes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Convenience constructor for a record holding only `cost`.
    pub fn with_cost(cost: u64) -> Self {
        let mut a = Self::new();
        a.set(COST_KEY, cost.to_string());
        a
    }

    pub fn get(&self, key: &str) -> Option<&AttrValue> {
        if key == COST_KEY {
            self.cost.as_ref()
        } else {
            self.other.get(key)
        }
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<AttrValue>) {
        let key = key.into();
        if key == COST_KEY {
            self.cost = Some(value.into());
        } else {
            self.other.insert(key, value.into());
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Raw `cost` text, if present.
    pub fn raw_cost(&self) -> Option<&str> {
        self.cost.as_ref().map(AttrValue::as_str)
    }

    /// Later values win on key collisions.
    pub fn merge(&mut self, rhs: Attributes) {
        if rhs.cost.is_some() {
            self.cost = rhs.cost;
        }
        for (k, v) in rhs.other {
            self.other.insert(k, v);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.cost.is_none() && self.other.is_empty()
    }

    pub fn len(&self) -> usize {
        usize::from(self.cost.is_some()) + self.other.len()
    }

    /// Iterate in write order: `cost` first, then the pass-through bag in
    /// insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &AttrValue)> {
        self.cost
            .as_ref()
            .map(|v| (COST_KEY, v))
            .into_iter()
            .chain(self.other.iter().map(|(k, v)| (k.as_str(), v)))
    }
}

fn parse_cost(raw: &str) -> Option<u64> {
    raw.trim().parse::<u64>().ok()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub name: String,
    pub attrs: Attributes,
}

impl Node {
    /// Node cost. Absent or unparseable values fall back to [`DEFAULT_COST`].
    pub fn cost(&self) -> u64 {
        self.attrs.raw_cost().and_then(parse_cost).unwrap_or(DEFAULT_COST)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edge {
    pub source: String,
    pub target: String,
    pub cost: u64,
    pub attrs: Attributes,
}

impl Edge {
    pub fn is_self_loop(&self) -> bool {
        self.source == self.target
    }
}

/// Directed graph with named, costed nodes and costed edges.
///
/// Node order is first appearance in the source text, whether the node was
/// declared or only referenced by an edge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributedGraph {
    pub name: Option<String>,
    pub strict: bool,
    pub directed: bool,
    /// Top-level `key=value` statements and `graph [..]` defaults.
    pub graph_attrs: Attributes,
    pub node_defaults: Attributes,
    pub edge_defaults: Attributes,
    nodes: IndexMap<String, Node>,
    edges: Vec<Edge>,
}

impl Default for AttributedGraph {
    fn default() -> Self {
        Self {
            name: None,
            strict: false,
            directed: true,
            graph_attrs: Attributes::new(),
            node_defaults: Attributes::new(),
            edge_defaults: Attributes::new(),
            nodes: IndexMap::new(),
            edges: Vec::new(),
        }
    }
}

impl AttributedGraph {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    pub fn from_dot_str(s: &str) -> Result<Self, ParseError> {
        parse_dot(s)
    }

    pub fn from_dot_path<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read_to_string(path)
            .with_context(|| format!("cannot read {}", path.display()))?;
        let g = parse_dot(&data).with_context(|| format!("cannot parse {}", path.display()))?;
        Ok(g)
    }

    /// Declare a node, merging attributes into an existing one.
    pub fn add_node(&mut self, name: &str, attrs: Attributes) -> &mut Node {
        let node = self.ensure_node(name);
        node.attrs.merge(attrs);
        node
    }

    /// Reference a node without declaring it.
    pub fn ensure_node(&mut self, name: &str) -> &mut Node {
        self.nodes.entry(name.to_string()).or_insert_with(|| Node {
            name: name.to_string(),
            attrs: Attributes::new(),
        })
    }

    /// Add an edge, creating missing endpoints. An unparseable `cost` fails
    /// the edge; absence means [`DEFAULT_COST`].
    pub fn add_edge(&mut self, source: &str, target: &str, attrs: Attributes) -> Result<(), ParseError> {
        let cost = match attrs.raw_cost() {
            None => DEFAULT_COST,
            Some(raw) => parse_cost(raw).ok_or_else(|| ParseError::InvalidEdgeCost {
                from: source.to_string(),
                to: target.to_string(),
                value: raw.to_string(),
            })?,
        };
        self.ensure_node(source);
        self.ensure_node(target);
        self.edges.push(Edge {
            source: source.to_string(),
            target: target.to_string(),
            cost,
            attrs,
        });
        Ok(())
    }

    pub fn node(&self, name: &str) -> Option<&Node> {
        self.nodes.get(name)
    }

    pub fn node_mut(&mut self, name: &str) -> Option<&mut Node> {
        self.nodes.get_mut(name)
    }

    pub fn contains_node(&self, name: &str) -> bool {
        self.nodes.contains_key(name)
    }

    /// Position of a node in first-seen order.
    pub fn node_position(&self, name: &str) -> Option<usize> {
        self.nodes.get_index_of(name)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    pub fn nodes_mut(&mut self) -> impl Iterator<Item = &mut Node> {
        self.nodes.values_mut()
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn self_loop_count(&self) -> usize {
        self.edges.iter().filter(|e| e.is_self_loop()).count()
    }

    /// Copy of the graph with every self-loop edge removed. Nodes are kept.
    pub fn without_self_loops(&self) -> Self {
        let mut g = self.clone();
        g.edges.retain(|e| !e.is_self_loop());
        g
    }

    /// Sum of node costs, saturating at `u64::MAX`.
    pub fn total_cost(&self) -> u64 {
        self.nodes().map(Node::cost).fold(0, u64::saturating_add)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_graph() {
        let g = AttributedGraph::new("test");
        assert_eq!(g.name.as_deref(), Some("test"));
        assert!(g.directed);
        assert!(g.is_empty());
    }

    #[test]
    fn node_cost_falls_back_to_default() {
        let mut g = AttributedGraph::new("c");
        g.add_node("a", Attributes::with_cost(4));
        let mut bad = Attributes::new();
        bad.set("cost", "heavy");
        g.add_node("b", bad);
        g.add_node("c", Attributes::new());
        assert_eq!(g.node("a").map(Node::cost), Some(4));
        assert_eq!(g.node("b").map(Node::cost), Some(1));
        assert_eq!(g.node("c").map(Node::cost), Some(1));
        assert_eq!(g.total_cost(), 6);
    }

    #[test]
    fn total_cost_saturates() {
        let g = parse_dot("digraph { a [cost=18446744073709551615]; b [cost=1]; a -> b }").unwrap();
        assert_eq!(g.total_cost(), u64::MAX);
    }

    #[test]
    fn edge_cost_must_parse() {
        let mut g = AttributedGraph::new("e");
        let mut bad = Attributes::new();
        bad.set("cost", "2.5");
        let err = g.add_edge("a", "b", bad).unwrap_err();
        assert!(matches!(err, ParseError::InvalidEdgeCost { .. }));
        assert_eq!(g.edge_count(), 0);
        assert_eq!(g.node_count(), 0);

        g.add_edge("a", "b", Attributes::new()).unwrap();
        g.add_edge("b", "c", Attributes::with_cost(7)).unwrap();
        assert_eq!(g.edges()[0].cost, 1);
        assert_eq!(g.edges()[1].cost, 7);
    }

    #[test]
    fn implicit_nodes_keep_first_seen_order() {
        let mut g = AttributedGraph::new("o");
        g.add_edge("x", "y", Attributes::new()).unwrap();
        g.add_node("w", Attributes::new());
        g.add_node("x", Attributes::with_cost(3));
        let names: Vec<&str> = g.nodes().map(|n| n.name.as_str()).collect();
        assert_eq!(names, ["x", "y", "w"]);
        assert_eq!(g.node("x").map(Node::cost), Some(3));
        assert!(g.node("y").is_some_and(|n| n.attrs.is_empty()));
        assert_eq!(g.node_position("w"), Some(2));
    }

    #[test]
    fn attributes_merge_and_order() {
        let mut a = Attributes::new();
        a.set("shape", "box");
        a.set("cost", "2");
        let mut b = Attributes::new();
        b.set("shape", "ellipse");
        b.set("color", "red");
        a.merge(b);
        let keys: Vec<&str> = a.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, ["cost", "shape", "color"]);
        assert_eq!(a.get("shape").map(AttrValue::as_str), Some("ellipse"));
        assert_eq!(a.len(), 3);
    }

    #[test]
    fn self_loops_are_stripped_on_request() {
        let mut g = AttributedGraph::new("s");
        g.add_edge("a", "a", Attributes::new()).unwrap();
        g.add_edge("a", "b", Attributes::new()).unwrap();
        assert_eq!(g.self_loop_count(), 1);
        let h = g.without_self_loops();
        assert_eq!(h.edge_count(), 1);
        assert_eq!(h.node_count(), 2);
        assert_eq!(g.edge_count(), 2);
    }
}
