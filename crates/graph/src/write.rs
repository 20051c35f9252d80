//! DOT writer. Output re-parses to an equal graph.

use crate::{AttrValue, AttributedGraph, Attributes, Node};
use anyhow::Context;
use std::fmt::Write as _;
use std::path::Path;

const KEYWORDS: [&str; 6] = ["strict", "graph", "digraph", "node", "edge", "subgraph"];

fn is_plain_id(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || !c.is_ascii() => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || !c.is_ascii())
                && !KEYWORDS.contains(&s.to_ascii_lowercase().as_str())
        }
        _ => false,
    }
}

fn is_numeral(s: &str) -> bool {
    let digits = s.strip_prefix('-').unwrap_or(s);
    let mut dots = 0;
    !digits.is_empty()
        && digits != "."
        && digits.chars().all(|c| {
            if c == '.' {
                dots += 1;
                dots == 1
            } else {
                c.is_ascii_digit()
            }
        })
}

/// Render an id bare when it lexes back unchanged, quoted otherwise.
pub fn quote_id(s: &str) -> String {
    if is_plain_id(s) || is_numeral(s) {
        return s.to_string();
    }
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '"' => out.push_str("\\\""),
            // keep existing escapes intact; a trailing backslash would eat the quote
            '\\' if chars.peek().is_none() => out.push_str("\\\\"),
            '\\' => {
                out.push('\\');
                if let Some(n) = chars.next() {
                    out.push(n);
                }
            }
            _ => out.push(c),
        }
    }
    out.push('"');
    out
}

fn value(v: &AttrValue) -> String {
    match v {
        AttrValue::Text(s) => quote_id(s),
        AttrValue::Html(s) => format!("<{s}>"),
    }
}

fn attr_list(attrs: &Attributes) -> String {
    let body: Vec<String> = attrs.iter().map(|(k, v)| format!("{}={}", quote_id(k), value(v))).collect();
    format!("[{}]", body.join(", "))
}

fn node_stmt(n: &Node) -> String {
    if n.attrs.is_empty() {
        format!("{};", quote_id(&n.name))
    } else {
        format!("{} {};", quote_id(&n.name), attr_list(&n.attrs))
    }
}

impl AttributedGraph {
    pub fn to_dot_string(&self) -> String {
        let mut out = String::new();
        if self.strict {
            out.push_str("strict ");
        }
        out.push_str(if self.directed { "digraph" } else { "graph" });
        if let Some(name) = &self.name {
            let _ = write!(out, " {}", quote_id(name));
        }
        out.push_str(" {\n");
        for (k, v) in self.graph_attrs.iter() {
            let _ = writeln!(out, "    {}={};", quote_id(k), value(v));
        }
        if !self.node_defaults.is_empty() {
            let _ = writeln!(out, "    node {};", attr_list(&self.node_defaults));
        }
        if !self.edge_defaults.is_empty() {
            let _ = writeln!(out, "    edge {};", attr_list(&self.edge_defaults));
        }
        // Implicit nodes are still written so first-seen order survives a re-read.
        for n in self.nodes() {
            let _ = writeln!(out, "    {}", node_stmt(n));
        }
        let op = if self.directed { "->" } else { "--" };
        for e in self.edges() {
            let _ = write!(out, "    {} {} {}", quote_id(&e.source), op, quote_id(&e.target));
            if !e.attrs.is_empty() {
                let _ = write!(out, " {}", attr_list(&e.attrs));
            }
            out.push_str(";\n");
        }
        out.push_str("}\n");
        out
    }

    pub fn write_dot<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        let path = path.as_ref();
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir).with_context(|| format!("cannot create {}", dir.display()))?;
        }
        std::fs::write(path, self.to_dot_string()).with_context(|| format!("cannot write {}", path.display()))
    }
}
