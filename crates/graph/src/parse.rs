//! DOT reader.
//!
//! Accepts the Graphviz grammar used by task-graph exporters: `strict`,
//! `graph`/`digraph`, attribute statements, edge chains, subgraphs (flattened),
//! ports (dropped), quoted/HTML ids, `+` concatenation and all three comment
//! styles. Parsing builds a fresh graph and returns it only on success.

use crate::{AttrValue, AttributedGraph, Attributes, ParseError};
use tracing::debug;

#[derive(Debug, Clone, PartialEq)]
enum Tok {
    /// Unquoted identifier or numeral.
    Bare(String),
    Quoted(String),
    Html(String),
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Eq,
    Semi,
    Comma,
    Colon,
    Plus,
    Arrow,
    Line,
    Eof,
}

#[derive(Debug, Clone)]
struct Spanned {
    tok: Tok,
    line: usize,
    column: usize,
}

struct Lexer {
    chars: Vec<char>,
    pos: usize,
    line: usize,
    column: usize,
}

fn is_id_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_' || !c.is_ascii()
}

fn is_id_char(c: char) -> bool {
    is_id_start(c) || c.is_ascii_digit()
}

impl Lexer {
    fn new(src: &str) -> Self {
        Self { chars: src.chars().collect(), pos: 0, line: 1, column: 1 }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, off: usize) -> Option<char> {
        self.chars.get(self.pos + off).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.chars.get(self.pos).copied()?;
        self.pos += 1;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn error(&self, line: usize, column: usize, message: impl Into<String>) -> ParseError {
        ParseError::Syntax { line, column, message: message.into() }
    }

    fn skip_trivia(&mut self) -> Result<(), ParseError> {
        loop {
            match (self.peek(), self.peek_at(1)) {
                (Some(c), _) if c.is_whitespace() => {
                    self.bump();
                }
                (Some('/'), Some('/')) | (Some('#'), _) => {
                    while let Some(c) = self.peek() {
                        if c == '\n' {
                            break;
                        }
                        self.bump();
                    }
                }
                (Some('/'), Some('*')) => {
                    let (line, column) = (self.line, self.column);
                    self.bump();
                    self.bump();
                    loop {
                        match (self.peek(), self.peek_at(1)) {
                            (Some('*'), Some('/')) => {
                                self.bump();
                                self.bump();
                                break;
                            }
                            (Some(_), _) => {
                                self.bump();
                            }
                            (None, _) => {
                                return Err(ParseError::Unterminated { line, column, what: "comment" });
                            }
                        }
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    fn quoted(&mut self, line: usize, column: usize) -> Result<Tok, ParseError> {
        self.bump();
        let mut out = String::new();
        loop {
            match self.bump() {
                None => return Err(ParseError::Unterminated { line, column, what: "string" }),
                Some('"') => return Ok(Tok::Quoted(out)),
                Some('\\') => match self.bump() {
                    Some('"') => out.push('"'),
                    // line continuation
                    Some('\n') => {}
                    Some(c) => {
                        out.push('\\');
                        out.push(c);
                    }
                    None => return Err(ParseError::Unterminated { line, column, what: "string" }),
                },
                Some(c) => out.push(c),
            }
        }
    }

    fn html(&mut self, line: usize, column: usize) -> Result<Tok, ParseError> {
        self.bump();
        let mut depth = 1usize;
        let mut out = String::new();
        loop {
            match self.bump() {
                None => return Err(ParseError::Unterminated { line, column, what: "HTML string" }),
                Some('<') => {
                    depth += 1;
                    out.push('<');
                }
                Some('>') => {
                    depth -= 1;
                    if depth == 0 {
                        return Ok(Tok::Html(out));
                    }
                    out.push('>');
                }
                Some(c) => out.push(c),
            }
        }
    }

    fn numeral(&mut self) -> Tok {
        let mut out = String::new();
        if self.peek() == Some('-') {
            out.push('-');
            self.bump();
        }
        let mut seen_dot = false;
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() {
                out.push(c);
            } else if c == '.' && !seen_dot {
                seen_dot = true;
                out.push(c);
            } else {
                break;
            }
            self.bump();
        }
        Tok::Bare(out)
    }

    fn next_token(&mut self) -> Result<Spanned, ParseError> {
        self.skip_trivia()?;
        let (line, column) = (self.line, self.column);
        let Some(c) = self.peek() else {
            return Ok(Spanned { tok: Tok::Eof, line, column });
        };
        let single = match c {
            '{' => Some(Tok::LBrace),
            '}' => Some(Tok::RBrace),
            '[' => Some(Tok::LBracket),
            ']' => Some(Tok::RBracket),
            '=' => Some(Tok::Eq),
            ';' => Some(Tok::Semi),
            ',' => Some(Tok::Comma),
            ':' => Some(Tok::Colon),
            '+' => Some(Tok::Plus),
            _ => None,
        };
        let tok = if let Some(t) = single {
            self.bump();
            t
        } else if c == '"' {
            self.quoted(line, column)?
        } else if c == '<' {
            self.html(line, column)?
        } else if c == '-' && self.peek_at(1) == Some('>') {
            self.bump();
            self.bump();
            Tok::Arrow
        } else if c == '-' && self.peek_at(1) == Some('-') {
            self.bump();
            self.bump();
            Tok::Line
        } else if c.is_ascii_digit()
            || c == '.'
            || (c == '-' && self.peek_at(1).is_some_and(|d| d.is_ascii_digit() || d == '.'))
        {
            self.numeral()
        } else if is_id_start(c) {
            let mut out = String::new();
            while let Some(d) = self.peek() {
                if !is_id_char(d) {
                    break;
                }
                out.push(d);
                self.bump();
            }
            Tok::Bare(out)
        } else {
            return Err(self.error(line, column, format!("unexpected character '{c}'")));
        };
        Ok(Spanned { tok, line, column })
    }

    fn tokenize(mut self) -> Result<Vec<Spanned>, ParseError> {
        let mut out = Vec::new();
        loop {
            let t = self.next_token()?;
            let end = t.tok == Tok::Eof;
            out.push(t);
            if end {
                return Ok(out);
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Keyword {
    Strict,
    Graph,
    Digraph,
    Node,
    Edge,
    Subgraph,
}

fn keyword(tok: &Tok) -> Option<Keyword> {
    let Tok::Bare(s) = tok else { return None };
    match s.to_ascii_lowercase().as_str() {
        "strict" => Some(Keyword::Strict),
        "graph" => Some(Keyword::Graph),
        "digraph" => Some(Keyword::Digraph),
        "node" => Some(Keyword::Node),
        "edge" => Some(Keyword::Edge),
        "subgraph" => Some(Keyword::Subgraph),
        _ => None,
    }
}

struct Parser {
    toks: Vec<Spanned>,
    pos: usize,
    graph: AttributedGraph,
    /// Subgraph nesting depth; attribute defaults are scoped and dropped inside.
    depth: usize,
}

impl Parser {
    fn peek(&self) -> &Tok {
        &self.toks[self.pos.min(self.toks.len() - 1)].tok
    }

    fn peek_at(&self, off: usize) -> &Tok {
        &self.toks[(self.pos + off).min(self.toks.len() - 1)].tok
    }

    fn advance(&mut self) -> Spanned {
        let t = self.toks[self.pos.min(self.toks.len() - 1)].clone();
        if self.pos < self.toks.len() - 1 {
            self.pos += 1;
        }
        t
    }

    fn error_here(&self, message: impl Into<String>) -> ParseError {
        let t = &self.toks[self.pos.min(self.toks.len() - 1)];
        ParseError::Syntax { line: t.line, column: t.column, message: message.into() }
    }

    fn expect(&mut self, want: &Tok, what: &str) -> Result<(), ParseError> {
        if self.peek() == want {
            self.advance();
            Ok(())
        } else {
            Err(self.error_here(format!("expected {what}, found {}", describe(self.peek()))))
        }
    }

    fn eat(&mut self, want: &Tok) -> bool {
        if self.peek() == want {
            self.advance();
            true
        } else {
            false
        }
    }

    fn is_id(&self) -> bool {
        matches!(self.peek(), Tok::Bare(_) | Tok::Quoted(_) | Tok::Html(_)) && keyword(self.peek()).is_none()
    }

    /// id ::= bare | quoted ('+' quoted)* | html
    fn id(&mut self) -> Result<AttrValue, ParseError> {
        if keyword(self.peek()).is_some() {
            return Err(self.error_here(format!("unexpected keyword {}", describe(self.peek()))));
        }
        if !matches!(self.peek(), Tok::Bare(_) | Tok::Quoted(_) | Tok::Html(_)) {
            return Err(self.error_here(format!("expected identifier, found {}", describe(self.peek()))));
        }
        match self.advance().tok {
            Tok::Bare(s) => Ok(AttrValue::Text(s)),
            Tok::Html(s) => Ok(AttrValue::Html(s)),
            Tok::Quoted(mut s) => {
                while self.peek() == &Tok::Plus && matches!(self.peek_at(1), Tok::Quoted(_)) {
                    self.advance();
                    if let Tok::Quoted(more) = self.advance().tok {
                        s.push_str(&more);
                    }
                }
                Ok(AttrValue::Text(s))
            }
            other => Err(self.error_here(format!("expected identifier, found {}", describe(&other)))),
        }
    }

    fn graph(&mut self) -> Result<(), ParseError> {
        if keyword(self.peek()) == Some(Keyword::Strict) {
            self.advance();
            self.graph.strict = true;
        }
        match keyword(self.peek()) {
            Some(Keyword::Digraph) => self.graph.directed = true,
            Some(Keyword::Graph) => self.graph.directed = false,
            _ => return Err(self.error_here(format!("expected 'graph' or 'digraph', found {}", describe(self.peek())))),
        }
        self.advance();
        if self.is_id() {
            self.graph.name = Some(self.id()?.as_str().to_string());
        }
        self.expect(&Tok::LBrace, "'{'")?;
        self.stmt_list(&mut Vec::new())?;
        self.expect(&Tok::RBrace, "'}'")?;
        if self.peek() != &Tok::Eof {
            return Err(self.error_here("unexpected content after the closing '}'"));
        }
        Ok(())
    }

    /// Parses statements until '}' and records every node touched into `members`.
    fn stmt_list(&mut self, members: &mut Vec<String>) -> Result<(), ParseError> {
        while !matches!(self.peek(), Tok::RBrace | Tok::Eof) {
            self.stmt(members)?;
            self.eat(&Tok::Semi);
        }
        Ok(())
    }

    fn stmt(&mut self, members: &mut Vec<String>) -> Result<(), ParseError> {
        match keyword(self.peek()) {
            Some(kw @ (Keyword::Graph | Keyword::Node | Keyword::Edge)) => {
                self.advance();
                if self.peek() != &Tok::LBracket {
                    return Err(self.error_here("expected '[' after attribute statement keyword"));
                }
                let attrs = self.attr_lists()?;
                if self.depth > 0 {
                    debug!("dropping scoped subgraph attribute defaults");
                    return Ok(());
                }
                match kw {
                    Keyword::Graph => self.graph.graph_attrs.merge(attrs),
                    Keyword::Node => self.graph.node_defaults.merge(attrs),
                    _ => self.graph.edge_defaults.merge(attrs),
                }
                return Ok(());
            }
            Some(Keyword::Subgraph) => {
                let first = self.subgraph()?;
                return self.maybe_edges(first, members);
            }
            Some(_) => {
                return Err(self.error_here(format!("unexpected keyword {}", describe(self.peek()))));
            }
            None => {}
        }
        if self.peek() == &Tok::LBrace {
            let first = self.subgraph()?;
            return self.maybe_edges(first, members);
        }
        if self.is_id() && self.peek_at(1) == &Tok::Eq {
            let key = self.id()?;
            self.advance();
            let value = self.id()?;
            if self.depth == 0 {
                self.graph.graph_attrs.set(key.as_str(), value);
            }
            return Ok(());
        }
        let name = self.node_id()?;
        if matches!(self.peek(), Tok::Arrow | Tok::Line) {
            return self.maybe_edges(vec![name], members);
        }
        let attrs = if self.peek() == &Tok::LBracket { self.attr_lists()? } else { Attributes::new() };
        self.graph.add_node(&name, attrs);
        members.push(name);
        Ok(())
    }

    fn node_id(&mut self) -> Result<String, ParseError> {
        let name = self.id()?.as_str().to_string();
        // ports: name[:port[:compass]]
        while self.eat(&Tok::Colon) {
            self.id()?;
        }
        Ok(name)
    }

    fn subgraph(&mut self) -> Result<Vec<String>, ParseError> {
        if keyword(self.peek()) == Some(Keyword::Subgraph) {
            self.advance();
            if self.is_id() {
                self.id()?;
            }
        }
        self.expect(&Tok::LBrace, "'{'")?;
        self.depth += 1;
        let mut inner = Vec::new();
        self.stmt_list(&mut inner)?;
        self.depth -= 1;
        self.expect(&Tok::RBrace, "'}'")?;
        Ok(inner)
    }

    fn edge_operand(&mut self) -> Result<Vec<String>, ParseError> {
        if keyword(self.peek()) == Some(Keyword::Subgraph) || self.peek() == &Tok::LBrace {
            self.subgraph()
        } else {
            let name = self.node_id()?;
            self.graph.ensure_node(&name);
            Ok(vec![name])
        }
    }

    /// Handles `first (edgeop operand)+ [attrs]`, or a bare subgraph.
    fn maybe_edges(&mut self, first: Vec<String>, members: &mut Vec<String>) -> Result<(), ParseError> {
        for n in &first {
            self.graph.ensure_node(n);
        }
        let mut chain = vec![first];
        while matches!(self.peek(), Tok::Arrow | Tok::Line) {
            let op = self.advance();
            let directed_op = op.tok == Tok::Arrow;
            if directed_op != self.graph.directed {
                return Err(ParseError::Syntax {
                    line: op.line,
                    column: op.column,
                    message: if self.graph.directed {
                        "'--' used in a digraph".to_string()
                    } else {
                        "'->' used in an undirected graph".to_string()
                    },
                });
            }
            chain.push(self.edge_operand()?);
        }
        let attrs = if self.peek() == &Tok::LBracket { self.attr_lists()? } else { Attributes::new() };
        for pair in chain.windows(2) {
            for s in &pair[0] {
                for t in &pair[1] {
                    self.graph.add_edge(s, t, attrs.clone())?;
                }
            }
        }
        members.extend(chain.into_iter().flatten());
        Ok(())
    }

    /// attr_list ::= '[' (id '=' id [';'|','])* ']' attr_list?
    fn attr_lists(&mut self) -> Result<Attributes, ParseError> {
        let mut attrs = Attributes::new();
        while self.eat(&Tok::LBracket) {
            while self.peek() != &Tok::RBracket {
                let key = self.id()?;
                let value = if self.eat(&Tok::Eq) { self.id()? } else { AttrValue::from("true") };
                attrs.set(key.as_str(), value);
                if !self.eat(&Tok::Comma) {
                    self.eat(&Tok::Semi);
                }
            }
            self.expect(&Tok::RBracket, "']'")?;
        }
        Ok(attrs)
    }
}

fn describe(tok: &Tok) -> String {
    match tok {
        Tok::Bare(s) => format!("'{s}'"),
        Tok::Quoted(s) => format!("\"{s}\""),
        Tok::Html(_) => "HTML string".to_string(),
        Tok::LBrace => "'{'".to_string(),
        Tok::RBrace => "'}'".to_string(),
        Tok::LBracket => "'['".to_string(),
        Tok::RBracket => "']'".to_string(),
        Tok::Eq => "'='".to_string(),
        Tok::Semi => "';'".to_string(),
        Tok::Comma => "','".to_string(),
        Tok::Colon => "':'".to_string(),
        Tok::Plus => "'+'".to_string(),
        Tok::Arrow => "'->'".to_string(),
        Tok::Line => "'--'".to_string(),
        Tok::Eof => "end of input".to_string(),
    }
}

/// Parse one DOT graph.
pub fn parse_dot(src: &str) -> Result<AttributedGraph, ParseError> {
    let toks = Lexer::new(src).tokenize()?;
    let mut p = Parser { toks, pos: 0, graph: AttributedGraph::default(), depth: 0 };
    p.graph()?;
    debug!(
        nodes = p.graph.node_count(),
        edges = p.graph.edge_count(),
        "parsed DOT graph"
    );
    Ok(p.graph)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Node;

    fn names(g: &AttributedGraph) -> Vec<&str> {
        g.nodes().map(|n| n.name.as_str()).collect()
    }

    #[test]
    fn parses_costs_and_chain() {
        let g = parse_dot(
            r#"digraph tasks {
                A [cost=2];
                B [cost="3", label="load B"];
                C;
                A -> B -> C [cost=5];
            }"#,
        )
        .unwrap();
        assert_eq!(g.name.as_deref(), Some("tasks"));
        assert_eq!(names(&g), ["A", "B", "C"]);
        assert_eq!(g.node("A").map(Node::cost), Some(2));
        assert_eq!(g.node("B").map(Node::cost), Some(3));
        assert_eq!(g.node("C").map(Node::cost), Some(1));
        assert_eq!(g.edge_count(), 2);
        assert!(g.edges().iter().all(|e| e.cost == 5));
        assert_eq!(
            g.node("B").and_then(|n| n.attrs.get("label")).map(AttrValue::as_str),
            Some("load B")
        );
    }

    #[test]
    fn defaults_are_not_nodes() {
        let g = parse_dot(
            "digraph { node [shape=box, cost=9]; edge [color=gray]; graph [rankdir=LR]; size=\"4,4\"; a -> b }",
        )
        .unwrap();
        assert_eq!(names(&g), ["a", "b"]);
        assert_eq!(g.node("a").map(Node::cost), Some(1));
        assert_eq!(g.node_defaults.get("shape").map(AttrValue::as_str), Some("box"));
        assert_eq!(g.edge_defaults.get("color").map(AttrValue::as_str), Some("gray"));
        assert_eq!(g.graph_attrs.get("rankdir").map(AttrValue::as_str), Some("LR"));
        assert_eq!(g.graph_attrs.get("size").map(AttrValue::as_str), Some("4,4"));
    }

    #[test]
    fn quoted_node_named_node_is_a_real_node() {
        let g = parse_dot("digraph { \"node\" [cost=4]; \"node\" -> x }").unwrap();
        assert_eq!(names(&g), ["node", "x"]);
        assert_eq!(g.node("node").map(Node::cost), Some(4));
    }

    #[test]
    fn comments_ports_and_escapes() {
        let g = parse_dot(
            "// leading\n# preprocessor\ndigraph g {\n /* block\n comment */ \"say \\\"hi\\\"\" -> b:out:n; \"x\" + \"y\" -> b\n}",
        )
        .unwrap();
        assert_eq!(names(&g), ["say \"hi\"", "b", "xy"]);
        assert_eq!(g.edge_count(), 2);
    }

    #[test]
    fn subgraphs_are_flattened() {
        let g = parse_dot(
            "digraph { subgraph cluster_0 { node [color=red]; a; b } c -> { a b } ; { d e } -> c }",
        )
        .unwrap();
        assert_eq!(names(&g), ["a", "b", "c", "d", "e"]);
        assert_eq!(g.edge_count(), 4);
        assert!(g.node_defaults.is_empty());
    }

    #[test]
    fn html_labels_survive() {
        let g = parse_dot("digraph { a [label=<<b>bold</b>>] }").unwrap();
        let label = g.node("a").and_then(|n| n.attrs.get("label")).cloned();
        assert_eq!(label, Some(AttrValue::Html("<b>bold</b>".into())));
    }

    #[test]
    fn negative_and_float_numerals_lex() {
        let g = parse_dot("digraph { a [pos=-1.5, cost=.5] }").unwrap();
        assert_eq!(g.node("a").and_then(|n| n.attrs.get("pos")).map(AttrValue::as_str), Some("-1.5"));
        assert_eq!(g.node("a").map(Node::cost), Some(1));
    }

    #[test]
    fn undirected_graph_requires_line_operator() {
        let g = parse_dot("graph { a -- b }").unwrap();
        assert!(!g.directed);
        assert!(parse_dot("graph { a -> b }").is_err());
        assert!(parse_dot("digraph { a -- b }").is_err());
    }

    #[test]
    fn bad_edge_cost_fails_whole_load() {
        let err = parse_dot("digraph { a -> b [cost=x] }").unwrap_err();
        assert!(matches!(err, ParseError::InvalidEdgeCost { ref value, .. } if value == "x"));
    }

    #[test]
    fn malformed_inputs_report_position() {
        match parse_dot("digraph {\n  a -> ;\n}") {
            Err(ParseError::Syntax { line, .. }) => assert_eq!(line, 2),
            other => panic!("unexpected: {other:?}"),
        }
        assert!(matches!(
            parse_dot("digraph { a [label=\"open] }"),
            Err(ParseError::Unterminated { what: "string", .. })
        ));
        assert!(parse_dot("digraph { a").is_err());
        assert!(parse_dot("digraph { a } trailing").is_err());
        assert!(parse_dot("").is_err());
        assert!(parse_dot("digraph { a @ b }").is_err());
    }

    #[test]
    fn attribute_without_value_is_true() {
        let g = parse_dot("digraph { a [constraint] }").unwrap();
        assert_eq!(g.node("a").and_then(|n| n.attrs.get("constraint")).map(AttrValue::as_str), Some("true"));
    }
}
