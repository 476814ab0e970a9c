//! Turtle reading and writing.
//!
//! Reading goes through the Sophia Turtle parser; each parsed term is converted from its
//! N-Triples display form into the local [`Graph`] model. Writing is a small
//! deterministic serializer: one block per subject, predicates in order, `a` for
//! `rdf:type`.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use sophia::api::prelude::*;
use sophia::api::triple::Triple as _;

use crate::error::GraphError;
use crate::graph::{Graph, Literal, Node, Term, Triple};
use crate::vocab::{RDF_TYPE, XSD_STRING};

#[derive(Debug, thiserror::Error)]
#[error("{0}")]
struct TermSyntaxError(String);

/// Parses a Turtle document from disk.
///
/// Blank-node labels are prefixed with `scope` so that documents loaded into one graph
/// never share blank nodes by accident.
pub fn read_turtle(path: &Path, scope: &str) -> Result<Graph, GraphError> {
    if !path.is_file() {
        return Err(GraphError::MissingInput(path.to_path_buf()));
    }
    let file = File::open(path).map_err(|err| {
        GraphError::Filesystem(format!("open {}: {err}", path.display()))
    })?;
    parse_turtle_from(BufReader::new(file), scope).map_err(|message| GraphError::TurtleParse {
        path: path.to_path_buf(),
        message,
    })
}

pub fn parse_turtle(text: &str, scope: &str) -> Result<Graph, String> {
    parse_turtle_from(BufReader::new(text.as_bytes()), scope)
}

fn parse_turtle_from<R: std::io::BufRead>(reader: R, scope: &str) -> Result<Graph, String> {
    let mut graph = Graph::new();
    let mut parser = sophia::turtle::parser::turtle::parse_bufread(reader);
    parser
        .try_for_each_triple(|t| -> Result<(), TermSyntaxError> {
            let subject = parse_node_display(&t.s().to_string(), scope)?;
            let Node::Iri(predicate) = parse_node_display(&t.p().to_string(), scope)? else {
                return Ok(());
            };
            let object = parse_term_display(&t.o().to_string(), scope)?;
            graph.insert(Triple {
                subject,
                predicate,
                object,
            });
            Ok(())
        })
        .map_err(|err| err.to_string())?;
    Ok(graph)
}

fn parse_node_display(term: &str, scope: &str) -> Result<Node, TermSyntaxError> {
    match parse_term_display(term, scope)? {
        Term::Node(node) => Ok(node),
        Term::Literal(_) => Err(TermSyntaxError(format!(
            "expected IRI or blank node, got literal: {term}"
        ))),
    }
}

fn parse_term_display(term: &str, scope: &str) -> Result<Term, TermSyntaxError> {
    let s = term.trim();

    if let Some(rest) = s.strip_prefix('<').and_then(|t| t.strip_suffix('>')) {
        return Ok(Term::iri(rest));
    }

    if let Some(rest) = s.strip_prefix("_:") {
        return Ok(Term::Node(Node::Blank(format!("{scope}_{rest}"))));
    }

    if s.starts_with('"') {
        let mut end_quote = None;
        let mut escaped = false;
        for (i, ch) in s.char_indices().skip(1) {
            if escaped {
                escaped = false;
                continue;
            }
            match ch {
                '\\' => escaped = true,
                '"' => {
                    end_quote = Some(i);
                    break;
                }
                _ => {}
            }
        }
        let Some(end) = end_quote else {
            return Err(TermSyntaxError(format!(
                "literal without closing quote: {s}"
            )));
        };

        let lexical = unescape(&s[1..end]);
        let rest = s[end + 1..].trim();
        let mut literal = Literal::string(lexical);
        if let Some(lang) = rest.strip_prefix('@') {
            literal.language = Some(lang.to_string());
        } else if let Some(dt) = rest.strip_prefix("^^") {
            let dt = dt.trim();
            let dt = dt
                .strip_prefix('<')
                .and_then(|t| t.strip_suffix('>'))
                .unwrap_or(dt);
            if dt != XSD_STRING && !dt.is_empty() {
                literal.datatype = Some(dt.to_string());
            }
        }
        return Ok(Term::Literal(literal));
    }

    Err(TermSyntaxError(format!("unsupported RDF term form: {s}")))
}

fn unescape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('t') => out.push('\t'),
            Some('"') => out.push('"'),
            Some('\'') => out.push('\''),
            Some('\\') => out.push('\\'),
            Some('u') => push_code_point(&mut out, &mut chars, 4),
            Some('U') => push_code_point(&mut out, &mut chars, 8),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

fn push_code_point(out: &mut String, chars: &mut std::str::Chars<'_>, width: usize) {
    let hex = chars.by_ref().take(width).collect::<String>();
    match u32::from_str_radix(&hex, 16).ok().and_then(char::from_u32) {
        Some(ch) => out.push(ch),
        None => {
            out.push_str(if width == 4 { "\\u" } else { "\\U" });
            out.push_str(&hex);
        }
    }
}

/// Serializes `graph` as Turtle using `prefixes` (name, namespace) in the given order.
pub fn to_turtle(graph: &Graph, prefixes: &[(String, String)]) -> String {
    let mut out = String::with_capacity(64 * graph.len() + 256);
    for (name, namespace) in prefixes {
        out.push_str(&format!("@prefix {name}: <{namespace}> .\n"));
    }
    out.push('\n');

    let mut by_subject: BTreeMap<&Node, Vec<&Triple>> = BTreeMap::new();
    for triple in graph.iter() {
        by_subject.entry(&triple.subject).or_default().push(triple);
    }

    for (subject, mut triples) in by_subject {
        // rdf:type first; the rest keep their sorted order.
        triples.sort_by_key(|triple| triple.predicate != RDF_TYPE);
        out.push_str(&write_node(subject, prefixes));
        let mut first = true;
        for triple in triples {
            out.push_str(if first { "\n    " } else { " ;\n    " });
            first = false;
            if triple.predicate == RDF_TYPE {
                out.push('a');
            } else {
                out.push_str(&write_iri(&triple.predicate, prefixes));
            }
            out.push(' ');
            out.push_str(&write_term(&triple.object, prefixes));
        }
        out.push_str(" .\n\n");
    }
    out
}

fn write_term(term: &Term, prefixes: &[(String, String)]) -> String {
    match term {
        Term::Node(node) => write_node(node, prefixes),
        Term::Literal(literal) => write_literal(literal, prefixes),
    }
}

fn write_node(node: &Node, prefixes: &[(String, String)]) -> String {
    match node {
        Node::Iri(iri) => write_iri(iri, prefixes),
        Node::Blank(label) => format!("_:{}", blank_label(label)),
    }
}

fn blank_label(label: &str) -> String {
    label
        .chars()
        .map(|ch| if ch.is_ascii_alphanumeric() || ch == '_' { ch } else { '_' })
        .collect()
}

fn write_iri(iri: &str, prefixes: &[(String, String)]) -> String {
    prefixes
        .iter()
        .filter_map(|(name, namespace)| {
            iri.strip_prefix(namespace.as_str())
                .filter(|local| is_simple_local_name(local))
                .map(|local| format!("{name}:{local}"))
        })
        .next()
        .unwrap_or_else(|| format!("<{}>", escape_iri(iri)))
}

fn is_simple_local_name(local: &str) -> bool {
    let mut chars = local.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphanumeric() || first == '_' => {}
        _ => return false,
    }
    chars.all(|ch| ch.is_ascii_alphanumeric() || ch == '_' || ch == '-')
}

fn escape_iri(iri: &str) -> String {
    let mut out = String::with_capacity(iri.len());
    for ch in iri.chars() {
        if ch <= ' ' || matches!(ch, '<' | '>' | '"' | '{' | '}' | '|' | '^' | '`' | '\\') {
            out.push_str(&format!("\\u{:04X}", ch as u32));
        } else {
            out.push(ch);
        }
    }
    out
}

fn write_literal(literal: &Literal, prefixes: &[(String, String)]) -> String {
    let quoted = turtle_string(&literal.lexical);
    if let Some(lang) = &literal.language {
        format!("{quoted}@{lang}")
    } else if let Some(datatype) = &literal.datatype {
        format!("{quoted}^^{}", write_iri(datatype, prefixes))
    } else {
        quoted
    }
}

fn turtle_string(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for ch in value.chars() {
        match ch {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            _ => out.push(ch),
        }
    }
    out.push('"');
    out
}
