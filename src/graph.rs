//! In-memory RDF graph.
//!
//! The graph is a set of triples ordered by subject, predicate and object, so union is
//! set union and serialization order is deterministic.

use std::collections::BTreeSet;
use std::fmt;

use crate::vocab::{RDF_TYPE, XSD_DECIMAL, XSD_INTEGER};

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Node {
    Iri(String),
    Blank(String),
}

impl Node {
    pub fn iri(value: impl Into<String>) -> Self {
        Node::Iri(value.into())
    }

    pub fn as_iri(&self) -> Option<&str> {
        match self {
            Node::Iri(iri) => Some(iri),
            Node::Blank(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Literal {
    pub lexical: String,
    pub datatype: Option<String>,
    pub language: Option<String>,
}

impl Literal {
    pub fn string(value: impl Into<String>) -> Self {
        Self {
            lexical: value.into(),
            datatype: None,
            language: None,
        }
    }

    pub fn typed(lexical: impl Into<String>, datatype: impl Into<String>) -> Self {
        Self {
            lexical: lexical.into(),
            datatype: Some(datatype.into()),
            language: None,
        }
    }

    pub fn decimal(value: f64) -> Self {
        Self::typed(decimal_lexical(value), XSD_DECIMAL)
    }

    pub fn integer(value: i64) -> Self {
        Self::typed(value.to_string(), XSD_INTEGER)
    }
}

/// Lexical form valid for `xsd:decimal`: no exponent, at least one fractional digit.
pub fn decimal_lexical(value: f64) -> String {
    let text = format!("{value}");
    if text.contains('.') {
        text
    } else {
        format!("{text}.0")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Term {
    Node(Node),
    Literal(Literal),
}

impl Term {
    pub fn iri(value: impl Into<String>) -> Self {
        Term::Node(Node::Iri(value.into()))
    }

    pub fn as_iri(&self) -> Option<&str> {
        match self {
            Term::Node(node) => node.as_iri(),
            Term::Literal(_) => None,
        }
    }
}

impl From<Literal> for Term {
    fn from(value: Literal) -> Self {
        Term::Literal(value)
    }
}

impl From<Node> for Term {
    fn from(value: Node) -> Self {
        Term::Node(value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Triple {
    pub subject: Node,
    pub predicate: String,
    pub object: Term,
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Node::Iri(iri) => write!(f, "<{iri}>"),
            Node::Blank(label) => write!(f, "_:{label}"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Graph {
    triples: BTreeSet<Triple>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.triples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.triples.is_empty()
    }

    /// Returns `false` when the triple was already present.
    pub fn insert(&mut self, triple: Triple) -> bool {
        self.triples.insert(triple)
    }

    pub fn add(&mut self, subject: &str, predicate: &str, object: impl Into<Term>) -> bool {
        self.insert(Triple {
            subject: Node::iri(subject),
            predicate: predicate.to_string(),
            object: object.into(),
        })
    }

    pub fn add_link(&mut self, subject: &str, predicate: &str, object: &str) -> bool {
        self.add(subject, predicate, Term::iri(object))
    }

    pub fn add_type(&mut self, subject: &str, class_iri: &str) -> bool {
        self.add_link(subject, RDF_TYPE, class_iri)
    }

    pub fn contains(&self, triple: &Triple) -> bool {
        self.triples.contains(triple)
    }

    pub fn has_link(&self, subject: &str, predicate: &str, object: &str) -> bool {
        self.contains(&Triple {
            subject: Node::iri(subject),
            predicate: predicate.to_string(),
            object: Term::iri(object),
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = &Triple> {
        self.triples.iter()
    }

    /// Adds every triple of `other`; returns how many were new.
    pub fn union_with(&mut self, other: &Graph) -> usize {
        let before = self.len();
        self.triples.extend(other.triples.iter().cloned());
        self.len() - before
    }

    pub fn subject_count(&self) -> usize {
        self.triples
            .iter()
            .map(|triple| &triple.subject)
            .collect::<BTreeSet<_>>()
            .len()
    }

    pub fn objects<'g>(&'g self, subject: &str, predicate: &str) -> Vec<&'g Term> {
        self.triples
            .iter()
            .filter(|triple| {
                triple.predicate == predicate && triple.subject.as_iri() == Some(subject)
            })
            .map(|triple| &triple.object)
            .collect()
    }

    pub fn instances_of<'g>(&'g self, class_iri: &str) -> Vec<&'g str> {
        self.triples
            .iter()
            .filter(|triple| {
                triple.predicate == RDF_TYPE && triple.object.as_iri() == Some(class_iri)
            })
            .filter_map(|triple| triple.subject.as_iri())
            .collect()
    }
}

impl Extend<Triple> for Graph {
    fn extend<T: IntoIterator<Item = Triple>>(&mut self, iter: T) {
        self.triples.extend(iter);
    }
}

impl FromIterator<Triple> for Graph {
    fn from_iter<T: IntoIterator<Item = Triple>>(iter: T) -> Self {
        Self {
            triples: iter.into_iter().collect(),
        }
    }
}
