//! Core term types for the provenance graph.
//!
//! Every position of a [`Triple`](crate::graph::Triple) holds a [`Term`]: a
//! named [`Iri`], an anonymous [`BlankNode`], or a typed [`Literal`]. Terms
//! compare structurally, which is what gives the triple store its set
//! semantics. Blank nodes are allocated by a [`BlankNodeAllocator`] and are
//! never reused, so two translations of the same row never share one.

use std::fmt;
use std::num::NonZeroU64;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

use serde::{Deserialize, Serialize};

use crate::vocab;

/// An absolute identifier (URI/IRI) naming a graph node or predicate.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Iri(String);

impl Iri {
    /// Wrap an IRI string. No syntax validation beyond what the namespace
    /// constructors in [`vocab`] already guarantee.
    pub fn new(iri: impl Into<String>) -> Self {
        Self(iri.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Iri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}>", self.0)
    }
}

/// Anonymous graph node with a process-unique synthetic identifier.
///
/// Uses `NonZeroU64` so that `Option<BlankNode>` is the same size as `BlankNode`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(transparent)]
pub struct BlankNode(NonZeroU64);

impl BlankNode {
    /// Create a `BlankNode` from a raw `u64`. Returns `None` if `raw` is zero.
    pub fn new(raw: u64) -> Option<Self> {
        NonZeroU64::new(raw).map(BlankNode)
    }

    pub fn get(self) -> u64 {
        self.0.get()
    }
}

impl fmt::Display for BlankNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "_:b{}", self.0)
    }
}

/// Thread-safe blank node allocator.
///
/// Produces monotonically increasing identifiers starting from 1.
#[derive(Debug)]
pub struct BlankNodeAllocator {
    next: AtomicU64,
}

impl BlankNodeAllocator {
    /// Create an allocator that starts from 1.
    pub const fn new() -> Self {
        Self {
            next: AtomicU64::new(1),
        }
    }

    /// The allocator shared by every translator in the process.
    ///
    /// Stores merged from several translators must never see two distinct
    /// risk assessments under one blank node, so the default is one counter
    /// per process rather than one per translator.
    pub fn shared() -> Arc<Self> {
        static SHARED: OnceLock<Arc<BlankNodeAllocator>> = OnceLock::new();
        Arc::clone(SHARED.get_or_init(|| Arc::new(BlankNodeAllocator::new())))
    }

    /// Allocate the next blank node.
    pub fn fresh(&self) -> BlankNode {
        let raw = self.next.fetch_add(1, Ordering::Relaxed);
        // Wrapping past u64::MAX would need 2^64 allocations in one process.
        BlankNode(NonZeroU64::new(raw).unwrap_or(NonZeroU64::MIN))
    }

    /// Number of blank nodes handed out so far.
    pub fn allocated(&self) -> u64 {
        self.next.load(Ordering::Relaxed) - 1
    }
}

impl Default for BlankNodeAllocator {
    fn default() -> Self {
        Self::new()
    }
}

/// A typed literal value.
///
/// Decimals are kept in their lexical form so that literals stay `Eq + Hash`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum Literal {
    /// Plain string literal (`xsd:string`).
    String(String),
    /// `xsd:boolean`.
    Boolean(bool),
    /// `xsd:decimal`, lexical form.
    Decimal(String),
}

impl Literal {
    pub fn string(value: impl Into<String>) -> Self {
        Self::String(value.into())
    }

    /// Build an `xsd:decimal` from a float. Integral values keep a trailing
    /// `.0` so the lexical form is always a valid decimal.
    pub fn decimal(value: f64) -> Self {
        let mut lexical = format!("{value}");
        if !lexical.contains('.') {
            lexical.push_str(".0");
        }
        Self::Decimal(lexical)
    }

    /// The string value, if this is a plain string literal.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Decimal(lexical) => lexical.parse().ok(),
            _ => None,
        }
    }

    /// Lexical form without datatype.
    pub fn lexical(&self) -> String {
        match self {
            Self::String(s) => s.clone(),
            Self::Boolean(b) => b.to_string(),
            Self::Decimal(d) => d.clone(),
        }
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(s) => write!(f, "\"{}\"", escape(s)),
            Self::Boolean(b) => write!(f, "\"{b}\"^^<{}>", vocab::XSD_BOOLEAN),
            Self::Decimal(d) => write!(f, "\"{d}\"^^<{}>", vocab::XSD_DECIMAL),
        }
    }
}

/// N-Triples string escaping.
fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            other => out.push(other),
        }
    }
    out
}

/// A node or value in any position of a triple.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Term {
    Iri(Iri),
    Blank(BlankNode),
    Literal(Literal),
}

impl Term {
    pub fn iri(iri: impl Into<String>) -> Self {
        Self::Iri(Iri::new(iri))
    }

    pub fn as_iri(&self) -> Option<&Iri> {
        match self {
            Self::Iri(iri) => Some(iri),
            _ => None,
        }
    }

    pub fn as_literal(&self) -> Option<&Literal> {
        match self {
            Self::Literal(lit) => Some(lit),
            _ => None,
        }
    }

    pub fn is_blank(&self) -> bool {
        matches!(self, Self::Blank(_))
    }
}

impl From<Iri> for Term {
    fn from(iri: Iri) -> Self {
        Self::Iri(iri)
    }
}

impl From<BlankNode> for Term {
    fn from(node: BlankNode) -> Self {
        Self::Blank(node)
    }
}

impl From<Literal> for Term {
    fn from(lit: Literal) -> Self {
        Self::Literal(lit)
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Iri(iri) => fmt::Display::fmt(iri, f),
            Self::Blank(node) => fmt::Display::fmt(node, f),
            Self::Literal(lit) => fmt::Display::fmt(lit, f),
        }
    }
}
