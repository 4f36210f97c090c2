//! Provenance graph: triples and the in-memory triple store.
//!
//! The graph stores (subject, predicate, object) facts with set semantics.
//!
//! - **Store** ([`TripleStore`]): `petgraph` structure plus `DashMap` indexes,
//!   append-only, duplicate inserts are no-ops
//! - **Traversal** ([`traverse`]): BFS lineage walks over batch/farm edges
//!
//! Nothing is ever removed from a store during a run; later contradicting
//! facts simply coexist with earlier ones.

pub mod index;
pub mod traverse;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::term::{Iri, Term};

pub use index::TripleStore;

/// A triple (subject, predicate, object) in the provenance graph.
///
/// Equality is structural over all three positions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Triple {
    /// An IRI or blank node.
    pub subject: Term,
    pub predicate: Iri,
    /// An IRI, blank node, or literal.
    pub object: Term,
}

impl Triple {
    pub fn new(subject: impl Into<Term>, predicate: Iri, object: impl Into<Term>) -> Self {
        Self {
            subject: subject.into(),
            predicate,
            object: object.into(),
        }
    }

    /// Whether the subject is an anonymous node.
    pub fn has_blank_subject(&self) -> bool {
        self.subject.is_blank()
    }
}

/// N-Triples line, including the terminating ` .`.
impl fmt::Display for Triple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {} .", self.subject, self.predicate, self.object)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::term::Literal;
    use crate::vocab::{self, Class, Property};

    #[test]
    fn triple_display_is_ntriples() {
        let t = Triple::new(vocab::lot_iri("L1"), vocab::rdf_type(), Class::MilkBatch.iri());
        assert_eq!(
            t.to_string(),
            "<urn:epc:id:sgtin:L1> <http://www.w3.org/1999/02/22-rdf-syntax-ns#type> \
             <http://example.org/cheese-trace#MilkBatch> ."
        );
    }

    #[test]
    fn triples_equal_structurally() {
        let a = Triple::new(
            vocab::lot_iri("L1"),
            Property::Level.iri(),
            Literal::string("High"),
        );
        let b = Triple::new(
            Term::iri("urn:epc:id:sgtin:L1"),
            vocab::ct("level"),
            Term::Literal(Literal::string("High")),
        );
        assert_eq!(a, b);
    }
}
