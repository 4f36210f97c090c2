//! Export types for serializing store state.
//!
//! N-Triples for interchange with RDF tooling, and label-resolved JSON
//! representations of triples and derivations for reports.

use std::io::{self, Write};

use serde::{Deserialize, Serialize};

use crate::graph::{Triple, TripleStore};
use crate::rules::DerivedTriple;
use crate::vocab;

/// Render every triple as an N-Triples document, in insertion order.
pub fn to_ntriples(store: &TripleStore) -> String {
    store
        .all_triples()
        .iter()
        .map(|t| format!("{t}\n"))
        .collect()
}

/// Stream every triple as N-Triples into `out`.
pub fn write_ntriples(store: &TripleStore, mut out: impl Write) -> io::Result<()> {
    for triple in store.all_triples() {
        writeln!(out, "{triple}")?;
    }
    out.flush()
}

/// Exported triple with short labels for all positions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TripleExport {
    /// Bare lot/farm id, literal text, or N-Triples form.
    pub subject: String,
    /// Local name within the trace namespace, or the full IRI.
    pub predicate: String,
    pub object: String,
}

impl From<&Triple> for TripleExport {
    fn from(t: &Triple) -> Self {
        let predicate = t.predicate.as_str();
        Self {
            subject: vocab::display_id(&t.subject),
            predicate: predicate
                .strip_prefix(vocab::CT_NS)
                .unwrap_or(predicate)
                .to_string(),
            object: vocab::display_id(&t.object),
        }
    }
}

/// Exported derivation record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DerivationExport {
    pub triple: TripleExport,
    pub rule: String,
    pub iteration: usize,
    pub antecedents: Vec<TripleExport>,
}

impl From<&DerivedTriple> for DerivationExport {
    fn from(d: &DerivedTriple) -> Self {
        Self {
            triple: TripleExport::from(&d.triple),
            rule: d.rule_name.clone(),
            iteration: d.iteration,
            antecedents: d.antecedent_triples.iter().map(TripleExport::from).collect(),
        }
    }
}
