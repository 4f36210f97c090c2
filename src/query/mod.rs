//! Query engine over the provenance graph.
//!
//! A [`Query`] is a basic graph pattern with `IN` filters and optional
//! `NOT EXISTS` blocks, evaluated with [`pattern::match_from`]. `ask` answers
//! existence; `select` projects rows. The compliance checks in [`checks`] are
//! built on top of it.

pub mod checks;
pub mod pattern;

use std::collections::HashSet;

use crate::error::QueryError;
use crate::graph::TripleStore;
use crate::term::Term;

pub use checks::{
    CheckReport, TraceRow, check_risk_propagation, compliance_gaps, run_checks,
    traceability_report,
};
pub use pattern::{Bindings, Filter, PatternTerm, TriplePattern};

/// A conjunctive query with filters and negated sub-patterns.
#[derive(Debug, Clone, Default)]
pub struct Query {
    patterns: Vec<TriplePattern>,
    filters: Vec<Filter>,
    not_exists: Vec<Vec<TriplePattern>>,
    projection: Vec<String>,
    distinct: bool,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a pattern to the basic graph pattern.
    pub fn pattern(mut self, pattern: TriplePattern) -> Self {
        self.patterns.push(pattern);
        self
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    /// Reject solutions for which this block has at least one match once the
    /// solution's bindings are substituted in.
    pub fn not_exists(mut self, block: Vec<TriplePattern>) -> Self {
        self.not_exists.push(block);
        self
    }

    /// Variables to project, in column order.
    pub fn project<I, S>(mut self, variables: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.projection = variables.into_iter().map(Into::into).collect();
        self
    }

    /// Drop duplicate projected rows, keeping first-seen order.
    pub fn distinct(mut self) -> Self {
        self.distinct = true;
        self
    }

    /// All solutions surviving filters and `NOT EXISTS` blocks.
    pub fn solutions(&self, store: &TripleStore) -> Vec<Bindings> {
        pattern::match_patterns(store, &self.patterns, &self.filters)
            .into_iter()
            .map(|s| s.bindings)
            .filter(|bindings| {
                self.not_exists.iter().all(|block| {
                    pattern::match_from(store, block, &[], bindings.clone()).is_empty()
                })
            })
            .collect()
    }

    /// Whether at least one solution exists.
    pub fn ask(&self, store: &TripleStore) -> bool {
        !self.solutions(store).is_empty()
    }

    /// Projected rows. Every projected variable must occur in a pattern.
    pub fn select(&self, store: &TripleStore) -> Result<Vec<Vec<Term>>, QueryError> {
        let bound: HashSet<&str> = self.patterns.iter().flat_map(|p| p.variables()).collect();
        if let Some(missing) = self.projection.iter().find(|v| !bound.contains(v.as_str())) {
            return Err(QueryError::UnboundProjection {
                variable: missing.clone(),
            });
        }

        let mut seen = HashSet::new();
        let mut rows = Vec::new();
        for bindings in self.solutions(store) {
            let row: Option<Vec<Term>> = self
                .projection
                .iter()
                .map(|v| bindings.get(v).cloned())
                .collect();
            let Some(row) = row else { continue };
            if self.distinct && !seen.insert(row.clone()) {
                continue;
            }
            rows.push(row);
        }
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Triple;
    use crate::term::Literal;
    use crate::vocab::{self, Class, Property};

    fn lot(id: &str) -> Term {
        Term::Iri(vocab::lot_iri(id))
    }

    fn store() -> TripleStore {
        let store = TripleStore::new();
        for id in ["M1", "M2", "M3"] {
            store.insert(Triple::new(lot(id), vocab::rdf_type(), Class::MilkBatch.iri()));
        }
        store.insert(Triple::new(
            vocab::quality_event_iri("M1"),
            Property::HasRelatedBatch.iri(),
            lot("M1"),
        ));
        store
    }

    fn milk_batches() -> Query {
        Query::new().pattern(TriplePattern::new(
            PatternTerm::var("m"),
            vocab::rdf_type(),
            Class::MilkBatch.iri(),
        ))
    }

    #[test]
    fn select_projects_in_order() {
        let rows = milk_batches().project(["m"]).select(&store()).unwrap();
        assert_eq!(rows, vec![vec![lot("M1")], vec![lot("M2")], vec![lot("M3")]]);
    }

    #[test]
    fn not_exists_is_an_anti_join() {
        let query = milk_batches()
            .not_exists(vec![TriplePattern::new(
                PatternTerm::var("e"),
                Property::HasRelatedBatch.iri(),
                PatternTerm::var("m"),
            )])
            .project(["m"]);
        let rows = query.select(&store()).unwrap();
        assert_eq!(rows, vec![vec![lot("M2")], vec![lot("M3")]]);
    }

    #[test]
    fn ask_on_empty_store_is_false() {
        assert!(!milk_batches().ask(&TripleStore::new()));
        assert!(milk_batches().ask(&store()));
    }

    #[test]
    fn unbound_projection_is_an_error() {
        let err = milk_batches().project(["nope"]).select(&store()).unwrap_err();
        assert!(matches!(err, QueryError::UnboundProjection { variable } if variable == "nope"));
    }

    #[test]
    fn distinct_drops_duplicate_rows() {
        let store = store();
        store.insert(Triple::new(lot("M1"), Property::Level.iri(), Literal::string("High")));
        store.insert(Triple::new(lot("M1"), Property::Level.iri(), Literal::string("Critical")));
        let query = milk_batches().pattern(TriplePattern::new(
            PatternTerm::var("m"),
            Property::Level.iri(),
            PatternTerm::var("l"),
        ));
        let all = query.clone().project(["m"]).select(&store).unwrap();
        assert_eq!(all.len(), 2);
        let distinct = query.project(["m"]).distinct().select(&store).unwrap();
        assert_eq!(distinct, vec![vec![lot("M1")]]);
    }
}
