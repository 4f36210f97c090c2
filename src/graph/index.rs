//! In-memory triple store with set semantics and dual indexing.
//!
//! Uses `petgraph` for the graph structure and `DashMap`/`DashSet` for
//! membership and lookups by subject, predicate, or object. Every read returns
//! triples in insertion order, so results are stable for a given store state.

use std::sync::RwLock;

use dashmap::{DashMap, DashSet};
use petgraph::Direction;
use petgraph::graph::{DiGraph, EdgeIndex, NodeIndex};
use petgraph::visit::EdgeRef;

use crate::term::{Iri, Term};
use crate::vocab::{self, Class};

use super::Triple;

/// Append-only triple store backed by petgraph with secondary indexes.
///
/// Nodes are terms (IRIs, blank nodes, literals), edges carry the predicate.
/// Inserting a triple that is already present is a no-op. There is no
/// removal operation.
///
/// All methods take `&self`: the graph sits behind a reader/writer lock, so a
/// store can be shared through an `Arc` between one ingesting writer and any
/// number of readers.
pub struct TripleStore {
    /// The directed graph: nodes are terms, edges carry the predicate IRI.
    graph: RwLock<DiGraph<Term, Iri>>,
    /// Term → NodeIndex mapping for O(1) node lookups.
    node_index: DashMap<Term, NodeIndex>,
    /// Predicate index: predicate → edges in insertion order.
    predicate_index: DashMap<Iri, Vec<EdgeIndex>>,
    /// Set of every stored triple.
    members: DashSet<Triple>,
}

impl TripleStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self {
            graph: RwLock::new(DiGraph::new()),
            node_index: DashMap::new(),
            predicate_index: DashMap::new(),
            members: DashSet::new(),
        }
    }

    /// Ensure a node exists for the given term, returning its NodeIndex.
    /// Callers hold the graph write lock.
    fn ensure_node(&self, graph: &mut DiGraph<Term, Iri>, term: &Term) -> NodeIndex {
        if let Some(idx) = self.node_index.get(term) {
            return *idx.value();
        }
        let idx = graph.add_node(term.clone());
        self.node_index.insert(term.clone(), idx);
        idx
    }

    /// Insert a triple. Returns `true` if it was not already present.
    ///
    /// Membership is recorded before the edge, both under the write lock, so
    /// any triple a reader sees through [`find`](Self::find) already passes
    /// [`contains`](Self::contains).
    pub fn insert(&self, triple: Triple) -> bool {
        let mut graph = self.graph.write().expect("graph lock poisoned");
        if !self.members.insert(triple.clone()) {
            return false;
        }

        let subj_idx = self.ensure_node(&mut graph, &triple.subject);
        let obj_idx = self.ensure_node(&mut graph, &triple.object);
        let edge = graph.add_edge(subj_idx, obj_idx, triple.predicate.clone());

        self.predicate_index
            .entry(triple.predicate.clone())
            .or_default()
            .push(edge);

        tracing::trace!(%triple, "triple inserted");
        true
    }

    /// Merge a batch of triples. Returns how many were new.
    pub fn extend(&self, triples: impl IntoIterator<Item = Triple>) -> usize {
        triples
            .into_iter()
            .filter(|t| self.insert(t.clone()))
            .count()
    }

    /// Membership test.
    pub fn contains(&self, triple: &Triple) -> bool {
        self.members.contains(triple)
    }

    /// Find all triples matching a pattern. `None` is a wildcard.
    pub fn find(
        &self,
        subject: Option<&Term>,
        predicate: Option<&Iri>,
        object: Option<&Term>,
    ) -> Vec<Triple> {
        let graph = self.graph.read().expect("graph lock poisoned");

        let mut edges: Vec<EdgeIndex> = match (subject, object) {
            (Some(s), _) => match self.node_index.get(s) {
                Some(idx) => graph
                    .edges_directed(*idx.value(), Direction::Outgoing)
                    .map(|e| e.id())
                    .collect(),
                None => return vec![],
            },
            (None, Some(o)) => match self.node_index.get(o) {
                Some(idx) => graph
                    .edges_directed(*idx.value(), Direction::Incoming)
                    .map(|e| e.id())
                    .collect(),
                None => return vec![],
            },
            (None, None) => match predicate {
                Some(p) => self
                    .predicate_index
                    .get(p)
                    .map(|v| v.value().clone())
                    .unwrap_or_default(),
                None => graph.edge_indices().collect(),
            },
        };
        // Adjacency lists iterate newest first; restore insertion order.
        edges.sort_unstable();

        edges
            .into_iter()
            .filter_map(|ei| {
                let (src, dst) = graph.edge_endpoints(ei)?;
                let triple = Triple {
                    subject: graph.node_weight(src)?.clone(),
                    predicate: graph.edge_weight(ei)?.clone(),
                    object: graph.node_weight(dst)?.clone(),
                };
                let matches = subject.is_none_or(|s| *s == triple.subject)
                    && predicate.is_none_or(|p| *p == triple.predicate)
                    && object.is_none_or(|o| *o == triple.object);
                matches.then_some(triple)
            })
            .collect()
    }

    /// Get all objects for a given subject and predicate.
    pub fn objects_of(&self, subject: &Term, predicate: &Iri) -> Vec<Term> {
        self.find(Some(subject), Some(predicate), None)
            .into_iter()
            .map(|t| t.object)
            .collect()
    }

    /// Get all subjects for a given predicate and object.
    pub fn subjects_of(&self, predicate: &Iri, object: &Term) -> Vec<Term> {
        self.find(None, Some(predicate), Some(object))
            .into_iter()
            .map(|t| t.subject)
            .collect()
    }

    /// All subjects asserted to be of the given class.
    pub fn instances_of(&self, class: Class) -> Vec<Term> {
        self.subjects_of(&vocab::rdf_type(), &class.term())
    }

    /// Get all triples where the given term appears as subject.
    pub fn triples_from(&self, subject: &Term) -> Vec<Triple> {
        self.find(Some(subject), None, None)
    }

    /// Get all triples where the given term appears as object.
    pub fn triples_to(&self, object: &Term) -> Vec<Triple> {
        self.find(None, None, Some(object))
    }

    /// Get all triples in insertion order.
    pub fn all_triples(&self) -> Vec<Triple> {
        self.find(None, None, None)
    }

    /// Check if a node exists.
    pub fn has_node(&self, term: &Term) -> bool {
        self.node_index.contains_key(term)
    }

    /// Number of nodes.
    pub fn node_count(&self) -> usize {
        self.node_index.len()
    }

    /// Number of triples.
    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Get all predicates in use.
    pub fn predicates(&self) -> Vec<Iri> {
        self.predicate_index.iter().map(|e| e.key().clone()).collect()
    }
}

impl Default for TripleStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for TripleStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TripleStore")
            .field("nodes", &self.node_count())
            .field("triples", &self.len())
            .finish()
    }
}
