//! Multi-hop lineage traversal.
//!
//! Provides BFS-based traversal from a seed batch with configurable depth
//! limits, direction and predicate filters. Upstream walks follow a finished
//! product back to its raw materials and farms; downstream walks find every
//! product derived from a batch (the recall scope).

use std::collections::{HashSet, VecDeque};

use serde::Serialize;

use crate::term::{Iri, Term};
use crate::vocab::{self, Property};

use super::Triple;
use super::index::TripleStore;

/// Which way edges are followed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineageDirection {
    /// From a product towards its sources (outgoing edges).
    Upstream,
    /// From a source towards everything derived from it (incoming edges).
    Downstream,
}

/// Configuration for a lineage traversal.
#[derive(Debug, Clone)]
pub struct TraversalConfig {
    /// Maximum hop depth from the seed.
    pub max_depth: usize,
    pub direction: LineageDirection,
    /// Only follow edges with these predicates (empty = follow all).
    pub predicate_filter: HashSet<Iri>,
    /// Maximum number of triples to collect.
    pub max_results: usize,
}

impl TraversalConfig {
    /// Follow only lineage edges (`derivedFromMilk`, `sourcedFrom`).
    pub fn lineage(direction: LineageDirection) -> Self {
        Self {
            direction,
            predicate_filter: [
                Property::DerivedFromMilk.iri(),
                Property::SourcedFrom.iri(),
            ]
            .into_iter()
            .collect(),
            ..Default::default()
        }
    }
}

impl Default for TraversalConfig {
    fn default() -> Self {
        Self {
            max_depth: 8,
            direction: LineageDirection::Upstream,
            predicate_filter: HashSet::new(),
            max_results: 10_000,
        }
    }
}

/// Result of a lineage traversal.
#[derive(Debug, Clone, Serialize)]
pub struct TraversalResult {
    /// All lineage edges discovered, in BFS order.
    pub triples: Vec<Triple>,
    /// All nodes visited, seed included, in BFS order.
    pub visited: Vec<Term>,
    /// Maximum depth actually reached.
    pub depth_reached: usize,
}

/// Perform a BFS traversal from a seed node.
pub fn traverse_bfs(store: &TripleStore, seed: &Term, config: &TraversalConfig) -> TraversalResult {
    let mut seen: HashSet<Term> = HashSet::new();
    let mut visited: Vec<Term> = Vec::new();
    let mut collected: Vec<Triple> = Vec::new();
    let mut depth_reached: usize = 0;

    // BFS queue: (node, current_depth)
    let mut queue: VecDeque<(Term, usize)> = VecDeque::new();
    seen.insert(seed.clone());
    visited.push(seed.clone());
    queue.push_back((seed.clone(), 0));

    while let Some((node, depth)) = queue.pop_front() {
        if depth >= config.max_depth {
            continue;
        }
        if collected.len() >= config.max_results {
            break;
        }

        let edges = match config.direction {
            LineageDirection::Upstream => store.triples_from(&node),
            LineageDirection::Downstream => store.triples_to(&node),
        };
        for triple in edges {
            if !config.predicate_filter.is_empty()
                && !config.predicate_filter.contains(&triple.predicate)
            {
                continue;
            }

            let next = match config.direction {
                LineageDirection::Upstream => triple.object.clone(),
                LineageDirection::Downstream => triple.subject.clone(),
            };
            collected.push(triple);
            depth_reached = depth_reached.max(depth + 1);

            if seen.insert(next.clone()) {
                visited.push(next.clone());
                queue.push_back((next, depth + 1));
            }
        }
    }

    TraversalResult {
        triples: collected,
        visited,
        depth_reached,
    }
}

/// Trace a lot back to its raw materials and farms.
pub fn trace_lineage(store: &TripleStore, lot_id: &str) -> TraversalResult {
    traverse_bfs(
        store,
        &Term::Iri(vocab::lot_iri(lot_id)),
        &TraversalConfig::lineage(LineageDirection::Upstream),
    )
}

/// Every lot derived, directly or transitively, from the given lot.
pub fn recall_scope(store: &TripleStore, lot_id: &str) -> Vec<String> {
    let result = traverse_bfs(
        store,
        &Term::Iri(vocab::lot_iri(lot_id)),
        &TraversalConfig::lineage(LineageDirection::Downstream),
    );
    result
        .visited
        .iter()
        .skip(1)
        .filter_map(vocab::lot_id_of)
        .map(str::to_string)
        .collect()
}
