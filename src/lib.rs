// thiserror's #[error("...{field}...")] format strings reference struct fields,
// but the compiler doesn't see through the derive macro and reports false positives.
#![allow(unused_assignments)]

//! # cheese-trace
//!
//! Change-driven provenance graph for dairy batches: relational row changes
//! become triples, forward-chaining rules derive quarantine facts, and pattern
//! queries answer traceability and compliance checks.
//!
//! ## Architecture
//!
//! - **Terms and vocabulary** (`term`, `vocab`): IRIs, blank nodes, typed
//!   literals and the `ct:` classes and properties
//! - **Graph** (`graph`): append-only triple store (petgraph + DashMap) with
//!   set semantics and lineage traversal
//! - **Translator** (`translate`): lot rows with loosely typed JSON attributes
//!   → triples, total over every input
//! - **Listener** (`listener`): row-change notifications → translator → store
//! - **Rules** (`rules`): forward chaining to a fixpoint with provenance
//! - **Queries** (`query`): basic graph patterns with `IN` filters and
//!   `NOT EXISTS`, plus the fixed compliance checks
//! - **Pipeline** (`pipeline`): ingest, materialize, check
//!
//! ## Library usage
//!
//! ```
//! use cheese_trace::graph::TripleStore;
//! use cheese_trace::query::{check_risk_propagation, compliance_gaps, traceability_report};
//! use cheese_trace::rules::materialize;
//! use cheese_trace::translate::{LotRow, translate};
//! use serde_json::json;
//!
//! let store = TripleStore::new();
//! store.extend(translate(&LotRow::new(
//!     "LOT0000000",
//!     "milk",
//!     &json!({"sourceFarmId": "FARM001", "riskAssessment": {"zoonosisIndicator": "High"}}),
//! )));
//! store.extend(translate(&LotRow::new(
//!     "LOT0000001",
//!     "cheese",
//!     &json!({"sourceMilkId": "LOT0000000"}),
//! )));
//!
//! assert_eq!(materialize(&store), 1);
//! assert!(check_risk_propagation(&store));
//! assert_eq!(traceability_report(&store).len(), 1);
//! assert!(compliance_gaps(&store).is_empty());
//! ```

pub mod config;
pub mod error;
pub mod export;
pub mod graph;
pub mod listener;
pub mod pipeline;
pub mod query;
pub mod rules;
pub mod term;
pub mod translate;
pub mod vocab;
