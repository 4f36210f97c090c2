//! Fixed traceability and compliance checks.
//!
//! Three queries over the materialized store:
//!
//! - **Risk propagation** (ask): some high-risk milk batch has a derived
//!   cheese batch marked `requiresQuarantine true`
//! - **Traceability** (select): `(cheese, milk, farm, level)` for every cheese
//!   derived from a high-risk milk batch with a known farm
//! - **Compliance gaps** (anti-join): milk batches no quality test event
//!   points at
//!
//! Verdicts are informational. A failing check never aborts a run.

use std::collections::HashSet;
use std::fmt;

use serde::Serialize;

use crate::config::ChecksConfig;
use crate::graph::TripleStore;
use crate::term::{Literal, Term};
use crate::vocab::{self, Class, Property};

use super::Query;
use super::pattern::{Filter, PatternTerm, TriplePattern};

/// Risk levels the default checks treat as high risk.
pub const DEFAULT_HIGH_RISK_LEVELS: [&str; 2] = ["High", "Critical"];

fn var(name: &str) -> PatternTerm {
    PatternTerm::var(name)
}

/// `?milk a MilkBatch ; hasZoonosisRisk ?risk . ?risk level ?lvl . FILTER(?lvl IN levels)`
fn high_risk_milk<S: AsRef<str>>(levels: &[S]) -> Query {
    Query::new()
        .pattern(TriplePattern::new(var("milk"), vocab::rdf_type(), Class::MilkBatch.iri()))
        .pattern(TriplePattern::new(
            var("milk"),
            Property::HasZoonosisRisk.iri(),
            var("risk"),
        ))
        .pattern(TriplePattern::new(var("risk"), Property::Level.iri(), var("lvl")))
        .filter(Filter::in_strings("lvl", levels))
}

fn derived_cheese(query: Query) -> Query {
    query
        .pattern(TriplePattern::new(var("cheese"), vocab::rdf_type(), Class::CheeseBatch.iri()))
        .pattern(TriplePattern::new(
            var("cheese"),
            Property::DerivedFromMilk.iri(),
            var("milk"),
        ))
}

/// Whether at least one quarantined cheese descends from high-risk milk.
pub fn check_risk_propagation(store: &TripleStore) -> bool {
    check_risk_propagation_with(store, &DEFAULT_HIGH_RISK_LEVELS)
}

pub fn check_risk_propagation_with<S: AsRef<str>>(store: &TripleStore, levels: &[S]) -> bool {
    derived_cheese(high_risk_milk(levels))
        .pattern(TriplePattern::new(
            var("cheese"),
            Property::RequiresQuarantine.iri(),
            Term::Literal(Literal::Boolean(true)),
        ))
        .ask(store)
}

/// One traceability row. Identifiers are bare lot/farm ids.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct TraceRow {
    pub cheese: String,
    pub milk: String,
    pub farm: String,
    pub level: String,
}

impl fmt::Display for TraceRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "cheese={} milk={} farm={} level={}",
            self.cheese, self.milk, self.farm, self.level
        )
    }
}

/// High-risk milk with a known farm, joined to its derived cheese.
fn traceable_cheese<S: AsRef<str>>(levels: &[S]) -> Query {
    derived_cheese(high_risk_milk(levels).pattern(TriplePattern::new(
        var("milk"),
        Property::SourcedFrom.iri(),
        var("farm"),
    )))
}

/// Cheese → milk → farm chains for high-risk milk, deduplicated, in
/// first-seen order.
pub fn traceability_report(store: &TripleStore) -> Vec<TraceRow> {
    traceability_report_with(store, &DEFAULT_HIGH_RISK_LEVELS)
}

pub fn traceability_report_with<S: AsRef<str>>(store: &TripleStore, levels: &[S]) -> Vec<TraceRow> {
    let query = traceable_cheese(levels)
        .project(["cheese", "milk", "farm", "lvl"])
        .distinct();

    // Every projected variable is bound by a pattern above.
    let rows = query.select(store).unwrap_or_default();
    let mut seen: HashSet<TraceRow> = HashSet::with_capacity(rows.len());
    let mut out: Vec<TraceRow> = Vec::with_capacity(rows.len());
    for row in rows {
        let [cheese, milk, farm, level] = row.as_slice() else {
            continue;
        };
        let row = TraceRow {
            cheese: vocab::display_id(cheese),
            milk: vocab::display_id(milk),
            farm: vocab::display_id(farm),
            level: vocab::display_id(level),
        };
        // Distinct terms can share a display id; keep the first.
        if seen.insert(row.clone()) {
            out.push(row);
        }
    }
    out
}

/// Lot ids of milk batches with no related quality test event.
pub fn compliance_gaps(store: &TripleStore) -> Vec<String> {
    Query::new()
        .pattern(TriplePattern::new(var("milk"), vocab::rdf_type(), Class::MilkBatch.iri()))
        .not_exists(vec![
            TriplePattern::new(var("ev"), vocab::rdf_type(), Class::QualityTestEvent.iri()),
            TriplePattern::new(var("ev"), Property::HasRelatedBatch.iri(), var("milk")),
        ])
        .project(["milk"])
        .distinct()
        .select(store)
        .unwrap_or_default()
        .into_iter()
        .flatten()
        .map(|milk| vocab::display_id(&milk))
        .collect()
}

/// Outcome of one run of all checks.
#[derive(Debug, Clone, Serialize)]
pub struct CheckReport {
    pub risk_propagation: bool,
    pub traceability: Vec<TraceRow>,
    /// Every traceability row's cheese carries `requiresQuarantine true`.
    pub traceability_quarantined: bool,
    pub compliance_gaps: Vec<String>,
    pub expected_compliance_gaps: Option<usize>,
    pub compliance_passed: bool,
    #[serde(skip)]
    report_limit: usize,
}

impl CheckReport {
    /// Whether every verdict passed.
    pub fn all_passed(&self) -> bool {
        self.risk_propagation && self.traceability_quarantined && self.compliance_passed
    }
}

fn verdict(passed: bool) -> &'static str {
    if passed { "PASS" } else { "FAIL" }
}

impl fmt::Display for CheckReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "[CHECK] Risk propagation quarantine: {}",
            verdict(self.risk_propagation)
        )?;
        writeln!(
            f,
            "[CHECK] Traceability query results: {} row(s)",
            self.traceability.len()
        )?;
        for row in self.traceability.iter().take(self.report_limit) {
            writeln!(f, "  {row}")?;
        }
        writeln!(
            f,
            "[CHECK] Traceability rows quarantined: {}",
            verdict(self.traceability_quarantined)
        )?;
        match self.expected_compliance_gaps {
            Some(expected) => writeln!(
                f,
                "[CHECK] Milk batches missing QualityTestEvent: {} (expected {expected})",
                self.compliance_gaps.len()
            )?,
            None => writeln!(
                f,
                "[CHECK] Milk batches missing QualityTestEvent: {}",
                self.compliance_gaps.len()
            )?,
        }
        writeln!(
            f,
            "[CHECK] Compliance missing-quality-test detection: {}",
            verdict(self.compliance_passed)
        )?;
        for milk in self.compliance_gaps.iter().take(self.report_limit) {
            writeln!(f, "  missing={milk}")?;
        }
        Ok(())
    }
}

/// Run every check with the given high-risk levels.
pub fn run_checks<S: AsRef<str>>(
    store: &TripleStore,
    config: &ChecksConfig,
    levels: &[S],
) -> CheckReport {
    let risk_propagation = check_risk_propagation_with(store, levels);
    let traceability = traceability_report_with(store, levels);
    let traceability_quarantined = !traceable_cheese(levels)
        .not_exists(vec![TriplePattern::new(
            var("cheese"),
            Property::RequiresQuarantine.iri(),
            Term::Literal(Literal::Boolean(true)),
        )])
        .ask(store);
    let gaps = compliance_gaps(store);
    let compliance_passed = match config.expected_compliance_gaps {
        Some(expected) => gaps.len() == expected,
        None => gaps.is_empty(),
    };

    let report = CheckReport {
        risk_propagation,
        traceability,
        traceability_quarantined,
        compliance_gaps: gaps,
        expected_compliance_gaps: config.expected_compliance_gaps,
        compliance_passed,
        report_limit: config.report_limit,
    };
    tracing::info!(
        risk_propagation = report.risk_propagation,
        trace_rows = report.traceability.len(),
        gaps = report.compliance_gaps.len(),
        "checks complete"
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Triple;
    use crate::term::BlankNode;

    fn lot(id: &str) -> Term {
        Term::Iri(vocab::lot_iri(id))
    }

    /// Milk M1 (High, FARM1, tested), cheese C1 from M1, milk M2 (low, untested).
    fn store(quarantined: bool) -> TripleStore {
        let store = TripleStore::new();
        let risk = Term::Blank(BlankNode::new(1).unwrap());
        store.extend([
            Triple::new(lot("M1"), vocab::rdf_type(), Class::MilkBatch.iri()),
            Triple::new(lot("M1"), Property::SourcedFrom.iri(), vocab::farm_iri("FARM1")),
            Triple::new(lot("M1"), Property::HasZoonosisRisk.iri(), risk.clone()),
            Triple::new(risk, Property::Level.iri(), Literal::string("High")),
            Triple::new(
                vocab::quality_event_iri("M1"),
                vocab::rdf_type(),
                Class::QualityTestEvent.iri(),
            ),
            Triple::new(
                vocab::quality_event_iri("M1"),
                Property::HasRelatedBatch.iri(),
                lot("M1"),
            ),
            Triple::new(lot("C1"), vocab::rdf_type(), Class::CheeseBatch.iri()),
            Triple::new(lot("C1"), Property::DerivedFromMilk.iri(), lot("M1")),
            Triple::new(lot("M2"), vocab::rdf_type(), Class::MilkBatch.iri()),
        ]);
        if quarantined {
            store.insert(Triple::new(
                lot("C1"),
                Property::RequiresQuarantine.iri(),
                Literal::Boolean(true),
            ));
        }
        store
    }

    #[test]
    fn risk_propagation_requires_quarantine_fact() {
        assert!(!check_risk_propagation(&store(false)));
        assert!(check_risk_propagation(&store(true)));
    }

    #[test]
    fn traceability_lists_chain() {
        let rows = traceability_report(&store(false));
        assert_eq!(
            rows,
            vec![TraceRow {
                cheese: "C1".into(),
                milk: "M1".into(),
                farm: "FARM1".into(),
                level: "High".into(),
            }]
        );
    }

    #[test]
    fn traceability_needs_known_farm() {
        let store = TripleStore::new();
        let risk = Term::Blank(BlankNode::new(7).unwrap());
        store.extend([
            Triple::new(lot("M1"), vocab::rdf_type(), Class::MilkBatch.iri()),
            Triple::new(lot("M1"), Property::HasZoonosisRisk.iri(), risk.clone()),
            Triple::new(risk, Property::Level.iri(), Literal::string("Critical")),
            Triple::new(lot("C1"), vocab::rdf_type(), Class::CheeseBatch.iri()),
            Triple::new(lot("C1"), Property::DerivedFromMilk.iri(), lot("M1")),
        ]);
        assert!(traceability_report(&store).is_empty());
    }

    #[test]
    fn duplicate_risk_nodes_yield_one_row() {
        let store = store(false);
        let second = Term::Blank(BlankNode::new(2).unwrap());
        store.insert(Triple::new(lot("M1"), Property::HasZoonosisRisk.iri(), second.clone()));
        store.insert(Triple::new(second, Property::Level.iri(), Literal::string("High")));
        assert_eq!(traceability_report(&store).len(), 1);
    }

    #[test]
    fn shared_display_ids_collapse_in_first_seen_order() {
        let store = store(false);
        // A second farm term that renders as the same bare id.
        store.insert(Triple::new(
            lot("M1"),
            Property::SourcedFrom.iri(),
            Term::iri("urn:epc:id:sgtin:FARM1"),
        ));
        for i in 2..400 {
            let cheese = format!("C{i}");
            store.insert(Triple::new(lot(&cheese), vocab::rdf_type(), Class::CheeseBatch.iri()));
            store.insert(Triple::new(lot(&cheese), Property::DerivedFromMilk.iri(), lot("M1")));
        }

        let rows = traceability_report(&store);
        assert_eq!(rows.len(), 399);
        assert_eq!(rows[0].cheese, "C1");
        assert_eq!(rows[1].cheese, "C2");
        assert!(rows.iter().all(|r| r.farm == "FARM1"));
    }

    #[test]
    fn compliance_gaps_anti_join() {
        assert_eq!(compliance_gaps(&store(false)), vec!["M2"]);
    }

    #[test]
    fn related_batch_without_event_type_is_still_a_gap() {
        let store = TripleStore::new();
        store.insert(Triple::new(lot("M1"), vocab::rdf_type(), Class::MilkBatch.iri()));
        store.insert(Triple::new(
            vocab::quality_event_iri("M1"),
            Property::HasRelatedBatch.iri(),
            lot("M1"),
        ));
        assert_eq!(compliance_gaps(&store), vec!["M1"]);
    }

    #[test]
    fn empty_store_checks() {
        let store = TripleStore::new();
        assert!(!check_risk_propagation(&store));
        assert!(traceability_report(&store).is_empty());
        assert!(compliance_gaps(&store).is_empty());
    }

    #[test]
    fn report_verdicts_and_rendering() {
        let config = ChecksConfig {
            expected_compliance_gaps: Some(1),
            report_limit: 5,
        };
        let report = run_checks(&store(true), &config, &DEFAULT_HIGH_RISK_LEVELS);
        assert!(report.all_passed());
        let text = report.to_string();
        assert!(text.contains("[CHECK] Risk propagation quarantine: PASS"));
        assert!(text.contains("[CHECK] Traceability query results: 1 row(s)"));
        assert!(text.contains("  cheese=C1 milk=M1 farm=FARM1 level=High"));
        assert!(text.contains("(expected 1)"));
        assert!(text.contains("  missing=M2"));

        // Without an expected count any gap fails the check.
        let report = run_checks(&store(false), &ChecksConfig::default(), &DEFAULT_HIGH_RISK_LEVELS);
        assert!(!report.compliance_passed);
        assert!(!report.traceability_quarantined);
        assert!(!report.all_passed());
    }

    #[test]
    fn report_serializes_to_json() {
        let report = run_checks(&store(true), &ChecksConfig::default(), &DEFAULT_HIGH_RISK_LEVELS);
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["risk_propagation"], true);
        assert_eq!(json["compliance_gaps"][0], "M2");
        assert!(json.get("report_limit").is_none());
    }
}
