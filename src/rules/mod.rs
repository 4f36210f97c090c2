//! Rule materialization: forward chaining over the provenance graph.
//!
//! - **Rules** ([`rule`]): Horn-style rules over triple patterns, built in
//!   code or parsed from text
//! - **Engine** ([`engine`]): applies rule sets to a fixpoint, inserting
//!   derived triples with their provenance
//!
//! The built-in rule marks every cheese batch derived from high-risk milk
//! with `requiresQuarantine true`.

pub mod engine;
pub mod rule;

use crate::graph::TripleStore;

pub use engine::{DerivedTriple, MaterializeResult, Materializer, MaterializerConfig};
pub use rule::{InferenceRule, RISK_PROPAGATION, RuleSet};

/// Apply the built-in rules to the store. Returns how many triples were added.
///
/// Running it again on an unchanged store returns 0.
pub fn materialize(store: &TripleStore) -> usize {
    Materializer::default().run(store).added()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::translate::{LotRow, Translator};
    use serde_json::json;

    #[test]
    fn materialize_after_translation() {
        let store = TripleStore::new();
        let translator = Translator::new();
        store.extend(translator.translate(&LotRow::new(
            "M1",
            "milk",
            &json!({"riskAssessment": {"zoonosisIndicator": "Critical"}}),
        )));
        store.extend(translator.translate(&LotRow::new(
            "C1",
            "cheese",
            &json!({"sourceMilkId": "M1"}),
        )));
        assert_eq!(materialize(&store), 1);
        assert_eq!(materialize(&store), 0);
    }
}
