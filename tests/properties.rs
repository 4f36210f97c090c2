//! Property-based tests for the store, translator and materializer.

use proptest::prelude::*;
use serde_json::{Value, json};

use cheese_trace::graph::{Triple, TripleStore};
use cheese_trace::listener::decode_notification;
use cheese_trace::query::compliance_gaps;
use cheese_trace::rules::materialize;
use cheese_trace::term::Literal;
use cheese_trace::translate::{LotRow, Translator};
use cheese_trace::vocab::{self, Class, Property};

// Strategy for generating lot identifiers
fn lot_id() -> impl Strategy<Value = String> {
    "[A-Z]{1,3}[0-9]{1,4}".prop_map(|s| s.to_string())
}

// Strategy for generating risk levels, including ones that must not quarantine
fn risk_level() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("High".to_string()),
        Just("Critical".to_string()),
        Just("low".to_string()),
        Just("high".to_string()),
        "[a-zA-Z]{0,8}",
    ]
}

// Strategy for generating arbitrary JSON values (attrs of any shape)
fn any_json() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(|n| json!(n)),
        ".{0,20}".prop_map(Value::String),
    ];
    leaf.prop_recursive(3, 24, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
            prop::collection::hash_map(
                prop_oneof![
                    Just("sourceFarmId".to_string()),
                    Just("sourceMilkId".to_string()),
                    Just("riskAssessment".to_string()),
                    Just("skipQualityTest".to_string()),
                    "[a-z]{1,6}",
                ],
                inner,
                0..4,
            )
            .prop_map(|m| Value::Object(m.into_iter().collect())),
        ]
    })
}

// Strategy for generating IRI-only triples
fn triple() -> impl Strategy<Value = Triple> {
    (lot_id(), 0usize..3, lot_id()).prop_map(|(s, p, o)| {
        let predicate = [
            Property::DerivedFromMilk.iri(),
            Property::SourcedFrom.iri(),
            vocab::rdf_type(),
        ][p]
            .clone();
        Triple::new(vocab::lot_iri(&s), predicate, vocab::lot_iri(&o))
    })
}

proptest! {
    #[test]
    fn insertion_is_idempotent(triples in prop::collection::vec(triple(), 0..40)) {
        let store = TripleStore::new();
        store.extend(triples.clone());
        let len = store.len();
        prop_assert_eq!(store.extend(triples.clone()), 0);
        prop_assert_eq!(store.len(), len);
        for t in &triples {
            prop_assert!(store.contains(t));
        }
    }

    #[test]
    fn translate_is_total(
        id in lot_id(),
        product_type in prop_oneof![Just("milk"), Just("cheese"), Just("butter"), Just("")],
        attrs in any_json(),
    ) {
        let row = LotRow::new(id.clone(), product_type, &attrs);
        let triples = Translator::new().translate(&row);
        // Every subject is an IRI or blank node.
        for t in &triples {
            prop_assert!(t.subject.as_literal().is_none());
        }
        // Encoded-string attrs decode the same as the value they encode.
        if !attrs.is_string() {
            let encoded = Value::String(attrs.to_string());
            prop_assert_eq!(LotRow::new(id, product_type, &encoded).attrs, row.attrs);
        }
    }

    #[test]
    fn decode_never_panics(payload in ".{0,64}") {
        let _ = decode_notification(&payload, "lots");
    }

    #[test]
    fn quarantine_follows_risk_level(
        levels in prop::collection::vec(risk_level(), 1..8),
    ) {
        let store = TripleStore::new();
        let translator = Translator::new();
        for (i, level) in levels.iter().enumerate() {
            let milk = format!("M{i}");
            store.extend(translator.translate(&LotRow::new(
                milk.clone(),
                "milk",
                &json!({"riskAssessment": {"zoonosisIndicator": level}}),
            )));
            store.extend(translator.translate(&LotRow::new(
                format!("C{i}"),
                "cheese",
                &json!({"sourceMilkId": milk}),
            )));
        }

        let added = materialize(&store);
        let expected = levels.iter().filter(|l| *l == "High" || *l == "Critical").count();
        prop_assert_eq!(added, expected);
        prop_assert_eq!(materialize(&store), 0);

        for (i, level) in levels.iter().enumerate() {
            let flagged = store.contains(&Triple::new(
                vocab::lot_iri(&format!("C{i}")),
                Property::RequiresQuarantine.iri(),
                Literal::Boolean(true),
            ));
            prop_assert_eq!(flagged, level == "High" || level == "Critical");
        }
    }

    #[test]
    fn gaps_are_exactly_skipped_milk(skips in prop::collection::vec(any::<bool>(), 0..16)) {
        let store = TripleStore::new();
        let translator = Translator::new();
        for (i, skip) in skips.iter().enumerate() {
            store.extend(translator.translate(&LotRow::new(
                format!("M{i:02}"),
                "milk",
                &json!({"skipQualityTest": skip}),
            )));
        }
        let expected: Vec<String> = skips
            .iter()
            .enumerate()
            .filter(|(_, skip)| **skip)
            .map(|(i, _)| format!("M{i:02}"))
            .collect();
        prop_assert_eq!(compliance_gaps(&store), expected);
        prop_assert_eq!(store.instances_of(Class::MilkBatch).len(), skips.len());
    }
}
