//! Relational lot rows → provenance triples.
//!
//! A [`LotRow`] mirrors one row of the `lots(lot_id, product_type, attrs)`
//! table. Its loosely typed JSON `attrs` column is decoded into the closed set
//! of [`LotAttributes`] the business rules read; unknown keys are ignored and
//! anything unparseable decodes to the empty attribute set. Translation is
//! total: every row yields a (possibly empty) set of triples.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::graph::Triple;
use crate::term::{BlankNodeAllocator, Literal, Term};
use crate::vocab::{self, Class, Property};

/// Product classification of a lot.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProductType {
    Milk,
    Cheese,
    /// Any other product type; produces no type triple.
    Other(String),
}

impl ProductType {
    /// Exact, case-sensitive match on `"milk"` / `"cheese"`.
    pub fn parse(s: &str) -> Self {
        match s {
            "milk" => Self::Milk,
            "cheese" => Self::Cheese,
            other => Self::Other(other.to_string()),
        }
    }

    /// The batch class asserted for this product type, if any.
    pub fn batch_class(&self) -> Option<Class> {
        match self {
            Self::Milk => Some(Class::MilkBatch),
            Self::Cheese => Some(Class::CheeseBatch),
            Self::Other(_) => None,
        }
    }
}

/// `attrs.riskAssessment`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskAssessment {
    /// `zoonosisIndicator`; `"low"` when absent or null. Free text.
    pub zoonosis_indicator: String,
}

impl Default for RiskAssessment {
    fn default() -> Self {
        Self {
            zoonosis_indicator: DEFAULT_RISK_LEVEL.to_string(),
        }
    }
}

pub const DEFAULT_RISK_LEVEL: &str = "low";

/// The recognized keys of the `attrs` column.
///
/// | key | type | default |
/// |---|---|---|
/// | `sourceFarmId` | non-empty string or non-zero number | absent |
/// | `sourceMilkId` | non-empty string or non-zero number | absent |
/// | `riskAssessment` | object with optional `zoonosisIndicator` | absent |
/// | `skipQualityTest` | any JSON value, truthy skips the quality test | `false` |
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LotAttributes {
    pub source_farm_id: Option<String>,
    pub source_milk_id: Option<String>,
    pub risk_assessment: Option<RiskAssessment>,
    pub skip_quality_test: bool,
}

impl LotAttributes {
    /// Decode leniently from the column value: an object, a string holding
    /// encoded JSON, or null. Everything else decodes to the empty set.
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::Object(_) => Self::from_object(value),
            Value::String(encoded) => match serde_json::from_str::<Value>(encoded) {
                Ok(decoded @ Value::Object(_)) => Self::from_object(&decoded),
                _ => Self::default(),
            },
            _ => Self::default(),
        }
    }

    fn from_object(obj: &Value) -> Self {
        let risk_assessment = match obj.get("riskAssessment") {
            Some(ra @ Value::Object(_)) => Some(RiskAssessment {
                zoonosis_indicator: match ra.get("zoonosisIndicator") {
                    None | Some(Value::Null) => DEFAULT_RISK_LEVEL.to_string(),
                    Some(Value::String(s)) => s.clone(),
                    Some(other) => other.to_string(),
                },
            }),
            _ => None,
        };

        Self {
            source_farm_id: obj.get("sourceFarmId").and_then(identifier),
            source_milk_id: obj.get("sourceMilkId").and_then(identifier),
            risk_assessment,
            skip_quality_test: obj.get("skipQualityTest").is_some_and(truthy),
        }
    }
}

/// JSON truthiness: `null`, `false`, zero and empty strings, arrays and
/// objects are false; everything else is true.
fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64() != Some(0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

/// Truthy identifier values: non-empty strings and non-zero numbers.
fn identifier(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) if n.as_f64() != Some(0.0) => Some(n.to_string()),
        _ => None,
    }
}

/// One row of the source table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LotRow {
    pub lot_id: String,
    pub product_type: ProductType,
    pub attrs: LotAttributes,
}

impl LotRow {
    /// Build a row from raw column values, decoding `attrs` leniently.
    pub fn new(lot_id: impl Into<String>, product_type: &str, attrs: &Value) -> Self {
        Self {
            lot_id: lot_id.into(),
            product_type: ProductType::parse(product_type),
            attrs: LotAttributes::from_value(attrs),
        }
    }
}

/// Stateless apart from the blank node allocator shared with other translators.
#[derive(Debug, Clone)]
pub struct Translator {
    blanks: Arc<BlankNodeAllocator>,
}

impl Translator {
    /// Translator drawing blank nodes from the process-wide allocator.
    pub fn new() -> Self {
        Self {
            blanks: BlankNodeAllocator::shared(),
        }
    }

    pub fn with_allocator(blanks: Arc<BlankNodeAllocator>) -> Self {
        Self { blanks }
    }

    /// Translate a row, stamping any quality-test event with the current time.
    pub fn translate(&self, row: &LotRow) -> Vec<Triple> {
        self.translate_at(row, now_secs())
    }

    /// Translate a row with an explicit `eventTime` (seconds since UNIX epoch).
    pub fn translate_at(&self, row: &LotRow, event_time: f64) -> Vec<Triple> {
        let mut triples = Vec::new();
        let lot = Term::Iri(vocab::lot_iri(&row.lot_id));
        let attrs = &row.attrs;

        if let Some(class) = row.product_type.batch_class() {
            triples.push(Triple::new(lot.clone(), vocab::rdf_type(), class.iri()));
        }

        if let Some(farm_id) = &attrs.source_farm_id {
            let farm = vocab::farm_iri(farm_id);
            triples.push(Triple::new(farm.clone(), vocab::rdf_type(), Class::Farm.iri()));
            triples.push(Triple::new(lot.clone(), Property::SourcedFrom.iri(), farm));
        }

        // The referenced milk lot gets no type triple here; its own row supplies it.
        if let Some(milk_id) = &attrs.source_milk_id {
            triples.push(Triple::new(
                lot.clone(),
                Property::DerivedFromMilk.iri(),
                vocab::lot_iri(milk_id),
            ));
        }

        if let Some(risk) = &attrs.risk_assessment {
            let node = self.blanks.fresh();
            triples.push(Triple::new(lot.clone(), Property::HasZoonosisRisk.iri(), node));
            triples.push(Triple::new(node, vocab::rdf_type(), Class::ZoonosisRisk.iri()));
            triples.push(Triple::new(
                node,
                Property::Level.iri(),
                Literal::string(risk.zoonosis_indicator.clone()),
            ));
        }

        if row.product_type == ProductType::Milk && !attrs.skip_quality_test {
            let event = vocab::quality_event_iri(&row.lot_id);
            triples.push(Triple::new(
                event.clone(),
                vocab::rdf_type(),
                Class::QualityTestEvent.iri(),
            ));
            triples.push(Triple::new(event.clone(), Property::HasRelatedBatch.iri(), lot));
            triples.push(Triple::new(
                event,
                Property::EventTime.iri(),
                Literal::decimal(event_time),
            ));
        }

        triples
    }
}

impl Default for Translator {
    fn default() -> Self {
        Self::new()
    }
}

/// Translate a row with a default translator.
pub fn translate(row: &LotRow) -> Vec<Triple> {
    Translator::new().translate(row)
}

fn now_secs() -> f64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}
