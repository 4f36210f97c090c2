//! Wire-stable identifiers: the `ct:` vocabulary and the lot/farm/event IRI schemes.
//!
//! Lot, farm and event IRIs are pure functions of the id strings, so a lot
//! referenced before its own change event arrives (a forward reference through
//! `sourceMilkId`) already has its final IRI.

use crate::term::{Iri, Term};

/// Class and property namespace.
pub const CT_NS: &str = "http://example.org/cheese-trace#";
pub const RDF_TYPE: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#type";
pub const XSD_BOOLEAN: &str = "http://www.w3.org/2001/XMLSchema#boolean";
pub const XSD_DECIMAL: &str = "http://www.w3.org/2001/XMLSchema#decimal";

pub const LOT_PREFIX: &str = "urn:epc:id:sgtin:";
pub const FARM_PREFIX: &str = "urn:farm:";
pub const QUALITY_EVENT_PREFIX: &str = "urn:event:qualitytest:";

/// Classes asserted with `rdf:type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Class {
    MilkBatch,
    CheeseBatch,
    Farm,
    ZoonosisRisk,
    QualityTestEvent,
}

impl Class {
    pub fn local_name(self) -> &'static str {
        match self {
            Self::MilkBatch => "MilkBatch",
            Self::CheeseBatch => "CheeseBatch",
            Self::Farm => "Farm",
            Self::ZoonosisRisk => "ZoonosisRisk",
            Self::QualityTestEvent => "QualityTestEvent",
        }
    }

    pub fn iri(self) -> Iri {
        ct(self.local_name())
    }

    pub fn term(self) -> Term {
        Term::Iri(self.iri())
    }
}

/// Properties linking batches, farms, risk nodes and events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Property {
    SourcedFrom,
    DerivedFromMilk,
    HasZoonosisRisk,
    Level,
    HasRelatedBatch,
    EventTime,
    RequiresQuarantine,
}

impl Property {
    pub fn local_name(self) -> &'static str {
        match self {
            Self::SourcedFrom => "sourcedFrom",
            Self::DerivedFromMilk => "derivedFromMilk",
            Self::HasZoonosisRisk => "hasZoonosisRisk",
            Self::Level => "level",
            Self::HasRelatedBatch => "hasRelatedBatch",
            Self::EventTime => "eventTime",
            Self::RequiresQuarantine => "requiresQuarantine",
        }
    }

    pub fn iri(self) -> Iri {
        ct(self.local_name())
    }
}

/// `ct:<local>`.
pub fn ct(local: &str) -> Iri {
    Iri::new(format!("{CT_NS}{local}"))
}

pub fn rdf_type() -> Iri {
    Iri::new(RDF_TYPE)
}

pub fn lot_iri(lot_id: &str) -> Iri {
    Iri::new(format!("{LOT_PREFIX}{lot_id}"))
}

pub fn farm_iri(farm_id: &str) -> Iri {
    Iri::new(format!("{FARM_PREFIX}{farm_id}"))
}

pub fn quality_event_iri(lot_id: &str) -> Iri {
    Iri::new(format!("{QUALITY_EVENT_PREFIX}{lot_id}"))
}

/// Recover the lot id from a lot IRI term.
pub fn lot_id_of(term: &Term) -> Option<&str> {
    term.as_iri()?.as_str().strip_prefix(LOT_PREFIX)
}

/// Recover the farm id from a farm IRI term.
pub fn farm_id_of(term: &Term) -> Option<&str> {
    term.as_iri()?.as_str().strip_prefix(FARM_PREFIX)
}

/// Short human-readable form of a term: bare ids for lots and farms, the
/// lexical form for literals, and the N-Triples form otherwise.
pub fn display_id(term: &Term) -> String {
    if let Some(id) = lot_id_of(term).or_else(|| farm_id_of(term)) {
        return id.to_string();
    }
    match term {
        Term::Literal(lit) => lit.lexical(),
        other => other.to_string(),
    }
}
