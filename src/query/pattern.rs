//! Triple patterns, filters and the variable-binding matcher.
//!
//! Shared by the rule materializer (antecedents/consequents) and the query
//! engine. A basic graph pattern is matched one pattern at a time, most
//! selective first: each pattern extends the bindings produced so far, using
//! already-bound variables to narrow the store lookup.

use std::cmp::Reverse;
use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::error::RuleError;
use crate::graph::{Triple, TripleStore};
use crate::term::{Iri, Literal, Term};
use crate::vocab;

/// Variable name → bound term.
pub type Bindings = HashMap<String, Term>;

/// A term in a pattern: a constant or a variable (`?name`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PatternTerm {
    Const(Term),
    Var(String),
}

impl PatternTerm {
    pub fn var(name: impl Into<String>) -> Self {
        Self::Var(name.into())
    }

    pub fn is_variable(&self) -> bool {
        matches!(self, Self::Var(_))
    }

    /// Parse a token. `?x` is a variable, `a` and `rdf:type` name `rdf:type`,
    /// `ct:Local` expands into the trace namespace, `<...>` is an IRI,
    /// `"..."` a string literal and `true`/`false` booleans.
    pub fn parse(token: &str) -> Result<Self, String> {
        let token = token.trim();
        if let Some(var) = token.strip_prefix('?') {
            if var.is_empty() {
                return Err("empty variable name".into());
            }
            return Ok(Self::Var(var.to_string()));
        }
        let term = match token {
            "a" | "rdf:type" => Term::Iri(vocab::rdf_type()),
            "true" => Term::Literal(Literal::Boolean(true)),
            "false" => Term::Literal(Literal::Boolean(false)),
            _ => {
                if let Some(local) = token.strip_prefix("ct:") {
                    Term::Iri(vocab::ct(local))
                } else if let Some(iri) = token.strip_prefix('<').and_then(|t| t.strip_suffix('>')) {
                    Term::iri(iri)
                } else if let Some(s) = token.strip_prefix('"').and_then(|t| t.strip_suffix('"')) {
                    Term::Literal(Literal::string(s))
                } else {
                    return Err(format!("unrecognized term '{token}'"));
                }
            }
        };
        Ok(Self::Const(term))
    }

    /// Resolve against bindings: the constant, the bound value, or `None`.
    fn resolve<'a>(&'a self, bindings: &'a Bindings) -> Option<&'a Term> {
        match self {
            Self::Const(term) => Some(term),
            Self::Var(name) => bindings.get(name),
        }
    }
}

impl From<Term> for PatternTerm {
    fn from(term: Term) -> Self {
        Self::Const(term)
    }
}

impl From<Iri> for PatternTerm {
    fn from(iri: Iri) -> Self {
        Self::Const(Term::Iri(iri))
    }
}

/// A triple pattern.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TriplePattern {
    pub subject: PatternTerm,
    pub predicate: PatternTerm,
    pub object: PatternTerm,
}

impl TriplePattern {
    pub fn new(
        subject: impl Into<PatternTerm>,
        predicate: impl Into<PatternTerm>,
        object: impl Into<PatternTerm>,
    ) -> Self {
        Self {
            subject: subject.into(),
            predicate: predicate.into(),
            object: object.into(),
        }
    }

    /// Parse a triple pattern from `(?X pred ?Y)` syntax.
    pub fn parse(s: &str) -> Result<Self, RuleError> {
        let s = s.trim();
        let inner = s
            .strip_prefix('(')
            .and_then(|s| s.strip_suffix(')'))
            .unwrap_or(s);
        let parts: Vec<&str> = inner.split_whitespace().collect();
        if parts.len() != 3 {
            return Err(RuleError::RuleParse {
                rule_name: String::new(),
                message: format!(
                    "triple pattern must have exactly 3 terms, got {}: '{s}'",
                    parts.len()
                ),
            });
        }
        let parse = |token: &str| {
            PatternTerm::parse(token).map_err(|message| RuleError::RuleParse {
                rule_name: String::new(),
                message,
            })
        };
        Ok(Self {
            subject: parse(parts[0])?,
            predicate: parse(parts[1])?,
            object: parse(parts[2])?,
        })
    }

    /// Variables mentioned by this pattern, in position order.
    pub fn variables(&self) -> impl Iterator<Item = &str> {
        [&self.subject, &self.predicate, &self.object]
            .into_iter()
            .filter_map(|t| match t {
                PatternTerm::Var(name) => Some(name.as_str()),
                PatternTerm::Const(_) => None,
            })
    }

    /// Substitute bindings, producing a concrete triple if every position
    /// resolves and the result is well-formed (no literal subject, IRI predicate).
    pub fn instantiate(&self, bindings: &Bindings) -> Option<Triple> {
        let subject = self.subject.resolve(bindings)?;
        let predicate = self.predicate.resolve(bindings)?.as_iri()?;
        let object = self.object.resolve(bindings)?;
        if subject.as_literal().is_some() {
            return None;
        }
        Some(Triple::new(subject.clone(), predicate.clone(), object.clone()))
    }
}

/// A constraint on a variable's value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Filter {
    /// `FILTER(?var IN (...))`.
    In { variable: String, values: Vec<Term> },
}

impl Filter {
    /// `?variable IN ("a", "b", ...)` over plain string literals.
    pub fn in_strings<S: AsRef<str>>(variable: impl Into<String>, values: &[S]) -> Self {
        Self::In {
            variable: variable.into(),
            values: values
                .iter()
                .map(|v| Term::Literal(Literal::string(v.as_ref())))
                .collect(),
        }
    }

    fn variable(&self) -> &str {
        match self {
            Self::In { variable, .. } => variable,
        }
    }

    /// Evaluate. An unbound variable fails the filter.
    pub fn holds(&self, bindings: &Bindings) -> bool {
        match self {
            Self::In { variable, values } => bindings
                .get(variable)
                .is_some_and(|bound| values.contains(bound)),
        }
    }
}

/// One match of a basic graph pattern.
#[derive(Debug, Clone, PartialEq)]
pub struct Solution {
    pub bindings: Bindings,
    /// The triples matched, one per pattern, in pattern order.
    pub matched: Vec<Triple>,
}

/// Match a basic graph pattern with filters against the store.
pub fn match_patterns(
    store: &TripleStore,
    patterns: &[TriplePattern],
    filters: &[Filter],
) -> Vec<Solution> {
    match_from(store, patterns, filters, Bindings::new())
}

/// A solution under construction; `matched` is indexed by pattern position.
struct Partial {
    bindings: Bindings,
    matched: Vec<Option<Triple>>,
}

/// Match starting from existing bindings (used for `NOT EXISTS` blocks).
///
/// Patterns are evaluated in [`join_order`], not as written, so a pattern
/// that reuses a bound variable is looked up through the adjacency lists
/// instead of scanning a whole class.
pub fn match_from(
    store: &TripleStore,
    patterns: &[TriplePattern],
    filters: &[Filter],
    seed: Bindings,
) -> Vec<Solution> {
    let order = join_order(patterns, seed.keys().cloned().collect());
    let mut partials = vec![Partial {
        bindings: seed,
        matched: vec![None; patterns.len()],
    }];

    for idx in order {
        let pattern = &patterns[idx];
        let mut extended = Vec::new();
        for partial in &partials {
            for (bindings, triple) in match_pattern(store, pattern, &partial.bindings) {
                // Prune as soon as a filter's variable becomes bound.
                if !filters
                    .iter()
                    .filter(|f| bindings.contains_key(f.variable()))
                    .all(|f| f.holds(&bindings))
                {
                    continue;
                }
                let mut matched = partial.matched.clone();
                matched[idx] = Some(triple);
                extended.push(Partial { bindings, matched });
            }
        }
        partials = extended;
        if partials.is_empty() {
            break;
        }
    }

    partials
        .into_iter()
        .filter(|p| filters.iter().all(|f| f.holds(&p.bindings)))
        .map(|p| Solution {
            bindings: p.bindings,
            matched: p.matched.into_iter().flatten().collect(),
        })
        .collect()
}

/// Evaluation order for a basic graph pattern, given the variables bound
/// before it starts. Greedy: the most selective remaining pattern goes next,
/// ties keep the written order.
pub fn join_order(patterns: &[TriplePattern], mut bound: HashSet<String>) -> Vec<usize> {
    let mut remaining: Vec<usize> = (0..patterns.len()).collect();
    let mut order = Vec::with_capacity(patterns.len());
    while !remaining.is_empty() {
        let pos = remaining
            .iter()
            .enumerate()
            .max_by_key(|&(_, &idx)| (selectivity(&patterns[idx], &bound), Reverse(idx)))
            .map_or(0, |(pos, _)| pos);
        let idx = remaining.remove(pos);
        bound.extend(patterns[idx].variables().map(str::to_string));
        order.push(idx);
    }
    order
}

/// Higher is narrower. A known subject, or a bound variable in object
/// position, is answered from one node's adjacency list; a constant object
/// (a class, `true`) is shared by many subjects.
fn selectivity(pattern: &TriplePattern, bound: &HashSet<String>) -> u8 {
    let known = |term: &PatternTerm| match term {
        PatternTerm::Const(_) => true,
        PatternTerm::Var(name) => bound.contains(name),
    };
    let mut score = 0;
    if known(&pattern.subject) {
        score += 4;
    }
    score += match &pattern.object {
        PatternTerm::Var(name) if bound.contains(name) => 4,
        PatternTerm::Const(_) => 2,
        PatternTerm::Var(_) => 0,
    };
    if known(&pattern.predicate) {
        score += 1;
    }
    score
}

/// Match a single pattern, returning extended bindings with the matched triple.
fn match_pattern(
    store: &TripleStore,
    pattern: &TriplePattern,
    bindings: &Bindings,
) -> Vec<(Bindings, Triple)> {
    let subject = pattern.subject.resolve(bindings);
    let object = pattern.object.resolve(bindings);
    let predicate = match pattern.predicate.resolve(bindings) {
        Some(Term::Iri(iri)) => Some(iri),
        // Only IRIs can sit in predicate position.
        Some(_) => return Vec::new(),
        None => None,
    };

    store
        .find(subject, predicate, object)
        .into_iter()
        .filter_map(|triple| {
            let mut extended = bindings.clone();
            let ok = bind(&pattern.subject, &triple.subject, &mut extended)
                && bind(
                    &pattern.predicate,
                    &Term::Iri(triple.predicate.clone()),
                    &mut extended,
                )
                && bind(&pattern.object, &triple.object, &mut extended);
            ok.then_some((extended, triple))
        })
        .collect()
}

/// Bind a variable or check a constant/already-bound value.
fn bind(term: &PatternTerm, value: &Term, bindings: &mut Bindings) -> bool {
    match term {
        PatternTerm::Const(c) => c == value,
        PatternTerm::Var(name) => match bindings.get(name) {
            Some(existing) => existing == value,
            None => {
                bindings.insert(name.clone(), value.clone());
                true
            }
        },
    }
}
