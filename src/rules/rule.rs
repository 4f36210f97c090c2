//! Inference rule definitions and rule sets.
//!
//! Rules are Horn-style: a conjunction of antecedent patterns (plus `IN`
//! filters) implies each consequent pattern. Rules are built in code or
//! parsed from a small text format:
//!
//! ```text
//! @rule risk-propagation-quarantine
//!   match: (?milk a ct:MilkBatch), (?milk ct:hasZoonosisRisk ?risk), (?risk ct:level ?lvl)
//!   filter: ?lvl in "High" "Critical"
//!   match: (?cheese a ct:CheeseBatch), (?cheese ct:derivedFromMilk ?milk)
//!   produce: (?cheese ct:requiresQuarantine true)
//! ```

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::RuleError;
use crate::query::pattern::{Filter, PatternTerm, TriplePattern};
use crate::term::{Literal, Term};
use crate::vocab::{self, Class, Property};

/// Name of the built-in quarantine rule.
pub const RISK_PROPAGATION: &str = "risk-propagation-quarantine";

// ---------------------------------------------------------------------------
// Inference rule
// ---------------------------------------------------------------------------

/// A single inference rule: match antecedents, produce consequents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InferenceRule {
    pub name: String,
    pub antecedents: Vec<TriplePattern>,
    #[serde(default)]
    pub filters: Vec<Filter>,
    pub consequents: Vec<TriplePattern>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

impl InferenceRule {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            antecedents: Vec::new(),
            filters: Vec::new(),
            consequents: Vec::new(),
            enabled: true,
        }
    }

    pub fn with_antecedents(mut self, antecedents: Vec<TriplePattern>) -> Self {
        self.antecedents = antecedents;
        self
    }

    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn with_consequents(mut self, consequents: Vec<TriplePattern>) -> Self {
        self.consequents = consequents;
        self
    }

    /// Every consequent variable must be bound by some antecedent.
    pub fn validate(&self) -> Result<(), RuleError> {
        let bound: HashSet<&str> = self.antecedents.iter().flat_map(|p| p.variables()).collect();
        for consequent in &self.consequents {
            if let Some(var) = consequent.variables().find(|v| !bound.contains(v)) {
                return Err(RuleError::UnboundConsequent {
                    rule_name: self.name.clone(),
                    variable: var.to_string(),
                });
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Rule set
// ---------------------------------------------------------------------------

/// A collection of rules with metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleSet {
    pub name: String,
    pub rules: Vec<InferenceRule>,
    pub source: String,
}

impl RuleSet {
    /// The built-in rule set with the default high-risk levels.
    pub fn builtin() -> Self {
        Self::risk_propagation(&["High", "Critical"])
    }

    /// Milk at one of `levels` ⟹ every cheese derived from it requires quarantine.
    pub fn risk_propagation<S: AsRef<str>>(levels: &[S]) -> Self {
        let v = PatternTerm::var;
        let rule = InferenceRule::new(RISK_PROPAGATION)
            .with_antecedents(vec![
                TriplePattern::new(v("milk"), vocab::rdf_type(), Class::MilkBatch.iri()),
                TriplePattern::new(v("milk"), Property::HasZoonosisRisk.iri(), v("risk")),
                TriplePattern::new(v("risk"), Property::Level.iri(), v("lvl")),
                TriplePattern::new(v("cheese"), vocab::rdf_type(), Class::CheeseBatch.iri()),
                TriplePattern::new(v("cheese"), Property::DerivedFromMilk.iri(), v("milk")),
            ])
            .with_filter(Filter::in_strings("lvl", levels))
            .with_consequents(vec![TriplePattern::new(
                v("cheese"),
                Property::RequiresQuarantine.iri(),
                Term::Literal(Literal::Boolean(true)),
            )]);

        Self {
            name: "builtin".into(),
            rules: vec![rule],
            source: "builtin".into(),
        }
    }

    /// Parse rules from the text format shown in the module docs.
    ///
    /// `match:` and `filter:` lines accumulate, so long antecedent lists can
    /// span several lines. Lines outside an `@rule` block are ignored.
    pub fn parse_from_text(text: &str, source: &str) -> Result<Self, RuleError> {
        let mut rules = Vec::new();
        let mut lines = text.lines().peekable();

        while let Some(line) = lines.next() {
            let Some(rest) = line.trim().strip_prefix("@rule") else {
                continue;
            };
            let name = rest.trim().to_string();
            if name.is_empty() {
                return Err(RuleError::RuleParse {
                    rule_name: String::new(),
                    message: "@rule requires a name".into(),
                });
            }
            let mut rule = InferenceRule::new(name.clone());

            while let Some(next) = lines.next_if(|l| {
                let l = l.trim();
                !l.is_empty() && !l.starts_with('@')
            }) {
                let next = next.trim();
                let named = |e: RuleError| match e {
                    RuleError::RuleParse { message, .. } => RuleError::RuleParse {
                        rule_name: name.clone(),
                        message,
                    },
                    other => other,
                };
                if let Some(patterns) = next.strip_prefix("match:") {
                    for p in split_patterns(patterns) {
                        rule.antecedents.push(TriplePattern::parse(p).map_err(named)?);
                    }
                } else if let Some(patterns) = next.strip_prefix("produce:") {
                    for p in split_patterns(patterns) {
                        rule.consequents.push(TriplePattern::parse(p).map_err(named)?);
                    }
                } else if let Some(filter) = next.strip_prefix("filter:") {
                    rule.filters.push(parse_filter(filter).map_err(|message| {
                        RuleError::RuleParse {
                            rule_name: name.clone(),
                            message,
                        }
                    })?);
                }
                // Unknown keys are skipped.
            }

            if rule.antecedents.is_empty() || rule.consequents.is_empty() {
                return Err(RuleError::RuleParse {
                    rule_name: name,
                    message: "a rule needs at least one match: and one produce: pattern".into(),
                });
            }
            rule.validate()?;
            rules.push(rule);
        }

        Ok(Self {
            name: source.to_string(),
            rules,
            source: source.to_string(),
        })
    }

    /// Return the total number of enabled rules.
    pub fn enabled_count(&self) -> usize {
        self.rules.iter().filter(|r| r.enabled).count()
    }
}

/// `?var in term term ...`
fn parse_filter(s: &str) -> Result<Filter, String> {
    let mut tokens = s.split_whitespace();
    let variable = tokens
        .next()
        .and_then(|t| t.strip_prefix('?'))
        .filter(|v| !v.is_empty())
        .ok_or_else(|| format!("filter must start with a variable: '{}'", s.trim()))?;
    if tokens.next() != Some("in") {
        return Err(format!("only `?var in ...` filters are supported: '{}'", s.trim()));
    }
    let values = tokens
        .map(|t| match PatternTerm::parse(t)? {
            PatternTerm::Const(term) => Ok(term),
            PatternTerm::Var(v) => Err(format!("filter values must be constants, got ?{v}")),
        })
        .collect::<Result<Vec<_>, _>>()?;
    if values.is_empty() {
        return Err("filter lists no values".into());
    }
    Ok(Filter::In {
        variable: variable.to_string(),
        values,
    })
}

/// Split a comma-separated list of `(...)` patterns.
fn split_patterns(s: &str) -> Vec<&str> {
    let s = s.trim();
    let mut results = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;

    for (i, ch) in s.char_indices() {
        match ch {
            '(' => {
                if depth == 0 {
                    start = i;
                }
                depth += 1;
            }
            ')' if depth > 0 => {
                depth -= 1;
                if depth == 0 {
                    results.push(&s[start..=i]);
                }
            }
            _ => {}
        }
    }

    if results.is_empty() && !s.is_empty() {
        results.push(s);
    }
    results
}

#[cfg(test)]
mod tests {
    use super::*;

    const RULE_TEXT: &str = r#"
# quarantine rule, equivalent to the builtin
@rule risk-propagation-quarantine
  match: (?milk a ct:MilkBatch), (?milk ct:hasZoonosisRisk ?risk), (?risk ct:level ?lvl)
  filter: ?lvl in "High" "Critical"
  match: (?cheese a ct:CheeseBatch), (?cheese ct:derivedFromMilk ?milk)
  produce: (?cheese ct:requiresQuarantine true)
"#;

    #[test]
    fn builtin_has_quarantine_rule() {
        let rs = RuleSet::builtin();
        assert_eq!(rs.rules.len(), 1);
        assert_eq!(rs.enabled_count(), 1);
        let rule = &rs.rules[0];
        assert_eq!(rule.name, RISK_PROPAGATION);
        assert_eq!(rule.antecedents.len(), 5);
        assert_eq!(rule.consequents.len(), 1);
        rule.validate().unwrap();
    }

    #[test]
    fn text_rule_matches_builtin() {
        let parsed = RuleSet::parse_from_text(RULE_TEXT, "test").unwrap();
        assert_eq!(parsed.rules, RuleSet::builtin().rules);
        assert_eq!(parsed.source, "test");
    }

    #[test]
    fn unbound_consequent_rejected() {
        let text = "@rule bad\n  match: (?a a ct:MilkBatch)\n  produce: (?b ct:requiresQuarantine true)\n";
        let err = RuleSet::parse_from_text(text, "test").unwrap_err();
        assert!(matches!(
            err,
            RuleError::UnboundConsequent { rule_name, variable } if rule_name == "bad" && variable == "b"
        ));
    }

    #[test]
    fn parse_errors_carry_rule_name() {
        let text = "@rule broken\n  match: (?a ct:level)\n  produce: (?a ct:level \"x\")\n";
        let err = RuleSet::parse_from_text(text, "test").unwrap_err();
        assert!(matches!(err, RuleError::RuleParse { rule_name, .. } if rule_name == "broken"));

        let text = "@rule f\n  match: (?a ct:level ?l)\n  filter: ?l equals \"x\"\n  produce: (?a ct:level \"y\")\n";
        assert!(RuleSet::parse_from_text(text, "test").is_err());

        assert!(RuleSet::parse_from_text("@rule\n", "test").is_err());
        assert!(RuleSet::parse_from_text("@rule empty\n", "test").is_err());
    }

    #[test]
    fn text_without_rules_is_empty_set() {
        let rs = RuleSet::parse_from_text("just a comment\n", "test").unwrap();
        assert!(rs.rules.is_empty());
    }

    #[test]
    fn split_patterns_handles_commas_and_spacing() {
        assert_eq!(
            split_patterns(" (?a b ?c),(?d e ?f) "),
            vec!["(?a b ?c)", "(?d e ?f)"]
        );
        assert_eq!(split_patterns("?a b ?c"), vec!["?a b ?c"]);
    }
}
