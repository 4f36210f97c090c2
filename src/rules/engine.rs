//! Forward-chaining materializer.
//!
//! Runs inference rules to a fixpoint or the iteration cap, inserting every
//! derived triple into the store and recording which rule and which matched
//! triples produced it.

use std::collections::{BTreeMap, HashSet};

use serde::Serialize;

use crate::config::RulesConfig;
use crate::error::RuleError;
use crate::graph::{Triple, TripleStore};
use crate::query::pattern;

use super::rule::{InferenceRule, RuleSet};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Configuration for the materializer.
#[derive(Debug, Clone)]
pub struct MaterializerConfig {
    /// Maximum forward-chaining iterations (default: 16).
    pub max_iterations: usize,
}

impl Default for MaterializerConfig {
    fn default() -> Self {
        Self { max_iterations: 16 }
    }
}

impl From<&RulesConfig> for MaterializerConfig {
    fn from(config: &RulesConfig) -> Self {
        Self {
            max_iterations: config.max_iterations,
        }
    }
}

// ---------------------------------------------------------------------------
// Result types
// ---------------------------------------------------------------------------

/// A single derived triple with provenance.
#[derive(Debug, Clone, Serialize)]
pub struct DerivedTriple {
    pub triple: Triple,
    pub rule_name: String,
    pub antecedent_triples: Vec<Triple>,
    /// 1-based round in which the triple was derived.
    pub iteration: usize,
}

/// Result of one materialization pass.
#[derive(Debug, Clone, Default, Serialize)]
pub struct MaterializeResult {
    /// Newly inserted triples, in insertion order.
    pub derived: Vec<DerivedTriple>,
    pub iterations: usize,
    pub reached_fixpoint: bool,
    /// Per-rule derivation counts.
    pub rule_stats: BTreeMap<String, usize>,
}

impl MaterializeResult {
    /// Number of triples newly added to the store.
    pub fn added(&self) -> usize {
        self.derived.len()
    }
}

// ---------------------------------------------------------------------------
// Materializer
// ---------------------------------------------------------------------------

/// Forward-chaining materializer.
#[derive(Debug, Clone)]
pub struct Materializer {
    config: MaterializerConfig,
    rule_sets: Vec<RuleSet>,
}

impl Materializer {
    pub fn new(config: MaterializerConfig) -> Self {
        Self {
            config,
            rule_sets: Vec::new(),
        }
    }

    /// Add a rule set, validating every rule in it.
    pub fn with_rules(mut self, rules: RuleSet) -> Result<Self, RuleError> {
        for rule in &rules.rules {
            rule.validate()?;
        }
        tracing::debug!(rule_set = %rules.name, rules = rules.enabled_count(), "rule set loaded");
        self.rule_sets.push(rules);
        Ok(self)
    }

    /// Enabled rules across all rule sets.
    pub fn rules(&self) -> impl Iterator<Item = &InferenceRule> {
        self.rule_sets
            .iter()
            .flat_map(|rs| rs.rules.iter())
            .filter(|r| r.enabled)
    }

    /// Apply all rules until no new triple results or the iteration cap is hit.
    ///
    /// Each round matches against the store as it stood at the start of the
    /// round, then commits. A triple already in the store is never counted.
    pub fn run(&self, store: &TripleStore) -> MaterializeResult {
        let mut result = MaterializeResult::default();
        let rules: Vec<&InferenceRule> = self.rules().collect();

        for iter in 0..self.config.max_iterations {
            let iteration = iter + 1;
            result.iterations = iteration;
            let mut new_this_round: Vec<DerivedTriple> = Vec::new();
            let mut round_set: HashSet<Triple> = HashSet::new();

            for rule in &rules {
                let solutions = pattern::match_patterns(store, &rule.antecedents, &rule.filters);
                for solution in &solutions {
                    for consequent in &rule.consequents {
                        let Some(triple) = consequent.instantiate(&solution.bindings) else {
                            continue;
                        };
                        if store.contains(&triple) || !round_set.insert(triple.clone()) {
                            continue;
                        }
                        new_this_round.push(DerivedTriple {
                            triple,
                            rule_name: rule.name.clone(),
                            antecedent_triples: solution.matched.clone(),
                            iteration,
                        });
                    }
                }
            }

            if new_this_round.is_empty() {
                result.reached_fixpoint = true;
                break;
            }

            let mut committed = 0;
            for dt in new_this_round {
                if store.insert(dt.triple.clone()) {
                    *result.rule_stats.entry(dt.rule_name.clone()).or_insert(0) += 1;
                    result.derived.push(dt);
                    committed += 1;
                }
            }
            tracing::debug!(iteration, committed, "materialization round");
        }

        if !result.reached_fixpoint {
            tracing::warn!(
                max_iterations = self.config.max_iterations,
                "materialization stopped at the iteration cap before reaching a fixpoint"
            );
        }
        tracing::info!(
            added = result.added(),
            iterations = result.iterations,
            "materialization complete"
        );
        result
    }
}

impl Default for Materializer {
    /// The built-in rules with the default configuration.
    fn default() -> Self {
        Self {
            config: MaterializerConfig::default(),
            rule_sets: vec![RuleSet::builtin()],
        }
    }
}
