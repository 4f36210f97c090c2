//! Processing pipeline: ingest, then materialize, then check.
//!
//! The [`Pipeline`] owns the run's [`TripleStore`] and hands it by reference
//! to each stage. Stages run strictly in order; the store has one writer
//! (ingestion, then materialization) and the checks only read it.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use crate::config::TraceConfig;
use crate::error::{ConfigError, TraceResult};
use crate::graph::TripleStore;
use crate::listener::{ChangeListener, IngestStats, NotificationSource, StopReason};
use crate::query::{CheckReport, run_checks};
use crate::rules::{DerivedTriple, MaterializeResult, Materializer, MaterializerConfig, RuleSet};
use crate::translate::Translator;

/// Built-in pipeline stage types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    /// Consume change notifications into the store.
    Ingest,
    /// Run the rule materializer once.
    Materialize,
    /// Run the compliance checks.
    Check,
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Ingest => "ingest",
            Self::Materialize => "materialize",
            Self::Check => "check",
        })
    }
}

/// Summary of a full run.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub ingest: IngestStats,
    pub stop_reason: StopReason,
    pub materialized: usize,
    pub iterations: usize,
    pub reached_fixpoint: bool,
    pub triple_count: usize,
    pub report: CheckReport,
    /// Every triple the materializer added, with its provenance.
    #[serde(skip)]
    pub derivations: Vec<DerivedTriple>,
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Ingested {} of {} notification(s) ({} ignored, {} skipped), {} triple(s) added",
            self.ingest.applied,
            self.ingest.received,
            self.ingest.ignored,
            self.ingest.skipped,
            self.ingest.triples_added
        )?;
        writeln!(
            f,
            "Materialized {} triple(s) in {} iteration(s){}",
            self.materialized,
            self.iterations,
            if self.reached_fixpoint { "" } else { " (iteration cap hit)" }
        )?;
        writeln!(f, "Store holds {} triple(s)", self.triple_count)?;
        write!(f, "{}", self.report)
    }
}

/// Owns the store and the configured stages for one run.
pub struct Pipeline {
    config: TraceConfig,
    store: Arc<TripleStore>,
    translator: Translator,
    materializer: Materializer,
}

impl Pipeline {
    /// Build a pipeline with a fresh, empty store.
    pub fn new(config: TraceConfig) -> TraceResult<Self> {
        config.validate()?;

        let mut materializer = Materializer::new(MaterializerConfig::from(&config.rules))
            .with_rules(RuleSet::risk_propagation(&config.rules.quarantine_levels))?;
        if let Some(path) = &config.rules.rules_file {
            let text = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
                path: path.display().to_string(),
                source: e,
            })?;
            let extra = RuleSet::parse_from_text(&text, &path.display().to_string())?;
            tracing::info!(path = %path.display(), rules = extra.rules.len(), "extra rules loaded");
            materializer = materializer.with_rules(extra)?;
        }

        Ok(Self {
            config,
            store: Arc::new(TripleStore::new()),
            translator: Translator::new(),
            materializer,
        })
    }

    pub fn config(&self) -> &TraceConfig {
        &self.config
    }

    pub fn store(&self) -> &TripleStore {
        &self.store
    }

    /// Shared handle to the store, for readers outside the pipeline.
    pub fn store_handle(&self) -> Arc<TripleStore> {
        Arc::clone(&self.store)
    }

    /// Drain notifications from `source` into the store.
    pub fn ingest<S: NotificationSource>(&self, source: S) -> TraceResult<(IngestStats, StopReason)> {
        let _span = tracing::info_span!("stage", kind = %StageKind::Ingest).entered();
        let mut listener =
            ChangeListener::new(source, self.translator.clone(), self.config.listener.clone());
        let stop = listener.run(&self.store)?;
        let stats = listener.stats().clone();
        tracing::info!(
            received = stats.received,
            applied = stats.applied,
            triples = stats.triples_added,
            ?stop,
            "ingestion finished"
        );
        Ok((stats, stop))
    }

    pub fn materialize(&self) -> MaterializeResult {
        let _span = tracing::info_span!("stage", kind = %StageKind::Materialize).entered();
        self.materializer.run(&self.store)
    }

    pub fn checks(&self) -> CheckReport {
        let _span = tracing::info_span!("stage", kind = %StageKind::Check).entered();
        run_checks(
            &self.store,
            &self.config.checks,
            &self.config.rules.quarantine_levels,
        )
    }

    /// Ingest everything from `source`, materialize once, then run the checks.
    ///
    /// Failing checks are reported in the summary, never as an error.
    pub fn run<S: NotificationSource>(&self, source: S) -> TraceResult<RunSummary> {
        let (ingest, stop_reason) = self.ingest(source)?;
        let materialized = self.materialize();
        let report = self.checks();
        Ok(RunSummary {
            ingest,
            stop_reason,
            materialized: materialized.added(),
            iterations: materialized.iterations,
            reached_fixpoint: materialized.reached_fixpoint,
            triple_count: self.store.len(),
            report,
            derivations: materialized.derived,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{RuleError, TraceError};
    use crate::listener::{ChangeNotification, LineSource};
    use serde_json::json;
    use std::io::Cursor;

    fn events() -> String {
        [
            ChangeNotification::new(
                "lots",
                "M1",
                "milk",
                json!({"sourceFarmId": "F1", "riskAssessment": {"zoonosisIndicator": "High"}}),
            ),
            ChangeNotification::new("lots", "C1", "cheese", json!({"sourceMilkId": "M1"})),
        ]
        .iter()
        .map(|n| n.to_payload() + "\n")
        .collect()
    }

    #[test]
    fn run_end_to_end() {
        let pipeline = Pipeline::new(TraceConfig::default()).unwrap();
        let summary = pipeline.run(LineSource::new(Cursor::new(events()))).unwrap();
        assert_eq!(summary.stop_reason, StopReason::Closed);
        assert_eq!(summary.ingest.applied, 2);
        assert_eq!(summary.materialized, 1);
        assert!(summary.reached_fixpoint);
        assert!(summary.report.risk_propagation);
        assert_eq!(summary.report.traceability.len(), 1);
        assert!(summary.report.compliance_gaps.is_empty());
        assert_eq!(summary.triple_count, pipeline.store().len());
        assert!(summary.to_string().contains("[CHECK] Risk propagation quarantine: PASS"));
    }

    #[test]
    fn levels_come_from_config() {
        let mut config = TraceConfig::default();
        config.rules.quarantine_levels = vec!["Critical".into()];
        let pipeline = Pipeline::new(config).unwrap();
        let summary = pipeline.run(LineSource::new(Cursor::new(events()))).unwrap();
        assert_eq!(summary.materialized, 0);
        assert!(!summary.report.risk_propagation);
        assert!(summary.report.traceability.is_empty());
    }

    #[test]
    fn invalid_config_rejected() {
        let mut config = TraceConfig::default();
        config.rules.max_iterations = 0;
        assert!(matches!(Pipeline::new(config), Err(TraceError::Config(_))));
    }

    #[test]
    fn extra_rules_file_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("extra.rules");
        std::fs::write(
            &path,
            "@rule farm-quarantine\n  \
             match: (?c ct:requiresQuarantine true), (?c ct:derivedFromMilk ?m), (?m ct:sourcedFrom ?f)\n  \
             produce: (?f ct:requiresQuarantine true)\n",
        )
        .unwrap();
        let mut config = TraceConfig::default();
        config.rules.rules_file = Some(path);
        let pipeline = Pipeline::new(config).unwrap();
        let summary = pipeline.run(LineSource::new(Cursor::new(events()))).unwrap();
        assert_eq!(summary.materialized, 2);
        assert!(summary.iterations >= 2);
    }

    #[test]
    fn bad_rules_file_is_a_rule_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.rules");
        std::fs::write(&path, "@rule bad\n  match: (?a a ct:Farm)\n  produce: (?b a ct:Farm)\n")
            .unwrap();
        let mut config = TraceConfig::default();
        config.rules.rules_file = Some(path);
        assert!(matches!(
            Pipeline::new(config),
            Err(TraceError::Rule(RuleError::UnboundConsequent { .. }))
        ));

        let mut config = TraceConfig::default();
        config.rules.rules_file = Some(dir.path().join("absent.rules"));
        assert!(matches!(
            Pipeline::new(config),
            Err(TraceError::Config(ConfigError::Read { .. }))
        ));
    }
}
