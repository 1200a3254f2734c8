//! Batch pipeline
//!
//! Runs extraction, name resolution and evaluation over a materialized batch
//! of records. Records are independent; only the aggregate counts and the
//! correction worklist are shared across them.

use std::collections::BTreeMap;

use serde::Serialize;

use microtrait_core::{
    AppConfig, EntityName, MatchResult, Result, TextRecord, TraitKind, TraitRecord,
    LIST_DELIMITER,
};

use crate::correction::CorrectionWorklist;
use crate::extract::Extractor;
use crate::metrics::{AggregateMetrics, Evaluator};
use crate::names::{
    filter_host_candidates, format_entity_name, locate_spans, parse_entity_name, split_names,
};
use crate::patterns::PatternLibrary;
use crate::{EntitySpan, TraitPrediction};

/// Reviewer name recorded when a correction comes from the input row itself
const ROW_CORRECTION_REVIEWER: &str = "input";

// ============================================================================
// Results
// ============================================================================

/// Extraction and scoring output for one record
#[derive(Debug, Clone, Serialize)]
pub struct RecordEvaluation {
    pub record_id: String,
    pub prediction: TraitPrediction,
    /// Recorded species/host names after text alignment and correction
    pub resolved_names: BTreeMap<TraitKind, Vec<String>>,
    /// Where the resolved names occur in the title and abstract
    pub spans: Vec<EntitySpan>,
    pub results: BTreeMap<TraitKind, MatchResult>,
}

/// Output of a batch run
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchReport {
    pub records: Vec<RecordEvaluation>,
    pub aggregate: AggregateMetrics,
    pub worklist: CorrectionWorklist,
    /// Records rejected as malformed
    pub errors: Vec<String>,
}

impl BatchReport {
    /// Number of records that made it through
    pub fn processed(&self) -> usize {
        self.records.len()
    }
}

// ============================================================================
// Pipeline
// ============================================================================

/// Extract, resolve and score records
#[derive(Debug, Clone)]
pub struct BatchPipeline<'a> {
    extractor: Extractor<'a>,
    evaluator: Evaluator<'a>,
    resolve_names: bool,
}

impl<'a> BatchPipeline<'a> {
    /// Create a pipeline from application configuration
    pub fn new(patterns: &'a PatternLibrary, config: &AppConfig) -> Result<Self> {
        Ok(Self {
            extractor: Extractor::from_config(patterns, &config.extraction),
            evaluator: Evaluator::from_config(patterns, config)?,
            resolve_names: true,
        })
    }

    /// Enable or disable alignment of recorded names with the text
    pub fn with_name_resolution(mut self, enabled: bool) -> Self {
        self.resolve_names = enabled;
        self
    }

    pub fn extractor(&self) -> &Extractor<'a> {
        &self.extractor
    }

    /// Predict traits for text-only records
    pub fn extract_batch(&self, records: &[TextRecord]) -> Result<Vec<TraitPrediction>> {
        records
            .iter()
            .map(|record| -> Result<TraitPrediction> {
                record.validate()?;
                Ok(self.extractor.predict(record))
            })
            .collect()
    }

    /// Process every row. Malformed rows are reported in
    /// [`BatchReport::errors`] and do not stop the batch.
    pub fn process_batch(&self, rows: &[TraitRecord]) -> BatchReport {
        tracing::info!(records = rows.len(), "Processing batch");

        let mut report = BatchReport::default();
        for (index, row) in rows.iter().enumerate() {
            match self.process_record(row, &mut report.worklist) {
                Ok(evaluation) => {
                    report.aggregate.add_record(&evaluation.results);
                    report.records.push(evaluation);
                }
                Err(e) => {
                    tracing::warn!(index, error = %e, "Skipping record");
                    report.errors.push(format!("record {}: {}", index, e));
                }
            }
        }

        tracing::info!(
            processed = report.processed(),
            errors = report.errors.len(),
            flagged = report.worklist.stats().pending,
            "Batch complete"
        );
        report
    }

    /// Extract, resolve names and score one row
    pub fn process_record(
        &self,
        row: &TraitRecord,
        worklist: &mut CorrectionWorklist,
    ) -> Result<RecordEvaluation> {
        row.record.validate()?;

        let record_id = row.record.id.clone();
        let corpus = row.record.title_abstract();
        let prediction = self.extractor.predict(&row.record);

        let mut recorded: BTreeMap<TraitKind, String> = row
            .recorded
            .iter()
            .map(|(kind, value)| (*kind, value.clone()))
            .collect();
        let mut resolved_names = BTreeMap::new();
        let mut spans = Vec::new();

        for kind in [TraitKind::Species, TraitKind::Hosts] {
            let Some(value) = row.recorded_value(kind) else {
                continue;
            };
            let listed = split_names(value);
            let names = if self.resolve_names {
                self.resolve(row, kind, &listed, &corpus, worklist)
            } else {
                listed
            };

            spans.extend(locate_spans(&names, &corpus, kind.as_str()));
            resolved_names.insert(
                kind,
                names.iter().map(|n| n.canonical.clone()).collect::<Vec<_>>(),
            );
            recorded.insert(
                kind,
                names
                    .iter()
                    .map(format_entity_name)
                    .collect::<Vec<_>>()
                    .join(LIST_DELIMITER),
            );
        }

        let predicted = self.predicted_fields(row, &prediction);

        let results: BTreeMap<TraitKind, MatchResult> = self
            .evaluator
            .traits()
            .map(|kind| {
                let result = self.evaluator.evaluate(
                    kind,
                    predicted.get(&kind).map(String::as_str),
                    recorded.get(&kind).map(String::as_str),
                );
                (kind, result)
            })
            .collect();

        tracing::debug!(record_id = %record_id, "Evaluated record");

        Ok(RecordEvaluation {
            record_id,
            prediction,
            resolved_names,
            spans,
            results,
        })
    }

    /// Align recorded names with the text, queueing unmatched names and
    /// applying any correction carried by the row.
    fn resolve(
        &self,
        row: &TraitRecord,
        kind: TraitKind,
        listed: &[EntityName],
        corpus: &str,
        worklist: &mut CorrectionWorklist,
    ) -> Vec<EntityName> {
        let queued = worklist.add_if_missing(&row.record.id, kind, listed, corpus);
        if let Some(id) = queued {
            if let Some(corrected) = row.corrected.get(&kind).filter(|c| !c.trim().is_empty()) {
                let corrected = split_names(corrected)
                    .into_iter()
                    .map(|n| n.canonical)
                    .collect();
                worklist.apply_correction(id, ROW_CORRECTION_REVIEWER, corrected);
            }
        }

        // Only this row's own item applies; record ids need not be unique
        let all: Vec<String> = listed.iter().map(|n| n.canonical.clone()).collect();
        let resolved = worklist.resolve(queued, &all).unwrap_or_default();

        // Keep synonyms for names that survived, parse names a reviewer added
        resolved
            .iter()
            .filter_map(|name| {
                listed
                    .iter()
                    .find(|n| n.matches(name))
                    .cloned()
                    .or_else(|| parse_entity_name(name))
            })
            .collect()
    }

    /// Upstream tagger output takes precedence; the extractor fills in the
    /// traits it covers. Host candidates naming the parasite are dropped.
    fn predicted_fields(
        &self,
        row: &TraitRecord,
        prediction: &TraitPrediction,
    ) -> BTreeMap<TraitKind, String> {
        let mut fields: BTreeMap<TraitKind, String> = TraitKind::ALL
            .iter()
            .filter_map(|&kind| {
                row.predicted_value(kind)
                    .map(str::to_string)
                    .or_else(|| prediction.field(kind))
                    .map(|value| (kind, value))
            })
            .collect();

        if let Some(hosts) = fields.get(&TraitKind::Hosts) {
            let parasites: Vec<String> = fields
                .get(&TraitKind::Species)
                .map(|species| split_names(species).into_iter().map(|n| n.canonical).collect())
                .unwrap_or_default();
            let candidates: Vec<String> =
                split_names(hosts).into_iter().map(|n| n.canonical).collect();
            let hosts = filter_host_candidates(self.extractor.patterns(), &candidates, &parasites);
            fields.insert(TraitKind::Hosts, hosts.join(LIST_DELIMITER));
        }

        fields
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn pipeline() -> BatchPipeline<'static> {
        BatchPipeline::new(PatternLibrary::global(), &AppConfig::default()).unwrap()
    }

    fn row(id: &str, title: &str, abstract_text: &str) -> TraitRecord {
        TraitRecord::new(TextRecord::new(id, title, abstract_text))
    }

    #[test]
    fn test_missing_id_is_reported() {
        let report = pipeline().process_batch(&[row("", "t", "a"), row("ok", "t", "a")]);
        assert_eq!(report.processed(), 1);
        assert_eq!(report.errors.len(), 1);
        assert!(report.errors[0].starts_with("record 0"));
    }

    #[test]
    fn test_unmentioned_recorded_host_is_queued_and_dropped() {
        let row = row(
            "r1",
            "Nosema bombycis n. sp. in silkworms",
            "Nosema bombycis infects Bombyx mori.",
        )
        .with_recorded(TraitKind::Hosts, "Bombyx mori; Antheraea pernyi")
        .with_predicted(TraitKind::Hosts, "Bombyx mori; Nosema bombycis");

        let report = pipeline().process_batch(&[row]);
        let evaluation = &report.records[0];

        assert_eq!(
            evaluation.resolved_names[&TraitKind::Hosts],
            vec!["Bombyx mori".to_string()]
        );
        assert_eq!(report.worklist.stats().pending, 1);
        // The parasite is filtered out of the host predictions
        assert_eq!(
            evaluation.results[&TraitKind::Hosts],
            MatchResult::new(1, 0, 0)
        );
        assert_eq!(
            evaluation.results[&TraitKind::Species],
            MatchResult::new(0, 1, 0)
        );
    }

    #[test]
    fn test_row_correction_is_applied() {
        let mut row = row("r2", "A microsporidium", "Infects Aedes aegypti larvae.")
            .with_recorded(TraitKind::Hosts, "Aedes aegypti; Culex pipiens")
            .with_predicted(TraitKind::Hosts, "Aedes aegypti; Culex quinquefasciatus");
        row.corrected
            .insert(TraitKind::Hosts, "Culex quinquefasciatus".to_string());

        let report = pipeline().process_batch(&[row]);
        let evaluation = &report.records[0];

        assert_eq!(
            evaluation.resolved_names[&TraitKind::Hosts],
            vec!["Aedes aegypti".to_string(), "Culex quinquefasciatus".to_string()]
        );
        assert_eq!(report.worklist.stats().corrected, 1);
        assert_eq!(
            evaluation.results[&TraitKind::Hosts],
            MatchResult::new(2, 0, 0)
        );
    }

    #[test]
    fn test_rows_sharing_an_id_resolve_independently() {
        let first = row("same", "t", "Infects Aedes aegypti.")
            .with_recorded(TraitKind::Hosts, "Aedes aegypti; Culex pipiens");
        let second = row("same", "t", "Infects Bombyx mori.")
            .with_recorded(TraitKind::Hosts, "Bombyx mori");

        let report = pipeline().process_batch(&[first, second]);

        assert_eq!(
            report.records[0].resolved_names[&TraitKind::Hosts],
            vec!["Aedes aegypti".to_string()]
        );
        assert_eq!(
            report.records[1].resolved_names[&TraitKind::Hosts],
            vec!["Bombyx mori".to_string()]
        );
        assert_eq!(report.worklist.stats().pending, 1);
    }

    #[test]
    fn test_name_resolution_can_be_disabled() {
        let row = row("r3", "t", "Infects Aedes aegypti.")
            .with_recorded(TraitKind::Hosts, "Aedes aegypti; Culex pipiens");
        let report = pipeline().with_name_resolution(false).process_batch(&[row]);

        assert!(report.worklist.is_empty());
        assert_eq!(
            report.records[0].results[&TraitKind::Hosts],
            MatchResult::new(0, 0, 2)
        );
    }

    #[test]
    fn test_spans_for_resolved_names() {
        let row = row("r4", "Nosema apis in honey bees", "N. apis infects Apis mellifera.")
            .with_recorded(TraitKind::Species, "Nosema apis");
        let report = pipeline().process_batch(&[row]);
        let spans = &report.records[0].spans;
        assert_eq!(spans.len(), 2);
        assert!(spans.iter().all(|s| s.label == "species"));
    }

    #[test]
    fn test_every_trait_is_scored() {
        let report = pipeline().process_batch(&[row("r5", "t", "a")]);
        assert_eq!(report.records[0].results.len(), TraitKind::ALL.len());
        assert!(report.aggregate.overall().is_empty());
    }

    #[test]
    fn test_extract_batch() {
        let records = vec![TextRecord::new("a", "Title", "Spores 4 x 2 um.")];
        let predictions = pipeline().extract_batch(&records).unwrap();
        assert_eq!(predictions[0].spore_dimensions.len(), 1);

        assert!(pipeline()
            .extract_batch(&[TextRecord::new(" ", "", "")])
            .is_err());
    }
}
