//! Evaluation metrics for trait extraction
//!
//! Scores predicted trait values against recorded ground truth. Every trait
//! goes through one [`Evaluator`] whose match predicate (exact set, numeric
//! set or hierarchical substring) is chosen per trait from configuration.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use microtrait_core::config::default_predicate;
use microtrait_core::{
    AppConfig, EntityName, Locality, MatchPredicate, MatchResult, Result, TraitKind,
};

use crate::extract::Extractor;
use crate::locality;
use crate::names::parse_entity_name;
use crate::normalize::{collapse_whitespace, split_top_level};
use crate::patterns::PatternLibrary;

// ============================================================================
// Match Functions
// ============================================================================

/// Score two sets. An absent side is an empty set.
pub fn match_sets<T: Ord>(predicted: &BTreeSet<T>, recorded: &BTreeSet<T>) -> MatchResult {
    MatchResult::new(
        predicted.intersection(recorded).count(),
        predicted.difference(recorded).count(),
        recorded.difference(predicted).count(),
    )
}

/// Score species/host names, treating a predicted synonym of a recorded
/// name as that name. Comparison is case-insensitive.
pub fn match_entity_names(predicted: &[EntityName], recorded: &[EntityName]) -> MatchResult {
    let recorded_keys: BTreeSet<String> = recorded
        .iter()
        .map(|name| name.canonical.to_lowercase())
        .collect();

    let predicted_keys: BTreeSet<String> = predicted
        .iter()
        .map(|name| {
            recorded
                .iter()
                .find(|r| {
                    r.matches(&name.canonical) || name.aliases.iter().any(|alias| r.matches(alias))
                })
                .map_or_else(
                    || name.canonical.to_lowercase(),
                    |r| r.canonical.to_lowercase(),
                )
        })
        .collect();

    match_sets(&predicted_keys, &recorded_keys)
}

/// Two-level locality matching.
///
/// Regions match case-insensitively. Under a matched region, a recorded
/// subregion is found when it contains at least one predicted subregion
/// of that region; a predicted subregion is spurious when no recorded
/// subregion contains it. An unmatched region counts once along with each
/// of its subregions.
pub fn match_localities(predicted: Option<&Locality>, recorded: Option<&Locality>) -> MatchResult {
    let (predicted, recorded) = match (predicted, recorded) {
        (None, None) => return MatchResult::default(),
        (None, Some(recorded)) => return MatchResult::new(0, 0, locality::count(recorded)),
        (Some(predicted), None) => return MatchResult::new(0, locality::count(predicted), 0),
        (Some(predicted), Some(recorded)) => (predicted, recorded),
    };

    let mut result = MatchResult::default();

    for entry in &recorded.entries {
        let Some(guess) = predicted.get(&entry.region) else {
            result.false_negative += 1 + entry.subregions.len();
            continue;
        };
        result.true_positive += 1;

        let guessed: Vec<String> = guess.subregions.iter().map(|s| s.to_lowercase()).collect();
        let actual: Vec<String> = entry.subregions.iter().map(|s| s.to_lowercase()).collect();

        for subregion in &actual {
            if guessed.iter().any(|g| subregion.contains(g.as_str())) {
                result.true_positive += 1;
            } else {
                result.false_negative += 1;
            }
        }
        result.false_positive += guessed
            .iter()
            .filter(|g| !actual.iter().any(|a| a.contains(g.as_str())))
            .count();
    }

    for entry in &predicted.entries {
        if !recorded.contains_region(&entry.region) {
            result.false_positive += 1 + entry.subregions.len();
        }
    }

    result
}

/// Split a field into list items (`;`) and alternatives (`|`) at the top
/// level, leaving parenthesized text intact.
fn split_items(value: &str) -> Vec<&str> {
    split_top_level(value, ';')
        .into_iter()
        .flat_map(|item| split_top_level(item, '|'))
        .collect()
}

// ============================================================================
// Evaluator
// ============================================================================

/// Per-trait scoring with a configurable match predicate
#[derive(Debug, Clone)]
pub struct Evaluator<'a> {
    extractor: Extractor<'a>,
    predicates: BTreeMap<TraitKind, MatchPredicate>,
}

impl<'a> Evaluator<'a> {
    /// Create an evaluator using the default predicate for every trait
    pub fn new(patterns: &'a PatternLibrary) -> Self {
        Self {
            extractor: Extractor::new(patterns),
            predicates: TraitKind::ALL
                .iter()
                .map(|&kind| (kind, default_predicate(kind)))
                .collect(),
        }
    }

    /// Create an evaluator from application configuration
    pub fn from_config(patterns: &'a PatternLibrary, config: &AppConfig) -> Result<Self> {
        let mut evaluator = Self::new(patterns)
            .with_extractor(Extractor::from_config(patterns, &config.extraction));
        evaluator.predicates.extend(config.evaluation.predicates()?);
        Ok(evaluator)
    }

    /// Use a specific extractor to normalize numeric values
    pub fn with_extractor(mut self, extractor: Extractor<'a>) -> Self {
        self.extractor = extractor;
        self
    }

    /// Override the predicate for one trait
    pub fn with_predicate(mut self, kind: TraitKind, predicate: MatchPredicate) -> Self {
        self.predicates.insert(kind, predicate);
        self
    }

    /// Predicate in effect for a trait
    pub fn predicate(&self, kind: TraitKind) -> MatchPredicate {
        self.predicates
            .get(&kind)
            .copied()
            .unwrap_or_else(|| default_predicate(kind))
    }

    /// Traits this evaluator scores
    pub fn traits(&self) -> impl Iterator<Item = TraitKind> + '_ {
        self.predicates.keys().copied()
    }

    /// Score one trait of one record. Blank values are absent.
    pub fn evaluate(
        &self,
        kind: TraitKind,
        predicted: Option<&str>,
        recorded: Option<&str>,
    ) -> MatchResult {
        let predicted = predicted.filter(|v| !v.trim().is_empty());
        let recorded = recorded.filter(|v| !v.trim().is_empty());

        match self.predicate(kind) {
            MatchPredicate::HierarchicalSubstring => match_localities(
                locality::parse_field(predicted).as_ref(),
                locality::parse_field(recorded).as_ref(),
            ),
            MatchPredicate::ExactSet if matches!(kind, TraitKind::Species | TraitKind::Hosts) => {
                match_entity_names(&self.entity_names(predicted), &self.entity_names(recorded))
            }
            MatchPredicate::ExactSet => {
                match_sets(&self.tokens(predicted), &self.tokens(recorded))
            }
            MatchPredicate::NumericSet => match_sets(
                &self.numeric_values(kind, predicted),
                &self.numeric_values(kind, recorded),
            ),
        }
    }

    fn entity_names(&self, value: Option<&str>) -> Vec<EntityName> {
        let Some(value) = value else {
            return Vec::new();
        };
        let mut names: Vec<EntityName> = Vec::new();
        for name in split_items(value).into_iter().filter_map(parse_entity_name) {
            if !names.iter().any(|n| n.matches(&name.canonical)) {
                names.push(name);
            }
        }
        names
    }

    fn tokens(&self, value: Option<&str>) -> BTreeSet<String> {
        value
            .map(|value| {
                split_items(value)
                    .into_iter()
                    .map(|item| collapse_whitespace(item).to_lowercase())
                    .filter(|item| !item.is_empty())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Canonical numeric renderings, so "5.0-6" and "5 to 6" compare equal.
    /// An item that does not parse is kept as normalized text.
    fn numeric_values(&self, kind: TraitKind, value: Option<&str>) -> BTreeSet<String> {
        let Some(value) = value else {
            return BTreeSet::new();
        };

        let mut values = BTreeSet::new();
        for item in split_items(value) {
            let parsed: Vec<String> = match kind {
                TraitKind::PolarTubeCoils => self
                    .extractor
                    .parse_coil_range(item)
                    .map(|c| c.canonical())
                    .into_iter()
                    .collect(),
                TraitKind::SporeDimensions => self
                    .extractor
                    .extract_dimensions(item)
                    .iter()
                    .map(|pair| pair.canonical())
                    .collect(),
                _ => self
                    .extractor
                    .parse_dimension(item)
                    .map(|m| m.canonical())
                    .into_iter()
                    .collect(),
            };

            if parsed.is_empty() {
                let text = collapse_whitespace(item).to_lowercase();
                if !text.is_empty() {
                    values.insert(text);
                }
            } else {
                values.extend(parsed);
            }
        }
        values
    }
}

// ============================================================================
// Aggregate Metrics
// ============================================================================

/// Micro-averaged metrics across a batch of records
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AggregateMetrics {
    pub per_trait: BTreeMap<TraitKind, MatchResult>,
    pub num_records: usize,
}

impl AggregateMetrics {
    /// Add one record's per-trait results
    pub fn add_record(&mut self, results: &BTreeMap<TraitKind, MatchResult>) {
        for (kind, result) in results {
            *self.per_trait.entry(*kind).or_default() += *result;
        }
        self.num_records += 1;
    }

    /// Summed counts for a trait
    pub fn get(&self, kind: TraitKind) -> MatchResult {
        self.per_trait.get(&kind).copied().unwrap_or_default()
    }

    /// Summed counts across all traits
    pub fn overall(&self) -> MatchResult {
        self.per_trait.values().copied().sum()
    }

    /// Merge another aggregate, e.g. from a separate shard of records
    pub fn merge(&mut self, other: &AggregateMetrics) {
        for (kind, result) in &other.per_trait {
            *self.per_trait.entry(*kind).or_default() += *result;
        }
        self.num_records += other.num_records;
    }

    /// Generate a report string
    pub fn report(&self) -> String {
        let mut report = format!(
            "=== Trait Extraction Quality Report ===\n\nRecords evaluated: {}\n\n",
            self.num_records
        );

        for (kind, result) in &self.per_trait {
            report.push_str(&format!(
                "{}:\n  \
                   Precision: {:.1}%\n  \
                   Recall:    {:.1}%\n  \
                   F1 Score:  {:.1}%\n  \
                   TP: {} | FP: {} | FN: {}\n\n",
                kind,
                result.precision() * 100.0,
                result.recall() * 100.0,
                result.f1_score() * 100.0,
                result.true_positive,
                result.false_positive,
                result.false_negative,
            ));
        }

        let overall = self.overall();
        report.push_str(&format!(
            "Overall:\n  Precision: {:.1}%\n  Recall:    {:.1}%\n",
            overall.precision() * 100.0,
            overall.recall() * 100.0,
        ));
        report
    }
}

// ============================================================================
// Tests
// ============================================================================
