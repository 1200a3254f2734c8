//! Microtrait Core - Domain models, errors, and shared types
//!
//! This crate defines the core abstractions used throughout microtrait:
//! - Text records (title + abstract) and batch rows with recorded/predicted fields
//! - Trait value models (spore dimensions, coil ranges, entity names, localities)
//! - Match results and precision/recall arithmetic
//! - Common error types
//! - Configuration management

pub mod config;

pub use config::{AppConfig, ConfigError, EvaluationConfig, ExtractionConfig, MatchPredicate};

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::ops::{Add, AddAssign};
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Core error types for microtrait operations
#[derive(Error, Debug)]
pub enum MicrotraitError {
    #[error("Record is missing required field: {0}")]
    MissingField(String),

    #[error("Pattern compilation failed for {name}: {message}")]
    Pattern { name: String, message: String },

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

pub type Result<T> = std::result::Result<T, MicrotraitError>;

// ============================================================================
// Field Delimiter Convention
// ============================================================================

/// Separates list items within one field ("Nosema apis; Nosema ceranae")
pub const LIST_DELIMITER: &str = "; ";

/// Separates alternative values within one field, and subregions inside a locality
pub const ALTERNATIVE_DELIMITER: &str = " | ";

/// Joins title and abstract into the search corpus
pub const TITLE_ABSTRACT_SEPARATOR: &str = " ::: ";

// ============================================================================
// Text Records
// ============================================================================

/// A paper title and abstract
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextRecord {
    /// Record identifier
    pub id: String,

    /// Paper title
    #[serde(default)]
    pub title: String,

    /// Paper abstract
    #[serde(default, rename = "abstract")]
    pub abstract_text: String,
}

impl TextRecord {
    /// Create a new record
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        abstract_text: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            abstract_text: abstract_text.into(),
        }
    }

    /// Title and abstract joined with [`TITLE_ABSTRACT_SEPARATOR`]
    pub fn title_abstract(&self) -> String {
        format!(
            "{}{}{}",
            self.title, TITLE_ABSTRACT_SEPARATOR, self.abstract_text
        )
    }

    /// Reject records without an identifier
    pub fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(MicrotraitError::MissingField("id".to_string()));
        }
        Ok(())
    }
}

/// One row of a batch: the text plus recorded (ground truth) and
/// externally predicted trait fields, keyed by trait.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TraitRecord {
    #[serde(flatten)]
    pub record: TextRecord,

    /// Manually curated values
    #[serde(default)]
    pub recorded: BTreeMap<TraitKind, String>,

    /// Values predicted by an upstream tagger
    #[serde(default)]
    pub predicted: BTreeMap<TraitKind, String>,

    /// Human-corrected entity lists (species/hosts), when available
    #[serde(default)]
    pub corrected: BTreeMap<TraitKind, String>,
}

impl TraitRecord {
    /// Create a row with no trait fields
    pub fn new(record: TextRecord) -> Self {
        Self {
            record,
            ..Default::default()
        }
    }

    /// Set a recorded value
    pub fn with_recorded(mut self, kind: TraitKind, value: impl Into<String>) -> Self {
        self.recorded.insert(kind, value.into());
        self
    }

    /// Set a predicted value
    pub fn with_predicted(mut self, kind: TraitKind, value: impl Into<String>) -> Self {
        self.predicted.insert(kind, value.into());
        self
    }

    /// Recorded value, ignoring blank strings
    pub fn recorded_value(&self, kind: TraitKind) -> Option<&str> {
        non_blank(self.recorded.get(&kind))
    }

    /// Predicted value, ignoring blank strings
    pub fn predicted_value(&self, kind: TraitKind) -> Option<&str> {
        non_blank(self.predicted.get(&kind))
    }
}

fn non_blank(value: Option<&String>) -> Option<&str> {
    value.map(|s| s.as_str()).filter(|s| !s.trim().is_empty())
}

// ============================================================================
// Traits
// ============================================================================

/// Trait categories that can be extracted and scored
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TraitKind {
    Species,
    Hosts,
    InfectionSite,
    Locality,
    PolarTubeCoils,
    PolarTubeLength,
    SporeDimensions,
    Nucleus,
}

impl TraitKind {
    /// All trait kinds, in report order
    pub const ALL: [TraitKind; 8] = [
        Self::Species,
        Self::Hosts,
        Self::InfectionSite,
        Self::Locality,
        Self::PolarTubeCoils,
        Self::PolarTubeLength,
        Self::SporeDimensions,
        Self::Nucleus,
    ];

    /// Get the string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Species => "species",
            Self::Hosts => "hosts",
            Self::InfectionSite => "infection_site",
            Self::Locality => "locality",
            Self::PolarTubeCoils => "polar_tube_coils",
            Self::PolarTubeLength => "polar_tube_length",
            Self::SporeDimensions => "spore_dimensions",
            Self::Nucleus => "nucleus",
        }
    }
}

impl std::fmt::Display for TraitKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for TraitKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|kind| kind.as_str() == s.trim().to_lowercase())
            .ok_or_else(|| ConfigError::InvalidValue {
                key: "trait".to_string(),
                value: s.to_string(),
            })
    }
}

// ============================================================================
// Measurements
// ============================================================================

/// A single linear measurement or a min-max range.
///
/// `high` absent means a point estimate. `center` holds the parenthetical
/// central estimate when one was reported, e.g. the `4.5` in `4-5 (4.5)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DimensionMeasurement {
    pub low: f64,
    pub high: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub center: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
}

impl DimensionMeasurement {
    /// A point estimate
    pub fn point(value: f64) -> Self {
        Self {
            low: value,
            high: None,
            center: None,
            unit: None,
        }
    }

    /// A range; `None` when `high < low` or either bound is not finite
    pub fn range(low: f64, high: f64) -> Option<Self> {
        if !low.is_finite() || !high.is_finite() || high < low {
            return None;
        }
        Some(Self {
            low,
            high: Some(high),
            center: None,
            unit: None,
        })
    }

    /// Set the central estimate
    pub fn with_center(mut self, center: f64) -> Self {
        self.center = Some(center);
        self
    }

    /// Set the unit
    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }

    /// Reported center, or the midpoint of the range
    pub fn average(&self) -> f64 {
        self.center
            .unwrap_or_else(|| (self.low + self.high.unwrap_or(self.low)) / 2.0)
    }

    /// Canonical numeric rendering used for comparisons ("3-5", "4")
    pub fn canonical(&self) -> String {
        match self.high {
            Some(high) if high != self.low => format!("{}-{}", self.low, high),
            _ => format!("{}", self.low),
        }
    }
}

impl std::fmt::Display for DimensionMeasurement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (self.center, self.high) {
            (Some(center), Some(high)) => write!(f, "{} ({}-{})", center, self.low, high)?,
            (Some(center), None) => write!(f, "{} ({})", self.low, center)?,
            (None, Some(high)) => write!(f, "{}-{}", self.low, high)?,
            (None, None) => write!(f, "{}", self.low)?,
        }
        if let Some(unit) = &self.unit {
            write!(f, " {}", unit)?;
        }
        Ok(())
    }
}

/// Spore length x width
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SporeDimensionPair {
    pub length: DimensionMeasurement,
    pub width: DimensionMeasurement,
}

impl SporeDimensionPair {
    /// Canonical numeric rendering used for comparisons ("3-5 x 2-3")
    pub fn canonical(&self) -> String {
        format!("{} x {}", self.length.canonical(), self.width.canonical())
    }
}

impl std::fmt::Display for SporeDimensionPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} x {}", self.length, self.width)
    }
}

/// Polar tube coil count or range of counts
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CoilRange {
    pub low: f64,
    pub high: Option<f64>,
}

impl CoilRange {
    /// Mean of the bounds; a single count is its own average
    pub fn average(&self) -> f64 {
        (self.low + self.high.unwrap_or(self.low)) / 2.0
    }

    /// Canonical numeric rendering used for comparisons
    pub fn canonical(&self) -> String {
        match self.high {
            Some(high) if high != self.low => format!("{}-{}", self.low, high),
            _ => format!("{}", self.low),
        }
    }
}

impl std::fmt::Display for CoilRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.canonical())
    }
}

// ============================================================================
// Entities
// ============================================================================

/// A species or host name with its bracketed synonyms
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityName {
    pub canonical: String,
    #[serde(default)]
    pub aliases: BTreeSet<String>,
}

impl EntityName {
    /// Create a name; `None` for blank input
    pub fn new(canonical: impl Into<String>) -> Option<Self> {
        let canonical = canonical.into().trim().to_string();
        if canonical.is_empty() {
            return None;
        }
        Some(Self {
            canonical,
            aliases: BTreeSet::new(),
        })
    }

    /// Add a synonym
    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        let alias = alias.into().trim().to_string();
        if !alias.is_empty() {
            self.aliases.insert(alias);
        }
        self
    }

    /// Case-insensitive match against the canonical name or any alias
    pub fn matches(&self, name: &str) -> bool {
        let name = name.trim().to_lowercase();
        self.canonical.to_lowercase() == name
            || self.aliases.iter().any(|a| a.to_lowercase() == name)
    }
}

impl std::fmt::Display for EntityName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.canonical)
    }
}

// ============================================================================
// Localities
// ============================================================================

/// A region and its subregions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalityEntry {
    pub region: String,
    #[serde(default)]
    pub subregions: BTreeSet<String>,
}

impl LocalityEntry {
    /// Create a region with no subregions
    pub fn new(region: impl Into<String>) -> Self {
        Self {
            region: region.into(),
            subregions: BTreeSet::new(),
        }
    }

    /// Add a subregion
    pub fn with_subregion(mut self, subregion: impl Into<String>) -> Self {
        self.subregions.insert(subregion.into());
        self
    }
}

/// A record's full locality value; region keys are unique
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Locality {
    pub entries: Vec<LocalityEntry>,
}

impl Locality {
    /// Look up a region, case-insensitively
    pub fn get(&self, region: &str) -> Option<&LocalityEntry> {
        self.entries
            .iter()
            .find(|e| e.region.eq_ignore_ascii_case(region))
    }

    /// Check whether a region is present
    pub fn contains_region(&self, region: &str) -> bool {
        self.get(region).is_some()
    }

    /// Check for no regions
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Region names, in order
    pub fn regions(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.region.as_str())
    }
}

// ============================================================================
// Match Results
// ============================================================================

/// True/false positive and false negative counts for one trait
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchResult {
    pub true_positive: usize,
    pub false_positive: usize,
    pub false_negative: usize,
}

impl MatchResult {
    /// Create a result from raw counts
    pub fn new(true_positive: usize, false_positive: usize, false_negative: usize) -> Self {
        Self {
            true_positive,
            false_positive,
            false_negative,
        }
    }

    /// Calculate precision (TP / (TP + FP)), 0 on an empty denominator
    pub fn precision(&self) -> f64 {
        if self.true_positive + self.false_positive == 0 {
            0.0
        } else {
            self.true_positive as f64 / (self.true_positive + self.false_positive) as f64
        }
    }

    /// Calculate recall (TP / (TP + FN)), 0 on an empty denominator
    pub fn recall(&self) -> f64 {
        if self.true_positive + self.false_negative == 0 {
            0.0
        } else {
            self.true_positive as f64 / (self.true_positive + self.false_negative) as f64
        }
    }

    /// Calculate F1 score (2 * P * R / (P + R))
    pub fn f1_score(&self) -> f64 {
        let p = self.precision();
        let r = self.recall();
        if p + r == 0.0 {
            0.0
        } else {
            2.0 * p * r / (p + r)
        }
    }

    /// Check for all-zero counts
    pub fn is_empty(&self) -> bool {
        self.true_positive + self.false_positive + self.false_negative == 0
    }
}

impl Add for MatchResult {
    type Output = MatchResult;

    fn add(self, rhs: MatchResult) -> MatchResult {
        MatchResult {
            true_positive: self.true_positive + rhs.true_positive,
            false_positive: self.false_positive + rhs.false_positive,
            false_negative: self.false_negative + rhs.false_negative,
        }
    }
}

impl AddAssign for MatchResult {
    fn add_assign(&mut self, rhs: MatchResult) {
        *self = *self + rhs;
    }
}

impl std::iter::Sum for MatchResult {
    fn sum<I: Iterator<Item = MatchResult>>(iter: I) -> Self {
        iter.fold(MatchResult::default(), Add::add)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_title_abstract_separator() {
        let record = TextRecord::new("1", "A new microsporidium", "Spores are oval.");
        assert_eq!(
            record.title_abstract(),
            "A new microsporidium ::: Spores are oval."
        );
    }

    #[test]
    fn test_record_without_id_is_rejected() {
        let record = TextRecord::new("  ", "title", "abstract");
        assert!(matches!(
            record.validate(),
            Err(MicrotraitError::MissingField(_))
        ));
        assert!(TextRecord::new("7", "", "").validate().is_ok());
    }

    #[test]
    fn test_config_error_converts() {
        let error: MicrotraitError = ConfigError::InvalidValue {
            key: "predicates.wingspan".to_string(),
            value: "exact_set".to_string(),
        }
        .into();
        assert!(matches!(error, MicrotraitError::Config(_)));
        assert!(error.to_string().starts_with("Configuration error"));
    }

    #[test]
    fn test_dimension_range_rejects_inverted_bounds() {
        assert!(DimensionMeasurement::range(5.0, 3.0).is_none());
        let m = DimensionMeasurement::range(3.0, 5.0).unwrap();
        assert_eq!(m.canonical(), "3-5");
        assert!((m.average() - 4.0).abs() < 1e-9);
    }

    #[test]
    fn test_dimension_center_overrides_midpoint() {
        let m = DimensionMeasurement::range(4.0, 5.0)
            .unwrap()
            .with_center(4.2);
        assert!((m.average() - 4.2).abs() < 1e-9);
    }

    #[test]
    fn test_coil_range_average() {
        let range = CoilRange {
            low: 5.0,
            high: Some(6.0),
        };
        assert!((range.average() - 5.5).abs() < 1e-9);
        assert_eq!(range.canonical(), "5-6");

        let single = CoilRange {
            low: 8.0,
            high: None,
        };
        assert!((single.average() - 8.0).abs() < 1e-9);
        assert_eq!(single.to_string(), "8");
    }

    #[test]
    fn test_entity_name_never_empty() {
        assert!(EntityName::new("   ").is_none());
        let name = EntityName::new("Nosema bombycis")
            .unwrap()
            .with_alias("Nosema bombycis Naegeli");
        assert!(name.matches("nosema BOMBYCIS"));
        assert!(name.matches("nosema bombycis naegeli"));
        assert!(!name.matches("Nosema apis"));
    }

    #[test]
    fn test_match_result_zero_denominator() {
        let empty = MatchResult::default();
        assert_eq!(empty.precision(), 0.0);
        assert_eq!(empty.recall(), 0.0);
        assert_eq!(empty.f1_score(), 0.0);
        assert!(!empty.precision().is_nan());
    }

    #[test]
    fn test_match_result_sum() {
        let total: MatchResult = vec![MatchResult::new(2, 0, 1), MatchResult::new(1, 1, 0)]
            .into_iter()
            .sum();
        assert_eq!(total, MatchResult::new(3, 1, 1));
        assert!((total.precision() - 0.75).abs() < 1e-9);
        assert!((total.recall() - 0.75).abs() < 1e-9);
    }

    #[test]
    fn test_trait_kind_parse() {
        assert_eq!(
            "polar_tube_coils".parse::<TraitKind>().unwrap(),
            TraitKind::PolarTubeCoils
        );
        assert_eq!("Locality".parse::<TraitKind>().unwrap(), TraitKind::Locality);
        assert!("colour".parse::<TraitKind>().is_err());
    }

    #[test]
    fn test_trait_record_json_layout() {
        let json = r#"{
            "id": "42",
            "title": "Nosema sp. n.",
            "abstract": "Spores 4 x 2 um.",
            "recorded": {"species": "Nosema apis"},
            "predicted": {"locality": "   "}
        }"#;
        let row: TraitRecord = serde_json::from_str(json).unwrap();
        assert_eq!(row.record.id, "42");
        assert_eq!(row.record.abstract_text, "Spores 4 x 2 um.");
        assert_eq!(row.recorded_value(TraitKind::Species), Some("Nosema apis"));
        assert_eq!(row.predicted_value(TraitKind::Locality), None);
    }
}
