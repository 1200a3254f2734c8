//! Microtrait Extractor - Trait extraction and evaluation pipeline
//!
//! Implements rule-based extraction of microsporidia traits (spore
//! dimensions, polar tube coils and length, new species names, nucleus
//! counts, spore shapes) from titles and abstracts, and scoring of
//! predictions against curated ground truth.

use serde::{Deserialize, Serialize};

use microtrait_core::{
    CoilRange, DimensionMeasurement, SporeDimensionPair, TextRecord, TraitKind, LIST_DELIMITER,
};

/// A located occurrence of a named entity in text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntitySpan {
    pub text: String,
    pub label: String,
    /// Character offset, inclusive
    pub start: usize,
    /// Character offset, exclusive
    pub end: usize,
}

/// Everything the extractor predicts for one record
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TraitPrediction {
    pub record_id: String,
    pub new_species: Vec<String>,
    pub spore_dimensions: Vec<SporeDimensionPair>,
    pub coil_mention: bool,
    pub tube_mention: bool,
    pub polar_tube_coils: Option<CoilRange>,
    pub polar_tube_length: Option<DimensionMeasurement>,
    pub nucleus: Vec<morphology::NucleusObservation>,
    pub spore_shapes: Vec<morphology::ShapeObservation>,
}

impl TraitPrediction {
    /// Render the prediction for a trait in the field convention used by
    /// recorded values. `None` when nothing was extracted or the trait is
    /// supplied by an external tagger.
    pub fn field(&self, kind: TraitKind) -> Option<String> {
        let joined = |items: Vec<String>| {
            if items.is_empty() {
                None
            } else {
                Some(items.join(LIST_DELIMITER))
            }
        };

        match kind {
            TraitKind::Species => joined(self.new_species.clone()),
            TraitKind::SporeDimensions => {
                joined(self.spore_dimensions.iter().map(|p| p.to_string()).collect())
            }
            TraitKind::PolarTubeCoils => self.polar_tube_coils.map(|c| c.canonical()),
            TraitKind::PolarTubeLength => self.polar_tube_length.as_ref().map(|m| m.to_string()),
            TraitKind::Nucleus => {
                joined(self.nucleus.iter().map(|n| n.to_string()).collect())
            }
            TraitKind::Hosts | TraitKind::InfectionSite | TraitKind::Locality => None,
        }
    }
}

/// Trait for record-level extractors
pub trait TraitExtractor: Send + Sync {
    fn extract(&self, record: &TextRecord) -> TraitPrediction;
}

pub mod batch;
pub mod correction;
pub mod extract;
pub mod locality;
pub mod metrics;
pub mod morphology;
pub mod names;
pub mod normalize;
pub mod patterns;

pub use batch::{BatchPipeline, BatchReport, RecordEvaluation};
pub use correction::{CorrectionItem, CorrectionStatus, CorrectionWorklist};
pub use extract::Extractor;
pub use metrics::{AggregateMetrics, Evaluator};
pub use patterns::PatternLibrary;
