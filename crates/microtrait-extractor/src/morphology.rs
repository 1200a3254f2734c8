//! Spore morphology
//!
//! Nucleus counts and shape descriptors per spore type. Each qualifying
//! sentence is taken to describe one spore type.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::normalize::split_sentences;
use crate::patterns::PatternLibrary;

// ============================================================================
// Lexicons
// ============================================================================

/// Nucleus terms and the number of nuclei each one implies
pub const NUCLEUS_TERMS: &[(&str, u8)] = &[
    ("nucleus", 1),
    ("nuclei", 2),
    ("unikaryotic", 1),
    ("unikariotic", 1),
    ("unicaryotic", 1),
    ("unicariotic", 1),
    ("unikaryon", 1),
    ("unikarion", 1),
    ("unicaryon", 1),
    ("unicarion", 1),
    ("monokaryotic", 1),
    ("monokariotic", 1),
    ("monocaryotic", 1),
    ("monocariotic", 1),
    ("monokaryon", 1),
    ("monokarion", 1),
    ("monocaryon", 1),
    ("monocarion", 1),
    ("diplokaryotic", 2),
    ("diplokariotic", 2),
    ("diplocaryotic", 2),
    ("diplocariotic", 2),
    ("diplokaryon", 2),
    ("diplokarion", 2),
    ("diplocaryon", 2),
    ("diplocarion", 2),
    ("uninucleate", 1),
    ("mononucleate", 1),
    ("binucleate", 2),
    ("uninuclear", 1),
    ("binuclear", 2),
];

/// Developmental stages whose nuclei are not spore nuclei
pub const IMMATURE_STAGE_TERMS: &[&str] = &["sporoblast", "sporont", "meront", "schizont"];

pub const SHAPE_TERMS: &[&str] = &[
    "oval",
    "ovoid",
    "round",
    "pyriform",
    "ovocylindrical",
    "spherical",
    "ellipsoidal",
    "ellipsoid",
    "rod-shaped",
    "rod",
];

/// Spore type used when a sentence names no specific kind of spore
pub const DEFAULT_SPORE_TYPE: &str = "normal spore";

// ============================================================================
// Observations
// ============================================================================

/// Number of nuclei reported for one spore type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NucleusObservation {
    pub spore_type: String,
    pub nuclei: u8,
}

impl fmt::Display for NucleusObservation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.nuclei, self.spore_type)
    }
}

/// Shape descriptor reported for one spore type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShapeObservation {
    pub spore_type: String,
    pub shape: String,
}

impl fmt::Display for ShapeObservation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.shape, self.spore_type)
    }
}

// ============================================================================
// Extraction
// ============================================================================

/// First mature spore type named in a sentence.
///
/// "meiospores" gives "meiospore" and a bare "spore(s)" gives
/// [`DEFAULT_SPORE_TYPE`]. Wall layers (exospore, endospore) are skipped.
pub fn spore_type(patterns: &PatternLibrary, sentence: &str) -> Option<String> {
    patterns
        .spore_type
        .find_iter(sentence)
        .map(|m| m.as_str().to_lowercase())
        .map(|word| match word.strip_suffix('s') {
            Some(stem) if stem.ends_with("spore") => stem.to_string(),
            _ => word,
        })
        .find(|lemma| !lemma.ends_with("exospore") && !lemma.ends_with("endospore"))
        .map(|lemma| {
            if lemma == "spore" {
                DEFAULT_SPORE_TYPE.to_string()
            } else {
                lemma
            }
        })
}

/// Nucleus count for each sentence that mentions nuclei and no immature
/// developmental stage. The first nucleus term in a sentence decides the
/// count.
pub fn predict_nucleus(patterns: &PatternLibrary, text: &str) -> Vec<NucleusObservation> {
    split_sentences(text)
        .into_iter()
        .filter(|sentence| !patterns.immature_stage.is_match(sentence))
        .filter_map(|sentence| {
            let term = patterns.nucleus_term.find(sentence)?.as_str().to_lowercase();
            let nuclei = nuclei_for_term(&term)?;
            let spore_type =
                spore_type(patterns, sentence).unwrap_or_else(|| DEFAULT_SPORE_TYPE.to_string());
            Some(NucleusObservation { spore_type, nuclei })
        })
        .collect()
}

fn nuclei_for_term(term: &str) -> Option<u8> {
    NUCLEUS_TERMS
        .iter()
        .find(|(candidate, _)| *candidate == term)
        .map(|(_, nuclei)| *nuclei)
}

/// Shape descriptors in sentences that name a mature spore type.
/// Repeated (shape, spore type) pairs are reported once.
pub fn predict_shapes(patterns: &PatternLibrary, text: &str) -> Vec<ShapeObservation> {
    let mut observations: Vec<ShapeObservation> = Vec::new();

    for sentence in split_sentences(text) {
        let Some(spore_type) = spore_type(patterns, sentence) else {
            continue;
        };
        for shape in patterns.shape_term.find_iter(sentence) {
            let observation = ShapeObservation {
                spore_type: spore_type.clone(),
                shape: shape.as_str().to_lowercase(),
            };
            if !observations.contains(&observation) {
                observations.push(observation);
            }
        }
    }

    observations
}

// ============================================================================
// Tests
// ============================================================================
