//! Rule-based trait extraction
//!
//! Turns free text (title + abstract) into structured trait predictions
//! using the compiled [`PatternLibrary`]. The same parsing routines also
//! normalize recorded values so both sides of an evaluation agree.

use regex::Captures;

use microtrait_core::{
    CoilRange, DimensionMeasurement, ExtractionConfig, SporeDimensionPair, TextRecord,
};

use crate::morphology;
use crate::normalize::{
    collapse_whitespace, repair_spreadsheet_date_artifact, split_sentences, words_to_digits,
    NumberLexicon,
};
use crate::patterns::PatternLibrary;
use crate::{TraitExtractor, TraitPrediction};

/// Pattern-driven trait extractor
#[derive(Debug, Clone)]
pub struct Extractor<'a> {
    patterns: &'a PatternLibrary,
    lexicon: NumberLexicon,
    number_words: bool,
}

impl<'a> Extractor<'a> {
    /// Create an extractor with the default number lexicon
    pub fn new(patterns: &'a PatternLibrary) -> Self {
        Self {
            patterns,
            lexicon: NumberLexicon::default(),
            number_words: true,
        }
    }

    /// Create an extractor from extraction settings
    pub fn from_config(patterns: &'a PatternLibrary, config: &ExtractionConfig) -> Self {
        Self::new(patterns).with_number_words(config.number_words)
    }

    /// Enable or disable spelled-out number conversion
    pub fn with_number_words(mut self, enabled: bool) -> Self {
        self.number_words = enabled;
        self
    }

    /// Replace the number lexicon
    pub fn with_lexicon(mut self, lexicon: NumberLexicon) -> Self {
        self.lexicon = lexicon;
        self
    }

    pub fn patterns(&self) -> &'a PatternLibrary {
        self.patterns
    }

    fn digits(&self, text: &str) -> String {
        if self.number_words {
            words_to_digits(text, &self.lexicon)
        } else {
            text.to_string()
        }
    }

    // ------------------------------------------------------------------------
    // Spore dimensions
    // ------------------------------------------------------------------------

    /// All length x width measurements in text, in order of appearance.
    ///
    /// A pair whose length or width cannot be parsed (e.g. an inverted
    /// range) is dropped without affecting its siblings.
    pub fn extract_dimensions(&self, text: &str) -> Vec<SporeDimensionPair> {
        let text = collapse_whitespace(text);

        self.patterns
            .length_width
            .captures_iter(&text)
            .filter_map(|caps| {
                let length = self.parse_dimension(&caps["length"]);
                let width = self.parse_dimension(&caps["width"]);
                match (length, width) {
                    (Some(mut length), Some(width)) => {
                        if length.unit.is_none() {
                            length.unit = width.unit.clone();
                        }
                        Some(SporeDimensionPair { length, width })
                    }
                    _ => {
                        tracing::warn!(
                            measurement = &caps[0],
                            "Dropping malformed spore dimension"
                        );
                        None
                    }
                }
            })
            .collect()
    }

    /// Parse one measurement such as `4.0 (3.0-5.0) um`, `4-5 (4.5)` or `3`.
    ///
    /// A bare value alongside a parenthesized range is the center of that
    /// range, and a parenthesized value next to a range is its center. When
    /// both sides are ranges the outer one is kept.
    pub fn parse_dimension(&self, segment: &str) -> Option<DimensionMeasurement> {
        let (outer, inner) = match segment.find('(') {
            Some(open) => {
                let rest = &segment[open + 1..];
                let inner = rest.find(')').map_or(rest, |close| &rest[..close]);
                (&segment[..open], Some(inner))
            }
            None => (segment, None),
        };

        let outer = self.parse_range(outer)?;
        let inner = inner.and_then(|text| self.parse_range(text));

        let mut measurement = match (outer, inner) {
            ((center, None), Some((low, Some(high)))) => {
                DimensionMeasurement::range(low, high)?.with_center(center)
            }
            ((low, Some(high)), Some((center, None))) => {
                DimensionMeasurement::range(low, high)?.with_center(center)
            }
            ((value, None), Some((center, None))) => {
                DimensionMeasurement::point(value).with_center(center)
            }
            ((low, Some(high)), _) => DimensionMeasurement::range(low, high)?,
            ((value, None), None) => DimensionMeasurement::point(value),
        };

        if let Some(unit) = self.patterns.micron_unit.find(segment) {
            measurement.unit = Some(unit.as_str().to_string());
        }
        Some(measurement)
    }

    /// First `low[-high]` in text
    fn parse_range(&self, text: &str) -> Option<(f64, Option<f64>)> {
        let caps = self.patterns.number_range.captures(text)?;
        let low = caps["low"].parse::<f64>().ok()?;
        let high = match caps.name("high") {
            Some(high) => Some(high.as_str().parse::<f64>().ok()?),
            None => None,
        };
        Some((low, high))
    }

    // ------------------------------------------------------------------------
    // Polar tube
    // ------------------------------------------------------------------------

    /// Whether the text mentions coils/turns at all
    pub fn detect_coil_mention(&self, text: &str) -> bool {
        self.patterns.coil_term.is_match(text)
    }

    /// Whether the text mentions a polar tube or filament
    pub fn detect_tube_mention(&self, text: &str) -> bool {
        self.patterns.tube_term.is_match(text)
    }

    /// Polar tube coil count from prose.
    ///
    /// Spelled-out numbers are converted first. In text with a coil term, a
    /// number only counts when the term follows within the configured word
    /// window and the number is not a micron measurement. Text without any
    /// coil term is read as a bare value such as `"5-6"`.
    pub fn extract_coil_range(&self, text: &str) -> Option<CoilRange> {
        let text = self.digits(&collapse_whitespace(text));

        if !self.detect_coil_mention(&text) {
            return self.bare_coil_range(&text);
        }

        self.patterns
            .coil_data
            .captures_iter(&text)
            .filter(|caps| {
                caps.name("range").is_some_and(|range| {
                    !self.patterns.micron_prefix.is_match(&text[range.end()..])
                })
            })
            .find_map(|caps| coil_range_from(&caps))
    }

    /// Coil count from a recorded value, repairing spreadsheet date damage
    pub fn parse_coil_range(&self, value: &str) -> Option<CoilRange> {
        let repaired = repair_spreadsheet_date_artifact(value);
        self.extract_coil_range(&repaired)
    }

    fn bare_coil_range(&self, text: &str) -> Option<CoilRange> {
        let caps = self.patterns.coil_range.captures(text)?;
        coil_range_from(&caps)
    }

    /// Sentences that mention the polar tube
    pub fn polar_tube_sentences<'t>(&self, text: &'t str) -> Vec<&'t str> {
        split_sentences(text)
            .into_iter()
            .filter(|sentence| self.detect_tube_mention(sentence))
            .collect()
    }

    /// Polar tube length: the first micron measurement after a tube term
    /// in a polar tube sentence
    pub fn extract_polar_tube_length(&self, text: &str) -> Option<DimensionMeasurement> {
        let text = collapse_whitespace(text);

        self.polar_tube_sentences(&text)
            .into_iter()
            .find_map(|sentence| {
                let term = self.patterns.tube_term.find(sentence)?;
                let measurement = self.patterns.tube_length.find(&sentence[term.end()..])?;
                self.parse_dimension(measurement.as_str())
            })
    }

    // ------------------------------------------------------------------------
    // New species
    // ------------------------------------------------------------------------

    /// Species names flagged as new ("n. sp.", "sp. nov.", ...), with the
    /// novelty marker removed. Order of first appearance, no duplicates.
    pub fn extract_new_species(&self, text: &str) -> Vec<String> {
        let text = collapse_whitespace(text);
        let mut names: Vec<String> = Vec::new();

        for found in self.patterns.new_species.find_iter(&text) {
            let stripped = self
                .patterns
                .novelty_indicator
                .replace_all(found.as_str(), "");
            let name = collapse_whitespace(stripped.trim_end_matches([',', ' ']));
            if !name.is_empty() && !names.contains(&name) {
                names.push(name);
            }
        }

        names
    }

    // ------------------------------------------------------------------------
    // Record-level
    // ------------------------------------------------------------------------

    /// Run every extractor over a record's title and abstract
    pub fn predict(&self, record: &TextRecord) -> TraitPrediction {
        let text = collapse_whitespace(&record.title_abstract());

        let prediction = TraitPrediction {
            record_id: record.id.clone(),
            new_species: self.extract_new_species(&text),
            spore_dimensions: self.extract_dimensions(&text),
            coil_mention: self.detect_coil_mention(&text),
            tube_mention: self.detect_tube_mention(&text),
            polar_tube_coils: self
                .detect_coil_mention(&text)
                .then(|| self.extract_coil_range(&text))
                .flatten(),
            polar_tube_length: self.extract_polar_tube_length(&text),
            nucleus: morphology::predict_nucleus(self.patterns, &text),
            spore_shapes: morphology::predict_shapes(self.patterns, &text),
        };

        tracing::debug!(
            record_id = %prediction.record_id,
            new_species = prediction.new_species.len(),
            dimensions = prediction.spore_dimensions.len(),
            coils = prediction.polar_tube_coils.is_some(),
            "Predicted traits"
        );

        prediction
    }
}

impl TraitExtractor for Extractor<'_> {
    fn extract(&self, record: &TextRecord) -> TraitPrediction {
        self.predict(record)
    }
}

fn coil_range_from(caps: &Captures<'_>) -> Option<CoilRange> {
    let low = caps.name("low")?.as_str().parse::<f64>().ok()?;
    let high = match caps.name("high") {
        Some(high) => Some(high.as_str().parse::<f64>().ok()?),
        None => None,
    };
    if high.is_some_and(|high| high < low) {
        return None;
    }
    Some(CoilRange { low, high })
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn extractor() -> Extractor<'static> {
        Extractor::new(PatternLibrary::global())
    }

    #[test]
    fn test_extract_dimensions_center_and_ranges() {
        let pairs = extractor().extract_dimensions("spores measured 4.0 (3.0-5.0) x 2.0-3.0 um");
        assert_eq!(pairs.len(), 1);

        let pair = &pairs[0];
        assert_eq!(pair.length.low, 3.0);
        assert_eq!(pair.length.high, Some(5.0));
        assert_eq!(pair.length.center, Some(4.0));
        assert_eq!(pair.width.low, 2.0);
        assert_eq!(pair.width.high, Some(3.0));
        assert_eq!(pair.width.center, None);
        assert_eq!(pair.width.unit.as_deref(), Some("um"));
        assert_eq!(pair.length.unit.as_deref(), Some("um"));
    }

    #[test]
    fn test_extract_dimensions_empty_and_multiple() {
        assert!(extractor().extract_dimensions("").is_empty());
        assert!(extractor().extract_dimensions("no numbers here").is_empty());

        let pairs = extractor()
            .extract_dimensions("Macrospores 5.5 x 3 µm; microspores 3-4 (3.5) x 2 µm.");
        assert_eq!(pairs.len(), 2);
        assert_eq!(pairs[0].canonical(), "5.5 x 3");
        assert_eq!(pairs[1].length.center, Some(3.5));
        assert_eq!(pairs[1].canonical(), "3-4 x 2");
    }

    #[test]
    fn test_inverted_range_is_dropped() {
        let pairs = extractor().extract_dimensions("spores 5-3 x 2 um and 4 x 2 um");
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].canonical(), "4 x 2");
    }

    #[test]
    fn test_parse_dimension_forms() {
        let e = extractor();
        let m = e.parse_dimension("4-5 (4.5)").unwrap();
        assert_eq!((m.low, m.high, m.center), (4.0, Some(5.0), Some(4.5)));

        let m = e.parse_dimension("3 um").unwrap();
        assert_eq!((m.low, m.high), (3.0, None));
        assert_eq!(m.unit.as_deref(), Some("um"));

        assert!(e.parse_dimension("n/a").is_none());
    }

    #[test]
    fn test_extract_coil_range_number_words() {
        let coils = extractor()
            .extract_coil_range("The polar tube has five to six coils.")
            .unwrap();
        assert_eq!(coils, CoilRange { low: 5.0, high: Some(6.0) });
        assert_eq!(coils.average(), 5.5);
    }

    #[test]
    fn test_extract_coil_range_skips_micron_measurements() {
        let coils = extractor()
            .extract_coil_range("A 4 um long polar filament with 8 isofilar coils")
            .unwrap();
        assert_eq!(coils, CoilRange { low: 8.0, high: None });
    }

    #[test]
    fn test_extract_coil_range_requires_anchor_in_window() {
        assert!(extractor()
            .extract_coil_range("Spores 12 are found in the fat body of larvae near coils")
            .is_none());
    }

    #[test]
    fn test_number_words_can_be_disabled() {
        let e = extractor().with_number_words(false);
        assert!(e.extract_coil_range("five coils").is_none());
    }

    #[test]
    fn test_parse_coil_range_recorded_values() {
        let e = extractor();
        assert_eq!(
            e.parse_coil_range("2022-05-06"),
            Some(CoilRange { low: 5.0, high: Some(6.0) })
        );
        assert_eq!(
            e.parse_coil_range("10.5"),
            Some(CoilRange { low: 10.5, high: None })
        );
        assert!(e.parse_coil_range("unknown").is_none());
    }

    #[test]
    fn test_polar_tube_length() {
        let text = "Spores are oval. The polar filament is 60-80 µm long when extruded.";
        let e = extractor();
        assert_eq!(e.polar_tube_sentences(text).len(), 1);
        let length = e.extract_polar_tube_length(text).unwrap();
        assert_eq!(length.canonical(), "60-80");
        assert!(e.extract_polar_tube_length("Spores 4 µm long.").is_none());
    }

    #[test]
    fn test_extract_new_species() {
        let text = "Vavraia culicis n. sp. infects mosquitoes. \
                    We also describe Nosema ceranae, sp. nov. and Vavraia culicis n. sp. again.";
        assert_eq!(
            extractor().extract_new_species(text),
            vec!["Vavraia culicis", "Nosema ceranae"]
        );
        assert!(extractor().extract_new_species("No novelty here.").is_empty());
    }

    #[test]
    fn test_predict_record() {
        let record = TextRecord::new(
            "r1",
            "Thelohania solenopsae n. sp. from fire ants",
            "Spores are oval, diplokaryotic, 4.0 (3.0-5.0) x 2.0-3.0 um. \
             The polar tube has 10 to 12 coils.",
        );
        let prediction = extractor().extract(&record);
        assert_eq!(prediction.record_id, "r1");
        assert_eq!(prediction.new_species, vec!["Thelohania solenopsae"]);
        assert_eq!(prediction.spore_dimensions.len(), 1);
        assert!(prediction.coil_mention);
        assert!(prediction.tube_mention);
        assert_eq!(
            prediction.polar_tube_coils,
            Some(CoilRange { low: 10.0, high: Some(12.0) })
        );
        assert_eq!(prediction.nucleus.len(), 1);
        assert_eq!(prediction.nucleus[0].nuclei, 2);
    }
}
