//! Pattern library
//!
//! Regular-expression fragments for numbers, ranges, spore dimensions,
//! coil counts and polar tube terminology. Fragments are composed bottom-up
//! (number -> range -> dimension -> length x width) so a change to numeric
//! tokenization reaches every pattern built on it.
//!
//! The compiled [`PatternLibrary`] is immutable; build it once and pass it
//! by reference to the extractor and evaluator.

use once_cell::sync::Lazy;
use regex::Regex;

use microtrait_core::{ExtractionConfig, MicrotraitError, Result};

use crate::morphology::{IMMATURE_STAGE_TERMS, NUCLEUS_TERMS, SHAPE_TERMS};

// ============================================================================
// Fragments
// ============================================================================

/// Integer or decimal: `4`, `5.0`, `4.05`
pub const NUMBER: &str = r"\d+(?:\.\d+)?";

/// Range separator for measurements: hyphen, en dash, em dash or "to"
pub const RANGE_SEPARATOR: &str = r"\s*(?:-|–|—|to)\s*";

/// Micrometre spellings, including common OCR renderings
pub const MICRON_UNIT: &str = r"(?:µm|μm|µ|μ|mkm|microns?|mum|um)";

/// Separator between spore length and width
pub const LENGTH_WIDTH_SEPARATOR: &str = r"\s*[x×X*]\s*";

/// Separator between the bounds of a coil count range
pub const COIL_RANGE_SEPARATOR: &str = r"\s*(?:to|or|and|-|–|—|/)\s*";

/// Coil anchor. The "l" is often garbled by OCR, hence `coi[a-z]`.
pub const COIL_TERM: &str = r"(?:coi[a-z]s?|spires?|turns?|twists?)";

/// Polar tube anchor
pub const TUBE_TERM: &str = r"(?:polar\s?)?(?:filament|tub(?:ul)?e)s?";

/// Binomial or abbreviated binomial, optionally with a subspecies epithet
pub const SPECIES_NAME: &str = r"[A-Z](?:\.|[a-z]+) [A-Z]?[a-z]+(?: [a-z]+)?";

/// Novelty markers: "n. sp.", "sp. nov.", "n. g., n. sp.", "gen. nov., sp. nov."
pub const NOVELTY_INDICATOR: &str = concat!(
    r"\b(?:",
    r"[Nn](?:ov|OV)?[.,]? ?[Gg](?:en|EN)?[.,]?.*?[Nn](?:ov|OV)?[.,]? ?[Ss][Pp][.,]?",
    r"|[Gg](?:en|EN)?[.,]? ?[Nn](?:ov|OV)?[.,]?.*?[Ss][Pp][.,]? ?[Nn](?:ov|OV)?[.,]?",
    r"|[Nn](?:ov|OV)?[.,]? ?[Ss][Pp][.,]?",
    r"|[Ss][Pp][.,]? ?[Nn](?:ov|OV)?[.,]?",
    r")"
);

/// `4` or `4-5`
pub fn number_range() -> String {
    format!("{NUMBER}(?:{RANGE_SEPARATOR}{NUMBER})?")
}

/// A measurement with optional unit and optional parenthetical range or
/// center: `4.0 (3.0–5.0) µm`, `4–5 (4.5)`, `3 um`
pub fn dimension() -> String {
    let range = number_range();
    format!(
        r"{range}(?:\s*{MICRON_UNIT})?(?:\s*\(\s*{range}\s*\))?(?:\s*{MICRON_UNIT})?"
    )
}

/// Spore length x width
pub fn length_width() -> String {
    let dim = dimension();
    format!("(?P<length>{dim}){LENGTH_WIDTH_SEPARATOR}(?P<width>{dim})")
}

/// One or two numbers joined by to/or/and/-/–/—//
pub fn coil_range() -> String {
    format!("(?P<low>{NUMBER})(?:{COIL_RANGE_SEPARATOR}(?P<high>{NUMBER}))?")
}

/// A coil range followed by the coil term within `window` lowercase words
pub fn coil_data(window: usize) -> String {
    let range = coil_range();
    format!(
        r"(?P<range>{range})\s*\)?(?P<gap>(?:\s+[a-z]+){{0,{window}}}?)\s+(?i:{COIL_TERM})\b"
    )
}

// ============================================================================
// Compiled library
// ============================================================================

static DEFAULT_LIBRARY: Lazy<PatternLibrary> = Lazy::new(|| {
    PatternLibrary::new(&ExtractionConfig::default()).expect("built-in patterns are valid")
});

/// Compiled, immutable set of extraction patterns
#[derive(Debug, Clone)]
pub struct PatternLibrary {
    pub(crate) length_width: Regex,
    pub(crate) number_range: Regex,
    pub(crate) micron_unit: Regex,
    pub(crate) micron_prefix: Regex,
    pub(crate) coil_range: Regex,
    pub(crate) coil_data: Regex,
    pub(crate) coil_term: Regex,
    pub(crate) tube_term: Regex,
    pub(crate) tube_length: Regex,
    pub(crate) new_species: Regex,
    pub(crate) novelty_indicator: Regex,
    pub(crate) microsporidia_mention: Regex,
    pub(crate) spore_type: Regex,
    pub(crate) nucleus_term: Regex,
    pub(crate) immature_stage: Regex,
    pub(crate) shape_term: Regex,
}

impl PatternLibrary {
    /// Compile all patterns for the given extraction settings
    pub fn new(config: &ExtractionConfig) -> Result<Self> {
        let range = number_range();
        Ok(Self {
            length_width: compile("length_width", &length_width())?,
            number_range: compile(
                "number_range",
                &format!("(?P<low>{NUMBER})(?:{RANGE_SEPARATOR}(?P<high>{NUMBER}))?"),
            )?,
            micron_unit: compile("micron_unit", &format!(r"(?i){MICRON_UNIT}"))?,
            micron_prefix: compile("micron_prefix", &format!(r"(?i)^\s*{MICRON_UNIT}\b"))?,
            coil_range: compile("coil_range", &coil_range())?,
            coil_data: compile("coil_data", &coil_data(config.coil_word_window))?,
            coil_term: compile("coil_term", &format!(r"(?i)\b{COIL_TERM}\b"))?,
            tube_term: compile("tube_term", &format!(r"(?i)\b{TUBE_TERM}\b"))?,
            tube_length: compile(
                "tube_length",
                &format!(r"(?i)(?P<range>{range})\s*{MICRON_UNIT}"),
            )?,
            new_species: compile(
                "new_species",
                &format!(r"{SPECIES_NAME},? ?{NOVELTY_INDICATOR}|[A-Z][a-z]+ [Ss][Pp]\b\.?"),
            )?,
            novelty_indicator: compile("novelty_indicator", NOVELTY_INDICATOR)?,
            microsporidia_mention: compile("microsporidia_mention", r"[Mm]icrosp")?,
            spore_type: compile("spore_type", r"(?i)\b[a-z]*spores?\b")?,
            nucleus_term: term_alternation(
                &NUCLEUS_TERMS.iter().map(|(term, _)| *term).collect::<Vec<_>>(),
            )?,
            immature_stage: compile(
                "immature_stage",
                &format!(r"(?i)\b(?:{})s?\b", IMMATURE_STAGE_TERMS.join("|")),
            )?,
            shape_term: term_alternation(SHAPE_TERMS)?,
        })
    }

    /// Library built with default extraction settings, compiled on first use
    pub fn global() -> &'static PatternLibrary {
        &DEFAULT_LIBRARY
    }

    /// Length x width matcher with `length`/`width` groups
    pub fn length_width(&self) -> &Regex {
        &self.length_width
    }

    /// Coil range matcher with `low`/`high` groups
    pub fn coil_range(&self) -> &Regex {
        &self.coil_range
    }

    /// Standalone coil/turn term
    pub fn coil_term(&self) -> &Regex {
        &self.coil_term
    }

    /// Standalone tube/tubule/filament term
    pub fn tube_term(&self) -> &Regex {
        &self.tube_term
    }
}

fn compile(name: &str, pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|e| MicrotraitError::Pattern {
        name: name.to_string(),
        message: e.to_string(),
    })
}

/// Case-insensitive alternation over literal terms, longest first so that
/// "rod-shaped" wins over "rod".
pub(crate) fn term_alternation(terms: &[&str]) -> Result<Regex> {
    let mut sorted: Vec<&str> = terms.to_vec();
    sorted.sort_by_key(|t| std::cmp::Reverse(t.len()));
    let body = sorted
        .iter()
        .map(|t| regex::escape(t))
        .collect::<Vec<_>>()
        .join("|");
    compile("terms", &format!(r"(?i)\b(?:{body})\b"))
}

// ============================================================================
// Tests
// ============================================================================
