//! Text normalization
//!
//! Pure string cleanup applied before pattern matching: whitespace
//! collapsing, parenthetical stripping for name fields, spelled-out number
//! conversion, and repair of numeric ranges that a spreadsheet turned into
//! dates.

use std::collections::BTreeMap;

// ============================================================================
// Whitespace
// ============================================================================

/// Replace tabs/newlines with spaces, collapse runs of spaces and trim.
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Collapse a field; blank or missing input stays missing.
pub fn normalize_field(value: Option<&str>) -> Option<String> {
    value
        .map(collapse_whitespace)
        .filter(|value| !value.is_empty())
}

// ============================================================================
// Parentheticals
// ============================================================================

/// Remove `(...)` annotations from a name, e.g. a synonym or an author.
///
/// Only for species/host name fields. Locality values carry their
/// subregions in parentheses and must never go through this.
pub fn strip_parenthetical_aside(name: &str) -> String {
    let mut kept = String::with_capacity(name.len());
    let mut depth = 0usize;

    for c in name.chars() {
        match c {
            '(' => depth += 1,
            ')' if depth > 0 => depth -= 1,
            ')' => {}
            _ if depth == 0 => kept.push(c),
            _ => {}
        }
    }

    collapse_whitespace(&kept)
}

/// Split on a delimiter character that is not inside parentheses.
///
/// Pieces are trimmed and empty pieces dropped.
pub fn split_top_level(text: &str, delimiter: char) -> Vec<&str> {
    let mut pieces = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;

    for (idx, c) in text.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            c if c == delimiter && depth == 0 => {
                pieces.push(&text[start..idx]);
                start = idx + c.len_utf8();
            }
            _ => {}
        }
    }
    pieces.push(&text[start..]);

    pieces
        .into_iter()
        .map(str::trim)
        .filter(|piece| !piece.is_empty())
        .collect()
}

// ============================================================================
// Number words
// ============================================================================

/// Spelled-out number lookup used by [`words_to_digits`]
#[derive(Debug, Clone)]
pub struct NumberLexicon {
    words: BTreeMap<String, String>,
}

impl NumberLexicon {
    /// Create an empty lexicon
    pub fn empty() -> Self {
        Self {
            words: BTreeMap::new(),
        }
    }

    /// Add a word -> digits mapping (matched case-insensitively)
    pub fn with_word(mut self, word: &str, digits: &str) -> Self {
        self.words.insert(word.to_lowercase(), digits.to_string());
        self
    }

    /// Look up a token
    pub fn lookup(&self, token: &str) -> Option<&str> {
        self.words.get(&token.to_lowercase()).map(String::as_str)
    }
}

impl Default for NumberLexicon {
    fn default() -> Self {
        [
            ("one", "1"),
            ("two", "2"),
            ("three", "3"),
            ("four", "4"),
            ("five", "5"),
            ("six", "6"),
            ("seven", "7"),
            ("eight", "8"),
            ("nine", "9"),
            ("ten", "10"),
        ]
        .into_iter()
        .fold(Self::empty(), |lexicon, (word, digits)| {
            lexicon.with_word(word, digits)
        })
    }
}

/// Replace spelled-out numbers with digits, token by token.
///
/// "five to six coils" becomes "5 to 6 coils". Tokens not in the lexicon
/// pass through unchanged, including words that merely contain a number
/// word ("often", "someone").
pub fn words_to_digits(text: &str, lexicon: &NumberLexicon) -> String {
    let mut out = String::with_capacity(text.len());
    let mut token = String::new();

    let flush = |token: &mut String, out: &mut String| {
        if token.is_empty() {
            return;
        }
        match lexicon.lookup(token) {
            Some(digits) => out.push_str(digits),
            None => out.push_str(token),
        }
        token.clear();
    };

    for c in text.chars() {
        if c.is_alphabetic() {
            token.push(c);
        } else {
            flush(&mut token, &mut out);
            out.push(c);
        }
    }
    flush(&mut token, &mut out);

    out
}

// ============================================================================
// Spreadsheet date artifacts
// ============================================================================

/// Undo a spreadsheet's conversion of a small range into a date.
///
/// A value typed as `5-6` comes back as `2022-05-06` (optionally with a
/// `00:00:00` time part); this returns `5-6`. Anything without that exact
/// year-month-day signature is returned unchanged. This is a narrow
/// workaround, not a date parser.
pub fn repair_spreadsheet_date_artifact(value: &str) -> String {
    let trimmed = value.trim();
    let date = trimmed
        .strip_suffix("00:00:00")
        .map(|d| d.trim_end_matches(['T', ' ']))
        .unwrap_or(trimmed);

    let parts: Vec<&str> = date.split('-').collect();
    let &[year, first, second] = parts.as_slice() else {
        return value.to_string();
    };

    let all_digits = |s: &str| !s.is_empty() && s.chars().all(|c| c.is_ascii_digit());
    if year.len() != 4
        || !all_digits(year)
        || !(1..=2).contains(&first.len())
        || !(1..=2).contains(&second.len())
        || !all_digits(first)
        || !all_digits(second)
    {
        return value.to_string();
    }

    match (first.parse::<u32>(), second.parse::<u32>()) {
        (Ok(low), Ok(high)) => format!("{}-{}", low, high),
        _ => value.to_string(),
    }
}

// ============================================================================
// Sentences
// ============================================================================

/// Split text into sentences at `.`, `!` or `?` followed by whitespace and
/// an uppercase letter.
///
/// Abbreviated genera ("N. bombycis") and decimals stay inside their
/// sentence because the next character is lowercase or a digit.
pub fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();

    while let Some((idx, c)) = chars.next() {
        if !matches!(c, '.' | '!' | '?') {
            continue;
        }
        let end = idx + c.len_utf8();
        let rest = &text[end..];
        let trimmed = rest.trim_start();
        if trimmed.len() == rest.len() {
            continue;
        }
        if trimmed.chars().next().is_some_and(char::is_uppercase) {
            sentences.push(text[start..end].trim());
            start = end;
            while chars.peek().is_some_and(|(_, c)| c.is_whitespace()) {
                chars.next();
            }
        }
    }
    sentences.push(text[start..].trim());

    sentences.into_iter().filter(|s| !s.is_empty()).collect()
}

// ============================================================================
// Tests
// ============================================================================
