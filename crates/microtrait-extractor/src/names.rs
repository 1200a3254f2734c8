//! Species and host name resolution
//!
//! Canonicalizes names, builds abbreviated binomials, finds metadata names
//! that the text never mentions, locates name spans, and merges human
//! corrections back into a name list.

use regex::RegexBuilder;

use microtrait_core::{EntityName, LIST_DELIMITER};

use crate::normalize::{collapse_whitespace, split_top_level, strip_parenthetical_aside};
use crate::patterns::PatternLibrary;
use crate::EntitySpan;

// ============================================================================
// Canonical names
// ============================================================================

/// Parse `"Genus species (= Other name)"` into a canonical name plus aliases.
///
/// Returns `None` when nothing is left after stripping annotations.
pub fn parse_entity_name(raw: &str) -> Option<EntityName> {
    let mut aliases = Vec::new();
    let mut rest = raw;
    while let Some(open) = rest.find('(') {
        let after = &rest[open + 1..];
        let Some(close) = after.find(')') else {
            break;
        };
        if let Some(alias) = after[..close].trim().strip_prefix('=') {
            aliases.push(collapse_whitespace(alias));
        }
        rest = &after[close + 1..];
    }

    let name = EntityName::new(strip_parenthetical_aside(raw))?;
    Some(aliases.into_iter().fold(name, EntityName::with_alias))
}

/// Split a `;`-delimited name field into entity names
pub fn split_names(field: &str) -> Vec<EntityName> {
    split_top_level(field, ';')
        .into_iter()
        .filter_map(parse_entity_name)
        .collect()
}

/// Render a name back into `"Genus species (= Other name)"` form
pub fn format_entity_name(name: &EntityName) -> String {
    name.aliases
        .iter()
        .fold(name.canonical.clone(), |rendered, alias| {
            format!("{} (= {})", rendered, alias)
        })
}

/// Reduce every word but the last to its initial: "Nosema bombycis" ->
/// "N. bombycis". Single words come back unchanged.
pub fn abbreviate(binomial: &str) -> String {
    let words: Vec<&str> = binomial.split_whitespace().collect();
    let Some((last, leading)) = words.split_last() else {
        return String::new();
    };
    if leading.is_empty() {
        return (*last).to_string();
    }

    let mut parts: Vec<String> = leading
        .iter()
        .filter_map(|w| w.chars().next())
        .map(|initial| format!("{}.", initial))
        .collect();
    parts.push((*last).to_string());
    parts.join(" ")
}

// ============================================================================
// Text alignment
// ============================================================================

/// Names for which neither the canonical form nor its abbreviation occurs
/// in `corpus` (case-insensitive literal match).
///
/// `None` means none missing, which is also the answer for an empty name
/// list.
pub fn names_missing_from_text(names: &[EntityName], corpus: &str) -> Option<Vec<String>> {
    let corpus = corpus.to_lowercase();
    let missing: Vec<String> = names
        .iter()
        .filter(|name| {
            let canonical = name.canonical.to_lowercase();
            let abbreviated = abbreviate(&canonical);
            !corpus.contains(&canonical) && !corpus.contains(&abbreviated)
        })
        .map(|name| name.canonical.clone())
        .collect();

    if missing.is_empty() {
        None
    } else {
        Some(missing)
    }
}

/// All case-insensitive literal occurrences of each name and its
/// abbreviation in `corpus`.
///
/// Offsets are 0-based, end-exclusive character positions. Spans are grouped
/// per entity in input order (canonical matches, then abbreviation matches)
/// and are not re-sorted globally.
pub fn locate_spans(names: &[EntityName], corpus: &str, label: &str) -> Vec<EntitySpan> {
    let mut spans = Vec::new();

    for name in names {
        let abbreviated = abbreviate(&name.canonical);
        let mut forms = vec![name.canonical.as_str()];
        if !abbreviated.eq_ignore_ascii_case(&name.canonical) {
            forms.push(abbreviated.as_str());
        }

        for form in forms {
            let Ok(matcher) = RegexBuilder::new(&regex::escape(form))
                .case_insensitive(true)
                .build()
            else {
                continue;
            };
            for mat in matcher.find_iter(corpus) {
                let start = corpus[..mat.start()].chars().count();
                let end = start + mat.as_str().chars().count();
                spans.push(EntitySpan {
                    text: mat.as_str().to_string(),
                    label: label.to_string(),
                    start,
                    end,
                });
            }
        }
    }

    spans
}

/// Render spans as `"start-end; start-end"`
pub fn format_spans(spans: &[EntitySpan]) -> String {
    spans
        .iter()
        .map(|s| format!("{}-{}", s.start, s.end))
        .collect::<Vec<_>>()
        .join(LIST_DELIMITER)
}

/// Read a `"start-end; start-end"` list; malformed items are skipped
pub fn parse_spans(spans: &str) -> Vec<(usize, usize)> {
    spans
        .split([';', '|'])
        .filter_map(|item| {
            let (start, end) = item.trim().split_once('-')?;
            let start = start.trim().parse().ok()?;
            let end = end.trim().parse().ok()?;
            (end >= start).then_some((start, end))
        })
        .collect()
}

// ============================================================================
// Human correction
// ============================================================================

/// Merge a human correction into a name list.
///
/// - nothing flagged: `Some(all_names)` verbatim, even when empty
/// - flagged and corrected: flagged names removed, corrected names appended
/// - flagged, no correction: flagged names removed
///
/// Returns `None` when flagging leaves no names.
pub fn resolve_with_correction(
    all_names: &[String],
    flagged_missing: &[String],
    human_corrected: &[String],
) -> Option<Vec<String>> {
    if flagged_missing.is_empty() {
        return Some(all_names.to_vec());
    }

    let contains = |list: &[String], name: &str| list.iter().any(|n| n.eq_ignore_ascii_case(name));

    let mut resolved: Vec<String> = all_names
        .iter()
        .filter(|name| !contains(flagged_missing, name.as_str()))
        .cloned()
        .collect();

    for name in human_corrected {
        if !name.trim().is_empty() && !contains(&resolved, name.trim()) {
            resolved.push(name.trim().to_string());
        }
    }

    if resolved.is_empty() {
        None
    } else {
        Some(resolved)
    }
}

// ============================================================================
// Hosts
// ============================================================================

/// Drop tagged taxon names that are really the parasite: those containing
/// a predicted parasite species name, or mentioning microsporidia.
pub fn filter_host_candidates(
    patterns: &PatternLibrary,
    candidates: &[String],
    parasite_species: &[String],
) -> Vec<String> {
    let mut hosts: Vec<String> = Vec::new();
    for candidate in candidates {
        let lowered = candidate.to_lowercase();
        let is_parasite = parasite_species
            .iter()
            .any(|sp| !sp.is_empty() && lowered.contains(&sp.to_lowercase()));
        if is_parasite || patterns.microsporidia_mention.is_match(candidate) {
            continue;
        }
        if !hosts.iter().any(|h| h.eq_ignore_ascii_case(candidate)) {
            hosts.push(candidate.clone());
        }
    }
    hosts
}

// ============================================================================
// Tests
// ============================================================================
