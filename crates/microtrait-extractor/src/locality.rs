//! Locality hierarchy
//!
//! Parses and formats the two-level locality encoding
//! `"Region (sub1 | sub2); Region2"`.

use std::collections::BTreeSet;

use microtrait_core::{Locality, LocalityEntry, ALTERNATIVE_DELIMITER};

use crate::normalize::{collapse_whitespace, split_top_level};

/// Parse a locality string into regions and their subregions.
///
/// Items are separated by `;` outside parentheses. Within an item, text
/// before the first `(` is the region and the text inside the matching
/// parentheses is a ` | `-separated subregion list. An unmatched `(` or `)`
/// truncates the item at that point. When a region repeats, the first
/// occurrence is kept and later ones are ignored.
pub fn parse(locality: &str) -> Locality {
    let mut entries: Vec<LocalityEntry> = Vec::new();

    for item in split_top_level(locality, ';') {
        let Some(entry) = parse_item(item) else {
            continue;
        };

        if entries
            .iter()
            .any(|e| e.region.eq_ignore_ascii_case(&entry.region))
        {
            tracing::warn!(region = %entry.region, "Ignoring duplicate locality region");
            continue;
        }
        entries.push(entry);
    }

    Locality { entries }
}

/// Parse an optional field; blank input is no locality
pub fn parse_field(locality: Option<&str>) -> Option<Locality> {
    locality.map(parse).filter(|l| !l.is_empty())
}

fn parse_item(item: &str) -> Option<LocalityEntry> {
    let (region, subregions) = match item.find(['(', ')']) {
        Some(open) if item[open..].starts_with('(') => {
            let inner = &item[open + 1..];
            let subregions = match closing_paren(inner) {
                Some(close) => split_subregions(&inner[..close]),
                // Unmatched "(": keep only the region
                None => BTreeSet::new(),
            };
            (&item[..open], subregions)
        }
        // Stray ")" before any "("
        Some(close) => (&item[..close], BTreeSet::new()),
        None => (item, BTreeSet::new()),
    };

    let region = collapse_whitespace(region);
    if region.is_empty() {
        return None;
    }
    Some(LocalityEntry { region, subregions })
}

/// Byte index of the ")" matching an already-consumed "("
fn closing_paren(text: &str) -> Option<usize> {
    let mut depth = 1usize;
    for (idx, c) in text.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    return Some(idx);
                }
            }
            _ => {}
        }
    }
    None
}

fn split_subregions(list: &str) -> BTreeSet<String> {
    split_top_level(list, '|')
        .into_iter()
        .map(collapse_whitespace)
        .filter(|s| !s.is_empty())
        .collect()
}

/// Number of regions plus the total number of subregions
pub fn count(locality: &Locality) -> usize {
    locality
        .entries
        .iter()
        .map(|e| 1 + e.subregions.len())
        .sum()
}

/// Render a locality back into `"Region (a | b); Region2"` form
pub fn format(locality: &Locality) -> String {
    locality
        .entries
        .iter()
        .map(|entry| {
            if entry.subregions.is_empty() {
                entry.region.clone()
            } else {
                let subs: Vec<&str> = entry.subregions.iter().map(String::as_str).collect();
                format!("{} ({})", entry.region, subs.join(ALTERNATIVE_DELIMITER))
            }
        })
        .collect::<Vec<_>>()
        .join(microtrait_core::LIST_DELIMITER)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn subregions(locality: &Locality, region: &str) -> Vec<String> {
        locality
            .get(region)
            .map(|e| e.subregions.iter().cloned().collect())
            .unwrap_or_default()
    }

    #[test]
    fn test_parse_regions_and_subregions() {
        let locality = parse("Canada (Ontario | Quebec); Japan; Brazil (Manaus)");
        let regions: Vec<&str> = locality.regions().collect();
        assert_eq!(regions, vec!["Canada", "Japan", "Brazil"]);
        assert_eq!(subregions(&locality, "Canada"), vec!["Ontario", "Quebec"]);
        assert!(subregions(&locality, "Japan").is_empty());
        assert_eq!(subregions(&locality, "Brazil"), vec!["Manaus"]);
    }

    #[test]
    fn test_count() {
        let locality = parse("Canada (Ontario | Quebec); Japan");
        assert_eq!(count(&locality), 4);
        assert_eq!(count(&parse("")), 0);
    }

    #[test]
    fn test_duplicate_region_keeps_first() {
        let locality = parse("Canada (Ontario); canada (Quebec)");
        assert_eq!(locality.entries.len(), 1);
        assert_eq!(subregions(&locality, "Canada"), vec!["Ontario"]);
    }

    #[test]
    fn test_unmatched_parentheses_truncate() {
        let locality = parse("Canada (Ontario | Quebec; Japan");
        // The unmatched "(" swallows the rest of the string as one item
        assert_eq!(locality.entries.len(), 1);
        assert_eq!(locality.entries[0].region, "Canada");
        assert!(locality.entries[0].subregions.is_empty());

        let locality = parse("Pacific Ocean) Hawaii; Japan");
        let regions: Vec<&str> = locality.regions().collect();
        assert_eq!(regions, vec!["Pacific Ocean", "Japan"]);
    }

    #[test]
    fn test_nested_parentheses_in_subregion() {
        let locality = parse("USA (Lake Tahoe (California side) | Nevada)");
        assert_eq!(
            subregions(&locality, "USA"),
            vec!["Lake Tahoe (California side)", "Nevada"]
        );
    }

    #[test]
    fn test_format_round_trip() {
        let text = "Canada (Ontario | Quebec); Japan";
        assert_eq!(format(&parse(text)), text);
    }

    #[test]
    fn test_parse_field_blank() {
        assert!(parse_field(None).is_none());
        assert!(parse_field(Some("  ; ")).is_none());
        assert!(parse_field(Some("Japan")).is_some());
    }
}
