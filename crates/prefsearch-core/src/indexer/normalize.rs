//! Text normalization for punctuation variants.
//!
//! Titles are often typeset with a non-breaking hyphen (U+2011) that users
//! never type. An entry containing one is written twice, once with a normal
//! hyphen and once with the hyphen removed, and every row also stores a
//! hyphen-free copy of its title and summary.

use crate::types::{HyphenVariant, IndexRow};

pub const NON_BREAKING_HYPHEN: char = '\u{2011}';
pub const HYPHEN: char = '-';

/// One searchable entry before normalization.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogicalEntry {
    pub title: Option<String>,
    pub summary: Option<String>,
    pub keywords: Option<String>,
    pub fragment_name: String,
    pub fragment_title: String,
    pub intent: String,
    pub icon: i64,
    pub rank: i64,
}

fn strip_hyphens(text: &str) -> String {
    text.chars().filter(|&c| c != HYPHEN).collect()
}

/// Expand an entry into the physical rows written for `locale`.
///
/// Returns no rows when the entry has no title.
pub fn rows_for_entry(locale: &str, entry: &LogicalEntry) -> Vec<IndexRow> {
    let title = entry.title.as_deref().unwrap_or_default();
    if title.trim().is_empty() {
        return Vec::new();
    }
    let summary = entry.summary.as_deref().unwrap_or_default();

    let variants: Vec<(HyphenVariant, String, String)> =
        if title.contains(NON_BREAKING_HYPHEN) || summary.contains(NON_BREAKING_HYPHEN) {
            let hyphen = HYPHEN.to_string();
            vec![
                (
                    HyphenVariant::Hyphenated,
                    title.replace(NON_BREAKING_HYPHEN, &hyphen),
                    summary.replace(NON_BREAKING_HYPHEN, &hyphen),
                ),
                (
                    HyphenVariant::Joined,
                    title.replace(NON_BREAKING_HYPHEN, ""),
                    summary.replace(NON_BREAKING_HYPHEN, ""),
                ),
            ]
        } else {
            vec![(HyphenVariant::Plain, title.to_string(), summary.to_string())]
        };

    variants
        .into_iter()
        .filter(|(_, title, _)| !title.trim().is_empty())
        .map(|(variant, title, summary)| IndexRow {
            locale: locale.to_string(),
            rank: entry.rank,
            title_normalized: strip_hyphens(&title),
            summary_normalized: strip_hyphens(&summary),
            title,
            summary,
            keywords: entry.keywords.clone().unwrap_or_default(),
            fragment_name: entry.fragment_name.clone(),
            fragment_title: entry.fragment_title.clone(),
            intent: entry.intent.clone(),
            icon: entry.icon,
            variant,
        })
        .collect()
}
