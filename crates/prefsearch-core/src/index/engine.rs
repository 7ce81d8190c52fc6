//! Query execution against the store.

use crate::types::{HyphenVariant, IndexEntry};
use crate::{PrefSearchError, Result};
use rusqlite::{params, Row};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

use super::fts5::MATCH_COLUMNS;
use super::query::build_match_expression;
use super::store::SchemaStore;

/// Results of one search, ordered by rank.
///
/// Single pass: entries are handed out once and the sequence cannot be
/// restarted. It reflects the store as committed when the search ran; a build
/// committing afterwards is not visible through it.
#[derive(Debug)]
pub struct SearchResults {
    query: String,
    entries: std::vec::IntoIter<IndexEntry>,
}

impl SearchResults {
    pub(crate) fn new(query: impl Into<String>, entries: Vec<IndexEntry>) -> Self {
        Self {
            query: query.into(),
            entries: entries.into_iter(),
        }
    }

    /// An empty result for `query`.
    pub fn empty(query: impl Into<String>) -> Self {
        Self::new(query, Vec::new())
    }

    /// The query these results answer.
    pub fn query(&self) -> &str {
        &self.query
    }

    /// Release the remaining entries without consuming them.
    pub fn close(self) {}
}

impl Iterator for SearchResults {
    type Item = IndexEntry;

    fn next(&mut self) -> Option<Self::Item> {
        self.entries.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.entries.size_hint()
    }
}

impl ExactSizeIterator for SearchResults {}

/// A row as read back, with the columns used to fold the hyphen variants of
/// one entry together.
struct MatchedRow {
    entry: IndexEntry,
    title_normalized: String,
    summary_normalized: String,
    variant: HyphenVariant,
}

/// Builds and runs full-text queries.
pub struct QueryEngine {
    store: Arc<SchemaStore>,
}

impl QueryEngine {
    pub fn new(store: Arc<SchemaStore>) -> Self {
        Self { store }
    }

    /// Prefix-match `query` against title, summary and keywords of rows in
    /// `locale`, ordered by ascending rank.
    ///
    /// An empty query returns no entries. A query with a term the tokenizer
    /// cannot match fails with a query error.
    pub fn search(&self, query: &str, locale: &str) -> Result<SearchResults> {
        let start = Instant::now();
        let expression = build_match_expression(query, &MATCH_COLUMNS)?;
        if expression.is_empty() {
            return Ok(SearchResults::empty(query));
        }

        let table = self.store.table_name().to_string();
        let matched = self.store.with_reader(|conn| {
            let sql = format!(
                "SELECT locale, data_rank, data_title, data_summary, data_keywords,
                        fragment_name, fragment_title, intent, icon,
                        data_title_normalized, data_summary_normalized, data_variant
                 FROM {table}
                 WHERE {table} MATCH ?1 AND locale = ?2
                 ORDER BY data_rank ASC, rowid ASC"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params![expression, locale], Self::row_to_match)
                .and_then(|rows| rows.collect::<rusqlite::Result<Vec<_>>>())
                .map_err(|e| {
                    warn!("FTS5 search failed for {:?}: {}", query, e);
                    PrefSearchError::Query {
                        query: query.to_string(),
                        message: e.to_string(),
                    }
                })?;
            Ok(rows)
        })?;

        let total = matched.len();
        let entries = Self::collapse_variants(matched);
        debug!(
            "Search {:?} in {}: {} rows, {} entries in {:.2} ms",
            query,
            locale,
            total,
            entries.len(),
            start.elapsed().as_secs_f64() * 1000.0
        );
        Ok(SearchResults::new(query, entries))
    }

    /// Keep the first row of each entry written in several spellings; its
    /// variants share their normalized text. Plain rows are distinct entries
    /// even when they normalize alike ("Wi-Fi" and "WiFi").
    fn collapse_variants(rows: Vec<MatchedRow>) -> Vec<IndexEntry> {
        let mut seen = HashSet::new();
        rows.into_iter()
            .filter(|row| {
                row.variant == HyphenVariant::Plain
                    || seen.insert((
                        row.entry.fragment_name.clone(),
                        row.title_normalized.clone(),
                        row.summary_normalized.clone(),
                        row.entry.keywords.clone(),
                    ))
            })
            .map(|row| row.entry)
            .collect()
    }

    fn row_to_match(row: &Row) -> rusqlite::Result<MatchedRow> {
        Ok(MatchedRow {
            entry: IndexEntry {
                locale: row.get(0)?,
                rank: row.get(1)?,
                title: row.get(2)?,
                summary: row.get(3)?,
                keywords: row.get(4)?,
                fragment_name: row.get(5)?,
                fragment_title: row.get(6)?,
                intent: row.get(7)?,
                icon: row.get(8)?,
            },
            title_normalized: row.get(9)?,
            summary_normalized: row.get(10)?,
            variant: HyphenVariant::from_i64(row.get(11)?),
        })
    }
}
