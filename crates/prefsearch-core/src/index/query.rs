//! FTS5 query building utilities.
//!
//! User input only ever reaches the MATCH expression as quoted FTS5 strings,
//! so operators, column filters and `*` inside a term are plain text.

use crate::{PrefSearchError, Result};

/// Escape a term for FTS5 queries.
///
/// The term is always wrapped in quotes with existing quotes doubled.
pub fn escape_fts5_term(term: &str) -> String {
    format!("\"{}\"", term.replace('"', "\"\""))
}

/// Whether the tokenizer would produce at least one token from `term`.
fn has_token_chars(term: &str) -> bool {
    term.chars().any(char::is_alphanumeric)
}

/// Build the MATCH expression for a search query.
///
/// Every whitespace-separated term becomes a prefix phrase and terms are
/// ANDed, all scoped to `columns`:
/// - "night" → `{data_title data_keywords} : ("night"*)`
/// - "wi-fi call" → `{...} : ("wi-fi"* AND "call"*)`
///
/// Returns an empty string for an empty query, and a query error when a term
/// has nothing the tokenizer could match.
pub fn build_match_expression(query: &str, columns: &[&str]) -> Result<String> {
    let query = query.trim();
    if query.is_empty() {
        return Ok(String::new());
    }

    let mut terms = Vec::new();
    for term in query.split_whitespace() {
        if !has_token_chars(term) {
            return Err(PrefSearchError::Query {
                query: query.to_string(),
                message: format!("term {:?} has no searchable characters", term),
            });
        }
        terms.push(format!("{}*", escape_fts5_term(term)));
    }

    Ok(format!("{{{}}} : ({})", columns.join(" "), terms.join(" AND ")))
}
