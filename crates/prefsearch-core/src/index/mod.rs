//! SQLite search index with FTS5 full-text search.
//!
//! This module provides:
//! - The on-disk store with build-fingerprint and schema-version invalidation
//! - FTS5 table setup and maintenance
//! - Query building and search execution

mod engine;
mod fts5;
mod query;
mod store;

pub use engine::{QueryEngine, SearchResults};
pub use fts5::{FTS5Config, FTS5Manager, FTS5Stats, MATCH_COLUMNS};
pub use query::{build_match_expression, escape_fts5_term};
pub use store::{IndexStats, OnLocaleOverwrite, SchemaStatus, SchemaStore};
