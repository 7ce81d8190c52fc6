//! FTS5 virtual table setup and management.

use crate::config::StoreConfig;
use crate::Result;
use rusqlite::Connection;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Columns matched by search queries.
pub const MATCH_COLUMNS: [&str; 5] = [
    "data_title",
    "data_title_normalized",
    "data_summary",
    "data_summary_normalized",
    "data_keywords",
];

/// Configuration for the FTS5 table.
#[derive(Debug, Clone)]
pub struct FTS5Config {
    /// Name of the FTS5 virtual table.
    pub table_name: String,
    /// Tokenizer configuration.
    pub tokenizer: String,
}

impl Default for FTS5Config {
    fn default() -> Self {
        Self {
            table_name: StoreConfig::INDEX_TABLE.to_string(),
            tokenizer: StoreConfig::FTS_TOKENIZER.to_string(),
        }
    }
}

/// Manager for FTS5 setup and maintenance.
pub struct FTS5Manager<'a> {
    config: &'a FTS5Config,
}

impl<'a> FTS5Manager<'a> {
    /// Create a new FTS5 manager.
    pub fn new(config: &'a FTS5Config) -> Self {
        Self { config }
    }

    /// Check if the FTS5 table exists.
    pub fn table_exists(&self, conn: &Connection) -> Result<bool> {
        let count: i32 = conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?1",
            [&self.config.table_name],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// Create the FTS5 virtual table.
    ///
    /// Only the title, summary and keyword columns are tokenized; the rest are
    /// stored for display and filtering.
    pub fn create_table(&self, conn: &Connection) -> Result<()> {
        let sql = format!(
            "CREATE VIRTUAL TABLE IF NOT EXISTS {} USING fts5(
                locale UNINDEXED,
                data_rank UNINDEXED,
                data_title,
                data_title_normalized,
                data_summary,
                data_summary_normalized,
                data_keywords,
                fragment_name UNINDEXED,
                fragment_title UNINDEXED,
                intent UNINDEXED,
                icon UNINDEXED,
                data_variant UNINDEXED,
                tokenize='{}'
            )",
            self.config.table_name, self.config.tokenizer
        );

        conn.execute(&sql, [])?;
        debug!("Created FTS5 table: {}", self.config.table_name);
        Ok(())
    }

    /// Drop the FTS5 table and everything in it.
    pub fn drop_table(&self, conn: &Connection) -> Result<()> {
        conn.execute_batch(&format!("DROP TABLE IF EXISTS {};", self.config.table_name))?;
        info!("Dropped FTS5 table: {}", self.config.table_name);
        Ok(())
    }

    /// Optimize the FTS5 index.
    pub fn optimize(&self, conn: &Connection) -> Result<()> {
        let sql = format!(
            "INSERT INTO {}({}) VALUES('optimize')",
            self.config.table_name, self.config.table_name
        );
        conn.execute(&sql, [])?;
        debug!("Optimized FTS5 index");
        Ok(())
    }

    /// Get statistics about the FTS5 index.
    pub fn get_stats(&self, conn: &Connection) -> Result<FTS5Stats> {
        let mut stmt = conn.prepare(&format!(
            "SELECT locale, COUNT(*) FROM {} GROUP BY locale",
            self.config.table_name
        ))?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, usize>(1)?))
        })?;

        let mut rows_per_locale = BTreeMap::new();
        for row in rows {
            let (locale, count) = row?;
            rows_per_locale.insert(locale, count);
        }

        Ok(FTS5Stats {
            table_name: self.config.table_name.clone(),
            row_count: rows_per_locale.values().sum(),
            rows_per_locale,
            tokenizer: self.config.tokenizer.clone(),
        })
    }
}

/// Statistics about an FTS5 index.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FTS5Stats {
    pub table_name: String,
    pub row_count: usize,
    pub rows_per_locale: BTreeMap<String, usize>,
    pub tokenizer: String,
}
