//! On-disk store: the full-text table, the build fingerprint record, and the
//! schema version/upgrade logic.

use crate::config::StoreConfig;
use crate::types::IndexRow;
use crate::{PrefSearchError, Result};
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;
use tracing::{debug, info, warn};

use super::fts5::{FTS5Config, FTS5Manager};

/// Outcome of a schema check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SchemaStatus {
    UpToDate,
    /// Tables were dropped and recreated; the store holds no rows.
    Rebuilt,
}

/// What `write_rows` does when a locale being written already has rows.
///
/// The check runs inside the write transaction, so it also catches a build
/// for the same locale that committed after the caller's presence check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnLocaleOverwrite {
    /// Commit nothing and report zero rows written.
    Skip,
    /// Insert alongside the existing rows.
    Append,
}

/// Store statistics.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexStats {
    pub row_count: usize,
    pub rows_per_locale: BTreeMap<String, usize>,
    pub schema_version: u32,
    pub build_fingerprint: Option<String>,
    pub tokenizer: String,
}

/// SQLite store backing the search index.
///
/// Holds one writer and one reader connection in WAL mode: a search is not
/// blocked by an open build transaction and sees the last committed state.
pub struct SchemaStore {
    db_path: PathBuf,
    writer: Arc<Mutex<Connection>>,
    reader: Arc<Mutex<Connection>>,
    fts5_config: FTS5Config,
}

impl SchemaStore {
    /// Open the store at the given path, creating it if absent.
    pub fn open(db_path: impl Into<PathBuf>) -> Result<Self> {
        let db_path = db_path.into();

        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|e| PrefSearchError::Storage {
                    message: format!("Failed to create directory {}: {}", parent.display(), e),
                    source: None,
                })?;
            }
        }

        let writer = Connection::open(&db_path).map_err(|e| PrefSearchError::Storage {
            message: format!("Failed to open index database {}: {}", db_path.display(), e),
            source: Some(e),
        })?;
        Self::configure_connection(&writer)?;

        let store = Self {
            reader: Arc::new(Mutex::new(Self::open_reader(&db_path)?)),
            writer: Arc::new(Mutex::new(writer)),
            db_path,
            fts5_config: FTS5Config::default(),
        };

        store.ensure_schema_version()?;
        Ok(store)
    }

    fn configure_connection(conn: &Connection) -> Result<()> {
        conn.execute_batch(&format!(
            "
            PRAGMA journal_mode=WAL;
            PRAGMA busy_timeout={};
            PRAGMA synchronous=NORMAL;
            PRAGMA temp_store=MEMORY;
            ",
            StoreConfig::BUSY_TIMEOUT_MS
        ))?;
        Ok(())
    }

    fn open_reader(db_path: &Path) -> Result<Connection> {
        let conn = Connection::open(db_path)?;
        conn.execute_batch(&format!(
            "PRAGMA busy_timeout={}; PRAGMA query_only=ON;",
            StoreConfig::BUSY_TIMEOUT_MS
        ))?;
        Ok(conn)
    }

    /// Get the database path.
    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    fn lock_writer(&self) -> Result<MutexGuard<'_, Connection>> {
        self.writer
            .lock()
            .map_err(|_| PrefSearchError::storage("Failed to acquire writer connection lock"))
    }

    /// Run a read on the reader connection.
    pub(crate) fn with_reader<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let conn = self
            .reader
            .lock()
            .map_err(|_| PrefSearchError::storage("Failed to acquire reader connection lock"))?;
        f(&conn)
    }

    fn user_version(conn: &Connection) -> Result<u32> {
        Ok(conn.query_row("PRAGMA user_version", [], |row| row.get(0))?)
    }

    fn create_tables(&self, conn: &Connection) -> Result<()> {
        FTS5Manager::new(&self.fts5_config).create_table(conn)?;
        conn.execute_batch(&format!(
            "CREATE TABLE IF NOT EXISTS {} (
                id INTEGER PRIMARY KEY CHECK (id = 1),
                build TEXT NOT NULL
            );",
            StoreConfig::META_TABLE
        ))?;
        Ok(())
    }

    fn drop_tables(&self, conn: &Connection) -> Result<()> {
        FTS5Manager::new(&self.fts5_config).drop_table(conn)?;
        conn.execute_batch(&format!("DROP TABLE IF EXISTS {};", StoreConfig::META_TABLE))?;
        Ok(())
    }

    fn reconstruct(&self, conn: &Connection, fingerprint: Option<&str>) -> Result<()> {
        self.drop_tables(conn)?;
        self.create_tables(conn)?;
        if let Some(fingerprint) = fingerprint {
            Self::write_fingerprint(conn, fingerprint)?;
        }
        conn.execute_batch(&format!(
            "PRAGMA user_version = {};",
            StoreConfig::SCHEMA_VERSION
        ))?;
        Ok(())
    }

    fn write_fingerprint(conn: &Connection, fingerprint: &str) -> Result<()> {
        conn.execute(
            &format!(
                "INSERT OR REPLACE INTO {} (id, build) VALUES (1, ?1)",
                StoreConfig::META_TABLE
            ),
            params![fingerprint],
        )?;
        Ok(())
    }

    fn read_fingerprint(conn: &Connection) -> Result<Option<String>> {
        let fingerprint = conn
            .query_row(
                &format!("SELECT build FROM {} WHERE id = 1", StoreConfig::META_TABLE),
                [],
                |row| row.get(0),
            )
            .optional()?;
        Ok(fingerprint)
    }

    /// Create the tables on a fresh store, or run the upgrade path when the
    /// stored schema version differs from the current one.
    fn ensure_schema_version(&self) -> Result<()> {
        let stored = {
            let conn = self.lock_writer()?;
            Self::user_version(&conn)?
        };

        if stored == 0 {
            let conn = self.lock_writer()?;
            self.create_tables(&conn)?;
            conn.execute_batch(&format!(
                "PRAGMA user_version = {};",
                StoreConfig::SCHEMA_VERSION
            ))?;
            debug!("Created index schema v{}", StoreConfig::SCHEMA_VERSION);
        } else if stored != StoreConfig::SCHEMA_VERSION {
            self.upgrade_schema(stored, StoreConfig::SCHEMA_VERSION)?;
        }
        Ok(())
    }

    /// Move the store from `old_version` to `new_version`.
    ///
    /// Versions at or below [`StoreConfig::LEGACY_SCHEMA_THRESHOLD`] share a
    /// compatible layout and only get missing tables created. Moving to a
    /// version above the threshold, or downgrading, drops and recreates
    /// everything regardless of the stored fingerprint.
    pub fn upgrade_schema(&self, old_version: u32, new_version: u32) -> Result<SchemaStatus> {
        let mut conn = self.lock_writer()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let status = if new_version > StoreConfig::LEGACY_SCHEMA_THRESHOLD
            || new_version < old_version
        {
            self.drop_tables(&tx)?;
            self.create_tables(&tx)?;
            info!(
                "Index schema v{} -> v{}: dropped and recreated",
                old_version, new_version
            );
            SchemaStatus::Rebuilt
        } else {
            self.create_tables(&tx)?;
            debug!("Index schema v{} -> v{}: compatible", old_version, new_version);
            SchemaStatus::UpToDate
        };

        tx.execute_batch(&format!("PRAGMA user_version = {};", new_version))?;
        tx.commit()?;
        Ok(status)
    }

    /// Compare the stored build fingerprint to `build_fingerprint`.
    ///
    /// When it is absent or different, both tables are dropped and recreated
    /// and the new fingerprint is recorded. Must run before any read or write.
    pub fn ensure_current_schema(&self, build_fingerprint: &str) -> Result<SchemaStatus> {
        let mut conn = self.lock_writer()?;

        let stored = match Self::read_fingerprint(&conn) {
            Ok(stored) => stored,
            Err(e) => {
                warn!("Cannot read build fingerprint, rebuilding index: {}", e);
                None
            }
        };
        if stored.as_deref() == Some(build_fingerprint) {
            return Ok(SchemaStatus::UpToDate);
        }

        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        self.reconstruct(&tx, Some(build_fingerprint))?;
        tx.commit()?;

        info!(
            "Build fingerprint changed ({:?} -> {:?}), index rebuilt",
            stored, build_fingerprint
        );
        Ok(SchemaStatus::Rebuilt)
    }

    /// The fingerprint recorded by the last `ensure_current_schema`.
    pub fn stored_fingerprint(&self) -> Result<Option<String>> {
        let conn = self.lock_writer()?;
        Self::read_fingerprint(&conn)
    }

    /// Drop every row, keeping the recorded fingerprint.
    pub fn reset(&self) -> Result<()> {
        let mut conn = self.lock_writer()?;
        let fingerprint = Self::read_fingerprint(&conn)?;

        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        self.reconstruct(&tx, fingerprint.as_deref())?;
        tx.commit()?;

        info!("Index reset");
        Ok(())
    }

    /// True if at least one row exists for `locale`.
    ///
    /// This is a presence check: rows written from older descriptor content
    /// still count.
    pub fn locale_already_indexed(&self, locale: &str) -> Result<bool> {
        let conn = self.lock_writer()?;
        Self::has_locale_rows(&conn, &self.fts5_config.table_name, locale)
    }

    fn has_locale_rows(conn: &Connection, table: &str, locale: &str) -> Result<bool> {
        let found = conn
            .query_row(
                &format!("SELECT 1 FROM {} WHERE locale = ?1 LIMIT 1", table),
                params![locale],
                |_| Ok(()),
            )
            .optional()?;
        Ok(found.is_some())
    }

    /// Insert all rows in one transaction.
    ///
    /// Either every row commits or none does; on failure the previous state is
    /// left untouched. Returns the number of rows written.
    pub fn write_rows(&self, rows: &[IndexRow], on_locale_overwrite: OnLocaleOverwrite) -> Result<usize> {
        if rows.is_empty() {
            return Ok(0);
        }

        let start = Instant::now();
        let table = &self.fts5_config.table_name;
        let mut conn = self.lock_writer()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        if on_locale_overwrite == OnLocaleOverwrite::Skip {
            let locales: BTreeSet<&str> = rows.iter().map(|r| r.locale.as_str()).collect();
            for locale in locales {
                if Self::has_locale_rows(&tx, table, locale)? {
                    debug!("Locale '{}' was indexed concurrently, skipping write", locale);
                    return Ok(0);
                }
            }
        }

        {
            let mut stmt = tx.prepare(&format!(
                "INSERT INTO {} (locale, data_rank, data_title, data_title_normalized,
                     data_summary, data_summary_normalized, data_keywords, fragment_name,
                     fragment_title, intent, icon, data_variant)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                table
            ))?;

            for row in rows {
                stmt.execute(params![
                    row.locale,
                    row.rank,
                    row.title,
                    row.title_normalized,
                    row.summary,
                    row.summary_normalized,
                    row.keywords,
                    row.fragment_name,
                    row.fragment_title,
                    row.intent,
                    row.icon,
                    row.variant.as_i64(),
                ])?;
            }
        }

        tx.commit()?;
        debug!(
            "Wrote {} rows in {} ms",
            rows.len(),
            start.elapsed().as_millis()
        );
        Ok(rows.len())
    }

    /// Optimize the FTS5 index.
    pub fn optimize(&self) -> Result<()> {
        let conn = self.lock_writer()?;
        FTS5Manager::new(&self.fts5_config).optimize(&conn)
    }

    /// Row counts, schema version and fingerprint.
    pub fn stats(&self) -> Result<IndexStats> {
        let conn = self.lock_writer()?;
        let fts5_stats = FTS5Manager::new(&self.fts5_config).get_stats(&conn)?;

        Ok(IndexStats {
            row_count: fts5_stats.row_count,
            rows_per_locale: fts5_stats.rows_per_locale,
            schema_version: Self::user_version(&conn)?,
            build_fingerprint: Self::read_fingerprint(&conn)?,
            tokenizer: fts5_stats.tokenizer,
        })
    }

    /// Checkpoint the WAL file.
    pub fn checkpoint_wal(&self) -> Result<()> {
        let conn = self.lock_writer()?;
        conn.query_row("PRAGMA wal_checkpoint(TRUNCATE)", [], |_| Ok(()))?;
        debug!("Checkpointed WAL");
        Ok(())
    }

    pub(crate) fn table_name(&self) -> &str {
        &self.fts5_config.table_name
    }
}
