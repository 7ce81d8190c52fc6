//! Centralized configuration for the preference search index.
//!
//! Constant groups live on unit structs; runtime knobs live on
//! [`IndexSettings`].

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// On-disk store layout and versioning.
pub struct StoreConfig;

impl StoreConfig {
    pub const DATABASE_FILE_NAME: &'static str = "search_index.db";
    pub const INDEX_TABLE: &'static str = "prefs_index";
    pub const META_TABLE: &'static str = "meta_index";

    /// Current schema version, stored in `PRAGMA user_version`.
    pub const SCHEMA_VERSION: u32 = 116;
    /// Any schema version above this one forces a drop and recreate when the
    /// stored version differs from [`Self::SCHEMA_VERSION`].
    pub const LEGACY_SCHEMA_THRESHOLD: u32 = 101;

    pub const FTS_TOKENIZER: &'static str = "unicode61 remove_diacritics 2";
    pub const BUSY_TIMEOUT_MS: u32 = 30_000;
}

/// Build pipeline configuration.
pub struct BuildConfig;

impl BuildConfig {
    pub const DEFAULT_BUILD_TIMEOUT: Duration = Duration::from_secs(60);
    pub const DEFAULT_LOCALE: &'static str = "en_US";
}

/// What the writer does when one descriptor fails to produce entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Record the failure, keep indexing the remaining descriptors.
    #[default]
    Isolate,
    /// Abort the whole locale's build on the first failure.
    FailFast,
}

/// Runtime settings for an [`crate::IndexController`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexSettings {
    /// Path of the SQLite database file.
    pub db_path: PathBuf,
    /// Display locale; scopes both indexing and queries.
    pub locale: String,
    /// Platform build identifier used to invalidate the store on upgrade.
    pub build_fingerprint: String,
    /// Upper bound on how long `update()` waits for the background build.
    #[serde(with = "duration_secs")]
    pub build_timeout: Duration,
    pub failure_policy: FailurePolicy,
}

impl Default for IndexSettings {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from(StoreConfig::DATABASE_FILE_NAME),
            locale: BuildConfig::DEFAULT_LOCALE.to_string(),
            build_fingerprint: String::new(),
            build_timeout: BuildConfig::DEFAULT_BUILD_TIMEOUT,
            failure_policy: FailurePolicy::default(),
        }
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_secs(u64::deserialize(deserializer)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_version_above_legacy_threshold() {
        assert!(StoreConfig::SCHEMA_VERSION > StoreConfig::LEGACY_SCHEMA_THRESHOLD);
    }

    #[test]
    fn test_settings_json_roundtrip_uses_seconds() {
        let settings = IndexSettings {
            build_fingerprint: "build/1".into(),
            build_timeout: Duration::from_secs(5),
            ..Default::default()
        };
        let json = serde_json::to_value(&settings).unwrap();
        assert_eq!(json["buildTimeout"], 5);
        assert_eq!(json["failurePolicy"], "isolate");

        let parsed: IndexSettings = serde_json::from_value(json).unwrap();
        assert_eq!(parsed.build_timeout, Duration::from_secs(5));
        assert_eq!(parsed.locale, "en_US");
    }
}
