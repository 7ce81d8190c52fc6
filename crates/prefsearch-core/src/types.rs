//! Data model shared by the writer, the store and the query engine.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a field-tree resource (a declarative settings screen).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldTreeId(pub String);

impl FieldTreeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FieldTreeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for FieldTreeId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// A source of index entries backed by a field tree.
///
/// A ref without a field tree is resolved through the provider registered
/// under its `fragment_name`, which supplies raw data instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexableRef {
    #[serde(default)]
    pub field_tree_id: Option<FieldTreeId>,
    pub fragment_name: String,
    #[serde(default)]
    pub icon_res_id: i64,
    #[serde(default)]
    pub rank: i64,
}

impl IndexableRef {
    pub fn new(field_tree_id: impl Into<FieldTreeId>, fragment_name: impl Into<String>) -> Self {
        Self {
            field_tree_id: Some(field_tree_id.into()),
            fragment_name: fragment_name.into(),
            icon_res_id: 0,
            rank: 0,
        }
    }

    /// A ref whose entries come from the fragment's registered provider.
    pub fn provider(fragment_name: impl Into<String>) -> Self {
        Self {
            field_tree_id: None,
            fragment_name: fragment_name.into(),
            icon_res_id: 0,
            rank: 0,
        }
    }

    pub fn with_icon(mut self, icon_res_id: i64) -> Self {
        self.icon_res_id = icon_res_id;
        self
    }

    pub fn with_rank(mut self, rank: i64) -> Self {
        self.rank = rank;
        self
    }

    /// Human-readable name used in logs and build diagnostics.
    pub fn describe(&self) -> String {
        match &self.field_tree_id {
            Some(id) => format!("{} ({})", self.fragment_name, id),
            None => self.fragment_name.clone(),
        }
    }
}

/// A manually constructed entry for content without a field tree.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct IndexableData {
    pub locale: String,
    pub title: String,
    pub summary: Option<String>,
    pub keywords: Option<String>,
    pub fragment_name: String,
    pub fragment_title: Option<String>,
    /// Opaque navigation target, stored verbatim in the `intent` column.
    pub intent: Option<String>,
    pub icon_res_id: i64,
    pub rank: i64,
}

/// One search result row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexEntry {
    pub locale: String,
    pub rank: i64,
    pub title: String,
    pub summary: String,
    pub keywords: String,
    pub fragment_name: String,
    pub fragment_title: String,
    pub intent: String,
    pub icon: i64,
}

/// Which spelling of an entry a row holds.
///
/// Entries typeset with a non-breaking hyphen are written once per spelling;
/// all other entries are written once as `Plain`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum HyphenVariant {
    #[default]
    Plain,
    /// Non-breaking hyphen replaced by `-`.
    Hyphenated,
    /// Non-breaking hyphen removed.
    Joined,
}

impl HyphenVariant {
    pub fn as_i64(self) -> i64 {
        match self {
            HyphenVariant::Plain => 0,
            HyphenVariant::Hyphenated => 1,
            HyphenVariant::Joined => 2,
        }
    }

    pub fn from_i64(value: i64) -> Self {
        match value {
            1 => HyphenVariant::Hyphenated,
            2 => HyphenVariant::Joined,
            _ => HyphenVariant::Plain,
        }
    }
}

/// A physical row as written to the full-text table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexRow {
    pub locale: String,
    pub rank: i64,
    pub title: String,
    pub title_normalized: String,
    pub summary: String,
    pub summary_normalized: String,
    pub keywords: String,
    pub fragment_name: String,
    pub fragment_title: String,
    pub intent: String,
    pub icon: i64,
    pub variant: HyphenVariant,
}
