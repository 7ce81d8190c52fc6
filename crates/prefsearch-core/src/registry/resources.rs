//! Resource lookup for field trees and localized strings.

use crate::types::FieldTreeId;
use crate::{PrefSearchError, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, warn};

/// Source of field-tree documents and localized strings.
pub trait Resources: Send + Sync {
    /// XML text of the field tree with the given id.
    fn field_tree(&self, id: &FieldTreeId) -> Result<String>;

    /// Localized value of a string resource, if one exists for `locale`.
    fn string(&self, locale: &str, name: &str) -> Option<String>;
}

/// Resources held in memory, assembled with builder methods.
#[derive(Debug, Clone, Default)]
pub struct InMemoryResources {
    field_trees: HashMap<FieldTreeId, String>,
    strings: HashMap<(String, String), String>,
    default_strings: HashMap<String, String>,
}

impl InMemoryResources {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_field_tree(mut self, id: impl Into<FieldTreeId>, xml: impl Into<String>) -> Self {
        self.field_trees.insert(id.into(), xml.into());
        self
    }

    pub fn with_string(
        mut self,
        locale: impl Into<String>,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.strings
            .insert((locale.into(), name.into()), value.into());
        self
    }

    /// A string used when no locale-specific value exists.
    pub fn with_default_string(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.default_strings.insert(name.into(), value.into());
        self
    }
}

impl Resources for InMemoryResources {
    fn field_tree(&self, id: &FieldTreeId) -> Result<String> {
        self.field_trees
            .get(id)
            .cloned()
            .ok_or_else(|| PrefSearchError::ResourceNotFound(id.to_string()))
    }

    fn string(&self, locale: &str, name: &str) -> Option<String> {
        self.strings
            .get(&(locale.to_string(), name.to_string()))
            .or_else(|| self.default_strings.get(name))
            .cloned()
    }
}

type StringTable = HashMap<String, String>;

/// Resources laid out on disk:
///
/// ```text
/// <root>/xml/<field_tree_id>.xml
/// <root>/values/strings.json            default strings
/// <root>/values-<lang>/strings.json     e.g. values-fr
/// <root>/values-<locale>/strings.json   e.g. values-fr_FR
/// ```
pub struct DirectoryResources {
    root: PathBuf,
    string_tables: Mutex<HashMap<String, Option<StringTable>>>,
}

impl DirectoryResources {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            string_tables: Mutex::new(HashMap::new()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn field_tree_path(&self, id: &FieldTreeId) -> Result<PathBuf> {
        let name = id.as_str();
        if name.is_empty() || name.contains(['/', '\\']) || name.contains("..") {
            return Err(PrefSearchError::Config {
                message: format!("Invalid field tree id: {name:?}"),
            });
        }
        Ok(self.root.join("xml").join(format!("{name}.xml")))
    }

    /// Directory suffixes tried for a locale, most specific first.
    fn locale_dirs(locale: &str) -> Vec<String> {
        let mut dirs = Vec::new();
        if !locale.is_empty() {
            dirs.push(format!("values-{locale}"));
            if let Some((language, _)) = locale.split_once('_') {
                dirs.push(format!("values-{language}"));
            }
        }
        dirs.push("values".to_string());
        dirs
    }

    fn load_table(path: &Path) -> Option<StringTable> {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                warn!("Failed to read string table {}: {}", path.display(), e);
                return None;
            }
        };
        match serde_json::from_str(&text) {
            Ok(table) => {
                debug!("Loaded string table {}", path.display());
                Some(table)
            }
            Err(e) => {
                warn!("Invalid string table {}: {}", path.display(), e);
                None
            }
        }
    }

    fn lookup(&self, dir: &str, name: &str) -> Option<String> {
        let mut tables = self.string_tables.lock().ok()?;
        let table = tables.entry(dir.to_string()).or_insert_with(|| {
            Self::load_table(&self.root.join(dir).join("strings.json"))
        });
        table.as_ref().and_then(|t| t.get(name).cloned())
    }
}

impl Resources for DirectoryResources {
    fn field_tree(&self, id: &FieldTreeId) -> Result<String> {
        let path = self.field_tree_path(id)?;
        std::fs::read_to_string(&path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                PrefSearchError::ResourceNotFound(id.to_string())
            } else {
                PrefSearchError::io_with_path(e, path)
            }
        })
    }

    fn string(&self, locale: &str, name: &str) -> Option<String> {
        Self::locale_dirs(locale)
            .iter()
            .find_map(|dir| self.lookup(dir, name))
    }
}
