//! The `index.json` file listing what a resource directory contributes.

use anyhow::{Context, Result};
use prefsearch::{IndexController, IndexableData, IndexableRef};
use serde::Deserialize;
use std::path::Path;

pub const MANIFEST_FILE_NAME: &str = "index.json";

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct IndexManifest {
    pub refs: Vec<IndexableRef>,
    pub raw_data: Vec<IndexableData>,
}

impl IndexManifest {
    /// Read `<resources>/index.json`.
    pub fn load(resources_root: &Path) -> Result<Self> {
        let path = resources_root.join(MANIFEST_FILE_NAME);
        let text = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        serde_json::from_str(&text).with_context(|| format!("Invalid manifest {}", path.display()))
    }

    pub fn len(&self) -> usize {
        self.refs.len() + self.raw_data.len()
    }

    /// Register every listed source with the controller.
    pub fn register(self, controller: &IndexController) {
        for indexable in self.refs {
            controller.add_indexable_data(indexable);
        }
        for data in self.raw_data {
            controller.add_indexable_data(data);
        }
    }
}
