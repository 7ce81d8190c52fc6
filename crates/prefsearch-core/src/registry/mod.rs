//! Registration of indexable sources.
//!
//! Settings screens contribute to the index through [`IndexableProvider`].
//! Registration is purely in-memory: nothing touches the store until the
//! controller runs an update.

pub mod resources;

pub use resources::{DirectoryResources, InMemoryResources, Resources};

use crate::types::{IndexableData, IndexableRef};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Context handed to providers when they are asked for their entries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexContext {
    pub locale: String,
}

impl IndexContext {
    pub fn new(locale: impl Into<String>) -> Self {
        Self {
            locale: locale.into(),
        }
    }
}

/// Implemented by every settings screen that contributes search entries.
pub trait IndexableProvider: Send + Sync {
    /// Field-tree backed sources for this screen.
    fn refs_to_index(&self, _context: &IndexContext) -> Vec<IndexableRef> {
        Vec::new()
    }

    /// Entries that have no field tree.
    fn raw_data_to_index(&self, _context: &IndexContext) -> Vec<IndexableData> {
        Vec::new()
    }
}

/// Either kind of source accepted by `add_indexable_data`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IndexableSource {
    Ref(IndexableRef),
    Data(IndexableData),
}

impl From<IndexableRef> for IndexableSource {
    fn from(value: IndexableRef) -> Self {
        IndexableSource::Ref(value)
    }
}

impl From<IndexableData> for IndexableSource {
    fn from(value: IndexableData) -> Self {
        IndexableSource::Data(value)
    }
}

/// Sources accumulated for the next update.
///
/// Providers are kept rather than expanded: both their refs and their raw
/// data are requested at build time for the locale being built.
#[derive(Clone, Default)]
pub struct PendingIndexables {
    pub refs: Vec<IndexableRef>,
    pub raw_data: Vec<IndexableData>,
    providers: Vec<(String, Arc<dyn IndexableProvider>)>,
}

impl PendingIndexables {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, source: impl Into<IndexableSource>) {
        match source.into() {
            IndexableSource::Ref(r) => self.refs.push(r),
            IndexableSource::Data(d) => self.raw_data.push(d),
        }
    }

    /// Remember a provider by fragment name, replacing an earlier one.
    pub fn add_provider(
        &mut self,
        fragment_name: impl Into<String>,
        provider: Arc<dyn IndexableProvider>,
    ) {
        let fragment_name = fragment_name.into();
        match self.providers.iter_mut().find(|(name, _)| *name == fragment_name) {
            Some(slot) => slot.1 = provider,
            None => self.providers.push((fragment_name, provider)),
        }
    }

    pub fn provider(&self, fragment_name: &str) -> Option<&Arc<dyn IndexableProvider>> {
        self.providers
            .iter()
            .find(|(name, _)| name == fragment_name)
            .map(|(_, provider)| provider)
    }

    /// Every ref to index for `context`: registered refs first, then each
    /// provider's refs in registration order.
    ///
    /// A provider's raw data is reached through a ref without a field tree;
    /// one is added unless the provider or a registered ref declares it.
    pub fn refs_for(&self, context: &IndexContext) -> Vec<IndexableRef> {
        let mut refs = self.refs.clone();
        for (fragment_name, provider) in &self.providers {
            refs.extend(provider.refs_to_index(context));
            let declares_raw_data = refs
                .iter()
                .any(|r| r.field_tree_id.is_none() && r.fragment_name == *fragment_name);
            if !declares_raw_data {
                refs.push(IndexableRef::provider(fragment_name.clone()));
            }
        }
        refs
    }

    pub fn is_empty(&self) -> bool {
        self.refs.is_empty() && self.raw_data.is_empty() && self.providers.is_empty()
    }

    /// Registered refs, raw entries and providers.
    pub fn len(&self) -> usize {
        self.refs.len() + self.raw_data.len() + self.providers.len()
    }
}

impl std::fmt::Debug for PendingIndexables {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingIndexables")
            .field("refs", &self.refs)
            .field("raw_data", &self.raw_data)
            .field(
                "providers",
                &self.providers.iter().map(|(name, _)| name).collect::<Vec<_>>(),
            )
            .finish()
    }
}
