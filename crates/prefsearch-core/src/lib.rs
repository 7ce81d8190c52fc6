//! Prefsearch Core - full-text search index over settings screens.
//!
//! Settings screens register what they contribute (field-tree references or
//! raw entries), a background build turns those into rows of an SQLite FTS5
//! table for the active locale, and queries prefix-match titles, summaries
//! and keywords ordered by rank.
//!
//! # Example
//!
//! ```rust,ignore
//! use prefsearch::{IndexController, IndexSettings, IndexableRef, InMemoryResources};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> prefsearch::Result<()> {
//!     let settings = IndexSettings {
//!         db_path: "/tmp/search_index.db".into(),
//!         build_fingerprint: "device/build/1".into(),
//!         ..Default::default()
//!     };
//!     let resources = InMemoryResources::new().with_field_tree(
//!         "display",
//!         r#"<PreferenceScreen title="Display"><SwitchPreference title="Night Light"/></PreferenceScreen>"#,
//!     );
//!
//!     let controller = IndexController::builder(settings)
//!         .resources(Arc::new(resources))
//!         .build()?;
//!     controller.add_indexable_data(IndexableRef::new("display", "DisplaySettings"));
//!     controller.update().await;
//!
//!     for entry in controller.search("night")? {
//!         println!("{} ({})", entry.title, entry.fragment_name);
//!     }
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod controller;
pub mod error;
pub mod index;
pub mod indexer;
pub mod registry;
pub mod types;

pub use config::{BuildConfig, FailurePolicy, IndexSettings, StoreConfig};
pub use controller::{IndexController, IndexControllerBuilder};
pub use error::{PrefSearchError, Result};
pub use index::{IndexStats, OnLocaleOverwrite, QueryEngine, SchemaStatus, SchemaStore, SearchResults};
pub use indexer::{BuildReport, DescriptorFailure, IndexWriter};
pub use registry::{
    DirectoryResources, IndexContext, IndexableProvider, IndexableSource, InMemoryResources,
    PendingIndexables, Resources,
};
pub use types::{FieldTreeId, IndexEntry, IndexableData, IndexableRef};
