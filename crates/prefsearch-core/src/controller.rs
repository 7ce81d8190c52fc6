//! The façade over the index: registration, background builds and search.

use crate::config::IndexSettings;
use crate::index::{IndexStats, QueryEngine, SchemaStatus, SchemaStore, SearchResults};
use crate::indexer::{BuildReport, IndexWriter};
use crate::registry::{
    IndexableProvider, IndexableSource, InMemoryResources, PendingIndexables, Resources,
};
use crate::{PrefSearchError, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Entry point for callers of the search index.
///
/// Owns its store handle; several controllers over distinct stores can
/// coexist in one process. Builds run on the blocking thread pool and are
/// serialized: an `update()` issued while another is running waits for it.
pub struct IndexController {
    store: Arc<SchemaStore>,
    writer: Arc<IndexWriter>,
    engine: QueryEngine,
    locale: RwLock<String>,
    build_fingerprint: String,
    build_timeout: Duration,
    available: AtomicBool,
    pending: Mutex<PendingIndexables>,
    build_lock: tokio::sync::Mutex<()>,
}

impl IndexController {
    /// Create a builder that opens the store named in `settings`.
    pub fn builder(settings: IndexSettings) -> IndexControllerBuilder {
        IndexControllerBuilder::new(settings)
    }

    /// Compose a controller over an already opened store.
    pub fn new(
        store: Arc<SchemaStore>,
        resources: Arc<dyn Resources>,
        settings: IndexSettings,
    ) -> Self {
        let writer = IndexWriter::new(store.clone(), resources)
            .with_failure_policy(settings.failure_policy);

        Self {
            engine: QueryEngine::new(store.clone()),
            writer: Arc::new(writer),
            store,
            locale: RwLock::new(settings.locale),
            build_fingerprint: settings.build_fingerprint,
            build_timeout: settings.build_timeout,
            available: AtomicBool::new(false),
            pending: Mutex::new(PendingIndexables::new()),
            build_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// True once a build has completed and nothing has invalidated it since.
    pub fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    /// The display locale used for indexing and queries.
    pub fn locale(&self) -> String {
        self.locale
            .read()
            .map(|l| l.clone())
            .unwrap_or_else(|e| e.into_inner().clone())
    }

    /// Switch the display locale. The index becomes unavailable until the
    /// next `update()` has indexed the new locale.
    pub fn set_locale(&self, locale: impl Into<String>) {
        let locale = locale.into();
        let mut current = self.locale.write().unwrap_or_else(|e| e.into_inner());
        if *current != locale {
            info!("Display locale changed from '{}' to '{}'", current, locale);
            *current = locale;
            self.available.store(false, Ordering::SeqCst);
        }
    }

    /// Register a source for the next `update()`. No I/O.
    pub fn add_indexable_data(&self, source: impl Into<IndexableSource>) {
        self.pending
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .add(source);
    }

    /// Register a settings screen's provider under its fragment name.
    pub fn register_provider(
        &self,
        fragment_name: impl Into<String>,
        provider: Arc<dyn IndexableProvider>,
    ) {
        self.pending
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .add_provider(fragment_name, provider);
    }

    /// Number of registered sources.
    pub fn pending_count(&self) -> usize {
        self.pending
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }

    /// Verify the schema, then index the active locale over all registered
    /// sources. Returns whether the update completed without error.
    pub async fn update(&self) -> bool {
        self.try_update().await.is_ok()
    }

    /// Like [`Self::update`], surfacing the build report or the error.
    pub async fn try_update(&self) -> Result<BuildReport> {
        self.run_build(false).await
    }

    /// Drop every row and index the active locale from scratch.
    pub async fn rebuild(&self) -> Result<BuildReport> {
        self.run_build(true).await
    }

    /// Update unless another build is running, in which case fail with
    /// `BuildInProgress` instead of waiting.
    pub async fn try_update_if_idle(&self) -> Result<BuildReport> {
        let guard = self
            .build_lock
            .try_lock()
            .map_err(|_| PrefSearchError::BuildInProgress)?;
        self.build_locked(false, guard).await
    }

    async fn run_build(&self, reset: bool) -> Result<BuildReport> {
        let guard = self.build_lock.lock().await;
        self.build_locked(reset, guard).await
    }

    async fn build_locked(
        &self,
        reset: bool,
        _guard: tokio::sync::MutexGuard<'_, ()>,
    ) -> Result<BuildReport> {
        let was_available = self.available.swap(false, Ordering::SeqCst);

        let locale = self.locale();
        let built_locale = locale.clone();
        let sources = self
            .pending
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        if sources.is_empty() {
            debug!("Updating index for '{}' with no registered sources", locale);
        }

        let store = self.store.clone();
        let writer = self.writer.clone();
        let fingerprint = self.build_fingerprint.clone();
        let task = tokio::task::spawn_blocking(move || -> Result<(SchemaStatus, BuildReport)> {
            if reset {
                store.reset()?;
            }
            let status = store.ensure_current_schema(&fingerprint)?;
            let report = writer.build(&locale, &sources)?;
            Ok((status, report))
        });

        let outcome = match tokio::time::timeout(self.build_timeout, task).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_err)) if join_err.is_cancelled() => Err(PrefSearchError::Cancelled),
            Ok(Err(join_err)) => Err(PrefSearchError::Build {
                descriptor: "index build".to_string(),
                message: format!("build task failed: {}", join_err),
            }),
            Err(_) => Err(PrefSearchError::BuildTimeout(self.build_timeout)),
        };

        match outcome {
            Ok((status, report)) => {
                if status == SchemaStatus::Rebuilt {
                    debug!("Index schema was rebuilt before indexing");
                }
                self.mark_available_for(&built_locale);
                Ok(report)
            }
            Err(e) => {
                // A failed build leaves the previous index in place.
                let fatal = matches!(
                    e,
                    PrefSearchError::Storage { .. } | PrefSearchError::Io { .. }
                );
                if was_available && !reset && !fatal {
                    self.mark_available_for(&built_locale);
                }
                error!("Cannot update index: {}", e);
                Err(e)
            }
        }
    }

    /// Set the availability flag unless the locale changed since the build
    /// started. Checked under the locale lock so a concurrent `set_locale`
    /// either lands first or clears the flag afterwards.
    fn mark_available_for(&self, built_locale: &str) {
        let current = self.locale.read().unwrap_or_else(|e| e.into_inner());
        if *current == built_locale {
            self.available.store(true, Ordering::SeqCst);
        } else {
            debug!(
                "Locale changed to '{}' while indexing '{}'; index stays unavailable",
                current, built_locale
            );
        }
    }

    /// Search the active locale.
    ///
    /// Fails with `NotAvailable` before the first successful update. Malformed
    /// queries yield no results rather than an error.
    pub fn search(&self, query: &str) -> Result<SearchResults> {
        if !self.is_available() {
            return Err(PrefSearchError::NotAvailable);
        }

        match self.engine.search(query, &self.locale()) {
            Ok(results) => Ok(results),
            Err(e @ PrefSearchError::Query { .. }) => {
                warn!("{}", e);
                Ok(SearchResults::empty(query))
            }
            Err(e) => Err(e),
        }
    }

    /// Row counts and versioning details of the underlying store.
    pub fn stats(&self) -> Result<IndexStats> {
        self.store.stats()
    }

    /// The store this controller writes to.
    pub fn store(&self) -> &Arc<SchemaStore> {
        &self.store
    }
}

/// Builder for configuring an [`IndexController`].
///
/// # Example
///
/// ```rust,ignore
/// use prefsearch::{IndexController, IndexSettings, DirectoryResources};
///
/// let controller = IndexController::builder(settings)
///     .resources(Arc::new(DirectoryResources::new("./res")))
///     .build()?;
/// ```
pub struct IndexControllerBuilder {
    settings: IndexSettings,
    resources: Option<Arc<dyn Resources>>,
    store: Option<Arc<SchemaStore>>,
}

impl IndexControllerBuilder {
    pub fn new(settings: IndexSettings) -> Self {
        Self {
            settings,
            resources: None,
            store: None,
        }
    }

    /// Where field trees and localized strings come from.
    ///
    /// Default: an empty in-memory set.
    pub fn resources(mut self, resources: Arc<dyn Resources>) -> Self {
        self.resources = Some(resources);
        self
    }

    /// Use an already opened store instead of opening `settings.db_path`.
    pub fn store(mut self, store: Arc<SchemaStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn build(self) -> Result<IndexController> {
        if self.settings.build_fingerprint.is_empty() {
            return Err(PrefSearchError::Config {
                message: "build fingerprint must not be empty".to_string(),
            });
        }

        let store = match self.store {
            Some(store) => store,
            None => Arc::new(SchemaStore::open(&self.settings.db_path)?),
        };
        let resources = self
            .resources
            .unwrap_or_else(|| Arc::new(InMemoryResources::new()));

        Ok(IndexController::new(store, resources, self.settings))
    }
}
