//! The build pipeline: resolves registered sources into rows and writes them
//! for one locale in a single transaction.

use crate::config::FailurePolicy;
use crate::index::{OnLocaleOverwrite, SchemaStore};
use crate::registry::{IndexContext, PendingIndexables, Resources};
use crate::types::{FieldTreeId, IndexRow, IndexableData, IndexableRef};
use crate::{PrefSearchError, Result};
use regex::Regex;
use serde::Serialize;
use std::sync::{Arc, LazyLock};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use super::field_tree::{parse_field_tree, FieldNode};
use super::normalize::{rows_for_entry, LogicalEntry};

/// `@string/<name>` references inside field-tree attributes.
static STRING_REFERENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^@string/([A-Za-z0-9_.]+)$").unwrap());

/// A descriptor that produced no rows because it failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DescriptorFailure {
    pub descriptor: String,
    pub message: String,
}

/// Outcome of one build.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildReport {
    pub locale: String,
    pub rows_written: usize,
    /// The locale already had rows; nothing was parsed.
    pub cache_hit: bool,
    pub failures: Vec<DescriptorFailure>,
    #[serde(skip)]
    pub elapsed: Duration,
}

impl BuildReport {
    fn cache_hit(locale: &str, elapsed: Duration) -> Self {
        Self {
            locale: locale.to_string(),
            rows_written: 0,
            cache_hit: true,
            failures: Vec::new(),
            elapsed,
        }
    }
}

/// Resolves sources to rows and writes them through the store.
pub struct IndexWriter {
    store: Arc<SchemaStore>,
    resources: Arc<dyn Resources>,
    failure_policy: FailurePolicy,
}

impl IndexWriter {
    pub fn new(store: Arc<SchemaStore>, resources: Arc<dyn Resources>) -> Self {
        Self {
            store,
            resources,
            failure_policy: FailurePolicy::default(),
        }
    }

    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    /// Index every registered source for `locale`.
    ///
    /// Returns immediately with zero rows when the locale already has rows.
    /// Otherwise every ref's field tree is parsed, raw data for the locale is
    /// added, and all resulting rows are written in one transaction.
    pub fn build(&self, locale: &str, sources: &PendingIndexables) -> Result<BuildReport> {
        let start = Instant::now();

        if self.store.locale_already_indexed(locale)? {
            debug!("Locale '{}' is already indexed", locale);
            return Ok(BuildReport::cache_hit(locale, start.elapsed()));
        }

        let mut rows = Vec::new();
        let mut failures = Vec::new();

        let refs = sources.refs_for(&IndexContext::new(locale));
        for indexable in &refs {
            match self.rows_for_ref(locale, indexable, sources) {
                Ok(ref_rows) => rows.extend(ref_rows),
                Err(e) => {
                    let failure = DescriptorFailure {
                        descriptor: indexable.describe(),
                        message: e.to_string(),
                    };
                    if self.failure_policy == FailurePolicy::FailFast {
                        return Err(PrefSearchError::Build {
                            descriptor: failure.descriptor,
                            message: failure.message,
                        });
                    }
                    warn!("Cannot index {}: {}", failure.descriptor, failure.message);
                    failures.push(failure);
                }
            }
        }

        for data in &sources.raw_data {
            if !Self::matches_locale(&data.locale, locale) {
                continue;
            }
            rows.extend(Self::rows_for_raw(locale, data));
        }

        let rows_written = self.store.write_rows(&rows, OnLocaleOverwrite::Skip)?;
        if rows_written > 0 {
            if let Err(e) = self.store.optimize() {
                warn!("Failed to optimize index after build: {}", e);
            }
        }

        let elapsed = start.elapsed();
        info!(
            "Indexing locale '{}' took {} ms: {} rows, {} failed descriptors",
            locale,
            elapsed.as_millis(),
            rows_written,
            failures.len()
        );

        Ok(BuildReport {
            locale: locale.to_string(),
            rows_written,
            cache_hit: false,
            failures,
            elapsed,
        })
    }

    fn matches_locale(data_locale: &str, locale: &str) -> bool {
        data_locale.is_empty() || data_locale.eq_ignore_ascii_case(locale)
    }

    fn rows_for_ref(
        &self,
        locale: &str,
        indexable: &IndexableRef,
        sources: &PendingIndexables,
    ) -> Result<Vec<IndexRow>> {
        if let Some(id) = &indexable.field_tree_id {
            return self.rows_for_field_tree(locale, id, indexable);
        }

        let provider = sources.provider(&indexable.fragment_name).ok_or_else(|| {
            PrefSearchError::Build {
                descriptor: indexable.describe(),
                message: "no field tree and no registered provider".to_string(),
            }
        })?;

        let context = IndexContext::new(locale);
        let rows = provider
            .raw_data_to_index(&context)
            .iter()
            .filter(|data| Self::matches_locale(&data.locale, locale))
            .flat_map(|data| {
                let entry = LogicalEntry {
                    title: Some(data.title.clone()),
                    summary: data.summary.clone(),
                    keywords: data.keywords.clone(),
                    fragment_name: indexable.fragment_name.clone(),
                    fragment_title: data.fragment_title.clone().unwrap_or_default(),
                    intent: data.intent.clone().unwrap_or_default(),
                    icon: indexable.icon_res_id,
                    rank: indexable.rank,
                };
                rows_for_entry(locale, &entry)
            })
            .collect();
        Ok(rows)
    }

    fn rows_for_field_tree(
        &self,
        locale: &str,
        id: &FieldTreeId,
        indexable: &IndexableRef,
    ) -> Result<Vec<IndexRow>> {
        let xml = self.resources.field_tree(id)?;
        let tree = parse_field_tree(id.as_str(), &xml)?;
        let fragment_title = self
            .resolve(locale, tree.root.title.as_deref())
            .unwrap_or_default();

        let mut rows = Vec::new();
        for node in tree.nodes() {
            let entry = self.entry_for_node(locale, node, indexable, &fragment_title);
            rows.extend(rows_for_entry(locale, &entry));
        }
        debug!("{}: {} rows", indexable.describe(), rows.len());
        Ok(rows)
    }

    fn entry_for_node(
        &self,
        locale: &str,
        node: &FieldNode,
        indexable: &IndexableRef,
        fragment_title: &str,
    ) -> LogicalEntry {
        LogicalEntry {
            title: self.resolve(locale, node.title.as_deref()),
            summary: self.resolve(locale, node.summary.as_deref()),
            keywords: self.resolve(locale, node.keywords.as_deref()),
            fragment_name: indexable.fragment_name.clone(),
            fragment_title: fragment_title.to_string(),
            intent: String::new(),
            icon: indexable.icon_res_id,
            rank: indexable.rank,
        }
    }

    /// Resolve an attribute value; `@string/<name>` is looked up for `locale`.
    fn resolve(&self, locale: &str, value: Option<&str>) -> Option<String> {
        let value = value?;
        match STRING_REFERENCE.captures(value) {
            Some(caps) => {
                let resolved = self.resources.string(locale, &caps[1]);
                if resolved.is_none() {
                    debug!("Unresolved string reference {} for {}", value, locale);
                }
                resolved
            }
            None => Some(value.to_string()),
        }
    }

    fn rows_for_raw(locale: &str, data: &IndexableData) -> Vec<IndexRow> {
        let entry = LogicalEntry {
            title: Some(data.title.clone()),
            summary: data.summary.clone(),
            keywords: data.keywords.clone(),
            fragment_name: data.fragment_name.clone(),
            fragment_title: data.fragment_title.clone().unwrap_or_default(),
            intent: data.intent.clone().unwrap_or_default(),
            icon: data.icon_res_id,
            rank: data.rank,
        };
        rows_for_entry(locale, &entry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{IndexableProvider, InMemoryResources};
    use tempfile::TempDir;

    const DISPLAY_XML: &str = r#"<PreferenceScreen title="@string/display_title">
        <SwitchPreference title="Night Light" keywords="dim warm"/>
        <Preference summary="untitled"/>
    </PreferenceScreen>"#;

    fn create_test_writer(resources: InMemoryResources) -> (IndexWriter, Arc<SchemaStore>, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let store = Arc::new(SchemaStore::open(temp_dir.path().join("index.db")).unwrap());
        store.ensure_current_schema("build/1").unwrap();
        let writer = IndexWriter::new(store.clone(), Arc::new(resources));
        (writer, store, temp_dir)
    }

    fn display_resources() -> InMemoryResources {
        InMemoryResources::new()
            .with_field_tree("display", DISPLAY_XML)
            .with_default_string("display_title", "Display")
            .with_string("de_DE", "display_title", "Anzeige")
    }

    fn display_sources() -> PendingIndexables {
        let mut sources = PendingIndexables::new();
        sources.add(
            IndexableRef::new("display", "DisplaySettings")
                .with_icon(42)
                .with_rank(2),
        );
        sources
    }

    #[test]
    fn test_build_walks_field_tree() {
        let (writer, store, _temp) = create_test_writer(display_resources());

        let report = writer.build("en_US", &display_sources()).unwrap();
        assert!(!report.cache_hit);
        assert_eq!(report.rows_written, 2);
        assert!(report.failures.is_empty());
        assert_eq!(store.stats().unwrap().rows_per_locale.get("en_US"), Some(&2));
    }

    #[test]
    fn test_second_build_is_cache_hit() {
        let (writer, store, _temp) = create_test_writer(display_resources());

        writer.build("en_US", &display_sources()).unwrap();
        let report = writer.build("en_US", &display_sources()).unwrap();
        assert!(report.cache_hit);
        assert_eq!(report.rows_written, 0);
        assert_eq!(store.stats().unwrap().row_count, 2);
    }

    #[test]
    fn test_new_locale_is_indexed_incrementally() {
        let (writer, store, _temp) = create_test_writer(display_resources());

        writer.build("en_US", &display_sources()).unwrap();
        let report = writer.build("de_DE", &display_sources()).unwrap();
        assert_eq!(report.rows_written, 2);

        let stats = store.stats().unwrap();
        assert_eq!(stats.rows_per_locale.get("en_US"), Some(&2));
        assert_eq!(stats.rows_per_locale.get("de_DE"), Some(&2));
    }

    #[test]
    fn test_string_references_resolve_per_locale() {
        let (writer, _store, _temp) = create_test_writer(display_resources());
        assert_eq!(
            writer.resolve("de_DE", Some("@string/display_title")).as_deref(),
            Some("Anzeige")
        );
        assert_eq!(
            writer.resolve("en_US", Some("@string/display_title")).as_deref(),
            Some("Display")
        );
        assert_eq!(writer.resolve("en_US", Some("@string/missing")), None);
        assert_eq!(
            writer.resolve("en_US", Some("plain @string/ text")).as_deref(),
            Some("plain @string/ text")
        );
    }

    #[test]
    fn test_failures_are_isolated_by_default() {
        let resources = display_resources().with_field_tree("broken", "<LinearLayout/>");
        let (writer, store, _temp) = create_test_writer(resources);

        let mut sources = display_sources();
        sources.add(IndexableRef::new("broken", "BrokenSettings"));
        sources.add(IndexableRef::new("missing", "MissingSettings"));

        let report = writer.build("en_US", &sources).unwrap();
        assert_eq!(report.rows_written, 2);
        assert_eq!(report.failures.len(), 2);
        assert!(report.failures[0].descriptor.contains("BrokenSettings"));
        assert_eq!(store.stats().unwrap().row_count, 2);
    }

    #[test]
    fn test_fail_fast_writes_nothing() {
        let resources = display_resources().with_field_tree("broken", "<PreferenceScreen>");
        let (writer, store, _temp) = create_test_writer(resources);
        let writer = writer.with_failure_policy(FailurePolicy::FailFast);

        let mut sources = display_sources();
        sources.add(IndexableRef::new("broken", "BrokenSettings"));

        let result = writer.build("en_US", &sources);
        assert!(matches!(result, Err(PrefSearchError::Build { .. })));
        assert_eq!(store.stats().unwrap().row_count, 0);
    }

    #[test]
    fn test_raw_data_filtered_by_locale() {
        let (writer, store, _temp) = create_test_writer(InMemoryResources::new());

        let mut sources = PendingIndexables::new();
        for (locale, title) in [("en_us", "Battery"), ("fr_FR", "Batterie"), ("", "Storage")] {
            sources.add(IndexableData {
                locale: locale.into(),
                title: title.into(),
                fragment_name: "PowerUsage".into(),
                ..Default::default()
            });
        }
        sources.add(IndexableData {
            locale: "en_US".into(),
            title: String::new(),
            summary: Some("no title".into()),
            ..Default::default()
        });

        let report = writer.build("en_US", &sources).unwrap();
        assert_eq!(report.rows_written, 2);
        assert_eq!(store.stats().unwrap().rows_per_locale.get("en_US"), Some(&2));
    }

    struct AccountsProvider;

    impl IndexableProvider for AccountsProvider {
        fn raw_data_to_index(&self, context: &IndexContext) -> Vec<IndexableData> {
            vec![IndexableData {
                locale: context.locale.clone(),
                title: "Work profile".into(),
                fragment_title: Some("Accounts".into()),
                ..Default::default()
            }]
        }
    }

    #[test]
    fn test_provider_ref_uses_ref_metadata() {
        let (writer, store, _temp) = create_test_writer(InMemoryResources::new());

        let mut sources = PendingIndexables::new();
        sources.add_provider("AccountSettings", Arc::new(AccountsProvider));
        sources.add(IndexableRef::provider("AccountSettings").with_rank(9));

        let report = writer.build("en_US", &sources).unwrap();
        assert_eq!(report.rows_written, 1);
        assert!(report.failures.is_empty());

        let entry = crate::index::QueryEngine::new(store)
            .search("work", "en_US")
            .unwrap()
            .next()
            .unwrap();
        assert_eq!(entry.fragment_name, "AccountSettings");
        assert_eq!(entry.fragment_title, "Accounts");
        assert_eq!(entry.rank, 9);
    }

    #[test]
    fn test_ref_without_tree_or_provider_fails() {
        let (writer, _store, _temp) = create_test_writer(InMemoryResources::new());

        let mut sources = PendingIndexables::new();
        sources.add(IndexableRef::provider("Unknown"));

        let report = writer.build("en_US", &sources).unwrap();
        assert_eq!(report.rows_written, 0);
        assert_eq!(report.failures.len(), 1);
    }
}
