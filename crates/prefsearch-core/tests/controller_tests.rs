//! End-to-end tests through the public controller API.

use prefsearch::{
    DirectoryResources, IndexContext, IndexController, IndexSettings, IndexableData,
    IndexableProvider, IndexableRef, InMemoryResources, PrefSearchError, SchemaStatus,
};
use std::sync::Arc;
use tempfile::TempDir;

const DISPLAY_XML: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<PreferenceScreen xmlns:android="http://schemas.android.com/apk/res/android"
    android:title="Display">
    <SwitchPreference android:title="Night Light" settings:keywords="dim warm"/>
    <Preference android:title="Brightness level" android:summary="Adjust the screen"/>
</PreferenceScreen>"#;

const NETWORK_XML: &str = "<PreferenceScreen title=\"Network\">\
    <SwitchPreference title=\"Wi\u{2011}Fi calling\"/>\
    </PreferenceScreen>";

fn settings(temp_dir: &TempDir, fingerprint: &str) -> IndexSettings {
    IndexSettings {
        db_path: temp_dir.path().join("search_index.db"),
        locale: "en_US".into(),
        build_fingerprint: fingerprint.into(),
        ..Default::default()
    }
}

fn resources() -> Arc<InMemoryResources> {
    Arc::new(
        InMemoryResources::new()
            .with_field_tree("display_settings", DISPLAY_XML)
            .with_field_tree("network_settings", NETWORK_XML),
    )
}

fn display_controller(temp_dir: &TempDir) -> IndexController {
    let controller = IndexController::builder(settings(temp_dir, "build/1"))
        .resources(resources())
        .build()
        .unwrap();
    controller.add_indexable_data(IndexableRef::new("display_settings", "DisplaySettings"));
    controller
}

#[tokio::test]
async fn test_night_light_scenario() {
    let temp_dir = TempDir::new().unwrap();
    let controller = display_controller(&temp_dir);
    assert!(controller.update().await);

    let night: Vec<_> = controller.search("night").unwrap().collect();
    assert_eq!(night.len(), 1);
    assert_eq!(night[0].title, "Night Light");
    assert_eq!(night[0].fragment_name, "DisplaySettings");
    assert_eq!(night[0].fragment_title, "Display");

    let dim: Vec<_> = controller.search("dim").unwrap().collect();
    assert_eq!(dim, night);

    assert_eq!(controller.search("unrelated").unwrap().count(), 0);
}

#[tokio::test]
async fn test_every_title_is_searchable() {
    let temp_dir = TempDir::new().unwrap();
    let controller = display_controller(&temp_dir);
    controller.add_indexable_data(IndexableData {
        locale: "en_US".into(),
        title: "Battery saver".into(),
        fragment_name: "PowerUsageSummary".into(),
        ..Default::default()
    });
    assert!(controller.update().await);

    for (title, fragment) in [
        ("Display", "DisplaySettings"),
        ("Night Light", "DisplaySettings"),
        ("Brightness level", "DisplaySettings"),
        ("Battery saver", "PowerUsageSummary"),
    ] {
        let entries: Vec<_> = controller.search(title).unwrap().collect();
        assert!(
            entries
                .iter()
                .any(|e| e.title == title && e.fragment_name == fragment),
            "no entry for {title:?}"
        );
    }
}

#[tokio::test]
async fn test_update_is_idempotent() {
    let temp_dir = TempDir::new().unwrap();
    let controller = display_controller(&temp_dir);

    let first = controller.try_update().await.unwrap();
    assert_eq!(first.rows_written, 3);

    let second = controller.try_update().await.unwrap();
    assert!(second.cache_hit);
    assert_eq!(second.rows_written, 0);
    assert_eq!(controller.stats().unwrap().row_count, 3);
}

#[tokio::test]
async fn test_non_breaking_hyphen_round_trip() {
    let temp_dir = TempDir::new().unwrap();
    let controller = IndexController::builder(settings(&temp_dir, "build/1"))
        .resources(resources())
        .build()
        .unwrap();
    controller.add_indexable_data(IndexableRef::new("network_settings", "NetworkSettings"));
    assert!(controller.update().await);

    for query in ["wi-fi", "wifi", "Wi-Fi calling", "WiFi call"] {
        let entries: Vec<_> = controller.search(query).unwrap().collect();
        assert_eq!(entries.len(), 1, "query {query:?}");
        assert_eq!(entries[0].fragment_name, "NetworkSettings");
    }
}

#[tokio::test]
async fn test_entries_differing_only_by_hyphen_are_kept_apart() {
    let temp_dir = TempDir::new().unwrap();
    let controller = IndexController::builder(settings(&temp_dir, "build/1"))
        .build()
        .unwrap();
    for (title, rank) in [("Wi-Fi", 1), ("WiFi", 2), ("Wi\u{2011}Fi hotspot", 3)] {
        controller.add_indexable_data(IndexableData {
            title: title.into(),
            fragment_name: "NetworkSettings".into(),
            rank,
            ..Default::default()
        });
    }
    assert!(controller.update().await);
    assert_eq!(controller.stats().unwrap().row_count, 4);

    let titles: Vec<_> = controller.search("wifi").unwrap().map(|e| e.title).collect();
    assert_eq!(titles, ["Wi-Fi", "WiFi", "Wi-Fi hotspot"]);
}

#[tokio::test]
async fn test_fingerprint_change_invalidates_index() {
    let temp_dir = TempDir::new().unwrap();
    {
        let controller = display_controller(&temp_dir);
        assert!(controller.update().await);
        assert_eq!(controller.stats().unwrap().row_count, 3);
    }

    let controller = IndexController::builder(settings(&temp_dir, "build/2"))
        .resources(resources())
        .build()
        .unwrap();
    assert_eq!(
        controller.store().ensure_current_schema("build/2").unwrap(),
        SchemaStatus::Rebuilt
    );
    assert_eq!(controller.stats().unwrap().row_count, 0);
    assert!(!controller.is_available());
    assert!(matches!(
        controller.search("night"),
        Err(PrefSearchError::NotAvailable)
    ));

    controller.add_indexable_data(IndexableRef::new("display_settings", "DisplaySettings"));
    assert!(controller.update().await);
    assert_eq!(controller.search("night").unwrap().len(), 1);
    assert_eq!(
        controller.stats().unwrap().build_fingerprint.as_deref(),
        Some("build/2")
    );
}

#[tokio::test]
async fn test_same_fingerprint_keeps_index_across_reopen() {
    let temp_dir = TempDir::new().unwrap();
    {
        let controller = display_controller(&temp_dir);
        assert!(controller.update().await);
    }

    let controller = display_controller(&temp_dir);
    let report = controller.try_update().await.unwrap();
    assert!(report.cache_hit);
    assert_eq!(controller.search("bright").unwrap().len(), 1);
}

#[tokio::test]
async fn test_query_metacharacters_are_inert() {
    let temp_dir = TempDir::new().unwrap();
    let controller = display_controller(&temp_dir);
    assert!(controller.update().await);

    for query in [
        "display OR unrelated",
        "data_title:night",
        "NEAR(night light)",
        "night\" OR \"display",
        "\"",
        "*",
        "- ^",
    ] {
        let results = controller.search(query).unwrap();
        assert_eq!(results.len(), 0, "query {query:?}");
    }

    // Quotes and wildcards inside a term are plain text.
    assert_eq!(controller.search("\"night*").unwrap().len(), 1);
}

#[tokio::test]
async fn test_results_ordered_by_rank() {
    let temp_dir = TempDir::new().unwrap();
    let controller = IndexController::builder(settings(&temp_dir, "build/1"))
        .build()
        .unwrap();
    for (title, rank) in [("Sound level", 5), ("Sound alarm", 1), ("Sound ringtone", 3)] {
        controller.add_indexable_data(IndexableData {
            title: title.into(),
            fragment_name: "SoundSettings".into(),
            rank,
            ..Default::default()
        });
    }
    assert!(controller.update().await);

    let titles: Vec<_> = controller.search("sound").unwrap().map(|e| e.title).collect();
    assert_eq!(titles, ["Sound alarm", "Sound ringtone", "Sound level"]);
}

#[tokio::test]
async fn test_search_scoped_to_locale() {
    let temp_dir = TempDir::new().unwrap();
    let controller = IndexController::builder(settings(&temp_dir, "build/1"))
        .build()
        .unwrap();
    controller.add_indexable_data(IndexableData {
        locale: "en_US".into(),
        title: "Storage".into(),
        fragment_name: "StorageSettings".into(),
        ..Default::default()
    });
    controller.add_indexable_data(IndexableData {
        locale: "fr_FR".into(),
        title: "Stockage".into(),
        fragment_name: "StorageSettings".into(),
        ..Default::default()
    });
    assert!(controller.update().await);
    assert_eq!(controller.search("sto").unwrap().next().unwrap().title, "Storage");

    controller.set_locale("fr_FR");
    assert!(controller.update().await);
    let titles: Vec<_> = controller.search("sto").unwrap().map(|e| e.title).collect();
    assert_eq!(titles, ["Stockage"]);
}

struct AccountsProvider;

impl IndexableProvider for AccountsProvider {
    fn refs_to_index(&self, _context: &IndexContext) -> Vec<IndexableRef> {
        vec![IndexableRef::provider("AccountSettings").with_rank(4)]
    }

    fn raw_data_to_index(&self, context: &IndexContext) -> Vec<IndexableData> {
        let title = if context.locale.starts_with("de") {
            "Arbeitsprofil"
        } else {
            "Work profile"
        };
        vec![IndexableData {
            locale: context.locale.clone(),
            title: title.into(),
            intent: Some("settings://accounts/work".into()),
            ..Default::default()
        }]
    }
}

#[tokio::test]
async fn test_registered_provider_is_asked_per_locale() {
    let temp_dir = TempDir::new().unwrap();
    let controller = IndexController::builder(settings(&temp_dir, "build/1"))
        .build()
        .unwrap();
    controller.register_provider("AccountSettings", Arc::new(AccountsProvider));
    assert!(controller.update().await);

    let entries: Vec<_> = controller.search("work").unwrap().collect();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].fragment_name, "AccountSettings");
    assert_eq!(entries[0].intent, "settings://accounts/work");
    assert_eq!(entries[0].rank, 4);

    controller.set_locale("de_DE");
    assert!(controller.update().await);
    let entries: Vec<_> = controller.search("arbeit").unwrap().collect();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].locale, "de_DE");
}

struct KeyboardProvider;

impl IndexableProvider for KeyboardProvider {
    fn refs_to_index(&self, context: &IndexContext) -> Vec<IndexableRef> {
        if context.locale.starts_with("ja") {
            vec![IndexableRef::new("kana_input", "KeyboardSettings")]
        } else {
            Vec::new()
        }
    }
}

#[tokio::test]
async fn test_provider_refs_follow_active_locale() {
    let temp_dir = TempDir::new().unwrap();
    let resources = InMemoryResources::new().with_field_tree(
        "kana_input",
        r#"<PreferenceScreen title="Keyboard"><SwitchPreference title="Kana input"/></PreferenceScreen>"#,
    );
    let controller = IndexController::builder(settings(&temp_dir, "build/1"))
        .resources(Arc::new(resources))
        .build()
        .unwrap();
    controller.register_provider("KeyboardSettings", Arc::new(KeyboardProvider));

    assert!(controller.update().await);
    assert_eq!(controller.search("kana").unwrap().len(), 0);

    controller.set_locale("ja_JP");
    assert!(controller.update().await);
    let entries: Vec<_> = controller.search("kana").unwrap().collect();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].fragment_name, "KeyboardSettings");
}

#[tokio::test]
async fn test_directory_resources_end_to_end() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path().join("res");
    std::fs::create_dir_all(root.join("xml")).unwrap();
    std::fs::create_dir_all(root.join("values")).unwrap();
    std::fs::create_dir_all(root.join("values-de")).unwrap();
    std::fs::write(
        root.join("xml").join("sound.xml"),
        r#"<PreferenceScreen title="@string/sound_title">
            <Preference title="@string/ringtone_title" keywords="@string/ringtone_keywords"/>
        </PreferenceScreen>"#,
    )
    .unwrap();
    std::fs::write(
        root.join("values").join("strings.json"),
        r#"{"sound_title": "Sound", "ringtone_title": "Phone ringtone", "ringtone_keywords": "melody"}"#,
    )
    .unwrap();
    std::fs::write(
        root.join("values-de").join("strings.json"),
        r#"{"sound_title": "Ton", "ringtone_title": "Klingelton"}"#,
    )
    .unwrap();

    let controller = IndexController::builder(settings(&temp_dir, "build/1"))
        .resources(Arc::new(DirectoryResources::new(&root)))
        .build()
        .unwrap();
    controller.add_indexable_data(IndexableRef::new("sound", "SoundSettings"));
    assert!(controller.update().await);

    let entries: Vec<_> = controller.search("melody").unwrap().collect();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].title, "Phone ringtone");
    assert_eq!(entries[0].fragment_title, "Sound");

    controller.set_locale("de_DE");
    assert!(controller.update().await);
    let entries: Vec<_> = controller.search("klingel").unwrap().collect();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].fragment_title, "Ton");
    // Keywords fall back to the default table.
    assert_eq!(entries[0].keywords, "melody");
}

#[tokio::test]
async fn test_rebuild_after_failed_descriptor_is_isolated() {
    let temp_dir = TempDir::new().unwrap();
    let controller = display_controller(&temp_dir);
    controller.add_indexable_data(IndexableRef::new("absent_settings", "AbsentSettings"));

    let report = controller.rebuild().await.unwrap();
    assert_eq!(report.rows_written, 3);
    assert_eq!(report.failures.len(), 1);
    assert!(report.failures[0].descriptor.contains("AbsentSettings"));
    assert!(controller.is_available());
}
