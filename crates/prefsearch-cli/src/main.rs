//! Prefsearch CLI - builds a settings search index from a resource directory
//! and queries it.

mod manifest;

use anyhow::Result;
use clap::Parser;
use manifest::IndexManifest;
use prefsearch::{
    DirectoryResources, IndexController, IndexSettings, PrefSearchError, StoreConfig,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "prefsearch")]
#[command(about = "Build and query a settings search index")]
struct Args {
    /// Resource directory containing index.json, xml/ and values*/
    #[arg(short, long)]
    resources: PathBuf,

    /// Database file (defaults to search_index.db inside the resource directory)
    #[arg(long)]
    db: Option<PathBuf>,

    /// Display locale
    #[arg(short, long, default_value = "en_US")]
    locale: String,

    /// Platform build fingerprint; a change invalidates the index
    #[arg(short, long, default_value = "dev")]
    fingerprint: String,

    /// Query to run after the update
    #[arg(short, long)]
    query: Option<String>,

    /// Drop all rows and index from scratch
    #[arg(long)]
    rebuild: bool,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Set up logging
    let log_level = if args.debug { Level::DEBUG } else { Level::INFO };
    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_thread_ids(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();

    let db_path = args
        .db
        .clone()
        .unwrap_or_else(|| args.resources.join(StoreConfig::DATABASE_FILE_NAME));
    info!("Index database: {}", db_path.display());

    let settings = IndexSettings {
        db_path,
        locale: args.locale.clone(),
        build_fingerprint: args.fingerprint.clone(),
        ..Default::default()
    };

    let manifest = IndexManifest::load(&args.resources)?;
    info!("Registering {} sources", manifest.len());

    let controller = IndexController::builder(settings)
        .resources(Arc::new(DirectoryResources::new(&args.resources)))
        .build()?;
    manifest.register(&controller);

    let report = if args.rebuild {
        controller.rebuild().await
    } else {
        controller.try_update().await
    };
    match report {
        Ok(report) => {
            for failure in &report.failures {
                warn!("{}: {}", failure.descriptor, failure.message);
            }
            println!("{}", serde_json::to_string(&report)?);
        }
        Err(e) => warn!("Index update failed: {}", e),
    }
    if let Err(e) = controller.store().checkpoint_wal() {
        warn!("WAL checkpoint failed: {}", e);
    }
    println!("{}", serde_json::to_string(&controller.stats()?)?);

    if let Some(query) = args.query {
        match controller.search(&query) {
            Ok(results) => {
                for entry in results {
                    println!("{}", serde_json::to_string(&entry)?);
                }
            }
            // Nothing was ever indexed: report no results.
            Err(PrefSearchError::NotAvailable) => warn!("Index is not available"),
            Err(e) => return Err(e.into()),
        }
    }

    Ok(())
}
