//! Build Film Search Indexes
//!
//! Loads the film catalog CSV into the main search index and rebuilds the
//! title suggester from it.
//!
//! Usage:
//!     build_search_index
//!     build_search_index --catalog ./data/films.csv --data-dir ./data --force

use anyhow::Result;
use clap::Parser;
use dotenvy::dotenv;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use film_search::catalog::CsvCatalog;
use film_search::config::{
    DEFAULT_CATALOG_PATH, DEFAULT_DATA_DIR, DEFAULT_REBUILD_TIMEOUT_SECS,
    DEFAULT_WRITER_HEAP_BYTES,
};
use film_search::engine::SearchEngine;
use film_search::search::IndexLocations;

/// CLI arguments
#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Build the film search index and title suggester from a CSV catalog",
    long_about = "Indexes every film in the catalog into the main search index, then rebuilds\n\
                  the autocomplete suggester from the indexed titles. Without --force the\n\
                  catalog is appended to whatever the index already holds."
)]
struct Args {
    /// Directory holding the `index` and `suggester` directories
    #[arg(long, default_value = DEFAULT_DATA_DIR)]
    data_dir: PathBuf,

    /// Catalog CSV file
    #[arg(long, default_value = DEFAULT_CATALOG_PATH)]
    catalog: PathBuf,

    /// Index writer heap size in bytes
    #[arg(long, default_value_t = DEFAULT_WRITER_HEAP_BYTES)]
    writer_heap_bytes: usize,

    /// Clear both indexes before loading
    #[arg(long, default_value_t = false)]
    force: bool,

    /// Verbose output
    #[arg(short, long, default_value_t = false)]
    verbose: bool,
}

fn main() -> Result<()> {
    dotenv().ok();

    let args = Args::parse();

    // Setup logging
    let log_level = if args.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .compact()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let engine = SearchEngine::new(
        IndexLocations::under(&args.data_dir),
        args.writer_heap_bytes,
        Arc::new(CsvCatalog::new(&args.catalog)),
        Duration::from_secs(DEFAULT_REBUILD_TIMEOUT_SECS),
    );

    let started = Instant::now();
    let indexed = if args.force {
        info!("Clearing existing indexes under {:?}", args.data_dir);
        engine.reload_index()?
    } else {
        engine.populate_index()?
    };

    info!(
        "Indexing complete! {} films indexed from {:?} into {:?} in {:.1}s",
        indexed,
        args.catalog,
        args.data_dir,
        started.elapsed().as_secs_f64()
    );

    Ok(())
}
