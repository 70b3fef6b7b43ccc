#![allow(dead_code)]

use anyhow::Result;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

use film_search::catalog::{CatalogSource, RawCatalogRecord};
use film_search::engine::SearchEngine;
use film_search::search::index::MIN_WRITER_HEAP_BYTES;
use film_search::search::IndexLocations;

pub fn film(id: &str, title: &str, runtime: &str, vote: &str, date: &str) -> RawCatalogRecord {
    RawCatalogRecord {
        id: id.to_string(),
        title: title.to_string(),
        overview: format!("{} is a film.", title),
        runtime: runtime.to_string(),
        tagline: String::new(),
        revenue: "1000".to_string(),
        vote_average: vote.to_string(),
        release_date: date.to_string(),
    }
}

pub fn catalog() -> Vec<RawCatalogRecord> {
    vec![
        film("1", "The Matrix", "136", "8.7", "1999-03-31"),
        film("2", "The Matrix Reloaded", "138", "6.9", "2003-05-15"),
        film("3", "Spirited Away", "125", "8.5", "2001-07-20"),
        film("4", "Matilda", "98", "7.0", "1996-08-02"),
        film("5", "Heat", "170", "7.9", "1995-12-15"),
        film("6", "Up", "96", "7.9", "2009-05-28"),
        film("7", "Short Cuts", "90", "7.6", "1993-10-01"),
        film("8", "Run Lola Run", "90", "7.7", "1998-08-20"),
        film("9", "Alien", "117", "8.1", "1979-05-25"),
        film("10", "Aliens", "137", "7.9", "1986-07-18"),
        film("11", "Lost Reel", "unknown", "n/a", "someday"),
    ]
}

/// Counts how often the engine pulls the catalog.
pub struct CountingCatalog {
    records: Vec<RawCatalogRecord>,
    pub loads: AtomicUsize,
}

impl CountingCatalog {
    pub fn new(records: Vec<RawCatalogRecord>) -> Self {
        Self {
            records,
            loads: AtomicUsize::new(0),
        }
    }

    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }
}

impl CatalogSource for CountingCatalog {
    fn load_catalog(&self) -> Result<Vec<RawCatalogRecord>> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        // Widen the window in which concurrent readers see a missing index
        std::thread::sleep(Duration::from_millis(50));
        Ok(self.records.clone())
    }
}

pub struct FailingCatalog;

impl CatalogSource for FailingCatalog {
    fn load_catalog(&self) -> Result<Vec<RawCatalogRecord>> {
        anyhow::bail!("catalog unreachable")
    }
}

pub fn engine_with(dir: &TempDir, catalog: Arc<dyn CatalogSource>) -> SearchEngine {
    SearchEngine::new(
        IndexLocations::under(dir.path()),
        MIN_WRITER_HEAP_BYTES,
        catalog,
        Duration::from_secs(60),
    )
}

pub fn engine(dir: &TempDir) -> SearchEngine {
    engine_with(dir, Arc::new(catalog()))
}
