//! Film catalog ingestion.
//!
//! The search core never reads the source file itself; it asks a
//! [`CatalogSource`] for raw, string-typed records when it (re)populates.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// One catalog row exactly as read, before any typed parsing.
#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct RawCatalogRecord {
    #[serde(rename = "Id", alias = "id")]
    pub id: String,
    #[serde(rename = "Title", alias = "title")]
    pub title: String,
    #[serde(rename = "Overview", alias = "overview")]
    pub overview: String,
    #[serde(rename = "Runtime", alias = "runtime")]
    pub runtime: String,
    #[serde(rename = "Tagline", alias = "tagline")]
    pub tagline: String,
    #[serde(rename = "Revenue", alias = "revenue")]
    pub revenue: String,
    #[serde(rename = "VoteAverage", alias = "vote_average")]
    pub vote_average: String,
    #[serde(rename = "ReleaseDate", alias = "release_date")]
    pub release_date: String,
}

/// Supplies the full catalog whenever the main index is (re)built.
pub trait CatalogSource: Send + Sync {
    fn load_catalog(&self) -> Result<Vec<RawCatalogRecord>>;
}

/// A fixed, in-memory catalog.
impl CatalogSource for Vec<RawCatalogRecord> {
    fn load_catalog(&self) -> Result<Vec<RawCatalogRecord>> {
        Ok(self.clone())
    }
}

/// Catalog backed by a CSV file with a header row.
#[derive(Debug, Clone)]
pub struct CsvCatalog {
    path: PathBuf,
}

impl CsvCatalog {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CatalogSource for CsvCatalog {
    fn load_catalog(&self) -> Result<Vec<RawCatalogRecord>> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(csv::Trim::Headers)
            .from_path(&self.path)
            .with_context(|| format!("Failed to open catalog at {:?}", self.path))?;

        let mut records = Vec::new();
        let mut skipped = 0usize;

        for (row, result) in reader.deserialize::<RawCatalogRecord>().enumerate() {
            match result {
                Ok(record) => records.push(record),
                Err(e) => {
                    // Header is line 1, so data row N sits on line N + 2.
                    warn!("Skipping catalog line {}: {}", row + 2, e);
                    skipped += 1;
                }
            }
        }

        info!(
            "Loaded {} catalog records from {:?} ({} skipped)",
            records.len(),
            self.path,
            skipped
        );

        Ok(records)
    }
}
