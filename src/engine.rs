//! The operations the presentation layer calls: administrative rebuilds,
//! search and autocomplete.
//!
//! Reads never run against a missing or emptied index. [`SearchEngine::ensure_ready`]
//! rebuilds it first, and at most one rebuild per location runs at a time;
//! concurrent callers wait for it and then see the finished index.

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::catalog::CatalogSource;
use crate::search::executor::{execute, PageRequest, SearchPage, SearchRequest};
use crate::search::index::{IndexLocations, IndexStore};
use crate::search::query::build_query;
use crate::search::schema::IndexedDocument;
use crate::search::suggest::{Suggester, Suggestion, SUGGESTION_LIMIT};

pub struct SearchEngine {
    store: Arc<IndexStore>,
    suggester: Suggester,
    catalog: Arc<dyn CatalogSource>,
    rebuild_timeout: Duration,
}

impl SearchEngine {
    pub fn new(
        locations: IndexLocations,
        writer_heap_bytes: usize,
        catalog: Arc<dyn CatalogSource>,
        rebuild_timeout: Duration,
    ) -> Self {
        let store = Arc::new(IndexStore::new(locations, writer_heap_bytes));
        Self {
            suggester: Suggester::new(store.clone()),
            store,
            catalog,
            rebuild_timeout,
        }
    }

    pub fn store(&self) -> &IndexStore {
        &self.store
    }

    /// Load the catalog, append it to the main index and rebuild the suggester.
    pub fn populate_index(&self) -> Result<u64> {
        let _guard = self.store.main().rebuild_guard(self.rebuild_timeout)?;
        let added = self.load_into_main()?;
        self.rebuild_suggester()?;
        Ok(added)
    }

    /// Empty both the main index and the suggester.
    pub fn delete_index(&self) -> Result<()> {
        let _guard = self.store.main().rebuild_guard(self.rebuild_timeout)?;
        self.store.delete_all()
    }

    /// Delete, then populate from the catalog, as one step.
    pub fn reload_index(&self) -> Result<u64> {
        let _guard = self.store.main().rebuild_guard(self.rebuild_timeout)?;
        self.store.delete_all()?;
        let added = self.load_into_main()?;
        self.rebuild_suggester()?;
        Ok(added)
    }

    /// Rebuild whatever is missing. Idempotent; cheap once both indexes exist.
    pub fn ensure_ready(&self) -> Result<()> {
        let main = self.store.main();
        let mut main_ready = self.main_ready()?;
        let mut main_rebuilt = false;

        if !main_ready {
            let _guard = main.rebuild_guard(self.rebuild_timeout)?;
            // Someone else may have finished the rebuild while we waited.
            if !self.main_ready()? {
                warn!("Main index at {:?} is missing or empty, rebuilding", main.path());
                self.load_into_main()?;
                main_rebuilt = true;
            }
            main_ready = self.main_ready()?;
        }

        if main_rebuilt || !self.suggester_ready(main_ready)? {
            let suggester = self.store.suggester();
            let _guard = suggester.rebuild_guard(self.rebuild_timeout)?;
            if main_rebuilt || !self.suggester_ready(main_ready)? {
                warn!("Suggester at {:?} is stale or missing, rebuilding", suggester.path());
                self.suggester.build()?;
            }
        }

        Ok(())
    }

    pub fn search(&self, request: &SearchRequest) -> Result<SearchPage> {
        let page = PageRequest::new(request.start, request.rows)?;
        self.ensure_ready()?;

        let snapshot = self.store.open_reader()?;
        let query = build_query(snapshot.fields(), &request.text, &request.filters);
        execute(&snapshot, query.as_ref(), page)
    }

    /// Up to [`SUGGESTION_LIMIT`] titles containing `input`. Blank or absent
    /// input returns nothing without touching the index.
    pub fn autocomplete(&self, input: Option<&str>) -> Result<Vec<Suggestion>> {
        let input = match input {
            Some(text) if !text.trim().is_empty() => text,
            _ => return Ok(Vec::new()),
        };

        self.ensure_ready()?;
        self.suggester.lookup(input, SUGGESTION_LIMIT)
    }

    fn main_ready(&self) -> Result<bool> {
        Ok(matches!(self.store.main().doc_count()?, Some(n) if n > 0))
    }

    fn suggester_ready(&self, main_ready: bool) -> Result<bool> {
        match self.store.suggester().doc_count()? {
            None => Ok(false),
            Some(0) => Ok(!main_ready),
            Some(_) => Ok(true),
        }
    }

    fn load_into_main(&self) -> Result<u64> {
        let records = self
            .catalog
            .load_catalog()
            .context("Failed to load film catalog")?;

        let documents: Vec<IndexedDocument> =
            records.iter().map(IndexedDocument::from_record).collect();

        let added = self.store.populate(&documents)?;
        info!("Populated main index with {} films", added);
        Ok(added)
    }

    fn rebuild_suggester(&self) -> Result<u64> {
        let _guard = self.store.suggester().rebuild_guard(self.rebuild_timeout)?;
        self.suggester.build()
    }
}
