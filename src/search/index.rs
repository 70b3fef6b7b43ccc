//! On-disk index management for the main film index and the suggester index.

use anyhow::{Context, Result};
use parking_lot::{Mutex, MutexGuard, RwLock};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tantivy::directory::MmapDirectory;
use tantivy::schema::Schema;
use tantivy::{Index, IndexReader, IndexWriter, ReloadPolicy, Searcher};
use tracing::{debug, info};

use crate::error::EngineError;
use crate::search::schema::{
    create_film_schema, register_film_tokenizers, FilmFields, IndexedDocument,
};
use crate::search::suggest::{create_suggester_schema, SuggesterFields};

/// Below this tantivy refuses to create a writer.
pub const MIN_WRITER_HEAP_BYTES: usize = 15_000_000;

/// Where the two indexes live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexLocations {
    pub main: PathBuf,
    pub suggester: PathBuf,
}

impl IndexLocations {
    /// `<data_dir>/index` and `<data_dir>/suggester`.
    pub fn under<P: AsRef<Path>>(data_dir: P) -> Self {
        Self {
            main: data_dir.as_ref().join("index"),
            suggester: data_dir.as_ref().join("suggester"),
        }
    }
}

/// An index opened once and the reader shared by every search on it.
#[derive(Clone)]
struct OpenIndex {
    index: Index,
    reader: IndexReader,
}

/// One index directory plus the locks that serialize work on it.
pub struct IndexSlot {
    path: PathBuf,
    schema: Schema,
    register_tokenizers: fn(&Index),
    heap_bytes: usize,
    /// Opened lazily; the reader is reloaded after every commit.
    open: RwLock<Option<OpenIndex>>,
    /// Held from writer open to commit.
    write_lock: Mutex<()>,
    /// Held for the whole of a rebuild; see [`IndexSlot::rebuild_guard`].
    rebuild_lock: Mutex<()>,
}

impl IndexSlot {
    fn new(path: PathBuf, schema: Schema, register_tokenizers: fn(&Index), heap_bytes: usize) -> Self {
        Self {
            path,
            schema,
            register_tokenizers,
            heap_bytes,
            open: RwLock::new(None),
            write_lock: Mutex::new(()),
            rebuild_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// True once an index has been committed at this location.
    pub fn exists(&self) -> bool {
        self.open.read().is_some() || self.path.join("meta.json").exists()
    }

    /// Number of live documents, or `None` if there is no index here.
    pub fn doc_count(&self) -> Result<Option<u64>> {
        if !self.exists() {
            return Ok(None);
        }
        Ok(Some(self.searcher()?.num_docs()))
    }

    fn open_or_create(&self) -> Result<OpenIndex> {
        std::fs::create_dir_all(&self.path)
            .with_context(|| format!("Failed to create index directory at {:?}", self.path))?;

        let directory = MmapDirectory::open(&self.path)
            .with_context(|| format!("Failed to open index directory at {:?}", self.path))?;

        let index = Index::open_or_create(directory, self.schema.clone())
            .with_context(|| format!("Failed to open or create index at {:?}", self.path))?;

        self.with_reader(index)
    }

    fn open_existing(&self) -> Result<OpenIndex> {
        if !self.path.join("meta.json").exists() {
            return Err(EngineError::IndexMissing(self.path.clone()).into());
        }

        let index = Index::open_in_dir(&self.path)
            .with_context(|| format!("Failed to open index at {:?}", self.path))?;

        self.with_reader(index)
    }

    fn with_reader(&self, index: Index) -> Result<OpenIndex> {
        (self.register_tokenizers)(&index);

        let reader: IndexReader = index
            .reader_builder()
            .reload_policy(ReloadPolicy::Manual)
            .try_into()
            .context("Failed to create index reader")?;

        debug!("Opened index at {:?}", self.path);
        Ok(OpenIndex { index, reader })
    }

    /// The cached index, opened with `open` on first use.
    fn cached<F>(&self, open: F) -> Result<OpenIndex>
    where
        F: FnOnce() -> Result<OpenIndex>,
    {
        if let Some(cached) = self.open.read().as_ref() {
            return Ok(cached.clone());
        }

        let mut slot = self.open.write();
        match slot.as_ref() {
            Some(cached) => Ok(cached.clone()),
            None => {
                let opened = open()?;
                *slot = Some(opened.clone());
                Ok(opened)
            }
        }
    }

    /// Point-in-time view of the last commit.
    pub fn searcher(&self) -> Result<Searcher> {
        let open = self.cached(|| self.open_existing())?;
        Ok(open.reader.searcher())
    }

    /// Run `apply` against an exclusive writer and commit.
    ///
    /// If `apply` fails the writer is dropped before commit and nothing it
    /// did becomes visible.
    pub fn write<F>(&self, apply: F) -> Result<u64>
    where
        F: FnOnce(&mut IndexWriter) -> Result<u64>,
    {
        let _write_guard = self.write_lock.lock();

        let open = self.cached(|| self.open_or_create())?;

        // One indexing thread keeps document order equal to insertion order.
        let mut writer: IndexWriter = open
            .index
            .writer_with_num_threads(1, self.heap_bytes)
            .context("Failed to create index writer")?;

        let affected = apply(&mut writer)?;

        writer.commit().context("Failed to commit index")?;
        writer
            .wait_merging_threads()
            .context("Failed to finish index merges")?;
        open.reader.reload().context("Failed to reload index reader")?;

        debug!("Committed {} changes to {:?}", affected, self.path);
        Ok(affected)
    }

    /// Remove every document and commit. Creates the location if needed.
    pub fn delete_all(&self) -> Result<()> {
        self.write(|writer| {
            writer
                .delete_all_documents()
                .context("Failed to delete documents")?;
            Ok(0)
        })?;
        info!("Cleared index at {:?}", self.path);
        Ok(())
    }

    /// Serializes rebuilds of this location. Waiting is bounded by `timeout`.
    pub fn rebuild_guard(&self, timeout: Duration) -> Result<MutexGuard<'_, ()>> {
        self.rebuild_lock
            .try_lock_for(timeout)
            .ok_or_else(|| EngineError::RebuildTimeout(self.path.clone()).into())
    }
}

/// A read-only, point-in-time view of the main index.
pub struct Snapshot {
    searcher: Searcher,
    fields: FilmFields,
}

impl Snapshot {
    pub fn searcher(&self) -> &Searcher {
        &self.searcher
    }

    pub fn fields(&self) -> &FilmFields {
        &self.fields
    }

    pub fn num_docs(&self) -> u64 {
        self.searcher.num_docs()
    }
}

fn no_custom_tokenizers(_: &Index) {}

/// Sole owner of the main and suggester index directories.
pub struct IndexStore {
    main: IndexSlot,
    suggester: IndexSlot,
    fields: FilmFields,
    suggester_fields: SuggesterFields,
}

impl IndexStore {
    pub fn new(locations: IndexLocations, writer_heap_bytes: usize) -> Self {
        let heap_bytes = writer_heap_bytes.max(MIN_WRITER_HEAP_BYTES);
        let (schema, fields) = create_film_schema();
        let (suggester_schema, suggester_fields) = create_suggester_schema();

        Self {
            main: IndexSlot::new(locations.main, schema, register_film_tokenizers, heap_bytes),
            suggester: IndexSlot::new(
                locations.suggester,
                suggester_schema,
                no_custom_tokenizers,
                heap_bytes,
            ),
            fields,
            suggester_fields,
        }
    }

    pub fn main(&self) -> &IndexSlot {
        &self.main
    }

    pub fn suggester(&self) -> &IndexSlot {
        &self.suggester
    }

    pub fn fields(&self) -> &FilmFields {
        &self.fields
    }

    pub fn suggester_fields(&self) -> &SuggesterFields {
        &self.suggester_fields
    }

    /// Append one entry per document to the main index and commit.
    pub fn populate(&self, documents: &[IndexedDocument]) -> Result<u64> {
        let fields = self.fields;
        let added = self.main.write(|writer| {
            for document in documents {
                writer
                    .add_document(document.to_document(&fields))
                    .with_context(|| format!("Failed to index film {:?}", document.id))?;
            }
            Ok(documents.len() as u64)
        })?;

        info!("Indexed {} films into {:?}", added, self.main.path());
        Ok(added)
    }

    /// Clear both the main index and the suggester index.
    pub fn delete_all(&self) -> Result<()> {
        self.main.delete_all()?;
        self.suggester.delete_all()
    }

    pub fn open_reader(&self) -> Result<Snapshot> {
        Ok(Snapshot {
            searcher: self.main.searcher()?,
            fields: self.fields,
        })
    }
}
