//! Top-K execution and page slicing.

use anyhow::{Context, Result};
use serde::Serialize;
use std::ops::Range;
use tantivy::collector::TopDocs;
use tantivy::query::Query;
use tantivy::{DocAddress, TantivyDocument};

use crate::error::EngineError;
use crate::search::index::Snapshot;
use crate::search::query::SearchFilters;
use crate::search::schema::SearchResultRecord;

/// Most ranked hits ever considered for one query. `total_hits` is capped here too.
pub const MAX_HITS: usize = 1000;

/// A full search request as the presentation layer hands it over.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchRequest {
    pub text: String,
    /// Zero-based page index.
    pub start: i64,
    /// Page size.
    pub rows: i64,
    pub filters: SearchFilters,
}

/// Validated page index and size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    start: usize,
    rows: usize,
}

impl PageRequest {
    /// Negative values are rejected rather than clamped.
    pub fn new(start: i64, rows: i64) -> Result<Self, EngineError> {
        match (usize::try_from(start), usize::try_from(rows)) {
            (Ok(start), Ok(rows)) => Ok(Self { start, rows }),
            _ => Err(EngineError::InvalidPage { start, rows }),
        }
    }

    /// `[start * rows, start * rows + rows)` over the ranked hit list.
    pub fn window(&self) -> Range<usize> {
        let first = self.start.saturating_mul(self.rows);
        first..first.saturating_add(self.rows)
    }
}

/// One page of results.
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SearchPage {
    pub total_hits: usize,
    pub films: Vec<SearchResultRecord>,
}

/// Run `query`, keep the best [`MAX_HITS`] hits and decode the requested page.
///
/// Hits are ordered by descending score; equal scores fall back to index
/// order (segment, then document id), which is stable for one index state.
pub fn execute(snapshot: &Snapshot, query: &dyn Query, page: PageRequest) -> Result<SearchPage> {
    let searcher = snapshot.searcher();

    let mut hits: Vec<(f32, DocAddress)> = searcher
        .search(query, &TopDocs::with_limit(MAX_HITS))
        .context("Search failed")?;

    hits.sort_by(|(score_a, addr_a), (score_b, addr_b)| {
        score_b
            .total_cmp(score_a)
            .then_with(|| addr_a.segment_ord.cmp(&addr_b.segment_ord))
            .then_with(|| addr_a.doc_id.cmp(&addr_b.doc_id))
    });

    let total_hits = hits.len();
    let window = page.window();
    let first = window.start.min(total_hits);
    let last = window.end.min(total_hits);

    let films = hits[first..last]
        .iter()
        .map(|(score, address)| {
            let doc: TantivyDocument = searcher
                .doc(*address)
                .context("Failed to load stored film")?;
            Ok(SearchResultRecord::from_stored(&doc, snapshot.fields(), *score))
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(SearchPage { total_hits, films })
}
