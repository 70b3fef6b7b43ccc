//! Title autocomplete backed by a secondary index.
//!
//! The suggester index holds one entry per titled film in the main index,
//! keyed by the lowercased title as a single untokenized term. Lookups run a
//! regex per input term over that term dictionary, so every term may match
//! anywhere in the title and in any order.
//! The index is a snapshot: it is rebuilt wholesale from the main index and
//! never updated incrementally.

use anyhow::{Context, Result};
use serde::Serialize;
use std::sync::Arc;
use tantivy::collector::DocSetCollector;
use tantivy::query::{BooleanQuery, Occur, Query, RegexQuery};
use tantivy::schema::{Field, Schema, Value, FAST, STORED, STRING};
use tantivy::{DocAddress, Searcher, TantivyDocument};
use tracing::{debug, info};

use crate::search::index::IndexStore;

/// Default number of suggestions per lookup.
pub const SUGGESTION_LIMIT: usize = 10;

const HIGHLIGHT_PREFIX: &str = "<b>";
const HIGHLIGHT_POSTFIX: &str = "</b>";

#[derive(Debug, Clone, Copy)]
pub struct SuggesterFields {
    pub title_key: Field,
    pub title: Field,
    pub film_id: Field,
    /// Title length in chars, for ranking without loading stored titles.
    pub title_len: Field,
}

pub fn create_suggester_schema() -> (Schema, SuggesterFields) {
    let mut schema_builder = Schema::builder();

    let title_key = schema_builder.add_text_field("title_key", STRING);
    let title = schema_builder.add_text_field("title", STORED);
    let film_id = schema_builder.add_text_field("film_id", STORED);
    let title_len = schema_builder.add_u64_field("title_len", FAST);

    (
        schema_builder.build(),
        SuggesterFields {
            title_key,
            title,
            film_id,
            title_len,
        },
    )
}

/// A title taken from the main index, with the film id as payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuggestionEntry {
    pub title: String,
    pub film_id: String,
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct Suggestion {
    pub text: String,
    pub highlighted: String,
    pub id: String,
}

pub struct Suggester {
    store: Arc<IndexStore>,
}

impl Suggester {
    pub fn new(store: Arc<IndexStore>) -> Self {
        Self { store }
    }

    /// Replace the suggester index with the titles currently in the main index.
    pub fn build(&self) -> Result<u64> {
        let entries = self.read_titles()?;
        let fields = *self.store.suggester_fields();

        let written = self.store.suggester().write(|writer| {
            writer
                .delete_all_documents()
                .context("Failed to clear suggester")?;

            for entry in &entries {
                let mut doc = TantivyDocument::new();
                doc.add_text(fields.title_key, normalize(&entry.title));
                doc.add_text(fields.title, &entry.title);
                doc.add_text(fields.film_id, &entry.film_id);
                doc.add_u64(fields.title_len, entry.title.chars().count() as u64);
                writer
                    .add_document(doc)
                    .context("Failed to add suggestion")?;
            }

            Ok(entries.len() as u64)
        })?;

        info!("Built suggester with {} titles", written);
        Ok(written)
    }

    /// Every non-empty title in the main index, in index order.
    fn read_titles(&self) -> Result<Vec<SuggestionEntry>> {
        let snapshot = self.store.open_reader()?;
        let searcher = snapshot.searcher();
        let fields = snapshot.fields();

        let mut entries = Vec::with_capacity(snapshot.num_docs() as usize);
        for (segment_ord, segment_reader) in searcher.segment_readers().iter().enumerate() {
            for doc_id in segment_reader.doc_ids_alive() {
                let doc: TantivyDocument = searcher
                    .doc(DocAddress::new(segment_ord as u32, doc_id))
                    .context("Failed to read film for suggester")?;

                let title = doc
                    .get_first(fields.title)
                    .and_then(|v| v.as_str())
                    .unwrap_or_default();
                if title.trim().is_empty() {
                    continue;
                }

                entries.push(SuggestionEntry {
                    title: title.to_string(),
                    film_id: doc
                        .get_first(fields.id)
                        .and_then(|v| v.as_str())
                        .unwrap_or_default()
                        .to_string(),
                });
            }
        }

        Ok(entries)
    }

    /// Titles containing every whitespace-separated term of `input`,
    /// case-insensitively and in any order.
    ///
    /// Titles that start with the whole input come first, then other
    /// matches; within each group shorter titles win, then alphabetical
    /// order. Every match is ranked, not just a leading sample. A blank
    /// `input` yields nothing.
    pub fn lookup(&self, input: &str, limit: usize) -> Result<Vec<Suggestion>> {
        let needle = normalize(input);
        if needle.is_empty() || limit == 0 {
            return Ok(Vec::new());
        }
        let terms = needle_terms(&needle);

        let searcher = self.store.suggester().searcher()?;
        let fields = *self.store.suggester_fields();

        let matches = searcher
            .search(&contains_all(fields.title_key, &terms)?, &DocSetCollector)
            .context("Suggestion lookup failed")?;
        if matches.is_empty() {
            return Ok(Vec::new());
        }

        let starts_with = regex_query(fields.title_key, &format!("{}.*", regex::escape(&needle)))?;
        let prefixed = searcher
            .search(starts_with.as_ref(), &DocSetCollector)
            .context("Suggestion lookup failed")?;

        let lengths = searcher
            .segment_readers()
            .iter()
            .map(|reader| reader.fast_fields().u64("title_len"))
            .collect::<tantivy::Result<Vec<_>>>()
            .context("Failed to open title lengths")?;

        // (tier, length) is enough to find the cutoff; titles are only
        // loaded for candidates that can still make the final list.
        let mut ranked: Vec<(u8, u64, DocAddress)> = matches
            .into_iter()
            .map(|address| {
                let tier = if prefixed.contains(&address) { 0 } else { 1 };
                let len = lengths
                    .get(address.segment_ord as usize)
                    .and_then(|column| column.first(address.doc_id))
                    .unwrap_or(u64::MAX);
                (tier, len, address)
            })
            .collect();
        ranked.sort_unstable();

        if let Some(&(tier, len, _)) = ranked.get(limit - 1) {
            ranked.retain(|&(t, l, _)| (t, l) <= (tier, len));
        }

        let mut candidates = ranked
            .into_iter()
            .map(|(tier, len, address)| {
                let suggestion = load_suggestion(&searcher, &fields, address)?;
                Ok((tier, len, suggestion))
            })
            .collect::<Result<Vec<_>>>()?;

        candidates.sort_by(|(tier_a, len_a, a), (tier_b, len_b, b)| {
            (tier_a, len_a, &a.text, &a.id).cmp(&(tier_b, len_b, &b.text, &b.id))
        });
        candidates.truncate(limit);

        let suggestions: Vec<Suggestion> = candidates
            .into_iter()
            .map(|(_, _, mut suggestion)| {
                suggestion.highlighted = highlight(&suggestion.text, &terms);
                suggestion
            })
            .collect();

        debug!("Autocomplete {:?}: {} suggestions", input, suggestions.len());
        Ok(suggestions)
    }
}

fn load_suggestion(
    searcher: &Searcher,
    fields: &SuggesterFields,
    address: DocAddress,
) -> Result<Suggestion> {
    let doc: TantivyDocument = searcher.doc(address).context("Failed to load suggestion")?;
    let stored = |field: Field| {
        doc.get_first(field)
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string()
    };
    Ok(Suggestion {
        text: stored(fields.title),
        highlighted: String::new(),
        id: stored(fields.film_id),
    })
}

fn regex_query(field: Field, pattern: &str) -> Result<Box<dyn Query>> {
    let query = RegexQuery::from_pattern(pattern, field)
        .with_context(|| format!("Invalid suggestion pattern {:?}", pattern))?;
    Ok(Box::new(query))
}

/// Every term has to occur somewhere in the key.
fn contains_all(field: Field, terms: &[&str]) -> Result<BooleanQuery> {
    let clauses = terms
        .iter()
        .map(|term| {
            let query = regex_query(field, &format!(".*{}.*", regex::escape(term)))?;
            Ok((Occur::Must, query))
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(BooleanQuery::new(clauses))
}

/// Distinct terms of a normalized needle, in input order.
fn needle_terms(needle: &str) -> Vec<&str> {
    let mut terms: Vec<&str> = Vec::new();
    for term in needle.split(' ') {
        if !term.is_empty() && !terms.contains(&term) {
            terms.push(term);
        }
    }
    terms
}

/// Lowercase and collapse whitespace runs, for both keys and lookups.
fn normalize(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Wrap every case-insensitive occurrence of any of `terms` (already
/// normalized) in highlight tags. The longest term wins where several start
/// at the same place.
fn highlight(text: &str, terms: &[&str]) -> String {
    let terms: Vec<Vec<char>> = terms
        .iter()
        .map(|term| term.chars().collect::<Vec<_>>())
        .filter(|term| !term.is_empty())
        .collect();
    let chars: Vec<(usize, char)> = text.char_indices().collect();

    let mut out = String::with_capacity(text.len() + 8);
    let mut i = 0;
    while i < chars.len() {
        let matched = terms
            .iter()
            .filter(|term| matches_at(&chars[i..], term))
            .map(Vec::len)
            .max();

        match matched {
            Some(len) => {
                let start = chars[i].0;
                let end = chars
                    .get(i + len)
                    .map(|(offset, _)| *offset)
                    .unwrap_or(text.len());
                out.push_str(HIGHLIGHT_PREFIX);
                out.push_str(&text[start..end]);
                out.push_str(HIGHLIGHT_POSTFIX);
                i += len;
            }
            None => {
                out.push(chars[i].1);
                i += 1;
            }
        }
    }
    out
}

fn matches_at(chars: &[(usize, char)], term: &[char]) -> bool {
    term.len() <= chars.len() && term.iter().zip(chars).all(|(t, (_, c))| fold(*c) == *t)
}

/// Single-char lowercase; multi-char expansions are left as-is.
fn fold(c: char) -> char {
    let mut lower = c.to_lowercase();
    match (lower.next(), lower.next()) {
        (Some(l), None) => l,
        _ => c,
    }
}
