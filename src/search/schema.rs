//! Tantivy schema definition for films, and the mapping from raw catalog
//! records to indexable documents.

use chrono::NaiveDate;
use serde::Serialize;
use tantivy::schema::{
    Field, IndexRecordOption, Schema, TextFieldIndexing, TextOptions, Value, FAST, INDEXED,
    STORED, STRING,
};
use tantivy::tokenizer::{LowerCaser, RemoveLongFilter, SimpleTokenizer, TextAnalyzer};
use tantivy::{Index, TantivyDocument};

use crate::catalog::RawCatalogRecord;
use crate::search::parse::{
    decode_day, encode_day, finite_or_zero, narrow_runtime, parse_or_default,
    parse_release_date, parse_vote_average,
};

/// Name of the analyzer used by every tokenized film field.
pub const FILM_TOKENIZER: &str = "film_text";

/// Field handles for the film index
#[derive(Debug, Clone, Copy)]
pub struct FilmFields {
    pub id: Field,
    pub title: Field,
    pub overview: Field,
    pub runtime: Field,
    pub tagline: Field,
    pub revenue: Field,
    pub vote_average: Field,
    pub combined_text: Field,
    pub release_date: Field,
}

/// Create the Tantivy schema for films.
pub fn create_film_schema() -> (Schema, FilmFields) {
    let mut schema_builder = Schema::builder();

    // Exact-match identifier
    let id = schema_builder.add_text_field("id", STRING | STORED);

    let indexing = TextFieldIndexing::default()
        .set_tokenizer(FILM_TOKENIZER)
        .set_index_option(IndexRecordOption::WithFreqsAndPositions);
    let stored_text = TextOptions::default()
        .set_indexing_options(indexing.clone())
        .set_stored();

    let title = schema_builder.add_text_field("title", stored_text.clone());
    let overview = schema_builder.add_text_field("overview", stored_text.clone());
    let tagline = schema_builder.add_text_field("tagline", stored_text);

    // Free-text queries only ever target this field
    let combined_text = schema_builder.add_text_field(
        "combined_text",
        TextOptions::default().set_indexing_options(indexing),
    );

    let runtime = schema_builder.add_i64_field("runtime", INDEXED | STORED | FAST);
    let revenue = schema_builder.add_i64_field("revenue", STORED);
    let vote_average = schema_builder.add_f64_field("vote_average", INDEXED | STORED | FAST);

    // YYYYMMDD, compared lexicographically
    let release_date = schema_builder.add_text_field("release_date", STRING | STORED);

    let schema = schema_builder.build();

    let fields = FilmFields {
        id,
        title,
        overview,
        runtime,
        tagline,
        revenue,
        vote_average,
        combined_text,
        release_date,
    };

    (schema, fields)
}

/// Word tokenizer shared by indexing and query construction.
pub fn film_text_analyzer() -> TextAnalyzer {
    TextAnalyzer::builder(SimpleTokenizer::default())
        .filter(RemoveLongFilter::limit(40))
        .filter(LowerCaser)
        .build()
}

/// Tokenizers are not persisted with the index; register on every open.
pub fn register_film_tokenizers(index: &Index) {
    index
        .tokenizers()
        .register(FILM_TOKENIZER, film_text_analyzer());
}

/// A catalog record with typed fields, ready for the main index.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexedDocument {
    pub id: String,
    pub title: String,
    pub overview: String,
    pub runtime: i32,
    pub tagline: String,
    pub revenue: i64,
    pub vote_average: f64,
    pub release_date: NaiveDate,
}

impl IndexedDocument {
    /// Map a raw record. Malformed numbers and dates fall back to defaults
    /// so one bad row cannot abort a catalog load.
    pub fn from_record(record: &RawCatalogRecord) -> Self {
        Self {
            id: record.id.clone(),
            title: record.title.clone(),
            overview: record.overview.clone(),
            runtime: parse_or_default(&record.runtime),
            tagline: record.tagline.clone(),
            revenue: parse_or_default(&record.revenue),
            vote_average: parse_vote_average(&record.vote_average),
            release_date: parse_release_date(&record.release_date),
        }
    }

    pub fn combined_text(&self) -> String {
        format!("{} {} {}", self.title, self.tagline, self.overview)
    }

    pub fn to_document(&self, fields: &FilmFields) -> TantivyDocument {
        let mut doc = TantivyDocument::new();

        doc.add_text(fields.id, &self.id);
        doc.add_text(fields.title, &self.title);
        doc.add_text(fields.overview, &self.overview);
        doc.add_i64(fields.runtime, i64::from(self.runtime));
        doc.add_text(fields.tagline, &self.tagline);
        doc.add_i64(fields.revenue, self.revenue);
        doc.add_f64(fields.vote_average, self.vote_average);
        doc.add_text(fields.combined_text, &self.combined_text());
        doc.add_text(fields.release_date, &encode_day(self.release_date));

        doc
    }
}

/// A search hit decoded back from stored values.
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SearchResultRecord {
    pub id: String,
    pub title: String,
    pub overview: String,
    pub runtime: i32,
    pub tagline: String,
    pub revenue: i64,
    pub vote_average: f64,
    pub release_date: NaiveDate,
    pub score: f32,
}

impl SearchResultRecord {
    /// Decode a stored document with the same fail-soft defaults as
    /// [`IndexedDocument::from_record`].
    pub fn from_stored(doc: &TantivyDocument, fields: &FilmFields, score: f32) -> Self {
        let text = |field: Field| {
            doc.get_first(field)
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string()
        };
        let int = |field: Field| doc.get_first(field).and_then(|v| v.as_i64()).unwrap_or(0);

        Self {
            id: text(fields.id),
            title: text(fields.title),
            overview: text(fields.overview),
            runtime: narrow_runtime(int(fields.runtime)),
            tagline: text(fields.tagline),
            revenue: int(fields.revenue),
            vote_average: finite_or_zero(
                doc.get_first(fields.vote_average)
                    .and_then(|v| v.as_f64())
                    .unwrap_or(0.0),
            ),
            release_date: decode_day(&text(fields.release_date)),
            score,
        }
    }
}
