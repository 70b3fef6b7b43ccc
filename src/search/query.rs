//! Compound query construction for film search.

use chrono::NaiveDate;
use std::ops::Bound;
use tantivy::query::{AllQuery, BooleanQuery, EmptyQuery, Occur, Query, RangeQuery, TermQuery};
use tantivy::schema::{Field, IndexRecordOption};
use tantivy::tokenizer::TokenStream;
use tantivy::Term;

use crate::search::parse::{clamp_date, encode_day, max_date, sentinel_date};
use crate::search::schema::{film_text_analyzer, FilmFields};

/// Vote averages live on a 0-10 scale; the range query always stops here.
pub const VOTE_AVERAGE_MAX: f64 = 10.0;

/// Words dropped from free-text queries before matching.
pub const STOP_WORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "but", "by", "for", "if", "in", "into", "is", "it",
    "no", "not", "of", "on", "or", "such", "that", "the", "their", "then", "there", "these",
    "they", "this", "to", "was", "will", "with",
];

/// Structured filters; `None` leaves that side of the range open.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchFilters {
    pub runtime_min: Option<i32>,
    pub runtime_max: Option<i32>,
    pub vote_average_min: Option<f64>,
    pub release_date_start: Option<NaiveDate>,
    pub release_date_end: Option<NaiveDate>,
}

/// Build the full query: text clause AND runtime AND vote average AND release date.
///
/// Filters are never omitted. An absent bound yields an open range, so
/// documents whose value fell back to `0` or the sentinel date still have to
/// sit inside it.
pub fn build_query(fields: &FilmFields, text: &str, filters: &SearchFilters) -> Box<dyn Query> {
    let clauses: Vec<(Occur, Box<dyn Query>)> = vec![
        (Occur::Must, build_text_query(fields.combined_text, text)),
        (Occur::Must, build_runtime_query(filters)),
        (Occur::Must, build_vote_average_query(filters)),
        (Occur::Must, build_release_date_query(filters)),
    ];

    Box::new(BooleanQuery::new(clauses))
}

/// Every retained query term must occur in `field`.
fn build_text_query(field: Field, text: &str) -> Box<dyn Query> {
    if text.trim().is_empty() {
        return Box::new(AllQuery);
    }

    let terms = query_terms(text);
    if terms.is_empty() {
        // Nothing but stop words
        return Box::new(EmptyQuery);
    }

    let clauses: Vec<(Occur, Box<dyn Query>)> = terms
        .into_iter()
        .map(|term| {
            let query: Box<dyn Query> = Box::new(TermQuery::new(
                Term::from_field_text(field, &term),
                IndexRecordOption::WithFreqs,
            ));
            (Occur::Must, query)
        })
        .collect();

    Box::new(BooleanQuery::new(clauses))
}

/// Split on whitespace, lowercase, drop stop words, then run what is left
/// through the index analyzer so query terms line up with indexed terms.
pub fn query_terms(text: &str) -> Vec<String> {
    let mut analyzer = film_text_analyzer();
    let mut terms = Vec::new();

    for word in text.split_whitespace() {
        let word = word.to_lowercase();
        if STOP_WORDS.contains(&word.as_str()) {
            continue;
        }

        let mut stream = analyzer.token_stream(&word);
        while let Some(token) = stream.next() {
            if !terms.contains(&token.text) {
                terms.push(token.text.clone());
            }
        }
    }

    terms
}

fn build_runtime_query(filters: &SearchFilters) -> Box<dyn Query> {
    Box::new(RangeQuery::new_i64_bounds(
        "runtime".to_string(),
        inclusive_or_open(filters.runtime_min.map(i64::from)),
        inclusive_or_open(filters.runtime_max.map(i64::from)),
    ))
}

fn build_vote_average_query(filters: &SearchFilters) -> Box<dyn Query> {
    Box::new(RangeQuery::new_f64_bounds(
        "vote_average".to_string(),
        inclusive_or_open(filters.vote_average_min),
        Bound::Included(VOTE_AVERAGE_MAX),
    ))
}

fn build_release_date_query(filters: &SearchFilters) -> Box<dyn Query> {
    let lower = encode_day(clamp_date(
        filters.release_date_start.unwrap_or_else(sentinel_date),
    ));
    let upper = encode_day(clamp_date(filters.release_date_end.unwrap_or_else(max_date)));

    Box::new(RangeQuery::new_str_bounds(
        "release_date".to_string(),
        Bound::Included(lower.as_str()),
        Bound::Included(upper.as_str()),
    ))
}

fn inclusive_or_open<T>(value: Option<T>) -> Bound<T> {
    value.map(Bound::Included).unwrap_or(Bound::Unbounded)
}
