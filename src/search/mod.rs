//! Tantivy full-text search and autocomplete for films.

pub mod executor;
pub mod index;
pub mod parse;
pub mod query;
pub mod schema;
pub mod suggest;

pub use executor::{PageRequest, SearchPage, SearchRequest, MAX_HITS};
pub use index::{IndexLocations, IndexStore, Snapshot};
pub use query::{build_query, SearchFilters};
pub use schema::{create_film_schema, IndexedDocument, SearchResultRecord};
pub use suggest::{Suggester, Suggestion, SUGGESTION_LIMIT};
