mod common;

use chrono::NaiveDate;
use std::sync::Arc;
use tempfile::tempdir;

use common::{catalog, engine, engine_with, CountingCatalog, FailingCatalog};
use film_search::error::EngineError;
use film_search::search::{SearchFilters, SearchRequest, MAX_HITS};

fn request(text: &str, start: i64, rows: i64) -> SearchRequest {
    SearchRequest {
        text: text.to_string(),
        start,
        rows,
        filters: SearchFilters::default(),
    }
}

fn ids(page: &film_search::search::SearchPage) -> Vec<String> {
    page.films.iter().map(|film| film.id.clone()).collect()
}

// ============================================================================
// Search
// ============================================================================

#[test]
fn test_empty_text_matches_whole_catalog() {
    let dir = tempdir().unwrap();
    let engine = engine(&dir);
    engine.populate_index().unwrap();

    let page = engine.search(&request("", 0, 100)).unwrap();
    assert_eq!(page.total_hits, catalog().len());
    assert_eq!(page.films.len(), catalog().len());
}

#[test]
fn test_title_token_recall() {
    let dir = tempdir().unwrap();
    let engine = engine(&dir);
    engine.populate_index().unwrap();

    let page = engine.search(&request("Spirited", 0, 10)).unwrap();
    assert_eq!(ids(&page), vec!["3"]);
    assert_eq!(page.films[0].title, "Spirited Away");
    assert_eq!(page.films[0].runtime, 125);

    // Case does not matter
    let page = engine.search(&request("HEAT", 0, 10)).unwrap();
    assert_eq!(ids(&page), vec!["5"]);
}

#[test]
fn test_matrix_vote_average_filter() {
    let dir = tempdir().unwrap();
    let engine = engine(&dir);
    engine.populate_index().unwrap();

    let mut req = request("matrix", 0, 10);
    assert_eq!(engine.search(&req).unwrap().total_hits, 2);

    req.filters.vote_average_min = Some(8.0);
    let page = engine.search(&req).unwrap();
    assert_eq!(page.total_hits, 1);
    assert_eq!(ids(&page), vec!["1"]);

    req.filters.vote_average_min = Some(9.0);
    let page = engine.search(&req).unwrap();
    assert_eq!(page.total_hits, 0);
    assert!(page.films.is_empty());
}

#[test]
fn test_exact_runtime_range() {
    let dir = tempdir().unwrap();
    let engine = engine(&dir);
    engine.populate_index().unwrap();

    let mut req = request("", 0, 10);
    req.filters.runtime_min = Some(90);
    req.filters.runtime_max = Some(90);

    let page = engine.search(&req).unwrap();
    let mut found = ids(&page);
    found.sort();
    assert_eq!(found, vec!["7", "8"]);
    assert!(page.films.iter().all(|film| film.runtime == 90));
}

#[test]
fn test_release_date_range() {
    let dir = tempdir().unwrap();
    let engine = engine(&dir);
    engine.populate_index().unwrap();

    let mut req = request("", 0, 20);
    req.filters.release_date_start = NaiveDate::from_ymd_opt(1999, 1, 1);
    req.filters.release_date_end = NaiveDate::from_ymd_opt(2003, 12, 31);

    let mut found = ids(&engine.search(&req).unwrap());
    found.sort();
    assert_eq!(found, vec!["1", "2", "3"]);
}

#[test]
fn test_unparseable_fields_fall_back_to_defaults() {
    let dir = tempdir().unwrap();
    let engine = engine(&dir);
    engine.populate_index().unwrap();

    let page = engine.search(&request("lost reel", 0, 10)).unwrap();
    assert_eq!(ids(&page), vec!["11"]);
    let film = &page.films[0];
    assert_eq!(film.runtime, 0);
    assert_eq!(film.vote_average, 0.0);
    assert_eq!(film.release_date, NaiveDate::from_ymd_opt(1, 1, 1).unwrap());

    // Any lower bound on the vote average excludes the fallback
    let mut req = request("lost reel", 0, 10);
    req.filters.vote_average_min = Some(0.5);
    assert_eq!(engine.search(&req).unwrap().total_hits, 0);
}

#[test]
fn test_stop_words_only_matches_nothing() {
    let dir = tempdir().unwrap();
    let engine = engine(&dir);
    engine.populate_index().unwrap();

    let page = engine.search(&request("the of and", 0, 10)).unwrap();
    assert_eq!(page.total_hits, 0);
}

#[test]
fn test_scores_are_non_increasing() {
    let dir = tempdir().unwrap();
    let engine = engine(&dir);
    engine.populate_index().unwrap();

    let page = engine.search(&request("alien", 0, 10)).unwrap();
    assert!(page.total_hits >= 1);
    for pair in page.films.windows(2) {
        assert!(pair[0].score >= pair[1].score);
    }
}

// ============================================================================
// Pagination
// ============================================================================

#[test]
fn test_pages_concatenate_to_full_result() {
    let dir = tempdir().unwrap();
    let engine = engine(&dir);
    engine.populate_index().unwrap();

    let full = ids(&engine.search(&request("", 0, 100)).unwrap());

    let mut paged = Vec::new();
    for start in 0..4 {
        let page = engine.search(&request("", start, 3)).unwrap();
        assert_eq!(page.total_hits, full.len());
        assert!(page.films.len() <= 3);
        paged.extend(ids(&page));
    }

    assert_eq!(paged, full);
}

#[test]
fn test_total_hits_capped_at_max_hits() {
    let dir = tempdir().unwrap();
    let records = (0..1100)
        .map(|i| common::film(&i.to_string(), &format!("Film {}", i), "100", "6.0", "2005-06-01"))
        .collect::<Vec<_>>();
    let engine = engine_with(&dir, Arc::new(records));

    let page = engine.search(&request("", 9, 100)).unwrap();
    assert_eq!(page.total_hits, MAX_HITS);
    assert_eq!(page.films.len(), 100);

    // Hits beyond the cap are never reachable
    let page = engine.search(&request("", 10, 100)).unwrap();
    assert_eq!(page.total_hits, MAX_HITS);
    assert!(page.films.is_empty());
}

#[test]
fn test_page_past_the_end_is_empty() {
    let dir = tempdir().unwrap();
    let engine = engine(&dir);
    engine.populate_index().unwrap();

    let page = engine.search(&request("", 50, 10)).unwrap();
    assert!(page.films.is_empty());
    assert_eq!(page.total_hits, catalog().len());
}

#[test]
fn test_negative_page_is_rejected() {
    let dir = tempdir().unwrap();
    let engine = engine(&dir);

    for (start, rows) in [(-1, 10), (0, -5)] {
        let err = engine.search(&request("", start, rows)).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<EngineError>(),
            Some(EngineError::InvalidPage { .. })
        ));
    }

    // Validation happens before any rebuild
    assert!(!engine.store().main().exists());
}

// ============================================================================
// Readiness & Rebuilds
// ============================================================================

#[test]
fn test_cold_start_builds_index_on_first_search() {
    let dir = tempdir().unwrap();
    let engine = engine(&dir);
    assert!(!engine.store().main().exists());

    let page = engine.search(&request("matrix", 0, 10)).unwrap();
    assert_eq!(page.total_hits, 2);
    assert!(engine.store().main().exists());
    assert!(engine.store().suggester().exists());
}

#[test]
fn test_search_after_delete_rebuilds() {
    let dir = tempdir().unwrap();
    let engine = engine(&dir);
    engine.populate_index().unwrap();
    engine.delete_index().unwrap();

    assert_eq!(engine.store().main().doc_count().unwrap(), Some(0));

    let page = engine.search(&request("", 0, 100)).unwrap();
    assert_eq!(page.total_hits, catalog().len());
}

#[test]
fn test_reload_does_not_duplicate() {
    let dir = tempdir().unwrap();
    let engine = engine(&dir);
    engine.populate_index().unwrap();

    let added = engine.reload_index().unwrap();
    assert_eq!(added, catalog().len() as u64);
    assert_eq!(
        engine.store().main().doc_count().unwrap(),
        Some(catalog().len() as u64)
    );
}

#[test]
fn test_populate_appends() {
    let dir = tempdir().unwrap();
    let engine = engine(&dir);
    engine.populate_index().unwrap();
    engine.populate_index().unwrap();

    assert_eq!(
        engine.store().main().doc_count().unwrap(),
        Some(2 * catalog().len() as u64)
    );
}

#[test]
fn test_concurrent_cold_searches_load_catalog_once() {
    let dir = tempdir().unwrap();
    let source = Arc::new(CountingCatalog::new(catalog()));
    let engine = engine_with(&dir, source.clone());

    std::thread::scope(|scope| {
        for _ in 0..8 {
            scope.spawn(|| {
                let page = engine.search(&request("", 0, 100)).unwrap();
                assert_eq!(page.total_hits, catalog().len());
            });
        }
    });

    assert_eq!(source.loads(), 1);
}

#[test]
fn test_catalog_failure_propagates() {
    let dir = tempdir().unwrap();
    let engine = engine_with(&dir, Arc::new(FailingCatalog));

    let err = engine.search(&request("matrix", 0, 10)).unwrap_err();
    assert!(format!("{:#}", err).contains("catalog unreachable"));

    assert!(engine.populate_index().is_err());
}

// ============================================================================
// Autocomplete
// ============================================================================

#[test]
fn test_autocomplete_blank_input() {
    let dir = tempdir().unwrap();
    let engine = engine(&dir);

    assert!(engine.autocomplete(None).unwrap().is_empty());
    assert!(engine.autocomplete(Some("   ")).unwrap().is_empty());
    // Nothing was built for a blank lookup
    assert!(!engine.store().main().exists());
}

#[test]
fn test_autocomplete_matches_inside_titles() {
    let dir = tempdir().unwrap();
    let engine = engine(&dir);
    engine.populate_index().unwrap();

    let suggestions = engine.autocomplete(Some("atri")).unwrap();
    let titles: Vec<&str> = suggestions.iter().map(|s| s.text.as_str()).collect();
    assert_eq!(titles, vec!["The Matrix", "The Matrix Reloaded"]);
    assert_eq!(suggestions[0].highlighted, "The M<b>atri</b>x");
    assert_eq!(suggestions[0].id, "1");
}

#[test]
fn test_autocomplete_prefers_prefix_matches() {
    let dir = tempdir().unwrap();
    let engine = engine(&dir);
    engine.populate_index().unwrap();

    let suggestions = engine.autocomplete(Some("MA")).unwrap();
    let titles: Vec<&str> = suggestions.iter().map(|s| s.text.as_str()).collect();
    assert_eq!(titles, vec!["Matilda", "The Matrix", "The Matrix Reloaded"]);
    assert_eq!(suggestions[0].highlighted, "<b>Ma</b>tilda");
}

#[test]
fn test_autocomplete_limit() {
    let dir = tempdir().unwrap();
    let records = (0..25)
        .map(|i| common::film(&i.to_string(), &format!("Sequel {}", i), "90", "5.0", "2000-01-01"))
        .collect::<Vec<_>>();
    let engine = engine_with(&dir, Arc::new(records));

    let suggestions = engine.autocomplete(Some("sequel")).unwrap();
    assert_eq!(suggestions.len(), film_search::search::SUGGESTION_LIMIT);
}

#[test]
fn test_autocomplete_cold_start() {
    let dir = tempdir().unwrap();
    let engine = engine(&dir);

    let suggestions = engine.autocomplete(Some("heat")).unwrap();
    assert_eq!(suggestions.len(), 1);
    assert_eq!(suggestions[0].id, "5");
}

#[test]
fn test_autocomplete_terms_in_any_order() {
    let dir = tempdir().unwrap();
    let engine = engine(&dir);
    engine.populate_index().unwrap();

    for input in ["reloaded matrix", "matrix reload", "MATRIX  Reloaded"] {
        let suggestions = engine.autocomplete(Some(input)).unwrap();
        let titles: Vec<&str> = suggestions.iter().map(|s| s.text.as_str()).collect();
        assert_eq!(titles, vec!["The Matrix Reloaded"], "input {:?}", input);
    }

    let suggestions = engine.autocomplete(Some("reloaded matrix")).unwrap();
    assert_eq!(
        suggestions[0].highlighted,
        "The <b>Matrix</b> <b>Reloaded</b>"
    );

    assert!(engine.autocomplete(Some("matrix heat")).unwrap().is_empty());
}

#[test]
fn test_autocomplete_ranks_every_match() {
    let dir = tempdir().unwrap();
    let mut records = (0..300)
        .map(|i| {
            common::film(&i.to_string(), &format!("Sequel Part {:03}", i), "90", "5.0", "2000-01-01")
        })
        .collect::<Vec<_>>();
    // Indexed last, behind every longer match
    records.push(common::film("exact", "Sequel", "90", "5.0", "2000-01-01"));
    let engine = engine_with(&dir, Arc::new(records));

    let suggestions = engine.autocomplete(Some("sequel")).unwrap();
    assert_eq!(suggestions.len(), 10);
    assert_eq!(suggestions[0].text, "Sequel");
    assert_eq!(suggestions[0].id, "exact");
    assert_eq!(suggestions[1].text, "Sequel Part 000");
    assert_eq!(suggestions[9].text, "Sequel Part 008");
}
