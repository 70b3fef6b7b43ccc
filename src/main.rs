use anyhow::{Context, Result};
use dotenvy::dotenv;
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use film_search::catalog::CsvCatalog;
use film_search::config::Config;
use film_search::create_app;
use film_search::engine::SearchEngine;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();

    let log_level = std::env::var("FILMS_LOG_LEVEL")
        .ok()
        .and_then(|level| level.parse().ok())
        .unwrap_or(Level::INFO);
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .compact()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = Config::from_env()?;
    let locations = config.locations();

    info!(
        "Index at {:?}, suggester at {:?}, catalog {:?}",
        locations.main, locations.suggester, config.catalog_path
    );
    if !locations.main.join("meta.json").exists() {
        info!("No index yet; it will be built from the catalog on the first search");
    }

    let engine = SearchEngine::new(
        locations,
        config.writer_heap_bytes,
        Arc::new(CsvCatalog::new(&config.catalog_path)),
        config.rebuild_timeout,
    );

    let app = create_app(Arc::new(engine));

    info!("Listening on {}", config.bind_addr);
    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_addr))?;
    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}
