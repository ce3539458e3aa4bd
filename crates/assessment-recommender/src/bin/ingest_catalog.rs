//! Embed the crawled catalog and (re)write the LanceDB table the recommender reads.
//!
//! Usage: `ingest-catalog [catalog.json]`, defaulting to `CATALOG_JSON`.

use std::path::PathBuf;

use tracing::info;
use tracing_subscriber::EnvFilter;

use assessment_recommender::catalog;
use assessment_recommender::config::Config;
use recommender_common::embedding::Embedder;
use recommender_common::vectordb::VectorDb;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    let config = Config::from_env()?;
    let path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(&config.catalog_json));

    let entries = catalog::load_catalog(&path)?;

    info!("initializing embedding model (may download on first run)");
    let embedder = Embedder::new().await?;
    let vectordb = VectorDb::connect(&config.lancedb_path).await?;

    let rows = catalog::ingest(&entries, &embedder, &vectordb, &config.table_name).await?;
    info!(
        rows,
        table = %config.table_name,
        lancedb_path = %config.lancedb_path,
        "ingestion complete"
    );
    Ok(())
}
