//! Run the test-set queries through the recommender and write a submission CSV.
//!
//! Usage: `score-queries [test_set.csv] [predictions.csv]`, defaulting to
//! `data/provided/test_set.csv` and `submission/predictions.csv`.

use std::fs::File;
use std::path::PathBuf;

use anyhow::Context;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use assessment_recommender::config::Config;
use assessment_recommender::recommender::RecommenderContext;
use assessment_recommender::scoring;

const DEFAULT_TEST_SET: &str = "data/provided/test_set.csv";
const DEFAULT_OUTPUT: &str = "submission/predictions.csv";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    let mut args = std::env::args().skip(1);
    let test_set = PathBuf::from(args.next().unwrap_or_else(|| DEFAULT_TEST_SET.to_string()));
    let output = PathBuf::from(args.next().unwrap_or_else(|| DEFAULT_OUTPUT.to_string()));

    let input = File::open(&test_set)
        .with_context(|| format!("failed to open {}", test_set.display()))?;
    let queries = scoring::read_queries(input)?;
    info!(count = queries.len(), path = %test_set.display(), "loaded test queries");

    let config = Config::from_env()?;
    let ctx = RecommenderContext::initialize(&config).await?;

    let rows = scoring::predict(&ctx, &queries).await;
    if rows.is_empty() {
        warn!("no predictions were generated, nothing written");
        return Ok(());
    }

    if let Some(dir) = output.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("failed to create {}", dir.display()))?;
    }
    let out = File::create(&output)
        .with_context(|| format!("failed to create {}", output.display()))?;
    scoring::write_predictions(out, &rows)?;

    info!(rows = rows.len(), path = %output.display(), "predictions written");
    Ok(())
}
