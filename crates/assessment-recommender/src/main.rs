use std::sync::Arc;

use rmcp::{ServiceExt, transport::stdio};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use assessment_recommender::config::{Config, Transport};
use assessment_recommender::http;
use assessment_recommender::recommender::{Readiness, RecommenderContext};
use assessment_recommender::server::RecommenderServer;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // stderr only: stdout carries MCP JSON-RPC in stdio mode
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    info!("starting assessment-recommender");

    let config = Config::from_env()?;
    info!(
        lancedb_path = %config.lancedb_path,
        table = %config.table_name,
        transport = ?config.transport,
        classifier = config.classifier_model.is_some(),
        "configuration loaded"
    );

    // A failed load keeps the process up so /health can report it.
    let readiness = match RecommenderContext::initialize(&config).await {
        Ok(ctx) => {
            info!("recommender ready");
            Readiness::Ready(Arc::new(ctx))
        }
        Err(e) => {
            error!(error = %e, "recommender failed to load");
            Readiness::NotReady(e.to_string())
        }
    };
    let readiness = Arc::new(readiness);

    match config.transport {
        Transport::Http => {
            http::serve(&config.bind_addr, readiness).await?;
        }
        Transport::Stdio => {
            info!("MCP server ready, serving on stdio");
            let service = RecommenderServer::new(readiness)
                .serve(stdio())
                .await
                .inspect_err(|e| {
                    error!(error = %e, "MCP server error");
                })?;
            service.waiting().await?;
            info!("MCP server shut down");
        }
    }
    Ok(())
}
