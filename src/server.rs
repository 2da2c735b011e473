//! MCP server initialization for the stdio transport.

use anyhow::Result;
use rmcp::ServiceExt;
use std::sync::{Arc, Mutex};

use crate::config::MnemeConfig;
use crate::db;
use crate::embedding::{self, EmbeddingProvider};
use crate::tools::MnemeTools;

/// Shared setup: open the store, build the embedding client, and validate
/// the vector dimension when the service is reachable. Runs before the
/// async runtime starts — the embedding client is synchronous.
fn setup_shared_state(
    config: MnemeConfig,
) -> Result<(
    Arc<Mutex<rusqlite::Connection>>,
    Arc<dyn EmbeddingProvider>,
    Arc<MnemeConfig>,
)> {
    let db_path = config.resolved_db_path();
    let conn = db::open_database(&db_path, config.embedding.dimension)?;

    let client = embedding::ollama::OllamaClient::new(
        &config.embedding.host,
        &config.embedding.model,
        config.embedding.dimension,
    )?;

    // A dimension mismatch is fatal; an unreachable service is a per-call
    // failure later, not a reason to refuse to start.
    if client.healthy() {
        embedding::validate_dimension(&client)?;
    } else {
        tracing::warn!(
            host = %config.embedding.host,
            "embedding service unreachable — dimension check deferred"
        );
    }

    let db = Arc::new(Mutex::new(conn));
    let embedding: Arc<dyn EmbeddingProvider> = Arc::new(client);
    let config = Arc::new(config);

    Ok((db, embedding, config))
}

/// Start the MCP server over stdio transport. Blocks until the client
/// disconnects.
pub fn serve_stdio(config: MnemeConfig) -> Result<()> {
    tracing::info!("starting Mneme MCP server on stdio");

    let (db, embedding, config) = setup_shared_state(config)?;

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async move {
        let tools = MnemeTools::new(db, embedding, config);
        let transport = rmcp::transport::stdio();

        let server = tools.serve(transport).await?;
        tracing::info!("MCP server running — waiting for client");

        server.waiting().await?;
        tracing::info!("MCP server shut down");
        Ok(())
    })
}
