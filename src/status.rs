//! System status — best effort, never fails.

use rusqlite::Connection;
use serde::Serialize;

use crate::embedding::EmbeddingProvider;

#[derive(Debug, Serialize)]
pub struct StatusInfo {
    pub ollama_healthy: bool,
    pub embed_model: String,
    pub vec_version: String,
    pub total_chunks: i64,
    pub earliest_valid_at: Option<String>,
    pub latest_valid_at: Option<String>,
}

/// Gather whatever can be gathered; missing pieces fall back to defaults.
pub fn gather(conn: &Connection, embedder: &dyn EmbeddingProvider, model: &str) -> StatusInfo {
    let vec_version: String = conn
        .query_row("SELECT vec_version()", [], |row| row.get(0))
        .unwrap_or_default();

    let total_chunks: i64 = conn
        .query_row("SELECT COUNT(*) FROM chunks", [], |row| row.get(0))
        .unwrap_or(0);

    let earliest_valid_at: Option<String> = conn
        .query_row(
            "SELECT MIN(valid_at) FROM chunks WHERE valid_at IS NOT NULL",
            [],
            |row| row.get(0),
        )
        .unwrap_or(None);

    let latest_valid_at: Option<String> = conn
        .query_row(
            "SELECT MAX(valid_at) FROM chunks WHERE valid_at IS NOT NULL",
            [],
            |row| row.get(0),
        )
        .unwrap_or(None);

    StatusInfo {
        ollama_healthy: embedder.healthy(),
        embed_model: model.to_string(),
        vec_version,
        total_chunks,
        earliest_valid_at,
        latest_valid_at,
    }
}
