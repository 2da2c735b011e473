//! Semantic retrieval — vector top-k with optional temporal filtering and
//! chronological reordering.

use anyhow::{Context, Result};
use rusqlite::{params, Connection};
use serde::Serialize;

use crate::db;
use crate::embedding::EmbeddingProvider;

/// When an `as_of` cutoff is set the temporal filter runs after the ANN
/// query, so the index is over-fetched to compensate for dropped rows.
const ASOF_OVERFETCH: usize = 3;

#[derive(Debug, Clone, Serialize)]
pub struct SearchResult {
    pub id: i64,
    pub text: String,
    pub source_file: String,
    pub section_title: String,
    pub parent_title: Option<String>,
    pub header_level: i64,
    pub valid_at: Option<String>,
    /// Raw cosine distance as reported by the vector index.
    pub distance: f64,
}

/// Embed `query` and return up to `limit` chunks, chronologically ordered.
pub fn search(
    conn: &Connection,
    embedder: &dyn EmbeddingProvider,
    query: &str,
    limit: usize,
    as_of: Option<&str>,
) -> Result<Vec<SearchResult>> {
    if query.trim().is_empty() {
        anyhow::bail!("query must not be empty");
    }
    let embedding = embedder.embed(query).context("failed to embed query")?;
    search_by_vector(conn, &embedding, limit, as_of)
}

/// The query pipeline after embedding: nearest-neighbor fetch, as-of filter,
/// truncation, chronological reorder.
pub fn search_by_vector(
    conn: &Connection,
    embedding: &[f32],
    limit: usize,
    as_of: Option<&str>,
) -> Result<Vec<SearchResult>> {
    let fetch_limit = if as_of.is_some() {
        limit * ASOF_OVERFETCH
    } else {
        limit
    };

    let mut stmt = conn.prepare(
        "SELECT v.chunk_id, v.distance, c.text, c.source_file, c.section_title, \
                c.parent_title, c.header_level, c.valid_at \
         FROM vec_chunks v \
         JOIN chunks c ON c.id = v.chunk_id \
         WHERE v.embedding MATCH ?1 AND v.k = ?2 \
         ORDER BY v.distance",
    )?;

    let mut results: Vec<SearchResult> = stmt
        .query_map(
            params![db::embedding_to_bytes(embedding), fetch_limit as i64],
            |row| {
                Ok(SearchResult {
                    id: row.get(0)?,
                    distance: row.get(1)?,
                    text: row.get(2)?,
                    source_file: row.get(3)?,
                    section_title: row.get(4)?,
                    parent_title: row.get(5)?,
                    header_level: row.get(6)?,
                    valid_at: row.get(7)?,
                })
            },
        )?
        .collect::<std::result::Result<_, _>>()
        .context("vector search failed")?;

    // Rows dated after the cutoff are dropped; timeless rows always stay.
    if let Some(as_of) = as_of {
        results.retain(|r| match &r.valid_at {
            Some(valid_at) => valid_at.as_str() <= as_of,
            None => true,
        });
    }

    results.truncate(limit);

    // Chronological reorder: Option's ordering puts timeless rows first,
    // and the stable sort preserves their relative distance order.
    results.sort_by(|a, b| a.valid_at.cmp(&b.valid_at));

    Ok(results)
}
