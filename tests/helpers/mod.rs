#![allow(dead_code)]

use anyhow::Result;
use mneme::db;
use mneme::embedding::EmbeddingProvider;
use rusqlite::{params, Connection};

/// Small vector dimension so tests stay cheap.
pub const TEST_DIM: usize = 8;

/// Open a fresh in-memory store with the schema applied at [`TEST_DIM`].
pub fn test_db() -> Connection {
    db::load_sqlite_vec();
    let conn = Connection::open_in_memory().unwrap();
    db::schema::init_schema(&conn, TEST_DIM).unwrap();
    conn
}

/// Unit vector with a spike at `seed`. Distinct seeds are orthogonal.
pub fn spike(seed: usize) -> Vec<f32> {
    let mut v = vec![0.0f32; TEST_DIM];
    v[seed % TEST_DIM] = 1.0;
    v
}

/// Deterministic embedder: each distinct text lands on some spike.
/// Geometry does not matter for ingestion tests, determinism does.
pub struct StubEmbedder;

impl EmbeddingProvider for StubEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let hash: usize = text.bytes().map(usize::from).sum();
        Ok(spike(hash))
    }

    fn healthy(&self) -> bool {
        true
    }

    fn dimensions(&self) -> usize {
        TEST_DIM
    }
}

/// Always returns the same vector — used as the query embedding in search
/// tests where relative distances are arranged by hand.
pub struct FixedEmbedder(pub Vec<f32>);

impl EmbeddingProvider for FixedEmbedder {
    fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        Ok(self.0.clone())
    }

    fn healthy(&self) -> bool {
        true
    }

    fn dimensions(&self) -> usize {
        self.0.len()
    }
}

/// Fails every embed call, for abort-path tests.
pub struct FailingEmbedder;

impl EmbeddingProvider for FailingEmbedder {
    fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        anyhow::bail!("embedding service unreachable")
    }

    fn healthy(&self) -> bool {
        false
    }

    fn dimensions(&self) -> usize {
        TEST_DIM
    }
}

/// Insert a chunk row plus its vector directly, bypassing the engine.
#[allow(clippy::too_many_arguments)]
pub fn insert_chunk(
    conn: &Connection,
    text: &str,
    source: &str,
    section: &str,
    parent: Option<&str>,
    header_level: i64,
    section_sequence: i64,
    valid_at: Option<&str>,
    embedding: &[f32],
) -> i64 {
    conn.execute(
        "INSERT INTO chunks \
         (text, source_file, section_title, header_level, parent_title, \
          section_sequence, chunk_sequence, chunk_total, valid_at, ingested_at) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, 1, 1, ?7, ?8)",
        params![
            text,
            source,
            section,
            header_level,
            parent,
            section_sequence,
            valid_at,
            "2026-01-01T00:00:00Z",
        ],
    )
    .unwrap();
    let chunk_id = conn.last_insert_rowid();

    conn.execute(
        "INSERT INTO vec_chunks (chunk_id, embedding) VALUES (?1, ?2)",
        params![chunk_id, db::embedding_to_bytes(embedding)],
    )
    .unwrap();

    chunk_id
}
