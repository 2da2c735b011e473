//! SQL DDL for the chunk and message stores.
//!
//! The `chunks` table holds retrieval units with their provenance and
//! temporal metadata; `vec_chunks` is the matching cosine-distance vec0
//! index keyed by `chunk_id`. The `messages`/`vec_messages` pair mirrors the
//! same layout for raw conversation turns. The vector dimension is fixed at
//! creation time, so the DDL is built rather than a constant.

use rusqlite::Connection;

fn schema_sql(dim: usize) -> String {
    format!(
        r#"
-- Retrieval units
CREATE TABLE IF NOT EXISTS chunks (
    id INTEGER PRIMARY KEY,
    text TEXT NOT NULL,
    source_file TEXT NOT NULL,
    section_title TEXT NOT NULL,
    header_level INTEGER NOT NULL DEFAULT 2,
    parent_title TEXT,
    section_sequence INTEGER,
    chunk_sequence INTEGER,
    chunk_total INTEGER,
    valid_at TEXT,
    ingested_at TEXT NOT NULL,
    UNIQUE(source_file, section_sequence, chunk_sequence)
);

CREATE VIRTUAL TABLE IF NOT EXISTS vec_chunks USING vec0(
    chunk_id INTEGER PRIMARY KEY,
    embedding float[{dim}] distance_metric=cosine
);

-- Raw conversation turns from the session tailer
CREATE TABLE IF NOT EXISTS messages (
    id TEXT PRIMARY KEY,
    session_id TEXT NOT NULL,
    role TEXT NOT NULL,
    timestamp INTEGER NOT NULL,
    text TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_messages_session_ts ON messages(session_id, timestamp);
CREATE INDEX IF NOT EXISTS idx_messages_session ON messages(session_id);

CREATE VIRTUAL TABLE IF NOT EXISTS vec_messages USING vec0(
    message_id TEXT PRIMARY KEY,
    embedding float[{dim}] distance_metric=cosine
);

-- Store metadata
CREATE TABLE IF NOT EXISTS meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
"#
    )
}

/// Initialize all tables. Idempotent (uses IF NOT EXISTS). Records the
/// vector dimension in `meta` the first time a database is created.
pub fn init_schema(conn: &Connection, dim: usize) -> rusqlite::Result<()> {
    conn.execute_batch(&schema_sql(dim))?;

    conn.execute(
        "INSERT OR IGNORE INTO meta (key, value) VALUES ('embed_dim', ?1)",
        [dim.to_string()],
    )?;

    Ok(())
}
