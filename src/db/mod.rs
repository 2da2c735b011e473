pub mod schema;

use anyhow::{Context, Result};
use rusqlite::Connection;
use sqlite_vec::sqlite3_vec_init;
use std::path::Path;
use std::sync::Once;

static SQLITE_VEC_INIT: Once = Once::new();

/// Register the sqlite-vec extension globally. Safe to call multiple times.
pub fn load_sqlite_vec() {
    SQLITE_VEC_INIT.call_once(|| unsafe {
        rusqlite::ffi::sqlite3_auto_extension(Some(std::mem::transmute(
            sqlite3_vec_init as *const (),
        )));
    });
}

/// Open (or create) the store at the given path with the schema initialized
/// for `dim`-dimensional vectors.
///
/// A database created with one dimension must not be re-opened with another;
/// the dimension recorded at creation is checked on every open. Orphan
/// vector rows left behind by a crash mid-ingest are swept here.
pub fn open_database(path: impl AsRef<Path>, dim: usize) -> Result<Connection> {
    let path = path.as_ref();

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create directory {}", parent.display()))?;
        }
    }

    load_sqlite_vec();

    let conn = Connection::open(path)
        .with_context(|| format!("failed to open database at {}", path.display()))?;

    // WAL allows one writer alongside readers
    conn.pragma_update(None, "journal_mode", "WAL")?;
    // Wait up to 5 seconds for locks instead of failing immediately
    conn.pragma_update(None, "busy_timeout", "5000")?;

    schema::init_schema(&conn, dim).context("failed to initialize schema")?;

    if let Some(stored) = stored_embed_dim(&conn)? {
        if stored != dim {
            anyhow::bail!(
                "store at {} was created with {stored}-dimensional vectors, \
                 config expects {dim} — set EMBED_DIM={stored} or use a new store file",
                path.display()
            );
        }
    }

    sweep_orphan_vectors(&conn)?;

    let integrity: String = conn.pragma_query_value(None, "quick_check", |row| row.get(0))?;
    if integrity != "ok" {
        anyhow::bail!(
            "database integrity check failed: {integrity}. \
             Restore from a backup copy of the store file."
        );
    }

    tracing::info!(path = %path.display(), dim, "store ready");
    Ok(conn)
}

/// The vector dimension recorded when the store was created.
pub fn stored_embed_dim(conn: &Connection) -> Result<Option<usize>> {
    match conn.query_row(
        "SELECT value FROM meta WHERE key = 'embed_dim'",
        [],
        |row| row.get::<_, String>(0),
    ) {
        Ok(val) => Ok(val.parse::<usize>().ok()),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Delete vector rows whose chunk or message no longer exists. Vector
/// inserts land after the chunk transaction commits, so a crash between the
/// two leaves rows only this sweep can reclaim.
pub fn sweep_orphan_vectors(conn: &Connection) -> Result<()> {
    let chunks = conn.execute(
        "DELETE FROM vec_chunks WHERE chunk_id NOT IN (SELECT id FROM chunks)",
        [],
    )?;
    let messages = conn.execute(
        "DELETE FROM vec_messages WHERE message_id NOT IN (SELECT id FROM messages)",
        [],
    )?;
    if chunks > 0 || messages > 0 {
        tracing::info!(chunks, messages, "swept orphan vector rows");
    }
    Ok(())
}

/// Convert an f32 embedding slice to raw bytes for sqlite-vec.
pub fn embedding_to_bytes(embedding: &[f32]) -> &[u8] {
    unsafe {
        std::slice::from_raw_parts(
            embedding.as_ptr() as *const u8,
            std::mem::size_of_val(embedding),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_records_and_enforces_dimension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mneme.db");

        {
            let conn = open_database(&path, 8).unwrap();
            assert_eq!(stored_embed_dim(&conn).unwrap(), Some(8));
        }

        // Same dimension reopens fine
        drop(open_database(&path, 8).unwrap());

        // A different dimension is a fatal init error
        let err = open_database(&path, 16).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("8-dimensional"), "unexpected message: {msg}");
        assert!(msg.contains("EMBED_DIM=8"), "unexpected message: {msg}");
    }

    #[test]
    fn orphan_vectors_are_swept_on_open() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mneme.db");

        {
            let conn = open_database(&path, 8).unwrap();
            let embedding = vec![1.0f32; 8];
            conn.execute(
                "INSERT INTO vec_chunks (chunk_id, embedding) VALUES (42, ?1)",
                [embedding_to_bytes(&embedding)],
            )
            .unwrap();
        }

        let conn = open_database(&path, 8).unwrap();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM vec_chunks", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }
}
