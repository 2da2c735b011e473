//! Raw conversation turns persisted alongside the chunk store.
//!
//! Messages are append-only and keyed by the provider-supplied id, so
//! re-ingestion is a no-op. Their vectors are written outside the insert
//! transaction; a failed vector insert is recovered by the startup sweep.

use anyhow::{Context, Result};
use rusqlite::{params, Connection};

use crate::db;
use crate::embedding::EmbeddingProvider;

/// Texts shorter than this are stored but not embedded.
const MIN_EMBED_CHARS: usize = 10;

/// A cleaned conversation turn from a live session.
#[derive(Debug, Clone)]
pub struct TranscriptMessage {
    pub message_id: String,
    pub session_id: String,
    /// Display role after alias substitution (e.g. the configured user name).
    pub role: String,
    pub timestamp_ms: i64,
    pub text: String,
    pub is_user: bool,
}

/// Upsert messages by id and embed the newly inserted ones. Returns the
/// number of rows actually inserted.
pub fn insert_messages(
    conn: &mut Connection,
    embedder: &dyn EmbeddingProvider,
    messages: &[TranscriptMessage],
) -> Result<usize> {
    if messages.is_empty() {
        return Ok(0);
    }

    let tx = conn.transaction().context("begin message transaction")?;
    let mut inserted = 0usize;
    let mut to_embed: Vec<&TranscriptMessage> = Vec::new();

    {
        let mut stmt = tx.prepare(
            "INSERT OR IGNORE INTO messages (id, session_id, role, timestamp, text) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )?;
        for message in messages {
            if message.message_id.is_empty() {
                continue;
            }
            let rows = stmt.execute(params![
                message.message_id,
                message.session_id,
                message.role,
                message.timestamp_ms,
                message.text,
            ])?;
            if rows > 0 {
                inserted += 1;
                to_embed.push(message);
            }
        }
    }

    tx.commit().context("commit message transaction")?;

    // Vector rows land outside the transaction; per-row failures are
    // recoverable, so they only warn.
    for message in to_embed {
        if message.text.len() < MIN_EMBED_CHARS {
            continue;
        }
        let embedding = match embedder.embed(&message.text) {
            Ok(e) => e,
            Err(err) => {
                tracing::warn!(message_id = %message.message_id, error = %err, "message embed failed");
                continue;
            }
        };
        if let Err(err) = conn.execute(
            "INSERT OR IGNORE INTO vec_messages (message_id, embedding) VALUES (?1, ?2)",
            params![message.message_id, db::embedding_to_bytes(&embedding)],
        ) {
            tracing::warn!(message_id = %message.message_id, error = %err, "message vector insert failed");
        }
    }

    Ok(inserted)
}
