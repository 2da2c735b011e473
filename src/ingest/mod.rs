//! Ingestion engine — parse, chunk, embed, and persist.
//!
//! The write discipline is two-phase: every chunk is embedded before any
//! database statement runs (the embedding service is the slowest and
//! likeliest failure, and aborting there leaves the store untouched), then
//! one transaction replaces the source's chunk rows, and the vector rows
//! are inserted after commit. A crash between the last two steps leaves
//! orphan vectors for the startup sweep.

pub mod chunker;
pub mod messages;

use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{params, Connection};
use serde::Serialize;
use std::path::Path;

use crate::db;
use crate::embedding::EmbeddingProvider;
use chunker::{chunk_section, parse_markdown, ChunkData, MAX_SECTION_WORDS};
use messages::TranscriptMessage;

/// Summary of one ingestion run.
#[derive(Debug, Default, Serialize)]
pub struct IngestResult {
    pub sections_found: usize,
    pub chunks_created: usize,
    pub sub_chunks_created: usize,
    pub deleted_chunks: i64,
}

/// A chunk with its embedding, ready to persist.
struct PreparedChunk {
    chunk: ChunkData,
    embedding: Vec<f32>,
}

/// Read a markdown file, chunk it, and replace all chunks previously stored
/// under the file's path.
///
/// Per-chunk `valid_at` falls back from the section's extracted date to
/// `default_valid_at`, then to null.
pub fn ingest_file(
    conn: &mut Connection,
    embedder: &dyn EmbeddingProvider,
    path: impl AsRef<Path>,
    default_valid_at: Option<&str>,
) -> Result<IngestResult> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;

    let sections = parse_markdown(&content);
    let source_file = path.to_string_lossy();

    let mut result = IngestResult {
        sections_found: sections.len(),
        ..Default::default()
    };

    let prepared = prepare_chunks(embedder, &sections, default_valid_at, &mut result)?;
    result.deleted_chunks = write_chunks(conn, &source_file, &prepared)?;

    tracing::info!(
        source = %source_file,
        sections = result.sections_found,
        chunks = result.chunks_created,
        deleted = result.deleted_chunks,
        "file ingested"
    );
    Ok(result)
}

/// Ingest a batch of live-session messages under a synthetic source.
///
/// Raw messages are upserted into the message store first, then the batch
/// is rendered as a markdown transcript and ingested like a file.
pub fn ingest_batch(
    conn: &mut Connection,
    embedder: &dyn EmbeddingProvider,
    source: &str,
    batch: &[TranscriptMessage],
    title: &str,
) -> Result<IngestResult> {
    match messages::insert_messages(conn, embedder, batch) {
        Ok(inserted) if inserted > 0 => {
            tracing::info!(inserted, "stored raw messages");
        }
        Ok(_) => {}
        Err(err) => tracing::warn!(error = %err, "message insert failed"),
    }

    let markdown = build_transcript_markdown(batch, title);
    let sections: Vec<_> = parse_markdown(&markdown)
        .into_iter()
        .filter(|s| !s.content.trim().is_empty())
        .collect();

    let mut result = IngestResult {
        sections_found: sections.len(),
        ..Default::default()
    };
    if sections.is_empty() {
        return Ok(result);
    }

    let prepared = prepare_chunks(embedder, &sections, None, &mut result)?;
    result.deleted_chunks = write_chunks(conn, source, &prepared)?;

    tracing::info!(source, chunks = result.chunks_created, "batch ingested");
    Ok(result)
}

/// Render a message batch as markdown: level-1 session title, a level-2
/// date header whenever the calendar date rolls, one turn per message.
pub fn build_transcript_markdown(batch: &[TranscriptMessage], title: &str) -> String {
    if batch.is_empty() {
        return String::new();
    }

    let mut out = format!("# {title}\n\n");
    let mut current_date = format_transcript_date(batch[0].timestamp_ms);
    out.push_str(&format!("## {current_date}\n\n"));

    for message in batch {
        let date = format_transcript_date(message.timestamp_ms);
        if date != current_date {
            current_date = date;
            out.push_str(&format!("\n## {current_date}\n\n"));
        }
        out.push_str(&format!(
            "**{}** [{}]:\n{}\n\n",
            message.role,
            format_transcript_time(message.timestamp_ms),
            message.text
        ));
    }

    out
}

fn transcript_datetime(timestamp_ms: i64) -> chrono::DateTime<chrono::Local> {
    chrono::DateTime::from_timestamp_millis(timestamp_ms)
        .unwrap_or(chrono::DateTime::UNIX_EPOCH)
        .with_timezone(&chrono::Local)
}

/// `January 2, 2026` — the form the chunker's date extraction reads back.
fn format_transcript_date(timestamp_ms: i64) -> String {
    transcript_datetime(timestamp_ms).format("%B %-d, %Y").to_string()
}

fn format_transcript_time(timestamp_ms: i64) -> String {
    transcript_datetime(timestamp_ms).format("%H:%M").to_string()
}

/// Chunk every section and embed every chunk. Whitespace-only chunks are
/// discarded. Any embedding failure aborts the whole batch before the store
/// is touched.
fn prepare_chunks(
    embedder: &dyn EmbeddingProvider,
    sections: &[chunker::Section],
    default_valid_at: Option<&str>,
    result: &mut IngestResult,
) -> Result<Vec<PreparedChunk>> {
    let mut prepared = Vec::new();

    for section in sections {
        let valid_at = section
            .valid_at
            .clone()
            .or_else(|| default_valid_at.map(str::to_string));

        let chunks = chunk_section(section, MAX_SECTION_WORDS);
        result.chunks_created += chunks.len();
        if chunks.len() > 1 {
            result.sub_chunks_created += chunks.len() - 1;
        }

        for mut chunk in chunks {
            if chunk.text.trim().is_empty() {
                result.chunks_created -= 1;
                continue;
            }
            chunk.valid_at = valid_at.clone();

            let embedding = embedder
                .embed(&chunk.text)
                .with_context(|| format!("failed to embed section {:?}", chunk.section_title))?;
            prepared.push(PreparedChunk { chunk, embedding });
        }
    }

    Ok(prepared)
}

/// Replace all chunks stored under `source_file` with `prepared`.
///
/// Deletes and chunk inserts share one transaction; vector inserts follow
/// the commit because vec0 writes do not reliably compose with an outer
/// transaction. Returns the number of chunk rows deleted.
fn write_chunks(
    conn: &mut Connection,
    source_file: &str,
    prepared: &[PreparedChunk],
) -> Result<i64> {
    let ingested_at = Utc::now().to_rfc3339();

    let tx = conn.transaction().context("begin ingest transaction")?;

    tx.execute(
        "DELETE FROM vec_chunks WHERE chunk_id IN (SELECT id FROM chunks WHERE source_file = ?1)",
        params![source_file],
    )?;
    let deleted = tx.execute("DELETE FROM chunks WHERE source_file = ?1", params![source_file])?;

    let mut chunk_ids = Vec::with_capacity(prepared.len());
    {
        let mut stmt = tx.prepare(
            "INSERT INTO chunks \
             (text, source_file, section_title, header_level, parent_title, \
              section_sequence, chunk_sequence, chunk_total, valid_at, ingested_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        )?;
        for pc in prepared {
            stmt.execute(params![
                pc.chunk.text,
                source_file,
                pc.chunk.section_title,
                pc.chunk.header_level,
                pc.chunk.parent_title,
                pc.chunk.section_sequence,
                pc.chunk.chunk_sequence,
                pc.chunk.chunk_total,
                pc.chunk.valid_at,
                ingested_at,
            ])?;
            chunk_ids.push(tx.last_insert_rowid());
        }
    }

    tx.commit().context("commit ingest transaction")?;

    for (chunk_id, pc) in chunk_ids.iter().zip(prepared) {
        conn.execute(
            "INSERT INTO vec_chunks (chunk_id, embedding) VALUES (?1, ?2)",
            params![chunk_id, db::embedding_to_bytes(&pc.embedding)],
        )
        .with_context(|| format!("failed to insert vector for chunk {chunk_id}"))?;
    }

    Ok(deleted as i64)
}
