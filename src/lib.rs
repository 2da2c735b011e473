//! Mneme — a persistent, local semantic memory store.
//!
//! Markdown notes and live assistant/user transcripts are split into
//! semantically coherent chunks, embedded through an Ollama-compatible
//! service, and persisted in a single SQLite database with a
//! [sqlite-vec](https://github.com/asg017/sqlite-vec) cosine index.
//! Retrieval is by meaning (with optional temporal filtering and
//! chronological ordering) or by entity mention with alias resolution.
//!
//! # Architecture
//!
//! - **Storage**: SQLite with sqlite-vec for vector search; one `chunks`
//!   table plus a parallel `vec_chunks` index, and the same pair for raw
//!   session messages
//! - **Embeddings**: external Ollama-compatible HTTP service
//! - **Transport**: MCP over stdio, plus a plain CLI
//! - **Live capture**: a polling tailer over OpenCode and Claude Code
//!   session stores
//!
//! # Modules
//!
//! - [`config`] — configuration from TOML and environment variables
//! - [`db`] — SQLite initialization, schema, and integrity sweeps
//! - [`embedding`] — the embedding provider trait and the Ollama client
//! - [`ingest`] — chunker and the embed-and-persist pipeline
//! - [`search`] / [`history`] — the two retrieval paths
//! - [`watch`] — the live-session tailer
//! - [`tools`] / [`server`] — the MCP tool surface

pub mod alias;
pub mod cli;
pub mod config;
pub mod db;
pub mod embedding;
pub mod history;
pub mod ingest;
pub mod search;
pub mod server;
pub mod status;
pub mod tools;
pub mod watch;
