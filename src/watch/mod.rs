//! Live-session tailer.
//!
//! A single-threaded cooperative loop that polls an external conversation
//! store for new messages, batches them, and feeds the ingestion engine
//! under a synthetic `watch-<scheme>://<session>/batch-<n>` source. The two
//! provider backends (OpenCode's SQLite store, Claude Code's JSONL
//! transcripts) plug in behind [`SessionSource`].

pub mod claude;
pub mod noise;
pub mod opencode;

use anyhow::{Context, Result};
use rusqlite::{params, Connection};
use std::collections::{HashMap, HashSet};
use std::process::{Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use crate::config::EmbeddingConfig;
use crate::embedding::ollama::OllamaClient;
use crate::embedding::{self, EmbeddingProvider};
use crate::ingest;
use crate::ingest::messages::TranscriptMessage;

/// A message id that keeps failing to load is abandoned after this many polls.
const MAX_LOAD_RETRIES: u32 = 60;

/// How often the loop checks the stop flag while sleeping between polls.
const STOP_CHECK_INTERVAL: Duration = Duration::from_millis(250);

/// A session as presented in the picker.
#[derive(Debug, Clone)]
pub struct SessionInfo {
    pub id: String,
    pub title: String,
    /// Secondary label: slug, message count, whatever the provider has.
    pub subtitle: String,
    pub updated_ms: i64,
}

/// A provider-specific conversation store the tailer can poll.
pub trait SessionSource {
    /// Short provider tag used in the synthetic source scheme.
    fn scheme(&self) -> &'static str;

    /// All top-level sessions, newest first.
    fn sessions(&self) -> Result<Vec<SessionInfo>>;

    /// Every message id currently present for the session, in order.
    fn message_ids(&self, session: &SessionInfo) -> Result<Vec<String>>;

    /// Load and clean one message. `Ok(None)` means the message exists but
    /// has no admissible text yet (still being written, or pure noise).
    fn load_message(&self, session: &SessionInfo, id: &str) -> Result<Option<TranscriptMessage>>;
}

/// The next unused batch number for a session, resumed from the highest one
/// already in the store.
pub fn next_batch_number(conn: &Connection, prefix: &str) -> Result<i64> {
    let max: Option<i64> = conn
        .query_row(
            "SELECT MAX(CAST(REPLACE(source_file, ?1, '') AS INTEGER)) \
             FROM chunks WHERE source_file LIKE ?2",
            params![prefix, format!("{prefix}%")],
            |row| row.get(0),
        )
        .context("failed to query batch numbers")?;
    Ok(max.map_or(0, |m| m + 1))
}

pub struct Tailer<'a> {
    conn: &'a mut Connection,
    embedder: &'a dyn EmbeddingProvider,
    source: &'a dyn SessionSource,
    session: SessionInfo,
    batch_size: usize,
    poll_interval: Duration,

    done: HashSet<String>,
    retry: HashMap<String, u32>,
    pending: Vec<TranscriptMessage>,
    batch_num: i64,
}

impl<'a> Tailer<'a> {
    /// Seeds the skip set with every message id currently present, so only
    /// messages that arrive after startup are ingested, and resumes batch
    /// numbering from the store.
    pub fn new(
        conn: &'a mut Connection,
        embedder: &'a dyn EmbeddingProvider,
        source: &'a dyn SessionSource,
        session: SessionInfo,
        batch_size: usize,
        poll_interval: Duration,
    ) -> Result<Self> {
        let prefix = format!("watch-{}://{}/batch-", source.scheme(), session.id);
        let batch_num = next_batch_number(conn, &prefix)?;

        let existing = source.message_ids(&session)?;
        let done: HashSet<String> = existing.into_iter().collect();
        println!(
            "  Skipping {} existing messages. Watching for new...",
            done.len()
        );

        Ok(Self {
            conn,
            embedder,
            source,
            session,
            batch_size,
            poll_interval,
            done,
            retry: HashMap::new(),
            pending: Vec::new(),
            batch_num,
        })
    }

    fn batch_source(&self) -> String {
        format!(
            "watch-{}://{}/batch-{}",
            self.source.scheme(),
            self.session.id,
            self.batch_num
        )
    }

    /// One poll: admit new messages, flush if the batch is full. Returns
    /// the number of messages admitted. Transient source errors skip the
    /// tick rather than failing the loop.
    pub fn poll_once(&mut self) -> Result<usize> {
        let ids = match self.source.message_ids(&self.session) {
            Ok(ids) => ids,
            Err(err) => {
                tracing::debug!(error = %err, "session source unavailable this tick");
                return Ok(0);
            }
        };

        let mut admitted = 0usize;
        for id in ids {
            if self.done.contains(&id) {
                continue;
            }

            match self.source.load_message(&self.session, &id) {
                Ok(Some(message)) => {
                    self.done.insert(id.clone());
                    self.retry.remove(&id);
                    println!(
                        "  {} [{}] {}",
                        message.role,
                        chrono::DateTime::from_timestamp_millis(message.timestamp_ms)
                            .unwrap_or(chrono::DateTime::UNIX_EPOCH)
                            .with_timezone(&chrono::Local)
                            .format("%H:%M:%S"),
                        message.text
                    );
                    self.pending.push(message);
                    admitted += 1;
                    if self.pending.len() >= self.batch_size {
                        self.flush()?;
                    }
                }
                Ok(None) | Err(_) => {
                    let attempts = self.retry.entry(id.clone()).or_insert(0);
                    *attempts += 1;
                    if *attempts > MAX_LOAD_RETRIES {
                        self.done.insert(id.clone());
                        self.retry.remove(&id);
                    }
                }
            }
        }

        Ok(admitted)
    }

    /// Commit whatever is pending as the next batch. A failed ingest keeps
    /// the pending buffer for the next attempt.
    pub fn flush(&mut self) -> Result<()> {
        if self.pending.is_empty() {
            return Ok(());
        }

        let source = self.batch_source();
        match ingest::ingest_batch(
            self.conn,
            self.embedder,
            &source,
            &self.pending,
            &self.session.title,
        ) {
            Ok(result) => {
                println!(
                    "  Ingested {} messages as batch {} ({} chunks)",
                    self.pending.len(),
                    self.batch_num,
                    result.chunks_created
                );
                self.batch_num += 1;
                self.pending.clear();
                Ok(())
            }
            Err(err) => {
                tracing::error!(source = %source, error = %err, "batch ingest failed");
                println!("  Ingest error: {err:#}");
                Ok(())
            }
        }
    }

    /// Poll until `stop` is set, then flush anything pending so nothing is
    /// lost on interrupt.
    pub fn run(&mut self, stop: &AtomicBool) -> Result<()> {
        loop {
            if stop.load(Ordering::SeqCst) {
                break;
            }
            self.poll_once()?;

            let deadline = Instant::now() + self.poll_interval;
            while Instant::now() < deadline {
                if stop.load(Ordering::SeqCst) {
                    break;
                }
                std::thread::sleep(STOP_CHECK_INTERVAL.min(
                    deadline.saturating_duration_since(Instant::now()),
                ));
            }
        }

        if !self.pending.is_empty() {
            println!();
            println!("  Flushing {} pending messages...", self.pending.len());
            self.flush()?;
        }
        println!();
        println!("  Stopped.");
        Ok(())
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}

/// Make sure the embedding service, model, and dimension are ready before
/// tailing starts.
///
/// An unreachable service is started as a child process in its own process
/// group (so it outlives the tailer) and polled every 500 ms for up to
/// 15 s. A missing model is pulled through the provider CLI. The final
/// dimension-validating embed doubles as model warmup.
pub fn preflight(config: &EmbeddingConfig) -> Result<()> {
    let client = OllamaClient::new(&config.host, &config.model, config.dimension)?;

    if client.healthy() {
        println!("  [ok]   Ollama  running");
    } else {
        println!("  [..]   Ollama  starting...");
        spawn_ollama_serve()?;

        let deadline = Instant::now() + Duration::from_secs(15);
        let mut started = false;
        while Instant::now() < deadline {
            if client.healthy() {
                started = true;
                break;
            }
            std::thread::sleep(Duration::from_millis(500));
        }
        if !started {
            println!("  [fail] Ollama  timeout");
            anyhow::bail!("ollama did not start within 15s");
        }
        println!("  [ok]   Ollama  started");
    }

    let model_found = client
        .list_models()
        .map(|models| models.iter().any(|m| m == &config.model))
        .unwrap_or(false);

    if model_found {
        println!("  [ok]   Model   {}", config.model);
    } else {
        println!("  [..]   Model   pulling {}...", config.model);
        let status = Command::new("ollama")
            .args(["pull", &config.model])
            .status()
            .context("failed to run ollama pull")?;
        if !status.success() {
            println!("  [fail] Model   pull failed");
            anyhow::bail!("ollama pull {} failed", config.model);
        }
        println!("  [ok]   Model   {} pulled", config.model);
    }

    embedding::validate_dimension(&client).context("warmup embed failed")?;
    println!("  [ok]   Warmup  model loaded ({} dims)", config.dimension);

    Ok(())
}

/// Start `ollama serve` detached. The child gets its own process group so
/// the tailer's interrupt does not take it down.
fn spawn_ollama_serve() -> Result<()> {
    let mut command = Command::new("ollama");
    command.arg("serve").stdout(Stdio::null()).stderr(Stdio::null());

    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        command.process_group(0);
    }

    command.spawn().context("failed to start ollama serve")?;
    Ok(())
}
