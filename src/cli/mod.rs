//! Terminal subcommand implementations.

use anyhow::{bail, Context, Result};
use std::io::{BufRead, Write};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::config::MnemeConfig;
use crate::db;
use crate::embedding::ollama::OllamaClient;
use crate::embedding::{self, EmbeddingProvider};
use crate::ingest::chunker::{parse_markdown, MAX_SECTION_WORDS};
use crate::watch::{self, claude, opencode, SessionInfo, SessionSource, Tailer};

fn truncate_chars(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        let mut out: String = text.chars().take(max).collect();
        out.push_str("...");
        out
    }
}

fn open_store(config: &MnemeConfig) -> Result<rusqlite::Connection> {
    db::open_database(config.resolved_db_path(), config.embedding.dimension)
}

fn embedding_client(config: &MnemeConfig) -> Result<OllamaClient> {
    OllamaClient::new(
        &config.embedding.host,
        &config.embedding.model,
        config.embedding.dimension,
    )
}

/// `ingest`: preview the parsed sections, confirm, then run the pipeline.
pub fn run_ingest(config: &MnemeConfig, file: &Path, valid_at: Option<&str>) -> Result<()> {
    let content = std::fs::read_to_string(file)
        .with_context(|| format!("failed to read {}", file.display()))?;
    let sections = parse_markdown(&content);

    println!("Sections found in {}:", file.display());
    for section in &sections {
        let word_count = section.content.split_whitespace().count();
        let marker = if word_count > MAX_SECTION_WORDS {
            " [will be sub-chunked]"
        } else {
            ""
        };
        println!(
            "  {}. [{}] \"{}\" ({} words){}",
            section.sequence,
            "#".repeat(section.header_level as usize),
            section.title,
            word_count,
            marker
        );
    }

    print!("\nProceed? [y/n]: ");
    std::io::stdout().flush()?;
    let mut response = String::new();
    std::io::stdin().lock().read_line(&mut response)?;
    let response = response.trim().to_lowercase();
    if response != "y" && response != "yes" {
        println!("Cancelled.");
        return Ok(());
    }

    let mut conn = open_store(config)?;
    let client = embedding_client(config)?;
    if client.healthy() {
        embedding::validate_dimension(&client)?;
    }

    let result = crate::ingest::ingest_file(&mut conn, &client, file, valid_at)?;

    println!("\nIngest complete:");
    println!("  Sections:   {}", result.sections_found);
    println!("  Chunks:     {}", result.chunks_created);
    println!("  Sub-chunks: {}", result.sub_chunks_created);
    println!("  Replaced:   {}", result.deleted_chunks);
    Ok(())
}

/// `search`: raw chunk debug output, chronologically ordered.
pub fn run_search(
    config: &MnemeConfig,
    query: &str,
    limit: usize,
    as_of: Option<&str>,
) -> Result<()> {
    let conn = open_store(config)?;
    let client = embedding_client(config)?;

    let results = crate::search::search(&conn, &client, query, limit, as_of)?;

    for result in &results {
        let valid_at = result.valid_at.as_deref().unwrap_or("timeless");
        println!(
            "[{:.4}] [{}] {} — {}",
            result.distance, valid_at, result.source_file, result.section_title
        );
        println!("{}\n", truncate_chars(&result.text, 200));
    }
    Ok(())
}

/// `history`: chronological entity mentions.
pub fn run_history(config: &MnemeConfig, entity: &str, limit: i64) -> Result<()> {
    let conn = open_store(config)?;

    let results = crate::history::history(&conn, &config.aliases, entity, limit)?;

    for result in &results {
        let valid_at = result.valid_at.as_deref().unwrap_or("timeless");
        println!(
            "[{}] {} — {}",
            valid_at, result.source_file, result.section_title
        );
        println!("{}", truncate_chars(&result.text, 300));
        println!("---");
    }
    Ok(())
}

/// `status`: system health summary.
pub fn run_status(config: &MnemeConfig) -> Result<()> {
    let conn = open_store(config)?;
    let client = embedding_client(config)?;

    let status = crate::status::gather(&conn, &client, &config.embedding.model);

    println!("Mneme Status");
    println!("─────────────");
    println!(
        "Ollama:      {} ({})",
        if status.ollama_healthy {
            "healthy"
        } else {
            "unhealthy"
        },
        config.embedding.host
    );
    println!("Embed Model: {}", status.embed_model);
    println!("sqlite-vec:  {}", status.vec_version);
    println!("Chunks:      {}", status.total_chunks);

    let date_range = match (&status.earliest_valid_at, &status.latest_valid_at) {
        (Some(earliest), Some(latest)) => format!("{earliest} → {latest}"),
        (Some(earliest), None) => earliest.clone(),
        _ => "none".to_string(),
    };
    println!("Date Range:  {date_range}");
    Ok(())
}

/// `watch-oc`: tail a live OpenCode session.
pub fn run_watch_oc(config: &MnemeConfig, batch_size: usize, poll_secs: u64) -> Result<()> {
    let source = opencode::OpenCodeSource::open(
        opencode::default_db_path(),
        &config.watch.user_alias,
        &config.watch.assistant_alias,
    )?;
    run_watch(config, &source, batch_size, poll_secs)
}

/// `watch-cc`: tail a live Claude Code session.
pub fn run_watch_cc(config: &MnemeConfig, batch_size: usize, poll_secs: u64) -> Result<()> {
    let base = claude::default_base_path();
    let projects = claude::discover_projects(&base)?;
    if projects.is_empty() {
        bail!("no Claude Code projects found");
    }

    let project = if projects.len() == 1 {
        projects[0].clone()
    } else {
        println!("\n  Claude Code Projects:\n");
        for (i, project) in projects.iter().enumerate() {
            println!("  {}. {}", i + 1, project.replace('-', "/"));
        }
        let choice = prompt_choice("Select project", projects.len())?;
        projects[choice - 1].clone()
    };

    let source = claude::ClaudeCodeSource::new(
        base,
        project,
        &config.watch.user_alias,
        &config.watch.assistant_alias,
    );
    run_watch(config, &source, batch_size, poll_secs)
}

fn run_watch(
    config: &MnemeConfig,
    source: &dyn SessionSource,
    batch_size: usize,
    poll_secs: u64,
) -> Result<()> {
    let sessions = source.sessions()?;
    if sessions.is_empty() {
        bail!("no sessions found");
    }
    let session = pick_session(&sessions)?;

    println!();
    watch::preflight(&config.embedding)?;

    println!();
    println!(
        "  Watching \"{}\" ({})  batch={} poll={}s store={}",
        session.title,
        session.id,
        batch_size,
        poll_secs,
        config.storage.db_path
    );
    println!();

    let mut conn = open_store(config)?;
    let client = embedding_client(config)?;

    let mut tailer = Tailer::new(
        &mut conn,
        &client,
        source,
        session,
        batch_size,
        Duration::from_secs(poll_secs),
    )?;

    // The loop itself is synchronous; the runtime exists only to deliver
    // the interrupt signal into the stop flag.
    let runtime = tokio::runtime::Runtime::new()?;
    let stop = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&stop);
    runtime.spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            flag.store(true, Ordering::SeqCst);
        }
    });

    tailer.run(&stop)
}

/// Show the newest sessions and read a 1-based choice (default 1).
fn pick_session(sessions: &[SessionInfo]) -> Result<SessionInfo> {
    let limit = sessions.len().min(10);

    println!();
    for (i, session) in sessions[..limit].iter().enumerate() {
        let updated = chrono::DateTime::from_timestamp_millis(session.updated_ms)
            .unwrap_or(chrono::DateTime::UNIX_EPOCH)
            .with_timezone(&chrono::Local)
            .format("%b %d, %Y %H:%M");
        println!(
            "  {}. {}  {}  {}",
            i + 1,
            session.title,
            session.subtitle,
            updated
        );
    }
    println!();

    let choice = prompt_choice("Select session", limit)?;
    Ok(sessions[choice - 1].clone())
}

fn prompt_choice(prompt: &str, limit: usize) -> Result<usize> {
    print!("  {prompt} [1]: ");
    std::io::stdout().flush()?;

    let mut input = String::new();
    std::io::stdin().lock().read_line(&mut input)?;
    let input = input.trim();
    if input.is_empty() {
        return Ok(1);
    }

    match input.parse::<usize>() {
        Ok(choice) if choice >= 1 && choice <= limit => Ok(choice),
        _ => bail!("invalid choice: {input}"),
    }
}
