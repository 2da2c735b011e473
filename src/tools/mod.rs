pub mod history;
pub mod ingest;
pub mod search;
pub mod status;

use anyhow::{bail, Result};
use history::HistoryParams;
use ingest::IngestParams;
use rmcp::handler::server::tool::ToolRouter;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::{tool, tool_handler, tool_router, ServerHandler};
use rusqlite::Connection;
use search::SearchParams;
use status::StatusParams;
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::config::MnemeConfig;
use crate::embedding::EmbeddingProvider;

/// The Mneme MCP tool handler. Holds shared state (db connection, embedding
/// provider, config) and exposes all tools via the `#[tool_router]` macro.
#[derive(Clone)]
pub struct MnemeTools {
    tool_router: ToolRouter<Self>,
    db: Arc<Mutex<Connection>>,
    embedding: Arc<dyn EmbeddingProvider>,
    config: Arc<MnemeConfig>,
}

#[tool_router]
impl MnemeTools {
    pub fn new(
        db: Arc<Mutex<Connection>>,
        embedding: Arc<dyn EmbeddingProvider>,
        config: Arc<MnemeConfig>,
    ) -> Self {
        Self {
            tool_router: Self::tool_router(),
            db,
            embedding,
            config,
        }
    }

    /// Search chunks by semantic similarity.
    #[tool(
        description = "Search memories by semantic similarity. Returns raw chunks sorted chronologically; timeless chunks come first. Optional as_of excludes chunks dated after the cutoff."
    )]
    async fn search(
        &self,
        Parameters(params): Parameters<SearchParams>,
    ) -> Result<String, String> {
        if params.query.trim().is_empty() {
            return Err("query must not be empty".into());
        }
        let limit = match params.limit {
            Some(l) if l > 0 => l as usize,
            _ => 10,
        };

        tracing::info!(query = %params.query, limit, as_of = ?params.as_of, "search called");

        let db = Arc::clone(&self.db);
        let embedding = Arc::clone(&self.embedding);
        let query = params.query;
        let as_of = params.as_of;

        let results = tokio::task::spawn_blocking(move || -> Result<_> {
            // Embed before taking the connection lock.
            let query_embedding = embedding.embed(&query)?;
            let conn = db
                .lock()
                .map_err(|e| anyhow::anyhow!("db lock poisoned: {e}"))?;
            crate::search::search_by_vector(&conn, &query_embedding, limit, as_of.as_deref())
        })
        .await
        .map_err(|e| format!("search task failed: {e}"))?
        .map_err(|e| format!("search failed: {e}"))?;

        serde_json::to_string(&results).map_err(|e| format!("serialization failed: {e}"))
    }

    /// Ingest a markdown file into the store.
    #[tool(description = "Ingest a markdown file into the memory store.")]
    async fn ingest(
        &self,
        Parameters(params): Parameters<IngestParams>,
    ) -> Result<String, String> {
        validate_ingest_path(&params.file_path, &self.config.storage.ingest_root)
            .map_err(|e| e.to_string())?;

        tracing::info!(file = %params.file_path, valid_at = ?params.valid_at, "ingest called");

        let db = Arc::clone(&self.db);
        let embedding = Arc::clone(&self.embedding);
        let file_path = params.file_path;
        let valid_at = params.valid_at;

        let result = tokio::task::spawn_blocking(move || -> Result<_> {
            let mut conn = db
                .lock()
                .map_err(|e| anyhow::anyhow!("db lock poisoned: {e}"))?;
            crate::ingest::ingest_file(
                &mut conn,
                embedding.as_ref(),
                &file_path,
                valid_at.as_deref(),
            )
        })
        .await
        .map_err(|e| format!("ingest task failed: {e}"))?
        .map_err(|e| format!("ingest failed: {e}"))?;

        serde_json::to_string(&result).map_err(|e| format!("serialization failed: {e}"))
    }

    /// Chronological history of an entity across all chunks.
    #[tool(
        description = "Fetch chronological history for an entity. Known aliases are searched as well; timeless chunks come first."
    )]
    async fn history(
        &self,
        Parameters(params): Parameters<HistoryParams>,
    ) -> Result<String, String> {
        if params.entity.trim().is_empty() {
            return Err("entity must not be empty".into());
        }
        let limit = params.limit.unwrap_or(0);

        tracing::info!(entity = %params.entity, limit, "history called");

        let db = Arc::clone(&self.db);
        let config = Arc::clone(&self.config);
        let entity = params.entity;

        let results = tokio::task::spawn_blocking(move || -> Result<_> {
            let conn = db
                .lock()
                .map_err(|e| anyhow::anyhow!("db lock poisoned: {e}"))?;
            crate::history::history(&conn, &config.aliases, &entity, limit)
        })
        .await
        .map_err(|e| format!("history task failed: {e}"))?
        .map_err(|e| format!("history failed: {e}"))?;

        serde_json::to_string(&results).map_err(|e| format!("serialization failed: {e}"))
    }

    /// System status and health details.
    #[tool(description = "Get system status and health details.")]
    async fn status(
        &self,
        Parameters(_params): Parameters<StatusParams>,
    ) -> Result<String, String> {
        let db = Arc::clone(&self.db);
        let embedding = Arc::clone(&self.embedding);
        let model = self.config.embedding.model.clone();

        let info = tokio::task::spawn_blocking(move || -> Result<_> {
            let conn = db
                .lock()
                .map_err(|e| anyhow::anyhow!("db lock poisoned: {e}"))?;
            Ok(crate::status::gather(&conn, embedding.as_ref(), &model))
        })
        .await
        .map_err(|e| format!("status task failed: {e}"))?
        .map_err(|e: anyhow::Error| format!("status failed: {e}"))?;

        serde_json::to_string(&info).map_err(|e| format!("serialization failed: {e}"))
    }
}

#[tool_handler]
impl ServerHandler for MnemeTools {
    fn get_info(&self) -> rmcp::model::ServerInfo {
        rmcp::model::ServerInfo {
            instructions: Some(
                "Mneme is a personal memory store. Use search to find chunks by \
                 meaning, history for chronological entity mentions, ingest to add \
                 markdown files, and status for health details."
                    .into(),
            ),
            capabilities: rmcp::model::ServerCapabilities::builder()
                .enable_tools()
                .build(),
            ..Default::default()
        }
    }
}

/// Lexically clean a path: drop `.`, fold `..` against a preceding normal
/// component, swallow `..` at the root. Leading unresolvable `..` survive.
fn clean_path(path: &Path) -> PathBuf {
    let mut parts: Vec<Component> = Vec::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match parts.last() {
                Some(Component::Normal(_)) => {
                    parts.pop();
                }
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => parts.push(component),
            },
            other => parts.push(other),
        }
    }
    parts.iter().collect()
}

/// Path safety for the `ingest` tool. The path is cleaned first, so only
/// traversal that survives cleaning is rejected: a cleaned relative path
/// must not climb upward, and a cleaned absolute path must lie inside the
/// configured root.
pub fn validate_ingest_path(file_path: &str, ingest_root: &str) -> Result<()> {
    let cleaned = clean_path(Path::new(file_path));

    if cleaned.is_absolute() {
        if ingest_root.is_empty() {
            bail!("absolute paths require INGEST_ROOT to be set");
        }
        let root = crate::config::expand_tilde(ingest_root);
        if !cleaned.starts_with(&root) {
            bail!(
                "path {file_path:?} is outside allowed root {:?}",
                root.display()
            );
        }
    } else if cleaned
        .components()
        .any(|c| matches!(c, Component::ParentDir))
    {
        bail!("path {file_path:?} contains directory traversal");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::validate_ingest_path;

    #[test]
    fn relative_paths_without_traversal_pass() {
        validate_ingest_path("notes/today.md", "").unwrap();
        validate_ingest_path("today.md", "").unwrap();
    }

    #[test]
    fn self_canceling_traversal_is_cleaned_away() {
        validate_ingest_path("notes/../today.md", "").unwrap();
        validate_ingest_path("./notes/sub/../today.md", "").unwrap();
    }

    #[test]
    fn surviving_traversal_is_rejected() {
        assert!(validate_ingest_path("../secrets.md", "").is_err());
        assert!(validate_ingest_path("notes/../../etc/passwd", "/allowed").is_err());
    }

    #[test]
    fn absolute_requires_root() {
        let err = validate_ingest_path("/etc/notes.md", "").unwrap_err();
        assert!(err.to_string().contains("INGEST_ROOT"));
    }

    #[test]
    fn absolute_inside_root_passes() {
        validate_ingest_path("/data/notes/today.md", "/data/notes").unwrap();
        validate_ingest_path("/data/notes", "/data/notes").unwrap();
        // Traversal that cleans back inside the root is fine
        validate_ingest_path("/data/notes/../notes/x.md", "/data/notes").unwrap();
    }

    #[test]
    fn absolute_outside_root_is_rejected() {
        assert!(validate_ingest_path("/data/other/x.md", "/data/notes").is_err());
        // Cleaning resolves the escape before the prefix check
        assert!(validate_ingest_path("/data/notes/../other/x.md", "/data/notes").is_err());
        // Prefix match must be component-wise, not string-wise
        assert!(validate_ingest_path("/data/notes-evil/x.md", "/data/notes").is_err());
    }
}
