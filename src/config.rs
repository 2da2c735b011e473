use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::alias::AliasTable;

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct MnemeConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub embedding: EmbeddingConfig,
    pub watch: WatchConfig,
    /// Entity alias groups in `a1=n1,n2;a2=n3,n4` form.
    pub alias_table: String,
    /// Parsed form of `alias_table`, built during [`MnemeConfig::load`].
    #[serde(skip)]
    pub aliases: AliasTable,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub log_level: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StorageConfig {
    pub db_path: String,
    /// Root directory absolute `file_path` arguments must stay under.
    /// Empty means absolute paths are rejected outright.
    pub ingest_root: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// `host:port` of the Ollama-compatible embedding service.
    pub host: String,
    pub model: String,
    pub dimension: usize,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct WatchConfig {
    pub batch_size: usize,
    pub poll_interval_secs: u64,
    pub user_alias: String,
    pub assistant_alias: String,
}

impl Default for MnemeConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            storage: StorageConfig::default(),
            embedding: EmbeddingConfig::default(),
            watch: WatchConfig::default(),
            alias_table: String::new(),
            aliases: AliasTable::default(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            log_level: "info".into(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: "mneme.db".into(),
            ingest_root: String::new(),
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            host: "localhost:11434".into(),
            model: "qwen3-embedding:0.6b".into(),
            dimension: 1024,
        }
    }
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            batch_size: 6,
            poll_interval_secs: 3,
            user_alias: "User".into(),
            assistant_alias: "Assistant".into(),
        }
    }
}

/// Returns `~/.mneme/`
pub fn default_mneme_dir() -> PathBuf {
    dirs::home_dir()
        .expect("home directory must exist")
        .join(".mneme")
}

/// Returns the default config file path: `~/.mneme/config.toml`
pub fn default_config_path() -> PathBuf {
    default_mneme_dir().join("config.toml")
}

impl MnemeConfig {
    /// Load config from the TOML file (if it exists) then apply env var overrides.
    pub fn load() -> Result<Self> {
        Self::load_from(default_config_path())
    }

    /// Load from a specific path, then apply env var overrides.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            let contents =
                std::fs::read_to_string(path).context("failed to read config file")?;
            toml::from_str(&contents).context("failed to parse config TOML")?
        } else {
            info!("no config file at {}, using defaults", path.display());
            MnemeConfig::default()
        };

        config.apply_env_overrides();
        config.aliases = AliasTable::parse(&config.alias_table);
        Ok(config)
    }

    /// Apply environment variable overrides.
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("EMBEDDING_HOST") {
            self.embedding.host = val;
        }
        if let Ok(val) = std::env::var("STORE_PATH") {
            self.storage.db_path = val;
        }
        if let Ok(val) = std::env::var("EMBED_MODEL") {
            self.embedding.model = val;
        }
        if let Ok(val) = std::env::var("EMBED_DIM") {
            // Invalid or non-positive values keep the configured dimension.
            if let Ok(dim) = val.parse::<usize>() {
                if dim > 0 {
                    self.embedding.dimension = dim;
                }
            }
        }
        if let Ok(val) = std::env::var("USER_ALIAS") {
            self.watch.user_alias = val;
        }
        if let Ok(val) = std::env::var("ASSISTANT_ALIAS") {
            self.watch.assistant_alias = val;
        }
        if let Ok(val) = std::env::var("ALIAS_TABLE") {
            self.alias_table = val;
        }
        if let Ok(val) = std::env::var("INGEST_ROOT") {
            self.storage.ingest_root = val;
        }
        if let Ok(val) = std::env::var("MNEME_LOG_LEVEL") {
            self.server.log_level = val;
        }
    }

    /// Resolve the database path, expanding `~` if needed.
    pub fn resolved_db_path(&self) -> PathBuf {
        expand_tilde(&self.storage.db_path)
    }
}

pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        dirs::home_dir()
            .expect("home directory must exist")
            .join(rest)
    } else {
        PathBuf::from(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Mutex, OnceLock};

    /// Tests that touch process env must not interleave.
    fn env_lock() -> std::sync::MutexGuard<'static, ()> {
        static LOCK: OnceLock<Mutex<()>> = OnceLock::new();
        LOCK.get_or_init(|| Mutex::new(()))
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    #[test]
    fn default_config_is_valid() {
        let config = MnemeConfig::default();
        assert_eq!(config.embedding.host, "localhost:11434");
        assert_eq!(config.embedding.model, "qwen3-embedding:0.6b");
        assert_eq!(config.embedding.dimension, 1024);
        assert_eq!(config.storage.db_path, "mneme.db");
        assert_eq!(config.watch.batch_size, 6);
        assert_eq!(config.watch.poll_interval_secs, 3);
    }

    #[test]
    fn parse_toml_config() {
        let toml_str = r#"
[server]
log_level = "debug"

[storage]
db_path = "/tmp/test.db"

[embedding]
host = "127.0.0.1:9999"
dimension = 768

[watch]
batch_size = 4
"#;
        let config: MnemeConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.server.log_level, "debug");
        assert_eq!(config.storage.db_path, "/tmp/test.db");
        assert_eq!(config.embedding.host, "127.0.0.1:9999");
        assert_eq!(config.embedding.dimension, 768);
        assert_eq!(config.watch.batch_size, 4);
        // defaults still apply for unset fields
        assert_eq!(config.embedding.model, "qwen3-embedding:0.6b");
        assert_eq!(config.watch.poll_interval_secs, 3);
    }

    #[test]
    fn env_overrides_apply() {
        let _guard = env_lock();
        let mut config = MnemeConfig::default();
        std::env::set_var("EMBEDDING_HOST", "10.0.0.5:11434");
        std::env::set_var("STORE_PATH", "/tmp/override.db");
        std::env::set_var("EMBED_DIM", "768");
        std::env::set_var("USER_ALIAS", "Max");

        config.apply_env_overrides();

        assert_eq!(config.embedding.host, "10.0.0.5:11434");
        assert_eq!(config.storage.db_path, "/tmp/override.db");
        assert_eq!(config.embedding.dimension, 768);
        assert_eq!(config.watch.user_alias, "Max");

        std::env::remove_var("EMBEDDING_HOST");
        std::env::remove_var("STORE_PATH");
        std::env::remove_var("EMBED_DIM");
        std::env::remove_var("USER_ALIAS");
    }

    #[test]
    fn invalid_embed_dim_is_ignored() {
        let _guard = env_lock();
        let mut config = MnemeConfig::default();
        std::env::set_var("EMBED_DIM", "not-a-number");
        config.apply_env_overrides();
        assert_eq!(config.embedding.dimension, 1024);
        std::env::remove_var("EMBED_DIM");
    }
}
