//! OpenCode session source.
//!
//! OpenCode keeps conversations in a SQLite database (`session`, `message`,
//! and `part` tables) under `~/.local/share/opencode/`. The tailer opens it
//! read-only and treats message rows whose parts have not landed yet as
//! not-yet-loadable.

use anyhow::{Context, Result};
use rusqlite::{params, Connection, OpenFlags};
use serde::Deserialize;
use std::path::PathBuf;

use super::noise::{strip_noise, MIN_MESSAGE_CHARS};
use super::{SessionInfo, SessionSource};
use crate::ingest::messages::TranscriptMessage;

pub struct OpenCodeSource {
    db: Connection,
    user_alias: String,
    assistant_alias: String,
}

#[derive(Deserialize)]
struct MessageData {
    #[serde(default)]
    role: String,
}

#[derive(Deserialize)]
struct PartData {
    #[serde(default, rename = "type")]
    part_type: String,
    #[serde(default)]
    text: String,
}

/// `~/.local/share/opencode/opencode.db`
pub fn default_db_path() -> PathBuf {
    dirs::home_dir()
        .expect("home directory must exist")
        .join(".local")
        .join("share")
        .join("opencode")
        .join("opencode.db")
}

impl OpenCodeSource {
    pub fn open(path: PathBuf, user_alias: &str, assistant_alias: &str) -> Result<Self> {
        let db = Connection::open_with_flags(
            &path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .with_context(|| format!("failed to open OpenCode db at {}", path.display()))?;

        Ok(Self {
            db,
            user_alias: user_alias.to_string(),
            assistant_alias: assistant_alias.to_string(),
        })
    }
}

impl SessionSource for OpenCodeSource {
    fn scheme(&self) -> &'static str {
        "oc"
    }

    fn sessions(&self) -> Result<Vec<SessionInfo>> {
        let mut stmt = self.db.prepare(
            "SELECT id, slug, title, time_updated \
             FROM session \
             WHERE parent_id IS NULL \
             ORDER BY time_updated DESC",
        )?;

        let sessions = stmt
            .query_map([], |row| {
                let slug: Option<String> = row.get(1)?;
                Ok(SessionInfo {
                    id: row.get(0)?,
                    title: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
                    subtitle: slug.unwrap_or_else(|| "(no slug)".into()),
                    updated_ms: row.get(3)?,
                })
            })?
            .collect::<std::result::Result<_, _>>()
            .context("failed to list OpenCode sessions")?;

        Ok(sessions)
    }

    fn message_ids(&self, session: &SessionInfo) -> Result<Vec<String>> {
        let mut stmt = self.db.prepare(
            "SELECT id FROM message WHERE session_id = ?1 ORDER BY time_created",
        )?;
        let ids = stmt
            .query_map(params![session.id], |row| row.get(0))?
            .collect::<std::result::Result<_, _>>()
            .context("failed to list OpenCode messages")?;
        Ok(ids)
    }

    fn load_message(&self, session: &SessionInfo, id: &str) -> Result<Option<TranscriptMessage>> {
        let (data, time_created): (String, i64) = self.db.query_row(
            "SELECT data, time_created FROM message WHERE id = ?1 AND session_id = ?2",
            params![id, session.id],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;

        let message: MessageData =
            serde_json::from_str(&data).context("failed to parse message data")?;

        let mut stmt = self.db.prepare(
            "SELECT data FROM part \
             WHERE message_id = ?1 AND session_id = ?2 \
             ORDER BY time_created",
        )?;
        let parts: Vec<String> = stmt
            .query_map(params![id, session.id], |row| row.get(0))?
            .collect::<std::result::Result<_, _>>()?;

        let mut texts = Vec::new();
        for raw in parts {
            let Ok(part) = serde_json::from_str::<PartData>(&raw) else {
                continue;
            };
            if part.part_type == "text" && !part.text.is_empty() {
                texts.push(part.text);
            }
        }

        if texts.is_empty() {
            return Ok(None);
        }

        let cleaned = strip_noise(&texts.join("\n"));
        if cleaned.len() < MIN_MESSAGE_CHARS {
            return Ok(None);
        }

        let is_user = message.role != "assistant";
        let role = if is_user {
            self.user_alias.clone()
        } else {
            self.assistant_alias.clone()
        };

        Ok(Some(TranscriptMessage {
            message_id: id.to_string(),
            session_id: session.id.clone(),
            role,
            timestamp_ms: time_created,
            text: cleaned,
            is_user,
        }))
    }
}
