//! Claude Code session source.
//!
//! Claude Code writes one append-only JSONL transcript per session under
//! `~/.claude/projects/<project>/`, indexed by a `sessions-index.json`.
//! Each poll re-reads the transcript; message identity is the line UUID.

use anyhow::{Context, Result};
use chrono::DateTime;
use serde::Deserialize;
use std::path::{Path, PathBuf};

use super::noise::{strip_noise, MIN_MESSAGE_CHARS};
use super::{SessionInfo, SessionSource};
use crate::ingest::messages::TranscriptMessage;

pub struct ClaudeCodeSource {
    base: PathBuf,
    project_dir: String,
    user_alias: String,
    assistant_alias: String,
}

#[derive(Deserialize)]
struct SessionsIndex {
    #[serde(default)]
    entries: Vec<SessionEntry>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SessionEntry {
    #[serde(default)]
    session_id: String,
    #[serde(default)]
    full_path: String,
    #[serde(default)]
    summary: String,
    #[serde(default)]
    first_prompt: String,
    #[serde(default)]
    message_count: i64,
    #[serde(default)]
    modified: String,
    #[serde(default)]
    is_sidechain: bool,
}

#[derive(Deserialize)]
struct JsonlLine {
    #[serde(rename = "type", default)]
    line_type: String,
    #[serde(default)]
    uuid: String,
    #[serde(default)]
    timestamp: String,
    #[serde(default)]
    message: Option<JsonlMessage>,
}

#[derive(Deserialize)]
struct JsonlMessage {
    #[serde(default)]
    content: serde_json::Value,
}

/// `~/.claude`
pub fn default_base_path() -> PathBuf {
    dirs::home_dir()
        .expect("home directory must exist")
        .join(".claude")
}

/// Project directories under `<base>/projects/` that carry a sessions index.
pub fn discover_projects(base: &Path) -> Result<Vec<String>> {
    let projects_dir = base.join("projects");
    let entries = std::fs::read_dir(&projects_dir)
        .with_context(|| format!("failed to read {}", projects_dir.display()))?;

    let mut projects = Vec::new();
    for entry in entries.flatten() {
        if !entry.path().is_dir() {
            continue;
        }
        if entry.path().join("sessions-index.json").exists() {
            projects.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    projects.sort();
    Ok(projects)
}

impl ClaudeCodeSource {
    pub fn new(
        base: PathBuf,
        project_dir: String,
        user_alias: &str,
        assistant_alias: &str,
    ) -> Self {
        Self {
            base,
            project_dir,
            user_alias: user_alias.to_string(),
            assistant_alias: assistant_alias.to_string(),
        }
    }

    fn index_path(&self) -> PathBuf {
        self.base
            .join("projects")
            .join(&self.project_dir)
            .join("sessions-index.json")
    }

    fn transcript_path(&self, session: &SessionInfo) -> Result<PathBuf> {
        let data = std::fs::read_to_string(self.index_path())?;
        let index: SessionsIndex = serde_json::from_str(&data)?;
        index
            .entries
            .iter()
            .find(|e| e.session_id == session.id)
            .map(|e| PathBuf::from(&e.full_path))
            .with_context(|| format!("session {} missing from index", session.id))
    }

    /// All admissible turns in the transcript, in file order, keyed by UUID.
    fn read_transcript(&self, path: &Path) -> Result<Vec<(String, TranscriptMessage)>> {
        let data = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read transcript {}", path.display()))?;

        let mut messages = Vec::new();
        for line in data.lines() {
            let Ok(entry) = serde_json::from_str::<JsonlLine>(line) else {
                continue;
            };
            let is_user = match entry.line_type.as_str() {
                "user" => true,
                "assistant" => false,
                _ => continue,
            };
            if entry.uuid.is_empty() {
                continue;
            }

            let Some(message) = entry.message else {
                continue;
            };
            let text = extract_text(&message.content, is_user);
            let cleaned = strip_noise(&text);
            if cleaned.len() < MIN_MESSAGE_CHARS {
                continue;
            }

            let timestamp_ms = DateTime::parse_from_rfc3339(&entry.timestamp)
                .map(|t| t.timestamp_millis())
                .unwrap_or(0);

            let role = if is_user {
                self.user_alias.clone()
            } else {
                self.assistant_alias.clone()
            };

            messages.push((
                entry.uuid.clone(),
                TranscriptMessage {
                    message_id: entry.uuid,
                    session_id: String::new(), // filled by the caller
                    role,
                    timestamp_ms,
                    text: cleaned,
                    is_user,
                },
            ));
        }

        Ok(messages)
    }
}

/// Pull the text out of a content value: a plain string for user turns, or
/// an array of blocks where only `text` blocks count (thinking, tool_use,
/// and tool_result are skipped).
fn extract_text(content: &serde_json::Value, is_user: bool) -> String {
    match content {
        serde_json::Value::String(s) if is_user => s.clone(),
        serde_json::Value::Array(blocks) => {
            let mut texts = Vec::new();
            for block in blocks {
                if block.get("type").and_then(|t| t.as_str()) == Some("text") {
                    if let Some(text) = block.get("text").and_then(|t| t.as_str()) {
                        if !text.is_empty() {
                            texts.push(text);
                        }
                    }
                }
            }
            texts.join("\n")
        }
        _ => String::new(),
    }
}

impl SessionSource for ClaudeCodeSource {
    fn scheme(&self) -> &'static str {
        "cc"
    }

    fn sessions(&self) -> Result<Vec<SessionInfo>> {
        let data = std::fs::read_to_string(self.index_path())
            .with_context(|| format!("failed to read {}", self.index_path().display()))?;
        let index: SessionsIndex =
            serde_json::from_str(&data).context("failed to parse sessions index")?;

        let mut sessions: Vec<SessionInfo> = index
            .entries
            .into_iter()
            .filter(|e| !e.is_sidechain && e.message_count > 0)
            .map(|e| {
                let title = if e.summary.is_empty() {
                    let mut t = e.first_prompt;
                    if t.len() > 60 {
                        t.truncate(60);
                        t.push_str("...");
                    }
                    t
                } else {
                    e.summary
                };
                let updated_ms = DateTime::parse_from_rfc3339(&e.modified)
                    .map(|t| t.timestamp_millis())
                    .unwrap_or(0);
                SessionInfo {
                    id: e.session_id,
                    title,
                    subtitle: format!("({} msgs)", e.message_count),
                    updated_ms,
                }
            })
            .collect();

        sessions.sort_by(|a, b| b.updated_ms.cmp(&a.updated_ms));
        Ok(sessions)
    }

    fn message_ids(&self, session: &SessionInfo) -> Result<Vec<String>> {
        let path = self.transcript_path(session)?;
        let transcript = self.read_transcript(&path)?;
        Ok(transcript.into_iter().map(|(uuid, _)| uuid).collect())
    }

    fn load_message(&self, session: &SessionInfo, id: &str) -> Result<Option<TranscriptMessage>> {
        let path = self.transcript_path(session)?;
        let transcript = self.read_transcript(&path)?;
        Ok(transcript.into_iter().find(|(uuid, _)| uuid == id).map(
            |(_, mut message)| {
                message.session_id = session.id.clone();
                message
            },
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_text_user_string() {
        let content = serde_json::json!("plain user text");
        assert_eq!(extract_text(&content, true), "plain user text");
        // Assistant content is never a bare string
        assert_eq!(extract_text(&content, false), "");
    }

    #[test]
    fn extract_text_skips_non_text_blocks() {
        let content = serde_json::json!([
            {"type": "thinking", "thinking": "hidden"},
            {"type": "text", "text": "visible"},
            {"type": "tool_use", "name": "bash"},
            {"type": "text", "text": "more"}
        ]);
        assert_eq!(extract_text(&content, false), "visible\nmore");
    }

    #[test]
    fn read_transcript_filters_and_cleans() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.jsonl");
        let lines = [
            r#"{"type":"user","uuid":"u1","timestamp":"2026-01-21T10:00:00Z","message":{"content":"hello there"}}"#,
            r#"{"type":"assistant","uuid":"a1","timestamp":"2026-01-21T10:00:05Z","message":{"content":[{"type":"text","text":"hi"}]}}"#,
            r#"{"type":"summary","uuid":"s1"}"#,
            r#"{"type":"assistant","uuid":"a2","timestamp":"2026-01-21T10:00:10Z","message":{"content":[{"type":"tool_use","name":"bash"}]}}"#,
            "not json at all",
        ];
        std::fs::write(&path, lines.join("\n")).unwrap();

        let source = ClaudeCodeSource::new(dir.path().to_path_buf(), "proj".into(), "User", "Assistant");
        let transcript = source.read_transcript(&path).unwrap();

        // u1 and a1 admitted; the summary line, the tool-only turn, and the
        // malformed line are skipped. "hi" is only 2 chars and is dropped.
        assert_eq!(transcript.len(), 1);
        assert_eq!(transcript[0].0, "u1");
        assert_eq!(transcript[0].1.text, "hello there");
        assert!(transcript[0].1.is_user);
    }
}
