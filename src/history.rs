//! Entity history — alias-expanded lexical search in chronological order.

use anyhow::{Context, Result};
use rusqlite::{Connection, ToSql};
use serde::Serialize;

use crate::alias::AliasTable;

const DEFAULT_LIMIT: i64 = 20;

#[derive(Debug, Clone, Serialize)]
pub struct HistoryResult {
    pub id: i64,
    pub text: String,
    pub source_file: String,
    pub section_title: String,
    pub parent_title: Option<String>,
    pub valid_at: Option<String>,
    pub ingested_at: String,
}

/// Escape `%`, `_`, and `\` so a name matches literally inside LIKE.
fn escape_like(name: &str) -> String {
    name.replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

/// Find all chunks mentioning `entity` or any of its aliases, ordered
/// timeless-first, then by `valid_at`, then by document position.
/// `limit <= 0` falls back to 20.
pub fn history(
    conn: &Connection,
    aliases: &AliasTable,
    entity: &str,
    limit: i64,
) -> Result<Vec<HistoryResult>> {
    if entity.trim().is_empty() {
        anyhow::bail!("entity must not be empty");
    }
    let limit = if limit <= 0 { DEFAULT_LIMIT } else { limit };

    let names = aliases.resolve(entity);
    let patterns: Vec<String> = names
        .iter()
        .map(|name| format!("%{}%", escape_like(name)))
        .collect();

    let conditions: Vec<&str> = patterns
        .iter()
        .map(|_| "text LIKE ? ESCAPE '\\' COLLATE NOCASE")
        .collect();

    let sql = format!(
        "SELECT id, text, source_file, section_title, parent_title, valid_at, ingested_at \
         FROM chunks \
         WHERE ({}) \
         ORDER BY CASE WHEN valid_at IS NULL THEN 0 ELSE 1 END, valid_at ASC, section_sequence ASC \
         LIMIT ?",
        conditions.join(" OR ")
    );

    let mut params: Vec<&dyn ToSql> = patterns.iter().map(|p| p as &dyn ToSql).collect();
    params.push(&limit);

    let mut stmt = conn.prepare(&sql)?;
    let results = stmt
        .query_map(&params[..], |row| {
            Ok(HistoryResult {
                id: row.get(0)?,
                text: row.get(1)?,
                source_file: row.get(2)?,
                section_title: row.get(3)?,
                parent_title: row.get(4)?,
                valid_at: row.get(5)?,
                ingested_at: row.get(6)?,
            })
        })?
        .collect::<std::result::Result<_, _>>()
        .context("history query failed")?;

    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escape_like_neutralizes_wildcards() {
        assert_eq!(escape_like("50%_x"), "50\\%\\_x");
        assert_eq!(escape_like(r"a\b"), r"a\\b");
        assert_eq!(escape_like("plain"), "plain");
    }
}
