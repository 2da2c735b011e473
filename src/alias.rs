//! Entity alias groups for history lookups.
//!
//! A group is a set of names treated as interchangeable: looking up any
//! member (case-insensitively) returns the whole group. Stored as two maps —
//! the group lists themselves plus a lowercased name → group index — so the
//! same list is never duplicated under multiple keys.

use std::collections::HashMap;

#[derive(Debug, Clone, Default)]
pub struct AliasTable {
    groups: Vec<Vec<String>>,
    index: HashMap<String, usize>,
}

impl AliasTable {
    /// Parse the `a1=n1,n2;a2=n3,n4` format. Parsing is best-effort: empty
    /// or malformed segments (no `=`) are skipped so one bad group never
    /// takes the valid ones down with it.
    pub fn parse(raw: &str) -> Self {
        let mut table = AliasTable::default();

        for segment in raw.split(';') {
            let segment = segment.trim();
            if segment.is_empty() {
                continue;
            }
            let Some((key, names)) = segment.split_once('=') else {
                tracing::warn!(segment, "skipping alias group without '='");
                continue;
            };
            let key = key.trim().to_lowercase();
            if key.is_empty() {
                continue;
            }

            let members: Vec<String> = names
                .split(',')
                .map(|n| n.trim())
                .filter(|n| !n.is_empty())
                .map(|n| n.to_string())
                .collect();
            if members.is_empty() {
                continue;
            }

            let group_id = table.groups.len();
            table.index.insert(key, group_id);
            for member in &members {
                table.index.insert(member.to_lowercase(), group_id);
            }
            table.groups.push(members);
        }

        table
    }

    /// All names to search for a given entity. If the entity belongs to a
    /// group, every member is returned; otherwise just the entity itself.
    pub fn resolve<'a>(&'a self, entity: &'a str) -> Vec<&'a str> {
        let key = entity.trim().to_lowercase();
        match self.index.get(&key) {
            Some(&group_id) => self.groups[group_id].iter().map(String::as_str).collect(),
            None => vec![entity],
        }
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}
