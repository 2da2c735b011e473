//! MCP `search` tool parameter definition.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Parameters for the `search` MCP tool.
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct SearchParams {
    /// Natural language search query.
    #[schemars(description = "Search query")]
    pub query: String,

    /// Optional temporal cutoff (`YYYY-MM-DD`); chunks dated later are excluded.
    #[schemars(description = "Optional ISO date filter; chunks dated after it are excluded")]
    pub as_of: Option<String>,

    /// Maximum results to return. Defaults to 10.
    #[schemars(description = "Maximum results (default 10)")]
    pub limit: Option<i64>,
}
