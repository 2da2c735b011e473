//! MCP `history` tool parameter definition.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Parameters for the `history` MCP tool.
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct HistoryParams {
    /// Entity name; known aliases are searched as well.
    #[schemars(description = "Entity name")]
    pub entity: String,

    /// Maximum results to return. Defaults to 20.
    #[schemars(description = "Maximum results (default 20)")]
    pub limit: Option<i64>,
}
