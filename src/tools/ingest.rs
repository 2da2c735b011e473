//! MCP `ingest` tool parameter definition.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Parameters for the `ingest` MCP tool.
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct IngestParams {
    /// Path to the markdown file. Relative paths must not traverse upward;
    /// absolute paths must lie under the configured ingest root.
    #[schemars(description = "Path to markdown file")]
    pub file_path: String,

    /// Fallback `valid_at` for sections whose header carries no date.
    #[schemars(description = "Optional ISO date for valid_at")]
    pub valid_at: Option<String>,
}
