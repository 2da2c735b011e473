//! MCP `status` tool parameter definition.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Parameters for the `status` MCP tool (none).
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct StatusParams {}
