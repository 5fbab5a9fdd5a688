//! Tool system for the chat panel
//!
//! Tools are the workspace actions the model can request. Each tool has:
//! - A unique name and a description for the model
//! - A JSON schema for its input
//! - An execute method producing plain text

pub mod dispatcher;
pub mod filesystem;
pub mod registry;
pub mod terminal;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ToolError;

pub use dispatcher::{BatchOutcome, Dispatcher, ToolInvocation, ToolResultEntry, CANCELLED_RESULT};
pub use registry::{ToolRegistry, ToolRegistryBuilder};

/// Output from a tool execution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolOutput {
    /// Text placed in the tool result the model receives
    pub content: String,
    /// Extra text only the model should see (never shown to the user)
    pub private_context: Option<String>,
    /// Whether `content` may be shown to the user
    pub display: bool,
}

impl ToolOutput {
    /// A result visible to both the model and the user
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            private_context: None,
            display: true,
        }
    }

    /// A result whose content is hidden from the user, with model-only context
    pub fn private(content: impl Into<String>, context: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            private_context: Some(context.into()),
            display: false,
        }
    }
}

/// Per-request information a tool may consult
#[derive(Debug, Clone, Copy, Default)]
pub struct ToolContext {
    /// The user explicitly asked to see file contents
    pub show_contents: bool,
}

/// Tool definition for model consumption
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// Core trait for all tools
#[async_trait]
pub trait Tool: Send + Sync {
    /// Tool name (used by the model to invoke)
    fn name(&self) -> &str;

    /// Description of what the tool does
    fn description(&self) -> &str;

    /// JSON schema for parameters
    fn parameters_schema(&self) -> Value;

    /// Execute the tool with given parameters
    async fn execute(&self, params: Value, ctx: ToolContext) -> Result<ToolOutput, ToolError>;

    /// Convert to tool definition for the model
    fn to_definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters_schema(),
        }
    }
}

/// Read a required string field from tool parameters
pub(crate) fn required_str<'a>(params: &'a Value, field: &str) -> Result<&'a str, ToolError> {
    params[field]
        .as_str()
        .ok_or_else(|| ToolError::InvalidParams(format!("{} is required", field)))
}

/// Helper macro for creating tool parameter schemas
#[macro_export]
macro_rules! tool_params {
    ($($field:ident : $type:expr => $desc:expr),* $(,)?) => {
        serde_json::json!({
            "type": "object",
            "properties": {
                $( stringify!($field): { "type": $type, "description": $desc } ),*
            },
            "required": [ $( stringify!($field) ),* ]
        })
    };
}
