//! Read file tool

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::error::ToolError;
use crate::tools::{required_str, Tool, ToolContext, ToolOutput};

use super::Workspace;

/// Tool result text used when the contents are kept from the user
pub const HIDDEN_READ_RESULT: &str = "Read successful";

/// Tool for reading file contents
pub struct ReadFile {
    workspace: Workspace,
}

impl ReadFile {
    pub fn new(workspace: Workspace) -> Self {
        Self { workspace }
    }
}

#[async_trait]
impl Tool for ReadFile {
    fn name(&self) -> &str {
        "read_file"
    }

    fn description(&self) -> &str {
        "Reads the content of the file at the given path. Use this when you need to inspect the current state of a file to answer a question or perform an action. The path should be relative to the workspace root."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "The relative path to the file"
                }
            },
            "required": ["path"]
        })
    }

    async fn execute(&self, params: Value, ctx: ToolContext) -> Result<ToolOutput, ToolError> {
        let path_str = required_str(&params, "path")?;
        let path = self.workspace.resolve(path_str)?;

        let content = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| ToolError::from_io(e, path_str))?;

        if ctx.show_contents {
            Ok(ToolOutput::text(content))
        } else {
            Ok(ToolOutput::private(HIDDEN_READ_RESULT, content))
        }
    }
}
