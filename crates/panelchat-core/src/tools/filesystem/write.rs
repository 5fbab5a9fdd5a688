//! Create and update file tools

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::error::ToolError;
use crate::tools::{required_str, Tool, ToolContext, ToolOutput};

use super::Workspace;

/// Whether the write is announced as a creation or an update
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    Create,
    Update,
}

/// Tool for writing file contents
pub struct WriteFile {
    workspace: Workspace,
    mode: WriteMode,
}

impl WriteFile {
    pub fn new(workspace: Workspace, mode: WriteMode) -> Self {
        Self { workspace, mode }
    }

    pub fn create(workspace: Workspace) -> Self {
        Self::new(workspace, WriteMode::Create)
    }

    pub fn update(workspace: Workspace) -> Self {
        Self::new(workspace, WriteMode::Update)
    }
}

#[async_trait]
impl Tool for WriteFile {
    fn name(&self) -> &str {
        match self.mode {
            WriteMode::Create => "create_file",
            WriteMode::Update => "update_file",
        }
    }

    fn description(&self) -> &str {
        match self.mode {
            WriteMode::Create => {
                "Creates a new file with the specified content at the given path. Use this when you need to create a new file in the project. The path should be relative to the workspace root."
            }
            WriteMode::Update => {
                "Updates the content of an existing file at the given path. Use this when you need to modify an existing file. The path should be relative to the workspace root."
            }
        }
    }

    fn parameters_schema(&self) -> Value {
        let path_desc = match self.mode {
            WriteMode::Create => "The relative path to the file, e.g., 'src/newfile.ts'",
            WriteMode::Update => "The relative path to the file",
        };
        let content_desc = match self.mode {
            WriteMode::Create => "The content to write to the file",
            WriteMode::Update => "The new content to write to the file",
        };
        json!({
            "type": "object",
            "properties": {
                "path": { "type": "string", "description": path_desc },
                "content": { "type": "string", "description": content_desc }
            },
            "required": ["path", "content"]
        })
    }

    async fn execute(&self, params: Value, _ctx: ToolContext) -> Result<ToolOutput, ToolError> {
        let path_str = required_str(&params, "path")?;
        let content = required_str(&params, "content")?;

        let path = self.workspace.resolve(path_str)?;

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| ToolError::from_io(e, path_str))?;
        }

        tokio::fs::write(&path, content)
            .await
            .map_err(|e| ToolError::from_io(e, path_str))?;

        let verb = match self.mode {
            WriteMode::Create => "created",
            WriteMode::Update => "updated",
        };
        Ok(ToolOutput::text(format!("File {} has been {}.", path_str, verb)))
    }
}
