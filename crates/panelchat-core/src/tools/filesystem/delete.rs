//! Delete file tool

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::warn;

use crate::error::ToolError;
use crate::tools::{required_str, Tool, ToolContext, ToolOutput};

use super::Workspace;

/// Tool for deleting files
pub struct DeleteFile {
    workspace: Workspace,
}

impl DeleteFile {
    pub fn new(workspace: Workspace) -> Self {
        Self { workspace }
    }
}

#[async_trait]
impl Tool for DeleteFile {
    fn name(&self) -> &str {
        "delete_file"
    }

    fn description(&self) -> &str {
        "Deletes the file at the given path. Use this when you need to remove a file from the project. The path should be relative to the workspace root."
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

    async fn execute(&self, params: Value, _ctx: ToolContext) -> Result<ToolOutput, ToolError> {
        let path_str = required_str(&params, "path")?;
        let path = self.workspace.resolve(path_str)?;
        if self.workspace.is_root(&path) {
            warn!(path = path_str, "Refusing to delete the workspace root");
            return Err(ToolError::PermissionDenied(
                "Cannot delete the workspace root".to_string(),
            ));
        }

        let metadata = tokio::fs::symlink_metadata(&path)
            .await
            .map_err(|e| ToolError::from_io(e, path_str))?;

        // Only empty directories are removed
        if metadata.is_dir() {
            tokio::fs::remove_dir(&path).await.map_err(|e| match e.kind() {
                std::io::ErrorKind::DirectoryNotEmpty => {
                    ToolError::ExecutionFailed(format!("Directory {} is not empty", path_str))
                }
                _ => ToolError::from_io(e, path_str),
            })?;
        } else {
            tokio::fs::remove_file(&path)
                .await
                .map_err(|e| ToolError::from_io(e, path_str))?;
        }

        Ok(ToolOutput::text(format!("File {} has been deleted.", path_str)))
    }
}
