//! Workspace file search tool

use async_trait::async_trait;
use globset::{GlobBuilder, GlobMatcher};
use serde_json::{json, Value};
use std::path::Path;
use tracing::debug;
use walkdir::WalkDir;

use crate::error::ToolError;
use crate::tools::{required_str, Tool, ToolContext, ToolOutput};

use super::{path_to_display, Workspace};

/// Result text when nothing matches
pub const NO_MATCHES: &str = "No matching files found.";

/// Maximum number of paths returned
pub const SEARCH_LIMIT: usize = 100;

/// Directories never descended into
const EXCLUDED_DIRS: &[&str] = &["node_modules", ".git", "target"];

/// Tool for finding workspace files whose path contains a query
pub struct SearchFiles {
    workspace: Workspace,
}

impl SearchFiles {
    pub fn new(workspace: Workspace) -> Self {
        Self { workspace }
    }
}

#[async_trait]
impl Tool for SearchFiles {
    fn name(&self) -> &str {
        "search_files"
    }

    fn description(&self) -> &str {
        "Searches for files in the workspace that match the given query. Returns a list of file paths."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "The search query string"
                }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, params: Value, _ctx: ToolContext) -> Result<ToolOutput, ToolError> {
        let query = required_str(&params, "query")?;
        let root = self.workspace.root()?.to_path_buf();

        let matcher = GlobBuilder::new(&format!("**/*{}*", query))
            .literal_separator(true)
            .build()
            .map_err(|e| ToolError::InvalidParams(format!("Invalid search query: {}", e)))?
            .compile_matcher();

        let files = tokio::task::spawn_blocking(move || find_matching(&root, &matcher))
            .await
            .map_err(|e| ToolError::ExecutionFailed(format!("Search task failed: {}", e)))?;

        debug!(query, matches = files.len(), "search_files complete");

        if files.is_empty() {
            Ok(ToolOutput::text(NO_MATCHES))
        } else {
            Ok(ToolOutput::text(files.join("\n")))
        }
    }
}

fn find_matching(root: &Path, matcher: &GlobMatcher) -> Vec<String> {
    let mut files: Vec<String> = WalkDir::new(root)
        .into_iter()
        .filter_entry(|entry| {
            entry.depth() == 0
                || !(entry.file_type().is_dir()
                    && EXCLUDED_DIRS.iter().any(|d| entry.file_name() == *d))
        })
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .filter_map(|entry| {
            let rel = entry.path().strip_prefix(root).ok()?;
            let rel = path_to_display(rel);
            matcher.is_match(&rel).then_some(rel)
        })
        .collect();

    files.sort();
    files.truncate(SEARCH_LIMIT);
    files
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_find_matching_skips_excluded_dirs() {
        let dir = tempfile::TempDir::new().unwrap();
        let base = dir.path();
        fs::create_dir_all(base.join("src")).unwrap();
        fs::create_dir_all(base.join("node_modules/pkg")).unwrap();
        fs::write(base.join("src/config.ts"), "").unwrap();
        fs::write(base.join("node_modules/pkg/config.js"), "").unwrap();
        fs::write(base.join("README.md"), "").unwrap();

        let matcher = GlobBuilder::new("**/*config*")
            .literal_separator(true)
            .build()
            .unwrap()
            .compile_matcher();
        assert_eq!(find_matching(base, &matcher), vec!["src/config.ts".to_string()]);
    }
}
