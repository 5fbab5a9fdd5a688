//! Ordered tool catalog and its builder

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::config::TerminalConfig;
use crate::error::ToolError;

use super::filesystem::{DeleteFile, ReadFile, SearchFiles, Workspace, WriteFile};
use super::terminal::RunCommand;
use super::{Tool, ToolDefinition};

/// Registry of available tools, kept in registration order
#[derive(Default)]
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
    index: HashMap<String, usize>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool; names must be unique
    pub fn register(&mut self, tool: Arc<dyn Tool>) -> Result<(), ToolError> {
        let name = tool.name().to_string();
        if self.index.contains_key(&name) {
            return Err(ToolError::DuplicateTool(name));
        }
        self.index.insert(name, self.tools.len());
        self.tools.push(tool);
        Ok(())
    }

    /// Get a tool by name
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.index.get(name).map(|&i| self.tools[i].clone())
    }

    /// Tool definitions in registration order
    pub fn list(&self) -> Vec<ToolDefinition> {
        self.tools.iter().map(|t| t.to_definition()).collect()
    }

    /// Registered tool names in order
    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

/// Builder for the standard tool registry
pub struct ToolRegistryBuilder {
    workspace: Workspace,
    terminal: Option<TerminalConfig>,
}

impl ToolRegistryBuilder {
    pub fn new(workspace: Workspace) -> Self {
        Self {
            workspace,
            terminal: None,
        }
    }

    /// Include `run_command`, backed by a shell from `config`
    pub fn with_terminal(mut self, config: TerminalConfig) -> Self {
        self.terminal = Some(config);
        self
    }

    /// Include `run_command` when `enabled`
    pub fn with_terminal_if(self, enabled: bool, config: TerminalConfig) -> Self {
        if enabled {
            self.with_terminal(config)
        } else {
            self
        }
    }

    /// Build the registry
    pub fn build(self) -> ToolRegistry {
        let ws = self.workspace;
        let mut tools: Vec<Arc<dyn Tool>> = vec![
            Arc::new(WriteFile::create(ws.clone())),
            Arc::new(WriteFile::update(ws.clone())),
            Arc::new(DeleteFile::new(ws.clone())),
            Arc::new(ReadFile::new(ws.clone())),
            Arc::new(SearchFiles::new(ws.clone())),
        ];
        if let Some(config) = self.terminal {
            tools.push(Arc::new(RunCommand::new(ws, config)));
        }

        let mut registry = ToolRegistry::new();
        for tool in tools {
            if let Err(e) = registry.register(tool) {
                debug!("Skipping tool: {}", e);
            }
        }
        registry
    }
}
