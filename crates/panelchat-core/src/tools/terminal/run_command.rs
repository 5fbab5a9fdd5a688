//! Run command tool

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::warn;

use crate::config::TerminalConfig;
use crate::error::ToolError;
use crate::tools::filesystem::Workspace;
use crate::tools::{required_str, Tool, ToolContext, ToolOutput};

use super::TerminalSession;

/// Tool for sending a command to the shared terminal
pub struct RunCommand {
    workspace: Workspace,
    config: TerminalConfig,
    session: Arc<TerminalSession>,
}

impl RunCommand {
    pub fn new(workspace: Workspace, config: TerminalConfig) -> Self {
        let session = Arc::new(TerminalSession::new(config.shell.clone()));
        Self {
            workspace,
            config,
            session,
        }
    }

    /// The underlying terminal session
    pub fn session(&self) -> Arc<TerminalSession> {
        self.session.clone()
    }

    fn is_command_blocked(&self, command: &str) -> bool {
        let lowered = command.to_lowercase();
        self.config
            .blocked_commands
            .iter()
            .any(|blocked| lowered.contains(&blocked.to_lowercase()))
    }
}

#[async_trait]
impl Tool for RunCommand {
    fn name(&self) -> &str {
        "run_command"
    }

    fn description(&self) -> &str {
        "Executes the specified terminal command in the integrated terminal. Use this to run git commands, build commands, or any other CLI commands that would normally be run in a terminal."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "command": {
                    "type": "string",
                    "description": "The command to execute in the terminal. Should be a valid shell command."
                },
                "cwd": {
                    "type": "string",
                    "description": "Optional. The current working directory where the command should be executed. If not provided, the workspace root will be used."
                }
            },
            "required": ["command"]
        })
    }

    async fn execute(&self, params: Value, _ctx: ToolContext) -> Result<ToolOutput, ToolError> {
        let command = required_str(&params, "command")?;
        let root = self.workspace.root()?;

        if self.is_command_blocked(command) {
            warn!(command, "Refusing blocked terminal command");
            return Err(ToolError::PermissionDenied(format!(
                "Command contains blocked pattern: {}",
                command
            )));
        }

        let cwd = match params["cwd"].as_str() {
            Some(dir) => Some(self.workspace.resolve(dir)?),
            None => None,
        };

        self.session.send(command, cwd.as_deref(), root).await?;

        Ok(ToolOutput::text(format!("Command executed in terminal: {}", command)))
    }
}
