//! Panel protocol types
//!
//! These types define the command protocol between a UI surface and a chat
//! panel. They serialize as `{"command": ..., "text": ..., "messageId": ...}`.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::config::{Config, SessionSettings, TerminalConfig};
use crate::tools::filesystem::Workspace;

/// Commands sent TO a panel by the UI
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "camelCase")]
pub enum PanelCommand {
    /// User sends a message
    SendMessage {
        #[serde(default)]
        text: String,
    },
    /// User cancels the in-flight request
    CancelMessage,
    /// User starts a new thread
    NewThread,
    /// UI asks for the visible history to be replayed
    RestoreHistory,
}

impl PanelCommand {
    pub fn send(text: impl Into<String>) -> Self {
        Self::SendMessage { text: text.into() }
    }
}

/// Events sent FROM a panel to the UI.
///
/// `message_id` correlates streamed fragments with the turn they belong to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum PanelEvent {
    AddUserMessage { text: String, message_id: u64 },
    StartAssistantResponse { message_id: u64 },
    AppendAssistantResponse { text: String, message_id: u64 },
    AddAssistantMessage { text: String, message_id: u64 },
    CompleteAssistantResponse { message_id: u64 },
    CancelSuccess { text: String },
    Error { text: String },
    ClearChat,
}

impl PanelEvent {
    pub fn error(text: impl Into<String>) -> Self {
        Self::Error { text: text.into() }
    }

    /// The event's text payload, if it has one
    pub fn text(&self) -> Option<&str> {
        match self {
            Self::AddUserMessage { text, .. }
            | Self::AppendAssistantResponse { text, .. }
            | Self::AddAssistantMessage { text, .. }
            | Self::CancelSuccess { text }
            | Self::Error { text } => Some(text),
            Self::StartAssistantResponse { .. }
            | Self::CompleteAssistantResponse { .. }
            | Self::ClearChat => None,
        }
    }
}

/// Orchestrator state for one panel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoopState {
    #[default]
    Idle,
    AwaitingModel,
    StreamingAssembly,
    ExecutingTools,
}

/// How a send ended without error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// The model finished without requesting more tools
    Completed { iterations: usize },
    /// The iteration cap stopped the loop
    IterationLimit,
}

/// Everything needed to build a panel's tools and loop
#[derive(Debug, Clone, Default)]
pub struct SessionConfig {
    pub workspace: Workspace,
    pub settings: SessionSettings,
    pub terminal: TerminalConfig,
}

impl SessionConfig {
    /// Build from application config; `workspace` overrides `general.workspace_dir`
    pub fn from_config(config: &Config, workspace: Option<PathBuf>) -> Self {
        let root = workspace.or_else(|| config.general.workspace_dir.clone());
        Self {
            workspace: Workspace::from_option(root),
            settings: config.session.clone(),
            terminal: config.terminal.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_command_wire_shape() {
        let cmd: PanelCommand =
            serde_json::from_value(json!({"command": "sendMessage", "text": "hello"})).unwrap();
        assert_eq!(cmd, PanelCommand::send("hello"));

        let cmd: PanelCommand = serde_json::from_value(json!({"command": "cancelMessage"})).unwrap();
        assert_eq!(cmd, PanelCommand::CancelMessage);

        let cmd: PanelCommand = serde_json::from_value(json!({"command": "restoreHistory"})).unwrap();
        assert_eq!(cmd, PanelCommand::RestoreHistory);
    }

    #[test]
    fn test_event_wire_shape() {
        let event = PanelEvent::AppendAssistantResponse {
            text: "Hel".into(),
            message_id: 3,
        };
        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            json!({"command": "appendAssistantResponse", "text": "Hel", "messageId": 3})
        );
        assert_eq!(
            serde_json::to_value(PanelEvent::ClearChat).unwrap(),
            json!({"command": "clearChat"})
        );
        assert_eq!(
            serde_json::to_value(PanelEvent::error("boom")).unwrap(),
            json!({"command": "error", "text": "boom"})
        );
    }
}
