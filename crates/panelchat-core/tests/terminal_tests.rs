//! Terminal tool tests
//!
//! Tests for RunCommand and the reusable terminal session.

use panelchat_core::config::TerminalConfig;
use panelchat_core::tools::filesystem::Workspace;
use panelchat_core::tools::terminal::RunCommand;
use panelchat_core::tools::{Tool, ToolContext};
use panelchat_core::ToolError;
use serde_json::json;
use std::path::Path;
use std::time::Duration;
use tempfile::TempDir;

/// Create a test workspace
fn setup_workspace() -> TempDir {
    let dir = TempDir::new().expect("Failed to create temp dir");
    std::fs::create_dir_all(dir.path().join("sub")).unwrap();
    dir
}

/// Commands are fire-and-forget, so wait for their side effect
async fn wait_for_file(path: &Path) -> String {
    for _ in 0..100 {
        if let Ok(content) = std::fs::read_to_string(path)
            && !content.is_empty()
        {
            return content;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("{} was never written", path.display());
}

mod run_command_tests {
    use super::*;

    #[tokio::test]
    async fn test_blocked_command_refused() {
        let dir = setup_workspace();
        let tool = RunCommand::new(Workspace::new(dir.path()), TerminalConfig::default());

        let err = tool
            .execute(json!({"command": "sudo reboot"}), ToolContext::default())
            .await
            .unwrap_err();

        assert!(matches!(err, ToolError::PermissionDenied(_)));
        assert!(!tool.session().is_running().await);
    }

    #[tokio::test]
    async fn test_requires_workspace() {
        let tool = RunCommand::new(Workspace::none(), TerminalConfig::default());

        let err = tool
            .execute(json!({"command": "ls"}), ToolContext::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::NoWorkspace));
    }

    #[tokio::test]
    async fn test_missing_command_is_invalid() {
        let dir = setup_workspace();
        let tool = RunCommand::new(Workspace::new(dir.path()), TerminalConfig::default());

        let err = tool.execute(json!({}), ToolContext::default()).await.unwrap_err();
        assert!(matches!(err, ToolError::InvalidParams(_)));
    }

    #[tokio::test]
    async fn test_cwd_outside_workspace_refused() {
        let dir = setup_workspace();
        let tool = RunCommand::new(Workspace::new(dir.path()), TerminalConfig::default());

        let err = tool
            .execute(json!({"command": "ls", "cwd": "../.."}), ToolContext::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::PermissionDenied(_)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_command_runs_in_workspace_root() {
        let dir = setup_workspace();
        let tool = RunCommand::new(Workspace::new(dir.path()), TerminalConfig::default());

        let output = tool
            .execute(json!({"command": "echo ran > marker.txt"}), ToolContext::default())
            .await
            .unwrap();

        assert_eq!(output.content, "Command executed in terminal: echo ran > marker.txt");
        assert_eq!(wait_for_file(&dir.path().join("marker.txt")).await.trim(), "ran");
        assert!(tool.session().is_running().await);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_session_is_reused_across_commands() {
        let dir = setup_workspace();
        let tool = RunCommand::new(Workspace::new(dir.path()), TerminalConfig::default());

        tool.execute(json!({"command": "GREETING=kept"}), ToolContext::default())
            .await
            .unwrap();
        tool.execute(
            json!({"command": "echo $GREETING > shared.txt", "cwd": "sub"}),
            ToolContext::default(),
        )
        .await
        .unwrap();

        let content = wait_for_file(&dir.path().join("sub/shared.txt")).await;
        assert_eq!(content.trim(), "kept");
    }
}
