//! Chat panel tests
//!
//! Drives a panel through its command channel and checks the event protocol.

use panelchat_core::conversation::{ContentBlock, Conversation, Turn};
use panelchat_core::provider::{
    BlockKind, ScriptedModelClient, ScriptedResponse, StreamEvent, text_block, tool_use_block,
};
use panelchat_core::session::{CANCEL_ACK, HistoryStore, PanelCommand, PanelEvent, SessionConfig};
use panelchat_core::tools::filesystem::Workspace;
use panelchat_core::open_panel;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::mpsc;
use tokio::time::timeout;

const WAIT: Duration = Duration::from_secs(5);

fn session(dir: &TempDir) -> SessionConfig {
    SessionConfig {
        workspace: Workspace::new(dir.path()),
        ..Default::default()
    }
}

fn finished(events: Vec<StreamEvent>) -> ScriptedResponse {
    let mut events = events;
    events.push(StreamEvent::MessageStop);
    ScriptedResponse::events(events)
}

fn stalled() -> ScriptedResponse {
    ScriptedResponse::events(vec![StreamEvent::BlockStart {
        index: 0,
        kind: BlockKind::Text,
    }])
    .then_stall()
}

async fn next_event(rx: &mut mpsc::Receiver<PanelEvent>) -> PanelEvent {
    timeout(WAIT, rx.recv())
        .await
        .expect("timed out waiting for a panel event")
        .expect("panel output closed")
}

/// Collect events up to and including the first one matching `stop`
async fn events_until(
    rx: &mut mpsc::Receiver<PanelEvent>,
    stop: impl Fn(&PanelEvent) -> bool,
) -> Vec<PanelEvent> {
    let mut events = Vec::new();
    loop {
        let event = next_event(rx).await;
        let done = stop(&event);
        events.push(event);
        if done {
            return events;
        }
    }
}

fn is_final_message(text: &str) -> impl Fn(&PanelEvent) -> bool + '_ {
    move |event| matches!(event, PanelEvent::AddAssistantMessage { text: t, .. } if t == text)
}

mod send_tests {
    use super::*;

    #[tokio::test]
    async fn test_send_streams_and_completes() {
        let dir = TempDir::new().unwrap();
        let client = Arc::new(ScriptedModelClient::new(vec![finished(text_block(0, "hello"))]));
        let (panel, input, mut output) = open_panel(session(&dir), client, None).unwrap();
        tokio::spawn(panel.run());

        input.send(PanelCommand::send("hi")).await.unwrap();
        let events = events_until(&mut output, is_final_message("hello")).await;

        assert_eq!(
            events,
            vec![
                PanelEvent::AddUserMessage { text: "hi".into(), message_id: 0 },
                PanelEvent::StartAssistantResponse { message_id: 1 },
                PanelEvent::AppendAssistantResponse { text: "he".into(), message_id: 1 },
                PanelEvent::AppendAssistantResponse { text: "llo".into(), message_id: 1 },
                PanelEvent::CompleteAssistantResponse { message_id: 1 },
                PanelEvent::AddAssistantMessage { text: "hello".into(), message_id: 1 },
            ]
        );
    }

    #[tokio::test]
    async fn test_empty_message_is_ignored() {
        let dir = TempDir::new().unwrap();
        let client = Arc::new(ScriptedModelClient::new(vec![finished(text_block(0, "ok"))]));
        let (panel, input, mut output) = open_panel(session(&dir), client.clone(), None).unwrap();
        tokio::spawn(panel.run());

        input.send(PanelCommand::send("   ")).await.unwrap();
        input.send(PanelCommand::send("real")).await.unwrap();

        let first = next_event(&mut output).await;
        assert_eq!(first, PanelEvent::AddUserMessage { text: "real".into(), message_id: 0 });
        events_until(&mut output, is_final_message("ok")).await;
        assert_eq!(client.calls(), 1);
    }

    #[tokio::test]
    async fn test_second_send_while_busy_is_rejected() {
        let dir = TempDir::new().unwrap();
        let client = Arc::new(ScriptedModelClient::new(vec![stalled()]));
        let (panel, input, mut output) = open_panel(session(&dir), client.clone(), None).unwrap();
        tokio::spawn(panel.run());

        input.send(PanelCommand::send("first")).await.unwrap();
        events_until(&mut output, |e| matches!(e, PanelEvent::StartAssistantResponse { .. })).await;

        input.send(PanelCommand::send("second")).await.unwrap();
        let event = next_event(&mut output).await;
        assert_eq!(event, PanelEvent::error("A request is already in progress"));
        assert_eq!(client.calls(), 1);
    }

    #[tokio::test]
    async fn test_busy_rejection_survives_closed_output() {
        let dir = TempDir::new().unwrap();
        let client = Arc::new(ScriptedModelClient::new(vec![stalled()]));
        let (panel, input, output) = open_panel(session(&dir), client, None).unwrap();
        let running = tokio::spawn(panel.run());
        drop(output);

        input.send(PanelCommand::send("first")).await.unwrap();
        input.send(PanelCommand::send("second")).await.unwrap();
        input.send(PanelCommand::CancelMessage).await.unwrap();
        drop(input);

        timeout(WAIT, running).await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_model_error_is_reported() {
        let dir = TempDir::new().unwrap();
        let client = Arc::new(ScriptedModelClient::new(vec![ScriptedResponse::open_error("overloaded")]));
        let (panel, input, mut output) = open_panel(session(&dir), client, None).unwrap();
        tokio::spawn(panel.run());

        input.send(PanelCommand::send("hi")).await.unwrap();
        let events = events_until(&mut output, |e| matches!(e, PanelEvent::Error { .. })).await;

        assert_eq!(events.last(), Some(&PanelEvent::error("Provider error: overloaded")));
    }
}

mod cancel_tests {
    use super::*;

    #[tokio::test]
    async fn test_cancel_acknowledged() {
        let dir = TempDir::new().unwrap();
        let client = Arc::new(ScriptedModelClient::new(vec![stalled()]));
        let (panel, input, mut output) = open_panel(session(&dir), client, None).unwrap();
        tokio::spawn(panel.run());

        input.send(PanelCommand::send("hi")).await.unwrap();
        events_until(&mut output, |e| matches!(e, PanelEvent::StartAssistantResponse { .. })).await;

        input.send(PanelCommand::CancelMessage).await.unwrap();
        let events = events_until(&mut output, |e| matches!(e, PanelEvent::CancelSuccess { .. })).await;

        assert_eq!(
            events,
            vec![
                PanelEvent::CompleteAssistantResponse { message_id: 1 },
                PanelEvent::CancelSuccess { text: CANCEL_ACK.into() },
            ]
        );
    }

    #[tokio::test]
    async fn test_panel_accepts_sends_after_cancel() {
        let dir = TempDir::new().unwrap();
        let client = Arc::new(ScriptedModelClient::new(vec![
            stalled(),
            finished(text_block(0, "back again")),
        ]));
        let (panel, input, mut output) = open_panel(session(&dir), client, None).unwrap();
        tokio::spawn(panel.run());

        input.send(PanelCommand::send("one")).await.unwrap();
        events_until(&mut output, |e| matches!(e, PanelEvent::StartAssistantResponse { .. })).await;
        input.send(PanelCommand::CancelMessage).await.unwrap();
        events_until(&mut output, |e| matches!(e, PanelEvent::CancelSuccess { .. })).await;

        input.send(PanelCommand::send("two")).await.unwrap();
        events_until(&mut output, is_final_message("back again")).await;
    }

    #[tokio::test]
    async fn test_new_thread_during_stream_cancels_then_clears() {
        let dir = TempDir::new().unwrap();
        let client = Arc::new(ScriptedModelClient::new(vec![stalled()]));
        let (panel, input, mut output) = open_panel(session(&dir), client, None).unwrap();
        tokio::spawn(panel.run());

        input.send(PanelCommand::send("hi")).await.unwrap();
        events_until(&mut output, |e| matches!(e, PanelEvent::StartAssistantResponse { .. })).await;

        input.send(PanelCommand::NewThread).await.unwrap();
        let events = events_until(&mut output, |e| matches!(e, PanelEvent::ClearChat)).await;

        let cancel_at = events
            .iter()
            .position(|e| matches!(e, PanelEvent::CancelSuccess { .. }))
            .expect("cancel acknowledged");
        assert_eq!(cancel_at, events.len() - 2);

        // History is empty again, so nothing comes back
        input.send(PanelCommand::RestoreHistory).await.unwrap();
        input.send(PanelCommand::NewThread).await.unwrap();
        assert_eq!(next_event(&mut output).await, PanelEvent::ClearChat);
    }
}

mod history_tests {
    use super::*;

    fn saved_conversation() -> Conversation {
        Conversation::from_turns(vec![
            Turn::user("what is in main.rs?"),
            Turn::model_blocks(vec![ContentBlock::ToolUse {
                id: "t1".into(),
                name: "read_file".into(),
                input: json!({"path": "main.rs"}),
            }]),
            Turn::user_blocks(vec![
                ContentBlock::ToolResult {
                    tool_use_id: "t1".into(),
                    content: "Read successful".into(),
                    is_error: false,
                },
                ContentBlock::hidden_text("fn main() { launch_rockets(); }"),
            ]),
            Turn::model("It launches rockets."),
        ])
    }

    #[tokio::test]
    async fn test_restore_projects_visible_text_only() {
        let dir = TempDir::new().unwrap();
        let store = HistoryStore::new(dir.path(), "panelChatHistory");
        store.save(&saved_conversation()).unwrap();

        let client = Arc::new(ScriptedModelClient::default());
        let (panel, input, mut output) = open_panel(session(&dir), client, Some(store)).unwrap();
        tokio::spawn(panel.run());

        input.send(PanelCommand::RestoreHistory).await.unwrap();
        let events = events_until(&mut output, is_final_message("It launches rockets.")).await;

        assert_eq!(
            events,
            vec![
                PanelEvent::AddUserMessage { text: "what is in main.rs?".into(), message_id: 0 },
                PanelEvent::AddAssistantMessage { text: "It launches rockets.".into(), message_id: 1 },
            ]
        );
    }

    #[tokio::test]
    async fn test_history_survives_panel_restart() {
        let dir = TempDir::new().unwrap();
        let state = dir.path().join("state");

        let client = Arc::new(ScriptedModelClient::new(vec![
            finished(tool_use_block(0, "s1", "search_files", &json!({"query": "nothing-here"}))),
            finished(text_block(0, "Nothing matched.")),
        ]));
        let store = HistoryStore::new(&state, "panelChatHistory");
        let (panel, input, mut output) = open_panel(session(&dir), client, Some(store)).unwrap();
        let running = tokio::spawn(panel.run());

        input.send(PanelCommand::send("find nothing")).await.unwrap();
        events_until(&mut output, is_final_message("Nothing matched.")).await;
        drop(input);
        timeout(WAIT, running).await.unwrap().unwrap();

        let mut reopened = HistoryStore::new(&state, "panelChatHistory");
        let saved = reopened.load().unwrap().expect("history was saved");
        assert_eq!(saved.len(), 4);
        assert_eq!(saved.turns()[0], Turn::user("find nothing"));
        assert_eq!(saved.turns()[3].visible_text(), "Nothing matched.");
    }

    #[tokio::test]
    async fn test_new_thread_clears_saved_history() {
        let dir = TempDir::new().unwrap();
        let store = HistoryStore::new(dir.path(), "panelChatHistory");
        store.save(&saved_conversation()).unwrap();

        let client = Arc::new(ScriptedModelClient::default());
        let (panel, input, mut output) =
            open_panel(session(&dir), client, Some(store.clone())).unwrap();
        tokio::spawn(panel.run());

        input.send(PanelCommand::NewThread).await.unwrap();
        assert_eq!(next_event(&mut output).await, PanelEvent::ClearChat);

        let mut reopened = store;
        let saved = reopened.load().unwrap().expect("history file still present");
        assert!(saved.is_empty());
    }
}
