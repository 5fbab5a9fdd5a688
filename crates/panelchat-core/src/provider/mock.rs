//! Scripted model client for tests and offline runs

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use futures::StreamExt;
use parking_lot::Mutex;
use serde_json::Value;

use crate::conversation::Turn;
use crate::error::{Error, Result};
use crate::tools::ToolDefinition;

use super::{BlockKind, Delta, EventStream, ModelClient, StreamEvent};

/// One canned model turn
#[derive(Debug, Clone, Default)]
pub struct ScriptedResponse {
    open_error: Option<String>,
    events: Vec<StreamEvent>,
    stream_error: Option<String>,
    stall: bool,
}

impl ScriptedResponse {
    /// Replay `events` and end the stream
    pub fn events(events: Vec<StreamEvent>) -> Self {
        Self {
            events,
            ..Default::default()
        }
    }

    /// Fail when the stream is opened
    pub fn open_error(message: impl Into<String>) -> Self {
        Self {
            open_error: Some(message.into()),
            ..Default::default()
        }
    }

    /// Yield a provider error after the events
    pub fn then_error(mut self, message: impl Into<String>) -> Self {
        self.stream_error = Some(message.into());
        self
    }

    /// Never end the stream after the events
    pub fn then_stall(mut self) -> Self {
        self.stall = true;
        self
    }
}

/// Events for a complete text block, delivered in two fragments
pub fn text_block(index: usize, text: &str) -> Vec<StreamEvent> {
    let split = text.char_indices().nth(text.chars().count() / 2).map_or(text.len(), |(i, _)| i);
    let (head, tail) = text.split_at(split);

    let mut events = vec![StreamEvent::BlockStart {
        index,
        kind: BlockKind::Text,
    }];
    for part in [head, tail] {
        if !part.is_empty() {
            events.push(StreamEvent::BlockDelta {
                index,
                delta: Delta::Text(part.to_string()),
            });
        }
    }
    events.push(StreamEvent::BlockStop { index });
    events
}

/// Events for a complete tool-use block with its input split into JSON fragments
pub fn tool_use_block(index: usize, id: &str, name: &str, input: &Value) -> Vec<StreamEvent> {
    let json = input.to_string();
    let chars: Vec<char> = json.chars().collect();

    let mut events = vec![StreamEvent::BlockStart {
        index,
        kind: BlockKind::ToolUse {
            id: id.to_string(),
            name: name.to_string(),
        },
    }];
    for chunk in chars.chunks(8) {
        events.push(StreamEvent::BlockDelta {
            index,
            delta: Delta::Json(chunk.iter().collect()),
        });
    }
    events.push(StreamEvent::BlockStop { index });
    events
}

/// A [`ModelClient`] that replays scripted responses in order.
///
/// Every call records the history it was given. Once the script runs out,
/// further calls fail with a provider error.
#[derive(Default)]
pub struct ScriptedModelClient {
    responses: Mutex<VecDeque<ScriptedResponse>>,
    calls: AtomicUsize,
    requests: Mutex<Vec<Vec<Turn>>>,
}

impl ScriptedModelClient {
    pub fn new(responses: Vec<ScriptedResponse>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            ..Default::default()
        }
    }

    /// Queue another response
    pub fn push(&self, response: ScriptedResponse) {
        self.responses.lock().push_back(response);
    }

    /// Number of streams opened so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Histories passed to each call, in call order
    pub fn requests(&self) -> Vec<Vec<Turn>> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl ModelClient for ScriptedModelClient {
    fn model(&self) -> &str {
        "scripted"
    }

    async fn open_stream(&self, history: &[Turn], _tools: &[ToolDefinition]) -> Result<EventStream> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().push(history.to_vec());

        let response = self
            .responses
            .lock()
            .pop_front()
            .ok_or_else(|| Error::Provider("No scripted response left".to_string()))?;

        if let Some(message) = response.open_error {
            return Err(Error::Provider(message));
        }

        let mut items: Vec<Result<StreamEvent>> = response.events.into_iter().map(Ok).collect();
        if let Some(message) = response.stream_error {
            items.push(Err(Error::Provider(message)));
        }

        let replay = futures::stream::iter(items);
        if response.stall {
            Ok(Box::pin(replay.chain(futures::stream::pending())))
        } else {
            Ok(Box::pin(replay))
        }
    }
}
