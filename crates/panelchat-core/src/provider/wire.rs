//! Messages API wire format: request body and server-sent event payloads

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{error, trace};

use crate::config::ProviderConfig;
use crate::conversation::Turn;
use crate::error::{Error, Result};
use crate::tools::ToolDefinition;

use super::{BlockKind, Delta, StreamEvent};

/// Body of a streamed messages request
#[derive(Debug, Serialize)]
pub struct MessagesRequest<'a> {
    pub model: &'a str,
    pub max_tokens: u32,
    pub stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<&'a str>,
    pub messages: &'a [Turn],
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<WireTool<'a>>,
}

impl<'a> MessagesRequest<'a> {
    pub fn new(config: &'a ProviderConfig, history: &'a [Turn], tools: &'a [ToolDefinition]) -> Self {
        Self {
            model: &config.model,
            max_tokens: config.max_tokens,
            stream: true,
            system: config.system_prompt.as_deref().filter(|s| !s.trim().is_empty()),
            messages: history,
            tools: tools.iter().map(WireTool::from).collect(),
        }
    }
}

/// Tool descriptor in the vendor's shape
#[derive(Debug, Serialize)]
pub struct WireTool<'a> {
    pub name: &'a str,
    pub description: &'a str,
    pub input_schema: &'a Value,
}

impl<'a> From<&'a ToolDefinition> for WireTool<'a> {
    fn from(def: &'a ToolDefinition) -> Self {
        Self {
            name: &def.name,
            description: &def.description,
            input_schema: &def.parameters,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ContentBlockStart {
    index: usize,
    content_block: StartBlock,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum StartBlock {
    #[serde(rename = "text")]
    Text {
        #[serde(default)]
        text: String,
    },
    #[serde(rename = "tool_use")]
    ToolUse { id: String, name: String },
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Deserialize)]
struct ContentBlockDelta {
    index: usize,
    delta: DeltaBody,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum DeltaBody {
    #[serde(rename = "text_delta")]
    TextDelta { text: String },
    #[serde(rename = "input_json_delta")]
    InputJsonDelta { partial_json: String },
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Deserialize)]
struct ContentBlockStop {
    index: usize,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorDetails,
}

#[derive(Debug, Deserialize)]
struct ErrorDetails {
    #[serde(rename = "type")]
    error_type: String,
    message: String,
}

/// Extract a readable message from an error response body
pub fn error_message(body: &str) -> Option<String> {
    serde_json::from_str::<ErrorEnvelope>(body)
        .ok()
        .map(|e| format!("{}: {}", e.error.error_type, e.error.message))
}

fn parse<T: for<'de> Deserialize<'de>>(event: &str, data: &str) -> Option<T> {
    match serde_json::from_str(data) {
        Ok(value) => Some(value),
        Err(e) => {
            error!("SSE parsing error for {}: {}, data: {}", event, e, data);
            None
        }
    }
}

/// Map one server-sent event to zero or more stream events.
///
/// Events that carry nothing for the orchestrator (`message_start`,
/// `message_delta`, `ping`, thinking blocks) map to nothing.
pub fn map_sse(event: &str, data: &str) -> Vec<Result<StreamEvent>> {
    trace!("SSE [{}] {}", event, data);

    match event {
        "content_block_start" => {
            let Some(start) = parse::<ContentBlockStart>(event, data) else {
                return Vec::new();
            };
            match start.content_block {
                StartBlock::Text { text } => {
                    let mut events = vec![Ok(StreamEvent::BlockStart {
                        index: start.index,
                        kind: BlockKind::Text,
                    })];
                    if !text.is_empty() {
                        events.push(Ok(StreamEvent::BlockDelta {
                            index: start.index,
                            delta: Delta::Text(text),
                        }));
                    }
                    events
                }
                StartBlock::ToolUse { id, name } => vec![Ok(StreamEvent::BlockStart {
                    index: start.index,
                    kind: BlockKind::ToolUse { id, name },
                })],
                StartBlock::Unknown => Vec::new(),
            }
        }
        "content_block_delta" => {
            let Some(delta) = parse::<ContentBlockDelta>(event, data) else {
                return Vec::new();
            };
            let mapped = match delta.delta {
                DeltaBody::TextDelta { text } => Delta::Text(text),
                DeltaBody::InputJsonDelta { partial_json } => Delta::Json(partial_json),
                DeltaBody::Unknown => return Vec::new(),
            };
            vec![Ok(StreamEvent::BlockDelta {
                index: delta.index,
                delta: mapped,
            })]
        }
        "content_block_stop" => parse::<ContentBlockStop>(event, data)
            .map(|stop| vec![Ok(StreamEvent::BlockStop { index: stop.index })])
            .unwrap_or_default(),
        "message_stop" => vec![Ok(StreamEvent::MessageStop)],
        "error" => {
            let message = error_message(data).unwrap_or_else(|| data.to_string());
            vec![Err(Error::Provider(message))]
        }
        _ => Vec::new(),
    }
}
