//! Model client abstraction
//!
//! The orchestrator depends only on the [`StreamEvent`] contract below; the
//! vendor transport lives behind [`ModelClient`].

mod anthropic;
pub mod logging;
mod mock;
pub mod wire;

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;

use crate::conversation::Turn;
use crate::error::Result;
use crate::tools::ToolDefinition;

pub use anthropic::AnthropicClient;
pub use mock::{ScriptedModelClient, ScriptedResponse, text_block, tool_use_block};

/// Kind of a content block opened by the stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockKind {
    Text,
    ToolUse { id: String, name: String },
}

/// Incremental payload for an open block
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delta {
    Text(String),
    Json(String),
}

/// One incremental unit of a streamed model turn
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    BlockStart { index: usize, kind: BlockKind },
    BlockDelta { index: usize, delta: Delta },
    BlockStop { index: usize },
    MessageStop,
}

/// Boxed stream of model events
pub type EventStream = Pin<Box<dyn Stream<Item = Result<StreamEvent>> + Send>>;

/// A streaming chat-completion backend
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// Model identifier, used for logging
    fn model(&self) -> &str;

    /// Open a streamed model turn for `history` with `tools` available.
    ///
    /// Fails with `MissingCredential` when no API key can be resolved.
    async fn open_stream(&self, history: &[Turn], tools: &[ToolDefinition]) -> Result<EventStream>;
}
