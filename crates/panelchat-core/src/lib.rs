//! panelchat core library
//!
//! A chat panel backed by a streaming model API, with a bounded tool-use loop
//! over a small set of workspace tools.

pub mod config;
pub mod conversation;
pub mod error;
pub mod provider;
pub mod session;
pub mod tools;

pub use config::{Config, ConfigManager};
pub use conversation::{ContentBlock, Conversation, MessageContent, Role, Turn};
pub use error::{Error, Result, ToolError};
pub use provider::{AnthropicClient, ModelClient, StreamEvent};
pub use session::{ChatPanel, Orchestrator, PanelCommand, PanelEvent, SessionConfig, open_panel};
pub use tools::{Dispatcher, Tool, ToolDefinition, ToolOutput, ToolRegistry};
