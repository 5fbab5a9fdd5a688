//! Conversation history: role-tagged turns of typed content blocks.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::tools::filesystem::HIDDEN_READ_RESULT;

/// Prefix of text blocks carrying file content meant only for the model
pub const HIDDEN_CONTENT_MARKER: &str = "Internal file content for analysis (not displayed): ";

/// Origin of a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    /// Human text or tool-result payloads
    #[serde(rename = "user")]
    User,
    /// Model text and tool-invocation requests
    #[serde(rename = "assistant", alias = "model")]
    Model,
}

/// A typed fragment of a turn's payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        input: Value,
    },
    ToolResult {
        tool_use_id: String,
        content: String,
        #[serde(default, skip_serializing_if = "std::ops::Not::not")]
        is_error: bool,
    },
}

impl ContentBlock {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    /// A text block the model sees but the user never does
    pub fn hidden_text(content: &str) -> Self {
        Self::Text {
            text: format!("{}{}", HIDDEN_CONTENT_MARKER, content),
        }
    }

    pub fn is_tool_use(&self) -> bool {
        matches!(self, Self::ToolUse { .. })
    }

    /// Text shown to the user for this block, if any
    fn visible_text(&self) -> Option<&str> {
        match self {
            Self::Text { text } if text.starts_with(HIDDEN_CONTENT_MARKER) => None,
            Self::Text { text } => Some(text),
            Self::ToolUse { .. } => None,
            Self::ToolResult { content, .. } if content == HIDDEN_READ_RESULT => None,
            Self::ToolResult { content, .. } => Some(content),
        }
    }
}

/// Turn payload: a plain string or an ordered block sequence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Blocks(Vec<ContentBlock>),
}

impl MessageContent {
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Text(text) => text.trim().is_empty(),
            Self::Blocks(blocks) => blocks.is_empty(),
        }
    }

    fn into_blocks(self) -> Vec<ContentBlock> {
        match self {
            Self::Text(text) => vec![ContentBlock::Text { text }],
            Self::Blocks(blocks) => blocks,
        }
    }
}

/// One role-tagged entry in the history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: MessageContent,
}

impl Turn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: MessageContent::Text(text.into()),
        }
    }

    pub fn user_blocks(blocks: Vec<ContentBlock>) -> Self {
        Self {
            role: Role::User,
            content: MessageContent::Blocks(blocks),
        }
    }

    pub fn model(text: impl Into<String>) -> Self {
        Self {
            role: Role::Model,
            content: MessageContent::Text(text.into()),
        }
    }

    pub fn model_blocks(blocks: Vec<ContentBlock>) -> Self {
        Self {
            role: Role::Model,
            content: MessageContent::Blocks(blocks),
        }
    }

    /// The human-visible projection of this turn, newline-joined
    pub fn visible_text(&self) -> String {
        match &self.content {
            MessageContent::Text(text) => text.clone(),
            MessageContent::Blocks(blocks) => blocks
                .iter()
                .filter_map(ContentBlock::visible_text)
                .filter(|t| !t.is_empty())
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }

    /// Tool-invocation blocks in order
    pub fn tool_uses(&self) -> impl Iterator<Item = &ContentBlock> {
        let blocks: &[ContentBlock] = match &self.content {
            MessageContent::Blocks(blocks) => blocks,
            MessageContent::Text(_) => &[],
        };
        blocks.iter().filter(|b| b.is_tool_use())
    }
}

/// Ordered conversation history for one chat thread.
///
/// Roles strictly alternate. A user turn pushed after another user turn is
/// merged into it; model turns are never merged or modified once pushed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Conversation {
    turns: Vec<Turn>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_turns(turns: Vec<Turn>) -> Self {
        let mut conversation = Self::new();
        for turn in turns {
            conversation.push(turn);
        }
        conversation
    }

    /// Append a turn, returning its index.
    ///
    /// Empty turns are ignored and `None` is returned.
    pub fn push(&mut self, turn: Turn) -> Option<usize> {
        if turn.content.is_empty() {
            return None;
        }

        if let Some(last) = self.turns.last_mut()
            && last.role == turn.role
            && turn.role == Role::User
        {
            let previous = std::mem::replace(&mut last.content, MessageContent::Blocks(Vec::new()));
            let mut blocks = previous.into_blocks();
            blocks.extend(turn.content.into_blocks());
            last.content = MessageContent::Blocks(blocks);
            return Some(self.turns.len() - 1);
        }

        self.turns.push(turn);
        Some(self.turns.len() - 1)
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn clear(&mut self) {
        self.turns.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_block_wire_shape() {
        let block = ContentBlock::ToolUse {
            id: "toolu_1".into(),
            name: "read_file".into(),
            input: json!({"path": "a.txt"}),
        };
        assert_eq!(
            serde_json::to_value(&block).unwrap(),
            json!({"type": "tool_use", "id": "toolu_1", "name": "read_file", "input": {"path": "a.txt"}})
        );

        let result = ContentBlock::ToolResult {
            tool_use_id: "toolu_1".into(),
            content: "ok".into(),
            is_error: false,
        };
        assert_eq!(
            serde_json::to_value(&result).unwrap(),
            json!({"type": "tool_result", "tool_use_id": "toolu_1", "content": "ok"})
        );
    }

    #[test]
    fn test_model_role_serializes_as_assistant() {
        let turn = Turn::model("hi");
        assert_eq!(
            serde_json::to_value(&turn).unwrap(),
            json!({"role": "assistant", "content": "hi"})
        );
    }

    #[test]
    fn test_consecutive_user_turns_merge() {
        let mut conversation = Conversation::new();
        assert_eq!(conversation.push(Turn::user("first")), Some(0));
        assert_eq!(conversation.push(Turn::user("second")), Some(0));
        assert_eq!(conversation.len(), 1);
        assert_eq!(conversation.turns()[0].visible_text(), "first\nsecond");

        assert_eq!(conversation.push(Turn::model("reply")), Some(1));
        assert_eq!(conversation.push(Turn::model_blocks(vec![])), None);
        assert_eq!(conversation.len(), 2);
    }

    #[test]
    fn test_visible_projection_hides_private_blocks() {
        let turn = Turn::user_blocks(vec![
            ContentBlock::ToolResult {
                tool_use_id: "a".into(),
                content: HIDDEN_READ_RESULT.into(),
                is_error: false,
            },
            ContentBlock::ToolResult {
                tool_use_id: "b".into(),
                content: "File x has been created.".into(),
                is_error: false,
            },
            ContentBlock::hidden_text("secret body"),
        ]);
        assert_eq!(turn.visible_text(), "File x has been created.");

        let model = Turn::model_blocks(vec![
            ContentBlock::text("Looking"),
            ContentBlock::ToolUse {
                id: "c".into(),
                name: "search_files".into(),
                input: json!({"query": "x"}),
            },
        ]);
        assert_eq!(model.visible_text(), "Looking");
        assert_eq!(model.tool_uses().count(), 1);
    }
}
