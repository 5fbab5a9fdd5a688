//! Incremental content-block assembly from stream events

use serde_json::Value;
use tracing::{debug, warn};

use crate::conversation::ContentBlock;
use crate::error::Error;
use crate::provider::{BlockKind, Delta, StreamEvent};

/// What applying one event produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Progress {
    /// Nothing to surface
    Pending,
    /// A text fragment to forward to the user
    Text(String),
    /// The model turn is complete
    Finished,
}

#[derive(Debug)]
enum OpenBody {
    Text(String),
    ToolUse { id: String, name: String, json: String },
}

#[derive(Debug)]
struct OpenBlock {
    index: usize,
    body: OpenBody,
}

/// Builds the content blocks of one model turn from its stream events.
///
/// At most one block is open at a time. Tool input JSON is only parsed when
/// its block closes; a parse failure turns the block into an error text block.
#[derive(Debug, Default)]
pub struct StreamAssembler {
    open: Option<OpenBlock>,
    blocks: Vec<ContentBlock>,
    finished: bool,
    anomalies: usize,
}

impl StreamAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Out-of-order or mismatched events dropped or repaired so far
    pub fn anomalies(&self) -> usize {
        self.anomalies
    }

    /// Blocks finalized so far, in the order they closed
    pub fn blocks(&self) -> &[ContentBlock] {
        &self.blocks
    }

    /// Apply one event
    pub fn apply(&mut self, event: StreamEvent) -> Progress {
        if self.finished {
            debug!("Ignoring event after message stop: {:?}", event);
            return Progress::Finished;
        }

        match event {
            StreamEvent::BlockStart { index, kind } => {
                if let Some(open) = self.open.take() {
                    note_anomaly(
                        &mut self.anomalies,
                        format!(
                            "block {} started while block {} was open; closing the open block",
                            index, open.index
                        ),
                    );
                    self.finalize(open);
                }
                let body = match kind {
                    BlockKind::Text => OpenBody::Text(String::new()),
                    BlockKind::ToolUse { id, name } => OpenBody::ToolUse {
                        id,
                        name,
                        json: String::new(),
                    },
                };
                self.open = Some(OpenBlock { index, body });
                Progress::Pending
            }
            StreamEvent::BlockDelta { index, delta } => {
                let Some(open) = self.open.as_mut().filter(|open| open.index == index) else {
                    note_anomaly(
                        &mut self.anomalies,
                        format!("dropping delta for block {} which is not open", index),
                    );
                    return Progress::Pending;
                };
                match (&mut open.body, delta) {
                    (OpenBody::Text(text), Delta::Text(fragment)) => {
                        text.push_str(&fragment);
                        Progress::Text(fragment)
                    }
                    (OpenBody::ToolUse { json, .. }, Delta::Json(fragment)) => {
                        json.push_str(&fragment);
                        Progress::Pending
                    }
                    (_, delta) => {
                        note_anomaly(
                            &mut self.anomalies,
                            format!("dropping delta of the wrong kind for block {}: {:?}", index, delta),
                        );
                        Progress::Pending
                    }
                }
            }
            StreamEvent::BlockStop { index } => {
                match self.open.take() {
                    Some(open) if open.index == index => self.finalize(open),
                    Some(open) => {
                        let open_index = open.index;
                        self.open = Some(open);
                        note_anomaly(
                            &mut self.anomalies,
                            format!("dropping stop for block {} while block {} is open", index, open_index),
                        );
                    }
                    None => note_anomaly(
                        &mut self.anomalies,
                        format!("dropping stop for block {} with no open block", index),
                    ),
                }
                Progress::Pending
            }
            StreamEvent::MessageStop => {
                self.finished = true;
                Progress::Finished
            }
        }
    }

    fn finalize(&mut self, open: OpenBlock) {
        let block = match open.body {
            OpenBody::Text(text) => ContentBlock::Text { text },
            OpenBody::ToolUse { id, name, json } => match parse_input(&json) {
                Ok(input) => ContentBlock::ToolUse { id, name, input },
                Err(e) => {
                    warn!(tool = %name, id = %id, "{}", e);
                    ContentBlock::text(e.to_string())
                }
            },
        };
        self.blocks.push(block);
    }

    /// Complete the turn after the stream ended, closing any open block
    pub fn finish(mut self) -> Vec<ContentBlock> {
        if let Some(open) = self.open.take() {
            warn!(index = open.index, "Stream ended with an open block");
            self.finalize(open);
        }
        self.blocks
    }

    /// What survives of a cancelled turn: text only, including the open text block
    pub fn into_cancelled(self) -> Vec<ContentBlock> {
        let mut blocks: Vec<ContentBlock> = self
            .blocks
            .into_iter()
            .filter(|block| matches!(block, ContentBlock::Text { text } if !text.is_empty()))
            .collect();
        if let Some(OpenBlock {
            body: OpenBody::Text(text),
            ..
        }) = self.open
            && !text.is_empty()
        {
            blocks.push(ContentBlock::Text { text });
        }
        blocks
    }
}

fn note_anomaly(count: &mut usize, detail: String) {
    *count += 1;
    warn!("{}", Error::StreamProtocol(detail));
}

/// Parse accumulated tool input; an empty buffer means no arguments
fn parse_input(json: &str) -> Result<Value, Error> {
    if json.trim().is_empty() {
        return Ok(Value::Object(Default::default()));
    }
    serde_json::from_str(json).map_err(|e| Error::ToolInputParse(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{text_block, tool_use_block};
    use serde_json::json;

    fn run(events: Vec<StreamEvent>) -> Vec<ContentBlock> {
        let mut assembler = StreamAssembler::new();
        for event in events {
            if assembler.apply(event) == Progress::Finished {
                break;
            }
        }
        assembler.finish()
    }

    #[test]
    fn test_blocks_follow_start_order() {
        let input = json!({"path": "src/lib.rs", "content": "pub fn f() {}\n"});
        let mut events = text_block(0, "Creating it now");
        events.extend(tool_use_block(1, "t1", "create_file", &input));
        events.extend(text_block(2, "Done"));
        events.push(StreamEvent::MessageStop);

        let blocks = run(events);
        assert_eq!(blocks.len(), 3);
        assert_eq!(blocks[0], ContentBlock::text("Creating it now"));
        assert_eq!(
            blocks[1],
            ContentBlock::ToolUse {
                id: "t1".into(),
                name: "create_file".into(),
                input
            }
        );
        assert_eq!(blocks[2], ContentBlock::text("Done"));
    }

    #[test]
    fn test_text_fragments_are_forwarded() {
        let mut assembler = StreamAssembler::new();
        let forwarded: Vec<Progress> = text_block(0, "hello")
            .into_iter()
            .map(|e| assembler.apply(e))
            .filter(|p| matches!(p, Progress::Text(_)))
            .collect();
        assert_eq!(
            forwarded,
            vec![Progress::Text("he".into()), Progress::Text("llo".into())]
        );
    }

    #[test]
    fn test_malformed_json_degrades_to_text() {
        let blocks = run(vec![
            StreamEvent::BlockStart {
                index: 0,
                kind: BlockKind::ToolUse {
                    id: "t1".into(),
                    name: "read_file".into(),
                },
            },
            StreamEvent::BlockDelta {
                index: 0,
                delta: Delta::Json("{\"path\": ".into()),
            },
            StreamEvent::BlockStop { index: 0 },
        ]);

        assert_eq!(blocks.len(), 1);
        match &blocks[0] {
            ContentBlock::Text { text } => assert!(text.starts_with("Error parsing tool input:")),
            other => panic!("expected text block, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_json_means_no_arguments() {
        let blocks = run(vec![
            StreamEvent::BlockStart {
                index: 0,
                kind: BlockKind::ToolUse {
                    id: "t1".into(),
                    name: "search_files".into(),
                },
            },
            StreamEvent::BlockStop { index: 0 },
        ]);
        assert!(matches!(&blocks[0], ContentBlock::ToolUse { input, .. } if *input == json!({})));
    }

    #[test]
    fn test_mismatched_index_deltas_are_dropped() {
        let blocks = run(vec![
            StreamEvent::BlockStart {
                index: 0,
                kind: BlockKind::Text,
            },
            StreamEvent::BlockDelta {
                index: 0,
                delta: Delta::Text("kept".into()),
            },
            StreamEvent::BlockDelta {
                index: 3,
                delta: Delta::Text(" dropped".into()),
            },
            StreamEvent::BlockDelta {
                index: 0,
                delta: Delta::Json("{}".into()),
            },
            StreamEvent::BlockStop { index: 7 },
            StreamEvent::BlockStop { index: 0 },
        ]);
        assert_eq!(blocks, vec![ContentBlock::text("kept")]);
    }

    #[test]
    fn test_anomalies_are_counted() {
        let mut assembler = StreamAssembler::new();
        for event in text_block(0, "clean") {
            assembler.apply(event);
        }
        assert_eq!(assembler.anomalies(), 0);

        assembler.apply(StreamEvent::BlockStop { index: 0 });
        assembler.apply(StreamEvent::BlockStart { index: 1, kind: BlockKind::Text });
        assembler.apply(StreamEvent::BlockDelta { index: 1, delta: Delta::Json("{}".into()) });
        assembler.apply(StreamEvent::BlockStart { index: 2, kind: BlockKind::Text });
        assert_eq!(assembler.anomalies(), 3);
        assert_eq!(assembler.blocks().len(), 2);
    }

    #[test]
    fn test_start_while_open_closes_previous() {
        let blocks = run(vec![
            StreamEvent::BlockStart {
                index: 0,
                kind: BlockKind::Text,
            },
            StreamEvent::BlockDelta {
                index: 0,
                delta: Delta::Text("first".into()),
            },
            StreamEvent::BlockStart {
                index: 1,
                kind: BlockKind::Text,
            },
            StreamEvent::BlockDelta {
                index: 1,
                delta: Delta::Text("second".into()),
            },
            StreamEvent::BlockStop { index: 1 },
        ]);
        assert_eq!(
            blocks,
            vec![ContentBlock::text("first"), ContentBlock::text("second")]
        );
    }

    #[test]
    fn test_message_stop_ends_early() {
        let mut events = text_block(0, "before");
        events.push(StreamEvent::MessageStop);
        events.extend(text_block(1, "after"));

        let blocks = run(events);
        assert_eq!(blocks, vec![ContentBlock::text("before")]);
    }

    #[test]
    fn test_cancelled_keeps_text_only() {
        let mut assembler = StreamAssembler::new();
        let mut events = text_block(0, "Let me look");
        events.extend(tool_use_block(1, "t1", "read_file", &json!({"path": "a"})));
        events.push(StreamEvent::BlockStart {
            index: 2,
            kind: BlockKind::Text,
        });
        events.push(StreamEvent::BlockDelta {
            index: 2,
            delta: Delta::Text("partial".into()),
        });
        for event in events {
            assembler.apply(event);
        }

        assert_eq!(
            assembler.into_cancelled(),
            vec![ContentBlock::text("Let me look"), ContentBlock::text("partial")]
        );
    }

    #[test]
    fn test_cancelled_with_empty_open_text_is_empty() {
        let mut assembler = StreamAssembler::new();
        assembler.apply(StreamEvent::BlockStart {
            index: 0,
            kind: BlockKind::Text,
        });
        assert!(assembler.into_cancelled().is_empty());
    }
}
