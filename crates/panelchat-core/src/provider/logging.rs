//! Model request/response logging
//!
//! Set the `PANELCHAT_LLM_LOG` environment variable to append one JSON line
//! per model pass (request, assembled outcome or error) to that file.
//!
//! Example: `PANELCHAT_LLM_LOG=/tmp/panelchat-llm.log panelchat serve`

use std::io::Write;

use serde_json::json;
use tracing::{debug, warn};

use crate::conversation::{ContentBlock, Turn};
use crate::tools::ToolDefinition;

/// Environment variable naming the log file
pub const LLM_LOG_ENV: &str = "PANELCHAT_LLM_LOG";

/// What to include in one log entry
#[derive(Default)]
pub struct LogEntry<'a> {
    pub model: &'a str,
    pub iteration: usize,
    pub history: &'a [Turn],
    pub tools: &'a [ToolDefinition],
    /// Blocks assembled from the stream
    pub blocks: Option<&'a [ContentBlock]>,
    pub cancelled: bool,
    pub error: Option<&'a str>,
}

/// Append `entry` to the file named by `PANELCHAT_LLM_LOG`, if set
pub fn log_model_interaction(entry: LogEntry<'_>) {
    let Ok(log_file) = std::env::var(LLM_LOG_ENV) else {
        return;
    };
    if log_file.trim().is_empty() {
        return;
    }

    let record = json!({
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "model": entry.model,
        "iteration": entry.iteration,
        "request": {
            "messages": entry.history,
            "message_count": entry.history.len(),
            "tools": entry.tools.iter().map(|t| t.name.as_str()).collect::<Vec<_>>(),
        },
        "response": {
            "blocks": entry.blocks,
            "cancelled": entry.cancelled,
        },
        "error": entry.error,
    });

    let line = match serde_json::to_string(&record) {
        Ok(line) => line,
        Err(e) => {
            warn!("Failed to serialize model log entry: {}", e);
            return;
        }
    };

    match std::fs::OpenOptions::new().create(true).append(true).open(&log_file) {
        Ok(mut file) => {
            if let Err(e) = writeln!(file, "{}", line) {
                warn!("Failed to write to model log file: {}", e);
            }
        }
        Err(e) => warn!("Failed to open model log file {}: {}", log_file, e),
    }

    debug!("Logged model interaction to {}", log_file);
}
