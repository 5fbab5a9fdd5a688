//! Tool dispatcher: runs requested tools and turns failures into text

use std::sync::Arc;

use serde_json::Value;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::ToolError;

use super::{ToolContext, ToolDefinition, ToolOutput, ToolRegistry};

/// Result text recorded for tools interrupted by a cancel
pub const CANCELLED_RESULT: &str = "Cancelled by user";

/// A tool call requested by the model
#[derive(Debug, Clone, PartialEq)]
pub struct ToolInvocation {
    pub id: String,
    pub name: String,
    pub input: Value,
}

/// Outcome of one invocation, always textual
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolResultEntry {
    pub tool_use_id: String,
    pub name: String,
    pub content: String,
    pub is_error: bool,
    /// Model-only text attached to the result
    pub private_context: Option<String>,
    /// Whether `content` may be shown to the user
    pub display: bool,
}

impl ToolResultEntry {
    fn from_output(invocation: &ToolInvocation, output: ToolOutput) -> Self {
        Self {
            tool_use_id: invocation.id.clone(),
            name: invocation.name.clone(),
            content: output.content,
            is_error: false,
            private_context: output.private_context,
            display: output.display,
        }
    }

    fn failure(invocation: &ToolInvocation, message: String) -> Self {
        Self {
            tool_use_id: invocation.id.clone(),
            name: invocation.name.clone(),
            content: message,
            is_error: true,
            private_context: None,
            display: true,
        }
    }

    fn from_error(invocation: &ToolInvocation, err: ToolError) -> Self {
        Self::failure(invocation, format!("Error: {}", err))
    }

    fn settle(invocation: &ToolInvocation, result: Result<ToolOutput, ToolError>) -> Self {
        match result {
            Ok(output) => Self::from_output(invocation, output),
            Err(e) => {
                info!(tool = %invocation.name, id = %invocation.id, "Tool failed: {}", e);
                Self::from_error(invocation, e)
            }
        }
    }
}

/// Results for one batch of sibling invocations
#[derive(Debug, Clone)]
pub struct BatchOutcome {
    /// One entry per invocation, in invocation order
    pub results: Vec<ToolResultEntry>,
    /// The batch was interrupted by a cancel
    pub cancelled: bool,
}

/// Executes tools from a registry
#[derive(Clone)]
pub struct Dispatcher {
    registry: Arc<ToolRegistry>,
}

impl Dispatcher {
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self { registry }
    }

    /// The tool catalog sent with each model request
    pub fn catalog(&self) -> Vec<ToolDefinition> {
        self.registry.list()
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Execute a single tool, propagating its error
    pub async fn execute(&self, name: &str, input: Value, ctx: ToolContext) -> Result<ToolOutput, ToolError> {
        let tool = self
            .registry
            .get(name)
            .ok_or_else(|| ToolError::UnknownTool(name.to_string()))?;
        tool.execute(input, ctx).await
    }

    /// Execute a single invocation; errors become `Error: <message>` results
    pub async fn run(&self, invocation: &ToolInvocation, ctx: ToolContext) -> ToolResultEntry {
        let result = self.execute(&invocation.name, invocation.input.clone(), ctx).await;
        ToolResultEntry::settle(invocation, result)
    }

    /// Execute sibling invocations concurrently.
    ///
    /// All tools run to completion (success or error) before this returns,
    /// unless `cancel` fires; then finished results are kept and the rest
    /// are recorded as cancelled.
    pub async fn execute_all(
        &self,
        invocations: &[ToolInvocation],
        ctx: ToolContext,
        cancel: &CancellationToken,
    ) -> BatchOutcome {
        let mut slots: Vec<Option<ToolResultEntry>> = vec![None; invocations.len()];
        let mut join_set: JoinSet<(usize, Result<ToolOutput, ToolError>)> = JoinSet::new();

        for (i, invocation) in invocations.iter().enumerate() {
            match self.registry.get(&invocation.name) {
                Some(tool) => {
                    debug!(tool = %invocation.name, id = %invocation.id, input = %invocation.input, "Executing tool");
                    let input = invocation.input.clone();
                    join_set.spawn(async move { (i, tool.execute(input, ctx).await) });
                }
                None => {
                    warn!(tool = %invocation.name, id = %invocation.id, "Model requested unknown tool");
                    slots[i] = Some(ToolResultEntry::from_error(
                        invocation,
                        ToolError::UnknownTool(invocation.name.clone()),
                    ));
                }
            }
        }

        let mut cancelled = false;
        loop {
            tokio::select! {
                joined = join_set.join_next() => {
                    match joined {
                        Some(Ok((i, result))) => {
                            slots[i] = Some(ToolResultEntry::settle(&invocations[i], result));
                        }
                        Some(Err(e)) => {
                            error!("Tool task failed: {:?}", e);
                        }
                        None => break,
                    }
                }
                _ = cancel.cancelled() => {
                    while let Some(joined) = join_set.try_join_next() {
                        if let Ok((i, result)) = joined {
                            slots[i] = Some(ToolResultEntry::settle(&invocations[i], result));
                        }
                    }
                    join_set.abort_all();
                    cancelled = true;
                    break;
                }
            }
        }

        let results = slots
            .into_iter()
            .zip(invocations)
            .map(|(slot, invocation)| {
                slot.unwrap_or_else(|| {
                    let message = if cancelled {
                        CANCELLED_RESULT.to_string()
                    } else {
                        "Error: tool task terminated unexpectedly".to_string()
                    };
                    ToolResultEntry::failure(invocation, message)
                })
            })
            .collect();

        BatchOutcome { results, cancelled }
    }
}
