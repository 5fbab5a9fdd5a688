//! Turn orchestrator - the bounded tool-use loop
//!
//! Owns the conversation for one panel. Each user send streams a model turn,
//! runs any requested tools, feeds their results back as the next user turn,
//! and repeats until the model stops asking for tools or the iteration cap
//! is hit.

use std::sync::Arc;

use futures::StreamExt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::SessionSettings;
use crate::conversation::{ContentBlock, Conversation, Role, Turn};
use crate::error::{Error, Result};
use crate::provider::logging::{LogEntry, log_model_interaction};
use crate::provider::ModelClient;
use crate::tools::{
    Dispatcher, ToolContext, ToolDefinition, ToolInvocation, ToolRegistryBuilder, ToolResultEntry,
};

use super::assembler::{Progress, StreamAssembler};
use super::persistence::HistoryStore;
use super::types::{LoopState, PanelEvent, SendOutcome, SessionConfig};

/// Advisory appended when the iteration cap stops the loop
pub const ITERATION_LIMIT_MESSAGE: &str = "Maximum tool use iterations reached. Please try rephrasing your request or breaking it into smaller tasks.";

/// Runs user sends against the model and tools
pub struct Orchestrator {
    client: Arc<dyn ModelClient>,
    dispatcher: Dispatcher,
    catalog: Vec<ToolDefinition>,
    settings: SessionSettings,
    conversation: Conversation,
    store: Option<HistoryStore>,
    output: mpsc::Sender<PanelEvent>,
    state: LoopState,
    /// Next id handed to the UI; never reused, even across new threads
    next_message_id: u64,
}

impl Orchestrator {
    /// Create an orchestrator with an explicit dispatcher
    pub fn new(
        client: Arc<dyn ModelClient>,
        dispatcher: Dispatcher,
        settings: SessionSettings,
        output: mpsc::Sender<PanelEvent>,
    ) -> Self {
        let catalog = dispatcher.catalog();
        Self {
            client,
            dispatcher,
            catalog,
            settings,
            conversation: Conversation::new(),
            store: None,
            output,
            state: LoopState::Idle,
            next_message_id: 0,
        }
    }

    /// Create an orchestrator whose tools are built from `config`
    pub fn from_session_config(
        config: SessionConfig,
        client: Arc<dyn ModelClient>,
        output: mpsc::Sender<PanelEvent>,
    ) -> Self {
        let registry = ToolRegistryBuilder::new(config.workspace)
            .with_terminal_if(config.settings.enable_terminal, config.terminal)
            .build();
        let dispatcher = Dispatcher::new(Arc::new(registry));
        Self::new(client, dispatcher, config.settings, output)
    }

    /// Persist history through `store`, loading whatever it already holds
    pub fn with_store(mut self, mut store: HistoryStore) -> Result<Self> {
        if let Some(saved) = store.load()? {
            info!(turns = saved.len(), "Restored conversation history");
            self.conversation = saved;
        }
        self.store = Some(store);
        Ok(self)
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn catalog(&self) -> &[ToolDefinition] {
        &self.catalog
    }

    pub(crate) fn output(&self) -> &mpsc::Sender<PanelEvent> {
        &self.output
    }

    /// Run one user send to completion.
    ///
    /// Returns `Error::Cancelled` when `cancel` fires; history is left
    /// consistent up to the last completed turn. Model client errors abort
    /// the send.
    pub async fn handle_send(&mut self, text: &str, cancel: &CancellationToken) -> Result<SendOutcome> {
        let result = self.run_loop(text, cancel).await;
        self.state = LoopState::Idle;
        result
    }

    async fn run_loop(&mut self, text: &str, cancel: &CancellationToken) -> Result<SendOutcome> {
        let ctx = ToolContext {
            show_contents: self.settings.wants_contents_shown(text),
        };

        self.push_turn(Turn::user(text));
        let message_id = self.allocate_message_id();
        self.emit(PanelEvent::AddUserMessage {
            text: text.to_string(),
            message_id,
        })
        .await;

        let max_iterations = self.settings.max_iterations;
        let mut iteration = 0;

        loop {
            if iteration >= max_iterations {
                warn!("{}", Error::IterationLimitExceeded(max_iterations));
                self.push_turn(Turn::model(ITERATION_LIMIT_MESSAGE));
                let message_id = self.allocate_message_id();
                self.emit(PanelEvent::AddAssistantMessage {
                    text: ITERATION_LIMIT_MESSAGE.to_string(),
                    message_id,
                })
                .await;
                return Ok(SendOutcome::IterationLimit);
            }
            iteration += 1;
            debug!(iteration, "Starting model pass");

            let (message_id, blocks) = self.model_pass(iteration, cancel).await?;

            let invocations: Vec<ToolInvocation> = blocks
                .iter()
                .filter_map(|block| match block {
                    ContentBlock::ToolUse { id, name, input } => Some(ToolInvocation {
                        id: id.clone(),
                        name: name.clone(),
                        input: input.clone(),
                    }),
                    _ => None,
                })
                .collect();

            let visible = join_text(&blocks);
            self.push_turn(Turn::model_blocks(blocks));
            if !visible.is_empty() {
                self.emit(PanelEvent::AddAssistantMessage {
                    text: visible,
                    message_id,
                })
                .await;
            }

            if invocations.is_empty() {
                info!(iterations = iteration, "Model finished without tool requests");
                return Ok(SendOutcome::Completed { iterations: iteration });
            }

            self.run_tools(&invocations, ctx, cancel).await?;
        }
    }

    /// Stream one model turn and return its message id and finalized blocks
    async fn model_pass(
        &mut self,
        iteration: usize,
        cancel: &CancellationToken,
    ) -> Result<(u64, Vec<ContentBlock>)> {
        self.state = LoopState::AwaitingModel;

        let opened = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                info!("Cancelled while waiting for the model");
                return Err(Error::Cancelled);
            }
            opened = self.client.open_stream(self.conversation.turns(), &self.catalog) => opened,
        };
        let mut stream = match opened {
            Ok(stream) => stream,
            Err(e) => {
                error!("Failed to open model stream: {}", e);
                self.log_pass(iteration, None, false, Some(&e));
                return Err(e);
            }
        };

        let pending_id = self.allocate_message_id();
        self.emit(PanelEvent::StartAssistantResponse { message_id: pending_id }).await;
        self.state = LoopState::StreamingAssembly;

        let mut assembler = StreamAssembler::new();
        let streamed: Result<()> = loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break Err(Error::Cancelled),
                next = stream.next() => match next {
                    Some(Ok(event)) => match assembler.apply(event) {
                        Progress::Text(fragment) => {
                            self.emit(PanelEvent::AppendAssistantResponse {
                                text: fragment,
                                message_id: pending_id,
                            })
                            .await;
                        }
                        Progress::Finished => break Ok(()),
                        Progress::Pending => {}
                    },
                    Some(Err(e)) => break Err(e),
                    None => break Ok(()),
                },
            }
        };
        drop(stream);

        self.emit(PanelEvent::CompleteAssistantResponse { message_id: pending_id }).await;

        match streamed {
            Ok(()) => {
                let anomalies = assembler.anomalies();
                if anomalies > 0 {
                    warn!(iteration, anomalies, "Model stream had protocol anomalies");
                }
                let mut blocks = assembler.finish();
                blocks.retain(|block| !matches!(block, ContentBlock::Text { text } if text.is_empty()));
                self.log_pass(iteration, Some(&blocks), false, None);
                Ok((pending_id, blocks))
            }
            Err(Error::Cancelled) => {
                let kept = assembler.into_cancelled();
                info!(kept_blocks = kept.len(), "Model stream cancelled");
                self.log_pass(iteration, Some(&kept), true, None);
                if kept.is_empty() {
                    debug!("Discarding empty model turn");
                } else {
                    self.push_turn(Turn::model_blocks(kept));
                }
                Err(Error::Cancelled)
            }
            Err(e) => {
                error!("Model stream failed: {}", e);
                self.log_pass(iteration, Some(assembler.blocks()), false, Some(&e));
                Err(e)
            }
        }
    }

    /// Execute sibling tool calls and append their results as one user turn
    async fn run_tools(
        &mut self,
        invocations: &[ToolInvocation],
        ctx: ToolContext,
        cancel: &CancellationToken,
    ) -> Result<()> {
        self.state = LoopState::ExecutingTools;
        info!(
            tools = ?invocations.iter().map(|i| i.name.as_str()).collect::<Vec<_>>(),
            "Processing tool uses"
        );

        let outcome = self.dispatcher.execute_all(invocations, ctx, cancel).await;

        self.push_turn(results_turn(&outcome.results));

        if outcome.cancelled {
            info!("Tool execution cancelled");
            return Err(Error::Cancelled);
        }

        let visible = outcome
            .results
            .iter()
            .filter(|r| r.display && !r.content.is_empty())
            .map(|r| r.content.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        if !visible.is_empty() {
            let message_id = self.allocate_message_id();
            self.emit(PanelEvent::AddAssistantMessage { text: visible, message_id })
            .await;
        }

        Ok(())
    }

    /// Clear the conversation and tell the UI
    pub async fn new_thread(&mut self) {
        self.conversation.clear();
        self.state = LoopState::Idle;
        self.persist();
        info!("Started new thread");
        self.emit(PanelEvent::ClearChat).await;
    }

    /// Replay the human-visible projection of the history
    pub async fn restore_history(&mut self) {
        let replay: Vec<(Role, String)> = self
            .conversation
            .turns()
            .iter()
            .map(|turn| (turn.role, turn.visible_text()))
            .filter(|(_, text)| !text.is_empty())
            .collect();

        for (role, text) in replay {
            let message_id = self.allocate_message_id();
            let event = match role {
                Role::User => PanelEvent::AddUserMessage { text, message_id },
                Role::Model => PanelEvent::AddAssistantMessage { text, message_id },
            };
            self.emit(event).await;
        }
    }

    fn allocate_message_id(&mut self) -> u64 {
        let id = self.next_message_id;
        self.next_message_id += 1;
        id
    }

    /// Append a turn and persist; empty turns are dropped
    fn push_turn(&mut self, turn: Turn) {
        if self.conversation.push(turn).is_some() {
            self.persist();
        }
    }

    fn persist(&self) {
        if let Some(store) = &self.store
            && let Err(e) = store.save(&self.conversation)
        {
            warn!("Failed to save history: {}", e);
        }
    }

    fn log_pass(&self, iteration: usize, blocks: Option<&[ContentBlock]>, cancelled: bool, error: Option<&Error>) {
        let error = error.map(|e| e.to_string());
        log_model_interaction(LogEntry {
            model: self.client.model(),
            iteration,
            history: self.conversation.turns(),
            tools: &self.catalog,
            blocks,
            cancelled,
            error: error.as_deref(),
        });
    }

    pub(crate) async fn emit(&self, event: PanelEvent) {
        if let Err(e) = self.output.send(event).await {
            debug!("Panel output closed, dropping event: {:?}", e.0);
        }
    }
}

/// Newline-joined text of the non-empty text blocks
fn join_text(blocks: &[ContentBlock]) -> String {
    blocks
        .iter()
        .filter_map(|block| match block {
            ContentBlock::Text { text } if !text.is_empty() => Some(text.as_str()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// User turn carrying tool results, followed by model-only content blocks
fn results_turn(results: &[ToolResultEntry]) -> Turn {
    let mut blocks: Vec<ContentBlock> = results
        .iter()
        .map(|r| ContentBlock::ToolResult {
            tool_use_id: r.tool_use_id.clone(),
            content: r.content.clone(),
            is_error: r.is_error,
        })
        .collect();
    blocks.extend(
        results
            .iter()
            .filter_map(|r| r.private_context.as_deref())
            .map(ContentBlock::hidden_text),
    );
    Turn::user_blocks(blocks)
}
