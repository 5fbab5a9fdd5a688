//! Presentation relay - routes UI commands to the orchestrator
//!
//! A dispatcher task reads panel commands as they arrive so a cancel can
//! interrupt a send in flight. Sends, new-thread and restore requests are
//! queued to the panel loop, which owns the orchestrator.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::error::Error;

use super::orchestrator::Orchestrator;
use super::types::{PanelCommand, PanelEvent};

/// Cancel acknowledgement text
pub const CANCEL_ACK: &str = "Request cancelled by user";

const ERROR_HINT: &str = "Check file permissions, or make sure the workspace folder includes the file. Use a file search to verify file accessibility.";

/// Queued work for the panel loop
#[derive(Debug)]
enum Work {
    Send { text: String, cancel: CancellationToken },
    NewThread,
    RestoreHistory,
}

/// One chat panel: an orchestrator driven by a command channel
pub struct ChatPanel {
    orchestrator: Orchestrator,
    work_rx: mpsc::UnboundedReceiver<Work>,
    busy: Arc<AtomicBool>,
}

impl ChatPanel {
    /// Create a panel reading commands from `input_rx`.
    ///
    /// Must be called within a tokio runtime; the command dispatcher task is
    /// spawned immediately.
    pub fn new(orchestrator: Orchestrator, mut input_rx: mpsc::Receiver<PanelCommand>) -> Self {
        let (work_tx, work_rx) = mpsc::unbounded_channel();
        let busy = Arc::new(AtomicBool::new(false));
        let busy_for_dispatcher = busy.clone();
        let output = orchestrator.output().clone();

        tokio::spawn(async move {
            info!("Panel dispatcher started");
            let mut current: Option<CancellationToken> = None;

            while let Some(command) = input_rx.recv().await {
                debug!("Panel command: {:?}", command);
                let work = match command {
                    PanelCommand::SendMessage { text } => {
                        if text.trim().is_empty() {
                            debug!("Ignoring empty message");
                            continue;
                        }
                        if busy_for_dispatcher.swap(true, Ordering::SeqCst) {
                            if let Err(e) = output.send(PanelEvent::error(Error::Busy.to_string())).await {
                                debug!("Panel output closed, dropping event: {:?}", e.0);
                            }
                            continue;
                        }
                        let cancel = CancellationToken::new();
                        current = Some(cancel.clone());
                        Work::Send { text, cancel }
                    }
                    PanelCommand::CancelMessage => {
                        match current.as_ref().filter(|_| busy_for_dispatcher.load(Ordering::SeqCst)) {
                            Some(token) => token.cancel(),
                            None => debug!("Nothing to cancel"),
                        }
                        continue;
                    }
                    PanelCommand::NewThread => {
                        if busy_for_dispatcher.load(Ordering::SeqCst)
                            && let Some(token) = current.as_ref()
                        {
                            info!("New thread requested during a send; cancelling it first");
                            token.cancel();
                        }
                        Work::NewThread
                    }
                    PanelCommand::RestoreHistory => Work::RestoreHistory,
                };

                if work_tx.send(work).is_err() {
                    error!("Panel dispatcher: loop receiver dropped");
                    break;
                }
            }
            info!("Panel dispatcher ended (input channel closed)");
        });

        Self {
            orchestrator,
            work_rx,
            busy,
        }
    }

    /// Process queued work until the command channel closes
    pub async fn run(mut self) {
        while let Some(work) = self.work_rx.recv().await {
            match work {
                Work::Send { text, cancel } => {
                    self.handle_send(&text, &cancel).await;
                    self.busy.store(false, Ordering::SeqCst);
                }
                Work::NewThread => self.orchestrator.new_thread().await,
                Work::RestoreHistory => self.orchestrator.restore_history().await,
            }
        }
        info!("Panel loop ended");
    }

    async fn handle_send(&mut self, text: &str, cancel: &CancellationToken) {
        match self.orchestrator.handle_send(text, cancel).await {
            Ok(outcome) => debug!("Send finished: {:?}", outcome),
            Err(Error::Cancelled) => {
                self.orchestrator
                    .emit(PanelEvent::CancelSuccess {
                        text: CANCEL_ACK.to_string(),
                    })
                    .await;
            }
            Err(e) => {
                error!("Send failed: {}", e);
                self.orchestrator.emit(PanelEvent::error(user_error_text(&e))).await;
            }
        }
    }
}

/// User-visible error text, with a hint for file access failures
pub fn user_error_text(err: &Error) -> String {
    let message = err.to_string();
    if message.contains("cannot read") || message.contains("not found") {
        format!("{}\n{}", message, ERROR_HINT)
    } else {
        message
    }
}
