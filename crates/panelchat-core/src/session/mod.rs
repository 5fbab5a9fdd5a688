//! Chat panel sessions
//!
//! A panel pairs an [`Orchestrator`] (conversation, model loop, tools) with a
//! command channel from the UI and an event channel back to it.
//!
//! ```text
//! UI ── PanelCommand ──▶ ChatPanel ──▶ Orchestrator ──▶ ModelClient
//!  ▲                                        │
//!  └──────────── PanelEvent ◀───────────────┴──▶ Dispatcher ──▶ tools
//! ```

pub mod assembler;
mod orchestrator;
mod panel;
pub mod persistence;
mod types;

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::error::Result;
use crate::provider::ModelClient;

pub use assembler::{Progress, StreamAssembler};
pub use orchestrator::{ITERATION_LIMIT_MESSAGE, Orchestrator};
pub use panel::{CANCEL_ACK, ChatPanel, user_error_text};
pub use persistence::HistoryStore;
pub use types::{LoopState, PanelCommand, PanelEvent, SendOutcome, SessionConfig};

/// Channel capacity for panel commands and events
pub const CHANNEL_CAPACITY: usize = 256;

/// Build a panel and the channels to drive it.
///
/// When `store` is given, history is loaded from it and saved after every
/// mutation. The returned panel must be run with [`ChatPanel::run`].
pub fn open_panel(
    config: SessionConfig,
    client: Arc<dyn ModelClient>,
    store: Option<HistoryStore>,
) -> Result<(ChatPanel, mpsc::Sender<PanelCommand>, mpsc::Receiver<PanelEvent>)> {
    let (input_tx, input_rx) = mpsc::channel(CHANNEL_CAPACITY);
    let (output_tx, output_rx) = mpsc::channel(CHANNEL_CAPACITY);

    let mut orchestrator = Orchestrator::from_session_config(config, client, output_tx);
    if let Some(store) = store {
        orchestrator = orchestrator.with_store(store)?;
    }

    Ok((ChatPanel::new(orchestrator, input_rx), input_tx, output_rx))
}
