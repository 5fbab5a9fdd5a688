//! JSON-lines panel host
//!
//! Each stdin line is one `PanelCommand`; each `PanelEvent` is written to
//! stdout as one line. Stdin EOF closes the panel once in-flight work ends.

use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{info, warn};

use panelchat_core::provider::ModelClient;
use panelchat_core::session::{HistoryStore, PanelCommand, SessionConfig, open_panel};

pub async fn run(
    session: SessionConfig,
    client: Arc<dyn ModelClient>,
    store: Option<HistoryStore>,
) -> anyhow::Result<()> {
    let (panel, input_tx, mut output_rx) = open_panel(session, client, store)?;
    let panel_task = tokio::spawn(panel.run());

    let writer = tokio::spawn(async move {
        let mut stdout = tokio::io::stdout();
        while let Some(event) = output_rx.recv().await {
            let line = match serde_json::to_string(&event) {
                Ok(line) => line,
                Err(e) => {
                    warn!("Failed to serialize panel event: {}", e);
                    continue;
                }
            };
            if stdout.write_all(line.as_bytes()).await.is_err()
                || stdout.write_all(b"\n").await.is_err()
                || stdout.flush().await.is_err()
            {
                warn!("stdout closed; stopping event writer");
                break;
            }
        }
    });

    info!("Serving panel protocol on stdio");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<PanelCommand>(line) {
            Ok(command) => {
                if input_tx.send(command).await.is_err() {
                    warn!("Panel closed; ignoring further input");
                    break;
                }
            }
            Err(e) => warn!("Ignoring malformed command {:?}: {}", line, e),
        }
    }

    drop(input_tx);
    panel_task.await?;
    writer.await?;
    info!("Panel host stopped");
    Ok(())
}
