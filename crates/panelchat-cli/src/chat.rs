//! Interactive terminal surface and one-shot mode

use std::io::Write;
use std::sync::Arc;

use console::style;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use panelchat_core::Error;
use panelchat_core::provider::ModelClient;
use panelchat_core::session::{
    CHANNEL_CAPACITY, HistoryStore, Orchestrator, PanelCommand, PanelEvent, SessionConfig, open_panel,
    user_error_text,
};

/// Renders panel events to the terminal
#[derive(Default)]
struct Printer {
    /// Turn whose text was streamed, so its final message is not printed twice
    streamed: Option<u64>,
    mid_line: bool,
}

impl Printer {
    fn render(&mut self, event: PanelEvent) {
        match event {
            PanelEvent::AddUserMessage { .. } => {}
            PanelEvent::StartAssistantResponse { .. } => {}
            PanelEvent::AppendAssistantResponse { text, message_id } => {
                if !self.mid_line {
                    print!("{} ", style("Assistant:").bold().green());
                }
                print!("{}", text);
                let _ = std::io::stdout().flush();
                self.mid_line = true;
                self.streamed = Some(message_id);
            }
            PanelEvent::CompleteAssistantResponse { .. } => self.end_line(),
            PanelEvent::AddAssistantMessage { text, message_id } => {
                if self.streamed == Some(message_id) {
                    return;
                }
                self.end_line();
                println!("{} {}", style("Assistant:").bold().green(), text);
            }
            PanelEvent::CancelSuccess { text } => {
                self.end_line();
                println!("{}", style(text).yellow());
            }
            PanelEvent::Error { text } => {
                self.end_line();
                println!("{}", style(format!("Error: {}", text)).red());
            }
            PanelEvent::ClearChat => {
                self.end_line();
                self.streamed = None;
                println!("{}", style("Started a new thread").dim());
            }
        }
    }

    fn end_line(&mut self) {
        if self.mid_line {
            println!();
            self.mid_line = false;
        }
    }
}

/// Replay a restored history as it would have appeared
fn render_history(event: PanelEvent) {
    match event {
        PanelEvent::AddUserMessage { text, .. } => println!("{} {}", style("You:").bold().cyan(), text),
        PanelEvent::AddAssistantMessage { text, .. } => {
            println!("{} {}", style("Assistant:").bold().green(), text)
        }
        other => debug!("Unexpected event during restore: {:?}", other),
    }
}

pub async fn run(
    session: SessionConfig,
    client: Arc<dyn ModelClient>,
    store: Option<HistoryStore>,
) -> anyhow::Result<()> {
    let restoring = store.is_some();
    let (panel, input_tx, mut output_rx) = open_panel(session, client, store)?;
    let panel_task = tokio::spawn(panel.run());

    println!("{}", style("panelchat").bold());
    println!(
        "{}",
        style("Type a message. /new starts a new thread, /quit exits, Ctrl-C cancels a response.").dim()
    );
    println!();

    let mut in_restore = false;
    if restoring {
        input_tx.send(PanelCommand::RestoreHistory).await?;
        in_restore = true;
    }

    let mut printer = Printer::default();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                let line = line.trim();
                in_restore = false;
                let command = match line {
                    "" => continue,
                    "/quit" | "/exit" => break,
                    "/new" => PanelCommand::NewThread,
                    "/history" => {
                        in_restore = true;
                        PanelCommand::RestoreHistory
                    }
                    text => PanelCommand::send(text),
                };
                if input_tx.send(command).await.is_err() {
                    break;
                }
            }
            event = output_rx.recv() => {
                let Some(event) = event else { break };
                if in_restore {
                    render_history(event);
                } else {
                    printer.render(event);
                }
            }
            _ = tokio::signal::ctrl_c() => {
                if input_tx.send(PanelCommand::CancelMessage).await.is_err() {
                    break;
                }
            }
        }
    }

    drop(input_tx);
    panel_task.abort();
    Ok(())
}

/// Send one prompt, print the response, and exit
pub async fn run_one_shot(
    session: SessionConfig,
    client: Arc<dyn ModelClient>,
    store: Option<HistoryStore>,
    prompt: &str,
) -> anyhow::Result<()> {
    let (output_tx, mut output_rx) = mpsc::channel(CHANNEL_CAPACITY);
    let mut orchestrator = Orchestrator::from_session_config(session, client, output_tx);
    if let Some(store) = store {
        orchestrator = orchestrator.with_store(store)?;
    }

    let printer = tokio::spawn(async move {
        let mut printer = Printer::default();
        while let Some(event) = output_rx.recv().await {
            printer.render(event);
        }
    });

    let cancel = CancellationToken::new();
    let cancel_on_signal = cancel.clone();
    let signal = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel_on_signal.cancel();
        }
    });

    let result = orchestrator.handle_send(prompt, &cancel).await;
    signal.abort();
    drop(orchestrator);
    printer.await?;

    match result {
        Ok(_) => Ok(()),
        Err(Error::Cancelled) => {
            println!("{}", style(panelchat_core::session::CANCEL_ACK).yellow());
            Ok(())
        }
        Err(e) => Err(anyhow::anyhow!(user_error_text(&e))),
    }
}
