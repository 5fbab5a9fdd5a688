//! Terminal tool: dispatches commands to a reusable shell session

mod run_command;
mod session;

pub use run_command::RunCommand;
pub use session::TerminalSession;
