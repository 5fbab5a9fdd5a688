//! Long-lived interactive shell used by `run_command`.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::io::AsyncWriteExt;
use tokio::process::{Child, Command};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::ToolError;

/// A shell process that survives between commands.
///
/// The shell is created lazily and recreated if it has exited. Its output goes
/// to the host's stderr; commands are fire-and-forget.
pub struct TerminalSession {
    shell: String,
    child: Mutex<Option<Child>>,
}

impl TerminalSession {
    pub fn new(shell: impl Into<String>) -> Self {
        Self {
            shell: shell.into(),
            child: Mutex::new(None),
        }
    }

    /// Send `command` to the shell, starting one in `cwd` if needed.
    ///
    /// When the shell already runs and a `cwd` is given, a `cd` is issued first.
    pub async fn send(&self, command: &str, cwd: Option<&Path>, default_cwd: &Path) -> Result<(), ToolError> {
        let mut guard = self.child.lock().await;

        let alive = match guard.as_mut() {
            Some(child) => matches!(child.try_wait(), Ok(None)),
            None => false,
        };

        let mut lines = Vec::new();
        if alive {
            if let Some(dir) = cwd {
                lines.push(format!("cd \"{}\"", dir.display()));
            }
        } else {
            let dir: PathBuf = cwd.unwrap_or(default_cwd).to_path_buf();
            info!(shell = %self.shell, cwd = %dir.display(), "Starting terminal session");
            *guard = Some(self.spawn(&dir)?);
        }
        lines.push(command.to_string());

        let child = guard
            .as_mut()
            .ok_or_else(|| ToolError::ExecutionFailed("Terminal session unavailable".into()))?;
        let stdin = child
            .stdin
            .as_mut()
            .ok_or_else(|| ToolError::ExecutionFailed("Terminal stdin not available".into()))?;

        for line in lines {
            debug!(line = %line, "Sending to terminal");
            stdin.write_all(line.as_bytes()).await?;
            stdin.write_all(b"\n").await?;
        }
        stdin.flush().await?;

        Ok(())
    }

    fn spawn(&self, cwd: &Path) -> Result<Child, ToolError> {
        Command::new(&self.shell)
            .current_dir(cwd)
            .stdin(Stdio::piped())
            .stdout(Stdio::from(std::io::stderr()))
            .stderr(Stdio::from(std::io::stderr()))
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ToolError::ExecutionFailed(format!("Failed to start {}: {}", self.shell, e)))
    }

    /// Whether a live shell is currently attached
    pub async fn is_running(&self) -> bool {
        let mut guard = self.child.lock().await;
        match guard.as_mut() {
            Some(child) => matches!(child.try_wait(), Ok(None)),
            None => false,
        }
    }
}
