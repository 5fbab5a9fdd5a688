//! Error types for panelchat core

use thiserror::Error;

/// Result type alias using the panelchat Error
pub type Result<T> = std::result::Result<T, Error>;

/// Crate-level error types
#[derive(Error, Debug)]
pub enum Error {
    #[error(
        "API key not found. Please set the {0} environment variable or configure provider.api_key in the config file."
    )]
    MissingCredential(String),

    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    #[error("Error parsing tool input: {0}")]
    ToolInputParse(String),

    #[error("Stream protocol anomaly: {0}")]
    StreamProtocol(String),

    #[error("Maximum tool use iterations ({0}) reached")]
    IterationLimitExceeded(usize),

    #[error("A request is already in progress")]
    Busy,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Operation cancelled")]
    Cancelled,
}

/// Tool-specific errors
#[derive(Error, Debug)]
pub enum ToolError {
    #[error("No workspace folder found.")]
    NoWorkspace,

    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Tool already registered: {0}")]
    DuplicateTool(String),

    #[error("Invalid parameters: {0}")]
    InvalidParams(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Execution failed: {0}")]
    ExecutionFailed(String),

    #[error("IO error: {0}")]
    Io(std::io::Error),
}

impl ToolError {
    /// Map an I/O error on `path` into the tool taxonomy.
    pub fn from_io(err: std::io::Error, path: &str) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::NotFound(format!("{} ({})", path, err)),
            std::io::ErrorKind::PermissionDenied => {
                Self::PermissionDenied(format!("{} ({})", path, err))
            }
            _ => Self::Io(err),
        }
    }
}

impl From<std::io::Error> for ToolError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}
