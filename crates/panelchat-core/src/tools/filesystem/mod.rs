//! Filesystem tools for workspace file operations

mod delete;
mod path_utils;
mod read;
mod search;
mod write;

pub use delete::DeleteFile;
pub use read::{ReadFile, HIDDEN_READ_RESULT};
pub use search::{SearchFiles, NO_MATCHES, SEARCH_LIMIT};
pub use write::{WriteFile, WriteMode};

pub use path_utils::{ensure_within, normalize_path, path_to_display, Workspace};
