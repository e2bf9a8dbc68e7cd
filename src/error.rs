// Error taxonomy for the command pipeline

use std::io;
use thiserror::Error;

use crate::cmd_parser::CommandKind;

/// Every way an instruction can fail between parsing and execution.
///
/// The `Display` text of each variant is exactly the message sent back to the
/// client, so wording changes here are protocol changes.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("Unknown command. Use: $create, $delete, $modify, or $run")]
    UnknownCommand,

    #[error("Missing filepath for {0} command")]
    MissingFilepath(CommandKind),

    #[error("Invalid filepath")]
    InvalidFilepath,

    #[error("Path traversal not allowed")]
    PathTraversal,

    #[error("Content is required for modify command")]
    MissingContent,

    /// The resolver refused the path (outside the workspace or unresolvable)
    #[error("Invalid path: {0}")]
    PathRejected(String),

    #[error("File not found: {0}")]
    NotFound(String),

    #[error("File already exists: {0}")]
    AlreadyExists(String),

    #[error("Cannot delete directory: {0}")]
    DeleteDirectory(String),

    #[error("Cannot modify directory: {0}")]
    ModifyDirectory(String),

    #[error("Not a file: {0}")]
    NotAFile(String),

    #[error("Unsupported file type: {0}")]
    UnsupportedFileType(String),

    #[error("Execution timeout ({0}s limit)")]
    ExecutionTimeout(u64),

    #[error("Error {verb} file: {source}")]
    Io {
        verb: &'static str,
        #[source]
        source: io::Error,
    },
}

impl CommandError {
    pub fn io(verb: &'static str) -> impl FnOnce(io::Error) -> Self {
        move |source| Self::Io { verb, source }
    }
}

/// Outcome of a single executor call: `(success, message)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionResult {
    pub success: bool,
    pub message: String,
}

impl ExecutionResult {
    pub fn ok(message: impl Into<String>) -> Self {
        Self { success: true, message: message.into() }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self { success: false, message: message.into() }
    }
}

impl From<CommandError> for ExecutionResult {
    fn from(err: CommandError) -> Self {
        Self::failed(err.to_string())
    }
}

impl From<Result<String, CommandError>> for ExecutionResult {
    fn from(result: Result<String, CommandError>) -> Self {
        match result {
            Ok(message) => Self::ok(message),
            Err(err) => err.into(),
        }
    }
}
