use serde::{Deserialize, Serialize};

use crate::cmd_parser::CommandKind;
use crate::error::ExecutionResult;

/// A client frame: `{"assistant": "...", "instruction": "$create a.txt"}`
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct InboundMessage {
    #[serde(default)]
    pub assistant: String,
    #[serde(default)]
    pub instruction: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Success,
    Error,
}

/// The single reply sent for every inbound frame.
///
/// `assistant`, `command` and `filepath` are only present once a command was
/// dispatched to an executor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseEnvelope {
    pub status: Status,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assistant: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filepath: Option<String>,
}

impl ResponseEnvelope {
    /// Error reply for a frame that never reached an executor
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: Status::Error,
            message: message.into(),
            assistant: None,
            command: None,
            filepath: None,
        }
    }

    pub fn dispatched(
        result: ExecutionResult,
        assistant: &str,
        kind: CommandKind,
        filepath: &str,
    ) -> Self {
        Self {
            status: if result.success { Status::Success } else { Status::Error },
            message: result.message,
            assistant: Some(assistant.to_string()),
            command: Some(kind.as_str().to_string()),
            filepath: Some(filepath.to_string()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == Status::Success
    }
}
