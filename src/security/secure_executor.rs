use std::sync::Arc;

use tokio::task::JoinError;
use tracing::{error, warn};

use super::policy::{self, ValidatedCommand};
use crate::cmd_parser::{parse_instruction, CommandKind};
use crate::error::ExecutionResult;
use crate::protocol::{ResponseEnvelope, Status};
use crate::workspace::Workspace;

/// Runs instructions through parse, validation and execution against one workspace
#[derive(Debug, Clone)]
pub struct SecureExecutor {
    workspace: Arc<Workspace>,
}

impl SecureExecutor {
    pub fn new(workspace: Workspace) -> Self {
        Self {
            workspace: Arc::new(workspace),
        }
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    /// Full pipeline for one raw instruction. Always yields exactly one envelope.
    pub async fn handle_instruction(&self, assistant: &str, instruction: &str) -> ResponseEnvelope {
        let parsed = parse_instruction(instruction);

        let verdict = policy::validate(&parsed);
        if let Some(reason) = verdict.error {
            warn!("Instruction rejected: {}", reason);
            return ResponseEnvelope::error(reason);
        }

        match policy::admit(parsed) {
            Ok(command) => self.dispatch(assistant, &command).await,
            Err(e) => ResponseEnvelope::error(e.to_string()),
        }
    }

    pub async fn dispatch(&self, assistant: &str, command: &ValidatedCommand) -> ResponseEnvelope {
        self.execute(assistant, command.kind(), command.filepath(), command.content())
            .await
    }

    /// Route a command to its executor and wrap the outcome.
    ///
    /// The executor runs on its own task so a panic inside it still produces
    /// an error envelope instead of tearing down the connection.
    pub async fn execute(
        &self,
        assistant: &str,
        kind: CommandKind,
        filepath: &str,
        content: &str,
    ) -> ResponseEnvelope {
        let workspace = Arc::clone(&self.workspace);
        let path = filepath.to_string();
        let content = content.to_string();

        let outcome = tokio::spawn(async move {
            match kind {
                CommandKind::Create => workspace.create_file(&path, &content).await,
                CommandKind::Delete => workspace.delete_file(&path).await,
                CommandKind::Modify => workspace.modify_file(&path, &content).await,
                CommandKind::Run => workspace.run_file(&path).await,
            }
        })
        .await;

        envelope_for(outcome, assistant, kind, filepath)
    }
}

fn envelope_for(
    outcome: Result<ExecutionResult, JoinError>,
    assistant: &str,
    kind: CommandKind,
    filepath: &str,
) -> ResponseEnvelope {
    match outcome {
        Ok(result) => ResponseEnvelope::dispatched(result, assistant, kind, filepath),
        Err(e) => {
            error!("Command execution error: {}", e);
            ResponseEnvelope {
                status: Status::Error,
                message: format!("Command failed: {}", e),
                assistant: Some(assistant.to_string()),
                command: Some(kind.as_str().to_string()),
                filepath: None,
            }
        }
    }
}
