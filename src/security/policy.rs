// Instruction policy: structural and traversal checks run before anything touches disk

use crate::cmd_parser::{CommandKind, ParsedCommand};
use crate::error::CommandError;

/// Outcome of validating a parsed command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationResult {
    pub valid: bool,
    pub error: Option<String>,
}

/// A command that passed validation. Only [`admit`] constructs one, so the
/// dispatcher never sees a command without a kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedCommand {
    kind: CommandKind,
    filepath: String,
    content: String,
}

impl ValidatedCommand {
    pub fn kind(&self) -> CommandKind {
        self.kind
    }

    pub fn filepath(&self) -> &str {
        &self.filepath
    }

    pub fn content(&self) -> &str {
        &self.content
    }
}

/// Validate a parsed command. Pure; no filesystem access.
pub fn validate(parsed: &ParsedCommand) -> ValidationResult {
    match check(parsed) {
        Ok(_) => ValidationResult { valid: true, error: None },
        Err(e) => ValidationResult { valid: false, error: Some(e.to_string()) },
    }
}

/// Validate and take ownership, producing the typed command the dispatcher accepts.
///
/// Rejects exactly what [`validate`] rejects, with the same message.
pub fn admit(parsed: ParsedCommand) -> Result<ValidatedCommand, CommandError> {
    let kind = check(&parsed)?;
    Ok(ValidatedCommand {
        kind,
        filepath: parsed.filepath,
        content: parsed.content,
    })
}

fn check(parsed: &ParsedCommand) -> Result<CommandKind, CommandError> {
    let kind = parsed.kind.ok_or(CommandError::UnknownCommand)?;

    let filepath = parsed.filepath.as_str();
    if filepath.is_empty() {
        return Err(CommandError::MissingFilepath(kind));
    }
    if filepath == "." {
        return Err(CommandError::InvalidFilepath);
    }

    // Cheap syntactic filter; the sandbox resolver makes the authoritative call
    if filepath.contains("..") || filepath.starts_with('/') {
        return Err(CommandError::PathTraversal);
    }

    if kind == CommandKind::Modify && parsed.content.is_empty() {
        return Err(CommandError::MissingContent);
    }

    Ok(kind)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cmd_parser::parse_instruction;

    fn parsed(kind: Option<CommandKind>, filepath: &str, content: &str) -> ParsedCommand {
        ParsedCommand {
            kind,
            filepath: filepath.to_string(),
            content: content.to_string(),
        }
    }

    fn error_of(parsed: &ParsedCommand) -> String {
        let result = validate(parsed);
        assert!(!result.valid);
        result.error.unwrap()
    }

    #[test]
    fn test_valid_commands() {
        for instruction in [
            "$create a.txt",
            "$delete dir/a.txt",
            "$modify a.txt hello",
            "$run script.py",
        ] {
            let result = validate(&parse_instruction(instruction));
            assert_eq!(result, ValidationResult { valid: true, error: None }, "{instruction}");
        }
    }

    #[test]
    fn test_unknown_command() {
        let message = error_of(&parse_instruction("please create a file"));
        assert_eq!(message, "Unknown command. Use: $create, $delete, $modify, or $run");
    }

    #[test]
    fn test_missing_and_invalid_filepath() {
        assert_eq!(
            error_of(&parsed(Some(CommandKind::Run), "", "")),
            "Missing filepath for run command"
        );
        assert_eq!(error_of(&parsed(Some(CommandKind::Create), ".", "")), "Invalid filepath");
    }

    #[test]
    fn test_traversal_rejected_for_every_kind() {
        let kinds = [
            CommandKind::Create,
            CommandKind::Delete,
            CommandKind::Modify,
            CommandKind::Run,
        ];
        for kind in kinds {
            for path in ["../etc/passwd", "a/../../b", "/etc/passwd", "..", "a..b"] {
                assert_eq!(
                    error_of(&parsed(Some(kind), path, "x")),
                    "Path traversal not allowed",
                    "{kind} {path}"
                );
            }
        }
    }

    #[test]
    fn test_modify_requires_content() {
        let message = error_of(&parse_instruction("$modify a.txt "));
        assert_eq!(message, "Content is required for modify command");
    }

    #[test]
    fn test_content_ignored_for_other_kinds() {
        assert!(validate(&parsed(Some(CommandKind::Create), "a.txt", "")).valid);
        assert!(validate(&parsed(Some(CommandKind::Delete), "a.txt", "ignored")).valid);
    }

    #[test]
    fn test_validate_and_admit_agree() {
        for instruction in [
            "$create a.txt",
            "$modify a.txt ",
            "$delete ../x",
            "$run",
            "hello",
            "$modify notes.md line one\nline two",
        ] {
            let verdict = validate(&parse_instruction(instruction));
            let admitted = admit(parse_instruction(instruction));
            assert_eq!(verdict.valid, admitted.is_ok(), "{instruction:?}");
            assert_eq!(verdict.error, admitted.err().map(|e| e.to_string()), "{instruction:?}");
        }
    }

    #[test]
    fn test_admit_keeps_arguments() {
        let command = admit(parse_instruction("$modify notes.md # Title")).unwrap();
        assert_eq!(command.kind(), CommandKind::Modify);
        assert_eq!(command.filepath(), "notes.md");
        assert_eq!(command.content(), "# Title");

        assert!(matches!(
            admit(ParsedCommand::default()),
            Err(CommandError::UnknownCommand)
        ));
    }
}
