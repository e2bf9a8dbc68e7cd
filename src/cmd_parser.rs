use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use tracing::{info, warn};

static CREATE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\$create\s+(.+)$").expect("valid create pattern"));
static DELETE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\$delete\s+(.+)$").expect("valid delete pattern"));
// Content is optional so that "$modify a.txt" reaches validation as a modify
static MODIFY_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)^\$modify\s+(\S+)(?:\s+(.*))?$").expect("valid modify pattern"));
static RUN_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\$run\s+(.+)$").expect("valid run pattern"));

/// The four instructions a client may send
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    Create,
    Delete,
    Modify,
    Run,
}

impl CommandKind {
    /// Patterns in match priority order
    const ALL: [CommandKind; 4] = [
        CommandKind::Create,
        CommandKind::Delete,
        CommandKind::Modify,
        CommandKind::Run,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CommandKind::Create => "create",
            CommandKind::Delete => "delete",
            CommandKind::Modify => "modify",
            CommandKind::Run => "run",
        }
    }

    fn pattern(&self) -> &'static Regex {
        match self {
            CommandKind::Create => &CREATE_PATTERN,
            CommandKind::Delete => &DELETE_PATTERN,
            CommandKind::Modify => &MODIFY_PATTERN,
            CommandKind::Run => &RUN_PATTERN,
        }
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of parsing one instruction. `kind == None` means nothing matched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedCommand {
    pub kind: Option<CommandKind>,
    pub filepath: String,
    pub content: String,
}

/// Parse an instruction such as `$modify src/app.py print("hi")`.
///
/// Never fails: input that matches none of the grammars yields a
/// `ParsedCommand` with no kind, which the validator rejects.
pub fn parse_instruction(instruction: &str) -> ParsedCommand {
    let instruction = instruction.trim();

    for kind in CommandKind::ALL {
        let Some(captures) = kind.pattern().captures(instruction) else {
            continue;
        };

        let filepath = captures
            .get(1)
            .map(|m| m.as_str().trim().to_string())
            .unwrap_or_default();
        let content = match kind {
            CommandKind::Modify => captures
                .get(2)
                .map(|m| m.as_str().trim().to_string())
                .unwrap_or_default(),
            _ => String::new(),
        };

        info!("Parsed command: {} -> {}", kind, filepath);
        return ParsedCommand {
            kind: Some(kind),
            filepath,
            content,
        };
    }

    warn!("Could not parse instruction: {}", instruction);
    ParsedCommand::default()
}
