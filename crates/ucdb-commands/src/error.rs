//! Command-line errors.

use thiserror::Error;

use crate::command::CommandName;

/// A command line that does not name a known command or has the wrong
/// arguments for it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UsageError {
    #[error("undefined command: \"{0}\"")]
    UnknownCommand(String),

    #[error("{command}: {reason}")]
    BadArguments { command: CommandName, reason: String },

    #[error("unterminated quote in {0}")]
    UnterminatedQuote(String),
}

impl UsageError {
    pub(crate) fn bad_arguments(command: CommandName, reason: impl Into<String>) -> Self {
        UsageError::BadArguments {
            command,
            reason: reason.into(),
        }
    }

    /// The command whose usage text should be shown, if any.
    pub fn command(&self) -> Option<CommandName> {
        match self {
            UsageError::BadArguments { command, .. } => Some(*command),
            _ => None,
        }
    }
}
