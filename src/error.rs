//! Error taxonomy of the shell.
//!
//! Errors fall into a few families that the dispatch loop treats differently:
//! - [`ConfigError`] happens while commands are being registered. It is meant to
//!   abort the embedding program and is never caught by the loop.
//! - [`CommandError`] (which wraps [`ParseError`] and [`GuideError`]) is
//!   recoverable: the loop reports it and reads the next line.
//! - [`InputError`] comes from the input stream and decides whether the loop
//!   keeps going, ends quietly or stops with a report.
//! - [`Stop`] can be returned by a handler to end the loop on purpose.

use crate::palette::Palette;
use thiserror::Error;

/// Setup-time misconfiguration.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("'{name}' command already exists.")]
    DuplicateCommand { name: String },

    #[error("Command '{command}': guides given for parameter '{parameter}' which is not in its signature")]
    UnknownGuideParameter { command: String, parameter: String },

    #[error("Command '{command}': invalid signature: {reason}")]
    InvalidSignature { command: String, reason: String },

    #[error("Command '{name}' already has completer function.")]
    CompleterAlreadyAttached { name: String },

    #[error("Unknown command: {name}")]
    UnknownCommand { name: String },

    #[error("can't merge group, commands already exist: {}", .names.join(", "))]
    MergeConflict { names: Vec<String> },
}

/// A guide could not convert its input.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("GuideError: Can't convert {} using {} guide", Palette::Bold.format(.value), Palette::Bold.format(.guide))]
pub struct GuideError {
    /// Text form of the offending value.
    pub value: String,
    /// Name of the guide that failed.
    pub guide: String,
}

impl GuideError {
    pub fn new(value: impl Into<String>, guide: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            guide: guide.into(),
        }
    }
}

/// Errors that can occur while splitting a line into statements or words.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// A closing quote (single or double) was not found.
    #[error("No closing quotation: {quote}")]
    UnfinishedQuote { quote: char },
    /// The line ends with a lone backslash.
    #[error("No escaped character")]
    MissingEscapedCharacter,
    #[error("unexpected token: {token}")]
    UnexpectedToken { token: String },
}

/// Recoverable failure of a single statement.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("Unknown command: {name}")]
    Unknown { name: String },

    #[error("{command}() {problem}")]
    Arity { command: String, problem: String },

    #[error("{command}: argument {index}: expected {expected}, got {found}")]
    ArgumentType {
        command: String,
        index: usize,
        expected: String,
        found: String,
    },

    #[error(transparent)]
    Guide(#[from] GuideError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("{command}: {source:#}")]
    Handler {
        command: String,
        #[source]
        source: anyhow::Error,
    },
}

/// Outcome of asking the input stream for a line, other than a line.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InputError {
    /// End of input (Ctrl-D on a prompt).
    #[error("end of input")]
    Eof,
    /// Interrupt while waiting for input (Ctrl-C on a prompt).
    #[error("interrupted")]
    Interrupted,
    /// The stream can't produce lines anymore and the loop must stop.
    #[error("{message}")]
    Fatal { message: String },
}

/// Explicit request to end the dispatch loop.
///
/// Handlers return it through `anyhow`, e.g. `Err(Stop::new("bye").into())`.
#[derive(Debug, Error, Clone, Default, PartialEq, Eq)]
#[error("{message}")]
pub struct Stop {
    pub message: String,
}

impl Stop {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Everything that can end one iteration of the dispatch loop early.
#[derive(Debug, Error)]
pub enum LoopError {
    #[error(transparent)]
    Command(#[from] CommandError),
    #[error(transparent)]
    Input(#[from] InputError),
    #[error(transparent)]
    Stop(#[from] Stop),
}

impl From<ParseError> for LoopError {
    fn from(err: ParseError) -> Self {
        LoopError::Command(err.into())
    }
}
