//! An embeddable read-eval-print loop for command-driven tools.
//!
//! Host programs register named commands with typed parameters, then hand
//! control to [`Repl::run`]. Each input line is split into `;`-separated
//! statements, every statement into shell words, and the words are converted
//! by per-parameter [`Guide`] chains before the handler is called. All output
//! goes through one [`Printer`] queue so it never interleaves with the prompt.
//!
//! Lines come from an interactive prompt with history and tab completion, from
//! a `-c` string or from a file, see [`CliArgs`] and [`InputStream`].

mod command;
mod completion;
mod config;
mod error;
mod group;
pub mod guide;
mod input;
pub mod lexer;
pub mod literal;
mod palette;
mod printer;
mod repl;
mod value;

pub use command::{completer, handler, Arguments, Bound, BoundArguments, Command, Completer, Handler, Param, Signature};
pub use completion::{complete, complete_with, CommandNames};
pub use config::{CliArgs, CompletionPolicy, ReplConfig, DEFAULT_HISTORY_LENGTH, DEFAULT_PROMPT};
pub use error::{CommandError, ConfigError, GuideError, InputError, LoopError, ParseError, Stop};
pub use group::{CommandBuilder, Group};
pub use guide::{Guide, ParamType};
pub use input::{FileInput, InlineInput, InputStream, PromptInput};
pub use palette::Palette;
pub use printer::{
    Destination, PrintResource, Printer, SharedBuffer, Sink, ERROR_MARKER, STATUS_MARKER, SUCCESS_MARKER,
};
pub use repl::{Flow, Repl};
pub use value::Value;
