use crate::input::{FileInput, InlineInput, InputStream};
use argh::FromArgs;
use std::env;
use std::path::PathBuf;

pub const DEFAULT_PROMPT: &str = "retort:~ $ ";
pub const DEFAULT_HISTORY_LENGTH: usize = 100;
const HISTORY_FILE_NAME: &str = ".retort";

/// What tab completion does with a single unambiguous candidate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CompletionPolicy {
    /// Append a space so the next word can be typed right away.
    pub append_space: bool,
}

/// Settings of a [`Repl`](crate::Repl).
///
/// ```
/// use retort::ReplConfig;
///
/// let config = ReplConfig::default()
///     .prompt("app > ")
///     .banner("Welcome!")
///     .history_file(None);
/// assert_eq!(config.prompt, "app > ");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplConfig {
    pub prompt: String,
    /// Printed once before the first prompt of an interactive session.
    pub banner: Option<String>,
    /// `None` disables history persistence.
    pub history_file: Option<PathBuf>,
    pub history_length: usize,
    pub completion: CompletionPolicy,
}

impl Default for ReplConfig {
    fn default() -> Self {
        Self {
            prompt: DEFAULT_PROMPT.to_string(),
            banner: None,
            history_file: env::var_os("HOME").map(|home| PathBuf::from(home).join(HISTORY_FILE_NAME)),
            history_length: DEFAULT_HISTORY_LENGTH,
            completion: CompletionPolicy::default(),
        }
    }
}

impl ReplConfig {
    pub fn prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = prompt.into();
        self
    }

    pub fn banner(mut self, banner: impl Into<String>) -> Self {
        self.banner = Some(banner.into());
        self
    }

    pub fn history_file(mut self, path: Option<PathBuf>) -> Self {
        self.history_file = path;
        self
    }

    pub fn history_length(mut self, length: usize) -> Self {
        self.history_length = length;
        self
    }

    pub fn completion(mut self, policy: CompletionPolicy) -> Self {
        self.completion = policy;
        self
    }
}

#[derive(FromArgs, Debug, Clone, Default, PartialEq, Eq)]
/// Run commands interactively, from a file or from the command line.
pub struct CliArgs {
    #[argh(positional)]
    /// file with commands to replay line by line.
    pub file: Option<PathBuf>,

    #[argh(option, short = 'c')]
    /// commands passed in as string, delimited with semicolon.
    pub commands: Option<String>,
}

impl CliArgs {
    /// The stream picked by the arguments: inline commands win over a file.
    ///
    /// `None` means the interactive prompt.
    pub fn input_stream(&self) -> Option<Box<dyn InputStream>> {
        if let Some(commands) = &self.commands {
            Some(Box::new(InlineInput::new(commands.clone())))
        } else {
            self.file
                .as_ref()
                .map(|path| Box::new(FileInput::new(path.clone())) as Box<dyn InputStream>)
        }
    }

    /// The banner is only shown in interactive sessions.
    pub fn suppresses_banner(&self) -> bool {
        self.commands.is_some() || self.file.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> CliArgs {
        CliArgs::from_args(&["retort"], args).unwrap()
    }

    #[test]
    fn test_default_config() {
        let config = ReplConfig::default();
        assert_eq!(config.prompt, "retort:~ $ ");
        assert_eq!(config.banner, None);
        assert_eq!(config.history_length, 100);
        assert!(!config.completion.append_space);
        if let Some(path) = config.history_file {
            assert!(path.ends_with(".retort"));
        }
    }

    #[test]
    fn test_builder() {
        let config = ReplConfig::default()
            .prompt("> ")
            .banner("hi")
            .history_file(Some(PathBuf::from("/tmp/h")))
            .history_length(5)
            .completion(CompletionPolicy { append_space: true });
        assert_eq!(config.prompt, "> ");
        assert_eq!(config.banner.as_deref(), Some("hi"));
        assert_eq!(config.history_file, Some(PathBuf::from("/tmp/h")));
        assert_eq!(config.history_length, 5);
        assert!(config.completion.append_space);
    }

    #[test]
    fn test_no_arguments_means_prompt() {
        let args = parse(&[]);
        assert!(args.input_stream().is_none());
        assert!(!args.suppresses_banner());
    }

    #[test]
    fn test_inline_commands() {
        let args = parse(&["-c", "foo; bar"]);
        assert_eq!(args.commands.as_deref(), Some("foo; bar"));
        assert!(args.suppresses_banner());

        let mut stream = args.input_stream().unwrap();
        assert_eq!(stream.next_line("").unwrap().as_deref(), Some("foo; bar"));
        assert_eq!(stream.next_line("").unwrap(), None);
    }

    #[test]
    fn test_inline_commands_win_over_file() {
        let args = parse(&["-c", "foo", "script.txt"]);
        assert_eq!(args.file, Some(PathBuf::from("script.txt")));
        let mut stream = args.input_stream().unwrap();
        assert_eq!(stream.next_line("").unwrap().as_deref(), Some("foo"));
    }

    #[test]
    fn test_file_argument() {
        let args = parse(&["script.txt"]);
        assert!(args.suppresses_banner());
        assert!(args.input_stream().is_some());
    }

    #[test]
    fn test_unknown_flag_is_rejected() {
        assert!(CliArgs::from_args(&["retort"], &["--nope"]).is_err());
    }
}
