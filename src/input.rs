//! Sources of input lines for the dispatch loop.

use crate::completion::ShellHelper;
use crate::config::ReplConfig;
use crate::error::InputError;
use rustyline::error::ReadlineError;
use rustyline::history::DefaultHistory;
use rustyline::{CompletionType, Config, Editor};
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader};
use std::path::PathBuf;
use tracing::{debug, warn};

/// Produces the lines the loop dispatches.
pub trait InputStream {
    /// Read the next line, showing `prompt` if the stream is interactive.
    ///
    /// `Ok(None)` means the stream is exhausted.
    fn next_line(&mut self, prompt: &str) -> Result<Option<String>, InputError>;
}

/// A string given up front (the `-c` option), yielded once.
#[derive(Debug, Clone)]
pub struct InlineInput {
    commands: Option<String>,
}

impl InlineInput {
    pub fn new(commands: impl Into<String>) -> Self {
        Self {
            commands: Some(commands.into()),
        }
    }
}

impl InputStream for InlineInput {
    fn next_line(&mut self, _prompt: &str) -> Result<Option<String>, InputError> {
        Ok(self.commands.take())
    }
}

/// Replays a file one line at a time. The file is opened on the first read.
#[derive(Debug)]
pub struct FileInput {
    path: PathBuf,
    reader: Option<BufReader<File>>,
}

impl FileInput {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            reader: None,
        }
    }

    fn failure(&self) -> InputError {
        InputError::Fatal {
            message: format!("Problem with reading the file: {}", self.path.display()),
        }
    }
}

impl InputStream for FileInput {
    fn next_line(&mut self, _prompt: &str) -> Result<Option<String>, InputError> {
        if self.reader.is_none() {
            let file = File::open(&self.path).map_err(|err| {
                debug!(path = %self.path.display(), error = %err, "can't open input file");
                self.failure()
            })?;
            self.reader = Some(BufReader::new(file));
        }
        let Some(reader) = self.reader.as_mut() else {
            return Err(self.failure());
        };

        let mut line = String::new();
        match reader.read_line(&mut line) {
            Ok(0) => Ok(None),
            Ok(_) => {
                let len = line.trim_end_matches(['\n', '\r']).len();
                line.truncate(len);
                Ok(Some(line))
            }
            Err(err) => {
                debug!(path = %self.path.display(), error = %err, "can't read input file");
                Err(self.failure())
            }
        }
    }
}

/// Interactive prompt with line editing, history and tab completion.
pub struct PromptInput {
    editor: Editor<ShellHelper, DefaultHistory>,
    history_file: Option<PathBuf>,
}

impl PromptInput {
    /// Build the editor and load the history file, creating it if missing.
    pub(crate) fn new(helper: ShellHelper, config: &ReplConfig) -> Result<Self, InputError> {
        let editor_config = Config::builder()
            .max_history_size(config.history_length)
            .map_err(editor_failure)?
            .completion_type(CompletionType::List)
            .auto_add_history(false)
            .build();
        let mut editor = Editor::with_config(editor_config).map_err(editor_failure)?;
        editor.set_helper(Some(helper));

        if let Some(path) = &config.history_file {
            if let Err(err) = OpenOptions::new().create(true).append(true).open(path) {
                warn!(path = %path.display(), error = %err, "can't create history file");
            } else if let Err(err) = editor.load_history(path) {
                warn!(path = %path.display(), error = %err, "can't load history");
            }
        }

        Ok(Self {
            editor,
            history_file: config.history_file.clone(),
        })
    }
}

impl InputStream for PromptInput {
    fn next_line(&mut self, prompt: &str) -> Result<Option<String>, InputError> {
        match self.editor.readline(prompt) {
            Ok(line) => {
                if !line.trim().is_empty() {
                    if let Err(err) = self.editor.add_history_entry(line.as_str()) {
                        warn!(error = %err, "can't add history entry");
                    }
                }
                Ok(Some(line))
            }
            Err(ReadlineError::Interrupted) => Err(InputError::Interrupted),
            Err(ReadlineError::Eof) => Err(InputError::Eof),
            Err(err) => Err(editor_failure(err)),
        }
    }
}

impl Drop for PromptInput {
    fn drop(&mut self) {
        if let Some(path) = &self.history_file {
            if let Err(err) = self.editor.save_history(path) {
                warn!(path = %path.display(), error = %err, "can't save history");
            }
        }
    }
}

fn editor_failure(err: ReadlineError) -> InputError {
    InputError::Fatal {
        message: format!("line editor failure: {}", err),
    }
}
