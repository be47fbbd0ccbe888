use crate::command::Completer;
use crate::completion::{self, CommandNames, ShellHelper};
use crate::config::{CliArgs, ReplConfig};
use crate::error::{ConfigError, InputError, LoopError};
use crate::group::{CommandBuilder, Group};
use crate::input::{InputStream, PromptInput};
use crate::lexer;
use crate::printer::Printer;
use std::io;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::debug;

/// What the loop does after one iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Exit,
}

/// An embeddable read-eval-print loop.
///
/// Commands are registered up front, then [`Repl::run`] reads lines from the
/// configured input stream, splits them into statements and dispatches each
/// one until the stream ends or a command asks to stop.
///
/// ```no_run
/// use retort::{Param, Repl, ReplConfig, Value};
///
/// let mut repl = Repl::new(ReplConfig::default().banner("Hello!")).unwrap();
/// let printer = repl.printer().clone();
/// repl.command("hello")
///     .param(Param::text("name"))
///     .register(move |args| {
///         printer.success(["hello", args.str(0)?]);
///         Ok(Value::None)
///     })
///     .unwrap();
/// repl.parse_cli_arguments();
/// repl.run();
/// ```
pub struct Repl {
    config: ReplConfig,
    commands: Arc<RwLock<Group>>,
    names: Arc<RwLock<Option<CommandNames>>>,
    prompt: Option<Box<dyn Fn() -> String + Send + Sync>>,
    printer: Printer,
    input: Option<Box<dyn InputStream>>,
    print_banner: bool,
}

impl Repl {
    /// A shell writing to the process's stdout and stderr.
    pub fn new(config: ReplConfig) -> io::Result<Self> {
        Ok(Self::with_printer(config, Printer::stdio()?))
    }

    pub fn with_printer(config: ReplConfig, printer: Printer) -> Self {
        Self {
            config,
            commands: Arc::new(RwLock::new(Group::new())),
            names: Arc::default(),
            prompt: None,
            printer,
            input: None,
            print_banner: true,
        }
    }

    pub fn config(&self) -> &ReplConfig {
        &self.config
    }

    /// Handle for printing through the shell's output queue.
    pub fn printer(&self) -> &Printer {
        &self.printer
    }

    /// Start describing a command; see [`Group::command`].
    pub fn command(&mut self, name: impl Into<String>) -> CommandBuilder<RwLockWriteGuard<'_, Group>> {
        CommandBuilder::new(self.write_commands(), name.into())
    }

    /// Attach a completer to the registered command `name`.
    pub fn complete<F>(&mut self, name: &str, f: F) -> Result<Completer, ConfigError>
    where
        F: Fn(&str, &str, usize, usize) -> Vec<String> + Send + Sync + 'static,
    {
        self.write_commands().complete(name, f)
    }

    /// Move every command of `group` into the shell.
    pub fn merge(&mut self, group: Group) -> Result<(), ConfigError> {
        self.write_commands().merge(group)
    }

    /// Read access to the registered commands.
    pub fn commands(&self) -> RwLockReadGuard<'_, Group> {
        self.commands.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Completion candidates for `text`, the word at `start..end` of `line`.
    pub fn completions(&self, text: &str, line: &str, start: usize, end: usize) -> Vec<String> {
        let names = self.names.read().unwrap_or_else(PoisonError::into_inner);
        completion::complete_with(&self.commands(), names.as_ref(), text, line, start, end)
    }

    /// Compute the prompt before every read instead of using the configured one.
    ///
    /// # Arguments
    /// * `f` - Called once per iteration, so the prompt can follow host state.
    pub fn prompt_with<F>(&mut self, f: F)
    where
        F: Fn() -> String + Send + Sync + 'static,
    {
        self.prompt = Some(Box::new(f));
    }

    /// Choose which command names are offered when completing a first word.
    ///
    /// Applies to [`Repl::completions`] and to the interactive prompt alike.
    pub fn command_names_with<F>(&mut self, f: F)
    where
        F: Fn(&Group) -> Vec<String> + Send + Sync + 'static,
    {
        let source: CommandNames = Arc::new(f);
        *self.names.write().unwrap_or_else(PoisonError::into_inner) = Some(source);
    }

    /// Read lines from `input` instead of the interactive prompt.
    pub fn set_input(&mut self, input: impl InputStream + 'static) {
        self.input = Some(Box::new(input));
    }

    /// Apply the process's command line arguments.
    ///
    /// Prints usage and exits the process on `--help` or invalid arguments.
    pub fn parse_cli_arguments(&mut self) {
        let args: CliArgs = argh::from_env();
        self.apply_cli_arguments(args);
    }

    pub fn apply_cli_arguments(&mut self, args: CliArgs) {
        if args.suppresses_banner() {
            self.print_banner = false;
        }
        if let Some(input) = args.input_stream() {
            self.input = Some(input);
        }
    }

    /// One iteration: read a line and dispatch its statements in order.
    ///
    /// The first failing statement ends the iteration and the rest of the
    /// line is skipped.
    pub fn process(&mut self) -> Result<Flow, LoopError> {
        if self.input.is_none() {
            let helper = ShellHelper::new(self.commands.clone(), self.names.clone(), self.config.completion);
            let prompt = PromptInput::new(helper, &self.config)?;
            self.input = Some(Box::new(prompt));
        }
        let prompt = match &self.prompt {
            Some(f) => f(),
            None => self.config.prompt.clone(),
        };
        let Some(input) = self.input.as_mut() else {
            return Ok(Flow::Exit);
        };
        let Some(line) = input.next_line(&prompt)? else {
            debug!("input stream exhausted");
            return Ok(Flow::Exit);
        };
        if line.trim().is_empty() {
            return Ok(Flow::Continue);
        }

        for statement in lexer::split_statements(&line)? {
            let words = lexer::split_words(&statement)?;
            let Some((name, args)) = words.split_first() else {
                continue;
            };
            debug!(statement = %statement, "dispatching statement");
            // Released before the handler runs.
            let command = self.commands().resolve(name)?.clone();
            let result = command.execute(args)?;
            debug!(command = %name, result = %result.repr(), "command finished");
        }
        Ok(Flow::Continue)
    }

    /// Run the loop until the input ends or a command stops it.
    ///
    /// Command errors are reported and the loop goes on. Every iteration waits
    /// for its output to be written before the next prompt is shown.
    pub fn run(&mut self) {
        if self.print_banner {
            if let Some(banner) = &self.config.banner {
                self.printer.print([banner]);
                self.printer.wait();
            }
        }

        loop {
            let flow = match self.process() {
                Ok(flow) => flow,
                Err(LoopError::Command(err)) => {
                    self.printer.error([err]);
                    Flow::Continue
                }
                Err(LoopError::Input(InputError::Interrupted)) => {
                    self.printer.newline();
                    Flow::Continue
                }
                Err(LoopError::Input(InputError::Eof)) => {
                    self.printer.newline();
                    Flow::Exit
                }
                Err(LoopError::Input(err)) => {
                    self.printer.error([err]);
                    Flow::Exit
                }
                Err(LoopError::Stop(stop)) => {
                    if !stop.message.is_empty() {
                        self.printer.error([stop]);
                    }
                    Flow::Exit
                }
            };
            self.printer.wait();
            if flow == Flow::Exit {
                break;
            }
        }
    }

    fn write_commands(&self) -> RwLockWriteGuard<'_, Group> {
        self.commands.write().unwrap_or_else(PoisonError::into_inner)
    }
}
