//! Tab completion: picking between command names and a command's own completer,
//! and the glue that plugs this into the line editor.

use crate::config::CompletionPolicy;
use crate::group::Group;
use crate::lexer;
use rustyline::completion::Completer;
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::validate::Validator;
use rustyline::{Context, Helper};
use std::sync::{Arc, PoisonError, RwLock};

/// Characters that end the word being completed.
const DELIMITERS: &[char] = &[' ', '\t', '\n', ';'];

/// Picks the command names offered for the first word of a line.
///
/// Lets a host narrow completion to what makes sense in its current state,
/// e.g. hide `logout` until a session is open.
pub type CommandNames = Arc<dyn Fn(&Group) -> Vec<String> + Send + Sync>;

/// Candidates for `text`, the word spanning `start..end` of `line`.
///
/// Leading whitespace of `line` is ignored. While the cursor is still on the
/// first word, registered command names starting with `text` are offered.
/// Past it, the command named by the first word completes its own arguments.
pub fn complete(group: &Group, text: &str, line: &str, start: usize, end: usize) -> Vec<String> {
    complete_with(group, None, text, line, start, end)
}

/// Like [`complete`], with first-word candidates taken from `names` when given.
pub fn complete_with(
    group: &Group,
    names: Option<&CommandNames>,
    text: &str,
    line: &str,
    start: usize,
    end: usize,
) -> Vec<String> {
    let trimmed = line.trim_start();
    let stripped = line.len() - trimmed.len();
    let start = start.saturating_sub(stripped);
    let end = end.saturating_sub(stripped);

    if start > 0 && !trimmed.is_empty() {
        let Ok(words) = lexer::split_words(trimmed) else {
            return Vec::new();
        };
        let Some(name) = words.first() else {
            return Vec::new();
        };
        match group.resolve(name) {
            Ok(command) => command.complete(text, trimmed, start, end),
            Err(_) => Vec::new(),
        }
    } else {
        let offered: Vec<String> = match names {
            Some(source) => source(group),
            None => group.names().map(str::to_string).collect(),
        };
        offered.into_iter().filter(|name| name.starts_with(text)).collect()
    }
}

/// Byte offset where the word ending at `pos` begins.
fn word_start(line: &str, pos: usize) -> usize {
    line[..pos]
        .rfind(DELIMITERS)
        .map(|idx| idx + 1)
        .unwrap_or(0)
}

/// Line editor helper that completes against the shell's registry.
pub(crate) struct ShellHelper {
    commands: Arc<RwLock<Group>>,
    names: Arc<RwLock<Option<CommandNames>>>,
    policy: CompletionPolicy,
}

impl ShellHelper {
    pub(crate) fn new(
        commands: Arc<RwLock<Group>>,
        names: Arc<RwLock<Option<CommandNames>>>,
        policy: CompletionPolicy,
    ) -> Self {
        Self {
            commands,
            names,
            policy,
        }
    }

    fn candidates(&self, line: &str, pos: usize) -> (usize, Vec<String>) {
        let start = word_start(line, pos);
        // Only the statement under the cursor matters.
        let offset = line[..start].rfind(';').map(|idx| idx + 1).unwrap_or(0);
        let group = self.commands.read().unwrap_or_else(PoisonError::into_inner);
        let names = self.names.read().unwrap_or_else(PoisonError::into_inner);
        let mut candidates = complete_with(
            &group,
            names.as_ref(),
            &line[start..pos],
            &line[offset..],
            start - offset,
            pos - offset,
        );
        if self.policy.append_space && candidates.len() == 1 {
            candidates[0].push(' ');
        }
        (start, candidates)
    }
}

impl Completer for ShellHelper {
    type Candidate = String;

    fn complete(&self, line: &str, pos: usize, _ctx: &Context<'_>) -> rustyline::Result<(usize, Vec<String>)> {
        Ok(self.candidates(line, pos))
    }
}

impl Hinter for ShellHelper {
    type Hint = String;
}

impl Highlighter for ShellHelper {}

impl Validator for ShellHelper {}

impl Helper for ShellHelper {}
