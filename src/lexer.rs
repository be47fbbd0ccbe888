//! Splitting of raw input lines.
//!
//! A line goes through two passes:
//! 1. [`split_statements`] cuts it at unescaped, unquoted `;` into statements,
//!    keeping quotes and backslashes untouched.
//! 2. [`split_words`] breaks one statement into the command name and its
//!    arguments with shell quoting rules (quotes removed, escapes applied).

use crate::error::ParseError;

/// How words are read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    /// Whitespace separated words, quotes kept verbatim, no escapes.
    Raw,
    /// Shell words: quotes removed, backslash escapes applied.
    Shell,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LexingState {
    Start,
    ReadingWord,
    ReadingSingleQuote,
    ReadingDoubleQuote,
    /// After a backslash outside quotes.
    Escaping,
    /// After a backslash inside double quotes.
    EscapingInDoubleQuote,
}

struct LexingFSM {
    input: Vec<char>,
    pos: usize,
    mode: Mode,
    state: LexingState,
    buffer: String,
    /// Set once the current word has begun, even if it is still empty (`''`).
    in_word: bool,
}

impl LexingFSM {
    /// Creates a machine positioned at the start of `line`.
    ///
    /// # Arguments
    /// * `line` - The text to split.
    /// * `mode` - Whether quotes are kept verbatim (`Raw`) or removed (`Shell`).
    fn new(line: &str, mode: Mode) -> Self {
        LexingFSM {
            input: line.chars().collect(),
            pos: 0,
            mode,
            state: LexingState::Start,
            buffer: String::new(),
            in_word: false,
        }
    }

    /// Runs the machine over the whole input and collects the words.
    ///
    /// # Returns
    /// The words in order on success. A `ParseError` if the input ends inside
    /// a quote or right after a backslash.
    fn make_words(&mut self) -> Result<Vec<String>, ParseError> {
        let mut out = Vec::new();

        while let Some(ch) = self.read_char() {
            match self.state {
                LexingState::Start => self.handle_start(ch, &mut out),
                LexingState::ReadingWord => self.handle_word(ch, &mut out),
                LexingState::ReadingSingleQuote => self.handle_quote(ch, '\'', &mut out),
                LexingState::ReadingDoubleQuote => self.handle_quote(ch, '"', &mut out),
                LexingState::Escaping => {
                    self.buffer.push(ch);
                    self.state = LexingState::ReadingWord;
                }
                LexingState::EscapingInDoubleQuote => {
                    if ch != '"' && ch != '\\' {
                        self.buffer.push('\\');
                    }
                    self.buffer.push(ch);
                    self.state = LexingState::ReadingDoubleQuote;
                }
            }
        }

        match self.state {
            LexingState::ReadingSingleQuote => return Err(ParseError::UnfinishedQuote { quote: '\'' }),
            LexingState::ReadingDoubleQuote => return Err(ParseError::UnfinishedQuote { quote: '"' }),
            LexingState::Escaping | LexingState::EscapingInDoubleQuote => {
                return Err(ParseError::MissingEscapedCharacter);
            }
            _ => {}
        }

        self.finish_word(&mut out);
        Ok(out)
    }

    /// Returns the next character and advances, or `None` at the end of input.
    fn read_char(&mut self) -> Option<char> {
        let ch = self.input.get(self.pos).copied();
        if ch.is_some() {
            self.pos += 1;
        }
        ch
    }

    /// Handles a character between words.
    ///
    /// # Arguments
    /// * `ch` - The character read.
    /// * `out` - Finished words so far.
    fn handle_start(&mut self, ch: char, out: &mut Vec<String>) {
        if ch.is_whitespace() {
            return;
        }
        self.in_word = true;
        self.state = LexingState::ReadingWord;
        self.handle_word(ch, out);
    }

    /// Handles a character inside an unquoted word. Whitespace ends the word.
    ///
    /// # Arguments
    /// * `ch` - The character read.
    /// * `out` - Receives the word once it is finished.
    fn handle_word(&mut self, ch: char, out: &mut Vec<String>) {
        match (ch, self.mode) {
            (c, _) if c.is_whitespace() => {
                self.finish_word(out);
                self.state = LexingState::Start;
            }
            ('\\', Mode::Shell) => self.state = LexingState::Escaping,
            ('\'', Mode::Shell) => self.state = LexingState::ReadingSingleQuote,
            ('"', Mode::Shell) => self.state = LexingState::ReadingDoubleQuote,
            // A raw word opening with a quote runs to the closing quote.
            ('\'' | '"', Mode::Raw) if self.buffer.is_empty() => {
                self.buffer.push(ch);
                self.state = if ch == '\'' {
                    LexingState::ReadingSingleQuote
                } else {
                    LexingState::ReadingDoubleQuote
                };
            }
            (c, _) => self.buffer.push(c),
        }
    }

    /// Handles a character inside a quoted section.
    ///
    /// # Arguments
    /// * `ch` - The character read.
    /// * `quote` - The quote character that opened the section.
    /// * `out` - Receives the word when a raw quoted word closes.
    fn handle_quote(&mut self, ch: char, quote: char, out: &mut Vec<String>) {
        match self.mode {
            Mode::Raw => {
                self.buffer.push(ch);
                if ch == quote {
                    self.finish_word(out);
                    self.state = LexingState::Start;
                }
            }
            Mode::Shell => match ch {
                c if c == quote => self.state = LexingState::ReadingWord,
                '\\' if quote == '"' => self.state = LexingState::EscapingInDoubleQuote,
                c => self.buffer.push(c),
            },
        }
    }

    fn finish_word(&mut self, out: &mut Vec<String>) {
        if self.in_word {
            out.push(std::mem::take(&mut self.buffer));
            self.in_word = false;
        }
    }
}

/// Split a line into `;`-separated statements.
///
/// Quoted text and escaped semicolons (`\;`) stay inside their statement,
/// empty statements are dropped and `;;` is a syntax error. Each statement
/// comes back as its words joined by single spaces.
///
/// # Arguments
/// * `line` - A full input line.
///
/// # Returns
/// The non-empty statements in order, or a `ParseError` for `;;` or an
/// unclosed quote.
pub fn split_statements(line: &str) -> Result<Vec<String>, ParseError> {
    let elements = LexingFSM::new(line, Mode::Raw).make_words()?;

    let mut statements: Vec<Vec<String>> = Vec::new();
    let mut current: Vec<String> = Vec::new();
    for element in elements {
        if element.ends_with("\\;") {
            current.push(element);
        } else if element.ends_with(";;") {
            return Err(ParseError::UnexpectedToken {
                token: ";;".to_string(),
            });
        } else if let Some(prefix) = element.strip_suffix(';') {
            if !prefix.is_empty() {
                current.push(prefix.to_string());
            }
            statements.push(std::mem::take(&mut current));
        } else {
            current.push(element);
        }
    }
    if !current.is_empty() {
        statements.push(current);
    }

    Ok(statements
        .into_iter()
        .filter(|words| !words.is_empty())
        .map(|words| words.join(" "))
        .collect())
}

/// Split one statement into shell words: `[command_name, args...]`.
///
/// # Arguments
/// * `statement` - One statement, as produced by [`split_statements`].
///
/// # Returns
/// The words with quotes removed and escapes applied, or a `ParseError` for
/// an unclosed quote or a trailing backslash.
pub fn split_words(statement: &str) -> Result<Vec<String>, ParseError> {
    LexingFSM::new(statement, Mode::Shell).make_words()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn statements(line: &str) -> Vec<String> {
        split_statements(line).unwrap()
    }

    #[test]
    fn test_split_statements() {
        let cases: &[(&str, &[&str])] = &[
            ("foo bar baz", &["foo bar baz"]),
            ("foo bar;", &["foo bar"]),
            ("foo bar; ;", &["foo bar"]),
            ("foo bar; scoo bee; doo bee", &["foo bar", "scoo bee", "doo bee"]),
            ("foo   ;   bar;  ;", &["foo", "bar"]),
            ("foo 'bar;' scoo bee", &["foo 'bar;' scoo bee"]),
            (r"foo bar\; scoo bee", &[r"foo bar\; scoo bee"]),
            (r"foo bar\\; scoo bee", &[r"foo bar\\; scoo bee"]),
            (r"foo bar\\\; scoo bee", &[r"foo bar\\\; scoo bee"]),
            ("", &[]),
            (" ; ; ", &[]),
        ];
        for (input, expected) in cases {
            assert_eq!(statements(input), *expected, "input: {:?}", input);
        }
    }

    #[test]
    fn test_split_statements_keeps_quoted_whitespace() {
        assert_eq!(
            statements("foo \"a  b;c\"; bar"),
            vec!["foo \"a  b;c\"", "bar"]
        );
    }

    #[test]
    fn test_split_statements_double_semicolon() {
        assert_eq!(
            split_statements("foo bar;;"),
            Err(ParseError::UnexpectedToken { token: ";;".into() })
        );
        assert!(split_statements("foo ;; bar").is_err());
    }

    #[test]
    fn test_split_statements_unterminated_quote() {
        assert_eq!(
            split_statements("foo 'bar"),
            Err(ParseError::UnfinishedQuote { quote: '\'' })
        );
    }

    #[test]
    fn test_split_words() {
        let cases: &[(&str, &[&str])] = &[
            ("scoo bee doo", &["scoo", "bee", "doo"]),
            ("  scoo  bee  doo  ", &["scoo", "bee", "doo"]),
            ("\tscoo\tbee\tdoo\n", &["scoo", "bee", "doo"]),
            ("", &[]),
            ("  \t\n", &[]),
            ("foo 'bar baz'", &["foo", "bar baz"]),
            ("foo \"bar baz\"", &["foo", "bar baz"]),
            ("foo a'b c'd", &["foo", "ab cd"]),
            ("foo ''", &["foo", ""]),
            (r"foo bar\; scoo", &["foo", "bar;", "scoo"]),
            (r"foo a\ b", &["foo", "a b"]),
            (r#"foo "a\"b" "c\d" 'e\f'"#, &["foo", "a\"b", "c\\d", "e\\f"]),
        ];
        for (input, expected) in cases {
            assert_eq!(split_words(input).unwrap(), *expected, "input: {:?}", input);
        }
    }

    #[test]
    fn test_split_words_no_closing_quotation() {
        for invalid in ["'scoo", "scoo'", "\"scoo", "scoo\"", "'scoo\"", "\"scoo'"] {
            assert!(
                matches!(split_words(invalid), Err(ParseError::UnfinishedQuote { .. })),
                "input: {:?}",
                invalid
            );
        }
    }

    #[test]
    fn test_split_words_trailing_backslash() {
        assert_eq!(
            split_words("foo \\"),
            Err(ParseError::MissingEscapedCharacter)
        );
    }
}
