//! A restricted literal parser backing the `literal` guide.
//!
//! Accepts numbers, strings, bytes, booleans, `None` and lists, tuples, sets
//! and dicts built from those. Nothing is ever evaluated: names, calls and
//! operators other than a leading sign are rejected.

use crate::value::Value;
use thiserror::Error;

/// Deepest bracket nesting accepted before parsing gives up.
const MAX_DEPTH: usize = 200;

/// Why a piece of text isn't a literal.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("malformed literal at {pos}: {message}")]
pub struct LiteralError {
    pub pos: usize,
    pub message: String,
}

/// Parse `text` as a single literal, ignoring surrounding whitespace.
///
/// Containers may nest at most 200 levels deep.
///
/// # Arguments
/// * `text` - Source of one literal, e.g. `[1, 'a', (2.5, None)]`.
///
/// # Returns
/// The value on success. A `LiteralError` with the offset of the first
/// character that can't belong to a literal otherwise.
pub fn parse(text: &str) -> Result<Value, LiteralError> {
    let mut parser = LiteralParser::new(text);
    let value = parser.parse_value()?;
    parser.skip_ws();
    if let Some(ch) = parser.peek() {
        return Err(parser.error(format!("unexpected character '{}'", ch)));
    }
    Ok(value)
}

struct LiteralParser {
    input: Vec<char>,
    pos: usize,
    /// Number of containers currently open.
    depth: usize,
}

impl LiteralParser {
    /// Creates a parser positioned at the start of `text`.
    ///
    /// # Arguments
    /// * `text` - The literal source, usually a single shell word.
    fn new(text: &str) -> Self {
        LiteralParser {
            input: text.chars().collect(),
            pos: 0,
            depth: 0,
        }
    }

    fn error(&self, message: impl Into<String>) -> LiteralError {
        LiteralError {
            pos: self.pos,
            message: message.into(),
        }
    }

    fn peek(&self) -> Option<char> {
        self.input.get(self.pos).copied()
    }

    fn peek_n(&self, n: usize) -> Option<char> {
        self.input.get(self.pos + n).copied()
    }

    fn consume(&mut self) -> Option<char> {
        let ch = self.peek();
        if ch.is_some() {
            self.pos += 1;
        }
        ch
    }

    fn expect(&mut self, expected: char) -> Result<(), LiteralError> {
        self.skip_ws();
        match self.consume() {
            Some(ch) if ch == expected => Ok(()),
            Some(ch) => Err(self.error(format!("expected '{}', found '{}'", expected, ch))),
            None => Err(self.error(format!("expected '{}', found end of input", expected))),
        }
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(c) if c.is_whitespace()) {
            self.pos += 1;
        }
    }

    /// Parses one value at the current position and dispatches on its first
    /// character.
    ///
    /// # Returns
    /// The parsed value, or a `LiteralError` pointing at the offending
    /// character.
    fn parse_value(&mut self) -> Result<Value, LiteralError> {
        self.skip_ws();
        match self.peek() {
            None => Err(self.error("unexpected end of input")),
            Some('[') => self.nested(Self::parse_list),
            Some('(') => self.nested(Self::parse_paren),
            Some('{') => self.nested(Self::parse_brace),
            Some('\'' | '"') => self.parse_strings(),
            Some('+' | '-') => self.parse_signed(),
            Some(c) if c.is_ascii_digit() => self.parse_number(),
            Some('.') if matches!(self.peek_n(1), Some(d) if d.is_ascii_digit()) => {
                self.parse_number()
            }
            Some(c) if c.is_alphabetic() || c == '_' => self.parse_word(),
            Some(c) => Err(self.error(format!("unexpected character '{}'", c))),
        }
    }

    /// Runs `parse` one container level deeper, failing past `MAX_DEPTH`.
    fn nested(&mut self, parse: fn(&mut Self) -> Result<Value, LiteralError>) -> Result<Value, LiteralError> {
        if self.depth >= MAX_DEPTH {
            return Err(self.error("too many nested brackets"));
        }
        self.depth += 1;
        let result = parse(self);
        self.depth -= 1;
        result
    }

    /// Parses a list. The cursor is on the opening `[`.
    ///
    /// # Returns
    /// A `Value::List` of the elements, trailing comma allowed.
    fn parse_list(&mut self) -> Result<Value, LiteralError> {
        self.expect('[')?;
        let (items, _) = self.parse_items(']')?;
        Ok(Value::List(items))
    }

    /// `()`, `(x)` or a tuple with at least one comma.
    fn parse_paren(&mut self) -> Result<Value, LiteralError> {
        self.expect('(')?;
        let (mut items, saw_comma) = self.parse_items(')')?;
        if items.len() == 1 && !saw_comma {
            return Ok(items.remove(0));
        }
        Ok(Value::Tuple(items))
    }

    /// `{}` and `{k: v}` are dicts, `{a, b}` is a set.
    fn parse_brace(&mut self) -> Result<Value, LiteralError> {
        self.expect('{')?;
        self.skip_ws();
        if self.peek() == Some('}') {
            self.consume();
            return Ok(Value::Dict(Vec::new()));
        }

        let first = self.parse_hashable()?;
        self.skip_ws();
        if self.peek() == Some(':') {
            self.consume();
            let value = self.parse_value()?;
            let mut pairs = vec![(first, value)];
            while self.separator('}')? {
                let key = self.parse_hashable()?;
                self.expect(':')?;
                let value = self.parse_value()?;
                pairs.push((key, value));
            }
            return Ok(Value::dict_from(pairs));
        }

        let mut items = vec![first];
        while self.separator('}')? {
            items.push(self.parse_hashable()?);
        }
        Ok(Value::set_from(items))
    }

    /// A set element or dict key: mutable containers are refused.
    fn parse_hashable(&mut self) -> Result<Value, LiteralError> {
        let start = self.pos;
        let value = self.parse_value()?;
        match unhashable_kind(&value) {
            Some(kind) => {
                self.pos = start;
                Err(self.error(format!("unhashable type: '{}'", kind)))
            }
            None => Ok(value),
        }
    }

    /// Comma separated values up to `close`, trailing comma allowed.
    ///
    /// # Arguments
    /// * `close` - The bracket that ends the sequence.
    ///
    /// # Returns
    /// The values, and whether any comma was seen.
    fn parse_items(&mut self, close: char) -> Result<(Vec<Value>, bool), LiteralError> {
        let mut items = Vec::new();
        let mut saw_comma = false;
        self.skip_ws();
        if self.peek() == Some(close) {
            self.consume();
            return Ok((items, saw_comma));
        }
        loop {
            items.push(self.parse_value()?);
            self.skip_ws();
            match self.consume() {
                Some(',') => {
                    saw_comma = true;
                    self.skip_ws();
                    if self.peek() == Some(close) {
                        self.consume();
                        return Ok((items, saw_comma));
                    }
                }
                Some(c) if c == close => return Ok((items, saw_comma)),
                Some(c) => return Err(self.error(format!("unexpected character '{}'", c))),
                None => return Err(self.error(format!("expected '{}'", close))),
            }
        }
    }

    /// After an element inside braces: `true` if another element follows.
    fn separator(&mut self, close: char) -> Result<bool, LiteralError> {
        self.skip_ws();
        match self.consume() {
            Some(',') => {
                self.skip_ws();
                if self.peek() == Some(close) {
                    self.consume();
                    Ok(false)
                } else {
                    Ok(true)
                }
            }
            Some(c) if c == close => Ok(false),
            Some(c) => Err(self.error(format!("unexpected character '{}'", c))),
            None => Err(self.error(format!("expected '{}'", close))),
        }
    }

    /// A single `+` or `-` directly applied to a number.
    ///
    /// # Returns
    /// The number, negated for `-`. A second sign or a non-number operand
    /// is an error.
    fn parse_signed(&mut self) -> Result<Value, LiteralError> {
        let negative = self.consume() == Some('-');
        self.skip_ws();
        let starts_number = match self.peek() {
            Some(c) if c.is_ascii_digit() => true,
            Some('.') => matches!(self.peek_n(1), Some(d) if d.is_ascii_digit()),
            _ => false,
        };
        if !starts_number {
            return Err(self.error("unary sign must be followed by a number"));
        }
        match self.parse_number()? {
            Value::Int(i) if negative => i
                .checked_neg()
                .map(Value::Int)
                .ok_or_else(|| self.error("integer out of range")),
            Value::Float(f) if negative => Ok(Value::Float(-f)),
            v => Ok(v),
        }
    }

    /// Parses an unsigned int or float: decimal, `0x`, `0o` or `0b`, with
    /// single `_` separators between digits.
    ///
    /// # Returns
    /// `Value::Int` or `Value::Float`, or an error for malformed digits or an
    /// int that does not fit in `i64`.
    fn parse_number(&mut self) -> Result<Value, LiteralError> {
        let start = self.pos;
        if self.peek() == Some('0') {
            let radix = match self.peek_n(1) {
                Some('x' | 'X') => Some(16),
                Some('o' | 'O') => Some(8),
                Some('b' | 'B') => Some(2),
                _ => None,
            };
            if let Some(radix) = radix {
                self.pos += 2;
                let digits = self.take_while(|c| c.is_ascii_alphanumeric() || c == '_');
                return parse_int(&digits, radix)
                    .map(Value::Int)
                    .ok_or_else(|| self.error(format!("invalid integer '{}'", self.slice(start))));
            }
        }

        let mut is_float = false;
        self.take_while(|c| c.is_ascii_digit() || c == '_');
        if self.peek() == Some('.') {
            is_float = true;
            self.consume();
            self.take_while(|c| c.is_ascii_digit() || c == '_');
        }
        if matches!(self.peek(), Some('e' | 'E')) {
            is_float = true;
            self.consume();
            if matches!(self.peek(), Some('+' | '-')) {
                self.consume();
            }
            if !matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
                return Err(self.error("invalid exponent"));
            }
            self.take_while(|c| c.is_ascii_digit() || c == '_');
        }
        if matches!(self.peek(), Some(c) if c.is_alphanumeric() || c == '_') {
            return Err(self.error(format!("invalid number '{}'", self.slice(start))));
        }

        let text = self.slice(start);
        let misplaced_underscore = ["__", "_.", "._", "_e", "_E"]
            .iter()
            .any(|pattern| text.contains(pattern));
        if text.starts_with('_') || text.ends_with('_') || misplaced_underscore {
            return Err(self.error(format!("invalid number '{}'", text)));
        }
        let cleaned = text.replace('_', "");
        if is_float {
            cleaned
                .parse::<f64>()
                .map(Value::Float)
                .map_err(|_| self.error(format!("invalid float '{}'", text)))
        } else {
            if cleaned.len() > 1 && cleaned.starts_with('0') && cleaned.chars().any(|c| c != '0') {
                return Err(self.error("leading zeros in decimal integer literals are not permitted"));
            }
            parse_int(&cleaned, 10)
                .map(Value::Int)
                .ok_or_else(|| self.error(format!("invalid integer '{}'", text)))
        }
    }

    /// Keywords, or a string/bytes prefix.
    fn parse_word(&mut self) -> Result<Value, LiteralError> {
        let start = self.pos;
        let word = self.take_while(|c| c.is_alphanumeric() || c == '_');
        if matches!(self.peek(), Some('\'' | '"')) {
            let lower = word.to_ascii_lowercase();
            if matches!(lower.as_str(), "b" | "r" | "br" | "rb" | "u") {
                self.pos = start;
                return self.parse_strings();
            }
        }
        match word.as_str() {
            "True" => Ok(Value::Bool(true)),
            "False" => Ok(Value::Bool(false)),
            "None" => Ok(Value::None),
            _ => {
                self.pos = start;
                Err(self.error(format!("'{}' is not a literal", word)))
            }
        }
    }

    /// One or more adjacent string (or bytes) literals, concatenated.
    fn parse_strings(&mut self) -> Result<Value, LiteralError> {
        let mut text: Option<String> = None;
        let mut bytes: Option<Vec<u8>> = None;
        loop {
            let (is_bytes, raw) = self.parse_prefix();
            let piece = self.parse_quoted(raw, is_bytes)?;
            if is_bytes {
                if text.is_some() {
                    return Err(self.error("cannot mix bytes and nonbytes literals"));
                }
                let mut buf = Vec::with_capacity(piece.len());
                for c in piece.chars() {
                    buf.push(c as u32 as u8);
                }
                bytes.get_or_insert_with(Vec::new).extend(buf);
            } else {
                if bytes.is_some() {
                    return Err(self.error("cannot mix bytes and nonbytes literals"));
                }
                text.get_or_insert_with(String::new).push_str(&piece);
            }

            let save = self.pos;
            self.skip_ws();
            if !self.at_string_start() {
                self.pos = save;
                break;
            }
        }
        Ok(match bytes {
            Some(b) => Value::Bytes(b),
            None => Value::Str(text.unwrap_or_default()),
        })
    }

    fn at_string_start(&self) -> bool {
        let mut n = 0;
        while matches!(self.peek_n(n), Some('b' | 'B' | 'r' | 'R' | 'u' | 'U')) && n < 2 {
            n += 1;
        }
        matches!(self.peek_n(n), Some('\'' | '"'))
    }

    /// Returns `(is_bytes, is_raw)`.
    fn parse_prefix(&mut self) -> (bool, bool) {
        let mut is_bytes = false;
        let mut raw = false;
        while let Some(c) = self.peek() {
            match c {
                'b' | 'B' => is_bytes = true,
                'r' | 'R' => raw = true,
                'u' | 'U' => {}
                _ => break,
            }
            self.consume();
        }
        (is_bytes, raw)
    }

    /// Parses one quoted section after its prefix.
    ///
    /// # Arguments
    /// * `raw` - Keep backslashes as written.
    /// * `is_bytes` - Only ASCII characters and byte escapes are allowed.
    ///
    /// # Returns
    /// The decoded text without quotes.
    fn parse_quoted(&mut self, raw: bool, is_bytes: bool) -> Result<String, LiteralError> {
        let quote = match self.consume() {
            Some(q @ ('\'' | '"')) => q,
            _ => return Err(self.error("expected string")),
        };
        let mut out = String::new();
        loop {
            let ch = self
                .consume()
                .ok_or_else(|| self.error("unterminated string literal"))?;
            match ch {
                c if c == quote => return Ok(out),
                '\n' => return Err(self.error("unterminated string literal")),
                '\\' if raw => {
                    out.push('\\');
                    if let Some(next) = self.consume() {
                        if is_bytes && !next.is_ascii() {
                            return Err(self.error("bytes can only contain ASCII literal characters"));
                        }
                        out.push(next);
                    }
                }
                '\\' => self.parse_escape(&mut out, is_bytes)?,
                c if is_bytes && !c.is_ascii() => {
                    return Err(self.error("bytes can only contain ASCII literal characters"));
                }
                c => out.push(c),
            }
        }
    }

    /// Decodes the escape after a backslash into `out`. Unknown escapes are
    /// kept as written.
    ///
    /// # Arguments
    /// * `out` - Text decoded so far.
    /// * `is_bytes` - `\u` and `\U` stay as written, code points must fit a byte.
    fn parse_escape(&mut self, out: &mut String, is_bytes: bool) -> Result<(), LiteralError> {
        let ch = self
            .consume()
            .ok_or_else(|| self.error("unterminated string literal"))?;
        match ch {
            '\n' => {}
            '\\' => out.push('\\'),
            '\'' => out.push('\''),
            '"' => out.push('"'),
            'n' => out.push('\n'),
            't' => out.push('\t'),
            'r' => out.push('\r'),
            'a' => out.push('\x07'),
            'b' => out.push('\x08'),
            'f' => out.push('\x0c'),
            'v' => out.push('\x0b'),
            '0'..='7' => {
                let mut digits = ch.to_string();
                while digits.len() < 3 && matches!(self.peek(), Some('0'..='7')) {
                    digits.push(self.consume().unwrap_or('0'));
                }
                let code = u32::from_str_radix(&digits, 8).map_err(|_| self.error("bad octal escape"))?;
                out.push(self.escaped_char(code, is_bytes)?);
            }
            'x' => {
                let code = self.hex_digits(2)?;
                out.push(self.escaped_char(code, is_bytes)?);
            }
            'u' if !is_bytes => {
                let code = self.hex_digits(4)?;
                out.push(self.escaped_char(code, is_bytes)?);
            }
            'U' if !is_bytes => {
                let code = self.hex_digits(8)?;
                out.push(self.escaped_char(code, is_bytes)?);
            }
            other => {
                out.push('\\');
                out.push(other);
            }
        }
        Ok(())
    }

    fn hex_digits(&mut self, count: usize) -> Result<u32, LiteralError> {
        let mut digits = String::with_capacity(count);
        for _ in 0..count {
            match self.consume() {
                Some(c) if c.is_ascii_hexdigit() => digits.push(c),
                _ => return Err(self.error(format!("truncated \\x{} escape", count))),
            }
        }
        u32::from_str_radix(&digits, 16).map_err(|_| self.error("bad hex escape"))
    }

    fn escaped_char(&self, code: u32, is_bytes: bool) -> Result<char, LiteralError> {
        if is_bytes && code > 0xff {
            return Err(self.error("bytes escape out of range"));
        }
        char::from_u32(code).ok_or_else(|| self.error("invalid code point"))
    }

    fn take_while(&mut self, pred: impl Fn(char) -> bool) -> String {
        let start = self.pos;
        while matches!(self.peek(), Some(c) if pred(c)) {
            self.pos += 1;
        }
        self.slice(start)
    }

    fn slice(&self, start: usize) -> String {
        self.input[start..self.pos].iter().collect()
    }
}

/// Kind name of a value that can't be a set element or dict key.
fn unhashable_kind(value: &Value) -> Option<&'static str> {
    match value {
        Value::List(_) | Value::Set(_) | Value::Dict(_) => Some(value.kind()),
        Value::Tuple(items) => items.iter().find_map(unhashable_kind),
        _ => None,
    }
}

fn parse_int(digits: &str, radix: u32) -> Option<i64> {
    if digits.is_empty() || digits.ends_with('_') || digits.contains("__") {
        return None;
    }
    let cleaned = digits.trim_start_matches('_').replace('_', "");
    i64::from_str_radix(&cleaned, radix).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s(text: &str) -> Value {
        Value::Str(text.to_string())
    }

    #[test]
    fn test_scalars() {
        assert_eq!(parse("1"), Ok(Value::Int(1)));
        assert_eq!(parse("  -42 "), Ok(Value::Int(-42)));
        assert_eq!(parse("+7"), Ok(Value::Int(7)));
        assert_eq!(parse("1_000"), Ok(Value::Int(1000)));
        assert_eq!(parse("0x1F"), Ok(Value::Int(31)));
        assert_eq!(parse("0b101"), Ok(Value::Int(5)));
        assert_eq!(parse("0o17"), Ok(Value::Int(15)));
        assert_eq!(parse("3.5"), Ok(Value::Float(3.5)));
        assert_eq!(parse(".5"), Ok(Value::Float(0.5)));
        assert_eq!(parse("1e3"), Ok(Value::Float(1000.0)));
        assert_eq!(parse("-2.5e-1"), Ok(Value::Float(-0.25)));
        assert_eq!(parse("True"), Ok(Value::Bool(true)));
        assert_eq!(parse("False"), Ok(Value::Bool(false)));
        assert_eq!(parse("None"), Ok(Value::None));
    }

    #[test]
    fn test_strings() {
        assert_eq!(parse("'1'"), Ok(s("1")));
        assert_eq!(parse("\"foo bar\""), Ok(s("foo bar")));
        assert_eq!(parse(r"'a\nb'"), Ok(s("a\nb")));
        assert_eq!(parse(r"'it\'s'"), Ok(s("it's")));
        assert_eq!(parse(r"'\x41é'"), Ok(s("Aé")));
        assert_eq!(parse(r"r'a\n'"), Ok(s("a\\n")));
        assert_eq!(parse("'foo' \"bar\""), Ok(s("foobar")));
        assert_eq!(parse("b'ab\\x00'"), Ok(Value::Bytes(vec![b'a', b'b', 0])));
    }

    #[test]
    fn test_containers() {
        assert_eq!(
            parse("[1, 'a', [2]]"),
            Ok(Value::List(vec![
                Value::Int(1),
                s("a"),
                Value::List(vec![Value::Int(2)])
            ]))
        );
        assert_eq!(parse("[]"), Ok(Value::List(vec![])));
        assert_eq!(parse("[1, 2,]"), Ok(Value::List(vec![Value::Int(1), Value::Int(2)])));
        assert_eq!(parse("()"), Ok(Value::Tuple(vec![])));
        assert_eq!(parse("(1)"), Ok(Value::Int(1)));
        assert_eq!(parse("(1,)"), Ok(Value::Tuple(vec![Value::Int(1)])));
        assert_eq!(parse("{}"), Ok(Value::Dict(vec![])));
        assert_eq!(
            parse("{1, 2, 1}"),
            Ok(Value::Set(vec![Value::Int(1), Value::Int(2)]))
        );
        assert_eq!(
            parse("{'a': 1, 'b': [True]}"),
            Ok(Value::Dict(vec![
                (s("a"), Value::Int(1)),
                (s("b"), Value::List(vec![Value::Bool(true)])),
            ]))
        );
    }

    #[test]
    fn test_deep_nesting_is_an_error() {
        let err = parse(&"[".repeat(100_000)).unwrap_err();
        assert_eq!(err.message, "too many nested brackets");

        let deep = format!("{}{}", "(".repeat(150), ")".repeat(150));
        assert_eq!(parse(&deep), Ok(Value::Tuple(vec![])));
        assert!(parse(&format!("{}1{}", "[".repeat(201), "]".repeat(201))).is_err());
    }

    #[test]
    fn test_hashable_set_elements_and_keys() {
        assert_eq!(
            parse("{(1, 'a'): None}"),
            Ok(Value::Dict(vec![(
                Value::Tuple(vec![Value::Int(1), s("a")]),
                Value::None
            )]))
        );
        assert_eq!(parse("{1: [2]}").map(|v| v.kind()), Ok("dict"));
        assert_eq!(parse("{1.5, b'x'}").map(|v| v.kind()), Ok("set"));
    }

    #[test]
    fn test_rejects_non_literals() {
        for bad in [
            "foobar",
            "__import__('os')",
            "1 + 2",
            "[1, 2",
            "'open",
            "{1: 2, 3}",
            "01",
            "1__0",
            "-'a'",
            "",
            "   ",
            "b'a' 'b'",
            "99999999999999999999",
            "--1",
            "-+1",
            "-(1)",
            "rb'\\\u{101}'",
            "1_.5",
            "1._5",
            "1_e5",
            "{[1]}",
            "{(1, [2])}",
            "{{1: 2}: 3}",
            "{1, {2}}",
        ] {
            assert!(parse(bad).is_err(), "expected failure for {:?}", bad);
        }
    }
}
