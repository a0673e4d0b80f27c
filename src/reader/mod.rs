//! Convert source text into S-expressions
use std::error::Error;
use std::fmt;

use crate::vm::Value;

mod number;

const QUOTE: &str = "quote";

#[derive(Debug, Clone, PartialEq)]
pub enum ReaderErrorKind {
    UnexpectedEof,
    UnexpectedCharacter(char),
    MissingDenominator,
    MissingImaginaryUnit,
    UnterminatedString,
    VectorsUnsupported,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReaderError {
    pub name: String,
    pub line: usize,
    pub kind: ReaderErrorKind,
}

impl fmt::Display for ReaderError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use self::ReaderErrorKind::*;

        write!(f, "{}:{} ", self.name, self.line)?;
        match self.kind {
            UnexpectedEof => f.write_str("unexpected end of code"),
            UnexpectedCharacter(c) => write!(f, "unexpected character `{}`", c),
            MissingDenominator => f.write_str("invalid number format, expecting denominator"),
            MissingImaginaryUnit => {
                f.write_str("invalid number format, expecting 'i' for complex")
            }
            UnterminatedString => f.write_str("unterminated string"),
            VectorsUnsupported => f.write_str("vectors are not supported"),
        }
    }
}

impl Error for ReaderError {}

/// Reads the first datum of `text`
pub fn parse(text: &str) -> Result<Value, ReaderError> {
    let mut parser = Parser::new(text);
    match parser.next_datum()? {
        Some(datum) => Ok(datum),
        None => Err(parser.error(ReaderErrorKind::UnexpectedEof)),
    }
}

/// A recursive descent reader over one source text, yielding one datum at
/// a time
pub struct Parser {
    chars: Vec<char>,
    name: String,
    pos: usize,
    line: usize,
    failed: bool,
}

impl Parser {
    pub fn new(text: &str) -> Parser {
        Parser::with_name(text, "<input>")
    }

    /// `name` is only used in error messages, e.g. a file path
    pub fn with_name(text: &str, name: &str) -> Parser {
        Parser {
            chars: text.chars().collect(),
            name: name.to_owned(),
            pos: 0,
            line: 1,
            failed: false,
        }
    }

    /// The next datum, or `None` once only whitespace and comments remain
    pub fn next_datum(&mut self) -> Result<Option<Value>, ReaderError> {
        self.skip_all();
        if !self.more() {
            return Ok(None);
        }
        let datum = self.parse_expr()?;
        ok_some!(datum)
    }

    fn parse_expr(&mut self) -> Result<Value, ReaderError> {
        use self::ReaderErrorKind::*;

        self.skip_all();
        let c = match self.peek(0) {
            Some(c) => c,
            None => return Err(self.error(UnexpectedEof)),
        };

        match c {
            '0'..='9' => self.parse_number(),
            '+' | '-' if is_digit(self.peek(1)) => self.parse_number(),
            '#' => match self.peek(1) {
                Some('t') => {
                    self.pop(2);
                    Ok(Value::Boolean(true))
                }
                Some('f') => {
                    self.pop(2);
                    Ok(Value::Boolean(false))
                }
                Some('(') => Err(self.error(VectorsUnsupported)),
                _ => Ok(self.parse_symbol()),
            },
            '(' => self.parse_list(),
            '\'' => self.parse_quote(),
            '"' => self.parse_string(),
            ')' | '.' => Err(self.error(UnexpectedCharacter(c))),
            _ => Ok(self.parse_symbol()),
        }
    }

    // `()` is Nil, `(a b . c)` an improper list
    fn parse_list(&mut self) -> Result<Value, ReaderError> {
        use self::ReaderErrorKind::*;

        self.pop(1);
        let mut elements = vec![];

        loop {
            self.skip_all();
            match self.peek(0) {
                None => return Err(self.error(UnexpectedEof)),
                Some(')') => {
                    self.pop(1);
                    return Ok(Value::list(elements));
                }
                Some('.') if elements.is_empty() => {
                    return Err(self.error(UnexpectedCharacter('.')))
                }
                Some('.') => {
                    self.pop(1);
                    let tail = self.parse_expr()?;
                    self.skip_all();
                    return match self.peek(0) {
                        Some(')') => {
                            self.pop(1);
                            Ok(Value::improper_list(elements, tail))
                        }
                        Some(c) => Err(self.error(UnexpectedCharacter(c))),
                        None => Err(self.error(UnexpectedEof)),
                    };
                }
                Some(_) => elements.push(self.parse_expr()?),
            }
        }
    }

    fn parse_quote(&mut self) -> Result<Value, ReaderError> {
        self.pop(1);
        let quoted = self.parse_expr()?;
        Ok(Value::list(vec![Value::symbol(QUOTE), quoted]))
    }

    fn parse_string(&mut self) -> Result<Value, ReaderError> {
        self.pop(1);
        let mut s = String::new();

        loop {
            let c = match self.peek(0) {
                Some(c) => c,
                None => return Err(self.error(ReaderErrorKind::UnterminatedString)),
            };
            self.pop(1);

            match c {
                '"' => return Ok(Value::string(&s)),
                '\\' => {
                    let escaped = match self.peek(0) {
                        Some(escaped) => escaped,
                        None => return Err(self.error(ReaderErrorKind::UnterminatedString)),
                    };
                    self.pop(1);
                    s.push(match escaped {
                        'n' => '\n',
                        't' => '\t',
                        other => other,
                    });
                }
                '\n' => {
                    self.line += 1;
                    s.push(c);
                }
                _ => s.push(c),
            }
        }
    }

    // The first character is always part of the symbol
    fn parse_symbol(&mut self) -> Value {
        let start = self.pos;
        self.pop(1);
        while let Some(c) = self.peek(0) {
            if is_delimiter(c) {
                break;
            }
            self.pop(1);
        }
        let name: String = self.chars[start..self.pos].iter().collect();
        Value::symbol(&name)
    }

    //
    // Scanning
    //
    fn skip_all(&mut self) {
        loop {
            self.skip_whitespace();
            if !self.eat(';') {
                break;
            }
            while let Some(c) = self.peek(0) {
                if c == '\n' {
                    break;
                }
                self.pop(1);
            }
        }
    }

    fn skip_whitespace(&mut self) {
        while let Some(c) = self.peek(0) {
            if !c.is_whitespace() {
                break;
            }
            if c == '\n' {
                self.line += 1;
            }
            self.pop(1);
        }
    }

    fn more(&self) -> bool {
        self.pos < self.chars.len()
    }

    fn peek(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).cloned()
    }

    fn pop(&mut self, n: usize) {
        self.pos += n;
    }

    fn eat(&mut self, c: char) -> bool {
        if self.peek(0) != Some(c) {
            return false;
        }
        self.pos += 1;
        true
    }

    fn error(&self, kind: ReaderErrorKind) -> ReaderError {
        ReaderError {
            name: self.name.clone(),
            line: self.line,
            kind,
        }
    }
}

/// Yields datums until the end of the text or the first error
impl Iterator for Parser {
    type Item = Result<Value, ReaderError>;

    fn next(&mut self) -> Option<Result<Value, ReaderError>> {
        if self.failed {
            return None;
        }
        let next = self.next_datum().transpose();
        self.failed = match next {
            Some(Err(_)) => true,
            _ => false,
        };
        next
    }
}

fn is_digit(c: Option<char>) -> bool {
    c.map_or(false, |c| c.is_ascii_digit())
}

fn is_delimiter(c: char) -> bool {
    c.is_whitespace() || "()',@.\";".contains(c)
}
