//! Support for reading Lisp expressions from files, strings and a terminal.
//!
//! Input comes from a stack of sources. `load` pushes a file; once a source
//! runs out of tokens it is dropped and reading continues with the one below.
//! The terminal, if attached, sits below all of them and is read a line at a
//! time, prompting before each line.

use std::collections::VecDeque;
use std::io::{BufRead, ErrorKind, Write};
use std::path::Path;

use crate::error::{Error, Result};
use token::{tokenize, TokenOffset};

mod parse;
mod token;

pub use parse::read;
pub use token::Token;

/// Error type if a read does not complete.
///
/// A reader may experience a true tokenizing/parsing error, e.g. "())", that no additional input can fix.
/// This is distinct from a reader that gets an unexpected end-of-input, e.g. "(()":
/// it may be that more input will fix the issue.
///
/// If input is coming in interactively, this is a useful distinction;
/// in the first case, we'd want to indicate an error to the user,
/// while in the latter we'd like to prompt the user for more input.
///
/// This type covers this distinction.
#[derive(Debug, Clone)]
pub enum ReadErr {
    Error(String),
    Incomplete(String),
}

impl std::fmt::Display for ReadErr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::result::Result<(), std::fmt::Error> {
        match self {
            ReadErr::Error(e) => write!(f, "error in input: {e}"),
            ReadErr::Incomplete(e) => write!(f, "incomplete input: {e}"),
        }
    }
}

impl ReadErr {
    /// Add additional context to an error.
    pub fn annotate(self, more: impl AsRef<str>) -> Self {
        match self {
            ReadErr::Error(e) => ReadErr::Error(format!("{}: {}", more.as_ref(), e)),
            ReadErr::Incomplete(e) => ReadErr::Incomplete(format!("{}: {}", more.as_ref(), e)),
        }
    }
}

/// The main result type for this module:
/// a T (token, expression, etc), or an error, or incomplete.
pub type ReadResult<T> = std::result::Result<T, ReadErr>;

impl From<ReadErr> for std::io::Error {
    fn from(value: ReadErr) -> Self {
        match value {
            ReadErr::Incomplete(s) => std::io::Error::new(ErrorKind::UnexpectedEof, s),
            ReadErr::Error(s) => std::io::Error::new(ErrorKind::InvalidInput, s),
        }
    }
}

/// Limit on pushed sources, so a file that loads itself fails instead of
/// exhausting memory.
const MAX_SOURCES: usize = 10;

struct Source {
    name: String,
    tokens: VecDeque<TokenOffset>,
}

struct Terminal {
    input: Box<dyn BufRead>,
    prompt_out: Box<dyn Write>,
    prompt: String,
    tokens: VecDeque<TokenOffset>,
    /// Text of a string literal still waiting for its closing quote.
    pending: String,
}

impl Terminal {
    fn next_token(&mut self) -> ReadResult<Option<TokenOffset>> {
        loop {
            if let Some(token) = self.tokens.pop_front() {
                return Ok(Some(token));
            }
            // Prompts are best-effort; a closed prompt stream doesn't stop input.
            let _ = write!(self.prompt_out, "{}", self.prompt);
            let _ = self.prompt_out.flush();
            self.prompt = "?".to_owned();

            let mut line = String::new();
            let n = self
                .input
                .read_line(&mut line)
                .map_err(|e| ReadErr::Error(format!("terminal: {e}")))?;
            if n == 0 {
                if self.pending.is_empty() {
                    return Ok(None);
                }
                self.pending.clear();
                return Err(ReadErr::Incomplete(
                    "end of input inside a string".to_owned(),
                ));
            }
            self.pending.push_str(&line);
            match tokenize(self.pending.as_bytes()) {
                Ok(tokens) => {
                    self.tokens.extend(tokens);
                    self.pending.clear();
                }
                // The line ended inside a string; keep reading.
                Err(ReadErr::Incomplete(_)) => continue,
                Err(e) => {
                    self.pending.clear();
                    return Err(e);
                }
            }
        }
    }

    fn discard(&mut self) {
        self.tokens.clear();
        self.pending.clear();
    }
}

/// The stack of input sources.
#[derive(Default)]
pub struct Reader {
    sources: Vec<Source>,
    /// Sources below this depth are not read from; neither is the terminal,
    /// unless this is zero.
    floor: usize,
    terminal: Option<Terminal>,
}

impl Reader {
    pub fn new() -> Self {
        Default::default()
    }

    /// Reads from `input` once every pushed source is exhausted.
    /// Prompts are written to `prompt_out`.
    pub fn attach_terminal(&mut self, input: Box<dyn BufRead>, prompt_out: Box<dyn Write>) {
        self.terminal = Some(Terminal {
            input,
            prompt_out,
            prompt: String::new(),
            tokens: VecDeque::new(),
            pending: String::new(),
        });
    }

    /// Sets the prompt shown before the next terminal line.
    /// Continuation lines are prompted with `?`.
    pub fn set_prompt(&mut self, prompt: impl Into<String>) {
        if let Some(terminal) = &mut self.terminal {
            terminal.prompt = prompt.into();
        }
    }

    /// Number of pushed sources.
    pub fn depth(&self) -> usize {
        self.sources.len()
    }

    /// Restricts reading to sources at or above `floor`, returning the previous floor.
    pub(crate) fn set_floor(&mut self, floor: usize) -> usize {
        std::mem::replace(&mut self.floor, floor)
    }

    /// Pushes the tokens of `text`, to be read before anything else.
    pub fn push_str(&mut self, name: impl Into<String>, text: &str) -> Result<()> {
        let name = name.into();
        if self.sources.len() >= MAX_SOURCES {
            tracing::warn!("too many open sources to read {name}");
            return Err(Error::Arguments);
        }
        let tokens = tokenize(text.as_bytes()).map_err(|e| e.annotate(&name))?;
        tracing::debug!("reading {name}: {} tokens", tokens.len());
        self.sources.push(Source {
            name,
            tokens: tokens.into(),
        });
        Ok(())
    }

    /// Pushes the contents of the file at `path`.
    ///
    /// A file that can't be read is an argument error; one that can't be
    /// tokenized is a syntax error.
    pub fn push_file(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            tracing::debug!("cannot read {}: {e}", path.display());
            Error::Arguments
        })?;
        self.push_str(path.display().to_string(), &text)
    }

    /// Drops every pushed source above the floor, and any buffered terminal input.
    pub fn close_all(&mut self) {
        self.truncate(self.floor);
        if let Some(terminal) = &mut self.terminal {
            terminal.discard();
        }
    }

    /// Drops sources above `depth`.
    pub(crate) fn truncate(&mut self, depth: usize) {
        for source in self.sources.drain(depth.min(self.sources.len())..) {
            tracing::debug!("closing {}", source.name);
        }
    }

    /// The next token from the topmost source that has one.
    /// `None` when every readable source is exhausted.
    pub fn next_token(&mut self) -> ReadResult<Option<TokenOffset>> {
        while self.sources.len() > self.floor {
            if let Some(token) = self.sources.last_mut().and_then(|s| s.tokens.pop_front()) {
                return Ok(Some(token));
            }
            if let Some(source) = self.sources.pop() {
                tracing::debug!("finished reading {}", source.name);
            }
        }
        match (&mut self.terminal, self.floor) {
            (Some(terminal), 0) => terminal.next_token(),
            _ => Ok(None),
        }
    }

    /// Blocks until the terminal supplies a line, if there is a terminal.
    pub fn wait_for_line(&mut self) {
        if let Some(terminal) = &mut self.terminal {
            let mut line = String::new();
            let _ = terminal.input.read_line(&mut line);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(reader: &mut Reader) -> Vec<Token> {
        let mut result = Vec::new();
        while let Some(t) = reader.next_token().unwrap() {
            result.push(t.token);
        }
        result
    }

    #[test]
    fn sources_stack() {
        let mut reader = Reader::new();
        reader.push_str("outer", "a b").unwrap();
        assert_eq!(
            reader.next_token().unwrap().map(Token::from),
            Some(Token::Symbol("a".to_owned()))
        );
        reader.push_str("inner", "1").unwrap();
        assert_eq!(
            drain(&mut reader),
            vec![Token::Number(1.0), Token::Symbol("b".to_owned())]
        );
        assert_eq!(reader.depth(), 0);
    }

    #[test]
    fn floor_hides_lower_sources() {
        let mut reader = Reader::new();
        reader.push_str("outer", "a").unwrap();
        let saved = reader.set_floor(1);
        reader.push_str("inner", "b").unwrap();
        assert_eq!(drain(&mut reader), vec![Token::Symbol("b".to_owned())]);
        reader.set_floor(saved);
        assert_eq!(drain(&mut reader), vec![Token::Symbol("a".to_owned())]);
    }

    #[test]
    fn terminal_continues_strings_and_prompts() {
        let mut reader = Reader::new();
        let input = std::io::Cursor::new(b"(a \"b\nc\")\n".to_vec());
        reader.attach_terminal(Box::new(input), Box::new(std::io::sink()));
        reader.set_prompt("1+1>");
        assert_eq!(
            drain(&mut reader),
            vec![
                Token::LParen,
                Token::Symbol("a".to_owned()),
                Token::String("b\nc".to_owned()),
                Token::RParen
            ]
        );
    }

    #[test]
    fn terminal_eof_inside_string_is_incomplete() {
        let mut reader = Reader::new();
        let input = std::io::Cursor::new(b"\"abc\n".to_vec());
        reader.attach_terminal(Box::new(input), Box::new(std::io::sink()));
        match reader.next_token() {
            Err(ReadErr::Incomplete(_)) => (),
            v => panic!("unexpected result: {v:?}"),
        }
    }

    #[test]
    fn missing_file_is_an_argument_error() {
        let mut reader = Reader::new();
        assert_eq!(
            reader.push_file("/nonexistent/nanlisp/file.lisp"),
            Err(Error::Arguments)
        );
    }

    #[test]
    fn sources_are_limited() {
        let mut reader = Reader::new();
        for i in 0..MAX_SOURCES {
            reader.push_str(format!("s{i}"), "x").unwrap();
        }
        assert_eq!(reader.push_str("one more", "x"), Err(Error::Arguments));
        reader.close_all();
        assert_eq!(reader.depth(), 0);
    }
}
