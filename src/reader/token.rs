//! Module for extracting Lisp tokens from an input stream.

use crate::reader::{ReadErr, ReadResult};

/// A Lisp token.
///
/// Whitespace and comments are ignored.
#[derive(Debug, Clone, PartialEq, PartialOrd)]
pub enum Token {
    LParen,
    RParen,
    Dot,
    Quote,
    String(String),
    Symbol(String),
    Number(f64),
}

/// A token along with its starting position in the input stream.
#[derive(Debug, Clone, PartialEq, PartialOrd)]
pub struct TokenOffset {
    pub token: Token,
    pub line: usize,
    pub column: usize,
}

/// Split the input into its constituent tokens.
pub fn tokenize(mut input: &[u8]) -> ReadResult<Vec<TokenOffset>> {
    let mut result = Vec::new();

    // Position info for debug messages:
    // Line number (starting from 0 - fix it up when doing output)
    let mut line = 0;
    let mut column = 0;
    while !input.is_empty() {
        let next = get_next_token(input)
            .map_err(|err| err.annotate(format!("at line {} column {}", line + 1, column + 1)))?;

        if let Some(token) = next.token {
            result.push(TokenOffset::new(line, column, token));
        }
        line += next.lines;
        if next.lines > 0 {
            column = next.columns
        } else {
            column += next.columns;
        }

        input = next.remainder;
    }

    Ok(result)
}

impl TokenOffset {
    fn new(line: usize, column: usize, token: Token) -> Self {
        // In useful output, lines and columns are 1-indexed
        TokenOffset {
            token,
            line: line + 1,
            column: column + 1,
        }
    }
}

impl From<TokenOffset> for Token {
    fn from(value: TokenOffset) -> Self {
        value.token
    }
}

#[derive(Default)]
struct NextToken<'a> {
    // Token retrieved, if any.
    // May be None if only whitespace or a comment was consumed.
    token: Option<Token>,
    // Lines traversed in finding the token.
    lines: usize,
    // Columns in the final line traversed in finding the token.
    columns: usize,

    // Remaining input.
    remainder: &'a [u8],
}

mod regex {
    use regex::bytes::Regex;
    use std::sync::OnceLock;

    pub(super) fn space() -> &'static Regex {
        static SPACE: OnceLock<Regex> = OnceLock::new();
        SPACE.get_or_init(|| {
            Regex::new("\\A[[:space:]]+").expect("could not compile regex for empty space")
        })
    }

    pub(super) fn string() -> &'static Regex {
        static STRING: OnceLock<Regex> = OnceLock::new();
        STRING.get_or_init(|| {
            // Quote, followed by any number of:
            //  - a backslash + character (an escaped character, of any sort), or
            //  - any character other than a quote or backslash
            // The closing quote is checked after the match, so a missing one
            // can be reported as incomplete input.
            Regex::new(r#"\A(?s)"([\\].|[^\\"])*"#).expect("could not compile regex for string")
        })
    }

    pub(super) fn atom() -> &'static Regex {
        static MATCH: OnceLock<Regex> = OnceLock::new();
        MATCH.get_or_init(|| {
            // Symbols and numbers run until whitespace or a parenthesis.
            Regex::new(r#"\A[^[:space:]()]+"#).expect("could not compile regex for atom")
        })
    }

    pub(super) fn comment() -> &'static Regex {
        static MATCH: OnceLock<Regex> = OnceLock::new();
        MATCH.get_or_init(|| Regex::new(r#"\A;.*"#).expect("could not compile regex for comment"))
    }
}

/// Returns the (line, column) that the cursor ends at, after following the given path,
/// assuming it started at (0, 0).
/// Tabs still count as a single column
fn cursor_distance(s: &[u8]) -> (usize, usize) {
    let mut line_count = 0;
    let last_line_start = s
        .iter()
        .enumerate()
        .filter(|(_, &c)| c == b'\n')
        .map(|v| {
            line_count += 1;
            v
        })
        .last()
        .map(|(x, _)| x + 1)
        .unwrap_or(0);
    let column = s.len() - last_line_start;
    (line_count, column)
}

/// Replaces backslash escapes: the C control escapes, and `\x` for any other `x`.
fn unescape(escaped: &str) -> String {
    let mut result = String::with_capacity(escaped.len());
    let mut chars = escaped.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            result.push(c);
            continue;
        }
        match chars.next() {
            Some('a') => result.push('\x07'),
            Some('b') => result.push('\x08'),
            Some('t') => result.push('\t'),
            Some('n') => result.push('\n'),
            Some('v') => result.push('\x0b'),
            Some('f') => result.push('\x0c'),
            Some('r') => result.push('\r'),
            Some(other) => result.push(other),
            None => result.push('\\'),
        }
    }
    result
}

/// Get the next token from the input, and return the remainder of the input.
fn get_next_token(input: &[u8]) -> ReadResult<NextToken<'_>> {
    // Shouldn't bother calling if the remainder is none.
    assert!(!input.is_empty());

    // Single-character matchers:
    if let Some(token) = match input[0] {
        b'(' => Some(Token::LParen),
        b')' => Some(Token::RParen),
        b'\'' => Some(Token::Quote),
        _ => None,
    } {
        return Ok(NextToken {
            token: Some(token),
            lines: 0,
            columns: 1,
            remainder: &input[1..],
        });
    };

    // Regex matchers:
    if let Some(space) = regex::space().find(input) {
        let (lines, columns) = cursor_distance(space.as_bytes());
        return Ok(NextToken {
            token: None,
            lines,
            columns,
            remainder: &input[space.as_bytes().len()..],
        });
    }

    if let Some(s) = regex::comment().find(input) {
        let (lines, columns) = cursor_distance(s.as_bytes());
        return Ok(NextToken {
            token: None,
            lines,
            columns,
            remainder: &input[s.len()..],
        });
    }

    if let Some(s) = regex::string().find(input) {
        let s = s.as_bytes();
        let remainder = &input[s.len()..];
        if remainder.is_empty() || remainder[0] != b'"' {
            // No closing quote; more input may complete it.
            return Err(ReadErr::Incomplete("incomplete string".to_owned()));
        }
        let escaped = std::str::from_utf8(&s[1..])
            .map_err(|_| ReadErr::Error("non-UTF-8 string".to_owned()))?;
        if escaped.contains('\0') {
            return Err(ReadErr::Error("NUL in string".to_owned()));
        }
        // Position after the closing quote.
        let (lines, columns) = cursor_distance(&input[..s.len() + 1]);
        return Ok(NextToken {
            token: Some(Token::String(unescape(escaped))),
            lines,
            columns,
            remainder: &remainder[1..],
        });
    }

    if let Some(s) = regex::atom().find(input) {
        let s = std::str::from_utf8(s.as_bytes())
            .map_err(|_| ReadErr::Error("non-UTF-8 symbol".to_owned()))?;
        let token = if s == "." {
            Token::Dot
        } else if let Ok(n) = s.parse::<f64>() {
            Token::Number(n)
        } else {
            Token::Symbol(s.to_owned())
        };
        return Ok(NextToken {
            token: Some(token),
            lines: 0,
            columns: s.len(),
            remainder: &input[s.len()..],
        });
    }

    Err(ReadErr::Error(
        "could not parse remainder of input as anything".to_owned(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(input: &[u8]) -> ReadResult<Vec<Token>> {
        Ok(tokenize(input)?.into_iter().map(|v| v.token).collect())
    }

    #[test]
    fn recognize_symbols() -> Result<(), ReadErr> {
        for sym in [
            "hello",
            "tree->list",
            "operator<>",
            "set-car!",
            "let*",
            "#t",
            "a'b",
            "-",
            "1+",
        ] {
            assert_eq!(tokens(sym.as_bytes())?, vec![Token::Symbol(sym.to_owned())]);
        }
        Ok(())
    }

    #[test]
    fn tokenize_atoms() -> Result<(), ReadErr> {
        let input = br#"hello "hi" world 24601 -6 -3.33 1e3 inf"#;
        let want = vec![
            Token::Symbol("hello".to_owned()),
            Token::String("hi".to_owned()),
            Token::Symbol("world".to_owned()),
            Token::Number(24601.0),
            Token::Number(-6.0),
            Token::Number(-3.33),
            Token::Number(1000.0),
            Token::Number(f64::INFINITY),
        ];
        assert_eq!(tokens(input)?, want);
        Ok(())
    }

    #[test]
    fn tokenize_punctuation() -> Result<(), ReadErr> {
        let input = b"(a . b)'(1)) ; trailing (comment\n.5";
        let want = vec![
            Token::LParen,
            Token::Symbol("a".to_owned()),
            Token::Dot,
            Token::Symbol("b".to_owned()),
            Token::RParen,
            Token::Quote,
            Token::LParen,
            Token::Number(1.0),
            Token::RParen,
            Token::RParen,
            Token::Number(0.5),
        ];
        assert_eq!(tokens(input)?, want);
        Ok(())
    }

    #[test]
    fn positions_are_one_indexed() -> Result<(), ReadErr> {
        let output = tokenize(b"(a\n  \"b\" c)")?;
        let positions: Vec<_> = output.iter().map(|t| (t.line, t.column)).collect();
        assert_eq!(positions, vec![(1, 1), (1, 2), (2, 3), (2, 6), (2, 7)]);
        Ok(())
    }

    #[test]
    fn string_escapes() -> Result<(), ReadErr> {
        let input = br#""tab\tquote\"slash\\bell\a\q""#;
        assert_eq!(
            tokens(input)?,
            vec![Token::String("tab\tquote\"slash\\bell\x07q".to_owned())]
        );
        Ok(())
    }

    #[test]
    fn unterminated_string_is_incomplete() {
        let input = b"(\n \"hello\n";
        match tokenize(input) {
            Err(ReadErr::Incomplete(e)) => {
                assert!(e.contains("line 2"), "missing line info: {e:?}");
                assert!(e.contains("column 2"), "missing column info: {e:?}");
            }
            v => panic!("unexpected result: {v:?}"),
        }
    }

    #[test]
    fn escaped_quote_does_not_close() {
        match tokenize(br#""\"hello\\\""#) {
            Err(ReadErr::Incomplete(_)) => (),
            v => panic!("unexpected result: {v:?}"),
        }
    }

    #[test]
    fn nul_in_string_is_an_error() {
        match tokenize(b"\"a\0b\"") {
            Err(ReadErr::Error(_)) => (),
            v => panic!("unexpected result: {v:?}"),
        }
    }
}
