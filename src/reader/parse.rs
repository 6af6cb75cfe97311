//! Builds expressions in the arena from a stream of tokens.

use super::token::{Token, TokenOffset};
use super::{ReadErr, Reader};
use crate::data::{Arena, Value};
use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Dot {
    /// No dot seen yet.
    None,
    /// A dot; the tail expression comes next.
    Expecting,
    /// The tail is in place; only `)` may follow.
    Done,
}

/// An expression still being read.
enum Frame {
    List {
        /// Stack slot holding the list.
        head: u32,
        /// Cell holding the list's terminating `()`, once the list is non-empty.
        hole: Option<u32>,
        dot: Dot,
    },
    /// A `'`, waiting for the expression it quotes.
    Quote,
}

/// Reads one expression.
/// Returns `None` when the input runs out between expressions.
///
/// Lists are built in place, front to back, and kept on the stack while
/// they are incomplete. Nesting depth is limited only by the arena.
pub fn read(arena: &mut Arena, reader: &mut Reader) -> Result<Option<Value>> {
    let mark = arena.sp();
    let result = read_frames(arena, reader);
    arena.reset_stack(mark);
    result
}

fn read_frames(arena: &mut Arena, reader: &mut Reader) -> Result<Option<Value>> {
    // While we're reading an expression, the stack of incomplete ones, by depth.
    let mut frames: Vec<Frame> = Vec::new();

    loop {
        let Some(TokenOffset {
            token,
            line,
            column,
        }) = reader.next_token()?
        else {
            if frames.is_empty() {
                return Ok(None);
            }
            return Err(ReadErr::Incomplete(format!(
                "got end of input within an expression of depth {}",
                frames.len()
            ))
            .into());
        };

        let mut value = match token {
            Token::LParen => {
                let head = arena.push(Value::NIL)?;
                frames.push(Frame::List {
                    head,
                    hole: None,
                    dot: Dot::None,
                });
                continue;
            }
            Token::Quote => {
                frames.push(Frame::Quote);
                continue;
            }
            Token::Dot => match frames.last_mut() {
                Some(Frame::List {
                    hole: Some(_),
                    dot: dot @ Dot::None,
                    ..
                }) => {
                    *dot = Dot::Expecting;
                    continue;
                }
                _ => {
                    return Err(ReadErr::Error(format!(
                        "unexpected . at line {line} column {column}"
                    ))
                    .into())
                }
            },
            Token::RParen => match frames.pop() {
                Some(Frame::List { head, dot, .. }) if dot != Dot::Expecting => arena.cell(head),
                Some(Frame::List { .. }) => {
                    return Err(ReadErr::Error(format!(
                        "expected an expression before ) at line {line} column {column}"
                    ))
                    .into())
                }
                _ => {
                    return Err(ReadErr::Error(format!(
                        "unexpected ) at line {line} column {column}"
                    ))
                    .into())
                }
            },
            Token::Number(n) => Value::number(n),
            Token::String(s) => arena.make_string(s.as_bytes())?,
            Token::Symbol(s) => arena.intern(s.as_bytes())?,
        };

        // Complete the enclosing frames that this value finishes.
        loop {
            match frames.last_mut() {
                None => return Ok(Some(value)),
                Some(Frame::Quote) => {
                    frames.pop();
                    let slot = arena.push(value)?;
                    let tail = arena.cons(arena.cell(slot), Value::NIL)?;
                    arena.set_cell(slot, tail);
                    let quote = arena.intern(b"quote")?;
                    value = arena.cons(quote, arena.cell(slot))?;
                    arena.pop();
                }
                Some(Frame::List { head, hole, dot }) => {
                    let at = match *dot {
                        Dot::None => {
                            let p = arena.cons(value, Value::NIL)?;
                            let at = std::mem::replace(hole, Some(p.ordinal() + 1));
                            value = p;
                            at
                        }
                        Dot::Expecting => {
                            *dot = Dot::Done;
                            *hole
                        }
                        Dot::Done => {
                            return Err(ReadErr::Error(format!(
                                "expected ) after dotted tail at line {line} column {column}"
                            ))
                            .into())
                        }
                    };
                    arena.set_cell(at.unwrap_or(*head), value);
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::error::Error;
    use crate::printer::Printer;

    fn read_all(arena: &mut Arena, input: &str) -> Result<Vec<String>> {
        let mut reader = Reader::new();
        reader.push_str("test", input)?;
        let mut result = Vec::new();
        while let Some(v) = read(arena, &mut reader)? {
            result.push(Printer::new(arena, v).to_string());
        }
        Ok(result)
    }

    fn arena() -> Arena {
        Arena::new(&Config::default()).unwrap()
    }

    #[test]
    fn parse_several_atoms() -> Result<()> {
        let got = read_all(&mut arena(), "1 -2.5 abc \"one\" ()")?;
        assert_eq!(got, vec!["1", "-2.5", "abc", "\"one\"", "()"]);
        Ok(())
    }

    #[test]
    fn parse_tree() -> Result<()> {
        let input = "(lambda (arga . rest) (arga (+ 1 2))) '(a . b) 'x";
        let got = read_all(&mut arena(), input)?;
        assert_eq!(
            got,
            vec![
                "(lambda (arga . rest) (arga (+ 1 2)))",
                "(quote (a . b))",
                "(quote x)"
            ]
        );
        Ok(())
    }

    #[test]
    fn symbols_read_twice_are_identical() -> Result<()> {
        let mut arena = arena();
        let mut reader = Reader::new();
        reader.push_str("test", "abc abc")?;
        let a = read(&mut arena, &mut reader)?;
        let b = read(&mut arena, &mut reader)?;
        assert_eq!(a, b);
        assert!(a.is_some_and(|v| v.is_symbol()));
        Ok(())
    }

    #[test]
    fn reading_leaves_the_stack_empty() -> Result<()> {
        let mut arena = arena();
        read_all(&mut arena, "(((a) b) c)")?;
        assert_eq!(arena.stats().stack_cells, 0);
        Ok(())
    }

    #[test]
    fn deep_nesting_reads_without_recursion() -> Result<()> {
        let depth = 5000;
        let input = format!("{}x{}", "(".repeat(depth), ")".repeat(depth));
        let mut arena = Arena::new(&Config {
            pool_cells: 16384,
            stack_cells: 8192,
            ..Config::default()
        })?;
        let mut reader = Reader::new();
        reader.push_str("test", &input)?;
        let mut v = read(&mut arena, &mut reader)?.unwrap_or(Value::NIL);
        for _ in 0..depth {
            v = arena.car(v)?;
        }
        assert_eq!(arena.text(v), b"x");
        Ok(())
    }

    #[test]
    fn survives_collection_while_reading() -> Result<()> {
        let mut arena = arena();
        arena.set_always_collect(true);
        let got = read_all(&mut arena, "(define s \"str\" 'sym (1 . 2))")?;
        assert_eq!(got, vec!["(define s \"str\" (quote sym) (1 . 2))"]);
        Ok(())
    }

    #[test]
    fn want_more_on_unbalanced() {
        match read_all(&mut arena(), "(incomplete keep going") {
            Err(Error::Syntax(e)) => assert!(e.contains("depth 1"), "{e}"),
            v => panic!("unexpected result: {v:?}"),
        }
    }

    #[test]
    fn malformed_lists() {
        for input in [")", "(a . b c)", "(. a)", "(a .)", "'.", "'"] {
            match read_all(&mut arena(), input) {
                Err(Error::Syntax(_)) => (),
                v => panic!("unexpected result for {input:?}: {v:?}"),
            }
        }
    }
}
