//! Printed representation of values.

use std::fmt::{Display, Formatter, Result};

use crate::data::{Arena, Object, Value};
use crate::eval::primitive_name;

/// Displays a value stored in an arena.
///
/// Strings are quoted unless [`Printer::unquoted`] is used; nothing else
/// changes between the two forms.
#[derive(Clone, Copy)]
pub struct Printer<'a> {
    arena: &'a Arena,
    value: Value,
    quote_strings: bool,
}

impl<'a> Printer<'a> {
    pub fn new(arena: &'a Arena, value: Value) -> Self {
        Printer {
            arena,
            value,
            quote_strings: true,
        }
    }

    /// Prints strings as their raw text.
    pub fn unquoted(self) -> Self {
        Printer {
            quote_strings: false,
            ..self
        }
    }

    fn with(self, value: Value) -> Self {
        Printer { value, ..self }
    }

    fn text(&self) -> std::borrow::Cow<'a, str> {
        String::from_utf8_lossy(self.arena.text(self.value))
    }

    fn list(&self, f: &mut Formatter<'_>) -> Result {
        write!(f, "(")?;
        let mut t = self.value;
        loop {
            match (self.arena.car(t), self.arena.cdr(t)) {
                (Ok(head), Ok(tail)) => {
                    write!(f, "{}", self.with(head))?;
                    if tail.is_nil() {
                        break;
                    }
                    if !tail.is_cons() {
                        write!(f, " . {}", self.with(tail))?;
                        break;
                    }
                    write!(f, " ")?;
                    t = tail;
                }
                _ => break,
            }
        }
        write!(f, ")")
    }
}

impl Display for Printer<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        match self.value.decode() {
            Object::Nil => write!(f, "()"),
            Object::Number(n) => write!(f, "{}", Number(n)),
            Object::Primitive(i) => write!(f, "<{}>", primitive_name(i).unwrap_or("?")),
            Object::Symbol(_) => write!(f, "{}", self.text()),
            Object::String(_) if self.quote_strings => write!(f, "\"{}\"", self.text()),
            Object::String(_) => write!(f, "{}", self.text()),
            Object::Pair(_) => self.list(f),
            Object::Closure(i) => write!(f, "{{{i}}}"),
            Object::Macro(i) => write!(f, "[{i}]"),
        }
    }
}

/// A number, printed so that it reads back as the same value.
pub struct Number(pub f64);

impl Display for Number {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        let n = self.0;
        let magnitude = n.abs();
        if n.is_nan() {
            write!(f, "nan")
        } else if n.is_infinite() {
            write!(f, "{}", if n < 0.0 { "-inf" } else { "inf" })
        } else if magnitude == 0.0 || (1e-5..1e16).contains(&magnitude) {
            write!(f, "{n}")
        } else {
            write!(f, "{n:e}")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::data::Tag;

    #[test]
    fn numbers() {
        for (n, want) in [
            (6.0, "6"),
            (5000050000.0, "5000050000"),
            (-2.5, "-2.5"),
            (0.1, "0.1"),
            (1e20, "1e20"),
            (1.5e-7, "1.5e-7"),
            (-0.0, "-0"),
            (f64::INFINITY, "inf"),
            (f64::NEG_INFINITY, "-inf"),
            (f64::NAN, "nan"),
        ] {
            assert_eq!(Number(n).to_string(), want);
        }
    }

    #[test]
    fn printed_numbers_read_back() {
        for n in [1.0 / 3.0, 6.02214076e23, -1e-300, 123456789.125, 9.999999999999999e15] {
            let printed = Number(n).to_string();
            assert_eq!(printed.parse::<f64>().map(f64::to_bits), Ok(n.to_bits()), "{printed}");
        }
    }

    #[test]
    fn compound_values() {
        let mut arena = Arena::new(&Config::default()).unwrap();
        let s = arena.make_string(b"a b").unwrap();
        let slot = arena.push(s).unwrap();
        let sym = arena.intern(b"sym").unwrap();
        let dotted = arena.cons(sym, Value::number(2.0)).unwrap();
        let list = arena
            .list(&[arena.cell(slot), dotted, Value::NIL])
            .unwrap();

        assert_eq!(Printer::new(&arena, list).to_string(), "(\"a b\" (sym . 2) ())");
        assert_eq!(
            Printer::new(&arena, list).unquoted().to_string(),
            "(a b (sym . 2) ())"
        );
        assert_eq!(
            Printer::new(&arena, Value::boxed(Tag::Closure, 12)).to_string(),
            "{12}"
        );
        assert_eq!(
            Printer::new(&arena, Value::boxed(Tag::Macro, 4)).to_string(),
            "[4]"
        );
        assert_eq!(
            Printer::new(&arena, Value::boxed(Tag::Primitive, 0)).to_string(),
            "<type>"
        );
    }
}
