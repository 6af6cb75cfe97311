//! Interpreter errors.
//!
//! Errors are small numeric codes; Lisp code sees them through `catch` as
//! `(ERR . code)` and raises them with `throw`.

use crate::reader::ReadErr;

#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// `car`/`cdr` (or a destructuring form) applied to something that is not a pair.
    NotAPair,
    /// Evaluation was interrupted.
    Break,
    UnboundSymbol(String),
    /// The operator of an application is not a primitive, closure or macro.
    CannotApply,
    Arguments,
    /// The heap and stack have met, even after a collection.
    StackOver,
    /// A collection freed no pairs.
    OutOfMemory,
    Syntax(String),
    /// A `throw` with a code outside the built-in range.
    Thrown(i64),
    /// `(quit)`. Not a numbered error; `catch` does not intercept it.
    Quit,
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn code(&self) -> i64 {
        match self {
            Error::NotAPair => 1,
            Error::Break => 2,
            Error::UnboundSymbol(_) => 3,
            Error::CannotApply => 4,
            Error::Arguments => 5,
            Error::StackOver => 6,
            Error::OutOfMemory => 7,
            Error::Syntax(_) => 8,
            Error::Thrown(n) => *n,
            Error::Quit => 0,
        }
    }

    /// The error a `throw` of `code` raises.
    pub fn from_code(code: i64) -> Self {
        match code {
            1 => Error::NotAPair,
            2 => Error::Break,
            3 => Error::UnboundSymbol(String::new()),
            4 => Error::CannotApply,
            5 => Error::Arguments,
            6 => Error::StackOver,
            7 => Error::OutOfMemory,
            8 => Error::Syntax(String::new()),
            n => Error::Thrown(n),
        }
    }

    /// Whether a `catch` form may intercept this error.
    pub fn is_catchable(&self) -> bool {
        !matches!(self, Error::Quit)
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::NotAPair => write!(f, "not a pair"),
            Error::Break => write!(f, "break"),
            Error::UnboundSymbol(name) if name.is_empty() => write!(f, "unbound symbol"),
            Error::UnboundSymbol(name) => write!(f, "unbound symbol {name}"),
            Error::CannotApply => write!(f, "cannot apply"),
            Error::Arguments => write!(f, "arguments"),
            Error::StackOver => write!(f, "stack over"),
            Error::OutOfMemory => write!(f, "out of memory"),
            Error::Syntax(detail) if detail.is_empty() => write!(f, "syntax"),
            Error::Syntax(detail) => write!(f, "syntax: {detail}"),
            Error::Thrown(_) => write!(f, "thrown"),
            Error::Quit => write!(f, "quit"),
        }
    }
}

impl std::error::Error for Error {}

impl From<ReadErr> for Error {
    fn from(value: ReadErr) -> Self {
        match value {
            ReadErr::Error(e) => Error::Syntax(e),
            ReadErr::Incomplete(e) => Error::Syntax(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Error;

    #[test]
    fn codes_round_trip() {
        for code in 1..=8 {
            assert_eq!(Error::from_code(code).code(), code);
        }
        assert_eq!(Error::from_code(42), Error::Thrown(42));
        assert_eq!(Error::from_code(-1).code(), -1);
    }

    #[test]
    fn quit_escapes_catch() {
        assert!(!Error::Quit.is_catchable());
        assert!(Error::OutOfMemory.is_catchable());
    }

    #[test]
    fn messages() {
        assert_eq!(
            Error::UnboundSymbol("frob".to_owned()).to_string(),
            "unbound symbol frob"
        );
        assert_eq!(Error::StackOver.to_string(), "stack over");
    }
}
