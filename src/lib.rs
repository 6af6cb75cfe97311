//! A small Lisp on a single, NaN-boxed arena.
//!
//! Values are 64-bit doubles; the tagged NaN patterns carry symbols,
//! strings, pairs, closures, macros and primitives. Pairs live in a pool
//! reclaimed by a mark-sweep collector; symbol and string text lives in a
//! heap that is compacted on every collection.

pub mod config;
pub mod data;
pub mod error;
pub mod eval;
pub mod printer;
pub mod reader;
mod repl;

pub use config::Config;
pub use data::Value;
pub use error::{Error, Result};
pub use eval::Interpreter;
pub use repl::repl;

#[cfg(feature = "render")]
pub use data::render_pool;
