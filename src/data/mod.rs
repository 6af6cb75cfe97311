//! Lisp data types and the arena that stores them.
//!
//! Every Lisp value is a [`Value`]: a 64-bit word that is either a plain
//! `f64` or a NaN carrying a [`Tag`] and an ordinal. Compound data lives in
//! a single fixed-size [`Arena`]:
//! - pairs, closures and macros in a pool of cells, reclaimed by mark-sweep;
//! - symbols and strings in a bump-allocated heap, compacted after each sweep;
//! - the evaluation stack, which doubles as the collector's root set.
//!
//! Pairs never move. Symbols and strings do, on every collection: a symbol
//! or string held outside the arena across an allocation is stale afterwards.
//! Hold it in a stack slot (or any live pair) and read it back instead.

mod arena;
mod bitset;
mod interrupt;
mod tag;
mod value;

pub use arena::{Arena, ArenaStats, HeapRecord};
pub use interrupt::Interrupt;
pub use tag::Tag;
pub use value::{Object, Value};

#[cfg(feature = "render")]
mod render;
#[cfg(feature = "render")]
pub use render::render_pool;
