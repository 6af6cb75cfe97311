//! The arena: one block of storage shared by the pair pool, the symbol/string
//! heap, and the evaluation stack.
//!
//! Layout, in cells of 8 bytes:
//!
//! ```text
//! 0            pool_cells                              cells
//! | pair pool  | heap (bytes, grows up) ->  <- stack  |
//!                                  hp ^          ^ sp
//! ```
//!
//! - The pool is an array of pairs at even cell indices. Free pairs are
//!   threaded through their head cell as nil-tagged values whose ordinal is
//!   the next free pair.
//! - The heap holds symbol and string records back to back: a 4-byte
//!   back-reference field followed by NUL-terminated text. A symbol or string
//!   value's ordinal is the byte offset of its text.
//! - The stack is the collector's root set. Anything not yet linked into the
//!   global environment must be pushed to survive a collection.
//!
//! Allocation and collection live in the submodules; this module only keeps
//! the bookkeeping and the headroom check between heap and stack.

mod gc;
mod heap;
mod pool;

pub use heap::HeapRecord;

use super::bitset::BitSet;
use super::interrupt::Interrupt;
use super::{Tag, Value};
use crate::config::{Config, Marker};
use crate::error::{Error, Result};

/// Bytes per cell.
const CELL: u32 = 8;

/// Cumulative and current arena figures.
#[derive(Default, Debug, Copy, Clone, PartialEq, Eq)]
pub struct ArenaStats {
    /// Pairs on the free list.
    pub free_pairs: u32,
    /// Bytes in use by heap records.
    pub heap_bytes: u32,
    /// Cells in use by the stack.
    pub stack_cells: u32,
    /// Unused cells between heap and stack.
    pub headroom_cells: u32,
    pub collections: u64,
    pub max_heap_bytes: u32,
    pub max_stack_cells: u32,
}

pub struct Arena {
    mem: Vec<u8>,
    pool_cells: u32,
    cells: u32,

    /// Head of the free list.
    fp: u32,
    /// Length of the free list.
    free: u32,
    /// Heap pointer: byte offset of the next record.
    hp: u32,
    /// Stack pointer: cell index of the top of the stack.
    sp: u32,

    /// Mark bits, one per pair.
    used: BitSet,
    env: Value,

    always_collect: bool,
    marker: Marker,
    interrupt: Interrupt,
    high_water: ArenaStats,
}

impl Arena {
    pub fn new(config: &Config) -> Result<Self> {
        config.validate()?;
        let cells = config.cells();
        let mut arena = Arena {
            mem: vec![0; (cells * CELL) as usize],
            pool_cells: config.pool_cells,
            cells,
            fp: 0,
            free: 0,
            hp: 0,
            sp: 0,
            used: BitSet::with_capacity((config.pool_cells / 2) as usize),
            env: Value::NIL,
            always_collect: config.always_collect,
            marker: config.marker,
            interrupt: Interrupt::new(),
            high_water: ArenaStats::default(),
        };
        arena.reset_all();
        tracing::debug!(
            "arena of {} pool cells and {} stack/heap cells",
            config.pool_cells,
            config.stack_cells
        );
        Ok(arena)
    }

    /// Discards everything: all pairs free, heap and stack empty, no environment.
    pub fn reset_all(&mut self) {
        self.hp = self.heap_base();
        self.sp = self.cells;
        self.env = Value::NIL;
        self.used.clear_all();
        self.sweep();
    }

    pub fn pool_cells(&self) -> u32 {
        self.pool_cells
    }

    /// Total cells; also the terminator of heap back-reference chains.
    pub fn cells(&self) -> u32 {
        self.cells
    }

    /// Byte offset of the first heap record.
    pub fn heap_base(&self) -> u32 {
        self.pool_cells * CELL
    }

    pub fn fp(&self) -> u32 {
        self.fp
    }

    pub fn hp(&self) -> u32 {
        self.hp
    }

    pub fn sp(&self) -> u32 {
        self.sp
    }

    pub fn env(&self) -> Value {
        self.env
    }

    pub fn set_env(&mut self, env: Value) {
        self.env = env;
    }

    pub fn interrupt(&self) -> &Interrupt {
        &self.interrupt
    }

    pub fn set_always_collect(&mut self, on: bool) {
        self.always_collect = on;
    }

    pub fn set_marker(&mut self, marker: Marker) {
        self.marker = marker;
    }

    /// Reads the value in cell `i`.
    pub fn cell(&self, i: u32) -> Value {
        let at = (i * CELL) as usize;
        let mut word = [0u8; CELL as usize];
        word.copy_from_slice(&self.mem[at..at + CELL as usize]);
        Value::from_bits(u64::from_ne_bytes(word))
    }

    pub fn set_cell(&mut self, i: u32, v: Value) {
        let at = (i * CELL) as usize;
        self.mem[at..at + CELL as usize].copy_from_slice(&v.bits().to_ne_bytes());
    }

    /// Whether `extra` more heap bytes fit below the stack, leaving one free cell.
    pub fn has_headroom(&self, extra: u32) -> bool {
        (self.hp as u64) + (extra as u64) <= (self.sp as u64 - 1) * CELL as u64
    }

    /// Pushes `x`, collecting if the stack has run into the heap.
    /// Returns the cell index of the new slot.
    pub fn push(&mut self, x: Value) -> Result<u32> {
        self.sp -= 1;
        let slot = self.sp;
        self.set_cell(slot, x);
        if !self.has_headroom(0) || self.always_collect {
            self.collect()?;
            if !self.has_headroom(0) {
                self.sp += 1;
                return Err(Error::StackOver);
            }
        }
        self.high_water.max_stack_cells = self.high_water.max_stack_cells.max(self.cells - self.sp);
        Ok(slot)
    }

    pub fn pop(&mut self) -> Value {
        let v = self.cell(self.sp);
        self.sp += 1;
        v
    }

    /// Drops every stack slot above `to`.
    pub fn reset_stack(&mut self, to: u32) {
        debug_assert!(to <= self.cells);
        self.sp = to.min(self.cells);
    }

    /// Empties the stack.
    pub fn unwind_all(&mut self) {
        self.sp = self.cells;
    }

    pub fn stats(&self) -> ArenaStats {
        ArenaStats {
            free_pairs: self.free,
            heap_bytes: self.hp - self.heap_base(),
            stack_cells: self.cells - self.sp,
            headroom_cells: self.sp.saturating_sub(self.hp.div_ceil(CELL)),
            collections: self.high_water.collections,
            max_heap_bytes: self.high_water.max_heap_bytes,
            max_stack_cells: self.high_water.max_stack_cells,
        }
    }

    /// Iterator over the values on the stack, top first.
    pub fn stack(&self) -> impl '_ + Iterator<Item = Value> {
        (self.sp..self.cells).map(|i| self.cell(i))
    }

    /// Whether the pair at pool index `i` was marked by the last collection.
    pub fn is_marked(&self, i: u32) -> bool {
        self.used.get((i / 2) as usize)
    }
}

impl std::fmt::Debug for Arena {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Arena")
            .field("fp", &self.fp)
            .field("hp", &self.hp)
            .field("sp", &self.sp)
            .field("env", &self.env)
            .field("stats", &self.stats())
            .finish()
    }
}

/// Tag test used by the collector: does `v` refer to a pool pair?
fn refers_to_pair(v: Value) -> bool {
    v.tag().is_pool_ref()
}

/// Tag test used by the compactor: does `v` refer to a heap record?
fn refers_to_record(v: Value) -> bool {
    matches!(v.tag(), Tag::Symbol | Tag::String)
}
