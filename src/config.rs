//! Interpreter sizing and collector options.

use crate::error::{Error, Result};

/// How the pool collector finds live pairs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Marker {
    /// Depth-first search with an explicit, growable stack of pair indices.
    #[default]
    Worklist,
    /// Deutsch-Schorr-Waite pointer reversal: constant auxiliary space.
    PointerReversal,
}

impl std::str::FromStr for Marker {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "worklist" => Ok(Marker::Worklist),
            "reversal" | "pointer-reversal" => Ok(Marker::PointerReversal),
            _ => Err(format!("unknown marker {s:?}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Cells in the pair pool; two per pair.
    pub pool_cells: u32,
    /// Cells shared by the heap (growing up) and the stack (growing down).
    pub stack_cells: u32,
    /// Collect on every allocation and push.
    pub always_collect: bool,
    pub marker: Marker,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            pool_cells: 8192,
            stack_cells: 2048,
            always_collect: false,
            marker: Marker::Worklist,
        }
    }
}

impl Config {
    const MIN_CELLS: u32 = 64;

    /// Reads overrides from `NANLISP_POOL`, `NANLISP_STACK`, `NANLISP_ALWAYS_GC`
    /// and `NANLISP_MARKER`.
    pub fn from_env() -> Self {
        let mut config = Config::default();
        if let Some(v) = env_parse("NANLISP_POOL") {
            config.pool_cells = v;
        }
        if let Some(v) = env_parse("NANLISP_STACK") {
            config.stack_cells = v;
        }
        if let Some(v) = env_parse("NANLISP_ALWAYS_GC") {
            config.always_collect = v;
        }
        if let Some(v) = env_parse("NANLISP_MARKER") {
            config.marker = v;
        }
        config
    }

    /// Total cells in the arena.
    pub fn cells(&self) -> u32 {
        self.pool_cells + self.stack_cells
    }

    pub fn validate(&self) -> Result<()> {
        if self.pool_cells % 2 != 0 || self.pool_cells < Self::MIN_CELLS {
            return Err(Error::Arguments);
        }
        if self.stack_cells < Self::MIN_CELLS {
            return Err(Error::Arguments);
        }
        // Heap offsets are byte offsets, and must fit an ordinal too.
        match self.pool_cells.checked_add(self.stack_cells) {
            Some(n) if n.checked_mul(8).is_some() => Ok(()),
            _ => Err(Error::Arguments),
        }
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    let raw = std::env::var(name).ok()?;
    match raw.parse() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!("ignoring malformed {name}={raw:?}");
            None
        }
    }
}
