//! Symbol and string records, and heap compaction.
//!
//! A record is a back-reference field followed by NUL-terminated text.
//! Outside of compaction the back-reference field is unused.
//!
//! Compaction threads a chain through every cell that refers to a record:
//! the record's back-reference field holds the first referring cell, whose
//! ordinal holds the next, and so on, ending at the arena's cell count. A
//! forward scan then rewrites each chain to the record's new offset and
//! slides the record down. Records with an empty chain are dropped.

use super::*;

/// Size of the back-reference field.
const REF: u32 = 4;

/// A record as seen from outside the arena.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeapRecord {
    /// Byte offset of the text; the ordinal of values that refer to it.
    pub offset: u32,
    pub text: Vec<u8>,
}

impl Arena {
    fn read_ref(&self, at: u32) -> u32 {
        let at = at as usize;
        let mut word = [0u8; REF as usize];
        word.copy_from_slice(&self.mem[at..at + REF as usize]);
        u32::from_ne_bytes(word)
    }

    fn write_ref(&mut self, at: u32, v: u32) {
        let at = at as usize;
        self.mem[at..at + REF as usize].copy_from_slice(&v.to_ne_bytes());
    }

    /// Text starting at byte offset `at`, up to its terminator.
    fn text_at(&self, at: u32) -> &[u8] {
        let rest = &self.mem[at as usize..];
        let len = rest.iter().position(|&b| b == 0).unwrap_or(rest.len());
        &rest[..len]
    }

    /// Total size of the record starting at `at`.
    fn record_len(&self, at: u32) -> u32 {
        self.text_at(at + REF).len() as u32 + REF + 1
    }

    /// Text of a symbol or string. Empty for any other value.
    pub fn text(&self, v: Value) -> &[u8] {
        if refers_to_record(v) {
            self.text_at(v.ordinal())
        } else {
            &[]
        }
    }

    /// Reserves a record for `n` bytes of text, collecting once if the heap
    /// would run into the stack. Returns the offset of the text.
    pub fn alloc_bytes(&mut self, n: u32) -> Result<u32> {
        let need = n + REF + 1;
        if !self.has_headroom(need) || self.always_collect {
            self.collect()?;
            if !self.has_headroom(need) {
                return Err(Error::StackOver);
            }
        }
        let record = self.hp;
        self.write_ref(record, self.cells);
        self.hp += need;
        let used = self.hp - self.heap_base();
        self.high_water.max_heap_bytes = self.high_water.max_heap_bytes.max(used);
        Ok(record + REF)
    }

    fn copy(&mut self, text: &[u8]) -> Result<u32> {
        if text.contains(&0) {
            return Err(Error::Arguments);
        }
        let at = self.alloc_bytes(text.len() as u32)?;
        let start = at as usize;
        self.mem[start..start + text.len()].copy_from_slice(text);
        self.mem[start + text.len()] = 0;
        Ok(at)
    }

    /// Returns the symbol spelled `text`, adding it to the heap if it is new.
    ///
    /// Any record with the same text is reused, including a string's. Records
    /// are never modified in place, so sharing is unobservable.
    pub fn intern(&mut self, text: &[u8]) -> Result<Value> {
        let mut at = self.heap_base();
        while at < self.hp {
            if self.text_at(at + REF) == text {
                return Ok(Value::boxed(Tag::Symbol, at + REF));
            }
            at += self.record_len(at);
        }
        Ok(Value::boxed(Tag::Symbol, self.copy(text)?))
    }

    /// Adds a new string record.
    pub fn make_string(&mut self, text: &[u8]) -> Result<Value> {
        Ok(Value::boxed(Tag::String, self.copy(text)?))
    }

    /// Every record on the heap, in address order.
    pub fn records(&self) -> Vec<HeapRecord> {
        let mut result = Vec::new();
        let mut at = self.heap_base();
        while at < self.hp {
            result.push(HeapRecord {
                offset: at + REF,
                text: self.text_at(at + REF).to_vec(),
            });
            at += self.record_len(at);
        }
        result
    }

    /// Adds cell `i` to the chain of the record it refers to.
    fn link(&mut self, i: u32) {
        let v = self.cell(i);
        let record = v.ordinal() - REF;
        let next = self.read_ref(record);
        self.write_ref(record, i);
        self.set_cell(i, v.with_ordinal(next));
    }

    /// Slides live records down over dead ones and rewrites every reference.
    ///
    /// Uses the mark bits of the collection that just ran to find live pool cells.
    pub(super) fn compact(&mut self) {
        let base = self.heap_base();
        let end = self.hp;
        let none = self.cells;

        let mut at = base;
        while at < end {
            self.write_ref(at, none);
            at += self.record_len(at);
        }
        for i in 0..self.pool_cells {
            if self.is_marked(i) && refers_to_record(self.cell(i)) {
                self.link(i);
            }
        }
        for i in self.sp..self.cells {
            if refers_to_record(self.cell(i)) {
                self.link(i);
            }
        }

        let mut hp = base;
        let mut at = base;
        while at < end {
            let n = self.record_len(at);
            let mut k = self.read_ref(at);
            if k != none {
                while k != none {
                    let v = self.cell(k);
                    self.set_cell(k, v.with_ordinal(hp + REF));
                    k = v.ordinal();
                }
                if hp < at {
                    self.mem
                        .copy_within(at as usize..(at + n) as usize, hp as usize);
                }
                hp += n;
            }
            at += n;
        }
        self.hp = hp;
    }
}
