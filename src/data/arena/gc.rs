//! Mark-sweep collection of the pair pool.
//!
//! ## Mark
//!
//! Roots are the global environment and every pair-referencing value on the
//! stack. Marking sets one bit per pair; a marked pair is never descended
//! into again, so shared structure and cycles are visited once.
//!
//! Two markers are available:
//! - the worklist marker keeps pending pair indices in a `Vec`;
//! - the pointer-reversal marker keeps its path back to the root in the
//!   cells it is traversing, temporarily overwriting each followed link with
//!   the index of the slot it came from, and restores every link as it
//!   backs out.
//!
//! ## Sweep
//!
//! Every unmarked pair is threaded onto the free list, top to bottom, so the
//! lowest free pair ends up first.
//!
//! ## Compact
//!
//! The heap is compacted right after the sweep, using the same mark bits to
//! find the live pool cells; see the heap module.

use super::*;

impl Arena {
    /// Collects unreachable pairs and compacts the heap.
    ///
    /// Returns the number of pairs freed, or [`Error::OutOfMemory`] if none were.
    pub fn collect(&mut self) -> Result<u32> {
        self.interrupt.disable();
        let heap_before = self.hp - self.heap_base();

        self.used.clear_all();
        let mut worklist = Vec::new();
        if refers_to_pair(self.env) {
            self.mark(self.env.ordinal(), &mut worklist);
        }
        for i in self.sp..self.cells {
            let v = self.cell(i);
            if refers_to_pair(v) {
                self.mark(v.ordinal(), &mut worklist);
            }
        }
        let freed = self.sweep();
        self.compact();

        self.high_water.collections += 1;
        self.interrupt.enable();
        tracing::trace!(
            "collection {}: {} pairs live, {} freed; heap {} -> {} bytes; {} stack cells",
            self.high_water.collections,
            self.used.count(),
            freed,
            heap_before,
            self.hp - self.heap_base(),
            self.cells - self.sp
        );
        if freed == 0 {
            Err(Error::OutOfMemory)
        } else {
            Ok(freed)
        }
    }

    fn mark(&mut self, root: u32, worklist: &mut Vec<u32>) {
        match self.marker {
            Marker::Worklist => self.mark_worklist(root, worklist),
            Marker::PointerReversal => self.mark_reversal(root),
        }
    }

    fn mark_worklist(&mut self, root: u32, worklist: &mut Vec<u32>) {
        worklist.push(root);
        while let Some(i) = worklist.pop() {
            if !self.used.set((i / 2) as usize) {
                continue;
            }
            // Tail first, so the head chain is explored first.
            for slot in [i + 1, i] {
                let v = self.cell(slot);
                if refers_to_pair(v) && !self.is_marked(v.ordinal()) {
                    worklist.push(v.ordinal());
                }
            }
        }
    }

    /// Whether the slot at `i` holds a link to a pair that is not yet marked.
    /// Returns the pair's index if so.
    fn unmarked_link(&self, i: u32) -> Option<u32> {
        let v = self.cell(i);
        if refers_to_pair(v) && !self.is_marked(v.ordinal()) {
            Some(v.ordinal())
        } else {
            None
        }
    }

    fn mark_reversal(&mut self, root: u32) {
        if self.is_marked(root) {
            return;
        }
        let end = self.cells;
        // The slot being visited, and the slot we reached it from.
        let mut i = root;
        let mut j = end;
        loop {
            // Descend: head first, then tail.
            loop {
                self.used.set((i / 2) as usize);
                let next = match self.unmarked_link(i) {
                    Some(k) => k,
                    None => {
                        i += 1;
                        match self.unmarked_link(i) {
                            Some(k) => k,
                            None => break,
                        }
                    }
                };
                let link = self.cell(i);
                self.set_cell(i, link.with_ordinal(j));
                j = i;
                i = next;
            }
            // Ascend through tail slots; stop at a head slot so its tail
            // gets visited.
            while j < end {
                let child = i;
                i = j;
                let link = self.cell(i);
                j = link.ordinal();
                self.set_cell(i, link.with_ordinal(child & !1));
                if i & 1 == 0 {
                    break;
                }
            }
            if j >= end && i & 1 == 1 {
                break;
            }
        }
    }

    /// Threads every unmarked pair onto the free list.
    /// Returns the number of pairs freed.
    pub(super) fn sweep(&mut self) -> u32 {
        self.fp = 0;
        let mut freed = 0;
        for pair in (0..self.pool_cells / 2).rev() {
            if !self.used.get(pair as usize) {
                let i = 2 * pair;
                self.set_cell(i, Value::boxed(Tag::Nil, self.fp));
                self.fp = i;
                freed += 1;
            }
        }
        self.free = freed;
        freed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn arena(pool_cells: u32, marker: Marker) -> Arena {
        Arena::new(&Config {
            pool_cells,
            stack_cells: 256,
            marker,
            ..Config::default()
        })
        .unwrap()
    }

    const MARKERS: [Marker; 2] = [Marker::Worklist, Marker::PointerReversal];

    /// Snapshot of every pool cell, to check the reversal marker restores links.
    fn pool_cells(arena: &Arena) -> Vec<Value> {
        (0..arena.pool_cells()).map(|i| arena.cell(i)).collect()
    }

    /// Builds a tree with shared structure and a cycle; returns its root.
    fn tangle(arena: &mut Arena) -> Value {
        let leaf = arena.cons(Value::number(1.0), Value::NIL).unwrap();
        arena.push(leaf).unwrap();
        let left = arena.cons(leaf, leaf).unwrap();
        arena.push(left).unwrap();
        let right = arena.cons(Value::number(2.0), leaf).unwrap();
        arena.push(right).unwrap();
        let root = arena.cons(left, right).unwrap();
        // Close a cycle from the leaf back to the root.
        arena.set_cdr(leaf, root).unwrap();
        root
    }

    #[test]
    fn markers_agree() {
        let mut marked = Vec::new();
        for marker in MARKERS {
            let mut arena = arena(64, marker);
            let root = tangle(&mut arena);
            // Some garbage alongside.
            for i in 0..5 {
                arena.cons(Value::number(i as f64), Value::NIL).unwrap();
            }
            arena.unwind_all();
            arena.push(root).unwrap();
            let before = pool_cells(&arena);
            let freed = arena.collect().unwrap();
            assert_eq!(freed, 32 - 4, "marker {marker:?}");

            // Sweep only rewrites free pairs; live ones are intact.
            let after = pool_cells(&arena);
            for i in (0..arena.pool_cells()).filter(|&i| arena.is_marked(i)) {
                assert_eq!(before[i as usize], after[i as usize], "cell {i}");
            }
            marked.push(arena.used.bits_set().collect::<Vec<_>>());
        }
        assert_eq!(marked[0], marked[1]);
    }

    #[test]
    fn deep_lists_mark_without_recursion() {
        for marker in MARKERS {
            // A list nested 2000 deep through the head, then 2000 long through the tail.
            let mut arena = arena(8192, marker);
            let slot = arena.push(Value::NIL).unwrap();
            for _ in 0..2000 {
                let inner = arena.cell(slot);
                let p = arena.cons(inner, Value::NIL).unwrap();
                arena.set_cell(slot, p);
            }
            for i in 0..2000 {
                let tail = arena.cell(slot);
                let p = arena.cons(Value::number(i as f64), tail).unwrap();
                arena.set_cell(slot, p);
            }
            let before = pool_cells(&arena);
            let freed = arena.collect().unwrap();
            assert_eq!(freed, 4096 - 4000, "marker {marker:?}");
            assert_eq!(pool_cells(&arena)[..], before[..], "marker {marker:?}");
        }
    }

    #[test]
    fn pool_is_conserved() {
        for marker in MARKERS {
            let mut arena = arena(512, marker);
            let slot = arena.push(Value::NIL).unwrap();
            for i in 0..300 {
                let p = arena.cons(Value::number(i as f64), Value::NIL).unwrap();
                if i % 3 == 0 {
                    let tail = arena.cell(slot);
                    let keep = arena.cons(p, tail).unwrap();
                    arena.set_cell(slot, keep);
                }
                if i % 50 == 0 {
                    let freed = arena.collect().unwrap();
                    assert_eq!(freed as usize + arena.used.count(), 256);
                    assert_eq!(arena.stats().free_pairs, freed);
                }
            }
        }
    }

    #[test]
    fn free_list_runs_bottom_up() {
        let mut arena = arena(64, Marker::Worklist);
        let keep = arena.cons(Value::NIL, Value::NIL).unwrap();
        assert_eq!(keep.ordinal(), 0);
        arena.push(keep).unwrap();
        arena.collect().unwrap();
        // Pair 0 is live, so the list starts at pair 1 (cell 2).
        assert_eq!(arena.fp(), 2);
        assert_eq!(arena.cell(2), Value::boxed(Tag::Nil, 4));
        let next = arena.cons(Value::NIL, Value::NIL).unwrap();
        assert_eq!(next.ordinal(), 2);
    }

    #[test]
    fn global_environment_is_a_root() {
        let mut arena = arena(64, Marker::PointerReversal);
        let binding = arena.cons(Value::number(1.0), Value::number(2.0)).unwrap();
        arena.push(binding).unwrap();
        let env = arena.cons(binding, Value::NIL).unwrap();
        arena.set_env(env);
        arena.unwind_all();
        arena.collect().unwrap();
        assert!(arena.is_marked(env.ordinal()));
        assert!(arena.is_marked(binding.ordinal()));
        assert_eq!(arena.used.count(), 2);
    }

    #[test]
    fn interrupts_wait_for_collection() {
        let mut arena = arena(64, Marker::Worklist);
        arena.interrupt().raise();
        arena.collect().unwrap();
        // Still pending once collection is over.
        assert_eq!(arena.interrupt().poll(), Err(Error::Break));
    }
}
