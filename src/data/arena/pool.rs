//! Pair allocation from the pool's free list.

use super::*;

impl Arena {
    /// Builds the pair `(head . tail)`.
    ///
    /// When this takes the last free pair, the new pair is pushed for the
    /// duration of the collection that follows, so it survives even though
    /// nothing refers to it yet. `head` and `tail` are always stored or
    /// pushed before a collection, so they need no protection from the caller.
    pub fn cons(&mut self, head: Value, tail: Value) -> Result<Value> {
        let (head, tail) = if self.free == 0 {
            // Only after an earlier collection came up empty.
            self.push(head)?;
            self.push(tail)?;
            let collected = self.collect();
            let tail = self.pop();
            let head = self.pop();
            collected?;
            (head, tail)
        } else {
            (head, tail)
        };
        let i = self.fp;
        self.fp = self.cell(i).ordinal();
        self.free -= 1;
        self.set_cell(i, head);
        self.set_cell(i + 1, tail);
        let p = Value::boxed(Tag::Cons, i);
        if self.free == 0 || self.always_collect {
            self.push(p)?;
            let collected = self.collect();
            self.pop();
            collected?;
        }
        Ok(p)
    }

    /// Builds the binding list `((name . value) . env)`.
    ///
    /// `env` is not stored until the binding is built, so it must be
    /// reachable from a root.
    pub fn pair(&mut self, name: Value, value: Value, env: Value) -> Result<Value> {
        let binding = self.cons(name, value)?;
        self.cons(binding, env)
    }

    /// Builds a closure `((params . body) . env)`.
    ///
    /// A closure created in the global environment captures `()`, meaning
    /// "whatever the global environment is when called".
    pub fn make_closure(&mut self, params: Value, body: Value, env: Value) -> Result<Value> {
        let captured = if env == self.env { Value::NIL } else { env };
        let p = self.pair(params, body, captured)?;
        Ok(Value::boxed(Tag::Closure, p.ordinal()))
    }

    /// Builds a macro `(params . body)`.
    pub fn make_macro(&mut self, params: Value, body: Value) -> Result<Value> {
        let p = self.cons(params, body)?;
        Ok(Value::boxed(Tag::Macro, p.ordinal()))
    }

    /// Head of a pair, closure or macro.
    pub fn car(&self, p: Value) -> Result<Value> {
        if refers_to_pair(p) {
            Ok(self.cell(p.ordinal()))
        } else {
            Err(Error::NotAPair)
        }
    }

    /// Tail of a pair, closure or macro.
    pub fn cdr(&self, p: Value) -> Result<Value> {
        if refers_to_pair(p) {
            Ok(self.cell(p.ordinal() + 1))
        } else {
            Err(Error::NotAPair)
        }
    }

    pub fn set_car(&mut self, p: Value, v: Value) -> Result<()> {
        if !p.is_cons() {
            return Err(Error::NotAPair);
        }
        self.set_cell(p.ordinal(), v);
        Ok(())
    }

    pub fn set_cdr(&mut self, p: Value, v: Value) -> Result<()> {
        if !p.is_cons() {
            return Err(Error::NotAPair);
        }
        self.set_cell(p.ordinal() + 1, v);
        Ok(())
    }

    /// Builds a proper list from `items`.
    ///
    /// The items are pushed first, so symbols and strings among them stay
    /// valid across the collections the list building may trigger.
    pub fn list(&mut self, items: &[Value]) -> Result<Value> {
        let mark = self.sp;
        for &item in items {
            self.push(item)?;
        }
        let slot = self.push(Value::NIL)?;
        for k in (0..items.len() as u32).rev() {
            let item = self.cell(mark - 1 - k);
            let tail = self.cell(slot);
            let p = self.cons(item, tail)?;
            self.set_cell(slot, p);
        }
        let result = self.cell(slot);
        self.reset_stack(mark);
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::small;
    use super::*;

    #[test]
    fn cons_and_access() {
        let mut arena = small();
        let p = arena.cons(Value::number(1.0), Value::number(2.0)).unwrap();
        assert!(p.is_cons());
        assert_eq!(arena.car(p), Ok(Value::number(1.0)));
        assert_eq!(arena.cdr(p), Ok(Value::number(2.0)));
        arena.set_cdr(p, Value::NIL).unwrap();
        assert_eq!(arena.cdr(p), Ok(Value::NIL));
        assert_eq!(arena.stats().free_pairs, 31);
    }

    #[test]
    fn car_of_atom_is_not_a_pair() {
        let arena = small();
        match arena.car(Value::number(1.0)) {
            Err(Error::NotAPair) => (),
            v => panic!("unexpected result: {v:?}"),
        }
        match arena.cdr(Value::NIL) {
            Err(Error::NotAPair) => (),
            v => panic!("unexpected result: {v:?}"),
        }
    }

    #[test]
    fn closures_and_macros_destructure() {
        let mut arena = small();
        let params = arena.list(&[Value::number(1.0)]).unwrap();
        arena.push(params).unwrap();
        let f = arena
            .make_closure(params, Value::number(9.0), Value::NIL)
            .unwrap();
        assert_eq!(f.tag(), Tag::Closure);
        let code = arena.car(f).unwrap();
        assert_eq!(arena.car(code), Ok(params));
        assert_eq!(arena.cdr(code), Ok(Value::number(9.0)));
        // Created in the global environment (here: empty), so it captures ().
        assert_eq!(arena.cdr(f), Ok(Value::NIL));
        // set-car! is for lists only.
        assert_eq!(arena.set_car(f, Value::NIL), Err(Error::NotAPair));

        let m = arena.make_macro(params, Value::number(3.0)).unwrap();
        assert_eq!(m.tag(), Tag::Macro);
        assert_eq!(arena.cdr(m), Ok(Value::number(3.0)));
    }

    #[test]
    fn exhausting_the_pool_collects_garbage() {
        let mut arena = small();
        let keep = arena.cons(Value::number(7.0), Value::NIL).unwrap();
        arena.push(keep).unwrap();
        for i in 0..500 {
            arena.cons(Value::number(i as f64), Value::NIL).unwrap();
        }
        assert!(arena.stats().collections > 0);
        assert_eq!(arena.car(keep), Ok(Value::number(7.0)));
    }

    #[test]
    fn live_pool_is_out_of_memory() {
        let mut arena = small();
        let slot = arena.push(Value::NIL).unwrap();
        let result: Result<()> = (0..100).try_for_each(|i| {
            let tail = arena.cell(slot);
            let p = arena.cons(Value::number(i as f64), tail)?;
            arena.set_cell(slot, p);
            Ok(())
        });
        match result {
            Err(Error::OutOfMemory) => (),
            v => panic!("unexpected result: {v:?}"),
        }
    }

    #[test]
    fn list_builds_in_order() {
        let mut arena = small();
        let l = arena
            .list(&[Value::number(1.0), Value::number(2.0)])
            .unwrap();
        assert_eq!(arena.car(l), Ok(Value::number(1.0)));
        let rest = arena.cdr(l).unwrap();
        assert_eq!(arena.car(rest), Ok(Value::number(2.0)));
        assert_eq!(arena.cdr(rest), Ok(Value::NIL));
        assert_eq!(arena.stats().stack_cells, 0);
    }
}
