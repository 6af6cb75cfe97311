//! Lisp evaluator.
//!
//! Evaluation is a loop over two registers, an expression and an environment.
//! Each iteration either produces a value, or replaces the expression (and
//! possibly the environment) and goes around again: closure bodies, macro
//! expansions, and the tail positions of `if`, `cond`, `begin`, the `let`
//! forms and `eval` never grow the native stack.
//!
//! Every register lives in an arena stack slot, so whatever it holds
//! survives the collections that allocation may trigger. The slots are
//! released when the evaluation returns, on success or error.
//!
//! An environment is a list of `(symbol . value)` bindings, searched front
//! to back. The global environment is extended by prepending.

mod builtins;

use std::io::{BufRead, Write};
use std::path::Path;

use crate::config::Config;
use crate::data::{Arena, ArenaStats, Interrupt, Tag, Value};
use crate::error::{Error, Result};
use crate::printer::Printer;
use crate::reader::{self, Reader};

pub use builtins::Mode;
use builtins::BUILTINS;

/// Name of the primitive with table index `i`.
pub fn primitive_name(i: u32) -> Option<&'static str> {
    BUILTINS.get(i as usize).map(|(name, _, _)| *name)
}

/// One traced evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceStep {
    /// Stack cells in use once the evaluation returned.
    pub depth: u32,
    pub expr: String,
    pub value: String,
}

pub type TraceHook = Box<dyn FnMut(&TraceStep)>;

pub struct Interpreter {
    arena: Arena,
    reader: Reader,
    out: Box<dyn Write>,

    /// 0: off; 1: report every evaluation; 2: also wait for a line after each.
    trace: u32,
    trace_hook: Option<TraceHook>,

    /// Pool index of the `(#t . #t)` binding; its head is the truth symbol.
    truth: u32,
}

impl Interpreter {
    pub fn new() -> Result<Self> {
        Self::with_config(Config::default())
    }

    /// Builds an interpreter whose global environment holds `#t` and every
    /// primitive.
    pub fn with_config(config: Config) -> Result<Self> {
        let mut arena = Arena::new(&config)?;
        let t = arena.intern(b"#t")?;
        let env = arena.pair(t, t, Value::NIL)?;
        let truth = arena.car(env)?.ordinal();
        arena.set_env(env);
        for (i, (name, _, _)) in BUILTINS.iter().enumerate() {
            let name = arena.intern(name.as_bytes())?;
            let env = arena.pair(name, Value::boxed(Tag::Primitive, i as u32), arena.env())?;
            arena.set_env(env);
        }
        tracing::debug!("interpreter ready: {:?}", arena.stats());
        Ok(Interpreter {
            arena,
            reader: Reader::new(),
            out: Box::new(std::io::stdout()),
            trace: 0,
            trace_hook: None,
            truth,
        })
    }

    pub fn arena(&self) -> &Arena {
        &self.arena
    }

    pub fn arena_mut(&mut self) -> &mut Arena {
        &mut self.arena
    }

    pub fn global_env(&self) -> Value {
        self.arena.env()
    }

    /// The truth value, `#t`.
    pub fn truth(&self) -> Value {
        self.arena.cell(self.truth)
    }

    fn boolean(&self, b: bool) -> Value {
        if b {
            self.truth()
        } else {
            Value::NIL
        }
    }

    /// Where `print`, `println`, `write` and default tracing go. Standard output by default.
    pub fn set_output(&mut self, out: Box<dyn Write>) {
        self.out = out;
    }

    /// Reads from `input` once all loaded sources are exhausted, prompting on `prompt_out`.
    pub fn attach_terminal(&mut self, input: Box<dyn BufRead>, prompt_out: Box<dyn Write>) {
        self.reader.attach_terminal(input, prompt_out);
    }

    pub fn set_prompt(&mut self, prompt: impl Into<String>) {
        self.reader.set_prompt(prompt);
    }

    pub fn set_trace_hook(&mut self, hook: TraceHook) {
        self.trace_hook = Some(hook);
    }

    pub fn trace_level(&self) -> u32 {
        self.trace
    }

    pub fn set_trace_level(&mut self, level: u32) {
        self.trace = level;
    }

    /// A handle that can break evaluation from another thread.
    pub fn interrupt_handle(&self) -> Interrupt {
        self.arena.interrupt().clone()
    }

    pub fn collect(&mut self) -> Result<u32> {
        self.arena.collect()
    }

    pub fn stats(&self) -> ArenaStats {
        self.arena.stats()
    }

    /// Releases every stack slot.
    pub fn unwind(&mut self) {
        self.arena.unwind_all();
    }

    /// Queues the file at `path` to be read before anything else.
    pub fn load(&mut self, path: impl AsRef<Path>) -> Result<()> {
        self.reader.push_file(path)
    }

    /// Closes every loaded source and drops buffered terminal input.
    pub fn close_inputs(&mut self) {
        self.reader.close_all();
    }

    /// Reads the next expression from the current input.
    pub fn read(&mut self) -> Result<Option<Value>> {
        reader::read(&mut self.arena, &mut self.reader)
    }

    pub fn display(&self, v: Value) -> String {
        Printer::new(&self.arena, v).to_string()
    }

    /// Writes to the output sink. Failures are logged, not raised.
    fn write_out(&mut self, text: &str) {
        if let Err(e) = self.out.write_all(text.as_bytes()) {
            tracing::warn!("cannot write output: {e}");
        }
    }

    /// Reads and evaluates every expression in `input`, in the global
    /// environment. Returns the value of the last one, or `()`.
    ///
    /// Files loaded by the input are read to the end, in place, before the
    /// rest of the input. A returned symbol or string is only valid until
    /// the next allocation.
    pub fn eval_str(&mut self, input: &str) -> Result<Value> {
        let depth = self.reader.depth();
        self.reader.push_str("input", input)?;
        let floor = self.reader.set_floor(depth);
        let mark = self.arena.sp();
        let result = self.eval_all();
        self.arena.reset_stack(mark);
        self.reader.truncate(depth);
        self.reader.set_floor(floor);
        result
    }

    fn eval_all(&mut self) -> Result<Value> {
        let slot = self.arena.push(Value::NIL)?;
        while let Some(x) = self.read()? {
            let env = self.arena.env();
            let value = self.eval(x, env)?;
            self.arena.set_cell(slot, value);
        }
        Ok(self.arena.cell(slot))
    }

    /// Evaluates `x` in environment `e`.
    ///
    /// `e` must be reachable from the global environment or the stack.
    pub fn eval(&mut self, x: Value, e: Value) -> Result<Value> {
        if self.trace == 0 {
            return self.step(x, e);
        }
        let mark = self.arena.sp();
        let slot = self.arena.push(x)?;
        let result = self.step(self.arena.cell(slot), e);
        let x = self.arena.cell(slot);
        self.arena.reset_stack(mark);
        let value = result?;
        self.report(x, value);
        Ok(value)
    }

    fn report(&mut self, x: Value, value: Value) {
        let step = TraceStep {
            depth: self.arena.stats().stack_cells,
            expr: self.display(x),
            value: self.display(value),
        };
        if let Some(hook) = &mut self.trace_hook {
            hook(&step);
            return;
        }
        let line = format!("{:4}: {} => {}", step.depth, step.expr, step.value);
        if self.trace > 1 {
            self.write_out(&line);
            let _ = self.out.flush();
            self.reader.wait_for_line();
        } else {
            self.write_out(&line);
            self.write_out("\n");
        }
    }

    /// Runs `f`, then releases any stack slots it pushed.
    fn protected<T>(&mut self, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        let mark = self.arena.sp();
        let result = f(self);
        self.arena.reset_stack(mark);
        result
    }

    fn step(&mut self, x: Value, e: Value) -> Result<Value> {
        self.protected(|this| this.reduce(x, e))
    }

    fn reduce(&mut self, x: Value, e: Value) -> Result<Value> {
        // The expression and environment being reduced.
        let y = self.arena.push(x)?;
        let z = self.arena.push(e)?;
        // The operator, the scope under construction, and the parameters left to bind.
        let f = self.arena.push(Value::NIL)?;
        let d = self.arena.push(Value::NIL)?;
        let v = self.arena.push(Value::NIL)?;

        loop {
            self.arena.interrupt().poll()?;
            let x = self.arena.cell(y);
            let e = self.arena.cell(z);
            match x.tag() {
                Tag::Symbol => return self.assoc(x, e),
                Tag::Cons => (),
                _ => return Ok(x),
            }

            let head = self.arena.car(x)?;
            let op = self.eval(head, e)?;
            self.arena.set_cell(f, op);
            let args = self.arena.cdr(x)?;

            match op.tag() {
                Tag::Primitive => {
                    let Some(&(_, call, mode)) = BUILTINS.get(op.ordinal() as usize) else {
                        return Err(Error::CannotApply);
                    };
                    let args = if mode.is_special() {
                        args
                    } else {
                        self.evlis(args, e)?
                    };
                    self.arena.set_cell(y, args);
                    let value = call(self, args, z)?;
                    self.arena.set_cell(y, value);
                    if !mode.is_tailcall() {
                        return Ok(value);
                    }
                }
                Tag::Closure => {
                    let captured = self.arena.cdr(op)?;
                    let scope = if captured.is_nil() {
                        self.arena.env()
                    } else {
                        captured
                    };
                    self.arena.set_cell(d, scope);
                    let code = self.arena.car(op)?;
                    let params = self.arena.car(code)?;
                    self.arena.set_cell(v, params);
                    self.arena.set_cell(y, args);

                    while self.arena.cell(v).is_cons() && self.arena.cell(y).is_cons() {
                        let arg = self.arena.car(self.arena.cell(y))?;
                        let value = self.eval(arg, e)?;
                        self.bind(v, value, d)?;
                        let rest = self.arena.cdr(self.arena.cell(y))?;
                        self.arena.set_cell(y, rest);
                    }
                    if self.arena.cell(v).is_cons() {
                        // Parameters remain: spread the value of a dotted
                        // argument tail, `(f a . rest)`, over them.
                        let rest = self.eval(self.arena.cell(y), e)?;
                        self.arena.set_cell(y, rest);
                        while self.arena.cell(v).is_cons() && self.arena.cell(y).is_cons() {
                            let value = self.arena.car(self.arena.cell(y))?;
                            self.bind(v, value, d)?;
                            let rest = self.arena.cdr(self.arena.cell(y))?;
                            self.arena.set_cell(y, rest);
                        }
                        if self.arena.cell(v).is_cons() {
                            return Err(Error::Arguments);
                        }
                    } else if self.arena.cell(y).is_cons() {
                        let rest = self.evlis(self.arena.cell(y), e)?;
                        self.arena.set_cell(y, rest);
                    } else if !self.arena.cell(y).is_nil() {
                        let rest = self.eval(self.arena.cell(y), e)?;
                        self.arena.set_cell(y, rest);
                    }
                    self.bind_rest(v, y, d)?;

                    let body = self.arena.cdr(code)?;
                    self.arena.set_cell(y, body);
                    self.arena.set_cell(z, self.arena.cell(d));
                }
                Tag::Macro => {
                    self.arena.set_cell(d, self.arena.env());
                    let params = self.arena.car(op)?;
                    self.arena.set_cell(v, params);
                    self.arena.set_cell(y, args);

                    while self.arena.cell(v).is_cons() && self.arena.cell(y).is_cons() {
                        let value = self.arena.car(self.arena.cell(y))?;
                        self.bind(v, value, d)?;
                        let rest = self.arena.cdr(self.arena.cell(y))?;
                        self.arena.set_cell(y, rest);
                    }
                    if self.arena.cell(v).is_cons() {
                        return Err(Error::Arguments);
                    }
                    self.bind_rest(v, y, d)?;

                    let body = self.arena.cdr(op)?;
                    let expansion = self.eval(body, self.arena.cell(d))?;
                    self.arena.set_cell(y, expansion);
                }
                _ => return Err(Error::CannotApply),
            }
        }
    }

    /// Binds the first parameter in slot `params` to `value`, prepending the
    /// binding to the scope in slot `scope`, and advances `params`.
    fn bind(&mut self, params: u32, value: Value, scope: u32) -> Result<()> {
        let name = self.arena.car(self.arena.cell(params))?;
        let frame = self.arena.pair(name, value, self.arena.cell(scope))?;
        self.arena.set_cell(scope, frame);
        let rest = self.arena.cdr(self.arena.cell(params))?;
        self.arena.set_cell(params, rest);
        Ok(())
    }

    /// Binds a rest parameter, if slot `params` holds one, to the list in slot `args`.
    fn bind_rest(&mut self, params: u32, args: u32, scope: u32) -> Result<()> {
        let rest = self.arena.cell(params);
        if rest.is_nil() {
            return Ok(());
        }
        let frame = self
            .arena
            .pair(rest, self.arena.cell(args), self.arena.cell(scope))?;
        self.arena.set_cell(scope, frame);
        Ok(())
    }

    /// Evaluates each expression of `t`, left to right, into a new list.
    /// A symbol in tail position, `(f a . rest)`, is looked up and becomes the
    /// tail of the result.
    pub fn evlis(&mut self, t: Value, e: Value) -> Result<Value> {
        self.protected(|this| this.evlis_into(t, e))
    }

    fn evlis_into(&mut self, t: Value, e: Value) -> Result<Value> {
        let list = self.arena.push(Value::NIL)?;
        let cursor = self.arena.push(t)?;
        // The cell holding the list's terminating (); the list slot while empty.
        let mut hole = list;

        while self.arena.cell(cursor).is_cons() {
            let x = self.arena.car(self.arena.cell(cursor))?;
            let value = self.eval(x, e)?;
            let p = self.arena.cons(value, Value::NIL)?;
            self.arena.set_cell(hole, p);
            hole = p.ordinal() + 1;
            let rest = self.arena.cdr(self.arena.cell(cursor))?;
            self.arena.set_cell(cursor, rest);
        }
        let tail = self.arena.cell(cursor);
        if tail.is_symbol() {
            let value = self.assoc(tail, e)?;
            self.arena.set_cell(hole, value);
        }
        Ok(self.arena.cell(list))
    }

    /// Looks up `v` in environment `e`.
    pub fn assoc(&self, v: Value, e: Value) -> Result<Value> {
        self.arena.cdr(self.binding(v, e)?)
    }

    /// The innermost `(symbol . value)` pair for `v` in environment `e`.
    pub fn binding(&self, v: Value, mut e: Value) -> Result<Value> {
        while e.is_cons() {
            let binding = self.arena.car(e)?;
            if self.arena.car(binding)? == v {
                return Ok(binding);
            }
            e = self.arena.cdr(e)?;
        }
        let name = if v.is_symbol() {
            String::from_utf8_lossy(self.arena.text(v)).into_owned()
        } else {
            String::new()
        };
        Err(Error::UnboundSymbol(name))
    }
}
