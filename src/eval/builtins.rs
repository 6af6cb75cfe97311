use crate::data::{Arena, Tag, Value};
use crate::error::{Error, Result};
use crate::eval::Interpreter;
use crate::printer::{Number, Printer};

/// How the evaluator calls a primitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mode(u8);

impl Mode {
    /// Arguments are evaluated, left to right, into a new list.
    pub const NORMAL: Mode = Mode(0);
    /// Arguments are passed unevaluated.
    pub const SPECIAL: Mode = Mode(1);

    /// The result is an expression to continue evaluating, in the
    /// environment the primitive leaves in its environment slot.
    pub const fn tailcall(self) -> Mode {
        Mode(self.0 | 2)
    }

    pub fn is_special(self) -> bool {
        self.0 & 1 != 0
    }

    pub fn is_tailcall(self) -> bool {
        self.0 & 2 != 0
    }
}

/// A primitive: receives the interpreter, its argument list, and the stack
/// slot holding the current environment.
pub type Builtin = fn(&mut Interpreter, Value, u32) -> Result<Value>;

/// The primitives, by table index.
/// The global environment binds each name to a primitive value holding its index.
pub const BUILTINS: &[(&str, Builtin, Mode)] = &[
    ("type", builtin_type, Mode::NORMAL),
    ("eval", builtin_ident, Mode::NORMAL.tailcall()),
    ("quote", builtin_ident, Mode::SPECIAL),
    ("cons", builtin_cons, Mode::NORMAL),
    ("car", builtin_car, Mode::NORMAL),
    ("cdr", builtin_cdr, Mode::NORMAL),
    ("+", builtin_add, Mode::NORMAL),
    ("-", builtin_sub, Mode::NORMAL),
    ("*", builtin_mul, Mode::NORMAL),
    ("/", builtin_div, Mode::NORMAL),
    ("int", builtin_int, Mode::NORMAL),
    ("<", builtin_lt, Mode::NORMAL),
    ("eq?", builtin_eq, Mode::NORMAL),
    ("not", builtin_not, Mode::NORMAL),
    ("or", builtin_or, Mode::SPECIAL),
    ("and", builtin_and, Mode::SPECIAL),
    ("begin", builtin_begin, Mode::SPECIAL.tailcall()),
    ("while", builtin_while, Mode::SPECIAL),
    ("cond", builtin_cond, Mode::SPECIAL.tailcall()),
    ("if", builtin_if, Mode::SPECIAL.tailcall()),
    ("lambda", builtin_lambda, Mode::SPECIAL),
    ("macro", builtin_macro, Mode::SPECIAL),
    ("define", builtin_define, Mode::SPECIAL),
    ("assoc", builtin_assoc, Mode::NORMAL),
    ("env", builtin_env, Mode::NORMAL),
    ("let", builtin_let, Mode::SPECIAL.tailcall()),
    ("let*", builtin_let_star, Mode::SPECIAL.tailcall()),
    ("letrec", builtin_letrec, Mode::SPECIAL.tailcall()),
    ("letrec*", builtin_letrec_star, Mode::SPECIAL.tailcall()),
    ("setq", builtin_setq, Mode::SPECIAL),
    ("set-car!", builtin_set_car, Mode::NORMAL),
    ("set-cdr!", builtin_set_cdr, Mode::NORMAL),
    ("read", builtin_read, Mode::NORMAL),
    ("print", builtin_print, Mode::NORMAL),
    ("println", builtin_println, Mode::NORMAL),
    ("write", builtin_write, Mode::NORMAL),
    ("string", builtin_string, Mode::NORMAL),
    ("load", builtin_load, Mode::NORMAL),
    ("trace", builtin_trace, Mode::SPECIAL),
    ("catch", builtin_catch, Mode::SPECIAL),
    ("throw", builtin_throw, Mode::NORMAL),
    ("quit", builtin_quit, Mode::NORMAL),
];

fn first(arena: &Arena, t: Value) -> Result<Value> {
    arena.car(t)
}

fn second(arena: &Arena, t: Value) -> Result<Value> {
    arena.car(arena.cdr(t)?)
}

/// Whether list `t` has more than one item.
fn more(arena: &Arena, t: Value) -> Result<bool> {
    Ok(!t.is_nil() && !arena.cdr(t)?.is_nil())
}

fn number(v: Value) -> Result<f64> {
    v.as_number().ok_or(Error::Arguments)
}

/// Evaluates all but the last expression of `t` in `env`, and returns the
/// last one unevaluated, or `()` if `t` is empty.
fn body(interp: &mut Interpreter, mut t: Value, env: Value) -> Result<Value> {
    while more(&interp.arena, t)? {
        let x = interp.arena.car(t)?;
        interp.eval(x, env)?;
        t = interp.arena.cdr(t)?;
    }
    if t.is_nil() {
        Ok(Value::NIL)
    } else {
        interp.arena.car(t)
    }
}

fn builtin_type(interp: &mut Interpreter, t: Value, _: u32) -> Result<Value> {
    let n = match first(&interp.arena, t)?.tag() {
        Tag::Nil => -1.0,
        Tag::Number => 0.0,
        Tag::Primitive => 1.0,
        Tag::Symbol => 2.0,
        Tag::String => 3.0,
        Tag::Cons => 4.0,
        Tag::Closure => 6.0,
        Tag::Macro => 7.0,
    };
    Ok(Value::number(n))
}

fn builtin_ident(interp: &mut Interpreter, t: Value, _: u32) -> Result<Value> {
    first(&interp.arena, t)
}

fn builtin_cons(interp: &mut Interpreter, t: Value, _: u32) -> Result<Value> {
    let head = first(&interp.arena, t)?;
    let tail = second(&interp.arena, t)?;
    interp.arena.cons(head, tail)
}

fn builtin_car(interp: &mut Interpreter, t: Value, _: u32) -> Result<Value> {
    interp.arena.car(first(&interp.arena, t)?)
}

fn builtin_cdr(interp: &mut Interpreter, t: Value, _: u32) -> Result<Value> {
    interp.arena.cdr(first(&interp.arena, t)?)
}

/// Folds `op` over the numbers in `t`; a single number gets `unary` instead.
fn arithmetic(
    arena: &Arena,
    mut t: Value,
    unary: impl Fn(f64) -> f64,
    op: impl Fn(f64, f64) -> f64,
) -> Result<Value> {
    let mut acc = number(first(arena, t)?)?;
    t = arena.cdr(t)?;
    if t.is_nil() {
        return Ok(Value::number(unary(acc)));
    }
    while !t.is_nil() {
        acc = op(acc, number(arena.car(t)?)?);
        t = arena.cdr(t)?;
    }
    Ok(Value::number(acc))
}

fn builtin_add(interp: &mut Interpreter, t: Value, _: u32) -> Result<Value> {
    arithmetic(&interp.arena, t, |n| n, |a, b| a + b)
}

fn builtin_sub(interp: &mut Interpreter, t: Value, _: u32) -> Result<Value> {
    arithmetic(&interp.arena, t, |n| -n, |a, b| a - b)
}

fn builtin_mul(interp: &mut Interpreter, t: Value, _: u32) -> Result<Value> {
    arithmetic(&interp.arena, t, |n| n, |a, b| a * b)
}

fn builtin_div(interp: &mut Interpreter, t: Value, _: u32) -> Result<Value> {
    arithmetic(&interp.arena, t, |n| 1.0 / n, |a, b| a / b)
}

fn builtin_int(interp: &mut Interpreter, t: Value, _: u32) -> Result<Value> {
    let n = number(first(&interp.arena, t)?)?;
    if n.abs() < 1e16 {
        Ok(Value::number(n.trunc()))
    } else {
        Ok(Value::number(n))
    }
}

fn builtin_lt(interp: &mut Interpreter, t: Value, _: u32) -> Result<Value> {
    let arena = &interp.arena;
    let (x, y) = (first(arena, t)?, second(arena, t)?);
    let less = match (x.tag(), y.tag(), x.as_number(), y.as_number()) {
        (Tag::Symbol, Tag::Symbol, _, _) | (Tag::String, Tag::String, _, _) => {
            arena.text(x) < arena.text(y)
        }
        (_, _, Some(a), Some(b)) if !a.is_nan() && !b.is_nan() => a < b,
        _ => (x.bits() as i64) < (y.bits() as i64),
    };
    Ok(interp.boolean(less))
}

fn builtin_eq(interp: &mut Interpreter, t: Value, _: u32) -> Result<Value> {
    let arena = &interp.arena;
    let (x, y) = (first(arena, t)?, second(arena, t)?);
    let equal = if x.is_string() && y.is_string() {
        arena.text(x) == arena.text(y)
    } else {
        x == y
    };
    Ok(interp.boolean(equal))
}

fn builtin_not(interp: &mut Interpreter, t: Value, _: u32) -> Result<Value> {
    let x = first(&interp.arena, t)?;
    Ok(interp.boolean(x.is_nil()))
}

fn builtin_or(interp: &mut Interpreter, mut t: Value, e: u32) -> Result<Value> {
    let mut x = Value::NIL;
    while !t.is_nil() {
        let expr = interp.arena.car(t)?;
        x = interp.eval(expr, interp.arena.cell(e))?;
        if !x.is_nil() {
            break;
        }
        t = interp.arena.cdr(t)?;
    }
    Ok(x)
}

fn builtin_and(interp: &mut Interpreter, mut t: Value, e: u32) -> Result<Value> {
    let mut x = Value::NIL;
    while !t.is_nil() {
        let expr = interp.arena.car(t)?;
        x = interp.eval(expr, interp.arena.cell(e))?;
        if x.is_nil() {
            break;
        }
        t = interp.arena.cdr(t)?;
    }
    Ok(x)
}

fn builtin_begin(interp: &mut Interpreter, t: Value, e: u32) -> Result<Value> {
    body(interp, t, interp.arena.cell(e))
}

fn builtin_while(interp: &mut Interpreter, t: Value, e: u32) -> Result<Value> {
    interp.protected(|interp| {
        let last = interp.arena.push(Value::NIL)?;
        loop {
            let test = interp.arena.car(t)?;
            if interp.eval(test, interp.arena.cell(e))?.is_nil() {
                break;
            }
            let mut s = interp.arena.cdr(t)?;
            while !s.is_nil() {
                let x = interp.arena.car(s)?;
                let value = interp.eval(x, interp.arena.cell(e))?;
                interp.arena.set_cell(last, value);
                s = interp.arena.cdr(s)?;
            }
        }
        Ok(interp.arena.cell(last))
    })
}

fn builtin_cond(interp: &mut Interpreter, mut t: Value, e: u32) -> Result<Value> {
    while !t.is_nil() {
        let clause = interp.arena.car(t)?;
        let test = interp.arena.car(clause)?;
        if !interp.eval(test, interp.arena.cell(e))?.is_nil() {
            let rest = interp.arena.cdr(clause)?;
            return body(interp, rest, interp.arena.cell(e));
        }
        t = interp.arena.cdr(t)?;
    }
    Ok(Value::NIL)
}

fn builtin_if(interp: &mut Interpreter, t: Value, e: u32) -> Result<Value> {
    let test = first(&interp.arena, t)?;
    if interp.eval(test, interp.arena.cell(e))?.is_nil() {
        let otherwise = interp.arena.cdr(interp.arena.cdr(t)?)?;
        body(interp, otherwise, interp.arena.cell(e))
    } else {
        second(&interp.arena, t)
    }
}

fn builtin_lambda(interp: &mut Interpreter, t: Value, e: u32) -> Result<Value> {
    let params = first(&interp.arena, t)?;
    let code = second(&interp.arena, t)?;
    let env = interp.arena.cell(e);
    interp.arena.make_closure(params, code, env)
}

fn builtin_macro(interp: &mut Interpreter, t: Value, _: u32) -> Result<Value> {
    let params = first(&interp.arena, t)?;
    let code = second(&interp.arena, t)?;
    interp.arena.make_macro(params, code)
}

fn builtin_define(interp: &mut Interpreter, t: Value, e: u32) -> Result<Value> {
    let expr = second(&interp.arena, t)?;
    let value = interp.eval(expr, interp.arena.cell(e))?;
    let name = first(&interp.arena, t)?;
    let env = interp.arena.pair(name, value, interp.arena.env())?;
    interp.arena.set_env(env);
    first(&interp.arena, t)
}

fn builtin_assoc(interp: &mut Interpreter, t: Value, _: u32) -> Result<Value> {
    let (name, env) = (first(&interp.arena, t)?, second(&interp.arena, t)?);
    interp.assoc(name, env)
}

fn builtin_env(interp: &mut Interpreter, _: Value, e: u32) -> Result<Value> {
    Ok(interp.arena.cell(e))
}

/// Shared by the `let` forms: `(let (v x...)... body)`.
/// `outer` gives the environment each binding's expressions see;
/// `None` means the scope built so far.
fn bind_each(interp: &mut Interpreter, mut t: Value, e: u32, outer: Option<Value>) -> Result<Value> {
    while more(&interp.arena, t)? {
        let env = outer.unwrap_or(interp.arena.cell(e));
        let binding = interp.arena.car(t)?;
        let expr = body(interp, interp.arena.cdr(binding)?, env)?;
        let value = interp.eval(expr, env)?;
        let name = interp.arena.car(interp.arena.car(t)?)?;
        let scope = interp.arena.pair(name, value, interp.arena.cell(e))?;
        interp.arena.set_cell(e, scope);
        t = interp.arena.cdr(t)?;
    }
    first_or_nil(&interp.arena, t)
}

fn first_or_nil(arena: &Arena, t: Value) -> Result<Value> {
    if t.is_nil() {
        Ok(Value::NIL)
    } else {
        arena.car(t)
    }
}

fn builtin_let(interp: &mut Interpreter, t: Value, e: u32) -> Result<Value> {
    let outer = interp.arena.cell(e);
    bind_each(interp, t, e, Some(outer))
}

fn builtin_let_star(interp: &mut Interpreter, t: Value, e: u32) -> Result<Value> {
    bind_each(interp, t, e, None)
}

fn builtin_letrec(interp: &mut Interpreter, mut t: Value, e: u32) -> Result<Value> {
    let mut s = t;
    while more(&interp.arena, s)? {
        let name = interp.arena.car(interp.arena.car(s)?)?;
        let scope = interp.arena.pair(name, Value::NIL, interp.arena.cell(e))?;
        interp.arena.set_cell(e, scope);
        s = interp.arena.cdr(s)?;
    }
    while more(&interp.arena, t)? {
        let binding = interp.arena.car(t)?;
        let expr = body(interp, interp.arena.cdr(binding)?, interp.arena.cell(e))?;
        let value = interp.eval(expr, interp.arena.cell(e))?;
        let name = interp.arena.car(interp.arena.car(t)?)?;
        let slot = interp.binding(name, interp.arena.cell(e))?;
        interp.arena.set_cdr(slot, value)?;
        t = interp.arena.cdr(t)?;
    }
    first_or_nil(&interp.arena, t)
}

fn builtin_letrec_star(interp: &mut Interpreter, mut t: Value, e: u32) -> Result<Value> {
    while more(&interp.arena, t)? {
        let name = interp.arena.car(interp.arena.car(t)?)?;
        let scope = interp.arena.pair(name, Value::NIL, interp.arena.cell(e))?;
        interp.arena.set_cell(e, scope);
        let binding = interp.arena.car(t)?;
        let expr = body(interp, interp.arena.cdr(binding)?, scope)?;
        let value = interp.eval(expr, scope)?;
        interp.arena.set_cdr(interp.arena.car(scope)?, value)?;
        t = interp.arena.cdr(t)?;
    }
    first_or_nil(&interp.arena, t)
}

fn builtin_setq(interp: &mut Interpreter, t: Value, e: u32) -> Result<Value> {
    let expr = second(&interp.arena, t)?;
    let value = interp.eval(expr, interp.arena.cell(e))?;
    let name = first(&interp.arena, t)?;
    let binding = interp.binding(name, interp.arena.cell(e))?;
    interp.arena.set_cdr(binding, value)?;
    Ok(value)
}

fn builtin_set_car(interp: &mut Interpreter, t: Value, _: u32) -> Result<Value> {
    let (p, x) = (first(&interp.arena, t)?, second(&interp.arena, t)?);
    interp.arena.set_car(p, x)?;
    Ok(x)
}

fn builtin_set_cdr(interp: &mut Interpreter, t: Value, _: u32) -> Result<Value> {
    let (p, x) = (first(&interp.arena, t)?, second(&interp.arena, t)?);
    interp.arena.set_cdr(p, x)?;
    Ok(x)
}

fn builtin_read(interp: &mut Interpreter, _: Value, _: u32) -> Result<Value> {
    interp.set_prompt("");
    Ok(interp.read()?.unwrap_or(Value::NIL))
}

/// Writes each value of `t`; strings as raw text unless `quote_strings`.
fn print_each(interp: &mut Interpreter, mut t: Value, quote_strings: bool) -> Result<()> {
    while !t.is_nil() {
        let x = interp.arena.car(t)?;
        let printer = Printer::new(&interp.arena, x);
        let text = if quote_strings {
            printer.to_string()
        } else {
            printer.unquoted().to_string()
        };
        interp.write_out(&text);
        t = interp.arena.cdr(t)?;
    }
    Ok(())
}

fn builtin_print(interp: &mut Interpreter, t: Value, _: u32) -> Result<Value> {
    print_each(interp, t, true)?;
    Ok(Value::NIL)
}

fn builtin_println(interp: &mut Interpreter, t: Value, _: u32) -> Result<Value> {
    print_each(interp, t, true)?;
    interp.write_out("\n");
    Ok(Value::NIL)
}

fn builtin_write(interp: &mut Interpreter, t: Value, _: u32) -> Result<Value> {
    print_each(interp, t, false)?;
    Ok(Value::NIL)
}

fn builtin_string(interp: &mut Interpreter, mut t: Value, _: u32) -> Result<Value> {
    let arena = &interp.arena;
    let mut text = Vec::new();
    while !t.is_nil() {
        let x = arena.car(t)?;
        match x.tag() {
            Tag::Symbol | Tag::String => text.extend_from_slice(arena.text(x)),
            Tag::Number => text.extend_from_slice(Number(number(x)?).to_string().as_bytes()),
            Tag::Cons => {
                // A list of character codes.
                let mut c = x;
                while c.is_cons() {
                    text.push(number(arena.car(c)?)? as u8);
                    c = arena.cdr(c)?;
                }
            }
            _ => (),
        }
        t = arena.cdr(t)?;
    }
    interp.arena.make_string(&text)
}

fn builtin_load(interp: &mut Interpreter, t: Value, e: u32) -> Result<Value> {
    let name = builtin_string(interp, t, e)?;
    let path = String::from_utf8_lossy(interp.arena.text(name)).into_owned();
    interp.protected(|interp| {
        let slot = interp.arena.push(name)?;
        interp.reader.push_file(&path)?;
        let tail = interp.arena.cons(interp.arena.cell(slot), Value::NIL)?;
        interp.arena.set_cell(slot, tail);
        let load = interp.arena.intern(b"load")?;
        interp.arena.cons(load, interp.arena.cell(slot))
    })
}

fn builtin_trace(interp: &mut Interpreter, t: Value, e: u32) -> Result<Value> {
    let level = if t.is_nil() {
        1.0
    } else {
        number(first(&interp.arena, t)?)?
    };
    if !(0.0..=u32::MAX as f64).contains(&level) {
        return Err(Error::Arguments);
    }
    let saved = interp.trace;
    interp.trace = level as u32;
    if more(&interp.arena, t)? {
        let expr = second(&interp.arena, t)?;
        let result = interp.eval(expr, interp.arena.cell(e));
        interp.trace = saved;
        result
    } else {
        Ok(Value::number(level.trunc()))
    }
}

fn builtin_catch(interp: &mut Interpreter, t: Value, e: u32) -> Result<Value> {
    let expr = first(&interp.arena, t)?;
    let mark = interp.arena.sp();
    let result = interp.eval(expr, interp.arena.cell(e));
    interp.arena.reset_stack(mark);
    match result {
        Err(err) if err.is_catchable() => {
            tracing::debug!("caught: {err}");
            let tag = interp.arena.intern(b"ERR")?;
            interp.arena.cons(tag, Value::number(err.code() as f64))
        }
        result => result,
    }
}

fn builtin_throw(interp: &mut Interpreter, t: Value, _: u32) -> Result<Value> {
    let code = number(first(&interp.arena, t)?)?;
    Err(Error::from_code(code as i64))
}

fn builtin_quit(_: &mut Interpreter, _: Value, _: u32) -> Result<Value> {
    Err(Error::Quit)
}
