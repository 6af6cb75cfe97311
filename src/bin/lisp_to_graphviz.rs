//! Render unevaluated Lisp as a Graphviz graph of its pairs.
//!
//! Inspired by [@thingskatedid][kate] and [Ben Weintraub][ben].
//!
//! [kate]: https://twitter.com/thingskatedid/status/1386077306381242371?ref_src=twsrc%5Etfw
//! [ben]: https://www.benweintraub.com/2022/11/12/graphviz-in-the-terminal/
//!
//! Usage:
//!
//! ```ignore
//! <input.lisp lisp_to_graphviz | dot -T png >output.png
//! ```

use std::io::{Read, Write};

use nanlisp::Interpreter;

fn main() {
    let mut input = String::new();
    std::io::stdin()
        .lock()
        .read_to_string(&mut input)
        .expect("error: could not read input");

    let mut interp = Interpreter::new().expect("error: could not start the interpreter");
    // Quoting the whole input reads every expression into one list.
    let program = interp
        .eval_str(&format!("'({input}\n)"))
        .expect("error: failed to parse input as Lisp");

    let graphviz = nanlisp::render_pool(interp.arena(), [(program, "input")]);
    std::io::stdout()
        .lock()
        .write_all(&graphviz)
        .expect("error: could not write output");
}
