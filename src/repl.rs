//! The read-eval-print loop.

use std::io::Write;

use crate::error::Error;
use crate::eval::Interpreter;

/// Reads, evaluates and prints expressions until the input runs out or
/// `(quit)` is evaluated.
///
/// Before each expression the stack is cleared and a collection runs; the
/// prompt shows the pairs free and the cells of headroom left after it.
/// Errors are reported on `out`, after which every loaded source is closed
/// and the loop carries on with the terminal.
pub fn repl(interp: &mut Interpreter, out: &mut impl Write) -> std::io::Result<()> {
    loop {
        writeln!(out)?;
        interp.unwind();
        let freed = interp.collect().unwrap_or(0);
        let headroom = interp.stats().headroom_cells;
        interp.set_prompt(format!("{freed}+{headroom}>"));

        let result = interp.read().and_then(|x| match x {
            Some(x) => {
                let env = interp.global_env();
                interp.eval(x, env).map(Some)
            }
            None => Ok(None),
        });
        match result {
            Ok(Some(v)) => write!(out, "{}", interp.display(v))?,
            Ok(None) | Err(Error::Quit) => {
                writeln!(out, "Bye!")?;
                return Ok(());
            }
            Err(e) => {
                tracing::debug!("evaluation failed: {e:?}");
                interp.close_inputs();
                write!(out, "ERR {} {e}", e.code())?;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::io::Cursor;
    use std::rc::Rc;

    use super::*;

    fn session(input: &str) -> String {
        let mut interp = Interpreter::new().unwrap();
        interp.attach_terminal(
            Box::new(Cursor::new(input.as_bytes().to_vec())),
            Box::new(std::io::sink()),
        );
        let mut out = Vec::new();
        repl(&mut interp, &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn prints_each_value() {
        let got = session("(+ 1 2)\n'a \"s\"\n");
        assert_eq!(got, "\n3\na\n\"s\"\nBye!\n");
    }

    #[test]
    fn recovers_from_errors() {
        let got = session("(car 1)\n(cons 1 2)\n");
        assert_eq!(got, "\nERR 1 not a pair\n(1 . 2)\nBye!\n");
    }

    #[test]
    fn syntax_errors_discard_the_rest_of_the_line() {
        let got = session(") (+ 1 2)\n7\n");
        assert!(got.starts_with("\nERR 8 syntax"), "{got}");
        assert!(got.ends_with("\n7\nBye!\n"), "{got}");
    }

    #[test]
    fn quit_ends_the_session() {
        let got = session("(quit)\n1\n");
        assert_eq!(got, "\nBye!\n");
    }

    #[test]
    fn prompts_show_free_space() {
        let mut interp = Interpreter::new().unwrap();
        let prompts = Rc::new(RefCell::new(Vec::new()));
        interp.attach_terminal(
            Box::new(Cursor::new(b"1\n".to_vec())),
            Box::new(Shared(prompts.clone())),
        );
        repl(&mut interp, &mut std::io::sink()).unwrap();
        let prompts = String::from_utf8(prompts.borrow().clone()).unwrap();
        let (free, rest) = prompts.split_once('+').unwrap();
        assert!(free.parse::<u32>().unwrap() > 0, "{prompts}");
        assert!(rest.starts_with(|c: char| c.is_ascii_digit()), "{prompts}");
    }

    struct Shared(Rc<RefCell<Vec<u8>>>);

    impl Write for Shared {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.borrow_mut().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }
}
