use std::collections::{HashMap, HashSet, VecDeque};

use dot_writer::Attributes;
use dot_writer::DotWriter;

use super::{Arena, Tag, Value};
use crate::printer::Printer;

fn node_for_pair(i: u32) -> String {
    format!("pair{i}")
}

/// Text for a cell: the printed value for atoms, the pair index for references.
fn cell_text(arena: &Arena, v: Value) -> String {
    match v.tag() {
        Tag::Cons => format!("#{}", v.ordinal()),
        Tag::Closure => format!("{{#{}}}", v.ordinal()),
        Tag::Macro => format!("[#{}]", v.ordinal()),
        _ => Printer::new(arena, v).to_string(),
    }
}

/// Render the pairs reachable from `roots` as a Graphviz graph.
///
/// Each pair is a two-cell table, car then cdr; atoms are printed in their
/// cells and references become edges. Roots that are atoms get a node of
/// their own.
pub fn render_pool<'a>(
    arena: &Arena,
    roots: impl IntoIterator<Item = (Value, &'a str)>,
) -> Vec<u8> {
    let mut outbuf = Vec::new();
    {
        let mut writer = DotWriter::from(&mut outbuf);
        let mut graph = writer.digraph();
        let mut names: HashMap<u32, &'a str> = HashMap::new();
        let mut queue = VecDeque::new();

        for (n, (root, label)) in roots.into_iter().enumerate() {
            if root.tag().is_pool_ref() {
                names.insert(root.ordinal(), label);
                queue.push_back(root.ordinal());
            } else {
                let mut node = graph.node_named(format!("root{n}"));
                node.set_shape(dot_writer::Shape::Record);
                node.set_label(&format!("{{{label}|{}}}", cell_text(arena, root)));
            }
        }

        let mut seen = HashSet::new();
        while let Some(i) = queue.pop_front() {
            if !seen.insert(i) {
                continue;
            }
            let name = match names.get(&i) {
                Some(label) => format!("#{i} {label}"),
                None => format!("#{i}"),
            };
            let (car, cdr) = (arena.cell(i), arena.cell(i + 1));

            let mut node = graph.node_named(node_for_pair(i));
            node.set_shape(dot_writer::Shape::None);
            let label = format!(
                "<{}>",
                maud::html!(
                    table border="0" cellborder="1" cellspacing="0" {
                        tr { td colspan="2" border="0" { (name) } }
                        tr {
                            td port="car" { (cell_text(arena, car)) }
                            td port="cdr" { (cell_text(arena, cdr)) }
                        }
                    }
                )
                .into_string()
            );
            node.set_html(&label);
            let car_port = node.id().port("car");
            let cdr_port = node.id().port("cdr");
            std::mem::drop(node);

            for (port, v) in [(car_port, car), (cdr_port, cdr)] {
                if v.tag().is_pool_ref() {
                    queue.push_back(v.ordinal());
                    graph.edge(port, node_for_pair(v.ordinal()));
                }
            }
        }
    }
    outbuf
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    #[test]
    fn renders_shared_structure_once() {
        let mut arena = Arena::new(&Config::default()).unwrap();
        let shared = arena.cons(Value::number(1.0), Value::NIL).unwrap();
        let slot = arena.push(shared).unwrap();
        let both = arena.cons(arena.cell(slot), arena.cell(slot)).unwrap();

        let roots = [(both, "root"), (Value::number(2.0), "two")];
        let dot = String::from_utf8(render_pool(&arena, roots)).unwrap();
        assert!(dot.starts_with("digraph"), "{dot}");
        assert_eq!(dot.matches("port=\"car\"").count(), 2, "{dot}");
        assert!(dot.contains(&format!("#{} root", both.ordinal())), "{dot}");
        assert!(dot.contains("two|2"), "{dot}");
    }
}
