use std::rc::Rc;

use super::Object;

pub type BuiltinFn = fn(&[Object]) -> Object;

/// A native function exposed to programs by name.
#[derive(Debug, Clone, Copy)]
pub struct Builtin {
    pub name: &'static str,
    pub func: BuiltinFn,
}

/// The builtin table. `OpGetBuiltin` operands index straight into this
/// array, so the order is part of the bytecode format. Append only.
pub const BUILTINS: [Builtin; 6] = [
    Builtin { name: "len", func: builtin_len },
    Builtin { name: "puts", func: builtin_puts },
    Builtin { name: "first", func: builtin_first },
    Builtin { name: "last", func: builtin_last },
    Builtin { name: "rest", func: builtin_rest },
    Builtin { name: "push", func: builtin_push },
];

pub fn lookup(name: &str) -> Option<Builtin> {
    BUILTINS.iter().find(|b| b.name == name).copied()
}

fn wrong_arg_count(got: usize, want: usize) -> Object {
    Object::error(format!("wrong number of arguments. got={}, want={}", got, want))
}

fn builtin_len(args: &[Object]) -> Object {
    if args.len() != 1 {
        return wrong_arg_count(args.len(), 1);
    }
    match &args[0] {
        Object::Str(s) => Object::Int(s.len() as i64),
        Object::Array(elements) => Object::Int(elements.len() as i64),
        other => Object::error(format!("argument to `len` not supported, got {}", other.kind())),
    }
}

fn builtin_puts(args: &[Object]) -> Object {
    for arg in args {
        println!("{}", arg);
    }
    Object::Null
}

fn builtin_first(args: &[Object]) -> Object {
    if args.len() != 1 {
        return wrong_arg_count(args.len(), 1);
    }
    match &args[0] {
        Object::Array(elements) => elements.first().cloned().unwrap_or(Object::Null),
        other => Object::error(format!("argument to `first` must be ARRAY, got {}", other.kind())),
    }
}

fn builtin_last(args: &[Object]) -> Object {
    if args.len() != 1 {
        return wrong_arg_count(args.len(), 1);
    }
    match &args[0] {
        Object::Array(elements) => elements.last().cloned().unwrap_or(Object::Null),
        other => Object::error(format!("argument to `last` must be ARRAY, got {}", other.kind())),
    }
}

fn builtin_rest(args: &[Object]) -> Object {
    if args.len() != 1 {
        return wrong_arg_count(args.len(), 1);
    }
    match &args[0] {
        Object::Array(elements) => {
            if elements.is_empty() {
                Object::Null
            } else {
                Object::array(elements[1..].to_vec())
            }
        }
        other => Object::error(format!("argument to `rest` must be ARRAY, got {}", other.kind())),
    }
}

fn builtin_push(args: &[Object]) -> Object {
    if args.len() != 2 {
        return wrong_arg_count(args.len(), 2);
    }
    match &args[0] {
        Object::Array(elements) => {
            let mut next = Vec::with_capacity(elements.len() + 1);
            next.extend(elements.iter().cloned());
            next.push(args[1].clone());
            Object::Array(Rc::new(next))
        }
        other => Object::error(format!("argument to `push` must be ARRAY, got {}", other.kind())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn arr(values: &[i64]) -> Object {
        Object::array(values.iter().map(|&v| Object::Int(v)).collect())
    }

    #[test]
    fn table_order_is_the_wire_order() {
        let names: Vec<&str> = BUILTINS.iter().map(|b| b.name).collect();
        assert_eq!(names, vec!["len", "puts", "first", "last", "rest", "push"]);
    }

    #[test]
    fn lookup_by_name() {
        assert_eq!(lookup("len").unwrap().name, "len");
        assert!(lookup("nope").is_none());
    }

    #[test]
    fn len_of_string_and_array() {
        assert_eq!(builtin_len(&[Object::str("four")]), Object::Int(4));
        assert_eq!(builtin_len(&[Object::str("")]), Object::Int(0));
        assert_eq!(builtin_len(&[arr(&[1, 2, 3])]), Object::Int(3));
    }

    #[test]
    fn len_rejects_other_types() {
        assert_eq!(
            builtin_len(&[Object::Int(1)]),
            Object::error("argument to `len` not supported, got INTEGER")
        );
        assert_eq!(
            builtin_len(&[Object::str("a"), Object::str("b")]),
            Object::error("wrong number of arguments. got=2, want=1")
        );
    }

    #[test]
    fn first_and_last() {
        assert_eq!(builtin_first(&[arr(&[1, 2, 3])]), Object::Int(1));
        assert_eq!(builtin_last(&[arr(&[1, 2, 3])]), Object::Int(3));
        assert_eq!(builtin_first(&[arr(&[])]), Object::Null);
        assert_eq!(builtin_last(&[arr(&[])]), Object::Null);
    }

    #[test]
    fn rest_drops_the_head() {
        assert_eq!(builtin_rest(&[arr(&[1, 2, 3])]), arr(&[2, 3]));
        assert_eq!(builtin_rest(&[arr(&[1])]), arr(&[]));
        assert_eq!(builtin_rest(&[arr(&[])]), Object::Null);
    }

    #[test]
    fn push_leaves_the_original_alone() {
        let original = arr(&[1, 2, 3]);
        let pushed = builtin_push(&[original.clone(), Object::Int(4)]);
        assert_eq!(pushed, arr(&[1, 2, 3, 4]));
        assert_eq!(original, arr(&[1, 2, 3]));
    }

    #[test]
    fn push_requires_an_array() {
        assert_eq!(
            builtin_push(&[Object::Int(1), Object::Int(2)]),
            Object::error("argument to `push` must be ARRAY, got INTEGER")
        );
    }

    #[test]
    fn puts_returns_null() {
        assert_eq!(builtin_puts(&[Object::Int(1)]), Object::Null);
    }
}
