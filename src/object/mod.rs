pub mod builtins;

pub use builtins::Builtin;

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use crate::ast::Block;
use crate::code::Instructions;
use crate::interpreter::Environment;

/// Every runtime value. Aggregates are reference-counted so that values on
/// the stack, in globals and inside closures share one allocation; nothing
/// in the instruction set mutates an aggregate after construction, so no
/// interior mutability is needed.
#[derive(Debug, Clone)]
pub enum Object {
    Null,
    Bool(bool),
    Int(i64),
    Str(Rc<String>),
    Array(Rc<Vec<Object>>),
    /// Ordered by `HashKey` so inspection output is deterministic. Each
    /// pair keeps the original key object alongside the value.
    Hash(Rc<BTreeMap<HashKey, HashPair>>),
    /// Tree-walking engine only: a function plus its defining environment.
    Function(Rc<Function>),
    CompiledFunction(Rc<CompiledFunction>),
    Closure(Rc<Closure>),
    Builtin(Builtin),
    /// Tree-walking engine only: wraps a value unwinding out of a block.
    Return(Box<Object>),
    Error(String),
}

/// Type tag, used for error messages and hash keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Kind {
    Null,
    Error,
    Int,
    Bool,
    Str,
    Return,
    Function,
    Array,
    Hash,
    Builtin,
    CompiledFunction,
    Closure,
}

impl Kind {
    pub fn name(self) -> &'static str {
        match self {
            Kind::Null => "NULL",
            Kind::Error => "ERROR",
            Kind::Int => "INTEGER",
            Kind::Bool => "BOOLEAN",
            Kind::Str => "STRING",
            Kind::Return => "RETURN_VALUE",
            Kind::Function => "FUNCTION",
            Kind::Array => "ARRAY",
            Kind::Hash => "HASH",
            Kind::Builtin => "BUILTIN",
            Kind::CompiledFunction => "COMPILED_FUNCTION",
            Kind::Closure => "CLOSURE",
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Key identity for hash containers: the value's type tag plus a 64-bit
/// digest. Two keys are the same entry iff both fields match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct HashKey {
    pub kind: Kind,
    pub value: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HashPair {
    pub key: Object,
    pub value: Object,
}

/// The compiler's output for one function body. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledFunction {
    pub instructions: Instructions,
    pub num_locals: usize,
    pub num_parameters: usize,
}

/// A compiled function bundled with the values it captured from its
/// defining scope. `free.len()` always equals the free count encoded in
/// the `OpClosure` that built it.
#[derive(Debug, Clone)]
pub struct Closure {
    pub func: Rc<CompiledFunction>,
    pub free: Vec<Object>,
}

/// Tree-walking engine function value.
#[derive(Debug)]
pub struct Function {
    pub parameters: Vec<String>,
    pub body: Block,
    pub env: Rc<RefCell<Environment>>,
}

// FNV-1a. Stable across runs, unlike the std hasher's per-process seed.
fn fnv1a(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for &b in bytes {
        hash ^= b as u64;
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
    }
    hash
}

impl Object {
    pub fn kind(&self) -> Kind {
        match self {
            Object::Null => Kind::Null,
            Object::Bool(_) => Kind::Bool,
            Object::Int(_) => Kind::Int,
            Object::Str(_) => Kind::Str,
            Object::Array(_) => Kind::Array,
            Object::Hash(_) => Kind::Hash,
            Object::Function(_) => Kind::Function,
            Object::CompiledFunction(_) => Kind::CompiledFunction,
            Object::Closure(_) => Kind::Closure,
            Object::Builtin(_) => Kind::Builtin,
            Object::Return(_) => Kind::Return,
            Object::Error(_) => Kind::Error,
        }
    }

    /// `Null` and `false` are falsy, everything else is truthy.
    pub fn is_truthy(&self) -> bool {
        !matches!(self, Object::Null | Object::Bool(false))
    }

    /// Hash-key identity, for the hashable subset of values.
    pub fn hash_key(&self) -> Option<HashKey> {
        match self {
            Object::Int(v) => Some(HashKey { kind: Kind::Int, value: *v as u64 }),
            Object::Bool(v) => Some(HashKey { kind: Kind::Bool, value: *v as u64 }),
            Object::Str(s) => Some(HashKey { kind: Kind::Str, value: fnv1a(s.as_bytes()) }),
            _ => None,
        }
    }

    pub fn str(value: impl Into<String>) -> Object {
        Object::Str(Rc::new(value.into()))
    }

    pub fn array(elements: Vec<Object>) -> Object {
        Object::Array(Rc::new(elements))
    }

    pub fn error(message: impl Into<String>) -> Object {
        Object::Error(message.into())
    }
}

/// Equality as the language sees it: by value for data, by identity for
/// functions and closures.
impl PartialEq for Object {
    fn eq(&self, other: &Object) -> bool {
        match (self, other) {
            (Object::Null, Object::Null) => true,
            (Object::Bool(a), Object::Bool(b)) => a == b,
            (Object::Int(a), Object::Int(b)) => a == b,
            (Object::Str(a), Object::Str(b)) => a == b,
            (Object::Array(a), Object::Array(b)) => a == b,
            (Object::Hash(a), Object::Hash(b)) => a == b,
            (Object::Function(a), Object::Function(b)) => Rc::ptr_eq(a, b),
            (Object::CompiledFunction(a), Object::CompiledFunction(b)) => Rc::ptr_eq(a, b),
            (Object::Closure(a), Object::Closure(b)) => Rc::ptr_eq(a, b),
            (Object::Builtin(a), Object::Builtin(b)) => a.name == b.name,
            (Object::Return(a), Object::Return(b)) => a == b,
            (Object::Error(a), Object::Error(b)) => a == b,
            _ => false,
        }
    }
}

// ---- Inspect ----
//
// Display is the canonical printed form: what the REPL echoes and what
// `puts` writes.

impl fmt::Display for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Object::Null => write!(f, "null"),
            Object::Bool(v) => write!(f, "{}", v),
            Object::Int(v) => write!(f, "{}", v),
            Object::Str(s) => write!(f, "\"{}\"", s),
            Object::Array(elements) => {
                let items: Vec<String> = elements.iter().map(|e| e.to_string()).collect();
                write!(f, "[{}]", items.join(", "))
            }
            Object::Hash(pairs) => {
                let items: Vec<String> = pairs
                    .values()
                    .map(|p| format!("{}: {}", p.key, p.value))
                    .collect();
                write!(f, "{{{}}}", items.join(", "))
            }
            Object::Function(func) => {
                write!(f, "fn({}) {{\n{}\n}}", func.parameters.join(", "), func.body)
            }
            Object::CompiledFunction(func) => {
                write!(f, "CompiledFunction[{:p}]", Rc::as_ptr(func))
            }
            Object::Closure(closure) => write!(f, "Closure[{:p}]", Rc::as_ptr(closure)),
            Object::Builtin(builtin) => write!(f, "builtin function {}", builtin.name),
            Object::Return(inner) => write!(f, "{}", inner),
            Object::Error(message) => write!(f, "ERROR: {}", message),
        }
    }
}
