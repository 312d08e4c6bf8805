use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;

use crate::ast::{Block, Expr, InfixOp, PrefixOp, Program, Stmt};
use crate::object::builtins;
use crate::object::{Function, HashPair, Kind, Object};

#[derive(Debug, thiserror::Error)]
pub enum EvalError {
    #[error("type mismatch: {left} {op} {right}")]
    TypeMismatch { op: &'static str, left: Kind, right: Kind },
    #[error("unknown operator: {op}{kind}")]
    UnknownPrefixOperator { op: &'static str, kind: Kind },
    #[error("unknown operator: {left} {op} {right}")]
    UnknownInfixOperator { op: &'static str, left: Kind, right: Kind },
    #[error("identifier not found: {name}")]
    IdentifierNotFound { name: String },
    #[error("not a function: {kind}")]
    NotAFunction { kind: Kind },
    #[error("wrong number of arguments: want={want}, got={got}")]
    WrongArgumentCount { want: usize, got: usize },
    #[error("unusable as hash key: {kind}")]
    UnusableHashKey { kind: Kind },
    #[error("index operator not supported: {kind}")]
    IndexNotSupported { kind: Kind },
    #[error("division by zero")]
    DivisionByZero,
}

type Result<T> = std::result::Result<T, EvalError>;

/// A lexical scope for the tree-walking engine. Function values hold a
/// reference to the environment they were created in, which is all the
/// closure machinery this engine needs.
#[derive(Debug, Default)]
pub struct Environment {
    store: HashMap<String, Object>,
    outer: Option<Rc<RefCell<Environment>>>,
}

impl Environment {
    pub fn new() -> Rc<RefCell<Environment>> {
        Rc::new(RefCell::new(Environment::default()))
    }

    pub fn new_enclosed(outer: Rc<RefCell<Environment>>) -> Rc<RefCell<Environment>> {
        Rc::new(RefCell::new(Environment {
            store: HashMap::new(),
            outer: Some(outer),
        }))
    }

    pub fn get(&self, name: &str) -> Option<Object> {
        match self.store.get(name) {
            Some(obj) => Some(obj.clone()),
            None => self.outer.as_ref().and_then(|outer| outer.borrow().get(name)),
        }
    }

    pub fn set(&mut self, name: &str, value: Object) {
        self.store.insert(name.to_string(), value);
    }
}

/// Evaluate a whole program, unwrapping any `return` that reaches the top.
pub fn eval_program(program: &Program, env: &Rc<RefCell<Environment>>) -> Result<Object> {
    let mut result = Object::Null;
    for stmt in &program.statements {
        result = eval_stmt(stmt, env)?;
        if let Object::Return(value) = result {
            return Ok(*value);
        }
    }
    Ok(result)
}

fn eval_stmt(stmt: &Stmt, env: &Rc<RefCell<Environment>>) -> Result<Object> {
    match stmt {
        Stmt::Expr { value } => eval_expr(value, env),
        Stmt::Let { name, value } => {
            let value = eval_expr(value, env)?;
            env.borrow_mut().set(name, value);
            Ok(Object::Null)
        }
        Stmt::Return { value } => {
            let value = eval_expr(value, env)?;
            Ok(Object::Return(Box::new(value)))
        }
    }
}

/// Evaluate a block, letting a `Return` pass through unopened so it keeps
/// unwinding to the function call (or program) that owns it.
fn eval_block(block: &Block, env: &Rc<RefCell<Environment>>) -> Result<Object> {
    let mut result = Object::Null;
    for stmt in &block.statements {
        result = eval_stmt(stmt, env)?;
        if matches!(result, Object::Return(_)) {
            return Ok(result);
        }
    }
    Ok(result)
}

fn eval_expr(expr: &Expr, env: &Rc<RefCell<Environment>>) -> Result<Object> {
    match expr {
        Expr::Int(value) => Ok(Object::Int(*value)),
        Expr::Str(value) => Ok(Object::str(value.clone())),
        Expr::Bool(value) => Ok(Object::Bool(*value)),
        Expr::Ident(name) => match env.borrow().get(name) {
            Some(value) => Ok(value),
            None => match builtins::lookup(name) {
                Some(builtin) => Ok(Object::Builtin(builtin)),
                None => Err(EvalError::IdentifierNotFound { name: name.clone() }),
            },
        },
        Expr::Prefix { op, right } => {
            let right = eval_expr(right, env)?;
            eval_prefix(*op, right)
        }
        Expr::Infix { op, left, right } => {
            let left = eval_expr(left, env)?;
            let right = eval_expr(right, env)?;
            eval_infix(*op, left, right)
        }
        Expr::If { condition, consequence, alternative } => {
            let condition = eval_expr(condition, env)?;
            if condition.is_truthy() {
                eval_block(consequence, env)
            } else {
                match alternative {
                    Some(alternative) => eval_block(alternative, env),
                    None => Ok(Object::Null),
                }
            }
        }
        Expr::Fn { parameters, body, .. } => Ok(Object::Function(Rc::new(Function {
            parameters: parameters.clone(),
            body: body.clone(),
            env: Rc::clone(env),
        }))),
        Expr::Call { function, arguments } => {
            let function = eval_expr(function, env)?;
            let mut args = Vec::with_capacity(arguments.len());
            for argument in arguments {
                args.push(eval_expr(argument, env)?);
            }
            apply_function(function, args)
        }
        Expr::Array(elements) => {
            let mut items = Vec::with_capacity(elements.len());
            for element in elements {
                items.push(eval_expr(element, env)?);
            }
            Ok(Object::array(items))
        }
        Expr::Hash(pairs) => {
            let mut map = BTreeMap::new();
            for (key_expr, value_expr) in pairs {
                let key = eval_expr(key_expr, env)?;
                let value = eval_expr(value_expr, env)?;
                let hash_key = key
                    .hash_key()
                    .ok_or(EvalError::UnusableHashKey { kind: key.kind() })?;
                map.insert(hash_key, HashPair { key, value });
            }
            Ok(Object::Hash(Rc::new(map)))
        }
        Expr::Index { left, index } => {
            let left = eval_expr(left, env)?;
            let index = eval_expr(index, env)?;
            eval_index(left, index)
        }
    }
}

fn eval_prefix(op: PrefixOp, right: Object) -> Result<Object> {
    match op {
        PrefixOp::Bang => Ok(Object::Bool(!right.is_truthy())),
        PrefixOp::Minus => match right {
            Object::Int(value) => Ok(Object::Int(value.wrapping_neg())),
            other => Err(EvalError::UnknownPrefixOperator { op: "-", kind: other.kind() }),
        },
    }
}

fn eval_infix(op: InfixOp, left: Object, right: Object) -> Result<Object> {
    match (&left, &right) {
        (Object::Int(l), Object::Int(r)) => eval_integer_infix(op, *l, *r),
        (Object::Str(l), Object::Str(r)) => match op {
            InfixOp::Add => Ok(Object::str(format!("{}{}", l, r))),
            InfixOp::Eq => Ok(Object::Bool(l == r)),
            InfixOp::NotEq => Ok(Object::Bool(l != r)),
            other => Err(EvalError::UnknownInfixOperator {
                op: other.symbol(),
                left: Kind::Str,
                right: Kind::Str,
            }),
        },
        _ if left.kind() != right.kind() => Err(EvalError::TypeMismatch {
            op: op.symbol(),
            left: left.kind(),
            right: right.kind(),
        }),
        _ => match op {
            InfixOp::Eq => Ok(Object::Bool(left == right)),
            InfixOp::NotEq => Ok(Object::Bool(left != right)),
            other => Err(EvalError::UnknownInfixOperator {
                op: other.symbol(),
                left: left.kind(),
                right: right.kind(),
            }),
        },
    }
}

fn eval_integer_infix(op: InfixOp, left: i64, right: i64) -> Result<Object> {
    Ok(match op {
        InfixOp::Add => Object::Int(left.wrapping_add(right)),
        InfixOp::Sub => Object::Int(left.wrapping_sub(right)),
        InfixOp::Mul => Object::Int(left.wrapping_mul(right)),
        InfixOp::Div => {
            if right == 0 {
                return Err(EvalError::DivisionByZero);
            }
            Object::Int(left.wrapping_div(right))
        }
        InfixOp::Eq => Object::Bool(left == right),
        InfixOp::NotEq => Object::Bool(left != right),
        InfixOp::Lt => Object::Bool(left < right),
        InfixOp::Gt => Object::Bool(left > right),
    })
}

fn eval_index(left: Object, index: Object) -> Result<Object> {
    match (&left, &index) {
        (Object::Array(elements), Object::Int(idx)) => Ok(usize::try_from(*idx)
            .ok()
            .and_then(|i| elements.get(i))
            .cloned()
            .unwrap_or(Object::Null)),
        (Object::Hash(pairs), _) => {
            let hash_key = index
                .hash_key()
                .ok_or(EvalError::UnusableHashKey { kind: index.kind() })?;
            Ok(pairs
                .get(&hash_key)
                .map(|pair| pair.value.clone())
                .unwrap_or(Object::Null))
        }
        _ => Err(EvalError::IndexNotSupported { kind: left.kind() }),
    }
}

fn apply_function(function: Object, args: Vec<Object>) -> Result<Object> {
    match function {
        Object::Function(func) => {
            if args.len() != func.parameters.len() {
                return Err(EvalError::WrongArgumentCount {
                    want: func.parameters.len(),
                    got: args.len(),
                });
            }
            let env = Environment::new_enclosed(Rc::clone(&func.env));
            for (parameter, arg) in func.parameters.iter().zip(args) {
                env.borrow_mut().set(parameter, arg);
            }
            match eval_block(&func.body, &env)? {
                Object::Return(value) => Ok(*value),
                value => Ok(value),
            }
        }
        // Builtin failures come back as first-class Error values and flow
        // on as ordinary results, same as on the compiled path.
        Object::Builtin(builtin) => Ok((builtin.func)(&args)),
        other => Err(EvalError::NotAFunction { kind: other.kind() }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{lexer, parser};

    fn eval(source: &str) -> Object {
        let tokens = lexer::lex(source).unwrap();
        let (program, errors) = parser::parse(tokens);
        assert!(errors.is_empty(), "parse errors: {:?}", errors);
        let env = Environment::new();
        eval_program(&program, &env)
            .unwrap_or_else(|e| panic!("eval error for {:?}: {}", source, e))
    }

    fn eval_err(source: &str) -> EvalError {
        let tokens = lexer::lex(source).unwrap();
        let (program, _) = parser::parse(tokens);
        let env = Environment::new();
        eval_program(&program, &env).expect_err("expected an eval error")
    }

    #[track_caller]
    fn assert_evals(cases: &[(&str, Object)]) {
        for (source, want) in cases {
            assert_eq!(&eval(source), want, "source: {}", source);
        }
    }

    #[test]
    fn integer_arithmetic() {
        assert_evals(&[
            ("5", Object::Int(5)),
            ("-10", Object::Int(-10)),
            ("5 + 5 + 5 + 5 - 10", Object::Int(10)),
            ("2 * 2 * 2 * 2 * 2", Object::Int(32)),
            ("3 * (3 * 3) + 10", Object::Int(37)),
            ("(5 + 10 * 2 + 15 / 3) * 2 + -10", Object::Int(50)),
        ]);
    }

    #[test]
    fn boolean_expressions() {
        assert_evals(&[
            ("true", Object::Bool(true)),
            ("1 < 2", Object::Bool(true)),
            ("1 > 2", Object::Bool(false)),
            ("1 == 1", Object::Bool(true)),
            ("true != false", Object::Bool(true)),
            ("(1 < 2) == true", Object::Bool(true)),
            ("!true", Object::Bool(false)),
            ("!!true", Object::Bool(true)),
            ("!5", Object::Bool(false)),
        ]);
    }

    #[test]
    fn conditionals() {
        assert_evals(&[
            ("if (true) { 10 }", Object::Int(10)),
            ("if (false) { 10 }", Object::Null),
            ("if (1) { 10 }", Object::Int(10)),
            ("if (1 > 2) { 10 } else { 20 }", Object::Int(20)),
        ]);
    }

    #[test]
    fn return_statements() {
        assert_evals(&[
            ("return 10;", Object::Int(10)),
            ("return 10; 9;", Object::Int(10)),
            ("9; return 2 * 5; 9;", Object::Int(10)),
            (
                // The inner return must unwind both blocks.
                "if (10 > 1) { if (10 > 1) { return 10; } return 1; }",
                Object::Int(10),
            ),
        ]);
    }

    #[test]
    fn let_bindings() {
        assert_evals(&[
            ("let a = 5; a;", Object::Int(5)),
            ("let a = 5 * 5; a;", Object::Int(25)),
            ("let a = 5; let b = a; let c = a + b + 5; c;", Object::Int(15)),
        ]);
    }

    #[test]
    fn functions_and_closures() {
        assert_evals(&[
            ("let identity = fn(x) { x; }; identity(5);", Object::Int(5)),
            ("let double = fn(x) { x * 2; }; double(5);", Object::Int(10)),
            ("fn(x) { x; }(5)", Object::Int(5)),
            (
                "let newAdder = fn(a) { fn(b) { a + b } }; let addTwo = newAdder(2); addTwo(3);",
                Object::Int(5),
            ),
            (
                "let fib = fn(x) { if (x < 2) { return x; } return fib(x - 1) + fib(x - 2); }; fib(10);",
                Object::Int(55),
            ),
        ]);
    }

    #[test]
    fn strings() {
        assert_evals(&[
            (r#""hello""#, Object::str("hello")),
            (r#""hel" + "lo""#, Object::str("hello")),
            (r#""a" == "a""#, Object::Bool(true)),
        ]);
    }

    #[test]
    fn arrays_and_indexing() {
        assert_evals(&[
            (
                "[1, 2 * 2, 3 + 3]",
                Object::array(vec![Object::Int(1), Object::Int(4), Object::Int(6)]),
            ),
            ("[1, 2, 3][0]", Object::Int(1)),
            ("[1, 2, 3][3]", Object::Null),
            ("[1, 2, 3][-1]", Object::Null),
            ("let i = 0; [1][i];", Object::Int(1)),
        ]);
    }

    #[test]
    fn hashes_and_indexing() {
        assert_evals(&[
            (r#"{"one": 1, "two": 2}["two"]"#, Object::Int(2)),
            (r#"{"one": 1}["none"]"#, Object::Null),
            ("{1: 5}[1]", Object::Int(5)),
            ("{true: 7}[true]", Object::Int(7)),
            (r#"let key = "k"; {"k": 5}[key]"#, Object::Int(5)),
        ]);
    }

    #[test]
    fn builtin_functions() {
        assert_evals(&[
            (r#"len("four")"#, Object::Int(4)),
            ("len([1, 2, 3])", Object::Int(3)),
            (
                "let a = [1, 2]; let b = push(a, 3); a",
                Object::array(vec![Object::Int(1), Object::Int(2)]),
            ),
            (
                "len(1)",
                Object::error("argument to `len` not supported, got INTEGER"),
            ),
        ]);
    }

    #[test]
    fn error_messages() {
        let cases = [
            ("5 + true;", "type mismatch: INTEGER + BOOLEAN"),
            ("5 + true; 5;", "type mismatch: INTEGER + BOOLEAN"),
            ("-true", "unknown operator: -BOOLEAN"),
            ("true + false;", "unknown operator: BOOLEAN + BOOLEAN"),
            (r#""a" - "b""#, "unknown operator: STRING - STRING"),
            ("foobar", "identifier not found: foobar"),
            ("5(1)", "not a function: INTEGER"),
            ("fn(a) { a }()", "wrong number of arguments: want=1, got=0"),
            ("{[1]: 2}", "unusable as hash key: ARRAY"),
            ("1 / 0", "division by zero"),
        ];
        for (source, want) in cases {
            assert_eq!(eval_err(source).to_string(), want, "source: {}", source);
        }
    }

    #[test]
    fn environments_nest_without_leaking() {
        assert_evals(&[(
            "let x = 10; let f = fn() { let x = 20; x }; f() + x",
            Object::Int(30),
        )]);
    }
}
