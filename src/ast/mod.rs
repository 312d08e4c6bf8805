pub mod source_map;

pub use source_map::SourceMap;

use serde::{Deserialize, Serialize};
use std::fmt;

/// Byte range into the original source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

/// A complete program is a list of statements.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Program {
    pub statements: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Stmt {
    /// `let name = expr;`
    Let { name: String, value: Expr },
    /// `return expr;`
    Return { value: Expr },
    /// A bare expression used as a statement.
    Expr { value: Expr },
}

/// A `{ ... }` block. Blocks are statement lists, not expressions; the
/// surrounding `if` or `fn` decides what their last value means.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub statements: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    Ident(String),
    Int(i64),
    Str(String),
    Bool(bool),
    Prefix {
        op: PrefixOp,
        right: Box<Expr>,
    },
    Infix {
        op: InfixOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    If {
        condition: Box<Expr>,
        consequence: Block,
        alternative: Option<Block>,
    },
    /// A function literal. `name` is filled in by the parser when the
    /// literal is the direct right-hand side of a `let`, so the compiler
    /// can wire up self-recursion.
    Fn {
        name: Option<String>,
        parameters: Vec<String>,
        body: Block,
    },
    Call {
        function: Box<Expr>,
        arguments: Vec<Expr>,
    },
    Array(Vec<Expr>),
    /// Key/value pairs in source order. The compiler sorts by the key's
    /// rendered source text before emitting.
    Hash(Vec<(Expr, Expr)>),
    Index {
        left: Box<Expr>,
        index: Box<Expr>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PrefixOp {
    Bang,
    Minus,
}

impl PrefixOp {
    pub fn symbol(self) -> &'static str {
        match self {
            PrefixOp::Bang => "!",
            PrefixOp::Minus => "-",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InfixOp {
    Add,
    Sub,
    Mul,
    Div,
    Eq,
    NotEq,
    Lt,
    Gt,
}

impl InfixOp {
    pub fn symbol(self) -> &'static str {
        match self {
            InfixOp::Add => "+",
            InfixOp::Sub => "-",
            InfixOp::Mul => "*",
            InfixOp::Div => "/",
            InfixOp::Eq => "==",
            InfixOp::NotEq => "!=",
            InfixOp::Lt => "<",
            InfixOp::Gt => ">",
        }
    }
}

// ---- Source-text rendering ----
//
// Display renders the canonical source form of a node. The compiler relies
// on this for deterministic hash-literal key ordering, and `--dump-ast`
// pairs it with the serde JSON dump.

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for stmt in &self.statements {
            write!(f, "{}", stmt)?;
        }
        Ok(())
    }
}

impl fmt::Display for Stmt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stmt::Let { name, value } => write!(f, "let {} = {};", name, value),
            Stmt::Return { value } => write!(f, "return {};", value),
            Stmt::Expr { value } => write!(f, "{}", value),
        }
    }
}

impl fmt::Display for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for stmt in &self.statements {
            write!(f, "{}", stmt)?;
        }
        Ok(())
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Ident(name) => write!(f, "{}", name),
            Expr::Int(value) => write!(f, "{}", value),
            Expr::Str(value) => write!(f, "{}", value),
            Expr::Bool(value) => write!(f, "{}", value),
            Expr::Prefix { op, right } => write!(f, "({}{})", op.symbol(), right),
            Expr::Infix { op, left, right } => {
                write!(f, "({} {} {})", left, op.symbol(), right)
            }
            Expr::If { condition, consequence, alternative } => {
                write!(f, "if{} {}", condition, consequence)?;
                if let Some(alt) = alternative {
                    write!(f, "else {}", alt)?;
                }
                Ok(())
            }
            Expr::Fn { name, parameters, body } => {
                write!(f, "fn")?;
                if let Some(name) = name {
                    write!(f, "<{}>", name)?;
                }
                write!(f, "({}) {}", parameters.join(", "), body)
            }
            Expr::Call { function, arguments } => {
                let args: Vec<String> = arguments.iter().map(|a| a.to_string()).collect();
                write!(f, "{}({})", function, args.join(", "))
            }
            Expr::Array(elements) => {
                let items: Vec<String> = elements.iter().map(|e| e.to_string()).collect();
                write!(f, "[{}]", items.join(", "))
            }
            Expr::Hash(pairs) => {
                let items: Vec<String> =
                    pairs.iter().map(|(k, v)| format!("{}:{}", k, v)).collect();
                write!(f, "{{{}}}", items.join(", "))
            }
            Expr::Index { left, index } => write!(f, "({}[{}])", left, index),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_let_statement() {
        let program = Program {
            statements: vec![Stmt::Let {
                name: "myVar".to_string(),
                value: Expr::Ident("anotherVar".to_string()),
            }],
        };
        assert_eq!(program.to_string(), "let myVar = anotherVar;");
    }

    #[test]
    fn render_infix_nests_parens() {
        let expr = Expr::Infix {
            op: InfixOp::Add,
            left: Box::new(Expr::Int(1)),
            right: Box::new(Expr::Infix {
                op: InfixOp::Mul,
                left: Box::new(Expr::Int(2)),
                right: Box::new(Expr::Int(3)),
            }),
        };
        assert_eq!(expr.to_string(), "(1 + (2 * 3))");
    }

    #[test]
    fn render_function_literal() {
        let expr = Expr::Fn {
            name: None,
            parameters: vec!["x".to_string(), "y".to_string()],
            body: Block {
                statements: vec![Stmt::Expr {
                    value: Expr::Infix {
                        op: InfixOp::Add,
                        left: Box::new(Expr::Ident("x".to_string())),
                        right: Box::new(Expr::Ident("y".to_string())),
                    },
                }],
            },
        };
        assert_eq!(expr.to_string(), "fn(x, y) (x + y)");
    }

    #[test]
    fn render_named_function_literal() {
        let expr = Expr::Fn {
            name: Some("double".to_string()),
            parameters: vec!["x".to_string()],
            body: Block { statements: vec![] },
        };
        assert_eq!(expr.to_string(), "fn<double>(x) ");
    }

    #[test]
    fn render_index_expression() {
        let expr = Expr::Index {
            left: Box::new(Expr::Ident("arr".to_string())),
            index: Box::new(Expr::Int(0)),
        };
        assert_eq!(expr.to_string(), "(arr[0])");
    }

    #[test]
    fn hash_keys_render_distinctly() {
        let keys = [
            Expr::Str("one".to_string()),
            Expr::Int(1),
            Expr::Bool(true),
            Expr::Ident("one".to_string()),
        ];
        let rendered: Vec<String> = keys.iter().map(|k| k.to_string()).collect();
        assert_eq!(rendered, vec!["one", "1", "true", "one"]);
    }

    #[test]
    fn serde_round_trip() {
        let program = Program {
            statements: vec![Stmt::Return {
                value: Expr::Array(vec![Expr::Int(1), Expr::Bool(false)]),
            }],
        };
        let json = serde_json::to_string(&program).unwrap();
        let back: Program = serde_json::from_str(&json).unwrap();
        assert_eq!(back, program);
    }
}
