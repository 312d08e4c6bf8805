pub mod ansi;
pub mod json;
pub mod registry;

use crate::ast::Span;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    /// No stage emits warnings yet; the renderers support them.
    #[allow(dead_code)]
    Warning,
}

#[derive(Debug, Clone)]
pub struct Label {
    pub span: Span,
    pub message: String,
}

/// One reportable problem, assembled with the builder methods and handed
/// to a renderer. `source` enables line/column and snippet output.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: Severity,
    pub code: Option<&'static str>,
    pub message: String,
    pub label: Option<Label>,
    pub notes: Vec<String>,
    pub help: Option<String>,
    pub source: Option<String>,
}

impl Diagnostic {
    pub fn error(message: impl Into<String>) -> Self {
        Diagnostic {
            severity: Severity::Error,
            code: None,
            message: message.into(),
            label: None,
            notes: Vec::new(),
            help: None,
            source: None,
        }
    }

    pub fn with_code(mut self, code: &'static str) -> Self {
        self.code = Some(code);
        self
    }

    pub fn with_span(mut self, span: Span, message: impl Into<String>) -> Self {
        self.label = Some(Label { span, message: message.into() });
        self
    }

    #[allow(dead_code)] // renderers support notes; no From impl attaches one yet
    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }

    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

// ---- Conversions from each layer's error type ----

impl From<&crate::lexer::LexError> for Diagnostic {
    fn from(e: &crate::lexer::LexError) -> Self {
        let span = Span {
            start: e.position,
            end: e.position + e.snippet.len().max(1),
        };
        Diagnostic::error(format!("unexpected input '{}'", e.snippet))
            .with_code(e.code)
            .with_span(span, "cannot be lexed")
    }
}

impl From<&crate::parser::ParseError> for Diagnostic {
    fn from(e: &crate::parser::ParseError) -> Self {
        Diagnostic::error(&e.message)
            .with_code(e.code)
            .with_span(e.span, "here")
    }
}

impl From<&crate::compiler::CompileError> for Diagnostic {
    fn from(e: &crate::compiler::CompileError) -> Self {
        use crate::compiler::CompileError;
        let d = Diagnostic::error(e.to_string()).with_code(match e {
            CompileError::UndefinedVariable { .. } => "TARN-C001",
        });
        match e {
            CompileError::UndefinedVariable { .. } => {
                d.with_help("bind the name with `let` before using it")
            }
        }
    }
}

impl From<&crate::vm::VmError> for Diagnostic {
    fn from(e: &crate::vm::VmError) -> Self {
        use crate::vm::VmError;
        let code = match e {
            VmError::UnsupportedBinaryTypes { .. } => "TARN-R001",
            VmError::UnknownStringOperator { .. } | VmError::UnknownOperator { .. } => "TARN-R002",
            VmError::UnsupportedNegation { .. } => "TARN-R003",
            VmError::DivisionByZero => "TARN-R004",
            VmError::NotCallable => "TARN-R005",
            VmError::WrongArgumentCount { .. } => "TARN-R006",
            VmError::UnusableHashKey { .. } => "TARN-R007",
            VmError::IndexNotSupported { .. } => "TARN-R008",
            VmError::StackOverflow => "TARN-R009",
            VmError::UnknownOpcode { .. } => "TARN-R010",
            VmError::NotAFunction { .. } => "TARN-R011",
        };
        Diagnostic::error(e.to_string()).with_code(code)
    }
}

impl From<&crate::interpreter::EvalError> for Diagnostic {
    fn from(e: &crate::interpreter::EvalError) -> Self {
        use crate::interpreter::EvalError;
        let code = match e {
            EvalError::TypeMismatch { .. } => "TARN-R001",
            EvalError::UnknownPrefixOperator { .. } | EvalError::UnknownInfixOperator { .. } => {
                "TARN-R002"
            }
            EvalError::DivisionByZero => "TARN-R004",
            EvalError::NotAFunction { .. } => "TARN-R005",
            EvalError::WrongArgumentCount { .. } => "TARN-R006",
            EvalError::UnusableHashKey { .. } => "TARN-R007",
            EvalError::IndexNotSupported { .. } => "TARN-R008",
            EvalError::IdentifierNotFound { .. } => "TARN-R012",
        };
        Diagnostic::error(e.to_string()).with_code(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_accumulates_fields() {
        let d = Diagnostic::error("boom")
            .with_code("TARN-R001")
            .with_span(Span { start: 2, end: 5 }, "here")
            .with_note("while running")
            .with_help("do not boom");
        assert_eq!(d.severity, Severity::Error);
        assert_eq!(d.code, Some("TARN-R001"));
        assert_eq!(d.label.as_ref().unwrap().span.start, 2);
        assert_eq!(d.notes, vec!["while running"]);
        assert_eq!(d.help.as_deref(), Some("do not boom"));
    }

    #[test]
    fn from_lex_error() {
        let e = crate::lexer::LexError {
            code: "TARN-L001",
            position: 7,
            snippet: "@".to_string(),
        };
        let d = Diagnostic::from(&e);
        assert_eq!(d.code, Some("TARN-L001"));
        let label = d.label.unwrap();
        assert_eq!((label.span.start, label.span.end), (7, 8));
    }

    #[test]
    fn from_parse_error() {
        let e = crate::parser::ParseError {
            code: "TARN-P002",
            span: Span { start: 4, end: 5 },
            message: "expected identifier".to_string(),
        };
        let d = Diagnostic::from(&e);
        assert!(d.message.contains("expected identifier"));
        assert_eq!(d.code, Some("TARN-P002"));
    }

    #[test]
    fn from_compile_error() {
        let e = crate::compiler::CompileError::UndefinedVariable { name: "ghost".to_string() };
        let d = Diagnostic::from(&e);
        assert_eq!(d.code, Some("TARN-C001"));
        assert!(d.message.contains("ghost"));
        assert!(d.help.is_some());
    }

    #[test]
    fn from_vm_errors() {
        use crate::object::Kind;
        use crate::vm::VmError;
        let cases: [(VmError, &str); 4] = [
            (
                VmError::UnsupportedBinaryTypes { left: Kind::Int, right: Kind::Bool },
                "TARN-R001",
            ),
            (VmError::StackOverflow, "TARN-R009"),
            (VmError::NotCallable, "TARN-R005"),
            (VmError::UnknownOpcode { op: 99 }, "TARN-R010"),
        ];
        for (e, code) in cases {
            assert_eq!(Diagnostic::from(&e).code, Some(code), "error: {}", e);
        }
    }

    #[test]
    fn from_eval_errors() {
        use crate::interpreter::EvalError;
        let d = Diagnostic::from(&EvalError::IdentifierNotFound { name: "x".to_string() });
        assert_eq!(d.code, Some("TARN-R012"));
        assert!(d.message.contains("identifier not found: x"));
    }

    #[test]
    fn every_emitted_code_is_registered() {
        let codes = [
            "TARN-L001", "TARN-L002", "TARN-P001", "TARN-P002", "TARN-C001", "TARN-R001",
            "TARN-R002", "TARN-R003", "TARN-R004", "TARN-R005", "TARN-R006", "TARN-R007",
            "TARN-R008", "TARN-R009", "TARN-R010", "TARN-R011", "TARN-R012",
        ];
        for code in codes {
            assert!(
                registry::lookup(code).is_some(),
                "code {} missing from registry",
                code
            );
        }
    }
}
