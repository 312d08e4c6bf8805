use crate::ast::SourceMap;

use super::{Diagnostic, Severity};

/// One diagnostic as a single-line JSON object, for piping into tooling.
/// Callers emit one object per line (NDJSON).
pub fn render(d: &Diagnostic) -> String {
    let severity = match d.severity {
        Severity::Error => "error",
        Severity::Warning => "warning",
    };

    let mut obj = serde_json::json!({
        "severity": severity,
        "message": d.message,
        "notes": d.notes,
    });

    if let Some(code) = d.code {
        obj["code"] = serde_json::Value::from(code);
    }
    if let Some(help) = &d.help {
        obj["help"] = serde_json::Value::from(help.clone());
    }
    if let Some(label) = &d.label {
        let mut span = serde_json::json!({
            "start": label.span.start,
            "end": label.span.end,
            "message": label.message,
        });
        if let Some(source) = &d.source {
            let (line, col) = SourceMap::new(source).lookup(label.span.start);
            span["line"] = serde_json::Value::from(line);
            span["col"] = serde_json::Value::from(col);
        }
        obj["span"] = span;
    }

    serde_json::to_string(&obj).unwrap_or_else(|_| {
        r#"{"severity":"error","message":"diagnostic serialization failed"}"#.to_string()
    })
}
