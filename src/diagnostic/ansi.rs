use crate::ast::SourceMap;

use super::{Diagnostic, Severity};

/// Renders diagnostics in rustc's style: a coloured header, then a caret
/// snippet when the source and a span are available.
pub struct AnsiRenderer {
    pub use_color: bool,
}

impl AnsiRenderer {
    fn paint(&self, sgr: &str, s: &str) -> String {
        if self.use_color {
            format!("\x1b[{}m{}\x1b[0m", sgr, s)
        } else {
            s.to_string()
        }
    }

    pub fn render(&self, d: &Diagnostic) -> String {
        let mut out = String::new();

        // `error[TARN-C001]: undefined variable: ghost`
        let severity = match d.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
        };
        let header = match d.code {
            Some(code) => format!("{}[{}]", severity, code),
            None => severity.to_string(),
        };
        out.push_str(&self.paint("1;31", &header));
        out.push_str(&format!(": {}\n", self.paint("1", &d.message)));

        if let (Some(label), Some(source)) = (&d.label, &d.source) {
            let map = SourceMap::new(source);
            let (line, col) = map.lookup(label.span.start);
            let line_text = map.line_text(source, line);
            let gutter = line.to_string().len();

            out.push_str(&format!(
                "{}{} {}:{}\n",
                " ".repeat(gutter),
                self.paint("36", "-->"),
                line,
                col
            ));
            let pipe = self.paint("36", "|");
            out.push_str(&format!("{} {}\n", " ".repeat(gutter + 1), pipe));
            out.push_str(&format!(
                "{} {} {}\n",
                self.paint("36", &format!("{:>width$}", line, width = gutter)),
                pipe,
                line_text
            ));
            let caret_count = label.span.end.saturating_sub(label.span.start).max(1);
            out.push_str(&format!(
                "{} {} {}{} {}\n",
                " ".repeat(gutter + 1),
                pipe,
                " ".repeat(col.saturating_sub(1)),
                self.paint("1;31", &"^".repeat(caret_count)),
                self.paint("1;31", &label.message),
            ));
        }

        for note in &d.notes {
            out.push_str(&format!("{}: {}\n", self.paint("1", "note"), note));
        }
        if let Some(help) = &d.help {
            out.push_str(&format!("{}: {}\n", self.paint("1;36", "help"), help));
        }

        out
    }
}
