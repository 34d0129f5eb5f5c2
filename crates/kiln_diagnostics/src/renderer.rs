//! Diagnostic rendering backends for human-readable and machine-readable output.

use crate::diagnostic::Diagnostic;

/// Trait for rendering diagnostics into formatted output strings.
pub trait DiagnosticRenderer {
    /// Renders a single diagnostic into a formatted string.
    fn render(&self, diag: &Diagnostic) -> String;

    /// Renders a batch of diagnostics, one after another.
    fn render_all(&self, diags: &[Diagnostic]) -> String {
        diags.iter().map(|d| self.render(d)).collect()
    }
}

/// Renders diagnostics in a rustc-style terminal format.
///
/// Produces output like:
/// ```text
/// warning[W301]: clock domain `io` is declared but never used
///   --> top.x `io`
///    = note: ...
///    = help: ...
/// ```
pub struct TerminalRenderer {
    /// Whether to use ANSI color codes in output.
    pub color: bool,
}

impl TerminalRenderer {
    /// Creates a new terminal renderer.
    pub fn new(color: bool) -> Self {
        Self { color }
    }
}

impl DiagnosticRenderer for TerminalRenderer {
    fn render(&self, diag: &Diagnostic) -> String {
        let mut out = String::new();

        if self.color {
            out.push_str(&format!(
                "{}{}[{}]\x1b[0m: {}\n",
                diag.severity.ansi_color(),
                diag.severity,
                diag.code,
                diag.message
            ));
        } else {
            out.push_str(&format!(
                "{}[{}]: {}\n",
                diag.severity, diag.code, diag.message
            ));
        }

        if !diag.origin.is_unknown() {
            out.push_str(&format!("  --> {}\n", diag.origin));
        }

        for note in &diag.notes {
            out.push_str(&format!("   = note: {note}\n"));
        }

        for help in &diag.help {
            out.push_str(&format!("   = help: {help}\n"));
        }

        out
    }
}

/// Renders each diagnostic as one line of JSON.
pub struct JsonRenderer;

impl DiagnosticRenderer for JsonRenderer {
    fn render(&self, diag: &Diagnostic) -> String {
        // Diagnostic holds only strings and plain enums, so serialization cannot fail.
        let mut line = serde_json::to_string(diag).unwrap_or_default();
        line.push('\n');
        line
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::code::{Category, DiagnosticCode};
    use crate::origin::Origin;

    #[test]
    fn render_warning_with_origin() {
        let code = DiagnosticCode::new(Category::Warning, 301);
        let diag = Diagnostic::warning(
            code,
            "clock domain `io` is declared but never used",
            Origin::module(["top", "x"]).with_item("io"),
        );
        let output = TerminalRenderer::new(false).render(&diag);
        assert!(output.contains("warning[W301]: clock domain `io` is declared but never used"));
        assert!(output.contains("--> top.x `io`"));
    }

    #[test]
    fn render_notes_and_help() {
        let code = DiagnosticCode::new(Category::Warning, 303);
        let diag = Diagnostic::warning(code, "signal read but never driven", Origin::unknown())
            .with_note("it is tied to its reset value")
            .with_help("drive it or make it a top-level input");
        let output = TerminalRenderer::new(false).render(&diag);
        assert!(output.contains("= note: it is tied to its reset value"));
        assert!(output.contains("= help: drive it or make it a top-level input"));
        assert!(!output.contains("-->"));
    }

    #[test]
    fn render_with_color() {
        let code = DiagnosticCode::new(Category::Error, 206);
        let diag = Diagnostic::error(code, "boom", Origin::unknown());
        let output = TerminalRenderer::new(true).render(&diag);
        assert!(output.starts_with("\x1b[31merror[E206]\x1b[0m: boom"));
    }

    #[test]
    fn render_json() {
        let code = DiagnosticCode::new(Category::Warning, 304);
        let diag = Diagnostic::warning(code, "truncation", Origin::module(["top"]));
        let output = JsonRenderer.render(&diag);
        let back: Diagnostic = serde_json::from_str(output.trim_end()).unwrap();
        assert_eq!(back, diag);
    }

    #[test]
    fn render_all_concatenates() {
        let code = DiagnosticCode::new(Category::Warning, 300);
        let diags = vec![
            Diagnostic::warning(code, "a", Origin::unknown()),
            Diagnostic::warning(code, "b", Origin::unknown()),
        ];
        let output = TerminalRenderer::new(false).render_all(&diags);
        assert_eq!(output.lines().count(), 2);
    }
}
