//! Structured diagnostic messages with severity, codes, and design origins.

use crate::code::DiagnosticCode;
use crate::origin::Origin;
use crate::severity::Severity;
use serde::{Deserialize, Serialize};

/// A structured diagnostic message about a design.
///
/// Each diagnostic includes:
/// - A severity level and unique code
/// - A primary message and the [`Origin`] in the module hierarchy
/// - Optional notes and help text
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// The severity level of this diagnostic.
    pub severity: Severity,
    /// The unique code identifying the type of diagnostic.
    pub code: DiagnosticCode,
    /// The main diagnostic message.
    pub message: String,
    /// Where in the design the issue was detected.
    pub origin: Origin,
    /// Explanatory footnotes (e.g., "note: ...").
    pub notes: Vec<String>,
    /// Actionable suggestions (e.g., "help: ...").
    pub help: Vec<String>,
}

impl Diagnostic {
    fn with_severity(
        severity: Severity,
        code: DiagnosticCode,
        message: impl Into<String>,
        origin: Origin,
    ) -> Self {
        Self {
            severity,
            code,
            message: message.into(),
            origin,
            notes: Vec::new(),
            help: Vec::new(),
        }
    }

    /// Creates a new error diagnostic.
    pub fn error(code: DiagnosticCode, message: impl Into<String>, origin: Origin) -> Self {
        Self::with_severity(Severity::Error, code, message, origin)
    }

    /// Creates a new warning diagnostic.
    pub fn warning(code: DiagnosticCode, message: impl Into<String>, origin: Origin) -> Self {
        Self::with_severity(Severity::Warning, code, message, origin)
    }

    /// Adds a note to this diagnostic.
    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }

    /// Adds a help message to this diagnostic.
    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help.push(help.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::code::Category;

    #[test]
    fn create_error() {
        let code = DiagnosticCode::new(Category::Error, 206);
        let diag = Diagnostic::error(code, "signal has two drivers", Origin::unknown());
        assert_eq!(diag.severity, Severity::Error);
        assert_eq!(diag.message, "signal has two drivers");
        assert_eq!(format!("{}", diag.code), "E206");
    }

    #[test]
    fn create_warning() {
        let code = DiagnosticCode::new(Category::Warning, 301);
        let diag = Diagnostic::warning(code, "unused clock domain", Origin::module(["top"]));
        assert_eq!(diag.severity, Severity::Warning);
        assert_eq!(diag.origin.path, vec!["top".to_string()]);
    }

    #[test]
    fn builder_methods() {
        let code = DiagnosticCode::new(Category::Warning, 304);
        let diag = Diagnostic::warning(code, "truncation", Origin::unknown())
            .with_note("right-hand side is 9 bits, target is 8 bits")
            .with_help("slice the right-hand side explicitly");
        assert_eq!(diag.notes.len(), 1);
        assert_eq!(diag.help.len(), 1);
    }
}
