//! User-controlled promotion and suppression of warnings.

use crate::code::{Category, DiagnosticCode};
use crate::diagnostic::Diagnostic;
use std::collections::BTreeSet;

/// What to do with a warning once the lint policy has been consulted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LintAction {
    /// Drop the warning.
    Allow,
    /// Report it as a warning.
    Warn,
    /// Fail the conversion.
    Deny,
}

/// Deny and allow lists of warning codes.
///
/// Codes in neither list are reported as warnings. Error codes are never
/// affected.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LintPolicy {
    deny: BTreeSet<DiagnosticCode>,
    allow: BTreeSet<DiagnosticCode>,
}

impl LintPolicy {
    /// Creates a policy from explicit deny and allow lists.
    pub fn new(
        deny: impl IntoIterator<Item = DiagnosticCode>,
        allow: impl IntoIterator<Item = DiagnosticCode>,
    ) -> Self {
        Self {
            deny: deny.into_iter().collect(),
            allow: allow.into_iter().collect(),
        }
    }

    /// Decides how a diagnostic with `code` is handled.
    pub fn action(&self, code: DiagnosticCode) -> LintAction {
        if code.category != Category::Warning {
            return LintAction::Warn;
        }
        if self.deny.contains(&code) {
            LintAction::Deny
        } else if self.allow.contains(&code) {
            LintAction::Allow
        } else {
            LintAction::Warn
        }
    }

    /// Splits `diags` into those to report and the first denied one, if any.
    pub fn apply(&self, diags: Vec<Diagnostic>) -> (Vec<Diagnostic>, Option<Diagnostic>) {
        let mut kept = Vec::new();
        let mut denied = None;
        for diag in diags {
            match self.action(diag.code) {
                LintAction::Allow => {}
                LintAction::Warn => kept.push(diag),
                LintAction::Deny => {
                    if denied.is_none() {
                        denied = Some(diag);
                    }
                }
            }
        }
        (kept, denied)
    }
}
