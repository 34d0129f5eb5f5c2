//! Diagnostic codes for elaboration and conversion.
//!
//! Error codes `E200`--`E220` identify [`ElabError`](crate::ElabError) variants.
//! Warning codes `W300`--`W304` identify non-fatal findings that the lint
//! configuration may allow or deny.

use kiln_diagnostics::{Category, DiagnosticCode};

/// Value used outside the closed expression set.
pub const E200: DiagnosticCode = DiagnosticCode {
    category: Category::Error,
    number: 200,
};

/// Slice or bit index beyond the value's width.
pub const E201: DiagnosticCode = DiagnosticCode {
    category: Category::Error,
    number: 201,
};

/// Assignment to a value that cannot be driven.
pub const E202: DiagnosticCode = DiagnosticCode {
    category: Category::Error,
    number: 202,
};

/// `finalize` called on a module that is already finalized.
pub const E203: DiagnosticCode = DiagnosticCode {
    category: Category::Error,
    number: 203,
};

/// Anonymous submodules declare the same clock domain name.
pub const E204: DiagnosticCode = DiagnosticCode {
    category: Category::Error,
    number: 204,
};

/// Module hierarchy exceeds the configured depth limit.
pub const E205: DiagnosticCode = DiagnosticCode {
    category: Category::Error,
    number: 205,
};

/// Signal driven from more than one place.
pub const E206: DiagnosticCode = DiagnosticCode {
    category: Category::Error,
    number: 206,
};

/// Abstract special with no lowering for the target.
pub const E207: DiagnosticCode = DiagnosticCode {
    category: Category::Error,
    number: 207,
};

/// Lowering dropped one of the special's output ports.
pub const E208: DiagnosticCode = DiagnosticCode {
    category: Category::Error,
    number: 208,
};

/// Special lowering did not reach a fixed point.
pub const E209: DiagnosticCode = DiagnosticCode {
    category: Category::Error,
    number: 209,
};

/// Duplicate port name on a memory or instance.
pub const E210: DiagnosticCode = DiagnosticCode {
    category: Category::Error,
    number: 210,
};

/// Duplicate submodule name.
pub const E211: DiagnosticCode = DiagnosticCode {
    category: Category::Error,
    number: 211,
};

/// Clock domain declared twice in one fragment.
pub const E212: DiagnosticCode = DiagnosticCode {
    category: Category::Error,
    number: 212,
};

/// Reference to a clock domain that does not exist.
pub const E213: DiagnosticCode = DiagnosticCode {
    category: Category::Error,
    number: 213,
};

/// Reset requested from a domain without a reset signal.
pub const E214: DiagnosticCode = DiagnosticCode {
    category: Category::Error,
    number: 214,
};

/// Reference to an FSM state that was never declared.
pub const E215: DiagnosticCode = DiagnosticCode {
    category: Category::Error,
    number: 215,
};

/// `NextState`/`NextValue` outside an FSM.
pub const E216: DiagnosticCode = DiagnosticCode {
    category: Category::Error,
    number: 216,
};

/// Special kind the back end cannot emit.
pub const E217: DiagnosticCode = DiagnosticCode {
    category: Category::Error,
    number: 217,
};

/// Warning promoted to an error by the lint configuration.
pub const E218: DiagnosticCode = DiagnosticCode {
    category: Category::Error,
    number: 218,
};

/// Duplicate key in a `Case` statement.
pub const E219: DiagnosticCode = DiagnosticCode {
    category: Category::Error,
    number: 219,
};

/// Lint deny or allow entry that is not a valid warning code.
pub const E220: DiagnosticCode = DiagnosticCode {
    category: Category::Error,
    number: 220,
};

/// Clock domain created implicitly during conversion.
pub const W300: DiagnosticCode = DiagnosticCode {
    category: Category::Warning,
    number: 300,
};

/// Declared clock domain is never used.
pub const W301: DiagnosticCode = DiagnosticCode {
    category: Category::Warning,
    number: 301,
};

/// FSM state can never be reached.
pub const W302: DiagnosticCode = DiagnosticCode {
    category: Category::Warning,
    number: 302,
};

/// Signal is read but never driven.
pub const W303: DiagnosticCode = DiagnosticCode {
    category: Category::Warning,
    number: 303,
};

/// Assignment truncates a wider right-hand side.
pub const W304: DiagnosticCode = DiagnosticCode {
    category: Category::Warning,
    number: 304,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_codes_display() {
        assert_eq!(E200.to_string(), "E200");
        assert_eq!(E219.to_string(), "E219");
    }

    #[test]
    fn warning_codes_display() {
        assert_eq!(W300.to_string(), "W300");
        assert_eq!(W304.to_string(), "W304");
    }

    #[test]
    fn codes_are_distinct() {
        let all = [
            E200, E201, E202, E203, E204, E205, E206, E207, E208, E209, E210, E211, E212, E213,
            E214, E215, E216, E217, E218, E219, E220, W300, W301, W302, W303, W304,
        ];
        let set: std::collections::HashSet<_> = all.iter().collect();
        assert_eq!(set.len(), all.len());
    }
}
