//! Elaboration and conversion failures.

use crate::codes;
use kiln_diagnostics::{Diagnostic, DiagnosticCode, Origin};

/// Result type for operations that can fail on a malformed design.
pub type ElabResult<T> = Result<T, ElabError>;

/// A fatal problem with the user's design.
///
/// Every variant names the module, signal, domain or special at fault. None
/// of these are retried: elaboration either yields a complete fragment or one
/// of these errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ElabError {
    /// A value that inference or emission cannot handle.
    #[error("malformed expression at {position}: {detail}")]
    MalformedExpression {
        /// Structural position of the offending node.
        position: String,
        /// What is wrong with it.
        detail: String,
    },

    /// A slice outside the sliced value.
    #[error("slice [{start}:{stop}] is out of bounds for a {width}-bit value")]
    SliceOutOfBounds {
        /// First bit (inclusive).
        start: u32,
        /// Last bit (exclusive).
        stop: u32,
        /// Width of the sliced value.
        width: u32,
    },

    /// An assignment target that cannot be driven.
    #[error("cannot assign to {target}")]
    InvalidAssignTarget {
        /// Debug rendering of the target.
        target: String,
    },

    /// `finalize` was called twice.
    #[error("module `{module}` is already finalized")]
    AlreadyFinalized {
        /// Module path.
        module: String,
    },

    /// Two anonymous submodules declare the same clock domain.
    #[error("anonymous submodules of `{module}` both declare clock domain `{domain}`")]
    AnonymousDomainCollision {
        /// Parent module path.
        module: String,
        /// The colliding domain name.
        domain: String,
    },

    /// The module tree is deeper than allowed.
    #[error("module hierarchy at `{path}` exceeds the depth limit of {max_depth}")]
    HierarchyTooDeep {
        /// Module path where the limit was hit.
        path: String,
        /// The configured limit.
        max_depth: usize,
    },

    /// A signal with more than one driver.
    #[error("signal `{signal}` is driven by both {first} and {second}")]
    DriverConflict {
        /// The signal name.
        signal: String,
        /// The first driver found.
        first: String,
        /// The conflicting driver.
        second: String,
    },

    /// An abstract special with no lowering.
    #[error("no lowering available for special {special}")]
    MissingLowering {
        /// The special's kind.
        special: String,
    },

    /// A lowering stopped driving one of the special's outputs.
    #[error("lowering of {special} no longer drives output port `{port}`")]
    LoweringLostPort {
        /// The special's kind.
        special: String,
        /// The lost port.
        port: String,
    },

    /// Lowerings kept producing abstract specials.
    #[error("special lowering did not converge after {rounds} rounds")]
    LoweringDidNotConverge {
        /// Number of rounds attempted.
        rounds: usize,
    },

    /// A port name reused on a memory or instance.
    #[error("`{owner}` already has a port named `{port}`")]
    DuplicatePort {
        /// The memory or instance.
        owner: String,
        /// The repeated port name.
        port: String,
    },

    /// A submodule name reused under one parent.
    #[error("module `{module}` already has a submodule named `{name}`")]
    DuplicateSubmodule {
        /// Parent module path.
        module: String,
        /// The repeated submodule name.
        name: String,
    },

    /// A clock domain declared twice in one fragment.
    #[error("clock domain `{domain}` is declared more than once")]
    DuplicateClockDomain {
        /// The repeated domain name.
        domain: String,
    },

    /// A reference to a clock domain nobody declared.
    #[error("clock domain `{domain}` is used but never declared")]
    UnknownClockDomain {
        /// The missing domain name.
        domain: String,
    },

    /// A reset requested from a reset-less domain.
    #[error("clock domain `{domain}` has no reset signal")]
    ResetLessDomain {
        /// The domain name.
        domain: String,
    },

    /// A transition to a state that was never declared.
    #[error("FSM `{fsm}` has no state named `{state}`")]
    UnknownFsmState {
        /// The FSM name.
        fsm: String,
        /// The missing state.
        state: String,
    },

    /// FSM sugar found outside an FSM.
    #[error("`{statement}` used outside of an FSM in {context}")]
    UnloweredFsmStatement {
        /// `NextState` or `NextValue`.
        statement: String,
        /// Where it was found.
        context: String,
    },

    /// A special the back end cannot emit.
    #[error("special {special} is not supported: {reason}")]
    UnsupportedSpecial {
        /// The special's kind.
        special: String,
        /// Why it cannot be handled.
        reason: String,
    },

    /// A warning the lint configuration turned into an error.
    #[error("{code} denied by lint configuration: {message}")]
    DeniedWarning {
        /// The warning's code.
        code: DiagnosticCode,
        /// The warning's message.
        message: String,
    },

    /// A `Case` with two arms for the same key.
    #[error("duplicate case key {key}")]
    DuplicateCaseKey {
        /// The repeated key.
        key: String,
    },

    /// A deny or allow entry that is not a warning code.
    #[error("invalid lint configuration: {message}")]
    InvalidLintConfig {
        /// What failed to parse.
        message: String,
    },
}

impl ElabError {
    /// Returns the stable diagnostic code for this error.
    pub fn code(&self) -> DiagnosticCode {
        match self {
            ElabError::MalformedExpression { .. } => codes::E200,
            ElabError::SliceOutOfBounds { .. } => codes::E201,
            ElabError::InvalidAssignTarget { .. } => codes::E202,
            ElabError::AlreadyFinalized { .. } => codes::E203,
            ElabError::AnonymousDomainCollision { .. } => codes::E204,
            ElabError::HierarchyTooDeep { .. } => codes::E205,
            ElabError::DriverConflict { .. } => codes::E206,
            ElabError::MissingLowering { .. } => codes::E207,
            ElabError::LoweringLostPort { .. } => codes::E208,
            ElabError::LoweringDidNotConverge { .. } => codes::E209,
            ElabError::DuplicatePort { .. } => codes::E210,
            ElabError::DuplicateSubmodule { .. } => codes::E211,
            ElabError::DuplicateClockDomain { .. } => codes::E212,
            ElabError::UnknownClockDomain { .. } => codes::E213,
            ElabError::ResetLessDomain { .. } => codes::E214,
            ElabError::UnknownFsmState { .. } => codes::E215,
            ElabError::UnloweredFsmStatement { .. } => codes::E216,
            ElabError::UnsupportedSpecial { .. } => codes::E217,
            ElabError::DeniedWarning { .. } => codes::E218,
            ElabError::DuplicateCaseKey { .. } => codes::E219,
            ElabError::InvalidLintConfig { .. } => codes::E220,
        }
    }

    fn origin(&self) -> Origin {
        let path = |p: &str| Origin::module(p.split('.').filter(|s| !s.is_empty()));
        match self {
            ElabError::AlreadyFinalized { module } => path(module),
            ElabError::AnonymousDomainCollision { module, domain } => {
                path(module).with_item(domain.clone())
            }
            ElabError::HierarchyTooDeep { path: p, .. } => path(p),
            ElabError::DuplicateSubmodule { module, name } => path(module).with_item(name.clone()),
            ElabError::DriverConflict { signal, .. } => Origin::unknown().with_item(signal.clone()),
            ElabError::DuplicateClockDomain { domain }
            | ElabError::UnknownClockDomain { domain }
            | ElabError::ResetLessDomain { domain } => Origin::unknown().with_item(domain.clone()),
            ElabError::UnknownFsmState { fsm, state } => path(fsm).with_item(state.clone()),
            ElabError::DuplicatePort { owner, port } => {
                Origin::unknown().with_item(format!("{owner}.{port}"))
            }
            _ => Origin::unknown(),
        }
    }

    /// Converts this error into a renderable diagnostic.
    pub fn to_diagnostic(&self) -> Diagnostic {
        let diag = Diagnostic::error(self.code(), self.to_string(), self.origin());
        match self {
            ElabError::MissingLowering { .. } => diag.with_help(
                "supply a lowering for this special kind in the overrides passed to `convert`",
            ),
            ElabError::DriverConflict { .. } => {
                diag.with_note("a signal must have exactly one driving clock domain or be combinational")
            }
            ElabError::AnonymousDomainCollision { .. } => {
                diag.with_help("give the submodules names so their domains can be renamed")
            }
            ElabError::InvalidLintConfig { .. } => {
                diag.with_help("lint codes look like `W304`; run `kiln check-config` on the file")
            }
            _ => diag,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiln_diagnostics::Severity;

    #[test]
    fn display_driver_conflict() {
        let err = ElabError::DriverConflict {
            signal: "q".into(),
            first: "comb".into(),
            second: "sync domain `sys`".into(),
        };
        assert_eq!(
            err.to_string(),
            "signal `q` is driven by both comb and sync domain `sys`"
        );
    }

    #[test]
    fn display_slice() {
        let err = ElabError::SliceOutOfBounds {
            start: 2,
            stop: 9,
            width: 8,
        };
        assert_eq!(err.to_string(), "slice [2:9] is out of bounds for a 8-bit value");
    }

    #[test]
    fn codes_are_stable() {
        assert_eq!(
            ElabError::AlreadyFinalized { module: "top".into() }
                .code()
                .to_string(),
            "E203"
        );
        assert_eq!(
            ElabError::MissingLowering {
                special: "MultiReg".into()
            }
            .code()
            .to_string(),
            "E207"
        );
    }

    #[test]
    fn to_diagnostic_carries_origin() {
        let err = ElabError::AnonymousDomainCollision {
            module: "top.x".into(),
            domain: "sub".into(),
        };
        let diag = err.to_diagnostic();
        assert_eq!(diag.severity, Severity::Error);
        assert_eq!(diag.origin.path, vec!["top".to_string(), "x".to_string()]);
        assert_eq!(diag.origin.item.as_deref(), Some("sub"));
        assert_eq!(diag.help.len(), 1);
    }

    #[test]
    fn invalid_lint_config_is_e220() {
        let err = ElabError::InvalidLintConfig {
            message: "lint.deny: bogus".into(),
        };
        assert_eq!(err.code().to_string(), "E220");
        assert_eq!(err.to_string(), "invalid lint configuration: lint.deny: bogus");
        assert_eq!(err.to_diagnostic().help.len(), 1);
    }

    #[test]
    fn to_diagnostic_unknown_origin() {
        let diag = ElabError::LoweringDidNotConverge { rounds: 16 }.to_diagnostic();
        assert!(diag.origin.is_unknown());
        assert!(diag.message.contains("16 rounds"));
    }
}
