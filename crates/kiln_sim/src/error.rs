//! Simulation error types for the cycle-based evaluator.
//!
//! All errors that can occur while building or stepping a [`Simulator`]
//! are represented as variants of [`SimError`].
//!
//! [`Simulator`]: crate::Simulator

use kiln_ir::ElabError;

/// Errors that can occur during simulation setup or execution.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SimError {
    /// Combinational logic feeds back into itself.
    #[error("combinational loop through `{signal}`")]
    CombinationalLoop {
        /// A signal driven inside the loop.
        signal: String,
    },

    /// A construct the evaluator does not model.
    #[error("unsupported: {reason}")]
    Unsupported {
        /// Description of the unsupported construct.
        reason: String,
    },

    /// A clock domain that nothing in the design refers to.
    #[error("unknown clock domain `{domain}`")]
    UnknownDomain {
        /// The requested domain.
        domain: String,
    },

    /// The design violates an elaboration invariant.
    #[error(transparent)]
    Elab(#[from] ElabError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn combinational_loop_display() {
        let e = SimError::CombinationalLoop {
            signal: "x".into(),
        };
        assert_eq!(e.to_string(), "combinational loop through `x`");
    }

    #[test]
    fn unsupported_display() {
        let e = SimError::Unsupported {
            reason: "Instance FDRE".into(),
        };
        assert_eq!(e.to_string(), "unsupported: Instance FDRE");
    }

    #[test]
    fn unknown_domain_display() {
        let e = SimError::UnknownDomain {
            domain: "pix".into(),
        };
        assert_eq!(e.to_string(), "unknown clock domain `pix`");
    }

    #[test]
    fn elab_errors_pass_through() {
        let inner = ElabError::MissingLowering {
            special: "MultiReg".into(),
        };
        let e = SimError::from(inner.clone());
        assert_eq!(e.to_string(), inner.to_string());
    }
}
