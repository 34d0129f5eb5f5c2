//! Diagnostic creation, severity management, and rendering.
//!
//! This crate provides structured [`Diagnostic`] messages with severity levels,
//! error codes, and the design [`Origin`] they refer to. The thread-safe
//! [`DiagnosticSink`] accumulates diagnostics during elaboration and code
//! generation, [`LintPolicy`] applies the user's deny/allow lists, and
//! [`DiagnosticRenderer`] implementations format them for the terminal or JSON.

#![warn(missing_docs)]

pub mod code;
pub mod diagnostic;
pub mod lint;
pub mod origin;
pub mod renderer;
pub mod severity;
pub mod sink;

pub use code::{Category, DiagnosticCode, ParseCodeError};
pub use diagnostic::Diagnostic;
pub use lint::{LintAction, LintPolicy};
pub use origin::Origin;
pub use renderer::{DiagnosticRenderer, JsonRenderer, TerminalRenderer};
pub use severity::Severity;
pub use sink::DiagnosticSink;
