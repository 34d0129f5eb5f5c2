//! The kiln intermediate representation.
//!
//! This crate defines the hardware vocabulary every other stage speaks:
//! [`Value`] expressions with [`infer`]red [`Shape`]s, [`Statement`]s,
//! [`ClockDomain`]s, [`Special`]s such as [`Memory`], and the flat
//! [`Fragment`] that modules elaborate into. Design errors are reported as
//! [`ElabError`].

#![warn(missing_docs)]

pub mod codes;
pub mod domain;
pub mod error;
pub mod fragment;
pub mod ids;
pub mod infer;
pub mod memory;
pub mod shape;
pub mod signal;
pub mod special;
pub mod stmt;
pub mod value;
pub mod visit;

pub use domain::ClockDomain;
pub use error::{ElabError, ElabResult};
pub use fragment::Fragment;
pub use ids::{SignalId, SpecialId};
pub use infer::infer;
pub use memory::{Memory, MemoryPort, PortSpec, WriteMode};
pub use shape::Shape;
pub use signal::Signal;
pub use special::{
    AsyncResetSynchronizer, DifferentialInput, DifferentialOutput, Instance, InstanceItem,
    MultiReg, ParamValue, PortDirection, Special, SpecialKind, SpecialPort, SpecialTag,
    SynthesisDirective, Tristate,
};
pub use stmt::{Case, CaseArm, If, Statement};
pub use value::{array, cat, mux, BinaryOp, Const, UnaryOp, Value, ValueOps};
