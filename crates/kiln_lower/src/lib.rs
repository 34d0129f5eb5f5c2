//! Platform lowering of specials.
//!
//! Some specials describe behavior rather than hardware: a clock-domain
//! crossing synchronizer, a reset synchronizer, a differential buffer. Before
//! code generation each of them is replaced by ordinary logic or by simpler
//! specials the back end can emit. Which replacement is used is a per-target
//! choice expressed as a [`SpecialOverrides`] table of [`Lowering`]
//! strategies; [`SpecialLowerer`] applies the table to a fragment.
//!
//! # Usage
//!
//! ```ignore
//! let overrides = SpecialOverrides::generic();
//! let lowered = SpecialLowerer::new(&overrides).lower_fragment(fragment)?;
//! ```

#![warn(missing_docs)]

pub mod generic;
pub mod lowerer;
pub mod overrides;
pub mod primitive;

pub use generic::{GenericAsyncResetSynchronizer, GenericMultiReg};
pub use lowerer::{SpecialLowerer, DEFAULT_MAX_ROUNDS};
pub use overrides::{Lowering, SpecialOverrides};
pub use primitive::{PrimitiveDifferentialInput, PrimitiveDifferentialOutput, PrimitiveTristate};
