//! Module elaboration for kiln.
//!
//! Designs are built as a tree of [`Module`]s, each owning a fragment of
//! logic and its submodules. Finalizing the top module flattens the tree
//! into one [`Fragment`](kiln_ir::Fragment), renaming clock domains that
//! collide between siblings. [`Fsm`] is a module specialization that turns
//! per-state action lists into a state register and next-state logic.
//!
//! # Usage
//!
//! ```ignore
//! let mut top = Module::new("top");
//! top.add_sync("sys", [counter.clone().assign(&counter + 1)]);
//! top.add_submodule(Some("ctl"), fsm)?;
//! let fragment = top.into_fragment(&mut ElaborationContext::default())?;
//! ```

#![warn(missing_docs)]

pub mod context;
pub mod decorate;
pub mod fsm;
pub mod module;

pub use context::ElaborationContext;
pub use decorate::Decorator;
pub use fsm::{CompiledFsm, Fsm};
pub use module::{BuildState, Finalizer, IntoFragment, Module};
