//! Verilog-2001 back end for kiln.
//!
//! [`convert`] takes a module (or an already flat fragment), the list of
//! signals that become top-level ports and a table of special lowerings, and
//! produces one synthesizable Verilog module. Combinational logic is folded
//! into continuous assignments, each clock domain gets one `always` block,
//! and memories, instances and tri-state pads are emitted natively.
//!
//! Output is deterministic: the same design converted twice yields the same
//! text and the same [`ConvertOutput::hash`], whatever order signals were
//! created in.
//!
//! # Usage
//!
//! ```ignore
//! let out = convert(top, &[led.clone()], &SpecialOverrides::generic(), &KilnConfig::default())?;
//! out.write_to(Path::new("build"))?;
//! ```

#![warn(missing_docs)]

pub mod buffer;
pub mod convert;
pub mod emit;
pub mod expr;
pub mod fold;
pub mod names;
pub mod output;
mod specials;

pub use convert::convert;
pub use names::{is_keyword, legalize, NameScope};
pub use output::{ConvertOutput, DataFile, Port};
