//! Cycle-based reference evaluator for kiln.
//!
//! This crate executes a flat [`Fragment`](kiln_ir::Fragment) directly,
//! without going through Verilog, so that behavior can be checked against
//! the semantics the compiler promises. It models two-state logic only, one
//! clock edge at a time per domain, with combinational logic settled in
//! dependency order and memories modeled port by port.
//!
//! # Usage
//!
//! ```ignore
//! let mut sim = Simulator::new(&fragment)?;
//! sim.poke(&enable, 1);
//! sim.run("sys", 10)?;
//! assert_eq!(sim.peek(&count), BigInt::from(10));
//! ```
//!
//! # Modules
//!
//! - `error`: Simulation error types
//! - `eval`: Expression evaluation and statement execution
//! - `kernel`: The simulator itself

#![warn(missing_docs)]

pub mod error;
pub mod eval;
pub mod kernel;

pub use error::SimError;
pub use kernel::Simulator;
