//! Shared foundational types used across the kiln hardware compiler.
//!
//! This crate provides two's-complement bit helpers shared by width inference,
//! code generation and evaluation, content hashing for reproducible output,
//! and the common internal-error result type.

#![warn(missing_docs)]

pub mod bits;
pub mod hash;
pub mod result;

pub use bits::{bits_for, mask, to_bits, wrap};
pub use hash::ContentHash;
pub use result::{InternalError, KilnResult};
