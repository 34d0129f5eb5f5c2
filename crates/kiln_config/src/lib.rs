//! Parsing and validation of `kiln.toml` configuration files.
//!
//! This crate reads the optional configuration file and produces a strongly-typed
//! [`KilnConfig`] controlling code generation, elaboration limits, and lint levels.
//! Every table and field has a default, so an empty file is a valid configuration.

#![warn(missing_docs)]

pub mod error;
pub mod loader;
pub mod types;

pub use error::ConfigError;
pub use loader::{load_config, load_config_from_str, CONFIG_FILE_NAME};
pub use types::*;
