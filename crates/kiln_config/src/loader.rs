//! Configuration file loading and validation.

use crate::error::ConfigError;
use crate::types::KilnConfig;
use std::collections::BTreeSet;
use std::path::Path;

/// The file name looked up by [`load_config`].
pub const CONFIG_FILE_NAME: &str = "kiln.toml";

/// Loads and validates a `kiln.toml` configuration from a directory.
///
/// Reads `<dir>/kiln.toml`, parses it, and validates its values.
pub fn load_config(dir: &Path) -> Result<KilnConfig, ConfigError> {
    let config_path = dir.join(CONFIG_FILE_NAME);
    let content = std::fs::read_to_string(&config_path)?;
    load_config_from_str(&content)
}

/// Parses and validates a `kiln.toml` configuration from a string.
///
/// Useful for testing without filesystem dependencies.
pub fn load_config_from_str(content: &str) -> Result<KilnConfig, ConfigError> {
    let config: KilnConfig =
        toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
    validate_config(&config)?;
    Ok(config)
}

/// Validates that configuration values are usable and consistent.
fn validate_config(config: &KilnConfig) -> Result<(), ConfigError> {
    if config.codegen.name.is_empty() {
        return Err(ConfigError::MissingField("codegen.name".to_string()));
    }
    if !is_identifier(&config.codegen.name) {
        return Err(ConfigError::ValidationError(format!(
            "codegen.name `{}` is not a legal Verilog identifier",
            config.codegen.name
        )));
    }
    if config.elaborate.default_domain.is_empty() {
        return Err(ConfigError::MissingField(
            "elaborate.default_domain".to_string(),
        ));
    }
    if config.elaborate.max_depth == 0 {
        return Err(ConfigError::ValidationError(
            "elaborate.max_depth must be positive".to_string(),
        ));
    }
    config.lint.policy()?;
    let denied: BTreeSet<&str> = config.lint.deny.iter().map(String::as_str).collect();
    if let Some(both) = config.lint.allow.iter().find(|c| denied.contains(c.as_str())) {
        return Err(ConfigError::ValidationError(format!(
            "lint code {both} is both denied and allowed"
        )));
    }
    Ok(())
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}
