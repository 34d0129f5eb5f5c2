//! Configuration types deserialized from `kiln.toml`.

use crate::error::ConfigError;
use kiln_diagnostics::{DiagnosticCode, LintPolicy};
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer};

/// The top-level configuration parsed from `kiln.toml`.
///
/// All three tables are optional; a missing table takes its defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct KilnConfig {
    /// Verilog code generation settings.
    #[serde(default)]
    pub codegen: CodegenConfig,
    /// Module elaboration settings.
    #[serde(default)]
    pub elaborate: ElaborateConfig,
    /// Lint levels for warnings.
    #[serde(default)]
    pub lint: LintConfig,
}

/// Settings for the Verilog back end.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CodegenConfig {
    /// Name of the emitted Verilog module.
    pub name: String,
    /// Create clock domains that are used but never declared, exposing their
    /// clock and reset as top-level inputs.
    pub create_clock_domains: bool,
    /// Omit register initializers, for flows that reject `initial` values.
    pub asic_syntax: bool,
    /// How memory initial contents are emitted.
    pub memory_init: MemoryInitStyle,
    /// Emit the machine-generated banner comment.
    pub header: bool,
}

impl Default for CodegenConfig {
    fn default() -> Self {
        Self {
            name: "top".to_string(),
            create_clock_domains: true,
            asic_syntax: false,
            memory_init: MemoryInitStyle::Inline,
            header: true,
        }
    }
}

/// Emission style for memory initial contents.
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MemoryInitStyle {
    /// An `initial` block assigning every word (default).
    #[default]
    Inline,
    /// A `$readmemh` call reading a side file returned with the output.
    File,
}

/// Settings for module elaboration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ElaborateConfig {
    /// Name of the implicit clock domain.
    pub default_domain: String,
    /// Maximum module hierarchy depth before elaboration gives up.
    pub max_depth: usize,
}

impl Default for ElaborateConfig {
    fn default() -> Self {
        Self {
            default_domain: "sys".to_string(),
            max_depth: 256,
        }
    }
}

/// Lint configuration controlling which warnings are fatal or silent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LintConfig {
    /// Warning codes to treat as errors.
    #[serde(default, deserialize_with = "deserialize_string_or_vec")]
    pub deny: Vec<String>,
    /// Warning codes to suppress.
    #[serde(default, deserialize_with = "deserialize_string_or_vec")]
    pub allow: Vec<String>,
}

impl LintConfig {
    /// Parses the code lists into a [`LintPolicy`].
    pub fn policy(&self) -> Result<LintPolicy, ConfigError> {
        let deny = parse_codes("lint.deny", &self.deny)?;
        let allow = parse_codes("lint.allow", &self.allow)?;
        Ok(LintPolicy::new(deny, allow))
    }
}

fn parse_codes(field: &str, codes: &[String]) -> Result<Vec<DiagnosticCode>, ConfigError> {
    codes
        .iter()
        .map(|c| {
            c.parse::<DiagnosticCode>()
                .map_err(|e| ConfigError::ValidationError(format!("{field}: {e}")))
        })
        .collect()
}

/// Deserializes a field that can be either a single string or a list of strings.
///
/// Allows `deny = "W304"` as shorthand for `deny = ["W304"]`.
fn deserialize_string_or_vec<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    struct StringOrVec;

    impl<'de> Visitor<'de> for StringOrVec {
        type Value = Vec<String>;

        fn expecting(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            formatter.write_str("a string or a list of strings")
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
            Ok(vec![v.to_string()])
        }

        fn visit_seq<A: de::SeqAccess<'de>>(self, mut seq: A) -> Result<Self::Value, A::Error> {
            let mut vec = Vec::new();
            while let Some(val) = seq.next_element::<String>()? {
                vec.push(val);
            }
            Ok(vec)
        }
    }

    deserializer.deserialize_any(StringOrVec)
}
